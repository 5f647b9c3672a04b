//! Document snapshots and span/position conversions.

use std::sync::Arc;

use lsp_types::{Position as LspPosition, Range as LspRange, Url};

use crate::ir::Span;

/// The position encoding negotiated with the client.
///
/// The protocol defaults to UTF-16 column units; clients may opt into UTF-8
/// during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionEncoding {
    /// Columns count UTF-16 code units.
    #[default]
    Utf16,
    /// Columns count bytes.
    Utf8,
}

/// A 128-bit content fingerprint of a document's text.
pub fn hash128(text: &str) -> u128 {
    use siphasher::sip128::{Hasher128, SipHasher13};
    use std::hash::Hasher;

    let mut hasher = SipHasher13::new();
    hasher.write(text.as_bytes());
    hasher.finish128().as_u128()
}

/// An immutable snapshot of one open document.
///
/// Borrowed read-only by analysis runs; the workspace owns the live buffers
/// and republishes a fresh snapshot on every change.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    uri: Url,
    text: Arc<str>,
    version: i32,
    line_starts: Arc<[usize]>,
    fingerprint: u128,
}

impl DocumentSnapshot {
    /// Snapshots a document's content at a version.
    pub fn new(uri: Url, text: impl Into<Arc<str>>, version: i32) -> Self {
        let text: Arc<str> = text.into();
        let mut line_starts = vec![0];
        for (pos, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(pos + 1);
            }
        }
        let fingerprint = hash128(&text);
        Self {
            uri,
            text,
            version,
            line_starts: line_starts.into(),
            fingerprint,
        }
    }

    /// The document's URI.
    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// The document's text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The client-reported document version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// The content fingerprint used for cache validation.
    pub fn fingerprint(&self) -> u128 {
        self.fingerprint
    }

    /// Converts a byte offset to a protocol position.
    pub fn position_at(&self, offset: usize, encoding: PositionEncoding) -> LspPosition {
        let offset = offset.min(self.text.len());
        let line = self.line_starts.partition_point(|&start| start <= offset) - 1;
        let line_start = self.line_starts[line];
        let column = match encoding {
            PositionEncoding::Utf8 => offset - line_start,
            PositionEncoding::Utf16 => self.text[line_start..offset]
                .chars()
                .map(char::len_utf16)
                .sum(),
        };
        LspPosition::new(line as u32, column as u32)
    }

    /// Converts a byte span to a protocol range.
    pub fn range_at(&self, span: &Span, encoding: PositionEncoding) -> LspRange {
        LspRange::new(
            self.position_at(span.start, encoding),
            self.position_at(span.end, encoding),
        )
    }

    /// Converts a protocol position back to a byte offset. Returns `None`
    /// when the position lies outside the document.
    pub fn offset_at(&self, position: LspPosition, encoding: PositionEncoding) -> Option<usize> {
        let line_start = *self.line_starts.get(position.line as usize)?;
        let line_end = self
            .line_starts
            .get(position.line as usize + 1)
            .copied()
            .unwrap_or(self.text.len());
        let line = &self.text[line_start..line_end];

        match encoding {
            PositionEncoding::Utf8 => {
                let offset = line_start + position.character as usize;
                (offset <= line_end).then_some(offset)
            }
            PositionEncoding::Utf16 => {
                let mut units = 0usize;
                if position.character == 0 {
                    return Some(line_start);
                }
                for (pos, ch) in line.char_indices() {
                    if units >= position.character as usize {
                        return Some(line_start + pos);
                    }
                    units += ch.len_utf16();
                }
                (units >= position.character as usize).then_some(line_end)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> DocumentSnapshot {
        DocumentSnapshot::new(Url::parse("file:///test.cs").unwrap(), text, 1)
    }

    #[test]
    fn positions_round_trip() {
        let doc = doc("int x = 0;\nint y = x;\n");
        let offset = doc.text().find('y').unwrap();

        let pos = doc.position_at(offset, PositionEncoding::Utf16);
        assert_eq!(pos, LspPosition::new(1, 4));
        assert_eq!(doc.offset_at(pos, PositionEncoding::Utf16), Some(offset));
    }

    #[test]
    fn utf16_columns_count_code_units() {
        let doc = doc("var s = \"𝕩\"; s;\n");
        let offset = doc.text().rfind("s;").unwrap();

        let utf16 = doc.position_at(offset, PositionEncoding::Utf16);
        let utf8 = doc.position_at(offset, PositionEncoding::Utf8);
        // The math-letter scalar is four bytes but two UTF-16 units.
        assert_eq!(utf8.character, utf16.character + 2);
        assert_eq!(doc.offset_at(utf16, PositionEncoding::Utf16), Some(offset));
    }

    #[test]
    fn fingerprints_track_content() {
        let a = doc("int x = 0;");
        let b = doc("int x = 0;");
        let c = doc("int x = 1;");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
