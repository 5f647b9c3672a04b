use crate::prelude::*;

/// The `sharpfocus/focus` handler: both slice directions unioned into one
/// set of regions worth keeping visible.
#[derive(Debug, Clone)]
pub struct FocusRequest {
    /// The cursor position.
    pub position: LspPosition,
}

impl SemanticRequest for FocusRequest {
    type Response = FocusResponse;

    fn request(self, ctx: &AnalysisContext) -> AnalysisResult<Option<Self::Response>> {
        let Some(target) = ctx.resolve_focus(self.position) else {
            log::debug!("focus: no place at {:?}", self.position);
            return Ok(None);
        };
        let backward = ctx.slice(&target, SliceDirection::Backward)?;
        let forward = ctx.slice(&target, SliceDirection::Forward)?;
        let union = SliceUnion::compose(ctx, &target, &backward, &forward);

        Ok(Some(FocusResponse {
            focused_place: union.focused_place,
            dependency_ranges: union.ranges,
            dependency_range_details: Some(union.details),
            container_ranges: union.containers,
        }))
    }
}

/// Both directions of a focus, flattened and deduplicated.
pub(crate) struct SliceUnion {
    pub focused_place: FocusedPlaceInfo,
    pub ranges: Vec<LspRange>,
    pub details: Vec<SliceRangeDetail>,
    pub containers: Vec<LspRange>,
}

impl SliceUnion {
    pub(crate) fn compose(
        ctx: &AnalysisContext,
        target: &FocusTarget,
        backward: &SliceOutcome,
        forward: &SliceOutcome,
    ) -> Self {
        let backward_wire = SliceResponse::compose(ctx, target, backward);
        let forward_wire = SliceResponse::compose(ctx, target, forward);

        let mut spans: Vec<Span> = backward
            .entries
            .iter()
            .chain(forward.entries.iter())
            .map(|entry| entry.span.clone())
            .collect();
        spans.push(target.resolution.span.clone());
        spans.sort_by_key(|span| (span.start, span.end));
        spans.dedup();
        let ranges = spans.iter().map(|span| ctx.range(span)).collect();

        // Backward details win on overlap; the forward half fills the rest.
        let mut details: Vec<SliceRangeDetail> =
            backward_wire.slice_range_details.clone().unwrap_or_default();
        for detail in forward_wire.slice_range_details.iter().flatten() {
            if details.iter().all(|seen| seen.range != detail.range) {
                details.push(detail.clone());
            }
        }

        let mut container_spans: Vec<Span> = backward
            .container_spans
            .iter()
            .chain(forward.container_spans.iter())
            .cloned()
            .collect();
        container_spans.sort_by_key(|span| (span.start, span.end));
        container_spans.dedup();
        let containers = container_spans.iter().map(|span| ctx.range(span)).collect();

        Self {
            focused_place: backward_wire.focused_place,
            ranges,
            details,
            containers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::PositionEncoding;
    use crate::testing::{conditional_dependence, span_of};

    #[test]
    fn conditional_dependence_reaches_the_branch() {
        let fixture = conditional_dependence();
        let position = fixture.position_in("int y = x;", "y");
        let ctx = fixture.into_context();

        let response = FocusRequest { position }.request(&ctx).unwrap().unwrap();

        let doc = ctx.doc();
        let range_of = |needle: &str| {
            doc.range_at(&span_of(doc.text(), needle), PositionEncoding::Utf16)
        };
        for needle in ["if (c)", "int x = 0;", "x = 5", "int y = x;"] {
            assert!(
                response.dependency_ranges.contains(&range_of(needle)),
                "missing {needle:?}"
            );
        }
        assert!(response.container_ranges.contains(&range_of("if (c)")));
        assert_eq!(response.focused_place.name, "y");
    }
}
