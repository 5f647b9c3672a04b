//! The custom protocol surface: method markers and response shapes.
//!
//! Method strings are part of the wire contract and must not drift.

use lsp_types::{Range as LspRange, TextDocumentPositionParams};
use serde::{Deserialize, Serialize};

use crate::analysis::global::{AnalysisContext, FocusTarget};
use crate::analysis::slice::{SliceDirection, SliceOutcome, SliceRelation};
use crate::ir::Span;

/// The `sharpfocus/focus` request.
pub enum Focus {}

impl lsp_types::request::Request for Focus {
    type Params = TextDocumentPositionParams;
    type Result = Option<FocusResponse>;
    const METHOD: &'static str = "sharpfocus/focus";
}

/// The `sharpfocus/focusMode` request.
pub enum FocusMode {}

impl lsp_types::request::Request for FocusMode {
    type Params = TextDocumentPositionParams;
    type Result = Option<FocusModeResponse>;
    const METHOD: &'static str = "sharpfocus/focusMode";
}

/// The `sharpfocus/flowAnalysis` request.
pub enum FlowAnalysis {}

impl lsp_types::request::Request for FlowAnalysis {
    type Params = TextDocumentPositionParams;
    type Result = Option<FlowAnalysisResponse>;
    const METHOD: &'static str = "sharpfocus/flowAnalysis";
}

/// The `sharpfocus/backwardSlice` request.
pub enum BackwardSlice {}

impl lsp_types::request::Request for BackwardSlice {
    type Params = TextDocumentPositionParams;
    type Result = Option<SliceResponse>;
    const METHOD: &'static str = "sharpfocus/backwardSlice";
}

/// The `sharpfocus/forwardSlice` request.
pub enum ForwardSlice {}

impl lsp_types::request::Request for ForwardSlice {
    type Params = TextDocumentPositionParams;
    type Result = Option<SliceResponse>;
    const METHOD: &'static str = "sharpfocus/forwardSlice";
}

/// The place a request resolved under the cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusedPlaceInfo {
    /// The place's display name.
    pub name: String,
    /// The range of the resolved occurrence.
    pub range: LspRange,
    /// The kind of the place's resolved symbol.
    pub kind: String,
}

impl FocusedPlaceInfo {
    fn compose(ctx: &AnalysisContext, target: &FocusTarget) -> Self {
        Self {
            name: target.resolution.place.display_name().into(),
            range: ctx.range(&target.resolution.span),
            kind: target.resolution.place.resolved_symbol().kind().name().into(),
        }
    }
}

/// One classified region of a slice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceRangeDetail {
    /// The sliced region.
    pub range: LspRange,
    /// The display name of a representative place the region touches.
    pub place: String,
    /// The region's relation to the focused place.
    pub relation: SliceRelation,
    /// The kind of the operation at the region.
    pub operation_kind: String,
    /// An optional human-readable summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// The response of the two directional slice requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SliceResponse {
    /// The slice direction.
    pub direction: SliceDirection,
    /// The focused place.
    pub focused_place: FocusedPlaceInfo,
    /// The sliced regions, deduplicated and source-ordered.
    pub slice_ranges: Vec<LspRange>,
    /// Per-region classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice_range_details: Option<Vec<SliceRangeDetail>>,
    /// Spans of the control structures enclosing the sliced regions.
    pub container_ranges: Vec<LspRange>,
}

impl SliceResponse {
    /// Projects a composed outcome into the wire shape. Backward slices
    /// carry the focused occurrence itself among their ranges.
    pub(crate) fn compose(
        ctx: &AnalysisContext,
        target: &FocusTarget,
        outcome: &SliceOutcome,
    ) -> Self {
        let mut spans: Vec<Span> = outcome
            .entries
            .iter()
            .map(|entry| entry.span.clone())
            .collect();
        if outcome.direction == SliceDirection::Backward {
            spans.push(target.resolution.span.clone());
        }
        spans.sort_by_key(|span| (span.start, span.end));
        spans.dedup();

        let details = outcome
            .entries
            .iter()
            .map(|entry| SliceRangeDetail {
                range: ctx.range(&entry.span),
                place: entry
                    .place
                    .as_ref()
                    .map(|place| place.display_name().into())
                    .unwrap_or_default(),
                relation: entry.relation,
                operation_kind: entry.op_kind.name().into(),
                summary: None,
            })
            .collect();

        Self {
            direction: outcome.direction,
            focused_place: FocusedPlaceInfo::compose(ctx, target),
            slice_ranges: spans.iter().map(|span| ctx.range(span)).collect(),
            slice_range_details: Some(details),
            container_ranges: outcome
                .container_spans
                .iter()
                .map(|span| ctx.range(span))
                .collect(),
        }
    }
}

/// The response of `sharpfocus/focus`: both directions unioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusResponse {
    /// The focused place.
    pub focused_place: FocusedPlaceInfo,
    /// Every region either slice reaches, plus the focus itself.
    pub dependency_ranges: Vec<LspRange>,
    /// Per-region classification, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency_range_details: Option<Vec<SliceRangeDetail>>,
    /// Spans of the control structures enclosing the regions.
    pub container_ranges: Vec<LspRange>,
}

/// The response of `sharpfocus/focusMode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusModeResponse {
    /// The focused place.
    pub focused_place: FocusedPlaceInfo,
    /// Every region to keep highlighted.
    pub relevant_ranges: Vec<LspRange>,
    /// Spans of the control structures enclosing the regions.
    pub container_ranges: Vec<LspRange>,
    /// The backward half, for clients that render directions apart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backward_slice: Option<SliceResponse>,
    /// The forward half.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_slice: Option<SliceResponse>,
}

/// The response of `sharpfocus/flowAnalysis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowAnalysisResponse {
    /// The backward slice, absent when it could not be composed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backward_slice: Option<SliceResponse>,
    /// The forward slice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forward_slice: Option<SliceResponse>,
}

#[cfg(test)]
mod tests {
    use lsp_types::request::Request;

    use super::*;

    #[test]
    fn method_names_are_bit_exact() {
        assert_eq!(Focus::METHOD, "sharpfocus/focus");
        assert_eq!(FocusMode::METHOD, "sharpfocus/focusMode");
        assert_eq!(FlowAnalysis::METHOD, "sharpfocus/flowAnalysis");
        assert_eq!(BackwardSlice::METHOD, "sharpfocus/backwardSlice");
        assert_eq!(ForwardSlice::METHOD, "sharpfocus/forwardSlice");
    }

    #[test]
    fn responses_serialize_camel_case() {
        let response = SliceResponse {
            direction: SliceDirection::Backward,
            focused_place: FocusedPlaceInfo {
                name: "x".into(),
                range: LspRange::default(),
                kind: "local".into(),
            },
            slice_ranges: Vec::new(),
            slice_range_details: None,
            container_ranges: Vec::new(),
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["direction"], "Backward");
        assert!(value.get("focusedPlace").is_some());
        assert!(value.get("sliceRanges").is_some());
        assert!(value.get("containerRanges").is_some());
        assert!(value.get("sliceRangeDetails").is_none());
    }

    #[test]
    fn relations_serialize_as_bare_strings() {
        assert_eq!(
            serde_json::to_value(SliceRelation::Transform).unwrap(),
            "Transform"
        );
        assert_eq!(
            serde_json::to_value(SliceDirection::Forward).unwrap(),
            "Forward"
        );
    }
}
