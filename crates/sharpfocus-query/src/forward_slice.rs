use crate::prelude::*;

/// The `sharpfocus/forwardSlice` handler: everything the place under the
/// cursor could influence.
#[derive(Debug, Clone)]
pub struct ForwardSliceRequest {
    /// The cursor position.
    pub position: LspPosition,
}

impl SemanticRequest for ForwardSliceRequest {
    type Response = SliceResponse;

    fn request(self, ctx: &AnalysisContext) -> AnalysisResult<Option<Self::Response>> {
        let Some(target) = ctx.resolve_focus(self.position) else {
            log::debug!("forward slice: no place at {:?}", self.position);
            return Ok(None);
        };
        let outcome = ctx.slice(&target, SliceDirection::Forward)?;
        Ok(Some(SliceResponse::compose(ctx, &target, &outcome)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::slice::SliceRelation;
    use crate::source::PositionEncoding;
    use crate::testing::{conditional_dependence, linear_dependence, span_of};

    #[test]
    fn parameters_flow_to_their_uses() {
        let fixture = linear_dependence();
        let position = fixture.position_in("int input", "input");
        let ctx = fixture.into_context();

        let response = ForwardSliceRequest { position }
            .request(&ctx)
            .unwrap()
            .unwrap();

        assert_eq!(response.direction, SliceDirection::Forward);
        let doc = ctx.doc();
        let range_of = |needle: &str| {
            doc.range_at(&span_of(doc.text(), needle), PositionEncoding::Utf16)
        };
        let details = response.slice_range_details.unwrap();
        let relation_of = |needle: &str| {
            details
                .iter()
                .find(|detail| detail.range == range_of(needle))
                .map(|detail| detail.relation)
        };
        assert_eq!(
            relation_of("int y = input + 1;"),
            Some(SliceRelation::Transform)
        );
        assert_eq!(
            relation_of("int z = y * 2;"),
            Some(SliceRelation::Transform)
        );
        assert_eq!(relation_of("return z;"), Some(SliceRelation::Sink));
    }

    #[test]
    fn branches_taint_their_arms() {
        let fixture = conditional_dependence();
        let position = fixture.position_in("bool c", "c");
        let ctx = fixture.into_context();

        let response = ForwardSliceRequest { position }
            .request(&ctx)
            .unwrap()
            .unwrap();

        let doc = ctx.doc();
        let range_of = |needle: &str| {
            doc.range_at(&span_of(doc.text(), needle), PositionEncoding::Utf16)
        };
        // The branch reads `c`; the guarded write is control-dependent on it.
        assert!(response.slice_ranges.contains(&range_of("if (c)")));
        assert!(response.slice_ranges.contains(&range_of("x = 5")));
    }

    #[test]
    fn focusing_a_read_still_flows_downstream() {
        let fixture = conditional_dependence();
        let position = fixture.position_in("int y = x;", "x");
        let ctx = fixture.into_context();

        let response = ForwardSliceRequest { position }
            .request(&ctx)
            .unwrap()
            .unwrap();

        let doc = ctx.doc();
        let use_site = doc.range_at(
            &span_of(doc.text(), "int y = x;"),
            PositionEncoding::Utf16,
        );
        assert!(response.slice_ranges.contains(&use_site));
    }
}
