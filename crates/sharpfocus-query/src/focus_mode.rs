use crate::focus::SliceUnion;
use crate::prelude::*;

/// The `sharpfocus/focusMode` handler: the union for fading plus both
/// directional slices for clients that render them apart.
#[derive(Debug, Clone)]
pub struct FocusModeRequest {
    /// The cursor position.
    pub position: LspPosition,
}

impl SemanticRequest for FocusModeRequest {
    type Response = FocusModeResponse;

    fn request(self, ctx: &AnalysisContext) -> AnalysisResult<Option<Self::Response>> {
        let Some(target) = ctx.resolve_focus(self.position) else {
            log::debug!("focus mode: no place at {:?}", self.position);
            return Ok(None);
        };
        let backward = ctx.slice(&target, SliceDirection::Backward)?;
        let forward = ctx.slice(&target, SliceDirection::Forward)?;
        let union = SliceUnion::compose(ctx, &target, &backward, &forward);

        Ok(Some(FocusModeResponse {
            focused_place: union.focused_place,
            relevant_ranges: union.ranges,
            container_ranges: union.containers,
            backward_slice: Some(SliceResponse::compose(ctx, &target, &backward)),
            forward_slice: Some(SliceResponse::compose(ctx, &target, &forward)),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::linear_dependence;

    #[test]
    fn both_directions_ride_along() {
        let fixture = linear_dependence();
        let position = fixture.position_in("int y = input + 1;", "int y");
        let ctx = fixture.into_context();

        let response = FocusModeRequest { position }.request(&ctx).unwrap().unwrap();

        assert!(!response.relevant_ranges.is_empty());
        let backward = response.backward_slice.unwrap();
        let forward = response.forward_slice.unwrap();
        assert_eq!(backward.direction, SliceDirection::Backward);
        assert_eq!(forward.direction, SliceDirection::Forward);
        assert_eq!(backward.focused_place, response.focused_place);
    }
}
