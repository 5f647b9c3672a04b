use crate::prelude::*;

/// The `sharpfocus/backwardSlice` handler: everything that could have
/// influenced the place under the cursor.
#[derive(Debug, Clone)]
pub struct BackwardSliceRequest {
    /// The cursor position.
    pub position: LspPosition,
}

impl SemanticRequest for BackwardSliceRequest {
    type Response = SliceResponse;

    fn request(self, ctx: &AnalysisContext) -> AnalysisResult<Option<Self::Response>> {
        let Some(target) = ctx.resolve_focus(self.position) else {
            log::debug!("backward slice: no place at {:?}", self.position);
            return Ok(None);
        };
        let outcome = ctx.slice(&target, SliceDirection::Backward)?;
        Ok(Some(SliceResponse::compose(ctx, &target, &outcome)))
    }
}
