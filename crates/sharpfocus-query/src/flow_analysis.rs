use crate::prelude::*;

/// The `sharpfocus/flowAnalysis` handler: both directional slices, no union.
#[derive(Debug, Clone)]
pub struct FlowAnalysisRequest {
    /// The cursor position.
    pub position: LspPosition,
}

impl SemanticRequest for FlowAnalysisRequest {
    type Response = FlowAnalysisResponse;

    fn request(self, ctx: &AnalysisContext) -> AnalysisResult<Option<Self::Response>> {
        let Some(target) = ctx.resolve_focus(self.position) else {
            log::debug!("flow analysis: no place at {:?}", self.position);
            return Ok(None);
        };
        let backward = ctx.slice(&target, SliceDirection::Backward)?;
        let forward = ctx.slice(&target, SliceDirection::Forward)?;

        Ok(Some(FlowAnalysisResponse {
            backward_slice: Some(SliceResponse::compose(ctx, &target, &backward)),
            forward_slice: Some(SliceResponse::compose(ctx, &target, &forward)),
        }))
    }
}
