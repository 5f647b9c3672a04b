//! Shared imports of the request modules.

pub use std::sync::Arc;

pub use lsp_types::{Position as LspPosition, Range as LspRange, Url};

pub use crate::analysis::global::{AnalysisContext, FocusTarget};
pub use crate::analysis::slice::{SliceDirection, SliceOutcome};
pub use crate::error::{AnalysisError, AnalysisResult};
pub use crate::ir::Span;
pub use crate::lsp_features::{
    FlowAnalysisResponse, FocusModeResponse, FocusResponse, FocusedPlaceInfo, SliceRangeDetail,
    SliceResponse,
};
pub use crate::SemanticRequest;
