//! # sharpfocus-query
//!
//! Program-slicing queries over lowered member bodies. For a cursor
//! position this crate resolves a *place* (base symbol plus projection
//! path) and computes:
//!
//! - the **backward slice**: source regions that could have influenced the
//!   place's current value, and
//! - the **forward slice**: source regions the place could influence.
//!
//! The analysis is intra-procedural: a forward dataflow fixpoint over the
//! member's control-flow graph, combining mutation detection, a
//! flow-insensitive may-alias approximation and control dependence. Parsing
//! and semantic resolution live behind [`semantics::SemanticModel`]; the
//! transport lives in the `sharpfocus` server crate.

pub mod analysis;
pub mod ir;
pub mod lsp_features;
pub mod semantics;
pub mod source;
pub mod testing;

mod error;
mod prelude;

mod backward_slice;
pub use backward_slice::*;
mod forward_slice;
pub use forward_slice::*;
mod flow_analysis;
pub use flow_analysis::*;
mod focus;
pub use focus::FocusRequest;
mod focus_mode;
pub use focus_mode::*;

pub use analysis::global::{AnalysisCache, AnalysisContext, CacheStats};
pub use error::{AnalysisError, AnalysisResult};
pub use lsp_features::*;
pub use source::{DocumentSnapshot, PositionEncoding};

/// A request handler over one analysis context.
///
/// `Ok(None)` is the not-applicable answer (no place under the cursor, no
/// member, empty graph) and becomes a JSON `null` at the wire; `Err` carries
/// cancellation and programmer errors.
pub trait SemanticRequest {
    /// The response type of the request.
    type Response;

    /// Answers the request against the given context.
    fn request(
        self,
        ctx: &analysis::global::AnalysisContext,
    ) -> AnalysisResult<Option<Self::Response>>;
}
