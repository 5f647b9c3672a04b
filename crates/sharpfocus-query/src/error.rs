//! Analysis failure kinds.
//!
//! Not-applicable conditions (cursor not on a place, unknown member, empty
//! graph) are expressed as `Option::None` by the request layer and never
//! reach this type.

use thiserror::Error;

/// A failure inside the analysis engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The request's cancellation token fired; partial state was discarded.
    #[error("analysis cancelled")]
    Cancelled,
    /// A contract of the engine was violated by the caller.
    #[error("invalid analysis state: {0}")]
    InvalidState(&'static str),
}

/// The result type of engine entry points.
pub type AnalysisResult<T> = Result<T, AnalysisError>;
