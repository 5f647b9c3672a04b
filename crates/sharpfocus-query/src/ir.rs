//! The lowered program representation consumed by the slicing engine.
//!
//! The semantic layer (a compiler front end living outside this crate) hands
//! us members whose bodies are already lowered to a control-flow graph of
//! typed operations with resolved symbol references. This module defines that
//! shape: [`Symbol`], [`Place`], [`Operation`], [`BasicBlock`], [`Cfg`] and
//! [`ProgramLocation`].

mod cfg;
mod def;
mod op;

pub use cfg::*;
pub use def::*;
pub use op::*;

/// A half-open byte range into a document's text.
pub type Span = core::ops::Range<usize>;
