//! The slicing engine: place extraction, mutation detection, alias and
//! control-dependence analysis, the dataflow fixpoint and slice composition.

pub mod alias;
pub mod control_flow;
pub mod engine;
pub mod flow;
pub mod global;
pub mod mutation;
pub mod place;
pub mod slice;

pub use alias::{AliasAnalyzer, AliasMap};
pub use control_flow::ControlDependenceAnalysis;
pub use engine::{run_to_fixpoint, FlowAnalysisResults};
pub use flow::{FlowContext, FlowDomain, LocationSet};
pub use global::{AnalysisCache, AnalysisContext, CacheEntry, CacheKey, CacheStats};
pub use mutation::{detect_mutation, detect_mutations, Mutation, MutationKind};
pub use place::{collect_reads, try_create_place};
pub use slice::{
    CrossMethodComposer, NoopCrossMethodComposer, SliceComposer, SliceDirection, SliceEntry,
    SliceOutcome, SliceRelation,
};
