//! The forward worklist fixpoint.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashSet;

use crate::error::{AnalysisError, AnalysisResult};
use crate::ir::ProgramLocation;

use super::flow::{FlowContext, FlowDomain};

/// The immutable out-state snapshot of one engine run.
///
/// Shared read-only by every slice composed from the same analysis; the
/// ordered map keeps snapshots identical across runs over the same graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowAnalysisResults {
    out: BTreeMap<ProgramLocation, FlowDomain>,
}

impl FlowAnalysisResults {
    /// The out-state at a location.
    pub fn out_state(&self, loc: ProgramLocation) -> Option<&FlowDomain> {
        self.out.get(&loc)
    }

    /// All analyzed locations, in program order.
    pub fn locations(&self) -> impl Iterator<Item = ProgramLocation> + '_ {
        self.out.keys().copied()
    }

    /// The number of analyzed locations.
    pub fn len(&self) -> usize {
        self.out.len()
    }

    /// Whether nothing was analyzed.
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }
}

/// Runs the dataflow fixpoint over the context's graph.
///
/// Forward direction, per-place set-union lattice. Every location starts at
/// bottom; the worklist is seeded with the entry block's first location; a
/// location's in-state is the join of its control-flow predecessors'
/// out-states. The lattice is finite and the transfer monotone, so the loop
/// terminates. The cancellation token is polled between worklist pops.
pub fn run_to_fixpoint(ctx: &FlowContext) -> AnalysisResult<FlowAnalysisResults> {
    let cfg = ctx.cfg();

    let mut out: BTreeMap<ProgramLocation, FlowDomain> = cfg
        .locations()
        .map(|loc| (loc, FlowDomain::bottom()))
        .collect();

    let entry = cfg.entry_location();
    let mut worklist = VecDeque::from([entry]);
    let mut queued = FxHashSet::from_iter([entry]);

    while let Some(loc) = worklist.pop_front() {
        queued.remove(&loc);
        if ctx.token().is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let mut in_state = FlowDomain::bottom();
        for pred in cfg.flow_predecessors(loc) {
            if let Some(pred_out) = out.get(&pred) {
                in_state.join(pred_out);
            }
        }

        let new_out = ctx.apply(&in_state, loc)?;
        if out.get(&loc) != Some(&new_out) {
            out.insert(loc, new_out);
            for succ in cfg.flow_successors(loc) {
                if queued.insert(succ) {
                    worklist.push_back(succ);
                }
            }
        }
    }

    Ok(FlowAnalysisResults { out })
}
