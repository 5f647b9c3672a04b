//! Control dependence via post-dominators.

use std::sync::LazyLock;

use rustc_hash::FxHashSet;

use crate::ir::{BlockId, Cfg, ProgramLocation};

static EMPTY: LazyLock<FxHashSet<BlockId>> = LazyLock::new(FxHashSet::default);

/// Which branches decide whether each block executes.
///
/// Post-dominator sets are computed on the reverse graph by iterative
/// intersection; control dependence then follows the classical rule: for a
/// forward edge `A → B` out of a branching block `A`, every block on `B`'s
/// post-dominator chain below the nearest common post-dominator of `A` and
/// `B` is control-dependent on `A`. Queries before [`analyze`] come back
/// empty, and the entry block never has dependencies.
///
/// [`analyze`]: ControlDependenceAnalysis::analyze
#[derive(Debug, Default)]
pub struct ControlDependenceAnalysis {
    controlling: Vec<FxHashSet<BlockId>>,
    branch_slots: Vec<ProgramLocation>,
}

impl ControlDependenceAnalysis {
    /// Creates an analysis with no results yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the analysis for one graph, replacing prior results.
    pub fn analyze(&mut self, cfg: &Cfg) {
        let block_count = cfg.blocks().len();
        let postdom = compute_post_dominators(cfg);
        let ipdom = immediate_post_dominators(cfg, &postdom);

        self.controlling = vec![FxHashSet::default(); block_count];
        self.branch_slots = cfg
            .blocks()
            .iter()
            .map(|block| block.branch_location())
            .collect();

        for block in cfg.blocks() {
            let a = block.id();
            if cfg.successors(a).count() < 2 {
                continue;
            }
            for b in cfg.successors(a) {
                let Some(join) = nearest_common_post_dominator(a, b, &postdom, &ipdom) else {
                    continue;
                };
                let mut runner = b;
                while runner != join {
                    self.controlling[runner.index()].insert(a);
                    match ipdom[runner.index()] {
                        Some(next) => runner = next,
                        None => break,
                    }
                }
            }
        }

        // The entry executes unconditionally, whatever the edges look like.
        self.controlling[cfg.entry().index()].clear();
    }

    /// The branching blocks whose condition decides whether `block` runs.
    pub fn get_controlling_blocks(&self, block: BlockId) -> &FxHashSet<BlockId> {
        self.controlling.get(block.index()).unwrap_or(&EMPTY)
    }

    /// The branch-slot locations a location is control-dependent on.
    pub fn get_control_dependencies(&self, loc: ProgramLocation) -> FxHashSet<ProgramLocation> {
        self.get_controlling_blocks(loc.block)
            .iter()
            .map(|controller| self.branch_slots[controller.index()])
            .collect()
    }
}

/// Post-dominator sets, indexed by block ordinal. Every set contains the
/// block itself.
fn compute_post_dominators(cfg: &Cfg) -> Vec<FxHashSet<BlockId>> {
    let block_count = cfg.blocks().len();
    let all: FxHashSet<BlockId> = cfg.blocks().iter().map(|block| block.id()).collect();

    let mut postdom = vec![all; block_count];
    postdom[cfg.exit().index()] = FxHashSet::from_iter([cfg.exit()]);

    let mut changed = true;
    while changed {
        changed = false;
        for block in cfg.blocks().iter().rev() {
            let id = block.id();
            if id == cfg.exit() {
                continue;
            }
            let mut new: Option<FxHashSet<BlockId>> = None;
            for succ in cfg.successors(id) {
                new = Some(match new {
                    None => postdom[succ.index()].clone(),
                    Some(acc) => acc
                        .intersection(&postdom[succ.index()])
                        .copied()
                        .collect(),
                });
            }
            let mut new = new.unwrap_or_default();
            new.insert(id);
            if new != postdom[id.index()] {
                postdom[id.index()] = new;
                changed = true;
            }
        }
    }
    postdom
}

/// The parent of each block in the post-dominator tree: the unique strict
/// post-dominator whose own set is one element smaller.
fn immediate_post_dominators(
    cfg: &Cfg,
    postdom: &[FxHashSet<BlockId>],
) -> Vec<Option<BlockId>> {
    cfg.blocks()
        .iter()
        .map(|block| {
            let own = &postdom[block.id().index()];
            own.iter()
                .copied()
                .find(|&p| p != block.id() && postdom[p.index()].len() == own.len() - 1)
        })
        .collect()
}

/// The first node on `b`'s post-dominator chain (itself included) that also
/// post-dominates `a`.
fn nearest_common_post_dominator(
    a: BlockId,
    b: BlockId,
    postdom: &[FxHashSet<BlockId>],
    ipdom: &[Option<BlockId>],
) -> Option<BlockId> {
    let mut runner = Some(b);
    while let Some(node) = runner {
        if postdom[a.index()].contains(&node) {
            return Some(node);
        }
        runner = ipdom[node.index()];
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CfgBuilder, OpKind, Operation};

    /// `entry → cond; cond → then | join; then → join; join → exit`
    fn diamond() -> (Cfg, [BlockId; 4]) {
        let mut builder = CfgBuilder::new();
        let cond = builder.add_block(vec![Operation::new(OpKind::Other)]);
        let then = builder.add_block(vec![Operation::new(OpKind::Other)]);
        let join = builder.add_block(vec![Operation::new(OpKind::Other)]);
        let exit = builder.add_block(vec![]);
        builder.set_branch(cond, Operation::new(OpKind::Other), None);
        builder.set_fallthrough(cond, join);
        builder.set_conditional(cond, then);
        builder.set_fallthrough(then, join);
        builder.set_fallthrough(join, exit);
        (builder.finish(cond, exit), [cond, then, join, exit])
    }

    #[test]
    fn branch_arms_depend_on_their_branch() {
        let (cfg, [cond, then, join, exit]) = diamond();
        let mut analysis = ControlDependenceAnalysis::new();
        analysis.analyze(&cfg);

        assert_eq!(
            analysis.get_controlling_blocks(then),
            &FxHashSet::from_iter([cond])
        );
        assert!(analysis.get_controlling_blocks(join).is_empty());
        assert!(analysis.get_controlling_blocks(exit).is_empty());
        assert!(analysis.get_controlling_blocks(cond).is_empty());
    }

    #[test]
    fn dependencies_point_at_the_branch_slot() {
        let (cfg, [cond, then, ..]) = diamond();
        let mut analysis = ControlDependenceAnalysis::new();
        analysis.analyze(&cfg);

        let deps = analysis.get_control_dependencies(ProgramLocation::new(then, 0));
        assert_eq!(
            deps,
            FxHashSet::from_iter([cfg.block(cond).branch_location()])
        );
    }

    #[test]
    fn loop_bodies_depend_on_the_loop_header() {
        // header → body | exit; body → header
        let mut builder = CfgBuilder::new();
        let header = builder.add_block(vec![]);
        let body = builder.add_block(vec![Operation::new(OpKind::Other)]);
        let exit = builder.add_block(vec![]);
        builder.set_branch(header, Operation::new(OpKind::Other), None);
        builder.set_conditional(header, body);
        builder.set_fallthrough(header, exit);
        builder.set_fallthrough(body, header);
        let cfg = builder.finish(header, exit);

        let mut analysis = ControlDependenceAnalysis::new();
        analysis.analyze(&cfg);

        assert!(analysis.get_controlling_blocks(body).contains(&header));
    }

    #[test]
    fn queries_before_analyze_are_empty() {
        let analysis = ControlDependenceAnalysis::new();
        assert!(analysis.get_controlling_blocks(BlockId(0)).is_empty());
        assert!(analysis
            .get_control_dependencies(ProgramLocation::new(BlockId(0), 0))
            .is_empty());
    }
}
