//! The dataflow state and the transfer function.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use tokio_util::sync::CancellationToken;

use crate::error::{AnalysisError, AnalysisResult};
use crate::ir::{Cfg, Place, ProgramLocation};

use super::alias::{AliasAnalyzer, AliasMap};
use super::control_flow::ControlDependenceAnalysis;
use super::mutation::{detect_mutations_at, Mutation};
use super::place::collect_reads;

/// An ordered set of program locations.
///
/// Ordered containers keep the engine's output byte-identical across runs.
pub type LocationSet = BTreeSet<ProgramLocation>;

/// The dataflow state: for each place, the set of locations whose mutations
/// currently contribute to its value.
///
/// Join is componentwise set union; the empty map is bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowDomain {
    deps: BTreeMap<Place, LocationSet>,
}

impl FlowDomain {
    /// The bottom element.
    pub fn bottom() -> Self {
        Self::default()
    }

    /// The contributing locations of a place, if any were recorded.
    pub fn dependencies(&self, place: &Place) -> Option<&LocationSet> {
        self.deps.get(place)
    }

    /// Overwrites a place's dependency set (a strong update).
    pub fn set(&mut self, place: Place, deps: LocationSet) {
        self.deps.insert(place, deps);
    }

    /// Unions locations into a place's dependency set (a weak update).
    pub fn union_into(&mut self, place: Place, deps: &LocationSet) {
        self.deps.entry(place).or_default().extend(deps.iter().copied());
    }

    /// Joins another state into this one. Returns whether anything grew.
    pub fn join(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for (place, deps) in &other.deps {
            let mine = self.deps.entry(place.clone()).or_default();
            let before = mine.len();
            mine.extend(deps.iter().copied());
            changed |= mine.len() != before;
        }
        changed
    }

    /// Iterates the tracked places and their dependency sets, in order.
    pub fn iter(&self) -> impl Iterator<Item = (&Place, &LocationSet)> {
        self.deps.iter()
    }

    /// Whether no place is tracked yet.
    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }
}

/// The per-graph context the transfer function and the engine run against:
/// mutations and reads by location, the alias classes and the control
/// dependence of every block.
pub struct FlowContext<'cfg> {
    cfg: &'cfg Cfg,
    mutations: FxHashMap<ProgramLocation, Vec<Mutation>>,
    reads: FxHashMap<ProgramLocation, Vec<Place>>,
    aliases: AliasMap,
    control: ControlDependenceAnalysis,
    token: CancellationToken,
}

impl<'cfg> FlowContext<'cfg> {
    /// Precomputes every per-location fact the transfer function consumes.
    pub fn prepare(cfg: &'cfg Cfg, token: CancellationToken) -> Self {
        let mut mutations: FxHashMap<ProgramLocation, Vec<Mutation>> = FxHashMap::default();
        let mut reads: FxHashMap<ProgramLocation, Vec<Place>> = FxHashMap::default();
        for loc in cfg.locations() {
            let Some(op) = cfg.operation_at(loc) else {
                continue;
            };
            let found = detect_mutations_at(op, loc);
            if !found.is_empty() {
                mutations.insert(loc, found);
            }
            let read = collect_reads(op);
            if !read.is_empty() {
                reads.insert(loc, read);
            }
        }

        let mut alias_analyzer = AliasAnalyzer::new();
        alias_analyzer.analyze(cfg);
        let aliases = alias_analyzer.export();

        let mut control = ControlDependenceAnalysis::new();
        control.analyze(cfg);

        Self {
            cfg,
            mutations,
            reads,
            aliases,
            control,
            token,
        }
    }

    /// The graph this context was prepared for.
    pub fn cfg(&self) -> &'cfg Cfg {
        self.cfg
    }

    /// The mutations recorded at a location.
    pub fn mutations_at(&self, loc: ProgramLocation) -> &[Mutation] {
        self.mutations.get(&loc).map_or(&[], Vec::as_slice)
    }

    /// The places read at a location.
    pub fn reads_at(&self, loc: ProgramLocation) -> &[Place] {
        self.reads.get(&loc).map_or(&[], Vec::as_slice)
    }

    /// The alias snapshot.
    pub fn aliases(&self) -> &AliasMap {
        &self.aliases
    }

    /// The control-dependence results.
    pub fn control(&self) -> &ControlDependenceAnalysis {
        &self.control
    }

    /// The cancellation token of the owning request.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Dismantles the context into the artifacts worth keeping once the
    /// fixpoint has run.
    #[allow(clippy::type_complexity)]
    pub fn into_parts(
        self,
    ) -> (
        FxHashMap<ProgramLocation, Vec<Mutation>>,
        FxHashMap<ProgramLocation, Vec<Place>>,
        AliasMap,
        ControlDependenceAnalysis,
    ) {
        (self.mutations, self.reads, self.aliases, self.control)
    }

    /// Applies the transfer function at one location.
    ///
    /// The outgoing dependency set of each place written here is the
    /// location itself, its control dependencies, and everything the read
    /// operands (through their aliases) currently depend on. A write whose
    /// target is unambiguous replaces the old set (strong update); an
    /// ambiguous one unions (weak update). Places not written here flow
    /// through unchanged.
    pub fn apply(
        &self,
        in_state: &FlowDomain,
        loc: ProgramLocation,
    ) -> AnalysisResult<FlowDomain> {
        if !self.cfg.contains(loc) {
            return Err(AnalysisError::InvalidState(
                "location is not part of the analyzed graph",
            ));
        }

        let mut out = in_state.clone();
        let mutations = self.mutations_at(loc);
        if mutations.is_empty() {
            return Ok(out);
        }

        let mut deps = LocationSet::new();
        deps.insert(loc);
        deps.extend(self.control.get_control_dependencies(loc));
        for read in self.reads_at(loc) {
            for alias in self.aliases.aliases_of(read) {
                if let Some(upstream) = in_state.dependencies(alias) {
                    deps.extend(upstream.iter().copied());
                }
            }
        }

        for mutation in mutations {
            if self.aliases.ambiguity_of(&mutation.target) <= 1 {
                out.set(mutation.target.clone(), deps.clone());
            } else {
                for target in self.aliases.aliases_of(&mutation.target) {
                    out.union_into(target.clone(), &deps);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CfgBuilder, OpKind, Operation, Symbol, SymbolKind, TypeShape};

    fn local(id: u64, name: &str) -> Symbol {
        Symbol::new(id, name, SymbolKind::Local)
    }

    fn local_ref(sym: &Symbol) -> Operation {
        Operation::new(OpKind::LocalRef).with_symbol(sym.clone())
    }

    fn assign(target: &Symbol, value: Operation) -> Operation {
        Operation::new(OpKind::Assignment).with_children(vec![local_ref(target), value])
    }

    #[test]
    fn locations_without_mutations_are_identity() {
        let x = local(1, "x");
        let mut builder = CfgBuilder::new();
        let b0 = builder.add_block(vec![local_ref(&x)]);
        let cfg = builder.finish(b0, b0);
        let ctx = FlowContext::prepare(&cfg, CancellationToken::new());

        let mut state = FlowDomain::bottom();
        state.set(
            Place::base(x),
            LocationSet::from_iter([ProgramLocation::new(b0, 0)]),
        );

        let out = ctx.apply(&state, ProgramLocation::new(b0, 0)).unwrap();
        assert_eq!(out, state);
    }

    #[test]
    fn writes_capture_reads_and_location() {
        let x = local(1, "x");
        let y = local(2, "y");
        let mut builder = CfgBuilder::new();
        let b0 = builder.add_block(vec![
            assign(&x, Operation::new(OpKind::Literal)),
            assign(&y, local_ref(&x)),
        ]);
        let cfg = builder.finish(b0, b0);
        let ctx = FlowContext::prepare(&cfg, CancellationToken::new());

        let first = ProgramLocation::new(b0, 0);
        let second = ProgramLocation::new(b0, 1);

        let after_first = ctx.apply(&FlowDomain::bottom(), first).unwrap();
        let after_second = ctx.apply(&after_first, second).unwrap();

        assert_eq!(
            after_second.dependencies(&Place::base(y)),
            Some(&LocationSet::from_iter([first, second]))
        );
    }

    #[test]
    fn strong_updates_replace_stale_dependencies() {
        let x = local(1, "x");
        let mut builder = CfgBuilder::new();
        let b0 = builder.add_block(vec![assign(&x, Operation::new(OpKind::Literal))]);
        let cfg = builder.finish(b0, b0);
        let ctx = FlowContext::prepare(&cfg, CancellationToken::new());

        let stale = ProgramLocation::new(b0, 42);
        let mut state = FlowDomain::bottom();
        state.set(Place::base(x.clone()), LocationSet::from_iter([stale]));

        let here = ProgramLocation::new(b0, 0);
        let out = ctx.apply(&state, here).unwrap();
        assert_eq!(
            out.dependencies(&Place::base(x)),
            Some(&LocationSet::from_iter([here]))
        );
    }

    #[test]
    fn aliased_writes_are_weak() {
        let a = local(1, "a").with_ty(TypeShape::Reference);
        let b = local(2, "b").with_ty(TypeShape::Reference);
        let mut builder = CfgBuilder::new();
        let b0 = builder.add_block(vec![
            assign(&b, local_ref(&a)),
            assign(&a, Operation::new(OpKind::Literal)),
        ]);
        let cfg = builder.finish(b0, b0);
        let ctx = FlowContext::prepare(&cfg, CancellationToken::new());

        let stale = ProgramLocation::new(b0, 0);
        let mut state = FlowDomain::bottom();
        state.set(Place::base(b.clone()), LocationSet::from_iter([stale]));

        let here = ProgramLocation::new(b0, 1);
        let out = ctx.apply(&state, here).unwrap();

        // The write to `a` may or may not hit `b`'s storage: old deps stay.
        let b_deps = out.dependencies(&Place::base(b)).unwrap();
        assert!(b_deps.contains(&stale));
        assert!(b_deps.contains(&here));
        // `a` itself is ambiguous too, so it unions rather than replaces.
        assert!(out.dependencies(&Place::base(a)).unwrap().contains(&here));
    }

    #[test]
    fn unknown_locations_are_rejected() {
        let mut builder = CfgBuilder::new();
        let b0 = builder.add_block(vec![]);
        let cfg = builder.finish(b0, b0);
        let ctx = FlowContext::prepare(&cfg, CancellationToken::new());

        let outside = ProgramLocation::new(crate::ir::BlockId(7), 0);
        assert!(matches!(
            ctx.apply(&FlowDomain::bottom(), outside),
            Err(crate::error::AnalysisError::InvalidState(_))
        ));
    }

    #[test]
    fn monotone_on_unmutated_places() {
        let x = local(1, "x");
        let y = local(2, "y");
        let mut builder = CfgBuilder::new();
        let b0 = builder.add_block(vec![assign(&y, local_ref(&x))]);
        let cfg = builder.finish(b0, b0);
        let ctx = FlowContext::prepare(&cfg, CancellationToken::new());

        let mut state = FlowDomain::bottom();
        state.set(
            Place::base(x.clone()),
            LocationSet::from_iter([ProgramLocation::new(b0, 7)]),
        );

        let out = ctx.apply(&state, ProgramLocation::new(b0, 0)).unwrap();
        assert_eq!(
            out.dependencies(&Place::base(x.clone())),
            state.dependencies(&Place::base(x))
        );
    }
}
