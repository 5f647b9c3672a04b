//! Composing slices from analysis results.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{AnalysisError, AnalysisResult};
use crate::ir::{Cfg, OpKind, Place, ProgramLocation, Span};

use super::control_flow::ControlDependenceAnalysis;
use super::engine::FlowAnalysisResults;
use super::global::CacheEntry;

/// The direction of a slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceDirection {
    /// What could have influenced the focused place.
    Backward,
    /// What the focused place could influence.
    Forward,
}

/// How a sliced location relates to the focused place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceRelation {
    /// Contributes a value.
    Source,
    /// Reads and writes tracked state.
    Transform,
    /// Consumes a value.
    Sink,
}

/// One location of a slice, projected back to source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceEntry {
    /// The sliced location.
    pub location: ProgramLocation,
    /// The source span of the operation at that location.
    pub span: Span,
    /// The location's relation to the focus.
    pub relation: SliceRelation,
    /// The kind of the operation at that location.
    pub op_kind: OpKind,
    /// A representative place the location touches, for display.
    pub place: Option<Place>,
}

/// A composed slice: deduplicated, source-ordered entries plus the spans of
/// the control structures enclosing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceOutcome {
    /// The slice direction.
    pub direction: SliceDirection,
    /// The sliced regions, ordered by source position.
    pub entries: Vec<SliceEntry>,
    /// Spans of `if`/loop/`switch` heads whose branches decide the sliced
    /// regions; drives the client's structural fade.
    pub container_spans: Vec<Span>,
}

/// A hook for composing slices across member boundaries.
///
/// Cross-method slicing is out of scope; the hook point is where class-level
/// field summaries would extend an intra-member outcome.
pub trait CrossMethodComposer: Send + Sync {
    /// Extends an intra-member outcome with cross-member regions.
    fn extend(&self, outcome: &mut SliceOutcome, focus: &Place) {
        let _ = (outcome, focus);
    }
}

/// The default composer: leaves every outcome untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCrossMethodComposer;

impl CrossMethodComposer for NoopCrossMethodComposer {}

/// Projects analysis results back into ranked source regions.
pub struct SliceComposer<'a> {
    cfg: &'a Cfg,
    entry: &'a CacheEntry,
    control: &'a ControlDependenceAnalysis,
    token: &'a CancellationToken,
}

impl<'a> SliceComposer<'a> {
    /// Creates a composer over one member's analysis artifacts.
    pub fn new(
        cfg: &'a Cfg,
        entry: &'a CacheEntry,
        control: &'a ControlDependenceAnalysis,
        token: &'a CancellationToken,
    ) -> Self {
        Self {
            cfg,
            entry,
            control,
            token,
        }
    }

    fn results(&self) -> &FlowAnalysisResults {
        &self.entry.results
    }

    fn checkpoint(&self) -> AnalysisResult<()> {
        if self.token.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        Ok(())
    }

    /// The regions that could have influenced `place` as of `focus`.
    pub fn backward(
        &self,
        focus: ProgramLocation,
        place: &Place,
    ) -> AnalysisResult<SliceOutcome> {
        let mut sliced: BTreeSet<ProgramLocation> = BTreeSet::new();
        let mut frontier: Vec<ProgramLocation> = Vec::new();

        if let Some(out) = self.results().out_state(focus) {
            for alias in self.entry.aliases.aliases_of(place) {
                if let Some(deps) = out.dependencies(alias) {
                    for &loc in deps {
                        if sliced.insert(loc) {
                            frontier.push(loc);
                        }
                    }
                }
            }
        }

        // Follow the writers of everything the sliced locations read.
        while let Some(loc) = frontier.pop() {
            self.checkpoint()?;
            let Some(out) = self.results().out_state(loc) else {
                continue;
            };
            for read in self.entry.reads_at(loc) {
                for alias in self.entry.aliases.aliases_of(read) {
                    let Some(deps) = out.dependencies(alias) else {
                        continue;
                    };
                    for &upstream in deps {
                        if sliced.insert(upstream) {
                            frontier.push(upstream);
                        }
                    }
                }
            }
        }

        Ok(self.compose(SliceDirection::Backward, sliced))
    }

    /// The regions whose behaviour `place` could influence from `focus` on.
    pub fn forward(
        &self,
        focus: ProgramLocation,
        place: &Place,
    ) -> AnalysisResult<SliceOutcome> {
        let mut focus_places: BTreeSet<Place> = BTreeSet::new();
        focus_places.insert(place.clone());
        for alias in self.entry.aliases.aliases_of(place) {
            focus_places.insert(alias.clone());
        }

        // The writes whose values the taint flows out of: the focus itself,
        // plus the writers of the focused place that reach the focus
        // occurrence. Reads downstream observe tainted values only through
        // one of these locations, so the set doubles as the tracked place
        // set of the iteration.
        let mut tainted_writes: BTreeSet<ProgramLocation> = BTreeSet::new();
        tainted_writes.insert(focus);
        if let Some(out) = self.results().out_state(focus) {
            for alias in self.entry.aliases.aliases_of(place) {
                for &dep in out.dependencies(alias).into_iter().flatten() {
                    let writes_focus = self
                        .entry
                        .mutations_at(dep)
                        .iter()
                        .any(|mutation| focus_places.contains(&mutation.target));
                    if writes_focus {
                        tainted_writes.insert(dep);
                    }
                }
            }
        }

        let mut sliced: BTreeSet<ProgramLocation> = BTreeSet::new();
        loop {
            self.checkpoint()?;
            let mut changed = false;

            for loc in self.results().locations() {
                if sliced.contains(&loc) {
                    continue;
                }
                let reads_tainted = self.entry.reads_at(loc).iter().any(|read| {
                    self.entry.aliases.aliases_of(read).any(|alias| {
                        self.results()
                            .out_state(loc)
                            .and_then(|out| out.dependencies(alias))
                            .is_some_and(|deps| !deps.is_disjoint(&tainted_writes))
                    })
                });
                let control_tainted = self
                    .control
                    .get_control_dependencies(loc)
                    .iter()
                    .any(|dep| sliced.contains(dep));
                if !(reads_tainted || control_tainted) {
                    continue;
                }

                sliced.insert(loc);
                changed = true;
                if !self.entry.mutations_at(loc).is_empty() {
                    tainted_writes.insert(loc);
                }
            }

            if !changed {
                break;
            }
        }

        Ok(self.compose(SliceDirection::Forward, sliced))
    }

    /// Builds the ordered, deduplicated outcome for a set of locations.
    fn compose(
        &self,
        direction: SliceDirection,
        locations: BTreeSet<ProgramLocation>,
    ) -> SliceOutcome {
        let mut entries: Vec<SliceEntry> = Vec::new();
        let mut containers: BTreeSet<(usize, usize)> = BTreeSet::new();

        for &loc in &locations {
            if !self.cfg.contains(loc) {
                continue;
            }
            for controller in self.control.get_controlling_blocks(loc.block) {
                let block = self.cfg.block(*controller);
                if let Some(span) = block.syntax_span().or_else(|| {
                    block.branch_value().and_then(|value| value.span())
                }) {
                    containers.insert((span.start, span.end));
                }
            }

            let Some(op) = self.cfg.operation_at(loc) else {
                continue;
            };
            let Some(span) = op.span() else {
                continue;
            };

            let reads = !self.entry.reads_at(loc).is_empty();
            let writes = !self.entry.mutations_at(loc).is_empty();
            let relation = match (reads, writes, direction) {
                (true, true, _) => SliceRelation::Transform,
                (_, false, SliceDirection::Backward) => SliceRelation::Source,
                (_, false, SliceDirection::Forward) => SliceRelation::Sink,
                (false, true, SliceDirection::Backward) => SliceRelation::Sink,
                (false, true, SliceDirection::Forward) => SliceRelation::Source,
            };

            let place = self
                .entry
                .mutations_at(loc)
                .first()
                .map(|mutation| mutation.target.clone())
                .or_else(|| self.entry.reads_at(loc).first().cloned());

            entries.push(SliceEntry {
                location: loc,
                span: span.clone(),
                relation,
                op_kind: op.kind(),
                place,
            });
        }

        entries.sort_by_key(|entry| (entry.span.start, entry.span.end, entry.location));
        entries.dedup_by(|a, b| a.span == b.span);

        SliceOutcome {
            direction,
            entries,
            container_spans: containers.into_iter().map(|(start, end)| start..end).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::testing::{conditional_dependence, field_accessors};

    #[test]
    fn mutations_round_trip_into_their_backward_slice() {
        let fixture = conditional_dependence();
        let member = fixture.members()[0].clone();
        let ctx = fixture.into_context();
        let (entry, control) = ctx.analyze_member(&member).unwrap();
        let token = CancellationToken::new();
        let composer = SliceComposer::new(&member.cfg, &entry, &control, &token);

        let mutations: Vec<_> = entry.mutations.values().flatten().cloned().collect();
        assert!(!mutations.is_empty());
        for mutation in mutations {
            let outcome = composer
                .backward(mutation.location, &mutation.target)
                .unwrap();
            assert!(
                outcome
                    .entries
                    .iter()
                    .any(|entry| entry.location == mutation.location),
                "{mutation:?} lost its own write"
            );
        }
    }

    #[test]
    fn containers_carry_the_branch_head() {
        let fixture = conditional_dependence();
        let member = fixture.members()[0].clone();
        let if_head = crate::testing::span_of(fixture.doc().text(), "if (c)");
        let ctx = fixture.into_context();
        let (entry, control) = ctx.analyze_member(&member).unwrap();
        let token = CancellationToken::new();
        let composer = SliceComposer::new(&member.cfg, &entry, &control, &token);

        // The guarded write sits inside the `if`; its slice names the head.
        let guarded = entry
            .mutations
            .values()
            .flatten()
            .find(|m| m.kind == crate::analysis::mutation::MutationKind::Assignment)
            .cloned()
            .unwrap();
        let outcome = composer.backward(guarded.location, &guarded.target).unwrap();
        assert!(outcome.container_spans.contains(&if_head));
    }

    #[test]
    fn cancelled_composition_is_reported() {
        let fixture = conditional_dependence();
        let member = fixture.members()[0].clone();
        let ctx = fixture.into_context();
        let (entry, control) = ctx.analyze_member(&member).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let composer = SliceComposer::new(&member.cfg, &entry, &control, &token);
        let place = entry.mutations.values().flatten().next().unwrap().target.clone();
        assert_eq!(
            composer.forward(member.cfg.entry_location(), &place),
            Err(AnalysisError::Cancelled)
        );
    }

    #[test]
    fn cross_method_hook_defaults_to_identity() {
        let fixture = field_accessors();
        let get = fixture
            .members()
            .iter()
            .find(|member| member.name == "Get")
            .cloned()
            .unwrap();
        let ctx = fixture.into_context();
        let (entry, control) = ctx.analyze_member(&get).unwrap();
        let token = CancellationToken::new();
        let composer = SliceComposer::new(&get.cfg, &entry, &control, &token);

        // `f` is only read inside Get; without cross-member composition the
        // backward slice stays empty.
        let f_place = entry.reads.values().flatten().next().cloned().unwrap();
        let focus = get.cfg.entry_location();
        let mut outcome = composer.backward(focus, &f_place).unwrap();
        assert!(outcome.entries.is_empty());

        NoopCrossMethodComposer.extend(&mut outcome, &f_place);
        assert!(outcome.entries.is_empty());
    }
}
