//! The boundary to the semantic layer, and cursor resolution over it.
//!
//! Parsing and semantic resolution are consumed as a service: a
//! [`SemanticModel`] produces lowered [`Member`]s for a document, and this
//! module only resolves cursors against what it is handed.

use std::sync::Arc;

use crate::analysis::place::try_create_place;
use crate::ir::{Member, OpKind, Place, ProgramLocation, Span};
use crate::source::DocumentSnapshot;

/// A front end that lowers documents to members with control-flow graphs.
///
/// Implementations own parsing, binding and CFG construction; the engine
/// never looks behind this trait.
pub trait SemanticModel: Send + Sync {
    /// The lowered members of a document, in any order.
    fn members(&self, doc: &DocumentSnapshot) -> Vec<Arc<Member>>;
}

/// A model with no front end bound: every document lowers to no members,
/// so every request answers `null`.
///
/// The server runs on this until an embedder wires a real front end in.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySemanticModel;

impl SemanticModel for EmptySemanticModel {
    fn members(&self, _doc: &DocumentSnapshot) -> Vec<Arc<Member>> {
        Vec::new()
    }
}

/// The member whose body span contains `offset`, preferring the narrowest
/// when bodies nest.
pub fn member_at(members: &[Arc<Member>], offset: usize) -> Option<Arc<Member>> {
    members
        .iter()
        .filter(|member| member.span.start <= offset && offset < member.span.end)
        .min_by_key(|member| member.span.end - member.span.start)
        .cloned()
}

/// A cursor resolved to a place inside one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceResolution {
    /// The resolved place.
    pub place: Place,
    /// The location of the statement the cursor sits in.
    pub location: ProgramLocation,
    /// The span of the resolved occurrence.
    pub span: Span,
}

/// Resolves a byte offset to the place under the cursor.
///
/// Candidates are reference-shaped operations and declarators whose span
/// contains the offset; the narrowest span wins, so an identifier inside a
/// larger statement resolves to the identifier's own place.
pub fn resolve_place_at(member: &Member, offset: usize) -> Option<PlaceResolution> {
    let mut best: Option<(usize, PlaceResolution)> = None;

    for loc in member.cfg.locations() {
        let Some(op) = member.cfg.operation_at(loc) else {
            continue;
        };
        op.walk(&mut |node| {
            let Some(span) = node.span() else {
                return;
            };
            if !(span.start <= offset && offset < span.end) {
                return;
            }
            let place = if node.kind().is_reference() {
                try_create_place(node)
            } else if node.kind() == OpKind::Declarator {
                node.symbol().cloned().map(Place::base)
            } else {
                None
            };
            let Some(place) = place else {
                return;
            };
            let width = span.end - span.start;
            if best.as_ref().is_none_or(|(seen, _)| width <= *seen) {
                best = Some((
                    width,
                    PlaceResolution {
                        place,
                        location: loc,
                        span: span.clone(),
                    },
                ));
            }
        });
    }

    best.map(|(_, resolution)| resolution)
}
