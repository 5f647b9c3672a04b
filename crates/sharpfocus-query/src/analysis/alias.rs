//! Flow-insensitive may-alias analysis over places.
//!
//! A union-find over every place the member mentions, seeded by
//! reference-typed assignments and by-reference call arguments. The result
//! over-approximates: two places in one class *may* share storage in some
//! execution, which is all slice soundness needs. Value-typed assignments
//! never union, since value storage cannot be shared.

use std::sync::Arc;

use ena::unify::{InPlaceUnificationTable, UnifyKey};
use rustc_hash::FxHashMap;

use crate::ir::{Cfg, OpKind, Operation, Place, RefKind, TypeShape};

use super::place::try_create_place;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PlaceVar(u32);

impl UnifyKey for PlaceVar {
    type Value = ();

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        Self(u)
    }

    fn tag() -> &'static str {
        "PlaceVar"
    }
}

/// The union-find builder. [`export`](AliasAnalyzer::export) freezes it into
/// an [`AliasMap`] snapshot for caching.
pub struct AliasAnalyzer {
    table: InPlaceUnificationTable<PlaceVar>,
    vars: FxHashMap<Place, PlaceVar>,
    places: Vec<Place>,
}

impl Default for AliasAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl AliasAnalyzer {
    /// Creates an empty analyzer.
    pub fn new() -> Self {
        Self {
            table: InPlaceUnificationTable::new(),
            vars: FxHashMap::default(),
            places: Vec::new(),
        }
    }

    /// Seeds the analyzer from every operation of a graph.
    pub fn analyze(&mut self, cfg: &Cfg) {
        for loc in cfg.locations() {
            if let Some(op) = cfg.operation_at(loc) {
                op.walk(&mut |node| self.seed(node));
            }
        }
    }

    fn seed(&mut self, op: &Operation) {
        if op.kind().is_reference() {
            if let Some(place) = try_create_place(op) {
                self.var(place);
            }
        }
        match op.kind() {
            OpKind::Assignment => {
                let target = op.target().and_then(try_create_place);
                let value = op.value().and_then(try_create_place);
                if let (Some(target), Some(value)) = (target, value) {
                    self.union_references(target, value);
                }
            }
            OpKind::Declarator => {
                let declared = op.symbol().cloned().map(Place::base);
                let value = op.value().and_then(try_create_place);
                if let (Some(declared), Some(value)) = (declared, value) {
                    self.union_references(declared, value);
                }
            }
            OpKind::Invocation => {
                // A callee holding two by-reference arguments may alias them.
                let by_ref: Vec<Place> = op
                    .children()
                    .iter()
                    .filter(|arg| {
                        matches!(
                            arg.kind(),
                            OpKind::Argument(RefKind::Ref) | OpKind::Argument(RefKind::Out)
                        )
                    })
                    .filter_map(|arg| arg.value().and_then(try_create_place))
                    .collect();
                for pair in by_ref.windows(2) {
                    let (a, b) = (self.var(pair[0].clone()), self.var(pair[1].clone()));
                    self.table.union(a, b);
                }
            }
            _ => {}
        }
    }

    fn union_references(&mut self, a: Place, b: Place) {
        if a.ty() != TypeShape::Reference || b.ty() != TypeShape::Reference {
            return;
        }
        let (a, b) = (self.var(a), self.var(b));
        self.table.union(a, b);
    }

    fn var(&mut self, place: Place) -> PlaceVar {
        if let Some(&var) = self.vars.get(&place) {
            return var;
        }
        let var = self.table.new_key(());
        debug_assert_eq!(var.index() as usize, self.places.len());
        self.places.push(place.clone());
        self.vars.insert(place, var);
        var
    }

    /// Whether two places may share storage.
    pub fn are_aliased(&mut self, a: &Place, b: &Place) -> bool {
        if a == b {
            return true;
        }
        match (self.vars.get(a).copied(), self.vars.get(b).copied()) {
            (Some(a), Some(b)) => self.table.unioned(a, b),
            _ => false,
        }
    }

    /// The equivalence class of a place, itself included. Unknown places are
    /// their own singleton class.
    pub fn get_aliases(&mut self, place: &Place) -> Vec<Place> {
        let Some(&var) = self.vars.get(place) else {
            return vec![place.clone()];
        };
        let root = self.table.find(var);
        let mut class: Vec<Place> = (0..self.places.len() as u32)
            .filter(|&index| self.table.find(PlaceVar(index)) == root)
            .map(|index| self.places[index as usize].clone())
            .collect();
        class.sort();
        class
    }

    /// Freezes the current classes into a shareable snapshot.
    pub fn export(&mut self) -> AliasMap {
        let mut by_root: FxHashMap<PlaceVar, Vec<Place>> = FxHashMap::default();
        for index in 0..self.places.len() as u32 {
            let root = self.table.find(PlaceVar(index));
            by_root
                .entry(root)
                .or_default()
                .push(self.places[index as usize].clone());
        }

        let mut classes = FxHashMap::default();
        for (_, mut members) in by_root {
            members.sort();
            let class: Arc<[Place]> = members.clone().into();
            for member in members {
                classes.insert(member, class.clone());
            }
        }
        AliasMap { classes }
    }
}

/// An immutable snapshot of may-alias classes, shared through the analysis
/// cache.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    classes: FxHashMap<Place, Arc<[Place]>>,
}

impl AliasMap {
    /// The stored class of a place, absent for places never seen.
    pub fn class_of(&self, place: &Place) -> Option<&Arc<[Place]>> {
        self.classes.get(place)
    }

    /// The aliases of a place, itself included; unknown places yield
    /// themselves.
    pub fn aliases_of<'a>(&'a self, place: &'a Place) -> impl Iterator<Item = &'a Place> {
        match self.classes.get(place) {
            Some(class) => itertools::Either::Left(class.iter()),
            None => itertools::Either::Right(std::iter::once(place)),
        }
    }

    /// The number of distinct storage targets a write to `place` may reach.
    pub fn ambiguity_of(&self, place: &Place) -> usize {
        self.classes.get(place).map_or(1, |class| class.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CfgBuilder, Symbol, SymbolKind};

    fn reference_local(id: u64, name: &str) -> Symbol {
        Symbol::new(id, name, SymbolKind::Local).with_ty(TypeShape::Reference)
    }

    fn value_local(id: u64, name: &str) -> Symbol {
        Symbol::new(id, name, SymbolKind::Local)
    }

    fn local_ref(sym: &Symbol) -> Operation {
        Operation::new(OpKind::LocalRef).with_symbol(sym.clone())
    }

    fn declare(sym: &Symbol, value: Operation) -> Operation {
        Operation::new(OpKind::Declarator)
            .with_symbol(sym.clone())
            .with_children(vec![value])
    }

    fn analyze(ops: Vec<Operation>) -> AliasAnalyzer {
        let mut builder = CfgBuilder::new();
        let b0 = builder.add_block(ops);
        let cfg = builder.finish(b0, b0);
        let mut analyzer = AliasAnalyzer::new();
        analyzer.analyze(&cfg);
        analyzer
    }

    #[test]
    fn reference_chains_are_transitive() {
        let a = reference_local(1, "a");
        let b = reference_local(2, "b");
        let c = reference_local(3, "c");

        let mut analyzer = analyze(vec![
            declare(&a, Operation::new(OpKind::ObjectCreation)),
            declare(&b, local_ref(&a)),
            declare(&c, local_ref(&b)),
        ]);

        let (pa, pc) = (Place::base(a), Place::base(c));
        assert!(analyzer.are_aliased(&pa, &pc));
        assert!(analyzer.are_aliased(&pc, &pa));
        assert_eq!(analyzer.get_aliases(&pa).len(), 3);
    }

    #[test]
    fn value_assignments_never_union() {
        let a = value_local(1, "a");
        let b = value_local(2, "b");
        let c = value_local(3, "c");

        let mut analyzer = analyze(vec![
            declare(&a, Operation::new(OpKind::Literal)),
            declare(&b, local_ref(&a)),
            declare(&c, local_ref(&b)),
        ]);

        let (pa, pc) = (Place::base(a), Place::base(c));
        assert!(!analyzer.are_aliased(&pa, &pc));
        assert_eq!(analyzer.get_aliases(&pa), vec![pa]);
    }

    #[test]
    fn by_ref_call_arguments_union_pairwise() {
        let x = value_local(1, "x");
        let y = value_local(2, "y");

        let call = Operation::new(OpKind::Invocation).with_children(vec![
            Operation::new(OpKind::Argument(RefKind::Ref)).with_children(vec![local_ref(&x)]),
            Operation::new(OpKind::Argument(RefKind::Out)).with_children(vec![local_ref(&y)]),
        ]);
        let mut analyzer = analyze(vec![call]);

        assert!(analyzer.are_aliased(&Place::base(x), &Place::base(y)));
    }

    #[test]
    fn unknown_places_are_their_own_class() {
        let mut analyzer = AliasAnalyzer::new();
        let ghost = Place::base(value_local(9, "ghost"));
        assert_eq!(analyzer.get_aliases(&ghost), vec![ghost.clone()]);
        assert!(analyzer.are_aliased(&ghost, &ghost));
    }

    #[test]
    fn exported_classes_cover_every_member() {
        let a = reference_local(1, "a");
        let b = reference_local(2, "b");

        let mut analyzer = analyze(vec![declare(&b, local_ref(&a))]);
        let map = analyzer.export();

        let (pa, pb) = (Place::base(a), Place::base(b));
        let class = map.class_of(&pa).unwrap();
        assert_eq!(class.len(), 2);
        assert_eq!(map.class_of(&pb).unwrap().as_ref(), class.as_ref());
        assert_eq!(map.ambiguity_of(&pa), 2);
    }
}
