//! Discovering write events in a control-flow graph.

use crate::ir::{Cfg, OpKind, Operation, Place, ProgramLocation, RefKind, SymbolKind};

use super::place::try_create_place;

/// How a [`Mutation`] writes its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// A simple assignment.
    Assignment,
    /// A compound assignment.
    CompoundAssignment,
    /// An increment.
    Increment,
    /// A decrement.
    Decrement,
    /// Passed by `ref` to a callee that may write through it.
    RefArgument,
    /// Passed by `out` to a callee that will write through it.
    OutArgument,
    /// A declarator initialization; parameters count as initialized at
    /// entry, where the caller's value arrives.
    Initialization,
}

/// A write event at one program location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    /// The written place.
    pub target: Place,
    /// Where the write happens. Writes nested inside a call (ref and out
    /// arguments) are attributed to the call's own location.
    pub location: ProgramLocation,
    /// The write's shape.
    pub kind: MutationKind,
}

impl Mutation {
    /// Always true; mutations model writes only.
    pub fn is_write(&self) -> bool {
        true
    }
}

/// Classifies a single operation node, without descending into children.
pub fn detect_mutation(op: &Operation, location: ProgramLocation) -> Option<Mutation> {
    let (target, kind) = match op.kind() {
        OpKind::Assignment => (try_create_place(op.target()?)?, MutationKind::Assignment),
        OpKind::CompoundAssignment => (
            try_create_place(op.target()?)?,
            MutationKind::CompoundAssignment,
        ),
        OpKind::Increment => (try_create_place(op.target()?)?, MutationKind::Increment),
        OpKind::Decrement => (try_create_place(op.target()?)?, MutationKind::Decrement),
        OpKind::Argument(RefKind::Ref) => {
            (try_create_place(op.value()?)?, MutationKind::RefArgument)
        }
        OpKind::Argument(RefKind::Out) => {
            (try_create_place(op.value()?)?, MutationKind::OutArgument)
        }
        OpKind::Declarator => {
            let symbol = op.symbol()?.clone();
            if op.value().is_none() && symbol.kind() != SymbolKind::Parameter {
                return None;
            }
            (Place::base(symbol), MutationKind::Initialization)
        }
        _ => return None,
    };
    Some(Mutation {
        target,
        location,
        kind,
    })
}

/// Collects every mutation under one statement-level operation, attributed
/// to that statement's location.
pub fn detect_mutations_at(op: &Operation, location: ProgramLocation) -> Vec<Mutation> {
    let mut mutations = Vec::new();
    op.walk(&mut |node| {
        if let Some(mutation) = detect_mutation(node, location) {
            mutations.push(mutation);
        }
    });
    mutations
}

/// Scans a whole graph for write events, in program order.
pub fn detect_mutations(cfg: &Cfg) -> Vec<Mutation> {
    cfg.locations()
        .filter_map(|loc| cfg.operation_at(loc).map(|op| (loc, op)))
        .flat_map(|(loc, op)| detect_mutations_at(op, loc))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BlockId, CfgBuilder, Symbol};

    fn local(id: u64, name: &str) -> Symbol {
        Symbol::new(id, name, SymbolKind::Local)
    }

    fn local_ref(sym: &Symbol) -> Operation {
        Operation::new(OpKind::LocalRef).with_symbol(sym.clone())
    }

    fn loc(block: u32, index: u32) -> ProgramLocation {
        ProgramLocation::new(BlockId(block), index)
    }

    #[test]
    fn assignment_shapes_classify() {
        let x = local(1, "x");
        let v = local(2, "v");

        let simple = Operation::new(OpKind::Assignment)
            .with_children(vec![local_ref(&x), local_ref(&v)]);
        let compound = Operation::new(OpKind::CompoundAssignment)
            .with_children(vec![local_ref(&x), local_ref(&v)]);
        let increment = Operation::new(OpKind::Increment).with_children(vec![local_ref(&x)]);

        let cases = [
            (&simple, MutationKind::Assignment),
            (&compound, MutationKind::CompoundAssignment),
            (&increment, MutationKind::Increment),
        ];
        for (op, kind) in cases {
            let mutation = detect_mutation(op, loc(0, 0)).unwrap();
            assert_eq!(mutation.kind, kind);
            assert_eq!(mutation.target, Place::base(x.clone()));
            assert!(mutation.is_write());
        }
    }

    #[test]
    fn declarators_initialize_when_they_have_a_value() {
        let y = local(1, "y");
        let with_init = Operation::new(OpKind::Declarator)
            .with_symbol(y.clone())
            .with_children(vec![Operation::new(OpKind::Literal)]);
        let without = Operation::new(OpKind::Declarator).with_symbol(y.clone());

        assert_eq!(
            detect_mutation(&with_init, loc(0, 0)).map(|m| m.kind),
            Some(MutationKind::Initialization)
        );
        assert_eq!(detect_mutation(&without, loc(0, 0)), None);
    }

    #[test]
    fn parameters_initialize_at_their_declarator() {
        let p = Symbol::new(1, "input", SymbolKind::Parameter);
        let decl = Operation::new(OpKind::Declarator).with_symbol(p.clone());

        let mutation = detect_mutation(&decl, loc(0, 0)).unwrap();
        assert_eq!(mutation.kind, MutationKind::Initialization);
        assert_eq!(mutation.target, Place::base(p));
    }

    #[test]
    fn nested_ref_arguments_land_on_the_call_location() {
        let x = local(1, "x");
        let y = local(2, "y");
        let call = Operation::new(OpKind::Invocation).with_children(vec![
            Operation::new(OpKind::Argument(RefKind::Ref)).with_children(vec![local_ref(&x)]),
            Operation::new(OpKind::Argument(RefKind::Out)).with_children(vec![local_ref(&y)]),
            Operation::new(OpKind::Argument(RefKind::Value)).with_children(vec![local_ref(&x)]),
        ]);

        let mut builder = CfgBuilder::new();
        let b0 = builder.add_block(vec![Operation::new(OpKind::Other), call]);
        let cfg = builder.finish(b0, b0);

        let mutations = detect_mutations(&cfg);
        assert_eq!(mutations.len(), 2);
        assert!(mutations
            .iter()
            .all(|m| m.location == ProgramLocation::new(b0, 1)));
        assert_eq!(mutations[0].kind, MutationKind::RefArgument);
        assert_eq!(mutations[1].kind, MutationKind::OutArgument);
    }

    #[test]
    fn discarded_targets_emit_nothing() {
        let v = local(1, "v");
        let assign = Operation::new(OpKind::Assignment)
            .with_children(vec![Operation::new(OpKind::Other), local_ref(&v)]);
        assert_eq!(detect_mutation(&assign, loc(0, 0)), None);
    }
}
