//! Mapping operations to canonical places.

use crate::ir::{AccessStep, OpKind, Operation, Place, RefKind};

/// Returns the canonical [`Place`] of a reference-shaped operation.
///
/// Local and parameter references name their symbol directly; static member
/// references and `this.M` references collapse to the member symbol; other
/// instance member references recurse through the receiver and append a
/// projection step. Array element references return the array's place
/// unchanged: element indices are erased, one base place stands for every
/// element of the array.
pub fn try_create_place(op: &Operation) -> Option<Place> {
    match op.kind() {
        OpKind::LocalRef | OpKind::ParameterRef => Some(Place::base(op.symbol()?.clone())),
        OpKind::FieldRef | OpKind::PropertyRef => {
            let member = op.symbol()?.clone();
            let Some(receiver) = op.receiver().filter(|_| !member.is_static()) else {
                return Some(Place::base(member));
            };
            if receiver.kind() == OpKind::InstanceRef {
                return member.is_member().then(|| Place::base(member));
            }
            let base = try_create_place(receiver)?;
            Some(base.project(AccessStep::of(member)?))
        }
        OpKind::ArrayElementRef => try_create_place(op.array()?),
        _ => None,
    }
}

/// Collects the places read by an operation tree.
///
/// Every reference-shaped sub-operation contributes a read, with two
/// exceptions: the left-hand side of a simple assignment is a pure write,
/// and an `out` argument receives a value without reading one. Compound
/// assignment, increment and decrement targets are both read and written,
/// so they stay in.
pub fn collect_reads(op: &Operation) -> Vec<Place> {
    let mut reads = Vec::new();
    collect_into(op, &mut reads);
    reads
}

fn collect_into(op: &Operation, reads: &mut Vec<Place>) {
    match op.kind() {
        OpKind::Assignment => {
            if let Some(value) = op.value() {
                collect_into(value, reads);
            }
        }
        OpKind::Argument(RefKind::Out) => {}
        _ => {
            if op.kind().is_reference() {
                if let Some(place) = try_create_place(op) {
                    reads.push(place);
                }
            }
            for child in op.children() {
                collect_into(child, reads);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Symbol, SymbolKind};

    fn local(id: u64, name: &str) -> Symbol {
        Symbol::new(id, name, SymbolKind::Local)
    }

    fn local_ref(sym: &Symbol) -> Operation {
        Operation::new(OpKind::LocalRef).with_symbol(sym.clone())
    }

    #[test]
    fn locals_and_parameters_are_bare_places() {
        let x = local(1, "x");
        let p = Symbol::new(2, "p", SymbolKind::Parameter);

        assert_eq!(try_create_place(&local_ref(&x)), Some(Place::base(x)));
        let param_ref = Operation::new(OpKind::ParameterRef).with_symbol(p.clone());
        assert_eq!(try_create_place(&param_ref), Some(Place::base(p)));
    }

    #[test]
    fn static_members_collapse_to_the_member_symbol() {
        let f = Symbol::new(1, "Shared", SymbolKind::Field).with_static(true);
        let op = Operation::new(OpKind::FieldRef).with_symbol(f.clone());
        assert_eq!(try_create_place(&op), Some(Place::base(f)));
    }

    #[test]
    fn this_members_collapse_to_the_member_symbol() {
        let f = Symbol::new(1, "f", SymbolKind::Field);
        let op = Operation::new(OpKind::FieldRef)
            .with_symbol(f.clone())
            .with_children(vec![Operation::new(OpKind::InstanceRef)]);
        assert_eq!(try_create_place(&op), Some(Place::base(f)));
    }

    #[test]
    fn instance_members_project_through_the_receiver() {
        let obj = local(1, "obj");
        let f = Symbol::new(2, "f", SymbolKind::Field);
        let g = Symbol::new(3, "g", SymbolKind::Property);

        let op = Operation::new(OpKind::PropertyRef)
            .with_symbol(g.clone())
            .with_children(vec![Operation::new(OpKind::FieldRef)
                .with_symbol(f.clone())
                .with_children(vec![local_ref(&obj)])]);

        let expected = Place::base(obj)
            .project(AccessStep::of(f).unwrap())
            .project(AccessStep::of(g).unwrap());
        assert_eq!(try_create_place(&op), Some(expected));
    }

    #[test]
    fn array_elements_erase_their_index() {
        let arr = local(1, "arr");
        let i = local(2, "i");

        let op = Operation::new(OpKind::ArrayElementRef)
            .with_children(vec![local_ref(&arr), local_ref(&i)]);
        assert_eq!(try_create_place(&op), Some(Place::base(arr)));
    }

    #[test]
    fn non_references_yield_no_place() {
        assert_eq!(try_create_place(&Operation::new(OpKind::Literal)), None);
        assert_eq!(try_create_place(&Operation::new(OpKind::Invocation)), None);
    }

    #[test]
    fn assignment_targets_are_not_reads() {
        let x = local(1, "x");
        let y = local(2, "y");
        let assign = Operation::new(OpKind::Assignment)
            .with_children(vec![local_ref(&x), local_ref(&y)]);

        assert_eq!(collect_reads(&assign), vec![Place::base(y)]);
    }

    #[test]
    fn compound_targets_are_reads_too() {
        let x = local(1, "x");
        let y = local(2, "y");
        let assign = Operation::new(OpKind::CompoundAssignment)
            .with_children(vec![local_ref(&x), local_ref(&y)]);

        assert_eq!(
            collect_reads(&assign),
            vec![Place::base(x), Place::base(y)]
        );
    }

    #[test]
    fn out_arguments_are_not_reads() {
        let x = local(1, "x");
        let y = local(2, "y");
        let call = Operation::new(OpKind::Invocation).with_children(vec![
            Operation::new(OpKind::Argument(RefKind::Out)).with_children(vec![local_ref(&x)]),
            Operation::new(OpKind::Argument(RefKind::Ref)).with_children(vec![local_ref(&y)]),
        ]);

        assert_eq!(collect_reads(&call), vec![Place::base(y)]);
    }
}
