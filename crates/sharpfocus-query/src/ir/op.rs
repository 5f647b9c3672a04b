//! Typed operation trees.

use super::{Span, Symbol};

/// By-reference passing modes of an invocation argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    /// Passed by value; the callee reads but cannot write the argument.
    Value,
    /// Passed by `ref`; the callee may read and write through it.
    Ref,
    /// Passed by `out`; the callee writes but does not read it.
    Out,
}

/// The kind of a lowered operation node.
///
/// Child conventions, where a shape has them:
/// - assignments: `[target, value]`
/// - increment/decrement: `[target]`
/// - declarator: `[initializer]` or empty, with [`Operation::symbol`] naming
///   the declared local
/// - member references: `[receiver]`, or empty for static references
/// - array element references: `[array, index...]`
/// - invocation: `[argument...]`; argument: `[value]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// A reference to a local variable.
    LocalRef,
    /// A reference to a parameter.
    ParameterRef,
    /// A reference to a field.
    FieldRef,
    /// A reference to a property.
    PropertyRef,
    /// An indexing expression over an array.
    ArrayElementRef,
    /// A `this` receiver reference.
    InstanceRef,
    /// A simple assignment.
    Assignment,
    /// A compound assignment (`+=` and friends).
    CompoundAssignment,
    /// An increment.
    Increment,
    /// A decrement.
    Decrement,
    /// A variable declarator, with an optional initializer child.
    Declarator,
    /// A call.
    Invocation,
    /// One invocation argument, carrying its passing mode.
    Argument(RefKind),
    /// An object allocation.
    ObjectCreation,
    /// A literal value.
    Literal,
    /// A binary operator application.
    Binary,
    /// A unary operator application.
    Unary,
    /// A return statement.
    Return,
    /// Any operation the analysis treats as opaque.
    Other,
}

impl OpKind {
    /// Whether this node is shaped like a reference to a place.
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            OpKind::LocalRef
                | OpKind::ParameterRef
                | OpKind::FieldRef
                | OpKind::PropertyRef
                | OpKind::ArrayElementRef
        )
    }

    /// A stable name for client-facing payloads.
    pub fn name(self) -> &'static str {
        match self {
            OpKind::LocalRef => "localReference",
            OpKind::ParameterRef => "parameterReference",
            OpKind::FieldRef => "fieldReference",
            OpKind::PropertyRef => "propertyReference",
            OpKind::ArrayElementRef => "arrayElementReference",
            OpKind::InstanceRef => "instanceReference",
            OpKind::Assignment => "assignment",
            OpKind::CompoundAssignment => "compoundAssignment",
            OpKind::Increment => "increment",
            OpKind::Decrement => "decrement",
            OpKind::Declarator => "variableDeclarator",
            OpKind::Invocation => "invocation",
            OpKind::Argument(_) => "argument",
            OpKind::ObjectCreation => "objectCreation",
            OpKind::Literal => "literal",
            OpKind::Binary => "binaryOperator",
            OpKind::Unary => "unaryOperator",
            OpKind::Return => "return",
            OpKind::Other => "operation",
        }
    }
}

/// One node of the lowered typed tree handed over by the semantic layer.
#[derive(Debug, Clone)]
pub struct Operation {
    kind: OpKind,
    children: Vec<Operation>,
    span: Option<Span>,
    symbol: Option<Symbol>,
}

impl Operation {
    /// Creates a childless operation.
    pub fn new(kind: OpKind) -> Self {
        Self {
            kind,
            children: Vec::new(),
            span: None,
            symbol: None,
        }
    }

    /// Attaches the source span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attaches the referenced symbol.
    pub fn with_symbol(mut self, symbol: Symbol) -> Self {
        self.symbol = Some(symbol);
        self
    }

    /// Attaches child operations.
    pub fn with_children(mut self, children: Vec<Operation>) -> Self {
        self.children = children;
        self
    }

    /// The node kind.
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// The child operations, in source order.
    pub fn children(&self) -> &[Operation] {
        &self.children
    }

    /// The source span, if the semantic layer attached one.
    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    /// The referenced symbol, if any.
    pub fn symbol(&self) -> Option<&Symbol> {
        self.symbol.as_ref()
    }

    /// The write target of an assignment-shaped node.
    pub fn target(&self) -> Option<&Operation> {
        match self.kind {
            OpKind::Assignment
            | OpKind::CompoundAssignment
            | OpKind::Increment
            | OpKind::Decrement => self.children.first(),
            _ => None,
        }
    }

    /// The value operand: assignment right-hand sides, declarator
    /// initializers and argument values.
    pub fn value(&self) -> Option<&Operation> {
        match self.kind {
            OpKind::Assignment | OpKind::CompoundAssignment => self.children.get(1),
            OpKind::Declarator | OpKind::Argument(_) => self.children.first(),
            _ => None,
        }
    }

    /// The receiver of a member reference, absent for static references.
    pub fn receiver(&self) -> Option<&Operation> {
        match self.kind {
            OpKind::FieldRef | OpKind::PropertyRef => self.children.first(),
            _ => None,
        }
    }

    /// The array operand of an indexing expression.
    pub fn array(&self) -> Option<&Operation> {
        match self.kind {
            OpKind::ArrayElementRef => self.children.first(),
            _ => None,
        }
    }

    /// Pre-order traversal over this node and all descendants.
    pub fn walk(&self, f: &mut impl FnMut(&Operation)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }
}
