//! Hand-lowered fixtures for exercising the engine without a front end.
//!
//! Each fixture pairs a source text with the members a semantic layer would
//! lower it to, with operation spans pointing back into the text.

use std::sync::Arc;

use lsp_types::{Position as LspPosition, Url};
use tokio_util::sync::CancellationToken;

use crate::analysis::global::{AnalysisCache, AnalysisContext};
use crate::ir::{
    CfgBuilder, Member, OpKind, Operation, Span, Symbol, SymbolKind, TypeShape,
};
use crate::semantics::SemanticModel;
use crate::source::{DocumentSnapshot, PositionEncoding};

/// The span of the first occurrence of `needle`.
///
/// # Panics
/// Panics when the needle is absent; fixtures are static.
pub fn span_of(text: &str, needle: &str) -> Span {
    let start = text.find(needle).expect("fixture needle");
    start..start + needle.len()
}

/// The span of `inner` within the first occurrence of `outer`.
pub fn span_in(text: &str, outer: &str, inner: &str) -> Span {
    span_in_nth(text, outer, inner, 0)
}

/// The span of the `nth` occurrence of `inner` within `outer`.
pub fn span_in_nth(text: &str, outer: &str, inner: &str, nth: usize) -> Span {
    let outer_span = span_of(text, outer);
    let haystack = &text[outer_span.clone()];
    let mut from = 0;
    for _ in 0..nth {
        let found = haystack[from..].find(inner).expect("fixture needle");
        from += found + inner.len();
    }
    let found = haystack[from..].find(inner).expect("fixture needle");
    let start = outer_span.start + from + found;
    start..start + inner.len()
}

/// A fresh-id symbol factory.
#[derive(Default)]
pub struct Symbols {
    next: u64,
}

impl Symbols {
    /// Creates a factory starting at id zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints a symbol of the given kind.
    pub fn make(&mut self, name: &str, kind: SymbolKind) -> Symbol {
        self.next += 1;
        Symbol::new(self.next, name, kind)
    }

    /// Mints a value-typed local.
    pub fn local(&mut self, name: &str) -> Symbol {
        self.make(name, SymbolKind::Local)
    }

    /// Mints a reference-typed local.
    pub fn reference_local(&mut self, name: &str) -> Symbol {
        self.local(name).with_ty(TypeShape::Reference)
    }

    /// Mints a value-typed parameter.
    pub fn parameter(&mut self, name: &str) -> Symbol {
        self.make(name, SymbolKind::Parameter)
    }

    /// Mints a field.
    pub fn field(&mut self, name: &str) -> Symbol {
        self.make(name, SymbolKind::Field)
    }
}

/// A source text plus the members it lowers to.
pub struct Fixture {
    doc: DocumentSnapshot,
    members: Vec<Arc<Member>>,
}

impl Fixture {
    /// Wraps a text and its lowered members.
    pub fn new(text: &str, members: Vec<Member>) -> Self {
        let uri = Url::parse("file:///fixture.cs").expect("fixture uri");
        Self {
            doc: DocumentSnapshot::new(uri, text, 1),
            members: members.into_iter().map(Arc::new).collect(),
        }
    }

    /// The fixture's document snapshot.
    pub fn doc(&self) -> &DocumentSnapshot {
        &self.doc
    }

    /// The lowered members.
    pub fn members(&self) -> &[Arc<Member>] {
        &self.members
    }

    /// The client position of the `nth` occurrence of `inner` within
    /// `outer`.
    pub fn position_in_nth(&self, outer: &str, inner: &str, nth: usize) -> LspPosition {
        let span = span_in_nth(self.doc.text(), outer, inner, nth);
        self.doc.position_at(span.start, PositionEncoding::Utf16)
    }

    /// The client position of `inner` within the first `outer`.
    pub fn position_in(&self, outer: &str, inner: &str) -> LspPosition {
        self.position_in_nth(outer, inner, 0)
    }

    /// Builds an analysis context over this fixture with a fresh cache.
    pub fn into_context(self) -> AnalysisContext {
        self.into_context_with(Arc::new(AnalysisCache::new()), CancellationToken::new())
    }

    /// Builds an analysis context sharing a cache and a token.
    pub fn into_context_with(
        self,
        cache: Arc<AnalysisCache>,
        token: CancellationToken,
    ) -> AnalysisContext {
        let doc = self.doc.clone();
        AnalysisContext::new(doc, Arc::new(self), cache, PositionEncoding::Utf16, token)
    }
}

impl SemanticModel for Fixture {
    fn members(&self, doc: &DocumentSnapshot) -> Vec<Arc<Member>> {
        if doc.uri() != self.doc.uri() {
            return Vec::new();
        }
        self.members.clone()
    }
}

fn local_ref(sym: &Symbol, span: Span) -> Operation {
    Operation::new(OpKind::LocalRef)
        .with_symbol(sym.clone())
        .with_span(span)
}

fn param_ref(sym: &Symbol, span: Span) -> Operation {
    Operation::new(OpKind::ParameterRef)
        .with_symbol(sym.clone())
        .with_span(span)
}

fn declare(sym: &Symbol, span: Span, init: Option<Operation>) -> Operation {
    let decl = Operation::new(OpKind::Declarator)
        .with_symbol(sym.clone())
        .with_span(span);
    match init {
        Some(init) => decl.with_children(vec![init]),
        None => decl,
    }
}

/// `int Compute(int input) { int y = input + 1; int z = y * 2; return z; }`
///
/// One straight-line member: the linear dependence scenarios.
pub fn linear_dependence() -> Fixture {
    let text = "int Compute(int input) { int y = input + 1; int z = y * 2; return z; }";
    let mut symbols = Symbols::new();
    let input = symbols.parameter("input");
    let y = symbols.local("y");
    let z = symbols.local("z");

    let decl_input = declare(&input, span_of(text, "int input"), None);
    let decl_y = declare(
        &y,
        span_of(text, "int y = input + 1;"),
        Some(
            Operation::new(OpKind::Binary)
                .with_span(span_of(text, "input + 1"))
                .with_children(vec![
                    param_ref(&input, span_in(text, "input + 1", "input")),
                    Operation::new(OpKind::Literal).with_span(span_in(text, "input + 1", "1")),
                ]),
        ),
    );
    let decl_z = declare(
        &z,
        span_of(text, "int z = y * 2;"),
        Some(
            Operation::new(OpKind::Binary)
                .with_span(span_of(text, "y * 2"))
                .with_children(vec![
                    local_ref(&y, span_in(text, "y * 2", "y")),
                    Operation::new(OpKind::Literal).with_span(span_in(text, "y * 2", "2")),
                ]),
        ),
    );
    let ret = Operation::new(OpKind::Return)
        .with_span(span_of(text, "return z;"))
        .with_children(vec![local_ref(&z, span_in(text, "return z;", "z"))]);

    let mut builder = CfgBuilder::new();
    let b0 = builder.add_block(vec![decl_input, decl_y, decl_z, ret]);
    let member = Member {
        id: "Program.Compute".into(),
        name: "Compute".into(),
        span: 0..text.len(),
        cfg: builder.finish(b0, b0),
    };
    Fixture::new(text, vec![member])
}

/// `void M(bool c) { int x = 0; if (c) x = 5; int y = x; }`
///
/// A diamond: the conditional control-dependence scenario.
pub fn conditional_dependence() -> Fixture {
    let text = "void M(bool c) { int x = 0; if (c) x = 5; int y = x; }";
    let mut symbols = Symbols::new();
    let c = symbols.parameter("c");
    let x = symbols.local("x");
    let y = symbols.local("y");

    let decl_c = declare(&c, span_of(text, "bool c"), None);
    let decl_x = declare(
        &x,
        span_of(text, "int x = 0;"),
        Some(Operation::new(OpKind::Literal).with_span(span_in(text, "int x = 0;", "0"))),
    );
    let assign_x = Operation::new(OpKind::Assignment)
        .with_span(span_of(text, "x = 5"))
        .with_children(vec![
            local_ref(&x, span_in(text, "x = 5", "x")),
            Operation::new(OpKind::Literal).with_span(span_in(text, "x = 5", "5")),
        ]);
    let decl_y = declare(
        &y,
        span_of(text, "int y = x;"),
        Some(local_ref(&x, span_in(text, "int y = x;", "x"))),
    );

    let mut builder = CfgBuilder::new();
    let b0 = builder.add_block(vec![decl_c, decl_x]);
    let b1 = builder.add_block(vec![assign_x]);
    let b2 = builder.add_block(vec![decl_y]);
    builder.set_branch(
        b0,
        param_ref(&c, span_of(text, "if (c)")),
        Some(span_of(text, "if (c)")),
    );
    builder.set_conditional(b0, b1);
    builder.set_fallthrough(b0, b2);
    builder.set_fallthrough(b1, b2);
    let member = Member {
        id: "Program.M".into(),
        name: "M".into(),
        span: 0..text.len(),
        cfg: builder.finish(b0, b2),
    };
    Fixture::new(text, vec![member])
}

/// `int n = 0; n++; int m = n;`
///
/// The increment-is-read-and-write scenario.
pub fn increment_chain() -> Fixture {
    let text = "int n = 0; n++; int m = n;";
    let mut symbols = Symbols::new();
    let n = symbols.local("n");
    let m = symbols.local("m");

    let decl_n = declare(
        &n,
        span_of(text, "int n = 0;"),
        Some(Operation::new(OpKind::Literal).with_span(span_in(text, "int n = 0;", "0"))),
    );
    let increment = Operation::new(OpKind::Increment)
        .with_span(span_of(text, "n++"))
        .with_children(vec![local_ref(&n, span_in(text, "n++", "n"))]);
    let decl_m = declare(
        &m,
        span_of(text, "int m = n;"),
        // the second `n` of the statement: "int" holds the first
        Some(local_ref(&n, span_in_nth(text, "int m = n;", "n", 1))),
    );

    let mut builder = CfgBuilder::new();
    let b0 = builder.add_block(vec![decl_n, increment, decl_m]);
    let member = Member {
        id: "Program.Main".into(),
        name: "Main".into(),
        span: 0..text.len(),
        cfg: builder.finish(b0, b0),
    };
    Fixture::new(text, vec![member])
}

/// `class T { int f; void Set(int v){ f = v; } int Get(){ return f; } }`
///
/// Two members over one field: the cross-member scenario, which the intra-
/// member engine analyzes one side at a time.
pub fn field_accessors() -> Fixture {
    let text = "class T { int f; void Set(int v){ f = v; } int Get(){ return f; } }";
    let mut symbols = Symbols::new();
    let f = symbols.field("f");
    let v = symbols.parameter("v");

    let this_f = |span: Span| {
        Operation::new(OpKind::FieldRef)
            .with_symbol(f.clone())
            .with_span(span)
            .with_children(vec![Operation::new(OpKind::InstanceRef)])
    };

    let set_member = {
        let decl_v = declare(&v, span_of(text, "int v"), None);
        let assign = Operation::new(OpKind::Assignment)
            .with_span(span_of(text, "f = v"))
            .with_children(vec![
                this_f(span_in(text, "f = v", "f")),
                param_ref(&v, span_in(text, "f = v", "v")),
            ]);
        let mut builder = CfgBuilder::new();
        let b0 = builder.add_block(vec![decl_v, assign]);
        Member {
            id: "T.Set".into(),
            name: "Set".into(),
            span: span_of(text, "void Set(int v){ f = v; }"),
            cfg: builder.finish(b0, b0),
        }
    };

    let get_member = {
        let ret = Operation::new(OpKind::Return)
            .with_span(span_of(text, "return f;"))
            .with_children(vec![this_f(span_in(text, "return f;", "f"))]);
        let mut builder = CfgBuilder::new();
        let b0 = builder.add_block(vec![ret]);
        Member {
            id: "T.Get".into(),
            name: "Get".into(),
            span: span_of(text, "int Get(){ return f; }"),
            cfg: builder.finish(b0, b0),
        }
    };

    Fixture::new(text, vec![set_member, get_member])
}
