//! Symbols, projection steps and places.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ecow::{EcoString, EcoVec};

/// The declaration kind of a [`Symbol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SymbolKind {
    /// A local variable.
    Local,
    /// A parameter of the enclosing member.
    Parameter,
    /// A field of some type.
    Field,
    /// A property of some type.
    Property,
    /// An event member.
    Event,
    /// The base symbol standing for an entire array.
    ArrayBase,
    /// Anything else the semantic layer resolves but we do not distinguish.
    Other,
}

impl SymbolKind {
    /// A stable name for client-facing payloads.
    pub fn name(self) -> &'static str {
        match self {
            SymbolKind::Local => "local",
            SymbolKind::Parameter => "parameter",
            SymbolKind::Field => "field",
            SymbolKind::Property => "property",
            SymbolKind::Event => "event",
            SymbolKind::ArrayBase => "array",
            SymbolKind::Other => "other",
        }
    }
}

/// Whether a symbol's declared type shares storage by reference.
///
/// Value-typed storage can never alias, so the alias analyzer only unions
/// reference-typed places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeShape {
    /// Value semantics, storage is never shared.
    Value,
    /// Reference semantics, storage may be shared.
    Reference,
}

struct SymbolRepr {
    id: u64,
    name: EcoString,
    kind: SymbolKind,
    is_static: bool,
    ty: TypeShape,
}

/// An opaque handle to a declared name, supplied by the semantic layer.
///
/// Identity (equality, ordering, hashing) is the symbol's id, which the
/// semantic layer keeps unique within one model. The handle is cheap to
/// clone and shared freely across analysis artifacts.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolRepr>);

impl Symbol {
    /// Creates a symbol handle. The caller guarantees `id` uniqueness.
    pub fn new(id: u64, name: impl Into<EcoString>, kind: SymbolKind) -> Self {
        Self(Arc::new(SymbolRepr {
            id,
            name: name.into(),
            kind,
            is_static: false,
            ty: TypeShape::Value,
        }))
    }

    /// Marks the symbol as static.
    pub fn with_static(self, is_static: bool) -> Self {
        let repr = &*self.0;
        Self(Arc::new(SymbolRepr {
            id: repr.id,
            name: repr.name.clone(),
            kind: repr.kind,
            is_static,
            ty: repr.ty,
        }))
    }

    /// Sets the declared type shape.
    pub fn with_ty(self, ty: TypeShape) -> Self {
        let repr = &*self.0;
        Self(Arc::new(SymbolRepr {
            id: repr.id,
            name: repr.name.clone(),
            kind: repr.kind,
            is_static: repr.is_static,
            ty,
        }))
    }

    /// The id assigned by the semantic layer.
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// The declared name.
    pub fn name(&self) -> &EcoString {
        &self.0.name
    }

    /// The declaration kind.
    pub fn kind(&self) -> SymbolKind {
        self.0.kind
    }

    /// Whether the declaration is static.
    pub fn is_static(&self) -> bool {
        self.0.is_static
    }

    /// The declared type shape.
    pub fn ty(&self) -> TypeShape {
        self.0.ty
    }

    /// Whether the symbol names a member of some containing type.
    pub fn is_member(&self) -> bool {
        matches!(
            self.kind(),
            SymbolKind::Field | SymbolKind::Property | SymbolKind::Event
        )
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Symbol {}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.id.cmp(&other.0.id)
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.id);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.0.name, self.0.id)
    }
}

/// How one projection step reaches its member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AccessKind {
    /// A field access.
    Field,
    /// A property access.
    Property,
}

/// One element of a place's projection path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AccessStep {
    member: Symbol,
    kind: AccessKind,
}

impl AccessStep {
    /// Builds a step from a member symbol, if the symbol is steppable.
    pub fn of(member: Symbol) -> Option<Self> {
        let kind = match member.kind() {
            SymbolKind::Field => AccessKind::Field,
            SymbolKind::Property => AccessKind::Property,
            _ => return None,
        };
        Some(Self { member, kind })
    }

    /// The accessed member.
    pub fn member(&self) -> &Symbol {
        &self.member
    }

    /// The step's access kind.
    pub fn kind(&self) -> AccessKind {
        self.kind
    }

    /// The accessed member's name.
    pub fn name(&self) -> &EcoString {
        self.member.name()
    }
}

impl Hash for AccessStep {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.member.hash(state);
        self.kind.hash(state);
    }
}

/// A canonical reference to a memory location: a base symbol plus an ordered
/// projection path.
///
/// Two places are equal iff their bases are equal and their paths are equal
/// elementwise. The hash is a structural fingerprint of (base, steps...) and
/// is stable within one process. Places are immutable and cheap to clone.
#[derive(Clone, PartialEq, Eq)]
pub struct Place {
    base: Symbol,
    path: EcoVec<AccessStep>,
}

impl PartialOrd for Place {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Place {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.base, self.path())
            .cmp(&(&other.base, other.path()))
    }
}

impl Place {
    /// A place naming the base symbol itself, with an empty path.
    pub fn base(symbol: Symbol) -> Self {
        Self {
            base: symbol,
            path: EcoVec::new(),
        }
    }

    /// Extends the place with one more projection step.
    pub fn project(&self, step: AccessStep) -> Self {
        let mut path = self.path.clone();
        path.push(step);
        Self {
            base: self.base.clone(),
            path,
        }
    }

    /// The base symbol.
    pub fn base_symbol(&self) -> &Symbol {
        &self.base
    }

    /// The ordered projection path, possibly empty.
    pub fn path(&self) -> &[AccessStep] {
        &self.path
    }

    /// The symbol whose declared type decides this place's storage shape:
    /// the last projected member, or the base when the path is empty.
    pub fn resolved_symbol(&self) -> &Symbol {
        self.path.last().map(AccessStep::member).unwrap_or(&self.base)
    }

    /// The declared type shape of the referenced storage.
    pub fn ty(&self) -> TypeShape {
        self.resolved_symbol().ty()
    }

    /// A `base.step.step` rendering for diagnostics and responses.
    pub fn display_name(&self) -> EcoString {
        let mut name = self.base.name().clone();
        for step in self.path.iter() {
            name.push('.');
            name.push_str(step.name());
        }
        name
    }
}

impl Hash for Place {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.hash(state);
        for step in self.path.iter() {
            step.hash(state);
        }
    }
}

impl fmt::Debug for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Place({})", self.display_name())
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(id: u64, name: &str, kind: SymbolKind) -> Symbol {
        Symbol::new(id, name, kind)
    }

    #[test]
    fn place_equality_is_structural() {
        let x = sym(1, "x", SymbolKind::Local);
        let f = sym(2, "f", SymbolKind::Field);

        let p1 = Place::base(x.clone()).project(AccessStep::of(f.clone()).unwrap());
        let p2 = Place::base(x.clone()).project(AccessStep::of(f).unwrap());
        assert_eq!(p1, p2);

        let bare = Place::base(x);
        assert_ne!(p1, bare);
    }

    #[test]
    fn place_hash_distinguishes_path_length() {
        use std::collections::hash_map::DefaultHasher;

        let x = sym(1, "x", SymbolKind::Local);
        let f = sym(2, "f", SymbolKind::Field);

        let bare = Place::base(x.clone());
        let projected = bare.project(AccessStep::of(f).unwrap());

        let mut h1 = DefaultHasher::new();
        let mut h2 = DefaultHasher::new();
        bare.hash(&mut h1);
        projected.hash(&mut h2);
        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn resolved_symbol_follows_the_path() {
        let x = sym(1, "x", SymbolKind::Local).with_ty(TypeShape::Reference);
        let f = sym(2, "f", SymbolKind::Field).with_ty(TypeShape::Value);

        let place = Place::base(x.clone()).project(AccessStep::of(f.clone()).unwrap());
        assert_eq!(place.resolved_symbol(), &f);
        assert_eq!(place.ty(), TypeShape::Value);
        assert_eq!(Place::base(x).ty(), TypeShape::Reference);
    }

    #[test]
    fn display_name_joins_steps() {
        let x = sym(1, "obj", SymbolKind::Local);
        let f = sym(2, "f", SymbolKind::Field);
        let g = sym(3, "g", SymbolKind::Property);

        let place = Place::base(x)
            .project(AccessStep::of(f).unwrap())
            .project(AccessStep::of(g).unwrap());
        assert_eq!(place.display_name(), "obj.f.g");
    }
}
