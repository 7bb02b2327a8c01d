//! Container scopes and name lookup.

use bitflags::bitflags;
use indexmap::IndexMap;
use string_interner::DefaultSymbol;

use super::concept::ConceptId;
use super::constant::ConstantId;
use super::function::FunctionId;
use super::types::TypeId;

/// Index of a scope in the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of container owns a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Namespace,
    Class,
    Interface,
    Enum,
    Concept,
    Function,
    /// Transient scope binding template parameters for one instantiation.
    Instantiation,
}

bitflags! {
    /// Where a lookup may search.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ScopeLookup: u8 {
        const THIS = 1 << 0;
        const PARENT = 1 << 1;
        const BASE = 1 << 2;
        const THIS_AND_BASE = Self::THIS.bits() | Self::BASE.bits();
        const THIS_AND_PARENT = Self::THIS.bits() | Self::PARENT.bits();
        const THIS_AND_BASE_AND_PARENT = Self::THIS.bits() | Self::BASE.bits() | Self::PARENT.bits();
    }
}

bitflags! {
    /// Which symbol kinds a lookup accepts.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SymbolFilter: u8 {
        const TYPES = 1 << 0;
        const CONCEPTS = 1 << 1;
        const CONSTANTS = 1 << 2;
        const NAMESPACES = 1 << 3;
        const ALL = Self::TYPES.bits()
            | Self::CONCEPTS.bits()
            | Self::CONSTANTS.bits()
            | Self::NAMESPACES.bits();
    }
}

/// A named entry of a scope (functions are kept in groups, see [`Scope`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Type(TypeId),
    Namespace(ScopeId),
    /// Concepts sharing a group name, overloaded by arity.
    Concepts(Vec<ConceptId>),
    Constant(ConstantId),
}

impl Symbol {
    pub(crate) fn accepted_by(&self, filter: SymbolFilter) -> bool {
        match self {
            Symbol::Type(_) => filter.contains(SymbolFilter::TYPES),
            Symbol::Namespace(_) => filter.contains(SymbolFilter::NAMESPACES),
            Symbol::Concepts(_) => filter.contains(SymbolFilter::CONCEPTS),
            Symbol::Constant(_) => filter.contains(SymbolFilter::CONSTANTS),
        }
    }
}

/// A container scope.
#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub name: Option<DefaultSymbol>,
    pub parent: Option<ScopeId>,
    /// Member scope of the base class, for class scopes.
    pub base: Option<ScopeId>,
    pub(crate) entries: IndexMap<DefaultSymbol, Symbol>,
    pub(crate) function_groups: IndexMap<DefaultSymbol, Vec<FunctionId>>,
}

impl Scope {
    pub(crate) fn new(kind: ScopeKind, name: Option<DefaultSymbol>, parent: Option<ScopeId>) -> Self {
        Self {
            kind,
            name,
            parent,
            base: None,
            entries: IndexMap::new(),
            function_groups: IndexMap::new(),
        }
    }

    pub fn get(&self, name: DefaultSymbol) -> Option<&Symbol> {
        self.entries.get(&name)
    }

    pub fn functions(&self, group: DefaultSymbol) -> &[FunctionId] {
        self.function_groups.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.function_groups.is_empty()
    }
}

/// Where overload resolution collects a function group from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupTarget {
    Scope(ScopeId),
    /// The file scopes (using-directives) of the compile unit.
    FileScopes,
}

/// One scope lookup contributed by the caller of overload resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionScopeLookup {
    pub target: LookupTarget,
    pub lookup: ScopeLookup,
}

impl FunctionScopeLookup {
    pub fn new(scope: ScopeId, lookup: ScopeLookup) -> Self {
        Self { target: LookupTarget::Scope(scope), lookup }
    }

    pub fn file_scopes() -> Self {
        Self { target: LookupTarget::FileScopes, lookup: ScopeLookup::THIS }
    }
}
