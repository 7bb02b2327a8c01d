//! The binder.
//!
//! [`Binder`] is the per compile unit context that owns the symbol table,
//! the configuration and every cache. Its behaviour is split over the
//! submodules the same way the algorithm is layered:
//!
//! - [`conversion`] - argument/parameter matching and the conversion table
//! - [`builtins`] / [`derived_ops`] - built-in operation repositories
//! - [`overload`] - viable function collection, ranking and selection
//! - [`deduce`] - template argument deduction
//! - [`concepts`] - constraint checking and concept instantiation
//! - [`const_eval`] - compile-time constant evaluation
//! - [`synth`] - special member function synthesis
//!
//! All caches live exactly as long as the binder; independent compile units
//! use independent binders.

pub mod builtins;
pub mod concepts;
pub mod const_eval;
pub mod conversion;
pub mod deduce;
pub mod derived_ops;
pub mod overload;
pub mod synth;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::ast::TypeExpr;
use crate::config::BinderConfig;
use crate::error::BindError;
use crate::span::Span;
use crate::symbols::{ConceptId, FunctionId, ScopeId, ScopeLookup, Symbol, SymbolFilter, SymbolTable, TypeId};

pub use builtins::BasicTypeOpRepository;
pub use concepts::{BoundConstraint, InstantiatedConcept};
pub use conversion::{
    better_argument_match, Argument, ArgumentCategory, ArgumentMatch, ConversionContext, ConversionRank,
    ConversionTable,
};
pub use derived_ops::{DerivedTypeOpCache, InterfaceTypeOpCache};
pub use overload::{FunctionMatch, OverloadRequest, ResolveFlags, ResolvedCall};
pub use synth::{SpecialMemberKind, SynthesizedClassFunCache};

/// Counters that make cache behaviour observable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinderStats {
    /// Overload resolutions started.
    pub resolutions: u64,
    /// Concept instantiations actually evaluated.
    pub concept_instantiations: u64,
    /// Concept instantiations answered from the cache.
    pub concept_cache_hits: u64,
    /// Class conversion lists scanned for user conversions.
    pub user_conversion_scans: u64,
    /// Special member functions generated.
    pub synthesized_members: u64,
    /// Function template and generic member instances created.
    pub function_instantiations: u64,
}

/// Binding context for one compile unit.
pub struct Binder {
    pub symbols: SymbolTable,
    pub config: BinderConfig,
    pub stats: BinderStats,
    /// Function instances the back end still has to generate code for.
    pub pending_instantiations: IndexSet<FunctionId>,
    pub(crate) conversions: ConversionTable,
    pub(crate) basic_ops: BasicTypeOpRepository,
    pub(crate) derived_ops: DerivedTypeOpCache,
    pub(crate) interface_ops: InterfaceTypeOpCache,
    pub(crate) synthesized: SynthesizedClassFunCache,
    pub(crate) concept_cache: FxHashMap<(ConceptId, Vec<TypeId>), Result<InstantiatedConcept, BindError>>,
    /// Direct refinement of each instantiated concept.
    pub(crate) concept_refinements: FxHashMap<ConceptId, ConceptId>,
    /// Function instances keyed by (template or generic member, arguments).
    pub(crate) instantiations: FxHashMap<(FunctionId, Vec<TypeId>), FunctionId>,
    /// Constructors synthesized from conversion functions by the widening pass.
    pub(crate) widened_constructors: FxHashMap<(FunctionId, TypeId), FunctionId>,
}

impl Binder {
    pub fn new(config: BinderConfig) -> Self {
        Self::with_symbols(SymbolTable::new(), config)
    }

    /// Bind against an already populated symbol table.
    pub fn with_symbols(mut symbols: SymbolTable, config: BinderConfig) -> Self {
        symbols.register_core_concepts();
        Self {
            symbols,
            config,
            stats: BinderStats::default(),
            pending_instantiations: IndexSet::new(),
            conversions: ConversionTable::default(),
            basic_ops: BasicTypeOpRepository::default(),
            derived_ops: DerivedTypeOpCache::default(),
            interface_ops: InterfaceTypeOpCache::default(),
            synthesized: SynthesizedClassFunCache::default(),
            concept_cache: FxHashMap::default(),
            concept_refinements: FxHashMap::default(),
            instantiations: FxHashMap::default(),
            widened_constructors: FxHashMap::default(),
        }
    }

    /// Resolve a type expression in `scope`.
    pub fn resolve_type(&mut self, expr: &TypeExpr, scope: ScopeId) -> Result<TypeId, BindError> {
        let ty = match expr {
            TypeExpr::Resolved(ty) => *ty,
            TypeExpr::Named(name) => self.lookup_type(scope, name)?,
            TypeExpr::Member { subject, member } => {
                let subject = self.resolve_type(subject, scope)?;
                let plain = self.symbols.types().make_plain(subject);
                let found = self.symbols.types().scope_of(plain).and_then(|member_scope| {
                    self.symbols.lookup(member_scope, member, ScopeLookup::THIS_AND_BASE, SymbolFilter::TYPES)
                });
                match found {
                    Some(Symbol::Type(ty)) => ty,
                    _ => {
                        return Err(BindError::UnresolvedName {
                            name: format!("{}.{}", self.symbols.types().name(plain), member),
                            span: Span::dummy(),
                        })
                    }
                }
            }
            TypeExpr::Template { subject, arguments } => {
                let generic = self.lookup_type(scope, subject)?;
                let expected = self.symbols.types().class(generic).map(|c| c.template_params.len()).unwrap_or(0);
                if expected != arguments.len() {
                    return Err(BindError::WrongTypeArgumentCount {
                        name: subject.clone(),
                        expected,
                        found: arguments.len(),
                        span: Span::dummy(),
                    });
                }
                let args = arguments
                    .iter()
                    .map(|arg| self.resolve_type(arg, scope))
                    .collect::<Result<Vec<_>, _>>()?;
                self.symbols.types_mut().instantiate_class(generic, &args)
            }
            TypeExpr::Const(inner) => {
                let inner = self.resolve_type(inner, scope)?;
                self.symbols.types_mut().make_const(inner)
            }
            TypeExpr::Pointer(inner) => {
                let inner = self.resolve_type(inner, scope)?;
                self.symbols.types_mut().make_pointer(inner)
            }
            TypeExpr::LvalueRef(inner) => {
                let inner = self.resolve_type(inner, scope)?;
                self.symbols.types_mut().make_reference(inner)
            }
            TypeExpr::RvalueRef(inner) => {
                let inner = self.resolve_type(inner, scope)?;
                self.symbols.types_mut().make_rvalue_reference(inner)
            }
        };
        trace!(ty = self.symbols.types().name(ty), "resolved type expression");
        Ok(ty)
    }

    fn lookup_type(&self, scope: ScopeId, name: &str) -> Result<TypeId, BindError> {
        match self.symbols.lookup_qualified(scope, name, ScopeLookup::THIS_AND_BASE_AND_PARENT, SymbolFilter::TYPES) {
            Some(Symbol::Type(ty)) => Ok(ty),
            _ => Err(BindError::UnresolvedName { name: name.to_string(), span: Span::dummy() }),
        }
    }

    /// Human-readable name of a type.
    pub fn type_name(&self, ty: TypeId) -> &str {
        self.symbols.types().name(ty)
    }
}
