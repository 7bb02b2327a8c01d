//! The symbol table consumed by the binder.
//!
//! Earlier name-resolution passes populate the table; the binder looks names
//! up through it and adds the symbols it synthesizes (built-in operations,
//! special members, template instances).
//!
//! # Layout
//!
//! - [`types`] - type identities and the interning [`TypeRepository`]
//! - [`scope`] - container scopes and lookup flags
//! - [`function`] - function symbols and flags
//! - [`concept`] - concept symbols
//! - [`constant`] - constants with memoized values

pub mod concept;
pub mod constant;
pub mod function;
pub mod scope;
pub mod types;


use string_interner::{DefaultStringInterner, DefaultSymbol};

use crate::ast::{ConstExpr, ConstraintExpr};
use crate::span::Span;
use crate::value::ValueKind;

pub use concept::{ConceptId, ConceptSymbol};
pub use constant::{ConstantId, ConstantState, ConstantSymbol};
pub use function::{
    ConversionInfo, FunctionFlags, FunctionId, FunctionKind, FunctionSymbol, Intrinsic, Parameter,
    ASSIGNMENT, CONSTRUCTOR, CONVERSION, DESTRUCTOR,
};
pub use scope::{
    FunctionScopeLookup, LookupTarget, Scope, ScopeId, ScopeKind, ScopeLookup, Symbol, SymbolFilter,
};
pub use types::{
    BasicKind, ClassFlags, ClassInfo, DelegateInfo, DerivationCounts, Derivations, EnumInfo,
    InterfaceInfo, MemberVariable, RefKind, SpecialMembers, TypeId, TypeKind, TypeRepository,
    TypeSymbol,
};

/// Namespace holding the intrinsic concepts.
pub const CORE_CONCEPTS_NAMESPACE: &str = "System.Concepts";

/// All symbols of one compile unit.
#[derive(Debug)]
pub struct SymbolTable {
    interner: DefaultStringInterner,
    scopes: Vec<Scope>,
    free_scopes: Vec<ScopeId>,
    types: TypeRepository,
    functions: Vec<FunctionSymbol>,
    concepts: Vec<ConceptSymbol>,
    constants: Vec<ConstantSymbol>,
    global: ScopeId,
    file_scopes: Vec<ScopeId>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            interner: DefaultStringInterner::new(),
            scopes: vec![Scope::new(ScopeKind::Namespace, None, None)],
            free_scopes: Vec::new(),
            types: TypeRepository::new(),
            functions: Vec::new(),
            concepts: Vec::new(),
            constants: Vec::new(),
            global: ScopeId(0),
            file_scopes: Vec::new(),
        };
        for kind in BasicKind::ALL {
            if kind == BasicKind::Null {
                continue;
            }
            let ty = table.types.basic(kind);
            table.declare(table.global, kind.name(), Symbol::Type(ty));
        }
        table
    }

    pub fn types(&self) -> &TypeRepository {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRepository {
        &mut self.types
    }

    pub fn global_scope(&self) -> ScopeId {
        self.global
    }

    pub fn intern(&mut self, name: &str) -> DefaultSymbol {
        self.interner.get_or_intern(name)
    }

    pub fn resolve_name(&self, symbol: DefaultSymbol) -> &str {
        self.interner.resolve(symbol).unwrap_or("<unknown>")
    }

    // ------------------------------------------------------------------
    // Scopes
    // ------------------------------------------------------------------

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    /// Create a scope, reusing a released one when available.
    pub fn add_scope(&mut self, kind: ScopeKind, name: Option<&str>, parent: ScopeId) -> ScopeId {
        let name = name.map(|n| self.intern(n));
        let scope = Scope::new(kind, name, Some(parent));
        if let Some(id) = self.free_scopes.pop() {
            self.scopes[id.index()] = scope;
            return id;
        }
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(scope);
        id
    }

    /// Create a transient scope binding template parameters.
    pub fn new_instantiation_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.add_scope(ScopeKind::Instantiation, None, parent)
    }

    /// Discard a transient scope created by [`Self::new_instantiation_scope`].
    pub fn release_scope(&mut self, id: ScopeId) {
        if id == self.global || self.free_scopes.contains(&id) {
            return;
        }
        let scope = self.scope_mut(id);
        scope.entries.clear();
        scope.function_groups.clear();
        self.free_scopes.push(id);
    }

    /// Find or create the namespace `name` (may be dotted) under `parent`.
    pub fn add_namespace(&mut self, parent: ScopeId, name: &str) -> ScopeId {
        let mut current = parent;
        for part in name.split('.') {
            let key = self.intern(part);
            let existing = match self.scope(current).get(key) {
                Some(Symbol::Namespace(existing)) => Some(*existing),
                _ => None,
            };
            current = match existing {
                Some(existing) => existing,
                None => {
                    let id = self.add_scope(ScopeKind::Namespace, Some(part), current);
                    self.scope_mut(current).entries.insert(key, Symbol::Namespace(id));
                    id
                }
            };
        }
        current
    }

    /// Add a using-directive: the scope takes part in file-scope lookups.
    pub fn add_file_scope(&mut self, scope: ScopeId) {
        if !self.file_scopes.contains(&scope) {
            self.file_scopes.push(scope);
        }
    }

    pub fn file_scopes(&self) -> &[ScopeId] {
        &self.file_scopes
    }

    pub fn declare(&mut self, scope: ScopeId, name: &str, symbol: Symbol) {
        let key = self.intern(name);
        self.scope_mut(scope).entries.insert(key, symbol);
    }

    /// Dotted name of `name` declared in `scope`.
    pub fn qualified_name(&self, scope: ScopeId, name: &str) -> String {
        let mut parts = vec![name.to_string()];
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            if let Some(n) = s.name {
                parts.push(self.resolve_name(n).to_string());
            }
            current = s.parent;
        }
        parts.reverse();
        parts.join(".")
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Look a simple name up.
    ///
    /// The scope itself is always searched; `BASE` extends the search to base
    /// class scopes and `PARENT` to enclosing scopes when nothing was found.
    pub fn lookup(
        &self,
        scope: ScopeId,
        name: &str,
        lookup: ScopeLookup,
        filter: SymbolFilter,
    ) -> Option<Symbol> {
        let key = self.interner.get(name)?;
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(found) = self.lookup_with_bases(id, key, lookup, filter) {
                return Some(found);
            }
            if !lookup.contains(ScopeLookup::PARENT) {
                break;
            }
            current = self.scope(id).parent;
        }
        None
    }

    fn lookup_with_bases(
        &self,
        scope: ScopeId,
        key: DefaultSymbol,
        lookup: ScopeLookup,
        filter: SymbolFilter,
    ) -> Option<Symbol> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(symbol) = self.scope(id).get(key) {
                if symbol.accepted_by(filter) {
                    return Some(symbol.clone());
                }
            }
            if !lookup.contains(ScopeLookup::BASE) {
                break;
            }
            current = self.scope(id).base;
        }
        None
    }

    /// Look a possibly dotted name up, then fall back to the file scopes.
    pub fn lookup_qualified(
        &self,
        scope: ScopeId,
        name: &str,
        lookup: ScopeLookup,
        filter: SymbolFilter,
    ) -> Option<Symbol> {
        self.lookup_path(scope, name, lookup, filter).or_else(|| {
            self.file_scopes
                .iter()
                .find_map(|&file| self.lookup_path(file, name, ScopeLookup::THIS, filter))
        })
    }

    fn lookup_path(
        &self,
        scope: ScopeId,
        name: &str,
        lookup: ScopeLookup,
        filter: SymbolFilter,
    ) -> Option<Symbol> {
        let mut parts = name.split('.').peekable();
        let first = parts.next()?;
        if parts.peek().is_none() {
            return self.lookup(scope, first, lookup, filter);
        }
        let container_filter = SymbolFilter::NAMESPACES | SymbolFilter::TYPES;
        let mut symbol = self.lookup(scope, first, lookup, container_filter)?;
        while let Some(part) = parts.next() {
            let container = self.container_scope(&symbol)?;
            let step_filter = if parts.peek().is_some() { container_filter } else { filter };
            symbol = self.lookup(container, part, ScopeLookup::THIS, step_filter)?;
        }
        Some(symbol)
    }

    /// The member scope a namespace or nominal type symbol opens.
    pub fn container_scope(&self, symbol: &Symbol) -> Option<ScopeId> {
        match symbol {
            Symbol::Namespace(id) => Some(*id),
            Symbol::Type(ty) => self.types.scope_of(*ty),
            _ => None,
        }
    }

    /// Collect the functions of `group` a lookup contributes.
    pub fn lookup_functions(&self, target: &FunctionScopeLookup, group: &str) -> Vec<FunctionId> {
        let Some(key) = self.interner.get(group) else {
            return Vec::new();
        };
        match target.target {
            LookupTarget::FileScopes => self
                .file_scopes
                .iter()
                .flat_map(|&scope| self.scope(scope).functions(key).iter().copied())
                .collect(),
            LookupTarget::Scope(scope) => {
                let mut current = Some(scope);
                while let Some(id) = current {
                    let found = self.functions_with_bases(id, key, target.lookup);
                    if !found.is_empty() || !target.lookup.contains(ScopeLookup::PARENT) {
                        return found;
                    }
                    current = self.scope(id).parent;
                }
                Vec::new()
            }
        }
    }

    fn functions_with_bases(&self, scope: ScopeId, key: DefaultSymbol, lookup: ScopeLookup) -> Vec<FunctionId> {
        let mut found = Vec::new();
        let mut current = Some(scope);
        while let Some(id) = current {
            found.extend_from_slice(self.scope(id).functions(key));
            if !lookup.contains(ScopeLookup::BASE) {
                break;
            }
            current = self.scope(id).base;
        }
        found
    }

    // ------------------------------------------------------------------
    // Types
    // ------------------------------------------------------------------

    pub fn declare_class(&mut self, scope: ScopeId, name: &str, span: Span) -> TypeId {
        let class_scope = self.add_scope(ScopeKind::Class, Some(name), scope);
        let qualified = self.qualified_name(scope, name);
        let ty = self.types.add(TypeSymbol {
            name: qualified,
            kind: TypeKind::Class(ClassInfo { scope: Some(class_scope), ..ClassInfo::default() }),
            span,
        });
        self.declare(scope, name, Symbol::Type(ty));
        ty
    }

    /// Declare `name<params...>`; returns the class and its type parameters.
    pub fn declare_generic_class(
        &mut self,
        scope: ScopeId,
        name: &str,
        params: &[&str],
        span: Span,
    ) -> (TypeId, Vec<TypeId>) {
        let class = self.declare_class(scope, name, span);
        let class_scope = self.types.scope_of(class).unwrap_or(scope);
        let type_params: Vec<TypeId> = params
            .iter()
            .enumerate()
            .map(|(index, param)| self.declare_type_parameter(class_scope, param, index))
            .collect();
        if let Some(info) = self.types.class_mut(class) {
            info.template_params = type_params.clone();
        }
        (class, type_params)
    }

    pub fn set_base_class(&mut self, class: TypeId, base: TypeId) {
        let base_scope = self.types.scope_of(base);
        let class_scope = self.types.scope_of(class);
        if let Some(info) = self.types.class_mut(class) {
            info.base = Some(base);
        }
        if let Some(scope) = class_scope {
            self.scope_mut(scope).base = base_scope;
        }
    }

    pub fn set_class_flags(&mut self, class: TypeId, flags: ClassFlags) {
        if let Some(info) = self.types.class_mut(class) {
            info.flags |= flags;
        }
    }

    pub fn add_member_variable(&mut self, class: TypeId, name: &str, ty: TypeId, span: Span) {
        if let Some(info) = self.types.class_mut(class) {
            info.members.push(MemberVariable { name: name.to_string(), ty, span });
        }
    }

    /// Declare an interface; its id is a digest of the qualified name.
    pub fn declare_interface(&mut self, scope: ScopeId, name: &str, span: Span) -> TypeId {
        let iface_scope = self.add_scope(ScopeKind::Interface, Some(name), scope);
        let qualified = self.qualified_name(scope, name);
        let digest = blake3::hash(qualified.as_bytes());
        let mut interface_id = [0u8; 16];
        interface_id.copy_from_slice(&digest.as_bytes()[..16]);
        let ty = self.types.add(TypeSymbol {
            name: qualified,
            kind: TypeKind::Interface(InterfaceInfo {
                methods: Vec::new(),
                interface_id,
                scope: Some(iface_scope),
            }),
            span,
        });
        self.declare(scope, name, Symbol::Type(ty));
        ty
    }

    pub fn implement_interface(&mut self, class: TypeId, interface: TypeId) {
        if let Some(info) = self.types.class_mut(class) {
            if !info.interfaces.contains(&interface) {
                info.interfaces.push(interface);
            }
        }
    }

    pub fn declare_enum(&mut self, scope: ScopeId, name: &str, underlying: TypeId, span: Span) -> TypeId {
        let enum_scope = self.add_scope(ScopeKind::Enum, Some(name), scope);
        let qualified = self.qualified_name(scope, name);
        let ty = self.types.add(TypeSymbol {
            name: qualified,
            kind: TypeKind::Enum(EnumInfo { underlying, scope: Some(enum_scope) }),
            span,
        });
        self.declare(scope, name, Symbol::Type(ty));
        ty
    }

    /// Add an enumerator; its value is the initializer in the enum's scope.
    pub fn add_enum_constant(&mut self, enum_ty: TypeId, name: &str, initializer: ConstExpr) -> Option<ConstantId> {
        let info = self.types.enumeration(enum_ty)?;
        let scope = info.scope?;
        let kind = self.types.basic_kind(info.underlying).and_then(ValueKind::of_basic);
        Some(self.declare_constant(scope, name, kind, initializer, Span::dummy()))
    }

    pub fn declare_delegate(
        &mut self,
        scope: ScopeId,
        name: &str,
        params: Vec<TypeId>,
        return_type: TypeId,
    ) -> TypeId {
        let qualified = self.qualified_name(scope, name);
        let ty = self.types.add(TypeSymbol {
            name: qualified,
            kind: TypeKind::Delegate(DelegateInfo { params, return_type }),
            span: Span::dummy(),
        });
        self.declare(scope, name, Symbol::Type(ty));
        ty
    }

    /// A type parameter type that is not entered into any scope.
    pub fn new_type_parameter(&mut self, name: &str, index: usize) -> TypeId {
        self.types.add(TypeSymbol {
            name: name.to_string(),
            kind: TypeKind::TypeParameter { index },
            span: Span::dummy(),
        })
    }

    pub fn declare_type_parameter(&mut self, scope: ScopeId, name: &str, index: usize) -> TypeId {
        let ty = self.new_type_parameter(name, index);
        self.declare(scope, name, Symbol::Type(ty));
        ty
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    pub fn function(&self, id: FunctionId) -> &FunctionSymbol {
        &self.functions[id.index()]
    }

    pub fn function_mut(&mut self, id: FunctionId) -> &mut FunctionSymbol {
        &mut self.functions[id.index()]
    }

    /// Add a function to the table without entering it into a scope.
    pub fn add_detached_function(&mut self, function: FunctionSymbol) -> FunctionId {
        let id = FunctionId(self.functions.len() as u32);
        self.functions.push(function);
        id
    }

    /// Declare a function in `scope`.
    ///
    /// Members of classes are classified: user special members, converting
    /// constructors and conversion functions are recorded on the class.
    pub fn add_function(&mut self, scope: ScopeId, mut function: FunctionSymbol) -> FunctionId {
        function.scope = Some(scope);
        let group = self.intern(&function.group_name);
        let parent = function.parent;
        let id = self.add_detached_function(function);
        self.scope_mut(scope).function_groups.entry(group).or_default().push(id);
        if let Some(parent) = parent {
            if self.types.is_class(parent) {
                self.register_class_member(parent, id);
            } else if let TypeKind::Interface(info) = &mut self.types.get_mut(parent).kind {
                info.methods.push(id);
            }
        }
        id
    }

    /// Which special member `function` is for `class`, if any.
    pub fn special_member_kind(&self, class: TypeId, function: &FunctionSymbol) -> Option<SpecialMembers> {
        let second = function.params.get(1).map(|p| p.ty);
        let copy_param = |ty: TypeId| self.types.is_const_reference(ty) && self.types.make_plain(ty) == class && self.types.pointer_count(ty) == 0;
        let move_param = |ty: TypeId| self.types.is_rvalue_reference(ty) && self.types.make_plain(ty) == class && self.types.pointer_count(ty) == 0;
        match function.kind {
            FunctionKind::Constructor => match (function.arity(), second) {
                (1, _) => Some(SpecialMembers::DEFAULT_CONSTRUCTOR),
                (2, Some(ty)) if copy_param(ty) => Some(SpecialMembers::COPY_CONSTRUCTOR),
                (2, Some(ty)) if move_param(ty) => Some(SpecialMembers::MOVE_CONSTRUCTOR),
                _ => None,
            },
            FunctionKind::Member if function.group_name == ASSIGNMENT && function.arity() == 2 => {
                match second {
                    Some(ty) if copy_param(ty) => Some(SpecialMembers::COPY_ASSIGNMENT),
                    Some(ty) if move_param(ty) => Some(SpecialMembers::MOVE_ASSIGNMENT),
                    _ => None,
                }
            }
            FunctionKind::Destructor => Some(SpecialMembers::DESTRUCTOR),
            _ => None,
        }
    }

    fn register_class_member(&mut self, class: TypeId, id: FunctionId) {
        let function = self.function(id);
        let special = self.special_member_kind(class, function);
        let generated = function.is_generated();
        let suppressed = function.is_suppressed();
        let explicit = function.is_explicit();
        let kind = function.kind;
        let arity = function.arity();
        let second = function.params.get(1).map(|p| p.ty);
        let return_type = function.return_type;

        let conversion = match (kind, special) {
            (FunctionKind::Constructor, None) if arity == 2 => second.map(|source| {
                let source = self.types.remove_const_reference(source);
                ConversionInfo { source, target: class, distance: 1, implicit: !explicit, user_defined: true }
            }),
            (FunctionKind::Conversion, _) => return_type.map(|target| {
                let target = self.types.remove_const_reference(target);
                ConversionInfo { source: class, target, distance: 1, implicit: !explicit, user_defined: true }
            }),
            _ => None,
        };
        if let Some(conversion) = conversion {
            let function = self.function_mut(id);
            if function.conversion.is_none() {
                function.conversion = Some(conversion);
            }
        }

        let Some(info) = self.types.class_mut(class) else { return };
        if conversion.is_some() {
            info.conversions.push(id);
        }
        if generated {
            return;
        }
        if kind == FunctionKind::Constructor
            && !matches!(special, Some(SpecialMembers::COPY_CONSTRUCTOR) | Some(SpecialMembers::MOVE_CONSTRUCTOR))
        {
            info.has_user_constructor = true;
        }
        if let Some(special) = special {
            info.user_defined |= special;
            if suppressed {
                info.suppressed |= special;
            }
        }
    }

    // ------------------------------------------------------------------
    // Concepts and constants
    // ------------------------------------------------------------------

    pub fn concept(&self, id: ConceptId) -> &ConceptSymbol {
        &self.concepts[id.index()]
    }

    pub fn declare_concept(&mut self, concept: ConceptSymbol) -> ConceptId {
        let scope = concept.scope;
        let key = self.intern(&concept.name);
        let id = ConceptId(self.concepts.len() as u32);
        self.concepts.push(concept);
        let entry = self
            .scope_mut(scope)
            .entries
            .entry(key)
            .or_insert_with(|| Symbol::Concepts(Vec::new()));
        match entry {
            Symbol::Concepts(group) => group.push(id),
            other => *other = Symbol::Concepts(vec![id]),
        }
        id
    }

    /// Declare a concept over fresh type parameters named `params`.
    pub fn declare_concept_with(
        &mut self,
        scope: ScopeId,
        name: &str,
        params: &[&str],
        body: Vec<ConstraintExpr>,
    ) -> ConceptId {
        let type_params = params
            .iter()
            .enumerate()
            .map(|(index, param)| self.new_type_parameter(param, index))
            .collect();
        self.declare_concept(ConceptSymbol {
            name: name.to_string(),
            type_params,
            type_param_names: params.iter().map(|p| p.to_string()).collect(),
            refines: None,
            body,
            scope,
            span: Span::dummy(),
        })
    }

    pub fn set_concept_refines(&mut self, id: ConceptId, refines: crate::ast::ConceptRef) {
        self.concepts[id.index()].refines = Some(refines);
    }

    /// Install the intrinsic concepts into `System.Concepts`.
    pub fn register_core_concepts(&mut self) -> ScopeId {
        let namespace = self.add_namespace(self.global, CORE_CONCEPTS_NAMESPACE);
        let intrinsics: [(&str, &[&str], ConstraintExpr); 6] = [
            ("Same", &["T", "U"], ConstraintExpr::Same),
            ("Derived", &["T", "U"], ConstraintExpr::Derived),
            ("Convertible", &["T", "U"], ConstraintExpr::Convertible),
            ("ExplicitlyConvertible", &["T", "U"], ConstraintExpr::ExplicitlyConvertible),
            ("Common", &["T", "U"], ConstraintExpr::Common),
            ("NonReferenceType", &["T"], ConstraintExpr::NonReferenceType),
        ];
        for (name, params, node) in intrinsics {
            let existing = self.lookup(namespace, name, ScopeLookup::THIS, SymbolFilter::CONCEPTS);
            if existing.is_none() {
                self.declare_concept_with(namespace, name, params, vec![node]);
            }
        }
        self.add_file_scope(namespace);
        namespace
    }

    pub fn constant(&self, id: ConstantId) -> &ConstantSymbol {
        &self.constants[id.index()]
    }

    pub fn constant_mut(&mut self, id: ConstantId) -> &mut ConstantSymbol {
        &mut self.constants[id.index()]
    }

    pub fn declare_constant(
        &mut self,
        scope: ScopeId,
        name: &str,
        kind: Option<ValueKind>,
        initializer: ConstExpr,
        span: Span,
    ) -> ConstantId {
        let id = ConstantId(self.constants.len() as u32);
        self.constants.push(ConstantSymbol {
            name: name.to_string(),
            kind,
            initializer,
            scope,
            state: ConstantState::Unevaluated,
            span,
        });
        self.declare(scope, name, Symbol::Constant(id));
        id
    }

    pub fn signature(&self, id: FunctionId) -> String {
        self.function(id).signature(&self.types)
    }
}
