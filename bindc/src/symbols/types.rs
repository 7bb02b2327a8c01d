//! Type identities and the type repository.
//!
//! Every type the binder can mention is interned here and referred to by a
//! [`TypeId`]. Derived types (pointer, reference, const, array) are interned
//! by `(base, derivations)`, so two derived types are equal iff their base
//! types and derivation lists are structurally equal.

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use crate::span::Span;

use super::function::FunctionId;
use super::scope::ScopeId;

/// Interned type identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BasicKind {
    Bool,
    Char,
    SByte,
    Byte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    Void,
    Null,
}

impl BasicKind {
    pub const ALL: [BasicKind; 14] = [
        BasicKind::Bool,
        BasicKind::Char,
        BasicKind::SByte,
        BasicKind::Byte,
        BasicKind::Short,
        BasicKind::UShort,
        BasicKind::Int,
        BasicKind::UInt,
        BasicKind::Long,
        BasicKind::ULong,
        BasicKind::Float,
        BasicKind::Double,
        BasicKind::Void,
        BasicKind::Null,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Char => "char",
            BasicKind::SByte => "sbyte",
            BasicKind::Byte => "byte",
            BasicKind::Short => "short",
            BasicKind::UShort => "ushort",
            BasicKind::Int => "int",
            BasicKind::UInt => "uint",
            BasicKind::Long => "long",
            BasicKind::ULong => "ulong",
            BasicKind::Float => "float",
            BasicKind::Double => "double",
            BasicKind::Void => "void",
            BasicKind::Null => "@nullptr_type",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BasicKind::SByte
                | BasicKind::Byte
                | BasicKind::Short
                | BasicKind::UShort
                | BasicKind::Int
                | BasicKind::UInt
                | BasicKind::Long
                | BasicKind::ULong
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, BasicKind::Float | BasicKind::Double)
    }

    /// Types that support arithmetic operators.
    pub fn is_arithmetic(self) -> bool {
        self.is_integer() || self.is_float()
    }
}

/// Reference part of a derivation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub enum RefKind {
    #[default]
    None,
    Lvalue,
    Rvalue,
}

/// The derivation list of a derived type: `const`, pointers, array
/// dimensions and a trailing reference.
///
/// `const` qualifies the base (`const T*` is a pointer to const T).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Derivations {
    pub is_const: bool,
    pub pointers: u8,
    pub arrays: Vec<u64>,
    pub reference: RefKind,
}

impl Derivations {
    pub fn is_empty(&self) -> bool {
        !self.is_const && self.pointers == 0 && self.arrays.is_empty() && self.reference == RefKind::None
    }

    pub fn counts(&self) -> DerivationCounts {
        DerivationCounts {
            is_const: self.is_const,
            pointers: self.pointers,
            arrays: u8::try_from(self.arrays.len()).unwrap_or(u8::MAX),
            reference: self.reference,
        }
    }

    /// Same indirection shape, ignoring const and reference.
    pub fn same_shape(&self, other: &Derivations) -> bool {
        self.pointers == other.pointers && self.arrays == other.arrays
    }
}

/// Counts of a derivation list; the tie-break input of argument matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DerivationCounts {
    pub is_const: bool,
    pub pointers: u8,
    pub arrays: u8,
    pub reference: RefKind,
}

bitflags! {
    /// Class-level flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClassFlags: u8 {
        const STATIC = 1 << 0;
        /// The class introduces or overrides virtual functions.
        const POLYMORPHIC = 1 << 1;
        const ABSTRACT = 1 << 2;
    }
}

bitflags! {
    /// A set of special member functions.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SpecialMembers: u8 {
        const DEFAULT_CONSTRUCTOR = 1 << 0;
        const COPY_CONSTRUCTOR = 1 << 1;
        const MOVE_CONSTRUCTOR = 1 << 2;
        const COPY_ASSIGNMENT = 1 << 3;
        const MOVE_ASSIGNMENT = 1 << 4;
        const DESTRUCTOR = 1 << 5;
        /// The members whose presence disables implicit copy and move.
        const COPY_MOVE_DESTRUCTOR = Self::COPY_CONSTRUCTOR.bits()
            | Self::MOVE_CONSTRUCTOR.bits()
            | Self::COPY_ASSIGNMENT.bits()
            | Self::MOVE_ASSIGNMENT.bits()
            | Self::DESTRUCTOR.bits();
    }
}

/// A data member of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberVariable {
    pub name: String,
    pub ty: TypeId,
    pub span: Span,
}

/// Class description.
#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    /// Single optional base class.
    pub base: Option<TypeId>,
    /// Data members in declaration order.
    pub members: Vec<MemberVariable>,
    /// Converting constructors and conversion functions declared by the class.
    pub conversions: Vec<FunctionId>,
    /// Implemented interfaces.
    pub interfaces: Vec<TypeId>,
    /// Member scope.
    pub scope: Option<ScopeId>,
    pub flags: ClassFlags,
    /// User-declared special members.
    pub user_defined: SpecialMembers,
    /// Special members declared `= delete`.
    pub suppressed: SpecialMembers,
    /// Any user-declared constructor other than copy and move.
    pub has_user_constructor: bool,
    /// Virtual table slot of the class (0 when not polymorphic).
    pub vmt_index: u32,
    /// Type parameters of a generic class.
    pub template_params: Vec<TypeId>,
    /// `(subject, arguments)` for an instance of a generic class.
    pub instance_of: Option<(TypeId, Vec<TypeId>)>,
}

impl ClassInfo {
    pub fn is_static(&self) -> bool {
        self.flags.contains(ClassFlags::STATIC)
    }

    pub fn is_polymorphic(&self) -> bool {
        self.flags.contains(ClassFlags::POLYMORPHIC)
    }

    pub fn is_generic(&self) -> bool {
        !self.template_params.is_empty()
    }
}

/// Interface description.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    /// Member function signatures, in vtable order.
    pub methods: Vec<FunctionId>,
    /// Globally unique 128-bit interface id.
    pub interface_id: [u8; 16],
    pub scope: Option<ScopeId>,
}

/// Enumerated type description.
#[derive(Debug, Clone)]
pub struct EnumInfo {
    pub underlying: TypeId,
    pub scope: Option<ScopeId>,
}

/// Delegate (function pointer) type description.
#[derive(Debug, Clone)]
pub struct DelegateInfo {
    pub params: Vec<TypeId>,
    pub return_type: TypeId,
}

/// The shape of a type.
#[derive(Debug, Clone)]
pub enum TypeKind {
    Basic(BasicKind),
    Derived { base: TypeId, derivations: Derivations },
    Class(ClassInfo),
    Interface(InterfaceInfo),
    Enum(EnumInfo),
    Delegate(DelegateInfo),
    /// A type parameter of a generic function, class or concept.
    TypeParameter { index: usize },
}

/// A type entry of the repository.
#[derive(Debug, Clone)]
pub struct TypeSymbol {
    /// Qualified name for nominal types; display name for derived types.
    pub name: String,
    pub kind: TypeKind,
    pub span: Span,
}

/// Interning repository for every type of a compile unit.
#[derive(Debug)]
pub struct TypeRepository {
    types: Vec<TypeSymbol>,
    basics: FxHashMap<BasicKind, TypeId>,
    derived: FxHashMap<(TypeId, Derivations), TypeId>,
    instances: FxHashMap<(TypeId, Vec<TypeId>), TypeId>,
}

impl Default for TypeRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRepository {
    pub fn new() -> Self {
        let mut repo = Self {
            types: Vec::new(),
            basics: FxHashMap::default(),
            derived: FxHashMap::default(),
            instances: FxHashMap::default(),
        };
        for kind in BasicKind::ALL {
            let id = repo.add(TypeSymbol {
                name: kind.name().to_string(),
                kind: TypeKind::Basic(kind),
                span: Span::dummy(),
            });
            repo.basics.insert(kind, id);
        }
        repo
    }

    /// Add a nominal type.
    pub fn add(&mut self, symbol: TypeSymbol) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(symbol);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeSymbol {
        &self.types[id.index()]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeSymbol {
        &mut self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn basic(&self, kind: BasicKind) -> TypeId {
        self.basics[&kind]
    }

    pub fn bool(&self) -> TypeId {
        self.basic(BasicKind::Bool)
    }

    pub fn int(&self) -> TypeId {
        self.basic(BasicKind::Int)
    }

    pub fn long(&self) -> TypeId {
        self.basic(BasicKind::Long)
    }

    pub fn double(&self) -> TypeId {
        self.basic(BasicKind::Double)
    }

    pub fn void(&self) -> TypeId {
        self.basic(BasicKind::Void)
    }

    pub fn null(&self) -> TypeId {
        self.basic(BasicKind::Null)
    }

    pub fn void_ptr(&mut self) -> TypeId {
        let void = self.void();
        self.make_pointer(void)
    }

    // ------------------------------------------------------------------
    // Derivations
    // ------------------------------------------------------------------

    /// Split a type into its plain base and derivation list.
    pub fn split(&self, ty: TypeId) -> (TypeId, Derivations) {
        match &self.get(ty).kind {
            TypeKind::Derived { base, derivations } => (*base, derivations.clone()),
            _ => (ty, Derivations::default()),
        }
    }

    pub fn derivations(&self, ty: TypeId) -> Derivations {
        self.split(ty).1
    }

    /// Intern `base` with `derivations`. `base` may itself be derived.
    pub fn make_derived(&mut self, base: TypeId, derivations: Derivations) -> TypeId {
        let (plain, existing) = self.split(base);
        let merged = Derivations {
            is_const: existing.is_const || derivations.is_const,
            pointers: existing.pointers.saturating_add(derivations.pointers),
            arrays: existing.arrays.iter().chain(&derivations.arrays).copied().collect(),
            reference: if derivations.reference != RefKind::None {
                derivations.reference
            } else {
                existing.reference
            },
        };
        self.intern_derived(plain, merged)
    }

    fn intern_derived(&mut self, plain: TypeId, derivations: Derivations) -> TypeId {
        if derivations.is_empty() {
            return plain;
        }
        if let Some(&id) = self.derived.get(&(plain, derivations.clone())) {
            return id;
        }
        let name = self.derived_name(plain, &derivations);
        let id = self.add(TypeSymbol {
            name,
            kind: TypeKind::Derived { base: plain, derivations: derivations.clone() },
            span: Span::dummy(),
        });
        self.derived.insert((plain, derivations), id);
        id
    }

    fn derived_name(&self, plain: TypeId, derivations: &Derivations) -> String {
        let mut name = String::new();
        if derivations.is_const {
            name.push_str("const ");
        }
        name.push_str(&self.get(plain).name);
        for _ in 0..derivations.pointers {
            name.push('*');
        }
        for dim in &derivations.arrays {
            name.push_str(&format!("[{}]", dim));
        }
        match derivations.reference {
            RefKind::None => {}
            RefKind::Lvalue => name.push('&'),
            RefKind::Rvalue => name.push_str("&&"),
        }
        name
    }

    fn rebuild(&mut self, ty: TypeId, f: impl FnOnce(&mut Derivations)) -> TypeId {
        let (plain, mut derivations) = self.split(ty);
        f(&mut derivations);
        self.intern_derived(plain, derivations)
    }

    pub fn make_pointer(&mut self, ty: TypeId) -> TypeId {
        self.rebuild(ty, |d| {
            d.reference = RefKind::None;
            d.pointers = d.pointers.saturating_add(1);
        })
    }

    pub fn make_reference(&mut self, ty: TypeId) -> TypeId {
        self.rebuild(ty, |d| d.reference = RefKind::Lvalue)
    }

    pub fn make_rvalue_reference(&mut self, ty: TypeId) -> TypeId {
        self.rebuild(ty, |d| d.reference = RefKind::Rvalue)
    }

    pub fn make_const(&mut self, ty: TypeId) -> TypeId {
        self.rebuild(ty, |d| d.is_const = true)
    }

    pub fn make_const_reference(&mut self, ty: TypeId) -> TypeId {
        self.rebuild(ty, |d| {
            d.is_const = true;
            d.reference = RefKind::Lvalue;
        })
    }

    pub fn make_array(&mut self, ty: TypeId, size: u64) -> TypeId {
        self.rebuild(ty, |d| d.arrays.push(size))
    }

    /// Strip every derivation.
    pub fn make_plain(&self, ty: TypeId) -> TypeId {
        self.split(ty).0
    }

    pub fn remove_reference(&mut self, ty: TypeId) -> TypeId {
        self.rebuild(ty, |d| d.reference = RefKind::None)
    }

    pub fn remove_const(&mut self, ty: TypeId) -> TypeId {
        self.rebuild(ty, |d| d.is_const = false)
    }

    /// The value type: const and reference removed, indirection kept.
    pub fn remove_const_reference(&mut self, ty: TypeId) -> TypeId {
        self.rebuild(ty, |d| {
            d.is_const = false;
            d.reference = RefKind::None;
        })
    }

    pub fn remove_pointer(&mut self, ty: TypeId) -> TypeId {
        self.rebuild(ty, |d| d.pointers = d.pointers.saturating_sub(1))
    }

    /// Element type of an array type.
    pub fn element_type(&mut self, ty: TypeId) -> TypeId {
        self.rebuild(ty, |d| {
            d.arrays.pop();
        })
    }

    pub fn is_pointer(&self, ty: TypeId) -> bool {
        let d = self.derivations(ty);
        d.pointers > 0 && d.reference == RefKind::None && d.arrays.is_empty()
    }

    pub fn is_lvalue_reference(&self, ty: TypeId) -> bool {
        self.derivations(ty).reference == RefKind::Lvalue
    }

    pub fn is_rvalue_reference(&self, ty: TypeId) -> bool {
        self.derivations(ty).reference == RefKind::Rvalue
    }

    pub fn is_reference(&self, ty: TypeId) -> bool {
        self.derivations(ty).reference != RefKind::None
    }

    pub fn is_const(&self, ty: TypeId) -> bool {
        self.derivations(ty).is_const
    }

    pub fn is_const_reference(&self, ty: TypeId) -> bool {
        let d = self.derivations(ty);
        d.is_const && d.reference == RefKind::Lvalue
    }

    pub fn is_array(&self, ty: TypeId) -> bool {
        !self.derivations(ty).arrays.is_empty()
    }

    pub fn pointer_count(&self, ty: TypeId) -> u8 {
        self.derivations(ty).pointers
    }

    // ------------------------------------------------------------------
    // Nominal queries
    // ------------------------------------------------------------------

    pub fn basic_kind(&self, ty: TypeId) -> Option<BasicKind> {
        match self.get(ty).kind {
            TypeKind::Basic(kind) => Some(kind),
            _ => None,
        }
    }

    pub fn class(&self, ty: TypeId) -> Option<&ClassInfo> {
        match &self.get(ty).kind {
            TypeKind::Class(info) => Some(info),
            _ => None,
        }
    }

    pub fn class_mut(&mut self, ty: TypeId) -> Option<&mut ClassInfo> {
        match &mut self.get_mut(ty).kind {
            TypeKind::Class(info) => Some(info),
            _ => None,
        }
    }

    pub fn interface(&self, ty: TypeId) -> Option<&InterfaceInfo> {
        match &self.get(ty).kind {
            TypeKind::Interface(info) => Some(info),
            _ => None,
        }
    }

    pub fn enumeration(&self, ty: TypeId) -> Option<&EnumInfo> {
        match &self.get(ty).kind {
            TypeKind::Enum(info) => Some(info),
            _ => None,
        }
    }

    pub fn delegate(&self, ty: TypeId) -> Option<&DelegateInfo> {
        match &self.get(ty).kind {
            TypeKind::Delegate(info) => Some(info),
            _ => None,
        }
    }

    pub fn is_class(&self, ty: TypeId) -> bool {
        self.class(ty).is_some()
    }

    pub fn is_type_parameter(&self, ty: TypeId) -> bool {
        matches!(self.get(ty).kind, TypeKind::TypeParameter { .. })
    }

    /// The class a `C*`, `C&` or `C` refers to.
    pub fn class_of(&self, ty: TypeId) -> Option<TypeId> {
        let plain = self.make_plain(ty);
        self.is_class(plain).then_some(plain)
    }

    /// The member scope of a nominal type.
    pub fn scope_of(&self, ty: TypeId) -> Option<ScopeId> {
        match &self.get(self.make_plain(ty)).kind {
            TypeKind::Class(info) => info.scope,
            TypeKind::Interface(info) => info.scope,
            TypeKind::Enum(info) => info.scope,
            _ => None,
        }
    }

    /// Number of base-class hops from `derived` up to `base`.
    ///
    /// `Some(0)` when the classes are the same; `None` when `base` is not an
    /// ancestor.
    pub fn base_class_distance(&self, derived: TypeId, base: TypeId) -> Option<u32> {
        let mut current = Some(derived);
        let mut hops = 0;
        while let Some(class) = current {
            if class == base {
                return Some(hops);
            }
            current = self.class(class).and_then(|info| info.base);
            hops += 1;
        }
        None
    }

    pub fn has_base_class(&self, derived: TypeId, base: TypeId) -> bool {
        matches!(self.base_class_distance(derived, base), Some(hops) if hops > 0)
    }

    /// Whether the class implements `interface`, directly or through a base.
    pub fn implements(&self, class: TypeId, interface: TypeId) -> bool {
        let mut current = Some(class);
        while let Some(c) = current {
            let Some(info) = self.class(c) else { break };
            if info.interfaces.contains(&interface) {
                return true;
            }
            current = info.base;
        }
        false
    }

    // ------------------------------------------------------------------
    // Generics
    // ------------------------------------------------------------------

    /// Whether a type mentions a type parameter.
    pub fn is_generic(&self, ty: TypeId) -> bool {
        let plain = self.make_plain(ty);
        match &self.get(plain).kind {
            TypeKind::TypeParameter { .. } => true,
            TypeKind::Class(info) => match &info.instance_of {
                Some((_, args)) => args.iter().any(|&arg| self.is_generic(arg)),
                None => false,
            },
            _ => false,
        }
    }

    /// Replace type parameters according to `mapping`.
    pub fn substitute(&mut self, ty: TypeId, mapping: &FxHashMap<TypeId, TypeId>) -> TypeId {
        let (plain, derivations) = self.split(ty);
        let replaced = if let Some(&to) = mapping.get(&plain) {
            to
        } else if let Some((subject, args)) = self.class(plain).and_then(|c| c.instance_of.clone()) {
            let args: Vec<TypeId> = args.iter().map(|&arg| self.substitute(arg, mapping)).collect();
            self.instantiate_class(subject, &args)
        } else {
            plain
        };
        self.make_derived(replaced, derivations)
    }

    /// Intern the instance `subject<args>` of a generic class.
    ///
    /// The instance shares the subject's member scope; data member and base
    /// types are substituted.
    pub fn instantiate_class(&mut self, subject: TypeId, args: &[TypeId]) -> TypeId {
        if let Some(&id) = self.instances.get(&(subject, args.to_vec())) {
            return id;
        }
        let Some(info) = self.class(subject).cloned() else {
            return subject;
        };
        let mapping: FxHashMap<TypeId, TypeId> =
            info.template_params.iter().copied().zip(args.iter().copied()).collect();
        let base = info.base.map(|b| self.substitute(b, &mapping));
        let members = info
            .members
            .iter()
            .map(|m| MemberVariable { name: m.name.clone(), ty: self.substitute(m.ty, &mapping), span: m.span })
            .collect();
        let arg_names: Vec<&str> = args.iter().map(|&a| self.get(a).name.as_str()).collect();
        let name = format!("{}<{}>", self.get(subject).name, arg_names.join(", "));
        let span = self.get(subject).span;
        let instance = ClassInfo {
            base,
            members,
            template_params: Vec::new(),
            instance_of: Some((subject, args.to_vec())),
            ..info
        };
        let id = self.add(TypeSymbol { name, kind: TypeKind::Class(instance), span });
        self.instances.insert((subject, args.to_vec()), id);
        id
    }

    /// `(subject, arguments)` of a class instance, after stripping derivations.
    pub fn instance_of(&self, ty: TypeId) -> Option<(TypeId, Vec<TypeId>)> {
        self.class(self.make_plain(ty)).and_then(|c| c.instance_of.clone())
    }

    /// Template parameter mapping of a class instance.
    pub fn instance_mapping(&self, ty: TypeId) -> FxHashMap<TypeId, TypeId> {
        let Some((subject, args)) = self.instance_of(ty) else {
            return FxHashMap::default();
        };
        match self.class(subject) {
            Some(info) => info.template_params.iter().copied().zip(args).collect(),
            None => FxHashMap::default(),
        }
    }

    pub fn name(&self, ty: TypeId) -> &str {
        &self.get(ty).name
    }
}
