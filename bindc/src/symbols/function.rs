//! Function symbols.
//!
//! Member functions, constructors, destructors and conversion functions
//! take their `this` pointer as the first parameter, so a call-site argument
//! list always lines up with the parameter list.

use bitflags::bitflags;

use crate::ast::{BinaryOp, ConstraintExpr, UnaryOp};
use crate::bound::BoundBody;
use crate::span::Span;

use super::scope::ScopeId;
use super::types::{TypeId, TypeRepository};

/// Group name shared by all constructors.
pub const CONSTRUCTOR: &str = "@constructor";
/// Group name shared by all destructors.
pub const DESTRUCTOR: &str = "@destructor";
/// Group name of copy and move assignment.
pub const ASSIGNMENT: &str = "operator=";
/// Group name of conversion functions (`operator T()`).
pub const CONVERSION: &str = "@conversion";

/// Index of a function in the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(pub(crate) u32);

impl FunctionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FunctionKind {
    Free,
    Member,
    Constructor,
    Destructor,
    Conversion,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FunctionFlags: u16 {
        /// Usable as a conversion only in explicit (cast) context.
        const EXPLICIT = 1 << 0;
        /// Declared `= delete`.
        const SUPPRESSED = 1 << 1;
        const STATIC = 1 << 2;
        /// An explicit specialization of a function template.
        const SPECIALIZATION = 1 << 3;
        const ARRAY_CONSTRUCTOR = 1 << 4;
        const ARRAY_ASSIGNMENT = 1 << 5;
        /// Compiler-generated.
        const GENERATED = 1 << 6;
        const VIRTUAL = 1 << 7;
        const OVERRIDE = 1 << 8;
        /// Built-in operation with an intrinsic implementation.
        const BUILTIN = 1 << 9;
    }
}

/// The primitive operation a built-in function stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    DefaultInit,
    CopyInit,
    MoveInit,
    CopyAssign,
    MoveAssign,
    Binary(BinaryOp),
    Unary(UnaryOp),
    /// Basic-type value conversion.
    NumericConversion,
    NullToPointer,
    PointerToVoid,
    /// `void*` to a typed pointer; explicit only.
    VoidToPointer,
    /// `ptr + offset` or `ptr - offset`.
    PointerOffset(BinaryOp),
    PointerDifference,
    Dereference,
    ArrayDecay,
    EnumToUnderlying,
    UnderlyingToEnum,
    /// Derived-to-base class pointer cast.
    UpCast,
    /// Base-to-derived class pointer cast.
    DownCast,
    /// Build an interface object from a class object via vtable lookup.
    InterfaceFromClass,
}

/// Conversion properties of a conversion function or converting constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConversionInfo {
    pub source: TypeId,
    pub target: TypeId,
    pub distance: u32,
    pub implicit: bool,
    /// Declared by the user rather than built in.
    pub user_defined: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeId,
}

/// A function, function template or built-in operation.
#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    pub name: String,
    pub group_name: String,
    pub kind: FunctionKind,
    /// Owning class, interface or enum.
    pub parent: Option<TypeId>,
    /// Declaring scope; template instances resolve their names from here.
    pub scope: Option<ScopeId>,
    pub params: Vec<Parameter>,
    pub return_type: Option<TypeId>,
    pub type_params: Vec<TypeId>,
    /// `where` clause of a function template.
    pub constraint: Option<ConstraintExpr>,
    pub flags: FunctionFlags,
    pub conversion: Option<ConversionInfo>,
    pub intrinsic: Option<Intrinsic>,
    /// The template this function was instantiated from.
    pub instance_of: Option<FunctionId>,
    pub template_args: Vec<TypeId>,
    /// Scope binding the template parameters of an instance.
    pub instance_scope: Option<ScopeId>,
    /// Generated body of a synthesized special member.
    pub body: Option<BoundBody>,
    pub span: Span,
}

impl FunctionSymbol {
    pub fn new(group_name: &str, kind: FunctionKind) -> Self {
        Self {
            name: group_name.to_string(),
            group_name: group_name.to_string(),
            kind,
            parent: None,
            scope: None,
            params: Vec::new(),
            return_type: None,
            type_params: Vec::new(),
            constraint: None,
            flags: FunctionFlags::empty(),
            conversion: None,
            intrinsic: None,
            instance_of: None,
            template_args: Vec::new(),
            instance_scope: None,
            body: None,
            span: Span::dummy(),
        }
    }

    pub fn free(group_name: &str) -> Self {
        Self::new(group_name, FunctionKind::Free)
    }

    /// A member function; `this_type` is the `C*` first parameter.
    pub fn member(group_name: &str, class: TypeId, this_type: TypeId) -> Self {
        Self::new(group_name, FunctionKind::Member).with_parent(class).with_param("this", this_type)
    }

    pub fn constructor(class: TypeId, this_type: TypeId) -> Self {
        Self::new(CONSTRUCTOR, FunctionKind::Constructor)
            .with_parent(class)
            .with_param("this", this_type)
    }

    pub fn destructor(class: TypeId, this_type: TypeId) -> Self {
        Self::new(DESTRUCTOR, FunctionKind::Destructor)
            .with_parent(class)
            .with_param("this", this_type)
    }

    /// A user conversion function `operator target()` of `class`.
    pub fn conversion_function(class: TypeId, this_type: TypeId, target: TypeId) -> Self {
        Self::new(CONVERSION, FunctionKind::Conversion)
            .with_parent(class)
            .with_param("this", this_type)
            .returns(target)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_parent(mut self, parent: TypeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_param(mut self, name: &str, ty: TypeId) -> Self {
        self.params.push(Parameter { name: name.to_string(), ty });
        self
    }

    pub fn returns(mut self, ty: TypeId) -> Self {
        self.return_type = Some(ty);
        self
    }

    pub fn with_flags(mut self, flags: FunctionFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn with_type_params(mut self, type_params: Vec<TypeId>) -> Self {
        self.type_params = type_params;
        self
    }

    pub fn with_constraint(mut self, constraint: ConstraintExpr) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_intrinsic(mut self, intrinsic: Intrinsic) -> Self {
        self.intrinsic = Some(intrinsic);
        self.flags |= FunctionFlags::BUILTIN;
        self
    }

    pub fn with_conversion(mut self, conversion: ConversionInfo) -> Self {
        self.conversion = Some(conversion);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_template(&self) -> bool {
        !self.type_params.is_empty()
    }

    pub fn is_specialization(&self) -> bool {
        self.flags.contains(FunctionFlags::SPECIALIZATION)
    }

    pub fn is_explicit(&self) -> bool {
        self.flags.contains(FunctionFlags::EXPLICIT)
    }

    pub fn is_suppressed(&self) -> bool {
        self.flags.contains(FunctionFlags::SUPPRESSED)
    }

    pub fn is_generated(&self) -> bool {
        self.flags.contains(FunctionFlags::GENERATED)
    }

    pub fn is_array_operation(&self) -> bool {
        self.flags.intersects(FunctionFlags::ARRAY_CONSTRUCTOR | FunctionFlags::ARRAY_ASSIGNMENT)
    }

    pub fn param_types(&self) -> Vec<TypeId> {
        self.params.iter().map(|p| p.ty).collect()
    }

    /// Human-readable signature, e.g. `operator<(int, int)` or `Foo.bar(int)`.
    ///
    /// The `this` parameter of members is omitted.
    pub fn signature(&self, types: &TypeRepository) -> String {
        let skip = usize::from(self.parent.is_some() && self.kind != FunctionKind::Free && !self.params.is_empty());
        let params: Vec<&str> = self.params[skip..].iter().map(|p| types.name(p.ty)).collect();
        let name = match self.kind {
            FunctionKind::Constructor | FunctionKind::Destructor | FunctionKind::Conversion => {
                self.display_name(types)
            }
            _ => self.name.clone(),
        };
        let mut signature = match self.parent {
            Some(parent) if self.kind != FunctionKind::Free => {
                format!("{}.{}({})", types.name(parent), name, params.join(", "))
            }
            _ => format!("{}({})", name, params.join(", ")),
        };
        if !self.template_args.is_empty() {
            let args: Vec<&str> = self.template_args.iter().map(|&t| types.name(t)).collect();
            signature.push_str(&format!(" [with {}]", args.join(", ")));
        }
        signature
    }

    fn display_name(&self, types: &TypeRepository) -> String {
        match (self.kind, self.parent) {
            (FunctionKind::Constructor, Some(parent)) => types.name(parent).to_string(),
            (FunctionKind::Destructor, Some(parent)) => format!("~{}", types.name(parent)),
            (FunctionKind::Conversion, _) => match self.return_type {
                Some(ty) => format!("operator {}", types.name(ty)),
                None => self.name.clone(),
            },
            _ => self.name.clone(),
        }
    }
}
