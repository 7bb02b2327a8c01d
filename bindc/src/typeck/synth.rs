//! Synthesized special member functions.
//!
//! # Algorithm
//!
//! ```text
//! preconditions (each its own failure):
//!   class is static
//!   the member is suppressed
//!   default constructor: a user-defined constructor exists
//!   copy/move: a user-defined copy/move operation or destructor exists
//! constructors and assignments:
//!   base sub-operation on `this` up-cast to the base (and the sliced `that`)
//!   virtual method table pointer, for polymorphic constructors
//!   one sub-operation per data member, in declaration order
//! destructors:
//!   data members in reverse order, then the base; only those that need it
//! ```
//!
//! Sub-operations are ordinary overload resolutions; the first failure
//! aborts generation. Results, successful or not, are cached per
//! (class, member kind).

use std::fmt;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::bound::{BoundBody, BoundCall, BoundExpr, BoundStatement, InitTarget};
use crate::error::{BindError, SynthesisFailure};
use crate::symbols::{
    ClassInfo, FunctionFlags, FunctionId, FunctionSymbol, Intrinsic, SpecialMembers, TypeId, ASSIGNMENT,
    CONSTRUCTOR, DESTRUCTOR,
};

use super::conversion::Argument;
use super::overload::OverloadRequest;
use super::Binder;

/// The special member functions the binder can generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialMemberKind {
    DefaultConstructor,
    CopyConstructor,
    MoveConstructor,
    CopyAssignment,
    MoveAssignment,
    Destructor,
}

impl SpecialMemberKind {
    pub fn member(self) -> SpecialMembers {
        match self {
            SpecialMemberKind::DefaultConstructor => SpecialMembers::DEFAULT_CONSTRUCTOR,
            SpecialMemberKind::CopyConstructor => SpecialMembers::COPY_CONSTRUCTOR,
            SpecialMemberKind::MoveConstructor => SpecialMembers::MOVE_CONSTRUCTOR,
            SpecialMemberKind::CopyAssignment => SpecialMembers::COPY_ASSIGNMENT,
            SpecialMemberKind::MoveAssignment => SpecialMembers::MOVE_ASSIGNMENT,
            SpecialMemberKind::Destructor => SpecialMembers::DESTRUCTOR,
        }
    }

    pub fn is_constructor(self) -> bool {
        matches!(
            self,
            SpecialMemberKind::DefaultConstructor
                | SpecialMemberKind::CopyConstructor
                | SpecialMemberKind::MoveConstructor
        )
    }

    pub fn is_assignment(self) -> bool {
        matches!(self, SpecialMemberKind::CopyAssignment | SpecialMemberKind::MoveAssignment)
    }

    fn is_move(self) -> bool {
        matches!(self, SpecialMemberKind::MoveConstructor | SpecialMemberKind::MoveAssignment)
    }

    /// Whether the member takes a second, source object parameter.
    fn takes_source(self) -> bool {
        !matches!(self, SpecialMemberKind::DefaultConstructor | SpecialMemberKind::Destructor)
    }

    fn group(self) -> &'static str {
        if self.is_constructor() {
            CONSTRUCTOR
        } else if self.is_assignment() {
            ASSIGNMENT
        } else {
            DESTRUCTOR
        }
    }
}

impl fmt::Display for SpecialMemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpecialMemberKind::DefaultConstructor => "default constructor",
            SpecialMemberKind::CopyConstructor => "copy constructor",
            SpecialMemberKind::MoveConstructor => "move constructor",
            SpecialMemberKind::CopyAssignment => "copy assignment",
            SpecialMemberKind::MoveAssignment => "move assignment",
            SpecialMemberKind::Destructor => "destructor",
        };
        f.write_str(name)
    }
}

/// Generated special members, and generation failures, per class.
#[derive(Debug, Default)]
pub struct SynthesizedClassFunCache {
    functions: FxHashMap<(TypeId, SpecialMemberKind), Result<FunctionId, BindError>>,
}

impl SynthesizedClassFunCache {
    pub fn get(&self, class: TypeId, kind: SpecialMemberKind) -> Option<&Result<FunctionId, BindError>> {
        self.functions.get(&(class, kind))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Parameter types of the member being generated.
struct MemberParams {
    this: TypeId,
    that: Option<TypeId>,
}

impl Binder {
    /// The generated `kind` member of `class`, created on first request.
    pub fn generate_special_member(
        &mut self,
        class: TypeId,
        kind: SpecialMemberKind,
    ) -> Result<FunctionId, BindError> {
        if let Some(cached) = self.synthesized.get(class, kind) {
            return cached.clone();
        }
        let result = self.synthesize(class, kind);
        self.synthesized.functions.insert((class, kind), result.clone());
        result
    }

    fn synthesize(&mut self, class: TypeId, kind: SpecialMemberKind) -> Result<FunctionId, BindError> {
        let symbol = self.symbols.types().get(class);
        let span = symbol.span;
        let class_name = symbol.name.clone();
        let fail = |reason: SynthesisFailure| BindError::SpecialMemberGeneration {
            member: kind.to_string(),
            class: class_name.clone(),
            reason,
            span,
        };
        let Some(info) = self.symbols.types().class(class).cloned() else {
            return Err(BindError::not_supported(&kind.to_string(), class_name.clone()));
        };

        // Preconditions.
        if info.is_static() {
            return Err(fail(SynthesisFailure::StaticClass));
        }
        if info.suppressed.contains(kind.member()) {
            return Err(fail(SynthesisFailure::Suppressed));
        }
        if kind == SpecialMemberKind::DefaultConstructor && info.has_user_constructor {
            return Err(fail(SynthesisFailure::UserDefinedConstructor));
        }
        let blocked = if kind == SpecialMemberKind::Destructor {
            info.user_defined.contains(SpecialMembers::DESTRUCTOR)
        } else {
            kind.takes_source() && info.user_defined.intersects(SpecialMembers::COPY_MOVE_DESTRUCTOR)
        };
        if blocked {
            return Err(fail(SynthesisFailure::UserDefinedCopyMoveOrDestructor));
        }

        let types = self.symbols.types_mut();
        let params = MemberParams {
            this: types.make_pointer(class),
            that: match kind {
                k if k.is_move() => Some(types.make_rvalue_reference(class)),
                k if k.takes_source() => Some(types.make_const_reference(class)),
                _ => None,
            },
        };

        let body = match kind {
            SpecialMemberKind::Destructor => self.destructor_body(class, &info, &params),
            _ => self.member_wise_body(class, kind, &info, &params),
        };
        let body = body.map_err(|inner| fail(SynthesisFailure::SubOperation(Box::new(inner))))?;

        let mut function = match kind {
            SpecialMemberKind::Destructor => FunctionSymbol::destructor(class, params.this),
            k if k.is_assignment() => FunctionSymbol::member(ASSIGNMENT, class, params.this),
            _ => FunctionSymbol::constructor(class, params.this),
        };
        if let Some(that) = params.that {
            function = function.with_param("that", that);
        }
        function = function.with_flags(FunctionFlags::GENERATED).with_span(span);
        function.body = Some(body);

        let id = match info.scope {
            Some(scope) => self.symbols.add_function(scope, function),
            None => self.symbols.add_detached_function(function),
        };
        self.stats.synthesized_members += 1;
        debug!(class = %class_name, member = %kind, statements = self.symbols.function(id).body.as_ref().map_or(0, BoundBody::len), "synthesized special member");
        Ok(id)
    }

    /// Body of a constructor or assignment.
    fn member_wise_body(
        &mut self,
        class: TypeId,
        kind: SpecialMemberKind,
        info: &ClassInfo,
        params: &MemberParams,
    ) -> Result<BoundBody, BindError> {
        let mut body = BoundBody::default();
        let this = BoundExpr::parameter(0, params.this);
        let that = params.that.map(|ty| BoundExpr::parameter(1, ty));
        let statement = |target: InitTarget, call: BoundCall| {
            if kind.is_assignment() {
                BoundStatement::Assign { target, call }
            } else {
                BoundStatement::Initialize { target, call }
            }
        };

        // Step 1: base.
        if let Some(base) = info.base {
            let call = self.base_sub_operation(kind, base, &this, that.as_ref(), params)?;
            body.push(statement(InitTarget::Base, call));
        }

        // Step 2: virtual method table.
        if kind.is_constructor() && info.is_polymorphic() {
            body.push(BoundStatement::SetVmtPtr { class });
        }

        // Step 3: data members in declaration order.
        for (index, member) in info.members.iter().enumerate() {
            let source = that.as_ref().map(|that| BoundExpr::member(that.clone(), index, member.ty));
            let call = self.member_sub_operation(kind, member.ty, BoundExpr::member(this.clone(), index, member.ty), source)?;
            body.push(statement(InitTarget::Member(index), call));
        }
        Ok(body)
    }

    fn base_sub_operation(
        &mut self,
        kind: SpecialMemberKind,
        base: TypeId,
        this: &BoundExpr,
        that: Option<&BoundExpr>,
        params: &MemberParams,
    ) -> Result<BoundCall, BindError> {
        let base_this = self.symbols.types_mut().make_pointer(base);
        let up = self.class_cast(params.this, base_this, Intrinsic::UpCast, 1);
        let mut args = vec![Argument::lvalue(base_this)];
        let mut exprs = vec![BoundExpr::conversion(up, this.clone(), base_this)];
        if let (Some(that), Some(that_ty)) = (that, params.that) {
            let types = self.symbols.types_mut();
            let base_that = if kind.is_move() {
                types.make_rvalue_reference(base)
            } else {
                types.make_const_reference(base)
            };
            let slice = self.class_cast(that_ty, base_that, Intrinsic::UpCast, 1);
            args.push(Argument::lvalue(base_that));
            exprs.push(BoundExpr::conversion(slice, that.clone(), base_that));
        }
        let resolved = self.resolve_overload(&OverloadRequest::new(kind.group(), &args))?;
        Ok(resolved.into_bound_call(exprs, &self.symbols))
    }

    fn member_sub_operation(
        &mut self,
        kind: SpecialMemberKind,
        member_ty: TypeId,
        object: BoundExpr,
        source: Option<BoundExpr>,
    ) -> Result<BoundCall, BindError> {
        let types = self.symbols.types_mut();
        let member_ptr = types.make_pointer(member_ty);
        let mut args = vec![Argument::lvalue(member_ptr)];
        let mut exprs = vec![BoundExpr::address_of(object, member_ptr)];
        if let Some(source) = source {
            let source_ty = if kind.is_move() {
                types.make_rvalue_reference(member_ty)
            } else {
                types.make_const_reference(member_ty)
            };
            args.push(Argument::lvalue(source_ty));
            exprs.push(source);
        }
        let resolved = self.resolve_overload(&OverloadRequest::new(kind.group(), &args))?;
        Ok(resolved.into_bound_call(exprs, &self.symbols))
    }

    /// Body of a destructor: members in reverse order, then the base.
    fn destructor_body(&mut self, class: TypeId, info: &ClassInfo, params: &MemberParams) -> Result<BoundBody, BindError> {
        let mut body = BoundBody::default();
        let this = BoundExpr::parameter(0, params.this);
        for (index, member) in info.members.iter().enumerate().rev() {
            if !self.needs_destruction(member.ty) {
                continue;
            }
            let object = BoundExpr::member(this.clone(), index, member.ty);
            let call = self.member_sub_operation(SpecialMemberKind::Destructor, member.ty, object, None)?;
            body.push(BoundStatement::Destroy { target: InitTarget::Member(index), call });
        }
        if let Some(base) = info.base.filter(|&base| self.needs_destruction(base)) {
            let call = self.base_sub_operation(SpecialMemberKind::Destructor, base, &this, None, params)?;
            body.push(BoundStatement::Destroy { target: InitTarget::Base, call });
        }
        debug!(class = self.type_name(class), statements = body.len(), "destructor body");
        Ok(body)
    }

    /// Whether destroying a value of `ty` runs any code.
    fn needs_destruction(&self, ty: TypeId) -> bool {
        let types = self.symbols.types();
        if !types.derivations(ty).is_empty() {
            return false;
        }
        let Some(info) = types.class(ty) else {
            return false;
        };
        info.user_defined.contains(SpecialMembers::DESTRUCTOR)
            || info.base.is_some_and(|base| self.needs_destruction(base))
            || info.members.iter().any(|member| self.needs_destruction(member.ty))
    }
}
