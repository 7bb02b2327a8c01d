//! The bound tree.
//!
//! Binding produces typed expressions and statements that reference
//! resolved functions and types. The code generator consumes this tree; the
//! binder itself only builds call nodes (with inserted conversion steps) and
//! the bodies of synthesized special members.

use crate::symbols::{FunctionId, TypeId};
use crate::value::Value;

/// A typed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundExpr {
    Constant { value: Value, ty: TypeId },
    /// The `index`th parameter of the enclosing function.
    Parameter { index: usize, ty: TypeId },
    /// A data member of the object designated by `object`.
    Member { object: Box<BoundExpr>, index: usize, ty: TypeId },
    AddressOf { operand: Box<BoundExpr>, ty: TypeId },
    Deref { operand: Box<BoundExpr>, ty: TypeId },
    /// A conversion step: a call of a conversion function on one operand.
    Conversion { function: FunctionId, operand: Box<BoundExpr>, ty: TypeId },
    Call(BoundCall),
    /// An argument supplied by the caller and not yet bound.
    Placeholder { ty: TypeId },
}

impl BoundExpr {
    pub fn ty(&self) -> Option<TypeId> {
        match self {
            BoundExpr::Constant { ty, .. }
            | BoundExpr::Parameter { ty, .. }
            | BoundExpr::Member { ty, .. }
            | BoundExpr::AddressOf { ty, .. }
            | BoundExpr::Deref { ty, .. }
            | BoundExpr::Conversion { ty, .. }
            | BoundExpr::Placeholder { ty } => Some(*ty),
            BoundExpr::Call(call) => call.ty,
        }
    }

    pub fn parameter(index: usize, ty: TypeId) -> Self {
        BoundExpr::Parameter { index, ty }
    }

    pub fn member(object: BoundExpr, index: usize, ty: TypeId) -> Self {
        BoundExpr::Member { object: Box::new(object), index, ty }
    }

    pub fn address_of(operand: BoundExpr, ty: TypeId) -> Self {
        BoundExpr::AddressOf { operand: Box::new(operand), ty }
    }

    pub fn conversion(function: FunctionId, operand: BoundExpr, ty: TypeId) -> Self {
        BoundExpr::Conversion { function, operand: Box::new(operand), ty }
    }
}

/// A call of a resolved function.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundCall {
    pub function: FunctionId,
    pub arguments: Vec<BoundExpr>,
    /// Result type; `None` for constructors and `void` functions.
    pub ty: Option<TypeId>,
}

/// What a special-member statement operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitTarget {
    /// The base-class subobject.
    Base,
    /// The data member with this declaration index.
    Member(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoundStatement {
    Initialize { target: InitTarget, call: BoundCall },
    Assign { target: InitTarget, call: BoundCall },
    Destroy { target: InitTarget, call: BoundCall },
    /// Store the class's virtual method table pointer into `this`.
    SetVmtPtr { class: TypeId },
    Expression(BoundExpr),
}

impl BoundStatement {
    pub fn target(&self) -> Option<InitTarget> {
        match self {
            BoundStatement::Initialize { target, .. }
            | BoundStatement::Assign { target, .. }
            | BoundStatement::Destroy { target, .. } => Some(*target),
            BoundStatement::SetVmtPtr { .. } | BoundStatement::Expression(_) => None,
        }
    }
}

/// Body of a function generated by the binder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundBody {
    pub statements: Vec<BoundStatement>,
}

impl BoundBody {
    pub fn push(&mut self, statement: BoundStatement) {
        self.statements.push(statement);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}
