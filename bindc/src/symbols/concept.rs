//! Concept symbols.

use crate::ast::{ConceptRef, ConstraintExpr};
use crate::span::Span;

use super::scope::ScopeId;
use super::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConceptId(pub(crate) u32);

impl ConceptId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named, parameterized constraint.
///
/// ```text
/// concept Comparable<T> refines EqualityComparable<T> where T is Copyable { ... }
/// ```
#[derive(Debug, Clone)]
pub struct ConceptSymbol {
    /// Group name; concepts of one group are overloaded by arity.
    pub name: String,
    /// Type parameter types, in order.
    pub type_params: Vec<TypeId>,
    /// Names the body uses for the type parameters.
    pub type_param_names: Vec<String>,
    pub refines: Option<ConceptRef>,
    /// Constraints that must all hold.
    pub body: Vec<ConstraintExpr>,
    /// Scope the concept was declared in.
    pub scope: ScopeId,
    pub span: Span,
}

impl ConceptSymbol {
    pub fn arity(&self) -> usize {
        self.type_params.len()
    }

    pub fn display(&self, args: &[&str]) -> String {
        format!("{}<{}>", self.name, args.join(", "))
    }
}
