//! Constant and enum-constant symbols.
//!
//! The value of a constant is computed lazily by the constant evaluator the
//! first time the constant is referenced and memoized here.

use crate::ast::ConstExpr;
use crate::span::Span;
use crate::value::{Value, ValueKind};

use super::scope::ScopeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstantId(pub(crate) u32);

impl ConstantId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Evaluation state of a constant.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConstantState {
    #[default]
    Unevaluated,
    /// Evaluation is on the stack; reaching it again is a cycle.
    Evaluating,
    Evaluated(Value),
}

#[derive(Debug, Clone)]
pub struct ConstantSymbol {
    pub name: String,
    /// Declared value kind; `None` takes the kind of the initializer.
    pub kind: Option<ValueKind>,
    pub initializer: ConstExpr,
    /// Scope the initializer is evaluated in.
    pub scope: ScopeId,
    pub state: ConstantState,
    pub span: Span,
}

impl ConstantSymbol {
    pub fn value(&self) -> Option<&Value> {
        match &self.state {
            ConstantState::Evaluated(value) => Some(value),
            _ => None,
        }
    }
}
