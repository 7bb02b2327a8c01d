//! Compile-time constant evaluation.
//!
//! # Algorithm
//!
//! ```text
//! literal            its typed value
//! name               constant -> its value (evaluated once, then cached)
//!                    namespace, class or enum -> a scope for the next `.`
//! a.b                look `b` up in the scope `a` named
//! a op b / op a      promote to the common type (raised to the target for
//!                    arithmetic), apply the operator
//! cast<K>(a)         convert, narrowing allowed
//! anything else      not a constant expression
//! ```
//!
//! Constants move through `Unevaluated -> Evaluating -> Evaluated`; meeting
//! a constant that is `Evaluating` is a cycle.

use tracing::trace;

use crate::ast::{ConstExpr, Literal};
use crate::error::BindError;
use crate::span::Span;
use crate::symbols::{ConstantId, ConstantState, ScopeId, ScopeLookup, Symbol, SymbolFilter};
use crate::value::{ops, Value, ValueKind};

use super::Binder;

/// Intermediate result: a value, or a scope a dotted name continues in.
enum Evaluated {
    Value(Value),
    Scoped(ScopeId),
}

const NAME_FILTER: SymbolFilter = SymbolFilter::CONSTANTS.union(SymbolFilter::NAMESPACES).union(SymbolFilter::TYPES);

impl Binder {
    /// Evaluate `expr` in `scope`, converting the result to `target` when given.
    pub fn evaluate(
        &mut self,
        target: Option<ValueKind>,
        allow_cast: bool,
        expr: &ConstExpr,
        scope: ScopeId,
    ) -> Result<Value, BindError> {
        let value = match self.evaluate_node(expr, scope, target)? {
            Evaluated::Value(value) => value,
            Evaluated::Scoped(_) => {
                return Err(BindError::not_supported("evaluate", "a scope name").with_span(expr.span()))
            }
        };
        match target {
            Some(kind) if value.kind() != kind => {
                value.as_kind(kind, allow_cast).map_err(|e| e.with_span(expr.span()))
            }
            _ => Ok(value),
        }
    }

    /// Whether `expr` is a compile-time expression that evaluates to `true`.
    ///
    /// Never fails: any construct without a compile-time meaning answers `false`.
    pub fn is_always_true(&mut self, expr: &ConstExpr, scope: ScopeId) -> bool {
        if !is_compile_time(expr) {
            return false;
        }
        matches!(self.evaluate(Some(ValueKind::Bool), false, expr, scope), Ok(Value::Bool(true)))
    }

    /// The value of a declared constant.
    pub fn constant_value(&mut self, id: ConstantId) -> Result<Value, BindError> {
        let constant = self.symbols.constant(id);
        match &constant.state {
            ConstantState::Evaluated(value) => return Ok(value.clone()),
            ConstantState::Evaluating => {
                return Err(BindError::CyclicConstant { name: constant.name.clone(), span: constant.span })
            }
            ConstantState::Unevaluated => {}
        }
        let initializer = constant.initializer.clone();
        let kind = constant.kind;
        let scope = constant.scope;
        trace!(constant = %constant.name, "evaluating constant");

        self.symbols.constant_mut(id).state = ConstantState::Evaluating;
        // Initializers convert to the declared type.
        let result = self.evaluate(kind, true, &initializer, scope);
        self.symbols.constant_mut(id).state = match &result {
            Ok(value) => ConstantState::Evaluated(value.clone()),
            Err(_) => ConstantState::Unevaluated,
        };
        result
    }

    fn evaluate_node(
        &mut self,
        expr: &ConstExpr,
        scope: ScopeId,
        target: Option<ValueKind>,
    ) -> Result<Evaluated, BindError> {
        match expr {
            ConstExpr::Literal(literal) => Ok(Evaluated::Value(literal_value(literal))),
            ConstExpr::Identifier { name, span } => {
                let found = self.symbols.lookup_qualified(scope, name, ScopeLookup::THIS_AND_BASE_AND_PARENT, NAME_FILTER);
                self.named(found, name, *span)
            }
            ConstExpr::Dot { subject, member, span } => {
                let container = match self.evaluate_node(subject, scope, None)? {
                    Evaluated::Scoped(container) => container,
                    Evaluated::Value(value) => {
                        return Err(BindError::not_supported(".", value.kind().to_string()).with_span(*span))
                    }
                };
                let found = self.symbols.lookup(container, member, ScopeLookup::THIS_AND_BASE, NAME_FILTER);
                self.named(found, member, *span)
            }
            ConstExpr::Binary { op, lhs, rhs, span } => {
                let lhs = self.evaluate_value(lhs, scope, target)?;
                let rhs = self.evaluate_value(rhs, scope, target)?;
                ops::binary(*op, &lhs, &rhs, target).map(Evaluated::Value).map_err(|e| e.with_span(*span))
            }
            ConstExpr::Unary { op, operand, span } => {
                let operand = self.evaluate_value(operand, scope, target)?;
                ops::unary(*op, &operand).map(Evaluated::Value).map_err(|e| e.with_span(*span))
            }
            ConstExpr::Cast { target: basic, operand, span } => {
                let Some(kind) = ValueKind::of_basic(*basic) else {
                    return Err(BindError::not_supported("cast", basic.name()).with_span(*span));
                };
                let operand = self.evaluate_value(operand, scope, None)?;
                operand.as_kind(kind, true).map(Evaluated::Value).map_err(|e| e.with_span(*span))
            }
            other => Err(BindError::not_supported(node_name(other), "constant expression").with_span(other.span())),
        }
    }

    fn evaluate_value(
        &mut self,
        expr: &ConstExpr,
        scope: ScopeId,
        target: Option<ValueKind>,
    ) -> Result<Value, BindError> {
        match self.evaluate_node(expr, scope, target)? {
            Evaluated::Value(value) => Ok(value),
            Evaluated::Scoped(_) => Err(BindError::not_supported("operand", "a scope name").with_span(expr.span())),
        }
    }

    fn named(&mut self, found: Option<Symbol>, name: &str, span: Span) -> Result<Evaluated, BindError> {
        match found {
            Some(Symbol::Constant(id)) => self.constant_value(id).map(Evaluated::Value).map_err(|e| e.with_span(span)),
            Some(Symbol::Namespace(scope)) => Ok(Evaluated::Scoped(scope)),
            Some(Symbol::Type(ty)) => match self.symbols.types().scope_of(ty) {
                Some(scope) => Ok(Evaluated::Scoped(scope)),
                None => Err(BindError::not_supported("evaluate", format!("type '{}'", self.type_name(ty))).with_span(span)),
            },
            _ => Err(BindError::UnresolvedName { name: name.to_string(), span }),
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Bool(v) => Value::Bool(*v),
        Literal::Char(v) => Value::Char(*v),
        Literal::SByte(v) => Value::SByte(*v),
        Literal::Byte(v) => Value::Byte(*v),
        Literal::Short(v) => Value::Short(*v),
        Literal::UShort(v) => Value::UShort(*v),
        Literal::Int(v) => Value::Int(*v),
        Literal::UInt(v) => Value::UInt(*v),
        Literal::Long(v) => Value::Long(*v),
        Literal::ULong(v) => Value::ULong(*v),
        Literal::Float(v) => Value::Float(v.into_inner()),
        Literal::Double(v) => Value::Double(v.into_inner()),
        Literal::String(v) => Value::String(v.clone()),
        Literal::Null => Value::Null,
    }
}

/// Whether every node of `expr` can be evaluated at compile time.
fn is_compile_time(expr: &ConstExpr) -> bool {
    match expr {
        ConstExpr::Literal(Literal::String(_) | Literal::Null) => false,
        ConstExpr::Literal(_) | ConstExpr::Identifier { .. } => true,
        ConstExpr::Dot { subject, .. } => is_compile_time(subject),
        ConstExpr::Binary { lhs, rhs, .. } => is_compile_time(lhs) && is_compile_time(rhs),
        ConstExpr::Unary { operand, .. } | ConstExpr::Cast { operand, .. } => is_compile_time(operand),
        _ => false,
    }
}

fn node_name(expr: &ConstExpr) -> &'static str {
    match expr {
        ConstExpr::Invoke { .. } => "call",
        ConstExpr::Index { .. } => "index",
        ConstExpr::AddressOf { .. } => "address-of",
        ConstExpr::Deref { .. } => "dereference",
        ConstExpr::Increment { .. } => "increment",
        ConstExpr::Assign { .. } => "assignment",
        ConstExpr::This { .. } => "this",
        ConstExpr::Base { .. } => "base",
        _ => "expression",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, UnaryOp};
    use crate::config::BinderConfig;
    use crate::symbols::BasicKind;
    use ordered_float::OrderedFloat;
    use pretty_assertions::assert_eq;

    fn binder() -> Binder {
        crate::test_support::init_tracing();
        Binder::new(BinderConfig::default())
    }

    #[test]
    fn test_arithmetic_promotes_operands() {
        let mut b = binder();
        let global = b.symbols.global_scope();
        let expr = ConstExpr::binary(BinaryOp::Add, ConstExpr::int(2), ConstExpr::literal(Literal::Long(40)));
        assert_eq!(b.evaluate(None, false, &expr, global), Ok(Value::Long(42)));
    }

    #[test]
    fn test_result_raised_to_target() {
        let mut b = binder();
        let global = b.symbols.global_scope();
        let expr = ConstExpr::binary(BinaryOp::Mul, ConstExpr::int(3), ConstExpr::int(4));
        assert_eq!(b.evaluate(Some(ValueKind::Long), false, &expr, global), Ok(Value::Long(12)));
    }

    #[test]
    fn test_narrowing_requires_cast() {
        let mut b = binder();
        let global = b.symbols.global_scope();
        let expr = ConstExpr::literal(Literal::Long(300));
        assert!(matches!(
            b.evaluate(Some(ValueKind::Byte), false, &expr, global),
            Err(BindError::ConversionFailure { .. })
        ));
        assert_eq!(b.evaluate(Some(ValueKind::Byte), true, &expr, global), Ok(Value::Byte(44)));
    }

    #[test]
    fn test_explicit_cast_node() {
        let mut b = binder();
        let global = b.symbols.global_scope();
        let expr = ConstExpr::Cast {
            target: BasicKind::Int,
            operand: Box::new(ConstExpr::literal(Literal::Double(OrderedFloat(2.75)))),
            span: Span::dummy(),
        };
        assert_eq!(b.evaluate(None, false, &expr, global), Ok(Value::Int(2)));
    }

    #[test]
    fn test_constants_are_evaluated_once_and_cached() {
        let mut b = binder();
        let global = b.symbols.global_scope();
        let size = b.symbols.declare_constant(global, "Size", Some(ValueKind::Int), ConstExpr::int(8), Span::dummy());
        b.symbols.declare_constant(
            global,
            "Double",
            None,
            ConstExpr::binary(BinaryOp::Mul, ConstExpr::ident("Size"), ConstExpr::int(2)),
            Span::dummy(),
        );
        assert_eq!(b.evaluate(None, false, &ConstExpr::ident("Double"), global), Ok(Value::Int(16)));
        assert_eq!(b.symbols.constant(size).value(), Some(&Value::Int(8)));
    }

    #[test]
    fn test_cyclic_constants_are_reported() {
        let mut b = binder();
        let global = b.symbols.global_scope();
        let a = b.symbols.declare_constant(global, "A", None, ConstExpr::ident("B"), Span::dummy());
        b.symbols.declare_constant(global, "B", None, ConstExpr::ident("A"), Span::dummy());
        assert!(matches!(b.constant_value(a), Err(BindError::CyclicConstant { .. })));
        // The failed evaluation leaves the constant re-evaluable.
        assert!(matches!(b.symbols.constant(a).state, ConstantState::Unevaluated));
    }

    #[test]
    fn test_dotted_names_through_namespaces_and_enums() {
        let mut b = binder();
        let global = b.symbols.global_scope();
        let ns = b.symbols.add_namespace(global, "Limits");
        b.symbols.declare_constant(ns, "Max", Some(ValueKind::Int), ConstExpr::int(10), Span::dummy());
        let int = b.symbols.types().int();
        let color = b.symbols.declare_enum(global, "Color", int, Span::dummy());
        b.symbols.add_enum_constant(color, "Green", ConstExpr::int(1));

        let max = ConstExpr::dot(ConstExpr::ident("Limits"), "Max");
        assert_eq!(b.evaluate(None, false, &max, global), Ok(Value::Int(10)));
        let green = ConstExpr::dot(ConstExpr::ident("Color"), "Green");
        assert_eq!(b.evaluate(None, false, &green, global), Ok(Value::Int(1)));
    }

    #[test]
    fn test_division_by_zero() {
        let mut b = binder();
        let global = b.symbols.global_scope();
        let expr = ConstExpr::binary(BinaryOp::Div, ConstExpr::int(1), ConstExpr::int(0));
        assert!(matches!(b.evaluate(None, false, &expr, global), Err(BindError::DivisionByZero { .. })));
    }

    #[test]
    fn test_always_true_probe() {
        let mut b = binder();
        let global = b.symbols.global_scope();
        let yes = ConstExpr::binary(BinaryOp::Less, ConstExpr::int(1), ConstExpr::int(2));
        assert!(b.is_always_true(&yes, global));
        assert!(!b.is_always_true(&ConstExpr::unary(UnaryOp::Not, yes), global));
        assert!(!b.is_always_true(&ConstExpr::This { span: Span::dummy() }, global));
        assert!(!b.is_always_true(&ConstExpr::literal(Literal::Null), global));
        assert!(!b.is_always_true(&ConstExpr::ident("Missing"), global));
    }
}
