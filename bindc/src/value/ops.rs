//! Operators over [`Value`]s.
//!
//! Each operator promotes its operands to a common kind and then dispatches
//! on that kind to a generic implementation over the concrete Rust type.

use crate::ast::{BinaryOp, UnaryOp};
use crate::error::BindError;
use crate::span::Span;

use super::{common_type, Value, ValueKind};

/// Arithmetic over one concrete numeric representation.
trait Numeric: Copy + PartialOrd + PartialEq {
    fn add(self, rhs: Self) -> Self;
    fn sub(self, rhs: Self) -> Self;
    fn mul(self, rhs: Self) -> Self;
    fn div(self, rhs: Self) -> Result<Self, BindError>;
    fn rem(self, rhs: Self) -> Result<Self, BindError>;
    fn neg(self) -> Self;
    fn bit(self, op: BinaryOp, rhs: Self) -> Option<Self>;
    fn complement(self) -> Option<Self>;
    fn into_value(self) -> Value;
}

macro_rules! impl_integer {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl Numeric for $ty {
            fn add(self, rhs: Self) -> Self { self.wrapping_add(rhs) }
            fn sub(self, rhs: Self) -> Self { self.wrapping_sub(rhs) }
            fn mul(self, rhs: Self) -> Self { self.wrapping_mul(rhs) }
            fn div(self, rhs: Self) -> Result<Self, BindError> {
                if rhs == 0 {
                    return Err(BindError::DivisionByZero { span: Span::dummy() });
                }
                Ok(self.wrapping_div(rhs))
            }
            fn rem(self, rhs: Self) -> Result<Self, BindError> {
                if rhs == 0 {
                    return Err(BindError::DivisionByZero { span: Span::dummy() });
                }
                Ok(self.wrapping_rem(rhs))
            }
            fn neg(self) -> Self { self.wrapping_neg() }
            fn bit(self, op: BinaryOp, rhs: Self) -> Option<Self> {
                match op {
                    BinaryOp::BitAnd => Some(self & rhs),
                    BinaryOp::BitOr => Some(self | rhs),
                    BinaryOp::BitXor => Some(self ^ rhs),
                    BinaryOp::Shl => Some(self.wrapping_shl(rhs as u32)),
                    BinaryOp::Shr => Some(self.wrapping_shr(rhs as u32)),
                    _ => None,
                }
            }
            fn complement(self) -> Option<Self> { Some(!self) }
            fn into_value(self) -> Value { Value::$variant(self) }
        }
    )*};
}

impl_integer! {
    i8 => SByte,
    u8 => Byte,
    i16 => Short,
    u16 => UShort,
    i32 => Int,
    u32 => UInt,
    i64 => Long,
    u64 => ULong,
}

macro_rules! impl_float {
    ($($ty:ty => $variant:ident),* $(,)?) => {$(
        impl Numeric for $ty {
            fn add(self, rhs: Self) -> Self { self + rhs }
            fn sub(self, rhs: Self) -> Self { self - rhs }
            fn mul(self, rhs: Self) -> Self { self * rhs }
            fn div(self, rhs: Self) -> Result<Self, BindError> { Ok(self / rhs) }
            fn rem(self, rhs: Self) -> Result<Self, BindError> { Ok(self % rhs) }
            fn neg(self) -> Self { -self }
            fn bit(self, _op: BinaryOp, _rhs: Self) -> Option<Self> { None }
            fn complement(self) -> Option<Self> { None }
            fn into_value(self) -> Value { Value::$variant(self) }
        }
    )*};
}

impl_float! {
    f32 => Float,
    f64 => Double,
}

/// Dispatch two operands of the same numeric kind to `$body`.
macro_rules! numeric_pair {
    ($lhs:expr, $rhs:expr, |$a:ident, $b:ident| $body:expr, $otherwise:expr) => {
        match ($lhs, $rhs) {
            (Value::SByte($a), Value::SByte($b)) => $body,
            (Value::Byte($a), Value::Byte($b)) => $body,
            (Value::Short($a), Value::Short($b)) => $body,
            (Value::UShort($a), Value::UShort($b)) => $body,
            (Value::Int($a), Value::Int($b)) => $body,
            (Value::UInt($a), Value::UInt($b)) => $body,
            (Value::Long($a), Value::Long($b)) => $body,
            (Value::ULong($a), Value::ULong($b)) => $body,
            (Value::Float($a), Value::Float($b)) => $body,
            (Value::Double($a), Value::Double($b)) => $body,
            _ => $otherwise,
        }
    };
}

macro_rules! numeric_one {
    ($operand:expr, |$a:ident| $body:expr, $otherwise:expr) => {
        match $operand {
            Value::SByte($a) => $body,
            Value::Byte($a) => $body,
            Value::Short($a) => $body,
            Value::UShort($a) => $body,
            Value::Int($a) => $body,
            Value::UInt($a) => $body,
            Value::Long($a) => $body,
            Value::ULong($a) => $body,
            Value::Float($a) => $body,
            Value::Double($a) => $body,
            _ => $otherwise,
        }
    };
}

fn unsupported(op: BinaryOp, lhs: &Value, rhs: &Value) -> BindError {
    BindError::not_supported(op.symbol(), format!("{} and {}", lhs.kind(), rhs.kind()))
}

fn arithmetic<T: Numeric>(op: BinaryOp, a: T, b: T) -> Result<Option<Value>, BindError> {
    let result = match op {
        BinaryOp::Add => a.add(b),
        BinaryOp::Sub => a.sub(b),
        BinaryOp::Mul => a.mul(b),
        BinaryOp::Div => a.div(b)?,
        BinaryOp::Rem => a.rem(b)?,
        _ => match a.bit(op, b) {
            Some(v) => v,
            None => return Ok(None),
        },
    };
    Ok(Some(result.into_value()))
}

fn compare<T: PartialOrd>(op: BinaryOp, a: T, b: T) -> bool {
    match op {
        BinaryOp::Eq => a == b,
        BinaryOp::NotEq => a != b,
        BinaryOp::Less => a < b,
        BinaryOp::Greater => a > b,
        BinaryOp::LessEq => a <= b,
        _ => a >= b,
    }
}

/// Apply a binary operator.
///
/// Operands are promoted to their common type; arithmetic results may be
/// raised further to `target` when the target is a lattice widening of the
/// common type.
pub fn binary(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    target: Option<ValueKind>,
) -> Result<Value, BindError> {
    if op.is_logical() {
        return match (lhs, rhs) {
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(if op == BinaryOp::And {
                *a && *b
            } else {
                *a || *b
            })),
            _ => Err(unsupported(op, lhs, rhs)),
        };
    }

    let mut kind = common_type(lhs.kind(), rhs.kind())?;
    if !op.is_comparison() {
        if let Some(target) = target.filter(|t| t.is_numeric() && kind.is_numeric()) {
            if common_type(kind, target).ok() == Some(target) {
                kind = target;
            }
        }
    }
    let lhs = lhs.as_kind(kind, false)?;
    let rhs = rhs.as_kind(kind, false)?;

    if op.is_comparison() {
        let result = match (&lhs, &rhs) {
            (Value::Bool(a), Value::Bool(b)) => compare(op, a, b),
            (Value::Char(a), Value::Char(b)) => compare(op, a, b),
            (Value::String(a), Value::String(b)) => compare(op, a, b),
            (Value::Null, Value::Null) => match op {
                BinaryOp::Eq | BinaryOp::LessEq | BinaryOp::GreaterEq => true,
                BinaryOp::NotEq | BinaryOp::Less | BinaryOp::Greater => false,
                _ => return Err(unsupported(op, &lhs, &rhs)),
            },
            _ => numeric_pair!(&lhs, &rhs, |a, b| compare(op, a, b), {
                return Err(unsupported(op, &lhs, &rhs));
            }),
        };
        return Ok(Value::Bool(result));
    }

    if let (BinaryOp::Add, Value::String(a), Value::String(b)) = (op, &lhs, &rhs) {
        return Ok(Value::String(format!("{}{}", a, b)));
    }

    let result = numeric_pair!(&lhs, &rhs, |a, b| arithmetic(op, *a, *b)?, None);
    result.ok_or_else(|| unsupported(op, &lhs, &rhs))
}

/// Apply a unary operator.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, BindError> {
    let unsupported =
        || BindError::not_supported(op.symbol(), operand.kind().to_string());
    match op {
        UnaryOp::Not => match operand {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            _ => Err(unsupported()),
        },
        UnaryOp::Plus => numeric_one!(operand, |a| Ok(a.into_value()), Err(unsupported())),
        UnaryOp::Minus => numeric_one!(operand, |a| Ok(a.neg().into_value()), Err(unsupported())),
        UnaryOp::Complement => numeric_one!(
            operand,
            |a| a.complement().map(Numeric::into_value).ok_or_else(unsupported),
            Err(unsupported())
        ),
    }
}
