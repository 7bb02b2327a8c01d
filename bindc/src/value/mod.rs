//! Compile-time constant values.
//!
//! A [`Value`] is a closed variant over the basic kinds the constant
//! evaluator understands. Binary operations first promote both operands to
//! their [`common_type`], then dispatch on the promoted kind (see [`ops`]).
//!
//! # Promotion lattice
//!
//! - signed with signed: the wider of the two
//! - unsigned with unsigned: the wider of the two
//! - signed with unsigned: the wider of the signed type and the signed type
//!   twice as wide as the unsigned one; `ulong` mixed with any signed type
//!   has no integral home and goes to `double`
//! - `double` dominates everything numeric, then `float`
//! - `bool`, `char`, `string` and `null` only combine with themselves

pub mod ops;

#[cfg(test)]
mod tests;

use std::fmt;

use crate::error::BindError;
use crate::span::Span;
use crate::symbols::BasicKind;

pub use ops::{binary, unary};

/// The tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
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
    Null,
    String,
}

impl ValueKind {
    pub const ALL: [ValueKind; 14] = [
        ValueKind::Bool,
        ValueKind::Char,
        ValueKind::SByte,
        ValueKind::Byte,
        ValueKind::Short,
        ValueKind::UShort,
        ValueKind::Int,
        ValueKind::UInt,
        ValueKind::Long,
        ValueKind::ULong,
        ValueKind::Float,
        ValueKind::Double,
        ValueKind::Null,
        ValueKind::String,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Char => "char",
            ValueKind::SByte => "sbyte",
            ValueKind::Byte => "byte",
            ValueKind::Short => "short",
            ValueKind::UShort => "ushort",
            ValueKind::Int => "int",
            ValueKind::UInt => "uint",
            ValueKind::Long => "long",
            ValueKind::ULong => "ulong",
            ValueKind::Float => "float",
            ValueKind::Double => "double",
            ValueKind::Null => "null",
            ValueKind::String => "string",
        }
    }

    /// Bit width and signedness of an integral kind.
    pub fn integer_info(self) -> Option<(u32, bool)> {
        match self {
            ValueKind::SByte => Some((8, true)),
            ValueKind::Byte => Some((8, false)),
            ValueKind::Short => Some((16, true)),
            ValueKind::UShort => Some((16, false)),
            ValueKind::Int => Some((32, true)),
            ValueKind::UInt => Some((32, false)),
            ValueKind::Long => Some((64, true)),
            ValueKind::ULong => Some((64, false)),
            _ => None,
        }
    }

    pub fn is_integer(self) -> bool {
        self.integer_info().is_some()
    }

    pub fn is_float(self) -> bool {
        matches!(self, ValueKind::Float | ValueKind::Double)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    fn signed_of_bits(bits: u32) -> ValueKind {
        match bits {
            8 => ValueKind::SByte,
            16 => ValueKind::Short,
            32 => ValueKind::Int,
            _ => ValueKind::Long,
        }
    }

    fn unsigned_of_bits(bits: u32) -> ValueKind {
        match bits {
            8 => ValueKind::Byte,
            16 => ValueKind::UShort,
            32 => ValueKind::UInt,
            _ => ValueKind::ULong,
        }
    }

    /// The value kind of a basic type, if constants of it exist.
    pub fn of_basic(kind: BasicKind) -> Option<ValueKind> {
        match kind {
            BasicKind::Bool => Some(ValueKind::Bool),
            BasicKind::Char => Some(ValueKind::Char),
            BasicKind::SByte => Some(ValueKind::SByte),
            BasicKind::Byte => Some(ValueKind::Byte),
            BasicKind::Short => Some(ValueKind::Short),
            BasicKind::UShort => Some(ValueKind::UShort),
            BasicKind::Int => Some(ValueKind::Int),
            BasicKind::UInt => Some(ValueKind::UInt),
            BasicKind::Long => Some(ValueKind::Long),
            BasicKind::ULong => Some(ValueKind::ULong),
            BasicKind::Float => Some(ValueKind::Float),
            BasicKind::Double => Some(ValueKind::Double),
            BasicKind::Null => Some(ValueKind::Null),
            BasicKind::Void => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Common type of two value kinds under the promotion lattice.
pub fn common_type(left: ValueKind, right: ValueKind) -> Result<ValueKind, BindError> {
    if left == right {
        return Ok(left);
    }
    if !left.is_numeric() || !right.is_numeric() {
        return Err(BindError::not_supported(
            "common type",
            format!("{} and {}", left, right),
        ));
    }
    if left == ValueKind::Double || right == ValueKind::Double {
        return Ok(ValueKind::Double);
    }
    if left == ValueKind::Float || right == ValueKind::Float {
        return Ok(ValueKind::Float);
    }
    let (Some((lbits, lsigned)), Some((rbits, rsigned))) = (left.integer_info(), right.integer_info())
    else {
        return Err(BindError::not_supported("common type", format!("{} and {}", left, right)));
    };
    match (lsigned, rsigned) {
        (true, true) => Ok(ValueKind::signed_of_bits(lbits.max(rbits))),
        (false, false) => Ok(ValueKind::unsigned_of_bits(lbits.max(rbits))),
        _ => {
            let (sbits, ubits) = if lsigned { (lbits, rbits) } else { (rbits, lbits) };
            if ubits == 64 {
                Ok(ValueKind::Double)
            } else {
                Ok(ValueKind::signed_of_bits(sbits.max(ubits * 2)))
            }
        }
    }
}

/// A compile-time constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Char(char),
    SByte(i8),
    Byte(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    Null,
    String(String),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Char(_) => ValueKind::Char,
            Value::SByte(_) => ValueKind::SByte,
            Value::Byte(_) => ValueKind::Byte,
            Value::Short(_) => ValueKind::Short,
            Value::UShort(_) => ValueKind::UShort,
            Value::Int(_) => ValueKind::Int,
            Value::UInt(_) => ValueKind::UInt,
            Value::Long(_) => ValueKind::Long,
            Value::ULong(_) => ValueKind::ULong,
            Value::Float(_) => ValueKind::Float,
            Value::Double(_) => ValueKind::Double,
            Value::Null => ValueKind::Null,
            Value::String(_) => ValueKind::String,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral payload widened to `i128`; chars and bools count as integral.
    pub fn to_i128(&self) -> Option<i128> {
        match self {
            Value::Bool(b) => Some(i128::from(*b)),
            Value::Char(c) => Some(i128::from(u32::from(*c))),
            Value::SByte(v) => Some(i128::from(*v)),
            Value::Byte(v) => Some(i128::from(*v)),
            Value::Short(v) => Some(i128::from(*v)),
            Value::UShort(v) => Some(i128::from(*v)),
            Value::Int(v) => Some(i128::from(*v)),
            Value::UInt(v) => Some(i128::from(*v)),
            Value::Long(v) => Some(i128::from(*v)),
            Value::ULong(v) => Some(i128::from(*v)),
            Value::Float(_) | Value::Double(_) | Value::Null | Value::String(_) => None,
        }
    }

    fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            other => other.to_i128().map(|v| v as f64),
        }
    }

    /// Convert to `target`.
    ///
    /// Without `allow_narrowing` only lattice widenings succeed; anything else
    /// fails with [`BindError::ConversionFailure`]. With it, every numeric,
    /// `bool` and `char` kind converts to every other one (integers wrap).
    pub fn as_kind(&self, target: ValueKind, allow_narrowing: bool) -> Result<Value, BindError> {
        let source = self.kind();
        if source == target {
            return Ok(self.clone());
        }
        if !allow_narrowing {
            return match common_type(source, target) {
                Ok(common) if common == target => self.convert(target),
                _ => Err(BindError::ConversionFailure { from: source, to: target, span: Span::dummy() }),
            };
        }
        let castable =
            |kind: ValueKind| kind.is_numeric() || matches!(kind, ValueKind::Bool | ValueKind::Char);
        if castable(source) && castable(target) {
            self.convert(target)
        } else {
            Err(BindError::not_supported("cast", format!("{} to {}", source, target)))
        }
    }

    fn convert(&self, target: ValueKind) -> Result<Value, BindError> {
        if target.is_float() || self.kind().is_float() {
            let Some(v) = self.to_f64() else {
                return Err(BindError::not_supported("cast", format!("{} to {}", self.kind(), target)));
            };
            return Ok(match target {
                ValueKind::Float => Value::Float(v as f32),
                ValueKind::Double => Value::Double(v),
                ValueKind::Bool => Value::Bool(v != 0.0),
                _ => Value::from_i128(target, v as i128)?,
            });
        }
        match self.to_i128() {
            Some(v) => Value::from_i128(target, v),
            None => Err(BindError::not_supported("cast", format!("{} to {}", self.kind(), target))),
        }
    }

    /// Build an integral (or bool/char) value, wrapping to the target width.
    pub fn from_i128(target: ValueKind, v: i128) -> Result<Value, BindError> {
        Ok(match target {
            ValueKind::Bool => Value::Bool(v != 0),
            ValueKind::Char => {
                let code = v as u32;
                match char::from_u32(code) {
                    Some(c) => Value::Char(c),
                    None => return Err(BindError::InvalidCharacter { value: code, span: Span::dummy() }),
                }
            }
            ValueKind::SByte => Value::SByte(v as i8),
            ValueKind::Byte => Value::Byte(v as u8),
            ValueKind::Short => Value::Short(v as i16),
            ValueKind::UShort => Value::UShort(v as u16),
            ValueKind::Int => Value::Int(v as i32),
            ValueKind::UInt => Value::UInt(v as u32),
            ValueKind::Long => Value::Long(v as i64),
            ValueKind::ULong => Value::ULong(v as u64),
            ValueKind::Float => Value::Float(v as f32),
            ValueKind::Double => Value::Double(v as f64),
            ValueKind::Null | ValueKind::String => {
                return Err(BindError::not_supported("cast", format!("integer to {}", target)))
            }
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "'{}'", v.escape_default()),
            Value::SByte(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}u8", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::UShort(v) => write!(f, "{}u16", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}u", v),
            Value::Long(v) => write!(f, "{}l", v),
            Value::ULong(v) => write!(f, "{}ul", v),
            Value::Float(v) => write!(f, "{}f", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Null => f.write_str("null"),
            Value::String(v) => write!(f, "\"{}\"", v.escape_default()),
        }
    }
}
