use proptest::prelude::*;

use super::*;
use crate::ast::{BinaryOp, UnaryOp};

fn kind_strategy() -> impl Strategy<Value = ValueKind> {
    proptest::sample::select(ValueKind::ALL.to_vec())
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<char>().prop_map(Value::Char),
        any::<i8>().prop_map(Value::SByte),
        any::<u8>().prop_map(Value::Byte),
        any::<i16>().prop_map(Value::Short),
        any::<u16>().prop_map(Value::UShort),
        any::<i32>().prop_map(Value::Int),
        any::<u32>().prop_map(Value::UInt),
        any::<i64>().prop_map(Value::Long),
        any::<u64>().prop_map(Value::ULong),
        (-1.0e6f32..1.0e6f32).prop_map(Value::Float),
        (-1.0e12f64..1.0e12f64).prop_map(Value::Double),
        Just(Value::Null),
        "[a-z]{0,8}".prop_map(Value::String),
    ]
}

proptest! {
    #[test]
    fn prop_common_type_is_commutative(a in kind_strategy(), b in kind_strategy()) {
        prop_assert_eq!(common_type(a, b).ok(), common_type(b, a).ok());
    }

    #[test]
    fn prop_as_own_kind_round_trips(v in value_strategy()) {
        let converted = v.as_kind(v.kind(), false).unwrap();
        prop_assert_eq!(converted, v);
    }

    #[test]
    fn prop_widening_never_fails(v in value_strategy(), target in kind_strategy()) {
        if common_type(v.kind(), target).ok() == Some(target) {
            prop_assert!(v.as_kind(target, false).is_ok());
        }
    }
}

#[test]
fn test_common_type_signed_unsigned() {
    assert_eq!(common_type(ValueKind::Int, ValueKind::Long).unwrap(), ValueKind::Long);
    assert_eq!(common_type(ValueKind::Byte, ValueKind::UInt).unwrap(), ValueKind::UInt);
    assert_eq!(common_type(ValueKind::SByte, ValueKind::Byte).unwrap(), ValueKind::Short);
    assert_eq!(common_type(ValueKind::Int, ValueKind::UInt).unwrap(), ValueKind::Long);
    assert_eq!(common_type(ValueKind::Long, ValueKind::UShort).unwrap(), ValueKind::Long);
    assert_eq!(common_type(ValueKind::Int, ValueKind::ULong).unwrap(), ValueKind::Double);
}

#[test]
fn test_common_type_floats_dominate() {
    assert_eq!(common_type(ValueKind::Float, ValueKind::Long).unwrap(), ValueKind::Float);
    assert_eq!(common_type(ValueKind::Float, ValueKind::Double).unwrap(), ValueKind::Double);
    assert_eq!(common_type(ValueKind::ULong, ValueKind::Double).unwrap(), ValueKind::Double);
}

#[test]
fn test_common_type_rejects_non_numeric_mix() {
    let err = common_type(ValueKind::Bool, ValueKind::Int).unwrap_err();
    assert!(matches!(err, BindError::NotSupportedOperation { .. }));
    assert!(common_type(ValueKind::Char, ValueKind::String).is_err());
    assert_eq!(common_type(ValueKind::Char, ValueKind::Char).unwrap(), ValueKind::Char);
}

#[test]
fn test_as_narrowing_requires_permission() {
    let v = Value::Long(300);
    let err = v.as_kind(ValueKind::Byte, false).unwrap_err();
    assert!(matches!(
        err,
        BindError::ConversionFailure { from: ValueKind::Long, to: ValueKind::Byte, .. }
    ));
    assert_eq!(v.as_kind(ValueKind::Byte, true).unwrap(), Value::Byte(44));
}

#[test]
fn test_as_signedness_change_is_not_widening() {
    assert!(Value::Int(-1).as_kind(ValueKind::UInt, false).is_err());
    assert_eq!(Value::Int(-1).as_kind(ValueKind::UInt, true).unwrap(), Value::UInt(u32::MAX));
    assert_eq!(Value::UInt(7).as_kind(ValueKind::Long, false).unwrap(), Value::Long(7));
}

#[test]
fn test_as_char_and_bool_casts() {
    assert_eq!(Value::Int(65).as_kind(ValueKind::Char, true).unwrap(), Value::Char('A'));
    assert_eq!(Value::Char('a').as_kind(ValueKind::Int, true).unwrap(), Value::Int(97));
    assert_eq!(Value::Int(2).as_kind(ValueKind::Bool, true).unwrap(), Value::Bool(true));
    assert!(matches!(
        Value::Long(0xD800).as_kind(ValueKind::Char, true),
        Err(BindError::InvalidCharacter { value: 0xD800, .. })
    ));
    assert!(Value::String("x".into()).as_kind(ValueKind::Int, true).is_err());
}

#[test]
fn test_binary_promotes_to_common_type() {
    let v = binary(BinaryOp::Add, &Value::Int(1), &Value::Long(2), None).unwrap();
    assert_eq!(v, Value::Long(3));
    let v = binary(BinaryOp::Mul, &Value::Byte(3), &Value::SByte(-2), None).unwrap();
    assert_eq!(v, Value::Short(-6));
}

#[test]
fn test_binary_raises_to_target() {
    let v = binary(BinaryOp::Add, &Value::Int(1), &Value::Int(2), Some(ValueKind::Long)).unwrap();
    assert_eq!(v, Value::Long(3));
    // Narrower targets do not lower the computation.
    let v = binary(BinaryOp::Add, &Value::Int(1), &Value::Int(2), Some(ValueKind::Short)).unwrap();
    assert_eq!(v, Value::Int(3));
}

#[test]
fn test_binary_division_by_zero() {
    let err = binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0), None).unwrap_err();
    assert!(matches!(err, BindError::DivisionByZero { .. }));
    let err = binary(BinaryOp::Rem, &Value::ULong(1), &Value::ULong(0), None).unwrap_err();
    assert!(matches!(err, BindError::DivisionByZero { .. }));
}

#[test]
fn test_binary_integer_arithmetic_wraps() {
    let v = binary(BinaryOp::Add, &Value::Int(i32::MAX), &Value::Int(1), None).unwrap();
    assert_eq!(v, Value::Int(i32::MIN));
}

#[test]
fn test_binary_comparisons_yield_bool() {
    let v = binary(BinaryOp::Less, &Value::Int(1), &Value::Double(1.5), None).unwrap();
    assert_eq!(v, Value::Bool(true));
    let v = binary(BinaryOp::Eq, &Value::Char('a'), &Value::Char('a'), None).unwrap();
    assert_eq!(v, Value::Bool(true));
    let v = binary(BinaryOp::NotEq, &Value::Null, &Value::Null, None).unwrap();
    assert_eq!(v, Value::Bool(false));
}

#[test]
fn test_binary_bitwise_on_floats_not_supported() {
    let err = binary(BinaryOp::BitAnd, &Value::Double(1.0), &Value::Int(1), None).unwrap_err();
    assert!(matches!(err, BindError::NotSupportedOperation { .. }));
}

#[test]
fn test_binary_logical_requires_bools() {
    let v = binary(BinaryOp::And, &Value::Bool(true), &Value::Bool(false), None).unwrap();
    assert_eq!(v, Value::Bool(false));
    assert!(binary(BinaryOp::Or, &Value::Int(1), &Value::Bool(false), None).is_err());
}

#[test]
fn test_string_concatenation() {
    let v = binary(BinaryOp::Add, &Value::String("ab".into()), &Value::String("cd".into()), None)
        .unwrap();
    assert_eq!(v, Value::String("abcd".into()));
}

#[test]
fn test_unary_operators() {
    assert_eq!(unary(UnaryOp::Minus, &Value::Int(5)).unwrap(), Value::Int(-5));
    assert_eq!(unary(UnaryOp::Complement, &Value::Byte(0x0F)).unwrap(), Value::Byte(0xF0));
    assert_eq!(unary(UnaryOp::Not, &Value::Bool(false)).unwrap(), Value::Bool(true));
    assert!(unary(UnaryOp::Complement, &Value::Double(1.0)).is_err());
    assert!(unary(UnaryOp::Not, &Value::Int(1)).is_err());
}
