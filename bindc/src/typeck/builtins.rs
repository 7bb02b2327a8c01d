//! Built-in operations of the basic types.
//!
//! Operations are created lazily, all at once for a type the first time a
//! call mentions it, and are never entered into a scope: overload resolution
//! asks the repository directly for the functions of one group.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::ast::{BinaryOp, UnaryOp};
use crate::symbols::{
    BasicKind, FunctionId, FunctionKind, FunctionSymbol, Intrinsic, TypeId, ASSIGNMENT, CONSTRUCTOR,
};

use super::Binder;

/// Group name of a binary or unary operator function.
pub fn operator_group(symbol: &str) -> String {
    format!("operator{}", symbol)
}

/// Per type operation groups.
pub(crate) type OperationGroups = IndexMap<String, Vec<FunctionId>>;

/// Lazily created operations of `bool`, `char` and the numeric types.
#[derive(Debug, Default)]
pub struct BasicTypeOpRepository {
    ops: FxHashMap<TypeId, OperationGroups>,
}

impl BasicTypeOpRepository {
    pub fn functions(&self, ty: TypeId, group: &str) -> &[FunctionId] {
        self.ops.get(&ty).and_then(|groups| groups.get(group)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, ty: TypeId) -> bool {
        self.ops.contains_key(&ty)
    }
}

const ARITHMETIC: [BinaryOp; 4] = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul, BinaryOp::Div];
const INTEGRAL: [BinaryOp; 6] =
    [BinaryOp::Rem, BinaryOp::BitAnd, BinaryOp::BitOr, BinaryOp::BitXor, BinaryOp::Shl, BinaryOp::Shr];

/// Accumulates the functions of one type's operation table.
pub(crate) struct OperationBuilder<'a> {
    binder: &'a mut Binder,
    groups: OperationGroups,
}

impl<'a> OperationBuilder<'a> {
    pub(crate) fn new(binder: &'a mut Binder) -> Self {
        Self { binder, groups: IndexMap::new() }
    }

    pub(crate) fn binder(&mut self) -> &mut Binder {
        &mut *self.binder
    }

    pub(crate) fn add(&mut self, function: FunctionSymbol) -> FunctionId {
        let group = function.group_name.clone();
        let id = self.binder.symbols.add_detached_function(function);
        self.groups.entry(group).or_default().push(id);
        id
    }

    pub(crate) fn finish(self) -> OperationGroups {
        self.groups
    }

    /// Default, copy and move construction plus copy and move assignment.
    pub(crate) fn add_lifecycle(&mut self, ty: TypeId) {
        let types = self.binder.symbols.types_mut();
        let this = types.make_pointer(ty);
        let rref = types.make_rvalue_reference(ty);
        self.add(constructor(ty, this).with_intrinsic(Intrinsic::DefaultInit));
        self.add(constructor(ty, this).with_param("that", ty).with_intrinsic(Intrinsic::CopyInit));
        self.add(constructor(ty, this).with_param("that", rref).with_intrinsic(Intrinsic::MoveInit));
        self.add(assignment(ty, this).with_param("that", ty).with_intrinsic(Intrinsic::CopyAssign));
        self.add(assignment(ty, this).with_param("that", rref).with_intrinsic(Intrinsic::MoveAssign));
    }

    pub(crate) fn add_binary(&mut self, op: BinaryOp, lhs: TypeId, rhs: TypeId, result: TypeId) -> FunctionId {
        self.add(
            FunctionSymbol::free(&operator_group(op.symbol()))
                .with_param("left", lhs)
                .with_param("right", rhs)
                .returns(result)
                .with_intrinsic(Intrinsic::Binary(op)),
        )
    }

    pub(crate) fn add_unary(&mut self, op: UnaryOp, operand: TypeId, result: TypeId) -> FunctionId {
        self.add(
            FunctionSymbol::free(&operator_group(op.symbol()))
                .with_param("operand", operand)
                .returns(result)
                .with_intrinsic(Intrinsic::Unary(op)),
        )
    }

    /// `==` and `<`; the other comparisons are rewritten from these.
    pub(crate) fn add_comparisons(&mut self, ty: TypeId, equality_only: bool) {
        let boolean = self.binder.symbols.types().bool();
        self.add_binary(BinaryOp::Eq, ty, ty, boolean);
        if !equality_only {
            self.add_binary(BinaryOp::Less, ty, ty, boolean);
        }
    }
}

pub(crate) fn constructor(ty: TypeId, this: TypeId) -> FunctionSymbol {
    FunctionSymbol::new(CONSTRUCTOR, FunctionKind::Constructor).with_parent(ty).with_param("this", this)
}

pub(crate) fn assignment(ty: TypeId, this: TypeId) -> FunctionSymbol {
    FunctionSymbol::new(ASSIGNMENT, FunctionKind::Member).with_parent(ty).with_param("this", this)
}

impl Binder {
    /// Functions of `group` the basic type `ty` provides.
    pub(crate) fn basic_type_functions(&mut self, ty: TypeId, group: &str) -> Vec<FunctionId> {
        if !self.basic_ops.contains(ty) {
            let groups = self.create_basic_type_ops(ty);
            self.basic_ops.ops.insert(ty, groups);
        }
        self.basic_ops.functions(ty, group).to_vec()
    }

    fn create_basic_type_ops(&mut self, ty: TypeId) -> OperationGroups {
        let Some(kind) = self.symbols.types().basic_kind(ty) else {
            return OperationGroups::new();
        };
        trace!(ty = kind.name(), "creating basic type operations");
        let boolean = self.symbols.types().bool();
        let mut ops = OperationBuilder::new(self);
        match kind {
            BasicKind::Void => {}
            BasicKind::Null => {
                ops.add_lifecycle(ty);
                ops.add_comparisons(ty, true);
            }
            BasicKind::Bool => {
                ops.add_lifecycle(ty);
                ops.add_comparisons(ty, false);
                ops.add_unary(UnaryOp::Not, ty, boolean);
            }
            BasicKind::Char => {
                ops.add_lifecycle(ty);
                ops.add_comparisons(ty, false);
            }
            _ => {
                ops.add_lifecycle(ty);
                ops.add_comparisons(ty, false);
                for op in ARITHMETIC {
                    ops.add_binary(op, ty, ty, ty);
                }
                ops.add_unary(UnaryOp::Plus, ty, ty);
                ops.add_unary(UnaryOp::Minus, ty, ty);
                if kind.is_integer() {
                    for op in INTEGRAL {
                        ops.add_binary(op, ty, ty, ty);
                    }
                    ops.add_unary(UnaryOp::Complement, ty, ty);
                }
            }
        }
        ops.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BinderConfig;

    #[test]
    fn test_integer_operations() {
        let mut b = Binder::new(BinderConfig::default());
        let int = b.symbols.types().int();
        let less = b.basic_type_functions(int, "operator<");
        assert_eq!(less.len(), 1);
        assert_eq!(b.symbols.signature(less[0]), "operator<(int, int)");
        assert_eq!(b.symbols.function(less[0]).return_type, Some(b.symbols.types().bool()));
        assert_eq!(b.basic_type_functions(int, "operator%").len(), 1);
        // Unary and binary minus share the group.
        assert_eq!(b.basic_type_functions(int, "operator-").len(), 2);
        assert_eq!(b.basic_type_functions(int, CONSTRUCTOR).len(), 3);
        assert_eq!(b.basic_type_functions(int, ASSIGNMENT).len(), 2);
    }

    #[test]
    fn test_floating_point_has_no_bitwise_operations() {
        let mut b = Binder::new(BinderConfig::default());
        let double = b.symbols.types().double();
        assert!(b.basic_type_functions(double, "operator&").is_empty());
        assert!(b.basic_type_functions(double, "operator%").is_empty());
        assert_eq!(b.basic_type_functions(double, "operator/").len(), 1);
    }

    #[test]
    fn test_operations_are_created_once() {
        let mut b = Binder::new(BinderConfig::default());
        let boolean = b.symbols.types().bool();
        let first = b.basic_type_functions(boolean, "operator!");
        let second = b.basic_type_functions(boolean, "operator!");
        assert_eq!(first, second);
        assert!(b.basic_type_functions(boolean, "operator+").is_empty());
    }
}
