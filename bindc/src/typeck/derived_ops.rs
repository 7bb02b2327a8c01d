//! Built-in operations of derived, enum, delegate and interface types.
//!
//! Like the basic type repository every table is created on first use and
//! then kept for the rest of the compile unit:
//!
//! - pointers: construction, assignment, `==`, `<`, offset arithmetic,
//!   pointer difference and dereference
//! - arrays: construction and assignment flagged as array operations
//! - enums and delegates: construction, assignment and comparison
//! - interfaces: construction, assignment and one vtable-lookup constructor
//!   per implementing class
//!
//! Class pointer up-casts and down-casts and array decay are conversion
//! functions cached here per type pair.

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::ast::{BinaryOp, UnaryOp};
use crate::symbols::{
    ConversionInfo, FunctionFlags, FunctionId, FunctionKind, FunctionSymbol, Intrinsic, TypeId, TypeKind,
    CONSTRUCTOR, CONVERSION,
};

use super::builtins::{assignment, constructor, operator_group, OperationBuilder, OperationGroups};
use super::Binder;

/// Operations of derived types and nominal value types, plus cast functions.
#[derive(Debug, Default)]
pub struct DerivedTypeOpCache {
    ops: FxHashMap<TypeId, OperationGroups>,
    casts: FxHashMap<(TypeId, TypeId, Intrinsic), FunctionId>,
    decays: FxHashMap<TypeId, FunctionId>,
}

impl DerivedTypeOpCache {
    pub fn functions(&self, ty: TypeId, group: &str) -> &[FunctionId] {
        self.ops.get(&ty).and_then(|groups| groups.get(group)).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Operations of interface types.
#[derive(Debug, Default)]
pub struct InterfaceTypeOpCache {
    ops: FxHashMap<TypeId, OperationGroups>,
    /// `(interface, class)` to the constructor building the interface object.
    class_constructors: FxHashMap<(TypeId, TypeId), FunctionId>,
}

impl InterfaceTypeOpCache {
    pub fn functions(&self, ty: TypeId, group: &str) -> &[FunctionId] {
        self.ops.get(&ty).and_then(|groups| groups.get(group)).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Binder {
    /// Functions of `group` the derived, enum or delegate type `ty` provides.
    pub(crate) fn derived_type_functions(&mut self, ty: TypeId, group: &str) -> Vec<FunctionId> {
        if !self.derived_ops.ops.contains_key(&ty) {
            let groups = self.create_derived_type_ops(ty);
            self.derived_ops.ops.insert(ty, groups);
        }
        self.derived_ops.functions(ty, group).to_vec()
    }

    fn create_derived_type_ops(&mut self, ty: TypeId) -> OperationGroups {
        let types = self.symbols.types();
        let is_pointer = types.is_pointer(ty);
        let is_array = types.is_array(ty) && !types.is_reference(ty);
        let kind = types.get(ty).kind.clone();
        trace!(ty = types.name(ty), "creating derived type operations");

        let mut ops = OperationBuilder::new(self);
        if is_array {
            add_array_operations(&mut ops, ty);
        } else if is_pointer {
            add_pointer_operations(&mut ops, ty);
        } else {
            match kind {
                TypeKind::Enum(_) => {
                    ops.add_lifecycle(ty);
                    ops.add_comparisons(ty, false);
                }
                TypeKind::Delegate(_) => {
                    ops.add_lifecycle(ty);
                    ops.add_comparisons(ty, true);
                }
                _ => {}
            }
        }
        ops.finish()
    }

    /// Functions of `group` the interface type provides. For constructors,
    /// `source` is the class pointer type a vtable-lookup constructor is
    /// wanted for.
    pub(crate) fn interface_type_functions(
        &mut self,
        interface: TypeId,
        group: &str,
        source: Option<TypeId>,
    ) -> Vec<FunctionId> {
        if !self.interface_ops.ops.contains_key(&interface) {
            let mut ops = OperationBuilder::new(self);
            ops.add_lifecycle(interface);
            let groups = ops.finish();
            self.interface_ops.ops.insert(interface, groups);
        }
        let mut functions = self.interface_ops.functions(interface, group).to_vec();
        if group == CONSTRUCTOR {
            if let Some(class) = source.and_then(|s| self.class_pointee(s)) {
                if self.symbols.types().implements(class, interface) {
                    functions.push(self.interface_class_constructor(interface, class));
                }
            }
        }
        functions
    }

    /// `C` for a `C*` type.
    fn class_pointee(&self, ty: TypeId) -> Option<TypeId> {
        let types = self.symbols.types();
        (types.pointer_count(ty) == 1 && types.derivations(ty).arrays.is_empty())
            .then(|| types.class_of(ty))
            .flatten()
    }

    fn interface_class_constructor(&mut self, interface: TypeId, class: TypeId) -> FunctionId {
        if let Some(&existing) = self.interface_ops.class_constructors.get(&(interface, class)) {
            return existing;
        }
        let types = self.symbols.types_mut();
        let this = types.make_pointer(interface);
        let object = types.make_pointer(class);
        let function = constructor(interface, this)
            .with_param("object", object)
            .with_intrinsic(Intrinsic::InterfaceFromClass);
        let id = self.symbols.add_detached_function(function);
        self.interface_ops.class_constructors.insert((interface, class), id);
        id
    }

    /// Class up-cast or down-cast conversion from `from` to `to`.
    pub(crate) fn class_cast(&mut self, from: TypeId, to: TypeId, intrinsic: Intrinsic, hops: u32) -> FunctionId {
        let types = self.symbols.types_mut();
        let source = types.remove_const_reference(from);
        let target = types.remove_const_reference(to);
        if let Some(&existing) = self.derived_ops.casts.get(&(source, target, intrinsic)) {
            return existing;
        }
        let implicit = intrinsic == Intrinsic::UpCast;
        let function = FunctionSymbol::new(CONVERSION, FunctionKind::Conversion)
            .with_param("from", source)
            .returns(target)
            .with_intrinsic(intrinsic)
            .with_flags(if implicit { FunctionFlags::empty() } else { FunctionFlags::EXPLICIT })
            .with_conversion(ConversionInfo { source, target, distance: hops, implicit, user_defined: false });
        let id = self.symbols.add_detached_function(function);
        self.derived_ops.casts.insert((source, target, intrinsic), id);
        id
    }

    /// Array-to-pointer decay of the array value type `array`.
    pub(crate) fn array_decay(&mut self, array: TypeId) -> FunctionId {
        if let Some(&existing) = self.derived_ops.decays.get(&array) {
            return existing;
        }
        let types = self.symbols.types_mut();
        let element = types.element_type(array);
        let pointer = types.make_pointer(element);
        let function = FunctionSymbol::new(CONVERSION, FunctionKind::Conversion)
            .with_param("array", array)
            .returns(pointer)
            .with_intrinsic(Intrinsic::ArrayDecay)
            .with_conversion(ConversionInfo {
                source: array,
                target: pointer,
                distance: 1,
                implicit: true,
                user_defined: false,
            });
        let id = self.symbols.add_detached_function(function);
        self.derived_ops.decays.insert(array, id);
        id
    }
}

fn add_pointer_operations(ops: &mut OperationBuilder<'_>, ptr: TypeId) {
    ops.add_lifecycle(ptr);
    ops.add_comparisons(ptr, false);

    let binder = ops.binder();
    let long = binder.symbols.types().long();
    let types = binder.symbols.types_mut();
    let pointee = types.remove_pointer(ptr);
    let is_void_ptr = types.pointer_count(ptr) == 1 && types.make_plain(ptr) == types.void();
    if is_void_ptr {
        return;
    }
    let pointee_ref = types.make_reference(pointee);

    for op in [BinaryOp::Add, BinaryOp::Sub] {
        ops.add(
            FunctionSymbol::free(&operator_group(op.symbol()))
                .with_param("pointer", ptr)
                .with_param("offset", long)
                .returns(ptr)
                .with_intrinsic(Intrinsic::PointerOffset(op)),
        );
    }
    ops.add(
        FunctionSymbol::free(&operator_group(BinaryOp::Sub.symbol()))
            .with_param("left", ptr)
            .with_param("right", ptr)
            .returns(long)
            .with_intrinsic(Intrinsic::PointerDifference),
    );
    ops.add(
        FunctionSymbol::free(&operator_group("*"))
            .with_param("pointer", ptr)
            .returns(pointee_ref)
            .with_intrinsic(Intrinsic::Dereference),
    );
    // Unary plus on pointers is the identity.
    ops.add_unary(UnaryOp::Plus, ptr, ptr);
}

fn add_array_operations(ops: &mut OperationBuilder<'_>, array: TypeId) {
    let types = ops.binder().symbols.types_mut();
    let this = types.make_pointer(array);
    let that = types.make_const_reference(array);
    ops.add(
        constructor(array, this)
            .with_intrinsic(Intrinsic::DefaultInit)
            .with_flags(FunctionFlags::ARRAY_CONSTRUCTOR),
    );
    ops.add(
        constructor(array, this)
            .with_param("that", that)
            .with_intrinsic(Intrinsic::CopyInit)
            .with_flags(FunctionFlags::ARRAY_CONSTRUCTOR),
    );
    ops.add(
        assignment(array, this)
            .with_param("that", that)
            .with_intrinsic(Intrinsic::CopyAssign)
            .with_flags(FunctionFlags::ARRAY_ASSIGNMENT),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BinderConfig;
    use crate::span::Span;

    #[test]
    fn test_pointer_operations() {
        let mut b = Binder::new(BinderConfig::default());
        let int = b.symbols.types().int();
        let ptr = b.symbols.types_mut().make_pointer(int);
        let minus = b.derived_type_functions(ptr, "operator-");
        let intrinsics: Vec<_> = minus.iter().map(|&f| b.symbols.function(f).intrinsic).collect();
        assert!(intrinsics.contains(&Some(Intrinsic::PointerOffset(BinaryOp::Sub))));
        assert!(intrinsics.contains(&Some(Intrinsic::PointerDifference)));
        let deref = b.derived_type_functions(ptr, "operator*");
        assert_eq!(deref.len(), 1);
        assert_eq!(b.symbols.types().name(b.symbols.function(deref[0]).return_type.unwrap()), "int&");
    }

    #[test]
    fn test_void_pointer_has_no_arithmetic() {
        let mut b = Binder::new(BinderConfig::default());
        let void_ptr = b.symbols.types_mut().void_ptr();
        assert!(b.derived_type_functions(void_ptr, "operator+").is_empty());
        assert_eq!(b.derived_type_functions(void_ptr, "operator==").len(), 1);
    }

    #[test]
    fn test_array_operations_are_flagged() {
        let mut b = Binder::new(BinderConfig::default());
        let int = b.symbols.types().int();
        let array = b.symbols.types_mut().make_array(int, 4);
        let ctors = b.derived_type_functions(array, CONSTRUCTOR);
        assert_eq!(ctors.len(), 2);
        assert!(ctors.iter().all(|&f| b.symbols.function(f).is_array_operation()));
    }

    #[test]
    fn test_interface_constructor_per_implementing_class() {
        let mut b = Binder::new(BinderConfig::default());
        let global = b.symbols.global_scope();
        let iface = b.symbols.declare_interface(global, "IShape", Span::dummy());
        let circle = b.symbols.declare_class(global, "Circle", Span::dummy());
        let square = b.symbols.declare_class(global, "Square", Span::dummy());
        b.symbols.implement_interface(circle, iface);
        let circle_ptr = b.symbols.types_mut().make_pointer(circle);
        let square_ptr = b.symbols.types_mut().make_pointer(square);

        let with_circle = b.interface_type_functions(iface, CONSTRUCTOR, Some(circle_ptr));
        let with_square = b.interface_type_functions(iface, CONSTRUCTOR, Some(square_ptr));
        assert_eq!(with_circle.len(), with_square.len() + 1);
        let again = b.interface_type_functions(iface, CONSTRUCTOR, Some(circle_ptr));
        assert_eq!(with_circle, again);
    }

    #[test]
    fn test_casts_are_cached_per_pair() {
        let mut b = Binder::new(BinderConfig::default());
        let global = b.symbols.global_scope();
        let base = b.symbols.declare_class(global, "Base", Span::dummy());
        let derived = b.symbols.declare_class(global, "Derived", Span::dummy());
        b.symbols.set_base_class(derived, base);
        let base_ptr = b.symbols.types_mut().make_pointer(base);
        let derived_ptr = b.symbols.types_mut().make_pointer(derived);
        let up = b.class_cast(derived_ptr, base_ptr, Intrinsic::UpCast, 1);
        assert_eq!(b.class_cast(derived_ptr, base_ptr, Intrinsic::UpCast, 1), up);
        let down = b.class_cast(base_ptr, derived_ptr, Intrinsic::DownCast, 1);
        assert_ne!(up, down);
        assert!(b.symbols.function(down).is_explicit());
    }
}
