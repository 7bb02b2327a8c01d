//! End-to-end binding scenarios through the public API.
//!
//! Each test populates a symbol table the way a front end would and then
//! drives the binder: overload resolution, concept checks, special member
//! synthesis and constant evaluation working together.

use bindc::ast::{BinaryOp, ConstExpr, ConstraintExpr, TypeExpr};
use bindc::bound::{BoundStatement, InitTarget};
use bindc::diagnostics::Diagnostic;
use bindc::symbols::{FunctionSymbol, ScopeLookup, TypeId, CONSTRUCTOR};
use bindc::typeck::{Argument, OverloadRequest};
use bindc::value::{Value, ValueKind};
use bindc::{BindError, Binder, BinderConfig, Span};
use pretty_assertions::assert_eq;

fn binder() -> Binder {
    Binder::new(BinderConfig::default())
}

fn call(b: &Binder, name: &str, args: &[Argument]) -> OverloadRequest {
    let global = b.symbols.global_scope();
    OverloadRequest::new(name, args).with_lookup(global, ScopeLookup::THIS_AND_PARENT)
}

/// `class Base { int id; }` and `class Point : Base { int x; double y; }`.
fn point_classes(b: &mut Binder) -> (TypeId, TypeId) {
    let global = b.symbols.global_scope();
    let int = b.symbols.types().int();
    let double = b.symbols.types().double();
    let base = b.symbols.declare_class(global, "Base", Span::dummy());
    b.symbols.add_member_variable(base, "id", int, Span::dummy());
    let point = b.symbols.declare_class(global, "Point", Span::dummy());
    b.symbols.set_base_class(point, base);
    b.symbols.add_member_variable(point, "x", int, Span::dummy());
    b.symbols.add_member_variable(point, "y", double, Span::dummy());
    (base, point)
}

#[test]
fn constrained_max_beats_widening_overload() {
    let mut b = binder();
    let global = b.symbols.global_scope();
    let int = b.symbols.types().int();
    let long = b.symbols.types().long();
    let t = b.symbols.new_type_parameter("T", 0);
    let max = b.symbols.add_function(
        global,
        FunctionSymbol::free("Max")
            .with_type_params(vec![t])
            .with_param("left", t)
            .with_param("right", t)
            .returns(t)
            .with_constraint(ConstraintExpr::concept(
                "Convertible",
                vec![TypeExpr::named("T"), TypeExpr::named("T")],
            )),
    );
    let widening = b.symbols.add_function(
        global,
        FunctionSymbol::free("Max").with_param("a", long).with_param("b", long).returns(long),
    );

    let resolved = b.resolve_overload(&call(&b, "Max", &[Argument::lvalue(int), Argument::rvalue(int)])).unwrap();
    assert_eq!(resolved.template_args, vec![int]);
    assert_ne!(resolved.function, widening);
    assert_eq!(resolved.conversions, vec![None, None]);
    let instance = b.symbols.function(resolved.function);
    assert_eq!(instance.instance_of, Some(max));
    assert_eq!(instance.param_types(), vec![int, int]);
    assert!(b.pending_instantiations.contains(&resolved.function));
    assert_eq!(b.stats.concept_instantiations, 1);
}

#[test]
fn synthesized_copy_constructor_initializes_base_then_members() {
    let mut b = binder();
    let (base, point) = point_classes(&mut b);
    let types = b.symbols.types_mut();
    let this = types.make_pointer(point);
    let that = types.make_const_reference(point);

    let args = [Argument::lvalue(this), Argument::lvalue(that)];
    let resolved = b.resolve_overload(&OverloadRequest::new(CONSTRUCTOR, &args)).unwrap();
    let copy = b.symbols.function(resolved.function);
    assert!(copy.is_generated());
    assert_eq!(copy.parent, Some(point));

    let body = copy.body.as_ref().unwrap();
    let targets: Vec<_> = body.statements.iter().map(BoundStatement::target).collect();
    assert_eq!(targets, vec![Some(InitTarget::Base), Some(InitTarget::Member(0)), Some(InitTarget::Member(1))]);
    let BoundStatement::Initialize { call, .. } = &body.statements[0] else {
        panic!("expected base initialization");
    };
    let base_copy = b.symbols.function(call.function);
    assert_eq!(base_copy.parent, Some(base));
    assert!(base_copy.is_generated());
    assert_eq!(b.stats.synthesized_members, 2);
}

#[test]
fn user_destructor_blocks_implicit_copy() {
    let mut b = binder();
    let global = b.symbols.global_scope();
    let resource = b.symbols.declare_class(global, "Resource", Span::dummy());
    let scope = b.symbols.types().scope_of(resource).unwrap();
    let types = b.symbols.types_mut();
    let this = types.make_pointer(resource);
    let that = types.make_const_reference(resource);
    b.symbols.add_function(scope, FunctionSymbol::destructor(resource, this));

    let args = [Argument::lvalue(this), Argument::lvalue(that)];
    let error = b.resolve_overload(&OverloadRequest::new(CONSTRUCTOR, &args)).unwrap_err();
    assert!(matches!(error, BindError::NoViableFunction { viable: 0, .. }));
    let message = error.to_string();
    assert!(message.contains("cannot generate copy constructor for class 'Resource'"), "{message}");
    assert!(message.contains("user-defined copy/move operation or destructor"), "{message}");
}

#[test]
fn ambiguity_renders_every_candidate() {
    let mut b = binder();
    let global = b.symbols.global_scope();
    let int = b.symbols.types().int();
    let long = b.symbols.types().long();
    b.symbols.add_function(global, FunctionSymbol::free("Mix").with_param("a", int).with_param("b", long));
    b.symbols.add_function(global, FunctionSymbol::free("Mix").with_param("a", long).with_param("b", int));

    let error = b.resolve_overload(&call(&b, "Mix", &[Argument::lvalue(int), Argument::lvalue(int)])).unwrap_err();
    let diagnostic = Diagnostic::from_error(&error);
    assert_eq!(diagnostic.notes.len(), 2);
    let rendered = diagnostic.render("mix.cm", "Mix(1, 2);");
    assert!(rendered.contains("ambiguous with 2 candidates"), "{rendered}");
    assert!(rendered.contains("Mix(int, long)"), "{rendered}");
    assert!(rendered.contains("Mix(long, int)"), "{rendered}");
}

#[test]
fn constants_feed_constraint_predicates() {
    let mut b = binder();
    let global = b.symbols.global_scope();
    let limit = b.symbols.declare_constant(
        global,
        "Limit",
        Some(ValueKind::Long),
        ConstExpr::binary(BinaryOp::Mul, ConstExpr::int(6), ConstExpr::int(7)),
        Span::dummy(),
    );
    assert_eq!(b.constant_value(limit).unwrap(), Value::Long(42));

    let predicate = ConstExpr::binary(BinaryOp::Greater, ConstExpr::ident("Limit"), ConstExpr::int(40));
    let t = b.symbols.new_type_parameter("T", 0);
    let int = b.symbols.types().int();
    b.symbols.add_function(
        global,
        FunctionSymbol::free("Bounded")
            .with_type_params(vec![t])
            .with_param("value", t)
            .with_constraint(ConstraintExpr::Predicate(predicate)),
    );
    assert!(b.resolve_overload(&call(&b, "Bounded", &[Argument::lvalue(int)])).is_ok());
}
