use pretty_assertions::assert_eq;

use super::*;
use crate::ast::ConstExpr;
use crate::config::BinderConfig;
use crate::span::Span;
use crate::symbols::{ConceptId, FunctionSymbol};

fn binder() -> Binder {
    crate::test_support::init_tracing();
    Binder::new(BinderConfig::default())
}

fn core(b: &Binder, name: &str, arity: usize) -> ConceptId {
    let global = b.symbols.global_scope();
    b.find_concept(global, name, arity).unwrap()
}

/// `concept Ordered<T> refines Equatable<T>` over the comparison operators.
fn declare_ordering_concepts(b: &mut Binder) -> (ConceptId, ConceptId) {
    let global = b.symbols.global_scope();
    let operator = |name: &str| ConstraintExpr::Function {
        return_type: Some(TypeExpr::named("bool")),
        group_name: name.to_string(),
        parameters: vec![TypeExpr::named("T"), TypeExpr::named("T")],
    };
    let equatable = b.symbols.declare_concept_with(global, "Equatable", &["T"], vec![operator("operator==")]);
    let ordered = b.symbols.declare_concept_with(global, "Ordered", &["T"], vec![operator("operator<")]);
    b.symbols.set_concept_refines(
        ordered,
        ConceptRef { name: "Equatable".to_string(), arguments: vec![TypeExpr::named("T")] },
    );
    (equatable, ordered)
}

#[test]
fn test_core_concepts() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let long = b.symbols.types().long();
    let int_ref = b.symbols.types_mut().make_reference(int);

    let same = core(&b, "Same", 2);
    assert!(b.instantiate_concept(same, &[int, int]).is_ok());
    assert!(b.instantiate_concept(same, &[int, long]).is_err());

    let convertible = core(&b, "Convertible", 2);
    assert!(b.instantiate_concept(convertible, &[int, long]).is_ok());
    assert!(b.instantiate_concept(convertible, &[long, int]).is_err());
    let explicit = core(&b, "ExplicitlyConvertible", 2);
    assert!(b.instantiate_concept(explicit, &[long, int]).is_ok());

    let non_reference = core(&b, "NonReferenceType", 1);
    assert!(b.instantiate_concept(non_reference, &[int]).is_ok());
    let error = b.instantiate_concept(non_reference, &[int_ref]).unwrap_err();
    assert!(error.to_string().contains("NonReferenceType<int&>"), "{error}");
}

#[test]
fn test_derived_concept_needs_a_proper_base() {
    let mut b = binder();
    let global = b.symbols.global_scope();
    let base = b.symbols.declare_class(global, "Base", Span::dummy());
    let derived = b.symbols.declare_class(global, "Derived", Span::dummy());
    b.symbols.set_base_class(derived, base);

    let concept = core(&b, "Derived", 2);
    assert!(b.instantiate_concept(concept, &[derived, base]).is_ok());
    assert!(b.instantiate_concept(concept, &[base, derived]).is_err());
    assert!(b.instantiate_concept(concept, &[base, base]).is_err());
}

#[test]
fn test_instantiation_is_memoized() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let same = core(&b, "Same", 2);
    let first = b.instantiate_concept(same, &[int, int]);
    let second = b.instantiate_concept(same, &[int, int]);
    assert_eq!(first, second);
    assert_eq!(b.stats.concept_instantiations, 1);
    assert_eq!(b.stats.concept_cache_hits, 1);

    // Failures are cached too.
    let double = b.symbols.types().double();
    assert!(b.instantiate_concept(same, &[int, double]).is_err());
    assert!(b.instantiate_concept(same, &[int, double]).is_err());
    assert_eq!(b.stats.concept_instantiations, 2);
    assert_eq!(b.stats.concept_cache_hits, 2);
}

#[test]
fn test_refinement_is_recorded_and_subsumes() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let (equatable, ordered) = declare_ordering_concepts(&mut b);

    let ordered_int = b.instantiate_concept(ordered, &[int]).unwrap();
    let equatable_int = b.instantiate_concept(equatable, &[int]).unwrap();
    assert_eq!(b.concept_refinements.get(&ordered), Some(&equatable));

    let refinements = b.concept_refinements.clone();
    let implies = |a: ConceptId, c: ConceptId| crate::typeck::overload::refines(&refinements, a, c);
    assert!(ordered_int.bound.subsume(&equatable_int.bound, &implies));
    assert!(!equatable_int.bound.subsume(&ordered_int.bound, &implies));
}

#[test]
fn test_refined_concept_failure_names_the_concept() {
    let mut b = binder();
    let global = b.symbols.global_scope();
    let widget = b.symbols.declare_class(global, "Widget", Span::dummy());
    let (_, ordered) = declare_ordering_concepts(&mut b);
    let error = b.instantiate_concept(ordered, &[widget]).unwrap_err();
    let message = error.to_string();
    assert!(message.contains("Ordered<Widget>"), "{message}");
    assert!(message.contains("Equatable<Widget>"), "{message}");
}

#[test]
fn test_common_binds_common_type() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let long = b.symbols.types().long();
    let common = core(&b, "Common", 2);
    let instantiated = b.instantiate_concept(common, &[int, long]).unwrap();
    assert_eq!(instantiated.common_type, Some(long));
    let instantiated = b.instantiate_concept(common, &[long, int]).unwrap();
    assert_eq!(instantiated.common_type, Some(long));

    let global = b.symbols.global_scope();
    let widget = b.symbols.declare_class(global, "Widget", Span::dummy());
    assert!(b.instantiate_concept(common, &[int, widget]).is_err());
}

#[test]
fn test_constructor_and_member_requirements() {
    let mut b = binder();
    let global = b.symbols.global_scope();
    let int = b.symbols.types().int();
    let boolean = b.symbols.types().bool();
    let counter = b.symbols.declare_class(global, "Counter", Span::dummy());
    let scope = b.symbols.types().scope_of(counter).unwrap();
    let this = b.symbols.types_mut().make_pointer(counter);
    b.symbols.add_function(scope, FunctionSymbol::constructor(counter, this).with_param("start", int));
    b.symbols.add_function(scope, FunctionSymbol::member("IsEmpty", counter, this).returns(boolean));

    let concept = b.symbols.declare_concept_with(
        global,
        "Countable",
        &["T"],
        vec![
            ConstraintExpr::Constructor { parameters: vec![TypeExpr::named("int")] },
            ConstraintExpr::MemberFunction {
                return_type: Some(TypeExpr::named("bool")),
                name: "IsEmpty".to_string(),
                parameters: Vec::new(),
            },
            ConstraintExpr::Destructor,
        ],
    );
    assert!(b.instantiate_concept(concept, &[counter]).is_ok());

    let other = b.symbols.declare_class(global, "Other", Span::dummy());
    let error = b.instantiate_concept(concept, &[other]).unwrap_err();
    assert!(error.to_string().contains("no constructor taking (int)"), "{error}");
}

#[test]
fn test_disjunction_reports_both_sides() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let double = b.symbols.types().double();
    let global = b.symbols.global_scope();
    let cx = ConstraintContext { scope: global, first: Some(int), second: Some(double) };

    let either = ConstraintExpr::or(ConstraintExpr::Same, ConstraintExpr::Derived);
    let error = b.check_constraint(&either, &cx).unwrap_err();
    let message = error.to_string();
    assert!(message.contains("not the same"), "{message}");
    assert!(message.contains("not derived"), "{message}");

    let relaxed = ConstraintExpr::or(ConstraintExpr::Same, ConstraintExpr::Predicate(ConstExpr::bool(true)));
    let bound = b.check_constraint(&relaxed, &cx).unwrap();
    assert!(bound.is_satisfied());
}

#[test]
fn test_false_predicate_fails() {
    let mut b = binder();
    let global = b.symbols.global_scope();
    let cx = ConstraintContext { scope: global, first: None, second: None };
    let predicate = ConstraintExpr::Predicate(ConstExpr::binary(
        crate::ast::BinaryOp::Less,
        ConstExpr::int(2),
        ConstExpr::int(1),
    ));
    assert!(b.check_constraint(&predicate, &cx).is_err());
}
