use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::ast::{ConceptRef, ConstraintExpr, TypeExpr};
use crate::config::BinderConfig;
use crate::span::Span;
use crate::symbols::{
    ConceptId, DerivationCounts, FunctionFlags, FunctionKind, FunctionSymbol, Intrinsic, RefKind, CONSTRUCTOR,
};
use crate::typeck::concepts::BoundConstraint;
use crate::typeck::conversion::{Argument, ArgumentMatch};

fn binder() -> Binder {
    crate::test_support::init_tracing();
    Binder::new(BinderConfig::default())
}

fn declare(b: &mut Binder, function: FunctionSymbol) -> FunctionId {
    let global = b.symbols.global_scope();
    b.symbols.add_function(global, function)
}

fn call(b: &Binder, name: &str, args: &[Argument]) -> OverloadRequest {
    let global = b.symbols.global_scope();
    OverloadRequest::new(name, args).with_lookup(global, ScopeLookup::THIS_AND_PARENT)
}

/// `T` and a template `name<T>(T) -> T` with an optional constraint.
fn declare_template(b: &mut Binder, name: &str, constraint: Option<ConstraintExpr>) -> FunctionId {
    let t = b.symbols.new_type_parameter("T", 0);
    let mut function = FunctionSymbol::free(name).with_type_params(vec![t]).with_param("value", t).returns(t);
    if let Some(constraint) = constraint {
        function = function.with_constraint(constraint);
    }
    declare(b, function)
}

fn hierarchy(b: &mut Binder) -> [TypeId; 3] {
    let global = b.symbols.global_scope();
    let a = b.symbols.declare_class(global, "A", Span::dummy());
    let bb = b.symbols.declare_class(global, "B", Span::dummy());
    let c = b.symbols.declare_class(global, "C", Span::dummy());
    b.symbols.set_base_class(bb, a);
    b.symbols.set_base_class(c, bb);
    [a, bb, c]
}

// === Ranking ===

#[test]
fn test_exact_match_beats_conversion() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let long = b.symbols.types().long();
    let by_int = declare(&mut b, FunctionSymbol::free("f").with_param("x", int));
    declare(&mut b, FunctionSymbol::free("f").with_param("x", long));

    let resolved = b.resolve_overload(&call(&b, "f", &[Argument::lvalue(int)])).unwrap();
    assert_eq!(resolved.function, by_int);
    assert_eq!(resolved.conversions, vec![None]);
}

#[test]
fn test_nearest_base_class_wins() {
    let mut b = binder();
    let [a, bb, c] = hierarchy(&mut b);
    let types = b.symbols.types_mut();
    let a_ptr = types.make_pointer(a);
    let b_ptr = types.make_pointer(bb);
    let c_ptr = types.make_pointer(c);
    declare(&mut b, FunctionSymbol::free("g").with_param("x", a_ptr));
    let to_b = declare(&mut b, FunctionSymbol::free("g").with_param("x", b_ptr));

    let resolved = b.resolve_overload(&call(&b, "g", &[Argument::lvalue(c_ptr)])).unwrap();
    assert_eq!(resolved.function, to_b);
    let cast = resolved.conversions[0].unwrap();
    assert_eq!(b.symbols.function(cast).intrinsic, Some(Intrinsic::UpCast));
}

#[test]
fn test_down_cast_needs_explicit_context() {
    let mut b = binder();
    let [a, _, c] = hierarchy(&mut b);
    let types = b.symbols.types_mut();
    let a_ptr = types.make_pointer(a);
    let c_ptr = types.make_pointer(c);
    declare(&mut b, FunctionSymbol::free("h").with_param("x", c_ptr));

    let implicit = b.resolve_overload(&call(&b, "h", &[Argument::lvalue(a_ptr)]));
    assert!(matches!(implicit, Err(BindError::NoViableFunction { viable: 1, .. })));

    let resolved = b.resolve_overload(&call(&b, "h", &[Argument::lvalue(a_ptr)]).explicit()).unwrap();
    let cast = resolved.conversions[0].unwrap();
    assert_eq!(b.symbols.function(cast).intrinsic, Some(Intrinsic::DownCast));
}

#[test]
fn test_crossed_conversions_are_ambiguous() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let long = b.symbols.types().long();
    declare(&mut b, FunctionSymbol::free("k").with_param("x", int).with_param("y", long));
    declare(&mut b, FunctionSymbol::free("k").with_param("x", long).with_param("y", int));

    let request = call(&b, "k", &[Argument::lvalue(int), Argument::lvalue(int)]);
    let first = b.resolve_overload(&request).unwrap_err();
    let BindError::AmbiguousCall { ref candidates, .. } = first else {
        panic!("expected ambiguity, got {first:?}");
    };
    assert_eq!(candidates.len(), 2);
    assert_eq!(b.resolve_overload(&request).unwrap_err(), first);
}

#[test]
fn test_non_template_beats_template() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let plain = declare(&mut b, FunctionSymbol::free("Id").with_param("value", int).returns(int));
    declare_template(&mut b, "Id", None);

    let resolved = b.resolve_overload(&call(&b, "Id", &[Argument::lvalue(int)])).unwrap();
    assert_eq!(resolved.function, plain);
    assert!(b.pending_instantiations.is_empty());
}

#[test]
fn test_constrained_template_beats_unconstrained() {
    let mut b = binder();
    let int = b.symbols.types().int();
    declare_template(&mut b, "Pick", None);
    let constrained = declare_template(
        &mut b,
        "Pick",
        Some(ConstraintExpr::concept("NonReferenceType", vec![TypeExpr::named("T")])),
    );

    let resolved = b.resolve_overload(&call(&b, "Pick", &[Argument::lvalue(int)])).unwrap();
    assert_eq!(b.symbols.function(resolved.function).instance_of, Some(constrained));
}

#[test]
fn test_refined_concept_is_more_specialized() {
    let mut b = binder();
    let global = b.symbols.global_scope();
    let int = b.symbols.types().int();
    let operator = |name: &str| ConstraintExpr::Function {
        return_type: Some(TypeExpr::named("bool")),
        group_name: name.to_string(),
        parameters: vec![TypeExpr::named("T"), TypeExpr::named("T")],
    };
    b.symbols.declare_concept_with(global, "Equatable", &["T"], vec![operator("operator==")]);
    let ordered = b.symbols.declare_concept_with(global, "Ordered", &["T"], vec![operator("operator<")]);
    b.symbols.set_concept_refines(
        ordered,
        ConceptRef { name: "Equatable".to_string(), arguments: vec![TypeExpr::named("T")] },
    );

    declare_template(&mut b, "Sort", Some(ConstraintExpr::concept("Equatable", vec![TypeExpr::named("T")])));
    let by_order =
        declare_template(&mut b, "Sort", Some(ConstraintExpr::concept("Ordered", vec![TypeExpr::named("T")])));

    let resolved = b.resolve_overload(&call(&b, "Sort", &[Argument::lvalue(int)])).unwrap();
    assert_eq!(b.symbols.function(resolved.function).instance_of, Some(by_order));
}

// === Built-in operators ===

#[test]
fn test_less_than_on_ints() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let request = OverloadRequest::new("operator<", &[Argument::lvalue(int), Argument::rvalue(int)]);
    let resolved = b.resolve_overload(&request).unwrap();
    let function = b.symbols.function(resolved.function);
    assert_eq!(function.return_type, Some(b.symbols.types().bool()));
    assert_eq!(function.kind, FunctionKind::Free);
    assert_eq!(resolved.conversions, vec![None, None]);
    assert_eq!(resolved.user_conversions, 0);
}

#[test]
fn test_mixed_comparison_widens_to_double() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let double = b.symbols.types().double();
    let request = OverloadRequest::new("operator<", &[Argument::lvalue(int), Argument::lvalue(double)]);
    let resolved = b.resolve_overload(&request).unwrap();
    assert_eq!(b.symbols.signature(resolved.function), "operator<(double, double)");
    assert!(resolved.conversions[0].is_some());
    assert!(resolved.conversions[1].is_none());
}

#[test]
fn test_unknown_group_has_no_candidates() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let error = b.resolve_overload(&call(&b, "Missing", &[Argument::lvalue(int)])).unwrap_err();
    assert!(matches!(error, BindError::NoViableFunction { viable: 0, .. }));
    assert!(error.to_string().starts_with("overload resolution failed: 'Missing' not found."));
}

// === Failures and rewrites ===

#[test]
fn test_explicit_constructor_reports_cast_hint() {
    let mut b = binder();
    let global = b.symbols.global_scope();
    let double = b.symbols.types().double();
    let meters = b.symbols.declare_class(global, "Meters", Span::dummy());
    let scope = b.symbols.types().scope_of(meters).unwrap();
    let this = b.symbols.types_mut().make_pointer(meters);
    b.symbols.add_function(
        scope,
        FunctionSymbol::constructor(meters, this).with_param("value", double).with_flags(FunctionFlags::EXPLICIT),
    );

    let args = [Argument::lvalue(this), Argument::lvalue(double)];
    let error = b.resolve_overload(&OverloadRequest::new(CONSTRUCTOR, &args)).unwrap_err();
    assert!(error.to_string().contains("a cast is required"), "{error}");
    assert!(b.resolve_overload(&OverloadRequest::new(CONSTRUCTOR, &args).explicit()).is_ok());
}

#[test]
fn test_suppressed_function_cannot_be_called() {
    let mut b = binder();
    let int = b.symbols.types().int();
    declare(&mut b, FunctionSymbol::free("Gone").with_param("x", int).with_flags(FunctionFlags::SUPPRESSED));
    let error = b.resolve_overload(&call(&b, "Gone", &[Argument::lvalue(int)])).unwrap_err();
    assert!(matches!(error, BindError::SuppressedFunction { .. }));
}

#[test]
fn test_debug_heap_redirect() {
    let mut b = Binder::new(BinderConfig::default().with_debug_heap(true));
    let long = b.symbols.types().long();
    let void_ptr = b.symbols.types_mut().void_ptr();
    declare(&mut b, FunctionSymbol::free("MemAlloc").with_param("size", long).returns(void_ptr));
    let debug = declare(&mut b, FunctionSymbol::free("DebugHeapMemAlloc").with_param("size", long).returns(void_ptr));

    let resolved = b.resolve_overload(&call(&b, "MemAlloc", &[Argument::lvalue(long)])).unwrap();
    assert_eq!(resolved.function, debug);

    b.config.debug_heap = false;
    let resolved = b.resolve_overload(&call(&b, "MemAlloc", &[Argument::lvalue(long)])).unwrap();
    assert_eq!(b.symbols.function(resolved.function).group_name, "MemAlloc");
}

#[test]
fn test_conversion_function_widens_into_constructor() {
    let mut b = binder();
    let global = b.symbols.global_scope();
    let target = b.symbols.declare_class(global, "Target", Span::dummy());
    let source = b.symbols.declare_class(global, "Source", Span::dummy());
    let source_scope = b.symbols.types().scope_of(source).unwrap();
    let types = b.symbols.types_mut();
    let source_this = types.make_pointer(source);
    let target_this = types.make_pointer(target);
    let conversion = b.symbols.add_function(source_scope, FunctionSymbol::conversion_function(source, source_this, target));

    let args = [Argument::lvalue(target_this), Argument::lvalue(source)];
    let resolved = b.resolve_overload(&OverloadRequest::new(CONSTRUCTOR, &args)).unwrap();
    let widened = b.symbols.function(resolved.function);
    assert!(widened.is_generated());
    let body = widened.body.as_ref().unwrap();
    assert_eq!(body.len(), 1);
    let again = b.resolve_overload(&OverloadRequest::new(CONSTRUCTOR, &args)).unwrap();
    assert_eq!(again.function, resolved.function);
    assert!(b.widened_constructors.contains_key(&(conversion, target)));
}

// === Templates ===

#[test]
fn test_template_instances_are_memoized() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let template = declare_template(&mut b, "Echo", None);

    let first = b.resolve_overload(&call(&b, "Echo", &[Argument::lvalue(int)])).unwrap();
    let second = b.resolve_overload(&call(&b, "Echo", &[Argument::rvalue(int)])).unwrap();
    assert_eq!(first.function, second.function);
    assert_eq!(first.template_args, vec![int]);
    assert_eq!(b.stats.function_instantiations, 1);
    assert!(b.pending_instantiations.contains(&first.function));

    let instance = b.symbols.function(first.function);
    assert_eq!(instance.instance_of, Some(template));
    assert_eq!(instance.param_types(), vec![int]);
    assert_eq!(instance.return_type, Some(int));
    assert!(instance.type_params.is_empty());
}

#[test]
fn test_explicit_template_arguments_skip_deduction() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let long = b.symbols.types().long();
    declare_template(&mut b, "Echo", None);

    let request = call(&b, "Echo", &[Argument::lvalue(int)]).with_template_args(vec![long]);
    let resolved = b.resolve_overload(&request).unwrap();
    assert_eq!(resolved.template_args, vec![long]);
    assert_eq!(b.symbols.function(resolved.function).return_type, Some(long));
}

#[test]
fn test_probe_does_not_instantiate() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let template = declare_template(&mut b, "Echo", None);
    let request = call(&b, "Echo", &[Argument::lvalue(int)]).with_flags(ResolveFlags::DONT_INSTANTIATE);
    let resolved = b.probe_overload(&request).unwrap();
    assert_eq!(resolved.function, template);
    assert!(b.pending_instantiations.is_empty());
    assert!(b.probe_overload(&call(&b, "Nope", &[Argument::lvalue(int)])).is_none());
}

#[test]
fn test_failed_constraint_is_reported() {
    let mut b = binder();
    let int = b.symbols.types().int();
    let int_ref = b.symbols.types_mut().make_reference(int);
    let t = b.symbols.new_type_parameter("T", 0);
    declare(
        &mut b,
        FunctionSymbol::free("Store")
            .with_type_params(vec![t])
            .with_param("value", t)
            .with_constraint(ConstraintExpr::concept("NonReferenceType", vec![TypeExpr::named("T")])),
    );
    let request = call(&b, "Store", &[Argument::lvalue(int)]).with_template_args(vec![int_ref]);
    let error = b.resolve_overload(&request).unwrap_err();
    assert!(error.to_string().contains("is a reference type"), "{error}");
}

// === Properties ===

fn counts(pointers: u8, reference: u8, is_const: bool) -> DerivationCounts {
    let reference = match reference {
        0 => RefKind::None,
        1 => RefKind::Lvalue,
        _ => RefKind::Rvalue,
    };
    DerivationCounts { is_const, pointers, arrays: 0, reference }
}

/// `Refined` (2) refines `Base` (1); concept 3 is unrelated.
fn refinement_chain() -> ConceptRefinements {
    let mut refinements = ConceptRefinements::default();
    refinements.insert(ConceptId(2), ConceptId(1));
    refinements
}

prop_compose! {
    fn argument_match()(
        exact in any::<bool>(),
        distance in 0u32..4,
        param in (0u8..2, 0u8..3, any::<bool>()),
        arg in (0u8..2, 0u8..3, any::<bool>()),
        user in any::<bool>(),
    ) -> ArgumentMatch {
        let mut argument = if exact {
            ArgumentMatch::exact(counts(param.0, param.1, param.2), counts(arg.0, arg.1, arg.2))
        } else {
            ArgumentMatch::conversion(distance + 1, None)
        };
        argument.user_defined = user;
        argument
    }
}

fn constraint() -> impl Strategy<Value = Option<BoundConstraint>> {
    prop_oneof![
        Just(None),
        Just(Some(BoundConstraint::concept(ConceptId(1)))),
        Just(Some(BoundConstraint::concept(ConceptId(2)))),
        Just(Some(BoundConstraint::concept(ConceptId(3)))),
    ]
}

/// Everything a candidate is ranked on besides its argument matches.
#[derive(Debug, Clone)]
struct Traits {
    is_template: bool,
    is_specialization: bool,
    is_array_operation: bool,
    constraint: Option<BoundConstraint>,
}

prop_compose! {
    fn traits()(
        is_template in any::<bool>(),
        is_specialization in any::<bool>(),
        is_array_operation in any::<bool>(),
        constraint in constraint(),
    ) -> Traits {
        Traits { is_template, is_specialization, is_array_operation, constraint }
    }
}

fn candidate(arguments: Vec<ArgumentMatch>, traits: Traits) -> FunctionMatch {
    let mut matched = FunctionMatch::new(FunctionId(0)).with_matches(arguments);
    matched.is_template = traits.is_template;
    matched.is_specialization = traits.is_specialization;
    matched.is_array_operation = traits.is_array_operation;
    matched.constraint = traits.constraint;
    matched
}

prop_compose! {
    fn function_match(arity: usize)(
        arguments in proptest::collection::vec(argument_match(), arity),
        traits in traits(),
    ) -> FunctionMatch {
        candidate(arguments, traits)
    }
}

/// Three candidates for the same call.
fn triple(arity: std::ops::Range<usize>) -> impl Strategy<Value = (FunctionMatch, FunctionMatch, FunctionMatch)> {
    arity.prop_flat_map(|n| (function_match(n), function_match(n), function_match(n)))
}

proptest! {
    #[test]
    fn test_ranking_is_irreflexive_and_asymmetric((a, b, c) in triple(1..4)) {
        let refinements = refinement_chain();
        for x in [&a, &b, &c] {
            prop_assert!(!better_function_match(x, x, &refinements));
            for y in [&a, &b, &c] {
                prop_assert!(!(better_function_match(x, y, &refinements) && better_function_match(y, x, &refinements)));
            }
        }
    }

    #[test]
    fn test_ranking_is_transitive_for_single_arguments((a, b, c) in triple(1..2)) {
        let refinements = refinement_chain();
        if better_function_match(&a, &b, &refinements) && better_function_match(&b, &c, &refinements) {
            prop_assert!(better_function_match(&a, &c, &refinements));
        }
    }

    #[test]
    fn test_argument_counts_are_transitive_for_two_arguments(
        arguments in proptest::collection::vec(proptest::collection::vec(argument_match(), 2), 3),
        shared in traits(),
    ) {
        // Equal traits leave criterion (a) alone; user conversions follow the arguments.
        let refinements = refinement_chain();
        let mut all: Vec<FunctionMatch> =
            arguments.into_iter().map(|args| candidate(args, shared.clone())).collect();
        for matched in &mut all {
            matched.user_conversions = 0;
        }
        let (a, b, c) = (&all[0], &all[1], &all[2]);
        if better_function_match(a, b, &refinements) && better_function_match(b, c, &refinements) {
            prop_assert!(better_function_match(a, c, &refinements));
        }
    }

    #[test]
    fn test_maximal_set_is_never_empty_for_single_arguments(
        matches in proptest::collection::vec(function_match(1), 1..6),
    ) {
        let maximal = find_maximal(&matches, &refinement_chain());
        prop_assert!(!maximal.is_empty());
    }
}

#[test]
fn test_refined_constraint_outranks_its_base() {
    let refinements = refinement_chain();
    let exact = || vec![ArgumentMatch::exact(counts(0, 0, false), counts(0, 0, false))];
    let traits = |concept: Option<u32>| Traits {
        is_template: true,
        is_specialization: false,
        is_array_operation: false,
        constraint: concept.map(|c| BoundConstraint::concept(ConceptId(c))),
    };
    let refined = candidate(exact(), traits(Some(2)));
    let base = candidate(exact(), traits(Some(1)));
    let unrelated = candidate(exact(), traits(Some(3)));
    let unconstrained = candidate(exact(), traits(None));

    assert!(better_function_match(&refined, &base, &refinements));
    assert!(better_function_match(&base, &unconstrained, &refinements));
    assert!(better_function_match(&refined, &unconstrained, &refinements));
    assert!(!better_function_match(&refined, &unrelated, &refinements));
    assert!(!better_function_match(&unrelated, &refined, &refinements));
    assert_eq!(find_maximal(&[base.clone(), refined.clone(), unconstrained], &refinements), vec![1]);

    let mut specialization = candidate(exact(), traits(Some(2)));
    specialization.is_specialization = true;
    assert!(better_function_match(&base, &specialization, &refinements));
}

#[test]
fn test_two_argument_tie_can_cycle_through_lower_criteria() {
    // Criterion (a) ties when each side wins one position, handing the
    // decision to later criteria that need not agree around the cycle.
    let refinements = ConceptRefinements::default();
    let exact = ArgumentMatch::exact(counts(0, 0, false), counts(0, 0, false));
    let near = ArgumentMatch::conversion(1, None);
    let far = ArgumentMatch::conversion(2, None);
    let plain = Traits { is_template: false, is_specialization: false, is_array_operation: false, constraint: None };

    let mut a = candidate(vec![exact, far], plain.clone());
    a.is_template = true;
    let mut b = candidate(vec![near, near], plain.clone());
    b.user_conversions = 1;
    let c = candidate(vec![far, near], plain);

    assert!(better_function_match(&a, &b, &refinements));
    assert!(better_function_match(&b, &c, &refinements));
    assert!(better_function_match(&c, &a, &refinements));
    assert!(find_maximal(&[a, b, c], &refinements).is_empty());
}
