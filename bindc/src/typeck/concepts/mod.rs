//! Constraint checking and concept instantiation.
//!
//! # Algorithm
//!
//! A constraint is checked against the type arguments of a candidate in an
//! overlay scope that binds the template parameter names. Every node yields
//! a [`BoundConstraint`]; an unmet requirement is an error carrying the
//! innermost message.
//!
//! ```text
//! A or B    both sides checked, errors become `false`; fails if neither holds
//! A and B   both sides checked; fails with the first failing side's message
//! Concept<X...>
//!           instantiate the concept: bind its parameters, instantiate the
//!           refined concept first, then check every body constraint
//! ```
//!
//! Concept instantiations are memoized per (concept, arguments), successful
//! or not, for the lifetime of the binder.

mod bound;
#[cfg(test)]
mod tests;

pub use bound::BoundConstraint;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::ast::{ConceptRef, ConstraintExpr, TypeExpr};
use crate::error::BindError;
use crate::symbols::{
    ConceptId, FunctionId, FunctionSymbol, ScopeId, ScopeLookup, SpecialMembers, Symbol, SymbolFilter, TypeId,
    CONSTRUCTOR,
};
use crate::value::ValueKind;

use super::conversion::{Argument, ConversionContext};
use super::overload::{OverloadRequest, ResolveFlags, ResolvedCall};
use super::Binder;

/// Name the `Common` concept binds its result to.
pub const COMMON_TYPE: &str = "CommonType";

/// A successfully instantiated concept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstantiatedConcept {
    pub bound: BoundConstraint,
    /// `CommonType` bound by a `Common` requirement, if any.
    pub common_type: Option<TypeId>,
}

/// Where a constraint is checked.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintContext {
    /// Overlay scope binding the parameter names.
    pub scope: ScopeId,
    /// First and second type arguments; intrinsic constraints act on these.
    pub first: Option<TypeId>,
    pub second: Option<TypeId>,
}

impl Binder {
    /// Check one constraint node.
    pub fn check_constraint(
        &mut self,
        expr: &ConstraintExpr,
        cx: &ConstraintContext,
    ) -> Result<BoundConstraint, BindError> {
        match expr {
            ConstraintExpr::Disjunction(left, right) => {
                let (l, l_err) = self.check_operand(left, cx);
                let (r, r_err) = self.check_operand(right, cx);
                let bound = BoundConstraint::or(l, r);
                if bound.is_satisfied() {
                    return Ok(bound);
                }
                let describe = |e: Option<BindError>, side: &ConstraintExpr| {
                    e.map(|e| e.to_string()).unwrap_or_else(|| side.describe())
                };
                Err(BindError::concept(format!(
                    "neither alternative is satisfied: {}; {}",
                    describe(l_err, left),
                    describe(r_err, right)
                )))
            }
            ConstraintExpr::Conjunction(left, right) => {
                let (l, l_err) = self.check_operand(left, cx);
                let (r, r_err) = self.check_operand(right, cx);
                let bound = BoundConstraint::and(l, r);
                if bound.is_satisfied() {
                    return Ok(bound);
                }
                Err(l_err
                    .or(r_err)
                    .unwrap_or_else(|| BindError::concept(format!("{} not satisfied", expr.describe()))))
            }
            ConstraintExpr::Predicate(predicate) => {
                if self.is_always_true(predicate, cx.scope) {
                    return Ok(BoundConstraint::atomic(true));
                }
                let value = self.evaluate(Some(ValueKind::Bool), false, predicate, cx.scope)?;
                match value.as_bool() {
                    Some(true) => Ok(BoundConstraint::atomic(true)),
                    _ => Err(BindError::concept("constraint predicate evaluates to false")),
                }
            }
            ConstraintExpr::Is { subject, target } => self.check_is(subject, target, cx),
            ConstraintExpr::ConceptId { name, arguments } => {
                let args = arguments
                    .iter()
                    .map(|arg| self.resolve_type(arg, cx.scope))
                    .collect::<Result<Vec<_>, _>>()?;
                let concept = self.find_concept(cx.scope, name, args.len())?;
                let instantiated = self.instantiate_concept(concept, &args)?;
                self.adopt_common_type(cx.scope, instantiated.common_type);
                Ok(instantiated.bound)
            }
            ConstraintExpr::Typename(ty) => {
                self.resolve_type(ty, cx.scope)?;
                Ok(BoundConstraint::atomic(true))
            }
            ConstraintExpr::Constructor { parameters } => {
                let target = self.first_argument(cx, expr)?;
                let params = self.resolve_all(parameters, cx.scope)?;
                let this = self.symbols.types_mut().make_pointer(target);
                let mut args = vec![Argument::lvalue(this)];
                args.extend(params.iter().map(|&p| self.argument_of_type(p)));
                let mut request = OverloadRequest::new(CONSTRUCTOR, &args).with_flags(ResolveFlags::DONT_INSTANTIATE);
                if let Some(scope) = self.symbols.types().scope_of(target) {
                    request = request.with_lookup(scope, ScopeLookup::THIS);
                }
                match self.probe_overload(&request) {
                    Some(_) => Ok(BoundConstraint::atomic(true)),
                    None => Err(BindError::concept(format!(
                        "type '{}' has no constructor taking ({})",
                        self.type_name(target),
                        self.type_list(&params)
                    ))),
                }
            }
            ConstraintExpr::Destructor => {
                let target = self.first_argument(cx, expr)?;
                let plain = self.symbols.types().make_plain(target);
                let suppressed = self
                    .symbols
                    .types()
                    .class(plain)
                    .is_some_and(|info| info.suppressed.contains(SpecialMembers::DESTRUCTOR));
                if suppressed {
                    return Err(BindError::concept(format!("destructor of '{}' is suppressed", self.type_name(plain))));
                }
                Ok(BoundConstraint::atomic(true))
            }
            ConstraintExpr::MemberFunction { return_type, name, parameters } => {
                let target = self.first_argument(cx, expr)?;
                let params = self.resolve_all(parameters, cx.scope)?;
                let found = self.probe_member(target, name, &params, ScopeLookup::THIS_AND_BASE);
                let resolved = found.ok_or_else(|| {
                    BindError::concept(format!(
                        "type '{}' has no member function '{}({})'",
                        self.type_name(target),
                        name,
                        self.type_list(&params)
                    ))
                })?;
                self.check_return_type(&resolved, return_type.as_ref(), cx)?;
                Ok(BoundConstraint::atomic(true))
            }
            ConstraintExpr::Function { return_type, group_name, parameters } => {
                self.check_function_requirement(return_type.as_ref(), group_name, parameters, cx)
            }
            ConstraintExpr::Same => {
                let (t, u) = self.both_arguments(cx, expr)?;
                if t == u {
                    return Ok(BoundConstraint::atomic(true));
                }
                Err(BindError::concept(format!(
                    "types '{}' and '{}' are not the same",
                    self.type_name(t),
                    self.type_name(u)
                )))
            }
            ConstraintExpr::Derived => {
                let (t, u) = self.both_arguments(cx, expr)?;
                let types = self.symbols.types();
                if types.has_base_class(types.make_plain(t), types.make_plain(u)) {
                    return Ok(BoundConstraint::atomic(true));
                }
                Err(BindError::concept(format!(
                    "type '{}' is not derived from '{}'",
                    self.type_name(t),
                    self.type_name(u)
                )))
            }
            ConstraintExpr::Convertible | ConstraintExpr::ExplicitlyConvertible => {
                let (t, u) = self.both_arguments(cx, expr)?;
                let context = match expr {
                    ConstraintExpr::Convertible => ConversionContext::Implicit,
                    _ => ConversionContext::Explicit,
                };
                if self.is_convertible(t, u, context) {
                    return Ok(BoundConstraint::atomic(true));
                }
                Err(BindError::concept(format!(
                    "type '{}' is not {}convertible to '{}'",
                    self.type_name(t),
                    if context == ConversionContext::Explicit { "explicitly " } else { "" },
                    self.type_name(u)
                )))
            }
            ConstraintExpr::Common => {
                let (t, u) = self.both_arguments(cx, expr)?;
                let common = if self.is_convertible(t, u, ConversionContext::Implicit) {
                    u
                } else if self.is_convertible(u, t, ConversionContext::Implicit) {
                    t
                } else {
                    return Err(BindError::concept(format!(
                        "types '{}' and '{}' have no common type",
                        self.type_name(t),
                        self.type_name(u)
                    )));
                };
                self.symbols.declare(cx.scope, COMMON_TYPE, Symbol::Type(common));
                Ok(BoundConstraint::atomic(true))
            }
            ConstraintExpr::NonReferenceType => {
                let t = self.first_argument(cx, expr)?;
                if self.symbols.types().is_reference(t) {
                    return Err(BindError::concept(format!("type '{}' is a reference type", self.type_name(t))));
                }
                Ok(BoundConstraint::atomic(true))
            }
        }
    }

    /// Check an operand of `and`/`or`; errors count as unsatisfied.
    fn check_operand(
        &mut self,
        expr: &ConstraintExpr,
        cx: &ConstraintContext,
    ) -> (BoundConstraint, Option<BindError>) {
        match self.check_constraint(expr, cx) {
            Ok(bound) => (bound, None),
            Err(error) => {
                trace!(%error, "constraint operand failed");
                (BoundConstraint::atomic(false), Some(error))
            }
        }
    }

    // === Concepts ===

    /// Instantiate `concept` for `args`, once per binder.
    pub fn instantiate_concept(
        &mut self,
        concept: ConceptId,
        args: &[TypeId],
    ) -> Result<InstantiatedConcept, BindError> {
        let key = (concept, args.to_vec());
        if let Some(cached) = self.concept_cache.get(&key) {
            self.stats.concept_cache_hits += 1;
            return cached.clone();
        }
        self.stats.concept_instantiations += 1;
        let result = self.evaluate_concept(concept, args);
        let label = self.concept_label(concept, args);
        let result = result.map_err(|error| error.prefixed(&label));
        match &result {
            Ok(_) => debug!(concept = %label, "concept satisfied"),
            Err(error) => debug!(concept = %label, %error, "concept not satisfied"),
        }
        self.concept_cache.insert(key, result.clone());
        result
    }

    fn evaluate_concept(&mut self, concept: ConceptId, args: &[TypeId]) -> Result<InstantiatedConcept, BindError> {
        let symbol = self.symbols.concept(concept).clone();
        if symbol.arity() != args.len() {
            return Err(BindError::WrongTypeArgumentCount {
                name: symbol.name.clone(),
                expected: symbol.arity(),
                found: args.len(),
                span: symbol.span,
            });
        }
        let scope = self.symbols.new_instantiation_scope(symbol.scope);
        for (name, &arg) in symbol.type_param_names.iter().zip(args) {
            self.symbols.declare(scope, name, Symbol::Type(arg));
        }
        let cx = ConstraintContext { scope, first: args.first().copied(), second: args.get(1).copied() };
        let result = self.evaluate_concept_body(concept, &symbol.refines, &symbol.body, &cx);
        let common_type = self.common_type_in(scope);
        self.symbols.release_scope(scope);
        result.map(|bound| InstantiatedConcept { bound, common_type })
    }

    fn evaluate_concept_body(
        &mut self,
        concept: ConceptId,
        refines: &Option<ConceptRef>,
        body: &[ConstraintExpr],
        cx: &ConstraintContext,
    ) -> Result<BoundConstraint, BindError> {
        let mut bound = BoundConstraint::concept(concept);
        if let Some(refined) = refines {
            let args = self.resolve_all(&refined.arguments, cx.scope)?;
            let parent = self.find_concept(cx.scope, &refined.name, args.len())?;
            self.concept_refinements.insert(concept, parent);
            let instantiated = self.instantiate_concept(parent, &args)?;
            self.adopt_common_type(cx.scope, instantiated.common_type);
            bound = BoundConstraint::and(bound, instantiated.bound);
        }
        for constraint in body {
            let checked = self.check_constraint(constraint, cx)?;
            bound = BoundConstraint::and(bound, checked);
        }
        Ok(bound)
    }

    /// Check the `where` clause of a function template for `template_args`.
    pub(crate) fn check_function_constraint(
        &mut self,
        function: &FunctionSymbol,
        template_args: &[TypeId],
        constraint: &ConstraintExpr,
    ) -> Result<(BoundConstraint, Option<TypeId>), BindError> {
        let parent = function.scope.unwrap_or_else(|| self.symbols.global_scope());
        let scope = self.symbols.new_instantiation_scope(parent);
        for (index, &arg) in template_args.iter().enumerate() {
            if let Some(name) = self.type_param_name(function.type_params.get(index).copied()) {
                self.symbols.declare(scope, &name, Symbol::Type(arg));
            }
        }
        let cx = ConstraintContext { scope, first: template_args.first().copied(), second: template_args.get(1).copied() };
        let result = self.check_constraint(constraint, &cx);
        let common_type = self.common_type_in(scope);
        self.symbols.release_scope(scope);
        result.map(|bound| (bound, common_type))
    }

    /// The concept of `name` taking `arity` arguments.
    fn find_concept(&self, scope: ScopeId, name: &str, arity: usize) -> Result<ConceptId, BindError> {
        let found = self.symbols.lookup_qualified(
            scope,
            name,
            ScopeLookup::THIS_AND_BASE_AND_PARENT,
            SymbolFilter::CONCEPTS,
        );
        let Some(Symbol::Concepts(group)) = found else {
            return Err(BindError::concept(format!("concept '{}' not found", name)));
        };
        group
            .into_iter()
            .find(|&id| self.symbols.concept(id).arity() == arity)
            .ok_or_else(|| BindError::concept(format!("concept '{}' taking {} type arguments not found", name, arity)))
    }

    fn concept_label(&self, concept: ConceptId, args: &[TypeId]) -> String {
        let names: Vec<&str> = args.iter().map(|&a| self.type_name(a)).collect();
        self.symbols.concept(concept).display(&names)
    }

    // === Helpers ===

    fn check_is(
        &mut self,
        subject: &TypeExpr,
        target: &TypeExpr,
        cx: &ConstraintContext,
    ) -> Result<BoundConstraint, BindError> {
        let subject = self.resolve_type(subject, cx.scope)?;
        if let TypeExpr::Named(name) = target {
            let found = self.symbols.lookup_qualified(
                cx.scope,
                name,
                ScopeLookup::THIS_AND_BASE_AND_PARENT,
                SymbolFilter::CONCEPTS,
            );
            if let Some(Symbol::Concepts(_)) = found {
                let concept = self.find_concept(cx.scope, name, 1)?;
                let instantiated = self.instantiate_concept(concept, &[subject])?;
                self.adopt_common_type(cx.scope, instantiated.common_type);
                return Ok(instantiated.bound);
            }
        }
        let target = self.resolve_type(target, cx.scope)?;
        let types = self.symbols.types();
        if types.make_plain(subject) == types.make_plain(target) {
            return Ok(BoundConstraint::atomic(true));
        }
        Err(BindError::concept(format!("type '{}' is not '{}'", self.type_name(subject), self.type_name(target))))
    }

    /// Try the `R name(params)` forms: member, member without the first
    /// parameter, free function.
    fn check_function_requirement(
        &mut self,
        return_type: Option<&TypeExpr>,
        group_name: &str,
        parameters: &[TypeExpr],
        cx: &ConstraintContext,
    ) -> Result<BoundConstraint, BindError> {
        let params = self.resolve_all(parameters, cx.scope)?;
        let mut attempts: Vec<Option<ResolvedCall>> = Vec::new();
        if let Some(target) = cx.first.filter(|&t| self.symbols.types().class_of(t).is_some()) {
            attempts.push(self.probe_member(target, group_name, &params, ScopeLookup::THIS_AND_BASE));
            if let Some((_, rest)) = params.split_first() {
                attempts.push(self.probe_member(target, group_name, rest, ScopeLookup::THIS_AND_BASE));
            }
        }
        let args: Vec<Argument> = params.iter().map(|&p| self.argument_of_type(p)).collect();
        let request = OverloadRequest::new(group_name, &args)
            .with_lookup(cx.scope, ScopeLookup::THIS_AND_PARENT)
            .with_file_scopes()
            .with_flags(ResolveFlags::DONT_INSTANTIATE);
        attempts.push(self.probe_overload(&request));

        let mut last_error = None;
        for resolved in attempts.into_iter().flatten() {
            match self.check_return_type(&resolved, return_type, cx) {
                Ok(()) => return Ok(BoundConstraint::atomic(true)),
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            BindError::concept(format!("function '{}({})' not found", group_name, self.type_list(&params)))
        }))
    }

    fn probe_member(
        &mut self,
        target: TypeId,
        name: &str,
        params: &[TypeId],
        lookup: ScopeLookup,
    ) -> Option<ResolvedCall> {
        let scope = self.symbols.types().scope_of(target)?;
        let this = self.symbols.types_mut().make_pointer(target);
        let mut args = vec![Argument::lvalue(this)];
        args.extend(params.iter().map(|&p| self.argument_of_type(p)));
        let request =
            OverloadRequest::new(name, &args).with_lookup(scope, lookup).with_flags(ResolveFlags::DONT_INSTANTIATE);
        self.probe_overload(&request)
    }

    fn check_return_type(
        &mut self,
        resolved: &ResolvedCall,
        expected: Option<&TypeExpr>,
        cx: &ConstraintContext,
    ) -> Result<(), BindError> {
        let Some(expected) = expected else {
            return Ok(());
        };
        let expected = self.resolve_type(expected, cx.scope)?;
        let actual = self.return_type_of(resolved.function, &resolved.template_args);
        if actual == Some(expected) {
            return Ok(());
        }
        Err(BindError::concept(format!(
            "'{}' does not return '{}'",
            self.symbols.signature(resolved.function),
            self.type_name(expected)
        )))
    }

    /// Return type of a possibly uninstantiated template.
    fn return_type_of(&mut self, function: FunctionId, template_args: &[TypeId]) -> Option<TypeId> {
        let symbol = self.symbols.function(function);
        let return_type = symbol.return_type?;
        if template_args.is_empty() || symbol.type_params.is_empty() {
            return Some(return_type);
        }
        let mapping: FxHashMap<TypeId, TypeId> = symbol.type_params.iter().copied().zip(template_args.iter().copied()).collect();
        Some(self.symbols.types_mut().substitute(return_type, &mapping))
    }

    /// Whether a `T` converts to a `U` by constructing a `U` from it.
    fn is_convertible(&mut self, t: TypeId, u: TypeId, context: ConversionContext) -> bool {
        let target = self.symbols.types_mut().make_pointer(u);
        let args = [Argument::lvalue(target), Argument::lvalue(t)];
        let request = OverloadRequest::new(CONSTRUCTOR, &args)
            .with_context(context)
            .with_flags(ResolveFlags::DONT_INSTANTIATE);
        self.probe_overload(&request).is_some()
    }

    fn argument_of_type(&mut self, ty: TypeId) -> Argument {
        if self.symbols.types().is_rvalue_reference(ty) {
            let value = self.symbols.types_mut().remove_reference(ty);
            return Argument::rvalue(value);
        }
        Argument::lvalue(ty)
    }

    fn resolve_all(&mut self, exprs: &[TypeExpr], scope: ScopeId) -> Result<Vec<TypeId>, BindError> {
        exprs.iter().map(|e| self.resolve_type(e, scope)).collect()
    }

    fn first_argument(&self, cx: &ConstraintContext, expr: &ConstraintExpr) -> Result<TypeId, BindError> {
        cx.first.ok_or_else(|| BindError::concept(format!("{} needs a type argument", expr.describe())))
    }

    fn both_arguments(&self, cx: &ConstraintContext, expr: &ConstraintExpr) -> Result<(TypeId, TypeId), BindError> {
        match (cx.first, cx.second) {
            (Some(t), Some(u)) => Ok((t, u)),
            _ => Err(BindError::concept(format!("{} needs two type arguments", expr.describe()))),
        }
    }

    fn adopt_common_type(&mut self, scope: ScopeId, common: Option<TypeId>) {
        if let Some(common) = common {
            self.symbols.declare(scope, COMMON_TYPE, Symbol::Type(common));
        }
    }

    fn common_type_in(&self, scope: ScopeId) -> Option<TypeId> {
        match self.symbols.lookup(scope, COMMON_TYPE, ScopeLookup::THIS, SymbolFilter::TYPES) {
            Some(Symbol::Type(ty)) => Some(ty),
            _ => None,
        }
    }

    fn type_list(&self, types: &[TypeId]) -> String {
        types.iter().map(|&t| self.type_name(t)).collect::<Vec<_>>().join(", ")
    }
}
