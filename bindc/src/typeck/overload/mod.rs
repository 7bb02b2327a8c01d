//! Overload resolution.
//!
//! # Algorithm
//!
//! ```text
//! 1. collect candidates (repositories, class members, synthesized members,
//!    caller scopes)
//! 2. fail with "no viable function" when there are none
//! 3. match every candidate of the right arity:
//!      templates     deduce (or take explicit arguments), check constraint
//!      generic class members  substitute the instance's arguments
//!      others        match each argument
//! 4. when nothing matched, retry with constructors widened from the
//!    conversion functions of the source class
//! 5. keep the maximal candidates; more than one is ambiguous
//! 6. reject suppressed functions, instantiate, apply the debug heap redirect
//! ```

mod collect;
pub mod ranking;
#[cfg(test)]
mod tests;
mod types;

use indexmap::IndexSet;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::error::{BindError, CandidateNote};
use crate::symbols::{FunctionId, FunctionScopeLookup, ScopeLookup, Symbol, TypeId};

use super::conversion::ConversionContext;
use super::Binder;

pub use ranking::{better_function_match, find_maximal, refines, ConceptRefinements};
pub use types::{FunctionMatch, OverloadRequest, ResolveFlags, ResolvedCall};

/// Why a candidate did not survive matching.
enum Rejection {
    Mismatch,
    /// The candidate's constraint failed with this message.
    Constraint(String),
}

impl Binder {
    /// Select the function a call of `request.group_name` binds to.
    pub fn resolve_overload(&mut self, request: &OverloadRequest) -> Result<ResolvedCall, BindError> {
        self.stats.resolutions += 1;
        let name = request.group_name.clone();
        debug!(group = %name, arguments = request.arguments.len(), "resolving overload");

        // Step 1: collect.
        let (candidates, mut failure) = self.collect_viable_functions(request);
        let mut examined = candidates.len();

        // Step 3: match.
        let mut must_cast = None;
        let mut viable = self.match_candidates(&candidates, request, &mut must_cast, &mut failure);

        // Step 4: widening.
        if viable.is_empty() {
            let widened: IndexSet<FunctionId> = self.widening_candidates(request).into_iter().collect();
            examined += widened.len();
            viable = self.match_candidates(&widened, request, &mut must_cast, &mut failure);
        }

        // Step 2 is deferred until widening had its chance.
        if examined == 0 {
            debug!(group = %name, "no candidates");
            return Err(BindError::NoViableFunction { name, viable: 0, detail: failure, span: request.span });
        }
        if viable.is_empty() {
            let detail = match must_cast {
                Some(function) => Some(format!("a cast is required to use '{}'", self.symbols.signature(function))),
                None => failure,
            };
            debug!(group = %name, examined, "no candidate matched");
            return Err(BindError::NoViableFunction { name, viable: examined, detail, span: request.span });
        }

        // Step 5: rank.
        let selected = if viable.len() == 1 {
            viable.swap_remove(0)
        } else {
            let maximal = find_maximal(&viable, &self.concept_refinements);
            if maximal.len() != 1 {
                let shown: Vec<usize> = if maximal.is_empty() { (0..viable.len()).collect() } else { maximal };
                let candidates = shown
                    .iter()
                    .map(|&i| {
                        let function = self.symbols.function(viable[i].function);
                        CandidateNote { signature: self.symbols.signature(viable[i].function), span: function.span }
                    })
                    .collect();
                debug!(group = %name, "ambiguous call");
                return Err(BindError::AmbiguousCall { name, candidates, span: request.span });
            }
            viable.swap_remove(maximal[0])
        };

        // Step 6: finish.
        self.finish_resolution(selected, request)
    }

    /// Resolve without reporting; `None` when the call would not bind.
    pub fn probe_overload(&mut self, request: &OverloadRequest) -> Option<ResolvedCall> {
        match self.resolve_overload(request) {
            Ok(resolved) => Some(resolved),
            Err(error) => {
                trace!(%error, "probe failed");
                None
            }
        }
    }

    fn match_candidates(
        &mut self,
        candidates: &IndexSet<FunctionId>,
        request: &OverloadRequest,
        must_cast: &mut Option<FunctionId>,
        failure: &mut Option<String>,
    ) -> Vec<FunctionMatch> {
        let mut viable = Vec::new();
        for &id in candidates {
            let function = self.symbols.function(id);
            if function.arity() != request.arguments.len() {
                continue;
            }
            if request.context == ConversionContext::Implicit && function.is_explicit() && function.conversion.is_some() {
                must_cast.get_or_insert(id);
                continue;
            }
            let outcome = if function.is_template() {
                self.match_template(id, request)
            } else if !request.template_args.is_empty() {
                continue;
            } else {
                self.match_function(id, request).ok_or(Rejection::Mismatch)
            };
            match outcome {
                Ok(matched) => {
                    trace!(candidate = %self.symbols.signature(id), "viable");
                    viable.push(matched);
                }
                Err(Rejection::Constraint(message)) => {
                    failure.get_or_insert(message);
                }
                Err(Rejection::Mismatch) => {}
            }
        }
        viable
    }

    /// Match a non-template candidate.
    fn match_function(&mut self, id: FunctionId, request: &OverloadRequest) -> Option<FunctionMatch> {
        let function = self.symbols.function(id);
        let mut params = function.param_types();
        let is_array_operation = function.is_array_operation();
        let parent = function.parent;

        let mut class_instance = None;
        if let (Some(parent), Some(first)) = (parent, request.arguments.first()) {
            let types = self.symbols.types();
            let generic_parent = types.class(parent).is_some_and(|c| c.is_generic());
            let instance = types.class_of(first.ty).filter(|&c| types.instance_of(c).is_some_and(|(s, _)| s == parent));
            if let (true, Some(instance)) = (generic_parent, instance) {
                let mut mapping = types.instance_mapping(instance);
                mapping.insert(parent, instance);
                let types = self.symbols.types_mut();
                params = params.into_iter().map(|p| types.substitute(p, &mapping)).collect();
                class_instance = Some(instance);
            }
        }

        let mut matches = Vec::with_capacity(params.len());
        for (&param, arg) in params.iter().zip(&request.arguments) {
            matches.push(self.match_argument(param, arg, request.context)?);
        }
        let mut matched = FunctionMatch::new(id).with_matches(matches);
        matched.is_array_operation = is_array_operation;
        matched.class_instance = class_instance;
        Some(matched)
    }

    /// Match a function template: deduce, then check its constraint.
    fn match_template(&mut self, id: FunctionId, request: &OverloadRequest) -> Result<FunctionMatch, Rejection> {
        let function = self.symbols.function(id).clone();
        let params = function.param_types();
        let deduction = if request.template_args.is_empty() {
            self.deduce(&function.type_params, &params, &request.arguments, request.context)
        } else if request.template_args.len() == function.type_params.len() {
            self.match_substituted(
                &function.type_params,
                &request.template_args,
                &params,
                &request.arguments,
                request.context,
            )
        } else {
            None
        };
        let Some(deduction) = deduction else {
            trace!(candidate = %function.name, "deduction failed");
            return Err(Rejection::Mismatch);
        };

        let mut matched = FunctionMatch::new(id).with_matches(deduction.matches);
        matched.template_args = deduction.template_args;
        matched.is_template = true;
        matched.is_specialization = function.is_specialization();
        matched.is_array_operation = function.is_array_operation();

        if let Some(constraint) = &function.constraint {
            match self.check_function_constraint(&function, &matched.template_args, constraint) {
                Ok((bound, common_type)) => {
                    matched.constraint = Some(bound);
                    matched.common_type = common_type;
                }
                Err(error) => {
                    debug!(candidate = %function.name, %error, "constraint not satisfied");
                    return Err(Rejection::Constraint(error.to_string()));
                }
            }
        }
        Ok(matched)
    }

    fn finish_resolution(
        &mut self,
        selected: FunctionMatch,
        request: &OverloadRequest,
    ) -> Result<ResolvedCall, BindError> {
        let function = self.symbols.function(selected.function);
        if function.is_suppressed() {
            return Err(BindError::SuppressedFunction {
                signature: self.symbols.signature(selected.function),
                span: request.span,
            });
        }

        let instantiate = !request.flags.contains(ResolveFlags::DONT_INSTANTIATE);
        if instantiate {
            for &conversion in selected.conversions.iter().flatten() {
                if self.symbols.function(conversion).instance_of.is_some() {
                    self.pending_instantiations.insert(conversion);
                }
            }
        }

        let mut id = selected.function;
        if instantiate {
            if selected.is_template {
                id = self.instantiate_function_template(id, &selected.template_args, selected.common_type);
            } else if let Some(instance) = selected.class_instance {
                if let Some((subject, args)) = self.symbols.types().instance_of(instance) {
                    id = self.instantiate_class_member(id, subject, instance, &args);
                    self.pending_instantiations.insert(id);
                }
            }
        }
        id = self.redirect_debug_heap(id);

        debug!(selected = %self.symbols.signature(id), "overload resolved");
        Ok(ResolvedCall {
            function: id,
            conversions: selected.conversions,
            template_args: selected.template_args,
            user_conversions: selected.user_conversions,
        })
    }

    // === Instantiation ===

    /// The instance of a function template for `args`, created once.
    pub(crate) fn instantiate_function_template(
        &mut self,
        template: FunctionId,
        args: &[TypeId],
        common_type: Option<TypeId>,
    ) -> FunctionId {
        let key = (template, args.to_vec());
        if let Some(&existing) = self.instantiations.get(&key) {
            return existing;
        }
        let mut instance = self.symbols.function(template).clone();
        let mapping: FxHashMap<TypeId, TypeId> =
            instance.type_params.iter().copied().zip(args.iter().copied()).collect();

        let parent_scope = instance.scope.unwrap_or_else(|| self.symbols.global_scope());
        let scope = self.symbols.new_instantiation_scope(parent_scope);
        for (index, &arg) in args.iter().enumerate() {
            if let Some(name) = self.type_param_name(instance.type_params.get(index).copied()) {
                self.symbols.declare(scope, &name, Symbol::Type(arg));
            }
        }
        if let Some(common) = common_type {
            self.symbols.declare(scope, "CommonType", Symbol::Type(common));
        }

        let types = self.symbols.types_mut();
        for param in &mut instance.params {
            param.ty = types.substitute(param.ty, &mapping);
        }
        instance.return_type = instance.return_type.map(|ty| types.substitute(ty, &mapping));
        instance.type_params = Vec::new();
        instance.constraint = None;
        instance.instance_of = Some(template);
        instance.template_args = args.to_vec();
        instance.instance_scope = Some(scope);

        let id = self.symbols.add_detached_function(instance);
        self.instantiations.insert(key, id);
        self.stats.function_instantiations += 1;
        self.pending_instantiations.insert(id);
        trace!(instance = %self.symbols.signature(id), "instantiated function template");
        id
    }

    /// The source name of a type parameter.
    pub(crate) fn type_param_name(&self, param: Option<TypeId>) -> Option<String> {
        param.map(|p| self.symbols.types().name(p).to_string())
    }

    /// Swap an allocation function for its debug heap counterpart.
    fn redirect_debug_heap(&self, id: FunctionId) -> FunctionId {
        let function = self.symbols.function(id);
        let Some(target) = self.config.debug_heap_redirect(&function.group_name) else {
            return id;
        };
        let Some(scope) = function.scope else {
            return id;
        };
        let arity = function.arity();
        let lookup = FunctionScopeLookup::new(scope, ScopeLookup::THIS_AND_PARENT);
        match self.symbols.lookup_functions(&lookup, target).into_iter().find(|&f| self.symbols.function(f).arity() == arity) {
            Some(redirected) => {
                debug!(from = %function.group_name, to = target, "debug heap redirect");
                redirected
            }
            None => id,
        }
    }
}
