//! Template argument deduction.
//!
//! # Algorithm
//!
//! ```text
//! pass 1: unify each parameter type with its argument type
//!   parameter is a type parameter P with derivations
//!     peel the parameter's pointers off the argument
//!     keep const only for a const pointee the parameter does not mention
//!     drop references; keep arrays only for a bare P
//!     bind P, or fail if P is already bound to something else
//!   parameter and argument are instances of the same generic class
//!     unify their arguments pairwise
//!   otherwise nothing is learned
//! pass 2: substitute the bindings and match every argument normally
//! ```

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::symbols::{Derivations, RefKind, TypeId};

use super::conversion::{Argument, ArgumentMatch, ConversionContext};
use super::Binder;

/// Result of a successful deduction.
#[derive(Debug, Clone, PartialEq)]
pub struct Deduction {
    /// One argument per template parameter, in declaration order.
    pub template_args: Vec<TypeId>,
    /// Argument matches against the substituted parameter types.
    pub matches: Vec<ArgumentMatch>,
}

impl Binder {
    /// Deduce `type_params` from a call with `args` to a function taking `params`.
    pub fn deduce(
        &mut self,
        type_params: &[TypeId],
        params: &[TypeId],
        args: &[Argument],
        context: ConversionContext,
    ) -> Option<Deduction> {
        let mut bindings = FxHashMap::default();
        for (&param, arg) in params.iter().zip(args) {
            if !self.unify(param, arg.ty, type_params, &mut bindings) {
                trace!(
                    param = self.symbols.types().name(param),
                    arg = self.symbols.types().name(arg.ty),
                    "conflicting deduction"
                );
                return None;
            }
        }
        let template_args = type_params
            .iter()
            .map(|p| bindings.get(p).copied())
            .collect::<Option<Vec<_>>>()?;
        self.match_substituted(type_params, &template_args, params, args, context)
    }

    /// Substitute known template arguments and match each argument.
    pub fn match_substituted(
        &mut self,
        type_params: &[TypeId],
        template_args: &[TypeId],
        params: &[TypeId],
        args: &[Argument],
        context: ConversionContext,
    ) -> Option<Deduction> {
        let mapping: FxHashMap<TypeId, TypeId> =
            type_params.iter().copied().zip(template_args.iter().copied()).collect();
        let mut matches = Vec::with_capacity(params.len());
        for (&param, arg) in params.iter().zip(args) {
            let concrete = self.symbols.types_mut().substitute(param, &mapping);
            matches.push(self.match_argument(concrete, arg, context)?);
        }
        Some(Deduction { template_args: template_args.to_vec(), matches })
    }

    fn unify(
        &mut self,
        param: TypeId,
        arg: TypeId,
        type_params: &[TypeId],
        bindings: &mut FxHashMap<TypeId, TypeId>,
    ) -> bool {
        let (param_plain, param_d) = self.symbols.types().split(param);
        let (arg_plain, arg_d) = self.symbols.types().split(arg);

        if type_params.contains(&param_plain) {
            if arg_d.pointers < param_d.pointers {
                return true;
            }
            let bare = param_d.pointers == 0 && param_d.arrays.is_empty();
            let derivations = Derivations {
                is_const: arg_d.is_const && !param_d.is_const && arg_d.pointers > 0,
                pointers: arg_d.pointers - param_d.pointers,
                arrays: if bare { arg_d.arrays } else { Vec::new() },
                reference: RefKind::None,
            };
            let bound = self.symbols.types_mut().make_derived(arg_plain, derivations);
            return match bindings.get(&param_plain) {
                Some(&existing) => existing == bound,
                None => {
                    bindings.insert(param_plain, bound);
                    true
                }
            };
        }

        let types = self.symbols.types();
        match (types.instance_of(param_plain), types.instance_of(arg_plain)) {
            (Some((param_subject, param_args)), Some((arg_subject, arg_args)))
                if param_subject == arg_subject && param_args.len() == arg_args.len() =>
            {
                param_args
                    .iter()
                    .zip(&arg_args)
                    .all(|(&p, &a)| self.unify(p, a, type_params, bindings))
            }
            _ => true,
        }
    }
}
