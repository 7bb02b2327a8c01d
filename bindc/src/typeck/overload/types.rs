//! Requests, candidates and results of overload resolution.

use bitflags::bitflags;

use crate::bound::{BoundCall, BoundExpr};
use crate::span::Span;
use crate::symbols::{FunctionId, FunctionScopeLookup, ScopeId, ScopeLookup, SymbolTable, TypeId};
use crate::typeck::concepts::BoundConstraint;
use crate::typeck::conversion::{Argument, ArgumentMatch, ConversionContext};

bitflags! {
    /// Resolution modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResolveFlags: u8 {
        /// Only answer which function would be called; create no instances.
        const DONT_INSTANTIATE = 1 << 0;
    }
}

/// One call to resolve.
#[derive(Debug, Clone)]
pub struct OverloadRequest {
    pub group_name: String,
    pub arguments: Vec<Argument>,
    /// Scopes contributing candidates, beyond the built-in repositories.
    pub lookups: Vec<FunctionScopeLookup>,
    pub context: ConversionContext,
    /// Template arguments given explicitly at the call site.
    pub template_args: Vec<TypeId>,
    pub flags: ResolveFlags,
    pub span: Span,
}

impl OverloadRequest {
    pub fn new(group_name: &str, arguments: &[Argument]) -> Self {
        Self {
            group_name: group_name.to_string(),
            arguments: arguments.to_vec(),
            lookups: Vec::new(),
            context: ConversionContext::Implicit,
            template_args: Vec::new(),
            flags: ResolveFlags::empty(),
            span: Span::dummy(),
        }
    }

    pub fn with_lookup(mut self, scope: ScopeId, lookup: ScopeLookup) -> Self {
        self.lookups.push(FunctionScopeLookup::new(scope, lookup));
        self
    }

    /// Include the using-directive scopes.
    pub fn with_file_scopes(mut self) -> Self {
        self.lookups.push(FunctionScopeLookup::file_scopes());
        self
    }

    pub fn explicit(mut self) -> Self {
        self.context = ConversionContext::Explicit;
        self
    }

    pub fn with_context(mut self, context: ConversionContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_template_args(mut self, template_args: Vec<TypeId>) -> Self {
        self.template_args = template_args;
        self
    }

    pub fn with_flags(mut self, flags: ResolveFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

/// One viable candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionMatch {
    pub function: FunctionId,
    pub argument_matches: Vec<ArgumentMatch>,
    /// Conversion to insert per argument.
    pub conversions: Vec<Option<FunctionId>>,
    /// Number of user-declared conversions used.
    pub user_conversions: u32,
    /// Deduced or explicit template arguments.
    pub template_args: Vec<TypeId>,
    pub is_template: bool,
    pub is_specialization: bool,
    pub is_array_operation: bool,
    /// Bound `where` clause of a constrained template.
    pub constraint: Option<BoundConstraint>,
    /// `CommonType` bound while checking the constraint.
    pub common_type: Option<TypeId>,
    /// The generic class instance a member candidate was matched against.
    pub class_instance: Option<TypeId>,
}

impl FunctionMatch {
    pub fn new(function: FunctionId) -> Self {
        Self {
            function,
            argument_matches: Vec::new(),
            conversions: Vec::new(),
            user_conversions: 0,
            template_args: Vec::new(),
            is_template: false,
            is_specialization: false,
            is_array_operation: false,
            constraint: None,
            common_type: None,
            class_instance: None,
        }
    }

    /// Record the per-argument matches and the conversions they insert.
    pub fn with_matches(mut self, matches: Vec<ArgumentMatch>) -> Self {
        self.conversions = matches.iter().map(|m| m.conversion).collect();
        self.user_conversions = matches.iter().filter(|m| m.user_defined).count() as u32;
        self.argument_matches = matches;
        self
    }
}

/// The outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    /// The selected function; an instance when a template was selected.
    pub function: FunctionId,
    /// Conversion function to insert around each argument.
    pub conversions: Vec<Option<FunctionId>>,
    pub template_args: Vec<TypeId>,
    pub user_conversions: u32,
}

impl ResolvedCall {
    /// Assemble the bound call, wrapping arguments in their conversions.
    pub fn into_bound_call(self, arguments: Vec<BoundExpr>, symbols: &SymbolTable) -> BoundCall {
        let arguments = arguments
            .into_iter()
            .zip(self.conversions.iter().copied().chain(std::iter::repeat(None)))
            .map(|(argument, conversion)| {
                let Some(conversion) = conversion else { return argument };
                let function = symbols.function(conversion);
                match function.conversion.map(|info| info.target).or(function.return_type) {
                    Some(ty) => BoundExpr::conversion(conversion, argument, ty),
                    None => argument,
                }
            })
            .collect();
        BoundCall { function: self.function, arguments, ty: symbols.function(self.function).return_type }
    }
}
