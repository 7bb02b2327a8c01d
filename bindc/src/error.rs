//! Binder failures.
//!
//! A binder failure terminates binding of the enclosing declaration. Every
//! variant carries enough context to render a diagnostic (see
//! [`crate::diagnostics`]); ambiguity carries every tied candidate.

use thiserror::Error;

use crate::span::Span;
use crate::value::ValueKind;

/// A candidate listed in an ambiguity or no-match diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateNote {
    /// Human-readable signature, e.g. `foo(int, double)`.
    pub signature: String,
    /// Declaration location of the candidate.
    pub span: Span,
}

/// Why a special member function could not be synthesized.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisFailure {
    /// The class is declared static.
    StaticClass,
    /// The member was explicitly suppressed (`= delete`).
    Suppressed,
    /// A user-defined constructor blocks the default constructor.
    UserDefinedConstructor,
    /// A user-defined copy/move operation or destructor blocks the implicit ones.
    UserDefinedCopyMoveOrDestructor,
    /// A base or member sub-operation failed.
    SubOperation(Box<BindError>),
}

impl std::fmt::Display for SynthesisFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthesisFailure::StaticClass => write!(f, "class is static"),
            SynthesisFailure::Suppressed => write!(f, "function is suppressed"),
            SynthesisFailure::UserDefinedConstructor => {
                write!(f, "class has a user-defined constructor")
            }
            SynthesisFailure::UserDefinedCopyMoveOrDestructor => {
                write!(f, "class has a user-defined copy/move operation or destructor")
            }
            SynthesisFailure::SubOperation(inner) => write!(f, "{}", inner),
        }
    }
}

/// Errors produced while binding.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum BindError {
    #[error("overload resolution failed: '{name}' not found. {viable} viable functions examined.{}", detail_suffix(.detail))]
    NoViableFunction {
        name: String,
        viable: usize,
        /// Innermost concept failure or cast hint.
        detail: Option<String>,
        span: Span,
    },

    #[error("overload resolution failed: call to '{name}' is ambiguous with {} candidates", .candidates.len())]
    AmbiguousCall {
        name: String,
        candidates: Vec<CandidateNote>,
        span: Span,
    },

    #[error("cannot call suppressed function '{signature}'")]
    SuppressedFunction { signature: String, span: Span },

    #[error("{message}")]
    ConceptCheckFailure { message: String, span: Span },

    #[error("cannot convert {from} to {to} without a cast")]
    ConversionFailure { from: ValueKind, to: ValueKind, span: Span },

    #[error("operation '{op}' not supported for {operands}")]
    NotSupportedOperation { op: String, operands: String, span: Span },

    #[error("cannot generate {member} for class '{class}': {reason}")]
    SpecialMemberGeneration {
        member: String,
        class: String,
        reason: SynthesisFailure,
        span: Span,
    },

    #[error("unresolved name '{name}'")]
    UnresolvedName { name: String, span: Span },

    #[error("cyclic definition of constant '{name}'")]
    CyclicConstant { name: String, span: Span },

    #[error("division by zero")]
    DivisionByZero { span: Span },

    #[error("invalid character value {value}")]
    InvalidCharacter { value: u32, span: Span },

    #[error("'{name}' expects {expected} type arguments, {found} given")]
    WrongTypeArgumentCount { name: String, expected: usize, found: usize, span: Span },
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!(" {}", detail),
        None => String::new(),
    }
}

impl BindError {
    /// The primary source span of the failure.
    pub fn span(&self) -> Span {
        match self {
            BindError::NoViableFunction { span, .. }
            | BindError::AmbiguousCall { span, .. }
            | BindError::SuppressedFunction { span, .. }
            | BindError::ConceptCheckFailure { span, .. }
            | BindError::ConversionFailure { span, .. }
            | BindError::NotSupportedOperation { span, .. }
            | BindError::SpecialMemberGeneration { span, .. }
            | BindError::UnresolvedName { span, .. }
            | BindError::CyclicConstant { span, .. }
            | BindError::DivisionByZero { span }
            | BindError::InvalidCharacter { span, .. }
            | BindError::WrongTypeArgumentCount { span, .. } => *span,
        }
    }

    /// Attach a span to an error raised deep inside evaluation.
    pub fn with_span(mut self, at: Span) -> Self {
        if !self.span().is_dummy() {
            return self;
        }
        match &mut self {
            BindError::NoViableFunction { span, .. }
            | BindError::AmbiguousCall { span, .. }
            | BindError::SuppressedFunction { span, .. }
            | BindError::ConceptCheckFailure { span, .. }
            | BindError::ConversionFailure { span, .. }
            | BindError::NotSupportedOperation { span, .. }
            | BindError::SpecialMemberGeneration { span, .. }
            | BindError::UnresolvedName { span, .. }
            | BindError::CyclicConstant { span, .. }
            | BindError::DivisionByZero { span }
            | BindError::InvalidCharacter { span, .. }
            | BindError::WrongTypeArgumentCount { span, .. } => *span = at,
        }
        self
    }

    pub fn concept(message: impl Into<String>) -> Self {
        BindError::ConceptCheckFailure { message: message.into(), span: Span::dummy() }
    }

    pub fn not_supported(op: &str, operands: impl Into<String>) -> Self {
        BindError::NotSupportedOperation {
            op: op.to_string(),
            operands: operands.into(),
            span: Span::dummy(),
        }
    }

    /// Prefix the message of a concept failure with the enclosing context.
    ///
    /// Other failures are turned into concept failures carrying their
    /// rendered message so the chain stays readable.
    pub fn prefixed(self, prefix: &str) -> Self {
        match self {
            BindError::ConceptCheckFailure { message, span } => BindError::ConceptCheckFailure {
                message: format!("{}: {}", prefix, message),
                span,
            },
            other => {
                let span = other.span();
                BindError::ConceptCheckFailure { message: format!("{}: {}", prefix, other), span }
            }
        }
    }
}

/// Errors produced while loading a [`crate::BinderConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid binder configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("debug heap redirect for '{0}' has an empty target")]
    EmptyRedirect(String),
}
