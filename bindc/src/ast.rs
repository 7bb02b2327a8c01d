//! Syntax consumed by the binder.
//!
//! The parser lives outside this crate; these are the node shapes the binder
//! reads when it evaluates constant expressions and `where` constraints.
//! Every node family is a closed enum so the visitors in [`crate::typeck`]
//! dispatch with an exhaustive `match`.

use ordered_float::OrderedFloat;

use crate::span::Span;
use crate::symbols::{BasicKind, TypeId};

// ============================================================================
// Operators
// ============================================================================

/// Binary operators of constant expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    NotEq,
    Less,
    Greater,
    LessEq,
    GreaterEq,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::Greater => ">",
            BinaryOp::LessEq => "<=",
            BinaryOp::GreaterEq => ">=",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Less
                | BinaryOp::Greater
                | BinaryOp::LessEq
                | BinaryOp::GreaterEq
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }
}

/// Unary operators of constant expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Plus,
    Minus,
    Complement,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::Complement => "~",
            UnaryOp::Not => "!",
        }
    }
}

// ============================================================================
// Constant expressions
// ============================================================================

/// A typed literal as produced by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Bool(bool),
    Char(char),
    SByte(i8),
    Byte(u8),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(OrderedFloat<f32>),
    Double(OrderedFloat<f64>),
    String(String),
    Null,
}

/// An expression that may be evaluated at compile time.
///
/// The last group of variants exists so that the always-true probe can see
/// (and reject) constructs that have no compile-time meaning.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstExpr {
    Literal(Literal),
    Identifier { name: String, span: Span },
    /// `subject.member` where subject names a namespace, class or enum.
    Dot { subject: Box<ConstExpr>, member: String, span: Span },
    Binary { op: BinaryOp, lhs: Box<ConstExpr>, rhs: Box<ConstExpr>, span: Span },
    Unary { op: UnaryOp, operand: Box<ConstExpr>, span: Span },
    Cast { target: BasicKind, operand: Box<ConstExpr>, span: Span },
    Invoke { subject: Box<ConstExpr>, arguments: Vec<ConstExpr>, span: Span },
    Index { subject: Box<ConstExpr>, index: Box<ConstExpr>, span: Span },
    AddressOf { operand: Box<ConstExpr>, span: Span },
    Deref { operand: Box<ConstExpr>, span: Span },
    Increment { operand: Box<ConstExpr>, span: Span },
    Assign { target: Box<ConstExpr>, value: Box<ConstExpr>, span: Span },
    This { span: Span },
    Base { span: Span },
}

impl ConstExpr {
    pub fn literal(literal: Literal) -> Self {
        ConstExpr::Literal(literal)
    }

    pub fn int(value: i32) -> Self {
        ConstExpr::Literal(Literal::Int(value))
    }

    pub fn bool(value: bool) -> Self {
        ConstExpr::Literal(Literal::Bool(value))
    }

    pub fn ident(name: &str) -> Self {
        ConstExpr::Identifier { name: name.to_string(), span: Span::dummy() }
    }

    pub fn dot(subject: ConstExpr, member: &str) -> Self {
        ConstExpr::Dot { subject: Box::new(subject), member: member.to_string(), span: Span::dummy() }
    }

    pub fn binary(op: BinaryOp, lhs: ConstExpr, rhs: ConstExpr) -> Self {
        ConstExpr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span: Span::dummy() }
    }

    pub fn unary(op: UnaryOp, operand: ConstExpr) -> Self {
        ConstExpr::Unary { op, operand: Box::new(operand), span: Span::dummy() }
    }

    pub fn cast(target: BasicKind, operand: ConstExpr) -> Self {
        ConstExpr::Cast { target, operand: Box::new(operand), span: Span::dummy() }
    }

    pub fn span(&self) -> Span {
        match self {
            ConstExpr::Literal(_) => Span::dummy(),
            ConstExpr::Identifier { span, .. }
            | ConstExpr::Dot { span, .. }
            | ConstExpr::Binary { span, .. }
            | ConstExpr::Unary { span, .. }
            | ConstExpr::Cast { span, .. }
            | ConstExpr::Invoke { span, .. }
            | ConstExpr::Index { span, .. }
            | ConstExpr::AddressOf { span, .. }
            | ConstExpr::Deref { span, .. }
            | ConstExpr::Increment { span, .. }
            | ConstExpr::Assign { span, .. }
            | ConstExpr::This { span }
            | ConstExpr::Base { span } => *span,
        }
    }
}

// ============================================================================
// Type expressions
// ============================================================================

/// A type as written inside a constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A simple or qualified name (`T`, `int`, `System.String`).
    Named(String),
    /// `typename Subject.Member`: a member type of a class.
    Member { subject: Box<TypeExpr>, member: String },
    /// `Subject<Args...>`.
    Template { subject: String, arguments: Vec<TypeExpr> },
    Const(Box<TypeExpr>),
    Pointer(Box<TypeExpr>),
    LvalueRef(Box<TypeExpr>),
    RvalueRef(Box<TypeExpr>),
    /// An already resolved type; used when the binder builds probes itself.
    Resolved(TypeId),
}

impl TypeExpr {
    pub fn named(name: &str) -> Self {
        TypeExpr::Named(name.to_string())
    }

    pub fn member(subject: TypeExpr, member: &str) -> Self {
        TypeExpr::Member { subject: Box::new(subject), member: member.to_string() }
    }

    pub fn const_ref(inner: TypeExpr) -> Self {
        TypeExpr::LvalueRef(Box::new(TypeExpr::Const(Box::new(inner))))
    }

    pub fn pointer(inner: TypeExpr) -> Self {
        TypeExpr::Pointer(Box::new(inner))
    }

    pub fn rvalue_ref(inner: TypeExpr) -> Self {
        TypeExpr::RvalueRef(Box::new(inner))
    }
}

// ============================================================================
// Constraint expressions
// ============================================================================

/// The body of a `where` clause or concept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintExpr {
    Disjunction(Box<ConstraintExpr>, Box<ConstraintExpr>),
    Conjunction(Box<ConstraintExpr>, Box<ConstraintExpr>),
    /// A boolean constant expression.
    Predicate(ConstExpr),
    /// `subject is Target` where Target names a type or a concept.
    Is { subject: TypeExpr, target: TypeExpr },
    /// `Concept<A, B, ...>`.
    ConceptId { name: String, arguments: Vec<TypeExpr> },
    /// `typename T.Member`.
    Typename(TypeExpr),
    /// `T(params...)`.
    Constructor { parameters: Vec<TypeExpr> },
    /// `~T()`.
    Destructor,
    /// `T.name(params...)`, optionally with a required return type.
    MemberFunction { return_type: Option<TypeExpr>, name: String, parameters: Vec<TypeExpr> },
    /// `R name(params...)` tried as member of T, as binary member, then as free function.
    Function { return_type: Option<TypeExpr>, group_name: String, parameters: Vec<TypeExpr> },
    Same,
    Derived,
    Convertible,
    ExplicitlyConvertible,
    Common,
    NonReferenceType,
}

impl ConstraintExpr {
    pub fn and(lhs: ConstraintExpr, rhs: ConstraintExpr) -> Self {
        ConstraintExpr::Conjunction(Box::new(lhs), Box::new(rhs))
    }

    pub fn or(lhs: ConstraintExpr, rhs: ConstraintExpr) -> Self {
        ConstraintExpr::Disjunction(Box::new(lhs), Box::new(rhs))
    }

    pub fn is(subject: TypeExpr, target: TypeExpr) -> Self {
        ConstraintExpr::Is { subject, target }
    }

    pub fn concept(name: &str, arguments: Vec<TypeExpr>) -> Self {
        ConstraintExpr::ConceptId { name: name.to_string(), arguments }
    }

    /// Short description used in failure messages.
    pub fn describe(&self) -> String {
        match self {
            ConstraintExpr::Disjunction(..) => "disjunction".to_string(),
            ConstraintExpr::Conjunction(..) => "conjunction".to_string(),
            ConstraintExpr::Predicate(_) => "predicate".to_string(),
            ConstraintExpr::Is { .. } => "'is' constraint".to_string(),
            ConstraintExpr::ConceptId { name, .. } => format!("concept '{}'", name),
            ConstraintExpr::Typename(_) => "typename constraint".to_string(),
            ConstraintExpr::Constructor { .. } => "constructor constraint".to_string(),
            ConstraintExpr::Destructor => "destructor constraint".to_string(),
            ConstraintExpr::MemberFunction { name, .. } => format!("member function '{}'", name),
            ConstraintExpr::Function { group_name, .. } => format!("function '{}'", group_name),
            ConstraintExpr::Same => "Same".to_string(),
            ConstraintExpr::Derived => "Derived".to_string(),
            ConstraintExpr::Convertible => "Convertible".to_string(),
            ConstraintExpr::ExplicitlyConvertible => "ExplicitlyConvertible".to_string(),
            ConstraintExpr::Common => "Common".to_string(),
            ConstraintExpr::NonReferenceType => "NonReferenceType".to_string(),
        }
    }
}

/// `refines Other<A, B>` clause of a concept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConceptRef {
    pub name: String,
    pub arguments: Vec<TypeExpr>,
}
