//! The bound form of a checked constraint.

use crate::symbols::ConceptId;

/// A checked constraint, kept for ranking constrained candidates.
///
/// Leaves remember the concept they came from, so subsumption can follow
/// `refines` chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundConstraint {
    Atomic { satisfied: bool, concept: Option<ConceptId> },
    Disjunctive(Box<BoundConstraint>, Box<BoundConstraint>),
    Conjunctive(Box<BoundConstraint>, Box<BoundConstraint>),
}

impl BoundConstraint {
    pub fn atomic(satisfied: bool) -> Self {
        BoundConstraint::Atomic { satisfied, concept: None }
    }

    pub fn concept(concept: ConceptId) -> Self {
        BoundConstraint::Atomic { satisfied: true, concept: Some(concept) }
    }

    pub fn and(left: BoundConstraint, right: BoundConstraint) -> Self {
        BoundConstraint::Conjunctive(Box::new(left), Box::new(right))
    }

    pub fn or(left: BoundConstraint, right: BoundConstraint) -> Self {
        BoundConstraint::Disjunctive(Box::new(left), Box::new(right))
    }

    pub fn is_satisfied(&self) -> bool {
        match self {
            BoundConstraint::Atomic { satisfied, .. } => *satisfied,
            BoundConstraint::Disjunctive(l, r) => l.is_satisfied() || r.is_satisfied(),
            BoundConstraint::Conjunctive(l, r) => l.is_satisfied() && r.is_satisfied(),
        }
    }

    /// Whether `self` subsumes `that`.
    ///
    /// `implies(a, b)` tells whether concept `a` refines concept `b`.
    pub fn subsume(&self, that: &BoundConstraint, implies: &dyn Fn(ConceptId, ConceptId) -> bool) -> bool {
        if let BoundConstraint::Conjunctive(l, r) = that {
            return self.subsume(l, implies) && self.subsume(r, implies);
        }
        match self {
            BoundConstraint::Disjunctive(l, r) => l.subsume(that, implies) && r.subsume(that, implies),
            BoundConstraint::Conjunctive(l, r) => l.subsume(that, implies) || r.subsume(that, implies),
            BoundConstraint::Atomic { satisfied, concept } => match that {
                BoundConstraint::Disjunctive(l, r) => self.subsume(l, implies) || self.subsume(r, implies),
                BoundConstraint::Atomic { satisfied: other_satisfied, concept: other } => match (concept, other) {
                    (Some(a), Some(b)) => a == b || implies(*a, *b),
                    (None, None) => satisfied == other_satisfied,
                    _ => false,
                },
                BoundConstraint::Conjunctive(..) => false,
            },
        }
    }
}
