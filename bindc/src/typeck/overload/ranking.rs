//! Ranking of viable candidates.
//!
//! # Algorithm
//!
//! Two candidates are compared by, in priority order:
//!
//! ```text
//! (a) positions where one argument match is strictly better (more wins)
//! (b) fewer user conversions
//! (c) non-template over template
//! (d) non-specialization over specialization
//! (e) array operation over non-array operation
//! (f) constrained over unconstrained
//! (g) subsuming constraint over subsumed constraint
//! ```
//!
//! Selection keeps the maximal set: the candidates no other candidate beats.

use rustc_hash::FxHashMap;

use crate::symbols::ConceptId;
use crate::typeck::conversion::better_argument_match;

use super::FunctionMatch;

/// Direct refinement of each concept (`refines` clauses seen so far).
pub type ConceptRefinements = FxHashMap<ConceptId, ConceptId>;

/// Whether `concept` refines `ancestor`, directly or transitively.
pub fn refines(refinements: &ConceptRefinements, concept: ConceptId, ancestor: ConceptId) -> bool {
    let mut current = refinements.get(&concept).copied();
    let mut steps = 0;
    while let Some(c) = current {
        if c == ancestor {
            return true;
        }
        steps += 1;
        if steps > refinements.len() {
            break;
        }
        current = refinements.get(&c).copied();
    }
    false
}

/// Whether `left` is a strictly better candidate than `right`.
pub fn better_function_match(
    left: &FunctionMatch,
    right: &FunctionMatch,
    refinements: &ConceptRefinements,
) -> bool {
    // (a)
    let mut left_better = 0;
    let mut right_better = 0;
    for (l, r) in left.argument_matches.iter().zip(&right.argument_matches) {
        if better_argument_match(l, r) {
            left_better += 1;
        } else if better_argument_match(r, l) {
            right_better += 1;
        }
    }
    if left_better != right_better {
        return left_better > right_better;
    }
    // (b)
    if left.user_conversions != right.user_conversions {
        return left.user_conversions < right.user_conversions;
    }
    // (c)
    if left.is_template != right.is_template {
        return !left.is_template;
    }
    // (d)
    if left.is_template && left.is_specialization != right.is_specialization {
        return !left.is_specialization;
    }
    // (e)
    if left.is_array_operation != right.is_array_operation {
        return left.is_array_operation;
    }
    // (f) and (g)
    match (&left.constraint, &right.constraint) {
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (Some(l), Some(r)) => {
            let implies = |a: ConceptId, b: ConceptId| refines(refinements, a, b);
            l.subsume(r, &implies) && !r.subsume(l, &implies)
        }
        (None, None) => false,
    }
}

/// Indices of the candidates no other candidate beats.
pub fn find_maximal(matches: &[FunctionMatch], refinements: &ConceptRefinements) -> Vec<usize> {
    (0..matches.len())
        .filter(|&i| {
            !(0..matches.len()).any(|j| j != i && better_function_match(&matches[j], &matches[i], refinements))
        })
        .collect()
}
