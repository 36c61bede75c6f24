//! Access control results
//!
//! Produced per request by an entity's read rule. A scoped result restricts
//! the visible documents with a predicate authored against the live entity
//! shape.

use crate::query::Predicate;

#[derive(Debug, Clone, PartialEq)]
pub enum AccessResult {
    /// Every document is visible
    Unrestricted,
    /// Nothing is visible
    Denied,
    /// Only documents matching the predicate are visible
    Scoped(Predicate),
}

impl AccessResult {
    /// The restricting predicate, if the result is scoped
    pub fn predicate(&self) -> Option<&Predicate> {
        match self {
            AccessResult::Scoped(predicate) => Some(predicate),
            _ => None,
        }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessResult::Denied)
    }
}
