//! Operator Table
//!
//! Every comparison token a `where` argument may use belongs to exactly one
//! [`OperatorCategory`]. Field-type builders in the where-schema compiler only
//! ever combine whole categories, so a new field type cannot introduce a token
//! the store does not understand.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A comparison operator token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    All,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    Contains,
    Near,
    Within,
    Intersects,
    Like,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::All => "all",
            Operator::GreaterThan => "greater_than",
            Operator::GreaterThanEqual => "greater_than_equal",
            Operator::LessThan => "less_than",
            Operator::LessThanEqual => "less_than_equal",
            Operator::Contains => "contains",
            Operator::Near => "near",
            Operator::Within => "within",
            Operator::Intersects => "intersects",
            Operator::Like => "like",
        }
    }

    /// Operators whose value is a list of the field's base type
    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn | Operator::All)
    }

    /// Positional sub-arguments carried inside the operator's value
    ///
    /// `near` takes `[longitude, latitude, maxDistance, minDistance]`, the
    /// polygon operators take a GeoJSON geometry.
    pub fn sub_arguments(&self) -> &'static [&'static str] {
        match self {
            Operator::Near => &["longitude", "latitude", "maxDistance", "minDistance"],
            Operator::Within | Operator::Intersects => &["type", "coordinates"],
            _ => &[],
        }
    }

    pub fn category(&self) -> OperatorCategory {
        match self {
            Operator::Equals | Operator::NotEquals | Operator::In | Operator::NotIn | Operator::All => {
                OperatorCategory::Equality
            }
            Operator::GreaterThan
            | Operator::GreaterThanEqual
            | Operator::LessThan
            | Operator::LessThanEqual => OperatorCategory::Comparison,
            Operator::Contains => OperatorCategory::Contains,
            Operator::Near | Operator::Within | Operator::Intersects => OperatorCategory::Geo,
            Operator::Like => OperatorCategory::Pattern,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a token that is not an operator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown operator: {0}")]
pub struct UnknownOperator(pub String);

impl FromStr for Operator {
    type Err = UnknownOperator;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        OperatorCategory::ALL
            .iter()
            .flat_map(|category| category.operators())
            .find(|op| op.as_str() == token)
            .copied()
            .ok_or_else(|| UnknownOperator(token.to_string()))
    }
}

/// Named group of operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorCategory {
    Equality,
    Comparison,
    Contains,
    Geo,
    Pattern,
}

const EQUALITY: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::In,
    Operator::NotIn,
    Operator::All,
];

const COMPARISON: &[Operator] = &[
    Operator::GreaterThan,
    Operator::GreaterThanEqual,
    Operator::LessThan,
    Operator::LessThanEqual,
];

const CONTAINS: &[Operator] = &[Operator::Contains];

const GEO: &[Operator] = &[Operator::Near, Operator::Within, Operator::Intersects];

const PATTERN: &[Operator] = &[Operator::Like];

impl OperatorCategory {
    pub const ALL: [OperatorCategory; 5] = [
        OperatorCategory::Equality,
        OperatorCategory::Comparison,
        OperatorCategory::Contains,
        OperatorCategory::Geo,
        OperatorCategory::Pattern,
    ];

    /// Ordered tokens of this category
    pub fn operators(&self) -> &'static [Operator] {
        match self {
            OperatorCategory::Equality => EQUALITY,
            OperatorCategory::Comparison => COMPARISON,
            OperatorCategory::Contains => CONTAINS,
            OperatorCategory::Geo => GEO,
            OperatorCategory::Pattern => PATTERN,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperatorCategory::Equality => "equality",
            OperatorCategory::Comparison => "comparison",
            OperatorCategory::Contains => "contains",
            OperatorCategory::Geo => "geo",
            OperatorCategory::Pattern => "pattern",
        }
    }
}

/// Concatenate categories into one ordered operator list
pub fn union(categories: &[OperatorCategory]) -> Vec<Operator> {
    categories
        .iter()
        .flat_map(|category| category.operators().iter().copied())
        .collect()
}
