//! Query Predicates
//!
//! A `where` argument is a tree of `and` / `or` combinators over leaf
//! constraints:
//!
//! ```json
//! {
//!   "or": [
//!     { "status": { "equals": "published" } },
//!     { "and": [{ "author": { "equals": "7" } }, { "location": { "near": [1.5, 2.5, 1000] } }] }
//!   ]
//! }
//! ```
//!
//! [`Predicate`] is the typed form of that tree. [`Predicate::flatten`] lists
//! every leaf in order, which is how callers detect query features such as
//! geo-proximity without walking the tree themselves.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::operators::Operator;

/// Errors raised while reading a predicate from JSON
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredicateError {
    #[error("Where clause must be an object, got: {0}")]
    NotAnObject(String),

    #[error("'{0}' must be an array of where clauses")]
    CombinatorNotArray(String),

    #[error("Constraint on '{path}' must map operators to values")]
    OperatorsNotObject { path: String },

    #[error("Unknown operator '{operator}' on '{path}'")]
    UnknownOperator { path: String, operator: String },
}

/// A single `path operator value` constraint
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub path: String,
    pub operator: Operator,
    pub value: Value,
}

/// Boolean predicate tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Predicate {
    Leaf(Constraint),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Build a leaf constraint
    pub fn leaf(path: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Predicate::Leaf(Constraint {
            path: path.into(),
            operator,
            value: value.into(),
        })
    }

    /// Parse the JSON `where` shape
    pub fn from_value(value: &Value) -> Result<Self, PredicateError> {
        let object = value
            .as_object()
            .ok_or_else(|| PredicateError::NotAnObject(value.to_string()))?;

        let mut branches = Vec::new();
        for (key, inner) in object {
            match key.as_str() {
                "and" | "or" => {
                    let items = inner
                        .as_array()
                        .ok_or_else(|| PredicateError::CombinatorNotArray(key.clone()))?;
                    let children = items
                        .iter()
                        .map(Predicate::from_value)
                        .collect::<Result<Vec<_>, _>>()?;
                    branches.push(if key == "and" {
                        Predicate::And(children)
                    } else {
                        Predicate::Or(children)
                    });
                }
                path => {
                    let operators = inner.as_object().ok_or_else(|| {
                        PredicateError::OperatorsNotObject {
                            path: path.to_string(),
                        }
                    })?;
                    for (token, operand) in operators {
                        let operator = token.parse::<Operator>().map_err(|_| {
                            PredicateError::UnknownOperator {
                                path: path.to_string(),
                                operator: token.clone(),
                            }
                        })?;
                        branches.push(Predicate::leaf(path, operator, operand.clone()));
                    }
                }
            }
        }

        if branches.len() == 1 {
            Ok(branches.remove(0))
        } else {
            Ok(Predicate::And(branches))
        }
    }

    /// Render back into the JSON `where` shape
    pub fn to_value(&self) -> Value {
        match self {
            Predicate::Leaf(constraint) => {
                let mut operators = Map::new();
                operators.insert(constraint.operator.as_str().to_string(), constraint.value.clone());
                let mut object = Map::new();
                object.insert(constraint.path.clone(), Value::Object(operators));
                Value::Object(object)
            }
            Predicate::And(children) => combinator("and", children),
            Predicate::Or(children) => combinator("or", children),
        }
    }

    /// Conjoin two predicates, extending an existing `And` instead of nesting
    pub fn and(self, other: Predicate) -> Predicate {
        match self {
            Predicate::And(mut children) => {
                children.push(other);
                Predicate::And(children)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    /// Conjoin any number of predicates; `None` when there are none
    pub fn all(mut clauses: Vec<Predicate>) -> Option<Predicate> {
        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Predicate::And(clauses)),
        }
    }

    /// Every leaf constraint, depth-first, in declaration order
    ///
    /// Duplicates are kept; nothing in the tree is modified.
    pub fn flatten(&self) -> Vec<&Constraint> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Constraint>) {
        match self {
            Predicate::Leaf(constraint) => leaves.push(constraint),
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_leaves(leaves);
                }
            }
        }
    }

    /// Whether any leaf uses geo-proximity (`near`)
    pub fn uses_near(&self) -> bool {
        self.flatten()
            .iter()
            .any(|constraint| constraint.operator == Operator::Near)
    }

    /// Copy of the tree with every leaf path rewritten
    pub fn map_paths<F>(&self, rewrite: &F) -> Predicate
    where
        F: Fn(&str) -> String,
    {
        match self {
            Predicate::Leaf(constraint) => Predicate::Leaf(Constraint {
                path: rewrite(&constraint.path),
                operator: constraint.operator,
                value: constraint.value.clone(),
            }),
            Predicate::And(children) => {
                Predicate::And(children.iter().map(|c| c.map_paths(rewrite)).collect())
            }
            Predicate::Or(children) => {
                Predicate::Or(children.iter().map(|c| c.map_paths(rewrite)).collect())
            }
        }
    }
}

fn combinator(key: &str, children: &[Predicate]) -> Value {
    let mut object = Map::new();
    object.insert(
        key.to_string(),
        Value::Array(children.iter().map(Predicate::to_value).collect()),
    );
    Value::Object(object)
}

impl TryFrom<Value> for Predicate {
    type Error = PredicateError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Predicate::from_value(&value)
    }
}

impl From<Predicate> for Value {
    fn from(predicate: Predicate) -> Self {
        predicate.to_value()
    }
}
