//! Query Abstract Syntax Tree
//!
//! Represents a parsed query before attribute names are resolved against a
//! snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Boolean expression over attribute predicates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expression {
    Predicate(Predicate),

    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    /// Left minus right: `a -- b` is `a && !b`
    Difference(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
}

/// Atomic test against one node's attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// Node carries the attribute, with or without a value
    Has(String),
    /// Node carries the attribute with exactly this value
    Equals(String, String),
    /// Node carries the attribute with no value or a different one
    NotEquals(String, String),
}

impl Predicate {
    pub fn attr(&self) -> &str {
        match self {
            Predicate::Has(attr) | Predicate::Equals(attr, _) | Predicate::NotEquals(attr, _) => attr,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Predicate(p) => write!(f, "{}", p),
            Expression::And(l, r) => write!(f, "({} && {})", l, r),
            Expression::Or(l, r) => write!(f, "({} || {})", l, r),
            Expression::Difference(l, r) => write!(f, "({} -- {})", l, r),
            Expression::Not(e) => write!(f, "!{}", e),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Has(attr) => f.write_str(attr),
            Predicate::Equals(attr, val) => write!(f, "{}={:?}", attr, val),
            Predicate::NotEquals(attr, val) => write!(f, "{}!={:?}", attr, val),
        }
    }
}
