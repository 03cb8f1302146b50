//! Query executor
//!
//! Resolves attribute names in a parsed [`Expression`] against one snapshot,
//! then evaluates the result against each node in declaration order.

use crate::error::{GendersError, Result};
use crate::query_ast::{Expression, Predicate};
use crate::query_parser::Parser;
use crate::snapshot::{NodeEntry, Snapshot};
use crate::types::{AttrId, NodeId};

/// Expression with attribute names replaced by snapshot ids.
///
/// An attribute the snapshot has never seen resolves to `None` and matches
/// no node.
#[derive(Debug, Clone)]
enum Plan {
    Has(Option<AttrId>),
    Equals(Option<AttrId>, String),
    NotEquals(Option<AttrId>, String),
    And(Box<Plan>, Box<Plan>),
    Or(Box<Plan>, Box<Plan>),
    Difference(Box<Plan>, Box<Plan>),
    Not(Box<Plan>),
}

impl Plan {
    fn eval(&self, node: &NodeEntry) -> bool {
        match self {
            Plan::Has(attr) => attr.and_then(|id| node.get(id)).is_some(),
            Plan::Equals(attr, val) => {
                attr.and_then(|id| node.get(id)) == Some(Some(val.as_str()))
            }
            Plan::NotEquals(attr, val) => match attr.and_then(|id| node.get(id)) {
                Some(actual) => actual != Some(val.as_str()),
                None => false,
            },
            Plan::And(l, r) => l.eval(node) && r.eval(node),
            Plan::Or(l, r) => l.eval(node) || r.eval(node),
            Plan::Difference(l, r) => l.eval(node) && !r.eval(node),
            Plan::Not(e) => !e.eval(node),
        }
    }
}

pub struct QueryExecutor<'a> {
    snapshot: &'a Snapshot,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(snapshot: &'a Snapshot) -> Self {
        QueryExecutor { snapshot }
    }

    /// Parse and run a query, returning matching node names in node order
    pub fn execute(&self, query: &str) -> Result<Vec<String>> {
        let ids = self.execute_ids(query)?;
        Ok(self.snapshot.names_of(&ids))
    }

    pub fn execute_ids(&self, query: &str) -> Result<Vec<NodeId>> {
        let expr = self.parse(query)?;
        Ok(self.evaluate(&expr))
    }

    /// Evaluate an already parsed expression against every node
    pub fn evaluate(&self, expr: &Expression) -> Vec<NodeId> {
        let plan = self.plan(expr);
        self.snapshot
            .nodes()
            .filter(|(_, node)| plan.eval(node))
            .map(|(id, _)| id)
            .collect()
    }

    /// Evaluate a query against a single node
    pub fn test_node(&self, query: &str, node: &str) -> Result<bool> {
        let expr = self.parse(query)?;
        let id = self
            .snapshot
            .node_id(node)
            .ok_or_else(|| GendersError::NotFound(format!("node '{}'", node)))?;
        Ok(self.plan(&expr).eval(self.snapshot.node(id)))
    }

    fn parse(&self, query: &str) -> Result<Expression> {
        Parser::parse_with_depth(query, self.snapshot.max_query_depth())
    }

    fn plan(&self, expr: &Expression) -> Plan {
        match expr {
            Expression::Predicate(p) => {
                let attr = self.snapshot.attr_id(p.attr());
                match p {
                    Predicate::Has(_) => Plan::Has(attr),
                    Predicate::Equals(_, val) => Plan::Equals(attr, val.clone()),
                    Predicate::NotEquals(_, val) => Plan::NotEquals(attr, val.clone()),
                }
            }
            Expression::And(l, r) => Plan::And(Box::new(self.plan(l)), Box::new(self.plan(r))),
            Expression::Or(l, r) => Plan::Or(Box::new(self.plan(l)), Box::new(self.plan(r))),
            Expression::Difference(l, r) => {
                Plan::Difference(Box::new(self.plan(l)), Box::new(self.plan(r)))
            }
            Expression::Not(e) => Plan::Not(Box::new(self.plan(e))),
        }
    }
}
