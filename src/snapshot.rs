//! Immutable database snapshot
//!
//! A snapshot owns the parsed nodes plus the reverse indices used by
//! membership queries:
//! - node name -> [`NodeId`]
//! - attribute -> nodes carrying it, in node order
//! - attribute + value -> nodes carrying that exact value, in node order
//!
//! It is never mutated after [`Snapshot::build`]; a reload builds a new one.

use crate::error::{GendersError, Result};
use crate::intern::Interner;
use crate::parser::{DatabaseParser, ParsedDatabase};
use crate::query_executor::QueryExecutor;
use crate::types::{AttrId, GendersConfig, NodeId, Stats};
use std::collections::HashMap;

/// A node and its bindings
#[derive(Debug, Clone)]
pub struct NodeEntry {
    pub name: String,
    pub attrs: Vec<(AttrId, Option<String>)>,
}

impl NodeEntry {
    /// `None` if the node lacks the attribute, `Some(value)` otherwise
    pub fn get(&self, attr: AttrId) -> Option<Option<&str>> {
        self.attrs
            .iter()
            .find(|(id, _)| *id == attr)
            .map(|(_, value)| value.as_deref())
    }
}

#[derive(Debug)]
pub struct Snapshot {
    nodes: Vec<NodeEntry>,
    node_index: HashMap<String, NodeId>,
    attrs: Interner,
    attr_nodes: Vec<Vec<NodeId>>,
    attr_values: Vec<HashMap<String, Vec<NodeId>>>,
    case_sensitive: bool,
    max_query_depth: usize,
    stats: Stats,
}

impl Snapshot {
    /// Parse source text and index it in one step
    pub fn parse(text: &str, config: &GendersConfig) -> Result<Snapshot> {
        let parsed = DatabaseParser::parse(text, config)?;
        Ok(Snapshot::build(parsed, config))
    }

    pub fn build(parsed: ParsedDatabase, config: &GendersConfig) -> Snapshot {
        let ParsedDatabase { nodes, attrs } = parsed;

        let mut node_index = HashMap::with_capacity(nodes.len());
        let mut attr_nodes = vec![Vec::new(); attrs.len()];
        let mut attr_values: Vec<HashMap<String, Vec<NodeId>>> = vec![HashMap::new(); attrs.len()];
        let mut stats = Stats {
            num_nodes: nodes.len(),
            num_attrs: attrs.len(),
            ..Stats::default()
        };

        let entries: Vec<NodeEntry> = nodes
            .into_iter()
            .zip((0u32..).map(NodeId))
            .map(|(node, id)| {
                stats.max_node_len = stats.max_node_len.max(node.name.chars().count());
                stats.max_attrs_per_node = stats.max_attrs_per_node.max(node.attrs.len());

                for (attr, value) in &node.attrs {
                    attr_nodes[attr.index()].push(id);
                    if let Some(value) = value {
                        stats.max_val_len = stats.max_val_len.max(value.chars().count());
                        attr_values[attr.index()]
                            .entry(value.clone())
                            .or_default()
                            .push(id);
                    }
                }

                node_index.insert(node.name.clone(), id);
                NodeEntry {
                    name: node.name,
                    attrs: node.attrs,
                }
            })
            .collect();

        stats.max_attr_len = attrs
            .iter()
            .map(|(_, name)| name.chars().count())
            .max()
            .unwrap_or(0);

        Snapshot {
            nodes: entries,
            node_index,
            attrs,
            attr_nodes,
            attr_values,
            case_sensitive: config.case_sensitive,
            max_query_depth: config.max_query_depth,
            stats,
        }
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        if self.case_sensitive {
            self.node_index.get(name).copied()
        } else {
            self.node_index.get(&name.to_lowercase()).copied()
        }
    }

    pub fn node(&self, id: NodeId) -> &NodeEntry {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeEntry)> {
        self.nodes.iter().zip((0u32..).map(NodeId)).map(|(entry, id)| (id, entry))
    }

    /// Nesting limit applied to queries run against this snapshot
    pub fn max_query_depth(&self) -> usize {
        self.max_query_depth
    }

    pub fn attr_id(&self, name: &str) -> Option<AttrId> {
        self.attrs.get(name)
    }

    pub fn attr_name(&self, id: AttrId) -> &str {
        self.attrs.resolve(id)
    }

    pub fn is_node(&self, name: &str) -> bool {
        self.node_id(name).is_some()
    }

    pub fn is_attr(&self, attr: &str) -> bool {
        self.attrs.get(attr).is_some()
    }

    /// True if some node carries exactly `attr=val`. A bare attribute never
    /// matches, not even against the empty string.
    pub fn is_attr_val(&self, attr: &str, val: &str) -> bool {
        self.attrs
            .get(attr)
            .map(|id| self.attr_values[id.index()].contains_key(val))
            .unwrap_or(false)
    }

    /// Nodes carrying `attr` (any value, or exactly `val`), in node order.
    ///
    /// With no attribute every node is returned. A value without an
    /// attribute is rejected.
    pub fn nodes_with(&self, attr: Option<&str>, val: Option<&str>) -> Result<Vec<String>> {
        let ids: &[NodeId] = match (attr, val) {
            (None, None) => return Ok(self.nodes.iter().map(|n| n.name.clone()).collect()),
            (None, Some(_)) => {
                return Err(GendersError::InvalidParameter(
                    "value given without an attribute".to_string(),
                ))
            }
            (Some(attr), val) => match self.attrs.get(attr) {
                None => &[],
                Some(id) => match val {
                    None => self.attr_nodes[id.index()].as_slice(),
                    Some(val) => self.attr_values[id.index()]
                        .get(val)
                        .map(|v| v.as_slice())
                        .unwrap_or(&[]),
                },
            },
        };

        Ok(self.names_of(ids))
    }

    pub fn names_of(&self, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| self.nodes[id.index()].name.clone()).collect()
    }

    /// Every attribute of `node` in declaration order
    pub fn getattr(&self, node: &str) -> Result<Vec<(String, Option<String>)>> {
        let entry = self.lookup(node)?;
        Ok(entry
            .attrs
            .iter()
            .map(|(id, value)| (self.attrs.resolve(*id).to_string(), value.clone()))
            .collect())
    }

    /// Every distinct attribute in first-seen order
    pub fn getattr_all(&self) -> Vec<String> {
        self.attrs.iter().map(|(_, name)| name.to_string()).collect()
    }

    pub fn testattr(&self, node: &str, attr: &str) -> Result<Option<Option<String>>> {
        let entry = self.lookup(node)?;
        Ok(self
            .attrs
            .get(attr)
            .and_then(|id| entry.get(id))
            .map(|value| value.map(str::to_string)))
    }

    /// With `val` of `None` this only tests for the attribute
    pub fn testattrval(&self, node: &str, attr: &str, val: Option<&str>) -> Result<bool> {
        let entry = self.lookup(node)?;
        let found = self.attrs.get(attr).and_then(|id| entry.get(id));
        Ok(match (found, val) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(wanted)) => actual == Some(wanted),
        })
    }

    pub fn query(&self, query: &str) -> Result<Vec<String>> {
        QueryExecutor::new(self).execute(query)
    }

    pub fn test_query(&self, query: &str, node: &str) -> Result<bool> {
        QueryExecutor::new(self).test_node(query, node)
    }

    fn lookup(&self, node: &str) -> Result<&NodeEntry> {
        self.node_id(node)
            .map(|id| &self.nodes[id.index()])
            .ok_or_else(|| GendersError::NotFound(format!("node '{}'", node)))
    }
}

/// Parse source text without keeping the result
pub fn check(text: &str, config: &GendersConfig) -> Result<Stats> {
    Snapshot::parse(text, config).map(|snapshot| snapshot.stats())
}
