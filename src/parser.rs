//! Genders database parser
//!
//! Converts database source text into a [`ParsedDatabase`]: nodes in
//! first-declaration order, each with its attribute bindings.
//!
//! Source format:
//! ```text
//! # comment
//! @compute  cpu=x86,mem=64g           # attribute group
//! mgmt1     mgmt,@compute             # node line
//! n[01-16]  @compute,rack=%n          # range expansion, %n is the node name
//! ```
//!
//! Parsing is all-or-nothing: the first problem aborts with an error that
//! names the line and column.

use crate::error::{GendersError, Result};
use crate::hostrange::{self, RangeError};
use crate::intern::Interner;
use crate::types::{AttrId, DuplicatePolicy, GendersConfig, NodeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A node and its bindings, in the order they were declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNode {
    pub name: String,
    pub attrs: Vec<(AttrId, Option<String>)>,
}

/// Output of one parse pass, consumed by [`crate::Snapshot::build`]
#[derive(Debug, Clone, Default)]
pub struct ParsedDatabase {
    pub nodes: Vec<ParsedNode>,
    pub attrs: Interner,
}

/// One entry of an attribute list before group references are resolved
#[derive(Debug, Clone)]
enum AttrToken {
    Attr {
        name: String,
        value: Option<String>,
        column: usize,
    },
    GroupRef {
        name: String,
        column: usize,
    },
}

/// Attribute with its group references substituted away
#[derive(Debug, Clone)]
struct ResolvedAttr {
    name: String,
    value: Option<String>,
    line: usize,
    column: usize,
}

#[derive(Debug)]
struct GroupDef {
    line: usize,
    attrs: Vec<AttrToken>,
}

#[derive(Debug)]
struct NodeLine {
    line: usize,
    column: usize,
    field: String,
    attrs: Vec<AttrToken>,
}

pub struct DatabaseParser<'a> {
    config: &'a GendersConfig,
    groups: HashMap<String, GroupDef>,
    group_order: Vec<String>,
    resolved: HashMap<String, Arc<[ResolvedAttr]>>,
    node_lines: Vec<NodeLine>,
}

impl<'a> DatabaseParser<'a> {
    pub fn new(config: &'a GendersConfig) -> Self {
        DatabaseParser {
            config,
            groups: HashMap::new(),
            group_order: Vec::new(),
            resolved: HashMap::new(),
            node_lines: Vec::new(),
        }
    }

    /// Parse database source text
    pub fn parse(text: &str, config: &GendersConfig) -> Result<ParsedDatabase> {
        let mut parser = DatabaseParser::new(config);
        for (index, line) in text.lines().enumerate() {
            parser.scan_line(index + 1, line)?;
        }
        parser.resolve_groups()?;
        parser.build()
    }

    /// First pass: classify one line and tokenize its attribute list
    fn scan_line(&mut self, line_no: usize, raw: &str) -> Result<()> {
        let content = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };

        let fields = split_fields(content);
        let (head_offset, head) = match fields.first() {
            Some(first) => *first,
            None => return Ok(()),
        };
        if let Some((offset, _)) = fields.get(2) {
            return Err(GendersError::syntax(
                line_no,
                column_of(content, *offset),
                "unexpected field after attribute list",
            ));
        }

        let attrs = match fields.get(1) {
            Some((offset, list)) => self.tokenize_attrs(line_no, column_of(content, *offset), list)?,
            None => Vec::new(),
        };
        let head_column = column_of(content, head_offset);

        if let Some(group) = head.strip_prefix('@') {
            if group.is_empty() || group.contains('=') {
                return Err(GendersError::syntax(line_no, head_column, "invalid attribute group name"));
            }
            if let Some(existing) = self.groups.get(group) {
                return Err(GendersError::syntax(
                    line_no,
                    head_column,
                    format!("attribute group '@{}' already defined at line {}", group, existing.line),
                ));
            }
            self.group_order.push(group.to_string());
            self.groups.insert(group.to_string(), GroupDef { line: line_no, attrs });
        } else {
            if let Some(pos) = head.find(['=', '@']) {
                return Err(GendersError::syntax(
                    line_no,
                    head_column + head[..pos].chars().count(),
                    format!("invalid character in node name '{}'", head),
                ));
            }
            self.node_lines.push(NodeLine {
                line: line_no,
                column: head_column,
                field: head.to_string(),
                attrs,
            });
        }

        Ok(())
    }

    fn tokenize_attrs(&self, line_no: usize, start_column: usize, list: &str) -> Result<Vec<AttrToken>> {
        let mut tokens = Vec::new();
        let mut column = start_column;

        for item in list.split(',') {
            if item.is_empty() {
                return Err(GendersError::syntax(line_no, column, "empty attribute"));
            }

            if let Some(group) = item.strip_prefix('@') {
                if group.is_empty() || group.contains('=') {
                    return Err(GendersError::syntax(line_no, column, "invalid attribute group reference"));
                }
                tokens.push(AttrToken::GroupRef {
                    name: group.to_string(),
                    column,
                });
            } else {
                let (name, value) = match item.split_once('=') {
                    Some((name, value)) => (name, Some(value.to_string())),
                    None => (item, None),
                };
                if name.is_empty() {
                    return Err(GendersError::syntax(line_no, column, "attribute has no name"));
                }
                if let Some(max) = self.config.max_attr_len {
                    let len = name.chars().count();
                    if len > max {
                        return Err(GendersError::Overflow {
                            line: line_no,
                            what: "attribute",
                            name: name.to_string(),
                            len,
                            max,
                        });
                    }
                }
                tokens.push(AttrToken::Attr {
                    name: name.to_string(),
                    value,
                    column,
                });
            }

            column += item.chars().count() + 1;
        }

        Ok(tokens)
    }

    /// Second pass: expand every group, detecting unknown references and cycles.
    ///
    /// Groups are walked depth first with an explicit stack, so chain length
    /// is bounded by memory rather than the call stack. Each expansion holds
    /// every attribute at most once and is shared between referrers.
    fn resolve_groups(&mut self) -> Result<()> {
        let policy = self.config.duplicate_policy;
        let groups = &self.groups;
        let resolved = &mut self.resolved;

        for root in &self.group_order {
            if resolved.contains_key(root) {
                continue;
            }

            // (group, index of the next token to visit)
            let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
            let mut on_stack: HashMap<&str, usize> = HashMap::from([(root.as_str(), 0)]);

            while let Some(&(name, start)) = stack.last() {
                let def = group_def(groups, name)?;
                let mut next = start;
                let mut child = None;

                while let Some(token) = def.attrs.get(next) {
                    next += 1;
                    let AttrToken::GroupRef { name: target, column } = token else {
                        continue;
                    };
                    if let Some(&pos) = on_stack.get(target.as_str()) {
                        let mut cycle: Vec<String> =
                            stack[pos..].iter().map(|(g, _)| format!("@{}", g)).collect();
                        cycle.push(format!("@{}", target));
                        return Err(GendersError::CycleDetected { line: def.line, cycle });
                    }
                    if resolved.contains_key(target) {
                        continue;
                    }
                    match groups.get_key_value(target) {
                        Some((key, _)) => {
                            child = Some(key.as_str());
                            break;
                        }
                        None => return Err(unknown_group(def.line, *column, target)),
                    }
                }

                if let Some(top) = stack.last_mut() {
                    top.1 = next;
                }
                match child {
                    Some(child) => {
                        on_stack.insert(child, stack.len());
                        stack.push((child, 0));
                    }
                    None => {
                        let attrs = merge_group(name, def, resolved, policy)?;
                        resolved.insert(name.to_string(), attrs);
                        on_stack.remove(name);
                        stack.pop();
                    }
                }
            }
        }

        debug!(groups = self.resolved.len(), "resolved attribute groups");
        Ok(())
    }

    /// Flatten a node line's attribute list using the resolved groups
    fn expand_tokens(&self, line: usize, tokens: &[AttrToken]) -> Result<Vec<ResolvedAttr>> {
        let mut out = Vec::with_capacity(tokens.len());

        for token in tokens {
            match token {
                AttrToken::Attr { name, value, column } => out.push(ResolvedAttr {
                    name: name.clone(),
                    value: value.clone(),
                    line,
                    column: *column,
                }),
                AttrToken::GroupRef { name, column } => match self.resolved.get(name) {
                    Some(attrs) => out.extend(attrs.iter().cloned()),
                    None => return Err(unknown_group(line, *column, name)),
                },
            }
        }

        Ok(out)
    }

    /// Third pass: expand node names and bind attributes
    fn build(mut self) -> Result<ParsedDatabase> {
        let mut db = ParsedDatabase::default();
        let mut positions: HashMap<String, NodeId> = HashMap::new();
        let node_lines = std::mem::take(&mut self.node_lines);

        for node_line in &node_lines {
            let attrs = self.expand_tokens(node_line.line, &node_line.attrs)?;
            let names = self.expand_node_field(node_line)?;

            for name in names {
                let id = match positions.get(&name) {
                    Some(id) => *id,
                    None => {
                        let id = NodeId::new(db.nodes.len())?;
                        positions.insert(name.clone(), id);
                        db.nodes.push(ParsedNode {
                            name: name.clone(),
                            attrs: Vec::new(),
                        });
                        id
                    }
                };
                for attr in &attrs {
                    self.bind(&mut db, id.index(), attr)?;
                }
            }
        }

        Ok(db)
    }

    fn expand_node_field(&self, node_line: &NodeLine) -> Result<Vec<String>> {
        let line = node_line.line;
        let range_error = |offset: usize, err: RangeError| match err {
            RangeError::Syntax { column, reason } => {
                GendersError::syntax(line, node_line.column + offset + column, reason)
            }
            RangeError::TooLarge { pattern, count, limit } => GendersError::RangeOverflow {
                line,
                pattern,
                count,
                max: limit,
            },
        };

        let parts = hostrange::split_node_field(&node_line.field).map_err(|e| range_error(0, e))?;
        let mut names = Vec::new();

        for (offset, part) in parts {
            let column_offset = node_line.field[..offset].chars().count();
            let expanded = hostrange::expand(part, self.config.max_range_size)
                .map_err(|e| range_error(column_offset, e))?;

            for name in expanded {
                let name = self.config.normalize_node(&name).into_owned();
                if let Some(max) = self.config.max_node_len {
                    let len = name.chars().count();
                    if len > max {
                        return Err(GendersError::Overflow {
                            line,
                            what: "node name",
                            name,
                            len,
                            max,
                        });
                    }
                }
                names.push(name);
            }
        }

        Ok(names)
    }

    fn bind(&self, db: &mut ParsedDatabase, index: usize, attr: &ResolvedAttr) -> Result<()> {
        let node_name = db.nodes[index].name.clone();
        let value = attr.value.as_deref().map(|v| substitute_node(v, &node_name));

        if let (Some(value), Some(max)) = (&value, self.config.max_val_len) {
            let len = value.chars().count();
            if len > max {
                return Err(GendersError::Overflow {
                    line: attr.line,
                    what: "value",
                    name: format!("{}={}", attr.name, value),
                    len,
                    max,
                });
            }
        }

        let id = db.attrs.intern(&attr.name)?;
        let node = &mut db.nodes[index];

        match node.attrs.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => match self.config.duplicate_policy {
                DuplicatePolicy::Error => Err(GendersError::syntax(
                    attr.line,
                    attr.column,
                    format!("attribute '{}' already set on node '{}'", attr.name, node_name),
                )),
                DuplicatePolicy::LastWins => {
                    slot.1 = value;
                    Ok(())
                }
            },
            None => {
                node.attrs.push((id, value));
                Ok(())
            }
        }
    }
}

fn group_def<'g>(groups: &'g HashMap<String, GroupDef>, name: &str) -> Result<&'g GroupDef> {
    groups
        .get(name)
        .ok_or_else(|| GendersError::Internal(format!("group '@{}' vanished", name)))
}

fn unknown_group(line: usize, column: usize, name: &str) -> GendersError {
    GendersError::syntax(line, column, format!("unknown attribute group '@{}'", name))
}

/// Expand one group whose references are all resolved already
fn merge_group(
    name: &str,
    def: &GroupDef,
    resolved: &HashMap<String, Arc<[ResolvedAttr]>>,
    policy: DuplicatePolicy,
) -> Result<Arc<[ResolvedAttr]>> {
    if let [AttrToken::GroupRef { name: target, .. }] = def.attrs.as_slice() {
        if let Some(shared) = resolved.get(target) {
            return Ok(Arc::clone(shared));
        }
    }

    let mut merged = GroupMerge {
        group: name,
        policy,
        attrs: Vec::new(),
        seen: HashMap::new(),
    };
    for token in &def.attrs {
        match token {
            AttrToken::Attr { name, value, column } => merged.push(
                ResolvedAttr {
                    name: name.clone(),
                    value: value.clone(),
                    line: def.line,
                    column: *column,
                },
                def.line,
                *column,
            )?,
            AttrToken::GroupRef { name: target, column } => {
                let attrs = resolved
                    .get(target)
                    .ok_or_else(|| unknown_group(def.line, *column, target))?;
                for attr in attrs.iter() {
                    merged.push(attr.clone(), def.line, *column)?;
                }
            }
        }
    }

    Ok(merged.attrs.into())
}

/// Attribute list of one group under construction, each name at most once
struct GroupMerge<'g> {
    group: &'g str,
    policy: DuplicatePolicy,
    attrs: Vec<ResolvedAttr>,
    seen: HashMap<String, usize>,
}

impl GroupMerge<'_> {
    fn push(&mut self, attr: ResolvedAttr, line: usize, column: usize) -> Result<()> {
        match self.seen.get(&attr.name) {
            None => {
                self.seen.insert(attr.name.clone(), self.attrs.len());
                self.attrs.push(attr);
                Ok(())
            }
            Some(&index) => match self.policy {
                DuplicatePolicy::Error => Err(GendersError::syntax(
                    line,
                    column,
                    format!("attribute '{}' repeated in attribute group '@{}'", attr.name, self.group),
                )),
                DuplicatePolicy::LastWins => {
                    self.attrs[index].value = attr.value;
                    Ok(())
                }
            },
        }
    }
}

/// Replace `%n` with the node name and `%%` with a literal percent sign
fn substitute_node(value: &str, node: &str) -> String {
    if !value.contains('%') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + node.len());
    let mut chars = value.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '%' {
            match chars.peek() {
                Some('n') => {
                    chars.next();
                    out.push_str(node);
                }
                Some('%') => {
                    chars.next();
                    out.push('%');
                }
                _ => out.push('%'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Whitespace separated fields with their byte offsets
fn split_fields(line: &str) -> Vec<(usize, &str)> {
    let mut fields = Vec::new();
    let mut start: Option<usize> = None;

    for (offset, ch) in line.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                fields.push((s, &line[s..offset]));
            }
        } else if start.is_none() {
            start = Some(offset);
        }
    }
    if let Some(s) = start {
        fields.push((s, &line[s..]));
    }

    fields
}

/// 1-based char column of a byte offset
fn column_of(line: &str, byte_offset: usize) -> usize {
    line[..byte_offset].chars().count() + 1
}
