//! Core type definitions for the genders engine

use crate::error::{GendersError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Position of a node in declaration order within one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Fails with `Overflow` once `index` no longer fits the id width
    pub fn new(index: usize) -> Result<Self> {
        u32::try_from(index).map(NodeId).map_err(|_| GendersError::Capacity {
            what: "nodes",
            max: u32::MAX as usize,
        })
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Interned attribute name within one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttrId(pub u32);

impl AttrId {
    /// Fails with `Overflow` once `index` no longer fits the id width
    pub fn new(index: usize) -> Result<Self> {
        u32::try_from(index).map(AttrId).map_err(|_| GendersError::Capacity {
            what: "attributes",
            max: u32::MAX as usize,
        })
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Database statistics, computed once while the snapshot is built.
///
/// Purely informational: nothing in the engine sizes buffers from them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub num_nodes: usize,
    pub num_attrs: usize,
    pub max_attrs_per_node: usize,
    pub max_node_len: usize,
    pub max_attr_len: usize,
    pub max_val_len: usize,
}

/// What to do when a node re-declares an attribute it already carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Reject the database with a syntax error at the offending line
    #[default]
    Error,
    /// Keep the attribute's original position, replace its value
    LastWins,
}

/// Lifecycle of a [`crate::Genders`] handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleState {
    Unloaded,
    Loaded,
    Reloading,
    Destroyed,
}

/// Load-time configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GendersConfig {
    /// Source used when `load` is called without a path
    pub default_path: PathBuf,
    /// When false, node names are folded to lower case on parse and lookup
    pub case_sensitive: bool,
    pub duplicate_policy: DuplicatePolicy,
    pub max_node_len: Option<usize>,
    pub max_attr_len: Option<usize>,
    pub max_val_len: Option<usize>,
    /// Upper bound on the nodes a single bracket expression may produce
    pub max_range_size: usize,
    /// When false, `load` on a loaded handle fails with `AlreadyLoaded`
    pub allow_reload: bool,
    /// Deepest expression tree a query may build. Every `!` and binary
    /// operator adds a level; open parentheses count against it too.
    pub max_query_depth: usize,
}

impl Default for GendersConfig {
    fn default() -> Self {
        GendersConfig {
            default_path: PathBuf::from(DEFAULT_GENDERS_FILE),
            case_sensitive: true,
            duplicate_policy: DuplicatePolicy::Error,
            max_node_len: Some(64),
            max_attr_len: Some(128),
            max_val_len: Some(128),
            max_range_size: 65_536,
            allow_reload: true,
            max_query_depth: DEFAULT_MAX_QUERY_DEPTH,
        }
    }
}

pub const DEFAULT_GENDERS_FILE: &str = "/etc/genders";

pub const DEFAULT_MAX_QUERY_DEPTH: usize = 256;

impl GendersConfig {
    pub fn with_default_path(mut self, path: impl AsRef<Path>) -> Self {
        self.default_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_max_node_len(mut self, max: Option<usize>) -> Self {
        self.max_node_len = max;
        self
    }

    pub fn with_max_attr_len(mut self, max: Option<usize>) -> Self {
        self.max_attr_len = max;
        self
    }

    pub fn with_max_val_len(mut self, max: Option<usize>) -> Self {
        self.max_val_len = max;
        self
    }

    pub fn with_max_range_size(mut self, max: usize) -> Self {
        self.max_range_size = max;
        self
    }

    pub fn with_allow_reload(mut self, allow: bool) -> Self {
        self.allow_reload = allow;
        self
    }

    pub fn with_max_query_depth(mut self, max: usize) -> Self {
        self.max_query_depth = max;
        self
    }

    /// Canonical form of a node name under this configuration
    pub fn normalize_node<'a>(&self, name: &'a str) -> std::borrow::Cow<'a, str> {
        if self.case_sensitive {
            std::borrow::Cow::Borrowed(name)
        } else {
            std::borrow::Cow::Owned(name.to_lowercase())
        }
    }
}
