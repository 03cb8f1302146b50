//! Genders - cluster node attribute database engine
//!
//! Loads a genders file (node names mapped to attributes with optional
//! values), indexes it, and answers membership and query-language questions.
//!
//! # Architecture
//!
//! - Parser: line-oriented source with node ranges and attribute groups
//! - Snapshot: immutable nodes plus attribute and attribute=value indices
//! - Query Layer: lexer, parser and per-node evaluator for `&& || -- !`
//! - Handle: load/reload lifecycle with lock-free readers
//! - Python FFI: PyO3 bindings behind the `python` feature
//!
//! ```
//! use genders_core::{GendersConfig, Snapshot};
//!
//! let db = Snapshot::parse("n[1-2] compute,rack=1\nlogin1 login\n", &GendersConfig::default())?;
//! assert_eq!(db.query("compute && rack=1")?, vec!["n1", "n2"]);
//! # Ok::<(), genders_core::GendersError>(())
//! ```

pub mod error;
pub mod types;
pub mod intern;
pub mod hostrange;
pub mod parser;
pub mod snapshot;

// Query language modules
pub mod query_lexer;
pub mod query_ast;
pub mod query_parser;
pub mod query_executor;

pub mod handle;

#[cfg(feature = "python")]
pub mod ffi;

pub use error::{ErrorKind, GendersError, LastError, Result};
pub use types::{
    AttrId, DuplicatePolicy, GendersConfig, HandleState, NodeId, Stats, DEFAULT_GENDERS_FILE,
    DEFAULT_MAX_QUERY_DEPTH,
};
pub use parser::{DatabaseParser, ParsedDatabase, ParsedNode};
pub use snapshot::{check, NodeEntry, Snapshot};
pub use handle::Genders;

// Query exports
pub use query_ast::{Expression, Predicate};
pub use query_parser::Parser as QueryParser;
pub use query_executor::QueryExecutor;
