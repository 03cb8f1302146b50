//! Error types for the genders engine
//!
//! Every failure maps onto one flat [`ErrorKind`], which keeps the stable
//! numbering of the errno-style C API so bindings can raise the matching
//! exception class.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Flat error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NotLoaded,
    AlreadyLoaded,
    OpenFailed,
    ReadFailed,
    ParseSyntax,
    CycleDetected,
    Overflow,
    InvalidParameter,
    NotFound,
    OutOfMemory,
    Internal,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 11] = [
        ErrorKind::NotLoaded,
        ErrorKind::AlreadyLoaded,
        ErrorKind::OpenFailed,
        ErrorKind::ReadFailed,
        ErrorKind::ParseSyntax,
        ErrorKind::CycleDetected,
        ErrorKind::Overflow,
        ErrorKind::InvalidParameter,
        ErrorKind::NotFound,
        ErrorKind::OutOfMemory,
        ErrorKind::Internal,
    ];

    /// Stable numeric code. Zero is reserved for success.
    pub fn errnum(self) -> i32 {
        match self {
            ErrorKind::NotLoaded => 1,
            ErrorKind::AlreadyLoaded => 2,
            ErrorKind::OpenFailed => 3,
            ErrorKind::ReadFailed => 4,
            ErrorKind::ParseSyntax => 5,
            ErrorKind::CycleDetected => 6,
            ErrorKind::Overflow => 7,
            ErrorKind::InvalidParameter => 8,
            ErrorKind::NotFound => 9,
            ErrorKind::OutOfMemory => 10,
            ErrorKind::Internal => 11,
        }
    }

    pub fn from_errnum(errnum: i32) -> Option<ErrorKind> {
        ErrorKind::ALL.iter().copied().find(|k| k.errnum() == errnum)
    }

    /// Fixed description of the kind, independent of any particular failure
    pub fn strerror(self) -> &'static str {
        match self {
            ErrorKind::NotLoaded => "genders data not loaded",
            ErrorKind::AlreadyLoaded => "genders data already loaded",
            ErrorKind::OpenFailed => "error opening genders file",
            ErrorKind::ReadFailed => "error reading genders file",
            ErrorKind::ParseSyntax => "syntax error",
            ErrorKind::CycleDetected => "attribute group reference cycle",
            ErrorKind::Overflow => "name or value too long",
            ErrorKind::InvalidParameter => "incorrect parameters passed",
            ErrorKind::NotFound => "node or attribute not found",
            ErrorKind::OutOfMemory => "out of memory",
            ErrorKind::Internal => "internal system error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.strerror())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GendersError {
    #[error("genders data not loaded")]
    NotLoaded,

    #[error("genders data already loaded")]
    AlreadyLoaded,

    #[error("cannot open {}: {reason}", .path.display())]
    OpenFailed { path: PathBuf, reason: String },

    #[error("cannot read {}: {reason}", .path.display())]
    ReadFailed { path: PathBuf, reason: String },

    /// Database lines and query strings both report here; a query is line 1.
    #[error("syntax error at line {line}, column {column}: {reason}")]
    ParseSyntax {
        line: usize,
        column: usize,
        reason: String,
    },

    #[error("attribute group cycle at line {line}: {}", .cycle.join(" -> "))]
    CycleDetected { line: usize, cycle: Vec<String> },

    #[error("{what} '{name}' at line {line} is {len} characters, limit is {max}")]
    Overflow {
        line: usize,
        what: &'static str,
        name: String,
        len: usize,
        max: usize,
    },

    #[error("node range '{pattern}' at line {line} expands to {count} nodes, limit is {max}")]
    RangeOverflow {
        line: usize,
        pattern: String,
        count: u128,
        max: usize,
    },

    #[error("too many {what}, limit is {max}")]
    Capacity { what: &'static str, max: usize },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GendersError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GendersError::NotLoaded => ErrorKind::NotLoaded,
            GendersError::AlreadyLoaded => ErrorKind::AlreadyLoaded,
            GendersError::OpenFailed { .. } => ErrorKind::OpenFailed,
            GendersError::ReadFailed { .. } => ErrorKind::ReadFailed,
            GendersError::ParseSyntax { .. } => ErrorKind::ParseSyntax,
            GendersError::CycleDetected { .. } => ErrorKind::CycleDetected,
            GendersError::Overflow { .. }
            | GendersError::RangeOverflow { .. }
            | GendersError::Capacity { .. } => ErrorKind::Overflow,
            GendersError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            GendersError::NotFound(_) => ErrorKind::NotFound,
            GendersError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            GendersError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn syntax(line: usize, column: usize, reason: impl Into<String>) -> Self {
        GendersError::ParseSyntax {
            line,
            column,
            reason: reason.into(),
        }
    }
}

/// Result type for genders operations
pub type Result<T> = std::result::Result<T, GendersError>;

/// Error retained on a handle after a failing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub operation: &'static str,
    pub message: String,
}

impl LastError {
    pub(crate) fn new(operation: &'static str, err: &GendersError) -> Self {
        LastError {
            kind: err.kind(),
            operation,
            message: format!("{} from {}", err, operation),
        }
    }

    pub fn errnum(&self) -> i32 {
        self.kind.errnum()
    }
}

impl fmt::Display for LastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errnum_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_errnum(kind.errnum()), Some(kind));
        }
        assert_eq!(ErrorKind::from_errnum(0), None);
        assert_eq!(ErrorKind::from_errnum(42), None);
    }

    #[test]
    fn test_error_messages() {
        let err = GendersError::syntax(3, 7, "expected attribute");
        assert_eq!(err.kind(), ErrorKind::ParseSyntax);
        assert_eq!(
            err.to_string(),
            "syntax error at line 3, column 7: expected attribute"
        );

        let err = GendersError::CycleDetected {
            line: 2,
            cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "attribute group cycle at line 2: a -> b -> a");

        let err = GendersError::OpenFailed {
            path: PathBuf::from("/nonexistent/genders"),
            reason: "No such file or directory".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot open /nonexistent/genders: No such file or directory"
        );

        let err = GendersError::RangeOverflow {
            line: 4,
            pattern: "n[1-100]".to_string(),
            count: 100,
            max: 50,
        };
        assert_eq!(err.kind(), ErrorKind::Overflow);
        assert_eq!(
            err.to_string(),
            "node range 'n[1-100]' at line 4 expands to 100 nodes, limit is 50"
        );
    }

    #[test]
    fn test_last_error_names_operation() {
        let last = LastError::new("query", &GendersError::NotLoaded);
        assert_eq!(last.kind, ErrorKind::NotLoaded);
        assert_eq!(last.errnum(), 1);
        assert_eq!(last.message, "genders data not loaded from query");
    }
}
