//! Python FFI bindings using PyO3
//!
//! Exposes the genders handle to Python with the method names of the
//! libgenders Python module. Every error kind raises its own exception
//! class, and the message names the failing method.

use crate::error::{ErrorKind, GendersError};
use crate::handle::Genders;
use crate::types::GendersConfig;
use pyo3::create_exception;
use pyo3::exceptions::PyException;
use pyo3::prelude::*;
use std::path::PathBuf;

create_exception!(genders_core, ErrNotLoaded, PyException);
create_exception!(genders_core, ErrIsLoaded, PyException);
create_exception!(genders_core, ErrOpen, PyException);
create_exception!(genders_core, ErrRead, PyException);
create_exception!(genders_core, ErrSyntax, PyException);
create_exception!(genders_core, ErrCycle, PyException);
create_exception!(genders_core, ErrOverflow, PyException);
create_exception!(genders_core, ErrParameters, PyException);
create_exception!(genders_core, ErrNotFound, PyException);
create_exception!(genders_core, ErrOutMem, PyException);
create_exception!(genders_core, ErrInternal, PyException);

fn kind_to_py_err(kind: ErrorKind, message: String) -> PyErr {
    match kind {
        ErrorKind::NotLoaded => ErrNotLoaded::new_err(message),
        ErrorKind::AlreadyLoaded => ErrIsLoaded::new_err(message),
        ErrorKind::OpenFailed => ErrOpen::new_err(message),
        ErrorKind::ReadFailed => ErrRead::new_err(message),
        ErrorKind::ParseSyntax => ErrSyntax::new_err(message),
        ErrorKind::CycleDetected => ErrCycle::new_err(message),
        ErrorKind::Overflow => ErrOverflow::new_err(message),
        ErrorKind::InvalidParameter => ErrParameters::new_err(message),
        ErrorKind::NotFound => ErrNotFound::new_err(message),
        ErrorKind::OutOfMemory => ErrOutMem::new_err(message),
        ErrorKind::Internal => ErrInternal::new_err(message),
    }
}

/// Python-exposed genders handle
#[pyclass(name = "Genders")]
pub struct PyGenders {
    handle: Genders,
}

impl PyGenders {
    /// Convert a failure using the message recorded on the handle
    fn raise(&self, err: GendersError) -> PyErr {
        let message = self
            .handle
            .last_error()
            .map(|last| last.message)
            .unwrap_or_else(|| err.to_string());
        kind_to_py_err(err.kind(), message)
    }

    fn stat(&self, pick: impl Fn(crate::types::Stats) -> usize) -> PyResult<usize> {
        self.handle.stats().map(pick).map_err(|e| self.raise(e))
    }
}

#[pymethods]
impl PyGenders {
    /// Create a handle, loading `genders_file` (or the default database)
    /// unless `no_auto` is set
    #[new]
    #[pyo3(signature = (genders_file=None, no_auto=false))]
    fn new(genders_file: Option<PathBuf>, no_auto: bool) -> PyResult<Self> {
        let genders = PyGenders {
            handle: Genders::new(GendersConfig::default()),
        };
        if !no_auto {
            genders.load_data(genders_file)?;
        }
        Ok(genders)
    }

    #[pyo3(signature = (genders_file=None))]
    fn load_data(&self, genders_file: Option<PathBuf>) -> PyResult<()> {
        self.handle
            .load(genders_file.as_deref())
            .map_err(|e| self.raise(e))
    }

    fn reload(&self) -> PyResult<()> {
        self.handle.reload().map_err(|e| self.raise(e))
    }

    fn handle_destroy(&self) {
        self.handle.destroy();
    }

    fn errnum(&self) -> i32 {
        self.handle.errnum()
    }

    fn strerror(&self, err: i32) -> &'static str {
        ErrorKind::from_errnum(err)
            .map(ErrorKind::strerror)
            .unwrap_or("success")
    }

    fn errormsg(&self) -> String {
        self.handle.errormsg()
    }

    /// Print the last error to stderr, optionally prefixed
    #[pyo3(signature = (msg=None))]
    fn perror(&self, msg: Option<&str>) {
        match msg {
            Some(msg) => eprintln!("{}: {}", msg, self.handle.errormsg()),
            None => eprintln!("{}", self.handle.errormsg()),
        }
    }

    fn getnumnodes(&self) -> PyResult<usize> {
        self.stat(|s| s.num_nodes)
    }

    fn getnumattrs(&self) -> PyResult<usize> {
        self.stat(|s| s.num_attrs)
    }

    fn getmaxattrs(&self) -> PyResult<usize> {
        self.stat(|s| s.max_attrs_per_node)
    }

    fn getmaxnodelen(&self) -> PyResult<usize> {
        self.stat(|s| s.max_node_len)
    }

    fn getmaxattrlen(&self) -> PyResult<usize> {
        self.stat(|s| s.max_attr_len)
    }

    fn getmaxvallen(&self) -> PyResult<usize> {
        self.stat(|s| s.max_val_len)
    }

    fn getnodename(&self) -> PyResult<String> {
        self.handle.getnodename().map_err(|e| self.raise(e))
    }

    #[pyo3(signature = (attr=None, val=None))]
    fn getnodes(&self, attr: Option<&str>, val: Option<&str>) -> PyResult<Vec<String>> {
        self.handle.getnodes(attr, val).map_err(|e| self.raise(e))
    }

    /// List of (attribute, value) pairs; value is None for bare attributes
    #[pyo3(signature = (node=None))]
    fn getattr(&self, node: Option<String>) -> PyResult<Vec<(String, Option<String>)>> {
        let node = self.node_or_local(node)?;
        self.handle.getattr(&node).map_err(|e| self.raise(e))
    }

    fn getattr_all(&self) -> PyResult<Vec<String>> {
        self.handle.getattr_all().map_err(|e| self.raise(e))
    }

    /// Returns (found, value)
    #[pyo3(signature = (attr, node=None))]
    fn testattr(&self, attr: &str, node: Option<String>) -> PyResult<(bool, Option<String>)> {
        let node = self.node_or_local(node)?;
        match self.handle.testattr(&node, attr) {
            Ok(Some(value)) => Ok((true, value)),
            Ok(None) => Ok((false, None)),
            Err(e) => Err(self.raise(e)),
        }
    }

    #[pyo3(signature = (attr, val=None, node=None))]
    fn testattrval(&self, attr: &str, val: Option<&str>, node: Option<String>) -> PyResult<bool> {
        let node = self.node_or_local(node)?;
        self.handle
            .testattrval(&node, attr, val)
            .map_err(|e| self.raise(e))
    }

    #[pyo3(signature = (node=None))]
    fn isnode(&self, node: Option<String>) -> PyResult<bool> {
        let node = self.node_or_local(node)?;
        self.handle.is_node(&node).map_err(|e| self.raise(e))
    }

    fn isattr(&self, attr: &str) -> PyResult<bool> {
        self.handle.is_attr(attr).map_err(|e| self.raise(e))
    }

    fn isattrval(&self, attr: &str, val: &str) -> PyResult<bool> {
        self.handle.is_attr_val(attr, val).map_err(|e| self.raise(e))
    }

    fn query(&self, query_str: &str) -> PyResult<Vec<String>> {
        self.handle.query(query_str).map_err(|e| self.raise(e))
    }

    #[pyo3(signature = (query_str, node=None))]
    fn testquery(&self, query_str: &str, node: Option<String>) -> PyResult<bool> {
        let node = self.node_or_local(node)?;
        self.handle
            .test_query(query_str, &node)
            .map_err(|e| self.raise(e))
    }

    /// Check a database file without loading it; returns the node count
    fn parse(&self, filename: PathBuf) -> PyResult<usize> {
        self.handle
            .parse_file(&filename)
            .map(|stats| stats.num_nodes)
            .map_err(|e| self.raise(e))
    }
}

impl PyGenders {
    fn node_or_local(&self, node: Option<String>) -> PyResult<String> {
        match node {
            Some(node) => Ok(node),
            None => self.handle.getnodename().map_err(|e| self.raise(e)),
        }
    }
}

/// Python module definition
#[pymodule]
fn genders_core(py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyGenders>()?;
    m.add("ErrNotLoaded", py.get_type::<ErrNotLoaded>())?;
    m.add("ErrIsLoaded", py.get_type::<ErrIsLoaded>())?;
    m.add("ErrOpen", py.get_type::<ErrOpen>())?;
    m.add("ErrRead", py.get_type::<ErrRead>())?;
    m.add("ErrSyntax", py.get_type::<ErrSyntax>())?;
    m.add("ErrCycle", py.get_type::<ErrCycle>())?;
    m.add("ErrOverflow", py.get_type::<ErrOverflow>())?;
    m.add("ErrParameters", py.get_type::<ErrParameters>())?;
    m.add("ErrNotFound", py.get_type::<ErrNotFound>())?;
    m.add("ErrOutMem", py.get_type::<ErrOutMem>())?;
    m.add("ErrInternal", py.get_type::<ErrInternal>())?;
    Ok(())
}
