//! Genders handle
//!
//! The public session API: load, reload, query and error inspection over the
//! currently active [`Snapshot`].
//!
//! Readers take a reference-counted snapshot and never block. A load builds
//! a complete new snapshot off to the side and publishes it with a single
//! atomic store, so in-flight queries finish against the snapshot they
//! started with. Only one load runs at a time.

use crate::error::{ErrorKind, GendersError, LastError, Result};
use crate::snapshot::Snapshot;
use crate::types::{GendersConfig, HandleState, Stats};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Genders {
    config: GendersConfig,
    snapshot: ArcSwapOption<Snapshot>,
    /// Path of the last successful load, reused by `reload`
    source: Mutex<Option<PathBuf>>,
    /// Held for the duration of a load, reload, unload or destroy
    reload_lock: Mutex<()>,
    /// Set while a new snapshot is being built to replace a loaded one
    reloading: AtomicBool,
    destroyed: AtomicBool,
    last_error: Mutex<Option<LastError>>,
}

impl Genders {
    /// Create an unloaded handle
    pub fn new(config: GendersConfig) -> Self {
        Genders {
            config,
            snapshot: ArcSwapOption::empty(),
            source: Mutex::new(None),
            reload_lock: Mutex::new(()),
            reloading: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn create() -> Self {
        Genders::new(GendersConfig::default())
    }

    /// Create a handle and load `path` (or the configured default) into it
    pub fn open(path: Option<&Path>, config: GendersConfig) -> Result<Self> {
        let handle = Genders::new(config);
        handle.load(path)?;
        Ok(handle)
    }

    pub fn config(&self) -> &GendersConfig {
        &self.config
    }

    pub fn state(&self) -> HandleState {
        if self.destroyed.load(Ordering::Acquire) {
            HandleState::Destroyed
        } else if self.reloading.load(Ordering::Acquire) {
            HandleState::Reloading
        } else if self.snapshot.load().is_some() {
            HandleState::Loaded
        } else {
            HandleState::Unloaded
        }
    }

    /// Parse `path` (or the configured default path) and install it.
    ///
    /// On failure the previously active snapshot, if any, stays in place.
    pub fn load(&self, path: Option<&Path>) -> Result<()> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.default_path.clone());
        let result = {
            let _guard = self.reload_lock.lock();
            self.install("load", &path, !self.config.allow_reload)
        };
        self.record("load", result)
    }

    /// Re-read the file of the last successful load
    pub fn reload(&self) -> Result<()> {
        let result = {
            let _guard = self.reload_lock.lock();
            let source = self.source.lock().clone();
            match source {
                Some(path) => self.install("reload", &path, false),
                None => Err(GendersError::NotLoaded),
            }
        };
        self.record("reload", result)
    }

    /// Release the active snapshot; the handle may be loaded again
    pub fn unload(&self) -> Result<()> {
        let result = {
            let _guard = self.reload_lock.lock();
            if self.destroyed.load(Ordering::Acquire) || self.snapshot.swap(None).is_none() {
                Err(GendersError::NotLoaded)
            } else {
                *self.source.lock() = None;
                Ok(())
            }
        };
        self.record("unload", result)
    }

    /// Release the snapshot for good. Every later call except `destroy`
    /// fails with `NotLoaded`.
    pub fn destroy(&self) {
        let _guard = self.reload_lock.lock();
        self.destroyed.store(true, Ordering::Release);
        self.snapshot.store(None);
        *self.source.lock() = None;
    }

    /// Build and publish a snapshot. The caller holds `reload_lock`.
    fn install(&self, op: &'static str, path: &Path, reject_if_loaded: bool) -> Result<()> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(GendersError::NotLoaded);
        }
        let loaded = self.snapshot.load().is_some();
        if reject_if_loaded && loaded {
            return Err(GendersError::AlreadyLoaded);
        }
        let _reloading = loaded.then(|| ReloadingFlag::raise(&self.reloading));

        let text = read_source(path)?;
        let snapshot = Snapshot::parse(&text, &self.config)?;
        let stats = snapshot.stats();

        self.snapshot.store(Some(Arc::new(snapshot)));
        *self.source.lock() = Some(path.to_path_buf());

        info!(
            op,
            path = %path.display(),
            nodes = stats.num_nodes,
            attrs = stats.num_attrs,
            "genders database installed"
        );
        Ok(())
    }

    /// Parse a file without installing it
    pub fn parse_file(&self, path: &Path) -> Result<Stats> {
        let result = read_source(path).and_then(|text| crate::snapshot::check(&text, &self.config));
        self.record("parse_file", result)
    }

    /// The active snapshot. It stays valid across later reloads.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>> {
        let result = self.current();
        self.record("snapshot", result)
    }

    fn current(&self) -> Result<Arc<Snapshot>> {
        self.snapshot.load_full().ok_or(GendersError::NotLoaded)
    }

    fn with_snapshot<T>(&self, op: &'static str, f: impl FnOnce(&Snapshot) -> Result<T>) -> Result<T> {
        let result = self.current().and_then(|snap| f(&snap));
        self.record(op, result)
    }

    pub fn is_node(&self, node: &str) -> Result<bool> {
        self.with_snapshot("is_node", |s| Ok(s.is_node(node)))
    }

    pub fn is_attr(&self, attr: &str) -> Result<bool> {
        self.with_snapshot("is_attr", |s| Ok(s.is_attr(attr)))
    }

    pub fn is_attr_val(&self, attr: &str, val: &str) -> Result<bool> {
        self.with_snapshot("is_attr_val", |s| Ok(s.is_attr_val(attr, val)))
    }

    pub fn getnodes(&self, attr: Option<&str>, val: Option<&str>) -> Result<Vec<String>> {
        self.with_snapshot("getnodes", |s| s.nodes_with(attr, val))
    }

    pub fn getattr(&self, node: &str) -> Result<Vec<(String, Option<String>)>> {
        self.with_snapshot("getattr", |s| s.getattr(node))
    }

    pub fn getattr_all(&self) -> Result<Vec<String>> {
        self.with_snapshot("getattr_all", |s| Ok(s.getattr_all()))
    }

    pub fn testattr(&self, node: &str, attr: &str) -> Result<Option<Option<String>>> {
        self.with_snapshot("testattr", |s| s.testattr(node, attr))
    }

    pub fn testattrval(&self, node: &str, attr: &str, val: Option<&str>) -> Result<bool> {
        self.with_snapshot("testattrval", |s| s.testattrval(node, attr, val))
    }

    pub fn query(&self, query: &str) -> Result<Vec<String>> {
        self.with_snapshot("query", |s| s.query(query))
    }

    pub fn test_query(&self, query: &str, node: &str) -> Result<bool> {
        self.with_snapshot("test_query", |s| s.test_query(query, node))
    }

    pub fn stats(&self) -> Result<Stats> {
        self.with_snapshot("stats", |s| Ok(s.stats()))
    }

    /// Short host name of the machine this process runs on
    pub fn getnodename(&self) -> Result<String> {
        let result = local_node_name().map(|name| self.config.normalize_node(&name).into_owned());
        self.record("getnodename", result)
    }

    /// The error left by the most recent failing call, if any
    pub fn last_error(&self) -> Option<LastError> {
        self.last_error.lock().clone()
    }

    /// Numeric code of the last error, 0 if no call has failed
    pub fn errnum(&self) -> i32 {
        self.last_error.lock().as_ref().map(LastError::errnum).unwrap_or(0)
    }

    pub fn errormsg(&self) -> String {
        self.last_error
            .lock()
            .as_ref()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| "success".to_string())
    }

    pub fn strerror(kind: ErrorKind) -> &'static str {
        kind.strerror()
    }

    fn record<T>(&self, op: &'static str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if matches!(op, "load" | "reload") {
                warn!(op, kind = ?err.kind(), error = %err, "genders load failed");
            }
            *self.last_error.lock() = Some(LastError::new(op, err));
        }
        result
    }
}

impl Default for Genders {
    fn default() -> Self {
        Genders::create()
    }
}

/// Reports `Reloading` until dropped
struct ReloadingFlag<'a>(&'a AtomicBool);

impl<'a> ReloadingFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        ReloadingFlag(flag)
    }
}

impl Drop for ReloadingFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn read_source(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| GendersError::OpenFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let read_failed = |reason: String| GendersError::ReadFailed {
        path: path.to_path_buf(),
        reason,
    };

    let size = file
        .metadata()
        .map_err(|e| read_failed(e.to_string()))?
        .len();
    let mut bytes = Vec::new();
    bytes
        .try_reserve(size as usize)
        .map_err(|e| GendersError::OutOfMemory(format!("{} for {}", e, path.display())))?;
    file.read_to_end(&mut bytes)
        .map_err(|e| read_failed(e.to_string()))?;

    String::from_utf8(bytes).map_err(|e| read_failed(format!("not valid UTF-8: {}", e)))
}

fn local_node_name() -> Result<String> {
    let name = hostname::get()
        .map_err(|e| GendersError::Internal(format!("cannot determine host name: {}", e)))?
        .into_string()
        .map_err(|_| GendersError::Internal("host name is not valid UTF-8".to_string()))?;
    Ok(name.split('.').next().unwrap_or_default().to_string())
}
