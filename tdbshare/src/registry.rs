//! Path-keyed registry of handle states
//!
//! The registry is the only place where handle states are created. Paths
//! are compared as exact strings; `"a.db"` and `"./a.db"` are different
//! entries. Entries are never removed: a closed state stays registered and
//! is reopened in place by the next `open` of its path, so the map grows
//! with the number of distinct paths ever opened.

use crate::config::{OpenOptions, RegistryConfig};
use crate::error::Error;
use crate::handle::{Handle, HandleState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tdb_runtime::TdbRuntime;
use tracing::{debug, warn};

/// Result of `Registry::open`.
///
/// The handle is returned even when the engine refused to open the path; it
/// is then closed and a later `open` of the same path retries.
#[must_use]
pub struct Opened<R: TdbRuntime> {
    pub handle: Handle<R>,
    pub error: Option<Error>,
}

impl<R: TdbRuntime> Opened<R> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// # Errors
    /// The open error, dropping the handle.
    pub fn into_result(self) -> Result<Handle<R>, Error> {
        match self.error {
            None => Ok(self.handle),
            Some(e) => Err(e),
        }
    }
}

pub struct Registry<R: TdbRuntime> {
    runtime: Arc<R>,
    config: RegistryConfig,
    states: Mutex<HashMap<String, Arc<HandleState<R::Context>>>>,
}

impl<R: TdbRuntime> Registry<R> {
    #[must_use]
    pub fn new(runtime: R) -> Self {
        Self::with_config(runtime, RegistryConfig::default())
    }

    #[must_use]
    pub fn with_config(runtime: R, config: RegistryConfig) -> Self {
        Self {
            runtime: Arc::new(runtime),
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the shared state for `path`, creating a closed one if needed.
    ///
    /// Only the map lock is held here; the engine is never called under it.
    fn state_for(&self, path: &str) -> Arc<HandleState<R::Context>> {
        let mut states = self.states.lock();
        if let Some(state) = states.get(path) {
            return Arc::clone(state);
        }
        debug!(path, "registering new handle state");
        let state = Arc::new(HandleState::new(path, self.config.debug));
        states.insert(path.to_string(), Arc::clone(&state));
        state
    }

    /// Open `path`, or alias the existing open handle for it.
    ///
    /// `options` reach the engine only when the path's state is closed (or
    /// new). For an open path they are ignored entirely, even if they differ
    /// from the ones the path was first opened with.
    pub fn open(&self, path: &str, options: &OpenOptions) -> Opened<R> {
        let state = self.state_for(path);
        let error = state.ensure_open(&*self.runtime, options).err();
        Opened {
            handle: Handle::new(state, Arc::clone(&self.runtime)),
            error,
        }
    }

    /// `open` with the configured default options
    pub fn open_default(&self, path: &str) -> Opened<R> {
        let options = self.config.defaults;
        self.open(path, &options)
    }

    /// # Errors
    /// `EngineUnavailable` when the engine cannot open the path. The
    /// registry entry is kept in the closed state.
    pub fn open_checked(&self, path: &str, options: &OpenOptions) -> Result<Handle<R>, Error> {
        self.open(path, options).into_result()
    }

    /// # Errors
    /// See `Handle::close`.
    pub fn close(&self, handle: &Handle<R>) -> Result<(), Error> {
        handle.close()
    }

    /// Returns the new value of the shared flag
    pub fn toggle_debug(&self, handle: &Handle<R>) -> bool {
        handle.toggle_debug()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.states.lock().contains_key(path)
    }

    /// Registered paths, sorted
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.states.lock().keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Handle for a registered path without opening it
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Handle<R>> {
        let state = self.states.lock().get(path).map(Arc::clone)?;
        Some(Handle::new(state, Arc::clone(&self.runtime)))
    }

    /// Close every open state. Entries stay registered.
    ///
    /// Returns the errors of the closes that failed; those states stay open.
    pub fn shutdown(&self) -> Vec<Error> {
        let states: Vec<_> = self.states.lock().values().map(Arc::clone).collect();
        let mut errors = Vec::new();
        for state in states {
            if state.is_closed() {
                continue;
            }
            match state.close(&*self.runtime) {
                Ok(()) => {}
                // Closed concurrently since the check above
                Err(e) if e.is_already_closed() => {}
                Err(e) => {
                    warn!(path = state.path(), error = %e, "shutdown: close failed");
                    errors.push(e);
                }
            }
        }
        errors
    }
}
