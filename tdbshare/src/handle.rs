//! Per-path shared state and the public handle aliasing it
//!
//! All handles for one path share one `HandleState`. The engine context
//! lives in a slot under the state's mutex: an empty slot means closed.
//! The mutex is held for the whole duration of every engine call on the
//! context, so a close never tears a context down under a running store or
//! fetch.
//!
//! With the debug flag set, every operation logs its name, the handle
//! snapshot and the outcome at `info` level.

use crate::config::OpenOptions;
use crate::error::{report, Error};
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tdb_runtime::consts::SUCCESS;
use tdb_runtime::TdbRuntime;
use tracing::{info, trace, warn};

pub(crate) struct HandleState<C> {
    path: String,
    debug: AtomicBool,
    slot: Mutex<Option<C>>,
}

impl<C> HandleState<C> {
    /// A new state starts closed; `ensure_open` installs the context.
    pub(crate) fn new(path: &str, debug: bool) -> Self {
        Self {
            path: path.to_string(),
            debug: AtomicBool::new(debug),
            slot: Mutex::new(None),
        }
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn debug(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }

    /// Returns the new value
    pub(crate) fn toggle_debug(&self) -> bool {
        !self.debug.fetch_xor(true, Ordering::SeqCst)
    }

    pub(crate) fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::SeqCst);
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.slot.lock().is_none()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<C>> {
        self.slot.lock()
    }

    /// Snapshot for callers already holding the slot lock.
    pub(crate) fn snapshot_with(&self, closed: bool) -> Snapshot {
        Snapshot {
            path: self.path.clone(),
            debug: self.debug(),
            closed,
        }
    }

    /// Closed -> Open. An open state is left untouched and `options` are
    /// ignored.
    pub(crate) fn ensure_open<R>(&self, runtime: &R, options: &OpenOptions) -> Result<(), Error>
    where
        R: TdbRuntime<Context = C>,
    {
        let mut slot = self.lock();
        if slot.is_some() {
            if self.debug() {
                info!(op = "open", handle = %self.snapshot_with(false), "aliased");
            }
            return Ok(());
        }

        trace!(path = %self.path, ?options, "tdb_open");
        let result = match runtime.open(
            &self.path,
            options.hash_size,
            options.tdb_flags,
            options.open_flags,
            options.mode,
        ) {
            Some(ctx) => {
                *slot = Some(ctx);
                Ok(())
            }
            None => Err(Error::EngineUnavailable {
                path: self.path.clone(),
            }),
        };

        if self.debug() {
            let snapshot = self.snapshot_with(slot.is_none());
            match &result {
                Ok(()) => info!(op = "open", handle = %snapshot, "ok"),
                Err(e) => info!(op = "open", handle = %snapshot, error = %e, "failed"),
            }
        }
        result
    }

    /// Open -> Closed on engine success; a failing close leaves it open.
    pub(crate) fn close<R>(&self, runtime: &R) -> Result<(), Error>
    where
        R: TdbRuntime<Context = C>,
    {
        let mut slot = self.lock();
        let Some(ctx) = slot.as_mut() else {
            warn!(handle = %self.snapshot_with(true), "close called on already closed handle");
            return Err(Error::AlreadyClosed {
                path: self.path.clone(),
            });
        };

        trace!(path = %self.path, "tdb_close");
        let rc = runtime.close(ctx);
        let result = if rc == 0 {
            *slot = None;
            Ok(())
        } else {
            let last_error = runtime.error(ctx);
            report(rc, last_error, || runtime.errorstr(ctx))
        };

        if self.debug() {
            let snapshot = self.snapshot_with(slot.is_none());
            match &result {
                Ok(()) => info!(op = "close", handle = %snapshot, "ok"),
                Err(e) => info!(op = "close", handle = %snapshot, error = %e, "failed"),
            }
        }
        result
    }
}

/// Point-in-time view of a handle, formatted as `DB{pth:"a.db", Dbg:false}`
/// with a trailing `nil` once the handle is closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub path: String,
    pub debug: bool,
    pub closed: bool,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DB{{pth:{:?}, Dbg:{}", self.path, self.debug)?;
        if self.closed {
            f.write_str(", nil")?;
        }
        f.write_str("}")
    }
}

/// A caller's reference to the shared state of one path.
///
/// Cloning is cheap. Every handle obtained for the same path from the same
/// registry observes the same debug flag and open/closed state.
pub struct Handle<R: TdbRuntime> {
    state: Arc<HandleState<R::Context>>,
    runtime: Arc<R>,
}

impl<R: TdbRuntime> Clone for Handle<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl<R: TdbRuntime> Handle<R> {
    pub(crate) fn new(state: Arc<HandleState<R::Context>>, runtime: Arc<R>) -> Self {
        Self { state, runtime }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.state.path()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    #[must_use]
    pub fn debug(&self) -> bool {
        self.state.debug()
    }

    /// Flip the shared debug flag and return the new value.
    pub fn toggle_debug(&self) -> bool {
        self.state.toggle_debug()
    }

    pub fn set_debug(&self, on: bool) {
        self.state.set_debug(on);
    }

    /// Close the engine context behind this path, for every alias.
    ///
    /// # Errors
    ///
    /// `AlreadyClosed` without calling the engine when the state is closed,
    /// or the engine's status when it refuses to close (the state stays open).
    pub fn close(&self) -> Result<(), Error> {
        self.state.close(&*self.runtime)
    }

    /// Whether two handles alias the same state
    #[must_use]
    pub fn same_state(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let closed = self.is_closed();
        self.state.snapshot_with(closed)
    }

    /// Run `f` on the open context with the slot locked.
    ///
    /// A closed state fails with `AlreadyClosed` and `f` is not called.
    pub(crate) fn with_context<T>(
        &self,
        op: &'static str,
        f: impl FnOnce(&R, &mut R::Context) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut slot = self.state.lock();
        let result = match slot.as_mut() {
            Some(ctx) => f(&*self.runtime, ctx),
            None => Err(Error::AlreadyClosed {
                path: self.path().to_string(),
            }),
        };

        if self.state.debug() {
            let snapshot = self.state.snapshot_with(slot.is_none());
            match &result {
                Ok(_) => info!(op, handle = %snapshot, "ok"),
                Err(e) => info!(op, handle = %snapshot, error = %e, "failed"),
            }
        }
        result
    }

    /// Map an engine return code, reading the context's last error only on
    /// failure.
    pub(crate) fn check(runtime: &R, ctx: &R::Context, rc: c_int) -> Result<(), Error> {
        let last_error = if rc == 0 { SUCCESS } else { runtime.error(ctx) };
        report(rc, last_error, || runtime.errorstr(ctx))
    }
}

impl<R: TdbRuntime> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.snapshot())
    }
}

impl<R: TdbRuntime> fmt::Display for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.snapshot(), f)
    }
}
