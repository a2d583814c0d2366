//! Mocked TDB engine over in-memory "files".
//!
//! - `MemTdb` is cheap to clone; clones share the same files and counters.
//! - `add_record` / `get_record` seed and inspect files directly.
//! - `calls` counts every engine entry point, `live_buffers` counts fetched
//!   buffers not yet released.
//! - `WANT_ERROR` in a path makes `open` fail; in a key, `store` and
//!   `fetch` fail with `ERR_IO`.
//! - `fail_open` / `fail_close` make the next operations on a path fail.
//!   `fail_close_releasing` fails the close but releases the context anyway,
//!   the way libtdb's `tdb_close` does.
//!
//! Files outlive their contexts, so a path can be closed and reopened and
//! still see its records. Honoured flags: `O_CREAT`, `O_EXCL`, `O_TRUNC`,
//! the access mode, `INTERNAL` and `CLEAR_IF_FIRST`.
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::os::raw::c_int;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tdb_runtime::consts::{
    self, mode_t, CLEAR_IF_FIRST, ERR_EINVAL, ERR_EXISTS, ERR_IO, ERR_NOEXIST, ERR_RDONLY,
    INSERT, INTERNAL, MODIFY, O_ACCMODE, O_CREAT, O_EXCL, O_RDONLY, O_TRUNC, REPLACE, SUCCESS,
};
use tdb_runtime::{Datum, ForeignDatum, TdbData, TdbRuntime};

pub const WANT_ERROR: char = '\u{0001}';

type Records = BTreeMap<Vec<u8>, Vec<u8>>;

#[derive(Default)]
struct MemFile {
    records: Records,
    /// Number of live contexts on this file
    opened: usize,
}

/// Snapshot of how often each engine entry point was called
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub open: usize,
    pub close: usize,
    pub store: usize,
    pub fetch: usize,
}

impl CallCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.open + self.close + self.store + self.fetch
    }
}

#[derive(Default)]
struct Counters {
    open: AtomicUsize,
    close: AtomicUsize,
    store: AtomicUsize,
    fetch: AtomicUsize,
}

#[derive(Default)]
struct Failures {
    open: HashSet<String>,
    close: HashSet<String>,
    close_releasing: HashSet<String>,
}

#[derive(Default)]
struct Inner {
    files: Mutex<HashMap<String, MemFile>>,
    failures: Mutex<Failures>,
    calls: Counters,
    live_buffers: Arc<AtomicUsize>,
    next_id: AtomicU64,
}

impl Inner {
    fn detach(&self, storage: &Storage) {
        if let Storage::Shared(path) = storage {
            let mut files = self.files.lock();
            if let Some(file) = files.get_mut(path) {
                file.opened = file.opened.saturating_sub(1);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct MemTdb {
    inner: Arc<Inner>,
}

enum Storage {
    Shared(String),
    Internal(Records),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Open,
    /// A failed close released the context; only another close is accepted
    Released,
    Closed,
}

/// Context handed out by `MemTdb::open`.
///
/// Dropping a context that was never closed detaches it from its file, as
/// if it had been closed.
pub struct MemContext {
    id: u64,
    path: String,
    storage: Storage,
    writable: bool,
    lifecycle: Lifecycle,
    last_error: c_int,
    owner: Arc<Inner>,
}

impl Drop for MemContext {
    fn drop(&mut self) {
        if self.lifecycle == Lifecycle::Open {
            log::debug!("memtdb: context {} dropped while open", self.id);
            self.owner.detach(&self.storage);
        }
    }
}

impl MemContext {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn usable(&self) -> bool {
        self.lifecycle == Lifecycle::Open
    }
}

impl MemTdb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn calls(&self) -> CallCounts {
        let calls = &self.inner.calls;
        CallCounts {
            open: calls.open.load(Ordering::SeqCst),
            close: calls.close.load(Ordering::SeqCst),
            store: calls.store.load(Ordering::SeqCst),
            fetch: calls.fetch.load(Ordering::SeqCst),
        }
    }

    /// Fetched buffers that have not been released yet
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.inner.live_buffers.load(Ordering::SeqCst)
    }

    /// Number of live contexts on `path`
    #[must_use]
    pub fn open_contexts(&self, path: &str) -> usize {
        self.inner.files.lock().get(path).map_or(0, |f| f.opened)
    }

    #[must_use]
    pub fn file_exists(&self, path: &str) -> bool {
        self.inner.files.lock().contains_key(path)
    }

    /// Put a record into a file, creating the file if needed
    pub fn add_record(&self, path: &str, key: &[u8], value: &[u8]) {
        let mut files = self.inner.files.lock();
        files
            .entry(path.to_string())
            .or_default()
            .records
            .insert(key.to_vec(), value.to_vec());
    }

    #[must_use]
    pub fn get_record(&self, path: &str, key: &[u8]) -> Option<Vec<u8>> {
        let files = self.inner.files.lock();
        files.get(path).and_then(|f| f.records.get(key).cloned())
    }

    /// Make every `open` of `path` fail until `clear_failures`
    pub fn fail_open(&self, path: &str) {
        self.inner.failures.lock().open.insert(path.to_string());
    }

    /// Make every `close` of a context on `path` fail until `clear_failures`
    pub fn fail_close(&self, path: &str) {
        self.inner.failures.lock().close.insert(path.to_string());
    }

    /// Make every `close` of a context on `path` fail with `ERR_IO` after
    /// releasing the context. Until it is closed again, the context refuses
    /// everything with `ERR_EINVAL`; that second close succeeds.
    pub fn fail_close_releasing(&self, path: &str) {
        self.inner
            .failures
            .lock()
            .close_releasing
            .insert(path.to_string());
    }

    pub fn clear_failures(&self) {
        let mut failures = self.inner.failures.lock();
        failures.open.clear();
        failures.close.clear();
        failures.close_releasing.clear();
    }

    fn open_file(&self, name: &str, tdb_flags: c_int, open_flags: c_int) -> bool {
        let mut files = self.inner.files.lock();
        let exists = files.contains_key(name);
        if !exists && open_flags & O_CREAT == 0 {
            log::debug!("memtdb.open: {name:?} does not exist and O_CREAT is not set");
            return false;
        }
        if exists && open_flags & O_CREAT != 0 && open_flags & O_EXCL != 0 {
            log::debug!("memtdb.open: {name:?} exists and O_EXCL is set");
            return false;
        }
        let file = files.entry(name.to_string()).or_default();
        let first = file.opened == 0;
        if open_flags & O_TRUNC != 0 || (tdb_flags & CLEAR_IF_FIRST != 0 && first) {
            file.records.clear();
        }
        file.opened += 1;
        true
    }
}

fn fail(ctx: &mut MemContext, code: c_int) -> c_int {
    ctx.last_error = code;
    -1
}

fn wants_error(key: &[u8]) -> bool {
    key.contains(&(WANT_ERROR as u8))
}

impl TdbRuntime for MemTdb {
    type Context = MemContext;

    fn open(
        &self,
        name: &str,
        _hash_size: c_int,
        tdb_flags: c_int,
        open_flags: c_int,
        _mode: mode_t,
    ) -> Option<MemContext> {
        self.inner.calls.open.fetch_add(1, Ordering::SeqCst);

        if name.contains(WANT_ERROR) || self.inner.failures.lock().open.contains(name) {
            log::debug!("memtdb.open: injected failure for {name:?}");
            return None;
        }

        let storage = if tdb_flags & INTERNAL != 0 {
            Storage::Internal(Records::new())
        } else if self.open_file(name, tdb_flags, open_flags) {
            Storage::Shared(name.to_string())
        } else {
            return None;
        };

        Some(MemContext {
            id: self.inner.next_id.fetch_add(1, Ordering::SeqCst),
            path: name.to_string(),
            storage,
            writable: open_flags & O_ACCMODE != O_RDONLY,
            lifecycle: Lifecycle::Open,
            last_error: SUCCESS,
            owner: Arc::clone(&self.inner),
        })
    }

    fn close(&self, ctx: &mut MemContext) -> c_int {
        self.inner.calls.close.fetch_add(1, Ordering::SeqCst);

        match ctx.lifecycle {
            Lifecycle::Closed => {
                log::warn!("memtdb.close: context {} already closed", ctx.id);
                return fail(ctx, ERR_EINVAL);
            }
            Lifecycle::Released => {
                ctx.lifecycle = Lifecycle::Closed;
                ctx.last_error = SUCCESS;
                return 0;
            }
            Lifecycle::Open => {}
        }

        let (refuse, release) = {
            let failures = self.inner.failures.lock();
            (
                failures.close.contains(&ctx.path),
                failures.close_releasing.contains(&ctx.path),
            )
        };
        if refuse {
            return fail(ctx, ERR_IO);
        }
        self.inner.detach(&ctx.storage);
        if release {
            ctx.lifecycle = Lifecycle::Released;
            return fail(ctx, ERR_IO);
        }
        ctx.lifecycle = Lifecycle::Closed;
        ctx.last_error = SUCCESS;
        0
    }

    fn store(&self, ctx: &mut MemContext, key: Datum<'_>, dbuf: Datum<'_>, flag: c_int) -> c_int {
        self.inner.calls.store.fetch_add(1, Ordering::SeqCst);

        if !ctx.usable() {
            return fail(ctx, ERR_EINVAL);
        }
        if !ctx.writable {
            return fail(ctx, ERR_RDONLY);
        }
        let key = key.as_slice();
        if wants_error(key) {
            return fail(ctx, ERR_IO);
        }
        if !matches!(flag, REPLACE | INSERT | MODIFY) {
            return fail(ctx, ERR_EINVAL);
        }

        let code = {
            let mut files = self.inner.files.lock();
            let records = match &mut ctx.storage {
                Storage::Internal(records) => Some(records),
                Storage::Shared(path) => files.get_mut(path.as_str()).map(|f| &mut f.records),
            };
            match records {
                None => ERR_IO,
                Some(records) => {
                    let exists = records.contains_key(key);
                    if flag == INSERT && exists {
                        ERR_EXISTS
                    } else if flag == MODIFY && !exists {
                        ERR_NOEXIST
                    } else {
                        records.insert(key.to_vec(), dbuf.as_slice().to_vec());
                        SUCCESS
                    }
                }
            }
        };

        if code == SUCCESS {
            ctx.last_error = SUCCESS;
            0
        } else {
            fail(ctx, code)
        }
    }

    fn fetch(&self, ctx: &mut MemContext, key: Datum<'_>) -> Option<ForeignDatum> {
        self.inner.calls.fetch.fetch_add(1, Ordering::SeqCst);

        if !ctx.usable() {
            fail(ctx, ERR_EINVAL);
            return None;
        }
        let key = key.as_slice();
        if wants_error(key) {
            fail(ctx, ERR_IO);
            return None;
        }

        let value = match &ctx.storage {
            Storage::Internal(records) => records.get(key).cloned(),
            Storage::Shared(path) => {
                let files = self.inner.files.lock();
                files.get(path.as_str()).and_then(|f| f.records.get(key).cloned())
            }
        };
        let Some(value) = value else {
            fail(ctx, ERR_NOEXIST);
            return None;
        };
        ctx.last_error = SUCCESS;

        // Box<[u8]> gives a non-null pointer even for an empty value.
        let boxed = value.into_boxed_slice();
        let raw = TdbData {
            dsize: boxed.len(),
            dptr: Box::into_raw(boxed).cast::<u8>(),
        };
        let live = Arc::clone(&self.inner.live_buffers);
        live.fetch_add(1, Ordering::SeqCst);
        let release = move |raw: TdbData| {
            let slice = std::ptr::slice_from_raw_parts_mut(raw.dptr, raw.dsize);
            drop(unsafe { Box::from_raw(slice) });
            live.fetch_sub(1, Ordering::SeqCst);
        };
        unsafe { ForeignDatum::from_raw(raw, release) }
    }

    fn error(&self, ctx: &MemContext) -> c_int {
        ctx.last_error
    }

    fn errorstr(&self, ctx: &MemContext) -> String {
        consts::status_message(ctx.last_error).to_string()
    }
}
