use crate::consts::{mode_t, status_message, ERR_EINVAL, ERR_IO, SUCCESS};
use crate::datum::{Datum, ForeignDatum, TdbData};
use crate::runtime_trait::TdbRuntime;
use crate::tdb_ffi::{
    free, tdb_close, tdb_error, tdb_errorstr, tdb_fetch, tdb_open, tdb_store, TdbContext,
};
use std::ffi::{CStr, CString};
use std::os::raw::c_int;
use std::ptr::NonNull;

/// FFI-based implementation of `TdbRuntime`.
/// Uses the system libtdb.
pub struct FfiTdb;

impl FfiTdb {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for FfiTdb {
    fn default() -> Self {
        Self::new()
    }
}

/// Owned `TDB_CONTEXT *`.
///
/// `tdb_close` frees the context whatever it returns, so the pointer is
/// forgotten after the call. A failed close is remembered as `ERR_IO` for
/// `error`/`errorstr`; after that, store and fetch fail with `ERR_EINVAL`
/// without reaching libtdb, and the next close succeeds with nothing left
/// to free.
pub struct FfiContext {
    ptr: Option<NonNull<TdbContext>>,
    last_error: c_int,
}

// A context is used by one thread at a time; callers serialise access.
unsafe impl Send for FfiContext {}

impl Drop for FfiContext {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            unsafe { tdb_close(ptr.as_ptr()) };
        }
    }
}

impl TdbRuntime for FfiTdb {
    type Context = FfiContext;

    fn open(
        &self,
        name: &str,
        hash_size: c_int,
        tdb_flags: c_int,
        open_flags: c_int,
        mode: mode_t,
    ) -> Option<FfiContext> {
        let Ok(c_name) = CString::new(name) else {
            return None; // Invalid name (contains null byte)
        };
        let ptr = unsafe { tdb_open(c_name.as_ptr(), hash_size, tdb_flags, open_flags, mode) };
        NonNull::new(ptr).map(|ptr| FfiContext {
            ptr: Some(ptr),
            last_error: SUCCESS,
        })
    }

    fn close(&self, ctx: &mut FfiContext) -> c_int {
        let Some(ptr) = ctx.ptr.take() else {
            ctx.last_error = SUCCESS;
            return 0;
        };
        let rc = unsafe { tdb_close(ptr.as_ptr()) };
        ctx.last_error = if rc == 0 { SUCCESS } else { ERR_IO };
        rc
    }

    fn store(&self, ctx: &mut FfiContext, key: Datum<'_>, dbuf: Datum<'_>, flag: c_int) -> c_int {
        let Some(ptr) = ctx.ptr else {
            ctx.last_error = ERR_EINVAL;
            return -1;
        };
        unsafe { tdb_store(ptr.as_ptr(), key.as_raw(), dbuf.as_raw(), flag) }
    }

    fn fetch(&self, ctx: &mut FfiContext, key: Datum<'_>) -> Option<ForeignDatum> {
        let Some(ptr) = ctx.ptr else {
            ctx.last_error = ERR_EINVAL;
            return None;
        };
        let raw = unsafe { tdb_fetch(ptr.as_ptr(), key.as_raw()) };
        let release = |raw: TdbData| unsafe { free(raw.dptr.cast()) };
        unsafe { ForeignDatum::from_raw(raw, release) }
    }

    fn error(&self, ctx: &FfiContext) -> c_int {
        match ctx.ptr {
            Some(ptr) => unsafe { tdb_error(ptr.as_ptr()) },
            None => ctx.last_error,
        }
    }

    fn errorstr(&self, ctx: &FfiContext) -> String {
        let Some(ptr) = ctx.ptr else {
            return status_message(ctx.last_error).to_string();
        };
        let msg = unsafe { tdb_errorstr(ptr.as_ptr()) };
        if msg.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
    }
}
