use crate::consts::mode_t;
use crate::datum::{Datum, ForeignDatum};
use std::os::raw::c_int;

/// Trait for the TDB engine operations.
/// Provides an abstraction layer over the foreign `tdb_*` functions.
/// This allows for both the FFI-based implementation (libtdb) and native Rust
/// implementations (testing, CLI without libtdb).
pub trait TdbRuntime: Send + Sync {
    /// Opaque per-open engine context (`TDB_CONTEXT *`)
    type Context: Send;

    /// Open a database; `None` when the engine refuses
    fn open(
        &self,
        name: &str,
        hash_size: c_int,
        tdb_flags: c_int,
        open_flags: c_int,
        mode: mode_t,
    ) -> Option<Self::Context>;

    /// Close a context. Zero on success.
    fn close(&self, ctx: &mut Self::Context) -> c_int;

    /// Store a record; `flag` is one of `REPLACE`, `INSERT`, `MODIFY`. Zero on success.
    fn store(&self, ctx: &mut Self::Context, key: Datum<'_>, dbuf: Datum<'_>, flag: c_int) -> c_int;

    /// Fetch a record; `None` when the engine returns a null pointer
    fn fetch(&self, ctx: &mut Self::Context, key: Datum<'_>) -> Option<ForeignDatum>;

    /// Code of the last error on this context
    fn error(&self, ctx: &Self::Context) -> c_int;

    /// Message of the last error on this context
    fn errorstr(&self, ctx: &Self::Context) -> String;
}
