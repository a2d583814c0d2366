//! Foreign surface of the TDB engine.
//!
//! - `consts`: flag, mode and status values shared with libtdb
//! - `TdbRuntime`: the engine operations the binding layer relies on
//! - `Datum` / `ForeignDatum`: buffers going in and coming out
//! - `FfiTdb` (feature `libtdb`): the implementation over the system library

pub mod consts;
mod datum;
#[cfg(feature = "libtdb")]
mod ffi_runtime;
mod runtime_trait;
#[cfg(feature = "libtdb")]
mod tdb_ffi;

pub use datum::{Datum, ForeignDatum, TdbData};
#[cfg(feature = "libtdb")]
pub use ffi_runtime::{FfiContext, FfiTdb};
pub use runtime_trait::TdbRuntime;
