//! Shared, path-keyed access to TDB databases.
//!
//! A [`Registry`] hands out [`Handle`]s. All handles for the same path alias
//! one shared state: one engine context, one debug flag, one open/closed
//! status. Keys and values are bytes or text; zero-length keys and values are
//! legal.
//!
//! ```
//! use tdb_runtime_mocked::MemTdb;
//! use tdbshare::{Registry, StoreMode};
//!
//! let registry = Registry::new(MemTdb::new());
//! let db = registry.open_default("a.db").into_result().unwrap();
//! db.store("k", "v", StoreMode::Insert).unwrap();
//! assert_eq!(db.fetch("k").unwrap(), "v");
//! ```

pub mod codec;
pub mod config;
pub mod error;
mod handle;
mod ops;
mod registry;

pub use codec::Value;
pub use config::{ConfigError, OpenOptions, RegistryConfig};
pub use error::{Error, Status};
pub use handle::{Handle, Snapshot};
pub use ops::{Lookup, StoreMode};
pub use registry::{Opened, Registry};

pub use tdb_runtime::{consts, TdbRuntime};
#[cfg(feature = "libtdb")]
pub use tdb_runtime::FfiTdb;
