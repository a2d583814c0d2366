pub mod memtdb;

pub use memtdb::{CallCounts, MemContext, MemTdb, WANT_ERROR};
