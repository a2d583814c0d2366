//! Store and fetch on a handle

use crate::codec::{self, Value};
use crate::error::Error;
use crate::handle::Handle;
use std::os::raw::c_int;
use tdb_runtime::consts::{self, ERR_NOEXIST, SUCCESS};
use tdb_runtime::{ForeignDatum, TdbRuntime};
use tracing::trace;

/// How `store` treats an existing key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreMode {
    /// Fail with `Exists` if the key is present
    Insert,
    /// Fail with `NoExist` if the key is absent
    Modify,
    /// Unconditional
    #[default]
    Replace,
}

impl StoreMode {
    #[must_use]
    pub fn flag(self) -> c_int {
        match self {
            StoreMode::Insert => consts::INSERT,
            StoreMode::Modify => consts::MODIFY,
            StoreMode::Replace => consts::REPLACE,
        }
    }
}

/// Outcome of `Handle::lookup`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(Vec<u8>),
    NotFound,
}

impl<R: TdbRuntime> Handle<R> {
    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// - `EncodingUnsupported` if key or value is not bytes or text; checked
    ///   before anything else.
    /// - `AlreadyClosed` if the handle is closed. The engine is not called.
    /// - The engine status otherwise: `Exists` for `Insert` on a present
    ///   key, `NoExist` for `Modify` on an absent one, and so on.
    pub fn store<'k, 'v>(
        &self,
        key: impl Into<Value<'k>>,
        value: impl Into<Value<'v>>,
        mode: StoreMode,
    ) -> Result<(), Error> {
        let key = codec::encode(&key.into())?;
        let value = codec::encode(&value.into())?;
        self.with_context("store", |runtime, ctx| {
            trace!(path = self.path(), key_len = key.len(), value_len = value.len(), ?mode, "tdb_store");
            let rc = runtime.store(ctx, key, value, mode.flag());
            Self::check(runtime, ctx, rc)
        })
    }

    /// Fetch the value stored under `key` as text.
    ///
    /// A stored empty value comes back as `""`.
    ///
    /// # Errors
    ///
    /// - `NotFoundOrIoFailure` when the engine returns no buffer. A missing
    ///   key and an engine failure are not told apart here; use `lookup`
    ///   for that.
    /// - `InvalidUtf8` when the value is not text; `fetch_bytes` returns
    ///   it unchanged.
    /// - `EncodingUnsupported`, `AlreadyClosed` as for `store`.
    pub fn fetch<'k>(&self, key: impl Into<Value<'k>>) -> Result<String, Error> {
        let datum = self.fetch_datum("fetch", key.into())?;
        codec::decode(Some(datum))
    }

    /// Like `fetch`, without text decoding.
    ///
    /// # Errors
    /// See `fetch`.
    pub fn fetch_bytes<'k>(&self, key: impl Into<Value<'k>>) -> Result<Vec<u8>, Error> {
        let datum = self.fetch_datum("fetch_bytes", key.into())?;
        Ok(codec::decode_bytes(Some(datum)))
    }

    /// Fetch with a missing key reported as `Lookup::NotFound` instead of
    /// an error.
    ///
    /// After a null fetch the context's last error decides: `NoExist` is
    /// `NotFound`, any other code is an error, and no code at all gives
    /// `NotFoundOrIoFailure`.
    ///
    /// # Errors
    /// Engine failures, plus the encoding and closed-handle errors of `fetch`.
    pub fn lookup<'k>(&self, key: impl Into<Value<'k>>) -> Result<Lookup, Error> {
        let key = codec::encode(&key.into())?;
        self.with_context("lookup", |runtime, ctx| {
            trace!(path = self.path(), key_len = key.len(), "tdb_fetch");
            if let Some(datum) = runtime.fetch(ctx, key) {
                return Ok(Lookup::Found(datum.to_vec()));
            }
            match runtime.error(ctx) {
                ERR_NOEXIST => Ok(Lookup::NotFound),
                SUCCESS => Err(Error::NotFoundOrIoFailure),
                code => Err(Error::from_code(code, || runtime.errorstr(ctx))),
            }
        })
    }

    fn fetch_datum(&self, op: &'static str, key: Value<'_>) -> Result<ForeignDatum, Error> {
        let key = codec::encode(&key)?;
        self.with_context(op, |runtime, ctx| {
            trace!(path = self.path(), key_len = key.len(), "tdb_fetch");
            runtime.fetch(ctx, key).ok_or(Error::NotFoundOrIoFailure)
        })
    }
}
