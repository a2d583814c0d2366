//! Error taxonomy and the status reporter
//!
//! "No error" is always `Ok(..)`; there is no error value standing for success.

use std::fmt;
use std::os::raw::c_int;
use std::string::FromUtf8Error;
use tdb_runtime::consts;

/// Engine status codes (`enum TDB_ERROR`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Corrupt,
    Io,
    Lock,
    Oom,
    Exists,
    NoLock,
    LockTimeout,
    NoExist,
    Einval,
    RdOnly,
    Nesting,
}

impl Status {
    pub const ALL: [Status; 12] = [
        Status::Success,
        Status::Corrupt,
        Status::Io,
        Status::Lock,
        Status::Oom,
        Status::Exists,
        Status::NoLock,
        Status::LockTimeout,
        Status::NoExist,
        Status::Einval,
        Status::RdOnly,
        Status::Nesting,
    ];

    #[must_use]
    pub fn from_code(code: c_int) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    #[must_use]
    pub fn code(self) -> c_int {
        match self {
            Status::Success => consts::SUCCESS,
            Status::Corrupt => consts::ERR_CORRUPT,
            Status::Io => consts::ERR_IO,
            Status::Lock => consts::ERR_LOCK,
            Status::Oom => consts::ERR_OOM,
            Status::Exists => consts::ERR_EXISTS,
            Status::NoLock => consts::ERR_NOLOCK,
            Status::LockTimeout => consts::ERR_LOCK_TIMEOUT,
            Status::NoExist => consts::ERR_NOEXIST,
            Status::Einval => consts::ERR_EINVAL,
            Status::RdOnly => consts::ERR_RDONLY,
            Status::Nesting => consts::ERR_NESTING,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Status::Success => "SUCCESS",
            Status::Corrupt => "ERR_CORRUPT",
            Status::Io => "ERR_IO",
            Status::Lock => "ERR_LOCK",
            Status::Oom => "ERR_OOM",
            Status::Exists => "ERR_EXISTS",
            Status::NoLock => "ERR_NOLOCK",
            Status::LockTimeout => "ERR_LOCK_TIMEOUT",
            Status::NoExist => "ERR_NOEXIST",
            Status::Einval => "ERR_EINVAL",
            Status::RdOnly => "ERR_RDONLY",
            Status::Nesting => "ERR_NESTING",
        }
    }

    /// The engine's own wording for this status
    #[must_use]
    pub fn message(self) -> &'static str {
        consts::status_message(self.code())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors surfaced by the binding layer
#[derive(Debug)]
pub enum Error {
    /// The engine refused to open the path
    EngineUnavailable { path: String },
    /// The handle's state is closed; the engine was not called
    AlreadyClosed { path: String },
    /// Only bytes and text can cross the boundary
    EncodingUnsupported { kind: &'static str },
    /// The engine returned no buffer: missing key and I/O failure look the same
    NotFoundOrIoFailure,
    /// Non-zero engine status with a known code
    Status { status: Status, message: String },
    /// Non-zero engine status with a code outside `enum TDB_ERROR`
    UnknownStatus { code: c_int },
    /// Fetched value is not text
    InvalidUtf8(FromUtf8Error),
}

impl Error {
    /// Engine status this error corresponds to, if any
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::NotFoundOrIoFailure => Some(Status::Einval),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_already_closed(&self) -> bool {
        matches!(self, Self::AlreadyClosed { .. })
    }

    /// Error for a non-zero engine status code
    pub fn from_code(code: c_int, message: impl FnOnce() -> String) -> Self {
        match Status::from_code(code) {
            Some(status) => Self::Status {
                status,
                message: message(),
            },
            None => Self::UnknownStatus { code },
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EngineUnavailable { path } => write!(f, "cannot open database {path:?}"),
            Self::AlreadyClosed { path } => write!(f, "database {path:?} is closed"),
            Self::EncodingUnsupported { kind } => {
                write!(f, "cannot encode {kind} value, expected bytes or text")
            }
            Self::NotFoundOrIoFailure => write!(f, "record not found or I/O failure"),
            Self::Status { status, message } => write!(f, "{status}: {message}"),
            Self::UnknownStatus { code } => write!(f, "unknown engine status {code}"),
            Self::InvalidUtf8(e) => write!(f, "value is not valid UTF-8: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidUtf8(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FromUtf8Error> for Error {
    fn from(e: FromUtf8Error) -> Self {
        Self::InvalidUtf8(e)
    }
}

/// Map an engine return value to a result.
///
/// `rc` is what the call returned; `last_error` is the context's error code
/// afterwards (`tdb_error`). libtdb returns -1 and records the reason on the
/// context, so the recorded code wins when it is set.
///
/// # Errors
///
/// Any non-zero `rc`.
pub fn report(rc: c_int, last_error: c_int, message: impl FnOnce() -> String) -> Result<(), Error> {
    if rc == 0 {
        return Ok(());
    }
    let code = if last_error != consts::SUCCESS {
        last_error
    } else {
        rc
    };
    Err(Error::from_code(code, message))
}
