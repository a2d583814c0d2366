//! Open parameters and registry configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;
use std::os::raw::c_int;
use tdb_runtime::consts::{self, mode_t};

/// Parameters passed through to the engine when a path is opened.
///
/// Only the first successful open of a path uses them; later opens return
/// the existing handle unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenOptions {
    pub hash_size: c_int,
    pub tdb_flags: c_int,
    pub open_flags: c_int,
    pub mode: mode_t,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            hash_size: 0,
            tdb_flags: consts::DEFAULT,
            open_flags: consts::O_RDWR | consts::O_CREAT,
            mode: consts::USR_RW,
        }
    }
}

impl OpenOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn hash_size(mut self, hash_size: c_int) -> Self {
        self.hash_size = hash_size;
        self
    }

    #[must_use]
    pub fn tdb_flags(mut self, tdb_flags: c_int) -> Self {
        self.tdb_flags = tdb_flags;
        self
    }

    #[must_use]
    pub fn open_flags(mut self, open_flags: c_int) -> Self {
        self.open_flags = open_flags;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: mode_t) -> Self {
        self.mode = mode;
        self
    }

    /// Read-only access, no creation
    #[must_use]
    pub fn read_only(self) -> Self {
        self.open_flags(consts::O_RDONLY)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Used by `Registry::open_default`
    pub defaults: OpenOptions,
    /// Initial debug flag of newly created handles
    pub debug: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read configuration: {e}"),
            Self::Json(e) => write!(f, "invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl RegistryConfig {
    /// # Errors
    /// I/O errors from the reader, or malformed JSON.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, ConfigError> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        Self::from_json_str(&buf)
    }

    /// # Errors
    /// Malformed JSON or fields of the wrong type.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }
}
