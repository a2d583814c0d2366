//! Numeric constants shared with libtdb.
//!
//! Values are bit-for-bit those of `tdb.h` and `<fcntl.h>`/`<sys/stat.h>`
//! on Linux; they are passed to the engine unchanged.

use std::os::raw::{c_int, c_uint};

/// `mode_t` as seen by `tdb_open` on Linux.
#[allow(non_camel_case_types)]
pub type mode_t = c_uint;

// tdb_open() tdb_flags
pub const DEFAULT: c_int = 0;
pub const CLEAR_IF_FIRST: c_int = 0x1;
/// Don't store on disk.
pub const INTERNAL: c_int = 0x2;
pub const NOLOCK: c_int = 0x4;
pub const NOMMAP: c_int = 0x8;
pub const CONVERT: c_int = 0x10;
pub const BIGENDIAN: c_int = 0x20;
pub const NOSYNC: c_int = 0x40;
pub const SEQNUM: c_int = 0x80;
pub const VOLATILE: c_int = 0x100;
pub const ALLOW_NESTING: c_int = 0x200;
pub const DISALLOW_NESTING: c_int = 0x400;
pub const INCOMPATIBLE_HASH: c_int = 0x800;

// tdb_store() flags
pub const REPLACE: c_int = 0x1;
/// Don't overwrite an existing entry.
pub const INSERT: c_int = 0x2;
/// Don't create a missing entry.
pub const MODIFY: c_int = 0x3;

// enum TDB_ERROR
pub const SUCCESS: c_int = 0;
pub const ERR_CORRUPT: c_int = 0x1;
pub const ERR_IO: c_int = 0x2;
pub const ERR_LOCK: c_int = 0x3;
pub const ERR_OOM: c_int = 0x4;
pub const ERR_EXISTS: c_int = 0x5;
pub const ERR_NOLOCK: c_int = 0x6;
pub const ERR_LOCK_TIMEOUT: c_int = 0x7;
pub const ERR_NOEXIST: c_int = 0x8;
pub const ERR_EINVAL: c_int = 0x9;
pub const ERR_RDONLY: c_int = 0xa;
pub const ERR_NESTING: c_int = 0xb;

// enum tdb_debug_level
pub const DEBUG_FATAL: c_int = 0;
pub const DEBUG_ERROR: c_int = 0x1;
pub const DEBUG_WARNING: c_int = 0x2;
pub const DEBUG_TRACE: c_int = 0x3;

// open(2) flags. O_WRONLY is not accepted by tdb_open.
pub const O_RDONLY: c_int = 0;
pub const O_RDWR: c_int = 0x2;
pub const O_CREAT: c_int = 0x40;
pub const O_TRUNC: c_int = 0x200;
pub const O_APPEND: c_int = 0x400;
pub const O_CLOEXEC: c_int = 0x80000;
pub const O_EXCL: c_int = 0x80;
pub const O_NOFOLLOW: c_int = 0x20000;
pub const O_NONBLOCK: c_int = 0x800;
pub const O_NDELAY: c_int = 0x800;
/// Mask selecting the access mode bits of the open flags.
pub const O_ACCMODE: c_int = 0x3;

// mode_t permission bits
/// `S_IRUSR | S_IWUSR`
pub const USR_RW: mode_t = 0x180;
pub const USR_RWX: mode_t = 0x1c0;
pub const USR_R: mode_t = 0x100;
pub const USR_W: mode_t = 0x80;
pub const USR_X: mode_t = 0x40;
pub const GRP_RWX: mode_t = 0x38;
pub const GRP_R: mode_t = 0x20;
pub const GRP_W: mode_t = 0x10;
pub const GRP_X: mode_t = 0x8;
pub const OTH_RWX: mode_t = 0x7;
pub const OTH_R: mode_t = 0x4;
pub const OTH_W: mode_t = 0x2;
pub const OTH_X: mode_t = 0x1;

/// Message for an error code, as `tdb_errorstr` words it.
#[must_use]
#[allow(clippy::match_same_arms)]
pub fn status_message(code: c_int) -> &'static str {
    match code {
        SUCCESS => "Success",
        ERR_CORRUPT => "Corrupt database",
        ERR_IO => "IO Error",
        ERR_LOCK => "Locking error",
        ERR_OOM => "Out of memory",
        ERR_EXISTS => "Record exists",
        ERR_NOLOCK => "Lock exists on other keys",
        ERR_LOCK_TIMEOUT => "Lock timeout",
        ERR_NOEXIST => "Record does not exist",
        ERR_EINVAL => "Invalid parameter",
        ERR_RDONLY => "write not permitted",
        ERR_NESTING => "Transaction already started",
        _ => "Invalid error code",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_shortcuts_compose() {
        assert_eq!(USR_RW, USR_R | USR_W);
        assert_eq!(USR_RWX, USR_R | USR_W | USR_X);
        assert_eq!(GRP_RWX, GRP_R | GRP_W | GRP_X);
        assert_eq!(OTH_RWX, OTH_R | OTH_W | OTH_X);
        assert_eq!(USR_RW | GRP_R | OTH_R, 0o644);
    }

    #[test]
    fn test_access_mode_mask() {
        assert_eq!(O_RDONLY & O_ACCMODE, O_RDONLY);
        assert_eq!((O_RDWR | O_CREAT | O_TRUNC) & O_ACCMODE, O_RDWR);
        assert_eq!(O_NDELAY, O_NONBLOCK);
    }

    #[test]
    fn test_status_message() {
        assert_eq!(status_message(ERR_EXISTS), "Record exists");
        assert_eq!(status_message(ERR_NOEXIST), "Record does not exist");
        assert_eq!(status_message(-1), "Invalid error code");
    }
}
