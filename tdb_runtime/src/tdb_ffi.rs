use crate::consts::mode_t;
use crate::datum::TdbData;
use std::os::raw::{c_char, c_int, c_void};

/// `struct tdb_context`, only ever used behind a pointer
#[repr(C)]
pub struct TdbContext {
    _private: [u8; 0],
}

#[link(name = "tdb")]
extern "C" {
    pub fn tdb_open(
        name: *const c_char,
        hash_size: c_int,
        tdb_flags: c_int,
        open_flags: c_int,
        mode: mode_t,
    ) -> *mut TdbContext;
    pub fn tdb_close(tdb: *mut TdbContext) -> c_int;
    pub fn tdb_store(tdb: *mut TdbContext, key: TdbData, dbuf: TdbData, flag: c_int) -> c_int;
    pub fn tdb_fetch(tdb: *mut TdbContext, key: TdbData) -> TdbData;
    pub fn tdb_error(tdb: *mut TdbContext) -> c_int;
    pub fn tdb_errorstr(tdb: *mut TdbContext) -> *const c_char;
}

extern "C" {
    /// Releases `tdb_fetch` results, which libtdb allocates with `malloc`
    pub fn free(ptr: *mut c_void);
}
