//! Buffers crossing the engine boundary.
//!
//! - `TdbData` is the C `TDB_DATA` pair, passed by value.
//! - `Datum` borrows caller memory for the duration of a call (keys, values).
//! - `ForeignDatum` owns memory the engine allocated (fetch results) and
//!   releases it when dropped.

use std::fmt;
use std::marker::PhantomData;

/// `TDB_DATA`: pointer-or-null plus length
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TdbData {
    pub dptr: *mut u8,
    pub dsize: usize,
}

impl TdbData {
    /// The null datum: no pointer, zero length
    #[must_use]
    pub const fn null() -> Self {
        Self {
            dptr: std::ptr::null_mut(),
            dsize: 0,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.dptr.is_null()
    }
}

/// A key or value borrowed from the caller.
///
/// A zero-length datum carries a null pointer. The engine reads through the
/// pointer but never writes, so handing out `*mut` is fine.
#[derive(Clone, Copy)]
pub struct Datum<'a> {
    raw: TdbData,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> Datum<'a> {
    #[must_use]
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        let raw = if bytes.is_empty() {
            TdbData::null()
        } else {
            TdbData {
                dptr: bytes.as_ptr().cast_mut(),
                dsize: bytes.len(),
            }
        };
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.dsize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.dsize == 0
    }

    #[must_use]
    pub fn as_slice(&self) -> &'a [u8] {
        if self.raw.is_null() {
            return &[];
        }
        // Built from a `&'a [u8]` of exactly this length.
        unsafe { std::slice::from_raw_parts(self.raw.dptr, self.raw.dsize) }
    }

    /// The raw pair to pass across the FFI boundary
    #[must_use]
    pub fn as_raw(&self) -> TdbData {
        self.raw
    }
}

impl fmt::Debug for Datum<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Datum(len={}, null={})", self.raw.dsize, self.raw.is_null())
    }
}

type Release = Box<dyn FnOnce(TdbData)>;

/// Engine-allocated buffer, released exactly once on drop.
///
/// A `ForeignDatum` never holds a null pointer: a null fetch result is
/// represented by the absence of a `ForeignDatum`. The pointer may be
/// non-null with zero length, which is a stored empty value.
pub struct ForeignDatum {
    raw: TdbData,
    release: Option<Release>,
}

impl ForeignDatum {
    /// Take ownership of an engine buffer.
    ///
    /// Returns `None` for a null pointer; `release` is not called then.
    ///
    /// # Safety
    ///
    /// `raw.dptr` must be valid for reads of `raw.dsize` bytes until
    /// `release` runs, and nobody else may free it.
    pub unsafe fn from_raw(raw: TdbData, release: impl FnOnce(TdbData) + 'static) -> Option<Self> {
        if raw.is_null() {
            return None;
        }
        Some(Self {
            raw,
            release: Some(Box::new(release)),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.dsize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.dsize == 0
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        // Non-null and valid for `dsize` bytes per `from_raw`.
        unsafe { std::slice::from_raw_parts(self.raw.dptr, self.raw.dsize) }
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Drop for ForeignDatum {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.raw);
        }
    }
}

impl fmt::Debug for ForeignDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForeignDatum(len={})", self.raw.dsize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_empty_slice_is_null_datum() {
        let datum = Datum::from_slice(b"");
        assert!(datum.is_empty());
        assert!(datum.as_raw().is_null());
        assert_eq!(datum.as_slice(), b"");
    }

    #[test]
    fn test_datum_points_at_caller_bytes() {
        let bytes = b"hello".to_vec();
        let datum = Datum::from_slice(&bytes);
        assert_eq!(datum.len(), 5);
        assert_eq!(datum.as_raw().dptr.cast_const(), bytes.as_ptr());
        assert_eq!(datum.as_slice(), b"hello");
    }

    #[test]
    fn test_foreign_null_is_absent() {
        let released = Rc::new(Cell::new(0));
        let counter = Rc::clone(&released);
        let datum = unsafe { ForeignDatum::from_raw(TdbData::null(), move |_| counter.set(counter.get() + 1)) };
        assert!(datum.is_none());
        assert_eq!(released.get(), 0);
    }

    #[test]
    fn test_foreign_released_once_on_drop() {
        let released = Rc::new(Cell::new(0));
        let counter = Rc::clone(&released);

        let boxed: Box<[u8]> = b"abc".to_vec().into_boxed_slice();
        let dsize = boxed.len();
        let dptr = Box::into_raw(boxed).cast::<u8>();
        let raw = TdbData { dptr, dsize };

        let datum = unsafe {
            ForeignDatum::from_raw(raw, move |raw| {
                drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(raw.dptr, raw.dsize)));
                counter.set(counter.get() + 1);
            })
        }
        .unwrap();

        assert_eq!(datum.as_slice(), b"abc");
        assert_eq!(released.get(), 0);
        drop(datum);
        assert_eq!(released.get(), 1);
    }
}
