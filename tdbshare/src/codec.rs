//! Value codec
//!
//! Converts application values to the `Datum` buffers the engine takes and
//! engine-owned `ForeignDatum` buffers back to bytes or text. A zero-length
//! value is a valid buffer (null pointer, length 0), not an error.
//!
//! Decoding takes the `ForeignDatum` by value: the engine's memory is
//! released when the decode call returns, on the error path included.

use crate::error::Error;
use tdb_runtime::{Datum, ForeignDatum};

/// An application value offered to the store.
///
/// Only `Bytes` and `Text` can be encoded; the other kinds exist so that
/// callers holding dynamically typed data get `EncodingUnsupported` rather
/// than a silent conversion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Bytes(&'a [u8]),
    Text(&'a str),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Value<'_> {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Null => "null",
        }
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(v: &'a [u8]) -> Self {
        Value::Bytes(v)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Value<'a> {
    fn from(v: &'a [u8; N]) -> Self {
        Value::Bytes(v)
    }
}

impl<'a> From<&'a Vec<u8>> for Value<'a> {
    fn from(v: &'a Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::Text(v)
    }
}

impl<'a> From<&'a String> for Value<'a> {
    fn from(v: &'a String) -> Self {
        Value::Text(v)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value<'_> {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<()> for Value<'_> {
    fn from((): ()) -> Self {
        Value::Null
    }
}

/// Encode a value into a buffer borrowing the value's bytes.
///
/// # Errors
///
/// `EncodingUnsupported` for anything but bytes and text.
pub fn encode<'a>(value: &Value<'a>) -> Result<Datum<'a>, Error> {
    match *value {
        Value::Bytes(bytes) => Ok(Datum::from_slice(bytes)),
        Value::Text(text) => Ok(Datum::from_slice(text.as_bytes())),
        other => Err(Error::EncodingUnsupported { kind: other.kind() }),
    }
}

/// Copy an engine buffer out and release it.
///
/// An absent buffer and an empty one both give an empty vector.
#[must_use]
pub fn decode_bytes(datum: Option<ForeignDatum>) -> Vec<u8> {
    datum.map(|d| d.to_vec()).unwrap_or_default()
}

/// Decode an engine buffer as text and release it.
///
/// An absent buffer decodes to the empty string, exactly like a stored empty
/// value; callers cannot tell them apart from the text alone.
///
/// # Errors
///
/// `InvalidUtf8` when the bytes are not UTF-8. The buffer is released anyway.
pub fn decode(datum: Option<ForeignDatum>) -> Result<String, Error> {
    Ok(String::from_utf8(decode_bytes(datum))?)
}
