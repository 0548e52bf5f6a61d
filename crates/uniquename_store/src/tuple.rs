//! Order-preserving tuple encoding for keys.
//!
//! Keys are built from a small set of typed elements. The encoding keeps the
//! byte order of packed tuples consistent with element order, so every key
//! under a common tuple prefix sorts into one contiguous range.
//!
//! ```text
//! Bytes   0x01 <escaped bytes> 0x00
//! String  0x02 <escaped utf-8> 0x00
//! Int     0x14                      (zero)
//!         0x14+n <n big-endian bytes>  (1 <= n <= 8)
//! ```
//!
//! Inside byte and string elements every `0x00` is written as `0x00 0xFF`.

use crate::error::{StoreError, StoreResult};
use std::fmt::Write;

const BYTES_CODE: u8 = 0x01;
const STRING_CODE: u8 = 0x02;
const INT_ZERO_CODE: u8 = 0x14;
const ESCAPE: u8 = 0xFF;

/// A single tuple element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    /// Raw byte string.
    Bytes(Vec<u8>),
    /// UTF-8 string.
    String(String),
    /// Unsigned integer.
    Int(u64),
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::String(value.to_string())
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Element::String(value)
    }
}

impl From<u64> for Element {
    fn from(value: u64) -> Self {
        Element::Int(value)
    }
}

impl From<Vec<u8>> for Element {
    fn from(value: Vec<u8>) -> Self {
        Element::Bytes(value)
    }
}

impl Element {
    /// Returns the string value, if this is a string element.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Element::String(s) => Some(s),
            _ => None,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Element::Bytes(bytes) => {
                out.push(BYTES_CODE);
                escape_into(bytes, out);
            }
            Element::String(s) => {
                out.push(STRING_CODE);
                escape_into(s.as_bytes(), out);
            }
            Element::Int(0) => out.push(INT_ZERO_CODE),
            Element::Int(n) => {
                let be = n.to_be_bytes();
                let skip = be.iter().take_while(|b| **b == 0).count();
                let len = be.len() - skip;
                // len is 1..=8
                out.push(INT_ZERO_CODE + len as u8);
                out.extend_from_slice(&be[skip..]);
            }
        }
    }
}

fn escape_into(bytes: &[u8], out: &mut Vec<u8>) {
    for &b in bytes {
        out.push(b);
        if b == 0x00 {
            out.push(ESCAPE);
        }
    }
    out.push(0x00);
}

/// Packs a tuple into bytes.
#[must_use]
pub fn pack(elements: &[Element]) -> Vec<u8> {
    let mut out = Vec::new();
    for element in elements {
        element.encode_into(&mut out);
    }
    out
}

/// Unpacks bytes produced by [`pack`].
///
/// # Errors
///
/// Returns [`StoreError::InvalidKey`] on an unknown type code, a missing
/// terminator, truncated integers, or invalid UTF-8.
pub fn unpack(bytes: &[u8]) -> StoreResult<Vec<Element>> {
    let mut elements = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let code = bytes[pos];
        pos += 1;
        match code {
            BYTES_CODE => {
                let (raw, next) = unescape(bytes, pos)?;
                elements.push(Element::Bytes(raw));
                pos = next;
            }
            STRING_CODE => {
                let (raw, next) = unescape(bytes, pos)?;
                let s = String::from_utf8(raw)
                    .map_err(|_| StoreError::invalid_key("string element is not UTF-8"))?;
                elements.push(Element::String(s));
                pos = next;
            }
            INT_ZERO_CODE => elements.push(Element::Int(0)),
            c if c > INT_ZERO_CODE && c <= INT_ZERO_CODE + 8 => {
                let len = usize::from(c - INT_ZERO_CODE);
                let end = pos + len;
                if end > bytes.len() {
                    return Err(StoreError::invalid_key("truncated integer element"));
                }
                let mut be = [0u8; 8];
                be[8 - len..].copy_from_slice(&bytes[pos..end]);
                elements.push(Element::Int(u64::from_be_bytes(be)));
                pos = end;
            }
            other => {
                return Err(StoreError::invalid_key(format!(
                    "unknown tuple type code 0x{other:02x}"
                )))
            }
        }
    }

    Ok(elements)
}

fn unescape(bytes: &[u8], mut pos: usize) -> StoreResult<(Vec<u8>, usize)> {
    let mut raw = Vec::new();
    while pos < bytes.len() {
        let b = bytes[pos];
        if b == 0x00 {
            if bytes.get(pos + 1) == Some(&ESCAPE) {
                raw.push(0x00);
                pos += 2;
                continue;
            }
            return Ok((raw, pos + 1));
        }
        raw.push(b);
        pos += 1;
    }
    Err(StoreError::invalid_key("unterminated byte or string element"))
}

/// Renders a key for logs and error messages.
///
/// Printable ASCII is kept, everything else is written as `\xNN`.
#[must_use]
pub fn printable(key: &[u8]) -> String {
    let mut out = String::with_capacity(key.len());
    for &b in key {
        if (0x20..0x7f).contains(&b) && b != b'\\' {
            out.push(char::from(b));
        } else {
            let _ = write!(out, "\\x{b:02x}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn string_element_layout() {
        let key = pack(&["nm".into(), "djmax".into()]);
        assert_eq!(key, b"\x02nm\x00\x02djmax\x00");
    }

    #[test]
    fn nul_bytes_are_escaped() {
        let key = pack(&[Element::Bytes(vec![0x00, 0x01])]);
        assert_eq!(key, vec![BYTES_CODE, 0x00, ESCAPE, 0x01, 0x00]);
        assert_eq!(unpack(&key).unwrap(), vec![Element::Bytes(vec![0x00, 0x01])]);
    }

    #[test]
    fn integers_use_shortest_encoding() {
        assert_eq!(pack(&[Element::Int(0)]), vec![0x14]);
        assert_eq!(pack(&[Element::Int(1)]), vec![0x15, 0x01]);
        assert_eq!(pack(&[Element::Int(256)]), vec![0x16, 0x01, 0x00]);
        assert_eq!(
            unpack(&pack(&[Element::Int(u64::MAX)])).unwrap(),
            vec![Element::Int(u64::MAX)]
        );
    }

    #[test]
    fn unpack_rejects_garbage() {
        assert!(matches!(
            unpack(&[0x7a]),
            Err(StoreError::InvalidKey { .. })
        ));
        assert!(unpack(&[STRING_CODE, b'a']).is_err());
        assert!(unpack(&[0x16, 0x01]).is_err());
    }

    #[test]
    fn printable_escapes_non_ascii() {
        assert_eq!(printable(b"\x02nm\x00"), "\\x02nm\\x00");
        assert_eq!(printable(b"a\\b"), "a\\x5cb");
    }

    proptest! {
        #[test]
        fn string_order_is_preserved(a in ".{0,12}", b in ".{0,12}") {
            let ka = pack(&[Element::from(a.as_str())]);
            let kb = pack(&[Element::from(b.as_str())]);
            prop_assert_eq!(a.as_bytes().cmp(b.as_bytes()), ka.cmp(&kb));
        }

        #[test]
        fn int_order_is_preserved(a in any::<u64>(), b in any::<u64>()) {
            let ka = pack(&[Element::Int(a)]);
            let kb = pack(&[Element::Int(b)]);
            prop_assert_eq!(a.cmp(&b), ka.cmp(&kb));
        }

        #[test]
        fn mixed_tuples_unpack(s in ".{0,8}", bytes in prop::collection::vec(any::<u8>(), 0..8), n in any::<u64>()) {
            let tuple = vec![Element::from(s), Element::Bytes(bytes), Element::Int(n)];
            prop_assert_eq!(unpack(&pack(&tuple)).unwrap(), tuple);
        }
    }
}
