//! Owned string and byte-buffer values exchanged with embedders

use std::fmt;

/// Copy `src` into `dst` under the buffer law shared by [`WasmString`] and
/// [`Bytes`]: a short destination receives a truncated prefix with no
/// terminator, a long one is zero-padded. Returns the number of bytes copied.
fn copy_truncating(src: &[u8], dst: &mut [u8]) -> usize {
    dst.fill(0);
    let len = src.len().min(dst.len());
    dst[..len].copy_from_slice(&src[..len]);
    len
}

/// A UTF-8 name as passed across the embedding boundary
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct WasmString(String);

impl WasmString {
    pub fn new(s: impl Into<String>) -> Self {
        WasmString(s.into())
    }

    /// Build from raw bytes; invalid UTF-8 sequences are replaced
    pub fn from_bytes(bytes: &[u8]) -> Self {
        WasmString(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn copy_to(&self, buf: &mut [u8]) -> usize {
        copy_truncating(self.0.as_bytes(), buf)
    }
}

impl From<&str> for WasmString {
    fn from(s: &str) -> Self {
        WasmString::new(s)
    }
}

impl PartialEq<str> for WasmString {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl fmt::Debug for WasmString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for WasmString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An owned byte buffer
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Bytes(bytes.into())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn copy_to(&self, buf: &mut [u8]) -> usize {
        copy_truncating(&self.0, buf)
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes({})", hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(2, b"ab".to_vec(), 2)]
    #[case(5, b"abcde".to_vec(), 5)]
    #[case(8, b"abcde\0\0\0".to_vec(), 5)]
    #[case(0, vec![], 0)]
    fn string_copy_law(#[case] cap: usize, #[case] expected: Vec<u8>, #[case] copied: usize) {
        let s = WasmString::new("abcde");
        let mut buf = vec![0xffu8; cap];
        assert_eq!(s.copy_to(&mut buf), copied);
        assert_eq!(buf, expected);
    }

    #[test]
    fn bytes_copy_pads_and_truncates() {
        let bytes = Bytes::new(vec![1, 2, 3]);
        let mut short = [9u8; 2];
        assert_eq!(bytes.copy_to(&mut short), 2);
        assert_eq!(short, [1, 2]);
        let mut long = [9u8; 5];
        assert_eq!(bytes.copy_to(&mut long), 3);
        assert_eq!(long, [1, 2, 3, 0, 0]);
        assert_eq!(format!("{bytes:?}"), "Bytes(010203)");
    }

    #[test]
    fn lossy_utf8() {
        let s = WasmString::from_bytes(&[b'o', b'k', 0xff]);
        assert!(s.as_str().starts_with("ok"));
        assert!(WasmString::from("env") == *"env");
    }
}
