use std::cmp::Ordering;
use std::fmt;
use std::ops::RangeBounds;

use bytes::Bytes;

/// Immutable view over a byte range.
///
/// Backed by [`Bytes`], so cloning or sub-slicing shares the underlying
/// buffer instead of copying it. Keys and values handed out by cursors are
/// views into memtable storage.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Slice {
    data: Bytes,
}

impl Slice {
    pub fn new(data: Vec<u8>) -> Self {
        Slice {
            data: Bytes::from(data),
        }
    }

    /// Copy `data` into a new owned slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        Slice {
            data: Bytes::copy_from_slice(data),
        }
    }

    pub const fn from_static(data: &'static [u8]) -> Self {
        Slice {
            data: Bytes::from_static(data),
        }
    }

    pub const fn empty() -> Self {
        Slice { data: Bytes::new() }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn compare(&self, other: &Slice) -> Ordering {
        self.data.cmp(&other.data)
    }

    pub fn starts_with(&self, prefix: &Slice) -> bool {
        self.data.starts_with(&prefix.data)
    }

    /// Sub-view sharing the same buffer.
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Slice {
        Slice {
            data: self.data.slice(range),
        }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl From<Bytes> for Slice {
    fn from(data: Bytes) -> Self {
        Slice { data }
    }
}

impl From<Vec<u8>> for Slice {
    fn from(data: Vec<u8>) -> Self {
        Slice::new(data)
    }
}

impl From<&[u8]> for Slice {
    fn from(data: &[u8]) -> Self {
        Slice::from_bytes(data)
    }
}

impl<const N: usize> From<&[u8; N]> for Slice {
    fn from(data: &[u8; N]) -> Self {
        Slice::from_bytes(data)
    }
}

impl From<String> for Slice {
    fn from(s: String) -> Self {
        Slice::new(s.into_bytes())
    }
}

impl From<&str> for Slice {
    fn from(s: &str) -> Self {
        Slice::from_bytes(s.as_bytes())
    }
}

impl AsRef<[u8]> for Slice {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl PartialOrd for Slice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Slice {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.data) {
            Ok(s) => write!(f, "Slice(\"{s}\")"),
            Err(_) => write!(f, "Slice({:?})", self.data.as_ref()),
        }
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.data) {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "{:?}", self.data.as_ref()),
        }
    }
}
