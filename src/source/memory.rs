//! In-memory positioned sources.

use std::io;

use bytes::Bytes;

use crate::source::{copy_from_slice_at, PositionedSource};

/// Content held in memory.
///
/// Cloning is cheap: the bytes are reference counted.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    content: Bytes,
}

impl MemorySource {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn from_static(content: &'static [u8]) -> Self {
        Self {
            content: Bytes::from_static(content),
        }
    }

    /// Total content length in bytes.
    pub fn len(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

impl PositionedSource for MemorySource {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(copy_from_slice_at(&self.content, buf, offset))
    }
}

impl PositionedSource for &[u8] {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(copy_from_slice_at(self, buf, offset))
    }
}

impl PositionedSource for Vec<u8> {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        Ok(copy_from_slice_at(self, buf, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_short_read_at_end() {
        let mut source = MemorySource::new("0123456".as_bytes().to_vec());
        assert_eq!(source.len(), 7);

        let mut buf = [0u8; 4];
        assert_eq!(source.read_at(&mut buf, 4).unwrap(), 3);
        assert_eq!(&buf[..3], b"456");
        assert_eq!(source.read_at(&mut buf, 7).unwrap(), 0);
    }

    #[test]
    fn test_slice_and_vec_sources() {
        let mut slice: &[u8] = b"hello";
        let mut buf = [0u8; 2];
        assert_eq!(slice.read_at(&mut buf, 3).unwrap(), 2);
        assert_eq!(&buf, b"lo");

        let mut vec = b"world".to_vec();
        assert_eq!(vec.read_at(&mut buf, 0).unwrap(), 2);
        assert_eq!(&buf, b"wo");
    }
}
