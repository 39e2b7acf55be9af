//! Positioned byte sources.
//!
//! A positioned source is the slow thing the cache sits in front of. It is
//! addressed by explicit offset, never by a stream cursor.
//!
//! - [`file`]: `pread`-style reads from a local file
//! - [`memory`]: in-memory content, mostly for tests and benchmarks

pub mod file;
pub mod memory;

use std::io;

pub use memory::MemorySource;

/// A random-access byte source.
///
/// `read_at` fills `buf` with content starting at `offset`. It must fill the
/// whole buffer unless the content ends first: a returned count smaller than
/// `buf.len()` means end-of-stream. Errors are opaque to the cache and are
/// handed back to the caller unchanged.
///
/// The receiver is `&mut self` because the cache serializes every source call
/// under its exclusive lock, so implementations need no internal locking.
pub trait PositionedSource: Send {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

impl<S: PositionedSource + ?Sized> PositionedSource for &mut S {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

impl<S: PositionedSource + ?Sized> PositionedSource for Box<S> {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

/// Copy `content[offset..]` into `buf`, returning the number of bytes copied.
pub(crate) fn copy_from_slice_at(content: &[u8], buf: &mut [u8], offset: u64) -> usize {
    let Ok(start) = usize::try_from(offset) else {
        return 0;
    };
    if start >= content.len() {
        return 0;
    }
    let n = buf.len().min(content.len() - start);
    buf[..n].copy_from_slice(&content[start..start + n]);
    n
}
