//! Positional file reads.
//!
//! Uses `pread` (or `ReadFile` with an offset on Windows) so the file cursor is
//! never moved. A short read from the OS does not mean end-of-file, so reads
//! are retried until the buffer is full or the OS reports zero bytes.

use std::fs::File;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::source::PositionedSource;

#[cfg(unix)]
fn read_once(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_once(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

/// Fill `buf` from `offset`, stopping early only at end-of-file.
pub fn read_full_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match read_once(file, &mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl PositionedSource for File {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        read_full_at(self, buf, offset)
    }
}

impl PositionedSource for &File {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        read_full_at(self, buf, offset)
    }
}

/// Open a file for positioned reads and return it with its length.
pub fn open(path: &Path) -> io::Result<(File, u64)> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    debug!(path = %path.display(), len, "Opened file source");
    Ok((file, len))
}
