//! Random-access byte source used by every codec.
//!
//! Codecs read through [`ImageSource`], which is any `Read + Seek`. Files,
//! `Cursor<Vec<u8>>` and `BufReader<File>` all qualify.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{IoError, IoResult};

/// Seekable byte source for decoding.
pub trait ImageSource: Read + Seek {
    /// Total size in bytes. Keeps the current position.
    fn size(&mut self) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let end = self.seek(SeekFrom::End(0))?;
        if pos != end {
            self.seek(SeekFrom::Start(pos))?;
        }
        Ok(end)
    }

    /// True when the position is at or past the end.
    fn eof(&mut self) -> io::Result<bool> {
        let pos = self.stream_position()?;
        Ok(pos >= self.size()?)
    }

    /// Moves back to the first byte.
    fn rewind_to_start(&mut self) -> io::Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }
}

impl<T: Read + Seek> ImageSource for T {}

/// Opens `path` for buffered reading.
///
/// A missing file is reported as [`IoError::FileNotFound`].
pub fn open(path: &Path) -> IoResult<BufReader<File>> {
    match File::open(path) {
        Ok(file) => Ok(BufReader::new(file)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(IoError::FileNotFound(path.to_path_buf()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Reads up to `len` bytes from the start of `src`, then seeks back to 0.
///
/// Short sources yield a short buffer; this never fails on EOF.
pub fn peek_header(src: &mut dyn ImageSource, len: usize) -> IoResult<Vec<u8>> {
    src.rewind_to_start()?;
    let mut header = Vec::with_capacity(len);
    Read::take(&mut *src, len as u64).read_to_end(&mut header)?;
    src.rewind_to_start()?;
    Ok(header)
}

/// Bytes between the current position and the end. Keeps the position.
pub(crate) fn remaining_len<R: Seek + ?Sized>(src: &mut R) -> io::Result<u64> {
    let pos = src.stream_position()?;
    let end = src.seek(SeekFrom::End(0))?;
    src.seek(SeekFrom::Start(pos))?;
    Ok(end.saturating_sub(pos))
}

/// Fills `buf` completely or reports a short read as [`IoError::ReadFailed`].
pub(crate) fn read_exact_or_fail(
    src: &mut dyn ImageSource,
    buf: &mut [u8],
    what: &str,
) -> IoResult<()> {
    src.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            IoError::ReadFailed(format!("{what}: expected {} bytes", buf.len()))
        }
        _ => IoError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn size_keeps_position() {
        let mut src = Cursor::new(vec![0u8; 10]);
        src.seek(SeekFrom::Start(3)).unwrap();
        assert_eq!(src.size().unwrap(), 10);
        assert_eq!(src.stream_position().unwrap(), 3);
        assert!(!src.eof().unwrap());
        src.seek(SeekFrom::End(0)).unwrap();
        assert!(src.eof().unwrap());
    }

    #[test]
    fn remaining_from_position() {
        let mut src = Cursor::new(vec![0u8; 10]);
        src.seek(SeekFrom::Start(4)).unwrap();
        assert_eq!(remaining_len(&mut src).unwrap(), 6);
        assert_eq!(src.stream_position().unwrap(), 4);
    }

    #[test]
    fn peek_rewinds() {
        let mut src = Cursor::new(b"DDS data".to_vec());
        let header = peek_header(&mut src, 4).unwrap();
        assert_eq!(header, b"DDS ");
        assert_eq!(src.stream_position().unwrap(), 0);

        let short = peek_header(&mut src, 64).unwrap();
        assert_eq!(short.len(), 8);
    }

    #[test]
    fn short_read_is_read_failed() {
        let mut src = Cursor::new(vec![1u8, 2]);
        let mut buf = [0u8; 4];
        let err = read_exact_or_fail(&mut src, &mut buf, "header").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ReadFailed);
    }

    #[test]
    fn open_missing_file() {
        let err = open(Path::new("/definitely/not/here.pvr")).unwrap_err();
        assert!(matches!(err, IoError::FileNotFound(_)));
    }
}
