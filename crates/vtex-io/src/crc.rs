//! CRC32 used for container integrity tags.
//!
//! IEEE polynomial, reflected, initial and final XOR `0xffffffff` (the zlib
//! checksum). Stored verbatim in PVR metadata blocks and DDS reserved slots.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crc::{CRC_32_ISO_HDLC, Crc};

use crate::error::{IoError, IoResult};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Checksum of an in-memory buffer.
pub fn crc32_for_buffer(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Checksum of a whole file, streamed in 64 KiB chunks.
pub fn crc32_for_file(path: &Path) -> IoResult<u32> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => IoError::FileNotFound(path.to_path_buf()),
        _ => IoError::Io(e),
    })?;
    let mut reader = BufReader::new(file);
    let mut digest = CRC32.digest();
    let mut chunk = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        digest.update(&chunk[..n]);
    }
    Ok(digest.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_value() {
        assert_eq!(crc32_for_buffer(b"123456789"), 0xcbf4_3926);
        assert_eq!(crc32_for_buffer(&[]), 0);
    }

    #[test]
    fn file_matches_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let data: Vec<u8> = (0..200_000u32).map(|i| (i * 31 % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();
        assert_eq!(crc32_for_file(&path).unwrap(), crc32_for_buffer(&data));
    }
}
