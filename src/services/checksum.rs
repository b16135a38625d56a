//! Content identity of build logs.

use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use crate::domain::errors::{DomainError, DomainResult};

const CHUNK_SIZE: usize = 64 * 1024;

/// Hex SHA-1 of a byte slice.
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hex SHA-1 of a file's contents, streamed in fixed-size chunks.
pub fn file_checksum(path: &Path) -> DomainResult<String> {
    let mut file = File::open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DomainError::LogFileMissing(path.to_path_buf()),
        _ => DomainError::Io(e),
    })?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
