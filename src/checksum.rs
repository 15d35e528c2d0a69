//! SHA-256 verification of fetched archives.

use anyhow::{Context, Result};
use log::{debug, info};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

use crate::error::InstallError;
use crate::runtime::Runtime;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Whether `value` looks like a lowercase or uppercase hex SHA-256 digest.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Encode bytes as lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// SHA-256 of in-memory data.
pub fn digest_bytes(data: &[u8]) -> String {
    hex_encode(&Sha256::digest(data))
}

/// Stream a file through SHA-256.
#[tracing::instrument(skip(runtime))]
pub fn digest_file<R: Runtime>(runtime: &R, path: &Path) -> Result<String> {
    let mut reader = runtime
        .open(path)
        .with_context(|| format!("Failed to open {:?} for hashing", path))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = reader
            .read(&mut buffer)
            .with_context(|| format!("Failed to read {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// Fail with [`InstallError::ChecksumMismatch`] unless `path` hashes to `expected`.
#[tracing::instrument(skip(runtime))]
pub fn verify_file<R: Runtime>(runtime: &R, path: &Path, expected: &str) -> Result<()> {
    let actual = digest_file(runtime, path)?;
    debug!("SHA-256 of {:?}: {}", path, actual);
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(InstallError::ChecksumMismatch {
            archive: path.to_path_buf(),
            expected: expected.to_lowercase(),
            actual,
        }
        .into());
    }
    info!("Checksum verified.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{MockRuntime, RealRuntime};
    use tempfile::tempdir;

    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_digest_of_empty_input() {
        assert_eq!(digest_bytes(b""), EMPTY_SHA256);
    }

    #[test]
    fn test_digest_file_matches_digest_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("archive.tar.gz");
        // Larger than one read buffer
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        assert_eq!(digest_file(&RealRuntime, &path).unwrap(), digest_bytes(&data));
    }

    #[test]
    fn test_verify_file_accepts_uppercase_expected() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_open()
            .returning(|_| Ok(Box::new(std::io::Cursor::new(Vec::new()))));

        verify_file(&runtime, Path::new("a.tar.gz"), &EMPTY_SHA256.to_uppercase()).unwrap();
    }

    #[test]
    fn test_verify_file_mismatch() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_open()
            .returning(|_| Ok(Box::new(std::io::Cursor::new(b"tampered".to_vec()))));

        let err = verify_file(&runtime, Path::new("a.tar.gz"), EMPTY_SHA256).unwrap_err();
        match err.downcast_ref::<InstallError>() {
            Some(InstallError::ChecksumMismatch { expected, actual, .. }) => {
                assert_eq!(expected, EMPTY_SHA256);
                assert_eq!(actual, &digest_bytes(b"tampered"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_is_sha256_hex() {
        assert!(is_sha256_hex(EMPTY_SHA256));
        assert!(!is_sha256_hex(""));
        assert!(!is_sha256_hex("YOUR_SHA256_HERE"));
        assert!(!is_sha256_hex(&"g".repeat(64)));
    }
}
