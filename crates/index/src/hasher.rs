//! Streaming content hashing.
//!
//! BLAKE3 when the default `blake3` feature is enabled, SHA-256
//! otherwise. Callers never see the algorithm: stored hashes are compared
//! as hex strings, so both sides of a comparison always come from the
//! same build.

use std::{fs::File, io::Read, path::Path};

use crate::IndexError;

/// Read buffer size for streaming hashes.
const HASH_BUF_SIZE: usize = 4 * 1024 * 1024;

/// Hash a file's bytes by streaming it in fixed-size buffers.
///
/// The buffer is local to the call; concurrent hashers never share state.
pub fn hash_file(path: &Path) -> Result<Vec<u8>, IndexError> {
  let mut file = File::open(path)?;
  let mut buf = vec![0u8; HASH_BUF_SIZE];
  let mut hasher = Hasher::new();
  loop {
    let n = file.read(&mut buf)?;
    if n == 0 {
      break;
    }
    hasher.update(&buf[..n]);
  }
  Ok(hasher.finish())
}

/// Hash an in-memory byte slice.
pub fn hash_bytes(bytes: &[u8]) -> Vec<u8> {
  let mut hasher = Hasher::new();
  hasher.update(bytes);
  hasher.finish()
}

/// Hex-encode a digest for storage and comparison.
pub fn hex(bytes: &[u8]) -> String {
  ::hex::encode(bytes)
}

#[cfg(feature = "blake3")]
struct Hasher(blake3::Hasher);

#[cfg(feature = "blake3")]
impl Hasher {
  fn new() -> Self {
    Self(blake3::Hasher::new())
  }

  fn update(&mut self, bytes: &[u8]) {
    self.0.update(bytes);
  }

  fn finish(self) -> Vec<u8> {
    self.0.finalize().as_bytes().to_vec()
  }
}

#[cfg(not(feature = "blake3"))]
struct Hasher(sha2::Sha256);

#[cfg(not(feature = "blake3"))]
impl Hasher {
  fn new() -> Self {
    use sha2::Digest;
    Self(sha2::Sha256::new())
  }

  fn update(&mut self, bytes: &[u8]) {
    use sha2::Digest;
    self.0.update(bytes);
  }

  fn finish(self) -> Vec<u8> {
    use sha2::Digest;
    self.0.finalize().to_vec()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_hash_matches_bytes_hash() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, b"hello loupe").unwrap();

    assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"hello loupe"));
  }

  #[test]
  fn different_content_different_hash() {
    assert_ne!(hash_bytes(b"a"), hash_bytes(b"b"));
  }

  #[test]
  fn hex_is_lowercase_and_stable() {
    let digest = hash_bytes(b"x");
    let encoded = hex(&digest);
    assert_eq!(encoded.len(), digest.len() * 2);
    assert_eq!(encoded, encoded.to_lowercase());
  }

  #[test]
  fn missing_file_is_io_error() {
    let err = hash_file(std::path::Path::new("/definitely/not/here")).unwrap_err();
    assert!(matches!(err, crate::IndexError::Io(_)));
  }
}
