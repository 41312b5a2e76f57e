//! Per-file metadata extraction: size, mtime, content hash, MIME, and a
//! language hint.

use std::path::Path;

use loupe_core::{FileMetadata, Language};

use crate::{IndexError, hasher};

/// Extract metadata for a regular file.
///
/// Fails with [`IndexError::InvalidPath`] when the path is not a regular
/// file. Language detection precedence: extension table, well-known
/// filename, MIME subtype.
pub fn extract(path: &Path) -> Result<FileMetadata, IndexError> {
  let meta = std::fs::metadata(path).map_err(|_| IndexError::InvalidPath(path.to_path_buf()))?;
  if !meta.is_file() {
    return Err(IndexError::InvalidPath(path.to_path_buf()));
  }

  let modified_time_ns = meta
    .modified()
    .ok()
    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
    .map(|d| d.as_nanos() as i64)
    .unwrap_or(0);

  let digest = hasher::hash_file(path)?;

  let mime = mime_guess::from_path(path).first();
  let mime_type = mime.as_ref().map(|m| m.essence_str().to_string());

  let language = detect_language(path, mime.as_ref().map(|m| m.subtype().as_str()));

  Ok(FileMetadata {
    size_bytes: meta.len(),
    modified_time_ns,
    content_hash: hasher::hex(&digest),
    language,
    mime_type,
  })
}

/// Async wrapper: hashing a large file should not block the runtime.
pub async fn extract_async(path: &Path) -> Result<FileMetadata, IndexError> {
  let path = path.to_path_buf();
  tokio::task::spawn_blocking(move || extract(&path))
    .await
    .map_err(|e| IndexError::Io(std::io::Error::other(e)))?
}

pub(crate) fn detect_language(path: &Path, mime_subtype: Option<&str>) -> Option<Language> {
  if let Some(lang) = path.extension().and_then(|e| e.to_str()).and_then(Language::from_extension) {
    return Some(lang);
  }
  if let Some(lang) = path.file_name().and_then(|n| n.to_str()).and_then(Language::from_filename) {
    return Some(lang);
  }
  mime_subtype.and_then(Language::from_mime_subtype)
}
