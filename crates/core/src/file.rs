use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Language;

/// Filesystem facts about one file, captured before indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
  pub size_bytes: u64,
  /// Modification time in nanoseconds since the Unix epoch.
  pub modified_time_ns: i64,
  /// Hex-encoded content fingerprint.
  pub content_hash: String,
  pub language: Option<Language>,
  pub mime_type: Option<String>,
}

/// The catalog row representing the last-known state of a file.
///
/// Identity is the absolute path: at most one active (non-deleted) row may
/// exist per `abs_path`. The relative path is display metadata and may
/// collide across watch roots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileState {
  /// Catalog-assigned id; zero before the first sync.
  pub file_id: i64,
  pub rel_path: String,
  pub abs_path: String,
  pub content_hash: String,
  pub size_bytes: u64,
  pub mtime_ns: i64,
  pub language: Option<Language>,
  /// Chunking strategy id that produced this file's chunks.
  pub kind: String,
  pub fingerprint: Option<String>,
  pub indexed_at: DateTime<Utc>,
  pub is_deleted: bool,
}

impl FileState {
  pub fn is_active(&self) -> bool {
    !self.is_deleted
  }
}
