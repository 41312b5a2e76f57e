//! Content extraction: raw bytes to indexable text.
//!
//! The default extractor decodes UTF-8. Binary document converters (Word,
//! PDF) are external collaborators that register themselves per extension.

use std::{collections::HashMap, path::Path, sync::Arc};

use crate::IndexError;

pub trait ContentExtractor: Send + Sync {
  /// Convert a file's raw bytes to text. Failures are `DecodeError`s and
  /// mark the file failed without stopping the batch.
  fn extract(&self, path: &Path, raw: &[u8]) -> Result<String, IndexError>;
}

/// Strict UTF-8 decoding. Invalid sequences fail the file rather than
/// silently mangling content that would then be embedded.
pub struct Utf8Extractor;

impl ContentExtractor for Utf8Extractor {
  fn extract(&self, path: &Path, raw: &[u8]) -> Result<String, IndexError> {
    String::from_utf8(raw.to_vec())
      .map_err(|e| IndexError::Decode(format!("{} is not valid utf-8: {e}", path.display())))
  }
}

/// Extension-keyed registry with a UTF-8 default.
pub struct ExtractorRegistry {
  by_extension: HashMap<String, Arc<dyn ContentExtractor>>,
  default: Arc<dyn ContentExtractor>,
}

impl Default for ExtractorRegistry {
  fn default() -> Self {
    Self {
      by_extension: HashMap::new(),
      default: Arc::new(Utf8Extractor),
    }
  }
}

impl ExtractorRegistry {
  /// Register a converter for an extension (without the dot).
  pub fn register(&mut self, extension: impl Into<String>, extractor: Arc<dyn ContentExtractor>) {
    self.by_extension.insert(extension.into().to_ascii_lowercase(), extractor);
  }

  pub fn for_path(&self, path: &Path) -> Arc<dyn ContentExtractor> {
    path
      .extension()
      .and_then(|e| e.to_str())
      .map(|e| e.to_ascii_lowercase())
      .and_then(|e| self.by_extension.get(&e).cloned())
      .unwrap_or_else(|| self.default.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn utf8_default_decodes_text() {
    let registry = ExtractorRegistry::default();
    let extractor = registry.for_path(Path::new("a.rs"));
    assert_eq!(extractor.extract(Path::new("a.rs"), b"fn x() {}").unwrap(), "fn x() {}");
  }

  #[test]
  fn invalid_utf8_is_decode_error() {
    let registry = ExtractorRegistry::default();
    let extractor = registry.for_path(Path::new("a.bin"));
    let err = extractor.extract(Path::new("a.bin"), &[0xff, 0xfe, 0x00]).unwrap_err();
    assert!(matches!(err, IndexError::Decode(_)));
  }

  #[test]
  fn registered_extractor_wins_for_its_extension() {
    struct Stub;
    impl ContentExtractor for Stub {
      fn extract(&self, _path: &Path, _raw: &[u8]) -> Result<String, IndexError> {
        Ok("converted".to_string())
      }
    }

    let mut registry = ExtractorRegistry::default();
    registry.register("pdf", Arc::new(Stub));
    let extractor = registry.for_path(Path::new("doc.PDF"));
    assert_eq!(extractor.extract(Path::new("doc.PDF"), &[1, 2, 3]).unwrap(), "converted");
  }
}
