//! Chunking strategies.
//!
//! A chunker turns file text into non-blank regions with line spans and
//! token estimates. The registry picks a strategy per language: code
//! files chunk along definition boundaries, prose chunks by paragraph.
//! Ordinals are normalized downstream, so strategies only need to emit
//! chunks in file order.

mod code;
mod text;

use std::path::Path;

use loupe_core::{Chunk, Language, estimate_tokens};

pub use code::{CodeChunker, CodeChunkerConfig};
pub use text::TextChunker;

pub trait Chunker: Send + Sync {
  /// Strategy id stored in `FileState.kind`.
  fn id(&self) -> &'static str;

  /// Languages this strategy is tuned for; empty means "anything".
  fn supported_languages(&self) -> &[Language];

  fn chunk(&self, text: &str, path: &Path, language: Option<Language>) -> Vec<Chunk>;
}

/// Chooses a chunking strategy per file kind.
pub struct ChunkerRegistry {
  code: CodeChunker,
  text: TextChunker,
}

impl Default for ChunkerRegistry {
  fn default() -> Self {
    Self {
      code: CodeChunker::default(),
      text: TextChunker::default(),
    }
  }
}

impl ChunkerRegistry {
  pub fn chunker_for(&self, language: Option<Language>) -> &dyn Chunker {
    match language {
      Some(lang) if self.code.supported_languages().contains(&lang) => &self.code,
      _ => &self.text,
    }
  }
}

/// Enforce the chunk contract regardless of which strategy produced the
/// list: blank chunks dropped, ids reset, ordinals dense from zero, token
/// estimate filled from the fallback estimator when missing.
pub fn normalize_chunks(chunks: Vec<Chunk>) -> Vec<Chunk> {
  let mut out: Vec<Chunk> = chunks.into_iter().filter(|c| !c.content.trim().is_empty()).collect();
  for (ordinal, chunk) in out.iter_mut().enumerate() {
    chunk.chunk_id = 0;
    chunk.file_id = 0;
    chunk.ordinal = ordinal as u32;
    if chunk.token_estimate == 0 {
      chunk.token_estimate = estimate_tokens(&chunk.content);
    }
    if chunk.end_line < chunk.start_line {
      chunk.end_line = chunk.start_line;
    }
  }
  out
}
