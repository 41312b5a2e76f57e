use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Characters per token estimate used when no tokenizer is available.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a text. Never returns zero: even an empty
/// chunk costs at least one token once wrapped in a prompt.
pub fn estimate_tokens(text: &str) -> u32 {
  (text.len() / CHARS_PER_TOKEN).max(1) as u32
}

/// What a chunk represents within its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
  CodeFunction,
  CodeClass,
  CodeBlock,
  Paragraph,
  Heading,
  Text,
}

impl ChunkKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::CodeFunction => "code_function",
      Self::CodeClass => "code_class",
      Self::CodeBlock => "code_block",
      Self::Paragraph => "paragraph",
      Self::Heading => "heading",
      Self::Text => "text",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    let kind = match s {
      "code_function" => Self::CodeFunction,
      "code_class" => Self::CodeClass,
      "code_block" => Self::CodeBlock,
      "paragraph" => Self::Paragraph,
      "heading" => Self::Heading,
      "text" => Self::Text,
      _ => return None,
    };
    Some(kind)
  }
}

/// A bounded, self-contained text region produced from a file.
///
/// `chunk_id` and `file_id` are zero until the catalog assigns them during
/// [`sync_file_artifacts`]; chunkers always emit them as zero and the file
/// indexer normalizes ordinals to be dense before the sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
  pub chunk_id: i64,
  pub file_id: i64,
  /// Position within the file; dense `0..n` after a successful sync.
  pub ordinal: u32,
  pub kind: ChunkKind,
  pub start_line: u32,
  pub end_line: u32,
  pub token_estimate: u32,
  pub content: String,
  pub summary: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Chunk {
  pub fn new(kind: ChunkKind, start_line: u32, end_line: u32, content: String) -> Self {
    let token_estimate = estimate_tokens(&content);
    Self {
      chunk_id: 0,
      file_id: 0,
      ordinal: 0,
      kind,
      start_line,
      end_line,
      token_estimate,
      content,
      summary: None,
      created_at: Utc::now(),
    }
  }

  pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
    self.summary = Some(summary.into());
    self
  }
}

/// A vector for one chunk under one model. `|vector| == dimensions` always
/// holds at insertion time; the catalog rejects mismatches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
  pub model: String,
  pub dimensions: usize,
  pub vector: Vec<f32>,
}

impl Embedding {
  pub fn new(model: impl Into<String>, vector: Vec<f32>) -> Self {
    Self {
      model: model.into(),
      dimensions: vector.len(),
      vector,
    }
  }
}

/// A chunk paired with its (optional) embedding, ready for one atomic
/// catalog sync.
#[derive(Debug, Clone)]
pub struct ChunkArtifact {
  pub chunk: Chunk,
  pub embedding: Option<Embedding>,
}
