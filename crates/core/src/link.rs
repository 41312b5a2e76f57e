use serde::{Deserialize, Serialize};

/// A directed edge between two chunks, or from a chunk to a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
  pub from_chunk: i64,
  pub to_chunk: Option<i64>,
  pub to_file: Option<i64>,
  /// Non-blank edge type, e.g. `references`, `continues`.
  pub link_type: String,
  pub label: Option<String>,
  /// Edge strength, `>= 0`.
  pub score: f32,
}

impl Link {
  pub fn between_chunks(from: i64, to: i64, link_type: impl Into<String>, score: f32) -> Self {
    Self {
      from_chunk: from,
      to_chunk: Some(to),
      to_file: None,
      link_type: link_type.into(),
      label: None,
      score: score.max(0.0),
    }
  }
}
