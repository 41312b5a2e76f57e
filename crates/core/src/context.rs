use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ChunkKind, Language};

/// Upper bound on tokens a single retrieval may return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenBudget {
  pub max_tokens: usize,
  pub reserve_for_prompt: usize,
  /// Relevance/diversity tradeoff for MMR, in `[0, 1]`.
  pub diversity_weight: f32,
}

impl TokenBudget {
  /// Build a budget, clamping the reserve to `max_tokens` and the
  /// diversity weight into `[0, 1]`.
  pub fn new(max_tokens: usize, reserve_for_prompt: usize, diversity_weight: f32) -> Self {
    Self {
      max_tokens,
      reserve_for_prompt: reserve_for_prompt.min(max_tokens),
      diversity_weight: diversity_weight.clamp(0.0, 1.0),
    }
  }

  pub fn available_for_snippets(&self) -> usize {
    self.max_tokens.saturating_sub(self.reserve_for_prompt)
  }
}

impl Default for TokenBudget {
  fn default() -> Self {
    Self::new(4096, 512, 0.3)
  }
}

/// Optional retrieval filters. All-empty means unbounded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextScope {
  /// Path prefixes or substrings, matched against the relative path.
  pub paths: Vec<String>,
  pub languages: Vec<Language>,
  pub kinds: Vec<ChunkKind>,
}

impl ContextScope {
  pub fn is_unbounded(&self) -> bool {
    self.paths.is_empty() && self.languages.is_empty() && self.kinds.is_empty()
  }

  pub fn matches_path(&self, path: &str) -> bool {
    self.paths.is_empty() || self.paths.iter().any(|p| path.starts_with(p.as_str()) || path.contains(p.as_str()))
  }

  pub fn matches_language(&self, language: Option<Language>) -> bool {
    self.languages.is_empty() || language.is_some_and(|l| self.languages.contains(&l))
  }

  pub fn matches_kind(&self, kind: ChunkKind) -> bool {
    self.kinds.is_empty() || self.kinds.contains(&kind)
  }
}

/// A retrieved context fragment suitable for inclusion in an agent prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnippet {
  pub chunk_id: i64,
  /// Normalized relevance in `[0, 1]`.
  pub score: f32,
  pub file_path: String,
  pub label: String,
  pub kind: ChunkKind,
  pub text: String,
  pub language: Option<Language>,
  pub start_line: u32,
  pub end_line: u32,
  /// Free-form provider annotations; keys are non-blank.
  pub metadata: BTreeMap<String, String>,
}

impl ContextSnippet {
  /// Token cost of this snippet under the `len/4` estimator.
  pub fn token_cost(&self) -> usize {
    (self.text.len() / crate::CHARS_PER_TOKEN).max(1)
  }

  pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    let key = key.into();
    if !key.trim().is_empty() {
      self.metadata.insert(key, value.into());
    }
    self
  }
}
