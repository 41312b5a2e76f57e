//! Context retrieval: pluggable providers, hybrid RRF fusion, and query
//! optimization.
//!
//! Every provider answers `get_context(query, scope, budget)` with ranked
//! snippets whose cumulative token estimate fits the budget. The hybrid
//! provider fans out to several backends in parallel and fuses their
//! rankings with Reciprocal-Rank Fusion; the optimizer post-processes and
//! memoizes per query.

mod fulltext;
mod git_history;
mod hybrid;
mod mmr;
mod module;
mod optimizer;
mod semantic;
mod symbol;
mod text;

use async_trait::async_trait;
use catalog::CatalogError;
use embedding::EmbeddingError;
use loupe_core::{ContextScope, ContextSnippet, TokenBudget};
use serde::{Deserialize, Serialize};

pub use fulltext::FullTextProvider;
pub use git_history::GitHistoryProvider;
pub use hybrid::{FailureStrategy, HybridProvider};
pub use module::{
  ContextRetrievalModule, ProviderStats, RetrievalDiagnostics, TaskComplexity, TaskContext, TaskSpec,
};
pub use optimizer::{QueryOptimizer, QueryOptimizerConfig};
pub use semantic::SemanticProvider;
pub use symbol::SymbolProvider;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
  #[error("catalog error: {0}")]
  Catalog(#[from] CatalogError),
  #[error("embedding error: {0}")]
  Embedding(#[from] EmbeddingError),
  #[error("git error: {0}")]
  Git(#[from] git2::Error),
  #[error("invalid provider configuration: {0}")]
  InvalidConfig(String),
  #[error("{0}")]
  Provider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
  Semantic,
  Symbol,
  FullText,
  GitHistory,
  Hybrid,
}

impl ProviderKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Semantic => "semantic",
      Self::Symbol => "symbol",
      Self::FullText => "fulltext",
      Self::GitHistory => "git-history",
      Self::Hybrid => "hybrid",
    }
  }
}

/// A retrieval backend returning ranked snippets under a token budget.
#[async_trait]
pub trait ContextProvider: Send + Sync {
  fn kind(&self) -> ProviderKind;

  async fn get_context(
    &self,
    query: &str,
    scope: &ContextScope,
    budget: &TokenBudget,
  ) -> Result<Vec<ContextSnippet>, ProviderError>;
}

/// Stamp provider metadata on a snippet list: `provider`, the
/// comma-joined `sources`, and the derived `source_count`.
pub(crate) fn annotate(snippets: &mut [ContextSnippet], provider: ProviderKind) {
  for snippet in snippets.iter_mut() {
    snippet.metadata.insert("provider".to_string(), provider.as_str().to_string());
    let sources = snippet
      .metadata
      .get("sources")
      .cloned()
      .unwrap_or_else(|| provider.as_str().to_string());
    let count = sources.split(',').filter(|s| !s.trim().is_empty()).collect::<std::collections::HashSet<_>>().len();
    snippet.metadata.insert("sources".to_string(), sources);
    snippet.metadata.insert("source_count".to_string(), count.to_string());
  }
}

/// Keep snippets in order until the cumulative token estimate would
/// exceed the budget's snippet allowance.
pub(crate) fn fit_to_budget(snippets: Vec<ContextSnippet>, budget: &TokenBudget) -> Vec<ContextSnippet> {
  let available = budget.available_for_snippets();
  let mut used = 0usize;
  let mut out = Vec::with_capacity(snippets.len());
  for snippet in snippets {
    let cost = snippet.token_cost();
    if used + cost > available {
      break;
    }
    used += cost;
    out.push(snippet);
  }
  out
}

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use loupe_core::ChunkKind;

  use super::*;

  fn snippet(chunk_id: i64, text: &str) -> ContextSnippet {
    ContextSnippet {
      chunk_id,
      score: 0.5,
      file_path: "a.rs".into(),
      label: "a.rs:1".into(),
      kind: ChunkKind::CodeBlock,
      text: text.into(),
      language: None,
      start_line: 1,
      end_line: 1,
      metadata: BTreeMap::new(),
    }
  }

  #[test]
  fn annotate_sets_provider_and_sources() {
    let mut snippets = vec![snippet(1, "x")];
    annotate(&mut snippets, ProviderKind::Semantic);
    assert_eq!(snippets[0].metadata.get("provider").unwrap(), "semantic");
    assert_eq!(snippets[0].metadata.get("sources").unwrap(), "semantic");
    assert_eq!(snippets[0].metadata.get("source_count").unwrap(), "1");
  }

  #[test]
  fn fit_to_budget_stops_at_the_allowance() {
    let budget = TokenBudget::new(30, 10, 0.0); // 20 tokens for snippets
    let snippets = vec![
      snippet(1, &"a".repeat(40)), // 10 tokens
      snippet(2, &"b".repeat(40)), // 10 tokens
      snippet(3, &"c".repeat(40)), // would exceed
    ];
    let fitted = fit_to_budget(snippets, &budget);
    assert_eq!(fitted.len(), 2);
  }
}
