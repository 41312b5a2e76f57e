use std::sync::Arc;

use async_trait::async_trait;
use catalog::{Catalog, EmbeddingRow};
use embedding::Embedder;
use loupe_core::{ContextScope, ContextSnippet, TokenBudget};
use tracing::debug;

use crate::{ContextProvider, ProviderError, ProviderKind, annotate, fit_to_budget, mmr};

/// Nearest-neighbor retrieval over the stored embeddings.
///
/// The query is embedded with the same model the indexer used; candidate
/// vectors are scanned in memory (local-repository scale), scored by
/// cosine similarity mapped into `[0, 1]`, optionally MMR-reranked when
/// the budget asks for diversity.
pub struct SemanticProvider {
  catalog: Catalog,
  embedder: Arc<dyn Embedder>,
  top_k: usize,
}

impl SemanticProvider {
  pub fn new(catalog: Catalog, embedder: Arc<dyn Embedder>) -> Self {
    Self {
      catalog,
      embedder,
      top_k: 32,
    }
  }

  pub fn with_top_k(mut self, top_k: usize) -> Self {
    self.top_k = top_k.max(1);
    self
  }

  fn in_scope(row: &EmbeddingRow, scope: &ContextScope) -> bool {
    scope.matches_path(&row.rel_path) && scope.matches_language(row.language) && scope.matches_kind(row.kind)
  }
}

pub(crate) fn snippet_from_embedding_row(row: &EmbeddingRow, score: f32) -> ContextSnippet {
  let label = row
    .summary
    .clone()
    .unwrap_or_else(|| format!("{}:{}", row.rel_path, row.start_line));
  ContextSnippet {
    chunk_id: row.chunk_id,
    score: score.clamp(0.0, 1.0),
    file_path: row.rel_path.clone(),
    label,
    kind: row.kind,
    text: row.content.clone(),
    language: row.language,
    start_line: row.start_line,
    end_line: row.end_line,
    metadata: Default::default(),
  }
}

#[async_trait]
impl ContextProvider for SemanticProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Semantic
  }

  async fn get_context(
    &self,
    query: &str,
    scope: &ContextScope,
    budget: &TokenBudget,
  ) -> Result<Vec<ContextSnippet>, ProviderError> {
    let query_vector = self.embedder.embed(query).await?;

    let rows = self.catalog.embedding_rows(self.embedder.model()).await?;
    let mut scored: Vec<(f32, EmbeddingRow)> = rows
      .into_iter()
      .filter(|row| Self::in_scope(row, scope))
      .map(|row| {
        let score = (mmr::cosine(&query_vector, &row.vector) + 1.0) / 2.0;
        (score, row)
      })
      .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(self.top_k);
    debug!(candidates = scored.len(), "semantic search scored");

    let ordered: Vec<(f32, EmbeddingRow)> = if budget.diversity_weight > 0.0 && scored.len() > 1 {
      let relevance: Vec<f32> = scored.iter().map(|(s, _)| *s).collect();
      let vectors: Vec<&[f32]> = scored.iter().map(|(_, r)| r.vector.as_slice()).collect();
      let lambda = 1.0 - budget.diversity_weight;
      let picked = mmr::mmr_select(&relevance, |a, b| (mmr::cosine(vectors[a], vectors[b]) + 1.0) / 2.0, lambda, scored.len());
      let mut by_index: Vec<Option<(f32, EmbeddingRow)>> = scored.into_iter().map(Some).collect();
      picked.into_iter().filter_map(|i| by_index[i].take()).collect()
    } else {
      scored
    };

    let mut snippets: Vec<ContextSnippet> =
      ordered.iter().map(|(score, row)| snippet_from_embedding_row(row, *score)).collect();
    annotate(&mut snippets, ProviderKind::Semantic);
    Ok(fit_to_budget(snippets, budget))
  }
}

#[cfg(test)]
mod tests {
  use crate::testing::{mock_embedder, seeded_catalog};

  use super::*;

  #[tokio::test]
  async fn identical_text_ranks_first() {
    let catalog = seeded_catalog().await;
    let provider = SemanticProvider::new(catalog, mock_embedder());

    let query = "fn logout(session: Session) { session.invalidate() }";
    let snippets = provider
      .get_context(query, &ContextScope::default(), &TokenBudget::new(4096, 0, 0.0))
      .await
      .unwrap();

    assert!(!snippets.is_empty());
    assert!(snippets[0].text.contains("logout"));
    assert!(snippets[0].score > snippets.last().unwrap().score || snippets.len() == 1);
    assert_eq!(snippets[0].metadata.get("provider").unwrap(), "semantic");
  }

  #[tokio::test]
  async fn scope_filters_languages() {
    let catalog = seeded_catalog().await;
    let provider = SemanticProvider::new(catalog, mock_embedder());

    let scope = ContextScope {
      languages: vec![loupe_core::Language::Markdown],
      ..Default::default()
    };
    let snippets = provider
      .get_context("installation", &scope, &TokenBudget::new(4096, 0, 0.0))
      .await
      .unwrap();

    assert!(!snippets.is_empty());
    assert!(snippets.iter().all(|s| s.language == Some(loupe_core::Language::Markdown)));
  }

  #[tokio::test]
  async fn tight_budget_limits_output() {
    let catalog = seeded_catalog().await;
    let provider = SemanticProvider::new(catalog, mock_embedder());

    let snippets = provider
      .get_context("session", &ContextScope::default(), &TokenBudget::new(25, 0, 0.0))
      .await
      .unwrap();
    let used: usize = snippets.iter().map(|s| s.token_cost()).sum();
    assert!(used <= 25, "used {used} tokens");
  }

  #[tokio::test]
  async fn scores_stay_in_unit_range() {
    let catalog = seeded_catalog().await;
    let provider = SemanticProvider::new(catalog, mock_embedder());
    let snippets = provider
      .get_context("anything at all", &ContextScope::default(), &TokenBudget::default())
      .await
      .unwrap();
    assert!(snippets.iter().all(|s| (0.0..=1.0).contains(&s.score)));
  }
}
