use std::collections::HashMap;

use async_trait::async_trait;
use catalog::{Catalog, SymbolRow};
use loupe_core::{Chunk, ContextScope, ContextSnippet, TokenBudget};

use crate::{ContextProvider, ProviderError, ProviderKind, annotate, fit_to_budget, text::keywords};

/// Token-matching over the symbol index.
///
/// Ranking combines symbol-type priority (types before functions before
/// fields), an exact-match bonus, and name proximity (how much of the
/// name the token covers). Snippets anchor to the chunk whose line span
/// contains the symbol.
pub struct SymbolProvider {
  catalog: Catalog,
  limit: usize,
}

impl SymbolProvider {
  pub fn new(catalog: Catalog) -> Self {
    Self { catalog, limit: 24 }
  }

  pub fn with_limit(mut self, limit: usize) -> Self {
    self.limit = limit.max(1);
    self
  }

  fn score(row: &SymbolRow, tokens: &[String]) -> f32 {
    let name = row.symbol.name.to_lowercase();
    let mut best = 0.0f32;
    for token in tokens {
      if !name.contains(token.as_str()) {
        continue;
      }
      // Type priority: 0 (types) .. 4 (bare identifiers).
      let priority = 1.0 - 0.15 * row.symbol.symbol_type.priority() as f32;
      let exact = if name == *token { 0.25 } else { 0.0 };
      let proximity = (token.len() as f32 / name.len().max(1) as f32) * 0.2;
      best = best.max((0.5 * priority + exact + proximity).clamp(0.0, 1.0));
    }
    best
  }
}

#[async_trait]
impl ContextProvider for SymbolProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Symbol
  }

  async fn get_context(
    &self,
    query: &str,
    scope: &ContextScope,
    budget: &TokenBudget,
  ) -> Result<Vec<ContextSnippet>, ProviderError> {
    let tokens = keywords(query);
    if tokens.is_empty() {
      return Ok(Vec::new());
    }

    let rows = self.catalog.find_symbols(&tokens, self.limit * 4).await?;
    let mut scored: Vec<(f32, SymbolRow)> = rows
      .into_iter()
      .filter(|row| scope.matches_path(&row.rel_path) && scope.matches_language(row.symbol.language))
      .map(|row| (Self::score(&row, &tokens), row))
      .filter(|(score, _)| *score > 0.0)
      .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(self.limit);

    // Anchor each symbol to the chunk covering its lines; chunks are
    // fetched once per file.
    let mut chunks_by_file: HashMap<i64, Vec<Chunk>> = HashMap::new();
    let mut snippets = Vec::with_capacity(scored.len());
    for (score, row) in scored {
      if !chunks_by_file.contains_key(&row.file_id) {
        chunks_by_file.insert(row.file_id, self.catalog.chunks_for_file(row.file_id).await?);
      }
      let chunks = &chunks_by_file[&row.file_id];
      let Some(chunk) = chunks
        .iter()
        .find(|c| c.start_line <= row.symbol.start_line && row.symbol.start_line <= c.end_line)
        .or_else(|| chunks.first())
      else {
        continue;
      };
      if !scope.matches_kind(chunk.kind) {
        continue;
      }

      let label = row.symbol.qualified_name.clone().unwrap_or_else(|| row.symbol.name.clone());
      let mut snippet = ContextSnippet {
        chunk_id: chunk.chunk_id,
        score,
        file_path: row.rel_path.clone(),
        label,
        kind: chunk.kind,
        text: chunk.content.clone(),
        language: row.symbol.language,
        start_line: chunk.start_line,
        end_line: chunk.end_line,
        metadata: Default::default(),
      };
      snippet = snippet.with_metadata("symbol", row.symbol.name.clone());
      snippet = snippet.with_metadata("symbol_type", row.symbol.symbol_type.as_str());
      if let Some(signature) = row.symbol.signature.clone() {
        snippet = snippet.with_metadata("signature", signature);
      }
      snippets.push(snippet);
    }

    // A symbol may resolve to a chunk another symbol already claimed.
    let mut seen = std::collections::HashSet::new();
    snippets.retain(|s| seen.insert(s.chunk_id));

    annotate(&mut snippets, ProviderKind::Symbol);
    Ok(fit_to_budget(snippets, budget))
  }
}

#[cfg(test)]
mod tests {
  use crate::testing::seeded_catalog;

  use super::*;

  #[tokio::test]
  async fn exact_symbol_match_wins() {
    let catalog = seeded_catalog().await;
    let provider = SymbolProvider::new(catalog);

    let snippets = provider
      .get_context("authenticate", &ContextScope::default(), &TokenBudget::default())
      .await
      .unwrap();

    assert!(!snippets.is_empty());
    assert_eq!(snippets[0].metadata.get("symbol").unwrap(), "authenticate");
    assert!(snippets[0].text.contains("authenticate"));
    assert_eq!(snippets[0].metadata.get("provider").unwrap(), "symbol");
  }

  #[tokio::test]
  async fn no_tokens_no_results() {
    let catalog = seeded_catalog().await;
    let provider = SymbolProvider::new(catalog);
    let snippets = provider
      .get_context("a of the", &ContextScope::default(), &TokenBudget::default())
      .await
      .unwrap();
    assert!(snippets.is_empty());
  }

  #[tokio::test]
  async fn partial_match_scores_below_exact() {
    let catalog = seeded_catalog().await;
    let provider = SymbolProvider::new(catalog);

    let exact = provider
      .get_context("logout", &ContextScope::default(), &TokenBudget::default())
      .await
      .unwrap();
    let partial = provider
      .get_context("log", &ContextScope::default(), &TokenBudget::default())
      .await
      .unwrap();

    assert!(!exact.is_empty());
    assert!(!partial.is_empty());
    assert!(exact[0].score > partial[0].score);
  }
}
