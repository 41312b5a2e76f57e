use async_trait::async_trait;
use catalog::{Catalog, ChunkRow};
use loupe_core::{ContextScope, ContextSnippet, TokenBudget};

use crate::{
  ContextProvider, ProviderError, ProviderKind, annotate,
  text::{count_occurrences, keywords},
};

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

/// BM25-style lexical retrieval over chunk content and summaries.
///
/// Candidates are scored in memory; emission stops once the cumulative
/// chunk token estimate would exceed the budget's snippet allowance.
pub struct FullTextProvider {
  catalog: Catalog,
}

impl FullTextProvider {
  pub fn new(catalog: Catalog) -> Self {
    Self { catalog }
  }

  fn searchable_text(row: &ChunkRow) -> String {
    match &row.chunk.summary {
      Some(summary) => format!("{}\n{}", summary, row.chunk.content),
      None => row.chunk.content.clone(),
    }
  }
}

#[async_trait]
impl ContextProvider for FullTextProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::FullText
  }

  async fn get_context(
    &self,
    query: &str,
    scope: &ContextScope,
    budget: &TokenBudget,
  ) -> Result<Vec<ContextSnippet>, ProviderError> {
    let terms = keywords(query);
    if terms.is_empty() {
      return Ok(Vec::new());
    }

    let rows: Vec<ChunkRow> = self
      .catalog
      .list_chunk_rows()
      .await?
      .into_iter()
      .filter(|row| {
        scope.matches_path(&row.rel_path) && scope.matches_language(row.language) && scope.matches_kind(row.chunk.kind)
      })
      .collect();
    if rows.is_empty() {
      return Ok(Vec::new());
    }

    let texts: Vec<String> = rows.iter().map(Self::searchable_text).collect();
    let doc_count = rows.len() as f32;
    let avg_len = texts.iter().map(|t| t.len()).sum::<usize>() as f32 / doc_count;

    // Document frequency per term, then BM25 per chunk.
    let df: Vec<f32> = terms
      .iter()
      .map(|term| texts.iter().filter(|t| count_occurrences(t, term) > 0).count() as f32)
      .collect();

    let mut scored: Vec<(f32, &ChunkRow)> = rows
      .iter()
      .zip(&texts)
      .map(|(row, text)| {
        let len_norm = BM25_K1 * (1.0 - BM25_B + BM25_B * text.len() as f32 / avg_len.max(1.0));
        let mut score = 0.0f32;
        for (term, df) in terms.iter().zip(&df) {
          let tf = count_occurrences(text, term) as f32;
          if tf == 0.0 {
            continue;
          }
          let idf = (1.0 + (doc_count - df + 0.5) / (df + 0.5)).ln();
          score += idf * (tf * (BM25_K1 + 1.0)) / (tf + len_norm);
        }
        (score, row)
      })
      .filter(|(score, _)| *score > 0.0)
      .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    // Normalize into [0, 1] against the best match.
    let max_score = scored.first().map(|(s, _)| *s).unwrap_or(1.0).max(f32::EPSILON);

    let available = budget.available_for_snippets();
    let mut used = 0usize;
    let mut snippets = Vec::new();
    for (score, row) in scored {
      let cost = row.chunk.token_estimate as usize;
      if used + cost > available {
        break;
      }
      used += cost;
      let label = row
        .chunk
        .summary
        .clone()
        .unwrap_or_else(|| format!("{}:{}", row.rel_path, row.chunk.start_line));
      snippets.push(ContextSnippet {
        chunk_id: row.chunk.chunk_id,
        score: (score / max_score).clamp(0.0, 1.0),
        file_path: row.rel_path.clone(),
        label,
        kind: row.chunk.kind,
        text: row.chunk.content.clone(),
        language: row.language,
        start_line: row.chunk.start_line,
        end_line: row.chunk.end_line,
        metadata: Default::default(),
      });
    }

    annotate(&mut snippets, ProviderKind::FullText);
    Ok(snippets)
  }
}

#[cfg(test)]
mod tests {
  use crate::testing::seeded_catalog;

  use super::*;

  #[tokio::test]
  async fn matching_term_ranks_the_right_chunk_first() {
    let catalog = seeded_catalog().await;
    let provider = FullTextProvider::new(catalog);

    let snippets = provider
      .get_context("installation instructions", &ContextScope::default(), &TokenBudget::default())
      .await
      .unwrap();

    assert!(!snippets.is_empty());
    assert!(snippets[0].text.to_lowercase().contains("installation"));
    assert_eq!(snippets[0].score, 1.0);
    assert_eq!(snippets[0].metadata.get("provider").unwrap(), "fulltext");
  }

  #[tokio::test]
  async fn results_are_ordered_by_descending_score() {
    let catalog = seeded_catalog().await;
    let provider = FullTextProvider::new(catalog);

    let snippets = provider
      .get_context("session authentication", &ContextScope::default(), &TokenBudget::default())
      .await
      .unwrap();
    for pair in snippets.windows(2) {
      assert!(pair[0].score >= pair[1].score);
    }
  }

  #[tokio::test]
  async fn stopword_only_query_is_empty() {
    let catalog = seeded_catalog().await;
    let provider = FullTextProvider::new(catalog);
    let snippets = provider
      .get_context("the and of", &ContextScope::default(), &TokenBudget::default())
      .await
      .unwrap();
    assert!(snippets.is_empty());
  }

  #[tokio::test]
  async fn path_scope_restricts_results() {
    let catalog = seeded_catalog().await;
    let provider = FullTextProvider::new(catalog);

    let scope = ContextScope {
      paths: vec!["src/".into()],
      ..Default::default()
    };
    let snippets = provider
      .get_context("authentication session", &scope, &TokenBudget::default())
      .await
      .unwrap();
    assert!(snippets.iter().all(|s| s.file_path.starts_with("src/")));
  }
}
