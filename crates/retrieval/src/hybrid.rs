use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use loupe_core::{CHARS_PER_TOKEN, ContextScope, ContextSnippet, TokenBudget};
use tracing::{debug, warn};

use crate::{ContextProvider, ProviderError, ProviderKind, annotate};

/// Default RRF rank constant.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// What to do when a fanned-out provider fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureStrategy {
  /// Drop the failing provider's contribution and continue.
  #[default]
  Skip,
  /// Surface the first provider error.
  Fail,
}

/// Parallel fan-out over several providers with Reciprocal-Rank Fusion:
///
/// ```text
/// rrf(snippet) = Σ_provider  weight[provider] / (k + rank_in_provider)
/// ```
///
/// Duplicate snippets (same chunk id) sum their contributions and record
/// how many providers agreed. Fusion is deterministic for fixed provider
/// outputs; ties break by ascending chunk id.
pub struct HybridProvider {
  providers: Vec<(Arc<dyn ContextProvider>, f32)>,
  k: f32,
  strategy: FailureStrategy,
}

impl HybridProvider {
  /// Equal-weight fusion over `providers`.
  pub fn new(providers: Vec<Arc<dyn ContextProvider>>) -> Result<Self, ProviderError> {
    Self::with_weights(providers.into_iter().map(|p| (p, 1.0)).collect(), DEFAULT_RRF_K, FailureStrategy::default())
  }

  pub fn with_weights(
    providers: Vec<(Arc<dyn ContextProvider>, f32)>,
    k: f32,
    strategy: FailureStrategy,
  ) -> Result<Self, ProviderError> {
    if providers.is_empty() {
      return Err(ProviderError::InvalidConfig("hybrid provider needs at least one backend".into()));
    }
    if k <= 0.0 {
      return Err(ProviderError::InvalidConfig(format!("rrf k must be positive, got {k}")));
    }
    if let Some((provider, weight)) = providers.iter().find(|(_, w)| *w <= 0.0) {
      return Err(ProviderError::InvalidConfig(format!(
        "weight for {} must be positive, got {weight}",
        provider.kind().as_str()
      )));
    }
    Ok(Self { providers, k, strategy })
  }
}

struct Fused {
  snippet: ContextSnippet,
  rrf: f32,
  sources: Vec<&'static str>,
}

#[async_trait]
impl ContextProvider for HybridProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Hybrid
  }

  async fn get_context(
    &self,
    query: &str,
    scope: &ContextScope,
    budget: &TokenBudget,
  ) -> Result<Vec<ContextSnippet>, ProviderError> {
    // One task per provider; the join is the fan-in point.
    let mut handles = Vec::with_capacity(self.providers.len());
    for (provider, weight) in &self.providers {
      let provider = provider.clone();
      let weight = *weight;
      let query = query.to_string();
      let scope = scope.clone();
      let budget = *budget;
      handles.push(tokio::spawn(async move {
        let kind = provider.kind();
        let result = provider.get_context(&query, &scope, &budget).await;
        (kind, weight, result)
      }));
    }

    let mut ranked_lists = Vec::with_capacity(handles.len());
    for joined in futures::future::join_all(handles).await {
      match joined {
        Ok((kind, weight, Ok(snippets))) => ranked_lists.push((kind, weight, snippets)),
        Ok((kind, _, Err(e))) => match self.strategy {
          FailureStrategy::Skip => {
            warn!(provider = kind.as_str(), error = %e, "provider failed, skipped");
          }
          FailureStrategy::Fail => return Err(e),
        },
        Err(join_error) => match self.strategy {
          FailureStrategy::Skip => warn!(error = %join_error, "provider task failed, skipped"),
          FailureStrategy::Fail => {
            return Err(ProviderError::Provider(format!("provider task failed: {join_error}")));
          }
        },
      }
    }

    let total_providers = self.providers.len();
    let mut fused: HashMap<i64, Fused> = HashMap::new();
    for (kind, weight, snippets) in ranked_lists {
      for (rank0, snippet) in snippets.into_iter().enumerate() {
        let contribution = weight / (self.k + (rank0 + 1) as f32);
        match fused.get_mut(&snippet.chunk_id) {
          Some(entry) => {
            entry.rrf += contribution;
            if !entry.sources.contains(&kind.as_str()) {
              entry.sources.push(kind.as_str());
            }
          }
          None => {
            fused.insert(
              snippet.chunk_id,
              Fused {
                snippet,
                rrf: contribution,
                sources: vec![kind.as_str()],
              },
            );
          }
        }
      }
    }

    let mut entries: Vec<Fused> = fused.into_values().collect();
    entries.sort_by(|a, b| {
      b.rrf
        .partial_cmp(&a.rrf)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| a.snippet.chunk_id.cmp(&b.snippet.chunk_id))
    });

    // The best possible score is every provider agreeing at rank one.
    let max_rrf: f32 = self.providers.iter().map(|(_, w)| w / (self.k + 1.0)).sum();

    let available = budget.available_for_snippets();
    let mut used = 0usize;
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
      let cost = (entry.snippet.text.len() / CHARS_PER_TOKEN).max(1);
      if used + cost > available {
        break;
      }
      used += cost;

      let mut snippet = entry.snippet;
      snippet.score = (entry.rrf / max_rrf.max(f32::EPSILON)).clamp(0.0, 1.0);
      let agreement = entry.sources.len() as f32 / total_providers.max(1) as f32;
      snippet.metadata.insert("rrf_score".to_string(), format!("{:.6}", entry.rrf));
      snippet.metadata.insert("rrf_provider_count".to_string(), entry.sources.len().to_string());
      snippet.metadata.insert("rrf_agreement".to_string(), format!("{agreement:.3}"));
      snippet.metadata.insert("sources".to_string(), entry.sources.join(","));
      out.push(snippet);
    }

    debug!(fused = out.len(), "hybrid fusion complete");
    annotate(&mut out, ProviderKind::Hybrid);
    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use loupe_core::ChunkKind;

  use super::*;

  struct FixedProvider {
    kind: ProviderKind,
    chunk_ids: Vec<i64>,
    fail: bool,
  }

  #[async_trait]
  impl ContextProvider for FixedProvider {
    fn kind(&self) -> ProviderKind {
      self.kind
    }

    async fn get_context(
      &self,
      _query: &str,
      _scope: &ContextScope,
      _budget: &TokenBudget,
    ) -> Result<Vec<ContextSnippet>, ProviderError> {
      if self.fail {
        return Err(ProviderError::Provider("backend down".into()));
      }
      Ok(
        self
          .chunk_ids
          .iter()
          .enumerate()
          .map(|(i, &chunk_id)| ContextSnippet {
            chunk_id,
            score: 1.0 - i as f32 * 0.1,
            file_path: format!("f{chunk_id}.rs"),
            label: format!("chunk {chunk_id}"),
            kind: ChunkKind::CodeBlock,
            text: format!("content of chunk {chunk_id}"),
            language: None,
            start_line: 1,
            end_line: 2,
            metadata: BTreeMap::new(),
          })
          .collect(),
      )
    }
  }

  fn provider(kind: ProviderKind, chunk_ids: Vec<i64>) -> Arc<dyn ContextProvider> {
    Arc::new(FixedProvider {
      kind,
      chunk_ids,
      fail: false,
    })
  }

  #[tokio::test]
  async fn rrf_fuses_and_breaks_ties_by_chunk_id() {
    // Providers return [1,2,3] and [2,1,4]; with k=60 and equal weights,
    // {1,2} outrank {3,4}, and 3 vs 4 tie at 1/63 broken by chunk id.
    let hybrid = HybridProvider::new(vec![
      provider(ProviderKind::Semantic, vec![1, 2, 3]),
      provider(ProviderKind::FullText, vec![2, 1, 4]),
    ])
    .unwrap();

    let fused = hybrid
      .get_context("q", &ContextScope::default(), &TokenBudget::new(100_000, 0, 0.0))
      .await
      .unwrap();

    let order: Vec<i64> = fused.iter().map(|s| s.chunk_id).collect();
    assert_eq!(order.len(), 4);
    assert!(order[..2].contains(&1) && order[..2].contains(&2));
    assert_eq!(&order[2..], &[3, 4]);

    let three = fused.iter().find(|s| s.chunk_id == 3).unwrap();
    let four = fused.iter().find(|s| s.chunk_id == 4).unwrap();
    assert_eq!(three.metadata.get("rrf_score"), four.metadata.get("rrf_score"));
  }

  #[tokio::test]
  async fn agreement_reflects_provider_count() {
    let hybrid = HybridProvider::new(vec![
      provider(ProviderKind::Semantic, vec![1, 2]),
      provider(ProviderKind::FullText, vec![1]),
    ])
    .unwrap();

    let fused = hybrid
      .get_context("q", &ContextScope::default(), &TokenBudget::new(100_000, 0, 0.0))
      .await
      .unwrap();

    let one = fused.iter().find(|s| s.chunk_id == 1).unwrap();
    assert_eq!(one.metadata.get("rrf_provider_count").unwrap(), "2");
    assert_eq!(one.metadata.get("rrf_agreement").unwrap(), "1.000");
    assert_eq!(one.metadata.get("sources").unwrap(), "semantic,fulltext");
    assert_eq!(one.metadata.get("source_count").unwrap(), "2");

    let two = fused.iter().find(|s| s.chunk_id == 2).unwrap();
    assert_eq!(two.metadata.get("rrf_agreement").unwrap(), "0.500");
  }

  #[tokio::test]
  async fn skip_strategy_drops_failures() {
    let hybrid = HybridProvider::with_weights(
      vec![
        (provider(ProviderKind::Semantic, vec![1]), 1.0),
        (
          Arc::new(FixedProvider {
            kind: ProviderKind::FullText,
            chunk_ids: vec![],
            fail: true,
          }),
          1.0,
        ),
      ],
      DEFAULT_RRF_K,
      FailureStrategy::Skip,
    )
    .unwrap();

    let fused = hybrid
      .get_context("q", &ContextScope::default(), &TokenBudget::default())
      .await
      .unwrap();
    assert_eq!(fused.len(), 1);
    assert_eq!(fused[0].chunk_id, 1);
  }

  #[tokio::test]
  async fn fail_strategy_surfaces_the_error() {
    let hybrid = HybridProvider::with_weights(
      vec![(
        Arc::new(FixedProvider {
          kind: ProviderKind::Semantic,
          chunk_ids: vec![],
          fail: true,
        }),
        1.0,
      )],
      DEFAULT_RRF_K,
      FailureStrategy::Fail,
    )
    .unwrap();

    assert!(hybrid.get_context("q", &ContextScope::default(), &TokenBudget::default()).await.is_err());
  }

  #[tokio::test]
  async fn invalid_configuration_is_rejected() {
    assert!(HybridProvider::new(Vec::new()).is_err());
    assert!(
      HybridProvider::with_weights(
        vec![(provider(ProviderKind::Semantic, vec![1]), 0.0)],
        DEFAULT_RRF_K,
        FailureStrategy::Skip
      )
      .is_err()
    );
    assert!(
      HybridProvider::with_weights(
        vec![(provider(ProviderKind::Semantic, vec![1]), 1.0)],
        -1.0,
        FailureStrategy::Skip
      )
      .is_err()
    );
  }

  #[tokio::test]
  async fn budget_truncates_fused_results() {
    let hybrid = HybridProvider::new(vec![provider(ProviderKind::Semantic, vec![1, 2, 3, 4, 5])]).unwrap();
    // Each snippet text is 18 chars → 4 tokens under len/4.
    let fused = hybrid
      .get_context("q", &ContextScope::default(), &TokenBudget::new(9, 0, 0.0))
      .await
      .unwrap();
    assert_eq!(fused.len(), 2);
  }
}
