use std::{sync::Arc, time::Instant};

use catalog::{Catalog, UsageMetric};
use loupe_core::{ContextScope, ContextSnippet, TokenBudget};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{ContextProvider, QueryOptimizer, QueryOptimizerConfig, annotate, fit_to_budget};

/// Routing hint from the task orchestrator; sizes the token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskComplexity {
  Low,
  #[default]
  Medium,
  High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
  pub description: String,
  pub task_id: Option<String>,
  pub complexity: TaskComplexity,
}

impl TaskSpec {
  pub fn new(description: impl Into<String>) -> Self {
    Self {
      description: description.into(),
      task_id: None,
      complexity: TaskComplexity::default(),
    }
  }

  pub fn budget(&self) -> TokenBudget {
    match self.complexity {
      TaskComplexity::Low => TokenBudget::new(2048, 256, 0.3),
      TaskComplexity::Medium => TokenBudget::new(4096, 512, 0.3),
      TaskComplexity::High => TokenBudget::new(8192, 1024, 0.3),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStats {
  pub provider: String,
  pub snippet_count: usize,
  pub duration_ms: u64,
  pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalDiagnostics {
  pub providers: Vec<ProviderStats>,
  pub total_duration_ms: u64,
  pub warnings: Vec<String>,
  pub tokens_requested: usize,
  pub tokens_used: usize,
  pub fallback_used: bool,
}

/// What the task router consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskContext {
  pub snippets: Vec<ContextSnippet>,
  pub diagnostics: RetrievalDiagnostics,
}

/// Glue over the providers: budget from task complexity, per-provider
/// optimization, global dedup and sort, a one-shot fallback, and usage
/// accounting. Provider failures become diagnostics entries, never an
/// overall failure.
pub struct ContextRetrievalModule {
  /// Each provider gets its own optimizer so per-query memoization never
  /// leaks one backend's results into another's.
  providers: Vec<(Arc<dyn ContextProvider>, QueryOptimizer)>,
  fallback: Option<Arc<dyn ContextProvider>>,
  catalog: Option<Catalog>,
}

impl ContextRetrievalModule {
  pub fn new(providers: Vec<Arc<dyn ContextProvider>>, optimizer_config: QueryOptimizerConfig) -> Self {
    Self {
      providers: providers
        .into_iter()
        .map(|p| (p, QueryOptimizer::new(optimizer_config.clone())))
        .collect(),
      fallback: None,
      catalog: None,
    }
  }

  /// Provider tried once when every configured provider returns empty.
  pub fn with_fallback(mut self, fallback: Arc<dyn ContextProvider>) -> Self {
    self.fallback = Some(fallback);
    self
  }

  /// Enables usage-metric recording.
  pub fn with_catalog(mut self, catalog: Catalog) -> Self {
    self.catalog = Some(catalog);
    self
  }

  pub async fn retrieve(&self, task: &TaskSpec, scope: &ContextScope) -> TaskContext {
    let budget = task.budget();
    let started = Instant::now();
    let mut diagnostics = RetrievalDiagnostics {
      tokens_requested: budget.available_for_snippets(),
      ..Default::default()
    };

    let mut collected: Vec<ContextSnippet> = Vec::new();
    for (provider, optimizer) in &self.providers {
      let provider_started = Instant::now();
      match provider.get_context(&task.description, scope, &budget).await {
        Ok(raw) => {
          let optimized = optimizer.optimize(&task.description, raw, &budget);
          diagnostics.providers.push(ProviderStats {
            provider: provider.kind().as_str().to_string(),
            snippet_count: optimized.len(),
            duration_ms: provider_started.elapsed().as_millis() as u64,
            error: None,
          });
          collected.extend(optimized);
        }
        Err(e) => {
          warn!(provider = provider.kind().as_str(), error = %e, "provider failed");
          diagnostics.providers.push(ProviderStats {
            provider: provider.kind().as_str().to_string(),
            snippet_count: 0,
            duration_ms: provider_started.elapsed().as_millis() as u64,
            error: Some(e.to_string()),
          });
        }
      }
    }

    if collected.is_empty()
      && let Some(ref fallback) = self.fallback
    {
      debug!("all providers empty, trying fallback");
      let fallback_started = Instant::now();
      match fallback.get_context(&task.description, scope, &budget).await {
        Ok(mut raw) => {
          annotate(&mut raw, fallback.kind());
          diagnostics.providers.push(ProviderStats {
            provider: format!("fallback:{}", fallback.kind().as_str()),
            snippet_count: raw.len(),
            duration_ms: fallback_started.elapsed().as_millis() as u64,
            error: None,
          });
          diagnostics.fallback_used = true;
          collected = raw;
        }
        Err(e) => {
          diagnostics.providers.push(ProviderStats {
            provider: format!("fallback:{}", fallback.kind().as_str()),
            snippet_count: 0,
            duration_ms: fallback_started.elapsed().as_millis() as u64,
            error: Some(e.to_string()),
          });
        }
      }
    }

    // Global dedup keeps the best-scoring copy of each chunk, then a
    // deterministic sort: score desc, path, chunk id.
    let mut best: std::collections::HashMap<i64, ContextSnippet> = std::collections::HashMap::new();
    for snippet in collected {
      match best.get(&snippet.chunk_id) {
        Some(existing) if existing.score >= snippet.score => {}
        _ => {
          best.insert(snippet.chunk_id, snippet);
        }
      }
    }
    let mut snippets: Vec<ContextSnippet> = best.into_values().collect();
    snippets.sort_by(|a, b| {
      b.score
        .partial_cmp(&a.score)
        .unwrap_or(std::cmp::Ordering::Equal)
        .then_with(|| a.file_path.cmp(&b.file_path))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    let snippets = fit_to_budget(snippets, &budget);

    if snippets.is_empty() {
      diagnostics.warnings.push("No providers returned context".to_string());
    }

    diagnostics.tokens_used = snippets.iter().map(|s| s.token_cost()).sum();
    diagnostics.total_duration_ms = started.elapsed().as_millis() as u64;

    if let Some(ref catalog) = self.catalog {
      let metric = UsageMetric::new(
        task.task_id.clone(),
        snippets.len(),
        diagnostics.tokens_used,
        diagnostics.total_duration_ms,
      );
      if let Err(e) = catalog.record_usage(metric).await {
        warn!(error = %e, "usage metric write failed");
      }
    }

    info!(
      snippets = snippets.len(),
      tokens = diagnostics.tokens_used,
      duration_ms = diagnostics.total_duration_ms,
      fallback = diagnostics.fallback_used,
      "context retrieval complete"
    );
    TaskContext {
      snippets,
      diagnostics,
    }
  }
}

#[cfg(test)]
mod tests {
  use async_trait::async_trait;
  use loupe_core::ChunkKind;

  use crate::{ProviderError, ProviderKind};

  use super::*;

  struct StubProvider {
    kind: ProviderKind,
    chunk_ids: Vec<i64>,
    fail: bool,
  }

  #[async_trait]
  impl ContextProvider for StubProvider {
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
        return Err(ProviderError::Provider("stub failure".into()));
      }
      Ok(
        self
          .chunk_ids
          .iter()
          .enumerate()
          .map(|(i, &chunk_id)| ContextSnippet {
            chunk_id,
            score: 0.9 - i as f32 * 0.1,
            file_path: format!("src/f{chunk_id}.rs"),
            label: format!("chunk {chunk_id}"),
            kind: ChunkKind::CodeBlock,
            text: format!("text for {chunk_id}"),
            language: None,
            start_line: 1,
            end_line: 2,
            metadata: Default::default(),
          })
          .collect(),
      )
    }
  }

  fn stub(kind: ProviderKind, chunk_ids: Vec<i64>) -> Arc<dyn ContextProvider> {
    Arc::new(StubProvider {
      kind,
      chunk_ids,
      fail: false,
    })
  }

  fn failing(kind: ProviderKind) -> Arc<dyn ContextProvider> {
    Arc::new(StubProvider {
      kind,
      chunk_ids: Vec::new(),
      fail: true,
    })
  }

  #[tokio::test]
  async fn merges_and_dedupes_across_providers() {
    let module = ContextRetrievalModule::new(
      vec![
        stub(ProviderKind::Semantic, vec![1, 2]),
        stub(ProviderKind::FullText, vec![2, 3]),
      ],
      QueryOptimizerConfig::default(),
    );

    let context = module.retrieve(&TaskSpec::new("find things"), &ContextScope::default()).await;
    let ids: Vec<i64> = context.snippets.iter().map(|s| s.chunk_id).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(&1) && ids.contains(&2) && ids.contains(&3));
    assert!(context.diagnostics.providers.len() == 2);
    assert!(context.diagnostics.tokens_used > 0);
  }

  #[tokio::test]
  async fn provider_failure_is_a_diagnostic_not_an_error() {
    let module = ContextRetrievalModule::new(
      vec![failing(ProviderKind::Symbol), stub(ProviderKind::Semantic, vec![7])],
      QueryOptimizerConfig::default(),
    );

    let context = module.retrieve(&TaskSpec::new("query"), &ContextScope::default()).await;
    assert_eq!(context.snippets.len(), 1);
    let failed = context.diagnostics.providers.iter().find(|p| p.provider == "symbol").unwrap();
    assert!(failed.error.is_some());
  }

  #[tokio::test]
  async fn fallback_runs_once_when_everything_is_empty() {
    let module = ContextRetrievalModule::new(vec![stub(ProviderKind::Symbol, vec![])], QueryOptimizerConfig::default())
      .with_fallback(stub(ProviderKind::Semantic, vec![42]));

    let context = module.retrieve(&TaskSpec::new("query"), &ContextScope::default()).await;
    assert!(context.diagnostics.fallback_used);
    assert_eq!(context.snippets.len(), 1);
    assert_eq!(context.snippets[0].chunk_id, 42);
  }

  #[tokio::test]
  async fn empty_everything_warns() {
    let module = ContextRetrievalModule::new(vec![failing(ProviderKind::Semantic)], QueryOptimizerConfig::default());
    let context = module.retrieve(&TaskSpec::new("query"), &ContextScope::default()).await;
    assert!(context.snippets.is_empty());
    assert!(
      context
        .diagnostics
        .warnings
        .iter()
        .any(|w| w == "No providers returned context")
    );
  }

  #[tokio::test]
  async fn budget_scales_with_complexity() {
    let low = TaskSpec {
      complexity: TaskComplexity::Low,
      ..TaskSpec::new("q")
    };
    let high = TaskSpec {
      complexity: TaskComplexity::High,
      ..TaskSpec::new("q")
    };
    assert!(high.budget().available_for_snippets() > low.budget().available_for_snippets());
  }

  #[tokio::test]
  async fn usage_metrics_are_recorded_when_catalog_attached() {
    let catalog = catalog::Catalog::open_in_memory().unwrap();
    let module = ContextRetrievalModule::new(vec![stub(ProviderKind::Semantic, vec![1])], QueryOptimizerConfig::default())
      .with_catalog(catalog.clone());

    let task = TaskSpec {
      task_id: Some("task-9".into()),
      ..TaskSpec::new("query")
    };
    let context = module.retrieve(&task, &ContextScope::default()).await;
    assert_eq!(context.snippets.len(), 1);
    // The metric row lands without error; stats() proves the catalog is live.
    assert!(catalog.stats().await.is_ok());
  }
}
