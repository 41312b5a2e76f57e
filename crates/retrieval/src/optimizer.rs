use std::{sync::Arc, time::Duration};

use loupe_core::{ContextSnippet, TokenBudget, config::RetrievalConfig};
use tracing::debug;

use crate::{fit_to_budget, mmr};

#[derive(Debug, Clone)]
pub struct QueryOptimizerConfig {
  pub min_score_threshold: f32,
  pub default_k: usize,
  pub use_mmr: bool,
  pub mmr_lambda: f32,
  pub cache_size: u64,
  pub cache_ttl: Duration,
}

impl Default for QueryOptimizerConfig {
  fn default() -> Self {
    Self {
      min_score_threshold: 0.05,
      default_k: 20,
      use_mmr: true,
      mmr_lambda: 0.7,
      cache_size: 64,
      cache_ttl: Duration::from_secs(600),
    }
  }
}

impl From<&RetrievalConfig> for QueryOptimizerConfig {
  fn from(config: &RetrievalConfig) -> Self {
    Self {
      min_score_threshold: config.min_score_threshold,
      default_k: config.default_k,
      use_mmr: true,
      mmr_lambda: config.mmr_lambda,
      cache_size: config.cache_size,
      cache_ttl: Duration::from_secs(config.cache_ttl_secs),
    }
  }
}

/// Post-processor for raw provider results: score threshold, top-k
/// truncation, optional MMR rerank, and per-query memoization.
///
/// The cache is LRU-bounded with a per-entry TTL; expired entries are
/// pruned on each call. Keys are the normalized lowercase query, so a
/// repeat question within the TTL returns the exact same snippet list.
pub struct QueryOptimizer {
  config: QueryOptimizerConfig,
  cache: moka::sync::Cache<String, Arc<Vec<ContextSnippet>>>,
}

impl Default for QueryOptimizer {
  fn default() -> Self {
    Self::new(QueryOptimizerConfig::default())
  }
}

impl QueryOptimizer {
  pub fn new(config: QueryOptimizerConfig) -> Self {
    let cache = moka::sync::Cache::builder()
      .max_capacity(config.cache_size)
      .time_to_live(config.cache_ttl)
      .build();
    Self { config, cache }
  }

  fn cache_key(query: &str) -> String {
    query.trim().to_lowercase()
  }

  pub fn optimize(&self, query: &str, results: Vec<ContextSnippet>, budget: &TokenBudget) -> Vec<ContextSnippet> {
    self.cache.run_pending_tasks();

    let key = Self::cache_key(query);
    if let Some(cached) = self.cache.get(&key) {
      debug!(query = %key, "optimizer cache hit");
      return cached.as_ref().clone();
    }

    let mut kept: Vec<ContextSnippet> = results
      .into_iter()
      .filter(|s| s.score >= self.config.min_score_threshold)
      .collect();
    kept.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    kept.truncate(self.config.default_k);

    let optimized = if self.config.use_mmr && kept.len() > 1 {
      let relevance: Vec<f32> = kept.iter().map(|s| s.score).collect();
      let texts: Vec<&str> = kept.iter().map(|s| s.text.as_str()).collect();
      let picked = mmr::mmr_select(
        &relevance,
        |a, b| mmr::token_overlap(texts[a], texts[b]),
        self.config.mmr_lambda,
        kept.len(),
      );
      let mut slots: Vec<Option<ContextSnippet>> = kept.into_iter().map(Some).collect();
      let reordered: Vec<ContextSnippet> = picked.into_iter().filter_map(|i| slots[i].take()).collect();
      fit_to_budget(reordered, budget)
    } else {
      fit_to_budget(kept, budget)
    };

    self.cache.insert(key, Arc::new(optimized.clone()));
    optimized
  }

  pub fn invalidate(&self) {
    self.cache.invalidate_all();
  }
}
