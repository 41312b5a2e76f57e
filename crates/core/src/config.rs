//! Layered configuration with per-project overrides.
//!
//! Priority: project-relative `.loupe.toml` > user
//! `~/.config/loupe/config.toml` > built-in defaults. Environment
//! variables are applied last and win over both files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment override for the embedding model id.
pub const ENV_EMBEDDING_MODEL: &str = "LOUPE_EMBEDDING_MODEL";
/// Environment override for the per-file size limit, in bytes.
pub const ENV_MAX_FILE_SIZE: &str = "LOUPE_MAX_FILE_SIZE";
/// Environment override for indexing parallelism.
pub const ENV_PARALLELISM: &str = "LOUPE_PARALLELISM";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  pub index: IndexConfig,
  pub embedding: EmbeddingConfig,
  pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
  /// Watch roots, absolute or relative to the project directory.
  pub roots: Vec<PathBuf>,
  /// Hard per-file limit; larger files fail with a size-limit outcome.
  pub max_file_size: u64,
  /// Soft limit that only logs a warning.
  pub warn_file_size: u64,
  pub embedding_batch_size: usize,
  /// Worker count for batch indexing; `None` means `max(1, cpus - 1)`.
  pub parallelism: Option<usize>,
  /// Debounce window for watch mode, milliseconds.
  pub watch_debounce_ms: u64,
}

impl Default for IndexConfig {
  fn default() -> Self {
    Self {
      roots: Vec::new(),
      max_file_size: 5 * 1024 * 1024,
      warn_file_size: 2 * 1024 * 1024,
      embedding_batch_size: 64,
      parallelism: None,
      watch_debounce_ms: 500,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
  /// Base URL of an Ollama-compatible embedding endpoint.
  pub url: String,
  pub model: String,
  pub dimensions: usize,
  pub timeout_secs: u64,
  /// Retries for transient HTTP failures.
  pub max_retries: u32,
}

impl Default for EmbeddingConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:11434".to_string(),
      model: "nomic-embed-text".to_string(),
      dimensions: 768,
      timeout_secs: 60,
      max_retries: 3,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
  /// RRF rank constant; must stay positive.
  pub rrf_k: f32,
  /// Per-provider fusion weights; unlisted providers default to 1.0.
  pub provider_weights: std::collections::BTreeMap<String, f32>,
  pub min_score_threshold: f32,
  pub default_k: usize,
  pub mmr_lambda: f32,
  pub cache_size: u64,
  pub cache_ttl_secs: u64,
}

impl Default for RetrievalConfig {
  fn default() -> Self {
    Self {
      rrf_k: 60.0,
      provider_weights: Default::default(),
      min_score_threshold: 0.05,
      default_k: 20,
      mmr_lambda: 0.7,
      cache_size: 64,
      cache_ttl_secs: 600,
    }
  }
}

impl Config {
  /// Load configuration for a project directory.
  ///
  /// Missing or malformed files fall back to the next layer; this never
  /// fails, so the engine always starts with usable settings.
  pub fn load_for_project(project_dir: &Path) -> Self {
    let mut config = Self::default();

    if let Some(user) = Self::read_file(&Self::user_config_path()) {
      config = user;
    }
    if let Some(project) = Self::read_file(&project_dir.join(".loupe.toml")) {
      config = project;
    }

    config.apply_env_overrides();
    config
  }

  fn user_config_path() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("loupe").join("config.toml")
  }

  fn read_file(path: &Path) -> Option<Self> {
    let raw = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&raw) {
      Ok(config) => Some(config),
      Err(e) => {
        // A broken config file should not take the engine down.
        eprintln!("ignoring malformed config {}: {e}", path.display());
        None
      }
    }
  }

  fn apply_env_overrides(&mut self) {
    if let Ok(model) = std::env::var(ENV_EMBEDDING_MODEL)
      && !model.trim().is_empty()
    {
      self.embedding.model = model;
    }
    if let Ok(raw) = std::env::var(ENV_MAX_FILE_SIZE)
      && let Ok(bytes) = raw.parse::<u64>()
    {
      self.index.max_file_size = bytes;
    }
    if let Ok(raw) = std::env::var(ENV_PARALLELISM)
      && let Ok(workers) = raw.parse::<usize>()
    {
      self.index.parallelism = Some(workers.max(1));
    }
  }
}
