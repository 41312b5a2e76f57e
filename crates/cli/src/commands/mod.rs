mod index;
mod search;
mod status;
mod watch;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use catalog::Catalog;
use embedding::{Embedder, HttpEmbedder, RetryEmbedder};
// `::index` disambiguates the crate from the `index` command module.
use ::index::{BatchIndexer, FileIndexer, IncrementalIndexer};
use loupe_core::Config;

pub use self::{index::cmd_index, search::cmd_search, status::cmd_status, watch::cmd_watch};

/// Command outcome distinguishing "ran, but some files failed" from a
/// clean run; configuration errors travel as `anyhow::Error`.
pub enum Outcome {
  Ok,
  IndexingFailures,
}

/// Everything the commands need, wired once.
pub struct Engine {
  pub config: Config,
  pub catalog: Catalog,
  pub file_indexer: Arc<FileIndexer>,
  pub roots: Vec<PathBuf>,
  pub project_dir: PathBuf,
}

impl Engine {
  pub fn batch(&self, parallelism: Option<usize>) -> BatchIndexer {
    let mut batch = BatchIndexer::from_config(self.file_indexer.clone(), &self.config.index);
    if let Some(workers) = parallelism {
      batch = batch.with_parallelism(workers);
    }
    batch
  }

  pub fn incremental(&self, parallelism: Option<usize>) -> IncrementalIndexer {
    IncrementalIndexer::new(self.file_indexer.clone(), self.batch(parallelism))
  }
}

/// Resolve roots, open the catalog under `.loupe/`, and build the file
/// indexer against the configured embedding endpoint.
pub fn build_engine(extra_roots: Vec<PathBuf>) -> Result<Engine> {
  let project_dir = std::env::current_dir().context("cannot determine working directory")?;
  let config = Config::load_for_project(&project_dir);

  let mut roots: Vec<PathBuf> = Vec::new();
  roots.extend(config.index.roots.iter().map(|r| {
    if r.is_absolute() { r.clone() } else { project_dir.join(r) }
  }));
  roots.extend(extra_roots);
  if roots.is_empty() {
    roots.push(project_dir.clone());
  }
  for root in &roots {
    if !root.is_dir() {
      anyhow::bail!("watch root {} is not a directory", root.display());
    }
  }

  let data_dir = project_dir.join(".loupe");
  std::fs::create_dir_all(&data_dir).with_context(|| format!("cannot create {}", data_dir.display()))?;
  let catalog = Catalog::open(&data_dir.join("catalog.db")).context("cannot open catalog")?;

  let http = HttpEmbedder::new(&config.embedding).context("cannot configure embedder")?;
  let embedder: Arc<dyn Embedder> = Arc::new(RetryEmbedder::new(http));

  let file_indexer = Arc::new(FileIndexer::new(
    catalog.clone(),
    embedder,
    config.index.clone(),
    roots.clone(),
  ));

  Ok(Engine {
    config,
    catalog,
    file_indexer,
    roots,
    project_dir,
  })
}
