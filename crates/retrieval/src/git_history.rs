use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Arc,
};

use async_trait::async_trait;
use catalog::Catalog;
use git2::{Repository, Sort};
use loupe_core::{ChunkKind, ContextScope, ContextSnippet, TokenBudget};
use tracing::debug;

use crate::{ContextProvider, ProviderError, ProviderKind, annotate, fit_to_budget};

/// Commits scanned per history computation. Bounded so a long-lived repo
/// cannot turn one retrieval into a full-history walk.
const MAX_WALK: usize = 300;

#[derive(Debug, Clone)]
struct CommitInfo {
  short_id: String,
  summary: String,
  author: String,
}

#[derive(Debug, Default)]
struct FileHistory {
  commits: Vec<CommitInfo>,
  blame_summary: Vec<String>,
  co_changed: Vec<(String, usize)>,
}

/// Git-backed history for a file: recent commits, per-line blame
/// attribution, and files that tend to change together with it.
///
/// Results are cached per relative path with a size cap; `clear_cache`
/// invalidates everything (the watcher calls it after updates).
pub struct GitHistoryProvider {
  repo_root: PathBuf,
  catalog: Catalog,
  cache: moka::sync::Cache<String, Arc<FileHistory>>,
  max_commits: usize,
  min_co_occurrence: usize,
}

impl GitHistoryProvider {
  pub fn new(repo_root: PathBuf, catalog: Catalog) -> Self {
    Self {
      repo_root,
      catalog,
      cache: moka::sync::Cache::new(64),
      max_commits: 10,
      min_co_occurrence: 2,
    }
  }

  pub fn with_min_co_occurrence(mut self, threshold: usize) -> Self {
    self.min_co_occurrence = threshold.max(1);
    self
  }

  pub fn clear_cache(&self) {
    self.cache.invalidate_all();
  }

  fn target_rel_path(&self, query: &str, scope: &ContextScope) -> Option<String> {
    let raw = scope.paths.first().map(String::as_str).unwrap_or(query.trim());
    if raw.is_empty() {
      return None;
    }
    let path = Path::new(raw);
    let rel = if path.is_absolute() {
      path.strip_prefix(&self.repo_root).ok()?.to_path_buf()
    } else {
      path.to_path_buf()
    };
    Some(rel.to_string_lossy().to_string())
  }

  async fn history_for(&self, rel: &str) -> Result<Arc<FileHistory>, ProviderError> {
    if let Some(cached) = self.cache.get(rel) {
      return Ok(cached);
    }

    let repo_root = self.repo_root.clone();
    let rel_owned = rel.to_string();
    let max_commits = self.max_commits;
    let min_co = self.min_co_occurrence;
    let history = tokio::task::spawn_blocking(move || compute_history(&repo_root, &rel_owned, max_commits, min_co))
      .await
      .map_err(|e| ProviderError::Provider(format!("git task failed: {e}")))??;

    let history = Arc::new(history);
    self.cache.insert(rel.to_string(), history.clone());
    Ok(history)
  }
}

fn compute_history(repo_root: &Path, rel: &str, max_commits: usize, min_co: usize) -> Result<FileHistory, ProviderError> {
  let repo = Repository::discover(repo_root)?;
  let mut history = FileHistory::default();

  let mut revwalk = repo.revwalk()?;
  revwalk.push_head()?;
  revwalk.set_sorting(Sort::TIME)?;

  let mut co_counts: HashMap<String, usize> = HashMap::new();
  for oid in revwalk.take(MAX_WALK) {
    let oid = oid?;
    let commit = repo.find_commit(oid)?;
    if commit.parent_count() > 1 {
      continue; // merges attribute changes to their parents
    }

    let tree = commit.tree()?;
    let parent_tree = commit.parent(0).ok().and_then(|p| p.tree().ok());
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

    let mut touched: Vec<String> = Vec::new();
    let mut hit = false;
    for delta in diff.deltas() {
      if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
        let path = path.to_string_lossy().to_string();
        if path == rel {
          hit = true;
        } else {
          touched.push(path);
        }
      }
    }
    if !hit {
      continue;
    }

    if history.commits.len() < max_commits {
      history.commits.push(CommitInfo {
        short_id: oid.to_string().chars().take(8).collect(),
        summary: commit.summary().unwrap_or_default().to_string(),
        author: commit.author().name().unwrap_or_default().to_string(),
      });
    }
    for path in touched {
      *co_counts.entry(path).or_insert(0) += 1;
    }
  }

  // Blame attribution, summarized per commit.
  if let Ok(blame) = repo.blame_file(Path::new(rel), None) {
    let mut lines_by_commit: HashMap<String, usize> = HashMap::new();
    for hunk in blame.iter() {
      let id: String = hunk.final_commit_id().to_string().chars().take(8).collect();
      *lines_by_commit.entry(id).or_insert(0) += hunk.lines_in_hunk();
    }
    let mut attributions: Vec<(String, usize)> = lines_by_commit.into_iter().collect();
    attributions.sort_by(|a, b| b.1.cmp(&a.1));
    history.blame_summary = attributions
      .into_iter()
      .take(5)
      .map(|(id, lines)| format!("{id}: {lines} lines"))
      .collect();
  }

  let mut co_changed: Vec<(String, usize)> = co_counts.into_iter().filter(|(_, n)| *n >= min_co).collect();
  co_changed.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
  co_changed.truncate(10);
  history.co_changed = co_changed;

  debug!(rel, commits = history.commits.len(), co_changed = history.co_changed.len(), "computed git history");
  Ok(history)
}

#[async_trait]
impl ContextProvider for GitHistoryProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::GitHistory
  }

  async fn get_context(
    &self,
    query: &str,
    scope: &ContextScope,
    budget: &TokenBudget,
  ) -> Result<Vec<ContextSnippet>, ProviderError> {
    let Some(rel) = self.target_rel_path(query, scope) else {
      return Ok(Vec::new());
    };

    let history = self.history_for(&rel).await?;
    if history.commits.is_empty() {
      return Ok(Vec::new());
    }

    // Anchor to the file's first chunk when it is indexed.
    let abs = self.repo_root.join(&rel);
    let anchor = self.catalog.first_chunk_for_path(&abs.to_string_lossy()).await?;
    let (chunk_id, language) = anchor.map(|row| (row.chunk.chunk_id, row.language)).unwrap_or((0, None));

    let mut snippets = Vec::new();

    let commit_lines: Vec<String> = history
      .commits
      .iter()
      .map(|c| format!("{} {} ({})", c.short_id, c.summary, c.author))
      .collect();
    snippets.push(ContextSnippet {
      chunk_id,
      score: 0.9,
      file_path: rel.clone(),
      label: format!("recent commits: {rel}"),
      kind: ChunkKind::Text,
      text: commit_lines.join("\n"),
      language,
      start_line: 0,
      end_line: 0,
      metadata: Default::default(),
    });

    if !history.blame_summary.is_empty() {
      snippets.push(ContextSnippet {
        chunk_id,
        score: 0.7,
        file_path: rel.clone(),
        label: format!("blame: {rel}"),
        kind: ChunkKind::Text,
        text: history.blame_summary.join("\n"),
        language,
        start_line: 0,
        end_line: 0,
        metadata: Default::default(),
      });
    }

    if !history.co_changed.is_empty() {
      let lines: Vec<String> = history.co_changed.iter().map(|(path, n)| format!("{path} ({n}x)")).collect();
      snippets.push(ContextSnippet {
        chunk_id,
        score: 0.6,
        file_path: rel.clone(),
        label: format!("co-changed with {rel}"),
        kind: ChunkKind::Text,
        text: lines.join("\n"),
        language,
        start_line: 0,
        end_line: 0,
        metadata: Default::default(),
      });
    }

    for snippet in &mut snippets {
      snippet.metadata.insert("target".to_string(), rel.clone());
    }
    annotate(&mut snippets, ProviderKind::GitHistory);
    Ok(fit_to_budget(snippets, budget))
  }
}

#[cfg(test)]
mod tests {
  use git2::Signature;

  use super::*;

  fn commit_all(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::now("Tester", "tester@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap();
  }

  async fn seeded_repo() -> (tempfile::TempDir, GitHistoryProvider) {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let repo = Repository::init(&root).unwrap();

    std::fs::write(root.join("a.rs"), "fn a() {}").unwrap();
    std::fs::write(root.join("b.rs"), "fn b() {}").unwrap();
    commit_all(&repo, "add a and b");

    std::fs::write(root.join("a.rs"), "fn a() { println!(); }").unwrap();
    std::fs::write(root.join("b.rs"), "fn b() { println!(); }").unwrap();
    commit_all(&repo, "touch a and b together");

    std::fs::write(root.join("a.rs"), "fn a() { /* again */ }").unwrap();
    commit_all(&repo, "a alone");

    let catalog = Catalog::open_in_memory().unwrap();
    let provider = GitHistoryProvider::new(root, catalog);
    (dir, provider)
  }

  #[tokio::test]
  async fn recent_commits_and_co_changes() {
    let (_dir, provider) = seeded_repo().await;
    let snippets = provider
      .get_context("a.rs", &ContextScope::default(), &TokenBudget::default())
      .await
      .unwrap();

    assert!(!snippets.is_empty());
    let commits = &snippets[0];
    assert!(commits.label.starts_with("recent commits"));
    assert!(commits.text.contains("a alone"));
    assert_eq!(commits.metadata.get("provider").unwrap(), "git-history");

    let co = snippets.iter().find(|s| s.label.starts_with("co-changed")).unwrap();
    assert!(co.text.contains("b.rs (2x)"));
  }

  #[tokio::test]
  async fn unknown_file_has_no_history() {
    let (_dir, provider) = seeded_repo().await;
    let snippets = provider
      .get_context("never-committed.rs", &ContextScope::default(), &TokenBudget::default())
      .await
      .unwrap();
    assert!(snippets.is_empty());
  }

  #[tokio::test]
  async fn cache_survives_until_cleared() {
    let (_dir, provider) = seeded_repo().await;
    provider.get_context("a.rs", &ContextScope::default(), &TokenBudget::default()).await.unwrap();
    assert!(provider.cache.get("a.rs").is_some());
    provider.clear_cache();
    // moka invalidation is eventually consistent; run pending work.
    provider.cache.run_pending_tasks();
    assert!(provider.cache.get("a.rs").is_none());
  }

  #[tokio::test]
  async fn non_repo_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let provider = GitHistoryProvider::new(dir.path().to_path_buf(), Catalog::open_in_memory().unwrap());
    let result = provider.get_context("a.rs", &ContextScope::default(), &TokenBudget::default()).await;
    assert!(result.is_err());
  }
}
