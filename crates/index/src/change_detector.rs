use std::{
  collections::{HashMap, HashSet},
  path::{Path, PathBuf},
};

use catalog::Catalog;
use chrono::Utc;
use loupe_core::{ChangeSet, FileState};
use tracing::{debug, warn};

use crate::{IndexError, file_indexer::sort_roots, metadata};

/// Diffs on-disk paths against the catalog and classifies each as new,
/// modified, unchanged, or deleted.
///
/// Identity is the absolute path throughout: relative paths may collide
/// across watch roots, absolute paths cannot.
pub struct ChangeDetector {
  catalog: Catalog,
  /// Sorted by descending length; a path belongs to the first root that
  /// prefixes it.
  roots: Vec<PathBuf>,
}

impl ChangeDetector {
  pub fn new(catalog: Catalog, roots: Vec<PathBuf>) -> Self {
    Self {
      catalog,
      roots: sort_roots(roots),
    }
  }

  pub fn roots(&self) -> &[PathBuf] {
    &self.roots
  }

  fn root_for(&self, abs: &Path) -> Option<&PathBuf> {
    self.roots.iter().find(|root| abs.starts_with(root))
  }

  /// Classify `paths`. With `detect_implicit_deletions`, every active
  /// catalog row is additionally verified against disk, so files removed
  /// outside the watcher's view still surface as deletions.
  pub async fn detect_changes(&self, paths: &[PathBuf], detect_implicit_deletions: bool) -> Result<ChangeSet, IndexError> {
    let mut change_set = ChangeSet {
      scanned_at: Utc::now(),
      ..Default::default()
    };

    let known: HashMap<String, FileState> = self
      .catalog
      .list_all_files()
      .await?
      .into_iter()
      .map(|f| (f.abs_path.clone(), f))
      .collect();

    let mut seen: HashSet<PathBuf> = HashSet::new();

    for path in paths {
      let abs = std::path::absolute(path).unwrap_or_else(|_| path.clone());
      if !seen.insert(abs.clone()) {
        continue; // duplicates collapse by absolute path
      }

      if self.root_for(&abs).is_none() {
        warn!(path = %abs.display(), "path outside all watch roots, rejected");
        change_set.rejected.push(abs);
        continue;
      }

      let abs_str = abs.to_string_lossy().to_string();
      let previous = known.get(&abs_str).filter(|f| f.is_active());

      if !abs.exists() {
        if previous.is_some() {
          change_set.deleted.push(abs);
        }
        continue;
      }
      if !abs.is_file() {
        debug!(path = %abs.display(), "not a regular file, skipped");
        continue;
      }

      let meta = match metadata::extract_async(&abs).await {
        Ok(meta) => meta,
        Err(e) => {
          warn!(path = %abs.display(), error = %e, "metadata extraction failed, rejected");
          change_set.rejected.push(abs);
          continue;
        }
      };

      match previous {
        None => change_set.new.push(abs),
        Some(prev) => {
          let modified = meta.content_hash != prev.content_hash
            || meta.size_bytes != prev.size_bytes
            || meta.modified_time_ns != prev.mtime_ns;
          if modified {
            change_set.modified.push(abs);
          } else {
            change_set.unchanged.push(abs);
          }
        }
      }
    }

    if detect_implicit_deletions {
      for (abs_str, state) in &known {
        if !state.is_active() {
          continue;
        }
        let abs = PathBuf::from(abs_str);
        if seen.contains(&abs) {
          continue;
        }
        if !abs.exists() {
          change_set.deleted.push(abs);
        }
      }
    }

    debug!(
      new = change_set.new.len(),
      modified = change_set.modified.len(),
      unchanged = change_set.unchanged.len(),
      deleted = change_set.deleted.len(),
      rejected = change_set.rejected.len(),
      "change detection complete"
    );
    Ok(change_set)
  }
}
