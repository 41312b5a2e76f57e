//! Watch-root scanning.
//!
//! Enumerates candidate files under the configured roots, honoring
//! `.gitignore` and a repo-local `.loupeignore`, skipping hidden entries
//! and VCS internals.

use std::path::PathBuf;

use ignore::WalkBuilder;
use tracing::{debug, warn};

/// Enumerate regular files under `roots`.
///
/// Output order is stable (sorted) so repeated scans diff cleanly.
pub fn scan_roots(roots: &[PathBuf]) -> Vec<PathBuf> {
  let mut files = Vec::new();

  for root in roots {
    if !root.is_dir() {
      warn!(root = %root.display(), "watch root is not a directory, skipped");
      continue;
    }

    let walker = WalkBuilder::new(root)
      .hidden(true)
      .git_ignore(true)
      .git_exclude(true)
      // Honor .gitignore even in trees that are not git repositories.
      .require_git(false)
      .follow_links(false)
      .add_custom_ignore_filename(".loupeignore")
      .build();

    for entry in walker {
      let entry = match entry {
        Ok(entry) => entry,
        Err(e) => {
          debug!(error = %e, "walk error");
          continue;
        }
      };
      if entry.file_type().is_some_and(|t| t.is_file()) {
        files.push(entry.into_path());
      }
    }
  }

  files.sort();
  files.dedup();
  debug!(count = files.len(), "scanned watch roots");
  files
}
