use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of reconciling on-disk paths against the catalog.
///
/// The four sets are pairwise disjoint by absolute path. `rejected` holds
/// inputs that fell outside every watch root; they do not count toward
/// `total_scanned`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
  pub new: Vec<PathBuf>,
  pub modified: Vec<PathBuf>,
  pub unchanged: Vec<PathBuf>,
  pub deleted: Vec<PathBuf>,
  pub rejected: Vec<PathBuf>,
  pub scanned_at: DateTime<Utc>,
}

impl ChangeSet {
  pub fn total_scanned(&self) -> usize {
    self.new.len() + self.modified.len() + self.unchanged.len() + self.deleted.len()
  }

  pub fn has_changes(&self) -> bool {
    !self.new.is_empty() || !self.modified.is_empty() || !self.deleted.is_empty()
  }

  /// Paths that need (re-)indexing: new plus modified.
  pub fn files_to_index(&self) -> Vec<PathBuf> {
    let mut files = Vec::with_capacity(self.new.len() + self.modified.len());
    files.extend(self.new.iter().cloned());
    files.extend(self.modified.iter().cloned());
    files
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn totals_count_the_four_sets() {
    let set = ChangeSet {
      new: vec![PathBuf::from("/r/a")],
      modified: vec![PathBuf::from("/r/b"), PathBuf::from("/r/c")],
      unchanged: vec![],
      deleted: vec![PathBuf::from("/r/d")],
      rejected: vec![PathBuf::from("/elsewhere/e")],
      scanned_at: Utc::now(),
    };
    assert_eq!(set.total_scanned(), 4);
    assert!(set.has_changes());
    assert_eq!(set.files_to_index().len(), 3);
  }

  #[test]
  fn unchanged_only_is_not_a_change() {
    let set = ChangeSet {
      unchanged: vec![PathBuf::from("/r/a")],
      ..Default::default()
    };
    assert!(!set.has_changes());
  }
}
