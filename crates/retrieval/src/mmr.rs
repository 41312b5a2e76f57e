//! Maximal Marginal Relevance reranking.
//!
//! Greedy selection trading relevance against similarity to what has
//! already been picked:
//!
//! ```text
//! argmax_i  lambda * rel(i) - (1 - lambda) * max_{j in selected} sim(i, j)
//! ```

/// Select up to `limit` item indexes by MMR. `similarity` must be
/// symmetric and in `[0, 1]`.
pub(crate) fn mmr_select<F>(relevance: &[f32], similarity: F, lambda: f32, limit: usize) -> Vec<usize>
where
  F: Fn(usize, usize) -> f32,
{
  let n = relevance.len();
  let limit = limit.min(n);
  let lambda = lambda.clamp(0.0, 1.0);

  let mut selected: Vec<usize> = Vec::with_capacity(limit);
  let mut remaining: Vec<usize> = (0..n).collect();

  while selected.len() < limit && !remaining.is_empty() {
    let mut best_pos = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (pos, &candidate) in remaining.iter().enumerate() {
      let max_sim = selected.iter().map(|&s| similarity(candidate, s)).fold(0.0f32, f32::max);
      let score = lambda * relevance[candidate] - (1.0 - lambda) * max_sim;
      if score > best_score {
        best_score = score;
        best_pos = pos;
      }
    }
    selected.push(remaining.swap_remove(best_pos));
  }
  selected
}

/// Cosine similarity of two equal-length vectors, `0` when degenerate.
pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
  if a.len() != b.len() || a.is_empty() {
    return 0.0;
  }
  let mut dot = 0.0f32;
  let mut norm_a = 0.0f32;
  let mut norm_b = 0.0f32;
  for (x, y) in a.iter().zip(b) {
    dot += x * y;
    norm_a += x * x;
    norm_b += y * y;
  }
  if norm_a == 0.0 || norm_b == 0.0 {
    return 0.0;
  }
  dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Token-overlap similarity for items without vectors (Jaccard over
/// lowercase word sets).
pub(crate) fn token_overlap(a: &str, b: &str) -> f32 {
  let set_a: std::collections::HashSet<String> = crate::text::keywords(a).into_iter().collect();
  let set_b: std::collections::HashSet<String> = crate::text::keywords(b).into_iter().collect();
  if set_a.is_empty() || set_b.is_empty() {
    return 0.0;
  }
  let intersection = set_a.intersection(&set_b).count() as f32;
  let union = set_a.union(&set_b).count() as f32;
  intersection / union
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn cosine_basics() {
    assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
    assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    assert_eq!(cosine(&[1.0], &[1.0, 2.0]), 0.0);
    assert_eq!(cosine(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
  }

  #[test]
  fn pure_relevance_when_lambda_is_one() {
    let relevance = [0.2, 0.9, 0.5];
    let order = mmr_select(&relevance, |_, _| 1.0, 1.0, 3);
    assert_eq!(order, vec![1, 2, 0]);
  }

  #[test]
  fn diversity_penalizes_near_duplicates() {
    // Items 0 and 1 are near-identical; 2 is distinct but less relevant.
    let relevance = [1.0, 0.95, 0.6];
    let similarity = |a: usize, b: usize| {
      if (a == 0 && b == 1) || (a == 1 && b == 0) { 1.0 } else { 0.0 }
    };
    let order = mmr_select(&relevance, similarity, 0.5, 2);
    assert_eq!(order, vec![0, 2]);
  }

  #[test]
  fn token_overlap_sees_shared_words() {
    assert!(token_overlap("batch indexer worker", "worker pool batch") > 0.3);
    assert_eq!(token_overlap("alpha beta", "gamma delta"), 0.0);
  }
}
