//! Query tokenization shared by the lexical providers.

/// English stopwords dropped from keyword queries. Short and boring on
/// purpose: code identifiers rarely collide with these.
const STOPWORDS: &[&str] = &[
  "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "how", "in", "into", "is",
  "it", "its", "new", "no", "not", "of", "on", "or", "s", "so", "t", "that", "the", "their", "then", "there", "these",
  "they", "this", "to", "up", "use", "using", "was", "we", "what", "when", "where", "which", "who", "will", "with",
];

/// Lowercase keyword extraction: alphanumeric runs, stopwords and tokens
/// shorter than two characters dropped, order-preserving and distinct.
pub(crate) fn keywords(query: &str) -> Vec<String> {
  let mut seen = std::collections::HashSet::new();
  let mut out = Vec::new();
  for token in query.split(|c: char| !c.is_alphanumeric() && c != '_') {
    let token = token.trim_matches('_').to_lowercase();
    if token.len() < 2 || STOPWORDS.contains(&token.as_str()) {
      continue;
    }
    if seen.insert(token.clone()) {
      out.push(token);
    }
  }
  out
}

/// Count (case-insensitive) occurrences of `needle` in `haystack`.
pub(crate) fn count_occurrences(haystack: &str, needle: &str) -> usize {
  if needle.is_empty() {
    return 0;
  }
  haystack.to_lowercase().matches(needle).count()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keywords_drop_stopwords_and_short_tokens() {
    let words = keywords("How to use the BatchIndexer with a semaphore?");
    assert_eq!(words, vec!["batchindexer", "semaphore"]);
  }

  #[test]
  fn keywords_are_distinct_and_ordered() {
    let words = keywords("cache cache invalidation cache");
    assert_eq!(words, vec!["cache", "invalidation"]);
  }

  #[test]
  fn identifier_underscores_survive() {
    let words = keywords("sync_file_artifacts");
    assert_eq!(words, vec!["sync_file_artifacts"]);
  }

  #[test]
  fn occurrence_counting_is_case_insensitive() {
    assert_eq!(count_occurrences("Foo foo FOO", "foo"), 3);
  }
}
