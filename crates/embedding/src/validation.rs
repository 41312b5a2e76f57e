//! Shape checks for embedder responses.
//!
//! A backend that returns the wrong number of vectors or the wrong
//! dimension would silently corrupt the index, so every response is
//! validated before it reaches the catalog.

use crate::EmbeddingError;

/// Verify the batch contract: one vector per input, each of `dimension`.
pub fn ensure_batch_shape(expected_count: usize, dimension: usize, vectors: &[Vec<f32>]) -> Result<(), EmbeddingError> {
  if vectors.len() != expected_count {
    return Err(EmbeddingError::WrongCardinality {
      expected: expected_count,
      got: vectors.len(),
    });
  }
  for (index, vector) in vectors.iter().enumerate() {
    if vector.len() != dimension {
      return Err(EmbeddingError::WrongDimension {
        expected: dimension,
        got: vector.len(),
        index,
      });
    }
  }
  Ok(())
}
