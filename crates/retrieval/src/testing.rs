//! Shared fixtures for retrieval tests: a deterministic embedder and a
//! small seeded catalog.

use std::sync::Arc;

use async_trait::async_trait;
use catalog::Catalog;
use embedding::{Embedder, EmbeddingError};
use loupe_core::{Chunk, ChunkArtifact, ChunkKind, Embedding, FileState, Language, Symbol, SymbolKind};

pub(crate) const DIM: usize = 8;

pub(crate) struct MockEmbedder;

pub(crate) fn vector_for(text: &str) -> Vec<f32> {
  let seed: u64 = text.bytes().map(u64::from).sum();
  (0..DIM)
    .map(|i| ((seed.wrapping_mul(31).wrapping_add(i as u64 * 7)) % 97) as f32 / 97.0)
    .collect()
}

#[async_trait]
impl Embedder for MockEmbedder {
  fn model(&self) -> &str {
    "mock-model"
  }

  fn dimension(&self) -> usize {
    DIM
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    Ok(vector_for(text))
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    Ok(texts.iter().map(|t| vector_for(t)).collect())
  }
}

pub(crate) fn chunk(ordinal: u32, kind: ChunkKind, start: u32, end: u32, content: &str) -> ChunkArtifact {
  let mut chunk = Chunk::new(kind, start, end, content.to_string());
  chunk.ordinal = ordinal;
  ChunkArtifact {
    embedding: Some(Embedding::new("mock-model", vector_for(content))),
    chunk,
  }
}

fn file_state(abs: &str, rel: &str, language: Language, kind: &str) -> FileState {
  FileState {
    file_id: 0,
    rel_path: rel.to_string(),
    abs_path: abs.to_string(),
    content_hash: format!("hash-{rel}"),
    size_bytes: 128,
    mtime_ns: 1_700_000_000_000_000_000,
    language: Some(language),
    kind: kind.to_string(),
    fingerprint: None,
    indexed_at: chrono::Utc::now(),
    is_deleted: false,
  }
}

/// Two code files and one document, with embeddings and symbols.
pub(crate) async fn seeded_catalog() -> Catalog {
  let catalog = Catalog::open_in_memory().unwrap();

  let auth = file_state("/repo/src/auth.rs", "src/auth.rs", Language::Rust, "code");
  let auth_id = catalog
    .sync_file_artifacts(
      auth,
      vec![
        chunk(0, ChunkKind::CodeFunction, 1, 8, "fn authenticate(user: &User) -> Result<Session, AuthError> { check_password(user) }"),
        chunk(1, ChunkKind::CodeFunction, 10, 14, "fn logout(session: Session) { session.invalidate() }"),
      ],
      Vec::new(),
    )
    .await
    .unwrap();
  catalog
    .replace_symbols_for_file(
      auth_id,
      vec![
        Symbol {
          symbol_type: SymbolKind::Function,
          name: "authenticate".into(),
          qualified_name: Some("auth.authenticate".into()),
          signature: Some("fn authenticate(user: &User) -> Result<Session, AuthError>".into()),
          language: Some(Language::Rust),
          start_line: 1,
          end_line: 8,
        },
        Symbol {
          symbol_type: SymbolKind::Function,
          name: "logout".into(),
          qualified_name: Some("auth.logout".into()),
          signature: Some("fn logout(session: Session)".into()),
          language: Some(Language::Rust),
          start_line: 10,
          end_line: 14,
        },
      ],
    )
    .await
    .unwrap();

  let store = file_state("/repo/src/store.rs", "src/store.rs", Language::Rust, "code");
  catalog
    .sync_file_artifacts(
      store,
      vec![chunk(0, ChunkKind::CodeClass, 1, 12, "pub struct SessionStore { sessions: HashMap<Uuid, Session> }")],
      Vec::new(),
    )
    .await
    .unwrap();

  let readme = file_state("/repo/README.md", "README.md", Language::Markdown, "text");
  catalog
    .sync_file_artifacts(
      readme,
      vec![chunk(0, ChunkKind::Paragraph, 1, 4, "Installation instructions: run the setup script and configure authentication.")],
      Vec::new(),
    )
    .await
    .unwrap();

  catalog
}

pub(crate) fn mock_embedder() -> Arc<dyn Embedder> {
  Arc::new(MockEmbedder)
}
