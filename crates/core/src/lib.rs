//! Shared domain types for the Loupe indexing and retrieval engine.
//!
//! Everything in this crate is plain data: file state, chunks, embeddings,
//! symbols, change sets, token budgets, and the layered configuration. The
//! behavior lives in the `catalog`, `index`, and `retrieval` crates.

mod change;
mod chunk;
pub mod config;
mod context;
mod file;
mod language;
mod link;
mod symbol;

pub use change::ChangeSet;
pub use chunk::{CHARS_PER_TOKEN, Chunk, ChunkArtifact, ChunkKind, Embedding, estimate_tokens};
pub use config::Config;
pub use context::{ContextScope, ContextSnippet, TokenBudget};
pub use file::{FileMetadata, FileState};
pub use language::Language;
pub use link::Link;
pub use symbol::{Symbol, SymbolKind};
