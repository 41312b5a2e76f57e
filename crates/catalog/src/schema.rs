use rusqlite::Connection;

use crate::CatalogError;

/// Catalog schema.
///
/// `file_state.abs_path` is unique among active rows only, so a tombstone
/// can coexist with a re-created file at the same path. All artifact
/// tables cascade from `file_state` / `chunks`.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, strftime('%s', 'now'));

CREATE TABLE IF NOT EXISTS file_state (
    file_id INTEGER PRIMARY KEY,
    rel_path TEXT NOT NULL,
    abs_path TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    mtime_ns INTEGER NOT NULL,
    language TEXT,
    kind TEXT NOT NULL,
    fingerprint TEXT,
    indexed_at INTEGER NOT NULL,
    is_deleted INTEGER NOT NULL DEFAULT 0
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_file_state_active_abs
    ON file_state(abs_path) WHERE is_deleted = 0;
CREATE INDEX IF NOT EXISTS idx_file_state_rel ON file_state(rel_path);

CREATE TABLE IF NOT EXISTS chunks (
    chunk_id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL REFERENCES file_state(file_id) ON DELETE CASCADE,
    ordinal INTEGER NOT NULL,
    kind TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    token_count INTEGER NOT NULL,
    content TEXT NOT NULL,
    summary TEXT,
    created_at INTEGER NOT NULL,
    UNIQUE(file_id, ordinal)
);

CREATE INDEX IF NOT EXISTS idx_chunks_file ON chunks(file_id);

CREATE TABLE IF NOT EXISTS embeddings (
    id INTEGER PRIMARY KEY,
    chunk_id INTEGER NOT NULL REFERENCES chunks(chunk_id) ON DELETE CASCADE,
    model TEXT NOT NULL,
    dimensions INTEGER NOT NULL,
    vector BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    UNIQUE(chunk_id, model)
);

CREATE INDEX IF NOT EXISTS idx_embeddings_model ON embeddings(model);

CREATE TABLE IF NOT EXISTS symbols (
    symbol_id INTEGER PRIMARY KEY,
    file_id INTEGER NOT NULL REFERENCES file_state(file_id) ON DELETE CASCADE,
    symbol_type TEXT NOT NULL,
    name TEXT NOT NULL,
    qualified_name TEXT,
    signature TEXT,
    language TEXT,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);

CREATE TABLE IF NOT EXISTS links (
    link_id INTEGER PRIMARY KEY,
    from_chunk INTEGER NOT NULL REFERENCES chunks(chunk_id) ON DELETE CASCADE,
    to_chunk INTEGER REFERENCES chunks(chunk_id) ON DELETE CASCADE,
    to_file INTEGER REFERENCES file_state(file_id) ON DELETE CASCADE,
    link_type TEXT NOT NULL,
    label TEXT,
    score REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS usage_metrics (
    metric_id TEXT PRIMARY KEY,
    task_id TEXT,
    snippets_returned INTEGER NOT NULL,
    total_tokens INTEGER NOT NULL,
    retrieval_latency_ms INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);
"#;

pub(crate) fn init_schema(conn: &Connection) -> Result<(), CatalogError> {
  conn.execute_batch(SCHEMA)?;
  Ok(())
}
