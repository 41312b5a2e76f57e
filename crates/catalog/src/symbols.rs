use loupe_core::{Language, Symbol, SymbolKind};
use rusqlite::params;

use crate::{Catalog, CatalogError};

/// A symbol joined with its file, the shape the symbol provider ranks.
#[derive(Debug, Clone)]
pub struct SymbolRow {
  pub symbol: Symbol,
  pub file_id: i64,
  pub rel_path: String,
  pub abs_path: String,
}

impl Catalog {
  /// Symbols whose name contains any of the query tokens
  /// (case-insensitive). Ranking happens in the provider.
  pub async fn find_symbols(&self, tokens: &[String], limit: usize) -> Result<Vec<SymbolRow>, CatalogError> {
    if tokens.is_empty() {
      return Ok(Vec::new());
    }
    let patterns: Vec<String> = tokens.iter().map(|t| format!("%{}%", t.replace('%', "\\%"))).collect();
    self
      .query(move |conn| {
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for pattern in &patterns {
          let mut stmt = conn.prepare(
            "SELECT s.symbol_id, s.symbol_type, s.name, s.qualified_name, s.signature, s.language,
                    s.start_line, s.end_line, s.file_id, f.rel_path, f.abs_path
             FROM symbols s JOIN file_state f ON f.file_id = s.file_id
             WHERE f.is_deleted = 0 AND s.name LIKE ?1 ESCAPE '\\'
             LIMIT ?2",
          )?;
          let rows = stmt.query_map(params![pattern, limit as i64], |row| {
            let symbol_id: i64 = row.get(0)?;
            let symbol_type: String = row.get(1)?;
            let language: Option<String> = row.get(5)?;
            Ok((
              symbol_id,
              SymbolRow {
                symbol: Symbol {
                  symbol_type: SymbolKind::parse(&symbol_type).unwrap_or(SymbolKind::Identifier),
                  name: row.get(2)?,
                  qualified_name: row.get(3)?,
                  signature: row.get(4)?,
                  language: language.as_deref().and_then(Language::parse),
                  start_line: row.get(6)?,
                  end_line: row.get(7)?,
                },
                file_id: row.get(8)?,
                rel_path: row.get(9)?,
                abs_path: row.get(10)?,
              },
            ))
          })?;
          for row in rows {
            let (symbol_id, symbol_row) = row?;
            if seen.insert(symbol_id) {
              out.push(symbol_row);
            }
            if out.len() >= limit {
              return Ok(out);
            }
          }
        }
        Ok(out)
      })
      .await
  }

  pub async fn symbols_for_file(&self, file_id: i64) -> Result<Vec<Symbol>, CatalogError> {
    self
      .query(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT symbol_type, name, qualified_name, signature, language, start_line, end_line
           FROM symbols WHERE file_id = ?1 ORDER BY start_line",
        )?;
        let rows = stmt.query_map(params![file_id], |row| {
          let symbol_type: String = row.get(0)?;
          let language: Option<String> = row.get(4)?;
          Ok(Symbol {
            symbol_type: SymbolKind::parse(&symbol_type).unwrap_or(SymbolKind::Identifier),
            name: row.get(1)?,
            qualified_name: row.get(2)?,
            signature: row.get(3)?,
            language: language.as_deref().and_then(Language::parse),
            start_line: row.get(5)?,
            end_line: row.get(6)?,
          })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
      })
      .await
  }
}

#[cfg(test)]
mod tests {
  use crate::tests::{test_artifact, test_file_state};

  use super::*;

  #[tokio::test]
  async fn symbols_replace_and_search() {
    let catalog = Catalog::open_in_memory().unwrap();
    let file = test_file_state("/r/auth.rs", "auth.rs", "h");
    let file_id = catalog
      .sync_file_artifacts(file, vec![test_artifact(0, "fn authenticate() {}", 4)], Vec::new())
      .await
      .unwrap();

    let symbol = Symbol {
      language: Some(Language::Rust),
      signature: Some("fn authenticate()".into()),
      ..Symbol::new(SymbolKind::Function, "authenticate", 1)
    };
    catalog.replace_symbols_for_file(file_id, vec![symbol]).await.unwrap();

    let found = catalog.find_symbols(&["authent".to_string()], 10).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].symbol.name, "authenticate");
    assert_eq!(found[0].abs_path, "/r/auth.rs");

    // Replacement clears prior rows.
    catalog.replace_symbols_for_file(file_id, Vec::new()).await.unwrap();
    assert!(catalog.symbols_for_file(file_id).await.unwrap().is_empty());
  }
}
