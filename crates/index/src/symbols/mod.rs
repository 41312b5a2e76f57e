//! Heuristic symbol extraction.
//!
//! A line scanner keyed by language: package/import lines, type and
//! function declarations, fields, and scope exits via brace counting or
//! indentation. Unknown languages fall back to bare identifier capture.

mod patterns;

use std::sync::LazyLock;

use loupe_core::{Language, Symbol, SymbolKind};
use regex::Regex;

use patterns::{capture_name, patterns_for};

/// Cap on identifiers captured from unrecognized languages.
const MAX_FALLBACK_IDENTIFIERS: usize = 20;

/// Control-flow keywords the loose function patterns can capture in
/// C-family languages.
const KEYWORD_FALSE_POSITIVES: &[&str] = &[
  "if", "else", "for", "while", "switch", "match", "catch", "return", "new", "do", "try", "throw", "sizeof",
];

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]{2,}").expect("identifier regex"));

#[derive(Default)]
pub struct SymbolExtractor;

struct Scope {
  /// Index into the output vector, to set `end_line` on exit.
  symbol_index: usize,
  /// Name contributes to qualification only for type-like scopes.
  qualifies: bool,
  name: String,
  entry_depth: i32,
  entry_indent: usize,
}

impl SymbolExtractor {
  pub fn new() -> Self {
    Self
  }

  /// Scan `text` and return every declaration the heuristics recognize.
  ///
  /// `file_name` is the base name of the file, used only to exclude the
  /// file's own stem from the unknown-language identifier fallback.
  pub fn extract(&self, text: &str, language: Option<Language>, file_name: &str) -> Vec<Symbol> {
    match language.and_then(patterns_for) {
      Some(patterns) => scan_with_patterns(text, language, patterns),
      None => fallback_identifiers(text, language, file_name),
    }
  }
}

fn indent_of(line: &str) -> usize {
  line.len() - line.trim_start().len()
}

fn scan_with_patterns(text: &str, language: Option<Language>, patterns: &patterns::Patterns) -> Vec<Symbol> {
  let mut symbols: Vec<Symbol> = Vec::new();
  let mut package: Option<String> = None;
  let mut scopes: Vec<Scope> = Vec::new();
  let mut brace_depth: i32 = 0;

  for (i, line) in text.lines().enumerate() {
    let line_no = i as u32 + 1;
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    // Close indentation scopes before reading this line's declarations.
    if patterns.indent_scoped {
      let indent = indent_of(line);
      while scopes.last().is_some_and(|s| indent <= s.entry_indent) {
        if let Some(closed) = scopes.pop() {
          let start = symbols[closed.symbol_index].start_line;
          symbols[closed.symbol_index].end_line = line_no.saturating_sub(1).max(start);
        }
      }
    }

    let qualifier = |scopes: &[Scope], package: &Option<String>, member: &str| -> Option<String> {
      let mut parts: Vec<&str> = Vec::new();
      if let Some(p) = package {
        parts.push(p);
      }
      parts.extend(scopes.iter().filter(|s| s.qualifies).map(|s| s.name.as_str()));
      if parts.is_empty() {
        return None;
      }
      parts.push(member);
      Some(parts.join("."))
    };

    let mut matched = false;

    if let Some(ref re) = patterns.package
      && package.is_none()
      && let Some(name) = capture_name(re, line)
    {
      let mut symbol = Symbol::new(SymbolKind::Package, name, line_no);
      symbol.language = language;
      symbols.push(symbol);
      package = Some(name.to_string());
      matched = true;
    }

    if !matched
      && let Some(ref re) = patterns.import
      && let Some(name) = capture_name(re, line)
    {
      let mut symbol = Symbol::new(SymbolKind::Import, name, line_no);
      symbol.language = language;
      symbols.push(symbol);
      matched = true;
    }

    if !matched {
      for (kind, re) in &patterns.types {
        if let Some(name) = capture_name(re, line) {
          let mut symbol = Symbol::new(*kind, name, line_no);
          symbol.qualified_name = qualifier(&scopes, &package, name);
          symbol.signature = Some(trimmed.trim_end_matches(['{', ':', ' ']).to_string());
          symbol.language = language;
          scopes.push(Scope {
            symbol_index: symbols.len(),
            qualifies: true,
            name: name.to_string(),
            entry_depth: brace_depth,
            entry_indent: indent_of(line),
          });
          symbols.push(symbol);
          matched = true;
          break;
        }
      }
    }

    if !matched
      && let Some(ref re) = patterns.function
      && let Some(name) = capture_name(re, line)
      && !KEYWORD_FALSE_POSITIVES.contains(&name)
    {
      let kind = if scopes.iter().any(|s| s.qualifies) {
        SymbolKind::Method
      } else {
        SymbolKind::Function
      };
      let mut symbol = Symbol::new(kind, name, line_no);
      symbol.qualified_name = qualifier(&scopes, &package, name);
      symbol.signature = Some(trimmed.trim_end_matches(['{', ':', ' ']).to_string());
      symbol.language = language;
      scopes.push(Scope {
        symbol_index: symbols.len(),
        qualifies: false,
        name: name.to_string(),
        entry_depth: brace_depth,
        entry_indent: indent_of(line),
      });
      symbols.push(symbol);
      matched = true;
    }

    if !matched
      && scopes.len() <= 1
      && let Some(ref re) = patterns.field
      && let Some(name) = capture_name(re, line)
    {
      let kind = if scopes.is_empty() { SymbolKind::Variable } else { SymbolKind::Field };
      let mut symbol = Symbol::new(kind, name, line_no);
      symbol.qualified_name = qualifier(&scopes, &package, name);
      symbol.language = language;
      symbols.push(symbol);
    }

    // Brace accounting closes scopes for brace-structured languages.
    if !patterns.indent_scoped {
      for ch in line.chars() {
        match ch {
          '{' => brace_depth += 1,
          '}' => {
            brace_depth -= 1;
            while scopes.last().is_some_and(|s| brace_depth <= s.entry_depth) {
              if let Some(closed) = scopes.pop() {
                symbols[closed.symbol_index].end_line = line_no;
              }
            }
          }
          _ => {}
        }
      }
    }
  }

  // Anything still open runs to end of file.
  let last_line = text.lines().count() as u32;
  while let Some(scope) = scopes.pop() {
    symbols[scope.symbol_index].end_line = last_line.max(symbols[scope.symbol_index].start_line);
  }

  symbols
}

/// For unknown languages: up to 20 distinct identifiers other than the
/// file's own stem.
fn fallback_identifiers(text: &str, language: Option<Language>, file_name: &str) -> Vec<Symbol> {
  let stem = file_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(file_name);

  let mut seen = std::collections::HashSet::new();
  let mut symbols = Vec::new();
  for (i, line) in text.lines().enumerate() {
    for m in IDENTIFIER.find_iter(line) {
      let name = m.as_str();
      if name == stem || !seen.insert(name.to_string()) {
        continue;
      }
      let mut symbol = Symbol::new(SymbolKind::Identifier, name, i as u32 + 1);
      symbol.language = language;
      symbols.push(symbol);
      if symbols.len() >= MAX_FALLBACK_IDENTIFIERS {
        return symbols;
      }
    }
  }
  symbols
}
