use std::{path::Path, sync::LazyLock};

use loupe_core::{Chunk, ChunkKind, Language};
use regex::Regex;

use super::Chunker;

/// Declaration openers shared across brace languages, plus `def` for the
/// indent-scoped ones. Recall over precision: a false boundary just makes
/// one extra chunk.
static CLASS_START: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"^\s*(?:pub(?:\([^)]*\))?\s+|export\s+(?:default\s+)?|public\s+|private\s+|internal\s+|abstract\s+|final\s+|open\s+|sealed\s+|data\s+|static\s+)*(?:class|struct|enum|interface|trait|impl|object|union)\b",
  )
  .expect("class regex")
});

static FUNCTION_START: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"^\s*(?:pub(?:\([^)]*\))?\s+|export\s+(?:default\s+)?|public\s+|private\s+|protected\s+|internal\s+|static\s+|async\s+|unsafe\s+|const\s+|override\s+|suspend\s+|extern\s+(?:\x22[^\x22]*\x22\s+)?)*(?:fn|def|func|function)\s+[A-Za-z_]",
  )
  .expect("function regex")
});

#[derive(Debug, Clone)]
pub struct CodeChunkerConfig {
  /// Window size when no definitions are found.
  pub target_lines: usize,
  /// Segments smaller than this merge into their predecessor.
  pub min_lines: usize,
  /// Segments larger than this split into windows.
  pub max_lines: usize,
}

impl Default for CodeChunkerConfig {
  fn default() -> Self {
    Self {
      target_lines: 60,
      min_lines: 5,
      max_lines: 200,
    }
  }
}

/// Definition-boundary code chunker.
///
/// Splits at heuristic class/function openers, merges tiny fragments into
/// their predecessor, and windows oversized definitions. Falls back to
/// fixed windows when a file has no recognizable definitions.
pub struct CodeChunker {
  config: CodeChunkerConfig,
  languages: Vec<Language>,
}

impl Default for CodeChunker {
  fn default() -> Self {
    Self::new(CodeChunkerConfig::default())
  }
}

impl CodeChunker {
  pub fn new(config: CodeChunkerConfig) -> Self {
    let languages = vec![
      Language::Rust,
      Language::Python,
      Language::TypeScript,
      Language::Tsx,
      Language::JavaScript,
      Language::Jsx,
      Language::Go,
      Language::Java,
      Language::Kotlin,
      Language::Scala,
      Language::CSharp,
      Language::Cpp,
      Language::C,
      Language::Swift,
      Language::Ruby,
      Language::Php,
      Language::Lua,
      Language::Elixir,
      Language::Haskell,
      Language::Ocaml,
      Language::Zig,
      Language::Dart,
      Language::Shell,
      Language::Sql,
    ];
    Self { config, languages }
  }

  fn boundary_kind(line: &str) -> Option<ChunkKind> {
    if CLASS_START.is_match(line) {
      Some(ChunkKind::CodeClass)
    } else if FUNCTION_START.is_match(line) {
      Some(ChunkKind::CodeFunction)
    } else {
      None
    }
  }

  fn segment(&self, lines: &[&str]) -> Vec<(usize, usize, ChunkKind)> {
    // Boundary line indexes and the kind each opens.
    let mut boundaries: Vec<(usize, ChunkKind)> = Vec::new();
    for (i, line) in lines.iter().enumerate() {
      if let Some(kind) = Self::boundary_kind(line) {
        boundaries.push((i, kind));
      }
    }

    if boundaries.is_empty() {
      // Fixed windows.
      return (0..lines.len())
        .step_by(self.config.target_lines)
        .map(|start| {
          let end = (start + self.config.target_lines).min(lines.len());
          (start, end, ChunkKind::CodeBlock)
        })
        .collect();
    }

    let mut segments = Vec::with_capacity(boundaries.len() + 1);
    if boundaries[0].0 > 0 {
      segments.push((0, boundaries[0].0, ChunkKind::CodeBlock));
    }
    for (i, &(start, kind)) in boundaries.iter().enumerate() {
      let end = boundaries.get(i + 1).map(|&(next, _)| next).unwrap_or(lines.len());
      segments.push((start, end, kind));
    }

    // Merge fragments too small to stand alone into their predecessor.
    let mut merged: Vec<(usize, usize, ChunkKind)> = Vec::with_capacity(segments.len());
    for (start, end, kind) in segments {
      match merged.last_mut() {
        Some(prev) if end - start < self.config.min_lines => {
          prev.1 = end;
        }
        _ => merged.push((start, end, kind)),
      }
    }

    // Window anything oversized.
    let mut windowed = Vec::with_capacity(merged.len());
    for (start, end, kind) in merged {
      if end - start <= self.config.max_lines {
        windowed.push((start, end, kind));
      } else {
        let mut cursor = start;
        while cursor < end {
          let window_end = (cursor + self.config.max_lines).min(end);
          windowed.push((cursor, window_end, kind));
          cursor = window_end;
        }
      }
    }
    windowed
  }
}

impl Chunker for CodeChunker {
  fn id(&self) -> &'static str {
    "code"
  }

  fn supported_languages(&self) -> &[Language] {
    &self.languages
  }

  fn chunk(&self, text: &str, _path: &Path, _language: Option<Language>) -> Vec<Chunk> {
    if text.trim().is_empty() {
      return Vec::new();
    }
    let lines: Vec<&str> = text.lines().collect();

    self
      .segment(&lines)
      .into_iter()
      .filter_map(|(start, end, kind)| {
        let content = lines[start..end].join("\n");
        if content.trim().is_empty() {
          return None;
        }
        let mut chunk = Chunk::new(kind, start as u32 + 1, end as u32, content);
        if matches!(kind, ChunkKind::CodeFunction | ChunkKind::CodeClass)
          && let Some(first) = lines[start..end].iter().find(|l| !l.trim().is_empty())
        {
          chunk = chunk.with_summary(first.trim());
        }
        Some(chunk)
      })
      .collect()
  }
}
