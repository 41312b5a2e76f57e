//! Per-language declaration patterns for the heuristic symbol scanner.
//!
//! Each language gets a small set of anchored regexes with a `name`
//! capture. Recall is favored over precision; the symbol provider's
//! ranking absorbs false positives.

use std::{collections::HashMap, sync::LazyLock};

use loupe_core::{Language, SymbolKind};
use regex::Regex;

pub(crate) struct Patterns {
  pub package: Option<Regex>,
  pub import: Option<Regex>,
  /// Type-like declarations: class, struct, enum, interface, object.
  pub types: Vec<(SymbolKind, Regex)>,
  pub function: Option<Regex>,
  pub field: Option<Regex>,
  /// Scope exits tracked by indentation instead of braces.
  pub indent_scoped: bool,
}

fn re(pattern: &str) -> Regex {
  Regex::new(pattern).expect("symbol pattern")
}

fn rust_patterns() -> Patterns {
  let vis = r"(?:pub(?:\([^)]*\))?\s+)?";
  Patterns {
    package: None,
    import: Some(re(r"^\s*use\s+(?P<name>[A-Za-z_][A-Za-z0-9_:]*)")),
    types: vec![
      (SymbolKind::Class, re(&format!(r"^\s*{vis}struct\s+(?P<name>[A-Za-z_]\w*)"))),
      (SymbolKind::Enum, re(&format!(r"^\s*{vis}enum\s+(?P<name>[A-Za-z_]\w*)"))),
      (SymbolKind::Interface, re(&format!(r"^\s*{vis}trait\s+(?P<name>[A-Za-z_]\w*)"))),
      (SymbolKind::Object, re(r"^\s*impl(?:<[^>]*>)?\s+(?:[A-Za-z_][\w:]*\s+for\s+)?(?P<name>[A-Za-z_]\w*)")),
    ],
    function: Some(re(&format!(
      r"^\s*{vis}(?:async\s+|unsafe\s+|const\s+|extern\s+(?:\x22[^\x22]*\x22\s+)?)*fn\s+(?P<name>[A-Za-z_]\w*)"
    ))),
    field: Some(re(&format!(r"^\s*{vis}(?:static|const)\s+(?P<name>[A-Z_][A-Z0-9_]*)\s*:"))),
    indent_scoped: false,
  }
}

fn python_patterns() -> Patterns {
  Patterns {
    package: None,
    import: Some(re(r"^\s*(?:import|from)\s+(?P<name>[A-Za-z_][\w.]*)")),
    types: vec![(SymbolKind::Class, re(r"^\s*class\s+(?P<name>[A-Za-z_]\w*)"))],
    function: Some(re(r"^\s*(?:async\s+)?def\s+(?P<name>[A-Za-z_]\w*)")),
    field: Some(re(r"^(?P<name>[A-Za-z_]\w*)\s*(?::[^=]+)?=[^=]")),
    indent_scoped: true,
  }
}

fn ecma_patterns(typescript: bool) -> Patterns {
  let mut types = vec![(
    SymbolKind::Class,
    re(r"^\s*(?:export\s+(?:default\s+)?)?(?:abstract\s+)?class\s+(?P<name>[A-Za-z_]\w*)"),
  )];
  if typescript {
    types.push((SymbolKind::Interface, re(r"^\s*(?:export\s+)?interface\s+(?P<name>[A-Za-z_]\w*)")));
    types.push((SymbolKind::Enum, re(r"^\s*(?:export\s+)?(?:const\s+)?enum\s+(?P<name>[A-Za-z_]\w*)")));
  }
  Patterns {
    package: None,
    import: Some(re(r#"^\s*import\s+.*?from\s+['"](?P<name>[^'"]+)['"]"#)),
    types,
    function: Some(re(
      r"^\s*(?:export\s+(?:default\s+)?)?(?:async\s+)?function\s*\*?\s*(?P<name>[A-Za-z_]\w*)|^\s*(?:export\s+)?const\s+(?P<name2>[A-Za-z_]\w*)\s*=\s*(?:async\s*)?(?:\(|[A-Za-z_]\w*\s*=>)",
    )),
    field: Some(re(r"^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>[A-Za-z_]\w*)")),
    indent_scoped: false,
  }
}

fn go_patterns() -> Patterns {
  Patterns {
    package: Some(re(r"^package\s+(?P<name>[A-Za-z_]\w*)")),
    import: Some(re(r#"^\s*(?:import\s+)?(?:[A-Za-z_]\w*\s+)?"(?P<name>[^"]+)"\s*$"#)),
    types: vec![
      (SymbolKind::Class, re(r"^type\s+(?P<name>[A-Za-z_]\w*)\s+struct\b")),
      (SymbolKind::Interface, re(r"^type\s+(?P<name>[A-Za-z_]\w*)\s+interface\b")),
    ],
    function: Some(re(r"^func\s+(?:\([^)]*\)\s+)?(?P<name>[A-Za-z_]\w*)")),
    field: Some(re(r"^(?:var|const)\s+(?P<name>[A-Za-z_]\w*)")),
    indent_scoped: false,
  }
}

fn jvm_patterns() -> Patterns {
  let mods = r"(?:public\s+|private\s+|protected\s+|internal\s+|static\s+|final\s+|abstract\s+|open\s+|sealed\s+|data\s+)*";
  Patterns {
    package: Some(re(r"^\s*package\s+(?P<name>[A-Za-z_][\w.]*)")),
    import: Some(re(r"^\s*import\s+(?:static\s+)?(?P<name>[A-Za-z_][\w.*]*)")),
    types: vec![
      (SymbolKind::Class, re(&format!(r"^\s*{mods}class\s+(?P<name>[A-Za-z_]\w*)"))),
      (SymbolKind::Interface, re(&format!(r"^\s*{mods}interface\s+(?P<name>[A-Za-z_]\w*)"))),
      (SymbolKind::Enum, re(&format!(r"^\s*{mods}enum(?:\s+class)?\s+(?P<name>[A-Za-z_]\w*)"))),
      (SymbolKind::Object, re(&format!(r"^\s*{mods}(?:companion\s+)?object\s+(?P<name>[A-Za-z_]\w*)"))),
    ],
    function: Some(re(&format!(
      r"^\s*{mods}(?:suspend\s+|override\s+)*fun\s+(?P<name>[A-Za-z_]\w*)|^\s*{mods}(?:[\w<>\[\],\s]+\s+)?(?P<name2>[a-z]\w*)\s*\([^;]*\)\s*(?:throws\s+[\w,\s]+)?\{{"
    ))),
    field: Some(re(&format!(r"^\s*{mods}(?:val|var)\s+(?P<name>[A-Za-z_]\w*)"))),
    indent_scoped: false,
  }
}

fn c_patterns() -> Patterns {
  Patterns {
    package: None,
    import: Some(re(r#"^\s*#include\s+[<"](?P<name>[^>"]+)[>"]"#)),
    types: vec![
      (SymbolKind::Class, re(r"^\s*(?:typedef\s+)?struct\s+(?P<name>[A-Za-z_]\w*)")),
      (SymbolKind::Enum, re(r"^\s*(?:typedef\s+)?enum\s+(?P<name>[A-Za-z_]\w*)")),
      (SymbolKind::Class, re(r"^\s*(?:template\s*<[^>]*>\s*)?class\s+(?P<name>[A-Za-z_]\w*)")),
    ],
    function: Some(re(r"^[A-Za-z_][\w\s\*&:<>,]*?\b(?P<name>[A-Za-z_]\w*)\s*\([^;]*$")),
    field: Some(re(r"^\s*#define\s+(?P<name>[A-Za-z_]\w*)")),
    indent_scoped: false,
  }
}

fn ruby_patterns() -> Patterns {
  Patterns {
    package: None,
    import: Some(re(r#"^\s*require(?:_relative)?\s+['"](?P<name>[^'"]+)['"]"#)),
    types: vec![
      (SymbolKind::Class, re(r"^\s*class\s+(?P<name>[A-Z]\w*)")),
      (SymbolKind::Object, re(r"^\s*module\s+(?P<name>[A-Z]\w*)")),
    ],
    function: Some(re(r"^\s*def\s+(?:self\.)?(?P<name>[a-z_]\w*[?!]?)")),
    field: Some(re(r"^\s*(?P<name>[A-Z_][A-Z0-9_]*)\s*=")),
    indent_scoped: false,
  }
}

fn shell_patterns() -> Patterns {
  Patterns {
    package: None,
    import: Some(re(r"^\s*(?:source|\.)\s+(?P<name>\S+)")),
    types: Vec::new(),
    function: Some(re(r"^\s*(?:function\s+)?(?P<name>[A-Za-z_]\w*)\s*\(\)\s*\{")),
    field: Some(re(r"^\s*(?:export\s+)?(?P<name>[A-Za-z_]\w*)=")),
    indent_scoped: false,
  }
}

static PATTERNS: LazyLock<HashMap<Language, Patterns>> = LazyLock::new(|| {
  let mut map = HashMap::new();
  map.insert(Language::Rust, rust_patterns());
  map.insert(Language::Python, python_patterns());
  map.insert(Language::JavaScript, ecma_patterns(false));
  map.insert(Language::Jsx, ecma_patterns(false));
  map.insert(Language::TypeScript, ecma_patterns(true));
  map.insert(Language::Tsx, ecma_patterns(true));
  map.insert(Language::Go, go_patterns());
  map.insert(Language::Java, jvm_patterns());
  map.insert(Language::Kotlin, jvm_patterns());
  map.insert(Language::Scala, jvm_patterns());
  map.insert(Language::CSharp, jvm_patterns());
  map.insert(Language::C, c_patterns());
  map.insert(Language::Cpp, c_patterns());
  map.insert(Language::Ruby, ruby_patterns());
  map.insert(Language::Shell, shell_patterns());
  map
});

pub(crate) fn patterns_for(language: Language) -> Option<&'static Patterns> {
  PATTERNS.get(&language)
}

/// Pull the `name` (or `name2`) capture out of a match.
pub(crate) fn capture_name<'t>(regex: &Regex, line: &'t str) -> Option<&'t str> {
  let captures = regex.captures(line)?;
  captures
    .name("name")
    .or_else(|| captures.name("name2"))
    .map(|m| m.as_str())
}
