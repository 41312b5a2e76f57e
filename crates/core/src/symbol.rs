use serde::{Deserialize, Serialize};

use crate::Language;

/// The declaration kinds the heuristic extractor recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
  Package,
  Import,
  Class,
  Interface,
  Enum,
  Object,
  Function,
  Method,
  Field,
  Variable,
  /// Bare identifier captured from an unrecognized language.
  Identifier,
}

impl SymbolKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Package => "package",
      Self::Import => "import",
      Self::Class => "class",
      Self::Interface => "interface",
      Self::Enum => "enum",
      Self::Object => "object",
      Self::Function => "function",
      Self::Method => "method",
      Self::Field => "field",
      Self::Variable => "variable",
      Self::Identifier => "identifier",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    let kind = match s {
      "package" => Self::Package,
      "import" => Self::Import,
      "class" => Self::Class,
      "interface" => Self::Interface,
      "enum" => Self::Enum,
      "object" => Self::Object,
      "function" => Self::Function,
      "method" => Self::Method,
      "field" => Self::Field,
      "variable" => Self::Variable,
      "identifier" => Self::Identifier,
      _ => return None,
    };
    Some(kind)
  }

  /// Ranking priority used by the symbol provider; lower sorts first.
  pub fn priority(&self) -> u8 {
    match self {
      Self::Class | Self::Interface | Self::Enum | Self::Object => 0,
      Self::Function | Self::Method => 1,
      Self::Field | Self::Variable => 2,
      Self::Package | Self::Import => 3,
      Self::Identifier => 4,
    }
  }
}

/// A declaration captured from a file by the heuristic scanner.
///
/// Recall is favored over precision: downstream ranking filters the noise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
  pub symbol_type: SymbolKind,
  pub name: String,
  /// `package.Class.member` style dotted path when scope is known.
  pub qualified_name: Option<String>,
  pub signature: Option<String>,
  pub language: Option<Language>,
  pub start_line: u32,
  pub end_line: u32,
}

impl Symbol {
  pub fn new(symbol_type: SymbolKind, name: impl Into<String>, start_line: u32) -> Self {
    Self {
      symbol_type,
      name: name.into(),
      qualified_name: None,
      signature: None,
      language: None,
      start_line,
      end_line: start_line,
    }
  }
}
