use serde::{Deserialize, Serialize};

/// Languages the indexer recognizes.
///
/// Detection is best-effort: extension first, then well-known filenames,
/// then the MIME subtype. Unknown files still index, they just skip the
/// language-aware chunking and symbol heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  Rust,
  Python,
  TypeScript,
  Tsx,
  JavaScript,
  Jsx,
  Go,
  Java,
  Kotlin,
  Scala,
  CSharp,
  Cpp,
  C,
  Swift,
  Ruby,
  Php,
  Lua,
  Elixir,
  Haskell,
  Ocaml,
  Clojure,
  Erlang,
  Zig,
  Dart,
  Shell,
  PowerShell,
  Sql,
  Html,
  Css,
  Scss,
  Markdown,
  Json,
  Yaml,
  Toml,
  Xml,
  Dockerfile,
  Makefile,
  Protobuf,
  Graphql,
  Terraform,
  Text,
}

impl Language {
  /// Detect a language from a file extension (without the dot).
  pub fn from_extension(ext: &str) -> Option<Self> {
    let lang = match ext.to_ascii_lowercase().as_str() {
      "rs" => Self::Rust,
      "py" | "pyi" => Self::Python,
      "ts" | "mts" | "cts" => Self::TypeScript,
      "tsx" => Self::Tsx,
      "js" | "mjs" | "cjs" => Self::JavaScript,
      "jsx" => Self::Jsx,
      "go" => Self::Go,
      "java" => Self::Java,
      "kt" | "kts" => Self::Kotlin,
      "scala" | "sc" => Self::Scala,
      "cs" => Self::CSharp,
      "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Self::Cpp,
      "c" | "h" => Self::C,
      "swift" => Self::Swift,
      "rb" | "rake" => Self::Ruby,
      "php" => Self::Php,
      "lua" => Self::Lua,
      "ex" | "exs" => Self::Elixir,
      "hs" => Self::Haskell,
      "ml" | "mli" => Self::Ocaml,
      "clj" | "cljs" | "cljc" => Self::Clojure,
      "erl" | "hrl" => Self::Erlang,
      "zig" => Self::Zig,
      "dart" => Self::Dart,
      "sh" | "bash" | "zsh" => Self::Shell,
      "ps1" | "psm1" => Self::PowerShell,
      "sql" => Self::Sql,
      "html" | "htm" => Self::Html,
      "css" => Self::Css,
      "scss" | "sass" | "less" => Self::Scss,
      "md" | "markdown" | "mdx" => Self::Markdown,
      "json" | "jsonc" => Self::Json,
      "yaml" | "yml" => Self::Yaml,
      "toml" => Self::Toml,
      "xml" | "xsd" | "xsl" => Self::Xml,
      "proto" => Self::Protobuf,
      "graphql" | "gql" => Self::Graphql,
      "tf" | "tfvars" => Self::Terraform,
      "txt" | "text" => Self::Text,
      _ => return None,
    };
    Some(lang)
  }

  /// Detect a language from a well-known filename (no useful extension).
  pub fn from_filename(name: &str) -> Option<Self> {
    let lang = match name {
      "Dockerfile" | "Containerfile" => Self::Dockerfile,
      "Makefile" | "makefile" | "GNUmakefile" => Self::Makefile,
      "Rakefile" | "Gemfile" => Self::Ruby,
      "CMakeLists.txt" => Self::Text,
      "Cargo.lock" => Self::Toml,
      ".gitignore" | ".dockerignore" => Self::Text,
      "go.mod" | "go.sum" => Self::Go,
      _ => return None,
    };
    Some(lang)
  }

  /// Detect a language from a MIME subtype, e.g. the `json` in
  /// `application/json`.
  pub fn from_mime_subtype(subtype: &str) -> Option<Self> {
    let lang = match subtype {
      "json" => Self::Json,
      "xml" => Self::Xml,
      "html" => Self::Html,
      "css" => Self::Css,
      "javascript" | "ecmascript" => Self::JavaScript,
      "typescript" => Self::TypeScript,
      "x-sh" | "x-shellscript" => Self::Shell,
      "x-python" => Self::Python,
      "x-ruby" => Self::Ruby,
      "markdown" => Self::Markdown,
      "yaml" | "x-yaml" => Self::Yaml,
      "toml" => Self::Toml,
      "sql" => Self::Sql,
      "plain" => Self::Text,
      _ => return None,
    };
    Some(lang)
  }

  /// Stable lowercase identifier used for storage and display.
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Rust => "rust",
      Self::Python => "python",
      Self::TypeScript => "typescript",
      Self::Tsx => "tsx",
      Self::JavaScript => "javascript",
      Self::Jsx => "jsx",
      Self::Go => "go",
      Self::Java => "java",
      Self::Kotlin => "kotlin",
      Self::Scala => "scala",
      Self::CSharp => "csharp",
      Self::Cpp => "cpp",
      Self::C => "c",
      Self::Swift => "swift",
      Self::Ruby => "ruby",
      Self::Php => "php",
      Self::Lua => "lua",
      Self::Elixir => "elixir",
      Self::Haskell => "haskell",
      Self::Ocaml => "ocaml",
      Self::Clojure => "clojure",
      Self::Erlang => "erlang",
      Self::Zig => "zig",
      Self::Dart => "dart",
      Self::Shell => "shell",
      Self::PowerShell => "powershell",
      Self::Sql => "sql",
      Self::Html => "html",
      Self::Css => "css",
      Self::Scss => "scss",
      Self::Markdown => "markdown",
      Self::Json => "json",
      Self::Yaml => "yaml",
      Self::Toml => "toml",
      Self::Xml => "xml",
      Self::Dockerfile => "dockerfile",
      Self::Makefile => "makefile",
      Self::Protobuf => "protobuf",
      Self::Graphql => "graphql",
      Self::Terraform => "terraform",
      Self::Text => "text",
    }
  }

  /// Parse the identifier produced by [`Language::as_str`].
  pub fn parse(s: &str) -> Option<Self> {
    let lang = match s {
      "rust" => Self::Rust,
      "python" => Self::Python,
      "typescript" => Self::TypeScript,
      "tsx" => Self::Tsx,
      "javascript" => Self::JavaScript,
      "jsx" => Self::Jsx,
      "go" => Self::Go,
      "java" => Self::Java,
      "kotlin" => Self::Kotlin,
      "scala" => Self::Scala,
      "csharp" => Self::CSharp,
      "cpp" => Self::Cpp,
      "c" => Self::C,
      "swift" => Self::Swift,
      "ruby" => Self::Ruby,
      "php" => Self::Php,
      "lua" => Self::Lua,
      "elixir" => Self::Elixir,
      "haskell" => Self::Haskell,
      "ocaml" => Self::Ocaml,
      "clojure" => Self::Clojure,
      "erlang" => Self::Erlang,
      "zig" => Self::Zig,
      "dart" => Self::Dart,
      "shell" => Self::Shell,
      "powershell" => Self::PowerShell,
      "sql" => Self::Sql,
      "html" => Self::Html,
      "css" => Self::Css,
      "scss" => Self::Scss,
      "markdown" => Self::Markdown,
      "json" => Self::Json,
      "yaml" => Self::Yaml,
      "toml" => Self::Toml,
      "xml" => Self::Xml,
      "dockerfile" => Self::Dockerfile,
      "makefile" => Self::Makefile,
      "protobuf" => Self::Protobuf,
      "graphql" => Self::Graphql,
      "terraform" => Self::Terraform,
      "text" => Self::Text,
      _ => return None,
    };
    Some(lang)
  }

  /// True for markup / prose formats that chunk by paragraph rather than
  /// by code structure.
  pub fn is_prose(&self) -> bool {
    matches!(self, Self::Markdown | Self::Text | Self::Html)
  }

  /// True for languages that scope by indentation instead of braces.
  pub fn is_indent_scoped(&self) -> bool {
    matches!(self, Self::Python | Self::Yaml | Self::Haskell)
  }
}
