use std::sync::Arc;

use anyhow::Result;
use loupe_core::{ContextScope, Language};
use retrieval::{
  ContextProvider, ContextRetrievalModule, FailureStrategy, FullTextProvider, GitHistoryProvider, HybridProvider,
  QueryOptimizerConfig, SemanticProvider, SymbolProvider, TaskSpec,
};

use super::{Outcome, build_engine};

/// `loupe search`: the full retrieval pipeline from the terminal.
pub async fn cmd_search(
  query: String,
  paths: Vec<String>,
  languages: Vec<String>,
  budget: usize,
  json: bool,
) -> Result<Outcome> {
  let engine = build_engine(Vec::new())?;

  let mut parsed_languages = Vec::new();
  for raw in &languages {
    match Language::parse(raw) {
      Some(lang) => parsed_languages.push(lang),
      None => anyhow::bail!("unknown language: {raw}"),
    }
  }
  let scope = ContextScope {
    paths,
    languages: parsed_languages,
    kinds: Vec::new(),
  };

  let http = embedding::HttpEmbedder::new(&engine.config.embedding)?;
  let embedder: Arc<dyn embedding::Embedder> = Arc::new(embedding::RetryEmbedder::new(http));

  let semantic: Arc<dyn ContextProvider> = Arc::new(SemanticProvider::new(engine.catalog.clone(), embedder.clone()));
  let mut backends: Vec<Arc<dyn ContextProvider>> = vec![
    semantic.clone(),
    Arc::new(SymbolProvider::new(engine.catalog.clone())),
    Arc::new(FullTextProvider::new(engine.catalog.clone())),
  ];
  if engine.project_dir.join(".git").exists() {
    backends.push(Arc::new(GitHistoryProvider::new(
      engine.project_dir.clone(),
      engine.catalog.clone(),
    )));
  }
  let retrieval_config = &engine.config.retrieval;
  let weighted: Vec<(Arc<dyn ContextProvider>, f32)> = backends
    .into_iter()
    .map(|p| {
      let weight = retrieval_config.provider_weights.get(p.kind().as_str()).copied().unwrap_or(1.0);
      (p, weight)
    })
    .collect();
  let hybrid: Arc<dyn ContextProvider> =
    Arc::new(HybridProvider::with_weights(weighted, retrieval_config.rrf_k, FailureStrategy::Skip)?);

  let module = ContextRetrievalModule::new(vec![hybrid], QueryOptimizerConfig::from(&engine.config.retrieval))
    .with_fallback(semantic)
    .with_catalog(engine.catalog.clone());

  let mut task = TaskSpec::new(query);
  task.complexity = complexity_for_budget(budget);
  let context = module.retrieve(&task, &scope).await;

  if json {
    println!("{}", serde_json::to_string_pretty(&context)?);
    return Ok(Outcome::Ok);
  }

  if context.snippets.is_empty() {
    println!("no context found");
    for warning in &context.diagnostics.warnings {
      println!("  warning: {warning}");
    }
    return Ok(Outcome::Ok);
  }

  for snippet in &context.snippets {
    println!(
      "[{:.3}] {} ({}:{}-{})",
      snippet.score, snippet.label, snippet.file_path, snippet.start_line, snippet.end_line
    );
    for line in snippet.text.lines().take(6) {
      println!("    {line}");
    }
    println!();
  }
  println!(
    "{} snippets, {} tokens, {} ms",
    context.snippets.len(),
    context.diagnostics.tokens_used,
    context.diagnostics.total_duration_ms
  );

  Ok(Outcome::Ok)
}

fn complexity_for_budget(budget: usize) -> retrieval::TaskComplexity {
  if budget <= 2048 {
    retrieval::TaskComplexity::Low
  } else if budget <= 4096 {
    retrieval::TaskComplexity::Medium
  } else {
    retrieval::TaskComplexity::High
  }
}
