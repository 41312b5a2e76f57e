use std::{path::PathBuf, sync::Arc, time::Duration};

use ::index::watch_roots;
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Outcome, build_engine};

/// `loupe watch`: incremental updates until Ctrl-C.
pub async fn cmd_watch(roots: Vec<PathBuf>) -> Result<Outcome> {
  let engine = build_engine(roots)?;
  let incremental = Arc::new(engine.incremental(None));
  let debounce = Duration::from_millis(engine.config.index.watch_debounce_ms);

  let cancel = CancellationToken::new();
  let ctrl_c_cancel = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      info!("shutting down watch");
      ctrl_c_cancel.cancel();
    }
  });

  watch_roots(incremental, engine.roots.clone(), debounce, cancel).await?;
  Ok(Outcome::Ok)
}
