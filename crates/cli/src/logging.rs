//! Logging setup for the CLI.

use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
  EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into())
}

/// Console logging with `RUST_LOG` override; info by default.
pub fn init() {
  tracing_subscriber::fmt().with_env_filter(env_filter()).with_target(false).init();
}

/// Logging for long-running watch sessions: rolls to a daily file when
/// `LOUPE_LOG_DIR` is set, console otherwise. The returned guard must
/// stay alive for the duration of the process.
pub fn init_watch() -> Option<tracing_appender::non_blocking::WorkerGuard> {
  let Some(dir) = std::env::var_os("LOUPE_LOG_DIR") else {
    init();
    return None;
  };
  let dir = std::path::PathBuf::from(dir);
  if std::fs::create_dir_all(&dir).is_err() {
    init();
    return None;
  }

  let appender = tracing_appender::rolling::daily(&dir, "loupe.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);
  tracing_subscriber::fmt()
    .with_env_filter(env_filter())
    .with_ansi(false)
    .with_writer(writer)
    .init();
  Some(guard)
}
