//! Logging setup: console output, an optional rolling file under the output
//! directory, and the in-process ring buffer that backs the pipeline's
//! `Logs` control operation.

use std::{path::Path, sync::Arc};

use acervo::logbuf::{BufferLayer, LogBuffer};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize logging. Returns the shared log buffer and the appender guard
/// that must stay alive for the duration of the program.
pub fn init_logging(output_dir: &Path, verbose: bool) -> (Arc<LogBuffer>, Option<WorkerGuard>) {
  let buffer = Arc::new(LogBuffer::default());

  let default_level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
  let env_filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into());

  let console_layer = tracing_subscriber::fmt::layer().with_target(true).with_ansi(true);

  let registry = tracing_subscriber::registry()
    .with(env_filter)
    .with(console_layer)
    .with(BufferLayer::new(buffer.clone()));

  // File logging is best-effort; an unwritable output directory falls back
  // to console-only.
  if std::fs::create_dir_all(output_dir).is_ok() {
    let file_appender = tracing_appender::rolling::daily(output_dir, "acervo.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
      .with_target(true)
      .with_ansi(false)
      .with_writer(file_writer);
    registry.with(file_layer).init();
    (buffer, Some(guard))
  } else {
    registry.init();
    (buffer, None)
  }
}
