//! `acervo run` - execute one acquisition job and render its progress.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use acervo::{
  CoordinatorActor, CoordinatorConfig,
  actor::message::{ControlPayload, ControlResponse, StatusSnapshot},
  actor::PipelineDeps,
  fetch::{HttpConfig, ReqwestClient},
  sources::adapter_for,
  storage::{FsObjectStore, FsStorage, ObjectStore},
};
use acervo_core::{DiscoveryMode, JobConfig, LogLevel, PipelineState, SourceId};

use crate::logging::init_logging;

#[derive(clap::Args, Debug)]
pub struct RunArgs {
  /// Source to acquire from (dof, scjn, bjv, cas)
  #[arg(short, long)]
  pub source: SourceId,

  /// Today's gazette edition (date-indexed sources)
  #[arg(long)]
  pub today: bool,

  /// A specific publication date (YYYY-MM-DD)
  #[arg(long)]
  pub date: Option<NaiveDate>,

  /// Start of a date range, inclusive (requires --to)
  #[arg(long, requires = "to")]
  pub from: Option<NaiveDate>,

  /// End of a date range, inclusive (requires --from)
  #[arg(long, requires = "from")]
  pub to: Option<NaiveDate>,

  /// Category filter (filter-indexed sources)
  #[arg(long)]
  pub category: Option<String>,

  /// Scope filter, e.g. Federal (with --category)
  #[arg(long, requires = "category")]
  pub scope: Option<String>,

  /// Status filter, e.g. Vigente (with --category)
  #[arg(long, requires = "category")]
  pub status: Option<String>,

  /// Full-text search query (search-driven sources)
  #[arg(long)]
  pub query: Option<String>,

  /// Extra search filter as key=value (repeatable, with --query)
  #[arg(long = "filter", value_name = "KEY=VALUE")]
  pub filters: Vec<String>,

  /// Maximum number of references to process
  #[arg(long, default_value_t = 100)]
  pub max: usize,

  /// Output directory for documents, checkpoints and raw payloads
  #[arg(short, long, default_value = "./acervo-data")]
  pub output: PathBuf,

  /// Request budget in requests per second (fractions allowed)
  #[arg(long, default_value_t = 0.5)]
  pub rate: f64,

  /// Number of concurrent fetch workers
  #[arg(long, default_value_t = 3)]
  pub concurrency: usize,

  /// Skip downloading payload PDFs
  #[arg(long)]
  pub no_payloads: bool,

  /// Resume from a checkpoint session id
  #[arg(long, value_name = "SESSION_ID")]
  pub resume: Option<String>,
}

impl RunArgs {
  fn mode(&self) -> Result<DiscoveryMode> {
    let chosen = [self.today, self.date.is_some(), self.from.is_some(), self.category.is_some(), self.query.is_some()]
      .iter()
      .filter(|flag| **flag)
      .count();
    if chosen == 0 {
      bail!("pick a discovery mode: --today, --date, --from/--to, --category or --query");
    }
    if chosen > 1 {
      bail!("discovery modes are mutually exclusive");
    }

    if self.today {
      return Ok(DiscoveryMode::Today);
    }
    if let Some(date) = self.date {
      return Ok(DiscoveryMode::Date(date));
    }
    if let (Some(from), Some(to)) = (self.from, self.to) {
      return Ok(DiscoveryMode::Range(from, to));
    }
    if let Some(category) = &self.category {
      return Ok(DiscoveryMode::Category {
        category: category.clone(),
        scope: self.scope.clone(),
        status: self.status.clone(),
      });
    }

    let query = self.query.clone().unwrap_or_default();
    let filters = self
      .filters
      .iter()
      .map(|raw| {
        raw
          .split_once('=')
          .map(|(k, v)| (k.to_string(), v.to_string()))
          .with_context(|| format!("filter must be key=value, got: {raw}"))
      })
      .collect::<Result<Vec<_>>>()?;
    Ok(DiscoveryMode::Search { query, filters })
  }

  fn job_config(&self) -> Result<JobConfig> {
    let mut config = JobConfig::new(self.source, self.mode()?, &self.output);
    config.max_results = self.max;
    config.rate_limit_rps = self.rate;
    config.concurrency = self.concurrency;
    config.download_payloads = !self.no_payloads;
    config.checkpoint_id = self.resume.clone();
    config.validate().context("invalid job configuration")?;
    Ok(config)
  }
}

pub async fn cmd_run(args: RunArgs, verbose: bool) -> Result<i32> {
  let config = args.job_config()?;

  let adapter = adapter_for(config.source_id);
  if !adapter.supports(&config.mode) {
    bail!("source {} does not support the requested discovery mode (see `acervo sources`)", config.source_id);
  }

  let (log_buffer, _log_guard) = init_logging(&args.output, verbose);

  let http = Arc::new(ReqwestClient::new(HttpConfig::default()).context("building HTTP client")?);
  let storage = Arc::new(FsStorage::create(&args.output).context("preparing output directory")?);
  let object_store: Option<Arc<dyn ObjectStore>> = if config.download_payloads {
    Some(Arc::new(FsObjectStore::create(&args.output).context("preparing raw payload directory")?))
  } else {
    None
  };

  let cancel = CancellationToken::new();
  let handle = CoordinatorActor::spawn(
    CoordinatorConfig::default(),
    PipelineDeps {
      http,
      adapter,
      storage,
      object_store,
      log_buffer,
    },
    cancel.clone(),
  );

  let job_id = match handle
    .request("cli-start".into(), ControlPayload::Start(Box::new(config)))
    .await
  {
    Ok(ControlResponse::Started { job_id }) => job_id,
    Ok(ControlResponse::Error { message }) => bail!("could not start job: {message}"),
    Ok(other) => bail!("unexpected start response: {other:?}"),
    Err(e) => bail!("coordinator unavailable: {e}"),
  };
  println!("job {job_id} started");

  // Poll status until terminal; the first Ctrl-C cancels the job and the
  // run winds down through the normal Cancelling path.
  let mut cancelled_by_signal = false;
  let mut ticker = tokio::time::interval(Duration::from_millis(500));
  let status = loop {
    tokio::select! {
      _ = tokio::signal::ctrl_c(), if !cancelled_by_signal => {
        eprintln!("\ninterrupted, cancelling job...");
        cancelled_by_signal = true;
        if let Err(e) = handle.request("cli-cancel".into(), ControlPayload::Cancel).await {
          debug!(error = %e, "Cancel request failed");
        }
      }
      _ = ticker.tick() => {
        match handle.request("cli-status".into(), ControlPayload::Status).await {
          Ok(ControlResponse::Status(status)) => {
            render_progress(&status);
            if status.state.is_terminal() {
              break status;
            }
          }
          Ok(other) => bail!("unexpected status response: {other:?}"),
          Err(e) => bail!("coordinator unavailable: {e}"),
        }
      }
    }
  };

  println!();
  println!(
    "{}: {} downloaded, {} errors ({} discovered)",
    status.state, status.progress.downloaded, status.progress.errors, status.progress.discovered
  );

  if status.progress.errors > 0 {
    print_recent_errors(&handle).await;
  }

  let _ = handle.request("cli-shutdown".into(), ControlPayload::Shutdown).await;
  cancel.cancel();

  Ok(exit_code(&status, cancelled_by_signal))
}

fn render_progress(status: &StatusSnapshot) {
  print!(
    "\r[{}] discovered {:>4}  downloaded {:>4}  pending {:>4}  active {}  errors {:>3}",
    status.state,
    status.progress.discovered,
    status.progress.downloaded,
    status.progress.pending,
    status.progress.active,
    status.progress.errors
  );
  use std::io::Write;
  let _ = std::io::stdout().flush();
}

/// Surface the error tail through the pipeline's own `Logs` operation.
async fn print_recent_errors(handle: &acervo::CoordinatorHandle) {
  if let Ok(ControlResponse::Logs(entries)) = handle
    .request("cli-logs".into(), ControlPayload::Logs { limit: 50 })
    .await
  {
    let errors: Vec<_> = entries.into_iter().filter(|e| e.level >= LogLevel::Warn).collect();
    if !errors.is_empty() {
      eprintln!("recent errors:");
      for entry in errors.iter().rev().take(10) {
        eprintln!("  {} [{}] {}", entry.timestamp.format("%H:%M:%S"), entry.component, entry.message);
      }
    }
  }
}

/// 0 success (partial errors included), 1 misconfiguration (handled via
/// bail), 2 pipeline failure, 130 cancelled by signal.
fn exit_code(status: &StatusSnapshot, cancelled_by_signal: bool) -> i32 {
  match status.state {
    PipelineState::Failed => 2,
    _ if cancelled_by_signal => 130,
    _ => 0,
  }
}
