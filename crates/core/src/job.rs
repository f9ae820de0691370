//! Job configuration, pipeline state and progress counters.

use std::{fmt, path::PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::document::SourceId;

// ============================================================================
// Discovery Modes
// ============================================================================

/// How a job enumerates its source's index.
///
/// Date modes fit the gazette (one index page per publication day); the
/// filter and search modes fit the portal/library sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMode {
  /// Today's gazette edition.
  Today,
  /// A specific publication date.
  Date(NaiveDate),
  /// An inclusive date range (historical backfill).
  Range(NaiveDate, NaiveDate),
  /// Filter-indexed discovery (category plus optional scope/status).
  Category {
    category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
  },
  /// Search-driven discovery.
  Search {
    query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    filters: Vec<(String, String)>,
  },
}

// ============================================================================
// Job Configuration
// ============================================================================

/// Parameters for a single pipeline run. Created at `Start`, read-only for
/// the duration of the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
  pub source_id: SourceId,
  pub mode: DiscoveryMode,
  /// Upper bound on references discovered; `0` completes immediately.
  pub max_results: usize,
  pub output_directory: PathBuf,
  /// Requests per second shared across discovery and fetch workers.
  /// Fractional rates are normal (`0.5` means one request every 2 s);
  /// `0.0` blocks all fetches until cancelled.
  pub rate_limit_rps: f64,
  /// Number of fetch worker actors.
  pub concurrency: usize,
  /// Whether parser-yielded payload references (PDFs) are fetched too.
  pub download_payloads: bool,
  /// Resume from this checkpoint session when set.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub checkpoint_id: Option<String>,
}

impl JobConfig {
  pub fn new(source_id: SourceId, mode: DiscoveryMode, output_directory: impl Into<PathBuf>) -> Self {
    Self {
      source_id,
      mode,
      max_results: 100,
      output_directory: output_directory.into(),
      rate_limit_rps: 0.5,
      concurrency: 3,
      download_payloads: true,
      checkpoint_id: None,
    }
  }

  /// Validate the configuration. A failure here is job-fatal: the pipeline
  /// transitions straight to `Failed` without starting any work.
  pub fn validate(&self) -> Result<(), JobConfigError> {
    if self.concurrency == 0 {
      return Err(JobConfigError::ZeroConcurrency);
    }
    if !self.rate_limit_rps.is_finite() || self.rate_limit_rps < 0.0 {
      return Err(JobConfigError::InvalidRate(self.rate_limit_rps));
    }
    if let DiscoveryMode::Range(start, end) = &self.mode
      && end < start
    {
      return Err(JobConfigError::InvertedRange { start: *start, end: *end });
    }
    if self.output_directory.as_os_str().is_empty() {
      return Err(JobConfigError::MissingOutputDirectory);
    }
    Ok(())
  }
}

/// Validation failures for a [`JobConfig`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum JobConfigError {
  #[error("concurrency must be at least 1")]
  ZeroConcurrency,
  #[error("rate limit must be a finite, non-negative number (got {0})")]
  InvalidRate(f64),
  #[error("date range is inverted: {start} > {end}")]
  InvertedRange { start: NaiveDate, end: NaiveDate },
  #[error("output directory is empty")]
  MissingOutputDirectory,
}

// ============================================================================
// Pipeline State & Progress
// ============================================================================

/// The coordinator's finite state. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineState {
  Idle,
  Discovering,
  Fetching,
  Paused,
  Cancelling,
  Completed,
  Failed,
}

impl PipelineState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, PipelineState::Completed | PipelineState::Failed)
  }
}

impl fmt::Display for PipelineState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      PipelineState::Idle => "idle",
      PipelineState::Discovering => "discovering",
      PipelineState::Fetching => "fetching",
      PipelineState::Paused => "paused",
      PipelineState::Cancelling => "cancelling",
      PipelineState::Completed => "completed",
      PipelineState::Failed => "failed",
    };
    f.write_str(s)
  }
}

/// Monotonic counter snapshot. At every quiescent point
/// `pending == discovered - downloaded - errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
  /// References accepted into the job (after dedup).
  pub discovered: usize,
  /// Documents fetched, parsed and handed to persistence.
  pub downloaded: usize,
  /// References queued or in flight.
  pub pending: usize,
  /// Fetches currently executing.
  pub active: usize,
  /// Per-item terminal failures.
  pub errors: usize,
}
