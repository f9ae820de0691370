//! Actor message types for the acquisition pipeline.
//!
//! Every actor speaks a closed tagged union, so protocol drift is a compile
//! error at the message boundary. Control-surface requests carry an
//! `mpsc::Sender` reply channel (one request may stream several responses);
//! internal single-value asks carry a `oneshot` reply slot.

use acervo_core::{Checkpoint, Document, DiscoveryMode, JobConfig, LogEntry, PipelineState, Progress, Reference};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Unique identifier for a control request (correlation in logs and replies).
pub type RequestId = String;

// ============================================================================
// Coordinator Mailbox
// ============================================================================

/// Everything the coordinator receives: external control requests and
/// fire-and-forget events from the pipeline's worker actors, merged into one
/// mailbox so the state owner sees a single serialized stream.
#[derive(Debug)]
pub enum CoordinatorMessage {
  Control(ControlRequest),
  Event(PipelineEvent),
}

/// A control-surface request with its reply channel.
#[derive(Debug)]
pub struct ControlRequest {
  pub id: RequestId,
  pub reply: mpsc::Sender<ControlResponse>,
  pub payload: ControlPayload,
}

/// The external control surface (consumed by the CLI, bindable by a REST
/// layer).
#[derive(Debug)]
pub enum ControlPayload {
  /// Begin a pipeline run (Idle only).
  Start(Box<JobConfig>),
  /// Freeze dispatch; in-flight fetches complete (Fetching only).
  Pause,
  /// Drain the buffered queue back into the worker pool (Paused only).
  Resume,
  /// Abort the job; reaches `Completed` with `cancelled = true`.
  Cancel,
  /// Snapshot of state and progress.
  Status,
  /// Most recent log entries.
  Logs { limit: usize },
  /// Attach a progress-event subscriber.
  Subscribe,
  /// Stop the coordinator itself.
  Shutdown,
}

/// Replies to control requests.
#[derive(Debug)]
pub enum ControlResponse {
  Started { job_id: Uuid },
  Ack { state: PipelineState },
  Status(StatusSnapshot),
  Logs(Vec<LogEntry>),
  Events(mpsc::Receiver<ProgressEvent>),
  Error { message: String },
}

/// Point-in-time view of the pipeline, served by `Status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
  pub job_id: Option<Uuid>,
  pub state: PipelineState,
  pub progress: Progress,
  pub cancelled: bool,
}

// ============================================================================
// Pipeline Events
// ============================================================================

/// Stable classification of a failed fetch, surfaced in events and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
  /// Terminal HTTP status (4xx other than 429).
  Http(u16),
  Network,
  Timeout,
  /// The page fetched but the parser produced no document.
  Parse,
}

impl std::fmt::Display for FetchErrorKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      FetchErrorKind::Http(status) => write!(f, "http_{status}"),
      FetchErrorKind::Network => f.write_str("network"),
      FetchErrorKind::Timeout => f.write_str("timeout"),
      FetchErrorKind::Parse => f.write_str("parse"),
    }
  }
}

/// Events told to the coordinator by discovery, fetchers and persistence.
#[derive(Debug)]
pub enum PipelineEvent {
  /// Discovery (or a fetcher relaying parser payload refs) found a reference.
  ReferenceDiscovered(Reference),
  /// Discovery asking whether an external id is already in the seen-set.
  CheckSeen {
    external_id: String,
    reply: oneshot::Sender<bool>,
  },
  /// Discovery ran out of index pages (or hit `max_results`).
  DiscoveryFinished { discovered: usize },
  /// Discovery cannot make progress; job-fatal.
  DiscoveryFailed { reason: String },
  /// A fetch worker finished a reference successfully.
  FetchCompleted { worker_id: usize, external_id: String },
  /// A fetch failed terminally (counted, job continues).
  FetchFailed {
    worker_id: usize,
    external_id: String,
    kind: FetchErrorKind,
  },
  /// A fetch was abandoned because the job was cancelled mid-wait.
  FetchAborted { worker_id: usize, external_id: String },
  /// Persistence exhausted its retries for a document.
  PersistFailed { external_id: String, reason: String },
  /// A handler error that was contained; the actor keeps running.
  ComponentError { component: &'static str, message: String },
}

/// Progress events appended to the in-memory ring buffer and pushed to
/// subscribers on every transition or counter change.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
  StateChanged { from: PipelineState, to: PipelineState },
  ReferenceDiscovered { external_id: String },
  DocumentFetched { external_id: String },
  FetchFailed { external_id: String, kind: FetchErrorKind },
  PersistFailed { external_id: String },
  DiscoveryFinished { discovered: usize },
  CheckpointSaved { session_id: String, processed: usize },
  ComponentError { component: String },
  JobCompleted { cancelled: bool },
  JobFailed { reason: String },
}

// ============================================================================
// Worker Jobs
// ============================================================================

/// A job for a fetch worker. The mailbox is bounded at one entry: the
/// coordinator hands a worker its next reference only after the previous
/// outcome arrives, which bounds per-worker backlog and provides natural
/// backpressure.
#[derive(Debug)]
pub enum FetchJob {
  Fetch(Reference),
  Shutdown,
}

/// A raw fetched payload destined for the object store.
#[derive(Debug, Clone)]
pub struct RawPayload {
  pub extension: String,
  pub bytes: Vec<u8>,
}

/// A job for the persistence actor.
#[derive(Debug)]
pub enum PersistJob {
  /// Write a document (plus optional raw payload) exactly once.
  Save {
    document: Document,
    raw: Option<RawPayload>,
  },
  WriteCheckpoint(Checkpoint),
  LoadCheckpoint {
    session_id: String,
    reply: oneshot::Sender<Result<Option<Checkpoint>, String>>,
  },
  /// Barrier: replies once every previously queued save has succeeded or
  /// failed terminally (mailbox order guarantees this).
  Flush { reply: oneshot::Sender<()> },
  Shutdown,
}

/// A job for the discovery actor.
#[derive(Debug)]
pub enum DiscoveryJob {
  Discover { mode: DiscoveryMode, max_results: usize },
  Shutdown,
}
