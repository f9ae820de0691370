//! CoordinatorActor - per-source pipeline state owner.
//!
//! The coordinator owns the job configuration, the finite state machine, the
//! seen-set, the pending queue and all progress counters. External callers
//! talk to it through the control surface (start/pause/resume/cancel/status/
//! logs/events); worker actors report back through pipeline events. Both
//! streams merge into one mailbox, so every piece of state has exactly one
//! writer.
//!
//! # State Machine
//!
//! ```text
//!         Start          first enqueue
//!  Idle ────────▶ Discovering ─────────▶ Fetching ◀──Resume── Paused
//!                     │                    │  │                  ▲
//!                     │ (empty result)     │  └──────Pause───────┘
//!                     ▼                    │
//!                 Completed ◀── queue drained        Cancel (any non-terminal)
//!                     ▲                    │                  │
//!                     └── active = 0 ── Cancelling ◀──────────┘
//!                                          │ fatal error
//!                                        Failed
//! ```
//!
//! # Cancellation
//!
//! `Cancel` fires the job's abort token, which interrupts rate-limit waits,
//! retry sleeps and the discovery loop. In-flight HTTP requests complete
//! normally; persistence lives on its own token so queued saves and the
//! final checkpoint still land.

use std::{
  collections::{HashMap, HashSet, VecDeque},
  sync::Arc,
  time::Duration,
};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
  discovery::{DiscoveryActor, DiscoveryConfig},
  fetcher::{FetcherActor, FetcherConfig},
  handle::{CoordinatorHandle, DEFAULT_ASK_TIMEOUT, DiscoveryHandle, FetcherHandle, PersistenceHandle},
  message::{
    ControlPayload, ControlRequest, ControlResponse, CoordinatorMessage, DiscoveryJob, FetchJob, PersistJob,
    PipelineEvent, ProgressEvent, StatusSnapshot,
  },
  persistence::{PersistenceActor, PersistenceConfig},
  rate_limiter::RateLimiter,
};
use crate::{
  fetch::{HttpClient, RetryConfig},
  logbuf::LogBuffer,
  sources::SourceAdapter,
  storage::{ObjectStore, Storage},
};
use acervo_core::{Checkpoint, JobConfig, PipelineState, Progress, Reference};
use uuid::Uuid;

// ============================================================================
// Configuration & Dependencies
// ============================================================================

/// Tuning knobs for the coordinator and the actors it spawns.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
  /// Checkpoint cadence: a checkpoint is written every this many fetch
  /// completions (and on pause/cancel).
  pub checkpoint_interval: usize,
  /// Timeout applied to ask-style requests.
  pub ask_timeout: Duration,
  pub mailbox_capacity: usize,
  /// Progress-event ring buffer capacity.
  pub event_history: usize,
  /// Per-subscriber event channel capacity; slow subscribers lose events
  /// rather than stall the coordinator.
  pub subscriber_buffer: usize,
  /// Backoff policy shared by fetchers, discovery and persistence.
  pub retry: RetryConfig,
}

impl Default for CoordinatorConfig {
  fn default() -> Self {
    Self {
      checkpoint_interval: 10,
      ask_timeout: DEFAULT_ASK_TIMEOUT,
      mailbox_capacity: 256,
      event_history: 256,
      subscriber_buffer: 64,
      retry: RetryConfig::default(),
    }
  }
}

/// The pipeline's external collaborators, injected at spawn.
pub struct PipelineDeps {
  pub http: Arc<dyn HttpClient>,
  pub adapter: Arc<dyn SourceAdapter>,
  pub storage: Arc<dyn Storage>,
  pub object_store: Option<Arc<dyn ObjectStore>>,
  pub log_buffer: Arc<LogBuffer>,
}

// ============================================================================
// Job State
// ============================================================================

/// Everything owned for the duration of one job.
struct JobState {
  id: Uuid,
  config: JobConfig,
  session_id: String,
  /// Dedup set of every external id accepted into the job, including ids
  /// restored from a checkpoint.
  seen: HashSet<String>,
  /// FIFO of references waiting for a worker (doubles as the pause buffer).
  queue: VecDeque<Reference>,
  /// Workers with no in-flight fetch, in hand-out order.
  idle: VecDeque<usize>,
  /// worker_id -> external_id currently being fetched.
  in_flight: HashMap<usize, String>,
  discovered: usize,
  downloaded: usize,
  errors: usize,
  /// Successfully completed ids this session, in completion order.
  completed_ids: Vec<String>,
  failed_ids: Vec<String>,
  last_processed: Option<String>,
  /// Completed ids restored from the checkpoint this job resumed from.
  processed_baseline: Vec<String>,
  discovery_finished: bool,
  cancelled: bool,
  completions_since_checkpoint: usize,
  fetchers: Vec<FetcherHandle>,
  persistence: PersistenceHandle,
  discovery: DiscoveryHandle,
  /// Fired on `Cancel`: aborts limiter waits, retry sleeps and discovery.
  abort: CancellationToken,
  /// Persistence outlives the abort signal so final saves and the closing
  /// checkpoint still land; released during cleanup.
  persist_cancel: CancellationToken,
}

impl JobState {
  fn progress(&self) -> Progress {
    Progress {
      discovered: self.discovered,
      downloaded: self.downloaded,
      pending: self.queue.len() + self.in_flight.len(),
      active: self.in_flight.len(),
      errors: self.errors,
    }
  }

  fn build_checkpoint(&self) -> Checkpoint {
    let mut processed_ids = self.processed_baseline.clone();
    processed_ids.extend(self.completed_ids.iter().cloned());

    let mut pending_ids: Vec<String> = self.queue.iter().map(|r| r.external_id.clone()).collect();
    pending_ids.extend(self.in_flight.values().cloned());

    Checkpoint {
      session_id: self.session_id.clone(),
      last_processed_external_id: self.last_processed.clone(),
      processed_ids,
      pending_ids,
      failed_ids: self.failed_ids.clone(),
      created_at: chrono::Utc::now(),
    }
  }
}

// ============================================================================
// CoordinatorActor
// ============================================================================

pub struct CoordinatorActor {
  config: CoordinatorConfig,
  deps: PipelineDeps,
  rx: mpsc::Receiver<CoordinatorMessage>,
  /// Clone handed to spawned workers so they can report events back.
  self_handle: CoordinatorHandle,
  cancel: CancellationToken,
  state: PipelineState,
  job: Option<JobState>,
  /// Set when `Cancel` arrives before any job existed.
  idle_cancelled: bool,
  /// Ring buffer of recent progress events.
  events: VecDeque<ProgressEvent>,
  subscribers: Vec<mpsc::Sender<ProgressEvent>>,
}

impl CoordinatorActor {
  /// Spawn the coordinator and return its control handle.
  pub fn spawn(config: CoordinatorConfig, deps: PipelineDeps, cancel: CancellationToken) -> CoordinatorHandle {
    let (tx, rx) = mpsc::channel(config.mailbox_capacity);
    let handle = CoordinatorHandle::new(tx, config.ask_timeout);
    let actor = Self {
      config,
      deps,
      rx,
      self_handle: handle.clone(),
      cancel,
      state: PipelineState::Idle,
      job: None,
      idle_cancelled: false,
      events: VecDeque::new(),
      subscribers: Vec::new(),
    };
    tokio::spawn(actor.run());
    handle
  }

  async fn run(mut self) {
    info!(source = %self.deps.adapter.id(), "CoordinatorActor started");

    loop {
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!(source = %self.deps.adapter.id(), "CoordinatorActor shutting down (cancelled)");
          break;
        }

        msg = self.rx.recv() => {
          match msg {
            Some(CoordinatorMessage::Control(request)) => self.handle_control(request).await,
            Some(CoordinatorMessage::Event(event)) => self.handle_event(event).await,
            None => {
              info!(source = %self.deps.adapter.id(), "CoordinatorActor shutting down (channel closed)");
              break;
            }
          }
        }
      }
    }

    self.cleanup().await;
    info!(source = %self.deps.adapter.id(), "CoordinatorActor stopped");
  }

  async fn cleanup(&mut self) {
    if let Some(job) = &self.job {
      job.abort.cancel();
      let _ = job.discovery.shutdown().await;
      for fetcher in &job.fetchers {
        let _ = fetcher.shutdown().await;
      }
      let _ = job.persistence.shutdown().await;
      job.persist_cancel.cancel();
    }
  }

  // ==========================================================================
  // Control Surface
  // ==========================================================================

  async fn handle_control(&mut self, request: ControlRequest) {
    let ControlRequest { id, reply, payload } = request;
    debug!(request_id = %id, state = %self.state, payload = ?std::mem::discriminant(&payload), "Control request");

    let response = match payload {
      ControlPayload::Start(config) => self.handle_start(*config).await,
      ControlPayload::Pause => self.handle_pause().await,
      ControlPayload::Resume => self.handle_resume().await,
      ControlPayload::Cancel => self.handle_cancel().await,
      ControlPayload::Status => ControlResponse::Status(self.snapshot()),
      ControlPayload::Logs { limit } => ControlResponse::Logs(self.deps.log_buffer.recent(limit)),
      ControlPayload::Subscribe => {
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer);
        self.subscribers.push(tx);
        ControlResponse::Events(rx)
      }
      ControlPayload::Shutdown => {
        let _ = reply.send(ControlResponse::Ack { state: self.state }).await;
        self.cancel.cancel();
        return;
      }
    };

    let _ = reply.send(response).await;
  }

  async fn handle_start(&mut self, config: JobConfig) -> ControlResponse {
    if self.state != PipelineState::Idle {
      return ControlResponse::Error {
        message: format!("cannot start: pipeline is {}", self.state),
      };
    }

    if let Err(e) = config.validate() {
      self.fail("misconfiguration", &e.to_string()).await;
      return ControlResponse::Error {
        message: format!("invalid job config: {e}"),
      };
    }
    if config.source_id != self.deps.adapter.id() {
      let message = format!(
        "job source {} does not match this coordinator's source {}",
        config.source_id,
        self.deps.adapter.id()
      );
      self.fail("misconfiguration", &message).await;
      return ControlResponse::Error { message };
    }
    if !self.deps.adapter.supports(&config.mode) {
      let message = format!("source {} does not support the requested discovery mode", config.source_id);
      self.fail("misconfiguration", &message).await;
      return ControlResponse::Error { message };
    }

    let job_id = Uuid::new_v4();
    let session_id = config.checkpoint_id.clone().unwrap_or_else(|| job_id.to_string());
    let abort = CancellationToken::new();
    let persist_cancel = self.cancel.child_token();

    info!(
      job_id = %job_id,
      source = %config.source_id,
      session_id = %session_id,
      concurrency = config.concurrency,
      rate = config.rate_limit_rps,
      "Starting pipeline job"
    );

    let limiter = Arc::new(RateLimiter::new(config.rate_limit_rps, abort.clone()));

    let persistence = PersistenceActor::spawn(
      PersistenceConfig {
        retry: self.config.retry.clone(),
        mailbox_capacity: self.config.mailbox_capacity,
        ask_timeout: self.config.ask_timeout,
      },
      self.deps.storage.clone(),
      self.deps.object_store.clone(),
      self.self_handle.clone(),
      persist_cancel.clone(),
    );

    // Restore the seen-set before discovery starts so resumed jobs skip
    // completed work.
    let mut seen = HashSet::new();
    let mut processed_baseline = Vec::new();
    if let Some(checkpoint_id) = &config.checkpoint_id {
      match persistence.load_checkpoint(checkpoint_id).await {
        Ok(Ok(Some(checkpoint))) => {
          info!(
            session_id = %checkpoint.session_id,
            processed = checkpoint.processed_ids.len(),
            pending = checkpoint.pending_ids.len(),
            failed = checkpoint.failed_ids.len(),
            "Checkpoint restored"
          );
          seen.extend(checkpoint.processed_ids.iter().cloned());
          processed_baseline = checkpoint.processed_ids;
        }
        Ok(Ok(None)) => {
          warn!(checkpoint_id = %checkpoint_id, "Checkpoint not found, starting fresh session");
        }
        Ok(Err(reason)) => {
          let _ = persistence.shutdown().await;
          self.fail("checkpoint", &format!("checkpoint load failed: {reason}")).await;
          return ControlResponse::Error {
            message: format!("checkpoint load failed: {reason}"),
          };
        }
        Err(e) => {
          let _ = persistence.shutdown().await;
          self.fail("checkpoint", &format!("checkpoint load failed: {e}")).await;
          return ControlResponse::Error {
            message: format!("checkpoint load failed: {e}"),
          };
        }
      }
    }

    let mut fetchers = Vec::with_capacity(config.concurrency);
    for worker_id in 0..config.concurrency {
      fetchers.push(FetcherActor::spawn(
        FetcherConfig {
          worker_id,
          download_payloads: config.download_payloads,
          retry: self.config.retry.clone(),
        },
        self.deps.http.clone(),
        self.deps.adapter.clone(),
        limiter.clone(),
        persistence.clone(),
        self.self_handle.clone(),
        abort.child_token(),
      ));
    }

    let discovery = DiscoveryActor::spawn(
      DiscoveryConfig {
        retry: self.config.retry.clone(),
      },
      self.deps.adapter.clone(),
      self.deps.http.clone(),
      limiter.clone(),
      self.self_handle.clone(),
      abort.child_token(),
    );

    let discover_job = DiscoveryJob::Discover {
      mode: config.mode.clone(),
      max_results: config.max_results,
    };
    let discovery_handle = discovery.clone();

    self.job = Some(JobState {
      id: job_id,
      config,
      session_id,
      seen,
      queue: VecDeque::new(),
      idle: (0..fetchers.len()).collect(),
      in_flight: HashMap::new(),
      discovered: 0,
      downloaded: 0,
      errors: 0,
      completed_ids: Vec::new(),
      failed_ids: Vec::new(),
      last_processed: None,
      processed_baseline,
      discovery_finished: false,
      cancelled: false,
      completions_since_checkpoint: 0,
      fetchers,
      persistence,
      discovery,
      abort,
      persist_cancel,
    });

    self.set_state(PipelineState::Discovering);

    if discovery_handle.send(discover_job).await.is_err() {
      self.fail("discovery", "discovery actor rejected the job").await;
      return ControlResponse::Error {
        message: "discovery actor rejected the job".to_string(),
      };
    }

    ControlResponse::Started { job_id }
  }

  async fn handle_pause(&mut self) -> ControlResponse {
    if self.state != PipelineState::Fetching {
      return ControlResponse::Error {
        message: format!("cannot pause: pipeline is {}", self.state),
      };
    }

    self.set_state(PipelineState::Paused);
    self.write_checkpoint().await;
    ControlResponse::Ack { state: self.state }
  }

  async fn handle_resume(&mut self) -> ControlResponse {
    if self.state != PipelineState::Paused {
      return ControlResponse::Error {
        message: format!("cannot resume: pipeline is {}", self.state),
      };
    }

    self.set_state(PipelineState::Fetching);
    self.dispatch_ready().await;
    self.check_terminal().await;
    ControlResponse::Ack { state: self.state }
  }

  async fn handle_cancel(&mut self) -> ControlResponse {
    if self.state.is_terminal() {
      return ControlResponse::Error {
        message: format!("cannot cancel: pipeline is {}", self.state),
      };
    }

    if let Some(job) = &mut self.job {
      job.cancelled = true;
      job.abort.cancel();
      self.set_state(PipelineState::Cancelling);
      self.write_checkpoint().await;
      self.check_terminal().await;
    } else {
      // Nothing ever started; cancel is an immediate, empty completion.
      self.idle_cancelled = true;
      self.set_state(PipelineState::Cancelling);
      self.set_state(PipelineState::Completed);
      self.emit(ProgressEvent::JobCompleted { cancelled: true });
    }
    ControlResponse::Ack { state: self.state }
  }

  fn snapshot(&self) -> StatusSnapshot {
    StatusSnapshot {
      job_id: self.job.as_ref().map(|j| j.id),
      state: self.state,
      progress: self.job.as_ref().map(|j| j.progress()).unwrap_or_default(),
      cancelled: self.idle_cancelled || self.job.as_ref().is_some_and(|j| j.cancelled),
    }
  }

  // ==========================================================================
  // Pipeline Events
  // ==========================================================================

  async fn handle_event(&mut self, event: PipelineEvent) {
    // After a terminal transition only two event kinds still matter:
    // seen-set asks (so a lagging discovery winds down instead of timing
    // out) and persistence verdicts (counter corrections). Everything else
    // is dropped.
    let dropped = self.state.is_terminal() || self.job.is_none();

    match event {
      PipelineEvent::CheckSeen { external_id, reply } => {
        let seen = self.job.as_ref().is_none_or(|j| j.seen.contains(&external_id));
        let _ = reply.send(seen);
      }
      PipelineEvent::PersistFailed { external_id, reason } => {
        warn!(external_id = %external_id, reason = %reason, "Document dropped after persistence failure");
        if let Some(job) = &mut self.job {
          job.downloaded = job.downloaded.saturating_sub(1);
          job.errors += 1;
          job.completed_ids.retain(|id| id != &external_id);
          job.failed_ids.push(external_id.clone());
        }
        self.emit(ProgressEvent::PersistFailed { external_id });
      }
      _ if dropped => {
        debug!(state = %self.state, event = ?event, "Event dropped (terminal or no job)");
      }
      PipelineEvent::ReferenceDiscovered(reference) => self.on_reference(reference).await,
      PipelineEvent::DiscoveryFinished { discovered } => {
        if let Some(job) = &mut self.job {
          job.discovery_finished = true;
        }
        debug!(discovered, "Discovery finished");
        self.emit(ProgressEvent::DiscoveryFinished { discovered });
        self.check_terminal().await;
      }
      PipelineEvent::DiscoveryFailed { reason } => {
        self.fail("discovery", &reason).await;
      }
      PipelineEvent::FetchCompleted { worker_id, external_id } => {
        if let Some(job) = &mut self.job {
          job.downloaded += 1;
          job.completed_ids.push(external_id.clone());
          job.last_processed = Some(external_id.clone());
          job.in_flight.remove(&worker_id);
          job.idle.push_back(worker_id);
          job.completions_since_checkpoint += 1;
        }
        self.emit(ProgressEvent::DocumentFetched { external_id });
        self.after_completion().await;
      }
      PipelineEvent::FetchFailed {
        worker_id,
        external_id,
        kind,
      } => {
        if let Some(job) = &mut self.job {
          job.errors += 1;
          job.failed_ids.push(external_id.clone());
          job.in_flight.remove(&worker_id);
          job.idle.push_back(worker_id);
          job.completions_since_checkpoint += 1;
        }
        self.emit(ProgressEvent::FetchFailed { external_id, kind });
        self.after_completion().await;
      }
      PipelineEvent::FetchAborted { worker_id, external_id } => {
        debug!(worker_id, external_id = %external_id, "Fetch aborted");
        if let Some(job) = &mut self.job {
          // The reference was neither completed nor failed; it stays out of
          // the counters and will be re-discovered on resume.
          job.in_flight.remove(&worker_id);
          job.idle.push_back(worker_id);
        }
        self.check_terminal().await;
      }
      PipelineEvent::ComponentError { component, message } => {
        warn!(component = component, message = %message, "Component error");
        self.emit(ProgressEvent::ComponentError {
          component: component.to_string(),
        });
      }
    }
  }

  /// A reference entered the job: dedup, count, then dispatch or buffer.
  async fn on_reference(&mut self, reference: Reference) {
    if self.state == PipelineState::Cancelling {
      return;
    }

    let Some(job) = &mut self.job else { return };

    if job.discovered >= job.config.max_results {
      return;
    }
    if !job.seen.insert(reference.external_id.clone()) {
      debug!(external_id = %reference.external_id, "Duplicate reference dropped");
      return;
    }

    job.discovered += 1;
    let external_id = reference.external_id.clone();
    job.queue.push_back(reference);

    if self.state == PipelineState::Discovering {
      self.set_state(PipelineState::Fetching);
    }
    self.emit(ProgressEvent::ReferenceDiscovered { external_id });

    if self.state == PipelineState::Fetching {
      self.dispatch_ready().await;
    }
  }

  /// Hand queued references to idle workers (Fetching only).
  async fn dispatch_ready(&mut self) {
    if self.state != PipelineState::Fetching {
      return;
    }
    let Some(job) = &mut self.job else { return };

    while let Some(worker_id) = job.idle.pop_front() {
      let Some(reference) = job.queue.pop_front() else {
        job.idle.push_front(worker_id);
        break;
      };
      let external_id = reference.external_id.clone();

      match job.fetchers[worker_id].send(FetchJob::Fetch(reference)).await {
        Ok(()) => {
          job.in_flight.insert(worker_id, external_id);
        }
        Err(e) => {
          error!(worker_id, error = %e, "Fetch worker unavailable, reference counted as error");
          job.errors += 1;
          job.failed_ids.push(external_id);
        }
      }
    }
  }

  /// Bookkeeping shared by success and failure completions.
  async fn after_completion(&mut self) {
    self.maybe_checkpoint().await;
    self.dispatch_ready().await;
    self.check_terminal().await;
  }

  // ==========================================================================
  // Checkpointing
  // ==========================================================================

  async fn maybe_checkpoint(&mut self) {
    let due = self
      .job
      .as_ref()
      .is_some_and(|j| j.completions_since_checkpoint >= self.config.checkpoint_interval);
    if due {
      if let Some(job) = &mut self.job {
        job.completions_since_checkpoint = 0;
      }
      self.write_checkpoint().await;
    }
  }

  async fn write_checkpoint(&mut self) {
    let Some(job) = &self.job else { return };
    let checkpoint = job.build_checkpoint();
    let processed = checkpoint.processed_ids.len();
    let session_id = checkpoint.session_id.clone();

    if job.persistence.send(PersistJob::WriteCheckpoint(checkpoint)).await.is_err() {
      warn!(session_id = %session_id, "Persistence unavailable, checkpoint skipped");
      return;
    }
    debug!(session_id = %session_id, processed, "Checkpoint queued");
    self.emit(ProgressEvent::CheckpointSaved { session_id, processed });
  }

  // ==========================================================================
  // Terminal Transitions
  // ==========================================================================

  /// Completion condition per state: Discovering with an empty result,
  /// Fetching with a drained queue, Cancelling once active work stops.
  async fn check_terminal(&mut self) {
    let Some(job) = &self.job else { return };
    let active = job.in_flight.len();

    let done = match self.state {
      PipelineState::Discovering => job.discovery_finished,
      PipelineState::Fetching => job.discovery_finished && job.queue.is_empty() && active == 0,
      PipelineState::Cancelling => active == 0,
      _ => false,
    };

    if done {
      self.complete().await;
    }
  }

  async fn complete(&mut self) {
    let Some(job) = &self.job else { return };
    let cancelled = job.cancelled;

    // Final checkpoint, then a flush barrier so every queued save has
    // settled before the job reports terminal.
    let checkpoint = job.build_checkpoint();
    let _ = job.persistence.send(PersistJob::WriteCheckpoint(checkpoint)).await;
    if let Err(e) = job.persistence.flush().await {
      warn!(error = %e, "Persistence flush did not settle before completion");
    }

    self.set_state(PipelineState::Completed);
    self.emit(ProgressEvent::JobCompleted { cancelled });

    if let Some(job) = &self.job {
      info!(
        job_id = %job.id,
        downloaded = job.downloaded,
        errors = job.errors,
        cancelled,
        "Pipeline job completed"
      );
    }
    self.shutdown_workers().await;
  }

  /// Exactly one `Failed` transition; resources are released and subsequent
  /// messages are dropped.
  async fn fail(&mut self, component: &str, reason: &str) {
    if self.state.is_terminal() {
      return;
    }
    error!(component = component, reason = %reason, "Pipeline job failed");

    if let Some(job) = &self.job {
      job.abort.cancel();
    }
    self.set_state(PipelineState::Failed);
    self.emit(ProgressEvent::JobFailed {
      reason: reason.to_string(),
    });
    self.shutdown_workers().await;
  }

  async fn shutdown_workers(&mut self) {
    let Some(job) = &self.job else { return };
    let _ = job.discovery.shutdown().await;
    for fetcher in &job.fetchers {
      let _ = fetcher.shutdown().await;
    }
    let _ = job.persistence.shutdown().await;
    job.persist_cancel.cancel();
    job.abort.cancel();
  }

  // ==========================================================================
  // Events & State
  // ==========================================================================

  fn set_state(&mut self, to: PipelineState) {
    if self.state == to {
      return;
    }
    let from = self.state;
    self.state = to;
    info!(from = %from, to = %to, "Pipeline state changed");
    self.emit(ProgressEvent::StateChanged { from, to });
  }

  /// Append to the ring buffer and push to live subscribers. Subscribers
  /// that fell behind lose this event; closed ones are dropped.
  fn emit(&mut self, event: ProgressEvent) {
    if self.events.len() == self.config.event_history {
      self.events.pop_front();
    }
    self.events.push_back(event.clone());

    self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
      Ok(()) => true,
      Err(mpsc::error::TrySendError::Full(_)) => true,
      Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
  }
}
