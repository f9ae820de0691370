//! Actor handles for communicating with actors.
//!
//! Handles are cheap to clone and encapsulate the channel sender plus the
//! request/response (`ask`) pattern. An ask never blocks indefinitely: it
//! either returns the handler's reply, fails with [`AskError::AskTimeout`],
//! or fails with [`AskError::ActorStopped`].

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::message::{
  ControlPayload, ControlRequest, ControlResponse, CoordinatorMessage, DiscoveryJob, FetchJob, PersistJob,
  PipelineEvent, RequestId,
};
use acervo_core::Checkpoint;

/// Default timeout applied to ask-style requests.
pub const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Errors
// ============================================================================

/// Error when sending to an actor.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
  #[error("actor has shut down")]
  ActorGone,
}

/// Error completing an ask.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AskError {
  #[error("ask timed out")]
  AskTimeout,
  #[error("actor stopped before replying")]
  ActorStopped,
}

// ============================================================================
// Coordinator Handle
// ============================================================================

/// Handle to the coordinator: the control surface for external callers and
/// the event sink for worker actors.
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
  tx: mpsc::Sender<CoordinatorMessage>,
  ask_timeout: Duration,
}

impl CoordinatorHandle {
  pub fn new(tx: mpsc::Sender<CoordinatorMessage>, ask_timeout: Duration) -> Self {
    Self { tx, ask_timeout }
  }

  /// Fire-and-forget pipeline event.
  pub async fn tell(&self, event: PipelineEvent) -> Result<(), SendError> {
    self
      .tx
      .send(CoordinatorMessage::Event(event))
      .await
      .map_err(|_| SendError::ActorGone)
  }

  /// Send a control request and get the reply receiver.
  pub async fn send(&self, id: RequestId, payload: ControlPayload) -> Result<mpsc::Receiver<ControlResponse>, SendError> {
    let (reply_tx, reply_rx) = mpsc::channel(8);
    let request = ControlRequest {
      id,
      reply: reply_tx,
      payload,
    };
    self
      .tx
      .send(CoordinatorMessage::Control(request))
      .await
      .map_err(|_| SendError::ActorGone)?;
    Ok(reply_rx)
  }

  /// Send a control request and wait for the first reply, bounded by the
  /// ask timeout.
  pub async fn request(&self, id: RequestId, payload: ControlPayload) -> Result<ControlResponse, AskError> {
    let mut reply_rx = self.send(id, payload).await.map_err(|_| AskError::ActorStopped)?;

    match tokio::time::timeout(self.ask_timeout, reply_rx.recv()).await {
      Ok(Some(response)) => Ok(response),
      Ok(None) => Err(AskError::ActorStopped),
      Err(_) => Err(AskError::AskTimeout),
    }
  }

  /// Discovery's dedup ask: is this external id already in the seen-set?
  pub async fn check_seen(&self, external_id: &str) -> Result<bool, AskError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .tell(PipelineEvent::CheckSeen {
        external_id: external_id.to_string(),
        reply: reply_tx,
      })
      .await
      .map_err(|_| AskError::ActorStopped)?;

    match tokio::time::timeout(self.ask_timeout, reply_rx).await {
      Ok(Ok(seen)) => Ok(seen),
      Ok(Err(_)) => Err(AskError::ActorStopped),
      Err(_) => Err(AskError::AskTimeout),
    }
  }
}

// ============================================================================
// Worker Handles
// ============================================================================

/// Handle to a fetch worker. Jobs are fire-and-forget; outcomes come back to
/// the coordinator as events.
#[derive(Clone, Debug)]
pub struct FetcherHandle {
  tx: mpsc::Sender<FetchJob>,
}

impl FetcherHandle {
  pub fn new(tx: mpsc::Sender<FetchJob>) -> Self {
    Self { tx }
  }

  pub async fn send(&self, job: FetchJob) -> Result<(), SendError> {
    self.tx.send(job).await.map_err(|_| SendError::ActorGone)
  }

  pub async fn shutdown(&self) -> Result<(), SendError> {
    self.send(FetchJob::Shutdown).await
  }
}

/// Handle to the persistence actor.
#[derive(Clone, Debug)]
pub struct PersistenceHandle {
  tx: mpsc::Sender<PersistJob>,
  ask_timeout: Duration,
}

impl PersistenceHandle {
  pub fn new(tx: mpsc::Sender<PersistJob>, ask_timeout: Duration) -> Self {
    Self { tx, ask_timeout }
  }

  pub async fn send(&self, job: PersistJob) -> Result<(), SendError> {
    self.tx.send(job).await.map_err(|_| SendError::ActorGone)
  }

  /// Barrier ask: resolves once every save queued before it has been
  /// processed.
  pub async fn flush(&self) -> Result<(), AskError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .send(PersistJob::Flush { reply: reply_tx })
      .await
      .map_err(|_| AskError::ActorStopped)?;

    match tokio::time::timeout(self.ask_timeout, reply_rx).await {
      Ok(Ok(())) => Ok(()),
      Ok(Err(_)) => Err(AskError::ActorStopped),
      Err(_) => Err(AskError::AskTimeout),
    }
  }

  /// Load a checkpoint through the storage backend. `Err(String)` carries a
  /// storage/corruption message (job-fatal when resuming).
  pub async fn load_checkpoint(&self, session_id: &str) -> Result<Result<Option<Checkpoint>, String>, AskError> {
    let (reply_tx, reply_rx) = oneshot::channel();
    self
      .send(PersistJob::LoadCheckpoint {
        session_id: session_id.to_string(),
        reply: reply_tx,
      })
      .await
      .map_err(|_| AskError::ActorStopped)?;

    match tokio::time::timeout(self.ask_timeout, reply_rx).await {
      Ok(Ok(result)) => Ok(result),
      Ok(Err(_)) => Err(AskError::ActorStopped),
      Err(_) => Err(AskError::AskTimeout),
    }
  }

  pub async fn shutdown(&self) -> Result<(), SendError> {
    self.send(PersistJob::Shutdown).await
  }
}

/// Handle to the discovery actor.
#[derive(Clone, Debug)]
pub struct DiscoveryHandle {
  tx: mpsc::Sender<DiscoveryJob>,
}

impl DiscoveryHandle {
  pub fn new(tx: mpsc::Sender<DiscoveryJob>) -> Self {
    Self { tx }
  }

  pub async fn send(&self, job: DiscoveryJob) -> Result<(), SendError> {
    self.tx.send(job).await.map_err(|_| SendError::ActorGone)
  }

  pub async fn shutdown(&self) -> Result<(), SendError> {
    self.send(DiscoveryJob::Shutdown).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn ask_times_out_when_nobody_replies() {
    let (tx, _rx) = mpsc::channel(8);
    let handle = CoordinatorHandle::new(tx, Duration::from_millis(50));

    let err = handle.request("req-1".into(), ControlPayload::Status).await.unwrap_err();
    assert!(matches!(err, AskError::AskTimeout));
  }

  #[tokio::test]
  async fn ask_reports_stopped_actor() {
    let (tx, rx) = mpsc::channel(8);
    drop(rx);
    let handle = CoordinatorHandle::new(tx, Duration::from_millis(50));

    let err = handle.request("req-2".into(), ControlPayload::Status).await.unwrap_err();
    assert!(matches!(err, AskError::ActorStopped));
  }

  #[tokio::test]
  async fn ask_reports_stopped_when_reply_channel_dropped() {
    let (tx, mut rx) = mpsc::channel(8);
    let handle = CoordinatorHandle::new(tx, Duration::from_millis(200));

    // A "handler" that drops the reply without answering.
    tokio::spawn(async move {
      let msg = rx.recv().await.unwrap();
      drop(msg);
    });

    let err = handle.request("req-3".into(), ControlPayload::Status).await.unwrap_err();
    assert!(matches!(err, AskError::ActorStopped));
  }
}
