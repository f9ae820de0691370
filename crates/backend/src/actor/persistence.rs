//! PersistenceActor - serializes all storage access.
//!
//! The storage backend is touched by this actor and nothing else. Saves are
//! idempotent on `(source_id, external_id)`; transient backend failures
//! retry with backoff, and exhausted saves surface to the coordinator as
//! `PersistFailed` events rather than crashing the job.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
  handle::{CoordinatorHandle, PersistenceHandle},
  message::{PersistJob, PipelineEvent, RawPayload},
};
use crate::{
  fetch::RetryConfig,
  storage::{ObjectStore, Storage, StorageError},
};
use acervo_core::{Checkpoint, Document};

/// Configuration for the persistence actor.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
  pub retry: RetryConfig,
  pub mailbox_capacity: usize,
  pub ask_timeout: std::time::Duration,
}

pub struct PersistenceActor {
  config: PersistenceConfig,
  storage: Arc<dyn Storage>,
  object_store: Option<Arc<dyn ObjectStore>>,
  coordinator: CoordinatorHandle,
  job_rx: mpsc::Receiver<PersistJob>,
  cancel: CancellationToken,
}

impl PersistenceActor {
  /// Spawn the actor and return a handle for queueing jobs.
  pub fn spawn(
    config: PersistenceConfig,
    storage: Arc<dyn Storage>,
    object_store: Option<Arc<dyn ObjectStore>>,
    coordinator: CoordinatorHandle,
    cancel: CancellationToken,
  ) -> PersistenceHandle {
    let (tx, rx) = mpsc::channel(config.mailbox_capacity);
    let ask_timeout = config.ask_timeout;
    let actor = Self {
      config,
      storage,
      object_store,
      coordinator,
      job_rx: rx,
      cancel,
    };
    tokio::spawn(actor.run());
    PersistenceHandle::new(tx, ask_timeout)
  }

  async fn run(mut self) {
    info!("PersistenceActor started");

    loop {
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!("PersistenceActor shutting down (cancelled)");
          break;
        }

        job = self.job_rx.recv() => {
          match job {
            Some(PersistJob::Shutdown) => {
              info!("PersistenceActor shutting down (requested)");
              break;
            }
            Some(job) => self.handle_job(job).await,
            None => {
              info!("PersistenceActor shutting down (channel closed)");
              break;
            }
          }
        }
      }
    }

    info!("PersistenceActor stopped");
  }

  async fn handle_job(&mut self, job: PersistJob) {
    match job {
      PersistJob::Save { document, raw } => {
        let external_id = document.external_id.clone();
        if let Err(reason) = self.save_document(document, raw).await {
          error!(external_id = %external_id, error = %reason, "Document save failed terminally");
          let _ = self
            .coordinator
            .tell(PipelineEvent::PersistFailed { external_id, reason })
            .await;
        }
      }
      PersistJob::WriteCheckpoint(checkpoint) => {
        if let Err(e) = self.write_checkpoint(&checkpoint).await {
          warn!(session_id = %checkpoint.session_id, error = %e, "Checkpoint write failed");
        }
      }
      PersistJob::LoadCheckpoint { session_id, reply } => {
        let result = self.storage.load_checkpoint(&session_id).await.map_err(|e| e.to_string());
        let _ = reply.send(result);
      }
      PersistJob::Flush { reply } => {
        // Mailbox order guarantees every earlier save has been handled.
        let _ = reply.send(());
      }
      PersistJob::Shutdown => {} // Handled in the main loop
    }
  }

  /// Save one document, retrying transient storage failures.
  async fn save_document(&self, mut document: Document, raw: Option<RawPayload>) -> Result<(), String> {
    let exists = self
      .with_retry("exists", || {
        let storage = self.storage.clone();
        let source_id = document.source_id;
        let external_id = document.external_id.clone();
        async move { storage.document_exists(source_id, &external_id).await }
      })
      .await
      .map_err(|e| e.to_string())?;

    if exists {
      debug!(external_id = %document.external_id, "Duplicate save ignored");
      return Ok(());
    }

    // Raw payload first, so the stored record carries its blob reference.
    if let Some(raw) = raw {
      match &self.object_store {
        Some(store) => {
          let blob_ref = self
            .with_retry("put_blob", || {
              let store = store.clone();
              let external_id = document.external_id.clone();
              let extension = raw.extension.clone();
              let bytes = raw.bytes.clone();
              async move { store.put(&external_id, &extension, &bytes).await }
            })
            .await
            .map_err(|e| e.to_string())?;
          debug!(external_id = %document.external_id, blob_ref = %blob_ref, "Raw payload stored");
          document.raw_blob_ref = Some(blob_ref);
        }
        None => {
          debug!(external_id = %document.external_id, "No object store configured, raw payload elided");
        }
      }
    }

    self
      .with_retry("save_document", || {
        let storage = self.storage.clone();
        let document = document.clone();
        async move { storage.save_document(&document).await }
      })
      .await
      .map_err(|e| e.to_string())?;

    debug!(external_id = %document.external_id, "Document persisted");
    Ok(())
  }

  async fn write_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
    self
      .with_retry("save_checkpoint", || {
        let storage = self.storage.clone();
        let checkpoint = checkpoint.clone();
        async move { storage.save_checkpoint(&checkpoint).await }
      })
      .await
  }

  /// Run a storage operation with the configured backoff, retrying only
  /// transient failures. Cancellation aborts the wait between attempts.
  async fn with_retry<T, F, Fut>(&self, op: &str, mut call: F) -> Result<T, StorageError>
  where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StorageError>>,
  {
    let mut attempt = 0;
    loop {
      match call().await {
        Ok(value) => return Ok(value),
        Err(e) if e.is_transient() && self.config.retry.has_attempts_left(attempt) => {
          let backoff = self.config.retry.backoff_for_attempt(attempt);
          warn!(
            op = op,
            attempt = attempt + 1,
            backoff_ms = backoff.as_millis() as u64,
            error = %e,
            "Transient storage error, will retry"
          );
          tokio::select! {
            _ = self.cancel.cancelled() => return Err(e),
            _ = tokio::time::sleep(backoff) => {}
          }
          attempt += 1;
        }
        Err(e) => return Err(e),
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    actor::message::CoordinatorMessage,
    storage::{MemoryStorage, StorageError},
  };
  use acervo_core::SourceId;
  use async_trait::async_trait;
  use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
  };

  fn test_config() -> PersistenceConfig {
    PersistenceConfig {
      retry: RetryConfig {
        max_attempts: 3,
        base_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        full_jitter: false,
        ..RetryConfig::default()
      },
      mailbox_capacity: 32,
      ask_timeout: Duration::from_secs(1),
    }
  }

  fn coordinator_stub() -> (CoordinatorHandle, mpsc::Receiver<CoordinatorMessage>) {
    let (tx, rx) = mpsc::channel(32);
    (CoordinatorHandle::new(tx, Duration::from_secs(1)), rx)
  }

  fn document(external_id: &str) -> Document {
    Document::new(SourceId::Dof, external_id, "Decreto", "https://dof.gob.mx/x")
  }

  #[tokio::test]
  async fn save_then_flush_lands_exactly_one_record() {
    let storage = Arc::new(MemoryStorage::new());
    let (coordinator, _events) = coordinator_stub();
    let handle = PersistenceActor::spawn(test_config(), storage.clone(), None, coordinator, CancellationToken::new());

    let doc = document("5551234");
    handle.send(PersistJob::Save { document: doc.clone(), raw: None }).await.unwrap();
    handle.send(PersistJob::Save { document: doc, raw: None }).await.unwrap();
    handle.flush().await.unwrap();

    assert_eq!(storage.document_count(), 1);
  }

  /// Storage that fails a fixed number of times with a transient error.
  struct FlakyStorage {
    inner: MemoryStorage,
    failures_left: AtomicUsize,
  }

  #[async_trait]
  impl Storage for FlakyStorage {
    async fn save_document(&self, document: &Document) -> Result<(), StorageError> {
      if self.failures_left.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok() {
        return Err(StorageError::Io(std::io::Error::other("disk hiccup")));
      }
      self.inner.save_document(document).await
    }

    async fn document_exists(&self, source_id: SourceId, external_id: &str) -> Result<bool, StorageError> {
      self.inner.document_exists(source_id, external_id).await
    }

    async fn load_checkpoint(&self, session_id: &str) -> Result<Option<Checkpoint>, StorageError> {
      self.inner.load_checkpoint(session_id).await
    }

    async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
      self.inner.save_checkpoint(checkpoint).await
    }
  }

  #[tokio::test]
  async fn transient_failures_are_retried() {
    let storage = Arc::new(FlakyStorage {
      inner: MemoryStorage::new(),
      failures_left: AtomicUsize::new(2),
    });
    let (coordinator, mut events) = coordinator_stub();
    let handle = PersistenceActor::spawn(test_config(), storage.clone(), None, coordinator, CancellationToken::new());

    handle.send(PersistJob::Save { document: document("a"), raw: None }).await.unwrap();
    handle.flush().await.unwrap();

    assert_eq!(storage.inner.document_count(), 1);
    assert!(events.try_recv().is_err(), "no PersistFailed expected");
  }

  #[tokio::test]
  async fn exhausted_retries_emit_persist_failed() {
    let storage = Arc::new(FlakyStorage {
      inner: MemoryStorage::new(),
      failures_left: AtomicUsize::new(10),
    });
    let (coordinator, mut events) = coordinator_stub();
    let handle = PersistenceActor::spawn(test_config(), storage.clone(), None, coordinator, CancellationToken::new());

    handle.send(PersistJob::Save { document: document("a"), raw: None }).await.unwrap();
    handle.flush().await.unwrap();

    assert_eq!(storage.inner.document_count(), 0);
    match events.recv().await {
      Some(CoordinatorMessage::Event(PipelineEvent::PersistFailed { external_id, .. })) => {
        assert_eq!(external_id, "a");
      }
      other => panic!("expected PersistFailed, got {other:?}"),
    }
  }

  #[tokio::test]
  async fn raw_payload_gets_blob_ref() {
    use crate::storage::ObjectStore;

    struct RecordingStore;

    #[async_trait]
    impl ObjectStore for RecordingStore {
      async fn put(&self, external_id: &str, extension: &str, _bytes: &[u8]) -> Result<String, StorageError> {
        Ok(format!("raw/{external_id}.{extension}"))
      }
    }

    let storage = Arc::new(MemoryStorage::new());
    let (coordinator, _events) = coordinator_stub();
    let handle = PersistenceActor::spawn(
      test_config(),
      storage.clone(),
      Some(Arc::new(RecordingStore)),
      coordinator,
      CancellationToken::new(),
    );

    handle
      .send(PersistJob::Save {
        document: document("pdf-1"),
        raw: Some(RawPayload {
          extension: "pdf".into(),
          bytes: b"%PDF-1.4".to_vec(),
        }),
      })
      .await
      .unwrap();
    handle.flush().await.unwrap();

    let docs = storage.documents();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].raw_blob_ref.as_deref(), Some("raw/pdf-1.pdf"));
  }

  #[tokio::test]
  async fn checkpoint_write_and_load_round_trip() {
    let storage = Arc::new(MemoryStorage::new());
    let (coordinator, _events) = coordinator_stub();
    let handle = PersistenceActor::spawn(test_config(), storage.clone(), None, coordinator, CancellationToken::new());

    let mut checkpoint = Checkpoint::new("sess-9");
    checkpoint.processed_ids = vec!["a".into()];
    handle.send(PersistJob::WriteCheckpoint(checkpoint.clone())).await.unwrap();
    handle.flush().await.unwrap();

    let loaded = handle.load_checkpoint("sess-9").await.unwrap().unwrap().unwrap();
    assert_eq!(loaded, checkpoint);
    let missing = handle.load_checkpoint("nope").await.unwrap().unwrap();
    assert!(missing.is_none());
  }
}
