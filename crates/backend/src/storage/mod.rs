//! Storage collaborators.
//!
//! The persistence actor is the only component that touches these; the
//! traits keep it independent of the concrete backend. [`FsStorage`] is the
//! shipped default (one JSON file per document / checkpoint);
//! [`MemoryStorage`] backs the actor tests.

mod fs;

use std::{collections::HashMap, sync::Mutex};

use acervo_core::{Checkpoint, Document, SourceId};
use async_trait::async_trait;

pub use self::fs::{FsObjectStore, FsStorage};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
  /// Retryable backend failure (I/O, transient backend unavailability).
  #[error("storage I/O error: {0}")]
  Io(#[from] std::io::Error),
  /// Non-retryable: stored data failed to (de)serialize. A corrupt
  /// checkpoint surfaces through here and is job-fatal when resuming.
  #[error("serialization error: {0}")]
  Serde(#[from] serde_json::Error),
}

impl StorageError {
  pub fn is_transient(&self) -> bool {
    matches!(self, StorageError::Io(_))
  }
}

// ============================================================================
// Traits
// ============================================================================

/// Durable record storage, keyed by `(source_id, external_id)`.
#[async_trait]
pub trait Storage: Send + Sync {
  async fn save_document(&self, document: &Document) -> Result<(), StorageError>;
  async fn document_exists(&self, source_id: SourceId, external_id: &str) -> Result<bool, StorageError>;
  async fn load_checkpoint(&self, session_id: &str) -> Result<Option<Checkpoint>, StorageError>;
  async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError>;
}

/// Raw payload storage (fetched PDFs/HTML). Optional collaborator: when
/// absent, raw payloads are elided and only structured records are kept.
#[async_trait]
pub trait ObjectStore: Send + Sync {
  /// Store `bytes` under a backend path derived from the external id and
  /// extension; returns the blob reference recorded on the document.
  async fn put(&self, external_id: &str, extension: &str, bytes: &[u8]) -> Result<String, StorageError>;
}

// ============================================================================
// In-Memory Implementation (tests)
// ============================================================================

/// Hash-map backed storage for actor tests.
#[derive(Default)]
pub struct MemoryStorage {
  documents: Mutex<HashMap<(SourceId, String), Document>>,
  checkpoints: Mutex<HashMap<String, Checkpoint>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn document_count(&self) -> usize {
    self.documents.lock().unwrap().len()
  }

  pub fn documents(&self) -> Vec<Document> {
    self.documents.lock().unwrap().values().cloned().collect()
  }

  pub fn checkpoint(&self, session_id: &str) -> Option<Checkpoint> {
    self.checkpoints.lock().unwrap().get(session_id).cloned()
  }
}

#[async_trait]
impl Storage for MemoryStorage {
  async fn save_document(&self, document: &Document) -> Result<(), StorageError> {
    self
      .documents
      .lock()
      .unwrap()
      .insert((document.source_id, document.external_id.clone()), document.clone());
    Ok(())
  }

  async fn document_exists(&self, source_id: SourceId, external_id: &str) -> Result<bool, StorageError> {
    Ok(
      self
        .documents
        .lock()
        .unwrap()
        .contains_key(&(source_id, external_id.to_string())),
    )
  }

  async fn load_checkpoint(&self, session_id: &str) -> Result<Option<Checkpoint>, StorageError> {
    Ok(self.checkpoints.lock().unwrap().get(session_id).cloned())
  }

  async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
    self
      .checkpoints
      .lock()
      .unwrap()
      .insert(checkpoint.session_id.clone(), checkpoint.clone());
    Ok(())
  }
}
