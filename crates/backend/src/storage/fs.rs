//! Filesystem storage: one JSON file per document and per checkpoint, plus
//! a directory of raw payloads.
//!
//! Layout under the job's output directory:
//!
//! ```text
//! <output_dir>/documents/<external_id>.json
//! <output_dir>/checkpoints/<session_id>.json
//! <output_dir>/raw/<external_id>.<ext>
//! ```

use std::path::{Path, PathBuf};

use acervo_core::{Checkpoint, Document, SourceId};
use async_trait::async_trait;
use tracing::debug;

use super::{ObjectStore, Storage, StorageError};

/// External ids come from URLs and may contain separators that are unsafe
/// as file names; everything outside a conservative set maps to `_`.
fn sanitize_id(external_id: &str) -> String {
  external_id
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
    .collect()
}

// ============================================================================
// Document & Checkpoint Storage
// ============================================================================

pub struct FsStorage {
  documents_dir: PathBuf,
  checkpoints_dir: PathBuf,
}

impl FsStorage {
  /// Create storage rooted at the job's output directory. Directories are
  /// created eagerly so misconfigured paths fail at start, not mid-job.
  pub fn create(output_dir: &Path) -> Result<Self, StorageError> {
    let documents_dir = output_dir.join("documents");
    let checkpoints_dir = output_dir.join("checkpoints");
    std::fs::create_dir_all(&documents_dir)?;
    std::fs::create_dir_all(&checkpoints_dir)?;
    Ok(Self {
      documents_dir,
      checkpoints_dir,
    })
  }

  fn document_path(&self, external_id: &str) -> PathBuf {
    self.documents_dir.join(format!("{}.json", sanitize_id(external_id)))
  }

  fn checkpoint_path(&self, session_id: &str) -> PathBuf {
    self.checkpoints_dir.join(format!("{}.json", sanitize_id(session_id)))
  }
}

#[async_trait]
impl Storage for FsStorage {
  async fn save_document(&self, document: &Document) -> Result<(), StorageError> {
    let path = self.document_path(&document.external_id);
    let json = serde_json::to_vec_pretty(document)?;
    tokio::fs::write(&path, json).await?;
    debug!(path = %path.display(), external_id = %document.external_id, "Document written");
    Ok(())
  }

  async fn document_exists(&self, _source_id: SourceId, external_id: &str) -> Result<bool, StorageError> {
    Ok(tokio::fs::try_exists(self.document_path(external_id)).await?)
  }

  async fn load_checkpoint(&self, session_id: &str) -> Result<Option<Checkpoint>, StorageError> {
    let path = self.checkpoint_path(session_id);
    match tokio::fs::read(&path).await {
      Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  async fn save_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StorageError> {
    let path = self.checkpoint_path(&checkpoint.session_id);
    let json = serde_json::to_vec_pretty(checkpoint)?;
    tokio::fs::write(&path, json).await?;
    debug!(path = %path.display(), session_id = %checkpoint.session_id, "Checkpoint written");
    Ok(())
  }
}

// ============================================================================
// Raw Payload Store
// ============================================================================

pub struct FsObjectStore {
  raw_dir: PathBuf,
}

impl FsObjectStore {
  pub fn create(output_dir: &Path) -> Result<Self, StorageError> {
    let raw_dir = output_dir.join("raw");
    std::fs::create_dir_all(&raw_dir)?;
    Ok(Self { raw_dir })
  }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
  async fn put(&self, external_id: &str, extension: &str, bytes: &[u8]) -> Result<String, StorageError> {
    let file_name = format!("{}.{}", sanitize_id(external_id), extension);
    let path = self.raw_dir.join(&file_name);
    tokio::fs::write(&path, bytes).await?;
    Ok(format!("raw/{file_name}"))
  }
}
