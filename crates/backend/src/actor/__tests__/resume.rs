//! Checkpoint/resume: a second run seeded from the first run's checkpoint
//! picks up exactly the unprocessed remainder.

use std::sync::Arc;

use super::helpers::{PipelineTestContext, StubAdapter};
use crate::storage::{MemoryStorage, Storage};
use acervo_core::SourceId;

#[tokio::test]
async fn checkpoint_resume_covers_the_remainder_without_duplicates() {
  let adapter = Arc::new(StubAdapter::with_references(10, 4));
  let storage = Arc::new(MemoryStorage::new());

  // Run A: capped at 6 of the 10 available references.
  let run_a = PipelineTestContext::build(adapter.clone(), storage.clone());
  let mut config_a = run_a.job_config();
  config_a.max_results = 6;
  let job_a = run_a.start(config_a).await;
  let status_a = run_a.wait_for_completed().await;
  assert_eq!(status_a.progress.downloaded, 6);

  // The closing checkpoint records the processed set under run A's session.
  let session = job_a.to_string();
  let checkpoint = storage.checkpoint(&session).expect("run A checkpoint");
  assert_eq!(checkpoint.processed_ids.len(), 6);
  assert!(checkpoint.pending_ids.is_empty());
  assert_eq!(checkpoint.last_processed_external_id.as_deref(), checkpoint.processed_ids.last().map(String::as_str));

  // Run B: fresh coordinator, same storage, resuming from the checkpoint.
  let run_b = PipelineTestContext::build(adapter, storage.clone());
  let mut config_b = run_b.job_config();
  config_b.checkpoint_id = Some(session.clone());
  run_b.start(config_b).await;
  let status_b = run_b.wait_for_completed().await;

  // Only the remainder is discovered and fetched.
  assert_eq!(status_b.progress.discovered, 4);
  assert_eq!(status_b.progress.downloaded, 4);
  assert_eq!(status_b.progress.errors, 0);

  // Union of both runs: all ten documents, no duplicates.
  assert_eq!(storage.document_count(), 10);
  for index in 0..10 {
    assert!(
      storage
        .document_exists(SourceId::Dof, &format!("ref-{index:02}"))
        .await
        .unwrap(),
      "missing ref-{index:02}"
    );
  }

  // Run B's closing checkpoint extends the same session to all ten ids.
  let final_checkpoint = storage.checkpoint(&session).expect("run B checkpoint");
  assert_eq!(final_checkpoint.processed_ids.len(), 10);
}

#[tokio::test]
async fn missing_checkpoint_starts_a_fresh_session() {
  let adapter = Arc::new(StubAdapter::with_references(3, 5));
  let storage = Arc::new(MemoryStorage::new());

  let ctx = PipelineTestContext::build(adapter, storage.clone());
  let mut config = ctx.job_config();
  config.checkpoint_id = Some("never-written".to_string());

  ctx.start(config).await;
  let status = ctx.wait_for_completed().await;

  assert_eq!(status.progress.downloaded, 3);
  // The requested session id is adopted for the new checkpoints.
  assert!(storage.checkpoint("never-written").is_some());
}
