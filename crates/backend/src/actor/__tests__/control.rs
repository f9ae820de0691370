//! Control-surface and boundary behavior: preconditions, zero-size jobs,
//! serial mode, zero rate, logs.

use std::time::Duration;

use super::helpers::PipelineTestContext;
use crate::actor::message::{ControlPayload, ControlResponse};
use acervo_core::{LogEntry, LogLevel, PipelineState};

#[tokio::test]
async fn max_results_zero_completes_with_nothing_discovered() {
  let ctx = PipelineTestContext::new(5);
  let mut config = ctx.job_config();
  config.max_results = 0;

  ctx.start(config).await;
  let status = ctx.wait_for_completed().await;

  assert_eq!(status.progress.discovered, 0);
  assert_eq!(status.progress.downloaded, 0);
  assert_eq!(ctx.storage.document_count(), 0);
}

#[tokio::test]
async fn concurrency_one_is_a_valid_serial_mode() {
  let ctx = PipelineTestContext::new(6);
  let mut config = ctx.job_config();
  config.concurrency = 1;

  ctx.start(config).await;
  let status = ctx.wait_for_completed().await;

  assert_eq!(status.progress.downloaded, 6);
  assert_eq!(status.progress.errors, 0);
}

#[tokio::test]
async fn zero_rate_blocks_everything_until_cancel() {
  let ctx = PipelineTestContext::new(3);
  let mut config = ctx.job_config();
  config.rate_limit_rps = 0.0;

  ctx.start(config).await;

  // Nothing moves: even the first index fetch is gated.
  tokio::time::sleep(Duration::from_millis(150)).await;
  let stalled = ctx.status().await;
  assert_eq!(stalled.progress.downloaded, 0);
  assert_eq!(stalled.progress.discovered, 0);
  assert!(!stalled.state.is_terminal());

  match ctx.handle.request("cancel".into(), ControlPayload::Cancel).await.unwrap() {
    ControlResponse::Ack { .. } => {}
    other => panic!("cancel failed: {other:?}"),
  }

  let status = ctx.wait_for_completed().await;
  assert!(status.cancelled);
  assert_eq!(status.progress.downloaded, 0);
}

#[tokio::test]
async fn invalid_config_fails_the_job() {
  let ctx = PipelineTestContext::new(3);
  let mut config = ctx.job_config();
  config.concurrency = 0;

  match ctx.handle.request("start".into(), ControlPayload::Start(Box::new(config))).await.unwrap() {
    ControlResponse::Error { message } => assert!(message.contains("concurrency")),
    other => panic!("expected error, got {other:?}"),
  }
  assert_eq!(ctx.status().await.state, PipelineState::Failed);
}

#[tokio::test]
async fn pause_outside_fetching_is_rejected_without_a_transition() {
  let ctx = PipelineTestContext::new(3);

  match ctx.handle.request("pause".into(), ControlPayload::Pause).await.unwrap() {
    ControlResponse::Error { message } => assert!(message.contains("idle")),
    other => panic!("expected error, got {other:?}"),
  }
  assert_eq!(ctx.status().await.state, PipelineState::Idle);

  match ctx.handle.request("resume".into(), ControlPayload::Resume).await.unwrap() {
    ControlResponse::Error { .. } => {}
    other => panic!("expected error, got {other:?}"),
  }
}

#[tokio::test]
async fn start_twice_is_rejected() {
  let ctx = PipelineTestContext::new(2);
  ctx.start(ctx.job_config()).await;

  match ctx
    .handle
    .request("start-again".into(), ControlPayload::Start(Box::new(ctx.job_config())))
    .await
    .unwrap()
  {
    ControlResponse::Error { message } => assert!(message.contains("cannot start")),
    other => panic!("expected error, got {other:?}"),
  }

  ctx.wait_for_completed().await;
}

#[tokio::test]
async fn cancel_from_idle_reaches_completed_cancelled() {
  let ctx = PipelineTestContext::new(0);

  match ctx.handle.request("cancel".into(), ControlPayload::Cancel).await.unwrap() {
    ControlResponse::Ack { state } => assert_eq!(state, PipelineState::Completed),
    other => panic!("cancel failed: {other:?}"),
  }
  let status = ctx.status().await;
  assert!(status.cancelled);
  assert!(status.state.is_terminal());

  // A second cancel on a terminal pipeline is refused.
  match ctx.handle.request("cancel-again".into(), ControlPayload::Cancel).await.unwrap() {
    ControlResponse::Error { .. } => {}
    other => panic!("expected error, got {other:?}"),
  }
}

#[tokio::test]
async fn logs_returns_the_most_recent_entries() {
  let ctx = PipelineTestContext::new(0);
  for i in 0..8 {
    ctx
      .log_buffer
      .push(LogEntry::new(LogLevel::Info, "acervo::test", format!("entry {i}")));
  }

  match ctx.handle.request("logs".into(), ControlPayload::Logs { limit: 3 }).await.unwrap() {
    ControlResponse::Logs(entries) => {
      assert_eq!(entries.len(), 3);
      assert_eq!(entries[0].message, "entry 5");
      assert_eq!(entries[2].message, "entry 7");
    }
    other => panic!("logs failed: {other:?}"),
  }
}
