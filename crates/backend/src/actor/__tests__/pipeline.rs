//! End-to-end pipeline scenarios: happy path, retries, terminal failures,
//! pause/resume and cancellation.

use std::time::Duration;

use super::helpers::{PipelineTestContext, StubAdapter, StubHttp, wait_for, wait_for_fetched};
use crate::actor::message::{ControlPayload, ControlResponse, ProgressEvent};
use acervo_core::PipelineState;

#[tokio::test]
async fn happy_path_persists_every_discovered_document() {
  let ctx = PipelineTestContext::new(5);
  ctx.start(ctx.job_config()).await;

  let status = ctx.wait_for_completed().await;
  assert_eq!(status.progress.downloaded, 5);
  assert_eq!(status.progress.errors, 0);
  assert_eq!(status.progress.discovered, 5);
  assert!(!status.cancelled);
  assert_eq!(ctx.storage.document_count(), 5);
}

#[tokio::test]
async fn transient_failure_is_retried_to_success() {
  let ctx = PipelineTestContext::new(5);
  // Reference #3 fails twice with 503, then succeeds.
  ctx.http.script(
    &StubAdapter::doc_url(2),
    vec![
      StubHttp::response(503, b"unavailable"),
      StubHttp::response(503, b"unavailable"),
      StubHttp::response(200, b"stub document body"),
    ],
  );

  ctx.start(ctx.job_config()).await;
  let status = ctx.wait_for_completed().await;

  assert_eq!(status.progress.downloaded, 5);
  assert_eq!(status.progress.errors, 0);
  assert_eq!(ctx.http.call_count(&StubAdapter::doc_url(2)), 3);
  // 5 documents, 2 extra attempts for the flaky one.
  assert_eq!(ctx.http.document_call_count(), 7);
}

#[tokio::test]
async fn terminal_404_is_counted_and_reported() {
  let ctx = PipelineTestContext::new(5);
  let mut events = ctx.subscribe().await;
  ctx.http.script(&StubAdapter::doc_url(1), vec![StubHttp::response(404, b"not found")]);

  ctx.start(ctx.job_config()).await;
  let status = ctx.wait_for_completed().await;

  assert_eq!(status.progress.downloaded, 4);
  assert_eq!(status.progress.errors, 1);
  assert_eq!(ctx.storage.document_count(), 4);
  // Only one attempt: 4xx is not retried.
  assert_eq!(ctx.http.call_count(&StubAdapter::doc_url(1)), 1);

  let mut failed_id = None;
  while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(200), events.recv()).await {
    if let ProgressEvent::FetchFailed { external_id, .. } = event {
      failed_id = Some(external_id);
    }
  }
  assert_eq!(failed_id.as_deref(), Some("ref-01"));
}

#[tokio::test]
async fn parse_failure_is_per_item_terminal() {
  let ctx = PipelineTestContext::new(3);
  ctx.http.script(&StubAdapter::doc_url(0), vec![StubHttp::response(200, b"unparseable")]);

  ctx.start(ctx.job_config()).await;
  let status = ctx.wait_for_completed().await;

  assert_eq!(status.progress.downloaded, 2);
  assert_eq!(status.progress.errors, 1);
  assert_eq!(ctx.storage.document_count(), 2);
}

#[tokio::test]
async fn pause_freezes_progress_and_resume_finishes_the_job() {
  let ctx = PipelineTestContext::new(10);
  ctx.http.set_delay(Duration::from_millis(20));
  let mut events = ctx.subscribe().await;

  let mut config = ctx.job_config();
  config.concurrency = 2;
  ctx.start(config).await;

  assert!(wait_for_fetched(&mut events, 3, Duration::from_secs(5)).await, "first three fetches");

  match ctx.handle.request("pause".into(), ControlPayload::Pause).await.unwrap() {
    ControlResponse::Ack { state } => assert_eq!(state, PipelineState::Paused),
    other => panic!("pause failed: {other:?}"),
  }

  // Let in-flight fetches drain, then verify the timeline goes flat.
  assert!(
    wait_for(Duration::from_secs(2), || async { ctx.status().await.progress.active == 0 }).await,
    "in-flight fetches should drain after pause"
  );
  let frozen = ctx.status().await;
  assert_eq!(frozen.state, PipelineState::Paused);
  tokio::time::sleep(Duration::from_millis(150)).await;
  let still_frozen = ctx.status().await;
  assert_eq!(still_frozen.progress.downloaded, frozen.progress.downloaded);
  assert!(still_frozen.progress.downloaded < 10);

  match ctx.handle.request("resume".into(), ControlPayload::Resume).await.unwrap() {
    ControlResponse::Ack { state } => assert_eq!(state, PipelineState::Fetching),
    other => panic!("resume failed: {other:?}"),
  }

  let status = ctx.wait_for_completed().await;
  // Same outcome as an uninterrupted run.
  assert_eq!(status.progress.downloaded, 10);
  assert_eq!(status.progress.errors, 0);
  assert_eq!(ctx.storage.document_count(), 10);
}

#[tokio::test]
async fn cancel_mid_flight_stops_saves_and_reports_cancelled() {
  let ctx = PipelineTestContext::new(20);
  ctx.http.set_delay(Duration::from_millis(15));
  let mut events = ctx.subscribe().await;

  let mut config = ctx.job_config();
  config.concurrency = 2;
  let concurrency = config.concurrency;
  ctx.start(config).await;

  assert!(wait_for_fetched(&mut events, 4, Duration::from_secs(5)).await, "first four fetches");

  match ctx.handle.request("cancel".into(), ControlPayload::Cancel).await.unwrap() {
    ControlResponse::Ack { state } => assert!(matches!(state, PipelineState::Cancelling | PipelineState::Completed)),
    other => panic!("cancel failed: {other:?}"),
  }

  let status = ctx.wait_for_completed().await;
  assert!(status.cancelled);
  assert!(status.progress.downloaded >= 4, "downloaded: {}", status.progress.downloaded);
  // At most the in-flight fetches complete after cancel.
  assert!(
    status.progress.downloaded <= 4 + concurrency,
    "downloaded: {}",
    status.progress.downloaded
  );

  // No further saves after the terminal state.
  let saved = ctx.storage.document_count();
  assert_eq!(saved, status.progress.downloaded);
  tokio::time::sleep(Duration::from_millis(150)).await;
  assert_eq!(ctx.storage.document_count(), saved);
}

#[tokio::test]
async fn progress_events_narrate_the_run() {
  let ctx = PipelineTestContext::new(2);
  let mut events = ctx.subscribe().await;

  ctx.start(ctx.job_config()).await;
  ctx.wait_for_completed().await;

  let mut saw_discovering = false;
  let mut saw_fetching = false;
  let mut fetched = 0;
  let mut completed = false;
  while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(200), events.recv()).await {
    match event {
      ProgressEvent::StateChanged { to: PipelineState::Discovering, .. } => saw_discovering = true,
      ProgressEvent::StateChanged { to: PipelineState::Fetching, .. } => saw_fetching = true,
      ProgressEvent::DocumentFetched { .. } => fetched += 1,
      ProgressEvent::JobCompleted { cancelled } => {
        assert!(!cancelled);
        completed = true;
      }
      _ => {}
    }
  }

  assert!(saw_discovering && saw_fetching && completed);
  assert_eq!(fetched, 2);
}
