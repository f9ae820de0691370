//! FetcherActor - downloads and parses one reference at a time.
//!
//! Each worker processes sequentially; the coordinator runs a pool of them
//! for parallelism. Per job: acquire a rate-limit token (cancellable), issue
//! the GET with a rotated user agent, parse on 2xx, hand the document to
//! persistence, and report the outcome to the coordinator.
//!
//! Transient failures (5xx, 429, network, timeout) retry with full-jitter
//! backoff; other 4xx and parse failures are per-item terminal. PDF payloads
//! skip the parser and persist as raw blobs attached to a document shell
//! built from the reference.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
  handle::{CoordinatorHandle, FetcherHandle, PersistenceHandle},
  message::{FetchErrorKind, FetchJob, PersistJob, PipelineEvent, RawPayload},
  rate_limiter::RateLimiter,
};
use crate::{
  fetch::{HttpClient, HttpError, HttpResponse, RetryConfig},
  sources::{SourceAdapter, is_pdf},
};
use acervo_core::{Document, Reference};

/// Configuration for one fetch worker.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
  pub worker_id: usize,
  /// Whether parser-yielded payload references are fed back into the job.
  pub download_payloads: bool,
  pub retry: RetryConfig,
}

/// How a single fetch ended, before it is reported as an event.
enum FetchOutcome {
  Completed,
  Failed(FetchErrorKind),
  /// The job was cancelled while waiting (token or backoff).
  Aborted,
}

pub struct FetcherActor {
  config: FetcherConfig,
  http: Arc<dyn HttpClient>,
  adapter: Arc<dyn SourceAdapter>,
  limiter: Arc<RateLimiter>,
  persistence: PersistenceHandle,
  coordinator: CoordinatorHandle,
  job_rx: mpsc::Receiver<FetchJob>,
  cancel: CancellationToken,
}

impl FetcherActor {
  /// Spawn a worker and return its handle. The mailbox holds a single job:
  /// the coordinator only hands out the next reference once this worker's
  /// previous outcome has arrived.
  #[allow(clippy::too_many_arguments)]
  pub fn spawn(
    config: FetcherConfig,
    http: Arc<dyn HttpClient>,
    adapter: Arc<dyn SourceAdapter>,
    limiter: Arc<RateLimiter>,
    persistence: PersistenceHandle,
    coordinator: CoordinatorHandle,
    cancel: CancellationToken,
  ) -> FetcherHandle {
    let (tx, rx) = mpsc::channel(1);
    let actor = Self {
      config,
      http,
      adapter,
      limiter,
      persistence,
      coordinator,
      job_rx: rx,
      cancel,
    };
    tokio::spawn(actor.run());
    FetcherHandle::new(tx)
  }

  async fn run(mut self) {
    info!(worker_id = self.config.worker_id, "FetcherActor started");

    loop {
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!(worker_id = self.config.worker_id, "FetcherActor shutting down (cancelled)");
          break;
        }

        job = self.job_rx.recv() => {
          match job {
            Some(FetchJob::Fetch(reference)) => self.handle_fetch(reference).await,
            Some(FetchJob::Shutdown) => {
              info!(worker_id = self.config.worker_id, "FetcherActor shutting down (requested)");
              break;
            }
            None => {
              info!(worker_id = self.config.worker_id, "FetcherActor shutting down (channel closed)");
              break;
            }
          }
        }
      }
    }

    info!(worker_id = self.config.worker_id, "FetcherActor stopped");
  }

  async fn handle_fetch(&mut self, reference: Reference) {
    let external_id = reference.external_id.clone();
    let event = match self.fetch_reference(reference).await {
      FetchOutcome::Completed => PipelineEvent::FetchCompleted {
        worker_id: self.config.worker_id,
        external_id,
      },
      FetchOutcome::Failed(kind) => {
        warn!(
          worker_id = self.config.worker_id,
          external_id = %external_id,
          kind = %kind,
          "Fetch failed terminally"
        );
        PipelineEvent::FetchFailed {
          worker_id: self.config.worker_id,
          external_id,
          kind,
        }
      }
      FetchOutcome::Aborted => PipelineEvent::FetchAborted {
        worker_id: self.config.worker_id,
        external_id,
      },
    };

    let _ = self.coordinator.tell(event).await;
  }

  /// Fetch with retries, then process the successful response.
  async fn fetch_reference(&mut self, reference: Reference) -> FetchOutcome {
    let mut attempt = 0;
    let response = loop {
      if self.limiter.acquire().await.is_err() {
        return FetchOutcome::Aborted;
      }

      let transient: FetchErrorKind = match self.http.get(&reference.url).await {
        Ok(response) if response.is_success() => break response,
        Ok(response) if is_transient_status(response.status) => FetchErrorKind::Http(response.status),
        Ok(response) => return FetchOutcome::Failed(FetchErrorKind::Http(response.status)),
        Err(HttpError::Timeout) => FetchErrorKind::Timeout,
        Err(HttpError::Network(_)) => FetchErrorKind::Network,
      };

      if !self.config.retry.has_attempts_left(attempt) {
        return FetchOutcome::Failed(transient);
      }

      let backoff = self.config.retry.backoff_for_attempt(attempt);
      debug!(
        worker_id = self.config.worker_id,
        external_id = %reference.external_id,
        attempt = attempt + 1,
        backoff_ms = backoff.as_millis() as u64,
        kind = %transient,
        "Transient fetch error, will retry"
      );
      tokio::select! {
        _ = self.cancel.cancelled() => return FetchOutcome::Aborted,
        _ = tokio::time::sleep(backoff) => {}
      }
      attempt += 1;
    };

    self.process_response(reference, response).await
  }

  /// Turn response bytes into a persisted document.
  async fn process_response(&mut self, reference: Reference, response: HttpResponse) -> FetchOutcome {
    let content_type = response.content_type.as_deref();

    if is_pdf(&response.body, content_type) {
      // Raw payload: the document shell carries the reference's identity,
      // persistence attaches the blob reference.
      let document = Document::new(
        reference.source_id,
        reference.external_id.clone(),
        reference.title.clone(),
        reference.url.clone(),
      );
      let saved = self
        .persistence
        .send(PersistJob::Save {
          document,
          raw: Some(RawPayload {
            extension: "pdf".to_string(),
            bytes: response.body,
          }),
        })
        .await;
      if saved.is_err() {
        // Persistence only disappears while the job is winding down.
        return FetchOutcome::Aborted;
      }
      return FetchOutcome::Completed;
    }

    let result = self.adapter.parse(&response.body, content_type, &reference.url);

    for error in &result.errors {
      warn!(
        worker_id = self.config.worker_id,
        external_id = %reference.external_id,
        error = %error,
        "Parser reported an error"
      );
    }

    let Some(document) = result.document else {
      return FetchOutcome::Failed(FetchErrorKind::Parse);
    };

    // Payload references (reform PDFs, chapter PDFs) re-enter the job
    // through the coordinator's dedup queue, or are elided.
    if self.config.download_payloads {
      for extra in result.extra_refs {
        let _ = self.coordinator.tell(PipelineEvent::ReferenceDiscovered(extra)).await;
      }
    } else if !result.extra_refs.is_empty() {
      debug!(
        worker_id = self.config.worker_id,
        external_id = %reference.external_id,
        elided = result.extra_refs.len(),
        "Payload references elided (download_payloads=false)"
      );
    }

    debug!(
      worker_id = self.config.worker_id,
      external_id = %reference.external_id,
      articles = document.article_count(),
      reforms = document.reform_count(),
      "Document parsed"
    );

    if self.persistence.send(PersistJob::Save { document, raw: None }).await.is_err() {
      return FetchOutcome::Aborted;
    }
    FetchOutcome::Completed
  }
}

/// 5xx and 429 are worth retrying; other 4xx are terminal for the item.
fn is_transient_status(status: u16) -> bool {
  status == 429 || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_classification() {
    assert!(is_transient_status(500));
    assert!(is_transient_status(503));
    assert!(is_transient_status(429));
    assert!(!is_transient_status(404));
    assert!(!is_transient_status(403));
    assert!(!is_transient_status(200));
  }
}
