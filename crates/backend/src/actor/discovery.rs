//! DiscoveryActor - enumerates references from a source's index.
//!
//! Pagination walks the adapter's page space; every index fetch draws from
//! the same rate budget as the fetch workers. Candidate references are
//! deduplicated against the coordinator's seen-set (ask) before being told
//! into the work queue, so resumed jobs skip already-processed ids for free.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
  handle::{CoordinatorHandle, DiscoveryHandle},
  message::{DiscoveryJob, PipelineEvent},
  rate_limiter::RateLimiter,
};
use crate::{
  fetch::{HttpClient, HttpError, RetryConfig},
  sources::SourceAdapter,
};
use acervo_core::DiscoveryMode;

/// Configuration for the discovery actor.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
  pub retry: RetryConfig,
}

enum IndexFetch {
  Page(String),
  Aborted,
  Failed(String),
}

pub struct DiscoveryActor {
  config: DiscoveryConfig,
  adapter: Arc<dyn SourceAdapter>,
  http: Arc<dyn HttpClient>,
  limiter: Arc<RateLimiter>,
  coordinator: CoordinatorHandle,
  job_rx: mpsc::Receiver<DiscoveryJob>,
  cancel: CancellationToken,
}

impl DiscoveryActor {
  pub fn spawn(
    config: DiscoveryConfig,
    adapter: Arc<dyn SourceAdapter>,
    http: Arc<dyn HttpClient>,
    limiter: Arc<RateLimiter>,
    coordinator: CoordinatorHandle,
    cancel: CancellationToken,
  ) -> DiscoveryHandle {
    let (tx, rx) = mpsc::channel(8);
    let actor = Self {
      config,
      adapter,
      http,
      limiter,
      coordinator,
      job_rx: rx,
      cancel,
    };
    tokio::spawn(actor.run());
    DiscoveryHandle::new(tx)
  }

  async fn run(mut self) {
    info!(source = %self.adapter.id(), "DiscoveryActor started");

    loop {
      tokio::select! {
        biased;

        _ = self.cancel.cancelled() => {
          info!(source = %self.adapter.id(), "DiscoveryActor shutting down (cancelled)");
          break;
        }

        job = self.job_rx.recv() => {
          match job {
            Some(DiscoveryJob::Discover { mode, max_results }) => self.discover(mode, max_results).await,
            Some(DiscoveryJob::Shutdown) => {
              info!(source = %self.adapter.id(), "DiscoveryActor shutting down (requested)");
              break;
            }
            None => {
              info!(source = %self.adapter.id(), "DiscoveryActor shutting down (channel closed)");
              break;
            }
          }
        }
      }
    }

    info!(source = %self.adapter.id(), "DiscoveryActor stopped");
  }

  /// Walk the index page space, streaming unseen references to the
  /// coordinator. Always ends with either `DiscoveryFinished` or
  /// `DiscoveryFailed`.
  async fn discover(&mut self, mode: DiscoveryMode, max_results: usize) {
    let mut discovered = 0usize;
    let mut page = 0u32;

    'pages: while discovered < max_results {
      let Some(url) = self.adapter.index_url(&mode, page) else {
        debug!(source = %self.adapter.id(), page, "Index page space exhausted");
        break;
      };

      let html = match self.fetch_index(&url).await {
        IndexFetch::Page(html) => html,
        IndexFetch::Aborted => break,
        IndexFetch::Failed(reason) => {
          warn!(source = %self.adapter.id(), url = %url, reason = %reason, "Index page unreachable");
          let _ = self.coordinator.tell(PipelineEvent::DiscoveryFailed { reason }).await;
          return;
        }
      };

      let index = self.adapter.parse_index(&html, &mode, page);
      debug!(
        source = %self.adapter.id(),
        page,
        found = index.references.len(),
        has_more = index.has_more,
        "Index page parsed"
      );

      for reference in index.references {
        if discovered >= max_results {
          break 'pages;
        }
        if self.cancel.is_cancelled() {
          break 'pages;
        }

        // Seen-set consult: skip ids the job already knows about
        // (including checkpoint-restored ones).
        match self.coordinator.check_seen(&reference.external_id).await {
          Ok(true) => continue,
          Ok(false) => {}
          Err(e) => {
            debug!(error = %e, "Coordinator unavailable, stopping discovery");
            return;
          }
        }

        if self.coordinator.tell(PipelineEvent::ReferenceDiscovered(reference)).await.is_err() {
          return;
        }
        discovered += 1;
      }

      if !index.has_more {
        break;
      }
      page += 1;
    }

    info!(source = %self.adapter.id(), discovered, "Discovery finished");
    let _ = self.coordinator.tell(PipelineEvent::DiscoveryFinished { discovered }).await;
  }

  /// Fetch one index page under the shared rate budget, retrying transient
  /// failures. A page that stays unreachable is job-fatal.
  async fn fetch_index(&self, url: &str) -> IndexFetch {
    let mut attempt = 0;
    loop {
      if self.limiter.acquire().await.is_err() {
        return IndexFetch::Aborted;
      }

      let failure = match self.http.get(url).await {
        Ok(response) if response.is_success() => return IndexFetch::Page(response.text()),
        Ok(response) if response.status == 429 || (500..600).contains(&response.status) => {
          format!("index returned HTTP {}", response.status)
        }
        Ok(response) => return IndexFetch::Failed(format!("index returned HTTP {}", response.status)),
        Err(HttpError::Timeout) => "index request timed out".to_string(),
        Err(HttpError::Network(e)) => format!("network error: {e}"),
      };

      if !self.config.retry.has_attempts_left(attempt) {
        return IndexFetch::Failed(failure);
      }

      let backoff = self.config.retry.backoff_for_attempt(attempt);
      debug!(url = %url, attempt = attempt + 1, backoff_ms = backoff.as_millis() as u64, "Retrying index fetch");
      tokio::select! {
        _ = self.cancel.cancelled() => return IndexFetch::Aborted,
        _ = tokio::time::sleep(backoff) => {}
      }
      attempt += 1;
    }
  }
}
