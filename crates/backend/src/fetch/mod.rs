//! HTTP collaborator: the client trait the pipeline fetches through, plus
//! the default reqwest-backed implementation.
//!
//! Fetch workers and discovery depend only on [`HttpClient`], which keeps
//! them testable against stub responses and leaves room for alternative
//! transports (a headless-browser adapter for JS-heavy sources is just
//! another implementation returning post-render HTML).

mod retry;

use std::{
  sync::atomic::{AtomicUsize, Ordering},
  time::Duration,
};

use async_trait::async_trait;

pub use self::retry::RetryConfig;

// ============================================================================
// Trait & Types
// ============================================================================

/// A plain HTTP GET response. Body is owned bytes so PDF payloads pass
/// through unmodified.
#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  pub content_type: Option<String>,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Body decoded as UTF-8, lossily. Index and detail pages go through here.
  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

/// Transport-level failures. Status codes are not errors at this layer;
/// callers classify them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
  #[error("network error: {0}")]
  Network(String),
  #[error("request timed out")]
  Timeout,
}

/// The HTTP collaborator contract.
#[async_trait]
pub trait HttpClient: Send + Sync {
  async fn get(&self, url: &str) -> Result<HttpResponse, HttpError>;
}

// ============================================================================
// Reqwest Implementation
// ============================================================================

/// User agents rotated across requests. Public legal portals throttle or
/// block repeated identical agents; rotation keeps long backfills polite
/// but functional.
const USER_AGENTS: &[&str] = &[
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
  "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
  "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Configuration for the default client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
  /// Total per-request timeout.
  pub request_timeout: Duration,
  /// Connection-establishment timeout.
  pub connect_timeout: Duration,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self {
      request_timeout: Duration::from_secs(30),
      connect_timeout: Duration::from_secs(10),
    }
  }
}

/// Default [`HttpClient`] backed by reqwest, with user-agent rotation.
pub struct ReqwestClient {
  client: reqwest::Client,
  next_agent: AtomicUsize,
}

impl ReqwestClient {
  pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
    let client = reqwest::Client::builder()
      .timeout(config.request_timeout)
      .connect_timeout(config.connect_timeout)
      .build()
      .map_err(|e| HttpError::Network(e.to_string()))?;

    Ok(Self {
      client,
      next_agent: AtomicUsize::new(0),
    })
  }

  fn user_agent(&self) -> &'static str {
    let idx = self.next_agent.fetch_add(1, Ordering::Relaxed);
    USER_AGENTS[idx % USER_AGENTS.len()]
  }
}

#[async_trait]
impl HttpClient for ReqwestClient {
  async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
    let response = self
      .client
      .get(url)
      .header(reqwest::header::USER_AGENT, self.user_agent())
      .header(
        reqwest::header::ACCEPT,
        "text/html,application/xhtml+xml,application/pdf;q=0.9,*/*;q=0.8",
      )
      .send()
      .await
      .map_err(|e| {
        if e.is_timeout() {
          HttpError::Timeout
        } else {
          HttpError::Network(e.to_string())
        }
      })?;

    let status = response.status().as_u16();
    let content_type = response
      .headers()
      .get(reqwest::header::CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .map(|v| v.to_string());

    let body = response.bytes().await.map_err(|e| {
      if e.is_timeout() {
        HttpError::Timeout
      } else {
        HttpError::Network(e.to_string())
      }
    })?;

    Ok(HttpResponse {
      status,
      content_type,
      body: body.to_vec(),
    })
  }
}
