//! Test helpers for actor end-to-end tests.
//!
//! Provides `PipelineTestContext`, which wires a coordinator to a scriptable
//! stub HTTP client, a stub source adapter and in-memory storage, plus
//! polling helpers for awaiting pipeline states.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
  time::Duration,
};

use tokio_util::sync::CancellationToken;

use crate::{
  actor::{
    coordinator::{CoordinatorActor, CoordinatorConfig, PipelineDeps},
    handle::CoordinatorHandle,
    message::{ControlPayload, ControlResponse, ProgressEvent, StatusSnapshot},
  },
  fetch::{HttpClient, HttpError, HttpResponse, RetryConfig},
  logbuf::LogBuffer,
  sources::{IndexPage, ParseResult, SourceAdapter},
  storage::MemoryStorage,
};
use acervo_core::{DiscoveryMode, Document, JobConfig, PipelineState, Reference, SourceId};
use async_trait::async_trait;
use uuid::Uuid;

// ============================================================================
// Stub HTTP Client
// ============================================================================

/// Scriptable HTTP stub. URLs without a script get 200 + a body the stub
/// adapter can parse; scripted URLs pop responses in order (the last one
/// repeats).
pub struct StubHttp {
  scripts: Mutex<HashMap<String, Vec<HttpResponse>>>,
  calls: Mutex<HashMap<String, usize>>,
  /// Artificial latency per request; pacing for pause/cancel scenarios.
  delay: Mutex<Duration>,
}

impl StubHttp {
  pub fn new() -> Self {
    Self {
      scripts: Mutex::new(HashMap::new()),
      calls: Mutex::new(HashMap::new()),
      delay: Mutex::new(Duration::ZERO),
    }
  }

  pub fn response(status: u16, body: &[u8]) -> HttpResponse {
    HttpResponse {
      status,
      content_type: Some("text/html; charset=utf-8".to_string()),
      body: body.to_vec(),
    }
  }

  /// Script the sequence of responses for a URL.
  pub fn script(&self, url: &str, responses: Vec<HttpResponse>) {
    self.scripts.lock().unwrap().insert(url.to_string(), responses);
  }

  pub fn set_delay(&self, delay: Duration) {
    *self.delay.lock().unwrap() = delay;
  }

  /// How many times a URL was requested.
  pub fn call_count(&self, url: &str) -> usize {
    self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
  }

  /// Total requests to document URLs (index pages excluded).
  pub fn document_call_count(&self) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|(url, _)| url.starts_with("stub://doc/"))
      .map(|(_, count)| count)
      .sum()
  }
}

#[async_trait]
impl HttpClient for StubHttp {
  async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
    let delay = *self.delay.lock().unwrap();
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }

    let call_index = {
      let mut calls = self.calls.lock().unwrap();
      let count = calls.entry(url.to_string()).or_insert(0);
      *count += 1;
      *count - 1
    };

    let scripted = {
      let scripts = self.scripts.lock().unwrap();
      scripts.get(url).map(|responses| {
        let index = call_index.min(responses.len() - 1);
        responses[index].clone()
      })
    };

    Ok(scripted.unwrap_or_else(|| Self::response(200, b"stub document body")))
  }
}

// ============================================================================
// Stub Source Adapter
// ============================================================================

/// Adapter over a fixed set of index pages. Document URLs are
/// `stub://doc/<external_id>`; parse derives the document from the URL, so
/// any 200 body succeeds unless it is the literal `unparseable`.
pub struct StubAdapter {
  pages: Vec<Vec<Reference>>,
}

impl StubAdapter {
  pub fn reference(index: usize) -> Reference {
    let external_id = format!("ref-{index:02}");
    Reference::new(
      SourceId::Dof,
      external_id.clone(),
      format!("stub://doc/{external_id}"),
      format!("Documento {index}"),
    )
  }

  pub fn doc_url(index: usize) -> String {
    format!("stub://doc/ref-{index:02}")
  }

  /// `count` references spread over pages of `page_size`.
  pub fn with_references(count: usize, page_size: usize) -> Self {
    let references: Vec<Reference> = (0..count).map(Self::reference).collect();
    let pages = if references.is_empty() {
      vec![Vec::new()]
    } else {
      references.chunks(page_size).map(|chunk| chunk.to_vec()).collect()
    };
    Self { pages }
  }
}

impl SourceAdapter for StubAdapter {
  fn id(&self) -> SourceId {
    SourceId::Dof
  }

  fn supports(&self, _mode: &DiscoveryMode) -> bool {
    true
  }

  fn index_url(&self, _mode: &DiscoveryMode, page: u32) -> Option<String> {
    ((page as usize) < self.pages.len()).then(|| format!("stub://index/{page}"))
  }

  fn parse_index(&self, _html: &str, _mode: &DiscoveryMode, page: u32) -> IndexPage {
    let page = page as usize;
    IndexPage {
      references: self.pages.get(page).cloned().unwrap_or_default(),
      has_more: page + 1 < self.pages.len(),
    }
  }

  fn parse(&self, bytes: &[u8], _content_type: Option<&str>, url: &str) -> ParseResult {
    let mut result = ParseResult::default();
    if bytes == b"unparseable" {
      result.errors.push("stub parse failure".to_string());
      return result;
    }

    let Some(external_id) = url.strip_prefix("stub://doc/") else {
      result.errors.push(format!("unexpected url: {url}"));
      return result;
    };
    result.document = Some(Document::new(
      SourceId::Dof,
      external_id,
      format!("Documento {external_id}"),
      url,
    ));
    result
  }
}

// ============================================================================
// Test Context
// ============================================================================

/// One coordinator wired to stub collaborators.
pub struct PipelineTestContext {
  pub http: Arc<StubHttp>,
  pub storage: Arc<MemoryStorage>,
  pub log_buffer: Arc<LogBuffer>,
  pub handle: CoordinatorHandle,
  #[allow(dead_code)]
  /// Process-level token; dropping the context leaves the coordinator to
  /// wind down on its own.
  pub cancel: CancellationToken,
}

impl PipelineTestContext {
  pub fn new(reference_count: usize) -> Self {
    Self::build(Arc::new(StubAdapter::with_references(reference_count, 5)), Arc::new(MemoryStorage::new()))
  }

  /// Share an adapter and storage across contexts (checkpoint resume runs).
  pub fn build(adapter: Arc<StubAdapter>, storage: Arc<MemoryStorage>) -> Self {
    let http = Arc::new(StubHttp::new());
    let log_buffer = Arc::new(LogBuffer::default());
    let cancel = CancellationToken::new();

    let config = CoordinatorConfig {
      // Fast, deterministic backoff for scripted transient failures.
      retry: RetryConfig {
        max_attempts: 3,
        base_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(20),
        full_jitter: false,
        ..RetryConfig::default()
      },
      ask_timeout: Duration::from_secs(2),
      ..CoordinatorConfig::default()
    };

    let handle = CoordinatorActor::spawn(
      config,
      PipelineDeps {
        http: http.clone(),
        adapter,
        storage: storage.clone(),
        object_store: None,
        log_buffer: log_buffer.clone(),
      },
      cancel.clone(),
    );

    Self {
      http,
      storage,
      log_buffer,
      handle,
      cancel,
    }
  }

  /// A config the stub adapter accepts, tuned for test speed.
  pub fn job_config(&self) -> JobConfig {
    let mut config = JobConfig::new(SourceId::Dof, DiscoveryMode::Today, "/tmp/acervo-test");
    config.rate_limit_rps = 1_000.0;
    config.concurrency = 3;
    config.download_payloads = false;
    config
  }

  pub async fn start(&self, config: JobConfig) -> Uuid {
    match self.handle.request("start".into(), ControlPayload::Start(Box::new(config))).await {
      Ok(ControlResponse::Started { job_id }) => job_id,
      other => panic!("start failed: {other:?}"),
    }
  }

  pub async fn status(&self) -> StatusSnapshot {
    match self.handle.request("status".into(), ControlPayload::Status).await {
      Ok(ControlResponse::Status(snapshot)) => {
        // Counter invariant, checked at every observation.
        assert!(
          snapshot.progress.discovered >= snapshot.progress.downloaded + snapshot.progress.errors,
          "counter invariant violated: {:?}",
          snapshot.progress
        );
        snapshot
      }
      other => panic!("status failed: {other:?}"),
    }
  }

  pub async fn subscribe(&self) -> tokio::sync::mpsc::Receiver<ProgressEvent> {
    match self.handle.request("subscribe".into(), ControlPayload::Subscribe).await {
      Ok(ControlResponse::Events(rx)) => rx,
      other => panic!("subscribe failed: {other:?}"),
    }
  }

  pub async fn wait_for_state(&self, state: PipelineState, timeout: Duration) -> bool {
    wait_for(timeout, || async { self.status().await.state == state }).await
  }

  pub async fn wait_for_completed(&self) -> StatusSnapshot {
    assert!(
      self.wait_for_state(PipelineState::Completed, Duration::from_secs(10)).await,
      "pipeline did not complete; last status: {:?}",
      self.status().await
    );
    self.status().await
  }
}

/// Wait for a condition to become true, with timeout.
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
  F: FnMut() -> Fut,
  Fut: std::future::Future<Output = bool>,
{
  let start = std::time::Instant::now();
  let poll_interval = Duration::from_millis(10);

  while start.elapsed() < timeout {
    if check().await {
      return true;
    }
    tokio::time::sleep(poll_interval).await;
  }

  false
}

/// Drain a subscriber until `count` `DocumentFetched` events have been seen.
pub async fn wait_for_fetched(rx: &mut tokio::sync::mpsc::Receiver<ProgressEvent>, count: usize, timeout: Duration) -> bool {
  let deadline = tokio::time::Instant::now() + timeout;
  let mut seen = 0;
  while seen < count {
    match tokio::time::timeout_at(deadline, rx.recv()).await {
      Ok(Some(ProgressEvent::DocumentFetched { .. })) => seen += 1,
      Ok(Some(_)) => {}
      Ok(None) | Err(_) => return false,
    }
  }
  true
}
