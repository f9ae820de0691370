//! Source adapters: one per legal portal.
//!
//! An adapter owns everything site-specific (URL schemes, pagination rules,
//! markup selectors) behind a pure interface. The runtime never inspects
//! HTML itself, which is what makes portal markup drift a one-file fix and
//! lets the actor tests run against a stub adapter.

mod bjv;
mod cas;
mod dof;
mod scjn;

use std::sync::Arc;

use acervo_core::{DiscoveryMode, Document, Reference, SourceId};

pub use self::{bjv::BjvAdapter, cas::CasAdapter, dof::DofAdapter, scjn::ScjnAdapter};

// ============================================================================
// Contract
// ============================================================================

/// One page of a source's index: the references found on it and whether the
/// source advertises more pages after it.
#[derive(Debug, Default)]
pub struct IndexPage {
  pub references: Vec<Reference>,
  pub has_more: bool,
}

/// Parser output. Deterministic, no I/O, failures as data: a page that
/// cannot be parsed yields `document: None` plus `errors`, never a panic.
#[derive(Debug, Default)]
pub struct ParseResult {
  pub document: Option<Document>,
  /// Additional references the page points at (reform PDFs, chapter PDFs).
  pub extra_refs: Vec<Reference>,
  pub errors: Vec<String>,
}

/// A source adapter: index enumeration plus content parsing for one portal.
pub trait SourceAdapter: Send + Sync {
  fn id(&self) -> SourceId;

  /// Whether this source can serve the given discovery mode.
  fn supports(&self, mode: &DiscoveryMode) -> bool;

  /// URL of index page `page` (0-based) for the mode, or `None` once the
  /// mode's page space is exhausted (e.g. past the end of a date range).
  fn index_url(&self, mode: &DiscoveryMode, page: u32) -> Option<String>;

  /// Extract references from an index page.
  fn parse_index(&self, html: &str, mode: &DiscoveryMode, page: u32) -> IndexPage;

  /// Parse a fetched document page into a structured record.
  fn parse(&self, bytes: &[u8], content_type: Option<&str>, url: &str) -> ParseResult;
}

/// The shipped adapter for a source.
pub fn adapter_for(source: SourceId) -> Arc<dyn SourceAdapter> {
  match source {
    SourceId::Dof => Arc::new(DofAdapter),
    SourceId::Scjn => Arc::new(ScjnAdapter),
    SourceId::Bjv => Arc::new(BjvAdapter),
    SourceId::Cas => Arc::new(CasAdapter),
  }
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Extract a query parameter's value from a URL, urldecoding not included
/// (portal ids are opaque tokens and pass through verbatim).
pub(crate) fn query_param(url: &str, name: &str) -> Option<String> {
  let (_, query) = url.split_once('?')?;
  query.split('&').find_map(|pair| {
    let (key, value) = pair.split_once('=')?;
    (key == name && !value.is_empty()).then(|| value.to_string())
  })
}

/// Parse a `dd/mm/yyyy` date as published by the gazette and the court portal.
pub(crate) fn parse_dmy_date(raw: &str) -> Option<chrono::NaiveDate> {
  let mut parts = raw.trim().splitn(3, '/');
  let day: u32 = parts.next()?.trim().parse().ok()?;
  let month: u32 = parts.next()?.trim().parse().ok()?;
  let year: i32 = parts.next()?.trim().parse().ok()?;
  chrono::NaiveDate::from_ymd_opt(year, month, day)
}

/// Resolve a possibly-relative `href` against a base URL.
pub(crate) fn absolute_url(base: &str, href: &str) -> String {
  if href.starts_with("http://") || href.starts_with("https://") {
    href.to_string()
  } else if let Some(rest) = href.strip_prefix('/') {
    format!("{}/{}", base.trim_end_matches('/'), rest)
  } else {
    format!("{}/{}", base.trim_end_matches('/'), href)
  }
}

/// True when the payload is a PDF (by header or by magic bytes).
pub(crate) fn is_pdf(bytes: &[u8], content_type: Option<&str>) -> bool {
  content_type.is_some_and(|ct| ct.starts_with("application/pdf")) || bytes.starts_with(b"%PDF")
}
