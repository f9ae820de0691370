//! Court of Arbitration for Sport adapter.
//!
//! The tribunal's jurisprudence database is search-driven. Result pages list
//! awards with their case number ("CAS 2020/A/6978"); the award text itself
//! is a PDF under `Shared Documents`, so most of this source's payload moves
//! through the raw-blob path. Case numbers canonicalize into external ids by
//! replacing separators (`2020_A_6978`).

use acervo_core::{DiscoveryMode, Document, Reference, SourceId};
use scraper::{Html, Selector};

use super::{IndexPage, ParseResult, SourceAdapter, absolute_url, is_pdf};

const BASE_URL: &str = "https://jurisprudence.tas-cas.org";
const RESULTS_PER_PAGE: usize = 10;

pub struct CasAdapter;

impl CasAdapter {
  /// Canonical external id from a case number: "CAS 2020/A/6978" → "2020_A_6978".
  fn canonical_case_id(case_number: &str) -> Option<String> {
    let trimmed = case_number.trim().trim_start_matches("CAS").trim().trim_start_matches("TAS").trim();
    if trimmed.is_empty() {
      return None;
    }
    let id: String = trimmed
      .chars()
      .map(|c| if c == '/' || c == ' ' { '_' } else { c })
      .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
      .collect();
    (!id.is_empty() && id.chars().any(|c| c.is_ascii_digit())).then_some(id)
  }
}

impl SourceAdapter for CasAdapter {
  fn id(&self) -> SourceId {
    SourceId::Cas
  }

  fn supports(&self, mode: &DiscoveryMode) -> bool {
    matches!(mode, DiscoveryMode::Search { .. } | DiscoveryMode::Category { .. })
  }

  fn index_url(&self, mode: &DiscoveryMode, page: u32) -> Option<String> {
    let (term, filters): (&str, &[(String, String)]) = match mode {
      DiscoveryMode::Search { query, filters } => (query, filters),
      // Category maps onto the database's matter filter (football, doping, ...).
      DiscoveryMode::Category { category, .. } => (category, &[]),
      _ => return None,
    };

    let mut url = format!(
      "{BASE_URL}/Search/Pages/results.aspx?k={}&start={}",
      term.replace(' ', "+"),
      page as usize * RESULTS_PER_PAGE
    );
    for (key, value) in filters {
      url.push_str(&format!("&{key}={}", value.replace(' ', "+")));
    }
    Some(url)
  }

  fn parse_index(&self, html: &str, _mode: &DiscoveryMode, _page: u32) -> IndexPage {
    let document = Html::parse_document(html);
    let item_selector = Selector::parse("div.search-result, li.award-item, tr.award-row").unwrap();
    let link_selector = Selector::parse("a").unwrap();

    let mut references = Vec::new();
    for item in document.select(&item_selector) {
      let Some(link) = item
        .select(&link_selector)
        .find(|a| a.value().attr("href").is_some_and(|h| h.contains("Shared%20Documents") || h.contains("Shared Documents")))
      else {
        continue;
      };
      let href = link.value().attr("href").unwrap_or_default();
      let text = item.text().collect::<String>();
      let title = link.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ");

      // The case number appears either in the link text or elsewhere in the row.
      let case_id = Self::canonical_case_id(&title)
        .or_else(|| text.split("CAS").nth(1).and_then(|rest| Self::canonical_case_id(rest)));
      let Some(case_id) = case_id else { continue };

      if references.iter().any(|r: &Reference| r.external_id == case_id) {
        continue;
      }
      references.push(Reference::new(SourceId::Cas, case_id, absolute_url(BASE_URL, href), title));
    }

    let has_more = references.len() >= RESULTS_PER_PAGE;
    IndexPage { references, has_more }
  }

  fn parse(&self, bytes: &[u8], content_type: Option<&str>, url: &str) -> ParseResult {
    if is_pdf(bytes, content_type) {
      // Award PDFs go down the raw-payload path; no HTML structure here.
      return ParseResult::default();
    }

    let html = String::from_utf8_lossy(bytes);
    let page = Html::parse_document(&html);
    let mut result = ParseResult::default();

    // An award landing page: heading plus a PDF link to the full award.
    let title_selector = Selector::parse("h1, h2.award-title").unwrap();
    let Some(title) = page
      .select(&title_selector)
      .next()
      .map(|el| el.text().collect::<String>().trim().to_string())
      .filter(|t| !t.is_empty())
    else {
      result.errors.push("award heading not found".to_string());
      return result;
    };

    let Some(case_id) = Self::canonical_case_id(&title) else {
      result.errors.push(format!("no case number in heading: {title}"));
      return result;
    };

    let mut doc = Document::new(SourceId::Cas, case_id.clone(), title, url);
    doc.category = Some("Laudo".to_string());

    let link_selector = Selector::parse("a").unwrap();
    if let Some(pdf) = page
      .select(&link_selector)
      .find(|a| a.value().attr("href").is_some_and(|h| h.to_ascii_lowercase().ends_with(".pdf")))
    {
      let href = pdf.value().attr("href").unwrap_or_default();
      result.extra_refs.push(
        Reference::new(
          SourceId::Cas,
          format!("{case_id}-award"),
          absolute_url(BASE_URL, href),
          format!("{} (award PDF)", doc.title),
        )
        .with_metadata("parent", case_id),
      );
    }

    result.document = Some(doc);
    result
  }
}
