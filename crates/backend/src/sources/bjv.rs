//! Biblioteca Jurídica Virtual adapter.
//!
//! The academic library is search-driven: `bjv/resultados` serves paginated
//! result items linking books as `/bjv/detalle-libro/<id>-<slug>`. A book's
//! detail page lists downloadable chapter PDFs, which surface as payload
//! references.

use acervo_core::{DiscoveryMode, Document, Reference, SourceId};
use scraper::{Html, Selector};

use super::{IndexPage, ParseResult, SourceAdapter, absolute_url, is_pdf};

const BASE_URL: &str = "https://biblio.juridicas.unam.mx";

pub struct BjvAdapter;

impl BjvAdapter {
  /// Book id from `/bjv/detalle-libro/7321-derecho-administrativo` style paths.
  fn book_id(href: &str) -> Option<String> {
    let (_, rest) = href.split_once("/detalle-libro/")?;
    let id: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    (!id.is_empty()).then_some(id)
  }
}

impl SourceAdapter for BjvAdapter {
  fn id(&self) -> SourceId {
    SourceId::Bjv
  }

  fn supports(&self, mode: &DiscoveryMode) -> bool {
    matches!(mode, DiscoveryMode::Search { .. })
  }

  fn index_url(&self, mode: &DiscoveryMode, page: u32) -> Option<String> {
    let DiscoveryMode::Search { query, .. } = mode else { return None };
    Some(format!("{BASE_URL}/bjv/resultados?ti={}&pg={}", query.replace(' ', "+"), page + 1))
  }

  fn parse_index(&self, html: &str, _mode: &DiscoveryMode, _page: u32) -> IndexPage {
    let document = Html::parse_document(html);
    let item_selector = Selector::parse("div.resultado-item a").unwrap();

    let mut references = Vec::new();
    for link in document.select(&item_selector) {
      let Some(href) = link.value().attr("href") else { continue };
      let Some(book_id) = Self::book_id(href) else { continue };
      let title = link.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ");
      if title.is_empty() || references.iter().any(|r: &Reference| r.external_id == book_id) {
        continue;
      }
      references.push(Reference::new(SourceId::Bjv, book_id, absolute_url(BASE_URL, href), title));
    }

    // The library renders a "siguiente" pager link while more pages exist.
    let pager_selector = Selector::parse("a.siguiente, li.siguiente a").unwrap();
    let has_more = document.select(&pager_selector).next().is_some();
    IndexPage { references, has_more }
  }

  fn parse(&self, bytes: &[u8], content_type: Option<&str>, url: &str) -> ParseResult {
    if is_pdf(bytes, content_type) {
      return ParseResult::default();
    }

    let html = String::from_utf8_lossy(bytes);
    let page = Html::parse_document(&html);
    let mut result = ParseResult::default();

    let Some(book_id) = Self::book_id(url) else {
      result.errors.push(format!("not a book detail url: {url}"));
      return result;
    };

    let title_selector = Selector::parse("h1.titulo-libro, div.detalle-libro h1, h1").unwrap();
    let Some(title) = page
      .select(&title_selector)
      .next()
      .map(|el| el.text().collect::<String>().trim().to_string())
      .filter(|t| !t.is_empty())
    else {
      result.errors.push("book title not found".to_string());
      return result;
    };

    let mut doc = Document::new(SourceId::Bjv, book_id.clone(), title, url);
    doc.category = Some("Libro".to_string());

    // Chapter PDFs are the actual content of interest.
    let link_selector = Selector::parse("a").unwrap();
    for (index, link) in page
      .select(&link_selector)
      .filter(|a| a.value().attr("href").is_some_and(|h| h.to_ascii_lowercase().ends_with(".pdf")))
      .enumerate()
    {
      let href = link.value().attr("href").unwrap_or_default();
      let chapter_title = link.text().collect::<String>().trim().to_string();
      result.extra_refs.push(
        Reference::new(
          SourceId::Bjv,
          format!("{book_id}-c{}", index + 1),
          absolute_url(BASE_URL, href),
          if chapter_title.is_empty() {
            format!("{} (capítulo {})", doc.title, index + 1)
          } else {
            chapter_title
          },
        )
        .with_metadata("parent", book_id.clone()),
      );
    }

    result.document = Some(doc);
    result
  }
}
