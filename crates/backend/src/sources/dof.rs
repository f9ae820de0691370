//! Diario Oficial de la Federación adapter.
//!
//! The gazette is date-indexed: one summary page per publication day, each
//! linking the day's notes via `nota_detalle.php?codigo=...`. Detail pages
//! come in two shapes (structured laws with explicit article divs, and
//! unstructured notices where content lives in justified paragraphs), so
//! parsing falls back from the structured markup to the loose one.

use acervo_core::{Article, DiscoveryMode, Document, Reference, SourceId};
use chrono::{Datelike, Utc};
use scraper::{Html, Selector};

use super::{IndexPage, ParseResult, SourceAdapter, absolute_url, is_pdf, parse_dmy_date, query_param};

const BASE_URL: &str = "https://dof.gob.mx";

pub struct DofAdapter;

impl DofAdapter {
  fn date_for_page(&self, mode: &DiscoveryMode, page: u32) -> Option<chrono::NaiveDate> {
    match mode {
      DiscoveryMode::Today => (page == 0).then(|| Utc::now().date_naive()),
      DiscoveryMode::Date(date) => (page == 0).then_some(*date),
      DiscoveryMode::Range(start, end) => {
        let date = start.checked_add_days(chrono::Days::new(page as u64))?;
        (date <= *end).then_some(date)
      }
      _ => None,
    }
  }
}

impl SourceAdapter for DofAdapter {
  fn id(&self) -> SourceId {
    SourceId::Dof
  }

  fn supports(&self, mode: &DiscoveryMode) -> bool {
    matches!(mode, DiscoveryMode::Today | DiscoveryMode::Date(_) | DiscoveryMode::Range(..))
  }

  fn index_url(&self, mode: &DiscoveryMode, page: u32) -> Option<String> {
    let date = self.date_for_page(mode, page)?;
    Some(format!(
      "{BASE_URL}/index.php?year={}&month={:02}&day={:02}",
      date.year(),
      date.month(),
      date.day()
    ))
  }

  fn parse_index(&self, html: &str, mode: &DiscoveryMode, page: u32) -> IndexPage {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("a.enlaces").unwrap();

    let mut references = Vec::new();
    for link in document.select(&link_selector) {
      let Some(href) = link.value().attr("href") else { continue };
      if !href.contains("nota_detalle.php?codigo=") {
        continue;
      }
      let url = absolute_url(BASE_URL, href);
      let Some(codigo) = query_param(&url, "codigo") else { continue };
      let title = link.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ");

      references.push(Reference::new(SourceId::Dof, codigo, url, title));
    }

    // Range mode advances by date; index_url() running off the end of the
    // range is what terminates pagination, not page content.
    let has_more = matches!(mode, DiscoveryMode::Range(..)) && self.date_for_page(mode, page + 1).is_some();
    IndexPage { references, has_more }
  }

  fn parse(&self, bytes: &[u8], content_type: Option<&str>, url: &str) -> ParseResult {
    if is_pdf(bytes, content_type) {
      // Raw gazette PDFs carry no parseable structure here.
      return ParseResult::default();
    }

    let html = String::from_utf8_lossy(bytes);
    let page = Html::parse_document(&html);
    let mut result = ParseResult::default();

    let Some(external_id) = query_param(url, "codigo") else {
      result.errors.push(format!("missing codigo parameter in url: {url}"));
      return result;
    };

    // Title: law pages use h3.titulo; notices only have a bold heading
    // inside the note body.
    let title_selector = Selector::parse("h3.titulo").unwrap();
    let bold_selector = Selector::parse("div#DivDetalleNota b").unwrap();
    let title = page
      .select(&title_selector)
      .next()
      .or_else(|| page.select(&bold_selector).next())
      .map(|el| el.text().collect::<String>().trim().to_string())
      .filter(|t| !t.is_empty());

    let Some(title) = title else {
      result.errors.push("no recognizable title in gazette note".to_string());
      return result;
    };

    let mut doc = Document::new(SourceId::Dof, external_id.clone(), title, url);

    // Publication date: explicit span on law pages, "DOF: dd/mm/yyyy" text
    // elsewhere.
    let date_selector = Selector::parse("span#lblFecha").unwrap();
    doc.publication_date = page
      .select(&date_selector)
      .next()
      .map(|el| el.text().collect::<String>())
      .or_else(|| {
        html.find("DOF:").map(|pos| {
          html[pos + 4..]
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit() || *c == '/')
            .collect::<String>()
        })
      })
      .and_then(|raw| parse_dmy_date(raw.trim().trim_start_matches("DOF:").trim()));

    // Articles: structured divs first, justified paragraphs as fallback.
    let article_selector = Selector::parse("div#DivDetalleNota div.Articulo").unwrap();
    let paragraph_selector = Selector::parse("div#DivDetalleNota p[align=\"justify\"]").unwrap();

    let structured: Vec<String> = page
      .select(&article_selector)
      .map(|el| el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" "))
      .collect();

    if !structured.is_empty() {
      for (index, text) in structured.iter().enumerate() {
        let (number, content) = match text.split_once(".-") {
          Some((head, rest)) => (format!("{head}.-"), rest.trim().to_string()),
          None => (format!("Art. {}", index + 1), text.clone()),
        };
        doc.articles.push(Article {
          number,
          title: String::new(),
          content,
          reform_dates: Vec::new(),
        });
      }
    } else {
      for (index, paragraph) in page.select(&paragraph_selector).enumerate() {
        let text = paragraph.text().collect::<String>().trim().to_string();
        if text.len() > 10 {
          doc.articles.push(Article {
            number: format!("Párrafo {}", index + 1),
            title: String::new(),
            content: text,
            reform_dates: Vec::new(),
          });
        }
      }
    }

    // PDF attachments linked from the note body become payload references.
    let pdf_selector = Selector::parse("div#DivDetalleNota a").unwrap();
    for link in page.select(&pdf_selector) {
      if let Some(href) = link.value().attr("href")
        && href.to_ascii_lowercase().ends_with(".pdf")
      {
        let pdf_url = absolute_url(BASE_URL, href);
        let name = pdf_url.rsplit('/').next().unwrap_or("adjunto").trim_end_matches(".pdf");
        result.extra_refs.push(
          Reference::new(SourceId::Dof, format!("{external_id}-{name}"), pdf_url, format!("{} (PDF)", doc.title))
            .with_metadata("parent", external_id.clone()),
        );
      }
    }

    result.document = Some(doc);
    result
  }
}
