//! Suprema Corte legislation portal adapter.
//!
//! The portal is filter-indexed: a search grid (`gridResultados`) over
//! category / scope / status, paginated server-side. Documents are addressed
//! by an opaque encrypted `q` parameter; detail pages carry metadata, the
//! ordinance text and the reform history with per-reform PDF links.
//!
//! The portal's markup is known to change; every selector lives here and
//! nowhere else.

use acervo_core::{Article, DiscoveryMode, Document, Reference, Reform, SourceId};
use scraper::{Html, Selector};

use super::{IndexPage, ParseResult, SourceAdapter, is_pdf, parse_dmy_date, query_param};

const BASE_URL: &str = "https://legislacion.scjn.gob.mx/Buscador/Paginas";
const RESULTS_PER_PAGE: usize = 20;

pub struct ScjnAdapter;

impl ScjnAdapter {
  fn detail_url(q_param: &str) -> String {
    format!("{BASE_URL}/wfOrdenamientoDetalle.aspx?q={q_param}")
  }

  fn reform_pdf_url(q_param: &str) -> String {
    format!("{BASE_URL}/AbrirDocReforma.aspx?q={q_param}")
  }
}

impl SourceAdapter for ScjnAdapter {
  fn id(&self) -> SourceId {
    SourceId::Scjn
  }

  fn supports(&self, mode: &DiscoveryMode) -> bool {
    matches!(mode, DiscoveryMode::Category { .. } | DiscoveryMode::Search { .. })
  }

  fn index_url(&self, mode: &DiscoveryMode, page: u32) -> Option<String> {
    let mut params: Vec<(String, String)> = match mode {
      DiscoveryMode::Category { category, scope, status } => {
        let mut p = vec![("Clasificacion".to_string(), category.clone())];
        if let Some(scope) = scope {
          p.push(("Ambito".to_string(), scope.clone()));
        }
        if let Some(status) = status {
          p.push(("Estatus".to_string(), status.clone()));
        }
        p
      }
      DiscoveryMode::Search { query, filters } => {
        let mut p = vec![("Busqueda".to_string(), query.clone())];
        p.extend(filters.iter().cloned());
        p
      }
      _ => return None,
    };
    params.push(("Pagina".to_string(), (page + 1).to_string()));

    let query: Vec<String> = params
      .iter()
      .map(|(k, v)| format!("{k}={}", v.replace(' ', "+")))
      .collect();
    Some(format!("{BASE_URL}/wfBuscadorResultados.aspx?{}", query.join("&")))
  }

  fn parse_index(&self, html: &str, _mode: &DiscoveryMode, _page: u32) -> IndexPage {
    let document = Html::parse_document(html);
    let grid_selector = Selector::parse("#gridResultados").unwrap();
    let row_selector = Selector::parse("tr.dxgvDataRow").unwrap();
    let link_selector = Selector::parse("a").unwrap();
    let cell_selector = Selector::parse("td").unwrap();

    let Some(grid) = document.select(&grid_selector).next() else {
      // Unrecognizable page; discovery treats an empty page with no
      // continuation as exhaustion.
      return IndexPage::default();
    };

    let mut references = Vec::new();
    for row in grid.select(&row_selector) {
      let Some(link) = row
        .select(&link_selector)
        .find(|a| a.value().attr("href").is_some_and(|h| h.contains("wfOrdenamientoDetalle.aspx")))
      else {
        continue;
      };
      let href = link.value().attr("href").unwrap_or_default();
      let Some(q_param) = query_param(href, "q") else { continue };
      let title = link.text().collect::<String>().trim().to_string();

      let cells: Vec<String> = row
        .select(&cell_selector)
        .map(|c| c.text().collect::<String>().trim().to_string())
        .collect();

      let mut reference = Reference::new(SourceId::Scjn, q_param.clone(), Self::detail_url(&q_param), title);
      // Grid columns: title, category, publication date, status, scope.
      if let Some(category) = cells.get(1).filter(|c| !c.is_empty()) {
        reference = reference.with_metadata("category", category.clone());
      }
      if let Some(status) = cells.get(3).filter(|c| !c.is_empty()) {
        reference = reference.with_metadata("status", status.clone());
      }
      if let Some(scope) = cells.get(4).filter(|c| !c.is_empty()) {
        reference = reference.with_metadata("scope", scope.clone());
      }
      references.push(reference);
    }

    let has_more = references.len() >= RESULTS_PER_PAGE;
    IndexPage { references, has_more }
  }

  fn parse(&self, bytes: &[u8], content_type: Option<&str>, url: &str) -> ParseResult {
    if is_pdf(bytes, content_type) {
      return ParseResult::default();
    }

    let html = String::from_utf8_lossy(bytes);
    let page = Html::parse_document(&html);
    let mut result = ParseResult::default();

    let Some(q_param) = query_param(url, "q") else {
      result.errors.push(format!("missing q parameter in url: {url}"));
      return result;
    };

    let container_selector = Selector::parse("#contenedor").unwrap();
    let Some(container) = page.select(&container_selector).next() else {
      result.errors.push("document container not found (id=contenedor)".to_string());
      return result;
    };

    let title_selector = Selector::parse(".titulo-ordenamiento").unwrap();
    let Some(title) = container
      .select(&title_selector)
      .next()
      .map(|el| el.text().collect::<String>().trim().to_string())
      .filter(|t| !t.is_empty())
    else {
      result.errors.push("ordinance title not found".to_string());
      return result;
    };

    let mut doc = Document::new(SourceId::Scjn, q_param, title, url);

    // Metadata rows render as "Label: value" lines inside datos-ordenamiento.
    let datos_selector = Selector::parse(".datos-ordenamiento").unwrap();
    if let Some(datos) = container.select(&datos_selector).next() {
      for line in datos.text().collect::<String>().lines() {
        let Some((label, value)) = line.split_once(':') else { continue };
        let value = value.trim().to_string();
        if value.is_empty() {
          continue;
        }
        match label.trim().to_ascii_lowercase().as_str() {
          "categoría" | "categoria" | "clasificación" | "clasificacion" => doc.category = Some(value),
          "ámbito" | "ambito" => doc.scope = Some(value),
          "estatus" => doc.status = Some(value),
          "publicación" | "publicacion" | "fecha de publicación" | "fecha de publicacion" => {
            doc.publication_date = parse_dmy_date(&value)
          }
          _ => {}
        }
      }
    }

    // Ordinance text: article anchors inside contenido-ordenamiento.
    let article_selector = Selector::parse("#contenido-ordenamiento .articulo").unwrap();
    for (index, el) in container.select(&article_selector).enumerate() {
      let text = el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ");
      if text.is_empty() {
        continue;
      }
      let (number, content) = match text.split_once(".-") {
        Some((head, rest)) => (format!("{head}.-"), rest.trim().to_string()),
        None => (format!("Artículo {}", index + 1), text),
      };
      doc.articles.push(Article {
        number,
        title: String::new(),
        content,
        reform_dates: Vec::new(),
      });
    }

    // Reform history table: each row links the reform's own q parameter.
    let reform_selector = Selector::parse("#gridReformas tr").unwrap();
    let link_selector = Selector::parse("a").unwrap();
    let cell_selector = Selector::parse("td").unwrap();
    for row in container.select(&reform_selector) {
      let Some(link) = row
        .select(&link_selector)
        .find(|a| a.value().attr("href").is_some_and(|h| h.contains("q=")))
      else {
        continue;
      };
      let Some(reform_q) = query_param(link.value().attr("href").unwrap_or_default(), "q") else {
        continue;
      };
      let cells: Vec<String> = row
        .select(&cell_selector)
        .map(|c| c.text().collect::<String>().trim().to_string())
        .collect();

      let publication_date = cells.iter().find_map(|c| parse_dmy_date(c));
      let pdf_url = Self::reform_pdf_url(&reform_q);

      result.extra_refs.push(
        Reference::new(
          SourceId::Scjn,
          format!("{}-r{}", doc.external_id, reform_q),
          pdf_url.clone(),
          format!("{} (reforma)", doc.title),
        )
        .with_metadata("parent", doc.external_id.clone()),
      );
      doc.reforms.push(Reform {
        external_id: reform_q,
        publication_date,
        gazette_section: cells.first().cloned().unwrap_or_default(),
        pdf_url: Some(pdf_url),
      });
    }

    result.document = Some(doc);
    result
  }
}
