//! Documents, references and the sources they come from.
//!
//! A [`Reference`] is a discovered pointer to a not-yet-fetched document.
//! A [`Document`] is the fetched-and-parsed record that gets persisted.
//! Both are immutable once created; ownership transfers between actors by
//! message payload move.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Sources
// ============================================================================

/// The four supported legal-document sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
  /// Diario Oficial de la Federación (national gazette, date-indexed)
  Dof,
  /// Suprema Corte legislation portal (filter-indexed)
  Scjn,
  /// Biblioteca Jurídica Virtual (search-driven academic library)
  Bjv,
  /// Court of Arbitration for Sport jurisprudence database (search-driven)
  Cas,
}

impl SourceId {
  /// Stable string form used in file layouts and log fields.
  pub fn as_str(&self) -> &'static str {
    match self {
      SourceId::Dof => "dof",
      SourceId::Scjn => "scjn",
      SourceId::Bjv => "bjv",
      SourceId::Cas => "cas",
    }
  }

  /// All known sources, in display order.
  pub fn all() -> &'static [SourceId] {
    &[SourceId::Dof, SourceId::Scjn, SourceId::Bjv, SourceId::Cas]
  }
}

impl fmt::Display for SourceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SourceId {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "dof" => Ok(SourceId::Dof),
      "scjn" => Ok(SourceId::Scjn),
      "bjv" => Ok(SourceId::Bjv),
      "cas" => Ok(SourceId::Cas),
      other => Err(format!("unknown source: {other}")),
    }
  }
}

// ============================================================================
// References
// ============================================================================

/// A discovered pointer to a not-yet-fetched document.
///
/// `external_id` uniquely identifies the reference within its source (the
/// gazette's `codigo`, the court portal's encrypted `q` parameter, and so
/// on). Discovery never emits the same `external_id` twice within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
  pub source_id: SourceId,
  pub external_id: String,
  pub url: String,
  pub title: String,
  /// Source-specific extras carried through untouched (category labels,
  /// result-row dates, ...).
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub metadata: BTreeMap<String, String>,
}

impl Reference {
  pub fn new(source_id: SourceId, external_id: impl Into<String>, url: impl Into<String>, title: impl Into<String>) -> Self {
    Self {
      source_id,
      external_id: external_id.into(),
      url: url.into(),
      title: title.into(),
      metadata: BTreeMap::new(),
    }
  }

  pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.metadata.insert(key.into(), value.into());
    self
  }
}

// ============================================================================
// Documents
// ============================================================================

/// An individual article within a legal document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
  /// "1", "2 Bis", "Transitorio Primero", ...
  pub number: String,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub title: String,
  pub content: String,
  /// Dates on which this article was reformed, as published.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub reform_dates: Vec<String>,
}

/// A reform/amendment entry in a document's modification history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reform {
  /// Source-scoped identifier of the reform publication.
  pub external_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub publication_date: Option<NaiveDate>,
  #[serde(default, skip_serializing_if = "String::is_empty")]
  pub gazette_section: String,
  /// Direct PDF link for the reform text, when the portal exposes one.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pdf_url: Option<String>,
}

/// A fetched-and-parsed record, persisted exactly once per
/// `(source_id, external_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
  pub id: Uuid,
  pub source_id: SourceId,
  pub external_id: String,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub publication_date: Option<NaiveDate>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scope: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub articles: Vec<Article>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub reforms: Vec<Reform>,
  pub source_url: String,
  /// Where the raw fetched payload (PDF/HTML) was stored, if it was.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub raw_blob_ref: Option<String>,
}

impl Document {
  /// Create a document with a fresh identity and no parsed structure.
  ///
  /// Used both as the base for parser output and as the shell persisted
  /// alongside raw payloads (PDFs) that carry no parseable structure.
  pub fn new(source_id: SourceId, external_id: impl Into<String>, title: impl Into<String>, source_url: impl Into<String>) -> Self {
    Self {
      id: Uuid::new_v4(),
      source_id,
      external_id: external_id.into(),
      title: title.into(),
      publication_date: None,
      category: None,
      scope: None,
      status: None,
      articles: Vec::new(),
      reforms: Vec::new(),
      source_url: source_url.into(),
      raw_blob_ref: None,
    }
  }

  pub fn article_count(&self) -> usize {
    self.articles.len()
  }

  pub fn reform_count(&self) -> usize {
    self.reforms.len()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn source_id_round_trips_through_str() {
    for source in SourceId::all() {
      assert_eq!(source.as_str().parse::<SourceId>().unwrap(), *source);
    }
    assert!("gaceta".parse::<SourceId>().is_err());
  }

  #[test]
  fn document_serializes_without_empty_fields() {
    let doc = Document::new(SourceId::Dof, "5551234", "Decreto de prueba", "https://dof.gob.mx/nota_detalle.php?codigo=5551234");
    let json = serde_json::to_value(&doc).unwrap();
    assert!(json.get("articles").is_none());
    assert!(json.get("raw_blob_ref").is_none());
    assert_eq!(json["source_id"], "dof");
  }

  #[test]
  fn reference_metadata_is_ordered() {
    let reference = Reference::new(SourceId::Scjn, "abc123", "https://example.test/doc", "Ley de prueba")
      .with_metadata("categoria", "Ley")
      .with_metadata("ambito", "Federal");
    let json = serde_json::to_string(&reference).unwrap();
    // BTreeMap keys serialize sorted, keeping files diff-stable.
    assert!(json.find("ambito").unwrap() < json.find("categoria").unwrap());
  }
}
