//! Observability trace entries exposed through the control surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Log severity, mirroring the tracing levels that get captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Trace,
  Debug,
  Info,
  Warn,
  Error,
}

/// A single entry in the bounded in-process log ring buffer, readable via
/// the `Logs(limit)` control operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
  pub timestamp: DateTime<Utc>,
  pub level: LogLevel,
  /// Originating component (the tracing target, e.g. `acervo::actor::fetcher`).
  pub component: String,
  pub message: String,
}

impl LogEntry {
  pub fn new(level: LogLevel, component: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      timestamp: Utc::now(),
      level,
      component: component.into(),
      message: message.into(),
    }
  }
}
