//! Durable resume points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A durable snapshot of job progress, written by the coordinator every K
/// completions and on pause/cancel.
///
/// On resume, `processed_ids` pre-seed the seen-set so discovery skips
/// already-completed work; `pending_ids` and `failed_ids` are intentionally
/// *not* seeded, so interrupted and failed references are picked up again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
  pub session_id: String,
  /// High-water mark: the external id of the most recently completed fetch.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_processed_external_id: Option<String>,
  /// External ids fetched and persisted successfully, in completion order.
  pub processed_ids: Vec<String>,
  /// External ids queued or in flight when the checkpoint was taken.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub pending_ids: Vec<String>,
  /// External ids that failed terminally during this session.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub failed_ids: Vec<String>,
  pub created_at: DateTime<Utc>,
}

impl Checkpoint {
  pub fn new(session_id: impl Into<String>) -> Self {
    Self {
      session_id: session_id.into(),
      last_processed_external_id: None,
      processed_ids: Vec::new(),
      pending_ids: Vec::new(),
      failed_ids: Vec::new(),
      created_at: Utc::now(),
    }
  }
}
