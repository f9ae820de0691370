//! Bounded in-process log buffer.
//!
//! [`BufferLayer`] plugs into the `tracing_subscriber` registry alongside the
//! console/file layers and appends every event to a shared ring buffer. The
//! coordinator serves the buffer through the `Logs(limit)` control
//! operation, so callers can inspect recent activity without touching log
//! files.

use std::{
  collections::VecDeque,
  fmt,
  sync::{Arc, Mutex},
};

use acervo_core::{LogEntry, LogLevel};
use tracing::{Event, Level, Subscriber, field::{Field, Visit}};
use tracing_subscriber::{Layer, layer::Context};

pub const DEFAULT_LOG_CAPACITY: usize = 512;

// ============================================================================
// Ring Buffer
// ============================================================================

/// Thread-safe ring buffer of the most recent [`LogEntry`] values.
pub struct LogBuffer {
  entries: Mutex<VecDeque<LogEntry>>,
  capacity: usize,
}

impl LogBuffer {
  pub fn new(capacity: usize) -> Self {
    Self {
      entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
      capacity: capacity.max(1),
    }
  }

  pub fn push(&self, entry: LogEntry) {
    let mut entries = self.entries.lock().unwrap();
    if entries.len() == self.capacity {
      entries.pop_front();
    }
    entries.push_back(entry);
  }

  /// The most recent `limit` entries, oldest first.
  pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
    let entries = self.entries.lock().unwrap();
    let skip = entries.len().saturating_sub(limit);
    entries.iter().skip(skip).cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.entries.lock().unwrap().len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.lock().unwrap().is_empty()
  }
}

impl Default for LogBuffer {
  fn default() -> Self {
    Self::new(DEFAULT_LOG_CAPACITY)
  }
}

// ============================================================================
// Tracing Layer
// ============================================================================

/// A `tracing` layer that mirrors events into a [`LogBuffer`].
pub struct BufferLayer {
  buffer: Arc<LogBuffer>,
}

impl BufferLayer {
  pub fn new(buffer: Arc<LogBuffer>) -> Self {
    Self { buffer }
  }
}

impl<S: Subscriber> Layer<S> for BufferLayer {
  fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
    let mut visitor = MessageVisitor::default();
    event.record(&mut visitor);

    let level = match *event.metadata().level() {
      Level::TRACE => LogLevel::Trace,
      Level::DEBUG => LogLevel::Debug,
      Level::INFO => LogLevel::Info,
      Level::WARN => LogLevel::Warn,
      Level::ERROR => LogLevel::Error,
    };

    self.buffer.push(LogEntry::new(level, event.metadata().target(), visitor.into_message()));
  }
}

/// Collects the `message` field plus any structured fields into one line.
#[derive(Default)]
struct MessageVisitor {
  message: String,
  fields: Vec<String>,
}

impl MessageVisitor {
  fn into_message(self) -> String {
    if self.fields.is_empty() {
      self.message
    } else if self.message.is_empty() {
      self.fields.join(" ")
    } else {
      format!("{} {}", self.message, self.fields.join(" "))
    }
  }
}

impl Visit for MessageVisitor {
  fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
    if field.name() == "message" {
      self.message = format!("{value:?}");
    } else {
      self.fields.push(format!("{}={:?}", field.name(), value));
    }
  }

  fn record_str(&mut self, field: &Field, value: &str) {
    if field.name() == "message" {
      self.message = value.to_string();
    } else {
      self.fields.push(format!("{}={}", field.name(), value));
    }
  }
}
