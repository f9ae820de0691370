//! Shared domain types for the Acervo acquisition pipeline.
//!
//! This crate is intentionally dependency-light: it holds the data that
//! flows between the actor runtime, the source adapters, the storage
//! backends and the CLI, with no behavior beyond validation and
//! serialization.

pub mod checkpoint;
pub mod document;
pub mod job;
pub mod log;

pub use checkpoint::Checkpoint;
pub use document::{Article, Document, Reference, Reform, SourceId};
pub use job::{DiscoveryMode, JobConfig, JobConfigError, PipelineState, Progress};
pub use log::{LogEntry, LogLevel};
