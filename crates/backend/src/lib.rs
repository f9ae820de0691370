//! Acervo backend - the actor-based acquisition pipeline.
//!
//! The pipeline is built from message-passing actors instead of shared-state
//! concurrency: every stateful component runs as a long-lived task owning an
//! `mpsc` mailbox, and coordination flows exclusively through messages.
//!
//! ```text
//!                 ┌──────────────┐  ReferenceDiscovered   ┌───────────┐
//!   Discovery ───▶│  Coordinator │───────────────────────▶│ Fetcher xN│
//!                 │ (state owner)│◀───FetchCompleted──────└─────┬─────┘
//!                 └──────┬───────┘                              │ Save
//!                        │ WriteCheckpoint                ┌─────▼─────┐
//!                        └───────────────────────────────▶│Persistence│
//!                                                         └───────────┘
//! ```
//!
//! Discovery and all fetchers share one token-bucket [`actor::RateLimiter`];
//! the storage backend is touched only by the persistence actor. The
//! coordinator exposes the external control surface
//! (start/pause/resume/cancel/status/logs/events) through its handle.

pub mod actor;
pub mod fetch;
pub mod logbuf;
pub mod sources;
pub mod storage;

pub use actor::{CoordinatorActor, CoordinatorConfig, CoordinatorHandle};
