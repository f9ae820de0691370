//! Actor-based concurrency primitives for the acquisition pipeline.
//!
//! Instead of shared-state concurrency with `Arc<Mutex<...>>`, components
//! communicate via message passing:
//!
//! - Each logical component runs as a long-lived task with its own mailbox
//! - Handlers run to completion; one message at a time per actor
//! - State is owned, not shared
//! - `tell` is fire-and-forget; `ask` waits on a reply channel under a
//!   timeout and resolves to the reply, `AskTimeout`, or `ActorStopped`
//!
//! # Actors
//!
//! - [`CoordinatorActor`]: per-source state owner and control surface
//! - [`discovery::DiscoveryActor`]: paginates the source index into references
//! - [`fetcher::FetcherActor`]: pool workers that download and parse references
//! - [`persistence::PersistenceActor`]: sole owner of the storage backend
//! - [`RateLimiter`]: the shared token-bucket gate (not an actor, but the
//!   one self-guarding shared object)
//!
//! Ordering guarantees are those of tokio's mpsc channels: per-sender FIFO
//! to a recipient, nothing across senders or recipients.

pub mod discovery;
pub mod fetcher;
pub mod handle;
pub mod message;
pub mod persistence;
mod coordinator;
mod rate_limiter;

#[cfg(test)]
mod __tests__;

pub use coordinator::{CoordinatorActor, CoordinatorConfig, PipelineDeps};
pub use handle::{AskError, CoordinatorHandle, DEFAULT_ASK_TIMEOUT, SendError};
pub use rate_limiter::{Cancelled, RateLimiter};
