//! # AE Audit - Observability Hook
//!
//! Best-effort notification channel for events the module runtime drops or
//! cannot deliver.
//!
//! ```text
//! ┌──────────────┐   publish() (never blocks)   ┌──────────────┐
//! │ Dispatcher / │ ───────────────────────────→ │  Audit Bus   │
//! │  Forwarder   │                              │ (broadcast)  │
//! └──────────────┘                              └──────┬───────┘
//!                                                      │ subscribe()
//!                                                      ↓
//!                                               audit consumers
//! ```
//!
//! ## Guarantees
//!
//! - `publish` is synchronous and non-blocking; with no subscriber the event
//!   is dropped.
//! - Slow subscribers lag and lose events instead of applying backpressure to
//!   protocol processing.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{AuditEvent, AuditFilter, AuditTopic};
pub use publisher::{AuditPublisher, InMemoryAuditBus};
pub use subscriber::{AuditStream, Subscription, SubscriptionError};

/// Events buffered per subscriber before the oldest are overwritten.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
