//! # Audit Subscriber
//!
//! Defines the subscription side of the audit bus.

use crate::events::{AuditEvent, AuditFilter};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The audit bus was dropped.
    Closed,
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Audit bus closed")
    }
}

impl std::error::Error for SubscriptionError {}

/// A subscription handle for receiving audit events.
pub struct Subscription {
    receiver: broadcast::Receiver<AuditEvent>,
    filter: AuditFilter,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<AuditEvent>, filter: AuditFilter) -> Self {
        Self { receiver, filter }
    }

    /// Receive the next event that matches the filter.
    ///
    /// Returns `None` once the bus is dropped.
    pub async fn recv(&mut self) -> Option<AuditEvent> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Audit subscriber lagged, events dropped");
                    continue;
                }
            };

            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Try to receive the next matching event without waiting.
    ///
    /// # Errors
    ///
    /// `SubscriptionError::Closed` once the bus is dropped.
    pub fn try_recv(&mut self) -> Result<Option<AuditEvent>, SubscriptionError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }

    /// Drain every matching event currently buffered.
    pub fn drain(&mut self) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        while let Ok(Some(event)) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn audit_filter(&self) -> &AuditFilter {
        &self.filter
    }
}

/// Filtered `Stream` of audit events.
pub struct AuditStream {
    inner: BroadcastStream<AuditEvent>,
    filter: AuditFilter,
}

impl AuditStream {
    pub(crate) fn new(receiver: broadcast::Receiver<AuditEvent>, filter: AuditFilter) -> Self {
        Self {
            inner: BroadcastStream::new(receiver),
            filter,
        }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn audit_filter(&self) -> &AuditFilter {
        &self.filter
    }
}

impl Stream for AuditStream {
    type Item = AuditEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if self.filter.matches(&event) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Audit stream lagged, events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
