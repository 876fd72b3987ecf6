//! Results of dispatching an inbound event and of forwarding outputs.

use ae_types::{Destination, IoId, ModuleId, Rejection, RuntimeError};

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Output the payload was emitted on.
    pub output: IoId,
    /// Destination attempted.
    pub destination: Destination,
    /// Sequence number used on success.
    pub result: Result<u64, RuntimeError>,
}

/// Per-destination results of every emit made while handling one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardReport {
    /// Attempts in emit order, then destination order.
    pub deliveries: Vec<Delivery>,
    /// Outputs emitted with no destination.
    pub unrouted: Vec<IoId>,
}

impl ForwardReport {
    /// Successful deliveries.
    pub fn delivered(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries.iter().filter(|d| d.result.is_ok())
    }

    /// Failed deliveries.
    pub fn failed(&self) -> impl Iterator<Item = &Delivery> {
        self.deliveries.iter().filter(|d| d.result.is_err())
    }

    /// First peer whose session ran out of sequence numbers.
    pub fn exhausted_peer(&self) -> Option<ModuleId> {
        self.deliveries.iter().find_map(|d| match d.result {
            Err(RuntimeError::SequenceExhausted { peer }) => Some(peer),
            _ => None,
        })
    }

    /// True if nothing was attempted.
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    pub(crate) fn merge(&mut self, other: ForwardReport) {
        self.deliveries.extend(other.deliveries);
        self.unrouted.extend(other.unrouted);
    }
}

/// Terminal state of one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran and its outputs were forwarded.
    Completed(ForwardReport),
    /// Dropped before reaching the handler.
    Rejected(Rejection),
}

impl DispatchOutcome {
    /// True for `Completed`.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// The rejection, if any.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            Self::Completed(_) => None,
        }
    }
}
