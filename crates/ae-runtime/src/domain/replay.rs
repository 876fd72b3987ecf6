//! # Replay Window
//!
//! Sliding bitmap over the highest accepted sequence number. Bit `i` is set
//! when `highest - i` has been accepted.
//!
//! ```text
//!            highest-W+1                 highest
//!   too old  |<--------- window --------->|  fresh (shifts window)
//! ```

use super::errors::SessionError;

/// Default window size.
pub const DEFAULT_REPLAY_WINDOW: u32 = 64;

/// Largest supported window (bitmap width).
pub const MAX_REPLAY_WINDOW: u32 = 128;

/// Verdict for one received sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    /// Fresh; recorded.
    Accepted,
    /// Already accepted inside the window.
    Replayed,
    /// Older than the window can remember.
    OutOfWindow,
}

/// Receive-side replay protection for one session.
#[derive(Clone, Debug)]
pub struct ReplayWindow {
    highest: Option<u64>,
    bitmap: u128,
    size: u32,
}

impl ReplayWindow {
    /// Create an empty window of `size` sequence numbers.
    ///
    /// # Errors
    ///
    /// `SessionError::InvalidWindow` unless `1 <= size <= 128`.
    pub fn new(size: u32) -> Result<Self, SessionError> {
        if size == 0 || size > MAX_REPLAY_WINDOW {
            return Err(SessionError::InvalidWindow { size });
        }
        Ok(Self {
            highest: None,
            bitmap: 0,
            size,
        })
    }

    /// Check `sequence` and record it if fresh.
    pub fn accept(&mut self, sequence: u64) -> Acceptance {
        let Some(highest) = self.highest else {
            self.highest = Some(sequence);
            self.bitmap = 1;
            return Acceptance::Accepted;
        };

        if sequence > highest {
            let shift = sequence - highest;
            self.bitmap = if shift >= u64::from(self.size) {
                1
            } else {
                ((self.bitmap << shift) | 1) & self.mask()
            };
            self.highest = Some(sequence);
            return Acceptance::Accepted;
        }

        let offset = highest - sequence;
        if offset >= u64::from(self.size) {
            return Acceptance::OutOfWindow;
        }

        let bit = 1u128 << offset;
        if self.bitmap & bit != 0 {
            return Acceptance::Replayed;
        }
        self.bitmap |= bit;
        Acceptance::Accepted
    }

    /// Highest sequence accepted so far.
    pub fn highest(&self) -> Option<u64> {
        self.highest
    }

    /// Window size.
    pub fn size(&self) -> u32 {
        self.size
    }

    fn mask(&self) -> u128 {
        if self.size >= MAX_REPLAY_WINDOW {
            u128::MAX
        } else {
            (1u128 << self.size) - 1
        }
    }
}

impl Default for ReplayWindow {
    fn default() -> Self {
        Self {
            highest: None,
            bitmap: 0,
            size: DEFAULT_REPLAY_WINDOW,
        }
    }
}
