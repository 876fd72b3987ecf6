//! # Session State Store
//!
//! Per-module table of established sessions, keyed by peer identity.
//!
//! ## Invariants
//!
//! - A session is immutable after establishment except for its send counter
//!   and receive window.
//! - The send counter never wraps. The value `u64::MAX` is never handed out;
//!   reaching it retires the session.
//! - Re-establishing a session with the same peer replaces it with fresh
//!   counters (key rotation).

use super::errors::SessionError;
use super::replay::{Acceptance, ReplayWindow};
use ae_crypto::SecretKey;
use ae_types::ModuleId;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Established channel with one peer module.
#[derive(Debug)]
pub struct Session {
    peer: ModuleId,
    key: SecretKey,
    send_sequence: u64,
    window: ReplayWindow,
}

impl Session {
    fn new(peer: ModuleId, key: SecretKey, window: ReplayWindow) -> Self {
        Self {
            peer,
            key,
            send_sequence: 0,
            window,
        }
    }

    /// Peer module.
    pub fn peer(&self) -> ModuleId {
        self.peer
    }

    /// Session key.
    pub fn key(&self) -> &SecretKey {
        &self.key
    }

    /// Next sequence number `advance_send` will hand out.
    pub fn send_sequence(&self) -> u64 {
        self.send_sequence
    }

    /// Receive-side replay window.
    pub fn window(&self) -> &ReplayWindow {
        &self.window
    }
}

/// Session table owned by one module instance.
#[derive(Debug)]
pub struct SessionStore {
    sessions: HashMap<ModuleId, Session>,
    window_size: u32,
}

impl SessionStore {
    /// Create an empty store whose sessions use `window_size`.
    ///
    /// # Errors
    ///
    /// `SessionError::InvalidWindow` for sizes outside `1..=128`.
    pub fn new(window_size: u32) -> Result<Self, SessionError> {
        ReplayWindow::new(window_size)?;
        Ok(Self {
            sessions: HashMap::new(),
            window_size,
        })
    }

    /// Install the session with `peer`, replacing any existing one.
    ///
    /// Returns `true` if an existing session was rotated.
    pub fn establish(&mut self, peer: ModuleId, key: SecretKey) -> bool {
        // Size was validated in `new`.
        let window = ReplayWindow::new(self.window_size).unwrap_or_default();
        let rotated = self
            .sessions
            .insert(peer, Session::new(peer, key, window))
            .is_some();
        debug!(%peer, rotated, "Session established");
        rotated
    }

    /// Look up the session with `peer`.
    ///
    /// # Errors
    ///
    /// `SessionError::NotFound` if there is none.
    pub fn get(&self, peer: ModuleId) -> Result<&Session, SessionError> {
        self.sessions
            .get(&peer)
            .ok_or(SessionError::NotFound { peer })
    }

    /// True if a session with `peer` exists.
    pub fn contains(&self, peer: ModuleId) -> bool {
        self.sessions.contains_key(&peer)
    }

    /// Return the next send sequence number for `peer` and increment it.
    ///
    /// # Errors
    ///
    /// - `NotFound` if there is no session
    /// - `SequenceExhausted` if the counter reached `u64::MAX`; the session is
    ///   retired and must be re-established
    pub fn advance_send(&mut self, peer: ModuleId) -> Result<u64, SessionError> {
        let session = self
            .sessions
            .get_mut(&peer)
            .ok_or(SessionError::NotFound { peer })?;

        let sequence = session.send_sequence;
        if sequence == u64::MAX {
            self.sessions.remove(&peer);
            warn!(%peer, "Send sequence exhausted, session retired");
            return Err(SessionError::SequenceExhausted { peer });
        }

        session.send_sequence = sequence + 1;
        Ok(sequence)
    }

    /// Run `sequence` from `peer` through the session's replay window.
    ///
    /// # Errors
    ///
    /// `SessionError::NotFound` if there is no session.
    pub fn accept_receive(
        &mut self,
        peer: ModuleId,
        sequence: u64,
    ) -> Result<Acceptance, SessionError> {
        let session = self
            .sessions
            .get_mut(&peer)
            .ok_or(SessionError::NotFound { peer })?;
        Ok(session.window.accept(sequence))
    }

    /// Move the send counter forward, e.g. when resuming a persisted session.
    ///
    /// # Errors
    ///
    /// - `NotFound` if there is no session
    /// - `CounterRegression` if `sequence` is below the current counter
    pub fn fast_forward_send(&mut self, peer: ModuleId, sequence: u64) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&peer)
            .ok_or(SessionError::NotFound { peer })?;

        if sequence < session.send_sequence {
            return Err(SessionError::CounterRegression {
                peer,
                current: session.send_sequence,
                requested: sequence,
            });
        }
        session.send_sequence = sequence;
        Ok(())
    }

    /// Remove the session with `peer`.
    pub fn retire(&mut self, peer: ModuleId) -> Option<Session> {
        self.sessions.remove(&peer)
    }

    /// Peers with an established session, sorted.
    pub fn peers(&self) -> Vec<ModuleId> {
        let mut peers: Vec<_> = self.sessions.keys().copied().collect();
        peers.sort();
        peers
    }

    /// Number of sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True if no session exists.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Window size used for new sessions.
    pub fn window_size(&self) -> u32 {
        self.window_size
    }
}
