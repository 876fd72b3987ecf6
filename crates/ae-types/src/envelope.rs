//! # `EventMessage` Envelope
//!
//! The only structure that crosses a module boundary.
//!
//! ## Wire Layout (big endian)
//!
//! ```text
//! | sender:u16 | input:u16 | sequence:u64 | length:u16 | ciphertext[length] | tag[16] |
//! ```
//!
//! The 14-byte header is bound into the authentication tag as associated data,
//! so a host cannot redirect a ciphertext to another input, re-attribute it to
//! another sender or change its sequence number without failing `open`.

use crate::errors::EnvelopeError;
use crate::ids::{IoId, ModuleId};

/// Authentication tag length for every supported cipher.
pub const TAG_LEN: usize = 16;

/// Length of the fixed header (sender, input, sequence, length).
pub const HEADER_LEN: usize = 2 + 2 + 8 + 2;

/// A sealed event addressed to one input of one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    /// Module that sealed the event. Selects the session used to open it.
    pub sender: ModuleId,
    /// Input of the receiving module.
    pub input: IoId,
    /// Per-session send sequence number.
    pub sequence: u64,
    /// Encrypted payload.
    pub ciphertext: Vec<u8>,
    /// AEAD tag over header and ciphertext.
    pub tag: [u8; TAG_LEN],
}

impl EventMessage {
    /// Largest ciphertext the 16-bit length field can describe.
    pub const MAX_CIPHERTEXT: usize = u16::MAX as usize;

    /// Header bytes used as associated data.
    ///
    /// `len` is the ciphertext length; it equals the plaintext length for the
    /// stream-cipher based AEADs in use, so the header can be built before
    /// encryption.
    #[must_use]
    pub fn header(sender: ModuleId, input: IoId, sequence: u64, len: u16) -> [u8; HEADER_LEN] {
        let mut header = [0u8; HEADER_LEN];
        header[0..2].copy_from_slice(&sender.to_be_bytes());
        header[2..4].copy_from_slice(&input.0.to_be_bytes());
        header[4..12].copy_from_slice(&sequence.to_be_bytes());
        header[12..14].copy_from_slice(&len.to_be_bytes());
        header
    }

    /// Associated data of this message.
    ///
    /// Only valid for messages whose ciphertext fits the length field, which
    /// `decode` and `encode` both guarantee.
    #[must_use]
    pub fn associated_data(&self) -> [u8; HEADER_LEN] {
        let len = u16::try_from(self.ciphertext.len()).unwrap_or(u16::MAX);
        Self::header(self.sender, self.input, self.sequence, len)
    }

    /// Serialize to the wire layout.
    ///
    /// # Errors
    ///
    /// `EnvelopeError::PayloadTooLarge` if the ciphertext does not fit the
    /// 16-bit length field.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        if self.ciphertext.len() > Self::MAX_CIPHERTEXT {
            return Err(EnvelopeError::PayloadTooLarge {
                len: self.ciphertext.len(),
                max: Self::MAX_CIPHERTEXT,
            });
        }

        let mut out = Vec::with_capacity(HEADER_LEN + self.ciphertext.len() + TAG_LEN);
        out.extend_from_slice(&self.associated_data());
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        Ok(out)
    }

    /// Parse the wire layout, enforcing `max_payload` on the ciphertext.
    ///
    /// # Errors
    ///
    /// - `Truncated` when the buffer cannot hold a header and a tag
    /// - `PayloadTooLarge` when the declared length exceeds `max_payload`
    /// - `LengthMismatch` when the declared length disagrees with the buffer
    pub fn decode(bytes: &[u8], max_payload: usize) -> Result<Self, EnvelopeError> {
        let min = HEADER_LEN + TAG_LEN;
        if bytes.len() < min {
            return Err(EnvelopeError::Truncated {
                len: bytes.len(),
                min,
            });
        }

        let sender = ModuleId(u16::from_be_bytes([bytes[0], bytes[1]]));
        let input = IoId(u16::from_be_bytes([bytes[2], bytes[3]]));
        let mut sequence = [0u8; 8];
        sequence.copy_from_slice(&bytes[4..12]);
        let sequence = u64::from_be_bytes(sequence);
        let declared = usize::from(u16::from_be_bytes([bytes[12], bytes[13]]));

        if declared > max_payload {
            return Err(EnvelopeError::PayloadTooLarge {
                len: declared,
                max: max_payload,
            });
        }

        let actual = bytes.len() - min;
        if declared != actual {
            return Err(EnvelopeError::LengthMismatch { declared, actual });
        }

        let body_end = HEADER_LEN + declared;
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&bytes[body_end..]);

        Ok(Self {
            sender,
            input,
            sequence,
            ciphertext: bytes[HEADER_LEN..body_end].to_vec(),
            tag,
        })
    }
}
