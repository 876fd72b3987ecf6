//! # Authentic Execution Types
//!
//! Identifiers, the `EventMessage` envelope and the error taxonomy shared by
//! every crate in the workspace.
//!
//! ## Design Principles
//!
//! - **Envelope Integrity**: `EventMessage` is the only thing that crosses a
//!   module boundary. Plaintext payloads never leave a module.
//! - **Explicit Sender**: the envelope's `sender` selects the session used to
//!   authenticate it; the header is bound into the authentication tag.
//! - **Two Error Planes**: silent rejections (`Rejection`) never leave the
//!   dispatcher, reported faults (`RuntimeError`) go to the host.

pub mod envelope;
pub mod errors;
pub mod ids;

pub use envelope::{EventMessage, HEADER_LEN, TAG_LEN};
pub use errors::*;
pub use ids::*;
