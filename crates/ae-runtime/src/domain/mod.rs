//! # Domain Layer
//!
//! Pure state: sessions, replay windows and the routing table. No I/O and no
//! cryptography beyond holding keys.
//!
//! ## Components
//!
//! - `replay`: sliding-window replay protection
//! - `session`: Session State Store
//! - `routing`: I/O Routing Table, handler type and `Emitter`
//! - `outcome`: `DispatchOutcome`, `ForwardReport`
//! - `errors`: `SessionError`, `TransportError`

pub mod errors;
pub mod outcome;
pub mod replay;
pub mod routing;
pub mod session;

pub use errors::*;
pub use outcome::*;
pub use replay::*;
pub use routing::*;
pub use session::*;
