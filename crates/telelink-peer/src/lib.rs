//! Telemetry link endpoints.
//!
//! This is the "just works" layer: open a link, send messages by id or name,
//! receive decoded messages. Corrupted frames are dropped and counted.

pub mod endpoint;
pub mod error;

pub use endpoint::{Endpoint, PeerConfig};
pub use error::{PeerError, Result};
