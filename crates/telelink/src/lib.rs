//! Checksum-protected telemetry links over unreliable byte streams.
//!
//! telelink packs typed, fixed-layout messages into compact frames, checks
//! them with a schema-seeded CRC-16/X.25, and recovers frame boundaries from
//! noisy serial or radio links without outside help.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte transport interface and device handles
//! - [`schema`]: field codec, message descriptors, registry and built-in catalog
//! - [`frame`]: frame layout, encoder, streaming parser and channel multiplexer
//! - [`peer`]: link endpoints with typed send/receive (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use telelink_transport::*;
}

/// Re-export schema types.
pub mod schema {
    pub use telelink_schema::*;
}

/// Re-export frame types.
pub mod frame {
    pub use telelink_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use telelink_peer::*;
}
