//! Byte transport abstraction for telemetry links.
//!
//! The protocol core never opens or configures a physical link. It only needs
//! something that can hand over one byte at a time and push a batch of bytes
//! out, which is what [`LinkTransport`] describes:
//! - [`StreamTransport`] adapts any `Read + Write` stream (serial device file,
//!   socket, pipe, in-memory cursor)
//! - [`SerialDevice`] opens an already-configured device node by path
//!
//! This is the lowest layer of telelink. Everything else builds on top of
//! the [`LinkTransport`] trait provided here.

pub mod device;
pub mod error;
pub mod traits;

pub use device::{Drain, SerialDevice};
pub use error::{Result, TransportError};
pub use traits::{LinkTransport, StreamTransport};
