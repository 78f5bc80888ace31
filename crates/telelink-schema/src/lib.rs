//! Message schemas for telemetry links.
//!
//! A message type is described once by a [`MessageDescriptor`]: its id, its
//! ordered field layout and the `crc_extra` seed derived from that layout.
//! The [`field`] codec turns typed values into the canonical little-endian,
//! unpadded payload bytes and back, and the [`MessageRegistry`] maps message
//! ids to descriptors for both the sending and the receiving side.

pub mod catalog;
pub mod config;
pub mod crc;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod registry;

pub use config::RegistryConfig;
pub use crc::{crc16_x25, Crc16};
pub use descriptor::{
    compute_crc_extra, FieldDefinition, FieldDescriptor, MessageDefinition, MessageDescriptor,
    MAX_PAYLOAD_LEN,
};
pub use error::{Result, SchemaError};
pub use field::{decode_field, encode_field, CharArray, FieldType, FieldValue, ScalarType};
pub use registry::MessageRegistry;
