//! Built-in message catalog.
//!
//! Wire-order layouts of a handful of common telemetry messages, as a
//! generator would emit them from the message-set definition. Applications
//! with their own message set load it through [`crate::MessageRegistry`].

use crate::descriptor::MessageDescriptor;
use crate::error::Result;
use crate::field::FieldType::{Array, Scalar};
use crate::field::ScalarType::{Char, F32, U16, U32, U8};

pub const HEARTBEAT: u8 = 0;
pub const PARAM_VALUE: u8 = 22;
pub const ATTITUDE: u8 = 30;
pub const REQUEST_DATA_STREAM: u8 = 66;
pub const PI_TRIGGER: u8 = 185;
pub const STATUSTEXT: u8 = 253;

/// Every built-in descriptor, ascending by id.
pub fn builtin() -> Result<Vec<MessageDescriptor>> {
    Ok(vec![
        MessageDescriptor::new(
            HEARTBEAT,
            "HEARTBEAT",
            [
                ("custom_mode", Scalar(U32)),
                ("type", Scalar(U8)),
                ("autopilot", Scalar(U8)),
                ("base_mode", Scalar(U8)),
                ("system_status", Scalar(U8)),
                ("mavlink_version", Scalar(U8)),
            ],
        )?,
        MessageDescriptor::new(
            PARAM_VALUE,
            "PARAM_VALUE",
            [
                ("param_value", Scalar(F32)),
                ("param_count", Scalar(U16)),
                ("param_index", Scalar(U16)),
                ("param_id", Array(Char, 16)),
                ("param_type", Scalar(U8)),
            ],
        )?,
        MessageDescriptor::new(
            ATTITUDE,
            "ATTITUDE",
            [
                ("time_boot_ms", Scalar(U32)),
                ("roll", Scalar(F32)),
                ("pitch", Scalar(F32)),
                ("yaw", Scalar(F32)),
                ("rollspeed", Scalar(F32)),
                ("pitchspeed", Scalar(F32)),
                ("yawspeed", Scalar(F32)),
            ],
        )?,
        MessageDescriptor::new(
            REQUEST_DATA_STREAM,
            "REQUEST_DATA_STREAM",
            [
                ("req_message_rate", Scalar(U16)),
                ("target_system", Scalar(U8)),
                ("target_component", Scalar(U8)),
                ("req_stream_id", Scalar(U8)),
                ("start_stop", Scalar(U8)),
            ],
        )?,
        MessageDescriptor::new(PI_TRIGGER, "PI_TRIGGER", [("data", Scalar(U8))])?,
        MessageDescriptor::new(
            STATUSTEXT,
            "STATUSTEXT",
            [("severity", Scalar(U8)), ("text", Array(Char, 50))],
        )?,
    ])
}
