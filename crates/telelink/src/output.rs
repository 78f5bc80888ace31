use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use telelink_frame::{pack_into_wire_bytes, DecodedMessage, Frame};
use telelink_schema::MessageDescriptor;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Field values keyed by name, in wire order.
struct Fields<'a>(&'a DecodedMessage);

impl Serialize for Fields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.values.len()))?;
        for (name, value) in self.0.fields() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    message: &'a str,
    message_id: u8,
    sequence: u8,
    system_id: u8,
    component_id: u8,
    fields: Fields<'a>,
    timestamp: String,
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    message: &'a str,
    message_id: u8,
    sequence: u8,
    system_id: u8,
    component_id: u8,
    checksum: String,
    wire: String,
}

#[derive(Serialize)]
struct FieldLayout<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    ty: String,
    offset: usize,
}

#[derive(Serialize)]
struct DescriptorOutput<'a> {
    id: u8,
    name: &'a str,
    payload_length: u8,
    crc_extra: u8,
    fields: Vec<FieldLayout<'a>>,
}

pub fn print_message(message: &DecodedMessage, format: OutputFormat) {
    let frame = &message.frame;
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                message: message.name(),
                message_id: frame.message_id(),
                sequence: frame.sequence(),
                system_id: frame.system_id(),
                component_id: frame.component_id(),
                fields: Fields(message),
                timestamp: now_unix_seconds(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SEQ", "SYS", "COMP", "MESSAGE", "FIELDS"])
                .add_row(vec![
                    frame.sequence().to_string(),
                    frame.system_id().to_string(),
                    frame.component_id().to_string(),
                    message.name().to_string(),
                    field_summary(message, "\n"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} #{} from {}/{}: {}",
                message.name(),
                frame.sequence(),
                frame.system_id(),
                frame.component_id(),
                field_summary(message, " ")
            );
        }
        OutputFormat::Raw => {
            print_raw(&pack_into_wire_bytes(frame));
        }
    }
}

pub fn print_frame(frame: &Frame, descriptor: &MessageDescriptor, format: OutputFormat) {
    let wire = pack_into_wire_bytes(frame);
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                message: descriptor.name(),
                message_id: frame.message_id(),
                sequence: frame.sequence(),
                system_id: frame.system_id(),
                component_id: frame.component_id(),
                checksum: format!("{:#06x}", frame.checksum()),
                wire: to_hex(&wire),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["MESSAGE", "SEQ", "BYTES", "WIRE"])
                .add_row(vec![
                    descriptor.name().to_string(),
                    frame.sequence().to_string(),
                    wire.len().to_string(),
                    to_hex(&wire),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{} #{}: {}", descriptor.name(), frame.sequence(), to_hex(&wire));
        }
        OutputFormat::Raw => print_raw(&wire),
    }
}

pub fn print_catalog(descriptors: &[&MessageDescriptor], format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            let out: Vec<DescriptorOutput<'_>> = descriptors
                .iter()
                .map(|descriptor| DescriptorOutput {
                    id: descriptor.id(),
                    name: descriptor.name(),
                    payload_length: descriptor.payload_length(),
                    crc_extra: descriptor.crc_extra(),
                    fields: descriptor
                        .fields()
                        .iter()
                        .map(|field| FieldLayout {
                            name: &field.name,
                            ty: field.ty.to_string(),
                            offset: field.offset,
                        })
                        .collect(),
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ID", "NAME", "LEN", "CRC_EXTRA", "FIELDS"]);
            for descriptor in descriptors {
                table.add_row(vec![
                    descriptor.id().to_string(),
                    descriptor.name().to_string(),
                    descriptor.payload_length().to_string(),
                    descriptor.crc_extra().to_string(),
                    layout_summary(descriptor),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for descriptor in descriptors {
                println!(
                    "{:>3} {} len={} crc_extra={} [{}]",
                    descriptor.id(),
                    descriptor.name(),
                    descriptor.payload_length(),
                    descriptor.crc_extra(),
                    layout_summary(descriptor)
                );
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Space-separated uppercase hex, as link analyzers print captures.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn field_summary(message: &DecodedMessage, separator: &str) -> String {
    message
        .fields()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(separator)
}

fn layout_summary(descriptor: &MessageDescriptor) -> String {
    descriptor
        .fields()
        .iter()
        .map(|field| format!("{} {}", field.ty, field.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use telelink_frame::{decode_message, pack};
    use telelink_schema::catalog::HEARTBEAT;
    use telelink_schema::{FieldValue, MessageRegistry};

    use super::*;

    #[test]
    fn hex_is_spaced_uppercase() {
        assert_eq!(to_hex(&[0xFE, 0x01, 0x8b]), "FE 01 8B");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn fields_serialize_in_wire_order() {
        let registry = MessageRegistry::builtin().unwrap();
        let values = [
            FieldValue::U32(9),
            FieldValue::U8(2),
            FieldValue::U8(3),
            FieldValue::U8(81),
            FieldValue::U8(4),
            FieldValue::U8(3),
        ];
        let frame = pack(&registry, 1, 1, HEARTBEAT, &values, 0).unwrap();
        let message = decode_message(&registry, &frame).unwrap();

        let json = serde_json::to_string(&Fields(&message)).unwrap();
        assert_eq!(
            json,
            r#"{"custom_mode":9,"type":2,"autopilot":3,"base_mode":81,"system_status":4,"mavlink_version":3}"#
        );
        assert!(field_summary(&message, " ").starts_with("custom_mode=9 type=2"));
    }
}
