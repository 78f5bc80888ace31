use std::collections::HashSet;

use bytes::BufMut;
use serde::{Deserialize, Serialize};

use crate::crc::Crc16;
use crate::error::{Result, SchemaError};
use crate::field::{decode_field, encode_field, FieldType, FieldValue};

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// One field of a message layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    /// Field name, unique within its message.
    pub name: String,
    /// Declared type (scalar or fixed-length array).
    pub ty: FieldType,
    /// Byte offset of the field inside the payload.
    pub offset: usize,
}

impl FieldDescriptor {
    /// Create a field descriptor.
    pub fn new(name: impl Into<String>, ty: FieldType, offset: usize) -> Self {
        Self {
            name: name.into(),
            ty,
            offset,
        }
    }

    /// Encoded width in bytes.
    pub fn width(&self) -> usize {
        self.ty.width()
    }

    /// Array length, 0 for scalars.
    pub fn array_length(&self) -> u8 {
        self.ty.array_length()
    }
}

/// Immutable schema of one message type.
///
/// The payload layout is the field list concatenated in declaration order
/// with no padding, so the field widths always sum to `payload_length`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    id: u8,
    name: String,
    payload_length: u8,
    crc_extra: u8,
    fields: Vec<FieldDescriptor>,
}

impl MessageDescriptor {
    /// Build a descriptor from an ordered field list.
    ///
    /// Offsets, payload length and `crc_extra` are derived from the fields.
    pub fn new<N, I>(id: u8, name: impl Into<String>, fields: I) -> Result<Self>
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, FieldType)>,
    {
        let name = name.into();
        let mut offset = 0usize;
        let fields: Vec<FieldDescriptor> = fields
            .into_iter()
            .map(|(field_name, ty)| {
                let field = FieldDescriptor::new(field_name, ty, offset);
                offset += ty.width();
                field
            })
            .collect();

        let crc_extra = compute_crc_extra(&name, &fields);
        Self::from_parts(id, name, crc_extra, fields)
    }

    /// Assemble a descriptor from precomputed parts (as emitted by a code
    /// generator), checking the layout invariants.
    pub fn from_parts(
        id: u8,
        name: impl Into<String>,
        crc_extra: u8,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(SchemaError::InvalidDescriptor(format!(
                "message {id} has an empty name"
            )));
        }

        let mut seen = HashSet::new();
        let mut expected_offset = 0usize;
        for field in &fields {
            if field.name.trim().is_empty() {
                return Err(SchemaError::InvalidDescriptor(format!(
                    "{name}: field with empty name"
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::InvalidDescriptor(format!(
                    "{name}: duplicate field {}",
                    field.name
                )));
            }
            if field.offset != expected_offset {
                return Err(SchemaError::InvalidDescriptor(format!(
                    "{name}.{}: offset {} but previous fields end at {expected_offset}",
                    field.name, field.offset
                )));
            }
            expected_offset += field.width();
        }

        let payload_length = u8::try_from(expected_offset).map_err(|_| {
            SchemaError::PayloadTooLong {
                name: name.clone(),
                len: expected_offset,
            }
        })?;

        Ok(Self {
            id,
            name,
            payload_length,
            crc_extra,
            fields,
        })
    }

    /// Build a descriptor from a catalog definition.
    ///
    /// When the definition pins a `crc_extra`, it must match the value derived
    /// from the field layout.
    pub fn from_definition(def: &MessageDefinition) -> Result<Self> {
        let fields = def
            .fields
            .iter()
            .map(|f| -> Result<(String, FieldType)> { Ok((f.name.clone(), f.ty.parse()?)) })
            .collect::<Result<Vec<_>>>()?;
        let descriptor = Self::new(def.id, def.name.clone(), fields)?;

        if let Some(expected) = def.crc_extra {
            if expected != descriptor.crc_extra {
                return Err(SchemaError::InvalidDescriptor(format!(
                    "{}: declared crc_extra {expected} but layout yields {}",
                    def.name, descriptor.crc_extra
                )));
            }
        }

        Ok(descriptor)
    }

    /// Catalog definition equivalent to this descriptor.
    pub fn to_definition(&self) -> MessageDefinition {
        MessageDefinition {
            id: self.id,
            name: self.name.clone(),
            crc_extra: Some(self.crc_extra),
            fields: self
                .fields
                .iter()
                .map(|f| FieldDefinition {
                    name: f.name.clone(),
                    ty: f.ty.to_string(),
                })
                .collect(),
        }
    }

    /// Message identifier.
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Message name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload length in bytes.
    pub fn payload_length(&self) -> u8 {
        self.payload_length
    }

    /// Checksum seed derived from the schema.
    pub fn crc_extra(&self) -> u8 {
        self.crc_extra
    }

    /// Fields in wire order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Position of a field in the value list.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Serialize `values` (one per field, in declaration order) into `dst`.
    ///
    /// Writes exactly `payload_length` bytes on success.
    pub fn encode_payload(&self, values: &[FieldValue], dst: &mut impl BufMut) -> Result<()> {
        if values.len() != self.fields.len() {
            return Err(SchemaError::FieldCountMismatch {
                message: self.name.clone(),
                expected: self.fields.len(),
                actual: values.len(),
            });
        }

        // Check every value before writing so a failure leaves `dst` untouched.
        let mut scratch = Vec::with_capacity(self.payload_length as usize);
        for (field, value) in self.fields.iter().zip(values) {
            encode_field(value, field, &mut scratch).map_err(|err| self.in_message(err))?;
        }
        dst.put_slice(&scratch);
        Ok(())
    }

    /// Deserialize a payload into one value per field.
    pub fn decode_payload(&self, payload: &[u8]) -> Result<Vec<FieldValue>> {
        self.fields
            .iter()
            .map(|field| {
                let src = payload.get(field.offset..).unwrap_or(&[]);
                decode_field(src, field).map_err(|err| self.in_message(err))
            })
            .collect()
    }

    /// Build a value list from `name=value` text pairs.
    ///
    /// Fields that are not named are zero-filled.
    pub fn parse_values<'a, I>(&self, pairs: I) -> Result<Vec<FieldValue>>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut values: Vec<FieldValue> = self
            .fields
            .iter()
            .map(|field| FieldValue::zero(field.ty))
            .collect();

        for (name, text) in pairs {
            let idx = self
                .field_index(name)
                .ok_or_else(|| SchemaError::UnknownField {
                    message: self.name.clone(),
                    field: name.to_string(),
                })?;
            let ty = self.fields[idx].ty;
            values[idx] = FieldValue::parse(text, ty).ok_or_else(|| SchemaError::InvalidValue {
                message: self.name.clone(),
                field: name.to_string(),
                value: text.to_string(),
                expected: ty.to_string(),
            })?;
        }

        Ok(values)
    }

    fn in_message(&self, err: SchemaError) -> SchemaError {
        match err {
            SchemaError::FieldTypeMismatch {
                field, expected, ..
            } => SchemaError::FieldTypeMismatch {
                message: self.name.clone(),
                field,
                expected,
            },
            SchemaError::TruncatedField {
                field,
                needed,
                available,
            } => SchemaError::TruncatedField {
                field: format!("{}.{field}", self.name),
                needed,
                available,
            },
            other => other,
        }
    }
}

/// Derive the checksum seed of a message layout.
///
/// CRC-16/X.25 over `"<NAME> "`, then `"<c_type> <field> "` per field in wire
/// order plus one array-length byte for arrays; the seed is the XOR of the two
/// register bytes.
pub fn compute_crc_extra(name: &str, fields: &[FieldDescriptor]) -> u8 {
    let mut crc = Crc16::new();
    crc.accumulate_slice(name.as_bytes());
    crc.accumulate(b' ');

    for field in fields {
        crc.accumulate_slice(field.ty.scalar().c_name().as_bytes());
        crc.accumulate(b' ');
        crc.accumulate_slice(field.name.as_bytes());
        crc.accumulate(b' ');
        if let FieldType::Array(_, len) = field.ty {
            crc.accumulate(len);
        }
    }

    let [low, high] = crc.value().to_le_bytes();
    low ^ high
}

/// Serializable message definition, the unit of a JSON catalog.
///
/// ```json
/// { "id": 185, "name": "PI_TRIGGER", "fields": [ { "name": "data", "type": "uint8_t" } ] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDefinition {
    pub id: u8,
    pub name: String,
    /// Optional pinned seed, verified against the derived value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crc_extra: Option<u8>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// Serializable field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    /// C type spelling, e.g. `uint16_t` or `char[50]`.
    #[serde(rename = "type")]
    pub ty: String,
}
