//! Field codec: typed values to and from the canonical wire layout.
//!
//! Every multi-byte scalar is little-endian on the wire whatever the host byte
//! order, and fields are packed back to back with no padding. Byte order is
//! handled here and nowhere else.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut};
use serde::{Serialize, Serializer};

use crate::descriptor::FieldDescriptor;
use crate::error::{Result, SchemaError};

/// Primitive element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Char,
}

impl ScalarType {
    /// Encoded width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::U8 | Self::I8 | Self::Char => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::U64 | Self::I64 | Self::F64 => 8,
        }
    }

    /// C spelling used by message definitions and by the crc_extra seed.
    pub const fn c_name(self) -> &'static str {
        match self {
            Self::U8 => "uint8_t",
            Self::I8 => "int8_t",
            Self::U16 => "uint16_t",
            Self::I16 => "int16_t",
            Self::U32 => "uint32_t",
            Self::I32 => "int32_t",
            Self::U64 => "uint64_t",
            Self::I64 => "int64_t",
            Self::F32 => "float",
            Self::F64 => "double",
            Self::Char => "char",
        }
    }

    fn from_c_name(name: &str) -> Option<Self> {
        let ty = match name {
            "uint8_t" => Self::U8,
            "int8_t" => Self::I8,
            "uint16_t" => Self::U16,
            "int16_t" => Self::I16,
            "uint32_t" => Self::U32,
            "int32_t" => Self::I32,
            "uint64_t" => Self::U64,
            "int64_t" => Self::I64,
            "float" => Self::F32,
            "double" => Self::F64,
            "char" => Self::Char,
            // Generator alias for the protocol version byte of HEARTBEAT.
            "uint8_t_mavlink_version" => Self::U8,
            _ => return None,
        };
        Some(ty)
    }
}

/// The declared type of a field: a scalar or a fixed-length array of scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Scalar(ScalarType),
    Array(ScalarType, u8),
}

impl FieldType {
    /// Element type.
    pub const fn scalar(self) -> ScalarType {
        match self {
            Self::Scalar(ty) | Self::Array(ty, _) => ty,
        }
    }

    /// Array length, 0 for scalars.
    pub const fn array_length(self) -> u8 {
        match self {
            Self::Scalar(_) => 0,
            Self::Array(_, len) => len,
        }
    }

    /// Encoded width in bytes.
    pub const fn width(self) -> usize {
        match self {
            Self::Scalar(ty) => ty.width(),
            Self::Array(ty, len) => ty.width() * len as usize,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(ty) => f.write_str(ty.c_name()),
            Self::Array(ty, len) => write!(f, "{}[{len}]", ty.c_name()),
        }
    }
}

impl FromStr for FieldType {
    type Err = SchemaError;

    /// Parses `uint16_t`, `float`, `char[50]`, `uint8_t[4]`, ...
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || SchemaError::InvalidDescriptor(format!("unknown field type: {s}"));

        match s.split_once('[') {
            None => ScalarType::from_c_name(s)
                .map(Self::Scalar)
                .ok_or_else(invalid),
            Some((base, rest)) => {
                let scalar = ScalarType::from_c_name(base.trim()).ok_or_else(invalid)?;
                let len = rest
                    .strip_suffix(']')
                    .and_then(|n| n.trim().parse::<u8>().ok())
                    .filter(|n| *n > 0)
                    .ok_or_else(invalid)?;
                Ok(Self::Array(scalar, len))
            }
        }
    }
}

/// Contents of a `char[N]` field.
///
/// Holds the raw bytes with the trailing NUL padding removed. Interior NULs
/// and non-UTF-8 bytes are kept, so decoding and re-encoding reproduces the
/// wire bytes exactly. Text is only produced for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CharArray(Vec<u8>);

impl CharArray {
    /// Wrap raw bytes; trailing NULs are padding and are dropped.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        let mut bytes = bytes.into();
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        bytes.truncate(end);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The contents as `str`, if they are valid UTF-8.
    pub fn to_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for CharArray {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<String> for CharArray {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<&[u8]> for CharArray {
    fn from(value: &[u8]) -> Self {
        Self::new(value)
    }
}

impl From<Vec<u8>> for CharArray {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl Serialize for CharArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_lossy())
    }
}

impl fmt::Display for CharArray {
    /// Quoted, with non-printable bytes escaped (`"\xb0C"`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0.escape_ascii())
    }
}

/// A decoded (or to-be-encoded) field value.
///
/// `uint8_t` arrays are carried as [`FieldValue::Bytes`], `char` arrays as
/// [`FieldValue::Text`] (NUL padded on the wire), any other array as
/// [`FieldValue::Array`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Char(u8),
    Bytes(Vec<u8>),
    Text(CharArray),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Short name of the value's kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::U8(_) => "uint8_t",
            Self::I8(_) => "int8_t",
            Self::U16(_) => "uint16_t",
            Self::I16(_) => "int16_t",
            Self::U32(_) => "uint32_t",
            Self::I32(_) => "int32_t",
            Self::U64(_) => "uint64_t",
            Self::I64(_) => "int64_t",
            Self::F32(_) => "float",
            Self::F64(_) => "double",
            Self::Char(_) => "char",
            Self::Bytes(_) => "uint8_t[]",
            Self::Text(_) => "char[]",
            Self::Array(_) => "array",
        }
    }

    /// The all-zero value of a field type (empty text for `char` arrays).
    pub fn zero(ty: FieldType) -> Self {
        match ty {
            FieldType::Scalar(scalar) => zero_scalar(scalar),
            FieldType::Array(ScalarType::Char, _) => Self::Text(CharArray::default()),
            FieldType::Array(ScalarType::U8, len) => Self::Bytes(vec![0; len as usize]),
            FieldType::Array(scalar, len) => {
                Self::Array((0..len).map(|_| zero_scalar(scalar)).collect())
            }
        }
    }

    /// Integer view of any integral scalar.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Self::U8(v) | Self::Char(v) => Some(v.into()),
            Self::I8(v) => Some(v.into()),
            Self::U16(v) => Some(v.into()),
            Self::I16(v) => Some(v.into()),
            Self::U32(v) => Some(v.into()),
            Self::I32(v) => Some(v.into()),
            Self::U64(v) => Some(v.into()),
            Self::I64(v) => Some(v.into()),
            _ => None,
        }
    }

    /// Floating view of any numeric scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v.into()),
            Self::F64(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    /// Text of a `char` array, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => text.to_str(),
            _ => None,
        }
    }

    /// Parse a textual value (command line, config) into the declared type.
    ///
    /// Numeric arrays are comma separated; `char` arrays take the text as is;
    /// `uint8_t` arrays accept comma separated numbers.
    pub fn parse(input: &str, ty: FieldType) -> Option<Self> {
        match ty {
            FieldType::Scalar(scalar) => parse_scalar(input.trim(), scalar),
            FieldType::Array(ScalarType::Char, len) => {
                (input.len() <= len as usize).then(|| Self::Text(input.into()))
            }
            FieldType::Array(ScalarType::U8, len) => {
                let bytes = input
                    .split(',')
                    .map(|part| part.trim().parse::<u8>().ok())
                    .collect::<Option<Vec<_>>>()?;
                (bytes.len() == len as usize).then_some(Self::Bytes(bytes))
            }
            FieldType::Array(scalar, len) => {
                let items = input
                    .split(',')
                    .map(|part| parse_scalar(part.trim(), scalar))
                    .collect::<Option<Vec<_>>>()?;
                (items.len() == len as usize).then_some(Self::Array(items))
            }
        }
    }
}

fn zero_scalar(ty: ScalarType) -> FieldValue {
    match ty {
        ScalarType::U8 => FieldValue::U8(0),
        ScalarType::I8 => FieldValue::I8(0),
        ScalarType::U16 => FieldValue::U16(0),
        ScalarType::I16 => FieldValue::I16(0),
        ScalarType::U32 => FieldValue::U32(0),
        ScalarType::I32 => FieldValue::I32(0),
        ScalarType::U64 => FieldValue::U64(0),
        ScalarType::I64 => FieldValue::I64(0),
        ScalarType::F32 => FieldValue::F32(0.0),
        ScalarType::F64 => FieldValue::F64(0.0),
        ScalarType::Char => FieldValue::Char(0),
    }
}

fn parse_scalar(input: &str, ty: ScalarType) -> Option<FieldValue> {
    let value = match ty {
        ScalarType::U8 => FieldValue::U8(input.parse().ok()?),
        ScalarType::I8 => FieldValue::I8(input.parse().ok()?),
        ScalarType::U16 => FieldValue::U16(input.parse().ok()?),
        ScalarType::I16 => FieldValue::I16(input.parse().ok()?),
        ScalarType::U32 => FieldValue::U32(input.parse().ok()?),
        ScalarType::I32 => FieldValue::I32(input.parse().ok()?),
        ScalarType::U64 => FieldValue::U64(input.parse().ok()?),
        ScalarType::I64 => FieldValue::I64(input.parse().ok()?),
        ScalarType::F32 => FieldValue::F32(input.parse().ok()?),
        ScalarType::F64 => FieldValue::F64(input.parse().ok()?),
        ScalarType::Char => match input.as_bytes() {
            [c] => FieldValue::Char(*c),
            _ => FieldValue::Char(input.parse().ok()?),
        },
    };
    Some(value)
}

macro_rules! impl_from_scalar {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for FieldValue {
                fn from(value: $t) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

impl_from_scalar! {
    u8 => U8,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    u64 => U64,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<CharArray> for FieldValue {
    fn from(value: CharArray) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
            Self::Char(c) => write!(f, "{}", char::from(*c)),
            Self::Text(text) => write!(f, "{text}"),
            Self::Bytes(bytes) => write!(f, "{bytes:?}"),
            Self::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Serialize one field value into `dst` using the field's declared type.
///
/// Writes exactly `field.ty.width()` bytes on success and nothing on error.
pub fn encode_field(value: &FieldValue, field: &FieldDescriptor, dst: &mut impl BufMut) -> Result<()> {
    let mismatch = || SchemaError::FieldTypeMismatch {
        message: String::new(),
        field: field.name.clone(),
        expected: format!("{} (got {})", field.ty, value.kind()),
    };

    match (field.ty, value) {
        (FieldType::Scalar(scalar), value) => {
            if !scalar_matches(scalar, value) {
                return Err(mismatch());
            }
            put_scalar(value, dst);
        }
        (FieldType::Array(ScalarType::Char, len), FieldValue::Text(text)) => {
            let len = len as usize;
            if text.len() > len {
                return Err(mismatch());
            }
            dst.put_slice(text.as_bytes());
            dst.put_bytes(0, len - text.len());
        }
        (FieldType::Array(ScalarType::U8, len), FieldValue::Bytes(bytes)) => {
            if bytes.len() != len as usize {
                return Err(mismatch());
            }
            dst.put_slice(bytes);
        }
        (FieldType::Array(scalar, len), FieldValue::Array(items)) => {
            if items.len() != len as usize || !items.iter().all(|v| scalar_matches(scalar, v)) {
                return Err(mismatch());
            }
            for item in items {
                put_scalar(item, dst);
            }
        }
        _ => return Err(mismatch()),
    }

    Ok(())
}

/// Deserialize one field value from the start of `src`.
///
/// Fails with [`SchemaError::TruncatedField`] when `src` is shorter than the
/// field's width.
pub fn decode_field(src: &[u8], field: &FieldDescriptor) -> Result<FieldValue> {
    let width = field.ty.width();
    if src.len() < width {
        return Err(SchemaError::TruncatedField {
            field: field.name.clone(),
            needed: width,
            available: src.len(),
        });
    }

    let mut buf = &src[..width];
    let value = match field.ty {
        FieldType::Scalar(scalar) => get_scalar(scalar, &mut buf),
        FieldType::Array(ScalarType::Char, _) => FieldValue::Text(CharArray::new(buf)),
        FieldType::Array(ScalarType::U8, _) => FieldValue::Bytes(buf.to_vec()),
        FieldType::Array(scalar, len) => {
            FieldValue::Array((0..len).map(|_| get_scalar(scalar, &mut buf)).collect())
        }
    };

    Ok(value)
}

fn scalar_matches(ty: ScalarType, value: &FieldValue) -> bool {
    matches!(
        (ty, value),
        (ScalarType::U8, FieldValue::U8(_))
            | (ScalarType::I8, FieldValue::I8(_))
            | (ScalarType::U16, FieldValue::U16(_))
            | (ScalarType::I16, FieldValue::I16(_))
            | (ScalarType::U32, FieldValue::U32(_))
            | (ScalarType::I32, FieldValue::I32(_))
            | (ScalarType::U64, FieldValue::U64(_))
            | (ScalarType::I64, FieldValue::I64(_))
            | (ScalarType::F32, FieldValue::F32(_))
            | (ScalarType::F64, FieldValue::F64(_))
            | (ScalarType::Char, FieldValue::Char(_))
    )
}

fn put_scalar(value: &FieldValue, dst: &mut impl BufMut) {
    match *value {
        FieldValue::U8(v) | FieldValue::Char(v) => dst.put_u8(v),
        FieldValue::I8(v) => dst.put_i8(v),
        FieldValue::U16(v) => dst.put_u16_le(v),
        FieldValue::I16(v) => dst.put_i16_le(v),
        FieldValue::U32(v) => dst.put_u32_le(v),
        FieldValue::I32(v) => dst.put_i32_le(v),
        FieldValue::U64(v) => dst.put_u64_le(v),
        FieldValue::I64(v) => dst.put_i64_le(v),
        FieldValue::F32(v) => dst.put_f32_le(v),
        FieldValue::F64(v) => dst.put_f64_le(v),
        FieldValue::Bytes(_) | FieldValue::Text(_) | FieldValue::Array(_) => {}
    }
}

// Callers guarantee `src` holds at least `ty.width()` bytes.
fn get_scalar(ty: ScalarType, src: &mut &[u8]) -> FieldValue {
    match ty {
        ScalarType::U8 => FieldValue::U8(src.get_u8()),
        ScalarType::I8 => FieldValue::I8(src.get_i8()),
        ScalarType::U16 => FieldValue::U16(src.get_u16_le()),
        ScalarType::I16 => FieldValue::I16(src.get_i16_le()),
        ScalarType::U32 => FieldValue::U32(src.get_u32_le()),
        ScalarType::I32 => FieldValue::I32(src.get_i32_le()),
        ScalarType::U64 => FieldValue::U64(src.get_u64_le()),
        ScalarType::I64 => FieldValue::I64(src.get_i64_le()),
        ScalarType::F32 => FieldValue::F32(src.get_f32_le()),
        ScalarType::F64 => FieldValue::F64(src.get_f64_le()),
        ScalarType::Char => FieldValue::Char(src.get_u8()),
    }
}
