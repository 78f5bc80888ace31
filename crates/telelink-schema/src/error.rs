/// Errors that can occur while describing, registering or coding messages.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A different descriptor is already registered under this message id.
    #[error("schema conflict: message id {id} already registered as {existing}")]
    SchemaConflict { id: u8, existing: String },

    /// The descriptor is internally inconsistent.
    #[error("invalid message descriptor: {0}")]
    InvalidDescriptor(String),

    /// The fields of a message add up to more than a frame can carry.
    #[error("payload of {name} too long ({len} bytes, max 255)")]
    PayloadTooLong { name: String, len: usize },

    /// A byte range is shorter than the field it should hold.
    #[error("truncated field {field}: need {needed} bytes, have {available}")]
    TruncatedField {
        field: String,
        needed: usize,
        available: usize,
    },

    /// The number of supplied values differs from the descriptor.
    #[error("{message}: expected {expected} field values, got {actual}")]
    FieldCountMismatch {
        message: String,
        expected: usize,
        actual: usize,
    },

    /// A supplied value does not have the declared field type.
    #[error("{message}.{field}: expected {expected}")]
    FieldTypeMismatch {
        message: String,
        field: String,
        expected: String,
    },

    /// The message has no field with this name.
    #[error("{message} has no field {field}")]
    UnknownField { message: String, field: String },

    /// Text could not be parsed as the field's type.
    #[error("{message}.{field}: cannot parse {value:?} as {expected}")]
    InvalidValue {
        message: String,
        field: String,
        value: String,
        expected: String,
    },

    /// A catalog file could not be loaded.
    #[error("failed to load message catalog: {0}")]
    LoadFailed(String),

    /// A catalog document is not valid JSON.
    #[error("catalog is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
