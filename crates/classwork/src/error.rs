use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassworkError {
    /// A type tag handed to a constructor names neither the type nor one of
    /// its registered direct subtypes.
    #[error("received object encoded as {tag} but {expected} (or a direct subtype) is required")]
    UnknownType { tag: String, expected: String },

    /// A type tag could not be resolved while decoding.
    #[error("unknown class {tag} (searched {base} and its direct subtypes)")]
    UnknownClass { tag: String, base: String },

    /// A nested envelope's tag names no registered type.
    #[error("nested envelope names {tag}, which is not a registered type")]
    UnknownNestedClass { tag: String },

    #[error("{type_tag} has no attribute {name}")]
    AttributeNotFound { type_tag: String, name: String },

    #[error("keys {names:?} are not indexes of {type_tag}")]
    UnknownIndex { type_tag: String, names: Vec<String> },

    #[error("type mismatch: expected {expected} but received {found:?}")]
    TypeMismatch { expected: String, found: Vec<String> },

    #[error("operator {0} is not available")]
    UnsupportedOperator(String),

    #[error("{0} requires one of a path or an inline json string")]
    MissingInput(String),

    #[error("cannot apply {op} to {lhs} and {rhs} for key {key}")]
    InvalidOperand {
        key: String,
        op: String,
        lhs: &'static str,
        rhs: &'static str,
    },

    #[error("invalid record type {identity}: {reason}")]
    InvalidSchema { identity: String, reason: String },

    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("value cannot be encoded: {0}")]
    InvalidValue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] confique::Error),
}

pub type Result<T> = std::result::Result<T, ClassworkError>;
