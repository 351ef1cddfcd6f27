use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsertionOrderError {
    #[error("Input document violates the ingest schema: {0}")]
    SchemaViolation(String),

    #[error("No parse attempts supplied: the pipeline needs at least one ParsedDocument")]
    EmptyParseSet,

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InsertionOrderError>;
