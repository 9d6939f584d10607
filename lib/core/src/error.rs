use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Dataset is empty after cleaning")]
    EmptyDataset,

    #[error("Empty vocabulary: every description consists only of stop words or single characters")]
    EmptyVocabulary,

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Row {index} out of range for {len} rows")]
    RowOutOfRange { index: usize, len: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Load error: {0}")]
    Load(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
