use thiserror::Error;

/// Failures raised by an index engine implementation
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown snapshot handle {0}")]
    UnknownSnapshot(u64),

    #[error("{0}")]
    Engine(String),
}

impl From<fst::Error> for IndexError {
    fn from(err: fst::Error) -> Self {
        IndexError::Engine(format!("FST error: {}", err))
    }
}

/// Errors surfaced to callers of the search layer
#[derive(Debug, Error)]
pub enum Error {
    /// A codec decode call received malformed input
    #[error("format error: {0}")]
    Format(String),

    /// A query case or operator that cannot be expressed natively
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),

    /// The index engine failed; the cause is kept as the error source
    #[error("query execution failed: {0}")]
    QueryExecution(#[from] IndexError),

    /// Admission wait was interrupted before a permit was granted
    #[error("search cancelled before admission")]
    Cancelled,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("authorization failed: {0}")]
    Authorization(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
