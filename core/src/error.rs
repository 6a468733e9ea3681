use thiserror::Error;

/// Reasons a boolean expression cannot be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("query is empty")]
    Empty,
    #[error("unbalanced parenthesis")]
    UnbalancedParenthesis,
    #[error("operator {0} is missing an operand")]
    MissingOperand(&'static str),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("index not ready: build or load an index before searching")]
    NotReady,

    #[error("malformed query: {0}")]
    Parse(#[from] QueryError),

    #[error("invalid page {number}: corpus has {total} pages")]
    InvalidPage { number: u32, total: u32 },

    #[error("invalid page size {requested}: must be between 1 and {max}")]
    InvalidPageSize { requested: usize, max: usize },

    #[error("index io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("index encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt index blob: {0}")]
    Corrupt(&'static str),

    #[error("incompatible index format version {found} (expected {expected})")]
    IncompatibleFormat { found: u32, expected: u32 },
}

impl Error {
    /// True for failures of the persistence layer, where a rebuild is the usual remedy.
    pub fn is_persist(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Encoding(_)
                | Error::Json(_)
                | Error::Corrupt(_)
                | Error::IncompatibleFormat { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
