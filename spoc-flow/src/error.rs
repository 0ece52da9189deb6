use thiserror::Error;

/// Reasons a raw answer is rejected for a field.
///
/// The `Display` text is shown to the user verbatim, followed by the prompt
/// of the field that still needs an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Input cannot be empty.")]
    EmptyInput,

    #[error("Path does not exist.")]
    PathNotFound,

    #[error("Path exists but is not accessible (permission denied).")]
    PermissionDenied,

    #[error("Expected a {expected} path but found a {found}.")]
    WrongKind {
        expected: &'static str,
        found: &'static str,
    },

    #[error("File does not exist.")]
    FileNotFound,

    #[error("File must be a CSV.")]
    NotCsv,

    #[error("Enter 1 or 0.")]
    InvalidBoolean,

    /// Any other probe failure, already phrased for the user.
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Input not collected: {0}")]
    MissingInput(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, FlowError>;
