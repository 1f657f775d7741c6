//! Error types for string calculator implementations

use thiserror::Error;

/// Result type alias using the calculator error
pub type Result<T> = std::result::Result<T, CalculatorError>;

/// Classified calculator failures.
///
/// The `Display` text is what the `/add` endpoint reports in the `error`
/// field of its response payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalculatorError {
    #[error("TemporaryStringCalculator received: \"{0}\"")]
    Temporary(String),

    #[error("invalid number: \"{0}\"")]
    InvalidNumber(String),

    #[error("expected at most 2 numbers, got {0}")]
    TooManyNumbers(usize),

    #[error("sum overflows: \"{0}\"")]
    Overflow(String),
}
