use std::fmt;

/// Errors produced by the regression core when inputs are invalid.
#[derive(Debug, PartialEq)]
pub enum MlError {
    /// An input is invalid for semantic or domain reasons.
    InvalidInput(&'static str),

    /// A shape invariant was violated (e.g. mismatched lengths).
    ShapeMismatch {
        /// Human-readable context for the mismatch (e.g. "targets", "row").
        what: &'static str,
        /// Observed value.
        got: usize,
        /// Expected value.
        expected: usize,
    },

    /// An operation that needs at least one sample received none.
    EmptyDataset,

    /// A fitted model's structure is inconsistent, typically after being
    /// decoded from a damaged file.
    MalformedModel(&'static str),
}

impl fmt::Display for MlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            MlError::ShapeMismatch {
                what,
                got,
                expected,
            } => {
                write!(f, "shape mismatch for {what}: got {got}, expected {expected}")
            }
            MlError::EmptyDataset => write!(f, "the dataset has no samples"),
            MlError::MalformedModel(msg) => write!(f, "malformed model: {msg}"),
        }
    }
}

impl std::error::Error for MlError {}

/// The result type used across the regression core.
pub type Result<T> = std::result::Result<T, MlError>;
