use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used across the model crate.
pub type Result<T> = std::result::Result<T, MlErr>;

/// Errors produced by a model while fitting or predicting.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    /// A shape invariant was violated (e.g. mismatched lengths).
    ShapeMismatch {
        /// Human-readable context for the mismatch (e.g. "labels", "features").
        what: &'static str,
        /// Observed value.
        got: usize,
        /// Expected value.
        expected: usize,
    },
    /// The model was asked to predict before being fitted.
    NotFitted,
    /// The system of equations behind the fit has no unique solution.
    Singular,
    /// The model doesn't implement the requested operation.
    CapabilityAbsent(&'static str),
    /// A fit was requested with zero rows.
    EmptyBatch,
    /// Training data or fitted parameters hold an infinite or NaN value.
    NonFinite(&'static str),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch for {what}: got {got}, expected {expected}"),
            MlErr::NotFitted => f.write_str("the model has not been fitted yet"),
            MlErr::Singular => f.write_str("the training data doesn't determine a unique fit"),
            MlErr::CapabilityAbsent(op) => write!(f, "the model doesn't support {op}"),
            MlErr::EmptyBatch => f.write_str("cannot fit a model on an empty batch"),
            MlErr::NonFinite(what) => write!(f, "{what} must be finite numbers"),
        }
    }
}

impl Error for MlErr {}
