use thiserror::Error;

/// Custom error types for the Gammet library.
#[derive(Error, Debug)]
pub enum GammetError {
    /// Error thrown when input dimensions (lengths, shapes) do not match expectation.
    #[error("Dimension mismatch: {0}")]
    ShapeMismatch(String),

    /// Error thrown when a configuration index list is malformed
    /// (non-positive entries, not strictly increasing, wrong length).
    #[error("Invalid index list: {0}")]
    InvalidIndexList(String),

    /// Error thrown when observables in a list disagree on state that has to
    /// be shared (replica overlap, reweighting flags, ensemble content).
    #[error("Inconsistent observable state: {0}")]
    StateMismatch(String),

    /// Error thrown when an invalid operation is requested
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Error thrown when a gamma structure tag is not part of the catalogue.
    #[error("Unknown gamma structure: {0}")]
    UnknownGammaTag(String),

    /// Error thrown when an operation needs error estimates but
    /// `gamma_method` has not been run on an input.
    #[error("The gamma method has to be applied to all involved observables first")]
    ErrorsNotEstimated,

    /// Wrapper for errors coming from the ndarray-linalg backend.
    #[error("Linear Algebra backend error: {0}")]
    LinalgError(#[from] ndarray_linalg::error::LinalgError),

    /// Wrapper for I/O errors during persistence.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wrapper for serialization errors during persistence.
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
