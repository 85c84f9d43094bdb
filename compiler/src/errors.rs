use thiserror::Error;

/// Result type alias for compiler operations
pub type Result<T, E = CompileError> = std::result::Result<T, E>;

/// Errors that can occur while producing a publishable artifact.
///
/// Degraded input is not an error. It is counted in the
/// [`CompileReport`](crate::report::CompileReport) instead.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Failed to encode proxy configuration: {0}")]
    Encode(#[from] serde_json::Error),
}
