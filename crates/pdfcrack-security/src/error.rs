use thiserror::Error;

/// Errors raised while loading a document's security parameters.
///
/// Per-candidate verification never fails; these errors surface once, before any attack starts.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("PDF is not encrypted")]
    NotEncrypted,
    #[error("invalid PDF file: {0}")]
    InvalidDocument(String),
    #[error("unsupported PDF encryption: {0}")]
    UnsupportedScheme(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
