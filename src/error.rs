//! CA error types.

use thiserror::Error;

/// Result type for CA operations.
pub type Result<T> = std::result::Result<T, Error>;

/// CA error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// Key or certificate generation failed.
    #[error("certificate generation failed: {0}")]
    Generation(String),

    /// Issuance parameters were invalid.
    #[error("invalid issuance request: {0}")]
    Validation(String),

    /// Certificate or issuer not found in the registry.
    #[error("not found: {0}")]
    NotFound(String),

    /// Registry lock error.
    #[error("registry error: {0}")]
    Storage(String),

    /// Certificate chain is broken, cyclic, or otherwise unresolvable.
    #[error("invalid certificate chain: {0}")]
    InvalidChain(String),
}
