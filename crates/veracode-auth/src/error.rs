//! Error types for Veracode request signing.
//!
//! All signing and verification failures are represented by [`AuthError`].

/// Errors that can occur while signing or verifying a Veracode request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The API secret is not a valid hex string.
    #[error("invalid API secret key: {0}")]
    InvalidSecretKey(#[from] hex::FromHexError),

    /// The API identity is empty.
    #[error("API key id must not be empty")]
    EmptyKeyId,

    /// The API secret is empty.
    #[error("API secret key must not be empty")]
    EmptySecretKey,

    /// The URL being signed has no host component.
    #[error("cannot sign URL without a host: {0}")]
    InvalidUrl(String),

    /// The `Authorization` header could not be parsed.
    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    /// The signing scheme is not `VERACODE-HMAC-SHA-256`.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The key id was not found in the credential store.
    #[error("API key id not found: {0}")]
    KeyIdNotFound(String),

    /// The computed signature does not match the provided signature.
    #[error("Signature does not match")]
    SignatureDoesNotMatch,
}
