//! Error types for the Veracode client.

use std::path::PathBuf;

use veracode_archive::ArchiveError;
use veracode_auth::AuthError;
use veracode_xml::XmlError;

use crate::transport::TransportError;

/// Everything a client call can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration, such as a malformed API base URL.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credentials or the signed URL were rejected before sending.
    #[error("signing error: {0}")]
    Auth(#[from] AuthError),

    /// The transport failed; no response body was decoded.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The API answered with an `<error>` element; carries its text.
    #[error("{0}")]
    Api(String),

    /// The response body held no XML element.
    #[error("empty response body")]
    EmptyResponse,

    /// The response body is not well-formed XML.
    #[error("failed to decode response: {0}")]
    Decode(#[from] XmlError),

    /// Packaging a directory failed.
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// A local file could not be opened for upload.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// The file being opened.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The response decoded cleanly but lacks an element the call requires.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// Whether this is a configuration problem rather than a runtime failure.
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Auth(
                    AuthError::InvalidSecretKey(_)
                        | AuthError::EmptyKeyId
                        | AuthError::EmptySecretKey
                )
        )
    }
}

/// Convenience result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
