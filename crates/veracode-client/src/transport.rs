//! The HTTP transport boundary.
//!
//! A [`Transport`] takes a fully-formed [`RequestDescriptor`] and returns the
//! response body as text. [`ReqwestTransport`] is the production implementation.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::header::{ACCEPT_ENCODING, AUTHORIZATION};
use reqwest::multipart::{Form as MultipartForm, Part};
use tracing::debug;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("veracode-client-rs/", env!("CARGO_PKG_VERSION"));

/// A transport-level failure. No response body was decoded.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connecting, TLS, timeout, or reading the body failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP status {status}: {body}")]
    Status {
        /// The status code.
        status: u16,
        /// The response body, for diagnostics.
        body: String,
    },

    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// An upload file, already opened for streaming.
#[derive(Debug)]
pub struct FileStream {
    /// The open file, read from its current position.
    pub file: tokio::fs::File,
    /// File name reported in the multipart part.
    pub file_name: String,
    /// Length in bytes.
    pub length: u64,
}

/// One multipart form value.
#[derive(Debug)]
pub enum FormValue {
    /// A plain text field.
    Text(String),
    /// A streamed file field.
    File(FileStream),
}

/// Everything needed to send one signed request.
///
/// Built fresh for every call and consumed by [`Transport::send`]; the
/// signature inside is single-use.
pub struct RequestDescriptor {
    /// HTTP method.
    pub method: http::Method,
    /// Absolute target URL.
    pub url: Url,
    /// `Authorization` header value.
    pub authorization: String,
    /// Multipart form fields in send order, if any.
    pub form: Option<Vec<(String, FormValue)>>,
    /// Whether a gzip-encoded response is requested.
    pub gzip: bool,
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("authorization", &"<signed>")
            .field("form", &self.form)
            .field("gzip", &self.gzip)
            .finish()
    }
}

/// Sends a [`RequestDescriptor`] and returns the raw response body.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send the request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if no successful response body was received.
    async fn send(&self, request: RequestDescriptor) -> Result<String, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<String, TransportError> {
        let RequestDescriptor {
            method,
            url,
            authorization,
            form,
            gzip,
        } = request;

        let mut builder = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, authorization);
        if !gzip {
            builder = builder.header(ACCEPT_ENCODING, "identity");
        }
        if let Some(fields) = form {
            builder = builder.multipart(multipart_form(fields));
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "received response");

        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn multipart_form(fields: Vec<(String, FormValue)>) -> MultipartForm {
    fields
        .into_iter()
        .fold(MultipartForm::new(), |form, (name, value)| match value {
            FormValue::Text(text) => form.text(name, text),
            FormValue::File(stream) => {
                let part = Part::stream_with_length(reqwest::Body::from(stream.file), stream.length)
                    .file_name(stream.file_name);
                form.part(name, part)
            }
        })
}
