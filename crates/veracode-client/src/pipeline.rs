//! Signed request pipeline.
//!
//! [`RequestPipeline::execute`] resolves an endpoint against the API base,
//! opens any file fields, signs the request, sends it through the transport and
//! decodes the body. Decoding distinguishes four outcomes:
//!
//! - no element in the body: [`ClientError::EmptyResponse`]
//! - malformed XML: [`ClientError::Decode`]
//! - an `<error>` element anywhere: [`ClientError::Api`]
//! - anything else: the decoded [`ParsedResponse`]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Url;
use tracing::debug;
use veracode_auth::{AuthError, Signer};
use veracode_xml::ParsedResponse;

use crate::error::ClientError;
use crate::transport::{FileStream, FormValue, RequestDescriptor, Transport};

/// A form field as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    /// Sent verbatim.
    Text(String),
    /// Opened and streamed as a file part.
    File(PathBuf),
}

/// Ordered multipart form fields for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: Vec<(String, FormField)>,
}

impl Form {
    /// An empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field.
    #[must_use]
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), FormField::Text(value.into())));
        self
    }

    /// Add a text field only when `value` is present.
    #[must_use]
    pub fn text_opt(self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.text(name, value),
            None => self,
        }
    }

    /// Add a file field, streamed from `path` at send time.
    #[must_use]
    pub fn file(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.fields.push((name.into(), FormField::File(path.into())));
        self
    }

    /// The fields in send order.
    #[must_use]
    pub fn fields(&self) -> &[(String, FormField)] {
        &self.fields
    }
}

/// Signs, sends and decodes Veracode API calls.
#[derive(Debug, Clone)]
pub struct RequestPipeline {
    api_base: Url,
    signer: Signer,
    transport: Arc<dyn Transport>,
}

impl RequestPipeline {
    /// Create a pipeline. `api_base` should end in `/`.
    #[must_use]
    pub fn new(api_base: Url, signer: Signer, transport: Arc<dyn Transport>) -> Self {
        Self {
            api_base,
            signer,
            transport,
        }
    }

    /// Resolve `endpoint` against the API base.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the joined URL is invalid.
    pub fn resolve(&self, endpoint: &str) -> Result<Url, ClientError> {
        self.api_base
            .join(endpoint)
            .map_err(|e| ClientError::Config(format!("cannot resolve endpoint {endpoint:?}: {e}")))
    }

    /// Execute one API call.
    ///
    /// A present `form` forces `POST`. Gzip is requested on every call.
    ///
    /// # Errors
    ///
    /// See the module documentation for the decoding outcomes; transport
    /// failures surface as [`ClientError::Transport`] and unreadable upload
    /// files as [`ClientError::Io`].
    pub async fn execute(
        &self,
        endpoint: &str,
        method: http::Method,
        form: Option<Form>,
    ) -> Result<ParsedResponse, ClientError> {
        let url = self.resolve(endpoint)?;
        let method = if form.is_some() {
            http::Method::POST
        } else {
            method
        };

        let form = match form {
            Some(form) => Some(open_fields(form).await?),
            None => None,
        };

        let uri: http::Uri = url
            .as_str()
            .parse()
            .map_err(|_| AuthError::InvalidUrl(url.to_string()))?;
        let authorization = self.signer.sign(&uri, &method)?;

        debug!(%method, url = %url, multipart = form.is_some(), "sending Veracode API request");

        let body = self
            .transport
            .send(RequestDescriptor {
                method,
                url,
                authorization,
                form,
                gzip: true,
            })
            .await?;

        decode_response(&body)
    }
}

/// Decode a response body, promoting an `<error>` element to [`ClientError::Api`].
///
/// # Errors
///
/// Returns [`ClientError::EmptyResponse`], [`ClientError::Decode`] or
/// [`ClientError::Api`] as described in the module documentation.
pub fn decode_response(body: &str) -> Result<ParsedResponse, ClientError> {
    let parsed = veracode_xml::parse(body)?;
    if parsed.is_empty() {
        return Err(ClientError::EmptyResponse);
    }
    if let Some(message) = parsed.api_error() {
        debug!(message = %message, "API reported an error");
        return Err(ClientError::Api(message));
    }
    Ok(parsed)
}

async fn open_fields(form: Form) -> Result<Vec<(String, FormValue)>, ClientError> {
    let mut fields = Vec::with_capacity(form.fields.len());
    for (name, field) in form.fields {
        let value = match field {
            FormField::Text(text) => FormValue::Text(text),
            FormField::File(path) => FormValue::File(open_file(&path).await?),
        };
        fields.push((name, value));
    }
    Ok(fields)
}

async fn open_file(path: &Path) -> Result<FileStream, ClientError> {
    let io_err = |source| ClientError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = tokio::fs::File::open(path).await.map_err(io_err)?;
    let length = file.metadata().await.map_err(io_err)?.len();
    let file_name = path
        .file_name()
        .map_or_else(|| "upload".to_owned(), |n| n.to_string_lossy().into_owned());
    Ok(FileStream {
        file,
        file_name,
        length,
    })
}
