//! High-level Veracode API calls.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use veracode_archive::{ArchiveBuilder, ArchiveResult};
use veracode_auth::{Credentials, Signer};
use veracode_xml::{ParsedResponse, XmlNode};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::pipeline::{Form, RequestPipeline};
use crate::transport::{ReqwestTransport, Transport};

const UPLOAD_FILE: &str = "uploadfile.do";
const GET_APP_LIST: &str = "getapplist.do";
const BEGIN_PRESCAN: &str = "beginprescan.do";

/// Arguments for [`VeracodeClient::upload_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFileRequest {
    /// Target application id.
    pub app_id: String,
    /// Local file to upload.
    pub file: PathBuf,
    /// Sandbox id; the policy scan area is used when absent.
    pub sandbox_id: Option<String>,
    /// Server-side file name.
    pub save_as: Option<String>,
}

impl UploadFileRequest {
    /// Upload `file` to application `app_id`.
    #[must_use]
    pub fn new(app_id: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            app_id: app_id.into(),
            file: file.into(),
            sandbox_id: None,
            save_as: None,
        }
    }

    /// Upload into a sandbox.
    #[must_use]
    pub fn with_sandbox_id(mut self, sandbox_id: impl Into<String>) -> Self {
        self.sandbox_id = Some(sandbox_id.into());
        self
    }

    /// Name the uploaded file differently on the server.
    #[must_use]
    pub fn with_save_as(mut self, save_as: impl Into<String>) -> Self {
        self.save_as = Some(save_as.into());
        self
    }
}

/// Arguments for [`VeracodeClient::upload_directory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDirectoryRequest {
    /// Target application id.
    pub app_id: String,
    /// Directory to package.
    pub source_dir: PathBuf,
    /// Glob relative to `source_dir`, e.g. `**/*.js`.
    pub name_pattern: String,
    /// Glob of paths to leave out, e.g. `node_modules/**`.
    pub exclude_pattern: Option<String>,
    /// Sandbox id; the policy scan area is used when absent.
    pub sandbox_id: Option<String>,
    /// Server-side file name for the archive.
    pub save_as: Option<String>,
}

impl UploadDirectoryRequest {
    /// Package files under `source_dir` matching `name_pattern` for `app_id`.
    #[must_use]
    pub fn new(
        app_id: impl Into<String>,
        source_dir: impl Into<PathBuf>,
        name_pattern: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            source_dir: source_dir.into(),
            name_pattern: name_pattern.into(),
            exclude_pattern: None,
            sandbox_id: None,
            save_as: None,
        }
    }

    /// Skip paths matching `pattern`.
    #[must_use]
    pub fn with_exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_pattern = Some(pattern.into());
        self
    }

    /// Upload into a sandbox.
    #[must_use]
    pub fn with_sandbox_id(mut self, sandbox_id: impl Into<String>) -> Self {
        self.sandbox_id = Some(sandbox_id.into());
        self
    }

    /// Name the archive differently on the server.
    #[must_use]
    pub fn with_save_as(mut self, save_as: impl Into<String>) -> Self {
        self.save_as = Some(save_as.into());
        self
    }
}

/// Veracode API client.
///
/// Cheap to clone; clones share credentials and the underlying transport.
/// Each call is signed independently, so concurrent calls never share a nonce.
#[derive(Debug, Clone)]
pub struct VeracodeClient {
    pipeline: RequestPipeline,
    archiver: ArchiveBuilder,
}

impl VeracodeClient {
    /// Build a client with the production [`ReqwestTransport`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error ([`ClientError::is_config`]) if the
    /// credentials or base URL are invalid, or [`ClientError::Transport`] if the
    /// HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let transport = ReqwestTransport::new(config.timeout())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a client over a caller-supplied transport.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the credentials or base URL are invalid.
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn Transport>) -> ClientResult<Self> {
        let credentials = Credentials::new(config.api_key_id.as_str(), &config.api_key_secret)?;
        let api_base = config.api_base_url()?;
        debug!(api_base = %api_base, key_id = credentials.id(), "creating Veracode client");
        Ok(Self::from_pipeline(RequestPipeline::new(
            api_base,
            Signer::new(credentials),
            transport,
        )))
    }

    /// Wrap an already-assembled pipeline.
    #[must_use]
    pub fn from_pipeline(pipeline: RequestPipeline) -> Self {
        Self {
            pipeline,
            archiver: ArchiveBuilder::new(),
        }
    }

    /// Replace the archive builder used by [`Self::upload_directory`].
    #[must_use]
    pub fn with_archiver(mut self, archiver: ArchiveBuilder) -> Self {
        self.archiver = archiver;
        self
    }

    /// Make an arbitrary signed call. A present `form` forces `POST`.
    ///
    /// # Errors
    ///
    /// See [`RequestPipeline::execute`].
    pub async fn call(
        &self,
        endpoint: &str,
        method: http::Method,
        form: Option<Form>,
    ) -> ClientResult<ParsedResponse> {
        self.pipeline.execute(endpoint, method, form).await
    }

    /// Upload one file to an application, optionally into a sandbox.
    ///
    /// Returns the `filelist` element of the response.
    ///
    /// # Errors
    ///
    /// Any pipeline error, or [`ClientError::UnexpectedResponse`] if the
    /// response has no `filelist` with at least one `file`.
    pub async fn upload_file(&self, request: UploadFileRequest) -> ClientResult<XmlNode> {
        let UploadFileRequest {
            app_id,
            file,
            sandbox_id,
            save_as,
        } = request;

        info!(app_id = %app_id, file = %file.display(), sandbox_id = ?sandbox_id, "uploading file");

        let form = Form::new()
            .text("app_id", app_id)
            .text_opt("sandbox_id", sandbox_id)
            .text_opt("save_as", save_as)
            .file("file", file);

        let parsed = self.call(UPLOAD_FILE, http::Method::POST, Some(form)).await?;
        let filelist = parsed
            .find("filelist")
            .filter(|list| !list.children("file").is_empty())
            .ok_or_else(|| {
                ClientError::UnexpectedResponse("response has no filelist with a file entry".to_owned())
            })?;

        info!(files = filelist.children("file").len(), "upload accepted");
        Ok(filelist.clone())
    }

    /// Package `source_dir` into a zip archive.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Archive`] on any archiving failure.
    pub async fn create_zip_archive(
        &self,
        source_dir: impl AsRef<Path>,
        name_pattern: &str,
        exclude_pattern: Option<&str>,
    ) -> ClientResult<ArchiveResult> {
        Ok(self
            .archiver
            .create_zip_archive(source_dir, name_pattern, exclude_pattern)
            .await?)
    }

    /// Archive a directory and upload the archive.
    ///
    /// The temporary archive is removed once the upload attempt finishes,
    /// whatever its outcome.
    ///
    /// # Errors
    ///
    /// [`ClientError::Archive`] if packaging fails (nothing is uploaded), or
    /// any error of [`Self::upload_file`].
    pub async fn upload_directory(&self, request: UploadDirectoryRequest) -> ClientResult<XmlNode> {
        let UploadDirectoryRequest {
            app_id,
            source_dir,
            name_pattern,
            exclude_pattern,
            sandbox_id,
            save_as,
        } = request;

        let archive = self
            .create_zip_archive(&source_dir, &name_pattern, exclude_pattern.as_deref())
            .await?;
        info!(
            source = %source_dir.display(),
            archive = %archive.path.display(),
            size_bytes = archive.size_bytes,
            "archive ready for upload"
        );

        let result = self
            .upload_file(UploadFileRequest {
                app_id,
                file: archive.path.clone(),
                sandbox_id,
                save_as,
            })
            .await;

        if let Err(err) = tokio::fs::remove_file(&archive.path).await {
            warn!(path = %archive.path.display(), error = %err, "failed to remove temporary archive");
        }

        result
    }

    /// List the applications visible to the credentials.
    ///
    /// # Errors
    ///
    /// See [`RequestPipeline::execute`].
    pub async fn get_app_list(&self) -> ClientResult<ParsedResponse> {
        self.call(GET_APP_LIST, http::Method::GET, None).await
    }

    /// Start the prescan of the most recent build.
    ///
    /// With `auto_scan` the full scan starts as soon as the prescan succeeds.
    ///
    /// # Errors
    ///
    /// See [`RequestPipeline::execute`].
    pub async fn begin_prescan(
        &self,
        app_id: &str,
        sandbox_id: Option<&str>,
        auto_scan: bool,
    ) -> ClientResult<ParsedResponse> {
        info!(app_id, sandbox_id, auto_scan, "beginning prescan");
        let form = Form::new()
            .text("app_id", app_id)
            .text_opt("sandbox_id", sandbox_id)
            .text("auto_scan", auto_scan.to_string());
        self.call(BEGIN_PRESCAN, http::Method::POST, Some(form)).await
    }
}
