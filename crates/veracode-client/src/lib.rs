//! Signed request pipeline and upload workflows for the Veracode XML APIs.
//!
//! [`VeracodeClient`] is the entry point. It signs every call with
//! `VERACODE-HMAC-SHA-256`, hands a [`RequestDescriptor`] to a [`Transport`],
//! and decodes the XML body, turning an embedded `<error>` element into
//! [`ClientError::Api`].
//!
//! ```rust,no_run
//! use veracode_client::{ClientConfig, UploadFileRequest, VeracodeClient};
//!
//! # async fn run() -> Result<(), veracode_client::ClientError> {
//! let client = VeracodeClient::new(&ClientConfig::from_env())?;
//!
//! let apps = client.get_app_list().await?;
//! println!("{}", apps.root_name().unwrap_or_default());
//!
//! let files = client
//!     .upload_file(UploadFileRequest::new("123", "target/app.jar"))
//!     .await?;
//! println!("{} file(s) staged", files.children("file").len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod transport;


pub use client::{UploadDirectoryRequest, UploadFileRequest, VeracodeClient};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use pipeline::{Form, FormField, RequestPipeline, decode_response};
pub use transport::{FileStream, FormValue, RequestDescriptor, ReqwestTransport, Transport, TransportError};
pub use veracode_xml::{ParsedResponse, XmlNode};
