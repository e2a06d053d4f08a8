//! `VERACODE-HMAC-SHA-256` request signing for the Veracode API client.
//!
//! Every call to the Veracode API carries an `Authorization` header produced by
//! a four-stage HMAC-SHA256 chain. Each stage is keyed by the previous stage's
//! output, binding the API identity, a timestamp, a fresh nonce, the protocol
//! version and the request line into one signature.
//!
//! # Usage
//!
//! ```rust
//! use veracode_auth::{Credentials, Signer};
//!
//! let credentials = Credentials::new("api-id", "0123456789abcdef").unwrap();
//! let signer = Signer::new(credentials);
//! let uri: http::Uri = "https://analysiscenter.veracode.com/api/5.0/getapplist.do"
//!     .parse()
//!     .unwrap();
//!
//! let header = signer.sign(&uri, &http::Method::GET).unwrap();
//! assert!(header.starts_with("VERACODE-HMAC-SHA-256 id=api-id,ts="));
//! ```
//!
//! # Modules
//!
//! - [`context`] - Signing context plus injectable nonce and clock sources
//! - [`credentials`] - API credentials and the lookup trait used for verification
//! - [`error`] - Authentication error types
//! - [`signature`] - The HMAC chain, header formatting, parsing and verification

pub mod context;
pub mod credentials;
pub mod error;
pub mod signature;

pub use context::{Clock, NonceSource, OsNonceSource, SignatureContext, SystemClock};
pub use credentials::{CredentialProvider, Credentials, StaticCredentialProvider};
pub use error::AuthError;
pub use signature::{
    ParsedAuth, Signer, compute_authorization_header, parse_authorization_header,
    verify_authorization_header,
};
