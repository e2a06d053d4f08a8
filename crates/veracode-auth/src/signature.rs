//! `VERACODE-HMAC-SHA-256` signature computation and verification.
//!
//! The signature is derived through a fixed HMAC-SHA256 chain:
//!
//! ```text
//! HashedNonce     = HMAC-SHA256(secret, nonce)
//! HashedTimestamp = HMAC-SHA256(HashedNonce, timestamp)
//! HashedVersion   = HMAC-SHA256(HashedTimestamp, "vcode_request_version_1")
//! Signature       = HMAC-SHA256(HashedVersion, "id=..&host=..&url=..&method=..")
//! ```
//!
//! The header carries the timestamp and nonce in the clear so the server can
//! replay the chain; only the hex digest of the final stage is transmitted.
//!
//! The main entry points are [`compute_authorization_header`] (pure) and
//! [`Signer::sign`] (draws time and nonce from injected sources).

use std::sync::Arc;

use hmac::{Hmac, KeyInit, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::context::{Clock, NonceSource, OsNonceSource, SignatureContext, SystemClock};
use crate::credentials::{CredentialProvider, Credentials};
use crate::error::AuthError;

/// The signing scheme name at the start of the header.
const SIGNING_SCHEME: &str = "VERACODE-HMAC-SHA-256";

/// The protocol version tag mixed into the third stage of the chain.
const REQUEST_VERSION: &[u8] = b"vcode_request_version_1";

type HmacSha256 = Hmac<Sha256>;

/// Parsed components of a `VERACODE-HMAC-SHA-256` `Authorization` header.
///
/// Format:
/// ```text
/// VERACODE-HMAC-SHA-256 id=<key id>,ts=<millis>,nonce=<hex>,sig=<hex>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAuth {
    /// The API key id.
    pub id: String,
    /// The timestamp string exactly as signed.
    pub timestamp: String,
    /// The hex-encoded nonce.
    pub nonce: String,
    /// The hex-encoded signature.
    pub signature: String,
}

/// Run the four-stage HMAC chain and return the raw signature bytes.
fn sign_context(secret: &[u8], key_id: &str, ctx: &SignatureContext) -> Vec<u8> {
    let hashed_nonce = hmac_sha256(secret, &ctx.nonce);
    let hashed_timestamp = hmac_sha256(&hashed_nonce, ctx.timestamp.as_bytes());
    let hashed_version = hmac_sha256(&hashed_timestamp, REQUEST_VERSION);
    hmac_sha256(&hashed_version, ctx.request_data(key_id).as_bytes())
}

/// Compute the `Authorization` header value for one request.
///
/// Pure function: identical inputs always yield the identical header.
///
/// # Examples
///
/// ```
/// use veracode_auth::{Credentials, SignatureContext, compute_authorization_header};
///
/// let creds = Credentials::new("id", "00").unwrap();
/// let uri: http::Uri = "https://example.com/api".parse().unwrap();
/// let ctx = SignatureContext::new(&uri, &http::Method::GET, 1, &[0xab]).unwrap();
///
/// let header = compute_authorization_header(&creds, &ctx);
/// assert!(header.starts_with("VERACODE-HMAC-SHA-256 id=id,ts=1,nonce=ab,sig="));
/// ```
#[must_use]
pub fn compute_authorization_header(credentials: &Credentials, ctx: &SignatureContext) -> String {
    let signature = sign_context(credentials.secret(), credentials.id(), ctx);
    format!(
        "{SIGNING_SCHEME} id={},ts={},nonce={},sig={}",
        credentials.id(),
        ctx.timestamp,
        hex::encode(&ctx.nonce),
        hex::encode(signature)
    )
}

/// Parse a `VERACODE-HMAC-SHA-256` header value into its components.
///
/// # Errors
///
/// Returns [`AuthError::InvalidAuthHeader`] if a component is missing, or
/// [`AuthError::UnsupportedAlgorithm`] if the scheme is not `VERACODE-HMAC-SHA-256`.
pub fn parse_authorization_header(header: &str) -> Result<ParsedAuth, AuthError> {
    let (scheme, rest) = header.split_once(' ').ok_or(AuthError::InvalidAuthHeader)?;

    if scheme != SIGNING_SCHEME {
        return Err(AuthError::UnsupportedAlgorithm(scheme.to_owned()));
    }

    let mut id = None;
    let mut timestamp = None;
    let mut nonce = None;
    let mut signature = None;

    for part in rest.split(',') {
        let part = part.trim();
        if let Some(value) = part.strip_prefix("id=") {
            id = Some(value);
        } else if let Some(value) = part.strip_prefix("ts=") {
            timestamp = Some(value);
        } else if let Some(value) = part.strip_prefix("nonce=") {
            nonce = Some(value);
        } else if let Some(value) = part.strip_prefix("sig=") {
            signature = Some(value);
        }
    }

    Ok(ParsedAuth {
        id: id.ok_or(AuthError::InvalidAuthHeader)?.to_owned(),
        timestamp: timestamp.ok_or(AuthError::InvalidAuthHeader)?.to_owned(),
        nonce: nonce.ok_or(AuthError::InvalidAuthHeader)?.to_owned(),
        signature: signature.ok_or(AuthError::InvalidAuthHeader)?.to_owned(),
    })
}

/// Verify a signed request as the Veracode service would.
///
/// Replays the HMAC chain with the timestamp and nonce carried in the header
/// and compares signatures in constant time. Freshness of the timestamp is not
/// checked here.
///
/// # Errors
///
/// Returns an [`AuthError`] if the header is malformed, the key id is unknown,
/// or the signature does not match.
pub fn verify_authorization_header(
    header: &str,
    uri: &http::Uri,
    method: &http::Method,
    credential_provider: &dyn CredentialProvider,
) -> Result<ParsedAuth, AuthError> {
    let parsed = parse_authorization_header(header)?;
    let credentials = credential_provider.get_credentials(&parsed.id)?;

    let nonce = hex::decode(&parsed.nonce).map_err(|_| AuthError::InvalidAuthHeader)?;
    let timestamp: i64 = parsed
        .timestamp
        .parse()
        .map_err(|_| AuthError::InvalidAuthHeader)?;
    let ctx = SignatureContext::new(uri, method, timestamp, &nonce)?;

    let expected = hex::encode(sign_context(credentials.secret(), credentials.id(), &ctx));

    if parsed.signature.as_bytes().ct_eq(expected.as_bytes()).into() {
        debug!(id = %parsed.id, "Signature verification succeeded");
        Ok(parsed)
    } else {
        debug!(id = %parsed.id, host = %ctx.host, url = %ctx.path_and_query, "Signature mismatch");
        Err(AuthError::SignatureDoesNotMatch)
    }
}

/// Signs requests for one set of credentials.
///
/// Cheap to clone; the credentials and sources are shared. Each call to
/// [`Signer::sign`] reads the clock once and draws one fresh nonce, so
/// concurrent calls never share a nonce.
#[derive(Clone)]
pub struct Signer {
    credentials: Arc<Credentials>,
    clock: Arc<dyn Clock>,
    nonces: Arc<dyn NonceSource>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Signer {
    /// Create a signer using the system clock and the OS random generator.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self::with_sources(credentials, Arc::new(SystemClock), Arc::new(OsNonceSource))
    }

    /// Create a signer with explicit clock and nonce sources.
    #[must_use]
    pub fn with_sources(
        credentials: Credentials,
        clock: Arc<dyn Clock>,
        nonces: Arc<dyn NonceSource>,
    ) -> Self {
        Self {
            credentials: Arc::new(credentials),
            clock,
            nonces,
        }
    }

    /// Produce the `Authorization` header for a request to `uri` with `method`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidUrl`] if `uri` has no host.
    pub fn sign(&self, uri: &http::Uri, method: &http::Method) -> Result<String, AuthError> {
        let ctx = SignatureContext::capture(uri, method, self.clock.as_ref(), self.nonces.as_ref())?;
        debug!(
            id = %self.credentials.id(),
            host = %ctx.host,
            url = %ctx.path_and_query,
            method = %ctx.method,
            ts = %ctx.timestamp,
            "Signing request"
        );
        Ok(compute_authorization_header(&self.credentials, &ctx))
    }
}

/// Compute HMAC-SHA256 and return the raw bytes.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
