//! Per-request signing context and its sources of time and randomness.
//!
//! A [`SignatureContext`] is derived entirely from the request being signed
//! plus one clock reading and one fresh nonce. It exists only for the duration
//! of a single signing operation.

use std::fmt;

use crate::error::AuthError;

/// Length of a request nonce in bytes.
pub const NONCE_LEN: usize = 16;

/// Supplies fresh nonces for request signing.
pub trait NonceSource: Send + Sync {
    /// Produce a new nonce. Every call must return fresh random bytes.
    fn nonce(&self) -> [u8; NONCE_LEN];
}

/// Supplies the current time for request signing.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Nonce source backed by the thread-local cryptographically secure RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsNonceSource;

impl NonceSource for OsNonceSource {
    fn nonce(&self) -> [u8; NONCE_LEN] {
        rand::random()
    }
}

/// Wall-clock time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Everything that feeds the HMAC chain for one request.
#[derive(Clone, PartialEq, Eq)]
pub struct SignatureContext {
    /// Canonical timestamp: decimal milliseconds since the Unix epoch.
    pub timestamp: String,
    /// The single-use nonce.
    pub nonce: Vec<u8>,
    /// Uppercase HTTP method.
    pub method: String,
    /// Host, including a non-default port.
    pub host: String,
    /// Path plus query string, as sent on the request line.
    pub path_and_query: String,
}

impl SignatureContext {
    /// Build a context for `uri` and `method` from an explicit timestamp and nonce.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidUrl`] if `uri` has no host.
    pub fn new(
        uri: &http::Uri,
        method: &http::Method,
        timestamp_millis: i64,
        nonce: &[u8],
    ) -> Result<Self, AuthError> {
        let host = uri
            .host()
            .ok_or_else(|| AuthError::InvalidUrl(uri.to_string()))?;
        let host = match uri.port_u16() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        let path_and_query = uri
            .path_and_query()
            .map_or_else(|| "/".to_owned(), |pq| pq.as_str().to_owned());

        Ok(Self {
            timestamp: timestamp_millis.to_string(),
            nonce: nonce.to_vec(),
            method: method.as_str().to_ascii_uppercase(),
            host,
            path_and_query,
        })
    }

    /// Build a context reading the given clock and drawing a fresh nonce.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidUrl`] if `uri` has no host.
    pub fn capture(
        uri: &http::Uri,
        method: &http::Method,
        clock: &dyn Clock,
        nonces: &dyn NonceSource,
    ) -> Result<Self, AuthError> {
        Self::new(uri, method, clock.now_millis(), &nonces.nonce())
    }

    /// The request data string signed in the final stage of the chain.
    #[must_use]
    pub fn request_data(&self, key_id: &str) -> String {
        format!(
            "id={key_id}&host={}&url={}&method={}",
            self.host, self.path_and_query, self.method
        )
    }
}

impl fmt::Debug for SignatureContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureContext")
            .field("timestamp", &self.timestamp)
            .field("nonce", &hex::encode(&self.nonce))
            .field("method", &self.method)
            .field("host", &self.host)
            .field("path_and_query", &self.path_and_query)
            .finish()
    }
}
