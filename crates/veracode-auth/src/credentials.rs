//! API credentials and credential lookup.
//!
//! [`Credentials`] holds one API identity and its decoded secret. The
//! [`CredentialProvider`] trait resolves credentials by key id on the verifying
//! side, with [`StaticCredentialProvider`] as the in-memory implementation.

use std::collections::HashMap;
use std::fmt;

use crate::error::AuthError;

/// A Veracode API identity and its secret key.
///
/// The secret is supplied hex-encoded and decoded once at construction, so a
/// malformed key is reported before any request is signed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    id: String,
    secret: Vec<u8>,
}

impl Credentials {
    /// Create credentials from an API key id and a hex-encoded secret.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSecretKey`] if `secret_hex` is not valid hex,
    /// [`AuthError::EmptySecretKey`] if it is empty, or [`AuthError::EmptyKeyId`]
    /// if `id` is empty.
    pub fn new(id: impl Into<String>, secret_hex: impl AsRef<str>) -> Result<Self, AuthError> {
        let id = id.into();
        if id.is_empty() {
            return Err(AuthError::EmptyKeyId);
        }
        let secret = hex::decode(secret_hex.as_ref().trim())?;
        if secret.is_empty() {
            return Err(AuthError::EmptySecretKey);
        }
        Ok(Self { id, secret })
    }

    /// The API key id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The decoded secret key bytes.
    #[must_use]
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Trait for looking up credentials by API key id.
///
/// Implementations may back this with a configuration file, a vault, or any
/// other credential store.
pub trait CredentialProvider: Send + Sync {
    /// Retrieve the credentials registered for `key_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyIdNotFound`] if the key id is not recognized.
    fn get_credentials(&self, key_id: &str) -> Result<Credentials, AuthError>;
}

/// A simple in-memory credential provider backed by a `HashMap`.
///
/// # Examples
///
/// ```
/// use veracode_auth::{CredentialProvider, Credentials, StaticCredentialProvider};
///
/// let provider = StaticCredentialProvider::new(vec![Credentials::new("id", "beef").unwrap()]);
/// assert_eq!(provider.get_credentials("id").unwrap().secret(), &[0xbe, 0xef]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    credentials: HashMap<String, Credentials>,
}

impl StaticCredentialProvider {
    /// Create a provider from an iterable of credentials, keyed by their id.
    pub fn new(credentials: impl IntoIterator<Item = Credentials>) -> Self {
        Self {
            credentials: credentials
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
        }
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn get_credentials(&self, key_id: &str) -> Result<Credentials, AuthError> {
        self.credentials
            .get(key_id)
            .cloned()
            .ok_or_else(|| AuthError::KeyIdNotFound(key_id.to_owned()))
    }
}
