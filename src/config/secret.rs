//! Secure credential handling using the secrecy crate
//!
//! Wraps sensitive configuration values (source database password, FHIR
//! server bearer token) so they are zeroed on drop and redacted in Debug
//! output; access requires an explicit `expose_secret()` call.

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use zeroize::Zeroize;

/// Newtype wrapper for String implementing the traits `Secret` requires
#[derive(Clone, Debug, Zeroize, serde::Serialize, serde::Deserialize)]
#[zeroize(drop)]
#[serde(transparent)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

/// Secret string type used throughout the configuration
pub type SecretString = Secret<SecretValue>;

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl From<&str> for SecretValue {
    fn from(s: &str) -> Self {
        SecretValue(s.to_string())
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// True when the wrapped value is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
