//! Connection and credential options for the runtime client.

use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;

/// Environment variable consulted for the proxy API key.
pub const API_KEY_ENV: &str = "API_KEY";

/// Environment variable consulted for the upstream (bring-your-own) key.
pub const BYO_KEY_ENV: &str = "BYO_KEY";

/// Environment variable consulted for the declared request purpose.
pub const PURPOSE_ENV: &str = "RUNTIME_PURPOSE";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Options for [`RuntimeClient`](crate::runtime::RuntimeClient).
///
/// # Example
/// ```rust
/// use runtime_client::options::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::new("http://localhost:8080/")
///     .with_api_key("rk-...")
///     .with_purpose("regulatory_filing")
///     .with_timeout(Duration::from_secs(60));
///
/// assert_eq!(options.base_url().unwrap(), "http://localhost:8080");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Base URL of the runtime, e.g. `http://localhost:8080`
    pub base_url: String,

    /// Sent as `x-api-key`
    pub api_key: Option<SecretString>,

    /// Upstream provider key, sent as `x-byo-key`
    pub byo_key: Option<SecretString>,

    /// Declared purpose, sent as `x-purpose`
    pub purpose: Option<String>,

    /// Request timeout. Applies to the whole exchange, including the
    /// streamed body, so leave unset for long streams.
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ClientOptions {
    /// Create options for the given base URL with no credentials.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Create options for `base_url`, taking credentials from the
    /// environment (`API_KEY`, `BYO_KEY`, `RUNTIME_PURPOSE`).
    pub fn from_env(base_url: impl Into<String>) -> Self {
        Self::new(base_url).with_env_defaults()
    }

    /// Fill every credential that is still unset from the environment.
    /// Explicitly configured values are kept.
    pub fn with_env_defaults(self) -> Self {
        self.with_defaults_from(|key| std::env::var(key).ok())
    }

    /// Fill unset credentials from `lookup`. Empty values count as unset.
    pub fn with_defaults_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if self.api_key.is_none() {
            self.api_key = lookup(API_KEY_ENV).map(SecretString::new);
        }
        if self.byo_key.is_none() {
            self.byo_key = lookup(BYO_KEY_ENV).map(SecretString::new);
        }
        if self.purpose.is_none() {
            self.purpose = lookup(PURPOSE_ENV);
        }
        self
    }

    /// Set the proxy API key.
    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the upstream provider key.
    pub fn with_byo_key(mut self, byo_key: impl Into<SecretString>) -> Self {
        self.byo_key = Some(byo_key.into());
        self
    }

    /// Set the declared purpose.
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// The base URL without its trailing slash.
    ///
    /// Fails when no base URL was configured.
    pub fn base_url(&self) -> Result<&str, ClientError> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(ClientError::Config("base URL is required".to_string()));
        }
        Ok(base_url.strip_suffix('/').unwrap_or(base_url))
    }
}
