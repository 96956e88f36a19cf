//! Identity-provider authority configuration.
//!
//! [`AuthorityConfig`] is the immutable base configuration shared by every
//! realm adapter: the authority base URL, the client (resource) identifier
//! this deployment authenticates as, and an optional public-key source.
//! It deserializes from the conventional adapter JSON file with kebab-case
//! keys (`auth-server-url`, `realm-public-key`, ...), so existing
//! deployment artifacts load unchanged.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Client credentials attached to a realm adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// The confidential client secret.
    pub secret: String,
}

/// Immutable base configuration for the identity provider.
///
/// Shared read-only across all realms; supplied once at process start.
/// Per-realm adapters are produced by merging this base with realm-specific
/// overrides (see [`AdapterFactory`](crate::AdapterFactory)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthorityConfig {
    /// Base URL of the identity provider, e.g. `https://auth.example.com`.
    #[serde(alias = "auth_server_url")]
    pub auth_server_url: String,

    /// The client / resource identifier this deployment authenticates as.
    pub resource: String,

    /// PEM or bare base64 public-key material for offline verification.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "realm_public_key")]
    pub realm_public_key: Option<String>,

    /// Default realm name. Overridden per adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,

    /// Client credentials. Overridden per adapter when a secret resolver
    /// is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,

    /// SSL requirement advertised by the provider (`external`, `all`, `none`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_required: Option<String>,
}

impl AuthorityConfig {
    /// Create a configuration from the two required fields.
    pub fn new(auth_server_url: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            auth_server_url: auth_server_url.into(),
            resource: resource.into(),
            realm_public_key: None,
            realm: None,
            credentials: None,
            ssl_required: None,
        }
    }

    /// Set the public-key source.
    pub fn with_public_key(mut self, key: impl Into<String>) -> Self {
        self.realm_public_key = Some(key.into());
        self
    }

    /// Set the default realm.
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Set the client secret.
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            secret: secret.into(),
        });
        self
    }

    /// Load a configuration from an adapter JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the file cannot be read, parsed,
    /// or fails [`validate`](Self::validate).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] when the authority URL does not
    /// parse or the resource identifier is empty.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.auth_server_url).map_err(|e| {
            Error::Configuration(format!(
                "auth-server-url '{}' is not a valid URL: {e}",
                self.auth_server_url
            ))
        })?;
        if self.resource.is_empty() {
            return Err(Error::Configuration(
                "resource identifier must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The issuer URL for a realm: `{auth_server_url}/realms/{realm}`.
    pub fn issuer_url(&self, realm: &str) -> String {
        format!(
            "{}/realms/{realm}",
            self.auth_server_url.trim_end_matches('/')
        )
    }

    /// The configured client secret, if any.
    pub fn client_secret(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.secret.as_str())
    }
}
