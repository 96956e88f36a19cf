//! The signature-verifying authentication seam.
//!
//! The core engine never verifies signatures itself — it hands the request
//! and the resolved realm's adapter to an [`Authenticator`], which either
//! attaches a [`Grant`] or reports why it could not. Deployments bring
//! their own implementation (introspection endpoint, JWKS client, gateway
//! header trust); [`JwtAuthenticator`] is a ready-made offline verifier
//! for adapters configured with a realm public key (requires the
//! `jwt-auth` feature).

use async_trait::async_trait;

use crate::adapter::RealmAdapter;
use crate::context::Grant;
use crate::error::Result;
use crate::realm::RequestContext;

/// Validates a request's credentials against one realm and produces the
/// request's [`Grant`].
///
/// Returns `Ok(None)` when the request carries no credentials at all;
/// `Err` when credentials are present but fail verification.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate `request` against `adapter`'s realm.
    async fn authenticate(
        &self,
        adapter: &RealmAdapter,
        request: &RequestContext<'_>,
    ) -> Result<Option<Grant>>;
}

#[cfg(feature = "jwt-auth")]
pub use self::jwt::JwtAuthenticator;

#[cfg(feature = "jwt-auth")]
mod jwt {
    use async_trait::async_trait;

    use super::Authenticator;
    use crate::adapter::RealmAdapter;
    use crate::context::Grant;
    use crate::error::{Error, Result};
    use crate::realm::RequestContext;
    use crate::token::DecodedToken;

    /// Offline JWT verification against the adapter's configured realm
    /// public key.
    ///
    /// Verifies the RS256 signature, the issuer (must equal the adapter's
    /// issuer URL), and expiry with a configurable leeway. The adapter's
    /// `realm-public-key` may be a full PEM block or the bare base64 body;
    /// bare keys are wrapped in PEM guards before parsing.
    #[derive(Debug, Clone)]
    pub struct JwtAuthenticator {
        leeway_seconds: u64,
    }

    impl Default for JwtAuthenticator {
        fn default() -> Self {
            Self { leeway_seconds: 60 }
        }
    }

    impl JwtAuthenticator {
        /// Create a verifier with the default 60-second leeway.
        pub fn new() -> Self {
            Self::default()
        }

        /// Set the clock-skew leeway applied to expiry validation.
        pub fn with_leeway(mut self, seconds: u64) -> Self {
            self.leeway_seconds = seconds;
            self
        }

        fn decoding_key(source: &str) -> Result<jsonwebtoken::DecodingKey> {
            let pem = if source.trim_start().starts_with("-----BEGIN") {
                source.to_owned()
            } else {
                format!("-----BEGIN PUBLIC KEY-----\n{source}\n-----END PUBLIC KEY-----\n")
            };
            jsonwebtoken::DecodingKey::from_rsa_pem(pem.as_bytes())
                .map_err(|e| Error::Configuration(format!("invalid realm public key: {e}")))
        }
    }

    #[async_trait]
    impl Authenticator for JwtAuthenticator {
        async fn authenticate(
            &self,
            adapter: &RealmAdapter,
            request: &RequestContext<'_>,
        ) -> Result<Option<Grant>> {
            let Some(token) = request.bearer_token() else {
                return Ok(None);
            };
            let Some(key_source) = adapter.config().realm_public_key.as_deref() else {
                return Err(Error::Configuration(format!(
                    "realm '{}' has no public key configured",
                    adapter.realm()
                )));
            };
            let key = Self::decoding_key(key_source)?;

            let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::RS256);
            validation.set_issuer(&[adapter.issuer_url()]);
            validation.validate_aud = false;
            validation.leeway = self.leeway_seconds;

            jsonwebtoken::decode::<serde_json::Value>(&token, &key, &validation).map_err(|e| {
                let message = match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => "token expired",
                    jsonwebtoken::errors::ErrorKind::InvalidIssuer => "invalid issuer",
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => "invalid signature",
                    _ => "token validation failed",
                };
                Error::Authentication(message.to_string())
            })?;

            // re-decode structurally to keep the raw string and header
            let decoded = DecodedToken::decode(&token)?;
            Ok(Some(Grant::new(decoded)))
        }
    }
}
