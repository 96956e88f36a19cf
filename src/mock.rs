//! Test doubles for development and testing.
//!
//! [`UnsignedToken`] builds structurally valid, unsigned tokens;
//! [`MockAuthenticator`] attaches grants without verifying anything;
//! [`StaticPermissionChecker`] answers permission checks from a fixed set.
//! **Never use any of these in production** — they bypass every security
//! check.

use std::collections::HashSet;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::adapter::RealmAdapter;
use crate::authenticate::Authenticator;
use crate::context::{Grant, PermissionChecker};
use crate::error::{Error, Result};
use crate::realm::RequestContext;
use crate::token::DecodedToken;

/// Builder for structurally valid unsigned tokens.
///
/// Produces the compact `header.payload.` form with an empty signature
/// segment — enough for everything that does structural decoding, useless
/// against a real verifier.
///
/// ```
/// use realmguard::mock::UnsignedToken;
///
/// let token = UnsignedToken::new("user-1")
///     .issuer("https://auth.example.com/realms/tenantA")
///     .realm_roles(["auditor"])
///     .encode();
/// let decoded = realmguard::DecodedToken::decode(&token).unwrap();
/// assert_eq!(decoded.realm(), Some("tenantA"));
/// ```
#[derive(Debug, Clone)]
pub struct UnsignedToken {
    header: serde_json::Map<String, serde_json::Value>,
    claims: serde_json::Map<String, serde_json::Value>,
}

impl UnsignedToken {
    /// Start a token for the given subject.
    pub fn new(subject: impl Into<String>) -> Self {
        let mut header = serde_json::Map::new();
        header.insert("alg".to_string(), "RS256".into());
        header.insert("typ".to_string(), "JWT".into());
        let mut claims = serde_json::Map::new();
        claims.insert("sub".to_string(), subject.into().into());
        Self { header, claims }
    }

    /// Set the `iss` claim.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.claims.insert("iss".to_string(), issuer.into().into());
        self
    }

    /// Set the `exp` claim (Unix epoch seconds).
    pub fn expires_at(mut self, epoch_seconds: u64) -> Self {
        self.claims
            .insert("exp".to_string(), epoch_seconds.into());
        self
    }

    /// Set an arbitrary claim.
    pub fn claim(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.claims.insert(key.into(), value.into());
        self
    }

    /// Set realm-level roles (`realm_access.roles`).
    pub fn realm_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: Vec<serde_json::Value> =
            roles.into_iter().map(|r| r.into().into()).collect();
        self.claims.insert(
            "realm_access".to_string(),
            serde_json::json!({ "roles": roles }),
        );
        self
    }

    /// Set client-level roles (`resource_access.<client>.roles`).
    pub fn client_roles<I, S>(mut self, client: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: Vec<serde_json::Value> =
            roles.into_iter().map(|r| r.into().into()).collect();
        let access = self
            .claims
            .entry("resource_access".to_string())
            .or_insert_with(|| serde_json::json!({}));
        if let Some(map) = access.as_object_mut() {
            map.insert(client.into(), serde_json::json!({ "roles": roles }));
        }
        self
    }

    /// Encode to the compact unsigned form.
    pub fn encode(&self) -> String {
        let header = serde_json::Value::Object(self.header.clone()).to_string();
        let claims = serde_json::Value::Object(self.claims.clone()).to_string();
        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(claims)
        )
    }

    /// Encode, decode, and wrap as a [`Grant`].
    pub fn into_grant(self) -> Grant {
        // an UnsignedToken always encodes to a decodable token
        let decoded = DecodedToken::decode(&self.encode()).unwrap_or_else(|e| {
            unreachable!("UnsignedToken produced an undecodable token: {e}")
        });
        Grant::new(decoded)
    }
}

enum MockMode {
    /// Always attach this grant (or none).
    Fixed(Option<Grant>),
    /// Structurally decode whatever bearer token the request carries.
    DecodeBearer,
}

/// Authenticator that attaches grants without verifying anything.
///
/// Two modes:
/// - [`with_grant`](Self::with_grant) / [`anonymous`](Self::anonymous) —
///   always return the configured outcome;
/// - [`decode_bearer`](Self::decode_bearer) — structurally decode the
///   request's bearer token and wrap it as a grant (absent token →
///   `Ok(None)`, malformed token → authentication error).
///
/// **Never use in production.**
pub struct MockAuthenticator {
    mode: MockMode,
}

impl MockAuthenticator {
    /// Always report "no credentials".
    pub fn anonymous() -> Self {
        Self {
            mode: MockMode::Fixed(None),
        }
    }

    /// Always attach the given grant.
    pub fn with_grant(grant: Grant) -> Self {
        Self {
            mode: MockMode::Fixed(Some(grant)),
        }
    }

    /// Structurally decode the request's bearer token.
    pub fn decode_bearer() -> Self {
        Self {
            mode: MockMode::DecodeBearer,
        }
    }
}

#[async_trait]
impl Authenticator for MockAuthenticator {
    async fn authenticate(
        &self,
        _adapter: &RealmAdapter,
        request: &RequestContext<'_>,
    ) -> Result<Option<Grant>> {
        match &self.mode {
            MockMode::Fixed(grant) => Ok(grant.clone()),
            MockMode::DecodeBearer => match request.bearer_token() {
                Some(token) => {
                    let decoded = DecodedToken::decode(&token)
                        .map_err(|e| Error::Authentication(e.to_string()))?;
                    Ok(Some(Grant::new(decoded)))
                },
                None => Ok(None),
            },
        }
    }
}

/// Permission checker answering from a fixed set of granted resources.
///
/// `check` returns `true` only when every requested resource is in the
/// set. [`failing`](Self::failing) builds a checker whose decisions cannot
/// be obtained, for exercising the "could not determine" path.
pub struct StaticPermissionChecker {
    granted: HashSet<String>,
    failure: Option<String>,
}

impl StaticPermissionChecker {
    /// Grant exactly these resources.
    pub fn granting<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            granted: resources.into_iter().map(Into::into).collect(),
            failure: None,
        }
    }

    /// Always fail with a [`Error::PermissionCheck`] carrying `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            granted: HashSet::new(),
            failure: Some(message.into()),
        }
    }
}

#[async_trait]
impl PermissionChecker for StaticPermissionChecker {
    async fn check(&self, _grant: &Grant, resources: &[String]) -> Result<bool> {
        if let Some(message) = &self.failure {
            return Err(Error::PermissionCheck(message.clone()));
        }
        Ok(resources.iter().all(|r| self.granted.contains(r)))
    }
}
