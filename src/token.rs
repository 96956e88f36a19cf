//! Bearer token extraction and structural decoding.
//!
//! [`DecodedToken`] performs *structural* parsing only: it splits the
//! compact JWT envelope, base64-decodes the header and payload segments,
//! and exposes the claims. It never verifies a cryptographic signature —
//! that is the job of an [`Authenticator`](crate::Authenticator)
//! implementation backed by the realm's identity provider. Structural
//! decoding is exactly enough to read the issuer claim for realm
//! resolution.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Extract the bearer token string from a request's headers.
///
/// Looks up `Authorization` (header lookup is case-insensitive), strips a
/// leading case-insensitive `bearer` scheme if present (taking the last
/// whitespace-separated word), and otherwise treats the full header value
/// as the token. Returns `None` when the header is absent or empty.
pub fn bearer_token(headers: &http::HeaderMap) -> Option<String> {
    let value = headers.get(http::header::AUTHORIZATION)?.to_str().ok()?;
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.get(..6) {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => {
            value.split_whitespace().last().map(str::to_owned)
        },
        _ => Some(value.to_owned()),
    }
}

/// Structural header of a decoded token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm, e.g. `RS256`.
    #[serde(default)]
    pub alg: Option<String>,
    /// Key identifier.
    #[serde(default)]
    pub kid: Option<String>,
    /// Token type, usually `JWT`.
    #[serde(default)]
    pub typ: Option<String>,
}

/// A structurally decoded bearer token: header, claims, and the raw string.
///
/// No signature has been checked. Treat the claims as *hints* (good enough
/// to pick a realm) until an authenticator has verified the token against
/// that realm's keys.
#[derive(Debug, Clone)]
pub struct DecodedToken {
    header: TokenHeader,
    claims: serde_json::Value,
    raw: String,
}

impl DecodedToken {
    /// Structurally decode a compact token string.
    ///
    /// The token must consist of three dot-separated segments (the
    /// signature segment may be empty); header and payload must be
    /// base64url-encoded JSON objects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedToken`] describing the structural problem.
    pub fn decode(token: &str) -> Result<Self> {
        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(Error::MalformedToken(
                "expected three dot-separated segments".to_string(),
            ));
        };

        let header: TokenHeader = serde_json::from_slice(&decode_segment(header, "header")?)
            .map_err(|e| Error::MalformedToken(format!("invalid header JSON: {e}")))?;
        let claims: serde_json::Value = serde_json::from_slice(&decode_segment(payload, "payload")?)
            .map_err(|e| Error::MalformedToken(format!("invalid payload JSON: {e}")))?;
        if !claims.is_object() {
            return Err(Error::MalformedToken(
                "payload is not a JSON object".to_string(),
            ));
        }

        Ok(Self {
            header,
            claims,
            raw: token.to_owned(),
        })
    }

    /// The structural header.
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// All claims as a JSON value.
    pub fn claims(&self) -> &serde_json::Value {
        &self.claims
    }

    /// The raw compact token string, for forwarding downstream.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The `iss` claim.
    pub fn issuer(&self) -> Option<&str> {
        self.claims.get("iss").and_then(serde_json::Value::as_str)
    }

    /// The `sub` claim.
    pub fn subject(&self) -> Option<&str> {
        self.claims.get("sub").and_then(serde_json::Value::as_str)
    }

    /// The `exp` claim (Unix epoch seconds).
    pub fn expires_at(&self) -> Option<u64> {
        self.claims.get("exp").and_then(serde_json::Value::as_u64)
    }

    /// Whether the token's `exp` claim is in the past.
    ///
    /// Tokens without an `exp` claim never count as expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            Some(expires_at) => {
                let now = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                expires_at < now
            },
            None => false,
        }
    }

    /// The realm this token was issued by: the final path segment of the
    /// issuer URL.
    pub fn realm(&self) -> Option<&str> {
        self.issuer()
            .and_then(|iss| iss.rsplit('/').next())
            .filter(|segment| !segment.is_empty())
    }

    /// Get a typed claim value.
    pub fn claim<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.claims
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

fn decode_segment(segment: &str, what: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| Error::MalformedToken(format!("invalid base64 in {what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    fn encode(header: &serde_json::Value, claims: &serde_json::Value) -> String {
        format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        )
    }

    fn headers_with_authorization(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            value.parse().expect("header value"),
        );
        headers
    }

    #[test]
    fn bearer_token_strips_scheme() {
        let headers = headers_with_authorization("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn bearer_token_scheme_is_case_insensitive() {
        let headers = headers_with_authorization("bEaReR tok");
        assert_eq!(bearer_token(&headers), Some("tok".to_string()));
    }

    #[test]
    fn bearer_token_without_scheme_uses_full_value() {
        let headers = headers_with_authorization("raw-token-value");
        assert_eq!(bearer_token(&headers), Some("raw-token-value".to_string()));
    }

    #[test]
    fn bearer_token_absent() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn decode_extracts_claims() {
        let token = encode(
            &serde_json::json!({"alg": "RS256", "typ": "JWT", "kid": "key-1"}),
            &serde_json::json!({
                "iss": "https://auth.example.com/realms/tenantA",
                "sub": "user-1",
                "exp": 32503680000u64,
            }),
        );
        let decoded = DecodedToken::decode(&token).expect("decodes");
        assert_eq!(
            decoded.issuer(),
            Some("https://auth.example.com/realms/tenantA")
        );
        assert_eq!(decoded.subject(), Some("user-1"));
        assert_eq!(decoded.realm(), Some("tenantA"));
        assert_eq!(decoded.header().kid.as_deref(), Some("key-1"));
        assert!(!decoded.is_expired());
        assert_eq!(decoded.raw(), token);
    }

    #[test]
    fn decode_rejects_wrong_segment_count() {
        let err = DecodedToken::decode("only.two").unwrap_err();
        assert!(matches!(err, Error::MalformedToken(_)));
        let err = DecodedToken::decode("a.b.c.d").unwrap_err();
        assert!(matches!(err, Error::MalformedToken(_)));
    }

    #[test]
    fn decode_rejects_bad_base64_and_bad_json() {
        let err = DecodedToken::decode("!!!.###.").unwrap_err();
        assert!(matches!(err, Error::MalformedToken(_)));

        let not_json = format!(
            "{}.{}.",
            URL_SAFE_NO_PAD.encode("not json"),
            URL_SAFE_NO_PAD.encode("{}")
        );
        let err = DecodedToken::decode(&not_json).unwrap_err();
        assert!(matches!(err, Error::MalformedToken(_)));
    }

    #[test]
    fn expired_token() {
        let token = encode(
            &serde_json::json!({"alg": "RS256"}),
            &serde_json::json!({"exp": 1u64}),
        );
        let decoded = DecodedToken::decode(&token).expect("decodes");
        assert!(decoded.is_expired());
    }

    #[test]
    fn realm_requires_nonempty_segment() {
        let token = encode(
            &serde_json::json!({}),
            &serde_json::json!({"iss": "https://auth.example.com/realms/"}),
        );
        let decoded = DecodedToken::decode(&token).expect("decodes");
        assert_eq!(decoded.realm(), None);
    }
}
