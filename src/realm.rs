//! Realm resolution: which tenant does this request belong to?
//!
//! Resolution prefers the issuer claim inside a presented bearer token —
//! when the caller already holds a token from the configured authority,
//! the realm is read straight out of it, with no extra round-trip. This is
//! a routing heuristic, not a security check: a forged issuer can at worst
//! route the request to the wrong realm's adapter, which then rejects the
//! token on signature grounds. Requests without a usable token fall back
//! to an application-supplied [`RealmSource`].

use std::sync::Arc;

use crate::token::{bearer_token, DecodedToken};

/// Borrowed, transport-neutral view of an inbound request.
///
/// Carries just what realm resolution and authentication need: the headers
/// and the request URI.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Request headers.
    pub headers: &'a http::HeaderMap,
    /// Request URI.
    pub uri: &'a http::Uri,
}

impl<'a> RequestContext<'a> {
    /// Build a view from headers and URI.
    pub fn new(headers: &'a http::HeaderMap, uri: &'a http::Uri) -> Self {
        Self { headers, uri }
    }

    /// Build a view over an `http::Request`.
    pub fn from_request<B>(request: &'a http::Request<B>) -> Self {
        Self {
            headers: request.headers(),
            uri: request.uri(),
        }
    }

    /// The bearer token carried by this request, if any.
    pub fn bearer_token(&self) -> Option<String> {
        bearer_token(self.headers)
    }
}

/// Application-supplied fallback for deriving a realm from the request
/// itself — subdomain, header, path prefix, whatever the deployment uses.
///
/// Required whenever tokens won't reliably carry an authority-matching
/// issuer. Implemented for free by closures:
///
/// ```
/// use realmguard::RealmSource;
///
/// let by_header = |request: &realmguard::RequestContext<'_>| {
///     request
///         .headers
///         .get("x-tenant")
///         .and_then(|v| v.to_str().ok())
///         .map(str::to_owned)
/// };
/// let _source: &dyn RealmSource = &by_header;
/// ```
pub trait RealmSource: Send + Sync {
    /// Derive a realm identifier from the request, or `None` when this
    /// request cannot be mapped to a realm.
    fn realm_for_request(&self, request: &RequestContext<'_>) -> Option<String>;
}

impl<F> RealmSource for F
where
    F: Fn(&RequestContext<'_>) -> Option<String> + Send + Sync,
{
    fn realm_for_request(&self, request: &RequestContext<'_>) -> Option<String> {
        self(request)
    }
}

/// Resolves the realm a request belongs to.
///
/// Token-first: if the request carries a structurally valid bearer token
/// whose issuer starts with the configured authority URL, the realm is the
/// final path segment of that issuer. Otherwise the fallback
/// [`RealmSource`] decides. Decode failures degrade gracefully to the
/// fallback path and are logged at debug level.
#[derive(Clone)]
pub struct RealmResolver {
    authority_url: String,
    fallback: Option<Arc<dyn RealmSource>>,
}

impl std::fmt::Debug for RealmResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmResolver")
            .field("authority_url", &self.authority_url)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl RealmResolver {
    /// Create a resolver trusting issuers under `authority_url`.
    pub fn new(authority_url: impl Into<String>) -> Self {
        Self {
            authority_url: authority_url.into(),
            fallback: None,
        }
    }

    /// Install the request-derived fallback source.
    pub fn with_fallback(mut self, source: impl RealmSource + 'static) -> Self {
        self.fallback = Some(Arc::new(source));
        self
    }

    /// The authority URL issuers are matched against.
    pub fn authority_url(&self) -> &str {
        &self.authority_url
    }

    /// Resolve the realm for a request, or `None` when neither the token
    /// nor the fallback yields one.
    pub fn resolve(&self, request: &RequestContext<'_>) -> Option<String> {
        if let Some(token) = request.bearer_token() {
            match DecodedToken::decode(&token) {
                Ok(decoded) => {
                    if let Some(realm) = self.realm_from_token(&decoded) {
                        return Some(realm.to_owned());
                    }
                },
                Err(e) => {
                    tracing::debug!(
                        error = %e,
                        "bearer token failed structural decode; falling back to request-derived realm"
                    );
                },
            }
        }
        self.fallback
            .as_ref()
            .and_then(|source| source.realm_for_request(request))
    }

    /// The realm named by a token's issuer, when that issuer belongs to the
    /// configured authority.
    pub fn realm_from_token<'t>(&self, token: &'t DecodedToken) -> Option<&'t str> {
        token
            .issuer()
            .filter(|iss| iss.starts_with(&self.authority_url))?;
        token.realm()
    }
}
