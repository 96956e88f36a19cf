//! The request-level protection gate.
//!
//! [`ProtectionMiddleware`] ties the engine together per request: resolve
//! the realm, obtain (or lazily build) that realm's adapter, run the
//! [`Authenticator`], and attach the resulting [`Grant`] to the request's
//! extensions. Two passes are offered, mirroring the two ways the layer is
//! installed:
//!
//! - [`attach`](ProtectionMiddleware::attach) — non-gating: unresolved or
//!   unauthenticated requests continue anonymously; downstream policies
//!   decide.
//! - [`protect`](ProtectionMiddleware::protect) — gating: unresolved or
//!   unauthenticated requests are short-circuited with the fixed
//!   access-denied response before the rest of the pipeline runs.
//!
//! Per request the gate walks `Unresolved → RealmKnown → Authenticated`,
//! or stops at `Denied`.

use std::sync::Arc;

use crate::adapter::{default_access_denied, AccessDeniedHook};
use crate::authenticate::Authenticator;
use crate::cache::RealmAdapterCache;
use crate::context::Grant;
use crate::realm::{RealmResolver, RequestContext};

/// Request extension naming the realm the request was resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRealm(pub String);

/// Outcome of the gating pass.
#[derive(Debug)]
pub enum GateDecision {
    /// The request is authenticated; a [`Grant`] is attached.
    Allow,
    /// The request was short-circuited with this response.
    Deny(http::Response<String>),
}

impl GateDecision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Request-level gate in front of the field-resolution pipeline.
pub struct ProtectionMiddleware {
    resolver: RealmResolver,
    cache: Arc<RealmAdapterCache>,
    authenticator: Arc<dyn Authenticator>,
    access_denied: Option<AccessDeniedHook>,
}

impl std::fmt::Debug for ProtectionMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionMiddleware")
            .field("resolver", &self.resolver)
            .field("cache", &self.cache)
            .finish()
    }
}

impl ProtectionMiddleware {
    /// Assemble the gate from its collaborators.
    pub fn new(
        resolver: RealmResolver,
        cache: Arc<RealmAdapterCache>,
        authenticator: impl Authenticator + 'static,
    ) -> Self {
        Self {
            resolver,
            cache,
            authenticator: Arc::new(authenticator),
            access_denied: None,
        }
    }

    /// Replace the denial response used when no realm can be resolved.
    ///
    /// Denials for *resolved* realms use the adapter's own hook (see
    /// [`AdapterFactory::on_access_denied`](crate::AdapterFactory::on_access_denied)).
    pub fn on_access_denied(
        mut self,
        hook: impl Fn() -> http::Response<String> + Send + Sync + 'static,
    ) -> Self {
        self.access_denied = Some(Arc::new(hook));
        self
    }

    /// The adapter cache this gate consults.
    pub fn cache(&self) -> &Arc<RealmAdapterCache> {
        &self.cache
    }

    /// Non-gating pass: resolve the realm and attach a grant when the
    /// request authenticates; otherwise leave the request untouched.
    ///
    /// On success the request's extensions carry [`ResolvedRealm`] and,
    /// when authentication succeeded, a [`Grant`]. Authentication errors
    /// are logged and leave the request anonymous — downstream policies
    /// will reject it with `Unauthenticated` if the operation requires
    /// a caller.
    pub async fn attach<B>(&self, request: &mut http::Request<B>) {
        let realm = self.resolver.resolve(&RequestContext::from_request(request));
        let Some(realm) = realm else {
            return;
        };
        let adapter = self.cache.get_or_create(&realm);
        let outcome = self
            .authenticator
            .authenticate(&adapter, &RequestContext::from_request(request))
            .await;

        request.extensions_mut().insert(ResolvedRealm(realm.clone()));
        match outcome {
            Ok(Some(grant)) => {
                adapter.on_authenticated(&grant);
                request.extensions_mut().insert(grant);
            },
            Ok(None) => {},
            Err(e) => {
                tracing::warn!(
                    realm = %realm,
                    error = %e,
                    "authentication failed; request continues unauthenticated"
                );
            },
        }
    }

    /// Gating pass: deny the request unless it resolves to a realm and
    /// authenticates there.
    pub async fn protect<B>(&self, request: &mut http::Request<B>) -> GateDecision {
        let realm = self.resolver.resolve(&RequestContext::from_request(request));
        let Some(realm) = realm else {
            tracing::warn!(uri = %request.uri(), "no realm resolved; denying request");
            return GateDecision::Deny(self.unresolved_denial());
        };
        let adapter = self.cache.get_or_create(&realm);
        let outcome = self
            .authenticator
            .authenticate(&adapter, &RequestContext::from_request(request))
            .await;

        match outcome {
            Ok(Some(grant)) => {
                adapter.on_authenticated(&grant);
                request.extensions_mut().insert(ResolvedRealm(realm));
                request.extensions_mut().insert(grant);
                GateDecision::Allow
            },
            Ok(None) => {
                tracing::warn!(realm = %realm, "unauthenticated request denied");
                GateDecision::Deny(adapter.access_denied())
            },
            Err(e) => {
                tracing::warn!(realm = %realm, error = %e, "authentication failed; denying request");
                GateDecision::Deny(adapter.access_denied())
            },
        }
    }

    /// Remove the request's grant and fire the realm's `deauthenticated`
    /// hook. A no-op for anonymous requests.
    pub fn deauthenticate<B>(&self, request: &mut http::Request<B>) {
        let Some(grant) = request.extensions_mut().remove::<Grant>() else {
            return;
        };
        if let Some(adapter) = grant.realm().and_then(|realm| self.cache.get(realm)) {
            adapter.on_deauthenticated(&grant);
        }
    }

    fn unresolved_denial(&self) -> http::Response<String> {
        match &self.access_denied {
            Some(hook) => hook(),
            None => default_access_denied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterFactory, ACCESS_DENIED_BODY};
    use crate::config::AuthorityConfig;
    use crate::mock::MockAuthenticator;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const AUTHORITY: &str = "https://auth.example.com";

    fn middleware_with(factory: AdapterFactory) -> ProtectionMiddleware {
        ProtectionMiddleware::new(
            RealmResolver::new(AUTHORITY),
            Arc::new(RealmAdapterCache::new(factory)),
            MockAuthenticator::decode_bearer(),
        )
    }

    fn request_for(realm: Option<&str>) -> http::Request<()> {
        let mut builder = http::Request::builder().uri("https://svc.example.com/query");
        if let Some(realm) = realm {
            let token = crate::mock::UnsignedToken::new("user-1")
                .issuer(format!("{AUTHORITY}/realms/{realm}"))
                .encode();
            builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(()).expect("request")
    }

    #[tokio::test]
    async fn protect_attaches_grant_for_resolved_realm() {
        let base = AuthorityConfig::new(AUTHORITY, "svc");
        let middleware = middleware_with(AdapterFactory::new(base));
        let mut request = request_for(Some("tenantA"));

        let decision = middleware.protect(&mut request).await;
        assert!(decision.is_allowed());
        assert_eq!(
            request.extensions().get::<ResolvedRealm>(),
            Some(&ResolvedRealm("tenantA".to_string()))
        );
        assert!(request.extensions().get::<Grant>().is_some());
        assert!(middleware.cache().get("tenantA").is_some());
    }

    #[tokio::test]
    async fn protect_denies_unresolved_realm_with_fixed_body() {
        let base = AuthorityConfig::new(AUTHORITY, "svc");
        let middleware = middleware_with(AdapterFactory::new(base));
        let mut request = request_for(None);

        let decision = middleware.protect(&mut request).await;
        let GateDecision::Deny(response) = decision else {
            panic!("expected denial");
        };
        assert_eq!(response.status(), http::StatusCode::FORBIDDEN);
        assert_eq!(response.body(), ACCESS_DENIED_BODY);
        assert!(middleware.cache().is_empty());
    }

    #[tokio::test]
    async fn attach_passes_through_unresolved_requests() {
        let base = AuthorityConfig::new(AUTHORITY, "svc");
        let middleware = middleware_with(AdapterFactory::new(base));
        let mut request = request_for(None);

        middleware.attach(&mut request).await;
        assert!(request.extensions().get::<ResolvedRealm>().is_none());
        assert!(request.extensions().get::<Grant>().is_none());
    }

    #[tokio::test]
    async fn deauthenticate_fires_adapter_hook() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let base = AuthorityConfig::new(AUTHORITY, "svc");
        let factory = AdapterFactory::new(base).on_deauthenticated(move |_grant| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let middleware = middleware_with(factory);

        let mut request = request_for(Some("tenantA"));
        assert!(middleware.protect(&mut request).await.is_allowed());

        middleware.deauthenticate(&mut request);
        assert!(request.extensions().get::<Grant>().is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // anonymous request: no-op
        middleware.deauthenticate(&mut request);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
