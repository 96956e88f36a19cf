//! Per-realm authentication adapters and the factory that builds them.
//!
//! A [`RealmAdapter`] is the realm-scoped merge of the shared
//! [`AuthorityConfig`] with realm-specific overrides: the realm name and,
//! when a [`ClientSecretResolver`] is configured, that realm's client
//! secret. Adapters are immutable once built — lifecycle hooks are fixed
//! values injected through the [`AdapterFactory`] builder, never assigned
//! after construction. Building is a pure function of its inputs, so a
//! cache-stampede race that constructs the same realm twice yields
//! functionally equivalent adapters.

use std::sync::Arc;

use crate::config::AuthorityConfig;
use crate::context::Grant;

/// Hook fired when a grant is attached to or removed from a request.
pub type GrantHook = Arc<dyn Fn(&Grant) + Send + Sync>;

/// Hook producing the access-denied response.
pub type AccessDeniedHook = Arc<dyn Fn() -> http::Response<String> + Send + Sync>;

/// Fixed body of the default access-denied response.
pub const ACCESS_DENIED_BODY: &str = "Access Denied";

/// The default denial response: `403` with a fixed plain-text body.
pub(crate) fn default_access_denied() -> http::Response<String> {
    let mut response = http::Response::new(ACCESS_DENIED_BODY.to_string());
    *response.status_mut() = http::StatusCode::FORBIDDEN;
    response
}

/// Lifecycle callbacks shared by every adapter a factory builds.
#[derive(Clone, Default)]
pub(crate) struct AdapterCallbacks {
    pub(crate) authenticated: Option<GrantHook>,
    pub(crate) deauthenticated: Option<GrantHook>,
    pub(crate) access_denied: Option<AccessDeniedHook>,
}

/// Resolves the client secret for a realm.
///
/// Called at adapter construction with the realm name and the deployment's
/// resource (client) identifier. Return `None` for public clients.
/// Implemented for free by closures.
pub trait ClientSecretResolver: Send + Sync {
    /// The secret for `realm`, or `None` when the client is public there.
    fn resolve(&self, realm: &str, resource: &str) -> Option<String>;
}

impl<F> ClientSecretResolver for F
where
    F: Fn(&str, &str) -> Option<String> + Send + Sync,
{
    fn resolve(&self, realm: &str, resource: &str) -> Option<String> {
        self(realm, resource)
    }
}

/// Builds [`RealmAdapter`]s from a base configuration plus realm-specific
/// overrides. Stateless given its inputs.
#[derive(Clone)]
pub struct AdapterFactory {
    base: AuthorityConfig,
    secret_resolver: Option<Arc<dyn ClientSecretResolver>>,
    callbacks: AdapterCallbacks,
}

impl std::fmt::Debug for AdapterFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterFactory")
            .field("resource", &self.base.resource)
            .field("auth_server_url", &self.base.auth_server_url)
            .field("has_secret_resolver", &self.secret_resolver.is_some())
            .finish()
    }
}

impl AdapterFactory {
    /// Create a factory over the shared base configuration.
    pub fn new(base: AuthorityConfig) -> Self {
        Self {
            base,
            secret_resolver: None,
            callbacks: AdapterCallbacks::default(),
        }
    }

    /// Install a per-realm client secret resolver.
    pub fn with_secret_resolver(mut self, resolver: impl ClientSecretResolver + 'static) -> Self {
        self.secret_resolver = Some(Arc::new(resolver));
        self
    }

    /// Install a hook fired after a grant is attached to a request.
    pub fn on_authenticated(mut self, hook: impl Fn(&Grant) + Send + Sync + 'static) -> Self {
        self.callbacks.authenticated = Some(Arc::new(hook));
        self
    }

    /// Install a hook fired when a grant is removed from a request.
    pub fn on_deauthenticated(mut self, hook: impl Fn(&Grant) + Send + Sync + 'static) -> Self {
        self.callbacks.deauthenticated = Some(Arc::new(hook));
        self
    }

    /// Replace the default access-denied response.
    pub fn on_access_denied(
        mut self,
        hook: impl Fn() -> http::Response<String> + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.access_denied = Some(Arc::new(hook));
        self
    }

    /// The base configuration this factory merges from.
    pub fn base_config(&self) -> &AuthorityConfig {
        &self.base
    }

    /// Build the adapter for `realm`.
    ///
    /// Clones the base configuration, sets the realm, and resolves that
    /// realm's client secret through the configured resolver. Repeated
    /// builds for the same realm are functionally equivalent.
    pub fn build(&self, realm: &str) -> RealmAdapter {
        let mut config = self.base.clone();
        config.realm = Some(realm.to_owned());
        if let Some(resolver) = &self.secret_resolver {
            if let Some(secret) = resolver.resolve(realm, &self.base.resource) {
                config.credentials = Some(crate::config::Credentials { secret });
            }
        }
        RealmAdapter {
            realm: realm.to_owned(),
            config,
            callbacks: self.callbacks.clone(),
        }
    }
}

/// A realm-scoped authentication adapter.
///
/// Wraps the configured connection to one realm of the identity provider:
/// the merged configuration, that realm's credentials, and the lifecycle
/// hooks. Created once per realm, cached for the process lifetime, never
/// torn down — it is cheap configuration state, not a live connection.
#[derive(Clone)]
pub struct RealmAdapter {
    realm: String,
    config: AuthorityConfig,
    callbacks: AdapterCallbacks,
}

impl std::fmt::Debug for RealmAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // credentials stay out of logs
        f.debug_struct("RealmAdapter")
            .field("realm", &self.realm)
            .field("resource", &self.config.resource)
            .field("issuer_url", &self.issuer_url())
            .field("has_secret", &self.config.credentials.is_some())
            .finish()
    }
}

impl RealmAdapter {
    /// The realm this adapter serves.
    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// The merged, realm-scoped configuration.
    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    /// This realm's issuer URL.
    pub fn issuer_url(&self) -> String {
        self.config.issuer_url(&self.realm)
    }

    /// This realm's client secret, if resolved.
    pub fn client_secret(&self) -> Option<&str> {
        self.config.client_secret()
    }

    /// Fire the `authenticated` hook.
    pub(crate) fn on_authenticated(&self, grant: &Grant) {
        tracing::debug!(realm = %self.realm, subject = ?grant.subject(), "grant attached");
        if let Some(hook) = &self.callbacks.authenticated {
            hook(grant);
        }
    }

    /// Fire the `deauthenticated` hook.
    pub(crate) fn on_deauthenticated(&self, grant: &Grant) {
        tracing::debug!(realm = %self.realm, subject = ?grant.subject(), "grant removed");
        if let Some(hook) = &self.callbacks.deauthenticated {
            hook(grant);
        }
    }

    /// The access-denied response for this realm: the configured hook's
    /// response, or `403` with a fixed body.
    pub fn access_denied(&self) -> http::Response<String> {
        match &self.callbacks.access_denied {
            Some(hook) => hook(),
            None => default_access_denied(),
        }
    }
}
