//! Multi-realm authentication and authorization layer for multi-tenant
//! services.
//!
//! `realmguard` sits between HTTP-level authentication middleware and a
//! field-resolution pipeline (a query executor, an RPC dispatcher). For
//! every inbound request it:
//!
//! 1. **Resolves the realm** the request belongs to ([`RealmResolver`]) —
//!    preferring the issuer claim of a presented bearer token, falling
//!    back to an application-supplied [`RealmSource`];
//! 2. **Obtains the realm's adapter** ([`RealmAdapterCache`]) — built
//!    lazily once per realm from the shared [`AuthorityConfig`] plus
//!    realm-specific overrides, then cached for the process lifetime;
//! 3. **Authenticates the caller** through the pluggable
//!    [`Authenticator`] seam, attaching a [`Grant`] to the request;
//! 4. **Enforces declarative policies** ([`policy`]) — authenticated-only,
//!    role membership, permission grants, tenant membership — before a
//!    protected operation runs.
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//! use realmguard::{
//!     policy, AdapterFactory, AuthContext, AuthorityConfig, ProtectionMiddleware,
//!     RealmAdapterCache, RealmResolver,
//! };
//! use realmguard::mock::MockAuthenticator;
//!
//! # async fn demo() -> realmguard::Result<()> {
//! // Shared base configuration, supplied once at process start.
//! let base = AuthorityConfig::new("https://auth.example.com", "my-service");
//!
//! // Per-realm adapters: base config + realm name + per-realm secret.
//! let factory = AdapterFactory::new(base)
//!     .with_secret_resolver(|realm: &str, _resource: &str| {
//!         Some(format!("secret-for-{realm}"))
//!     });
//! let cache = Arc::new(RealmAdapterCache::new(factory));
//!
//! // Realm resolution: token issuer first, then a request-derived fallback.
//! let resolver = RealmResolver::new("https://auth.example.com")
//!     .with_fallback(|request: &realmguard::RequestContext<'_>| {
//!         request
//!             .headers
//!             .get("x-tenant")
//!             .and_then(|v| v.to_str().ok())
//!             .map(str::to_owned)
//!     });
//!
//! // The request gate. Swap MockAuthenticator for a real verifier.
//! let gate = ProtectionMiddleware::new(resolver, cache, MockAuthenticator::decode_bearer());
//!
//! let mut request = http::Request::builder()
//!     .uri("https://svc.example.com/query")
//!     .body(())
//!     .expect("request");
//! if gate.protect(&mut request).await.is_allowed() {
//!     // Downstream, policies consult the per-request context.
//!     let ctx = AuthContext::from_request(&request, "my-service");
//!     let admins_only = policy::has_role(["admin"])?;
//!     admins_only
//!         .protect(&ctx, || async { Ok(()) })
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Control flow
//!
//! ```text
//! request
//!    │
//!    ▼
//! RealmResolver ──(token issuer | fallback)──▶ realm
//!    │                                           │
//!    ▼                                           ▼
//! RealmAdapterCache ──(miss: AdapterFactory)──▶ RealmAdapter
//!    │                                           │
//!    ▼                                           ▼
//! ProtectionMiddleware ──(Authenticator)──▶ Grant in request extensions
//!    │
//!    ▼
//! policy::{auth, has_role, has_permission, tenant} over AuthContext
//! ```
//!
//! # Feature flags
//!
//! - `jwt-auth` — [`JwtAuthenticator`](authenticate::JwtAuthenticator):
//!   offline RS256 verification against the adapter's configured realm
//!   public key (via `jsonwebtoken`).
//! - `http-client` — [`UmaPermissionChecker`](uma::UmaPermissionChecker):
//!   remote permission decisions against the realm's token endpoint
//!   (via `reqwest`).
//! - `full` — both of the above.
//!
//! # Trust model
//!
//! Realm resolution trusts the token's issuer *only for routing*: a forged
//! issuer can misroute a request to the wrong realm's adapter, which then
//! rejects the token on signature grounds. Structural token decoding
//! ([`DecodedToken`]) never verifies signatures — that is the
//! [`Authenticator`]'s job.

#![warn(missing_docs)]
#![warn(clippy::unwrap_used)]

pub mod adapter;
pub mod authenticate;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod middleware;
pub mod mock;
pub mod policy;
pub mod realm;
pub mod token;

#[cfg(feature = "http-client")]
pub mod uma;

pub use adapter::{AdapterFactory, ClientSecretResolver, RealmAdapter, ACCESS_DENIED_BODY};
pub use authenticate::Authenticator;
#[cfg(feature = "jwt-auth")]
pub use authenticate::JwtAuthenticator;
pub use cache::RealmAdapterCache;
pub use config::{AuthorityConfig, Credentials};
pub use context::{AuthContext, Grant, PermissionChecker, RealmTenantMapper, TenantKey};
pub use error::{Error, ErrorKind, Result};
pub use middleware::{GateDecision, ProtectionMiddleware, ResolvedRealm};
pub use policy::{Policy, MASTER_REALM};
pub use realm::{RealmResolver, RealmSource, RequestContext};
pub use token::{bearer_token, DecodedToken, TokenHeader};
#[cfg(feature = "http-client")]
pub use uma::UmaPermissionChecker;
