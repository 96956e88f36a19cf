//! Per-request authorization context.
//!
//! [`Grant`] is the decoded token attached to the current request by the
//! authentication step; [`AuthContext`] is the carrier the policy
//! evaluator consults: it answers "is this caller authenticated", "does it
//! hold one of these roles", "is it a member of this tenant's realm", and
//! (asynchronously) "does it hold these permissions". Both are created per
//! request, read-only afterward, and discarded when the request completes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::token::DecodedToken;

/// The validated token and derived claims for the current caller.
///
/// Read-only once created. The realm is derived from the token's issuer at
/// construction.
#[derive(Debug, Clone)]
pub struct Grant {
    access_token: DecodedToken,
    realm: Option<String>,
}

impl Grant {
    /// Wrap a decoded access token.
    pub fn new(access_token: DecodedToken) -> Self {
        let realm = access_token.realm().map(str::to_owned);
        Self {
            access_token,
            realm,
        }
    }

    /// The decoded access token.
    pub fn access_token(&self) -> &DecodedToken {
        &self.access_token
    }

    /// The caller's subject identifier.
    pub fn subject(&self) -> Option<&str> {
        self.access_token.subject()
    }

    /// The realm this grant was issued by.
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    /// Whether the underlying token is past its expiry.
    pub fn is_expired(&self) -> bool {
        self.access_token.is_expired()
    }

    /// Realm-level roles (`realm_access.roles`).
    pub fn realm_roles(&self) -> Vec<String> {
        roles_at(self.access_token.claims().get("realm_access"))
    }

    /// Client-level roles for `client` (`resource_access.<client>.roles`).
    pub fn client_roles(&self, client: &str) -> Vec<String> {
        roles_at(
            self.access_token
                .claims()
                .get("resource_access")
                .and_then(|ra| ra.get(client)),
        )
    }

    /// Whether the caller holds `role`.
    ///
    /// Three forms are understood:
    /// - `"admin"` — client role of `default_client`
    /// - `"realm:admin"` — realm role
    /// - `"other-app:admin"` — client role of `other-app`
    pub fn has_role(&self, role: &str, default_client: &str) -> bool {
        match role.split_once(':') {
            Some(("realm", name)) => self.realm_roles().iter().any(|r| r == name),
            Some((client, name)) => self.client_roles(client).iter().any(|r| r == name),
            None => self.client_roles(default_client).iter().any(|r| r == role),
        }
    }
}

fn roles_at(access: Option<&serde_json::Value>) -> Vec<String> {
    access
        .and_then(|v| v.get("roles"))
        .and_then(serde_json::Value::as_array)
        .map(|roles| {
            roles
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Request extension carrying the tenant identifier the application
/// derived for this request (path segment, header, subdomain, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantKey(pub String);

/// Maps a tenant key from the request to the realm that serves it.
///
/// The default mapping is the identity function — tenant keys *are* realm
/// names. Deployments with a naming scheme (`tenant-{key}`, lookup tables)
/// install their own mapper.
pub trait RealmTenantMapper: Send + Sync {
    /// The realm name for `tenant_key`.
    fn realm_for_tenant(&self, tenant_key: &str) -> String;
}

impl<F> RealmTenantMapper for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn realm_for_tenant(&self, tenant_key: &str) -> String {
        self(tenant_key)
    }
}

struct IdentityMapper;

impl RealmTenantMapper for IdentityMapper {
    fn realm_for_tenant(&self, tenant_key: &str) -> String {
        tenant_key.to_owned()
    }
}

/// Decides whether a grant holds the requested permissions.
///
/// Implementations typically call out to the identity provider's policy
/// decision endpoint, so [`check`](Self::check) is async and may suspend
/// the request. The decision is all-or-nothing: return `Ok(true)` only
/// when *every* requested resource is authorized. A transport or provider
/// failure is `Err` — never collapse "could not determine" into a denial.
///
/// No timeout is applied here; callers are expected to bound the request
/// externally.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Whether `grant` is authorized for all of `resources`.
    async fn check(&self, grant: &Grant, resources: &[String]) -> Result<bool>;
}

/// Per-request authorization context consulted by policy evaluation.
///
/// Built from the request's [`Grant`] (if any), the tenant key the
/// application derived for the request, and the deployment's resource
/// (client) identifier used for bare role names.
#[derive(Clone)]
pub struct AuthContext {
    grant: Option<Grant>,
    tenant_key: Option<String>,
    resource: String,
    realms: Arc<dyn RealmTenantMapper>,
    permissions: Option<Arc<dyn PermissionChecker>>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("authenticated", &self.is_authenticated())
            .field("subject", &self.grant.as_ref().and_then(Grant::subject))
            .field("tenant_key", &self.tenant_key)
            .field("resource", &self.resource)
            .finish()
    }
}

impl AuthContext {
    /// Create an anonymous context for the given resource (client) id.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            grant: None,
            tenant_key: None,
            resource: resource.into(),
            realms: Arc::new(IdentityMapper),
            permissions: None,
        }
    }

    /// Rebuild a context from a request whose extensions were populated by
    /// the protection middleware ([`Grant`], [`TenantKey`]).
    pub fn from_request<B>(request: &http::Request<B>, resource: impl Into<String>) -> Self {
        let mut ctx = Self::new(resource);
        if let Some(grant) = request.extensions().get::<Grant>() {
            ctx.grant = Some(grant.clone());
        }
        if let Some(tenant) = request.extensions().get::<TenantKey>() {
            ctx.tenant_key = Some(tenant.0.clone());
        }
        ctx
    }

    /// Attach a grant.
    pub fn with_grant(mut self, grant: Grant) -> Self {
        self.grant = Some(grant);
        self
    }

    /// Attach the request's tenant key.
    pub fn with_tenant_key(mut self, tenant_key: impl Into<String>) -> Self {
        self.tenant_key = Some(tenant_key.into());
        self
    }

    /// Replace the default identity tenant → realm mapping.
    pub fn with_realm_mapper(mut self, mapper: impl RealmTenantMapper + 'static) -> Self {
        self.realms = Arc::new(mapper);
        self
    }

    /// Install the permission checker used by
    /// [`has_permission`](Self::has_permission).
    pub fn with_permission_checker(mut self, checker: impl PermissionChecker + 'static) -> Self {
        self.permissions = Some(Arc::new(checker));
        self
    }

    /// The attached grant, if any.
    pub fn grant(&self) -> Option<&Grant> {
        self.grant.as_ref()
    }

    /// The tenant key derived from the request, if any.
    pub fn tenant_key(&self) -> Option<&str> {
        self.tenant_key.as_deref()
    }

    /// Whether a non-expired grant is attached.
    pub fn is_authenticated(&self) -> bool {
        self.grant.as_ref().is_some_and(|g| !g.is_expired())
    }

    /// Whether the caller is a member of the realm serving `tenant_key`.
    pub fn tenant(&self, tenant_key: &str) -> bool {
        let realm = self.realms.realm_for_tenant(tenant_key);
        self.grant
            .as_ref()
            .and_then(Grant::realm)
            .is_some_and(|r| r == realm)
    }

    /// Whether the caller holds at least one of `roles` (OR semantics).
    pub fn has_role(&self, roles: &[String]) -> bool {
        let Some(grant) = &self.grant else {
            return false;
        };
        roles.iter().any(|role| grant.has_role(role, &self.resource))
    }

    /// Whether the caller is authorized for all of `resources`
    /// (AND semantics). May suspend on a remote decision call.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] when no permission checker is installed;
    /// checker failures propagate unchanged, distinct from an `Ok(false)`
    /// denial.
    pub async fn has_permission(&self, resources: &[String]) -> Result<bool> {
        let Some(grant) = &self.grant else {
            return Ok(false);
        };
        let Some(checker) = &self.permissions else {
            return Err(Error::Configuration(
                "no permission checker configured for this context".to_string(),
            ));
        };
        checker.check(grant, resources).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::UnsignedToken;

    fn grant_for(realm: &str) -> Grant {
        UnsignedToken::new("user-1")
            .issuer(format!("https://auth.example.com/realms/{realm}"))
            .realm_roles(["auditor"])
            .client_roles("my-service", ["admin"])
            .client_roles("other-app", ["viewer"])
            .into_grant()
    }

    #[test]
    fn role_forms() {
        let grant = grant_for("tenantA");
        assert!(grant.has_role("admin", "my-service"));
        assert!(grant.has_role("realm:auditor", "my-service"));
        assert!(grant.has_role("other-app:viewer", "my-service"));
        assert!(!grant.has_role("viewer", "my-service"));
        assert!(!grant.has_role("realm:admin", "my-service"));
    }

    #[test]
    fn tenant_membership_uses_identity_mapping_by_default() {
        let ctx = AuthContext::new("my-service").with_grant(grant_for("tenantA"));
        assert!(ctx.tenant("tenantA"));
        assert!(!ctx.tenant("tenantB"));
    }

    #[test]
    fn tenant_membership_with_custom_mapper() {
        let ctx = AuthContext::new("my-service")
            .with_grant(grant_for("realm-acme"))
            .with_realm_mapper(|tenant: &str| format!("realm-{tenant}"));
        assert!(ctx.tenant("acme"));
        assert!(!ctx.tenant("other"));
    }

    #[test]
    fn expired_grant_is_not_authenticated() {
        let grant = UnsignedToken::new("user-1")
            .issuer("https://auth.example.com/realms/tenantA")
            .expires_at(1)
            .into_grant();
        let ctx = AuthContext::new("my-service").with_grant(grant);
        assert!(!ctx.is_authenticated());
    }

    #[test]
    fn anonymous_context() {
        let ctx = AuthContext::new("my-service");
        assert!(!ctx.is_authenticated());
        assert!(!ctx.has_role(&["admin".to_string()]));
        assert!(!ctx.tenant("tenantA"));
    }

    #[tokio::test]
    async fn has_permission_without_checker_is_a_configuration_error() {
        let ctx = AuthContext::new("my-service").with_grant(grant_for("tenantA"));
        let err = ctx
            .has_permission(&["Article:view".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn extensions_round_trip() {
        let mut request = http::Request::new(());
        request.extensions_mut().insert(grant_for("tenantA"));
        request
            .extensions_mut()
            .insert(TenantKey("tenantA".to_string()));

        let ctx = AuthContext::from_request(&request, "my-service");
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.tenant_key(), Some("tenantA"));
    }
}
