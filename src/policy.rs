//! Declarative authorization policies over protected operations.
//!
//! Four composable policies gate protected operations: [`auth`] (any
//! authenticated caller), [`has_role`] (at least one of the listed roles),
//! [`has_permission`] (all of the listed resources, possibly via a remote
//! decision call), and [`tenant`] (master-realm and/or context-tenant
//! membership). Each evaluates against the request's
//! [`AuthContext`](crate::AuthContext) and either lets the wrapped
//! operation run or fails with a typed error; a failed policy aborts the
//! operation before it starts.
//!
//! Misconfiguration is rejected when the policy is *built* — a schema or
//! router wiring an invalid policy fails at startup, not per request. The
//! same applies to [`Policy::from_directive`], which validates the raw
//! annotation arguments a schema layer hands over.
//!
//! ```
//! use realmguard::{policy, AuthContext};
//!
//! # async fn demo(ctx: AuthContext) -> realmguard::Result<()> {
//! let admins_only = policy::has_role(["admin"])?;
//! let report = admins_only
//!     .protect(&ctx, || async { Ok("report contents".to_string()) })
//!     .await?;
//! # let _ = report;
//! # Ok(())
//! # }
//! ```

use std::future::Future;

use crate::context::AuthContext;
use crate::error::{Error, Result};

/// The fixed name of the master realm.
pub const MASTER_REALM: &str = "master";

/// A declarative authorization policy.
///
/// Construct through [`auth`], [`has_role`], [`has_permission`],
/// [`tenant`], or [`Policy::from_directive`]; evaluate with
/// [`evaluate`](Policy::evaluate) or wrap an operation with
/// [`protect`](Policy::protect).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Policy {
    /// Requires an authenticated caller; no further constraint.
    Auth,
    /// Requires at least one of the listed roles (OR semantics).
    HasRole(Vec<String>),
    /// Requires all of the listed resources (AND semantics); evaluation
    /// may suspend on a remote decision call.
    HasPermission(Vec<String>),
    /// Requires master-realm and/or context-tenant membership.
    Tenant {
        /// Accept members of the master realm.
        master: bool,
        /// Accept members of the realm named by the request's tenant key.
        realm_from_context: bool,
    },
}

/// The authentication-only policy.
pub fn auth() -> Policy {
    Policy::Auth
}

/// A role-membership policy: the caller must hold at least one of `roles`.
///
/// Role names follow the forms understood by
/// [`Grant::has_role`](crate::Grant::has_role): bare client roles,
/// `realm:` realm roles, and `client:role` roles of another client.
///
/// # Errors
///
/// [`Error::Configuration`] when `roles` is empty.
pub fn has_role<I, S>(roles: I) -> Result<Policy>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
    if roles.is_empty() {
        return Err(Error::Configuration(
            "hasRole requires at least one role".to_string(),
        ));
    }
    Ok(Policy::HasRole(roles))
}

/// A permission-grant policy: the caller must be authorized for *all* of
/// `resources`.
///
/// # Errors
///
/// [`Error::Configuration`] when `resources` is empty.
pub fn has_permission<I, S>(resources: I) -> Result<Policy>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let resources: Vec<String> = resources.into_iter().map(Into::into).collect();
    if resources.is_empty() {
        return Err(Error::Configuration(
            "hasPermission requires at least one resource".to_string(),
        ));
    }
    Ok(Policy::HasPermission(resources))
}

/// A tenant-membership policy.
///
/// | `master` | `realm_from_context` | passes when |
/// |---|---|---|
/// | `true` | `false` | caller is a member of the master realm |
/// | `false` | `true` | a tenant key is present and the caller is a member of that tenant's realm |
/// | `true` | `true` | either of the above |
///
/// # Errors
///
/// [`Error::Configuration`] when both flags are `false` — there is nothing
/// to check, which is a wiring mistake, rejected at build time.
pub fn tenant(master: bool, realm_from_context: bool) -> Result<Policy> {
    if !master && !realm_from_context {
        return Err(Error::Configuration(
            "tenant policy requires at least one of master or realm_from_context".to_string(),
        ));
    }
    Ok(Policy::Tenant {
        master,
        realm_from_context,
    })
}

impl Policy {
    /// Resolve a named policy annotation with raw arguments, validating the
    /// argument shape before any request is served.
    ///
    /// Recognized names: `auth` (no arguments), `hasRole` (exactly a `role`
    /// argument: string or sequence), `hasPermission` (exactly a
    /// `resources` argument: string or sequence), `tenant` (optional bool
    /// `master`, default `false`; optional bool `realmFromContext`, default
    /// `true`).
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] on unknown names or any argument-shape
    /// violation: extra keys, wrong key names, or values that are neither
    /// strings nor sequences of string-coercible scalars.
    pub fn from_directive(name: &str, args: &serde_json::Value) -> Result<Self> {
        match name {
            "auth" => {
                ensure_no_args(args, "auth")?;
                Ok(Policy::Auth)
            },
            "hasRole" => has_role(parse_string_list_arg(args, "role", "hasRole")?),
            "hasPermission" => {
                has_permission(parse_string_list_arg(args, "resources", "hasPermission")?)
            },
            "tenant" => {
                let (master, realm_from_context) = parse_tenant_args(args)?;
                tenant(master, realm_from_context)
            },
            other => Err(Error::Configuration(format!(
                "unknown policy directive '{other}'"
            ))),
        }
    }

    /// Evaluate this policy against a request context.
    ///
    /// Every policy first requires an authenticated caller.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthenticated`] when no valid grant is attached.
    /// - [`Error::Forbidden`] naming the unmet requirement.
    /// - [`Error::PermissionCheck`] (or whatever the checker raised) when a
    ///   permission decision could not be obtained.
    pub async fn evaluate(&self, ctx: &AuthContext) -> Result<()> {
        if !ctx.is_authenticated() {
            return Err(Error::Unauthenticated);
        }
        match self {
            Self::Auth => Ok(()),
            Self::HasRole(roles) => {
                if ctx.has_role(roles) {
                    Ok(())
                } else {
                    Err(Error::forbidden(format!(
                        "must have one of the following roles: [{}]",
                        roles.join(", ")
                    )))
                }
            },
            Self::HasPermission(resources) => {
                if ctx.has_permission(resources).await? {
                    Ok(())
                } else {
                    Err(Error::forbidden(format!(
                        "must have the following permissions: [{}]",
                        resources.join(", ")
                    )))
                }
            },
            Self::Tenant {
                master,
                realm_from_context,
            } => evaluate_tenant(ctx, *master, *realm_from_context),
        }
    }

    /// Evaluate this policy, then run `operation`.
    ///
    /// The operation never starts when the policy fails; its own errors
    /// propagate unchanged.
    pub async fn protect<T, F, Fut>(&self, ctx: &AuthContext, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.evaluate(ctx).await?;
        operation().await
    }
}

fn evaluate_tenant(ctx: &AuthContext, master: bool, realm_from_context: bool) -> Result<()> {
    match (master, realm_from_context) {
        (true, false) => {
            if ctx.tenant(MASTER_REALM) {
                Ok(())
            } else {
                Err(Error::forbidden(
                    "user does not belong to the master realm",
                ))
            }
        },
        (false, true) => {
            let Some(tenant_key) = ctx.tenant_key() else {
                return Err(Error::forbidden("tenant path is not defined in request"));
            };
            if ctx.tenant(tenant_key) {
                Ok(())
            } else {
                Err(Error::forbidden("user does not belong to the tenant realm"))
            }
        },
        (true, true) => {
            if ctx.tenant(MASTER_REALM)
                || ctx.tenant_key().is_some_and(|key| ctx.tenant(key))
            {
                Ok(())
            } else {
                Err(Error::forbidden(
                    "user does not belong to the master or tenant realm",
                ))
            }
        },
        // constructors reject this arm; kept for contexts built by hand
        (false, false) => Err(Error::Configuration(
            "tenant policy requires at least one of master or realm_from_context".to_string(),
        )),
    }
}

fn ensure_no_args(args: &serde_json::Value, directive: &str) -> Result<()> {
    let empty = match args {
        serde_json::Value::Null => true,
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "invalid {directive} args: no arguments expected"
        )))
    }
}

fn parse_string_list_arg(
    args: &serde_json::Value,
    key: &str,
    directive: &str,
) -> Result<Vec<String>> {
    let Some(map) = args.as_object() else {
        return Err(Error::Configuration(format!(
            "invalid {directive} args: must contain only a '{key}' argument"
        )));
    };
    if map.len() != 1 || !map.contains_key(key) {
        return Err(Error::Configuration(format!(
            "invalid {directive} args: must contain only a '{key}' argument"
        )));
    }
    match &map[key] {
        serde_json::Value::String(value) => Ok(vec![value.clone()]),
        serde_json::Value::Array(items) => {
            let values = items
                .iter()
                .map(|item| coerce_to_string(item, key, directive))
                .collect::<Result<Vec<String>>>()?;
            if values.is_empty() {
                return Err(Error::Configuration(format!(
                    "invalid {directive} args: {key} must not be empty"
                )));
            }
            Ok(values)
        },
        _ => Err(Error::Configuration(format!(
            "invalid {directive} args: {key} must be a string or an array of strings"
        ))),
    }
}

fn coerce_to_string(value: &serde_json::Value, key: &str, directive: &str) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::Configuration(format!(
            "invalid {directive} args: {key} must be a string or an array of strings"
        ))),
    }
}

fn parse_tenant_args(args: &serde_json::Value) -> Result<(bool, bool)> {
    let map = match args {
        serde_json::Value::Null => return Ok((false, true)),
        serde_json::Value::Object(map) => map,
        _ => {
            return Err(Error::Configuration(
                "invalid tenant args: expected an object".to_string(),
            ))
        },
    };
    let mut master = false;
    let mut realm_from_context = true;
    for (key, value) in map {
        let Some(flag) = value.as_bool() else {
            return Err(Error::Configuration(format!(
                "invalid tenant args: '{key}' must be a boolean"
            )));
        };
        match key.as_str() {
            "master" => master = flag,
            "realmFromContext" => realm_from_context = flag,
            other => {
                return Err(Error::Configuration(format!(
                    "invalid tenant args: unknown argument '{other}'"
                )))
            },
        }
    }
    Ok((master, realm_from_context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mock::UnsignedToken;
    use serde_json::json;

    fn authenticated(realm: &str) -> AuthContext {
        AuthContext::new("my-service").with_grant(
            UnsignedToken::new("user-1")
                .issuer(format!("https://auth.example.com/realms/{realm}"))
                .client_roles("my-service", ["admin"])
                .into_grant(),
        )
    }

    #[test]
    fn tenant_constructor_rejects_both_flags_false() {
        let err = tenant(false, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn has_role_rejects_empty() {
        let err = has_role(Vec::<String>::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn directive_role_argument_shapes() {
        let policy = Policy::from_directive("hasRole", &json!({"role": "admin"})).expect("single");
        assert_eq!(policy, Policy::HasRole(vec!["admin".to_string()]));

        let policy =
            Policy::from_directive("hasRole", &json!({"role": ["a", "b"]})).expect("array");
        assert_eq!(
            policy,
            Policy::HasRole(vec!["a".to_string(), "b".to_string()])
        );

        // scalar elements are coerced the way the annotation layer would
        let policy = Policy::from_directive("hasRole", &json!({"role": ["a", 5]})).expect("coerce");
        assert_eq!(
            policy,
            Policy::HasRole(vec!["a".to_string(), "5".to_string()])
        );
    }

    #[test]
    fn directive_rejects_bad_shapes_at_binding_time() {
        for args in [
            json!({"role": "x", "extra": 1}),
            json!({"roles": "x"}),
            json!({"role": 5}),
            json!({"role": {"nested": true}}),
            json!({}),
            json!(null),
        ] {
            let err = Policy::from_directive("hasRole", &args).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Configuration, "args: {args}");
        }

        let err =
            Policy::from_directive("hasPermission", &json!({"role": "Article:view"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = Policy::from_directive("frobnicate", &json!(null)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn directive_tenant_defaults() {
        let policy = Policy::from_directive("tenant", &json!(null)).expect("defaults");
        assert_eq!(
            policy,
            Policy::Tenant {
                master: false,
                realm_from_context: true
            }
        );

        let err = Policy::from_directive(
            "tenant",
            &json!({"master": false, "realmFromContext": false}),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = Policy::from_directive("tenant", &json!({"master": "yes"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn unauthenticated_fails_before_any_check() {
        let ctx = AuthContext::new("my-service");
        for policy in [
            auth(),
            has_role(["admin"]).expect("policy"),
            tenant(true, true).expect("policy"),
        ] {
            let err = policy.evaluate(&ctx).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Unauthenticated);
        }
    }

    #[tokio::test]
    async fn has_role_is_or_semantics() {
        let ctx = authenticated("tenantA");
        let policy = has_role(["missing", "admin"]).expect("policy");
        policy.evaluate(&ctx).await.expect("one role suffices");

        let policy = has_role(["missing", "also-missing"]).expect("policy");
        let err = policy.evaluate(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert!(err.to_string().contains("missing, also-missing"));
    }

    #[tokio::test]
    async fn tenant_decision_table() {
        // member of tenantA, request scoped to tenantA
        let ctx = authenticated("tenantA").with_tenant_key("tenantA");
        tenant(false, true)
            .expect("policy")
            .evaluate(&ctx)
            .await
            .expect("member of context tenant");

        // master member passes master-only and master-or-context
        let master_ctx = authenticated("master");
        tenant(true, false)
            .expect("policy")
            .evaluate(&master_ctx)
            .await
            .expect("master member");
        tenant(true, true)
            .expect("policy")
            .evaluate(&master_ctx)
            .await
            .expect("master member passes without a tenant key");

        // non-master member fails master-only
        let err = tenant(true, false)
            .expect("policy")
            .evaluate(&ctx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        // tenant key required but absent: distinct message
        let keyless = authenticated("tenantA");
        let err = tenant(false, true)
            .expect("policy")
            .evaluate(&keyless)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tenant path is not defined"));

        // wrong tenant: membership failure, different message
        let wrong = authenticated("tenantA").with_tenant_key("tenantB");
        let err = tenant(false, true)
            .expect("policy")
            .evaluate(&wrong)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not belong to the tenant"));
    }

    #[tokio::test]
    async fn protect_aborts_operation_on_failure() {
        use std::sync::atomic::{AtomicBool, Ordering};
        let ran = AtomicBool::new(false);
        let ctx = AuthContext::new("my-service");

        let result = auth()
            .protect(&ctx, || async {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(result.is_err());
        assert!(!ran.load(Ordering::SeqCst));

        let ctx = authenticated("tenantA");
        auth()
            .protect(&ctx, || async {
                ran.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await
            .expect("authenticated");
        assert!(ran.load(Ordering::SeqCst));
    }
}
