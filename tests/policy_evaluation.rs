//! Policy evaluator properties: binding-time validation, role OR
//! semantics, permission AND semantics, and the tenant decision table.

use pretty_assertions::assert_eq;
use serde_json::json;

use realmguard::mock::{StaticPermissionChecker, UnsignedToken};
use realmguard::{policy, AuthContext, ErrorKind, Policy};

const AUTHORITY: &str = "https://auth.example.com";

fn member_of(realm: &str) -> AuthContext {
    AuthContext::new("my-service").with_grant(
        UnsignedToken::new("user-1")
            .issuer(format!("{AUTHORITY}/realms/{realm}"))
            .realm_roles(["dev"])
            .client_roles("my-service", ["admin"])
            .into_grant(),
    )
}

#[test]
fn binding_time_argument_rejection() {
    // exactly one recognized key, value a string or sequence
    assert_eq!(
        Policy::from_directive("hasRole", &json!({"role": "x", "extra": 1}))
            .unwrap_err()
            .kind(),
        ErrorKind::Configuration
    );
    assert_eq!(
        Policy::from_directive("hasRole", &json!({"role": 5}))
            .unwrap_err()
            .kind(),
        ErrorKind::Configuration
    );
    assert_eq!(
        Policy::from_directive("hasRole", &json!({"role": ["a", "b"]})).expect("valid"),
        Policy::HasRole(vec!["a".to_string(), "b".to_string()])
    );
    assert_eq!(
        Policy::from_directive("hasPermission", &json!({"resources": "Article:view"}))
            .expect("valid"),
        Policy::HasPermission(vec!["Article:view".to_string()])
    );
}

#[tokio::test]
async fn has_role_passes_on_any_listed_role() {
    let ctx = member_of("tenantA");

    // "admin" is a client role, "realm:dev" a realm role; either suffices
    policy::has_role(["admin", "dev"])
        .expect("policy")
        .evaluate(&ctx)
        .await
        .expect("client role held");
    policy::has_role(["realm:dev", "nope"])
        .expect("policy")
        .evaluate(&ctx)
        .await
        .expect("realm role held");

    let err = policy::has_role(["nope", "also-nope"])
        .expect("policy")
        .evaluate(&ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn has_role_requires_authentication_even_when_roles_would_match() {
    let ctx = AuthContext::new("my-service");
    let err = policy::has_role(["admin"])
        .expect("policy")
        .evaluate(&ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
}

#[tokio::test]
async fn has_permission_requires_every_resource() {
    let ctx = member_of("tenantA")
        .with_permission_checker(StaticPermissionChecker::granting(["Article:view"]));

    policy::has_permission(["Article:view"])
        .expect("policy")
        .evaluate(&ctx)
        .await
        .expect("granted");

    let err = policy::has_permission(["Article:view", "Article:edit"])
        .expect("policy")
        .evaluate(&ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn permission_check_failure_is_not_a_denial() {
    let ctx = member_of("tenantA")
        .with_permission_checker(StaticPermissionChecker::failing("endpoint unreachable"));

    let err = policy::has_permission(["Article:view"])
        .expect("policy")
        .evaluate(&ctx)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionCheck);
    assert_ne!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn tenant_table() {
    // both flags false never construct
    assert_eq!(
        policy::tenant(false, false).unwrap_err().kind(),
        ErrorKind::Configuration
    );

    // master member passes (true, true) with no tenant key present
    let master = member_of("master");
    policy::tenant(true, true)
        .expect("policy")
        .evaluate(&master)
        .await
        .expect("master membership suffices");

    // tenant member passes (true, true) through the context arm
    let tenant_member = member_of("tenantA").with_tenant_key("tenantA");
    policy::tenant(true, true)
        .expect("policy")
        .evaluate(&tenant_member)
        .await
        .expect("tenant membership suffices");

    // neither master nor matching tenant: forbidden
    let stranger = member_of("tenantB").with_tenant_key("tenantA");
    let err = policy::tenant(true, true)
        .expect("policy")
        .evaluate(&stranger)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // missing tenant key is reported distinctly from failed membership
    let keyless = member_of("tenantA");
    let err = policy::tenant(false, true)
        .expect("policy")
        .evaluate(&keyless)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("tenant path is not defined"));
}
