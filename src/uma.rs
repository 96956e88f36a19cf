//! Remote permission decisions via a UMA ticket grant.
//!
//! [`UmaPermissionChecker`] asks the realm's token endpoint for a yes/no
//! decision on the requested resources, presenting the caller's own token.
//! A `403` from the endpoint is a *denial* (`Ok(false)`); any other
//! failure — transport error, unexpected status, unparseable body — is a
//! [`PermissionCheck`](crate::Error::PermissionCheck) error so callers can
//! tell "denied" from "could not determine". Failures are never retried
//! here, and no timeout beyond the HTTP client's is applied; bound the
//! request externally.
//!
//! Requires the `http-client` feature.

use std::time::Duration;

use async_trait::async_trait;

use crate::adapter::RealmAdapter;
use crate::context::{Grant, PermissionChecker};
use crate::error::{Error, Result};

const UMA_TICKET_GRANT: &str = "urn:ietf:params:oauth:grant-type:uma-ticket";

/// Permission checker backed by the realm's UMA decision endpoint.
#[derive(Debug, Clone)]
pub struct UmaPermissionChecker {
    token_endpoint: String,
    audience: String,
    client: reqwest::Client,
}

impl UmaPermissionChecker {
    /// Build a checker for one realm's adapter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if the HTTP client cannot be built.
    pub fn for_adapter(adapter: &RealmAdapter) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(adapter, client))
    }

    /// Build a checker reusing an existing client.
    pub fn with_client(adapter: &RealmAdapter, client: reqwest::Client) -> Self {
        Self {
            token_endpoint: format!("{}/protocol/openid-connect/token", adapter.issuer_url()),
            audience: adapter.config().resource.clone(),
            client,
        }
    }

    /// The decision endpoint this checker posts to.
    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }
}

#[async_trait]
impl PermissionChecker for UmaPermissionChecker {
    async fn check(&self, grant: &Grant, resources: &[String]) -> Result<bool> {
        let mut form: Vec<(&str, String)> = vec![
            ("grant_type", UMA_TICKET_GRANT.to_string()),
            ("audience", self.audience.clone()),
            ("response_mode", "decision".to_string()),
        ];
        for resource in resources {
            form.push(("permission", resource.clone()));
        }

        tracing::debug!(
            endpoint = %self.token_endpoint,
            resources = resources.len(),
            "requesting permission decision"
        );

        let response = self
            .client
            .post(&self.token_endpoint)
            .bearer_auth(grant.access_token().raw())
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::PermissionCheck(format!("decision request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::FORBIDDEN {
            return Ok(false);
        }
        if !response.status().is_success() {
            return Err(Error::PermissionCheck(format!(
                "decision endpoint returned status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::PermissionCheck(format!("invalid decision response: {e}")))?;
        Ok(body
            .get("result")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterFactory;
    use crate::config::AuthorityConfig;

    #[test]
    fn endpoint_is_derived_from_the_adapter_realm() {
        let base = AuthorityConfig::new("https://auth.example.com", "my-service");
        let adapter = AdapterFactory::new(base).build("tenantA");
        let checker = UmaPermissionChecker::with_client(&adapter, reqwest::Client::new());
        assert_eq!(
            checker.token_endpoint(),
            "https://auth.example.com/realms/tenantA/protocol/openid-connect/token"
        );
    }
}
