//! External dependency clients (spec §6): the Advisor (external route-advice service)
//! and Store (persistence) calls the automation engines make, each wrapped by a
//! [`crate::breaker::CircuitBreaker`]. Grounded on the teacher's `api/osrm_api.rs`
//! request/timeout/error shape, generalised from `Option`-swallowed errors to
//! `CoreResult` and from `eprintln!` to `tracing`.

use std::time::Duration;

use reqwest::Client;
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// A named, network-backed dependency an automation engine calls once per tick.
#[async_trait::async_trait]
pub trait ExternalDependency: Send + Sync {
    fn name(&self) -> &str;
    async fn call(&self, payload: serde_json::Value) -> CoreResult<serde_json::Value>;
}

/// Generic JSON-over-HTTP POST client used for both the Advisor and Store dependencies
/// — they differ only in base URL and name.
pub struct HttpDependency {
    name: String,
    url: String,
    client: Client,
}

impl HttpDependency {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Self {
        HttpDependency {
            name: name.into(),
            url: url.into(),
            client: Client::builder().timeout(timeout).build().expect("reqwest client builds"),
        }
    }
}

#[async_trait::async_trait]
impl ExternalDependency for HttpDependency {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, payload: serde_json::Value) -> CoreResult<serde_json::Value> {
        let response = self.client.post(&self.url).json(&payload).send().await.map_err(|e| {
            warn!(dependency = %self.name, error = %e, "external dependency request failed");
            CoreError::OptimizationFailed { phase: self.name.clone(), message: e.to_string() }
        })?;

        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| {
            warn!(dependency = %self.name, error = %e, "external dependency returned non-JSON body");
            CoreError::OptimizationFailed { phase: self.name.clone(), message: e.to_string() }
        })?;

        if !status.is_success() {
            return Err(CoreError::OptimizationFailed {
                phase: self.name.clone(),
                message: format!("dependency returned status {status}"),
            });
        }

        Ok(body)
    }
}

/// Canned-response double used by engine tests (spec's test tooling requirement) — no
/// network access, deterministic outcomes.
pub struct MockDependency {
    pub name: String,
    pub succeed: bool,
}

#[async_trait::async_trait]
impl ExternalDependency for MockDependency {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, payload: serde_json::Value) -> CoreResult<serde_json::Value> {
        if self.succeed {
            Ok(payload)
        } else {
            Err(CoreError::OptimizationFailed { phase: self.name.clone(), message: "mock dependency configured to fail".to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_dependency_echoes_payload_on_success() {
        let dep = MockDependency { name: "advisor".to_string(), succeed: true };
        let result = dep.call(serde_json::json!({"hello": "world"})).await.unwrap();
        assert_eq!(result, serde_json::json!({"hello": "world"}));
    }

    #[tokio::test]
    async fn mock_dependency_fails_when_configured_to() {
        let dep = MockDependency { name: "store".to_string(), succeed: false };
        assert!(dep.call(serde_json::json!({})).await.is_err());
    }
}
