//! HTTP health probe
//!
//! One bounded-time GET against `{endpoint}/health`, classifying the JSON
//! body's `status` field. Probe failures are expected, routine input: they
//! map to `reachable == false`, never to an error.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::traits::HealthProbe;
use crate::types::ProbeResult;

/// Reqwest-backed health probe
pub struct HttpHealthProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpHealthProbe {
    pub fn new(timeout: Duration) -> Self {
        // Client construction only fails on TLS backend misconfiguration;
        // fall back to the default client rather than surfacing it here.
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("deploy-sentinel/0.3")
            .build()
            .unwrap_or_default();
        Self { client, timeout }
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn probe(&self, endpoint: &str) -> ProbeResult {
        let url = format!("{}/health", endpoint.trim_end_matches('/'));

        let response = match self.client.get(&url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, error = %e, "health probe unreachable");
                return ProbeResult::unreachable();
            }
        };

        if !response.status().is_success() {
            debug!(url = %url, status = %response.status(), "health probe non-success");
            return ProbeResult {
                reachable: true,
                status_field: "unknown".to_string(),
                metrics: BTreeMap::new(),
            };
        }

        let body = response.text().await.unwrap_or_default();
        let (status_field, metrics) = parse_health_body(&body);
        ProbeResult {
            reachable: true,
            status_field,
            metrics,
        }
    }
}

/// Extract the `status` field and any informational scalar fields from a
/// health body. Absent or malformed bodies map to `"unknown"`, never to a
/// decode error.
pub fn parse_health_body(body: &str) -> (String, BTreeMap<String, String>) {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return ("unknown".to_string(), BTreeMap::new());
    };

    let status = match map.get("status") {
        Some(Value::String(s)) => s.clone(),
        _ => "unknown".to_string(),
    };

    let mut metrics = BTreeMap::new();
    for (key, value) in &map {
        if key == "status" {
            continue;
        }
        match value {
            Value::String(s) => {
                metrics.insert(key.clone(), s.clone());
            }
            Value::Number(n) => {
                metrics.insert(key.clone(), n.to_string());
            }
            Value::Bool(b) => {
                metrics.insert(key.clone(), b.to_string());
            }
            _ => {}
        }
    }

    (status, metrics)
}
