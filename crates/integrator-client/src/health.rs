//! Backend and per-connection health checks

use crate::api_client::ApiClient;
use integrator_core::{Error, Result, Secret};
use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

/// Shown when a connection probe is missing its inputs, see
/// [`HealthProbe::connection`]
pub const PROBE_MISSING_INPUT: &str = "Please provide both Base URL and API Key";

/// Result of one health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    /// Whether the endpoint answered 2xx
    pub healthy: bool,
    /// HTTP status, absent when no response arrived
    pub status: Option<u16>,
    /// Operator-facing summary
    pub message: String,
}

impl ProbeReport {
    fn from_status(status: StatusCode) -> Self {
        if status.is_success() {
            Self {
                healthy: true,
                status: Some(status.as_u16()),
                message: "Health check successful! Backend is connected.".to_string(),
            }
        } else {
            Self {
                healthy: false,
                status: Some(status.as_u16()),
                message: format!(
                    "Health check failed: {}",
                    status.canonical_reason().unwrap_or("unknown status")
                ),
            }
        }
    }

    fn unreachable(error: &reqwest::Error) -> Self {
        Self {
            healthy: false,
            status: None,
            message: format!("Connection error: {error}"),
        }
    }
}

/// Runs health checks through an [`ApiClient`]'s HTTP stack
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: ApiClient,
}

impl HealthProbe {
    /// Probe using `client`'s base URL and timeout
    #[must_use]
    pub const fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// `GET /healthcheck` on the dashboard backend
    pub async fn backend(&self) -> ProbeReport {
        let url = format!("{}/healthcheck", self.client.base_url());
        let report = run(self.client.http().get(&url)).await;
        debug!(url = %url, healthy = report.healthy, "backend health checked");
        report
    }

    /// `GET {base_url}/connect` with the connection's API key
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming `base_url` and/or `api_key` when
    /// either is empty; nothing is sent in that case. Show
    /// [`PROBE_MISSING_INPUT`] to the operator for it.
    pub async fn connection(&self, base_url: &str, api_key: &Secret) -> Result<ProbeReport> {
        let base_url = base_url.trim().trim_end_matches('/');
        let checks = [
            ("base_url", base_url.is_empty()),
            ("api_key", api_key.is_empty()),
        ];
        let missing: Vec<&str> = checks
            .into_iter()
            .filter_map(|(field, empty)| empty.then_some(field))
            .collect();
        if !missing.is_empty() {
            return Err(Error::validation("connection probe", missing));
        }

        let url = format!("{base_url}/connect");
        let request = self
            .client
            .http()
            .get(&url)
            .header("Content-Type", "application/json")
            .header("X-API-Key", api_key.expose());
        let report = run(request).await;
        debug!(url = %url, healthy = report.healthy, "connection probed");
        Ok(report)
    }
}

async fn run(request: RequestBuilder) -> ProbeReport {
    match request.send().await {
        Ok(response) => {
            let report = ProbeReport::from_status(response.status());
            if !report.healthy {
                warn!(status = ?report.status, "health check failed");
            }
            report
        }
        Err(e) => {
            warn!(error = %e, "health check could not connect");
            ProbeReport::unreachable(&e)
        }
    }
}
