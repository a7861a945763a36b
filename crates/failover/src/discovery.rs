//! Membership and metadata discovery.
//!
//! The controller never watches; it polls the discovery backend each
//! reconciliation tick and recomputes from scratch. The staleness window
//! that implies is an accepted tradeoff of the leaderless design.

use async_trait::async_trait;
use common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Upper bound on any single discovery request. A hung backend must not
/// stall the reconciliation tick forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Service-level view returned by the discovery backend.
///
/// `ready` and `not_ready` both participate in priority derivation: a
/// replica that is still warming up must already hold its slot in the
/// canonical order, or every node's priorities would shuffle again the
/// moment it becomes ready.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service annotations (VIP, vrid, interfaces).
    #[serde(default)]
    pub annotations: HashMap<String, String>,

    /// Addresses of members currently passing readiness.
    #[serde(default)]
    pub ready: Vec<String>,

    /// Addresses of members that exist but are not ready yet.
    #[serde(default)]
    pub not_ready: Vec<String>,
}

impl ServiceInfo {
    /// Union of ready and not-ready member addresses, as observed.
    pub fn members(&self) -> Vec<String> {
        let mut peers = self.ready.clone();
        peers.extend(self.not_ready.iter().cloned());
        peers
    }
}

/// Instance-level view returned by the discovery backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceInfo {
    /// The instance's own network address.
    pub address: String,
}

/// Read-only client for the membership/metadata source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Fetch annotations and membership for a named service.
    async fn service(&self, name: &str) -> Result<ServiceInfo>;

    /// Fetch this instance's own network address.
    async fn self_address(&self, instance: &str) -> Result<String>;
}

/// HTTP discovery client.
pub struct HttpDiscovery {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDiscovery {
    /// Create a client against a discovery endpoint such as
    /// `http://127.0.0.1:8500`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(Error::backend)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "querying discovery backend");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::backend(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::backend(format!("{url} returned {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::backend(format!("invalid response from {url}: {e}")))
    }
}

#[async_trait]
impl Discovery for HttpDiscovery {
    async fn service(&self, name: &str) -> Result<ServiceInfo> {
        self.get_json(&format!("/v1/services/{name}")).await
    }

    async fn self_address(&self, instance: &str) -> Result<String> {
        let info: InstanceInfo = self.get_json(&format!("/v1/instances/{instance}")).await?;
        Ok(info.address)
    }
}
