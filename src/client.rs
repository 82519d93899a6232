use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::types::{ApiResponse, HealthStatus, KaspaPrice, PortfolioData, Transaction};

/// Per-request timeout. Keeps a dead backend from pinning the status at
/// `Loading` past the next refresh tick.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Thin HTTP client for the KaspaTrack backend.
///
/// Every endpoint resolves to an [`ApiResponse`] envelope. Transport
/// failures, non-2xx statuses, and decode errors are normalized into
/// `{success: false, error}` — endpoint calls themselves never fail.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Build a client against the given backend base URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url: Url = base_url
            .parse()
            .with_context(|| format!("invalid base URL: {base_url}"))?;
        // Url::join treats a non-slash-terminated path as a file and would
        // drop its last segment, so anchor the base as a directory.
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Portfolio balance for an address. The only endpoint the store polls.
    pub async fn get_portfolio(&self, address: &str) -> ApiResponse<PortfolioData> {
        self.request(&format!("/portfolio/{address}")).await
    }

    /// Real-time portfolio update for an address.
    pub async fn get_portfolio_updates(&self, address: &str) -> ApiResponse<PortfolioData> {
        self.request(&format!("/portfolio/{address}/updates")).await
    }

    /// Transaction history for an address.
    pub async fn get_transactions(&self, address: &str) -> ApiResponse<Vec<Transaction>> {
        self.request(&format!("/transactions/{address}")).await
    }

    /// Backend liveness check.
    pub async fn health_check(&self) -> ApiResponse<HealthStatus> {
        self.request("/health").await
    }

    /// Current KAS price.
    pub async fn get_kaspa_price(&self) -> ApiResponse<KaspaPrice> {
        self.request("/price/kaspa").await
    }

    /// Issue a GET against `endpoint` and fold the outcome into the envelope.
    async fn request<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResponse<T> {
        let url = match self.base_url.join(endpoint.trim_start_matches('/')) {
            Ok(url) => url,
            Err(e) => return ApiResponse::err(format!("Invalid endpoint {endpoint}: {e}")),
        };

        let response = match self.http.get(url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!("GET {url} transport failure: {e}");
                return ApiResponse::err(format!("Network error: {e}"));
            }
        };

        let status = response.status();
        if !status.is_success() {
            debug!("GET {url} -> {status}");
            return ApiResponse::err(format!("HTTP error! status: {}", status.as_u16()));
        }

        match response.json::<T>().await {
            Ok(data) => {
                debug!("GET {url} -> {status}");
                ApiResponse::ok(data)
            }
            Err(e) => ApiResponse::err(format!("Malformed response: {e}")),
        }
    }
}
