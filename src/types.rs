use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Portfolio balance for a single Kaspa address, as returned by the backend.
///
/// Overwritten wholesale on every successful fetch — snapshots are never
/// merged or diffed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioData {
    pub address: String,
    pub kaspa_holdings: f64,
}

/// Direction of a transaction relative to the tracked address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionDirection {
    Incoming,
    Outgoing,
}

/// A single transaction from the backend's history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub direction: TransactionDirection,
}

/// Backend health check payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Current KAS price in a reference currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KaspaPrice {
    pub price: f64,
    pub currency: String,
}

/// Generic success/error envelope every client call resolves to.
///
/// Endpoint calls never return `Err`: transport failures, non-2xx statuses,
/// and decode errors are all folded into `{success: false, error}` so callers
/// handle exactly one shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Tri-state fetch indicator driving UI feedback. Exactly one variant holds
/// at a time; transitions happen only through the store's fetch lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Error(String),
}

impl FetchStatus {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchStatus::Loading)
    }

    /// Error message, if the last fetch failed.
    pub fn error(&self) -> Option<&str> {
        match self {
            FetchStatus::Error(msg) => Some(msg),
            _ => None,
        }
    }
}
