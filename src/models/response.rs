use crate::services::blockchain::RateLimitStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Success envelope: `{"success": true, "data": T}`.
#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Failure envelope: `{"success": false, "error": "...", "retryAfter": 30}`.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    pub request_id: String,
}

/// Either envelope, as read back by HTTP clients.
#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub retry_after: Option<u64>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub network: String,
    pub provider: String,
    pub provider_reachable: bool,
    pub rate_limit: RateLimitStatus,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}
