use serde::Deserialize;

/// Writes, and failed reads, are answered with a list of `{"success": ...}` / `{"error": ...}` entries.
// API: https://developers.meethue.com/develop/hue-api/error-messages/
#[allow(dead_code)]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiEntry {
    Success(serde_json::Value),
    Error(ApiError),
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    pub kind: u16,
    pub address: String,
    pub description: String,
}

impl ApiError {
    pub const RESOURCE_NOT_AVAILABLE: u16 = 3;
}
