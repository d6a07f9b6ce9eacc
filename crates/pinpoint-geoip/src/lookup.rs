//! IP geolocation lookup against ipinfo.io.

use pinpoint_mcp::ToolError;

/// Default upstream endpoint.
pub const IPINFO_BASE_URL: &str = "https://ipinfo.io";

/// Upstream client for ipinfo.io.
///
/// The payload is passed through as the upstream's raw JSON re-serialized
/// to a string — the consumer is the model, and upstream fields vary by IP
/// and plan.
pub struct GeoLookup {
    http: reqwest::Client,
    base_url: String,
}

impl GeoLookup {
    pub fn new() -> Result<Self, ToolError> {
        Self::with_base_url(IPINFO_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ToolError::Upstream(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    /// Fetch location info for one IP address.
    pub async fn lookup(&self, ip: &str) -> Result<String, ToolError> {
        let url = format!("{}/{}/json", self.base_url.trim_end_matches('/'), ip);
        tracing::debug!(%url, "fetching location data");

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ToolError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Status(status.as_u16()));
        }

        let record: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ToolError::Decode(e.to_string()))?;

        serde_json::to_string(&record).map_err(|e| ToolError::Decode(e.to_string()))
    }
}
