use crate::app::ports::CorrelationIdSource;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Correlation ids from a remote UUID service answering `["<uuid>", ...]`.
pub struct RemoteUuidSource {
    client: reqwest::Client,
    url: String,
}

impl RemoteUuidSource {
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, url: url.to_string() })
    }
}

#[async_trait]
impl CorrelationIdSource for RemoteUuidSource {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn generate(&self) -> std::result::Result<String, String> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| e.to_string())?
            .error_for_status()
            .map_err(|e| e.to_string())?;
        let body: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
        first_uuid(&body).ok_or_else(|| "malformed_or_empty_response".to_string())
    }
}

fn first_uuid(body: &serde_json::Value) -> Option<String> {
    body.as_array()?
        .first()?
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
