use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::app::ports::CorrelationIdSource;
use crate::config::CorrelationConfig;
use crate::error::Result;
use crate::infra::uuid_api::RemoteUuidSource;

/// Random v4 UUID generated in-process.
pub struct LocalUuidSource;

#[async_trait]
impl CorrelationIdSource for LocalUuidSource {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn generate(&self) -> std::result::Result<String, String> {
        Ok(Uuid::new_v4().to_string())
    }
}

/// Ordered list of id strategies; the first one to produce a non-empty id wins.
///
/// Each strategy is tried once. Failures are logged at debug level and never
/// reach the caller; if every strategy fails a local UUID is returned anyway.
pub struct CorrelationIdGenerator {
    sources: Vec<Box<dyn CorrelationIdSource>>,
}

impl CorrelationIdGenerator {
    pub fn new(sources: Vec<Box<dyn CorrelationIdSource>>) -> Self {
        Self { sources }
    }

    pub fn local_only() -> Self {
        Self::new(vec![Box::new(LocalUuidSource)])
    }

    /// Remote service first (when enabled), then local generation.
    pub fn from_config(config: &CorrelationConfig) -> Result<Self> {
        let mut sources: Vec<Box<dyn CorrelationIdSource>> = Vec::new();
        if config.remote_enabled {
            sources.push(Box::new(RemoteUuidSource::new(&config.api_url, config.timeout_secs)?));
        }
        sources.push(Box::new(LocalUuidSource));
        Ok(Self::new(sources))
    }

    pub async fn generate(&self) -> String {
        for source in &self.sources {
            match source.generate().await {
                Ok(id) if !id.trim().is_empty() => return id.trim().to_string(),
                Ok(_) => debug!(source = source.name(), "correlation id source returned an empty id"),
                Err(e) => debug!(source = source.name(), error = %e, "correlation id source failed"),
            }
        }
        Uuid::new_v4().to_string()
    }
}
