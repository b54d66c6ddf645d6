use crate::app::ports::{GatewayConnector, TransferGateway};
use crate::config::{RemoteConfig, RemoteKind};
use crate::error::{IngestError, Result};
use crate::infra::ftp_gateway::FtpGateway;
use crate::infra::local_gateway::LocalDirGateway;
use crate::status::StatusSink;
use async_trait::async_trait;
use std::sync::Arc;

/// Builds the gateway named by `[remote] kind`.
pub struct ConfiguredConnector {
    remote: RemoteConfig,
}

impl ConfiguredConnector {
    pub fn new(remote: RemoteConfig) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl GatewayConnector for ConfiguredConnector {
    async fn connect(&self, sink: &dyn StatusSink) -> Result<Arc<dyn TransferGateway>> {
        match self.remote.kind {
            RemoteKind::Ftp => {
                let gateway = FtpGateway::connect(&self.remote).await?;
                for warning in &gateway.warnings {
                    sink.warning(warning);
                }
                sink.success("✅ FTP connection successful");
                sink.info(&format!("Remote: {}", gateway.describe()));
                Ok(Arc::new(gateway))
            }
            RemoteKind::Local => {
                let dir = self.remote.source_dir.clone().ok_or_else(|| {
                    IngestError::Config("remote.kind = \"local\" requires remote.source_dir".to_string())
                })?;
                let gateway = LocalDirGateway::open(dir)?;
                sink.success(&format!("✅ Using drop directory {}", gateway.describe()));
                Ok(Arc::new(gateway))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusBuffer;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_kind_opens_drop_directory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("CLINICALDATA20250101120000.CSV"), "x").unwrap();
        let remote = RemoteConfig {
            kind: RemoteKind::Local,
            source_dir: Some(dir.path().to_path_buf()),
            ..RemoteConfig::default()
        };

        let sink = StatusBuffer::new();
        let gateway = ConfiguredConnector::new(remote).connect(&sink).await.unwrap();
        assert_eq!(gateway.list_remote_files().await.unwrap().len(), 1);
        assert!(sink.messages()[0].contains("drop directory"));
    }

    #[tokio::test]
    async fn test_local_kind_without_dir_is_config_error() {
        let remote = RemoteConfig { kind: RemoteKind::Local, ..RemoteConfig::default() };
        let result = ConfiguredConnector::new(remote).connect(&StatusBuffer::new()).await;
        assert!(matches!(result, Err(IngestError::Config(_))));
    }

    #[tokio::test]
    async fn test_refused_ftp_connection_is_error() {
        let remote = RemoteConfig {
            host: "127.0.0.1".to_string(),
            port: 9,
            timeout_secs: 2,
            ..RemoteConfig::default()
        };
        assert!(ConfiguredConnector::new(remote).connect(&StatusBuffer::new()).await.is_err());
    }
}
