use crate::app::ports::{csv_candidates, TransferGateway};
use crate::config::RemoteConfig;
use crate::error::{IngestError, Result};
use async_trait::async_trait;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use suppaftp::{FtpError, FtpStream, Mode};
use tracing::{info, warn};

/// FTP transfer gateway.
///
/// `suppaftp`'s client is blocking, so every call runs on the blocking pool.
/// The control connection is shared behind a mutex; calls are sequential.
pub struct FtpGateway {
    stream: Arc<Mutex<Option<FtpStream>>>,
    label: String,
    /// Non-fatal problems seen while connecting, e.g. a failed `cwd`
    pub warnings: Vec<String>,
}

impl FtpGateway {
    /// Connect, log in and change into the configured remote directory.
    /// Each network step is bounded by the configured timeout and attempted once.
    pub async fn connect(config: &RemoteConfig) -> Result<Self> {
        let config = config.clone();
        let label = format!("ftp://{}:{}/{}", config.host, config.port, config.remote_dir);
        let (stream, warnings) = tokio::task::spawn_blocking(move || open_session(&config)).await??;
        info!(remote = %label, "FTP connection established");
        Ok(Self {
            stream: Arc::new(Mutex::new(Some(stream))),
            label,
            warnings,
        })
    }

    async fn with_stream<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut FtpStream) -> Result<T> + Send + 'static,
    {
        let stream = self.stream.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = stream
                .lock()
                .map_err(|_| IngestError::transfer("FTP session lock poisoned"))?;
            let ftp = guard
                .as_mut()
                .ok_or_else(|| IngestError::transfer("not connected to FTP server"))?;
            op(ftp)
        })
        .await?
    }
}

fn open_session(config: &RemoteConfig) -> Result<(FtpStream, Vec<String>)> {
    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| IngestError::transfer(format!("cannot resolve host '{}'", config.host)))?;

    let timeout = config.timeout();
    let mut ftp = FtpStream::connect_timeout(addr, timeout)?
        .passive_stream_builder(move |data_addr| open_data_stream(data_addr, timeout));
    ftp.get_ref().set_read_timeout(Some(timeout))?;
    ftp.get_ref().set_write_timeout(Some(timeout))?;
    ftp.set_mode(if config.passive { Mode::Passive } else { Mode::Active });
    ftp.login(config.user.as_str(), config.password.as_str())?;

    let mut warnings = Vec::new();
    if !config.remote_dir.is_empty() {
        if let Err(e) = ftp.cwd(config.remote_dir.as_str()) {
            warn!(remote_dir = %config.remote_dir, error = %e, "could not change remote directory");
            warnings.push(format!(
                "Warning: Could not change to remote dir '{}': {}",
                config.remote_dir, e
            ));
        }
    }
    Ok((ftp, warnings))
}

// Passive data connections (NLST, RETR) get the same bounds as the control socket
fn open_data_stream(addr: SocketAddr, timeout: Duration) -> std::result::Result<TcpStream, FtpError> {
    let stream = TcpStream::connect_timeout(&addr, timeout).map_err(FtpError::ConnectionError)?;
    stream.set_read_timeout(Some(timeout)).map_err(FtpError::ConnectionError)?;
    stream.set_write_timeout(Some(timeout)).map_err(FtpError::ConnectionError)?;
    Ok(stream)
}

#[async_trait]
impl TransferGateway for FtpGateway {
    async fn list_remote_files(&self) -> Result<Vec<String>> {
        let names = self.with_stream(|ftp| Ok(ftp.nlst(None)?)).await?;
        Ok(csv_candidates(names))
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let name = name.to_string();
        self.with_stream(move |ftp| Ok(ftp.retr_as_buffer(&name)?.into_inner()))
            .await
    }

    async fn disconnect(&self) -> Result<()> {
        let stream = self.stream.clone();
        tokio::task::spawn_blocking(move || {
            if let Ok(mut guard) = stream.lock() {
                if let Some(mut ftp) = guard.take() {
                    // A failed QUIT still leaves us disconnected
                    let _ = ftp.quit();
                }
            }
        })
        .await?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}
