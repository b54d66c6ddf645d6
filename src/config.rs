use crate::constants::DEFAULT_UUID_API_URL;
use crate::error::{IngestError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub directories: Directories,
    pub correlation: CorrelationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteKind {
    #[default]
    Ftp,
    Local,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub kind: RemoteKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub remote_dir: String,
    pub passive: bool,
    pub timeout_secs: u64,
    /// Drop directory used when `kind = "local"`
    pub source_dir: Option<PathBuf>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            kind: RemoteKind::Ftp,
            host: "host.docker.internal".to_string(),
            port: 21,
            user: "anonymous".to_string(),
            password: String::new(),
            remote_dir: String::new(),
            passive: true,
            timeout_secs: 30,
            source_dir: None,
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Directories {
    pub download: PathBuf,
    pub archive: PathBuf,
    pub errors: PathBuf,
}

impl Default for Directories {
    fn default() -> Self {
        let root = PathBuf::from("ClinicalData");
        Self {
            download: root.join("Downloads"),
            archive: root.join("Archive"),
            errors: root.join("Errors"),
        }
    }
}

impl Directories {
    pub fn ensure(&self) -> Result<()> {
        for dir in [&self.download, &self.archive, &self.errors] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    pub api_url: String,
    pub timeout_secs: u64,
    pub remote_enabled: bool,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_UUID_API_URL.to_string(),
            timeout_secs: 5,
            remote_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from("logs") }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then apply `CLINICAL_*`
    /// environment overrides (a `.env` file is honoured).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new("config.toml").exists() => Self::from_file(Path::new("config.toml"))?,
            None => Config::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            IngestError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay values from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CLINICAL_FTP_HOST") {
            self.remote.host = v;
        }
        if let Some(v) = lookup("CLINICAL_FTP_PORT") {
            self.remote.port = v
                .trim()
                .parse()
                .map_err(|_| IngestError::Config(format!("CLINICAL_FTP_PORT is not a port number: '{}'", v)))?;
        }
        if let Some(v) = lookup("CLINICAL_FTP_USER") {
            self.remote.user = v;
        }
        if let Some(v) = lookup("CLINICAL_FTP_PASSWORD") {
            self.remote.password = v;
        }
        if let Some(v) = lookup("CLINICAL_REMOTE_DIR") {
            self.remote.remote_dir = v;
        }
        if let Some(v) = lookup("CLINICAL_SOURCE_DIR") {
            self.remote.kind = RemoteKind::Local;
            self.remote.source_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("CLINICAL_DOWNLOAD_DIR") {
            self.directories.download = PathBuf::from(v);
        }
        if let Some(v) = lookup("CLINICAL_ARCHIVE_DIR") {
            self.directories.archive = PathBuf::from(v);
        }
        if let Some(v) = lookup("CLINICAL_ERROR_DIR") {
            self.directories.errors = PathBuf::from(v);
        }
        if let Some(v) = lookup("CLINICAL_UUID_API_URL") {
            self.correlation.api_url = v;
        }
        Ok(())
    }
}
