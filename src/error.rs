use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("FTP error: {0}")]
    Ftp(#[from] suppaftp::FtpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transfer error: {message}")]
    Transfer { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IngestError {
    pub fn transfer(message: impl Into<String>) -> Self {
        IngestError::Transfer { message: message.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        IngestError::Storage { message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
