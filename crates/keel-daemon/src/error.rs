// crates/keel-daemon/src/error.rs

use keel_core::KeelError;

/// Errors that stop the daemon.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] KeelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<toml::de::Error> for DaemonError {
    fn from(e: toml::de::Error) -> Self {
        DaemonError::Config(e.to_string())
    }
}
