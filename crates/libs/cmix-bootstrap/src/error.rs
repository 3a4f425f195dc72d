use std::path::PathBuf;

use thiserror::Error;

use crate::bootstrap::BootstrapPhase;

/// Terminal failures of one bootstrap attempt.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    #[error("no network definition available: certificate {} could not be read", path.display())]
    MissingCertificate { path: PathBuf },

    #[error("network definition download failed: {message}")]
    Download { message: String },

    #[error("failed to initialize client state in {}: {message}", dir.display())]
    StateInit { dir: PathBuf, message: String },

    #[error("failed to load client state: {message}")]
    StateLoad { message: String },

    #[error("reception identity failure during {phase}: {message}")]
    Identity { phase: BootstrapPhase, message: String },
}

impl BootstrapError {
    /// The phase the bootstrap was in when it failed.
    pub fn phase(&self) -> BootstrapPhase {
        match self {
            Self::MissingCertificate { .. } | Self::Download { .. } => BootstrapPhase::DownloadNdf,
            Self::StateInit { .. } => BootstrapPhase::CreateState,
            Self::StateLoad { .. } => BootstrapPhase::LoadState,
            Self::Identity { phase, .. } => *phase,
        }
    }
}

/// Failure reported by a [`NetworkClient`](crate::NetworkClient) implementation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    pub message: String,
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl From<String> for ClientError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ClientError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
