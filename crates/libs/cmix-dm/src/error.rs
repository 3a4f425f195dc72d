use std::path::PathBuf;

use thiserror::Error;

use crate::envelope::EventKind;
use crate::InstanceId;

/// Errors raised while locating or invoking an instance's handlers.
///
/// `UnknownInstance` during dispatch is expected (events can race instance
/// teardown) and is reported as a dropped event rather than returned.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RoutingError {
    #[error("unknown instance: {instance_id}")]
    UnknownInstance { instance_id: InstanceId },

    #[error("instance {instance_id} is already registered")]
    DuplicateInstance { instance_id: InstanceId },

    #[error("{kind} handler panicked on instance {instance_id}: {message}")]
    HandlerPanicked { instance_id: InstanceId, kind: EventKind, message: String },
}

impl RoutingError {
    /// The instance the error refers to.
    pub fn instance_id(&self) -> InstanceId {
        match self {
            Self::UnknownInstance { instance_id }
            | Self::DuplicateInstance { instance_id }
            | Self::HandlerPanicked { instance_id, .. } => *instance_id,
        }
    }
}

/// Errors raised when raw buffers cross the C boundary.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BoundaryError {
    #[error("allocation of {size} bytes failed")]
    AllocationFailure { size: usize },

    #[error("malformed span: {reason}")]
    MalformedSpan { reason: String },
}

impl BoundaryError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedSpan { reason: reason.into() }
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}
