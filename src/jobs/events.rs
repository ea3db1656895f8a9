//! Job completion events
//!
//! One event is produced per finished job, after its result has been
//! applied to the registry.

use crate::error::RelightError;
use crate::layers::LayerId;

#[derive(Debug)]
pub enum JobEvent {
    /// Generation succeeded; the layer is now `Ready`
    LayerReady { id: LayerId },
    /// Generation failed; the layer is now `Failed`
    LayerFailed { id: LayerId, error: RelightError },
    /// Generation was rejected for its credential; the layer is `Failed`
    /// (or was already deleted) and the caller should collect a new credential
    CredentialsRejected { id: LayerId, error: RelightError },
    /// Alignment replaced the layer image
    Aligned { id: LayerId },
    /// Alignment failed; the layer name was restored, nothing else changed
    AlignmentFailed { id: LayerId, error: RelightError },
    /// The layer was deleted while the job was in flight; result dropped
    Discarded { id: LayerId },
}

impl JobEvent {
    pub fn layer_id(&self) -> LayerId {
        match self {
            JobEvent::LayerReady { id }
            | JobEvent::LayerFailed { id, .. }
            | JobEvent::CredentialsRejected { id, .. }
            | JobEvent::Aligned { id }
            | JobEvent::AlignmentFailed { id, .. }
            | JobEvent::Discarded { id } => *id,
        }
    }

    pub fn error(&self) -> Option<&RelightError> {
        match self {
            JobEvent::LayerFailed { error, .. }
            | JobEvent::CredentialsRejected { error, .. }
            | JobEvent::AlignmentFailed { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Whether the caller should prompt for new credentials
    pub fn requires_credentials(&self) -> bool {
        matches!(self, JobEvent::CredentialsRejected { .. })
    }
}
