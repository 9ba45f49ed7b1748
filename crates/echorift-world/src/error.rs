//! Error types for the `echorift-world` crate.

use echorift_core::host::HostError;
use echorift_types::ActorId;

/// Errors that can occur while building or mutating the in-memory world.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A world with this name already exists.
    #[error("duplicate world: {name}")]
    DuplicateWorld {
        /// The repeated name.
        name: String,
    },

    /// No world with this name is loaded.
    #[error("world not loaded: {name}")]
    UnknownWorld {
        /// The missing name.
        name: String,
    },

    /// The actor is not online.
    #[error("actor {actor} is not online")]
    UnknownActor {
        /// The missing actor.
        actor: ActorId,
    },
}

impl From<WorldError> for HostError {
    fn from(error: WorldError) -> Self {
        match error {
            WorldError::UnknownWorld { name } => Self::WorldNotLoaded { world: name },
            WorldError::UnknownActor { actor } => Self::ActorOffline { actor },
            other @ WorldError::DuplicateWorld { .. } => Self::Failed {
                message: other.to_string(),
            },
        }
    }
}
