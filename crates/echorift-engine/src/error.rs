//! Error types for the engine binary.

/// Top-level error for the engine binary.
///
/// Each variant wraps a subsystem failure so `main` can propagate it
/// with `?`. Configuration problems are never fatal and have no variant.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The in-memory world could not be built or populated.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: echorift_world::WorldError,
    },

    /// The event could not be created.
    #[error("event error: {source}")]
    Event {
        /// The underlying event error.
        #[from]
        source: echorift_core::EventError,
    },
}
