//! The persistence boundary.
//!
//! The event saves and restores an [`EventSnapshot`] through
//! [`StatePersistence`]. Encoding is the implementation's business; the
//! YAML data file lives in the `echorift-store` crate.

use echorift_types::EventSnapshot;

/// Errors that can occur while saving or loading event state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to read or write the backing file.
    #[error("state file I/O failed: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The stored content could not be encoded or decoded.
    #[error("state encoding failed: {message}")]
    Encoding {
        /// Description of the failure.
        message: String,
    },
}

/// Save and load of the event state.
pub trait StatePersistence: Send + Sync {
    /// Persist the snapshot, replacing whatever was stored.
    fn save(&self, snapshot: &EventSnapshot) -> Result<(), StoreError>;

    /// Load the stored snapshot. `Ok(None)` means nothing was stored.
    fn load(&self) -> Result<Option<EventSnapshot>, StoreError>;
}
