//! The world and message surfaces the event drives.
//!
//! The core never touches world or actor state directly. Everything it
//! needs from the surrounding game goes through [`WorldHost`] and
//! [`MessageSink`]; the implementation owns any thread or region
//! marshalling the host requires.
//!
//! Failures come back as [`HostError`]. Callers log them where they happen
//! and carry on with the rest of their batch.

use echorift_types::{ActorId, BlockPos, BlockState, ItemStack, ParticleEffect, Position, SoundEffect};

/// Errors reported by a host surface.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The named world does not exist or is not loaded.
    #[error("world not loaded: {world}")]
    WorldNotLoaded {
        /// Name of the missing world.
        world: String,
    },

    /// The actor is not online.
    #[error("actor offline: {actor}")]
    ActorOffline {
        /// The offline actor.
        actor: ActorId,
    },

    /// The host refused or failed the operation.
    #[error("host operation failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

/// Read and write access to the simulated world and its actors.
pub trait WorldHost: Send + Sync {
    /// Names of every loaded world.
    fn world_names(&self) -> Vec<String>;

    /// Height at which points in `world` are anchored for effects.
    fn spawn_height(&self, world: &str) -> Option<f64>;

    /// Actors currently online.
    fn online_actors(&self) -> Vec<ActorId>;

    /// Current position of an online actor.
    fn actor_position(&self, actor: ActorId) -> Option<Position>;

    /// Read one cell.
    fn block(&self, pos: &BlockPos) -> Result<BlockState, HostError>;

    /// Overwrite one cell.
    fn set_block(&self, pos: &BlockPos, state: BlockState) -> Result<(), HostError>;

    /// Emit a particle burst.
    fn spawn_particles(&self, at: &Position, effect: &ParticleEffect) -> Result<(), HostError>;

    /// Play a sound.
    fn play_sound(&self, at: &Position, sound: &SoundEffect) -> Result<(), HostError>;

    /// Add exhaustion to an actor's hunger stat.
    fn add_exhaustion(&self, actor: ActorId, amount: f32) -> Result<(), HostError>;

    /// Put an item into an actor's inventory.
    ///
    /// Returns whatever did not fit.
    fn give_item(&self, actor: ActorId, item: &ItemStack) -> Result<Option<ItemStack>, HostError>;

    /// Drop an item into the world at a block.
    fn drop_item(&self, at: &BlockPos, item: &ItemStack) -> Result<(), HostError>;
}

/// Delivery of chat messages.
///
/// Implementations only see non-blank text: use [`send_message`] and
/// [`broadcast_message`] rather than calling the sink directly.
pub trait MessageSink: Send + Sync {
    /// Send a message to one actor.
    fn send(&self, actor: ActorId, text: &str);

    /// Send a message to everyone.
    fn broadcast(&self, text: &str);
}

/// Send `text` to `actor` unless it is blank.
pub fn send_message(sink: &dyn MessageSink, actor: ActorId, text: &str) {
    if !text.trim().is_empty() {
        sink.send(actor, text);
    }
}

/// Broadcast `text` unless it is blank.
pub fn broadcast_message(sink: &dyn MessageSink, text: &str) {
    if !text.trim().is_empty() {
        sink.broadcast(text);
    }
}
