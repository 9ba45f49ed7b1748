//! In-memory host world for the EchoRift zone event.
//!
//! Stands in for a game server so the event can run headless: worlds,
//! blocks, actors and chat live in process memory.
//!
//! # Modules
//!
//! - [`error`] -- Error types for world building and mutation.
//! - [`starting_world`] -- The default worlds and crop fields.
//! - [`world`] -- [`InMemoryWorld`], implementing the host surfaces.

pub mod error;
pub mod starting_world;
pub mod world;

pub use error::WorldError;
pub use starting_world::{GROUND_Y, NETHER, OVERWORLD, create_starting_world};
pub use world::{ActorState, ChatLine, InMemoryWorld};
