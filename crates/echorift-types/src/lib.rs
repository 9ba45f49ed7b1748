//! Shared type definitions for the EchoRift zone event.
//!
//! This crate holds the plain data that flows between the core state
//! machine, the persistence adapter and the host world: identifiers,
//! closed enumerations and lock-free records.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for zones and actors
//! - [`enums`] -- Distortion kinds and collapse reasons
//! - [`structs`] -- Coordinates, blocks, items, effects and snapshots

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{CollapseReason, Distortion};
pub use ids::{ActorId, ZoneId};
pub use structs::{
    Age, BlockPos, BlockState, CHUNK_SHIFT, EventSnapshot, ItemStack, ParticleEffect, Position,
    SoundEffect, ZoneRecord, block_to_chunk,
};
