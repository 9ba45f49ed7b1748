//! Plain data carried across the core and its collaborators.
//!
//! Nothing here holds locks or references to live state. [`ZoneRecord`]
//! and [`EventSnapshot`] are the persistence view of the event; the
//! coordinate and block types describe the host world at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::Distortion;
use crate::ids::ZoneId;

/// Number of blocks along one side of a chunk, as a shift amount.
pub const CHUNK_SHIFT: u32 = 4;

/// Materials that count as an empty cell.
const AIR_MATERIALS: [&str; 3] = ["AIR", "CAVE_AIR", "VOID_AIR"];

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// Convert a block coordinate to its chunk coordinate.
pub const fn block_to_chunk(block: i32) -> i32 {
    block >> CHUNK_SHIFT
}

/// A precise position inside a world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Name of the world (spatial partition).
    pub world: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate (height).
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// Create a position.
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// The block this position lies in.
    #[allow(clippy::cast_possible_truncation)]
    pub fn block(&self) -> BlockPos {
        BlockPos {
            world: self.world.clone(),
            x: self.x.floor() as i32,
            y: self.y.floor() as i32,
            z: self.z.floor() as i32,
        }
    }

    /// Chunk coordinates `(chunk_x, chunk_z)` of this position.
    pub fn chunk(&self) -> (i32, i32) {
        self.block().chunk()
    }

    /// Planar (x/z) squared distance to a block column.
    pub fn planar_distance_sq(&self, x: i32, z: i32) -> f64 {
        let dx = self.x - f64::from(x);
        let dz = self.z - f64::from(z);
        dx.mul_add(dx, dz * dz)
    }
}

/// Integer block coordinates inside a world.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    /// Name of the world (spatial partition).
    pub world: String,
    /// Block X.
    pub x: i32,
    /// Block Y.
    pub y: i32,
    /// Block Z.
    pub z: i32,
}

impl BlockPos {
    /// Create a block position.
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// Chunk coordinates `(chunk_x, chunk_z)` of this block.
    pub const fn chunk(&self) -> (i32, i32) {
        (block_to_chunk(self.x), block_to_chunk(self.z))
    }

    /// The block displaced by the given offsets (saturating).
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }

    /// The block directly above.
    pub fn above(&self) -> Self {
        self.offset(0, 1, 0)
    }

    /// The center point of the block.
    pub fn center(&self) -> Position {
        Position::new(
            self.world.clone(),
            f64::from(self.x) + 0.5,
            f64::from(self.y) + 0.5,
            f64::from(self.z) + 0.5,
        )
    }
}

// ---------------------------------------------------------------------------
// Blocks and items
// ---------------------------------------------------------------------------

/// Growth stage of an ageable block (crops, saplings, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Age {
    /// Current stage.
    pub stage: u8,
    /// Final stage.
    pub max: u8,
}

/// The contents of one cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockState {
    /// Material name as used by the host (`WHEAT`, `SUGAR_CANE`, ...).
    pub material: String,
    /// Growth stage, present only for ageable blocks.
    pub age: Option<Age>,
}

impl BlockState {
    /// A block of the given material without growth data.
    pub fn of(material: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            age: None,
        }
    }

    /// An ageable block at the given stage.
    pub fn aged(material: impl Into<String>, stage: u8, max: u8) -> Self {
        Self {
            material: material.into(),
            age: Some(Age { stage, max }),
        }
    }

    /// An empty cell.
    pub fn air() -> Self {
        Self::of("AIR")
    }

    /// Whether the cell is empty.
    pub fn is_air(&self) -> bool {
        AIR_MATERIALS
            .iter()
            .any(|air| air.eq_ignore_ascii_case(&self.material))
    }

    /// Whether the material matches (case-insensitive).
    pub fn is(&self, material: &str) -> bool {
        self.material.eq_ignore_ascii_case(material)
    }
}

/// A stack of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Material name.
    pub material: String,
    /// Number of items.
    pub amount: u32,
}

impl ItemStack {
    /// Create an item stack.
    pub fn new(material: impl Into<String>, amount: u32) -> Self {
        Self {
            material: material.into(),
            amount,
        }
    }
}

// ---------------------------------------------------------------------------
// Cosmetic effects
// ---------------------------------------------------------------------------

/// A particle burst requested from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleEffect {
    /// Particle type name (`PORTAL`, `BLOCK_CRUMBLE`, ...).
    pub kind: String,
    /// Number of particles.
    pub count: u32,
    /// Horizontal spread.
    pub spread_xz: f64,
    /// Vertical spread.
    pub spread_y: f64,
}

/// A sound requested from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundEffect {
    /// Sound name.
    pub kind: String,
    /// Volume.
    pub volume: f32,
    /// Pitch.
    pub pitch: f32,
}

// ---------------------------------------------------------------------------
// Persistence view
// ---------------------------------------------------------------------------

/// Flat, lock-free copy of one echo point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    /// Point identifier.
    pub id: ZoneId,
    /// World the point lives in.
    pub world: String,
    /// Center block X.
    pub center_x: i32,
    /// Center block Z.
    pub center_z: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time.
    pub ends_at: DateTime<Utc>,
    /// Attached distortion.
    pub distortion: Distortion,
    /// Accumulated activity.
    pub activity: u32,
    /// Activity at which the point collapses.
    pub activity_limit: u32,
}

impl ZoneRecord {
    /// Whether the record's lifetime has ended at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.ends_at
    }
}

/// Everything the persistence boundary stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSnapshot {
    /// Whether the event was running.
    pub active: bool,
    /// Event deadline, if one was set.
    pub ends_at: Option<DateTime<Utc>>,
    /// Live points.
    pub zones: Vec<ZoneRecord>,
}
