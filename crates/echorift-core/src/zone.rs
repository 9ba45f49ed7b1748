//! The live echo point.
//!
//! Identity, location, distortion and activity limit are fixed at creation.
//! Activity and the expiry instant live behind a per-zone mutex so that the
//! registry can run its read-modify-check-act sequence without a global lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use echorift_types::{Distortion, ZoneId, ZoneRecord, block_to_chunk};

/// Chunks a zone reaches below its center chunk on each axis.
const REACH_BELOW: i32 = 1;

/// Chunks a zone reaches above its center chunk on each axis.
const REACH_ABOVE: i32 = 2;

/// Parameters for a new zone.
#[derive(Debug, Clone)]
pub struct NewZone {
    /// World the zone lives in.
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
    /// Activity at which the zone collapses.
    pub activity_limit: u32,
}

/// Mutable part of a zone.
#[derive(Debug)]
pub(crate) struct ZoneState {
    pub(crate) activity: u32,
    pub(crate) ends_at: DateTime<Utc>,
}

/// A live echo point.
#[derive(Debug)]
pub struct Zone {
    id: ZoneId,
    world: String,
    center_x: i32,
    center_z: i32,
    created_at: DateTime<Utc>,
    distortion: Distortion,
    activity_limit: u32,
    state: Mutex<ZoneState>,
    collapsed: AtomicBool,
}

impl Zone {
    /// Create a fresh zone with zero activity.
    pub fn new(params: NewZone) -> Self {
        Self {
            id: ZoneId::new(),
            world: params.world,
            center_x: params.center_x,
            center_z: params.center_z,
            created_at: params.created_at,
            distortion: params.distortion,
            activity_limit: params.activity_limit,
            state: Mutex::new(ZoneState {
                activity: 0,
                ends_at: params.ends_at,
            }),
            collapsed: AtomicBool::new(false),
        }
    }

    /// Rebuild a zone from its persisted record.
    pub fn from_record(record: &ZoneRecord) -> Self {
        Self {
            id: record.id,
            world: record.world.clone(),
            center_x: record.center_x,
            center_z: record.center_z,
            created_at: record.created_at,
            distortion: record.distortion,
            activity_limit: record.activity_limit,
            state: Mutex::new(ZoneState {
                activity: record.activity,
                ends_at: record.ends_at,
            }),
            collapsed: AtomicBool::new(false),
        }
    }

    /// Zone identifier.
    pub const fn id(&self) -> ZoneId {
        self.id
    }

    /// World the zone lives in.
    pub fn world(&self) -> &str {
        &self.world
    }

    /// Center block X.
    pub const fn center_x(&self) -> i32 {
        self.center_x
    }

    /// Center block Z.
    pub const fn center_z(&self) -> i32 {
        self.center_z
    }

    /// Chunk coordinates of the center block.
    pub const fn center_chunk(&self) -> (i32, i32) {
        (block_to_chunk(self.center_x), block_to_chunk(self.center_z))
    }

    /// Creation time.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Attached distortion.
    pub const fn distortion(&self) -> Distortion {
        self.distortion
    }

    /// Activity at which the zone collapses.
    pub const fn activity_limit(&self) -> u32 {
        self.activity_limit
    }

    /// Current activity.
    pub fn activity(&self) -> u32 {
        self.lock_state().activity
    }

    /// Current expiry time.
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.lock_state().ends_at
    }

    /// Whether the zone's lifetime has ended at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.ends_at()
    }

    /// Push the expiry time back by `extra` and return the new deadline.
    pub fn extend(&self, extra: TimeDelta) -> DateTime<Utc> {
        let mut state = self.lock_state();
        if let Some(later) = state.ends_at.checked_add_signed(extra) {
            state.ends_at = later;
        }
        state.ends_at
    }

    /// Whether the chunk lies inside the zone.
    ///
    /// The footprint spans one chunk below and two chunks above the center
    /// chunk on each axis.
    pub fn contains(&self, world: &str, chunk_x: i32, chunk_z: i32) -> bool {
        if self.world != world {
            return false;
        }
        let (cx, cz) = self.center_chunk();
        (cx.saturating_sub(REACH_BELOW)..=cx.saturating_add(REACH_ABOVE)).contains(&chunk_x)
            && (cz.saturating_sub(REACH_BELOW)..=cz.saturating_add(REACH_ABOVE)).contains(&chunk_z)
    }

    /// Whether the zone has been removed from its registry.
    pub fn is_collapsed(&self) -> bool {
        self.collapsed.load(Ordering::Acquire)
    }

    /// Flat copy of the zone.
    pub fn record(&self) -> ZoneRecord {
        let state = self.lock_state();
        ZoneRecord {
            id: self.id,
            world: self.world.clone(),
            center_x: self.center_x,
            center_z: self.center_z,
            created_at: self.created_at,
            ends_at: state.ends_at,
            distortion: self.distortion,
            activity: state.activity,
            activity_limit: self.activity_limit,
        }
    }

    pub(crate) fn mark_collapsed(&self) {
        self.collapsed.store(true, Ordering::Release);
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ZoneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
