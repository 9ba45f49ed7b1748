//! Spawn candidate generation and validation.
//!
//! [`propose`] turns the configured coordinate mode into a candidate
//! column; [`validate`] rejects candidates that crowd an existing zone in
//! the same world. Every failure is a [`SpawnAbort`] value: the spawn job
//! logs it at debug level and waits for its next run.

use std::f64::consts::TAU;
use std::fmt;
use std::sync::Arc;

use echorift_types::{ZoneId, block_to_chunk};
use rand::Rng;
use rand::seq::IndexedRandom;

use crate::config::{CoordinateMode, PointsConfig};
use crate::host::WorldHost;
use crate::zone::Zone;

/// Chunk distance on both axes at which two zones conflict.
const CHUNK_EXCLUSION: i32 = 2;

/// A proposed zone center.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// World to spawn in.
    pub world: String,
    /// Center block X.
    pub x: i32,
    /// Center block Z.
    pub z: i32,
}

/// Why a spawn attempt did not produce a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnAbort {
    /// The event is not running.
    Inactive,
    /// The live zone count is at the configured maximum.
    AtCapacity {
        /// Live zones.
        active: usize,
        /// Configured maximum.
        max: u32,
    },
    /// No allowed world is loaded.
    NoEligibleWorld,
    /// Custom-list mode with no usable entries.
    EmptyCustomList,
    /// Near-player mode found no actor and fallback is off.
    NoEligibleActor,
    /// The candidate is closer than the minimum distance to a zone.
    TooClose {
        /// The crowded zone.
        other: ZoneId,
    },
    /// The candidate's chunk is within the exclusion window of a zone.
    ChunkConflict {
        /// The crowded zone.
        other: ZoneId,
    },
    /// No distortion is enabled with a positive weight.
    NoDistortion,
}

impl fmt::Display for SpawnAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => f.write_str("event inactive"),
            Self::AtCapacity { active, max } => write!(f, "at capacity ({active}/{max})"),
            Self::NoEligibleWorld => f.write_str("no eligible world"),
            Self::EmptyCustomList => f.write_str("custom list empty"),
            Self::NoEligibleActor => f.write_str("no eligible actor"),
            Self::TooClose { other } => write!(f, "too close to {other}"),
            Self::ChunkConflict { other } => write!(f, "chunk conflict with {other}"),
            Self::NoDistortion => f.write_str("no distortion enabled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Candidate generation
// ---------------------------------------------------------------------------

/// Propose a candidate according to the configured coordinate mode.
pub fn propose(
    points: &PointsConfig,
    host: &dyn WorldHost,
    rng: &mut impl Rng,
) -> Result<Candidate, SpawnAbort> {
    match points.mode() {
        CoordinateMode::RandomRange => {
            let world = pick_world(points, host, rng)?;
            Ok(in_rectangle(points, world, rng))
        }
        CoordinateMode::Ring => {
            let world = pick_world(points, host, rng)?;
            Ok(in_ring(points, world, rng))
        }
        CoordinateMode::CustomList => {
            let world = pick_world(points, host, rng)?;
            let (x, z) = *points
                .custom_points()
                .choose(rng)
                .ok_or(SpawnAbort::EmptyCustomList)?;
            Ok(Candidate { world, x, z })
        }
        CoordinateMode::NearPlayer => match near_actor(points, host, rng) {
            Some(candidate) => Ok(candidate),
            None if points.near_player.fallback_to_range => {
                let world = pick_world(points, host, rng)?;
                Ok(in_rectangle(points, world, rng))
            }
            None => Err(SpawnAbort::NoEligibleActor),
        },
    }
}

/// Loaded worlds that zones may appear in.
fn eligible_worlds(points: &PointsConfig, host: &dyn WorldHost) -> Vec<String> {
    let loaded = host.world_names();
    if points.allowed_worlds.is_empty() {
        return loaded;
    }
    points
        .allowed_worlds
        .iter()
        .filter(|name| loaded.contains(name))
        .cloned()
        .collect()
}

fn pick_world(
    points: &PointsConfig,
    host: &dyn WorldHost,
    rng: &mut impl Rng,
) -> Result<String, SpawnAbort> {
    eligible_worlds(points, host)
        .choose(rng)
        .cloned()
        .ok_or(SpawnAbort::NoEligibleWorld)
}

fn in_rectangle(points: &PointsConfig, world: String, rng: &mut impl Rng) -> Candidate {
    let (min_x, max_x) = points.random_range.x.ordered();
    let (min_z, max_z) = points.random_range.z.ordered();
    Candidate {
        world,
        x: rng.random_range(min_x..=max_x),
        z: rng.random_range(min_z..=max_z),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn in_ring(points: &PointsConfig, world: String, rng: &mut impl Rng) -> Candidate {
    let ring = points.ring;
    let (inner, outer) = if ring.min_radius <= ring.max_radius {
        (ring.min_radius, ring.max_radius)
    } else {
        (ring.max_radius, ring.min_radius)
    };
    let radius = f64::from(rng.random_range(inner..=outer));
    let angle: f64 = rng.random_range(0.0..TAU);
    let dx = (angle.cos() * radius).trunc() as i32;
    let dz = (angle.sin() * radius).trunc() as i32;
    Candidate {
        world,
        x: ring.center_x.saturating_add(dx),
        z: ring.center_z.saturating_add(dz),
    }
}

fn near_actor(points: &PointsConfig, host: &dyn WorldHost, rng: &mut impl Rng) -> Option<Candidate> {
    let worlds = eligible_worlds(points, host);
    let positions: Vec<_> = host
        .online_actors()
        .into_iter()
        .filter_map(|actor| host.actor_position(actor))
        .filter(|pos| worlds.contains(&pos.world))
        .collect();
    let anchor = positions.choose(rng)?.block();
    let reach = points.near_player.radius.saturating_abs();
    Some(Candidate {
        world: anchor.world,
        x: anchor.x.saturating_add(rng.random_range(-reach..=reach)),
        z: anchor.z.saturating_add(rng.random_range(-reach..=reach)),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Check a candidate against the live zones.
///
/// A candidate is rejected when a zone in the same world is closer than
/// `min_distance` (Euclidean, in blocks), or when both chunk offsets to
/// that zone's center are at most two.
pub fn validate(candidate: &Candidate, zones: &[Arc<Zone>], min_distance: f64) -> Result<(), SpawnAbort> {
    let chunk_x = block_to_chunk(candidate.x);
    let chunk_z = block_to_chunk(candidate.z);
    for zone in zones.iter().filter(|z| z.world() == candidate.world) {
        let dx = f64::from(candidate.x) - f64::from(zone.center_x());
        let dz = f64::from(candidate.z) - f64::from(zone.center_z());
        if dx.hypot(dz) < min_distance {
            return Err(SpawnAbort::TooClose { other: zone.id() });
        }
        let (zx, zz) = zone.center_chunk();
        if zx.abs_diff(chunk_x) <= CHUNK_EXCLUSION.unsigned_abs()
            && zz.abs_diff(chunk_z) <= CHUNK_EXCLUSION.unsigned_abs()
        {
            return Err(SpawnAbort::ChunkConflict { other: zone.id() });
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeDelta, Utc};
    use echorift_types::{ActorId, Distortion, Position};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::test_support::FakeHost;
    use crate::zone::NewZone;

    fn zone(world: &str, x: i32, z: i32) -> Arc<Zone> {
        let now = Utc::now();
        Arc::new(Zone::new(NewZone {
            world: world.to_owned(),
            center_x: x,
            center_z: z,
            created_at: now,
            ends_at: now + TimeDelta::minutes(20),
            distortion: Distortion::MechanicLock,
            activity_limit: 100,
        }))
    }

    fn candidate(x: i32, z: i32) -> Candidate {
        Candidate {
            world: "world".to_owned(),
            x,
            z,
        }
    }

    #[test]
    fn min_distance_rejects_close_candidates() {
        let zones = vec![zone("world", 0, 0)];
        assert!(matches!(
            validate(&candidate(100, 0), &zones, 500.0),
            Err(SpawnAbort::TooClose { .. })
        ));
        assert_eq!(validate(&candidate(600, 0), &zones, 500.0), Ok(()));
    }

    #[test]
    fn chunk_window_rejects_even_without_min_distance() {
        let zones = vec![zone("world", 0, 0)];
        // Chunk (2, 2) is inside the exclusion window, chunk (3, 0) is not.
        assert!(matches!(
            validate(&candidate(40, 40), &zones, 0.0),
            Err(SpawnAbort::ChunkConflict { .. })
        ));
        assert_eq!(validate(&candidate(48, 0), &zones, 0.0), Ok(()));
    }

    #[test]
    fn other_worlds_do_not_conflict() {
        let zones = vec![zone("world_nether", 0, 0)];
        assert_eq!(validate(&candidate(0, 0), &zones, 500.0), Ok(()));
    }

    #[test]
    fn rectangle_stays_in_bounds() {
        let host = FakeHost::new(&["world"]);
        let mut points = PointsConfig::default();
        points.random_range.x = crate::config::IntRange::new(10, -10);
        points.random_range.z = crate::config::IntRange::new(5, 5);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..500 {
            let c = propose(&points, &host, &mut rng).unwrap();
            assert!((-10..=10).contains(&c.x));
            assert_eq!(c.z, 5);
        }
    }

    #[test]
    fn ring_stays_in_annulus() {
        let host = FakeHost::new(&["world"]);
        let mut points = PointsConfig::default();
        points.coordinate_mode = "ring".to_owned();
        points.ring.center_x = 1000;
        points.ring.center_z = -1000;
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..500 {
            let c = propose(&points, &host, &mut rng).unwrap();
            let dist = f64::from(c.x - 1000).hypot(f64::from(c.z + 1000));
            // Truncation toward zero can shave up to one block per axis.
            assert!(dist >= 500.0 - 2.0 && dist <= 1500.0, "distance {dist}");
        }
    }

    #[test]
    fn custom_list_draws_from_entries() {
        let host = FakeHost::new(&["world"]);
        let mut points = PointsConfig::default();
        points.coordinate_mode = "custom-list".to_owned();
        points.custom_list = vec!["100,200".to_owned(), "bad".to_owned()];
        let mut rng = StdRng::seed_from_u64(9);
        let c = propose(&points, &host, &mut rng).unwrap();
        assert_eq!((c.x, c.z), (100, 200));

        points.custom_list = vec!["nope".to_owned()];
        assert_eq!(
            propose(&points, &host, &mut rng),
            Err(SpawnAbort::EmptyCustomList)
        );
    }

    #[test]
    fn disallowed_worlds_abort() {
        let host = FakeHost::new(&["world"]);
        let mut points = PointsConfig::default();
        points.allowed_worlds = vec!["the_end".to_owned()];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            propose(&points, &host, &mut rng),
            Err(SpawnAbort::NoEligibleWorld)
        );
    }

    #[test]
    fn near_player_uses_actor_or_falls_back() {
        let host = FakeHost::new(&["world"]);
        let mut points = PointsConfig::default();
        points.coordinate_mode = "near-player".to_owned();
        points.near_player.radius = 8;
        let mut rng = StdRng::seed_from_u64(2);

        points.near_player.fallback_to_range = false;
        assert_eq!(
            propose(&points, &host, &mut rng),
            Err(SpawnAbort::NoEligibleActor)
        );

        points.near_player.fallback_to_range = true;
        assert!(propose(&points, &host, &mut rng).is_ok());

        let actor = ActorId::new();
        host.place_actor(actor, Position::new("world", 5000.5, 64.0, -5000.5));
        let c = propose(&points, &host, &mut rng).unwrap();
        assert!((4992..=5008).contains(&c.x));
        assert!((-5009..=-4993).contains(&c.z));
    }
}
