//! Bodies of the periodic and delayed jobs.
//!
//! Each job takes a fresh configuration snapshot, works over a snapshot of
//! zones or actors, and tolerates zones vanishing underneath it. Host
//! failures are logged and the job moves on to the next item.

use std::sync::Arc;

use chrono::TimeDelta;
use echorift_types::{
    ActorId, BlockPos, BlockState, CollapseReason, Distortion, ItemStack, ParticleEffect, Position,
    SoundEffect, ZoneId,
};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

use crate::clock::seconds_to_ticks;
use crate::config::{ParticleConfig, SoundConfig};
use crate::distortion::DistortionWheel;
use crate::host::{HostError, broadcast_message};
use crate::lifecycle::EchoEvent;
use crate::placement::{self, SpawnAbort};
use crate::zone::{NewZone, Zone};

/// Horizontal reach of a tick boost check around the actor.
const BOOST_REACH_XZ: i32 = 4;

/// Vertical reach of a tick boost check around the actor.
const BOOST_REACH_Y: i32 = 1;

/// Vertical spread of ambient particles.
const AMBIENT_SPREAD_Y: f64 = 1.0;

impl EchoEvent {
    // -----------------------------------------------------------------------
    // Spawning and expiry
    // -----------------------------------------------------------------------

    /// Attempt to spawn one zone.
    ///
    /// Used both by the periodic spawn job and the operator's forced spawn;
    /// only a running event can spawn.
    pub fn spawn_zone(&self) -> Result<Arc<Zone>, SpawnAbort> {
        if !self.is_active() {
            return Err(SpawnAbort::Inactive);
        }
        let _serial = self
            .spawn_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let config = self.config();
        let points = &config.points;

        let active = self.registry.len();
        if active >= usize::try_from(points.max_active).unwrap_or(usize::MAX) {
            return Err(SpawnAbort::AtCapacity {
                active,
                max: points.max_active,
            });
        }

        let candidate =
            self.with_rng(|rng| placement::propose(points, self.host.as_ref(), rng))?;
        placement::validate(&candidate, &self.registry.zones(), points.min_distance_blocks)?;

        let wheel = DistortionWheel::from_config(&config);
        let (ttl_min, ttl_max) = points.ttl_seconds.ordered();
        let (limit_min, limit_max) = points.activity_limit.ordered();
        let (distortion, ttl, limit) = self.with_rng(|rng| {
            (
                wheel.choose(rng),
                rng.random_range(ttl_min..=ttl_max),
                rng.random_range(limit_min..=limit_max),
            )
        });
        let distortion = distortion.ok_or(SpawnAbort::NoDistortion)?;

        let now = self.clock.now();
        let ends_at = now
            .checked_add_signed(TimeDelta::seconds(i64::from(ttl)))
            .unwrap_or(now);
        let zone = self.registry.insert(Zone::new(NewZone {
            world: candidate.world,
            center_x: candidate.x,
            center_z: candidate.z,
            created_at: now,
            ends_at,
            distortion,
            activity_limit: limit,
        }));
        info!(
            zone_id = %zone.id(),
            world = zone.world(),
            x = zone.center_x(),
            z = zone.center_z(),
            distortion = %distortion,
            ttl_seconds = ttl,
            activity_limit = limit,
            "Echo point spawned"
        );
        Ok(zone)
    }

    /// Stop the event past its deadline, otherwise collapse expired zones.
    pub fn sweep_ttl(&self) {
        if !self.is_active() {
            return;
        }
        let now = self.clock.now();
        if self.ends_at().is_some_and(|deadline| now > deadline) {
            info!("Event deadline reached");
            self.stop();
            return;
        }
        for zone in self.registry.zones() {
            if zone.is_expired(now) {
                self.registry.collapse(zone.id(), CollapseReason::Ttl);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Messages and ambience
    // -----------------------------------------------------------------------

    /// Broadcast the hint prefix followed by a random hint.
    pub fn broadcast_hint(&self) {
        if !self.is_active() {
            return;
        }
        let config = self.config();
        let Some(hint) = self.with_rng(|rng| config.messages.hints.choose(rng).cloned()) else {
            return;
        };
        debug!("Broadcasting hint");
        let text = format!("{}{hint}", config.messages.hint_prefix);
        broadcast_message(self.messages.as_ref(), &text);
    }

    /// Emit the ambient particle burst at every zone center.
    pub fn emit_particles(&self) {
        if !self.is_active() {
            return;
        }
        let config = self.config();
        let effect = particle_effect(&config.zone_effects.particle, AMBIENT_SPREAD_Y);
        for zone in self.registry.zones() {
            let Some(at) = self.zone_anchor(&zone) else {
                continue;
            };
            if let Err(e) = self.host.spawn_particles(&at, &effect) {
                warn!(zone_id = %zone.id(), error = %e, "Ambient particles failed");
            }
        }
    }

    /// Play the ambient sound at every zone center.
    pub fn emit_sounds(&self) {
        if !self.is_active() {
            return;
        }
        let config = self.config();
        let sound = sound_effect(&config.zone_effects.sound);
        for zone in self.registry.zones() {
            let Some(at) = self.zone_anchor(&zone) else {
                continue;
            };
            if let Err(e) = self.host.play_sound(&at, &sound) {
                warn!(zone_id = %zone.id(), error = %e, "Ambient sound failed");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Actor-driven activity
    // -----------------------------------------------------------------------

    /// Charge the stay cost for every online actor standing in a zone.
    pub fn charge_stay(&self) {
        if !self.is_active() {
            return;
        }
        let cost = self.config().points.stay_cost;
        if cost <= 0 {
            return;
        }
        for (actor, _, zone) in self.actors_in_zones() {
            debug!(actor = %actor, zone_id = %zone.id(), "Stay activity");
            self.registry.add_activity(zone.id(), cost);
        }
    }

    /// Nudge the hunger of actors standing in hunger drift zones.
    pub fn drift_hunger(&self) {
        let config = self.config();
        let drift = &config.hunger_drift;
        if !self.is_active() || !drift.enabled {
            return;
        }
        for (actor, _, zone) in self.actors_in_zones() {
            if zone.distortion() != Distortion::HungerDrift {
                continue;
            }
            if let Err(e) = self.host.add_exhaustion(actor, drift.exhaustion_delta) {
                warn!(actor = %actor, error = %e, "Hunger drift failed");
                continue;
            }
            debug!(actor = %actor, delta = drift.exhaustion_delta, "Hunger drift");
            self.registry.add_activity(zone.id(), drift.activity_gain);
        }
    }

    /// Check random cells around actors in tick boost zones and grow crops.
    ///
    /// Each actor gets at most `checks-per-player` checks and the round as a
    /// whole at most `max-checks-per-tick`. Returns how many cells grew.
    pub fn boost_random_ticks(&self) -> u32 {
        let config = self.config();
        let boost = &config.random_tick_boost;
        if !self.is_active() || !boost.enabled {
            return 0;
        }
        let mut remaining = i64::from(boost.max_checks_per_tick);
        let mut grown = 0_u32;

        for (actor, pos, zone) in self.actors_in_zones() {
            if remaining <= 0 {
                break;
            }
            if zone.distortion() != Distortion::RandomTickBoost {
                continue;
            }
            let base = pos.block();
            for _ in 0..boost.checks_per_player {
                if remaining <= 0 {
                    break;
                }
                remaining = remaining.saturating_sub(1);

                let (dx, dy, dz, roll) = self.with_rng(|rng| {
                    (
                        rng.random_range(-BOOST_REACH_XZ..=BOOST_REACH_XZ),
                        rng.random_range(-BOOST_REACH_Y..=BOOST_REACH_Y),
                        rng.random_range(-BOOST_REACH_XZ..=BOOST_REACH_XZ),
                        rng.random::<f64>(),
                    )
                });
                let target = base.offset(dx, dy, dz);
                let state = match self.host.block(&target) {
                    Ok(state) => state,
                    Err(e) => {
                        warn!(error = %e, "Tick boost check failed");
                        continue;
                    }
                };
                if !boost.boosts(&state.material) || roll > boost.chance {
                    continue;
                }
                match self.grow(&target, &state, boost.grows_vertically(&state.material)) {
                    Ok(true) => {
                        debug!(actor = %actor, x = target.x, y = target.y, z = target.z, "Boosted growth");
                        grown = grown.saturating_add(1);
                        self.registry.add_activity(zone.id(), boost.activity_gain);
                    }
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "Tick boost growth failed"),
                }
            }
        }
        grown
    }

    /// Advance an ageable block one stage, or extend a vertical crop upward.
    fn grow(&self, target: &BlockPos, state: &BlockState, vertical: bool) -> Result<bool, HostError> {
        if let Some(age) = state.age {
            if age.stage >= age.max {
                return Ok(false);
            }
            let next = BlockState::aged(state.material.clone(), age.stage.saturating_add(1), age.max);
            self.host.set_block(target, next)?;
            return Ok(true);
        }
        if vertical {
            let above = target.above();
            if self.host.block(&above)?.is_air() {
                self.host.set_block(&above, BlockState::of(state.material.clone()))?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    // -----------------------------------------------------------------------
    // Placement decay
    // -----------------------------------------------------------------------

    /// Schedule a placed block to crumble after the configured delay.
    pub fn schedule_decay(
        self: &Arc<Self>,
        zone: ZoneId,
        actor: ActorId,
        pos: BlockPos,
        material: String,
    ) {
        let delay = seconds_to_ticks(self.config().placement_decay.delay_seconds);
        let weak = Arc::downgrade(self);
        self.scheduler.delayed("placement-decay", delay, move || {
            if let Some(event) = weak.upgrade() {
                event.run_decay(zone, actor, &pos, &material);
            }
        });
    }

    /// Crumble a placed block if its zone is alive and the cell still holds
    /// the placed material. Returns whether the block was cleared.
    pub fn run_decay(&self, zone: ZoneId, actor: ActorId, pos: &BlockPos, material: &str) -> bool {
        if self.registry.get(zone).is_none() {
            return false;
        }
        match self.host.block(pos) {
            Ok(state) if state.is(material) => {}
            Ok(_) => return false,
            Err(e) => {
                warn!(error = %e, "Decay check failed");
                return false;
            }
        }
        if let Err(e) = self.host.set_block(pos, BlockState::air()) {
            warn!(error = %e, "Decay clear failed");
            return false;
        }

        let config = self.config();
        let decay = &config.placement_decay;
        let center = pos.center();
        let effect = particle_effect(&decay.particles, decay.particles.radius);
        if let Err(e) = self.host.spawn_particles(&center, &effect) {
            warn!(error = %e, "Decay particles failed");
        }
        if let Err(e) = self.host.play_sound(&center, &sound_effect(&decay.sound)) {
            warn!(error = %e, "Decay sound failed");
        }
        if decay.return_item {
            self.return_item(actor, pos, &ItemStack::new(material, 1));
        }
        debug!(zone_id = %zone, x = pos.x, y = pos.y, z = pos.z, "Placement decayed");
        self.registry.add_activity(zone, decay.activity_gain);
        true
    }

    /// Give an item to an actor, dropping whatever does not fit or the
    /// whole item when the actor is offline.
    fn return_item(&self, actor: ActorId, pos: &BlockPos, item: &ItemStack) {
        let leftover = if self.host.actor_position(actor).is_some() {
            match self.host.give_item(actor, item) {
                Ok(leftover) => leftover,
                Err(e) => {
                    debug!(actor = %actor, error = %e, "Give failed, dropping instead");
                    Some(item.clone())
                }
            }
        } else {
            Some(item.clone())
        };
        let dropped = leftover.map_or(Ok(()), |rest| self.host.drop_item(pos, &rest));
        if let Err(e) = dropped {
            warn!(error = %e, "Dropping returned item failed");
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// The zone covering a position, if any.
    pub fn zone_at(&self, pos: &Position) -> Option<Arc<Zone>> {
        let (chunk_x, chunk_z) = pos.chunk();
        self.registry.find_containing(&pos.world, chunk_x, chunk_z)
    }

    /// Online actors currently standing in a zone.
    pub(crate) fn actors_in_zones(&self) -> Vec<(ActorId, Position, Arc<Zone>)> {
        self.host
            .online_actors()
            .into_iter()
            .filter_map(|actor| {
                let pos = self.host.actor_position(actor)?;
                let zone = self.zone_at(&pos)?;
                Some((actor, pos, zone))
            })
            .collect()
    }

    /// Where ambient effects for a zone are emitted.
    fn zone_anchor(&self, zone: &Zone) -> Option<Position> {
        let y = self.host.spawn_height(zone.world())?;
        Some(Position::new(
            zone.world(),
            f64::from(zone.center_x()),
            y,
            f64::from(zone.center_z()),
        ))
    }
}

fn particle_effect(config: &ParticleConfig, spread_y: f64) -> ParticleEffect {
    ParticleEffect {
        kind: config.kind.clone(),
        count: config.count,
        spread_xz: config.radius,
        spread_y,
    }
}

fn sound_effect(config: &SoundConfig) -> SoundEffect {
    SoundEffect {
        kind: config.kind.clone(),
        volume: config.volume,
        pitch: config.pitch,
    }
}
