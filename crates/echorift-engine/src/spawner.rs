//! Wandering actors that keep the headless event busy.
//!
//! At startup a handful of actors join the overworld. Every step each one
//! walks a little, usually at random but sometimes towards the nearest
//! live echo point, and occasionally does something the distortions react
//! to: breaking ore, placing a block, opening a workbench or sleeping.
//! Verdicts from the handlers are applied to the in-memory world.

use std::sync::Arc;

use echorift_core::config::EchoConfig;
use echorift_core::host::WorldHost;
use echorift_core::listener::{Denial, Verdict};
use echorift_core::EchoEvent;
use echorift_types::{ActorId, BlockPos, BlockState, Position};
use echorift_world::{GROUND_Y, InMemoryWorld, OVERWORLD};
use rand::Rng;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::EngineError;

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// Wanderer settings, read from the `wanderers` section of
/// `echorift-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WandererConfig {
    /// Actors spawned at startup.
    #[serde(default = "default_count")]
    pub count: u32,

    /// Ticks between steps.
    #[serde(default = "default_step_ticks")]
    pub step_ticks: u32,

    /// Longest stride per step, in blocks.
    #[serde(default = "default_stride")]
    pub stride: f64,

    /// Half-width of the square actors spawn in.
    #[serde(default = "default_spawn_radius")]
    pub spawn_radius: f64,

    /// Probability a step heads for the nearest echo point.
    #[serde(default = "default_seek_chance")]
    pub seek_chance: f64,

    /// Probability a step ends with an interaction.
    #[serde(default = "default_act_chance")]
    pub act_chance: f64,
}

impl Default for WandererConfig {
    fn default() -> Self {
        Self {
            count: default_count(),
            step_ticks: default_step_ticks(),
            stride: default_stride(),
            spawn_radius: default_spawn_radius(),
            seek_chance: default_seek_chance(),
            act_chance: default_act_chance(),
        }
    }
}

const fn default_count() -> u32 {
    6
}

const fn default_step_ticks() -> u32 {
    10
}

const fn default_stride() -> f64 {
    6.0
}

const fn default_spawn_radius() -> f64 {
    600.0
}

const fn default_seek_chance() -> f64 {
    0.6
}

const fn default_act_chance() -> f64 {
    0.15
}

// -----------------------------------------------------------------------
// Name pool
// -----------------------------------------------------------------------

/// Built-in pool of wanderer names.
const NAME_POOL: &[&str] = &[
    "Alder", "Birch", "Cedar", "Dusk", "Ember", "Fern", "Grove", "Haze", "Iris", "Juniper",
    "Kestrel", "Lark", "Moss", "Nettle", "Oak", "Pine", "Quill", "Reed", "Sage", "Thorn",
];

/// Inventory types a wanderer may try to open.
const INVENTORIES: &[&str] = &["WORKBENCH", "FURNACE", "CHEST", "ANVIL", "BARREL"];

/// Blocks a wanderer may click.
const CLICKABLE: &[&str] = &["CRAFTING_TABLE", "FURNACE", "LEVER", "CHEST"];

/// Something a wanderer does at the end of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    BreakOre,
    PlaceBlock,
    OpenInventory,
    Interact,
    Sleep,
}

const ACTIONS: [Action; 5] = [
    Action::BreakOre,
    Action::PlaceBlock,
    Action::OpenInventory,
    Action::Interact,
    Action::Sleep,
];

// -----------------------------------------------------------------------
// Wanderers
// -----------------------------------------------------------------------

/// The population of wandering actors.
#[derive(Debug)]
pub struct Wanderers {
    config: WandererConfig,
    actors: Vec<ActorId>,
}

impl Wanderers {
    /// Join `config.count` actors at random overworld positions.
    pub fn spawn(
        config: WandererConfig,
        world: &InMemoryWorld,
        rng: &mut impl Rng,
    ) -> Result<Self, EngineError> {
        let radius = config.spawn_radius.abs().max(1.0);
        let count = usize::try_from(config.count).unwrap_or(usize::MAX);
        let mut actors = Vec::new();
        for name in NAME_POOL.iter().cycle().take(count) {
            let actor = ActorId::new();
            let position = Position::new(
                OVERWORLD,
                rng.random_range(-radius..=radius),
                f64::from(GROUND_Y),
                rng.random_range(-radius..=radius),
            );
            world.join(actor, name, position)?;
            actors.push(actor);
        }
        info!(count = actors.len(), "Wanderers spawned");
        Ok(Self { config, actors })
    }

    /// Ticks between steps.
    pub const fn step_ticks(&self) -> u32 {
        self.config.step_ticks
    }

    /// Actors in the population.
    pub fn actors(&self) -> &[ActorId] {
        &self.actors
    }

    /// Move every actor once and feed the moves to the event.
    pub fn step(&self, event: &Arc<EchoEvent>, world: &InMemoryWorld, rng: &mut impl Rng) {
        let config = event.config();
        for &actor in &self.actors {
            let Some(from) = world.actor_position(actor) else {
                continue;
            };
            let to = self.next_position(event, &from, rng);
            match world.move_actor(actor, to.clone()) {
                Ok(previous) => event.on_move(actor, &previous, &to),
                Err(e) => {
                    warn!(actor = %actor, error = %e, "Wanderer could not move");
                    continue;
                }
            }
            let action = (rng.random::<f64>() < self.config.act_chance)
                .then(|| ACTIONS.choose(rng).copied())
                .flatten();
            if let Some(action) = action {
                act(event, world, &config, actor, &to, action, rng);
            }
        }
    }

    /// Take every wanderer offline.
    pub fn leave_all(&self, event: &EchoEvent, world: &InMemoryWorld) {
        for &actor in &self.actors {
            event.on_quit(actor);
            world.leave(actor);
        }
    }

    fn next_position(&self, event: &EchoEvent, from: &Position, rng: &mut impl Rng) -> Position {
        let stride = self.config.stride.abs().max(1.0);
        let target = (rng.random::<f64>() < self.config.seek_chance)
            .then(|| nearest_zone(event, from))
            .flatten();
        let (dx, dz) = match target {
            Some((tx, tz)) => {
                let (vx, vz) = (tx - from.x, tz - from.z);
                let distance = vx.hypot(vz);
                if distance <= stride {
                    (vx, vz)
                } else {
                    (vx / distance * stride, vz / distance * stride)
                }
            }
            None => (
                rng.random_range(-stride..=stride),
                rng.random_range(-stride..=stride),
            ),
        };
        Position::new(from.world.clone(), from.x + dx, from.y, from.z + dz)
    }
}

/// Center of the closest live echo point in the same world.
fn nearest_zone(event: &EchoEvent, from: &Position) -> Option<(f64, f64)> {
    event
        .registry()
        .zones()
        .into_iter()
        .filter(|zone| zone.world() == from.world)
        .map(|zone| (f64::from(zone.center_x()), f64::from(zone.center_z())))
        .min_by(|a, b| {
            let da = (a.0 - from.x).hypot(a.1 - from.z);
            let db = (b.0 - from.x).hypot(b.1 - from.z);
            da.total_cmp(&db)
        })
}

/// Perform one interaction and apply the verdict.
fn act(
    event: &Arc<EchoEvent>,
    world: &InMemoryWorld,
    config: &EchoConfig,
    actor: ActorId,
    at: &Position,
    action: Action,
    rng: &mut impl Rng,
) {
    let feet = at.block();
    match action {
        Action::BreakOre => {
            let ores: Vec<&String> = config.ore_drop_shift.mappings.keys().collect();
            let Some(ore) = ores.choose(rng) else {
                return;
            };
            let block = feet.offset(0, -1, 0);
            match event.on_block_drop(actor, &block, ore) {
                Some(shift) => {
                    if let Err(e) = world.drop_item(&block, &shift.item) {
                        warn!(error = %e, "Shifted drop failed");
                    }
                    debug!(actor = %actor, ore = %ore, tool_damage = shift.tool_damage, "Ore broken, drop shifted");
                }
                None => debug!(actor = %actor, ore = %ore, "Ore broken"),
            }
        }
        Action::PlaceBlock => {
            let Some(material) = config.placement_decay.whitelist.choose(rng) else {
                return;
            };
            let target = feet.offset(1, 0, 0);
            place(event, world, actor, &target, material);
        }
        Action::OpenInventory => {
            if let Some(kind) = INVENTORIES.choose(rng) {
                apply(world, actor, &event.on_inventory_open(actor, at, kind));
            }
        }
        Action::Interact => {
            if let Some(material) = CLICKABLE.choose(rng) {
                apply(world, actor, &event.on_interact(actor, at, material));
            }
        }
        Action::Sleep => {
            apply(world, actor, &event.on_bed_enter(actor, &feet));
        }
    }
}

/// Place a block, undoing it when the event refuses the placement.
fn place(event: &Arc<EchoEvent>, world: &InMemoryWorld, actor: ActorId, target: &BlockPos, material: &str) {
    if let Err(e) = world.set_block(target, BlockState::of(material)) {
        warn!(error = %e, "Placement failed");
        return;
    }
    let verdict = event.on_block_place(actor, target, material);
    if verdict.is_denied() {
        let undone = world.set_block(target, BlockState::air());
        if let Err(e) = undone {
            warn!(error = %e, "Undoing refused placement failed");
        }
    }
    apply(world, actor, &verdict);
}

/// Apply a refusal: push the actor back along the x axis.
fn apply(world: &InMemoryWorld, actor: ActorId, verdict: &Verdict) {
    let Verdict::Deny(Denial {
        substitute,
        knockback,
    }) = verdict
    else {
        return;
    };
    debug!(actor = %actor, ?substitute, "Showing substitute inventory");
    let Some(push) = knockback else {
        return;
    };
    if let Some(pos) = world.actor_position(actor) {
        let pushed = Position::new(pos.world.clone(), pos.x - push.strength, pos.y + push.lift, pos.z);
        if let Err(e) = world.move_actor(actor, pushed) {
            warn!(actor = %actor, error = %e, "Knockback failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use echorift_core::{EventParts, ManualClock};
    use echorift_world::create_starting_world;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn wanderer_section_parses_with_defaults() {
        let config: WandererConfig = serde_yml::from_str("count: 2\nstride: 3.5\n").unwrap();
        assert_eq!(config.count, 2);
        assert!((config.stride - 3.5).abs() < f64::EPSILON);
        assert_eq!(config.step_ticks, default_step_ticks());
    }

    #[test]
    fn spawn_joins_every_wanderer() {
        let world = create_starting_world().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let config = WandererConfig {
            count: 4,
            ..WandererConfig::default()
        };
        let wanderers = Wanderers::spawn(config, &world, &mut rng).unwrap();
        assert_eq!(wanderers.actors().len(), 4);
        assert_eq!(world.actor_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn seekers_walk_into_live_points() {
        let world = Arc::new(create_starting_world().unwrap());
        let mut config = EchoConfig::default();
        config.points.coordinate_mode = "custom-list".to_owned();
        config.points.custom_list = vec!["0,0".to_owned()];
        config.points.allowed_worlds = vec![OVERWORLD.to_owned()];
        let event = EchoEvent::new(EventParts {
            config,
            config_path: None,
            host: world.clone(),
            messages: world.clone(),
            store: None,
            clock: Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap(),
            )),
            seed: Some(8),
        })
        .unwrap();
        event.start(None);
        let zone = event.spawn_zone().unwrap();

        let mut rng = StdRng::seed_from_u64(8);
        let wanderers = Wanderers::spawn(
            WandererConfig {
                count: 1,
                spawn_radius: 40.0,
                seek_chance: 1.0,
                act_chance: 0.0,
                ..WandererConfig::default()
            },
            &world,
            &mut rng,
        )
        .unwrap();
        for _ in 0..20 {
            wanderers.step(&event, &world, &mut rng);
        }
        let actor = wanderers.actors().first().copied().unwrap();
        assert!(event.registry().is_member(actor, zone.id()) || zone.is_collapsed());
    }
}
