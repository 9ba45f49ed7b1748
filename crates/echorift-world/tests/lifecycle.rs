//! End-to-end runs of the event against the in-memory world.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use echorift_core::{EchoConfig, EchoEvent, EventParts, ManualClock};
use echorift_types::{ActorId, CollapseReason, Distortion, Position};
use echorift_world::{ChatLine, InMemoryWorld, OVERWORLD, create_starting_world};

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

/// Points only at (-16, -16), in the middle of the wheat field, with a
/// single distortion enabled.
fn single_point_config(distortion: Distortion) -> EchoConfig {
    let mut config = EchoConfig::default();
    config.event.timezone = "UTC".to_owned();
    config.points.coordinate_mode = "custom-list".to_owned();
    config.points.custom_list = vec!["-16,-16".to_owned()];
    config.points.allowed_worlds = vec![OVERWORLD.to_owned()];
    config.points.max_active = 1;
    config.ore_drop_shift.enabled = distortion == Distortion::OreDropShift;
    config.mechanic_lock.enabled = distortion == Distortion::MechanicLock;
    config.random_tick_boost.enabled = distortion == Distortion::RandomTickBoost;
    config.hunger_drift.enabled = distortion == Distortion::HungerDrift;
    config.placement_decay.enabled = distortion == Distortion::PlacementDecay;
    config
}

fn event(config: EchoConfig) -> (Arc<EchoEvent>, Arc<InMemoryWorld>, Arc<ManualClock>) {
    let world = Arc::new(create_starting_world().unwrap());
    let clock = Arc::new(ManualClock::new(noon()));
    let event = EchoEvent::new(EventParts {
        config,
        config_path: None,
        host: world.clone(),
        messages: world.clone(),
        store: None,
        clock: clock.clone(),
        seed: Some(2026),
    })
    .unwrap();
    (event, world, clock)
}

fn broadcasts(world: &InMemoryWorld) -> Vec<String> {
    world
        .take_messages()
        .into_iter()
        .filter_map(|line| match line {
            ChatLine::Broadcast { text } => Some(text),
            ChatLine::Direct { .. } => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn event_ends_at_deadline_and_collapses_points() {
    let (event, world, clock) = event(single_point_config(Distortion::HungerDrift));
    event.start(Some(noon() + TimeDelta::seconds(1)));
    let zone = event.spawn_zone().unwrap();

    clock.advance(TimeDelta::seconds(2));
    // The TTL sweep first runs 40 ticks (two seconds) after start.
    tokio::time::sleep(Duration::from_millis(2100)).await;

    assert!(!event.is_active());
    assert!(event.registry().is_empty());
    assert!(zone.is_collapsed());
    assert!(event.active_jobs().is_empty());

    let config = event.config();
    let lines = broadcasts(&world);
    assert_eq!(lines.first(), Some(&config.messages.start));
    assert!(lines.contains(&config.messages.collapse_global));
    assert_eq!(lines.last(), Some(&config.messages.end));
}

#[tokio::test(start_paused = true)]
async fn periodic_spawn_fills_to_capacity() {
    let mut config = single_point_config(Distortion::MechanicLock);
    config.points.spawn_interval_seconds = 1;
    let (event, _world, _clock) = event(config);
    event.start(None);

    tokio::time::sleep(Duration::from_millis(3100)).await;
    assert_eq!(event.registry().len(), 1);
    let zone = &event.registry().zones()[0];
    assert_eq!((zone.center_x(), zone.center_z()), (-16, -16));
    assert_eq!(zone.distortion(), Distortion::MechanicLock);
}

#[tokio::test(start_paused = true)]
async fn walking_actor_enters_point_and_drives_it_to_collapse() {
    let mut config = single_point_config(Distortion::HungerDrift);
    config.points.enter_cost = 1;
    let (event, world, _clock) = event(config);
    event.start(None);
    let zone = event.spawn_zone().unwrap();
    let limit = zone.activity_limit();

    let actor = ActorId::new();
    let outside = Position::new(OVERWORLD, 400.0, 64.0, 400.0);
    let inside = Position::new(OVERWORLD, -16.0, 64.0, -16.0);
    world.join(actor, "walker", outside).unwrap();

    let from = world.move_actor(actor, inside.clone()).unwrap();
    event.on_move(actor, &from, &inside);
    assert!(event.registry().is_member(actor, zone.id()));
    let entered = world.take_messages().into_iter().any(|line| {
        line == ChatLine::Direct {
            actor,
            text: event.config().messages.enter.clone(),
        }
    });
    assert!(entered);

    // Stay charges keep landing until the limit is hit.
    for _ in 0..limit {
        event.charge_stay();
    }
    assert!(zone.is_collapsed());
    assert!(event.registry().get(zone.id()).is_none());
    assert!(event.is_active());
}

#[tokio::test(start_paused = true)]
async fn boosted_point_grows_the_wheat_field() {
    let mut config = single_point_config(Distortion::RandomTickBoost);
    config.random_tick_boost.chance = 1.0;
    let (event, world, _clock) = event(config);
    event.start(None);
    let zone = event.spawn_zone().unwrap();
    let actor = ActorId::new();
    world
        .join(actor, "farmer", Position::new(OVERWORLD, -16.0, 64.0, -16.0))
        .unwrap();

    let mut grown = 0;
    for _ in 0..5 {
        grown += event.boost_random_ticks();
    }
    assert!(grown > 0);
    assert!(world.count_blocks("WHEAT", 1) > 0);
    assert!(zone.activity() > 0 || zone.is_collapsed());
}

#[tokio::test(start_paused = true)]
async fn operator_collapse_uses_op_command_reason() {
    let (event, world, _clock) = event(single_point_config(Distortion::PlacementDecay));
    event.start(None);
    event.spawn_zone().unwrap();
    world.take_messages();

    assert_eq!(event.collapse_all(CollapseReason::OpCommand), 1);
    assert!(event.is_active());
    let lines = broadcasts(&world);
    assert_eq!(lines, vec![event.config().messages.collapse_global.clone()]);
}
