//! Integration tests for the YAML data file.
//!
//! Each test works in its own directory under the system temp dir.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use echorift_core::persist::StatePersistence;
use echorift_core::{EchoConfig, EchoEvent, EventParts, ManualClock};
use echorift_store::YamlFileStore;
use echorift_types::{Distortion, EventSnapshot, ZoneId, ZoneRecord};
use echorift_world::create_starting_world;

fn scratch_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("echorift-store-{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

fn record(distortion: Distortion, ends_in: TimeDelta) -> ZoneRecord {
    ZoneRecord {
        id: ZoneId::new(),
        world: "world".to_owned(),
        center_x: -300,
        center_z: 1200,
        created_at: noon(),
        ends_at: noon() + ends_in,
        distortion,
        activity: 7,
        activity_limit: 99,
    }
}

#[test]
fn missing_file_loads_nothing() {
    let store = YamlFileStore::new(scratch_dir().join("echorift-data.yml"));
    assert!(store.load().unwrap().is_none());
}

#[test]
fn saved_snapshot_loads_back() {
    let dir = scratch_dir();
    let store = YamlFileStore::new(dir.join("nested").join("echorift-data.yml"));
    let snapshot = EventSnapshot {
        active: true,
        ends_at: Some(noon() + TimeDelta::hours(3)),
        zones: vec![
            record(Distortion::OreDropShift, TimeDelta::minutes(20)),
            record(Distortion::PlacementDecay, TimeDelta::minutes(5)),
        ],
    };
    store.save(&snapshot).unwrap();
    assert_eq!(store.load().unwrap(), Some(snapshot));
    assert!(!dir.join("nested").join("echorift-data.yml.tmp").exists());

    let text = fs::read_to_string(store.path()).unwrap();
    assert!(text.contains("activity-limit: 99"));
    assert!(text.contains("distortion: ORE_DROP_SHIFT"));
}

#[test]
fn empty_file_is_an_inactive_event() {
    let path = scratch_dir().join("echorift-data.yml");
    fs::write(&path, "\n").unwrap();
    let loaded = YamlFileStore::new(path).load().unwrap().unwrap();
    assert_eq!(loaded, EventSnapshot::default());
}

#[test]
fn garbage_is_an_encoding_error() {
    let path = scratch_dir().join("echorift-data.yml");
    fs::write(&path, "event: [unclosed").unwrap();
    assert!(YamlFileStore::new(path).load().is_err());
}

#[tokio::test(start_paused = true)]
async fn persistent_event_survives_restart() {
    let dir = scratch_dir();
    let store: Arc<dyn StatePersistence> =
        Arc::new(YamlFileStore::new(dir.join("echorift-data.yml")));
    let clock = Arc::new(ManualClock::new(noon()));
    let mut config = EchoConfig::default();
    config.event.persistent = true;
    config.event.auto_start = false;

    let boot = |config: EchoConfig| {
        let world = Arc::new(create_starting_world().unwrap());
        EchoEvent::new(EventParts {
            config,
            config_path: None,
            host: world.clone(),
            messages: world,
            store: Some(Arc::clone(&store)),
            clock: clock.clone(),
            seed: Some(11),
        })
        .unwrap()
    };

    let first = boot(config.clone());
    first.start(Some(noon() + TimeDelta::hours(2)));
    let live = record(Distortion::HungerDrift, TimeDelta::minutes(30));
    let stale = record(Distortion::MechanicLock, TimeDelta::minutes(1));
    first.registry().insert(echorift_core::Zone::from_record(&live));
    first.registry().insert(echorift_core::Zone::from_record(&stale));
    first.shutdown(true);
    assert!(first.save());
    drop(first);

    // Two minutes later the short-lived point has expired.
    clock.advance(TimeDelta::minutes(2));
    let second = boot(config);
    second.boot();
    assert!(second.is_active());
    assert_eq!(second.registry().records(), vec![live]);
    assert_eq!(second.active_jobs().len(), 8);
}
