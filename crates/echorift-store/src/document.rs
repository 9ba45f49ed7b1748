//! On-disk layout of the data file.
//!
//! ```yaml
//! event:
//!   active: true
//!   ends-at: 1780358340000      # epoch millis, absent when open-ended
//! points:
//!   - id: 0190f1c2-...
//!     world: world
//!     center-x: 120
//!     center-z: -480
//!     created-at: 1780351200000
//!     ends-at: 1780352700000
//!     distortion: HUNGER_DRIFT
//!     activity: 12
//!     activity-limit: 90
//! ```
//!
//! Points are decoded one at a time. An entry missing its id, world,
//! center or a known distortion is skipped; missing timestamps fall back
//! to the load time and missing counters to zero.

use chrono::{DateTime, Utc};
use echorift_types::{Distortion, EventSnapshot, ZoneId, ZoneRecord};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// The whole data file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DataDocument {
    /// Event flags.
    #[serde(default)]
    pub event: EventSection,

    /// Raw point entries, decoded individually.
    #[serde(default)]
    pub points: Vec<serde_yml::Value>,
}

/// The `event` section.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventSection {
    /// Whether the event was running.
    #[serde(default)]
    pub active: bool,

    /// Deadline in epoch millis. Zero or negative means none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<i64>,
}

/// One entry of the `points` list.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PointEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    world: Option<String>,
    #[serde(default)]
    center_x: Option<i64>,
    #[serde(default)]
    center_z: Option<i64>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    ends_at: Option<i64>,
    #[serde(default)]
    distortion: Option<String>,
    #[serde(default)]
    activity: Option<i64>,
    #[serde(default)]
    activity_limit: Option<i64>,
}

impl DataDocument {
    /// Encode a snapshot.
    pub fn from_snapshot(snapshot: &EventSnapshot) -> Result<Self, serde_yml::Error> {
        let points = snapshot
            .zones
            .iter()
            .map(|record| serde_yml::to_value(PointEntry::from_record(record)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            event: EventSection {
                active: snapshot.active,
                ends_at: snapshot.ends_at.map(|t| t.timestamp_millis()),
            },
            points,
        })
    }

    /// Decode into a snapshot, skipping malformed points.
    ///
    /// `now` stands in for missing timestamps.
    pub fn into_snapshot(self, now: DateTime<Utc>) -> EventSnapshot {
        let total = self.points.len();
        let zones: Vec<ZoneRecord> = self
            .points
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let entry = match serde_yml::from_value::<PointEntry>(raw) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!(index, error = %e, "Skipping unreadable point entry");
                        return None;
                    }
                };
                let record = entry.into_record(now);
                if record.is_none() {
                    warn!(index, "Skipping incomplete point entry");
                }
                record
            })
            .collect();
        if zones.len() < total {
            warn!(total, kept = zones.len(), "Some stored points were dropped");
        }
        EventSnapshot {
            active: self.event.active,
            ends_at: self.event.ends_at.and_then(positive_millis),
            zones,
        }
    }
}

impl PointEntry {
    fn from_record(record: &ZoneRecord) -> Self {
        Self {
            id: Some(record.id.to_string()),
            world: Some(record.world.clone()),
            center_x: Some(i64::from(record.center_x)),
            center_z: Some(i64::from(record.center_z)),
            created_at: Some(record.created_at.timestamp_millis()),
            ends_at: Some(record.ends_at.timestamp_millis()),
            distortion: Some(record.distortion.as_str().to_owned()),
            activity: Some(i64::from(record.activity)),
            activity_limit: Some(i64::from(record.activity_limit)),
        }
    }

    fn into_record(self, now: DateTime<Utc>) -> Option<ZoneRecord> {
        let id = Uuid::parse_str(self.id?.trim()).ok()?;
        let distortion = Distortion::parse(&self.distortion?)?;
        Some(ZoneRecord {
            id: ZoneId(id),
            world: self.world?,
            center_x: i32::try_from(self.center_x?).ok()?,
            center_z: i32::try_from(self.center_z?).ok()?,
            created_at: self.created_at.and_then(millis).unwrap_or(now),
            ends_at: self.ends_at.and_then(millis).unwrap_or(now),
            distortion,
            activity: counter(self.activity),
            activity_limit: counter(self.activity_limit),
        })
    }
}

fn millis(value: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value)
}

fn positive_millis(value: i64) -> Option<DateTime<Utc>> {
    if value > 0 { millis(value) } else { None }
}

/// Clamp a stored counter into range; absent means zero.
fn counter(value: Option<i64>) -> u32 {
    value.map_or(0, |v| u32::try_from(v.max(0)).unwrap_or(u32::MAX))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
    }

    fn parse(yaml: &str) -> EventSnapshot {
        serde_yml::from_str::<DataDocument>(yaml)
            .unwrap()
            .into_snapshot(now())
    }

    #[test]
    fn reads_the_documented_layout() {
        let snapshot = parse(
            r"
event:
  active: true
  ends-at: 1780358340000
points:
  - id: 0190f1c2-7d3e-7a4b-9c1d-2e3f4a5b6c7d
    world: world
    center-x: 120
    center-z: -480
    created-at: 1780351200000
    ends-at: 1780352700000
    distortion: HUNGER_DRIFT
    activity: 12
    activity-limit: 90
",
        );
        assert!(snapshot.active);
        assert_eq!(snapshot.ends_at.unwrap().timestamp_millis(), 1_780_358_340_000);
        let zone = &snapshot.zones[0];
        assert_eq!(zone.world, "world");
        assert_eq!((zone.center_x, zone.center_z), (120, -480));
        assert_eq!(zone.distortion, Distortion::HungerDrift);
        assert_eq!((zone.activity, zone.activity_limit), (12, 90));
    }

    #[test]
    fn malformed_points_are_skipped() {
        let snapshot = parse(
            r"
event:
  active: false
points:
  - id: not-a-uuid
    world: world
    center-x: 1
    center-z: 1
    distortion: MECHANIC_LOCK
  - id: 0190f1c2-7d3e-7a4b-9c1d-2e3f4a5b6c7d
    world: world
    center-x: 1
    center-z: 1
    distortion: GRAVITY_FLIP
  - just a string
  - id: 0190f1c2-7d3e-7a4b-9c1d-2e3f4a5b6c7e
    world: world
    center-x: 5
    center-z: 6
    distortion: mechanic_lock
",
        );
        assert_eq!(snapshot.zones.len(), 1);
        let zone = &snapshot.zones[0];
        assert_eq!(zone.center_x, 5);
        assert_eq!(zone.created_at, now());
        assert_eq!(zone.ends_at, now());
        assert_eq!(zone.activity, 0);
    }

    #[test]
    fn zero_deadline_means_open_ended() {
        let snapshot = parse("event:\n  active: true\n  ends-at: 0\n");
        assert!(snapshot.active);
        assert!(snapshot.ends_at.is_none());
        assert!(snapshot.zones.is_empty());
    }

    #[test]
    fn negative_counters_clamp_to_zero() {
        assert_eq!(counter(Some(-4)), 0);
        assert_eq!(counter(None), 0);
        assert_eq!(counter(Some(i64::MAX)), u32::MAX);
    }
}
