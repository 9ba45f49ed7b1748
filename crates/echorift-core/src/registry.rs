//! The live zone registry.
//!
//! The registry exclusively owns every live [`Zone`] and the actor-to-zone
//! membership sets. It exposes only atomic operations: the raw maps never
//! leave this module.
//!
//! # Concurrency
//!
//! Both maps are sharded [`DashMap`]s, so there is no lock spanning zones.
//! A map guard is never held while a zone's own mutex is taken: lookups
//! clone the `Arc<Zone>` out and release the shard first. Removal from the
//! zone map is the single point that decides which caller collapses a
//! zone, which makes [`ZoneRegistry::collapse`] idempotent.

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use echorift_types::{ActorId, CollapseReason, ZoneId, ZoneRecord};
use tracing::{debug, info};

use crate::zone::Zone;

/// Receives every successful collapse exactly once.
pub trait CollapseObserver: Send + Sync {
    /// Called after `zone` has left the registry.
    ///
    /// The caller may hold the zone's state lock, so implementations must
    /// stick to the zone's immutable accessors (id, world, center,
    /// distortion, limit).
    fn on_collapse(&self, zone: &Zone, reason: CollapseReason);
}

/// Result of [`ZoneRegistry::add_activity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    /// The amount was zero or negative; nothing changed.
    Ignored,
    /// The zone is not (or no longer) live.
    Missing,
    /// Activity was added and the zone is still below its limit.
    Recorded {
        /// Activity after the addition.
        activity: u32,
        /// The zone's limit.
        limit: u32,
    },
    /// Activity reached the limit and the zone collapsed.
    Collapsed {
        /// Activity after the addition.
        activity: u32,
    },
}

/// Concurrent store of live zones and actor memberships.
pub struct ZoneRegistry {
    zones: DashMap<ZoneId, Arc<Zone>>,
    members: DashMap<ActorId, BTreeSet<ZoneId>>,
    observer: Arc<dyn CollapseObserver>,
}

impl std::fmt::Debug for ZoneRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneRegistry")
            .field("zones", &self.zones.len())
            .field("members", &self.members.len())
            .finish_non_exhaustive()
    }
}

impl ZoneRegistry {
    /// Create an empty registry that reports collapses to `observer`.
    pub fn new(observer: Arc<dyn CollapseObserver>) -> Self {
        Self {
            zones: DashMap::new(),
            members: DashMap::new(),
            observer,
        }
    }

    /// Add a zone. A zone with the same id is replaced.
    pub fn insert(&self, zone: Zone) -> Arc<Zone> {
        let zone = Arc::new(zone);
        self.zones.insert(zone.id(), Arc::clone(&zone));
        zone
    }

    /// Look up a live zone.
    pub fn get(&self, id: ZoneId) -> Option<Arc<Zone>> {
        self.zones.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of live zones.
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether no zone is live.
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Snapshot of every live zone, oldest id first.
    pub fn zones(&self) -> Vec<Arc<Zone>> {
        let mut zones: Vec<_> = self
            .zones
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        zones.sort_by_key(|zone| zone.id());
        zones
    }

    /// Flat copies of every live zone, oldest id first.
    pub fn records(&self) -> Vec<ZoneRecord> {
        self.zones().iter().map(|zone| zone.record()).collect()
    }

    /// The zone covering a chunk, preferring the oldest id when several do.
    pub fn find_containing(&self, world: &str, chunk_x: i32, chunk_z: i32) -> Option<Arc<Zone>> {
        self.zones
            .iter()
            .filter(|entry| entry.value().contains(world, chunk_x, chunk_z))
            .min_by_key(|entry| *entry.key())
            .map(|entry| Arc::clone(entry.value()))
    }

    // -----------------------------------------------------------------------
    // Collapse and activity
    // -----------------------------------------------------------------------

    /// Remove a zone, purge its memberships and notify the observer.
    ///
    /// Returns `false` when the zone was already gone; in that case nothing
    /// is notified.
    pub fn collapse(&self, id: ZoneId, reason: CollapseReason) -> bool {
        let Some((_, zone)) = self.zones.remove(&id) else {
            return false;
        };
        zone.mark_collapsed();
        self.members.retain(|_, zones| {
            zones.remove(&id);
            !zones.is_empty()
        });
        info!(
            zone_id = %id,
            world = zone.world(),
            distortion = %zone.distortion(),
            reason = %reason,
            "Echo point collapsed"
        );
        self.observer.on_collapse(&zone, reason);
        true
    }

    /// Collapse every live zone. Returns how many were collapsed.
    pub fn collapse_all(&self, reason: CollapseReason) -> usize {
        let ids: Vec<ZoneId> = self.zones.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter(|id| self.collapse(*id, reason))
            .count()
    }

    /// Add activity to a zone, collapsing it when the limit is reached.
    ///
    /// The increment, the limit check and the collapse happen under the
    /// zone's own lock, so concurrent callers see a linear history and at
    /// most one of them collapses the zone.
    pub fn add_activity(&self, id: ZoneId, amount: i32) -> ActivityOutcome {
        let Ok(gain) = u32::try_from(amount) else {
            return ActivityOutcome::Ignored;
        };
        if gain == 0 {
            return ActivityOutcome::Ignored;
        }
        let Some(zone) = self.get(id) else {
            return ActivityOutcome::Missing;
        };

        let mut state = zone.lock_state();
        if zone.is_collapsed() || !self.zones.contains_key(&id) {
            return ActivityOutcome::Missing;
        }
        state.activity = state.activity.saturating_add(gain);
        let activity = state.activity;
        let limit = zone.activity_limit();
        debug!(zone_id = %id, gain, activity, limit, "Activity recorded");

        if activity >= limit {
            // Still holding the zone lock: no increment can slip in
            // between the check and the removal.
            self.collapse(id, CollapseReason::Activity);
            drop(state);
            return ActivityOutcome::Collapsed { activity };
        }
        ActivityOutcome::Recorded { activity, limit }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Record that `actor` is inside `zone`.
    ///
    /// Returns `true` only for a new membership in a live zone.
    pub fn enter(&self, actor: ActorId, zone: ZoneId) -> bool {
        if !self.zones.contains_key(&zone) {
            return false;
        }
        let added = self.members.entry(actor).or_default().insert(zone);
        if added && !self.zones.contains_key(&zone) {
            // Collapsed while we were inserting.
            self.exit(actor, zone);
            return false;
        }
        added
    }

    /// Record that `actor` left `zone`.
    pub fn exit(&self, actor: ActorId, zone: ZoneId) {
        self.members.remove_if_mut(&actor, |_, zones| {
            zones.remove(&zone);
            zones.is_empty()
        });
    }

    /// Drop every membership of `actor`.
    pub fn exit_all(&self, actor: ActorId) {
        self.members.remove(&actor);
    }

    /// Zones `actor` is currently a member of.
    pub fn zones_of(&self, actor: ActorId) -> Vec<ZoneId> {
        self.members
            .get(&actor)
            .map(|zones| zones.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `actor` is a member of `zone`.
    pub fn is_member(&self, actor: ActorId, zone: ZoneId) -> bool {
        self.members
            .get(&actor)
            .is_some_and(|zones| zones.contains(&zone))
    }

    /// Forget every zone and membership without notifying anyone.
    pub fn clear(&self) {
        for zone in self.zones.iter() {
            zone.value().mark_collapsed();
        }
        self.zones.clear();
        self.members.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::thread;

    use chrono::{TimeDelta, Utc};
    use echorift_types::Distortion;

    use super::*;
    use crate::test_support::RecordingObserver;
    use crate::zone::NewZone;

    fn new_zone(x: i32, limit: u32) -> Zone {
        let now = Utc::now();
        Zone::new(NewZone {
            world: "world".to_owned(),
            center_x: x,
            center_z: 0,
            created_at: now,
            ends_at: now + TimeDelta::minutes(30),
            distortion: Distortion::OreDropShift,
            activity_limit: limit,
        })
    }

    fn registry() -> (ZoneRegistry, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::default());
        (ZoneRegistry::new(observer.clone()), observer)
    }

    #[test]
    fn collapse_is_idempotent() {
        let (registry, observer) = registry();
        let id = registry.insert(new_zone(0, 10)).id();
        assert!(registry.collapse(id, CollapseReason::Ttl));
        assert!(!registry.collapse(id, CollapseReason::Ttl));
        assert_eq!(observer.collapses(), vec![(id, CollapseReason::Ttl)]);
        assert!(registry.get(id).is_none());
    }

    #[test]
    fn non_positive_activity_is_ignored() {
        let (registry, observer) = registry();
        let zone = registry.insert(new_zone(0, 1));
        assert_eq!(registry.add_activity(zone.id(), 0), ActivityOutcome::Ignored);
        assert_eq!(registry.add_activity(zone.id(), -5), ActivityOutcome::Ignored);
        assert_eq!(zone.activity(), 0);
        assert!(observer.collapses().is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reaching_limit_collapses_with_activity_reason() {
        let (registry, observer) = registry();
        let zone = registry.insert(new_zone(0, 5));
        let id = zone.id();
        assert_eq!(
            registry.add_activity(id, 3),
            ActivityOutcome::Recorded { activity: 3, limit: 5 }
        );
        assert_eq!(
            registry.add_activity(id, 4),
            ActivityOutcome::Collapsed { activity: 7 }
        );
        assert_eq!(registry.add_activity(id, 1), ActivityOutcome::Missing);
        assert!(registry.find_containing("world", 0, 0).is_none());
        assert!(zone.is_collapsed());
        assert_eq!(observer.collapses(), vec![(id, CollapseReason::Activity)]);
    }

    #[test]
    fn concurrent_activity_collapses_once() {
        let (registry, observer) = registry();
        let registry = Arc::new(registry);
        let id = registry.insert(new_zone(0, 1000)).id();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..200 {
                        registry.add_activity(id, 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(registry.get(id).is_none());
        assert_eq!(observer.collapses(), vec![(id, CollapseReason::Activity)]);
    }

    #[test]
    fn concurrent_activity_below_limit_is_exact() {
        let (registry, _observer) = registry();
        let registry = Arc::new(registry);
        let zone = registry.insert(new_zone(0, 1_000_000));
        let id = zone.id();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..250 {
                        registry.add_activity(id, 2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(zone.activity(), 2000);
    }

    #[test]
    fn find_containing_prefers_oldest() {
        let (registry, _observer) = registry();
        let first = registry.insert(new_zone(0, 10)).id();
        let second = registry.insert(new_zone(16, 10)).id();
        assert!(first < second);
        // Chunk 1 is covered by both.
        assert_eq!(registry.find_containing("world", 1, 0).unwrap().id(), first);
        assert_eq!(registry.find_containing("world", 3, 0).unwrap().id(), second);
        assert!(registry.find_containing("world", 9, 0).is_none());
    }

    #[test]
    fn membership_lifecycle() {
        let (registry, _observer) = registry();
        let actor = ActorId::new();
        let id = registry.insert(new_zone(0, 10)).id();

        assert!(registry.enter(actor, id));
        assert!(!registry.enter(actor, id));
        assert!(registry.is_member(actor, id));
        registry.exit(actor, id);
        assert!(registry.zones_of(actor).is_empty());

        assert!(registry.enter(actor, id));
        registry.collapse(id, CollapseReason::OpCommand);
        assert!(registry.zones_of(actor).is_empty());
        assert!(!registry.enter(actor, id));
    }

    #[test]
    fn exit_all_forgets_actor() {
        let (registry, _observer) = registry();
        let actor = ActorId::new();
        let a = registry.insert(new_zone(0, 10)).id();
        let b = registry.insert(new_zone(1000, 10)).id();
        registry.enter(actor, a);
        registry.enter(actor, b);
        assert_eq!(registry.zones_of(actor).len(), 2);
        registry.exit_all(actor);
        assert!(registry.zones_of(actor).is_empty());
    }

    #[test]
    fn collapse_all_counts_and_notifies_each() {
        let (registry, observer) = registry();
        registry.insert(new_zone(0, 10));
        registry.insert(new_zone(1000, 10));
        assert_eq!(registry.collapse_all(CollapseReason::EventEnd), 2);
        assert!(registry.is_empty());
        assert_eq!(observer.collapses().len(), 2);
        assert_eq!(registry.collapse_all(CollapseReason::EventEnd), 0);
    }
}
