//! The event lifecycle state machine.
//!
//! [`EchoEvent`] owns the on/off state and deadline, the zone registry and
//! the tick scheduler, and is the single entry point the host, the operator
//! console and the engine talk to.
//!
//! # States
//!
//! ```text
//!            start()                      stop() / deadline passed
//! Inactive ----------> Active ----------------------------------> Inactive
//! ```
//!
//! `start` while active and `stop` while inactive are no-ops. Starting
//! broadcasts the start message and schedules every periodic job; stopping
//! collapses every zone with reason `event-end`, cancels the jobs and
//! broadcasts the end message. `shutdown(true)` only cancels the jobs so
//! the zones survive a restart.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use echorift_types::{CollapseReason, EventSnapshot};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{TICKS_PER_SECOND, WallClock, seconds_to_ticks};
use crate::config::{EchoConfig, SharedConfig};
use crate::host::{MessageSink, WorldHost, broadcast_message};
use crate::notifier::CollapseNotifier;
use crate::persist::StatePersistence;
use crate::registry::ZoneRegistry;
use crate::scheduler::{SchedulerError, TickScheduler};
use crate::zone::Zone;

/// Ticks before the first spawn attempt.
const SPAWN_DELAY_TICKS: u64 = TICKS_PER_SECOND;

/// Ticks between TTL sweeps (two seconds of game time).
const TTL_SWEEP_TICKS: u64 = 2 * TICKS_PER_SECOND;

/// Ticks before the first ambient effect.
const EFFECT_DELAY_TICKS: u64 = 2 * TICKS_PER_SECOND;

/// Ticks between random tick boost rounds.
const TICK_BOOST_TICKS: u64 = TICKS_PER_SECOND;

/// Errors that can occur while building an event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The tick scheduler could not be created.
    #[error("scheduler unavailable: {source}")]
    Scheduler {
        /// The underlying scheduler error.
        #[from]
        source: SchedulerError,
    },
}

/// Everything an [`EchoEvent`] is built from.
pub struct EventParts {
    /// Initial configuration.
    pub config: EchoConfig,
    /// File the configuration is reloaded from, if any.
    pub config_path: Option<PathBuf>,
    /// World surface.
    pub host: Arc<dyn WorldHost>,
    /// Message surface.
    pub messages: Arc<dyn MessageSink>,
    /// Persistence boundary, if state should survive restarts.
    pub store: Option<Arc<dyn StatePersistence>>,
    /// Wall clock for deadlines.
    pub clock: Arc<dyn WallClock>,
    /// Seed for the event's random source. `None` seeds from the OS.
    pub seed: Option<u64>,
}

/// The on/off half of the event state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct EventState {
    active: bool,
    ends_at: Option<DateTime<Utc>>,
}

/// Point-in-time view for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventStatus {
    /// Whether the event is running.
    pub active: bool,
    /// Live zone count.
    pub zones: usize,
    /// Event deadline, if any.
    pub ends_at: Option<DateTime<Utc>>,
    /// Whole seconds until the deadline (never negative).
    pub remaining_seconds: Option<i64>,
}

/// What [`EchoEvent::start_if_scheduled`] decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoStart {
    /// Auto-start is switched off.
    Disabled,
    /// The event is already running.
    AlreadyActive,
    /// Today's window has already closed.
    WindowClosed,
    /// The window is open; the event started with the end-of-day deadline.
    StartedNow {
        /// The deadline.
        ends_at: DateTime<Utc>,
    },
    /// The event will start at the window opening.
    Scheduled {
        /// When it starts.
        starts_at: DateTime<Utc>,
        /// The deadline it will carry.
        ends_at: DateTime<Utc>,
    },
}

/// The running event coordinator.
pub struct EchoEvent {
    pub(crate) config: Arc<SharedConfig>,
    config_path: Option<PathBuf>,
    pub(crate) host: Arc<dyn WorldHost>,
    pub(crate) messages: Arc<dyn MessageSink>,
    store: Option<Arc<dyn StatePersistence>>,
    pub(crate) clock: Arc<dyn WallClock>,
    pub(crate) registry: ZoneRegistry,
    pub(crate) scheduler: TickScheduler,
    state: Mutex<EventState>,
    /// Held across start, stop and reschedule so the job set always
    /// matches the active flag.
    transition: Mutex<()>,
    rng: Mutex<StdRng>,
    pub(crate) spawn_lock: Mutex<()>,
    pending_start: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for EchoEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EchoEvent")
            .field("state", &*self.lock_state())
            .field("registry", &self.registry)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl EchoEvent {
    /// Build an event on the current tokio runtime.
    pub fn new(parts: EventParts) -> Result<Arc<Self>, EventError> {
        let scheduler = TickScheduler::on_current_runtime(parts.config.event.tick_duration())?;
        let config = Arc::new(SharedConfig::new(parts.config));
        let notifier = CollapseNotifier::new(
            Arc::clone(&config),
            Arc::clone(&parts.host),
            Arc::clone(&parts.messages),
        );
        let rng = parts
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Ok(Arc::new(Self {
            config,
            config_path: parts.config_path,
            host: parts.host,
            messages: parts.messages,
            store: parts.store,
            clock: parts.clock,
            registry: ZoneRegistry::new(Arc::new(notifier)),
            scheduler,
            state: Mutex::new(EventState::default()),
            transition: Mutex::new(()),
            rng: Mutex::new(rng),
            spawn_lock: Mutex::new(()),
            pending_start: Mutex::new(None),
        }))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The current configuration snapshot.
    pub fn config(&self) -> Arc<EchoConfig> {
        self.config.current()
    }

    /// The live zone registry.
    pub const fn registry(&self) -> &ZoneRegistry {
        &self.registry
    }

    /// Whether the event is running.
    pub fn is_active(&self) -> bool {
        self.lock_state().active
    }

    /// The event deadline, if any.
    pub fn ends_at(&self) -> Option<DateTime<Utc>> {
        self.lock_state().ends_at
    }

    /// Names of the periodic jobs currently scheduled.
    pub fn active_jobs(&self) -> Vec<&'static str> {
        self.scheduler.active_jobs()
    }

    /// Status summary at the current wall-clock time.
    pub fn status(&self) -> EventStatus {
        let state = *self.lock_state();
        let now = self.clock.now();
        EventStatus {
            active: state.active,
            zones: self.registry.len(),
            ends_at: state.ends_at,
            remaining_seconds: state
                .ends_at
                .map(|deadline| deadline.signed_duration_since(now).num_seconds().max(0)),
        }
    }

    /// Everything the persistence boundary stores.
    pub fn snapshot(&self) -> EventSnapshot {
        let state = *self.lock_state();
        EventSnapshot {
            active: state.active,
            ends_at: state.ends_at,
            zones: self.registry.records(),
        }
    }

    // -----------------------------------------------------------------------
    // Boot
    // -----------------------------------------------------------------------

    /// Restore persisted state (when persistence is on), then either resume
    /// the restored event or fall through to auto-start.
    pub fn boot(self: &Arc<Self>) {
        if self.config().event.persistent {
            self.restore();
        }
        if self.is_active() {
            info!(zones = self.registry.len(), "Resuming restored event");
            self.schedule_jobs();
        } else {
            let decision = self.start_if_scheduled();
            debug!(?decision, "Auto-start evaluated");
        }
    }

    /// Load the stored snapshot into the registry.
    ///
    /// A stored deadline that has already passed discards everything and
    /// leaves the event inactive. Otherwise only zones that have not
    /// expired are kept and the stored active flag is resumed. Load
    /// failures are logged and treated as empty state. Returns whether the
    /// event is active afterwards.
    pub fn restore(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        let snapshot = match store.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return false,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted state, starting empty");
                return false;
            }
        };

        self.registry.clear();
        let now = self.clock.now();
        if snapshot.ends_at.is_some_and(|deadline| now > deadline) {
            *self.lock_state() = EventState::default();
            info!("Persisted event already ended, discarded stored state");
            return false;
        }

        let stored = snapshot.zones.len();
        for record in snapshot.zones.iter().filter(|r| !r.is_expired(now)) {
            self.registry.insert(Zone::from_record(record));
        }
        *self.lock_state() = EventState {
            active: snapshot.active,
            ends_at: snapshot.ends_at,
        };
        info!(
            active = snapshot.active,
            stored,
            kept = self.registry.len(),
            "Restored persisted state"
        );
        snapshot.active
    }

    /// Evaluate today's auto-start window.
    ///
    /// Past the end time nothing happens; between start and end the event
    /// starts now with the end-of-day deadline; before the start time a
    /// one-shot start is scheduled.
    pub fn start_if_scheduled(self: &Arc<Self>) -> AutoStart {
        let config = self.config();
        if !config.event.auto_start {
            return AutoStart::Disabled;
        }
        if self.is_active() {
            return AutoStart::AlreadyActive;
        }
        let now = self.clock.now();
        let zone = config.event.time_zone();
        let Some((opens, closes)) = zone.day_window(
            now,
            config.event.start_time_of_day(),
            config.event.end_time_of_day(),
        ) else {
            warn!("Auto-start window falls in a time-zone gap, skipping today");
            return AutoStart::WindowClosed;
        };

        if now > closes {
            return AutoStart::WindowClosed;
        }
        if now > opens {
            self.start(Some(closes));
            return AutoStart::StartedNow { ends_at: closes };
        }

        let wait = opens.signed_duration_since(now).num_seconds().max(0);
        let ticks = seconds_to_ticks(u64::try_from(wait).unwrap_or(0));
        let weak = Arc::downgrade(self);
        let handle = self.scheduler.delayed("auto-start", ticks, move || {
            if let Some(event) = weak.upgrade() {
                event.start(Some(closes));
            }
        });
        if let Some(previous) = self.lock_pending().replace(handle) {
            previous.abort();
        }
        info!(starts_at = %opens, ends_at = %closes, wait_seconds = wait, "Auto-start scheduled");
        AutoStart::Scheduled {
            starts_at: opens,
            ends_at: closes,
        }
    }

    /// The end of today's window in the configured time zone.
    pub fn end_of_today(&self) -> Option<DateTime<Utc>> {
        let config = self.config();
        let zone = config.event.time_zone();
        let now = self.clock.now();
        zone.instant_at(zone.date_at(now), config.event.end_time_of_day())
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Start the event. Returns `false` if it was already running.
    pub fn start(self: &Arc<Self>, ends_at: Option<DateTime<Utc>>) -> bool {
        let _transition = self.lock_transition();
        {
            let mut state = self.lock_state();
            if state.active {
                return false;
            }
            *state = EventState {
                active: true,
                ends_at,
            };
        }
        info!(ends_at = ?ends_at, "Echo event started");
        broadcast_message(self.messages.as_ref(), &self.config().messages.start);
        self.schedule_jobs();
        true
    }

    /// Stop the event. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let _transition = self.lock_transition();
        {
            let mut state = self.lock_state();
            if !state.active {
                return false;
            }
            *state = EventState::default();
        }
        let collapsed = self.registry.collapse_all(CollapseReason::EventEnd);
        self.scheduler.cancel_all();
        broadcast_message(self.messages.as_ref(), &self.config().messages.end);
        info!(collapsed, "Echo event stopped");
        true
    }

    /// Process shutdown.
    ///
    /// With `persist` the jobs are cancelled and the zones left in place
    /// for the next save; otherwise the event is stopped.
    pub fn shutdown(&self, persist: bool) {
        if let Some(pending) = self.lock_pending().take() {
            pending.abort();
        }
        if persist {
            let cancelled = self.scheduler.cancel_all();
            info!(cancelled, zones = self.registry.len(), "Shutdown keeping state");
        } else {
            self.stop();
            info!("Shutdown in session mode");
        }
    }

    /// Write the snapshot when persistence is enabled.
    ///
    /// Returns whether anything was written. Failures are logged.
    pub fn save(&self) -> bool {
        if !self.config().event.persistent {
            return false;
        }
        let Some(store) = &self.store else {
            return false;
        };
        let snapshot = self.snapshot();
        match store.save(&snapshot) {
            Ok(()) => {
                info!(
                    active = snapshot.active,
                    zones = snapshot.zones.len(),
                    "Persisted event state"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist event state, skipping save");
                false
            }
        }
    }

    /// Collapse every live zone. Returns how many collapsed.
    pub fn collapse_all(&self, reason: CollapseReason) -> usize {
        self.registry.collapse_all(reason)
    }

    /// Re-read the configuration file (if one is known) and apply it.
    ///
    /// Jobs are rescheduled with the new intervals when the event is
    /// running.
    pub fn reload(self: &Arc<Self>) {
        let config = self
            .config_path
            .as_deref()
            .map_or_else(|| (*self.config()).clone(), EchoConfig::load_or_default);
        self.apply_config(config);
    }

    /// Swap in a new configuration and reschedule if running.
    pub fn apply_config(self: &Arc<Self>, config: EchoConfig) {
        self.scheduler.set_tick(config.event.tick_duration());
        self.config.replace(config);
        info!("Configuration reloaded");
        let _transition = self.lock_transition();
        if self.is_active() {
            self.schedule_jobs();
        }
    }

    // -----------------------------------------------------------------------
    // Job wiring
    // -----------------------------------------------------------------------

    /// Cancel and re-register every periodic job with current intervals.
    pub fn schedule_jobs(self: &Arc<Self>) {
        self.scheduler.cancel_all();
        let config = self.config();
        let spawn = seconds_to_ticks(config.points.spawn_interval_seconds);
        let hint = seconds_to_ticks(config.hints.interval_seconds);
        let particle = seconds_to_ticks(config.zone_effects.particle.interval_seconds);
        let sound = seconds_to_ticks(config.zone_effects.sound.interval_seconds);
        let stay = seconds_to_ticks(config.points.stay_interval_seconds);
        let hunger = seconds_to_ticks(config.hunger_drift.interval_seconds);

        self.every("spawn", SPAWN_DELAY_TICKS, spawn, |event| {
            if let Err(abort) = event.spawn_zone() {
                debug!(reason = %abort, "Spawn skipped");
            }
        });
        self.every("ttl-sweep", TTL_SWEEP_TICKS, TTL_SWEEP_TICKS, Self::sweep_ttl);
        self.every("hint", hint, hint, Self::broadcast_hint);
        self.every("particles", EFFECT_DELAY_TICKS, particle, Self::emit_particles);
        self.every("sounds", EFFECT_DELAY_TICKS, sound, Self::emit_sounds);
        self.every("stay", stay, stay, Self::charge_stay);
        self.every("hunger-drift", hunger, hunger, Self::drift_hunger);
        self.every("tick-boost", TICK_BOOST_TICKS, TICK_BOOST_TICKS, |event| {
            event.boost_random_ticks();
        });
        info!(
            spawn_ticks = spawn,
            hint_ticks = hint,
            particle_ticks = particle,
            sound_ticks = sound,
            "Periodic jobs scheduled"
        );
    }

    /// Register a repeating job that holds only a weak reference.
    fn every<F>(self: &Arc<Self>, name: &'static str, delay: u64, period: u64, job: F)
    where
        F: Fn(&Self) + Send + Sync + 'static,
    {
        let weak = Arc::downgrade(self);
        self.scheduler.repeating(name, delay, period, move || {
            if let Some(event) = weak.upgrade() {
                job(&event);
            }
        });
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Run `f` with the event's random source.
    pub(crate) fn with_rng<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    fn lock_state(&self) -> MutexGuard<'_, EventState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_transition(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
