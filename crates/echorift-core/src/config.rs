//! Configuration loading and typed config structures for the EchoRift event.
//!
//! The canonical configuration lives in `echorift-config.yaml`. This module
//! defines strongly-typed structs that mirror the YAML structure (kebab-case
//! keys), and provides a loader that reads the file.
//!
//! Every section and field carries a default, so a partial file (or no file
//! at all) still yields a usable configuration. A value of the wrong type
//! is dropped on its own (see [`decode_lenient`]) and its field keeps the
//! default. Values that parse but make no sense (an unknown coordinate
//! mode, a malformed custom point, an inverted range) are normalised by
//! the accessor methods.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yml::{Mapping, Value};
use tracing::warn;

use crate::clock::{self, EventTimeZone};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level event configuration.
///
/// Mirrors the structure of `echorift-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EchoConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Event timing and persistence.
    #[serde(default)]
    pub event: EventConfig,

    /// Echo point placement, lifetime and activity rules.
    #[serde(default)]
    pub points: PointsConfig,

    /// Periodic hint broadcasts.
    #[serde(default)]
    pub hints: HintsConfig,

    /// Player-facing message templates.
    #[serde(default)]
    pub messages: MessagesConfig,

    /// Ambient particles and sounds at zone centers.
    #[serde(default)]
    pub zone_effects: ZoneEffectsConfig,

    /// Ore drop replacement distortion.
    #[serde(default)]
    pub ore_drop_shift: OreDropShiftConfig,

    /// Mechanic lock distortion.
    #[serde(default)]
    pub mechanic_lock: MechanicLockConfig,

    /// Random tick boost distortion.
    #[serde(default)]
    pub random_tick_boost: RandomTickBoostConfig,

    /// Hunger drift distortion.
    #[serde(default)]
    pub hunger_drift: HungerDriftConfig,

    /// Placement decay distortion.
    #[serde(default)]
    pub placement_decay: PlacementDecayConfig,
}

impl EchoConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// An empty document yields the defaults. Settings of the wrong type
    /// are logged and replaced by their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let (config, rejected) = Self::parse_lenient(yaml)?;
        for setting in &rejected {
            warn!(key = %setting.path, reason = %setting.reason, "Ignoring config value, using default");
        }
        Ok(config)
    }

    /// Parse configuration and report the settings that were dropped.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse_lenient(yaml: &str) -> Result<(Self, Vec<Rejected>), ConfigError> {
        if yaml.trim().is_empty() {
            return Ok((Self::default(), Vec::new()));
        }
        let value: Value = serde_yml::from_str(yaml)?;
        Ok(decode_lenient(&value))
    }

    /// Load the file at `path`, falling back to defaults on any failure.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Config unavailable, using defaults");
                Self::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Lenient decoding
// ---------------------------------------------------------------------------

/// A config value that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// Dotted key path, e.g. `points.max-active`.
    pub path: String,
    /// Why the value was refused.
    pub reason: String,
}

/// Decode `value` into `T`, dropping every leaf value that does not fit.
///
/// Leaves are re-applied one at a time onto an empty document; a leaf is
/// kept only if the document still decodes with it. Repeated passes let a
/// leaf that depends on a sibling (a required key in a map entry) land
/// after the sibling. Dropped leaves fall back to the field default.
pub fn decode_lenient<T>(value: &Value) -> (T, Vec<Rejected>)
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return (T::default(), Vec::new());
    }
    let decoded = serde_yml::from_value::<T>(value.clone());
    let error = match decoded {
        Ok(decoded) => return (decoded, Vec::new()),
        Err(e) => e,
    };
    if !matches!(value, Value::Mapping(_)) {
        let rejected = Rejected {
            path: "(document)".to_owned(),
            reason: error.to_string(),
        };
        return (T::default(), vec![rejected]);
    }

    let mut leaves = Vec::new();
    collect_leaves(value, &mut Vec::new(), &mut leaves);
    let mut accepted = Value::Mapping(Mapping::new());
    loop {
        let before = leaves.len();
        leaves.retain(|(path, leaf)| {
            let mut trial = accepted.clone();
            insert_at(&mut trial, path, leaf.clone());
            if serde_yml::from_value::<T>(trial.clone()).is_ok() {
                accepted = trial;
                false
            } else {
                true
            }
        });
        if leaves.is_empty() || leaves.len() == before {
            break;
        }
    }

    let rejected = leaves
        .iter()
        .map(|(path, leaf)| {
            let mut trial = accepted.clone();
            insert_at(&mut trial, path, leaf.clone());
            let reason = serde_yml::from_value::<T>(trial)
                .err()
                .map_or_else(String::new, |e| e.to_string());
            Rejected {
                path: dotted(path),
                reason,
            }
        })
        .collect();
    (serde_yml::from_value(accepted).unwrap_or_default(), rejected)
}

/// Every non-mapping value (and every empty mapping) with its key path.
fn collect_leaves(value: &Value, path: &mut Vec<Value>, out: &mut Vec<(Vec<Value>, Value)>) {
    match value {
        Value::Mapping(map) if !map.is_empty() => {
            for (key, child) in map {
                path.push(key.clone());
                collect_leaves(child, path, out);
                path.pop();
            }
        }
        leaf => out.push((path.clone(), leaf.clone())),
    }
}

/// Set `leaf` at `path`, creating mappings on the way.
fn insert_at(target: &mut Value, path: &[Value], leaf: Value) {
    let Some((key, rest)) = path.split_first() else {
        *target = leaf;
        return;
    };
    if !matches!(target, Value::Mapping(_)) {
        *target = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = target {
        if !map.contains_key(key) {
            map.insert(key.clone(), Value::Null);
        }
        if let Some(child) = map.get_mut(key) {
            insert_at(child, rest, leaf);
        }
    }
}

fn dotted(path: &[Value]) -> String {
    path.iter()
        .map(|key| key.as_str().map_or_else(|| format!("{key:?}"), str::to_owned))
        .collect::<Vec<_>>()
        .join(".")
}

// ---------------------------------------------------------------------------
// Shared snapshot
// ---------------------------------------------------------------------------

/// The live configuration, swapped wholesale on reload.
///
/// Readers take an [`Arc`] snapshot and keep using it for the rest of the
/// job invocation, so a concurrent reload never changes values mid-job.
#[derive(Debug, Default)]
pub struct SharedConfig {
    inner: RwLock<Arc<EchoConfig>>,
}

impl SharedConfig {
    /// Wrap an initial configuration.
    pub fn new(config: EchoConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(config)),
        }
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<EchoConfig> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the configuration for all future readers.
    pub fn replace(&self, config: EchoConfig) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(config);
    }
}

// ---------------------------------------------------------------------------
// Shared value types
// ---------------------------------------------------------------------------

/// An inclusive integer range read from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UintRange {
    /// Lower bound.
    pub min: u32,
    /// Upper bound.
    pub max: u32,
}

impl UintRange {
    /// Create a range.
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// The bounds with `min <= max`, swapping them when inverted.
    pub const fn ordered(self) -> (u32, u32) {
        if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        }
    }
}

/// An inclusive signed range read from config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct IntRange {
    /// Lower bound.
    pub min: i32,
    /// Upper bound.
    pub max: i32,
}

impl IntRange {
    /// Create a range.
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// The bounds with `min <= max`, swapping them when inverted.
    pub const fn ordered(self) -> (i32, i32) {
        if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        }
    }
}

/// A particle burst description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParticleConfig {
    /// Particle type name.
    #[serde(default = "default_particle_kind", rename = "type")]
    pub kind: String,

    /// Particles per burst.
    #[serde(default = "default_particle_count")]
    pub count: u32,

    /// Horizontal spread around the emission point.
    #[serde(default = "default_particle_radius")]
    pub radius: f64,

    /// Seconds between bursts (ambient effects only).
    #[serde(default = "default_particle_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            kind: default_particle_kind(),
            count: default_particle_count(),
            radius: default_particle_radius(),
            interval_seconds: default_particle_interval_seconds(),
        }
    }
}

/// A sound description.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SoundConfig {
    /// Sound name.
    #[serde(default = "default_sound_kind", rename = "type")]
    pub kind: String,

    /// Playback volume.
    #[serde(default = "default_sound_volume")]
    pub volume: f32,

    /// Playback pitch.
    #[serde(default = "default_sound_pitch")]
    pub pitch: f32,

    /// Seconds between plays (ambient effects only).
    #[serde(default = "default_sound_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            kind: default_sound_kind(),
            volume: default_sound_volume(),
            pitch: default_sound_pitch(),
            interval_seconds: default_sound_interval_seconds(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Default log level when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Event timing and persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventConfig {
    /// Whether the event starts itself every day.
    #[serde(default = "default_true")]
    pub auto_start: bool,

    /// Daily start time (`HH:MM`).
    #[serde(default = "default_start_time")]
    pub start_time: String,

    /// Daily end time (`HH:MM`).
    #[serde(default = "default_end_time")]
    pub end_time: String,

    /// `system`, `UTC` or a fixed offset such as `+03:00`.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Keep the event and its zones across restarts.
    #[serde(default)]
    pub persistent: bool,

    /// Path of the state data file.
    #[serde(default = "default_data_file")]
    pub data_file: String,

    /// Real-time milliseconds per simulation tick.
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            start_time: default_start_time(),
            end_time: default_end_time(),
            timezone: default_timezone(),
            persistent: false,
            data_file: default_data_file(),
            tick_millis: default_tick_millis(),
        }
    }
}

impl EventConfig {
    /// Parsed daily start time, defaulting to 18:00 when malformed.
    pub fn start_time_of_day(&self) -> NaiveTime {
        parse_time_or(&self.start_time, &default_start_time())
    }

    /// Parsed daily end time, defaulting to 23:59 when malformed.
    pub fn end_time_of_day(&self) -> NaiveTime {
        parse_time_or(&self.end_time, &default_end_time())
    }

    /// Parsed time zone, defaulting to the system zone when malformed.
    pub fn time_zone(&self) -> EventTimeZone {
        EventTimeZone::parse(&self.timezone).unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to system time zone");
            EventTimeZone::System
        })
    }

    /// Length of one simulation tick (at least one millisecond).
    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(1))
    }
}

/// How spawn candidates are generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateMode {
    /// Uniform point inside a rectangle.
    RandomRange,
    /// Uniform angle and integer radius inside an annulus.
    Ring,
    /// Uniform pick from a fixed list.
    CustomList,
    /// Near a random online actor, falling back to the rectangle.
    NearPlayer,
}

impl CoordinateMode {
    /// Parse a mode name; unknown names yield [`Self::RandomRange`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "ring" => Self::Ring,
            "custom-list" => Self::CustomList,
            "near-player" => Self::NearPlayer,
            _ => Self::RandomRange,
        }
    }
}

/// Rectangle bounds for random-range placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RandomRangeConfig {
    /// X bounds.
    #[serde(default = "default_axis_range")]
    pub x: IntRange,

    /// Z bounds.
    #[serde(default = "default_axis_range")]
    pub z: IntRange,
}

impl Default for RandomRangeConfig {
    fn default() -> Self {
        Self {
            x: default_axis_range(),
            z: default_axis_range(),
        }
    }
}

/// Annulus for ring placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RingConfig {
    /// Center X.
    #[serde(default)]
    pub center_x: i32,

    /// Center Z.
    #[serde(default)]
    pub center_z: i32,

    /// Inner radius.
    #[serde(default = "default_ring_min_radius")]
    pub min_radius: i32,

    /// Outer radius.
    #[serde(default = "default_ring_max_radius")]
    pub max_radius: i32,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            center_x: 0,
            center_z: 0,
            min_radius: default_ring_min_radius(),
            max_radius: default_ring_max_radius(),
        }
    }
}

/// Offset window for near-player placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NearPlayerConfig {
    /// Maximum offset from the chosen actor on each axis.
    #[serde(default = "default_near_player_radius")]
    pub radius: i32,

    /// Use the random-range rectangle when no actor is eligible.
    #[serde(default = "default_true")]
    pub fallback_to_range: bool,
}

impl Default for NearPlayerConfig {
    fn default() -> Self {
        Self {
            radius: default_near_player_radius(),
            fallback_to_range: true,
        }
    }
}

/// Echo point rules.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PointsConfig {
    /// Maximum number of live points.
    #[serde(default = "default_max_active")]
    pub max_active: u32,

    /// Seconds between spawn attempts.
    #[serde(default = "default_spawn_interval_seconds")]
    pub spawn_interval_seconds: u64,

    /// Worlds points may appear in. Empty means every world.
    #[serde(default)]
    pub allowed_worlds: Vec<String>,

    /// Minimum Euclidean distance between point centers.
    #[serde(default = "default_min_distance_blocks")]
    pub min_distance_blocks: f64,

    /// Placement strategy name.
    #[serde(default = "default_coordinate_mode")]
    pub coordinate_mode: String,

    /// Bounds for `random-range`.
    #[serde(default)]
    pub random_range: RandomRangeConfig,

    /// Annulus for `ring`.
    #[serde(default)]
    pub ring: RingConfig,

    /// Window for `near-player`.
    #[serde(default)]
    pub near_player: NearPlayerConfig,

    /// `"x,z"` entries for `custom-list`.
    #[serde(default)]
    pub custom_list: Vec<String>,

    /// Lifetime bounds in seconds.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: UintRange,

    /// Activity limit bounds.
    #[serde(default = "default_activity_limit")]
    pub activity_limit: UintRange,

    /// Activity added when an actor enters a point.
    #[serde(default)]
    pub enter_cost: i32,

    /// Activity added per actor per stay interval.
    #[serde(default = "default_stay_cost")]
    pub stay_cost: i32,

    /// Seconds between stay charges.
    #[serde(default = "default_stay_interval_seconds")]
    pub stay_interval_seconds: u64,

    /// Radius of the local collapse message.
    #[serde(default = "default_local_message_radius")]
    pub local_message_radius: f64,

    /// Broadcast a message when a point collapses.
    #[serde(default = "default_true")]
    pub collapse_global: bool,

    /// Tell nearby actors when a point collapses.
    #[serde(default = "default_true")]
    pub collapse_local: bool,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            max_active: default_max_active(),
            spawn_interval_seconds: default_spawn_interval_seconds(),
            allowed_worlds: Vec::new(),
            min_distance_blocks: default_min_distance_blocks(),
            coordinate_mode: default_coordinate_mode(),
            random_range: RandomRangeConfig::default(),
            ring: RingConfig::default(),
            near_player: NearPlayerConfig::default(),
            custom_list: Vec::new(),
            ttl_seconds: default_ttl_seconds(),
            activity_limit: default_activity_limit(),
            enter_cost: 0,
            stay_cost: default_stay_cost(),
            stay_interval_seconds: default_stay_interval_seconds(),
            local_message_radius: default_local_message_radius(),
            collapse_global: true,
            collapse_local: true,
        }
    }
}

impl PointsConfig {
    /// The parsed placement strategy.
    pub fn mode(&self) -> CoordinateMode {
        CoordinateMode::parse(&self.coordinate_mode)
    }

    /// Parsed custom points; malformed entries are skipped.
    pub fn custom_points(&self) -> Vec<(i32, i32)> {
        self.custom_list
            .iter()
            .filter_map(|entry| parse_point(entry))
            .collect()
    }
}

/// Hint broadcast configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HintsConfig {
    /// Seconds between hints.
    #[serde(default = "default_hint_interval_seconds")]
    pub interval_seconds: u64,
}

impl Default for HintsConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_hint_interval_seconds(),
        }
    }
}

/// Player-facing messages. Blank messages are never sent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MessagesConfig {
    /// Broadcast when the event starts.
    #[serde(default = "default_start_message")]
    pub start: String,

    /// Broadcast when the event ends.
    #[serde(default = "default_end_message")]
    pub end: String,

    /// Sent to an actor entering a point.
    #[serde(default = "default_enter_message")]
    pub enter: String,

    /// Sent when a locked mechanic is refused.
    #[serde(default = "default_deny_message")]
    pub deny: String,

    /// Sent when shifted ore drops are not masked.
    #[serde(default = "default_ore_reveal_message")]
    pub ore_reveal: String,

    /// Sent to actors near a collapsing point.
    #[serde(default = "default_collapse_local_message")]
    pub collapse_local: String,

    /// Broadcast when a point collapses.
    #[serde(default = "default_collapse_global_message")]
    pub collapse_global: String,

    /// Prepended to every hint.
    #[serde(default = "default_hint_prefix")]
    pub hint_prefix: String,

    /// Hint pool.
    #[serde(default = "default_hints")]
    pub hints: Vec<String>,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            start: default_start_message(),
            end: default_end_message(),
            enter: default_enter_message(),
            deny: default_deny_message(),
            ore_reveal: default_ore_reveal_message(),
            collapse_local: default_collapse_local_message(),
            collapse_global: default_collapse_global_message(),
            hint_prefix: default_hint_prefix(),
            hints: default_hints(),
        }
    }
}

/// Ambient effects at every point center.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ZoneEffectsConfig {
    /// Particle burst.
    #[serde(default)]
    pub particle: ParticleConfig,

    /// Ambient sound.
    #[serde(default)]
    pub sound: SoundConfig,
}

/// Replacement rule for one ore.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DropMapping {
    /// Material dropped instead.
    pub drop: String,

    /// Minimum stack size.
    #[serde(default = "default_one")]
    pub min: u32,

    /// Maximum stack size.
    #[serde(default = "default_one")]
    pub max: u32,

    /// Multiplier applied to the rolled count.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl DropMapping {
    /// Create a mapping with a unit multiplier.
    pub fn new(drop: impl Into<String>, min: u32, max: u32) -> Self {
        Self {
            drop: drop.into(),
            min,
            max,
            multiplier: default_multiplier(),
        }
    }
}

/// Ore drop shift distortion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OreDropShiftConfig {
    /// Whether the distortion can be selected.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Selection weight.
    #[serde(default = "default_ore_weight")]
    pub weight: u32,

    /// Probability a mapped ore is shifted.
    #[serde(default = "default_ore_chance")]
    pub chance: f64,

    /// Hide the shift from the actor.
    #[serde(default = "default_true")]
    pub masking: bool,

    /// Extra durability taken from the tool.
    #[serde(default = "default_one")]
    pub extra_tool_damage: u32,

    /// Activity added per shifted drop.
    #[serde(default = "default_ore_gain")]
    pub activity_gain: i32,

    /// Broken material to replacement rule.
    #[serde(default = "default_ore_mappings")]
    pub mappings: BTreeMap<String, DropMapping>,
}

impl Default for OreDropShiftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_ore_weight(),
            chance: default_ore_chance(),
            masking: true,
            extra_tool_damage: default_one(),
            activity_gain: default_ore_gain(),
            mappings: default_ore_mappings(),
        }
    }
}

impl OreDropShiftConfig {
    /// The rule for a broken material (case-insensitive).
    pub fn mapping_for(&self, material: &str) -> Option<&DropMapping> {
        self.mappings
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(material))
            .map(|(_, mapping)| mapping)
    }
}

/// Knockback applied when a mechanic is refused.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KnockbackConfig {
    /// Whether knockback is applied.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Velocity magnitude.
    #[serde(default = "default_knockback_strength")]
    pub strength: f64,
}

impl Default for KnockbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strength: default_knockback_strength(),
        }
    }
}

/// Mechanic lock distortion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MechanicLockConfig {
    /// Whether the distortion can be selected.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Selection weight.
    #[serde(default = "default_three")]
    pub weight: u32,

    /// Activity added per refusal.
    #[serde(default = "default_one_i32")]
    pub activity_gain: i32,

    /// Knockback on refusal.
    #[serde(default)]
    pub knockback: KnockbackConfig,

    /// Inventory types that refuse to open.
    #[serde(default = "default_blocked_inventories")]
    pub blocked_inventories: Vec<String>,

    /// Block materials that refuse interaction and placement.
    #[serde(default = "default_blocked_blocks")]
    pub blocked_blocks: Vec<String>,

    /// Inventory types opened instead of a refused one.
    #[serde(default = "default_substitute_inventories")]
    pub substitute_inventories: Vec<String>,

    /// Overrides `substitute-inventories` when non-empty.
    #[serde(default)]
    pub random_inventories: Vec<String>,
}

impl Default for MechanicLockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_three(),
            activity_gain: default_one_i32(),
            knockback: KnockbackConfig::default(),
            blocked_inventories: default_blocked_inventories(),
            blocked_blocks: default_blocked_blocks(),
            substitute_inventories: default_substitute_inventories(),
            random_inventories: Vec::new(),
        }
    }
}

impl MechanicLockConfig {
    /// Whether an inventory type is locked.
    pub fn blocks_inventory(&self, kind: &str) -> bool {
        contains_ignore_case(&self.blocked_inventories, kind)
    }

    /// Whether a block material is locked.
    pub fn blocks_block(&self, material: &str) -> bool {
        contains_ignore_case(&self.blocked_blocks, material)
    }

    /// Substitute inventories that are not themselves locked.
    ///
    /// `random-inventories` is used when set, `substitute-inventories`
    /// otherwise.
    pub fn usable_substitutes(&self) -> Vec<&str> {
        let source = if self.random_inventories.is_empty() {
            &self.substitute_inventories
        } else {
            &self.random_inventories
        };
        source
            .iter()
            .filter(|kind| !self.blocks_inventory(kind))
            .map(String::as_str)
            .collect()
    }
}

/// Random tick boost distortion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RandomTickBoostConfig {
    /// Whether the distortion can be selected.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Selection weight.
    #[serde(default = "default_three")]
    pub weight: u32,

    /// Probability a checked crop grows.
    #[serde(default = "default_tick_boost_chance")]
    pub chance: f64,

    /// Cells checked around each actor per tick.
    #[serde(default = "default_checks_per_player")]
    pub checks_per_player: u32,

    /// Cells checked across all actors per tick.
    #[serde(default = "default_max_checks_per_tick")]
    pub max_checks_per_tick: u32,

    /// Activity added per growth.
    #[serde(default = "default_one_i32")]
    pub activity_gain: i32,

    /// Materials that may be boosted.
    #[serde(default = "default_boost_blocks")]
    pub blocks: Vec<String>,

    /// Materials that grow upward into empty cells.
    #[serde(default = "default_vertical_blocks")]
    pub vertical_blocks: Vec<String>,
}

impl Default for RandomTickBoostConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_three(),
            chance: default_tick_boost_chance(),
            checks_per_player: default_checks_per_player(),
            max_checks_per_tick: default_max_checks_per_tick(),
            activity_gain: default_one_i32(),
            blocks: default_boost_blocks(),
            vertical_blocks: default_vertical_blocks(),
        }
    }
}

impl RandomTickBoostConfig {
    /// Whether a material may be boosted.
    pub fn boosts(&self, material: &str) -> bool {
        contains_ignore_case(&self.blocks, material)
    }

    /// Whether a material grows upward.
    pub fn grows_vertically(&self, material: &str) -> bool {
        contains_ignore_case(&self.vertical_blocks, material)
    }
}

/// Hunger drift distortion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HungerDriftConfig {
    /// Whether the distortion can be selected.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Selection weight.
    #[serde(default = "default_three")]
    pub weight: u32,

    /// Seconds between nudges.
    #[serde(default = "default_hunger_interval_seconds")]
    pub interval_seconds: u64,

    /// Exhaustion added per nudge.
    #[serde(default = "default_exhaustion_delta")]
    pub exhaustion_delta: f32,

    /// Activity added per nudge.
    #[serde(default = "default_one_i32")]
    pub activity_gain: i32,
}

impl Default for HungerDriftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_three(),
            interval_seconds: default_hunger_interval_seconds(),
            exhaustion_delta: default_exhaustion_delta(),
            activity_gain: default_one_i32(),
        }
    }
}

/// Placement decay distortion.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PlacementDecayConfig {
    /// Whether the distortion can be selected.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Selection weight.
    #[serde(default = "default_decay_weight")]
    pub weight: u32,

    /// Probability a whitelisted placement decays.
    #[serde(default = "default_decay_chance")]
    pub chance: f64,

    /// Seconds before the block crumbles.
    #[serde(default = "default_decay_delay_seconds")]
    pub delay_seconds: u64,

    /// Give the crumbled block back to the actor.
    #[serde(default = "default_true")]
    pub return_item: bool,

    /// Activity added per decay.
    #[serde(default = "default_one_i32")]
    pub activity_gain: i32,

    /// Materials that may decay.
    #[serde(default = "default_decay_whitelist")]
    pub whitelist: Vec<String>,

    /// Particle burst when a block crumbles.
    #[serde(default = "default_decay_particle")]
    pub particles: ParticleConfig,

    /// Sound when a block crumbles.
    #[serde(default = "default_decay_sound")]
    pub sound: SoundConfig,
}

impl Default for PlacementDecayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weight: default_decay_weight(),
            chance: default_decay_chance(),
            delay_seconds: default_decay_delay_seconds(),
            return_item: true,
            activity_gain: default_one_i32(),
            whitelist: default_decay_whitelist(),
            particles: default_decay_particle(),
            sound: default_decay_sound(),
        }
    }
}

impl PlacementDecayConfig {
    /// Whether a placed material may decay.
    pub fn allows(&self, material: &str) -> bool {
        contains_ignore_case(&self.whitelist, material)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn contains_ignore_case(list: &[String], value: &str) -> bool {
    list.iter().any(|entry| entry.eq_ignore_ascii_case(value))
}

fn parse_point(entry: &str) -> Option<(i32, i32)> {
    let (x, z) = entry.split_once(',')?;
    Some((x.trim().parse().ok()?, z.trim().parse().ok()?))
}

fn parse_time_or(value: &str, fallback: &str) -> NaiveTime {
    clock::parse_time_of_day(value)
        .or_else(|e| {
            warn!(error = %e, fallback, "Using default time of day");
            clock::parse_time_of_day(fallback)
        })
        .unwrap_or(NaiveTime::MIN)
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_start_time() -> String {
    "18:00".to_owned()
}

fn default_end_time() -> String {
    "23:59".to_owned()
}

fn default_timezone() -> String {
    "system".to_owned()
}

fn default_data_file() -> String {
    "echorift-data.yml".to_owned()
}

const fn default_tick_millis() -> u64 {
    50
}

const fn default_max_active() -> u32 {
    3
}

const fn default_spawn_interval_seconds() -> u64 {
    1800
}

const fn default_min_distance_blocks() -> f64 {
    500.0
}

fn default_coordinate_mode() -> String {
    "random-range".to_owned()
}

const fn default_axis_range() -> IntRange {
    IntRange::new(-2000, 2000)
}

const fn default_ring_min_radius() -> i32 {
    500
}

const fn default_ring_max_radius() -> i32 {
    1500
}

const fn default_near_player_radius() -> i32 {
    64
}

const fn default_ttl_seconds() -> UintRange {
    UintRange::new(900, 1800)
}

const fn default_activity_limit() -> UintRange {
    UintRange::new(60, 140)
}

const fn default_stay_cost() -> i32 {
    1
}

const fn default_stay_interval_seconds() -> u64 {
    60
}

const fn default_local_message_radius() -> f64 {
    64.0
}

const fn default_hint_interval_seconds() -> u64 {
    600
}

fn default_particle_kind() -> String {
    "PORTAL".to_owned()
}

const fn default_particle_count() -> u32 {
    16
}

const fn default_particle_radius() -> f64 {
    6.0
}

const fn default_particle_interval_seconds() -> u64 {
    12
}

fn default_sound_kind() -> String {
    "BLOCK_AMETHYST_BLOCK_CHIME".to_owned()
}

const fn default_sound_volume() -> f32 {
    0.8
}

const fn default_sound_pitch() -> f32 {
    1.2
}

const fn default_sound_interval_seconds() -> u64 {
    20
}

fn default_start_message() -> String {
    "The Echo Rift has opened. Echo points are surfacing across the land.".to_owned()
}

fn default_end_message() -> String {
    "The Echo Rift has closed. The echoes fall silent.".to_owned()
}

fn default_enter_message() -> String {
    "You step into an echo point. Something here is not right.".to_owned()
}

fn default_deny_message() -> String {
    "The echo refuses. This mechanism will not answer here.".to_owned()
}

fn default_ore_reveal_message() -> String {
    "The ore shifts as it breaks.".to_owned()
}

fn default_collapse_local_message() -> String {
    "The echo point around you collapses.".to_owned()
}

fn default_collapse_global_message() -> String {
    "An echo point has collapsed.".to_owned()
}

fn default_hint_prefix() -> String {
    "[Echo] ".to_owned()
}

fn default_hints() -> Vec<String> {
    to_strings(&[
        "Ore does not always break the way it should.",
        "Some crafting tables have stopped listening.",
        "Crops grow strangely fast near the echoes.",
        "Blocks placed near an echo may not stay.",
    ])
}

const fn default_one() -> u32 {
    1
}

const fn default_one_i32() -> i32 {
    1
}

const fn default_three() -> u32 {
    3
}

const fn default_multiplier() -> f64 {
    1.0
}

const fn default_ore_weight() -> u32 {
    4
}

const fn default_ore_chance() -> f64 {
    0.7
}

const fn default_ore_gain() -> i32 {
    2
}

fn default_ore_mappings() -> BTreeMap<String, DropMapping> {
    let mut mappings = BTreeMap::new();
    mappings.insert("COAL_ORE".to_owned(), DropMapping::new("REDSTONE", 2, 4));
    mappings.insert("IRON_ORE".to_owned(), DropMapping::new("RAW_COPPER", 1, 3));
    mappings.insert("GOLD_ORE".to_owned(), DropMapping::new("RAW_IRON", 1, 2));
    mappings.insert("DIAMOND_ORE".to_owned(), DropMapping::new("EMERALD", 1, 1));
    mappings
}

const fn default_knockback_strength() -> f64 {
    0.4
}

fn default_blocked_inventories() -> Vec<String> {
    to_strings(&["WORKBENCH", "ENCHANTING", "ANVIL", "FURNACE"])
}

fn default_blocked_blocks() -> Vec<String> {
    to_strings(&["CRAFTING_TABLE", "ENCHANTING_TABLE", "ANVIL", "FURNACE"])
}

fn default_substitute_inventories() -> Vec<String> {
    to_strings(&["DISPENSER", "HOPPER", "DROPPER"])
}

const fn default_tick_boost_chance() -> f64 {
    0.35
}

const fn default_checks_per_player() -> u32 {
    6
}

const fn default_max_checks_per_tick() -> u32 {
    200
}

fn default_boost_blocks() -> Vec<String> {
    to_strings(&[
        "WHEAT",
        "CARROTS",
        "POTATOES",
        "BEETROOTS",
        "SUGAR_CANE",
        "BAMBOO",
    ])
}

fn default_vertical_blocks() -> Vec<String> {
    to_strings(&["SUGAR_CANE", "BAMBOO"])
}

const fn default_hunger_interval_seconds() -> u64 {
    6
}

const fn default_exhaustion_delta() -> f32 {
    0.4
}

const fn default_decay_weight() -> u32 {
    2
}

const fn default_decay_chance() -> f64 {
    0.3
}

const fn default_decay_delay_seconds() -> u64 {
    20
}

fn default_decay_whitelist() -> Vec<String> {
    to_strings(&["DIRT", "COBBLESTONE", "OAK_PLANKS", "SAND", "GRAVEL"])
}

fn default_decay_particle() -> ParticleConfig {
    ParticleConfig {
        kind: "BLOCK_CRUMBLE".to_owned(),
        count: 12,
        radius: 0.3,
        interval_seconds: 0,
    }
}

fn default_decay_sound() -> SoundConfig {
    SoundConfig {
        kind: "BLOCK_GRAVEL_BREAK".to_owned(),
        volume: 0.6,
        pitch: 0.8,
        interval_seconds: 0,
    }
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = EchoConfig::default();
        assert_eq!(config.points.max_active, 3);
        assert_eq!(config.points.spawn_interval_seconds, 1800);
        assert_eq!(config.points.mode(), CoordinateMode::RandomRange);
        assert_eq!(config.points.ttl_seconds.ordered(), (900, 1800));
        assert_eq!(config.points.activity_limit.ordered(), (60, 140));
        assert_eq!(config.ore_drop_shift.weight, 4);
        assert_eq!(config.placement_decay.weight, 2);
        assert_eq!(config.event.tick_duration(), Duration::from_millis(50));
        assert!(config.event.auto_start);
        assert!(!config.event.persistent);
    }

    #[test]
    fn parse_partial_yaml() {
        let yaml = r#"
points:
  max-active: 5
  coordinate-mode: ring
  ring:
    center-x: 100
    min-radius: 10
    max-radius: 20
  ttl-seconds:
    min: 30
    max: 10
ore-drop-shift:
  enabled: false
  mappings:
    COPPER_ORE:
      drop: GOLD_NUGGET
      min: 2
      max: 5
      multiplier: 1.5
event:
  start-time: "20:30"
  timezone: "+02:00"
"#;
        let config = EchoConfig::parse(yaml).unwrap();
        assert_eq!(config.points.max_active, 5);
        assert_eq!(config.points.mode(), CoordinateMode::Ring);
        assert_eq!(config.points.ring.center_x, 100);
        assert_eq!(config.points.ring.center_z, 0);
        assert_eq!(config.points.ttl_seconds.ordered(), (10, 30));
        assert!(!config.ore_drop_shift.enabled);
        let mapping = config.ore_drop_shift.mapping_for("copper_ore").unwrap();
        assert_eq!(mapping.drop, "GOLD_NUGGET");
        assert_eq!((mapping.min, mapping.max), (2, 5));
        assert_eq!(
            config.event.start_time_of_day(),
            NaiveTime::from_hms_opt(20, 30, 0).unwrap()
        );
        // Untouched sections keep defaults.
        assert_eq!(config.hunger_drift.interval_seconds, 6);
        assert_eq!(config.zone_effects.particle.kind, "PORTAL");
    }

    #[test]
    fn mistyped_value_only_resets_its_own_field() {
        let yaml = r#"
points:
  max-active: lots
  spawn-interval-seconds: 120
  min-distance-blocks: 250.0
hints:
  interval-seconds: 30
"#;
        let (config, rejected) = EchoConfig::parse_lenient(yaml).unwrap();
        assert_eq!(config.points.max_active, 3);
        assert_eq!(config.points.spawn_interval_seconds, 120);
        assert!((config.points.min_distance_blocks - 250.0).abs() < f64::EPSILON);
        assert_eq!(config.hints.interval_seconds, 30);
        let paths: Vec<&str> = rejected.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["points.max-active"]);
    }

    #[test]
    fn mistyped_section_keeps_section_defaults() {
        let yaml = "points: lots\nhunger-drift:\n  interval-seconds: 9\n";
        let config = EchoConfig::parse(yaml).unwrap();
        assert_eq!(config.points, PointsConfig::default());
        assert_eq!(config.hunger_drift.interval_seconds, 9);
    }

    #[test]
    fn map_entries_survive_key_order() {
        let yaml = r#"
ore-drop-shift:
  mappings:
    COPPER_ORE:
      min: 2
      max: oops
      drop: GOLD_NUGGET
"#;
        let (config, rejected) = EchoConfig::parse_lenient(yaml).unwrap();
        let mapping = config.ore_drop_shift.mapping_for("COPPER_ORE").unwrap();
        assert_eq!(mapping.drop, "GOLD_NUGGET");
        assert_eq!((mapping.min, mapping.max), (2, 1));
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].path, "ore-drop-shift.mappings.COPPER_ORE.max");
    }

    #[test]
    fn broken_yaml_is_still_an_error() {
        assert!(EchoConfig::parse("points: [unclosed").is_err());
    }

    #[test]
    fn parse_empty_yaml() {
        assert_eq!(EchoConfig::parse("").unwrap(), EchoConfig::default());
    }

    #[test]
    fn unknown_coordinate_mode_falls_back() {
        assert_eq!(CoordinateMode::parse("spiral"), CoordinateMode::RandomRange);
        assert_eq!(CoordinateMode::parse("CUSTOM_LIST"), CoordinateMode::CustomList);
        assert_eq!(CoordinateMode::parse("near-player"), CoordinateMode::NearPlayer);
    }

    #[test]
    fn malformed_custom_points_are_skipped() {
        let points = PointsConfig {
            custom_list: vec![
                "10, -20".to_owned(),
                "oops".to_owned(),
                "1,2,3".to_owned(),
                "-5,7".to_owned(),
            ],
            ..PointsConfig::default()
        };
        assert_eq!(points.custom_points(), vec![(10, -20), (-5, 7)]);
    }

    #[test]
    fn malformed_times_fall_back() {
        let event = EventConfig {
            start_time: "dusk".to_owned(),
            timezone: "Nowhere/Land".to_owned(),
            ..EventConfig::default()
        };
        assert_eq!(
            event.start_time_of_day(),
            NaiveTime::from_hms_opt(18, 0, 0).unwrap()
        );
        assert_eq!(event.time_zone(), EventTimeZone::System);
    }

    #[test]
    fn substitutes_exclude_blocked_inventories() {
        let lock = MechanicLockConfig {
            substitute_inventories: vec!["HOPPER".to_owned(), "anvil".to_owned()],
            ..MechanicLockConfig::default()
        };
        assert_eq!(lock.usable_substitutes(), vec!["HOPPER"]);
    }

    #[test]
    fn shared_config_swaps_snapshots() {
        let shared = SharedConfig::new(EchoConfig::default());
        let before = shared.current();
        let mut next = EchoConfig::default();
        next.points.max_active = 9;
        shared.replace(next);
        assert_eq!(before.points.max_active, 3);
        assert_eq!(shared.current().points.max_active, 9);
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("echorift-config.yaml");
        if path.exists() {
            let config = EchoConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
