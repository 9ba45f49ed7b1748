//! Enumeration types for the EchoRift event.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Distortions
// ---------------------------------------------------------------------------

/// The behavioral modifier attached to an echo point.
///
/// The set is closed. Behaviour that differs per kind is dispatched with a
/// `match` at each call site rather than through per-kind trait objects.
/// Serialized names match the data file written by earlier releases
/// (`ORE_DROP_SHIFT`, `MECHANIC_LOCK`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Distortion {
    /// Ore broken inside the zone drops a different item.
    OreDropShift,
    /// Beds, blocked containers and blocked blocks refuse to work.
    MechanicLock,
    /// Crops near actors grow faster.
    RandomTickBoost,
    /// Actors inside the zone get hungry faster.
    HungerDrift,
    /// Placed blocks may crumble after a delay.
    PlacementDecay,
}

impl Distortion {
    /// Every distortion, in declaration order. Weighted selection walks
    /// this order.
    pub const ALL: [Self; 5] = [
        Self::OreDropShift,
        Self::MechanicLock,
        Self::RandomTickBoost,
        Self::HungerDrift,
        Self::PlacementDecay,
    ];

    /// The persisted name of this distortion.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OreDropShift => "ORE_DROP_SHIFT",
            Self::MechanicLock => "MECHANIC_LOCK",
            Self::RandomTickBoost => "RANDOM_TICK_BOOST",
            Self::HungerDrift => "HUNGER_DRIFT",
            Self::PlacementDecay => "PLACEMENT_DECAY",
        }
    }

    /// Parse a persisted distortion name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl core::fmt::Display for Distortion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Collapse reasons
// ---------------------------------------------------------------------------

/// Why an echo point was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollapseReason {
    /// Accumulated activity reached the point's limit.
    Activity,
    /// The point's own lifetime ran out.
    Ttl,
    /// The whole event ended.
    EventEnd,
    /// An operator collapsed every point.
    OpCommand,
}

impl CollapseReason {
    /// Short label used in logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Ttl => "ttl",
            Self::EventEnd => "event-end",
            Self::OpCommand => "op-command",
        }
    }
}

impl core::fmt::Display for CollapseReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distortion_parse_accepts_persisted_names() {
        assert_eq!(Distortion::parse("HUNGER_DRIFT"), Some(Distortion::HungerDrift));
        assert_eq!(Distortion::parse("placement_decay"), Some(Distortion::PlacementDecay));
        assert_eq!(Distortion::parse("GRAVITY_FLIP"), None);
    }

    #[test]
    fn distortion_serde_uses_screaming_case() {
        let json = serde_json::to_string(&Distortion::RandomTickBoost).ok();
        assert_eq!(json.as_deref(), Some("\"RANDOM_TICK_BOOST\""));
    }

    #[test]
    fn collapse_reason_labels() {
        assert_eq!(CollapseReason::EventEnd.to_string(), "event-end");
        let json = serde_json::to_string(&CollapseReason::OpCommand).ok();
        assert_eq!(json.as_deref(), Some("\"op-command\""));
    }
}
