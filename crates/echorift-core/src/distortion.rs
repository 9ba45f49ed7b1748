//! Weighted distortion selection.
//!
//! Enabled distortions with a positive weight form a roulette wheel in
//! declaration order. A roll drawn uniformly from `[1, total]` walks the
//! wheel, subtracting each weight; the first kind that brings the remainder
//! to zero or below wins.

use echorift_types::Distortion;
use rand::Rng;

use crate::config::EchoConfig;

/// The roulette wheel for one spawn attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistortionWheel {
    /// `(kind, weight)` in declaration order, positive weights only.
    entries: Vec<(Distortion, u32)>,
}

impl DistortionWheel {
    /// Build a wheel from explicit weights. Zero weights are dropped.
    pub fn new(entries: impl IntoIterator<Item = (Distortion, u32)>) -> Self {
        Self {
            entries: entries.into_iter().filter(|(_, w)| *w > 0).collect(),
        }
    }

    /// Build the wheel from each distortion's `enabled` flag and `weight`.
    pub fn from_config(config: &EchoConfig) -> Self {
        Self::new(Distortion::ALL.into_iter().filter_map(|kind| {
            let (enabled, weight) = match kind {
                Distortion::OreDropShift => {
                    (config.ore_drop_shift.enabled, config.ore_drop_shift.weight)
                }
                Distortion::MechanicLock => {
                    (config.mechanic_lock.enabled, config.mechanic_lock.weight)
                }
                Distortion::RandomTickBoost => (
                    config.random_tick_boost.enabled,
                    config.random_tick_boost.weight,
                ),
                Distortion::HungerDrift => {
                    (config.hunger_drift.enabled, config.hunger_drift.weight)
                }
                Distortion::PlacementDecay => {
                    (config.placement_decay.enabled, config.placement_decay.weight)
                }
            };
            enabled.then_some((kind, weight))
        }))
    }

    /// Sum of all weights.
    pub fn total_weight(&self) -> u32 {
        self.entries
            .iter()
            .fold(0_u32, |acc, (_, w)| acc.saturating_add(*w))
    }

    /// Resolve a roll in `[1, total]` to a distortion.
    ///
    /// Rolls past the end of the wheel fall back to the first entry.
    pub fn select(&self, roll: u32) -> Option<Distortion> {
        let mut remaining = i64::from(roll);
        for &(kind, weight) in &self.entries {
            remaining = remaining.saturating_sub(i64::from(weight));
            if remaining <= 0 {
                return Some(kind);
            }
        }
        self.entries.first().map(|(kind, _)| *kind)
    }

    /// Draw a distortion, or `None` when no kind is selectable.
    pub fn choose(&self, rng: &mut impl Rng) -> Option<Distortion> {
        let total = self.total_weight();
        if total == 0 {
            return None;
        }
        self.select(rng.random_range(1..=total))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn default_config_enables_every_kind() {
        let wheel = DistortionWheel::from_config(&EchoConfig::default());
        assert_eq!(wheel.total_weight(), 4 + 3 + 3 + 3 + 2);
    }

    #[test]
    fn rolls_walk_declaration_order() {
        let wheel = DistortionWheel::new([
            (Distortion::OreDropShift, 4),
            (Distortion::MechanicLock, 3),
        ]);
        assert_eq!(wheel.select(1), Some(Distortion::OreDropShift));
        assert_eq!(wheel.select(4), Some(Distortion::OreDropShift));
        assert_eq!(wheel.select(5), Some(Distortion::MechanicLock));
        assert_eq!(wheel.select(7), Some(Distortion::MechanicLock));
    }

    #[test]
    fn zero_weight_kind_is_never_chosen() {
        let wheel = DistortionWheel::new([
            (Distortion::OreDropShift, 4),
            (Distortion::MechanicLock, 3),
            (Distortion::RandomTickBoost, 0),
        ]);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10_000 {
            assert_ne!(wheel.choose(&mut rng), Some(Distortion::RandomTickBoost));
        }
    }

    #[test]
    fn disabled_kind_is_never_chosen() {
        let mut config = EchoConfig::default();
        config.placement_decay.enabled = false;
        let wheel = DistortionWheel::from_config(&config);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10_000 {
            assert_ne!(wheel.choose(&mut rng), Some(Distortion::PlacementDecay));
        }
    }

    #[test]
    fn equal_weights_split_evenly() {
        let wheel = DistortionWheel::new([(Distortion::HungerDrift, 1), (Distortion::PlacementDecay, 1)]);
        let mut rng = StdRng::seed_from_u64(42);
        let draws = 100_000_u32;
        let mut hunger = 0_u32;
        for _ in 0..draws {
            if wheel.choose(&mut rng) == Some(Distortion::HungerDrift) {
                hunger += 1;
            }
        }
        let share = f64::from(hunger) / f64::from(draws);
        assert!((0.48..=0.52).contains(&share), "share was {share}");
    }

    #[test]
    fn empty_wheel_selects_nothing() {
        let mut config = EchoConfig::default();
        config.ore_drop_shift.enabled = false;
        config.mechanic_lock.weight = 0;
        config.random_tick_boost.enabled = false;
        config.hunger_drift.enabled = false;
        config.placement_decay.enabled = false;
        let wheel = DistortionWheel::from_config(&config);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(wheel.total_weight(), 0);
        assert_eq!(wheel.choose(&mut rng), None);
    }
}
