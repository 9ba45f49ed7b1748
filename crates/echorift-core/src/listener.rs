//! Actor event handlers.
//!
//! The host forwards actor activity here and applies whatever verdict comes
//! back: cancelling the action, replacing drops, opening a substitute
//! inventory or pushing the actor away. Handlers never touch the world
//! themselves except through the delayed decay job.

use std::sync::Arc;

use echorift_types::{ActorId, BlockPos, Distortion, ItemStack, Position};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::debug;

use crate::host::send_message;
use crate::lifecycle::EchoEvent;
use crate::zone::Zone;

/// Vertical velocity given to a knocked back actor.
pub const KNOCKBACK_LIFT: f64 = 0.3;

/// The inventory shown in place of a refused one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Substitute {
    /// The actor's own inventory.
    Own,
    /// A container of the named inventory type.
    Kind(String),
}

/// Push applied to an actor when a mechanic is refused.
///
/// The host sets the actor's velocity to its facing direction scaled by
/// `-strength`, with `lift` as the vertical component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Knockback {
    /// Horizontal magnitude, applied against the facing direction.
    pub strength: f64,
    /// Vertical velocity.
    pub lift: f64,
}

/// What the host should do with a mechanic lock refusal.
#[derive(Debug, Clone, PartialEq)]
pub struct Denial {
    /// Inventory to open instead.
    pub substitute: Substitute,
    /// Push to apply, if knockback is enabled.
    pub knockback: Option<Knockback>,
}

/// Outcome of an interaction handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Let the action proceed.
    Allow,
    /// Cancel the action.
    Deny(Denial),
}

impl Verdict {
    /// Whether the action is cancelled.
    pub const fn is_denied(&self) -> bool {
        matches!(self, Self::Deny(_))
    }
}

/// Replacement for the natural drops of a broken block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropShift {
    /// The only item dropped.
    pub item: ItemStack,
    /// Extra durability taken from the breaking tool.
    pub tool_damage: u32,
}

impl EchoEvent {
    /// An actor moved from `from` to `to`.
    ///
    /// Membership only changes when the actor crosses into a different
    /// block column; entering a zone for the first time sends the enter
    /// message and charges the enter cost.
    pub fn on_move(&self, actor: ActorId, from: &Position, to: &Position) {
        if !self.is_active() {
            return;
        }
        let (a, b) = (from.block(), to.block());
        if a.world == b.world && a.x == b.x && a.z == b.z {
            return;
        }

        let previous = self.zone_at(from);
        let current = self.zone_at(to);
        if previous.as_ref().map(|z| z.id()) == current.as_ref().map(|z| z.id()) {
            return;
        }
        if let Some(zone) = previous {
            self.registry.exit(actor, zone.id());
            debug!(actor = %actor, zone_id = %zone.id(), "Actor left echo point");
        }
        let Some(zone) = current else {
            return;
        };
        if self.registry.enter(actor, zone.id()) {
            let config = self.config();
            debug!(actor = %actor, zone_id = %zone.id(), "Actor entered echo point");
            send_message(self.messages.as_ref(), actor, &config.messages.enter);
            self.registry.add_activity(zone.id(), config.points.enter_cost);
        }
    }

    /// An actor disconnected.
    pub fn on_quit(&self, actor: ActorId) {
        self.registry.exit_all(actor);
    }

    /// An actor broke `material` at `block`.
    ///
    /// Returns the replacement drop when the block sits in an ore drop
    /// shift zone, has a mapping and the roll succeeds.
    pub fn on_block_drop(&self, actor: ActorId, block: &BlockPos, material: &str) -> Option<DropShift> {
        let zone = self.distorted_zone(&block.center(), Distortion::OreDropShift)?;
        let config = self.config();
        let shift = &config.ore_drop_shift;
        let mapping = shift.mapping_for(material)?;

        let (min, max) = if mapping.min <= mapping.max {
            (mapping.min, mapping.max)
        } else {
            (mapping.max, mapping.min)
        };
        let (roll, count) = self.with_rng(|rng| (rng.random::<f64>(), rng.random_range(min..=max)));
        if roll > shift.chance {
            return None;
        }
        let item = ItemStack::new(mapping.drop.clone(), scaled_count(count, mapping.multiplier));

        if !shift.masking {
            send_message(self.messages.as_ref(), actor, &config.messages.ore_reveal);
        }
        debug!(
            actor = %actor,
            zone_id = %zone.id(),
            broken = material,
            drop = %item.material,
            amount = item.amount,
            "Ore drop shifted"
        );
        self.registry.add_activity(zone.id(), shift.activity_gain);
        Some(DropShift {
            item,
            tool_damage: shift.extra_tool_damage,
        })
    }

    /// An actor tried to sleep in the bed at `bed`.
    pub fn on_bed_enter(&self, actor: ActorId, bed: &BlockPos) -> Verdict {
        let Some(zone) = self.distorted_zone(&bed.center(), Distortion::MechanicLock) else {
            return Verdict::Allow;
        };
        self.deny(actor, &zone, "bed")
    }

    /// An actor at `at` tried to open an inventory of type `kind`.
    pub fn on_inventory_open(&self, actor: ActorId, at: &Position, kind: &str) -> Verdict {
        let Some(zone) = self.distorted_zone(at, Distortion::MechanicLock) else {
            return Verdict::Allow;
        };
        if !self.config().mechanic_lock.blocks_inventory(kind) {
            return Verdict::Allow;
        }
        self.deny(actor, &zone, kind)
    }

    /// An actor at `at` used the block `material`.
    pub fn on_interact(&self, actor: ActorId, at: &Position, material: &str) -> Verdict {
        let Some(zone) = self.distorted_zone(at, Distortion::MechanicLock) else {
            return Verdict::Allow;
        };
        if !self.config().mechanic_lock.blocks_block(material) {
            return Verdict::Allow;
        }
        self.deny(actor, &zone, material)
    }

    /// An actor placed `material` at `block`.
    ///
    /// Locked materials are refused in mechanic lock zones. In placement
    /// decay zones a whitelisted block may be scheduled to crumble; the
    /// activity is charged at placement time.
    pub fn on_block_place(
        self: &Arc<Self>,
        actor: ActorId,
        block: &BlockPos,
        material: &str,
    ) -> Verdict {
        let Some(zone) = self.active_zone_at(&block.center()) else {
            return Verdict::Allow;
        };
        let config = self.config();
        match zone.distortion() {
            Distortion::MechanicLock if config.mechanic_lock.blocks_block(material) => {
                self.deny(actor, &zone, material)
            }
            Distortion::PlacementDecay => {
                let decay = &config.placement_decay;
                if !decay.enabled || !decay.allows(material) {
                    return Verdict::Allow;
                }
                let roll = self.with_rng(|rng| rng.random::<f64>());
                if roll <= decay.chance {
                    debug!(actor = %actor, zone_id = %zone.id(), material, "Placement will decay");
                    self.schedule_decay(zone.id(), actor, block.clone(), material.to_owned());
                    self.registry.add_activity(zone.id(), decay.activity_gain);
                }
                Verdict::Allow
            }
            _ => Verdict::Allow,
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Refuse a mechanic: charge activity, tell the actor and pick what the
    /// host shows instead.
    fn deny(&self, actor: ActorId, zone: &Zone, what: &str) -> Verdict {
        let config = self.config();
        let lock = &config.mechanic_lock;
        self.registry.add_activity(zone.id(), lock.activity_gain);
        send_message(self.messages.as_ref(), actor, &config.messages.deny);

        let substitutes = lock.usable_substitutes();
        let substitute = self
            .with_rng(|rng| substitutes.choose(rng).copied())
            .map_or(Substitute::Own, |kind| Substitute::Kind(kind.to_owned()));
        let knockback = lock.knockback.enabled.then_some(Knockback {
            strength: lock.knockback.strength,
            lift: KNOCKBACK_LIFT,
        });
        debug!(actor = %actor, zone_id = %zone.id(), refused = what, ?substitute, "Mechanic refused");
        Verdict::Deny(Denial {
            substitute,
            knockback,
        })
    }

    fn active_zone_at(&self, pos: &Position) -> Option<Arc<Zone>> {
        if !self.is_active() {
            return None;
        }
        self.zone_at(pos)
    }

    fn distorted_zone(&self, pos: &Position, distortion: Distortion) -> Option<Arc<Zone>> {
        self.active_zone_at(pos)
            .filter(|zone| zone.distortion() == distortion)
    }
}

/// `max(1, trunc(count * multiplier))`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scaled_count(count: u32, multiplier: f64) -> u32 {
    let scaled = (f64::from(count) * multiplier).trunc();
    // Float to int casts saturate; NaN becomes zero.
    (scaled as u32).max(1)
}
