//! An in-memory host world.
//!
//! [`InMemoryWorld`] holds a set of named worlds, a sparse block map where
//! unset cells read as air, and the online actors with their positions,
//! hunger and inventories. Messages are logged and kept in a bounded
//! outbox; particles and sounds are only logged.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use echorift_core::host::{HostError, MessageSink, WorldHost};
use echorift_types::{
    ActorId, BlockPos, BlockState, ItemStack, ParticleEffect, Position, SoundEffect,
};
use tracing::{debug, info, trace};

use crate::error::WorldError;

/// Inventory stacks an actor can hold.
pub const INVENTORY_SLOTS: usize = 36;

/// Largest stack size.
pub const MAX_STACK: u32 = 64;

/// Exhaustion at which one point of food is consumed.
pub const EXHAUSTION_PER_FOOD: f32 = 4.0;

/// Messages kept in the outbox before the oldest are dropped.
const OUTBOX_CAPACITY: usize = 256;

/// Food level of a fresh actor.
const FULL_FOOD: u32 = 20;

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

/// State of one online actor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorState {
    /// Display name.
    pub name: String,
    /// Current position.
    pub position: Position,
    /// Food level (0-20).
    pub food: u32,
    /// Exhaustion accumulated towards the next food point.
    pub exhaustion: f32,
    /// Held stacks.
    pub inventory: Vec<ItemStack>,
}

impl ActorState {
    fn new(name: String, position: Position) -> Self {
        Self {
            name,
            position,
            food: FULL_FOOD,
            exhaustion: 0.0,
            inventory: Vec::new(),
        }
    }

    /// Merge `item` into the inventory. Returns what did not fit.
    fn store(&mut self, item: &ItemStack) -> Option<ItemStack> {
        let mut remaining = item.amount;
        for stack in self
            .inventory
            .iter_mut()
            .filter(|s| s.material.eq_ignore_ascii_case(&item.material))
        {
            let room = MAX_STACK.saturating_sub(stack.amount);
            let moved = room.min(remaining);
            stack.amount = stack.amount.saturating_add(moved);
            remaining = remaining.saturating_sub(moved);
        }
        while remaining > 0 && self.inventory.len() < INVENTORY_SLOTS {
            let moved = remaining.min(MAX_STACK);
            self.inventory.push(ItemStack::new(item.material.clone(), moved));
            remaining = remaining.saturating_sub(moved);
        }
        (remaining > 0).then(|| ItemStack::new(item.material.clone(), remaining))
    }
}

/// A delivered chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatLine {
    /// Sent to one actor.
    Direct {
        /// Recipient.
        actor: ActorId,
        /// Text.
        text: String,
    },
    /// Sent to everyone.
    Broadcast {
        /// Text.
        text: String,
    },
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The in-memory world.
#[derive(Debug, Default)]
pub struct InMemoryWorld {
    /// World name to spawn height.
    worlds: BTreeMap<String, f64>,
    blocks: DashMap<BlockPos, BlockState>,
    actors: DashMap<ActorId, ActorState>,
    dropped: Mutex<Vec<(BlockPos, ItemStack)>>,
    outbox: Mutex<VecDeque<ChatLine>>,
}

impl InMemoryWorld {
    /// Create an empty world set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a world whose effects anchor at `spawn_height`.
    pub fn add_world(&mut self, name: &str, spawn_height: f64) -> Result<(), WorldError> {
        if self.worlds.contains_key(name) {
            return Err(WorldError::DuplicateWorld {
                name: name.to_owned(),
            });
        }
        self.worlds.insert(name.to_owned(), spawn_height);
        Ok(())
    }

    /// Fill a `width` x `depth` rectangle at height `origin.y` with `state`.
    ///
    /// Returns the number of cells written.
    pub fn plant_field(
        &self,
        origin: &BlockPos,
        width: u32,
        depth: u32,
        state: &BlockState,
    ) -> Result<usize, WorldError> {
        self.check_world(&origin.world)?;
        let mut planted = 0_usize;
        for dx in 0..i32::try_from(width).unwrap_or(i32::MAX) {
            for dz in 0..i32::try_from(depth).unwrap_or(i32::MAX) {
                self.blocks.insert(origin.offset(dx, 0, dz), state.clone());
                planted = planted.saturating_add(1);
            }
        }
        debug!(
            world = %origin.world,
            x = origin.x,
            z = origin.z,
            width,
            depth,
            material = %state.material,
            "Field planted"
        );
        Ok(planted)
    }

    // -----------------------------------------------------------------------
    // Actors
    // -----------------------------------------------------------------------

    /// Bring an actor online at `position`.
    pub fn join(&self, actor: ActorId, name: &str, position: Position) -> Result<(), WorldError> {
        self.check_world(&position.world)?;
        info!(actor = %actor, name, world = %position.world, "Actor joined");
        self.actors
            .insert(actor, ActorState::new(name.to_owned(), position));
        Ok(())
    }

    /// Take an actor offline. Returns whether it was online.
    pub fn leave(&self, actor: ActorId) -> bool {
        let left = self.actors.remove(&actor).is_some();
        if left {
            info!(actor = %actor, "Actor left");
        }
        left
    }

    /// Move an actor. Returns the position it moved from.
    pub fn move_actor(&self, actor: ActorId, to: Position) -> Result<Position, WorldError> {
        self.check_world(&to.world)?;
        let mut state = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::UnknownActor { actor })?;
        Ok(std::mem::replace(&mut state.position, to))
    }

    /// A copy of an actor's state.
    pub fn actor(&self, actor: ActorId) -> Option<ActorState> {
        self.actors.get(&actor).map(|state| state.clone())
    }

    /// Number of online actors.
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    /// Drain the message outbox.
    pub fn take_messages(&self) -> Vec<ChatLine> {
        lock(&self.outbox).drain(..).collect()
    }

    /// Items dropped into the world so far.
    pub fn dropped_items(&self) -> Vec<(BlockPos, ItemStack)> {
        lock(&self.dropped).clone()
    }

    /// Count cells holding `material` whose stage is at least `stage`.
    ///
    /// Cells without an age count for any `stage`.
    pub fn count_blocks(&self, material: &str, stage: u8) -> usize {
        self.blocks
            .iter()
            .filter(|cell| {
                cell.value().is(material) && cell.value().age.is_none_or(|age| age.stage >= stage)
            })
            .count()
    }

    fn check_world(&self, world: &str) -> Result<(), WorldError> {
        if self.worlds.contains_key(world) {
            Ok(())
        } else {
            Err(WorldError::UnknownWorld {
                name: world.to_owned(),
            })
        }
    }

    fn post(&self, line: ChatLine) {
        let mut outbox = lock(&self.outbox);
        if outbox.len() >= OUTBOX_CAPACITY {
            outbox.pop_front();
        }
        outbox.push_back(line);
    }
}

impl WorldHost for InMemoryWorld {
    fn world_names(&self) -> Vec<String> {
        self.worlds.keys().cloned().collect()
    }

    fn spawn_height(&self, world: &str) -> Option<f64> {
        self.worlds.get(world).copied()
    }

    fn online_actors(&self) -> Vec<ActorId> {
        let mut actors: Vec<ActorId> = self.actors.iter().map(|entry| *entry.key()).collect();
        actors.sort_unstable();
        actors
    }

    fn actor_position(&self, actor: ActorId) -> Option<Position> {
        self.actors.get(&actor).map(|state| state.position.clone())
    }

    fn block(&self, pos: &BlockPos) -> Result<BlockState, HostError> {
        self.check_world(&pos.world)?;
        Ok(self
            .blocks
            .get(pos)
            .map_or_else(BlockState::air, |cell| cell.value().clone()))
    }

    fn set_block(&self, pos: &BlockPos, state: BlockState) -> Result<(), HostError> {
        self.check_world(&pos.world)?;
        trace!(world = %pos.world, x = pos.x, y = pos.y, z = pos.z, material = %state.material, "Block set");
        if state.is_air() {
            self.blocks.remove(pos);
        } else {
            self.blocks.insert(pos.clone(), state);
        }
        Ok(())
    }

    fn spawn_particles(&self, at: &Position, effect: &ParticleEffect) -> Result<(), HostError> {
        self.check_world(&at.world)?;
        trace!(world = %at.world, kind = %effect.kind, count = effect.count, "Particles");
        Ok(())
    }

    fn play_sound(&self, at: &Position, sound: &SoundEffect) -> Result<(), HostError> {
        self.check_world(&at.world)?;
        trace!(world = %at.world, kind = %sound.kind, "Sound");
        Ok(())
    }

    fn add_exhaustion(&self, actor: ActorId, amount: f32) -> Result<(), HostError> {
        let mut state = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::UnknownActor { actor })?;
        state.exhaustion = (state.exhaustion + amount).max(0.0);
        while state.exhaustion >= EXHAUSTION_PER_FOOD {
            state.exhaustion -= EXHAUSTION_PER_FOOD;
            state.food = state.food.saturating_sub(1);
        }
        Ok(())
    }

    fn give_item(&self, actor: ActorId, item: &ItemStack) -> Result<Option<ItemStack>, HostError> {
        let mut state = self
            .actors
            .get_mut(&actor)
            .ok_or(WorldError::UnknownActor { actor })?;
        Ok(state.store(item))
    }

    fn drop_item(&self, at: &BlockPos, item: &ItemStack) -> Result<(), HostError> {
        self.check_world(&at.world)?;
        debug!(world = %at.world, x = at.x, y = at.y, z = at.z, item = %item.material, amount = item.amount, "Item dropped");
        lock(&self.dropped).push((at.clone(), item.clone()));
        Ok(())
    }
}

impl MessageSink for InMemoryWorld {
    fn send(&self, actor: ActorId, text: &str) {
        let name = self
            .actors
            .get(&actor)
            .map(|state| state.name.clone())
            .unwrap_or_default();
        info!(actor = %actor, name = %name, text, "Message");
        self.post(ChatLine::Direct {
            actor,
            text: text.to_owned(),
        });
    }

    fn broadcast(&self, text: &str) {
        info!(text, "Broadcast");
        self.post(ChatLine::Broadcast {
            text: text.to_owned(),
        });
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn world() -> InMemoryWorld {
        let mut world = InMemoryWorld::new();
        world.add_world("world", 64.0).unwrap();
        world
    }

    #[test]
    fn duplicate_worlds_are_rejected() {
        let mut world = world();
        assert!(matches!(
            world.add_world("world", 70.0),
            Err(WorldError::DuplicateWorld { .. })
        ));
    }

    #[test]
    fn unset_cells_are_air_and_air_clears() {
        let world = world();
        let pos = BlockPos::new("world", 1, 64, 1);
        assert!(world.block(&pos).unwrap().is_air());
        world.set_block(&pos, BlockState::of("DIRT")).unwrap();
        assert!(world.block(&pos).unwrap().is("DIRT"));
        world.set_block(&pos, BlockState::air()).unwrap();
        assert_eq!(world.count_blocks("DIRT", 0), 0);
        assert!(world.block(&BlockPos::new("nether", 0, 0, 0)).is_err());
    }

    #[test]
    fn fields_fill_rectangles() {
        let world = world();
        let planted = world
            .plant_field(
                &BlockPos::new("world", 10, 64, 10),
                4,
                3,
                &BlockState::aged("WHEAT", 0, 7),
            )
            .unwrap();
        assert_eq!(planted, 12);
        assert_eq!(world.count_blocks("WHEAT", 0), 12);
        assert_eq!(world.count_blocks("WHEAT", 1), 0);
    }

    #[test]
    fn exhaustion_consumes_food() {
        let world = world();
        let actor = ActorId::new();
        world
            .join(actor, "wanderer", Position::new("world", 0.0, 64.0, 0.0))
            .unwrap();
        world.add_exhaustion(actor, 3.0).unwrap();
        world.add_exhaustion(actor, 3.0).unwrap();
        let state = world.actor(actor).unwrap();
        assert_eq!(state.food, 19);
        assert!((state.exhaustion - 2.0).abs() < 1e-6);
        assert!(world.add_exhaustion(ActorId::new(), 1.0).is_err());
    }

    #[test]
    fn negative_exhaustion_floors_at_zero() {
        let world = world();
        let actor = ActorId::new();
        world
            .join(actor, "wanderer", Position::new("world", 0.0, 64.0, 0.0))
            .unwrap();
        world.add_exhaustion(actor, 0.3).unwrap();
        world.add_exhaustion(actor, -0.5).unwrap();
        let state = world.actor(actor).unwrap();
        assert!(state.exhaustion.abs() < 1e-6);
        assert_eq!(state.food, 20);
    }

    #[test]
    fn full_inventory_returns_leftover() {
        let world = world();
        let actor = ActorId::new();
        world
            .join(actor, "hoarder", Position::new("world", 0.0, 64.0, 0.0))
            .unwrap();
        // 36 full stacks plus ten.
        let huge = ItemStack::new("DIRT", 2314);
        let leftover = world.give_item(actor, &huge).unwrap();
        assert_eq!(leftover, Some(ItemStack::new("DIRT", 10)));
        assert_eq!(world.actor(actor).unwrap().inventory.len(), INVENTORY_SLOTS);
    }

    #[test]
    fn movement_reports_previous_position() {
        let world = world();
        let actor = ActorId::new();
        let start = Position::new("world", 0.0, 64.0, 0.0);
        world.join(actor, "walker", start.clone()).unwrap();
        let from = world
            .move_actor(actor, Position::new("world", 3.0, 64.0, 0.0))
            .unwrap();
        assert_eq!(from, start);
        assert!(world.leave(actor));
        assert!(world.actor_position(actor).is_none());
    }

    #[test]
    fn outbox_is_bounded() {
        let world = world();
        for i in 0..261 {
            world.broadcast(&format!("line {i}"));
        }
        let lines = world.take_messages();
        assert_eq!(lines.len(), OUTBOX_CAPACITY);
        assert_eq!(
            lines.first(),
            Some(&ChatLine::Broadcast {
                text: "line 5".to_owned()
            })
        );
        assert!(world.take_messages().is_empty());
    }
}
