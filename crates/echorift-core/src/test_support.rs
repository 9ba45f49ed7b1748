//! In-memory fakes for unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use echorift_types::{
    ActorId, BlockPos, BlockState, CollapseReason, EventSnapshot, ItemStack, ParticleEffect,
    Position, SoundEffect, ZoneId,
};

use crate::host::{HostError, MessageSink, WorldHost};
use crate::persist::{StatePersistence, StoreError};
use crate::registry::CollapseObserver;
use crate::zone::Zone;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct FakeState {
    actors: BTreeMap<ActorId, Position>,
    blocks: HashMap<BlockPos, BlockState>,
    sent: Vec<(ActorId, String)>,
    broadcasts: Vec<String>,
    exhaustion: HashMap<ActorId, f32>,
    inventories: HashMap<ActorId, Vec<ItemStack>>,
    dropped: Vec<(BlockPos, ItemStack)>,
    particles: Vec<(Position, ParticleEffect)>,
    sounds: Vec<(Position, SoundEffect)>,
    reads: Vec<BlockPos>,
}

/// A world with fixed worlds, placeable actors and a sparse block map
/// where unset cells are air. Records every message and effect.
#[derive(Debug)]
pub struct FakeHost {
    worlds: Vec<String>,
    state: Mutex<FakeState>,
}

impl FakeHost {
    pub fn new(worlds: &[&str]) -> Self {
        Self {
            worlds: worlds.iter().map(|w| (*w).to_owned()).collect(),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Put an actor online at `pos`.
    pub fn place_actor(&self, actor: ActorId, pos: Position) {
        lock(&self.state).actors.insert(actor, pos);
    }

    /// Set a square of cells at height `y`.
    pub fn fill(&self, world: &str, cx: i32, y: i32, cz: i32, reach: i32, state: &BlockState) {
        let mut guard = lock(&self.state);
        for x in cx.saturating_sub(reach)..=cx.saturating_add(reach) {
            for z in cz.saturating_sub(reach)..=cz.saturating_add(reach) {
                guard.blocks.insert(BlockPos::new(world, x, y, z), state.clone());
            }
        }
    }

    pub fn sent(&self) -> Vec<(ActorId, String)> {
        lock(&self.state).sent.clone()
    }

    pub fn broadcasts(&self) -> Vec<String> {
        lock(&self.state).broadcasts.clone()
    }

    pub fn exhaustion(&self, actor: ActorId) -> f32 {
        lock(&self.state).exhaustion.get(&actor).copied().unwrap_or(0.0)
    }

    pub fn inventory(&self, actor: ActorId) -> Vec<ItemStack> {
        lock(&self.state).inventories.get(&actor).cloned().unwrap_or_default()
    }

    pub fn dropped(&self) -> Vec<(BlockPos, ItemStack)> {
        lock(&self.state).dropped.clone()
    }

    pub fn particles(&self) -> Vec<(Position, ParticleEffect)> {
        lock(&self.state).particles.clone()
    }

    pub fn sounds(&self) -> Vec<(Position, SoundEffect)> {
        lock(&self.state).sounds.clone()
    }

    /// Every cell looked up through `block`, in order.
    pub fn reads(&self) -> Vec<BlockPos> {
        lock(&self.state).reads.clone()
    }

    fn check_world(&self, world: &str) -> Result<(), HostError> {
        if self.worlds.iter().any(|w| w == world) {
            Ok(())
        } else {
            Err(HostError::WorldNotLoaded {
                world: world.to_owned(),
            })
        }
    }
}

impl WorldHost for FakeHost {
    fn world_names(&self) -> Vec<String> {
        self.worlds.clone()
    }

    fn spawn_height(&self, world: &str) -> Option<f64> {
        self.check_world(world).ok().map(|()| 64.0)
    }

    fn online_actors(&self) -> Vec<ActorId> {
        lock(&self.state).actors.keys().copied().collect()
    }

    fn actor_position(&self, actor: ActorId) -> Option<Position> {
        lock(&self.state).actors.get(&actor).cloned()
    }

    fn block(&self, pos: &BlockPos) -> Result<BlockState, HostError> {
        self.check_world(&pos.world)?;
        let mut guard = lock(&self.state);
        guard.reads.push(pos.clone());
        Ok(guard.blocks.get(pos).cloned().unwrap_or_else(BlockState::air))
    }

    fn set_block(&self, pos: &BlockPos, state: BlockState) -> Result<(), HostError> {
        self.check_world(&pos.world)?;
        lock(&self.state).blocks.insert(pos.clone(), state);
        Ok(())
    }

    fn spawn_particles(&self, at: &Position, effect: &ParticleEffect) -> Result<(), HostError> {
        lock(&self.state).particles.push((at.clone(), effect.clone()));
        Ok(())
    }

    fn play_sound(&self, at: &Position, sound: &SoundEffect) -> Result<(), HostError> {
        lock(&self.state).sounds.push((at.clone(), sound.clone()));
        Ok(())
    }

    fn add_exhaustion(&self, actor: ActorId, amount: f32) -> Result<(), HostError> {
        let mut guard = lock(&self.state);
        if !guard.actors.contains_key(&actor) {
            return Err(HostError::ActorOffline { actor });
        }
        let total = guard.exhaustion.entry(actor).or_default();
        *total = (*total + amount).max(0.0);
        Ok(())
    }

    fn give_item(&self, actor: ActorId, item: &ItemStack) -> Result<Option<ItemStack>, HostError> {
        let mut guard = lock(&self.state);
        if !guard.actors.contains_key(&actor) {
            return Err(HostError::ActorOffline { actor });
        }
        guard.inventories.entry(actor).or_default().push(item.clone());
        Ok(None)
    }

    fn drop_item(&self, at: &BlockPos, item: &ItemStack) -> Result<(), HostError> {
        lock(&self.state).dropped.push((at.clone(), item.clone()));
        Ok(())
    }
}

impl MessageSink for FakeHost {
    fn send(&self, actor: ActorId, text: &str) {
        lock(&self.state).sent.push((actor, text.to_owned()));
    }

    fn broadcast(&self, text: &str) {
        lock(&self.state).broadcasts.push(text.to_owned());
    }
}

/// Remembers every collapse it is told about.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<(ZoneId, CollapseReason)>>,
}

impl RecordingObserver {
    pub fn collapses(&self) -> Vec<(ZoneId, CollapseReason)> {
        lock(&self.seen).clone()
    }
}

impl CollapseObserver for RecordingObserver {
    fn on_collapse(&self, zone: &Zone, reason: CollapseReason) {
        lock(&self.seen).push((zone.id(), reason));
    }
}

/// Keeps the last saved snapshot in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<EventSnapshot>>,
}

impl MemoryStore {
    pub fn put(&self, snapshot: EventSnapshot) {
        *lock(&self.snapshot) = Some(snapshot);
    }

    pub fn get(&self) -> Option<EventSnapshot> {
        lock(&self.snapshot).clone()
    }
}

impl StatePersistence for MemoryStore {
    fn save(&self, snapshot: &EventSnapshot) -> Result<(), StoreError> {
        self.put(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<EventSnapshot>, StoreError> {
        Ok(self.get())
    }
}
