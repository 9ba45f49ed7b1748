//! The default world the headless engine runs in.
//!
//! Two worlds: `world` with three crop fields around the origin, and an
//! empty `world_nether`. The fields give the random tick boost something
//! to grow when actors wander through a boosted point.

use echorift_types::{BlockPos, BlockState};

use crate::error::WorldError;
use crate::world::InMemoryWorld;

/// Name of the overworld.
pub const OVERWORLD: &str = "world";

/// Name of the nether world.
pub const NETHER: &str = "world_nether";

/// Ground level of the overworld.
pub const GROUND_Y: i32 = 64;

/// Final growth stage of the default crops.
const MATURE_STAGE: u8 = 7;

/// One crop field: corner, size and what grows there.
struct FieldPlan {
    x: i32,
    z: i32,
    width: u32,
    depth: u32,
    crop: BlockState,
}

fn field_plans() -> [FieldPlan; 3] {
    [
        FieldPlan {
            x: -24,
            z: -24,
            width: 16,
            depth: 16,
            crop: BlockState::aged("WHEAT", 0, MATURE_STAGE),
        },
        FieldPlan {
            x: 8,
            z: -24,
            width: 12,
            depth: 12,
            crop: BlockState::aged("CARROTS", 0, MATURE_STAGE),
        },
        FieldPlan {
            x: -24,
            z: 8,
            width: 10,
            depth: 4,
            crop: BlockState::of("SUGAR_CANE"),
        },
    ]
}

/// Build the default world set.
pub fn create_starting_world() -> Result<InMemoryWorld, WorldError> {
    let mut world = InMemoryWorld::new();
    world.add_world(OVERWORLD, f64::from(GROUND_Y))?;
    world.add_world(NETHER, 70.0)?;
    for plan in field_plans() {
        world.plant_field(
            &BlockPos::new(OVERWORLD, plan.x, GROUND_Y, plan.z),
            plan.width,
            plan.depth,
            &plan.crop,
        )?;
    }
    Ok(world)
}
