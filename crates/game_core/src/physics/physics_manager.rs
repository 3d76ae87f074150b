//! Physics collaborator interface
//!
//! The solver itself lives outside the runtime core. The frame loop only
//! steps it and pushes script-authored transforms into it.

use crate::ecs::{Entity, World};

/// Narrow contract the frame loop needs from a physics backend
pub trait PhysicsManager {
    /// Advance every physics world by one substep
    fn step_all(&mut self, dt: f32);

    /// Push the entity's ECS transform into its body, overriding the solver
    fn apply_authoritative_transform(&mut self, world: &mut World, entity: Entity);

    /// Push velocity and other body state owned by game code into the solver
    fn apply_authoritative_physics(&mut self, world: &mut World, entity: Entity);

    /// Destroy every physics world; used by the re-init sequence
    fn clear_worlds(&mut self);
}

/// Backend that does nothing but count calls
#[derive(Debug, Default)]
pub struct NullPhysics {
    /// Substeps taken since creation
    pub steps: u64,
    /// Sum of substep lengths
    pub simulated_time: f64,
}

impl PhysicsManager for NullPhysics {
    fn step_all(&mut self, dt: f32) {
        self.steps += 1;
        self.simulated_time += f64::from(dt);
    }

    fn apply_authoritative_transform(&mut self, _world: &mut World, _entity: Entity) {}

    fn apply_authoritative_physics(&mut self, _world: &mut World, _entity: Entity) {}

    fn clear_worlds(&mut self) {
        self.steps = 0;
        self.simulated_time = 0.0;
    }
}
