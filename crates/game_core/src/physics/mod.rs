//! Physics boundary and collision orchestration
//!
//! The solver is an external collaborator behind [`PhysicsManager`]; this
//! module owns collision filtering and the per-frame broadphase.

pub mod collision_layers;
pub mod collision_system;
pub mod physics_manager;

pub use collision_layers::{should_collide, CollisionLayers};
pub use collision_system::{CollisionFrame, CollisionSpace, CollisionSystem};
pub use physics_manager::{NullPhysics, PhysicsManager};
