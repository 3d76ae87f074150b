//! Collision-related components

use crate::ecs::Component;
use crate::physics::collision_layers::{CollisionLayers, should_collide};

/// Category/mask pair used to filter broadphase pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    /// Bits this entity belongs to
    pub category: u32,
    /// Bits this entity is willing to collide with
    pub mask: u32,
}

impl Component for CollisionFilter {}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            category: CollisionLayers::DEFAULT,
            mask: CollisionLayers::ALL,
        }
    }
}

impl CollisionFilter {
    /// Create a filter
    pub const fn new(category: u32, mask: u32) -> Self {
        Self { category, mask }
    }

    /// Both sides must accept the other
    pub fn accepts(&self, other: &Self) -> bool {
        should_collide(self.category, self.mask, other.category, other.mask)
    }
}

/// Routes an entity into the UI quadtree instead of the world quadtree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScreenSpaceCollisionMarker;

impl Component for ScreenSpaceCollisionMarker {}
