//! Collision layer system for filtering collision detection
//!
//! Based on Game Engine Architecture 3rd Edition, Section 13.3.8:
//! "Most games need to filter collisions... This is typically done via
//! collision layers or groups."

/// Named category bits; games are free to define their own above bit 8
pub struct CollisionLayers;

impl CollisionLayers {
    /// No collision layer
    pub const NONE: u32 = 0;

    /// All collision layers
    pub const ALL: u32 = 0xFFFF_FFFF;

    /// Category given to entities without an explicit filter
    pub const DEFAULT: u32 = 1 << 0;

    /// Player-controlled entities
    pub const PLAYER: u32 = 1 << 1;

    /// Hostile entities
    pub const ENEMY: u32 = 1 << 2;

    /// Projectiles
    pub const PROJECTILE: u32 = 1 << 3;

    /// Pickups and collectibles
    pub const PICKUP: u32 = 1 << 4;

    /// Trigger volumes
    pub const TRIGGER: u32 = 1 << 5;

    /// Cards, buttons and other interactive UI
    pub const UI: u32 = 1 << 6;
}

/// Two entities collide only if each one's mask accepts the other's category
pub fn should_collide(category_a: u32, mask_a: u32, category_b: u32, mask_b: u32) -> bool {
    (mask_a & category_b) != 0 && (mask_b & category_a) != 0
}
