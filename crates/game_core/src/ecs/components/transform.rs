//! Transform component: an axis-aligned rect plus a rotation

use crate::ecs::{Component, Entity, World};
use crate::foundation::math::{Aabb, Rect, Vec2};

/// Rotations below this magnitude (radians) are treated as axis-aligned
pub const ROTATION_EPSILON: f32 = 1e-4;

/// Resolved placement of an entity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Transform {
    /// Left edge
    pub actual_x: f32,
    /// Top edge
    pub actual_y: f32,
    /// Width
    pub actual_w: f32,
    /// Height
    pub actual_h: f32,
    /// Rotation in radians about the center
    pub actual_rotation: f32,
}

impl Component for Transform {}

impl Transform {
    /// Create an unrotated transform
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            actual_x: x,
            actual_y: y,
            actual_w: w,
            actual_h: h,
            actual_rotation: 0.0,
        }
    }

    /// Builder: set rotation
    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.actual_rotation = radians;
        self
    }

    /// Unrotated rectangle
    pub fn rect(&self) -> Rect {
        Rect::new(self.actual_x, self.actual_y, self.actual_w, self.actual_h)
    }

    /// Center point
    pub fn center(&self) -> Vec2 {
        self.rect().center()
    }

    /// Bounding box used by the broadphase.
    ///
    /// Half extents grow by sqrt(2) once the rotation is non-negligible so the
    /// box bounds any rotated footprint. Negative sizes are normalized.
    pub fn bounding_box(&self) -> Aabb {
        let factor = if self.actual_rotation.abs() < ROTATION_EPSILON {
            1.0
        } else {
            std::f32::consts::SQRT_2
        };
        let half = Vec2::new(
            self.actual_w * 0.5 * factor,
            self.actual_h * 0.5 * factor,
        );
        Rect::from_center_half_extents(self.center(), half)
    }
}

/// Remove an entity that owns a transform, dropping its components.
///
/// Stale handles are ignored.
pub fn remove_entity(world: &mut World, entity: Entity) {
    if world.has::<Transform>(entity) {
        world.destroy(entity);
    } else {
        log::debug!("remove_entity: {:?} has no transform", entity);
    }
}
