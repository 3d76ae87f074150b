//! 2D camera used for world-space draw commands

use crate::foundation::math::{Rect, Vec2};

/// Maps world coordinates onto a canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2D {
    /// World point shown at `offset`
    pub target: Vec2,
    /// Canvas point the target lands on
    pub offset: Vec2,
    /// Rotation in radians around the target
    pub rotation: f32,
    /// Scale factor
    pub zoom: f32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            target: Vec2::zeros(),
            offset: Vec2::zeros(),
            rotation: 0.0,
            zoom: 1.0,
        }
    }
}

impl Camera2D {
    /// Camera centered on `target` for a canvas of `size`
    pub fn centered(target: Vec2, size: Vec2) -> Self {
        Self {
            target,
            offset: size * 0.5,
            ..Self::default()
        }
    }

    /// World point to canvas point
    pub fn world_to_screen(&self, p: Vec2) -> Vec2 {
        let d = (p - self.target) * self.zoom;
        let (s, c) = self.rotation.sin_cos();
        Vec2::new(d.x * c - d.y * s, d.x * s + d.y * c) + self.offset
    }

    /// Canvas point to world point
    pub fn screen_to_world(&self, p: Vec2) -> Vec2 {
        let d = p - self.offset;
        let (s, c) = (-self.rotation).sin_cos();
        let r = Vec2::new(d.x * c - d.y * s, d.x * s + d.y * c);
        r / self.zoom.max(f32::EPSILON) + self.target
    }

    /// Canvas-space bounds of a world rectangle
    pub fn world_rect_to_screen(&self, r: &Rect) -> Rect {
        let corners = [
            self.world_to_screen(r.min()),
            self.world_to_screen(Vec2::new(r.right(), r.y)),
            self.world_to_screen(Vec2::new(r.x, r.bottom())),
            self.world_to_screen(r.max()),
        ];
        let min = corners.iter().fold(corners[0], |m, c| m.inf(c));
        let max = corners.iter().fold(corners[0], |m, c| m.sup(c));
        Rect::from_corners(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_round_trip_with_rotation_and_zoom() {
        let camera = Camera2D {
            target: Vec2::new(100.0, 50.0),
            offset: Vec2::new(640.0, 400.0),
            rotation: 0.3,
            zoom: 2.0,
        };
        let p = Vec2::new(130.0, -20.0);
        let back = camera.screen_to_world(camera.world_to_screen(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-3);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-3);
    }

    #[test]
    fn test_target_lands_on_offset() {
        let camera = Camera2D::centered(Vec2::new(10.0, 10.0), Vec2::new(200.0, 100.0));
        assert_eq!(camera.world_to_screen(Vec2::new(10.0, 10.0)), Vec2::new(100.0, 50.0));
        let r = camera.world_rect_to_screen(&Rect::new(10.0, 10.0, 4.0, 2.0));
        assert_eq!(r, Rect::new(100.0, 50.0, 4.0, 2.0));
    }
}
