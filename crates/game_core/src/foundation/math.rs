//! 2D math primitives
//!
//! Vectors come from nalgebra; rectangles and colors are small value types
//! used by the spatial index, the collision orchestrator and the canvases.

use serde::{Deserialize, Serialize};

/// 2D vector used for positions, offsets and sizes
pub type Vec2 = nalgebra::Vector2<f32>;

/// Axis-aligned rectangle stored as top-left corner plus size
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub w: f32,
    /// Height
    pub h: f32,
}

/// AABB alias used by the spatial index
pub type Aabb = Rect;

impl Rect {
    /// Create a rectangle from top-left corner and size
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Create a rectangle from two corners, normalizing so that size is non-negative
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        let min_x = a.x.min(b.x);
        let min_y = a.y.min(b.y);
        Self {
            x: min_x,
            y: min_y,
            w: a.x.max(b.x) - min_x,
            h: a.y.max(b.y) - min_y,
        }
    }

    /// Create a rectangle centered on `center` with the given half extents
    pub fn from_center_half_extents(center: Vec2, half: Vec2) -> Self {
        Self::from_corners(center - half, center + half)
    }

    /// Right edge
    pub fn right(&self) -> f32 {
        self.x + self.w
    }

    /// Bottom edge
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    /// Center point
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.w * 0.5, self.y + self.h * 0.5)
    }

    /// Top-left corner
    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Bottom-right corner
    pub fn max(&self) -> Vec2 {
        Vec2::new(self.right(), self.bottom())
    }

    /// Inclusive overlap test; touching edges count as overlapping
    pub fn intersects(&self, other: &Self) -> bool {
        self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// True when `other` lies entirely inside this rectangle
    pub fn contains_rect(&self, other: &Self) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// True when the point lies inside (edges inclusive)
    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Grow the rectangle by `amount` on every side
    pub fn inflate(&self, amount: f32) -> Self {
        Self {
            x: self.x - amount,
            y: self.y - amount,
            w: self.w + amount * 2.0,
            h: self.h + amount * 2.0,
        }
    }

    /// Translate the rectangle
    pub fn translated(&self, offset: Vec2) -> Self {
        Self {
            x: self.x + offset.x,
            y: self.y + offset.y,
            ..*self
        }
    }

    /// Overlapping region of two rectangles, if any
    pub fn intersection(&self, other: &Self) -> Option<Self> {
        if !self.intersects(other) {
            return None;
        }
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        Some(Self {
            x,
            y,
            w: self.right().min(other.right()) - x,
            h: self.bottom().min(other.bottom()) - y,
        })
    }
}

/// 8-bit RGBA color, laid out to match canvas pixel memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Color {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
    /// Alpha
    pub a: u8,
}

impl Color {
    /// Fully transparent black
    pub const BLANK: Self = Self::rgba(0, 0, 0, 0);
    /// Opaque black
    pub const BLACK: Self = Self::rgba(0, 0, 0, 255);
    /// Opaque white
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);
    /// Opaque red
    pub const RED: Self = Self::rgba(255, 0, 0, 255);
    /// Opaque green
    pub const GREEN: Self = Self::rgba(0, 255, 0, 255);
    /// Opaque blue
    pub const BLUE: Self = Self::rgba(0, 0, 255, 255);

    /// Build a color from components
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Convert straight alpha to premultiplied alpha
    pub fn premultiplied(self) -> Self {
        let scale = |c: u8| ((u16::from(c) * u16::from(self.a) + 127) / 255) as u8;
        Self::rgba(scale(self.r), scale(self.g), scale(self.b), self.a)
    }

    /// Source-over blend where `src` is already premultiplied
    pub fn blend_premultiplied(dst: Self, src: Self) -> Self {
        let inv = 255 - u16::from(src.a);
        let mix = |s: u8, d: u8| (u16::from(s) + (u16::from(d) * inv + 127) / 255).min(255) as u8;
        Self::rgba(
            mix(src.r, dst.r),
            mix(src.g, dst.g),
            mix(src.b, dst.b),
            mix(src.a, dst.a),
        )
    }

    /// Source-over blend where both colors use straight alpha
    pub fn blend_alpha(dst: Self, src: Self) -> Self {
        match src.a {
            255 => return src,
            0 => return dst,
            _ => {}
        }
        let sa = f32::from(src.a) / 255.0;
        let da = f32::from(dst.a) / 255.0 * (1.0 - sa);
        let out_a = sa + da;
        let mix = |s: u8, d: u8| {
            ((f32::from(s) * sa + f32::from(d) * da) / out_a)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Self::rgba(
            mix(src.r, dst.r),
            mix(src.g, dst.g),
            mix(src.b, dst.b),
            (out_a * 255.0).round() as u8,
        )
    }
}
