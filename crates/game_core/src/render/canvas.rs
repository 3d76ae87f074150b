//! CPU render targets
//!
//! A canvas is a tightly packed RGBA8 buffer. Rect fills use pixel-center
//! coverage: pixel `i` is inside `[x, x + w)` when `x <= i + 0.5 < x + w`.

use std::path::Path;

use crate::foundation::math::{Color, Rect};

use super::shader::PixelShader;
use super::RenderError;

/// How source pixels combine with what is already in the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Overwrite
    Replace,
    /// Straight-alpha source over
    #[default]
    Alpha,
    /// Premultiplied source over
    Premultiplied,
}

impl BlendMode {
    fn combine(self, dst: Color, src: Color) -> Color {
        match self {
            Self::Replace => src,
            Self::Alpha => Color::blend_alpha(dst, src),
            Self::Premultiplied => Color::blend_premultiplied(dst, src),
        }
    }
}

/// Offscreen RGBA render target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
}

impl Canvas {
    /// Transparent canvas of the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Color::BLANK; width as usize * height as usize],
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major pixel storage
    pub fn pixels(&self) -> &[Color] {
        &self.pixels
    }

    /// Raw RGBA bytes
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Pixel at `(x, y)`, `None` outside the canvas
    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Overwrite one pixel; out-of-range writes are ignored
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color;
        }
    }

    /// Fill every pixel
    pub fn clear(&mut self, color: Color) {
        self.pixels.fill(color);
    }

    /// Pixel span `[start, end)` covered by `[lo, hi)` along an axis of `len`
    fn span(lo: f32, hi: f32, len: u32) -> (u32, u32) {
        let start = (lo - 0.5).ceil().max(0.0);
        let end = (hi - 0.5).ceil().clamp(0.0, len as f32);
        (start as u32, (end as u32).max(start as u32))
    }

    /// Fill a rectangle, clipped to the canvas
    pub fn fill_rect(&mut self, rect: &Rect, color: Color, blend: BlendMode) {
        let (x0, x1) = Self::span(rect.x, rect.right(), self.width);
        let (y0, y1) = Self::span(rect.y, rect.bottom(), self.height);
        for y in y0..y1 {
            let row = y as usize * self.width as usize;
            for x in x0..x1 {
                let i = row + x as usize;
                self.pixels[i] = blend.combine(self.pixels[i], color);
            }
        }
    }

    /// Draw `src` with its top-left at `(dx, dy)`, optionally through a shader
    pub fn draw_canvas(
        &mut self,
        src: &Canvas,
        dx: i32,
        dy: i32,
        shader: Option<&dyn PixelShader>,
        blend: BlendMode,
    ) {
        for sy in 0..src.height {
            let ty = dy + sy as i32;
            if ty < 0 || ty >= self.height as i32 {
                continue;
            }
            for sx in 0..src.width {
                let tx = dx + sx as i32;
                if tx < 0 || tx >= self.width as i32 {
                    continue;
                }
                let mut color = src.pixels[sy as usize * src.width as usize + sx as usize];
                if let Some(shader) = shader {
                    color = shader.shade(color, sx, sy);
                }
                let i = ty as usize * self.width as usize + tx as usize;
                self.pixels[i] = blend.combine(self.pixels[i], color);
            }
        }
    }

    /// Nearest-neighbor draw of the whole of `src` into `dest`
    pub fn draw_canvas_scaled(&mut self, src: &Canvas, dest: &Rect, blend: BlendMode) {
        if src.width == 0 || src.height == 0 || dest.w <= 0.0 || dest.h <= 0.0 {
            return;
        }
        let (x0, x1) = Self::span(dest.x, dest.right(), self.width);
        let (y0, y1) = Self::span(dest.y, dest.bottom(), self.height);
        let sx_scale = src.width as f32 / dest.w;
        let sy_scale = src.height as f32 / dest.h;
        for y in y0..y1 {
            let v = ((y as f32 + 0.5 - dest.y) * sy_scale) as u32;
            let v = v.min(src.height - 1);
            for x in x0..x1 {
                let u = ((x as f32 + 0.5 - dest.x) * sx_scale) as u32;
                let u = u.min(src.width - 1);
                let color = src.pixels[v as usize * src.width as usize + u as usize];
                let i = y as usize * self.width as usize + x as usize;
                self.pixels[i] = blend.combine(self.pixels[i], color);
            }
        }
    }

    /// Write the canvas out as a PNG
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), RenderError> {
        let image = image::RgbaImage::from_raw(self.width, self.height, self.as_bytes().to_vec())
            .ok_or_else(|| RenderError::Export("pixel buffer size mismatch".to_string()))?;
        image
            .save_with_format(path.as_ref(), image::ImageFormat::Png)
            .map_err(|e| RenderError::Export(format!("{}: {}", path.as_ref().display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_rect_pixel_centers() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill_rect(&Rect::new(1.0, 1.0, 2.0, 2.0), Color::RED, BlendMode::Replace);
        assert_eq!(canvas.pixel(0, 0), Some(Color::BLANK));
        assert_eq!(canvas.pixel(1, 1), Some(Color::RED));
        assert_eq!(canvas.pixel(2, 2), Some(Color::RED));
        assert_eq!(canvas.pixel(3, 3), Some(Color::BLANK));
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut canvas = Canvas::new(2, 2);
        canvas.fill_rect(&Rect::new(-10.0, -10.0, 100.0, 100.0), Color::GREEN, BlendMode::Replace);
        assert!(canvas.pixels().iter().all(|p| *p == Color::GREEN));
    }

    #[test]
    fn test_alpha_blend_over_opaque() {
        let mut canvas = Canvas::new(1, 1);
        canvas.clear(Color::BLACK);
        canvas.fill_rect(&Rect::new(0.0, 0.0, 1.0, 1.0), Color::rgba(255, 255, 255, 128), BlendMode::Alpha);
        let p = canvas.pixel(0, 0).unwrap();
        assert_eq!(p.a, 255);
        assert!((127..=129).contains(&p.r));
    }

    #[test]
    fn test_scaled_draw_fills_dest() {
        let mut src = Canvas::new(2, 1);
        src.set_pixel(0, 0, Color::RED);
        src.set_pixel(1, 0, Color::BLUE);
        let mut dst = Canvas::new(4, 2);
        dst.draw_canvas_scaled(&src, &Rect::new(0.0, 0.0, 4.0, 2.0), BlendMode::Replace);
        assert_eq!(dst.pixel(1, 1), Some(Color::RED));
        assert_eq!(dst.pixel(2, 0), Some(Color::BLUE));
    }

    #[test]
    fn test_png_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        let mut canvas = Canvas::new(3, 2);
        canvas.clear(Color::BLUE);
        canvas.save_png(&path).unwrap();
        let loaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(loaded.dimensions(), (3, 2));
        assert_eq!(loaded.get_pixel(2, 1).0, [0, 0, 255, 255]);
    }
}
