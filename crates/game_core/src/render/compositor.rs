//! Final composite and letterboxed presentation

use crate::foundation::math::{Color, Rect};

use super::canvas::{BlendMode, Canvas};
use super::layer::{LayerRegistry, MAIN_CANVAS};
use super::pipeline::run_shader_pipeline;
use super::shader::ShaderRegistry;
use super::RenderError;

/// Layer holding the static backdrop
pub const BACKGROUND_LAYER: &str = "background";
/// Layer holding world sprites
pub const SPRITES_LAYER: &str = "sprites";
/// Layer holding UI
pub const UI_LAYER: &str = "ui_layer";
/// Layer receiving the composite and global post-processing
pub const FINAL_LAYER: &str = "final";

/// Uniform scale and centering offsets that fit the virtual canvas in a window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Uniform scale factor
    pub scale: f32,
    /// Horizontal bar width
    pub offset_x: f32,
    /// Vertical bar height
    pub offset_y: f32,
}

impl Letterbox {
    /// Fit `virtual_w x virtual_h` inside `screen_w x screen_h`
    pub fn compute(virtual_w: f32, virtual_h: f32, screen_w: f32, screen_h: f32) -> Self {
        let scale = (screen_w / virtual_w).min(screen_h / virtual_h);
        Self {
            scale,
            offset_x: (screen_w - virtual_w * scale) / 2.0,
            offset_y: (screen_h - virtual_h * scale) / 2.0,
        }
    }

    /// Screen rectangle the virtual canvas occupies
    pub fn dest_rect(&self, virtual_w: f32, virtual_h: f32) -> Rect {
        Rect::new(
            self.offset_x,
            self.offset_y,
            virtual_w * self.scale,
            virtual_h * self.scale,
        )
    }

    /// Map a window position into virtual coordinates
    pub fn screen_to_virtual(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.offset_x) / self.scale, (y - self.offset_y) / self.scale)
    }
}

/// Draw the background, sprite and UI layers into `final.main`, then run
/// the final layer's own shader stack as global post-processing.
///
/// Missing source layers are skipped; a missing final layer is an error.
pub fn composite(layers: &mut LayerRegistry, shaders: &ShaderRegistry) -> Result<(), RenderError> {
    let mut target = layers.require_mut(FINAL_LAYER)?.take_canvas(MAIN_CANVAS)?;
    target.clear(Color::BLANK);

    for (name, blend) in [
        (BACKGROUND_LAYER, BlendMode::Alpha),
        (SPRITES_LAYER, BlendMode::Premultiplied),
        (UI_LAYER, BlendMode::Premultiplied),
    ] {
        let Some(source) = layers.get(name).and_then(|l| l.canvas(MAIN_CANVAS)) else {
            log::debug!("Composite: layer '{}' not present", name);
            continue;
        };
        if blend == BlendMode::Premultiplied {
            let premultiplied = premultiply(source);
            target.draw_canvas(&premultiplied, 0, 0, None, blend);
        } else {
            target.draw_canvas(source, 0, 0, None, blend);
        }
    }

    let final_layer = layers.require_mut(FINAL_LAYER)?;
    final_layer.put_canvas(MAIN_CANVAS, target);
    let post = final_layer.shader_stack().to_vec();
    run_shader_pipeline(final_layer, MAIN_CANVAS, &post, shaders)?;
    Ok(())
}

fn premultiply(canvas: &Canvas) -> Canvas {
    let mut out = Canvas::new(canvas.width(), canvas.height());
    for (i, color) in canvas.pixels().iter().enumerate() {
        let x = (i % canvas.width() as usize) as u32;
        let y = (i / canvas.width() as usize) as u32;
        out.set_pixel(x, y, color.premultiplied());
    }
    out
}

/// Draw `final.main` onto `backbuffer`, letterboxed with black bars
pub fn present(layers: &LayerRegistry, backbuffer: &mut Canvas) -> Result<Letterbox, RenderError> {
    let source = layers
        .get(FINAL_LAYER)
        .ok_or_else(|| RenderError::MissingLayer(FINAL_LAYER.to_string()))?
        .canvas(MAIN_CANVAS)
        .ok_or_else(|| RenderError::MissingCanvas {
            layer: FINAL_LAYER.to_string(),
            canvas: MAIN_CANVAS.to_string(),
        })?;
    let (vw, vh) = (source.width() as f32, source.height() as f32);
    let letterbox = Letterbox::compute(vw, vh, backbuffer.width() as f32, backbuffer.height() as f32);
    backbuffer.clear(Color::BLACK);
    backbuffer.draw_canvas_scaled(source, &letterbox.dest_rect(vw, vh), BlendMode::Alpha);
    Ok(letterbox)
}
