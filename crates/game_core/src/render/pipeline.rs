//! Per-layer shader stacks run by ping-pong between two canvases
//!
//! Each stage clears the destination, draws the source into it through the
//! stage's shader, then the roles swap. If an odd number of stages left the
//! result in the partner canvas, the home canvas is cleared and the result
//! is drawn back. Blits are alpha-blended, so skipping that clear lets the
//! pre-pipeline pixels show through wherever the last stage wrote
//! transparency.

use super::canvas::{BlendMode, Canvas};
use super::layer::{DrawContext, Layer, DOUBLE_BUFFER_CANVAS, MAIN_CANVAS};
use super::shader::{PixelShader, ShaderRegistry};
use super::RenderError;

/// Name of the ping-pong partner for `canvas`
pub fn partner_canvas_name(canvas: &str) -> String {
    if canvas == MAIN_CANVAS {
        DOUBLE_BUFFER_CANVAS.to_string()
    } else {
        format!("{}_double", canvas)
    }
}

/// Run `stages` over `canvas` in order, leaving the result in `canvas`.
///
/// Unknown shader names are skipped with a warning. Returns the number of
/// stages actually run.
pub fn run_shader_pipeline(
    layer: &mut Layer,
    canvas: &str,
    stages: &[String],
    shaders: &ShaderRegistry,
) -> Result<usize, RenderError> {
    let programs: Vec<_> = stages
        .iter()
        .filter_map(|name| {
            let found = shaders.get(name);
            if found.is_none() {
                log::warn!("Layer '{}': shader '{}' not loaded, skipping stage", layer.name(), name);
            }
            found
        })
        .collect();
    if programs.is_empty() {
        return Ok(0);
    }

    let partner_name = partner_canvas_name(canvas);
    let home = layer.take_canvas(canvas)?;
    let partner = match layer.take_canvas(&partner_name) {
        Ok(c) if c.width() == home.width() && c.height() == home.height() => c,
        _ => Canvas::new(home.width(), home.height()),
    };

    // buffers[0] is home, buffers[1] the partner
    let mut buffers = [home, partner];
    let mut src = 0;
    for program in &programs {
        let dst = 1 - src;
        let [a, b] = &mut buffers;
        let (from, to) = if src == 0 { (&*a, b) } else { (&*b, a) };
        blit(from, to, Some(&**program));
        src = dst;
    }

    if src != 0 {
        let [home, result] = &mut buffers;
        blit(result, home, None);
    }

    let [home, partner] = buffers;
    layer.put_canvas(canvas, home);
    layer.put_canvas(&partner_name, partner);
    Ok(programs.len())
}

/// Clear `to`, then draw `from` over it
fn blit(from: &Canvas, to: &mut Canvas, shader: Option<&dyn PixelShader>) {
    to.clear(crate::foundation::math::Color::BLANK);
    to.draw_canvas(from, 0, 0, shader, BlendMode::Alpha);
}

/// Flush a layer's commands into `canvas`, then run the layer's shader stack on it
pub fn draw_layer_commands_to_specific_canvas(
    layer: &mut Layer,
    canvas: &str,
    ctx: &DrawContext<'_>,
) -> Result<usize, RenderError> {
    layer.draw_commands_to_canvas(canvas, ctx)?;
    let stages = layer.shader_stack().to_vec();
    run_shader_pipeline(layer, canvas, &stages, ctx.shaders)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Color;
    use crate::render::shader::{ShaderEffect, SoftwareShader};
    use std::rc::Rc;

    /// Writes blue at the origin and transparency everywhere else
    struct BlueDot;

    impl PixelShader for BlueDot {
        fn name(&self) -> &str {
            "blue_dot"
        }

        fn shade(&self, _color: Color, x: u32, y: u32) -> Color {
            if x == 0 && y == 0 {
                Color::BLUE
            } else {
                Color::BLANK
            }
        }
    }

    fn layer_with_red() -> Layer {
        let mut layer = Layer::new("sprites", 2, 2);
        let main = layer.canvas_mut(MAIN_CANVAS).unwrap();
        main.clear(Color::RED);
        layer
    }

    fn registry() -> ShaderRegistry {
        let mut shaders = ShaderRegistry::new();
        shaders.register(Rc::new(BlueDot));
        shaders.register(Rc::new(SoftwareShader::new("invert", ShaderEffect::Invert)));
        shaders
    }

    #[test]
    fn test_single_stage_result_lands_in_main() {
        let mut layer = layer_with_red();
        let ran = run_shader_pipeline(&mut layer, MAIN_CANVAS, &["blue_dot".to_string()], &registry()).unwrap();
        assert_eq!(ran, 1);
        let main = layer.canvas(MAIN_CANVAS).unwrap();
        assert_eq!(main.pixel(0, 0), Some(Color::BLUE));
    }

    #[test]
    fn test_empty_pipeline_leaves_main_untouched() {
        let mut layer = layer_with_red();
        let ran = run_shader_pipeline(&mut layer, MAIN_CANVAS, &[], &registry()).unwrap();
        assert_eq!(ran, 0);
        assert_eq!(layer.canvas(MAIN_CANVAS).unwrap().pixel(0, 0), Some(Color::RED));
    }

    /// Without clearing main before the copy-back, the red pixels the stage
    /// made transparent would survive the alpha blit ("ghosting").
    #[test]
    fn test_copy_back_does_not_ghost() {
        let mut layer = layer_with_red();
        run_shader_pipeline(&mut layer, MAIN_CANVAS, &["blue_dot".to_string()], &registry()).unwrap();
        let main = layer.canvas(MAIN_CANVAS).unwrap();
        assert_eq!(main.pixel(1, 0), Some(Color::BLANK));
        assert_eq!(main.pixel(1, 1), Some(Color::BLANK));
    }

    #[test]
    fn test_even_stage_count_ends_in_main() {
        let mut layer = layer_with_red();
        let stages = vec!["invert".to_string(), "invert".to_string()];
        assert_eq!(run_shader_pipeline(&mut layer, MAIN_CANVAS, &stages, &registry()).unwrap(), 2);
        assert_eq!(layer.canvas(MAIN_CANVAS).unwrap().pixel(1, 1), Some(Color::RED));

        let stages = vec!["invert".to_string(), "missing".to_string()];
        assert_eq!(run_shader_pipeline(&mut layer, MAIN_CANVAS, &stages, &registry()).unwrap(), 1);
        assert_eq!(
            layer.canvas(MAIN_CANVAS).unwrap().pixel(1, 1),
            Some(Color::rgba(0, 255, 255, 255))
        );
    }

    #[test]
    fn test_draw_then_shader_stack() {
        let world = crate::ecs::World::new();
        let shaders = registry();
        let ctx = DrawContext {
            world: &world,
            camera: None,
            shaders: &shaders,
        };
        let mut layer = Layer::new("ui_layer", 2, 2);
        layer.background = Color::BLACK;
        layer.push_shader("invert");
        draw_layer_commands_to_specific_canvas(&mut layer, MAIN_CANVAS, &ctx).unwrap();
        assert_eq!(layer.canvas(MAIN_CANVAS).unwrap().pixel(0, 0), Some(Color::WHITE));
    }
}
