//! Layered deferred-draw pipeline
//!
//! Frame flow:
//! 1. `LayerRegistry::begin` empties every command queue
//! 2. Systems queue commands on layers
//! 3. Each layer flushes into its `main` canvas and runs its shader stack
//! 4. `composite` merges background, sprites and UI into `final`
//! 5. `present` letterboxes `final` onto the backbuffer

pub mod camera;
pub mod canvas;
pub mod commands;
pub mod compositor;
pub mod layer;
pub mod pipeline;
pub mod shader;

pub use camera::Camera2D;
pub use canvas::{BlendMode, Canvas};
pub use commands::{DrawCommand, DrawPayload, Space};
pub use compositor::{
    composite, present, Letterbox, BACKGROUND_LAYER, FINAL_LAYER, SPRITES_LAYER, UI_LAYER,
};
pub use layer::{DrawContext, Layer, LayerRegistry, DOUBLE_BUFFER_CANVAS, MAIN_CANVAS};
pub use pipeline::{draw_layer_commands_to_specific_canvas, run_shader_pipeline};
pub use shader::{PixelShader, ShaderEffect, ShaderError, ShaderRegistry, SoftwareShader};

use thiserror::Error;

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    /// A named layer does not exist
    #[error("Layer not found: {0}")]
    MissingLayer(String),

    /// A layer lacks the named canvas
    #[error("Layer '{layer}' has no canvas '{canvas}'")]
    MissingCanvas {
        /// Layer name
        layer: String,
        /// Canvas name
        canvas: String,
    },

    /// Shader loading failed
    #[error("Shader error: {0}")]
    Shader(#[from] ShaderError),

    /// Writing an image failed
    #[error("Export failed: {0}")]
    Export(String),
}
