//! Deferred draw commands queued on layers

use crate::ecs::Entity;
use crate::foundation::math::{Color, Rect};

use super::canvas::BlendMode;

/// Coordinate space of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Space {
    /// Canvas pixels; the camera is ignored
    #[default]
    Screen,
    /// World units; the layer camera applies
    World,
}

/// What a command draws
#[derive(Debug, Clone, PartialEq)]
pub enum DrawPayload {
    /// Fill the whole target
    ClearBackground {
        /// Fill color
        color: Color,
    },
    /// Filled rectangle
    DrawRectangle {
        /// Area to fill
        rect: Rect,
        /// Fill color
        color: Color,
    },
    /// Current animation frame of an entity, placed by its transform
    DrawTransformEntityAnimation {
        /// Entity with a transform and animation queue
        entity: Entity,
    },
    /// Another canvas of the same layer drawn through an optional shader
    CanvasOntoCanvasWithShader {
        /// Source canvas name
        source: String,
        /// Shader name; `None` draws unshaded
        shader: Option<String>,
        /// Top-left placement
        x: i32,
        /// Top-left placement
        y: i32,
        /// Combine mode
        blend: BlendMode,
    },
}

impl DrawPayload {
    /// Entity this payload draws on behalf of, if any
    pub fn entity(&self) -> Option<Entity> {
        match self {
            Self::DrawTransformEntityAnimation { entity } => Some(*entity),
            _ => None,
        }
    }
}

/// A queued command with its ordering data
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    /// What to draw
    pub payload: DrawPayload,
    /// Sort key; lower draws first
    pub z_index: i32,
    /// Coordinate space
    pub space: Space,
    /// Stable id, unique for the process
    pub unique_id: u64,
    /// Command this one sorts directly behind
    pub follow_anchor: Option<u64>,
    /// Entity the command belongs to
    pub owner: Option<Entity>,
    pub(crate) insertion: u64,
}
