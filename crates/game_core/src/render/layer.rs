//! Layers: named canvases plus a per-frame command queue
//!
//! Commands are sorted by `(z_index, insertion order)` at flush time.
//! A command with a follow anchor sorts as part of its anchor's group, so an
//! entity's draws stay contiguous even when their own z differs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::animation::AnimationQueueComponent;
use crate::ecs::components::Transform;
use crate::ecs::{Entity, World};
use crate::foundation::math::{Color, Rect};

use super::camera::Camera2D;
use super::canvas::{BlendMode, Canvas};
use super::commands::{DrawCommand, DrawPayload, Space};
use super::shader::ShaderRegistry;
use super::RenderError;

/// Canvas every layer draws into
pub const MAIN_CANVAS: &str = "main";

/// Ping-pong partner of [`MAIN_CANVAS`]
pub const DOUBLE_BUFFER_CANVAS: &str = "render_double_buffer";

static NEXT_COMMAND_ID: AtomicU64 = AtomicU64::new(1);

/// Borrowed state a flush may read
#[derive(Clone, Copy)]
pub struct DrawContext<'a> {
    /// Source of transforms and animation frames
    pub world: &'a World,
    /// Camera for world-space commands
    pub camera: Option<&'a Camera2D>,
    /// Shaders referenced by canvas-onto-canvas commands
    pub shaders: &'a ShaderRegistry,
}

/// A stack of canvases drawn as one unit
pub struct Layer {
    name: String,
    canvases: HashMap<String, Canvas>,
    commands: Vec<DrawCommand>,
    shader_stack: Vec<String>,
    next_insertion: u64,
    /// Fill used when a canvas is flushed
    pub background: Color,
    /// Composite order among layers
    pub z_index: i32,
    /// Ignore the camera even for world-space commands
    pub fixed: bool,
}

impl Layer {
    /// Layer with `main` and its double buffer at the given size
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        let mut canvases = HashMap::new();
        canvases.insert(MAIN_CANVAS.to_string(), Canvas::new(width, height));
        canvases.insert(DOUBLE_BUFFER_CANVAS.to_string(), Canvas::new(width, height));
        Self {
            name: name.into(),
            canvases,
            commands: Vec::new(),
            shader_stack: Vec::new(),
            next_insertion: 0,
            background: Color::BLANK,
            z_index: 0,
            fixed: false,
        }
    }

    /// Layer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add (or resize) a named canvas
    pub fn add_canvas(&mut self, name: impl Into<String>, width: u32, height: u32) {
        self.canvases.insert(name.into(), Canvas::new(width, height));
    }

    /// Remove a named canvas
    pub fn remove_canvas(&mut self, name: &str) -> Option<Canvas> {
        self.canvases.remove(name)
    }

    /// Borrow a canvas
    pub fn canvas(&self, name: &str) -> Option<&Canvas> {
        self.canvases.get(name)
    }

    /// Borrow a canvas mutably
    pub fn canvas_mut(&mut self, name: &str) -> Option<&mut Canvas> {
        self.canvases.get_mut(name)
    }

    pub(crate) fn take_canvas(&mut self, name: &str) -> Result<Canvas, RenderError> {
        self.canvases.remove(name).ok_or_else(|| RenderError::MissingCanvas {
            layer: self.name.clone(),
            canvas: name.to_string(),
        })
    }

    pub(crate) fn put_canvas(&mut self, name: &str, canvas: Canvas) {
        self.canvases.insert(name.to_string(), canvas);
    }

    /// Shaders applied to `main` after its commands are flushed
    pub fn shader_stack(&self) -> &[String] {
        &self.shader_stack
    }

    /// Append a shader to the stack
    pub fn push_shader(&mut self, name: impl Into<String>) {
        self.shader_stack.push(name.into());
    }

    /// Empty the shader stack
    pub fn clear_shaders(&mut self) {
        self.shader_stack.clear();
    }

    /// Queue a command and return its id
    pub fn queue(&mut self, payload: DrawPayload, z_index: i32, space: Space) -> u64 {
        let owner = payload.entity();
        self.push_command(payload, z_index, space, owner)
    }

    /// Queue a command drawn on behalf of `owner`
    pub fn queue_for_entity(
        &mut self,
        owner: Entity,
        payload: DrawPayload,
        z_index: i32,
        space: Space,
    ) -> u64 {
        self.push_command(payload, z_index, space, Some(owner))
    }

    fn push_command(
        &mut self,
        payload: DrawPayload,
        z_index: i32,
        space: Space,
        owner: Option<Entity>,
    ) -> u64 {
        let unique_id = NEXT_COMMAND_ID.fetch_add(1, Ordering::Relaxed);
        self.commands.push(DrawCommand {
            payload,
            z_index,
            space,
            unique_id,
            follow_anchor: None,
            owner,
            insertion: self.next_insertion,
        });
        self.next_insertion += 1;
        unique_id
    }

    /// Link the last command queued for `entity` to the first one queued for it.
    ///
    /// Returns false when the entity has fewer than two commands this frame.
    pub fn set_follow_anchor_for_entity(&mut self, entity: Entity) -> bool {
        let mut owned = self
            .commands
            .iter()
            .enumerate()
            .filter(|(_, c)| c.owner == Some(entity))
            .map(|(i, _)| i);
        let Some(first) = owned.next() else {
            return false;
        };
        let Some(last) = owned.last() else {
            return false;
        };
        let anchor = self.commands[first].unique_id;
        self.commands[last].follow_anchor = Some(anchor);
        true
    }

    /// Commands queued this frame, in insertion order
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Drop queued commands
    pub fn clear_commands(&mut self) {
        self.commands.clear();
        self.next_insertion = 0;
    }

    /// Queued commands in draw order
    pub fn sorted_commands(&self) -> Vec<&DrawCommand> {
        let by_id: HashMap<u64, usize> = self
            .commands
            .iter()
            .enumerate()
            .map(|(i, c)| (c.unique_id, i))
            .collect();

        let root_of = |mut i: usize| {
            for _ in 0..self.commands.len() {
                match self.commands[i].follow_anchor.and_then(|a| by_id.get(&a)) {
                    Some(&anchor) if anchor != i => i = anchor,
                    _ => break,
                }
            }
            &self.commands[i]
        };

        let mut sorted: Vec<(i32, u64, u64, &DrawCommand)> = self
            .commands
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let root = root_of(i);
                (root.z_index, root.insertion, c.insertion, c)
            })
            .collect();
        sorted.sort_by_key(|&(z, group, own, _)| (z, group, own));
        sorted.into_iter().map(|(_, _, _, c)| c).collect()
    }

    /// Clear `canvas_name` to the background and flush every queued command into it
    pub fn draw_commands_to_canvas(
        &mut self,
        canvas_name: &str,
        ctx: &DrawContext<'_>,
    ) -> Result<(), RenderError> {
        let mut target = self.take_canvas(canvas_name)?;
        target.clear(self.background);

        for command in self.sorted_commands() {
            let camera = match (command.space, self.fixed) {
                (Space::World, false) => ctx.camera,
                _ => None,
            };
            self.execute(command, &mut target, camera, ctx);
        }

        self.put_canvas(canvas_name, target);
        Ok(())
    }

    fn execute(
        &self,
        command: &DrawCommand,
        target: &mut Canvas,
        camera: Option<&Camera2D>,
        ctx: &DrawContext<'_>,
    ) {
        let place = |r: Rect| camera.map_or(r, |c| c.world_rect_to_screen(&r));
        match &command.payload {
            DrawPayload::ClearBackground { color } => target.clear(*color),
            DrawPayload::DrawRectangle { rect, color } => {
                target.fill_rect(&place(*rect), *color, BlendMode::Alpha);
            }
            DrawPayload::DrawTransformEntityAnimation { entity } => {
                let world = ctx.world;
                let (Some(transform), Some(anim)) = (
                    world.get::<Transform>(*entity),
                    world.get::<AnimationQueueComponent>(*entity),
                ) else {
                    log::debug!("Skipping animation draw for {:?}: missing components", entity);
                    return;
                };
                if anim.no_draw {
                    return;
                }
                if let Some(frame) = anim.current_animation().current_frame() {
                    target.fill_rect(&place(transform.rect()), frame.tint, BlendMode::Alpha);
                }
            }
            DrawPayload::CanvasOntoCanvasWithShader {
                source,
                shader,
                x,
                y,
                blend,
            } => {
                let Some(src) = self.canvases.get(source) else {
                    log::debug!("Layer '{}' has no canvas '{}' to draw", self.name, source);
                    return;
                };
                let program = shader.as_deref().and_then(|name| {
                    let found = ctx.shaders.get(name);
                    if found.is_none() {
                        log::warn!("Shader '{}' not loaded, drawing '{}' unshaded", name, source);
                    }
                    found
                });
                target.draw_canvas(src, *x, *y, program.as_deref(), *blend);
            }
        }
    }
}

/// Every live layer, ordered by z for compositing
#[derive(Default)]
pub struct LayerRegistry {
    layers: Vec<Layer>,
}

impl LayerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layer, or return the existing one with that name
    pub fn create_layer(&mut self, name: &str, width: u32, height: u32, z_index: i32) -> &mut Layer {
        let index = match self.layers.iter().position(|l| l.name == name) {
            Some(i) => i,
            None => {
                let mut layer = Layer::new(name, width, height);
                layer.z_index = z_index;
                self.layers.push(layer);
                self.sort();
                self.layers.iter().position(|l| l.name == name).unwrap_or(0)
            }
        };
        &mut self.layers[index]
    }

    fn sort(&mut self) {
        self.layers.sort_by_key(|l| l.z_index);
    }

    /// Change a layer's z and re-sort
    pub fn set_z_index(&mut self, name: &str, z_index: i32) -> bool {
        let Some(layer) = self.get_mut(name) else {
            return false;
        };
        layer.z_index = z_index;
        self.sort();
        true
    }

    /// Look up a layer
    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Look up a layer mutably
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.name == name)
    }

    /// Look up a layer or fail with [`RenderError::MissingLayer`]
    pub fn require_mut(&mut self, name: &str) -> Result<&mut Layer, RenderError> {
        self.get_mut(name)
            .ok_or_else(|| RenderError::MissingLayer(name.to_string()))
    }

    /// Remove a layer
    pub fn remove(&mut self, name: &str) -> Option<Layer> {
        let index = self.layers.iter().position(|l| l.name == name)?;
        Some(self.layers.remove(index))
    }

    /// Drop every layer and its canvases
    pub fn unload_all(&mut self) {
        self.layers.clear();
    }

    /// Start a frame: every command queue is emptied
    pub fn begin(&mut self) {
        for layer in &mut self.layers {
            layer.clear_commands();
        }
    }

    /// Layers in ascending z
    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True when no layer exists
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}
