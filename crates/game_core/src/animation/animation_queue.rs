//! Frame-based sprite animation queues
//!
//! Every entity with an [`AnimationQueueComponent`] either loops its default
//! animation or plays through a queue of one-shot animations. Completion
//! callbacks run after the whole pass so they may freely mutate the world.

use std::fmt;
use std::rc::Rc;

use crate::ecs::components::ActiveStates;
use crate::ecs::{Component, Entity, World};
use crate::foundation::math::Color;

/// Callback fired when an entity's animation queue is exhausted
pub type QueueCompleteCallback = Rc<dyn Fn(&mut World, Entity)>;

/// One frame of an animation
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationFrame {
    /// Sprite identifier in the atlas
    pub sprite: String,
    /// Tint applied when drawing
    pub tint: Color,
    /// Seconds the frame stays up
    pub duration: f32,
}

impl AnimationFrame {
    /// Untinted frame
    pub fn new(sprite: impl Into<String>, duration: f32) -> Self {
        Self {
            sprite: sprite.into(),
            tint: Color::WHITE,
            duration,
        }
    }

    /// Builder: set the tint
    pub fn with_tint(mut self, tint: Color) -> Self {
        self.tint = tint;
        self
    }
}

/// An ordered list of frames plus playback cursor
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimationObject {
    /// Identifier used by scripts
    pub id: String,
    /// Frames in play order
    pub frames: Vec<AnimationFrame>,
    /// Index of the frame on screen
    pub current_anim_index: usize,
    /// Time spent on the current frame
    pub current_elapsed_time: f32,
    /// Mirror on X when drawn
    pub flipped_horizontally: bool,
    /// Mirror on Y when drawn
    pub flipped_vertically: bool,
}

impl AnimationObject {
    /// Animation starting at its first frame
    pub fn new(id: impl Into<String>, frames: Vec<AnimationFrame>) -> Self {
        Self {
            id: id.into(),
            frames,
            ..Self::default()
        }
    }

    /// Frame currently on screen, if the animation has any frames
    pub fn current_frame(&self) -> Option<&AnimationFrame> {
        self.frames.get(self.current_anim_index)
    }

    fn rewind(&mut self) {
        self.current_anim_index = 0;
        self.current_elapsed_time = 0.0;
    }

    fn clamp_cursor(&mut self) {
        if self.current_anim_index >= self.frames.len() {
            self.current_anim_index = 0;
        }
    }
}

/// Animation playback state for one entity
#[derive(Default)]
pub struct AnimationQueueComponent {
    /// Skip all playback when false
    pub enabled: bool,
    /// Skip drawing while still advancing
    pub no_draw: bool,
    /// Looped whenever the queue is empty
    pub default_animation: AnimationObject,
    /// One-shot animations played in order
    pub animation_queue: Vec<AnimationObject>,
    /// Queue slot being played
    pub current_animation_index: usize,
    on_queue_complete: Option<QueueCompleteCallback>,
}

impl Component for AnimationQueueComponent {}

impl fmt::Debug for AnimationQueueComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationQueueComponent")
            .field("enabled", &self.enabled)
            .field("default_animation", &self.default_animation.id)
            .field("queued", &self.animation_queue.len())
            .field("current_animation_index", &self.current_animation_index)
            .field("callback_armed", &self.on_queue_complete.is_some())
            .finish()
    }
}

impl AnimationQueueComponent {
    /// Component looping `default_animation`
    pub fn new(default_animation: AnimationObject) -> Self {
        Self {
            enabled: true,
            default_animation,
            ..Self::default()
        }
    }

    /// Append a one-shot animation, restarting it from its first frame
    pub fn queue_animation(&mut self, mut animation: AnimationObject) {
        animation.rewind();
        self.animation_queue.push(animation);
    }

    /// Drop queued animations and fall back to the default loop
    pub fn clear_queue(&mut self) {
        self.animation_queue.clear();
        self.current_animation_index = 0;
    }

    /// Replace the looped animation
    pub fn set_default(&mut self, animation: AnimationObject) {
        self.default_animation = animation;
        self.default_animation.rewind();
    }

    /// Arm (or with `None`, disarm) the completion callback
    pub fn set_queue_complete_callback(&mut self, callback: Option<QueueCompleteCallback>) {
        self.on_queue_complete = callback;
    }

    /// Whether a completion callback is armed
    pub fn has_queue_complete_callback(&self) -> bool {
        self.on_queue_complete.is_some()
    }

    /// Animation currently on screen
    pub fn current_animation(&self) -> &AnimationObject {
        self.animation_queue
            .get(self.current_animation_index)
            .unwrap_or(&self.default_animation)
    }

    /// Advance by `dt`; returns the callback to fire, if any
    fn advance(&mut self, dt: f32) -> Option<QueueCompleteCallback> {
        if self.animation_queue.is_empty() {
            if let Some(callback) = &self.on_queue_complete {
                return Some(Rc::clone(callback));
            }
            let anim = &mut self.default_animation;
            anim.clamp_cursor();
            let Some(duration) = anim.frames.get(anim.current_anim_index).map(|f| f.duration) else {
                return None;
            };
            anim.current_elapsed_time += dt;
            if anim.current_elapsed_time > duration {
                anim.current_anim_index = (anim.current_anim_index + 1) % anim.frames.len();
                anim.current_elapsed_time = 0.0;
            }
            return None;
        }

        if self.current_animation_index >= self.animation_queue.len() {
            self.current_animation_index = 0;
        }
        let queue_len = self.animation_queue.len();
        let anim = &mut self.animation_queue[self.current_animation_index];
        anim.clamp_cursor();
        anim.current_elapsed_time += dt;

        let elapsed = anim.current_elapsed_time;
        let frame_elapsed = anim
            .frames
            .get(anim.current_anim_index)
            .map_or(true, |f| elapsed > f.duration);
        if !frame_elapsed {
            return None;
        }

        if anim.current_anim_index + 1 < anim.frames.len() {
            anim.current_anim_index += 1;
            anim.current_elapsed_time = 0.0;
            return None;
        }

        if self.current_animation_index + 1 < queue_len {
            self.current_animation_index += 1;
            self.animation_queue[self.current_animation_index].rewind();
            None
        } else {
            self.clear_queue();
            self.on_queue_complete.clone()
        }
    }
}

/// Advance every enabled animation queue on an active entity.
///
/// While a callback stays armed it fires on every pass that finds the queue
/// empty; callers disarm it from inside the callback when they want one shot.
pub fn update_animations(world: &mut World, states: &ActiveStates, dt: f32) {
    let entities: Vec<Entity> = world
        .entities_with::<AnimationQueueComponent>()
        .into_iter()
        .filter(|e| states.is_entity_active(world, *e))
        .collect();

    let mut fired = Vec::new();
    for entity in entities {
        let Some(queue) = world.get_mut::<AnimationQueueComponent>(entity) else {
            continue;
        };
        if !queue.enabled {
            continue;
        }
        if let Some(callback) = queue.advance(dt) {
            fired.push((entity, callback));
        }
    }

    for (entity, callback) in fired {
        callback(world, entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::components::StateTag;
    use std::cell::Cell;

    fn anim(id: &str, frames: usize) -> AnimationObject {
        AnimationObject::new(
            id,
            (0..frames)
                .map(|i| AnimationFrame::new(format!("{}_{}", id, i), 0.1))
                .collect(),
        )
    }

    fn spawn(world: &mut World, component: AnimationQueueComponent) -> Entity {
        let e = world.create();
        world.emplace(e, StateTag::default());
        world.emplace(e, component);
        e
    }

    #[test]
    fn test_default_animation_loops() {
        let mut world = World::new();
        let states = ActiveStates::default();
        let e = spawn(&mut world, AnimationQueueComponent::new(anim("idle", 3)));

        let mut seen = Vec::new();
        for _ in 0..8 {
            update_animations(&mut world, &states, 0.15);
            let q = world.get::<AnimationQueueComponent>(e).unwrap();
            seen.push(q.default_animation.current_anim_index);
        }
        assert_eq!(seen, vec![1, 2, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_queue_plays_then_fires_callback() {
        let mut world = World::new();
        let states = ActiveStates::default();
        let mut component = AnimationQueueComponent::new(anim("idle", 1));
        component.queue_animation(anim("attack", 2));
        component.queue_animation(anim("recover", 1));

        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        component.set_queue_complete_callback(Some(Rc::new(move |world: &mut World, e: Entity| {
            counter.set(counter.get() + 1);
            if let Some(q) = world.get_mut::<AnimationQueueComponent>(e) {
                q.set_queue_complete_callback(None);
            }
        })));
        let e = spawn(&mut world, component);

        // attack frame 0 -> frame 1 -> recover -> drained
        update_animations(&mut world, &states, 0.15);
        assert_eq!(world.get::<AnimationQueueComponent>(e).unwrap().current_animation().id, "attack");
        update_animations(&mut world, &states, 0.15);
        let q = world.get::<AnimationQueueComponent>(e).unwrap();
        assert_eq!(q.current_animation().id, "recover");
        assert_eq!(fired.get(), 0);

        update_animations(&mut world, &states, 0.15);
        let q = world.get::<AnimationQueueComponent>(e).unwrap();
        assert!(q.animation_queue.is_empty());
        assert_eq!(q.current_animation().id, "idle");
        assert_eq!(fired.get(), 1);

        update_animations(&mut world, &states, 0.15);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn test_armed_callback_fires_on_empty_queue() {
        let mut world = World::new();
        let states = ActiveStates::default();
        let fired = Rc::new(Cell::new(0));
        let counter = Rc::clone(&fired);
        let mut component = AnimationQueueComponent::new(anim("idle", 2));
        component.set_queue_complete_callback(Some(Rc::new(move |_: &mut World, _: Entity| {
            counter.set(counter.get() + 1);
        })));
        let e = spawn(&mut world, component);

        update_animations(&mut world, &states, 0.15);
        update_animations(&mut world, &states, 0.15);
        assert_eq!(fired.get(), 2);
        // default loop is not advanced while the callback is armed
        let q = world.get::<AnimationQueueComponent>(e).unwrap();
        assert_eq!(q.default_animation.current_anim_index, 0);
    }

    #[test]
    fn test_out_of_range_indices_clamped() {
        let mut world = World::new();
        let states = ActiveStates::default();
        let mut component = AnimationQueueComponent::new(anim("idle", 2));
        component.default_animation.current_anim_index = 9;
        let e = spawn(&mut world, component);
        update_animations(&mut world, &states, 0.01);
        assert_eq!(
            world.get::<AnimationQueueComponent>(e).unwrap().default_animation.current_anim_index,
            0
        );
    }

    #[test]
    fn test_inactive_state_skipped() {
        let mut world = World::new();
        let mut states = ActiveStates::default();
        let e = spawn(&mut world, AnimationQueueComponent::new(anim("idle", 2)));
        states.clear();
        update_animations(&mut world, &states, 0.5);
        assert_eq!(
            world.get::<AnimationQueueComponent>(e).unwrap().default_animation.current_anim_index,
            0
        );
    }
}
