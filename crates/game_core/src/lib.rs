//! # Game Core
//!
//! Runtime core for a scripted 2D game.
//!
//! ## Features
//!
//! - **Fixed-step loop**: accumulator clock with physics substeps and timescale
//! - **Layered draw pipeline**: deferred per-layer commands, ping-pong shader stacks, letterboxed present
//! - **Springs**: deterministic scalar springs and second-order smoothing
//! - **Broadphase**: per-frame world and UI quadtrees with category/mask filtering
//! - **Event bus**: typed synchronous pub/sub with deferred queueing
//! - **Lua boundary**: guarded calls, recorded bindings, hot reload, bus bridge
//! - **Diagnostics**: crash reports from a log ring buffer, telemetry events
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use game_core::prelude::*;
//!
//! struct MyGame;
//!
//! impl Application for MyGame {
//!     fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError> {
//!         engine.spawn("player", Transform::new(100.0, 100.0, 32.0, 32.0), false);
//!         Ok(())
//!     }
//!
//!     fn update(&mut self, _engine: &mut Engine, _delta_time: f32) -> Result<(), AppError> {
//!         Ok(())
//!     }
//!
//!     fn cleanup(&mut self, _engine: &mut Engine) {}
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = Engine::new(RuntimeConfig::default())?;
//!     let mut game = MyGame;
//!     engine.boot(&mut game)?;
//!     engine.run_frames(&mut game, 600, 1.0 / 60.0)?;
//!     engine.shutdown(&mut game);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod core;

pub mod animation;
pub mod audio;
pub mod config;
pub mod diagnostics;
pub mod ecs;
pub mod events;
pub mod foundation;
pub mod input;
pub mod physics;
pub mod render;
pub mod save;
pub mod scripting;
pub mod spatial;
pub mod timer;
pub mod ui;

mod application;
mod engine;

#[cfg(test)]
mod tests;

pub use application::{AppError, AppEvent, Application};
pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        animation::{Easing, SecondOrderDynamics, Spring},
        core::config::{Config, RuntimeConfig},
        diagnostics::{CrashReporter, Telemetry},
        ecs::components::{CollisionFilter, GameObject, StateTag, Transform},
        ecs::{Entity, World},
        events::{EventBus, GameState},
        foundation::math::{Color, Rect, Vec2},
        input::RawInput,
        physics::{CollisionLayers, PhysicsManager},
        render::{Layer, LayerRegistry, BACKGROUND_LAYER, FINAL_LAYER, SPRITES_LAYER, UI_LAYER},
        AppError, AppEvent, Application, Engine, EngineError,
    };
}
