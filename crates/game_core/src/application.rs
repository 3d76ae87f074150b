//! Game trait and lifecycle hooks

use crate::engine::{Engine, EngineError};
use crate::input::RawInput;
use thiserror::Error;

/// Game lifecycle trait
///
/// Implement this trait to put game content on top of the runtime. The
/// engine owns every subsystem; the game only reacts to the hooks below.
pub trait Application {
    /// Build the initial game state
    ///
    /// Called once at boot and again as the last step of
    /// [`Engine::reinitialize_game`], after every subsystem has been torn
    /// down and the script entry module re-run. Layers, entities and bus
    /// listeners created here must not assume anything survived.
    fn initialize(&mut self, engine: &mut Engine) -> Result<(), AppError>;

    /// Called once per fixed step, after commands and collisions are applied
    fn fixed_update(&mut self, _engine: &mut Engine, _dt: f32) -> Result<(), AppError> {
        Ok(())
    }

    /// Called once per frame with the scaled frame delta
    ///
    /// # Arguments
    /// * `engine` - Mutable reference to the engine
    /// * `delta_time` - Raw frame time multiplied by the timescale
    fn update(&mut self, engine: &mut Engine, delta_time: f32) -> Result<(), AppError>;

    /// Queue extra draw commands before the layers are flushed
    fn render(&mut self, _engine: &mut Engine) -> Result<(), AppError> {
        Ok(())
    }

    /// Handle platform events
    fn handle_event(&mut self, engine: &mut Engine, event: AppEvent) -> Result<(), AppError> {
        engine.handle_event(event);
        Ok(())
    }

    /// Called when the engine stops running
    fn cleanup(&mut self, engine: &mut Engine);
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),

    /// Game logic error
    #[error("Game logic error: {0}")]
    GameLogic(String),
}

/// Platform events delivered to the game
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Window was resized
    WindowResized {
        /// New window width
        width: u32,
        /// New window height
        height: u32,
    },

    /// Window close requested
    WindowCloseRequested,

    /// Raw input in window coordinates
    Input(RawInput),

    /// Developer asked for a full game re-init
    ReloadRequested,
}
