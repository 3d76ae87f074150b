//! Events published by the runtime core
//!
//! All payloads are plain values so they can be cloned into deferred
//! dispatches and converted into Lua tables.

use serde::{Deserialize, Serialize};

use crate::ecs::Entity;
use crate::foundation::math::Vec2;

/// Top-level game states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    /// Title / menu screen
    MainMenu,
    /// Boot-time asset loading
    LoadingScreen,
    /// Gameplay
    MainGame,
    /// End-of-run screen
    GameOver,
}

impl GameState {
    /// Script-facing name
    pub const fn name(self) -> &'static str {
        match self {
            Self::MainMenu => "MAIN_MENU",
            Self::LoadingScreen => "LOADING_SCREEN",
            Self::MainGame => "MAIN_GAME",
            Self::GameOver => "GAME_OVER",
        }
    }

    /// Parse a script-facing name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "MAIN_MENU" => Some(Self::MainMenu),
            "LOADING_SCREEN" => Some(Self::LoadingScreen),
            "MAIN_GAME" => Some(Self::MainGame),
            "GAME_OVER" => Some(Self::GameOver),
            _ => None,
        }
    }
}

/// Input device classes tracked for prompts and navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InputDevice {
    /// Nothing seen yet
    #[default]
    None,
    /// Keyboard
    Keyboard,
    /// Mouse
    Mouse,
    /// Gamepad
    Gamepad,
}

/// An entity was created by game code
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCreated {
    /// New entity
    pub entity: Entity,
    /// Free-form type label
    pub kind: String,
}

/// An entity was destroyed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityDestroyed {
    /// Destroyed entity (now stale)
    pub entity: Entity,
}

/// Mouse button went down
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseClicked {
    /// Cursor position in virtual coordinates
    pub position: Vec2,
    /// Button index
    pub button: i32,
    /// Topmost UI entity under the cursor, if any
    pub target: Option<Entity>,
}

/// Key went down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPressed {
    /// Platform key code
    pub key_code: i32,
    /// Shift held
    pub shift: bool,
    /// Control held
    pub ctrl: bool,
    /// Alt held
    pub alt: bool,
}

/// Gamepad button went down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamepadButtonPressed {
    /// Pad index
    pub gamepad_id: i32,
    /// Button index
    pub button: i32,
}

/// Gamepad button went up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GamepadButtonReleased {
    /// Pad index
    pub gamepad_id: i32,
    /// Button index
    pub button: i32,
}

/// The active input device changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputDeviceChanged {
    /// Device before the change
    pub previous: InputDevice,
    /// Device after the change
    pub current: InputDevice,
    /// Gamepad button that triggered the switch, if any
    pub gamepad_button: Option<i32>,
}

/// The game state machine moved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameStateChanged {
    /// Previous state
    pub old: GameState,
    /// New state
    pub new: GameState,
}

/// An asset finished loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLoaded {
    /// Asset identifier
    pub asset_id: String,
    /// Asset kind label
    pub asset_type: String,
}

/// An asset failed to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLoadFailed {
    /// Asset identifier
    pub asset_id: String,
    /// Error text
    pub error: String,
}

/// A UI element gained focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UIElementFocused {
    /// Focused element
    pub element: Entity,
}

/// A UI button was activated by click or controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UIButtonActivated {
    /// Activated element
    pub element: Entity,
    /// Button index that activated it
    pub button: i32,
}

/// Global UI scale changed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UIScaleChanged {
    /// New scale
    pub scale: f32,
}

/// A loading stage began
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingStageStarted {
    /// Stage identifier
    pub stage_id: String,
}

/// A loading stage ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingStageCompleted {
    /// Stage identifier
    pub stage_id: String,
    /// Whether the stage succeeded
    pub success: bool,
    /// Error text on failure
    pub error: Option<String>,
}

/// Two colliders began overlapping; `a < b` by entity id
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionStarted {
    /// Lower-id entity
    pub a: Entity,
    /// Higher-id entity
    pub b: Entity,
    /// Center of the overlap region
    pub point: Vec2,
}

/// Two colliders stopped overlapping; `a < b` by entity id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEnded {
    /// Lower-id entity
    pub a: Entity,
    /// Higher-id entity
    pub b: Entity,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_state_names_round_trip() {
        for state in [
            GameState::MainMenu,
            GameState::LoadingScreen,
            GameState::MainGame,
            GameState::GameOver,
        ] {
            assert_eq!(GameState::from_name(state.name()), Some(state));
        }
        assert_eq!(GameState::from_name("PAUSED"), None);
    }
}
