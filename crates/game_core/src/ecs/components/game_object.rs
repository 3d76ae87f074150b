//! GameObject component: interaction switches

use crate::ecs::Component;
use crate::foundation::math::Vec2;

/// Per-entity interaction state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameObjectState {
    /// Participates in the broadphase
    pub collision_enabled: bool,
    /// Can be dragged
    pub drag_enabled: bool,
    /// Receives hover
    pub hover_enabled: bool,
    /// Receives clicks
    pub click_enabled: bool,
    /// Set once a scroll pane has already pushed its offset into this entity
    pub scroll_pane_displacement: Option<Vec2>,
}

impl Default for GameObjectState {
    fn default() -> Self {
        Self {
            collision_enabled: true,
            drag_enabled: false,
            hover_enabled: false,
            click_enabled: false,
            scroll_pane_displacement: None,
        }
    }
}

/// GameObject component
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GameObject {
    /// Interaction switches
    pub state: GameObjectState,
}

impl Component for GameObject {}

impl GameObject {
    /// GameObject with collision turned off
    pub fn without_collision() -> Self {
        let mut go = Self::default();
        go.state.collision_enabled = false;
        go
    }
}
