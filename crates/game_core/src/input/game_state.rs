//! Top-level game state machine

use thiserror::Error;

use crate::events::{EventBus, GameState, GameStateChanged};

/// Rejected transitions
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStateError {
    /// The pair is not in the transition table
    #[error("Invalid game state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// Current state
        from: GameState,
        /// Requested state
        to: GameState,
    },
}

/// Current state plus the pause flag that feeds the frame clock
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    current: GameState,
    paused: bool,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self::new(GameState::LoadingScreen)
    }
}

impl GameStateMachine {
    /// Start in `initial`, unpaused
    pub fn new(initial: GameState) -> Self {
        Self {
            current: initial,
            paused: false,
        }
    }

    /// Current state
    pub fn current(&self) -> GameState {
        self.current
    }

    /// Whether `from -> to` is allowed
    pub fn can_transition(from: GameState, to: GameState) -> bool {
        use GameState::*;
        matches!(
            (from, to),
            (_, LoadingScreen)
                | (LoadingScreen, MainMenu)
                | (MainMenu, MainGame)
                | (MainGame, GameOver)
                | (MainGame, MainMenu)
                | (GameOver, MainMenu)
                | (GameOver, MainGame)
        )
    }

    /// Move to `to` and publish [`GameStateChanged`].
    ///
    /// Returns `Ok(false)` when already in `to`.
    pub fn change_state(&mut self, to: GameState, bus: &EventBus) -> Result<bool, GameStateError> {
        if to == self.current {
            return Ok(false);
        }
        if !Self::can_transition(self.current, to) {
            log::warn!("Rejected game state transition {:?} -> {:?}", self.current, to);
            return Err(GameStateError::InvalidTransition { from: self.current, to });
        }
        let old = std::mem::replace(&mut self.current, to);
        log::info!("Game state: {} -> {}", old.name(), to.name());
        bus.publish(&GameStateChanged { old, new: to });
        Ok(true)
    }

    /// Stop simulation time
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume simulation time
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Whether simulation time is stopped
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_transition_table() {
        use GameState::*;
        assert!(GameStateMachine::can_transition(LoadingScreen, MainMenu));
        assert!(GameStateMachine::can_transition(GameOver, MainGame));
        assert!(GameStateMachine::can_transition(MainGame, LoadingScreen));
        assert!(!GameStateMachine::can_transition(LoadingScreen, MainGame));
        assert!(!GameStateMachine::can_transition(MainMenu, GameOver));
    }

    #[test]
    fn test_change_publishes_event() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe(move |e: &GameStateChanged| s.borrow_mut().push(*e));

        let mut machine = GameStateMachine::default();
        assert_eq!(machine.change_state(GameState::MainMenu, &bus), Ok(true));
        assert_eq!(machine.change_state(GameState::MainMenu, &bus), Ok(false));
        assert!(machine.change_state(GameState::GameOver, &bus).is_err());
        assert_eq!(machine.current(), GameState::MainMenu);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].old, GameState::LoadingScreen);
        assert_eq!(seen[0].new, GameState::MainMenu);
    }

    #[test]
    fn test_pause_flag() {
        let mut machine = GameStateMachine::new(GameState::MainGame);
        machine.pause();
        assert!(machine.is_paused());
        machine.resume();
        assert!(!machine.is_paused());
    }
}
