//! Input ingestion
//!
//! Platform events arrive as [`RawInput`]. [`InputState`] folds them into a
//! per-frame snapshot (held, pressed this frame, released this frame) and
//! publishes the matching bus events. The snapshot's per-frame sets are
//! cleared by [`InputState::begin_frame`].

pub mod controller_nav;
pub mod game_state;

pub use controller_nav::{ControllerNavManager, NavDirection};
pub use game_state::{GameStateError, GameStateMachine};

use std::collections::HashSet;

use bitflags::bitflags;

use crate::ecs::Entity;
use crate::events::{
    EventBus, GamepadButtonPressed, GamepadButtonReleased, InputDevice, InputDeviceChanged,
    KeyPressed, MouseClicked,
};
use crate::foundation::math::Vec2;

bitflags! {
    /// Modifier keys held with a key press
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// Either shift key
        const SHIFT = 1 << 0;
        /// Either control key
        const CTRL = 1 << 1;
        /// Either alt key
        const ALT = 1 << 2;
    }
}

/// One platform input event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInput {
    /// Key went down
    KeyDown {
        /// Platform key code
        key: i32,
        /// Held modifiers
        modifiers: Modifiers,
    },
    /// Key went up
    KeyUp {
        /// Platform key code
        key: i32,
    },
    /// Mouse button went down at a virtual position
    MouseDown {
        /// Button index
        button: i32,
        /// Cursor position
        position: Vec2,
    },
    /// Mouse button went up
    MouseUp {
        /// Button index
        button: i32,
        /// Cursor position
        position: Vec2,
    },
    /// Cursor moved
    MouseMove {
        /// Cursor position
        position: Vec2,
    },
    /// Wheel scrolled
    Wheel {
        /// Scroll amount, positive away from the user
        delta: f32,
    },
    /// Gamepad button went down
    GamepadDown {
        /// Pad index
        gamepad: i32,
        /// Button index
        button: i32,
    },
    /// Gamepad button went up
    GamepadUp {
        /// Pad index
        gamepad: i32,
        /// Button index
        button: i32,
    },
}

/// Per-frame input snapshot
#[derive(Debug, Default)]
pub struct InputState {
    held_keys: HashSet<i32>,
    pressed_keys: HashSet<i32>,
    released_keys: HashSet<i32>,
    held_mouse: HashSet<i32>,
    pressed_mouse: HashSet<i32>,
    released_mouse: HashSet<i32>,
    held_pad: HashSet<(i32, i32)>,
    pressed_pad: HashSet<(i32, i32)>,
    released_pad: HashSet<(i32, i32)>,
    cursor: Vec2,
    wheel: f32,
    modifiers: Modifiers,
    last_device: InputDevice,
}

impl InputState {
    /// Nothing held, no device seen
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the pressed/released sets and the wheel accumulator
    pub fn begin_frame(&mut self) {
        self.pressed_keys.clear();
        self.released_keys.clear();
        self.pressed_mouse.clear();
        self.released_mouse.clear();
        self.pressed_pad.clear();
        self.released_pad.clear();
        self.wheel = 0.0;
    }

    /// Forget everything, including held buttons and the last device
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold one event into the snapshot and publish its bus event.
    ///
    /// `pick` resolves the UI entity under the cursor for `MouseClicked`.
    pub fn process(&mut self, event: &RawInput, bus: &EventBus, pick: &dyn Fn(Vec2) -> Option<Entity>) {
        match *event {
            RawInput::KeyDown { key, modifiers } => {
                self.switch_device(InputDevice::Keyboard, None, bus);
                self.modifiers = modifiers;
                if self.held_keys.insert(key) {
                    self.pressed_keys.insert(key);
                }
                bus.publish(&KeyPressed {
                    key_code: key,
                    shift: modifiers.contains(Modifiers::SHIFT),
                    ctrl: modifiers.contains(Modifiers::CTRL),
                    alt: modifiers.contains(Modifiers::ALT),
                });
            }
            RawInput::KeyUp { key } => {
                if self.held_keys.remove(&key) {
                    self.released_keys.insert(key);
                }
            }
            RawInput::MouseDown { button, position } => {
                self.switch_device(InputDevice::Mouse, None, bus);
                self.cursor = position;
                if self.held_mouse.insert(button) {
                    self.pressed_mouse.insert(button);
                }
                bus.publish(&MouseClicked {
                    position,
                    button,
                    target: pick(position),
                });
            }
            RawInput::MouseUp { button, position } => {
                self.cursor = position;
                if self.held_mouse.remove(&button) {
                    self.released_mouse.insert(button);
                }
            }
            RawInput::MouseMove { position } => {
                if position != self.cursor {
                    self.switch_device(InputDevice::Mouse, None, bus);
                }
                self.cursor = position;
            }
            RawInput::Wheel { delta } => {
                self.switch_device(InputDevice::Mouse, None, bus);
                self.wheel += delta;
            }
            RawInput::GamepadDown { gamepad, button } => {
                self.switch_device(InputDevice::Gamepad, Some(button), bus);
                if self.held_pad.insert((gamepad, button)) {
                    self.pressed_pad.insert((gamepad, button));
                }
                bus.publish(&GamepadButtonPressed {
                    gamepad_id: gamepad,
                    button,
                });
            }
            RawInput::GamepadUp { gamepad, button } => {
                if self.held_pad.remove(&(gamepad, button)) {
                    self.released_pad.insert((gamepad, button));
                }
                bus.publish(&GamepadButtonReleased {
                    gamepad_id: gamepad,
                    button,
                });
            }
        }
    }

    /// Key currently held
    pub fn is_key_down(&self, key: i32) -> bool {
        self.held_keys.contains(&key)
    }

    /// Key went down this frame
    pub fn was_key_pressed(&self, key: i32) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Key went up this frame
    pub fn was_key_released(&self, key: i32) -> bool {
        self.released_keys.contains(&key)
    }

    /// Mouse button currently held
    pub fn is_mouse_down(&self, button: i32) -> bool {
        self.held_mouse.contains(&button)
    }

    /// Mouse button went down this frame
    pub fn was_mouse_pressed(&self, button: i32) -> bool {
        self.pressed_mouse.contains(&button)
    }

    /// Mouse button went up this frame
    pub fn was_mouse_released(&self, button: i32) -> bool {
        self.released_mouse.contains(&button)
    }

    /// Gamepad button currently held
    pub fn is_gamepad_down(&self, gamepad: i32, button: i32) -> bool {
        self.held_pad.contains(&(gamepad, button))
    }

    /// Gamepad button went down this frame
    pub fn was_gamepad_pressed(&self, gamepad: i32, button: i32) -> bool {
        self.pressed_pad.contains(&(gamepad, button))
    }

    /// Last cursor position in virtual coordinates
    pub fn cursor(&self) -> Vec2 {
        self.cursor
    }

    /// Wheel movement this frame
    pub fn wheel(&self) -> f32 {
        self.wheel
    }

    /// Modifiers of the most recent key press
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Device that produced the most recent input
    pub fn last_device(&self) -> InputDevice {
        self.last_device
    }

    fn switch_device(&mut self, device: InputDevice, gamepad_button: Option<i32>, bus: &EventBus) {
        if self.last_device == device {
            return;
        }
        let previous = std::mem::replace(&mut self.last_device, device);
        log::debug!("Input device changed: {:?} -> {:?}", previous, device);
        bus.publish(&InputDeviceChanged {
            previous,
            current: device,
            gamepad_button,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn no_pick(_: Vec2) -> Option<Entity> {
        None
    }

    #[test]
    fn test_pressed_and_held_sets() {
        let bus = EventBus::new();
        let mut input = InputState::new();
        input.process(&RawInput::KeyDown { key: 32, modifiers: Modifiers::empty() }, &bus, &no_pick);
        assert!(input.is_key_down(32));
        assert!(input.was_key_pressed(32));

        input.begin_frame();
        assert!(input.is_key_down(32));
        assert!(!input.was_key_pressed(32));

        input.process(&RawInput::KeyUp { key: 32 }, &bus, &no_pick);
        assert!(!input.is_key_down(32));
        assert!(input.was_key_released(32));
    }

    #[test]
    fn test_key_event_carries_modifiers() {
        let bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        bus.subscribe(move |e: &KeyPressed| s.borrow_mut().push(*e));

        let mut input = InputState::new();
        input.process(
            &RawInput::KeyDown {
                key: 65,
                modifiers: Modifiers::SHIFT | Modifiers::ALT,
            },
            &bus,
            &no_pick,
        );
        let e = seen.borrow()[0];
        assert!(e.shift && e.alt && !e.ctrl);
        assert_eq!(e.key_code, 65);
    }

    #[test]
    fn test_device_changes_published_once() {
        let bus = EventBus::new();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let c = changes.clone();
        bus.subscribe(move |e: &InputDeviceChanged| c.borrow_mut().push(*e));

        let mut input = InputState::new();
        input.process(&RawInput::GamepadDown { gamepad: 0, button: 3 }, &bus, &no_pick);
        input.process(&RawInput::GamepadUp { gamepad: 0, button: 3 }, &bus, &no_pick);
        input.process(&RawInput::GamepadDown { gamepad: 0, button: 1 }, &bus, &no_pick);
        input.process(&RawInput::MouseMove { position: Vec2::new(5.0, 5.0) }, &bus, &no_pick);

        let changes = changes.borrow();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].current, InputDevice::Gamepad);
        assert_eq!(changes[0].gamepad_button, Some(3));
        assert_eq!(changes[1].previous, InputDevice::Gamepad);
        assert_eq!(input.last_device(), InputDevice::Mouse);
    }

    #[test]
    fn test_click_resolves_target() {
        let bus = EventBus::new();
        let clicks = Rc::new(RefCell::new(Vec::new()));
        let c = clicks.clone();
        bus.subscribe(move |e: &MouseClicked| c.borrow_mut().push(*e));

        let target = Entity::from_id(1 << 32 | 1);
        let pick = move |p: Vec2| (p.x < 100.0).then_some(target);
        let mut input = InputState::new();
        input.process(&RawInput::MouseDown { button: 0, position: Vec2::new(10.0, 10.0) }, &bus, &pick);
        input.process(&RawInput::MouseUp { button: 0, position: Vec2::new(10.0, 10.0) }, &bus, &pick);
        input.process(&RawInput::MouseDown { button: 0, position: Vec2::new(500.0, 10.0) }, &bus, &pick);

        let clicks = clicks.borrow();
        assert_eq!(clicks[0].target, Some(target));
        assert_eq!(clicks[1].target, None);
        assert!(input.was_mouse_released(0));
        assert_eq!(input.cursor(), Vec2::new(500.0, 10.0));
    }

    #[test]
    fn test_reset_clears_everything() {
        let bus = EventBus::new();
        let mut input = InputState::new();
        input.process(&RawInput::Wheel { delta: 2.0 }, &bus, &no_pick);
        input.process(&RawInput::KeyDown { key: 1, modifiers: Modifiers::CTRL }, &bus, &no_pick);
        assert_eq!(input.wheel(), 2.0);
        input.reset();
        assert!(!input.is_key_down(1));
        assert_eq!(input.wheel(), 0.0);
        assert_eq!(input.last_device(), InputDevice::None);
        assert_eq!(input.modifiers(), Modifiers::empty());
    }
}
