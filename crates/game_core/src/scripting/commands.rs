//! Requests scripts make of the engine
//!
//! Lua never touches the entity store directly. Bound functions push a
//! [`ScriptCommand`] here and the frame orchestrator applies the queue at a
//! fixed point in the step.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// One engine request from script code
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    /// Create an entity with a transform and default state tag
    Spawn {
        /// Free-form type label published with `EntityCreated`
        kind: String,
        /// Left edge
        x: f32,
        /// Top edge
        y: f32,
        /// Width
        w: f32,
        /// Height
        h: f32,
        /// Place in UI space instead of the world
        ui: bool,
    },
    /// Destroy an entity by id
    Destroy {
        /// Entity id
        id: u64,
    },
    /// Move an entity's transform
    SetPosition {
        /// Entity id
        id: u64,
        /// New left edge
        x: f32,
        /// New top edge
        y: f32,
    },
    /// Resize an entity's transform
    SetSize {
        /// Entity id
        id: u64,
        /// New width
        w: f32,
        /// New height
        h: f32,
    },
    /// Rotate an entity's transform
    SetRotation {
        /// Entity id
        id: u64,
        /// Radians
        radians: f32,
    },
    /// Toggle collision participation
    SetCollisionEnabled {
        /// Entity id
        id: u64,
        /// Whether the entity is indexed for collision
        enabled: bool,
    },
    /// Replace an entity's collision category and mask
    SetCollisionFilter {
        /// Entity id
        id: u64,
        /// Category bits
        category: u32,
        /// Mask bits
        mask: u32,
    },
    /// Append a one-frame-per-sprite animation to an entity's queue
    QueueAnimation {
        /// Entity id
        id: u64,
        /// Animation name
        name: String,
        /// Sprite names in play order
        frames: Vec<String>,
        /// Seconds per frame
        frame_duration: f32,
    },
    /// Request a game-state transition by script name
    SetGameState {
        /// Target state, e.g. `MAIN_GAME`
        state: String,
    },
    /// Turn a state tag on
    ActivateState {
        /// State name
        name: String,
    },
    /// Turn a state tag off
    DeactivateState {
        /// State name
        name: String,
    },
    /// Displace an entity's spring
    PullSpring {
        /// Entity id
        id: u64,
        /// Displacement
        force: f32,
    },
    /// Retarget an entity's spring, optionally by duration
    AnimateSpring {
        /// Entity id
        id: u64,
        /// New target
        target: f32,
        /// Arrival time in seconds
        time: Option<f32>,
    },
    /// Forward an analytics event
    RecordTelemetry {
        /// Event name
        name: String,
        /// Event properties
        properties: serde_json::Value,
    },
}

/// Shared FIFO of pending script commands
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    inner: Rc<RefCell<VecDeque<ScriptCommand>>>,
}

impl CommandQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command
    pub fn push(&self, command: ScriptCommand) {
        self.inner.borrow_mut().push_back(command);
    }

    /// Take every pending command in submission order
    pub fn drain(&self) -> Vec<ScriptCommand> {
        self.inner.borrow_mut().drain(..).collect()
    }

    /// Number of pending commands
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    /// Drop pending commands
    pub fn clear(&self) {
        self.inner.borrow_mut().clear();
    }
}
