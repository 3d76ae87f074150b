//! Gating entities by game-state tags

use std::collections::HashSet;

use crate::ecs::{Component, Entity, World};

/// Tag every entity carries unless it opts into something narrower
pub const DEFAULT_STATE_TAG: &str = "default_state";

/// Names of the states in which an entity is updated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTag {
    /// State names; the entity is active if any of them is active
    pub names: Vec<String>,
}

impl Component for StateTag {}

impl Default for StateTag {
    fn default() -> Self {
        Self::new(DEFAULT_STATE_TAG)
    }
}

impl StateTag {
    /// Tag with a single state name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
        }
    }

    /// Add another state name
    pub fn add_tag(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.names.contains(&name) {
            self.names.push(name);
        }
    }
}

/// Excludes an entity from every per-frame system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InactiveTag;

impl Component for InactiveTag {}

/// Set of currently active state names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveStates {
    active: HashSet<String>,
}

impl Default for ActiveStates {
    fn default() -> Self {
        let mut active = HashSet::new();
        active.insert(DEFAULT_STATE_TAG.to_string());
        Self { active }
    }
}

impl ActiveStates {
    /// Mark a state active
    pub fn activate(&mut self, state: impl Into<String>) {
        self.active.insert(state.into());
    }

    /// Mark a state inactive
    pub fn deactivate(&mut self, state: &str) {
        self.active.remove(state);
    }

    /// Deactivate everything
    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Whether a single state name is active
    pub fn is_state_active(&self, state: &str) -> bool {
        self.active.contains(state)
    }

    /// Whether any of the tag's names is active
    pub fn is_active(&self, tag: &StateTag) -> bool {
        tag.names.iter().any(|n| self.active.contains(n))
    }

    /// Full per-frame gate: live, not inactive, and carrying an active tag
    pub fn is_entity_active(&self, world: &World, entity: Entity) -> bool {
        world.valid(entity)
            && !world.has::<InactiveTag>(entity)
            && world.get::<StateTag>(entity).is_some_and(|t| self.is_active(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_active() {
        let states = ActiveStates::default();
        assert!(states.is_active(&StateTag::default()));
        assert!(!states.is_active(&StateTag::new("PLANNING")));
    }

    #[test]
    fn test_any_tag_matches() {
        let mut states = ActiveStates::default();
        states.deactivate(DEFAULT_STATE_TAG);
        let mut tag = StateTag::new("a");
        tag.add_tag("b");
        assert!(!states.is_active(&tag));
        states.activate("b");
        assert!(states.is_active(&tag));
    }

    #[test]
    fn test_entity_gate() {
        let mut world = World::new();
        let states = ActiveStates::default();
        let e = world.create();
        assert!(!states.is_entity_active(&world, e));
        world.emplace(e, StateTag::default());
        assert!(states.is_entity_active(&world, e));
        world.emplace(e, InactiveTag);
        assert!(!states.is_entity_active(&world, e));
    }
}
