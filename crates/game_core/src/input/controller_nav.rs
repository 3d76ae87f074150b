//! Gamepad/keyboard focus navigation over UI elements
//!
//! Elements are organized into named groups; one group is active at a time.
//! Navigation walks the active group in insertion order, wrapping at the
//! ends and skipping elements that are no longer valid.

use crate::ecs::{Entity, World};
use crate::events::{EventBus, UIButtonActivated, UIElementFocused};

/// Direction of a navigation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavDirection {
    /// Forward through the group
    Next,
    /// Backward through the group
    Prev,
}

#[derive(Debug, Clone)]
struct NavGroup {
    name: String,
    elements: Vec<Entity>,
    focused: Option<usize>,
}

/// Focus groups and the current selection
#[derive(Debug, Default)]
pub struct ControllerNavManager {
    groups: Vec<NavGroup>,
    active: Option<usize>,
}

impl ControllerNavManager {
    /// No groups
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty group; the first group created becomes active
    pub fn create_group(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.group_index(&name).is_some() {
            return;
        }
        self.groups.push(NavGroup {
            name,
            elements: Vec::new(),
            focused: None,
        });
        if self.active.is_none() {
            self.active = Some(self.groups.len() - 1);
        }
    }

    /// Append an element to a group; false if the group is unknown
    pub fn add_element(&mut self, group: &str, element: Entity) -> bool {
        match self.group_index(group) {
            Some(i) => {
                let elements = &mut self.groups[i].elements;
                if !elements.contains(&element) {
                    elements.push(element);
                }
                true
            }
            None => false,
        }
    }

    /// Drop an element from every group
    pub fn remove_element(&mut self, element: Entity) {
        for group in &mut self.groups {
            if let Some(pos) = group.elements.iter().position(|e| *e == element) {
                group.elements.remove(pos);
                group.focused = match group.focused {
                    Some(f) if f == pos => None,
                    Some(f) if f > pos => Some(f - 1),
                    other => other,
                };
            }
        }
    }

    /// Make `name` the active group
    pub fn set_active_group(&mut self, name: &str) -> bool {
        match self.group_index(name) {
            Some(i) => {
                self.active = Some(i);
                true
            }
            None => false,
        }
    }

    /// Name of the active group
    pub fn active_group(&self) -> Option<&str> {
        self.active.map(|i| self.groups[i].name.as_str())
    }

    /// Focused element of the active group
    pub fn focused(&self) -> Option<Entity> {
        let group = &self.groups[self.active?];
        group.focused.map(|f| group.elements[f])
    }

    /// Move focus and publish [`UIElementFocused`] for the new element
    pub fn navigate(&mut self, direction: NavDirection, world: &World, bus: &EventBus) -> Option<Entity> {
        let group = &mut self.groups[self.active?];
        let len = group.elements.len();
        if len == 0 {
            return None;
        }
        let start = group.focused;
        for step in 1..=len {
            let index = match (start, direction) {
                (None, NavDirection::Next) => step - 1,
                (None, NavDirection::Prev) => len - step,
                (Some(f), NavDirection::Next) => (f + step) % len,
                (Some(f), NavDirection::Prev) => (f + len * step - step) % len,
            };
            let element = group.elements[index];
            if world.valid(element) {
                group.focused = Some(index);
                bus.publish(&UIElementFocused { element });
                return Some(element);
            }
        }
        None
    }

    /// Activate the focused element, publishing [`UIButtonActivated`]
    pub fn activate(&self, button: i32, world: &World, bus: &EventBus) -> Option<Entity> {
        let element = self.focused().filter(|e| world.valid(*e))?;
        bus.publish(&UIButtonActivated { element, button });
        Some(element)
    }

    /// Drop all groups and focus
    pub fn reset(&mut self) {
        self.groups.clear();
        self.active = None;
    }

    fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }
}
