//! Scroll pane relationships

use crate::ecs::{Component, Entity};

/// Back-reference from a UI child to the scroll pane containing it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UIPaneParentRef {
    /// Containing pane
    pub pane: Entity,
}

impl Component for UIPaneParentRef {}

/// Scroll state carried by a pane
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UIScrollComponent {
    /// Current vertical offset; positive scrolls content up
    pub offset: f32,
    /// Smallest allowed offset
    pub min_offset: f32,
    /// Largest allowed offset
    pub max_offset: f32,
    /// Vertical scrolling enabled
    pub vertical: bool,
}

impl Component for UIScrollComponent {}

impl UIScrollComponent {
    /// Scroll by `delta`, clamped to the allowed range.
    ///
    /// Returns true if the offset changed.
    pub fn scroll_by(&mut self, delta: f32) -> bool {
        let previous = self.offset;
        self.offset = (self.offset + delta).clamp(self.min_offset, self.max_offset);
        (self.offset - previous).abs() > f32::EPSILON
    }
}
