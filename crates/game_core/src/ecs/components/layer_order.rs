//! Draw ordering component

use crate::ecs::Component;

/// Z index for draws queued on behalf of an entity; ties keep insertion order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerOrderComponent {
    /// Lower draws first
    pub z_index: i32,
}

impl Component for LayerOrderComponent {}
