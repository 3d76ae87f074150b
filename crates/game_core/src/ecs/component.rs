//! Component trait

/// Marker trait for components
///
/// Components are owned by the [`World`](super::World) and live on the
/// foreground thread only, so no `Send` bound is required.
pub trait Component: 'static {}
