//! Entity-attached records shared by the per-frame systems

pub mod collision;
pub mod game_object;
pub mod layer_order;
pub mod state;
pub mod transform;
pub mod ui_pane;

pub use collision::{CollisionFilter, ScreenSpaceCollisionMarker};
pub use game_object::{GameObject, GameObjectState};
pub use layer_order::LayerOrderComponent;
pub use state::{ActiveStates, InactiveTag, StateTag};
pub use transform::{remove_entity, Transform};
pub use ui_pane::{UIPaneParentRef, UIScrollComponent};
