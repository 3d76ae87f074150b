//! Entity implementation

use slotmap::{Key, KeyData};

slotmap::new_key_type! {
    /// Generational entity handle
    ///
    /// Stale handles from destroyed entities never alias a live entity.
    pub struct Entity;
}

impl Entity {
    /// Stable integer form, used across the script boundary and for pair ordering
    pub fn id(self) -> u64 {
        self.data().as_ffi()
    }

    /// Rebuild a handle from [`Entity::id`]
    pub fn from_id(id: u64) -> Self {
        KeyData::from_ffi(id).into()
    }
}
