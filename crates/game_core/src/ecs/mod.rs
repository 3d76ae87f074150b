//! Entity-Component store
//!
//! A small generational store: entities are slotmap keys, each component type
//! lives in its own secondary map. The per-frame systems only need
//! create/destroy/valid/emplace/get/view, so that is all it offers.

pub mod component;
pub mod components;
pub mod entity;
pub mod world;

pub use component::Component;
pub use entity::Entity;
pub use world::World;
