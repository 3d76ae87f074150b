//! Spatial partitioning for broadphase collision and region queries

pub mod broad_phase;
pub mod quadtree;

pub use broad_phase::BroadPhaseGrid;
pub use quadtree::{Quadtree, QuadtreeConfig};
