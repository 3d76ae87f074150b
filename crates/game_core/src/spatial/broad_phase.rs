//! Uniform-grid broadphase
//!
//! Cheaper than the quadtree when colliders are dense and similar in size.
//! Each box is registered in every cell it touches; candidate pairs are
//! deduplicated and confirmed with the same inclusive overlap test.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use crate::foundation::math::Aabb;

/// Default cell edge length
pub const DEFAULT_CELL_SIZE: f32 = 128.0;

type GridKey = (i32, i32);

/// Hash grid keyed by integer cell coordinates
pub struct BroadPhaseGrid<T> {
    cell_size: f32,
    cells: HashMap<GridKey, Vec<(T, Aabb)>>,
}

impl<T: Copy + Eq + Hash + Ord> Default for BroadPhaseGrid<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl<T: Copy + Eq + Hash + Ord> BroadPhaseGrid<T> {
    /// Create an empty grid
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(f32::EPSILON),
            cells: HashMap::new(),
        }
    }

    /// Remove every item
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    fn key(&self, x: f32, y: f32) -> GridKey {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    fn covered_keys(&self, b: &Aabb) -> impl Iterator<Item = GridKey> {
        let (x0, y0) = self.key(b.x, b.y);
        let (x1, y1) = self.key(b.right(), b.bottom());
        (x0..=x1).flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
    }

    /// Register an item in every cell its box covers
    pub fn insert(&mut self, item: T, b: Aabb) {
        let keys: Vec<GridKey> = self.covered_keys(&b).collect();
        for key in keys {
            self.cells.entry(key).or_default().push((item, b));
        }
    }

    /// Overlapping pairs ordered `(min, max)`, each reported once
    pub fn possible_collisions(&self) -> Vec<(T, T)> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for list in self.cells.values() {
            for (i, (a, box_a)) in list.iter().enumerate() {
                for (b, box_b) in &list[i + 1..] {
                    if a == b || !box_a.intersects(box_b) {
                        continue;
                    }
                    let pair = ((*a).min(*b), (*a).max(*b));
                    if seen.insert(pair) {
                        out.push(pair);
                    }
                }
            }
        }
        out
    }

    /// Items overlapping `target`, excluding `exclude`
    pub fn find_overlaps_with(&self, target: &Aabb, exclude: Option<T>) -> Vec<T> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for key in self.covered_keys(target) {
            let Some(list) = self.cells.get(&key) else {
                continue;
            };
            for (item, b) in list {
                if Some(*item) != exclude && b.intersects(target) && seen.insert(*item) {
                    out.push(*item);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_across_cell_boundary_reported_once() {
        let mut grid = BroadPhaseGrid::new(128.0);
        grid.insert(1u32, Aabb::new(100.0, 100.0, 60.0, 60.0));
        grid.insert(2u32, Aabb::new(150.0, 120.0, 60.0, 60.0));
        grid.insert(3u32, Aabb::new(600.0, 600.0, 10.0, 10.0));
        assert_eq!(grid.possible_collisions(), vec![(1, 2)]);
    }

    #[test]
    fn test_touching_edges_overlap() {
        let mut grid = BroadPhaseGrid::default();
        grid.insert(5u32, Aabb::new(0.0, 0.0, 10.0, 10.0));
        grid.insert(4u32, Aabb::new(10.0, 0.0, 10.0, 10.0));
        assert_eq!(grid.possible_collisions(), vec![(4, 5)]);
    }

    #[test]
    fn test_find_overlaps_excludes_self() {
        let mut grid = BroadPhaseGrid::default();
        let a = Aabb::new(0.0, 0.0, 300.0, 20.0);
        grid.insert(1u32, a);
        grid.insert(2u32, Aabb::new(250.0, 5.0, 10.0, 10.0));
        assert_eq!(grid.find_overlaps_with(&a, Some(1)), vec![2]);
        grid.clear();
        assert!(grid.find_overlaps_with(&a, None).is_empty());
    }
}
