//! Quadtree spatial partitioning structure
//!
//! Divides a bounded 2D region into four quadrants once a node holds more
//! than `max_items_per_node` boxes. An item lives in the deepest node whose
//! quadrant contains its box without touching the split lines, so straddling
//! or edge-touching items stay in the parent. Boxes in sibling quadrants can
//! then never intersect, since intersection includes shared edges.
//! Items whose box is not inside the tree bounds are rejected.

use crate::foundation::math::{Aabb, Vec2};

/// Configuration for quadtree behavior
#[derive(Debug, Clone)]
pub struct QuadtreeConfig {
    /// Items per node before subdivision
    pub max_items_per_node: usize,
    /// Maximum subdivision depth
    pub max_depth: u32,
}

impl Default for QuadtreeConfig {
    fn default() -> Self {
        Self {
            max_items_per_node: 16,
            max_depth: 8,
        }
    }
}

#[derive(Debug, Clone)]
struct Node<T> {
    bounds: Aabb,
    items: Vec<(T, Aabb)>,
    children: Option<Box<[Node<T>; 4]>>,
}

impl<T: Copy + PartialEq> Node<T> {
    fn new(bounds: Aabb) -> Self {
        Self {
            bounds,
            items: Vec::new(),
            children: None,
        }
    }

    fn quadrant_bounds(&self, index: usize) -> Aabb {
        let half = Vec2::new(self.bounds.w * 0.5, self.bounds.h * 0.5);
        let x = if index & 1 == 0 { self.bounds.x } else { self.bounds.x + half.x };
        let y = if index & 2 == 0 { self.bounds.y } else { self.bounds.y + half.y };
        Aabb::new(x, y, half.x, half.y)
    }

    /// Index of the child quadrant holding `b` clear of both split lines, if any
    fn quadrant_for(&self, b: &Aabb) -> Option<usize> {
        let mid_x = self.bounds.x + self.bounds.w * 0.5;
        let mid_y = self.bounds.y + self.bounds.h * 0.5;
        let column = if b.right() < mid_x {
            0
        } else if b.x > mid_x {
            1
        } else {
            return None;
        };
        let row = if b.bottom() < mid_y {
            0
        } else if b.y > mid_y {
            2
        } else {
            return None;
        };
        Some(column | row)
    }

    fn subdivide(&mut self) {
        let children = [
            Node::new(self.quadrant_bounds(0)),
            Node::new(self.quadrant_bounds(1)),
            Node::new(self.quadrant_bounds(2)),
            Node::new(self.quadrant_bounds(3)),
        ];
        self.children = Some(Box::new(children));

        let items = std::mem::take(&mut self.items);
        for (item, b) in items {
            match (self.quadrant_for(&b), self.children.as_mut()) {
                (Some(i), Some(children)) => children[i].items.push((item, b)),
                _ => self.items.push((item, b)),
            }
        }
    }

    fn add(&mut self, item: T, b: Aabb, depth: u32, config: &QuadtreeConfig) {
        let quadrant = self.quadrant_for(&b);
        if let Some(children) = self.children.as_mut() {
            match quadrant {
                Some(i) => children[i].add(item, b, depth + 1, config),
                None => self.items.push((item, b)),
            }
            return;
        }

        self.items.push((item, b));
        if self.items.len() > config.max_items_per_node && depth < config.max_depth {
            self.subdivide();
        }
    }

    fn remove(&mut self, item: T, b: &Aabb) -> bool {
        if let Some(pos) = self.items.iter().position(|(v, _)| *v == item) {
            self.items.remove(pos);
            return true;
        }
        let removed = match (self.quadrant_for(b), self.children.as_mut()) {
            (Some(i), Some(children)) => children[i].remove(item, b),
            _ => false,
        };
        if removed {
            self.try_merge();
        }
        removed
    }

    fn try_merge(&mut self) {
        let Some(children) = self.children.as_ref() else {
            return;
        };
        if children.iter().any(|c| c.children.is_some()) {
            return;
        }
        let total: usize = self.items.len() + children.iter().map(|c| c.items.len()).sum::<usize>();
        if total > 0 && total <= 4 {
            if let Some(children) = self.children.take() {
                let children = *children;
                for child in children {
                    self.items.extend(child.items);
                }
            }
        }
    }

    fn query(&self, region: &Aabb, out: &mut Vec<T>) {
        if !self.bounds.intersects(region) {
            return;
        }
        out.extend(
            self.items
                .iter()
                .filter(|(_, b)| b.intersects(region))
                .map(|(v, _)| *v),
        );
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(region, out);
            }
        }
    }

    fn find_all_intersections(&self, out: &mut Vec<(T, T)>) {
        for (i, (a, box_a)) in self.items.iter().enumerate() {
            for (b, box_b) in &self.items[i + 1..] {
                if a != b && box_a.intersects(box_b) {
                    out.push((*a, *b));
                }
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                for (a, box_a) in &self.items {
                    child.descendant_intersections(*a, box_a, out);
                }
                child.find_all_intersections(out);
            }
        }
    }

    fn descendant_intersections(&self, item: T, b: &Aabb, out: &mut Vec<(T, T)>) {
        if !self.bounds.intersects(b) {
            return;
        }
        for (other, other_box) in &self.items {
            if *other != item && b.intersects(other_box) {
                out.push((item, *other));
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.descendant_intersections(item, b, out);
            }
        }
    }

    fn count(&self) -> usize {
        self.items.len()
            + self
                .children
                .as_ref()
                .map_or(0, |c| c.iter().map(Node::count).sum())
    }
}

/// Bounded AABB index over items with a box extraction function
pub struct Quadtree<T, F>
where
    F: Fn(&T) -> Aabb,
{
    root: Node<T>,
    get_box: F,
    config: QuadtreeConfig,
}

impl<T, F> Quadtree<T, F>
where
    T: Copy + PartialEq,
    F: Fn(&T) -> Aabb,
{
    /// Create an empty tree covering `bounds`
    pub fn new(bounds: Aabb, get_box: F) -> Self {
        Self::with_config(bounds, get_box, QuadtreeConfig::default())
    }

    /// Create an empty tree with explicit subdivision limits
    pub fn with_config(bounds: Aabb, get_box: F, config: QuadtreeConfig) -> Self {
        Self {
            root: Node::new(bounds),
            get_box,
            config,
        }
    }

    /// Region covered by the tree
    pub fn get_box(&self) -> Aabb {
        self.root.bounds
    }

    /// Insert an item. Returns false if its box is not inside the tree bounds.
    pub fn add(&mut self, item: T) -> bool {
        let b = (self.get_box)(&item);
        if !self.root.bounds.contains_rect(&b) {
            return false;
        }
        self.root.add(item, b, 0, &self.config);
        true
    }

    /// Remove an item; its box must be unchanged since insertion
    pub fn remove(&mut self, item: T) -> bool {
        let b = (self.get_box)(&item);
        self.root.remove(item, &b)
    }

    /// Drop every item, keeping the bounds
    pub fn clear(&mut self) {
        self.root = Node::new(self.root.bounds);
    }

    /// Items whose box intersects `region`; empty when `region` misses the bounds
    pub fn query(&self, region: &Aabb) -> Vec<T> {
        let mut out = Vec::new();
        self.root.query(region, &mut out);
        out
    }

    /// Every intersecting pair, without self-pairs and each unordered pair once
    pub fn find_all_intersections(&self) -> Vec<(T, T)> {
        let mut out = Vec::new();
        self.root.find_all_intersections(&mut out);
        out
    }

    /// Number of stored items
    pub fn len(&self) -> usize {
        self.root.count()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn tree_over(boxes: &HashMap<u32, Aabb>) -> Quadtree<u32, impl Fn(&u32) -> Aabb + '_> {
        let config = QuadtreeConfig {
            max_items_per_node: 2,
            max_depth: 6,
        };
        Quadtree::with_config(Aabb::new(0.0, 0.0, 1000.0, 1000.0), move |id| boxes[id], config)
    }

    fn scatter() -> HashMap<u32, Aabb> {
        // Deterministic pseudo-random layout with plenty of overlap
        let mut seed = 12345u32;
        let mut next = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (seed >> 8) as f32 / (1u32 << 24) as f32
        };
        (0..120)
            .map(|i| {
                let w = 5.0 + next() * 60.0;
                let h = 5.0 + next() * 60.0;
                let x = next() * (1000.0 - w);
                let y = next() * (1000.0 - h);
                (i, Aabb::new(x, y, w, h))
            })
            .collect()
    }

    #[test]
    fn test_rejects_out_of_bounds() {
        let boxes = HashMap::from([(1, Aabb::new(990.0, 10.0, 20.0, 20.0))]);
        let mut tree = tree_over(&boxes);
        assert!(!tree.add(1));
        assert!(tree.is_empty());
    }

    #[test]
    fn test_query_is_superset_of_brute_force() {
        let boxes = scatter();
        let mut tree = tree_over(&boxes);
        for id in boxes.keys() {
            assert!(tree.add(*id));
        }
        assert_eq!(tree.len(), boxes.len());

        let region = Aabb::new(200.0, 300.0, 250.0, 180.0);
        let found: HashSet<u32> = tree.query(&region).into_iter().collect();
        for (id, b) in &boxes {
            if b.intersects(&region) {
                assert!(found.contains(id), "missing {}", id);
            }
        }
    }

    #[test]
    fn test_intersections_match_brute_force_without_duplicates() {
        let boxes = scatter();
        let mut tree = tree_over(&boxes);
        for id in boxes.keys() {
            tree.add(*id);
        }
        let pairs = tree.find_all_intersections();

        let mut seen = HashSet::new();
        for (a, b) in &pairs {
            assert_ne!(a, b);
            assert!(seen.insert((*a.min(b), *a.max(b))), "duplicate pair {:?}", (a, b));
        }

        let mut expected = HashSet::new();
        for (a, box_a) in &boxes {
            for (b, box_b) in &boxes {
                if a < b && box_a.intersects(box_b) {
                    expected.insert((*a, *b));
                }
            }
        }
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_query_outside_bounds_is_empty() {
        let boxes = HashMap::from([(1, Aabb::new(10.0, 10.0, 20.0, 20.0))]);
        let mut tree = tree_over(&boxes);
        tree.add(1);
        assert!(tree.query(&Aabb::new(5000.0, 5000.0, 10.0, 10.0)).is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let boxes = scatter();
        let mut tree = tree_over(&boxes);
        for id in boxes.keys() {
            tree.add(*id);
        }
        assert!(tree.remove(7));
        assert!(!tree.remove(7));
        assert_eq!(tree.len(), boxes.len() - 1);
        assert!(!tree.query(&boxes[&7]).contains(&7));

        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.get_box(), Aabb::new(0.0, 0.0, 1000.0, 1000.0));
    }

    #[test]
    fn test_edge_touching_pairs_across_split_lines() {
        // 0..1000 splits at 500; each pair below touches on a split line
        let mut boxes = HashMap::from([
            (1, Aabb::new(490.0, 100.0, 10.0, 10.0)),
            (2, Aabb::new(500.0, 100.0, 10.0, 10.0)),
            (3, Aabb::new(100.0, 490.0, 10.0, 10.0)),
            (4, Aabb::new(100.0, 500.0, 10.0, 10.0)),
            (5, Aabb::new(740.0, 740.0, 10.0, 10.0)),
            (6, Aabb::new(750.0, 750.0, 10.0, 10.0)),
        ]);
        for i in 0..12u32 {
            let offset = i as f32 * 15.0;
            boxes.insert(100 + i, Aabb::new(20.0 + offset, 20.0, 5.0, 5.0));
            boxes.insert(200 + i, Aabb::new(820.0 + offset * 0.5, 900.0, 5.0, 5.0));
        }
        let mut tree = tree_over(&boxes);
        for id in boxes.keys() {
            assert!(tree.add(*id));
        }

        let found: HashSet<(u32, u32)> = tree
            .find_all_intersections()
            .into_iter()
            .map(|(a, b)| (a.min(b), a.max(b)))
            .collect();
        assert!(found.contains(&(1, 2)));
        assert!(found.contains(&(3, 4)));
        assert!(found.contains(&(5, 6)));

        let mut expected = HashSet::new();
        let ids: Vec<u32> = boxes.keys().copied().collect();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                if boxes[a].intersects(&boxes[b]) {
                    expected.insert((*a.min(b), *a.max(b)));
                }
            }
        }
        assert_eq!(found, expected);

        assert!(tree.remove(2));
        assert!(!tree.find_all_intersections().iter().any(|&(a, b)| a == 2 || b == 2));
    }
}
