//! Per-frame collision orchestrator
//!
//! Rebuilds a world quadtree and a UI quadtree from scratch every frame,
//! collects overlapping pairs, filters them, and turns the difference from
//! the previous frame into `CollisionStarted` / `CollisionEnded` events.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::core::config::DisplayConfig;
use crate::ecs::components::{
    ActiveStates, CollisionFilter, GameObject, ScreenSpaceCollisionMarker, StateTag, Transform,
    UIPaneParentRef, UIScrollComponent,
};
use crate::ecs::{Entity, World};
use crate::events::{CollisionEnded, CollisionStarted, EventBus};
use crate::foundation::math::{Aabb, Vec2};
use crate::spatial::Quadtree;

/// Quadtree over entities whose boxes were resolved when the frame started
pub type EntityQuadtree = Quadtree<Entity, Box<dyn Fn(&Entity) -> Aabb>>;

/// Which index a pass fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionSpace {
    /// Entities without a screen-space marker
    World,
    /// Entities with a screen-space marker
    Ui,
}

/// Events produced by one orchestrator update
#[derive(Debug, Default, Clone)]
pub struct CollisionFrame {
    /// Pairs that began overlapping this frame
    pub started: Vec<CollisionStarted>,
    /// Pairs that stopped overlapping this frame
    pub ended: Vec<CollisionEnded>,
}

/// Owns the per-frame indices and the pair set carried between frames
pub struct CollisionSystem {
    world_tree: EntityQuadtree,
    ui_tree: EntityQuadtree,
    boxes: Rc<HashMap<Entity, Aabb>>,
    active_pairs: BTreeSet<(Entity, Entity)>,
}

impl Default for CollisionSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn empty_tree(bounds: Aabb, boxes: Rc<HashMap<Entity, Aabb>>) -> EntityQuadtree {
    Quadtree::new(
        bounds,
        Box::new(move |e: &Entity| boxes.get(e).copied().unwrap_or_default()),
    )
}

fn ordered(a: Entity, b: Entity) -> (Entity, Entity) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl CollisionSystem {
    /// Create an orchestrator with empty indices
    pub fn new() -> Self {
        let boxes = Rc::new(HashMap::new());
        Self {
            world_tree: empty_tree(Aabb::default(), boxes.clone()),
            ui_tree: empty_tree(Aabb::default(), boxes.clone()),
            boxes,
            active_pairs: BTreeSet::new(),
        }
    }

    /// Rebuild both indices, diff the pair set and publish collision events
    pub fn update(
        &mut self,
        world: &World,
        states: &ActiveStates,
        display: &DisplayConfig,
        bus: &EventBus,
    ) -> CollisionFrame {
        let world_bounds = display.world_bounds.inflate(display.bounds_buffer);
        let ui_bounds = display.ui_bounds.inflate(display.bounds_buffer);

        let mut boxes = HashMap::new();
        let world_members = Self::collect(world, states, CollisionSpace::World, &world_bounds, &mut boxes);
        let ui_members = Self::collect(world, states, CollisionSpace::Ui, &ui_bounds, &mut boxes);
        let boxes = Rc::new(boxes);

        self.world_tree = empty_tree(world_bounds, boxes.clone());
        for e in world_members {
            self.world_tree.add(e);
        }
        self.ui_tree = empty_tree(ui_bounds, boxes.clone());
        for e in ui_members {
            self.ui_tree.add(e);
        }
        self.boxes = boxes;

        let mut current = BTreeSet::new();
        for (a, b) in self
            .world_tree
            .find_all_intersections()
            .into_iter()
            .chain(self.ui_tree.find_all_intersections())
        {
            if a == b {
                continue;
            }
            let pair = ordered(a, b);
            if !world.valid(pair.0) || !world.valid(pair.1) {
                log::debug!("collision pair with stale entity {:?}", pair);
                continue;
            }
            if !Self::filters_accept(world, pair.0, pair.1) {
                continue;
            }
            current.insert(pair);
        }

        let mut frame = CollisionFrame::default();
        for &(a, b) in current.difference(&self.active_pairs) {
            frame.started.push(CollisionStarted {
                a,
                b,
                point: self.contact_point(a, b),
            });
        }
        for &(a, b) in self.active_pairs.difference(&current) {
            frame.ended.push(CollisionEnded { a, b });
        }
        self.active_pairs = current;

        for event in &frame.started {
            bus.publish(event);
        }
        for event in &frame.ended {
            bus.publish(event);
        }
        frame
    }

    fn collect(
        world: &World,
        states: &ActiveStates,
        space: CollisionSpace,
        bounds: &Aabb,
        boxes: &mut HashMap<Entity, Aabb>,
    ) -> Vec<Entity> {
        let mut members = Vec::new();
        for (entity, transform) in world.view::<Transform>() {
            let screen_space = world.has::<ScreenSpaceCollisionMarker>(entity);
            if screen_space != (space == CollisionSpace::Ui) {
                continue;
            }
            let Some(go) = world.get::<GameObject>(entity) else {
                continue;
            };
            if !go.state.collision_enabled || !world.has::<StateTag>(entity) {
                continue;
            }
            if !states.is_entity_active(world, entity) {
                continue;
            }

            let mut b = transform.bounding_box();
            if space == CollisionSpace::Ui {
                if let Some(parent) = world.get::<UIPaneParentRef>(entity) {
                    match Self::scroll_adjusted(world, parent.pane, go, b) {
                        Some(adjusted) => b = adjusted,
                        None => continue,
                    }
                }
            }

            if !bounds.contains_rect(&b) {
                continue;
            }
            boxes.insert(entity, b);
            members.push(entity);
        }
        members
    }

    /// Box of a scroll-pane child in pane space, or `None` when culled
    fn scroll_adjusted(world: &World, pane: Entity, go: &GameObject, b: Aabb) -> Option<Aabb> {
        let Some(pane_transform) = world.get::<Transform>(pane) else {
            log::debug!("scroll child references pane {:?} without transform", pane);
            return Some(b);
        };
        let viewport = pane_transform.rect();
        let adjusted = if go.state.scroll_pane_displacement.is_some() {
            b
        } else {
            let offset = world.get::<UIScrollComponent>(pane).map_or(0.0, |s| s.offset);
            b.translated(Vec2::new(0.0, -offset))
        };
        adjusted.intersects(&viewport).then_some(adjusted)
    }

    fn filters_accept(world: &World, a: Entity, b: Entity) -> bool {
        let fa = world.get::<CollisionFilter>(a).copied().unwrap_or_default();
        let fb = world.get::<CollisionFilter>(b).copied().unwrap_or_default();
        fa.accepts(&fb)
    }

    fn contact_point(&self, a: Entity, b: Entity) -> Vec2 {
        match (self.boxes.get(&a), self.boxes.get(&b)) {
            (Some(ba), Some(bb)) => ba
                .intersection(bb)
                .map_or_else(|| (ba.center() + bb.center()) * 0.5, |r| r.center()),
            _ => Vec2::zeros(),
        }
    }

    /// Entities in the world index overlapping `region`
    pub fn query_world(&self, region: &Aabb) -> Vec<Entity> {
        self.world_tree.query(region)
    }

    /// Entities in the UI index overlapping `region`
    pub fn query_ui(&self, region: &Aabb) -> Vec<Entity> {
        self.ui_tree.query(region)
    }

    /// Number of entities indexed this frame in the given space
    pub fn indexed_count(&self, space: CollisionSpace) -> usize {
        match space {
            CollisionSpace::World => self.world_tree.len(),
            CollisionSpace::Ui => self.ui_tree.len(),
        }
    }

    /// Whether a pair is currently overlapping
    pub fn is_colliding(&self, a: Entity, b: Entity) -> bool {
        self.active_pairs.contains(&ordered(a, b))
    }

    /// Drop both indices and the remembered pair set
    pub fn clear(&mut self) {
        let boxes = Rc::new(HashMap::new());
        self.world_tree = empty_tree(self.world_tree.get_box(), boxes.clone());
        self.ui_tree = empty_tree(self.ui_tree.get_box(), boxes.clone());
        self.boxes = boxes;
        self.active_pairs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Fixture {
        world: World,
        states: ActiveStates,
        display: DisplayConfig,
        bus: EventBus,
        system: CollisionSystem,
        started: Rc<RefCell<Vec<CollisionStarted>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let bus = EventBus::new();
            let started = Rc::new(RefCell::new(Vec::new()));
            let sink = started.clone();
            bus.subscribe(move |e: &CollisionStarted| sink.borrow_mut().push(*e));
            Self {
                world: World::new(),
                states: ActiveStates::default(),
                display: DisplayConfig::default(),
                bus,
                system: CollisionSystem::new(),
                started,
            }
        }

        fn spawn(&mut self, rect: Aabb, filter: Option<CollisionFilter>) -> Entity {
            let e = self.world.create();
            self.world.emplace(e, Transform::new(rect.x, rect.y, rect.w, rect.h));
            self.world.emplace(e, GameObject::default());
            self.world.emplace(e, StateTag::default());
            if let Some(filter) = filter {
                self.world.emplace(e, filter);
            }
            e
        }

        fn step(&mut self) -> CollisionFrame {
            self.system
                .update(&self.world, &self.states, &self.display, &self.bus)
        }
    }

    #[test]
    fn test_filter_masks_gate_events() {
        let mut fx = Fixture::new();
        let a = fx.spawn(Aabb::new(100.0, 100.0, 50.0, 50.0), Some(CollisionFilter::new(1, 2)));
        let b = fx.spawn(Aabb::new(120.0, 120.0, 50.0, 50.0), Some(CollisionFilter::new(2, 1)));
        let c = fx.spawn(Aabb::new(90.0, 90.0, 30.0, 30.0), Some(CollisionFilter::new(4, 4)));

        fx.step();
        let started = fx.started.borrow();
        assert_eq!(started.len(), 1);
        let (lo, hi) = ordered(a, b);
        assert_eq!((started[0].a, started[0].b), (lo, hi));
        assert!(!fx.system.is_colliding(a, c));
    }

    #[test]
    fn test_started_once_then_ended() {
        let mut fx = Fixture::new();
        let a = fx.spawn(Aabb::new(0.0, 0.0, 10.0, 10.0), None);
        let b = fx.spawn(Aabb::new(5.0, 5.0, 10.0, 10.0), None);

        assert_eq!(fx.step().started.len(), 1);
        assert!(fx.step().started.is_empty());

        fx.world.get_mut::<Transform>(b).unwrap().actual_x = 500.0;
        let frame = fx.step();
        assert_eq!(frame.ended.len(), 1);
        assert!(!fx.system.is_colliding(a, b));
    }

    #[test]
    fn test_inactive_and_disabled_entities_skipped() {
        let mut fx = Fixture::new();
        let a = fx.spawn(Aabb::new(0.0, 0.0, 10.0, 10.0), None);
        let b = fx.spawn(Aabb::new(5.0, 5.0, 10.0, 10.0), None);
        fx.world.get_mut::<GameObject>(a).unwrap().state.collision_enabled = false;
        fx.world.emplace(b, StateTag::new("elsewhere"));
        fx.step();
        assert_eq!(fx.system.indexed_count(CollisionSpace::World), 0);
    }

    #[test]
    fn test_world_and_ui_never_pair() {
        let mut fx = Fixture::new();
        let _a = fx.spawn(Aabb::new(0.0, 0.0, 10.0, 10.0), None);
        let b = fx.spawn(Aabb::new(5.0, 5.0, 10.0, 10.0), None);
        fx.world.emplace(b, ScreenSpaceCollisionMarker);
        let frame = fx.step();
        assert!(frame.started.is_empty());
        assert_eq!(fx.system.indexed_count(CollisionSpace::World), 1);
        assert_eq!(fx.system.indexed_count(CollisionSpace::Ui), 1);
    }

    #[test]
    fn test_outside_expanded_bounds_excluded() {
        let mut fx = Fixture::new();
        let inside = fx.spawn(Aabb::new(-150.0, -150.0, 20.0, 20.0), None);
        let _outside = fx.spawn(Aabb::new(-250.0, 0.0, 20.0, 20.0), None);
        fx.step();
        assert_eq!(fx.system.indexed_count(CollisionSpace::World), 1);
        assert_eq!(fx.system.query_world(&Aabb::new(-200.0, -200.0, 100.0, 100.0)), vec![inside]);
    }

    #[test]
    fn test_scroll_pane_children_culled_by_viewport() {
        let mut fx = Fixture::new();
        let pane = fx.spawn(Aabb::new(100.0, 100.0, 200.0, 100.0), None);
        fx.world.emplace(pane, ScreenSpaceCollisionMarker);
        fx.world.emplace(
            pane,
            UIScrollComponent {
                offset: 150.0,
                max_offset: 400.0,
                vertical: true,
                ..UIScrollComponent::default()
            },
        );

        // Laid out at y=300: after scrolling up by 150 it sits at y=150, inside the viewport
        let visible = fx.spawn(Aabb::new(120.0, 300.0, 50.0, 20.0), None);
        // Laid out at y=110: after scrolling it sits at y=-40, above the viewport
        let hidden = fx.spawn(Aabb::new(120.0, 110.0, 50.0, 20.0), None);
        // Already displaced by the pane: its transform is used as-is
        let displaced = fx.spawn(Aabb::new(200.0, 150.0, 50.0, 20.0), None);
        for child in [visible, hidden, displaced] {
            fx.world.emplace(child, ScreenSpaceCollisionMarker);
            fx.world.emplace(child, UIPaneParentRef { pane });
        }
        fx.world.get_mut::<GameObject>(displaced).unwrap().state.scroll_pane_displacement =
            Some(Vec2::new(0.0, -150.0));

        fx.step();
        let indexed = fx.system.query_ui(&Aabb::new(-1000.0, -1000.0, 3000.0, 3000.0));
        assert!(indexed.contains(&pane));
        assert!(indexed.contains(&visible));
        assert!(indexed.contains(&displaced));
        assert!(!indexed.contains(&hidden));
        assert!(fx.system.is_colliding(pane, visible));
    }

    #[test]
    fn test_clear_forgets_pairs() {
        let mut fx = Fixture::new();
        fx.spawn(Aabb::new(0.0, 0.0, 10.0, 10.0), None);
        fx.spawn(Aabb::new(5.0, 5.0, 10.0, 10.0), None);
        fx.step();
        fx.system.clear();
        assert_eq!(fx.system.indexed_count(CollisionSpace::World), 0);
        assert_eq!(fx.step().started.len(), 1);
    }
}
