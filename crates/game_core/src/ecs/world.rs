//! ECS World implementation

use std::any::{Any, TypeId};
use std::collections::HashMap;

use slotmap::{SecondaryMap, SlotMap};

use super::{Component, Entity};

/// Type-erased view of one component storage
trait AnyStorage {
    fn remove_entity(&mut self, entity: Entity);
    fn clear(&mut self);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

struct Storage<T: Component> {
    items: SecondaryMap<Entity, T>,
}

impl<T: Component> AnyStorage for Storage<T> {
    fn remove_entity(&mut self, entity: Entity) {
        self.items.remove(entity);
    }

    fn clear(&mut self) {
        self.items.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// ECS World containing all entities and components
pub struct World {
    entities: SlotMap<Entity, ()>,
    storages: HashMap<TypeId, Box<dyn AnyStorage>>,
}

impl World {
    /// Create a new world
    pub fn new() -> Self {
        Self {
            entities: SlotMap::with_key(),
            storages: HashMap::new(),
        }
    }

    /// Create a new entity
    pub fn create(&mut self) -> Entity {
        self.entities.insert(())
    }

    /// Destroy an entity and drop all of its components.
    ///
    /// Returns false when the handle was already stale.
    pub fn destroy(&mut self, entity: Entity) -> bool {
        if self.entities.remove(entity).is_none() {
            log::debug!("destroy called on stale entity {:?}", entity);
            return false;
        }
        for storage in self.storages.values_mut() {
            storage.remove_entity(entity);
        }
        true
    }

    /// Whether the handle refers to a live entity
    pub fn valid(&self, entity: Entity) -> bool {
        self.entities.contains_key(entity)
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when no entity is alive
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Attach (or replace) a component.
    ///
    /// Returns false and leaves the world untouched when the entity is stale.
    pub fn emplace<T: Component>(&mut self, entity: Entity, component: T) -> bool {
        if !self.valid(entity) {
            log::debug!("emplace on stale entity {:?}", entity);
            return false;
        }
        self.storage_mut::<T>().items.insert(entity, component);
        true
    }

    /// Detach a component
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.storages
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<Storage<T>>()?
            .items
            .remove(entity)
    }

    /// Get a component from an entity
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.storage::<T>()?.items.get(entity)
    }

    /// Get a mutable component from an entity
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.storages
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<Storage<T>>()?
            .items
            .get_mut(entity)
    }

    /// Whether the entity carries a component of type `T`
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.storage::<T>()
            .is_some_and(|s| s.items.contains_key(entity))
    }

    /// Iterate every `(entity, component)` pair of one type
    pub fn view<T: Component>(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.storage::<T>()
            .into_iter()
            .flat_map(|s| s.items.iter())
    }

    /// Iterate every `(entity, component)` pair of one type mutably
    pub fn view_mut<T: Component>(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.storages
            .get_mut(&TypeId::of::<T>())
            .and_then(|s| s.as_any_mut().downcast_mut::<Storage<T>>())
            .into_iter()
            .flat_map(|s| s.items.iter_mut())
    }

    /// Snapshot of entities carrying `T`, safe to hold while mutating the world
    pub fn entities_with<T: Component>(&self) -> Vec<Entity> {
        self.view::<T>().map(|(e, _)| e).collect()
    }

    /// Iterate all live entities
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys()
    }

    /// Destroy every entity and component
    pub fn clear(&mut self) {
        self.entities.clear();
        for storage in self.storages.values_mut() {
            storage.clear();
        }
    }

    fn storage<T: Component>(&self) -> Option<&Storage<T>> {
        self.storages
            .get(&TypeId::of::<T>())?
            .as_any()
            .downcast_ref::<Storage<T>>()
    }

    fn storage_mut<T: Component>(&mut self) -> &mut Storage<T> {
        let storage = self
            .storages
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                Box::new(Storage::<T> {
                    items: SecondaryMap::new(),
                })
            });
        match storage.as_any_mut().downcast_mut::<Storage<T>>() {
            Some(storage) => storage,
            None => unreachable!("storage registered under a foreign TypeId"),
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
