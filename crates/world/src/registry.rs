//! # Entity Registry
//!
//! This module maps entity IDs to local entities for one entity class.

use crate::entity::{EntityState, RemoteEntity};
use netsync_core::{EntityClass, EntityId};
use std::collections::hash_map::{Entry, HashMap};

/// Entity Registry
///
/// # Purpose
/// Tracks the entities of a single class and provides lookup/upsert/remove.
///
/// # Thread Safety
/// Plain mapping with no interior locking. The owner (the reconciliation
/// engine) is shared behind a mutex.
#[derive(Debug)]
pub struct EntityRegistry<H> {
    /// Class of every entity in this registry
    class: EntityClass,

    /// Key: entity ID, Value: state and collaborator handle
    entities: HashMap<EntityId, RemoteEntity<H>>,
}

impl<H> EntityRegistry<H> {
    /// Create an empty registry for `class`
    #[inline]
    pub fn new(class: EntityClass) -> Self {
        tracing::debug!("Creating EntityRegistry for {}", class);

        Self {
            class,
            entities: HashMap::new(),
        }
    }

    #[inline]
    pub fn class(&self) -> EntityClass {
        self.class
    }

    /// Get an entity by ID
    ///
    /// # Returns
    /// `Some(entity)` if found, `None` otherwise
    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&RemoteEntity<H>> {
        self.entities.get(&id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut RemoteEntity<H>> {
        self.entities.get_mut(&id)
    }

    #[inline]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Fetch the entity for `id`, creating it with `create` if absent
    ///
    /// # Returns
    /// The entry and `true` if it was created by this call. `create` runs at
    /// most once and only for unseen IDs, so an ID is never duplicated.
    pub fn upsert<F>(&mut self, id: EntityId, create: F) -> (&mut RemoteEntity<H>, bool)
    where
        F: FnOnce() -> RemoteEntity<H>,
    {
        match self.entities.entry(id) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => {
                let entity = create();
                debug_assert_eq!(entity.state.class, self.class);
                debug_assert_eq!(entity.id(), id);
                tracing::trace!("Adding {} {}", self.class, id);
                (entry.insert(entity), true)
            }
        }
    }

    /// Remove an entity from the registry
    ///
    /// # Returns
    /// The removed entity, so the caller can release its handle
    #[inline]
    pub fn remove(&mut self, id: EntityId) -> Option<RemoteEntity<H>> {
        let removed = self.entities.remove(&id);
        if removed.is_some() {
            tracing::trace!("Removing {} {}", self.class, id);
        }
        removed
    }

    /// Get the number of entities
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteEntity<H>> {
        self.entities.values()
    }

    /// Copy of every entity's state, ordered by ID
    pub fn snapshot(&self) -> Vec<EntityState> {
        let mut states: Vec<EntityState> =
            self.entities.values().map(|e| e.state.clone()).collect();
        states.sort_by_key(|state| state.id);
        states
    }

    /// Remove every entity, handing each one back to the caller
    pub fn drain(&mut self) -> impl Iterator<Item = RemoteEntity<H>> + '_ {
        self.entities.drain().map(|(_, entity)| entity)
    }
}
