//! # Reconciliation Engine
//!
//! Turns decoded broadcasts into create/update/destroy operations against the
//! per-class registries.
//!
//! # Rules
//!
//! ```text
//!                 | health > 0                  | health <= 0
//! ----------------+-----------------------------+---------------------------
//! known id        | update (on_update), Updated | remove, despawn, Destroyed
//! unknown id      | spawn, insert, Created      | ignore (stale destroy)
//! ```
//!
//! Unknown wire classes are rejected with an error that callers log and skip.

use crate::behavior::{behavior_for, HostRoles};
use crate::entity::{EntityState, RemoteEntity};
use crate::events::LifecycleEvent;
use crate::registry::EntityRegistry;
use crate::spawner::EntitySpawner;
use netsync_core::{EntityClass, EntityId, NetSyncError, Result};
use netsync_protocol::{Broadcast, Handshake};

/// Health given to the local player when it is spawned from the handshake
pub const HANDSHAKE_HEALTH: i32 = 100;

/// Reconciliation Engine
///
/// # Purpose
/// Owns one [`EntityRegistry`] per class and the spawner collaborator, and
/// applies broadcasts to them.
///
/// # Thread Safety
/// Not internally synchronized. The network layer shares it as
/// `Arc<parking_lot::Mutex<ReconciliationEngine<S>>>`.
pub struct ReconciliationEngine<S: EntitySpawner> {
    /// Indexed by [`EntityClass::index`]
    registries: [EntityRegistry<S::Handle>; 4],

    spawner: S,

    hosts: HostRoles,
}

impl<S: EntitySpawner> ReconciliationEngine<S> {
    pub fn new(spawner: S) -> Self {
        Self {
            registries: EntityClass::ALL.map(EntityRegistry::new),
            spawner,
            hosts: HostRoles::default(),
        }
    }

    /// Apply one broadcast
    ///
    /// # Returns
    /// - `Ok(Some(event))` - an entity was created, updated or destroyed
    /// - `Ok(None)` - destroy for an entity this client never created
    /// - `Err(_)` - the broadcast names an unknown class
    pub fn apply(&mut self, broadcast: &Broadcast) -> Result<Option<LifecycleEvent>> {
        let class = broadcast.entity_class().ok_or_else(|| {
            NetSyncError::InvalidData(format!("Unknown entity class: {}", broadcast.class))
        })?;
        let id = broadcast.id;
        let behavior = behavior_for(class);
        let registry = &mut self.registries[class.index()];

        if broadcast.is_destroy() {
            let Some(RemoteEntity { state, handle }) = registry.remove(id) else {
                tracing::trace!("Ignoring destroy for unknown {} {}", class, id);
                return Ok(None);
            };

            behavior.on_destroy(&state, &mut self.hosts);
            self.spawner.despawn(&state, handle);
            tracing::debug!("Destroyed {} {}", class, id);
            return Ok(Some(LifecycleEvent::Destroyed { class, id }));
        }

        let health = broadcast.health;
        let position = broadcast.position();
        let spawner = &mut self.spawner;

        let (entity, created) = registry.upsert(id, || {
            let state = EntityState::new(class, id, health, position);
            let handle = spawner.spawn(&state);
            RemoteEntity::new(state, handle)
        });

        if created {
            behavior.on_create(&entity.state, &mut self.hosts);
            tracing::debug!(
                "Created {} {} at ({}, {}) with {} health",
                class,
                id,
                position.x,
                position.y,
                health
            );
            return Ok(Some(LifecycleEvent::Created(entity.state.clone())));
        }

        behavior.on_update(&mut entity.state, health, position);
        spawner.sync(&entity.state, &mut entity.handle);
        tracing::trace!("Updated {} {}", class, id);
        Ok(Some(LifecycleEvent::Updated(entity.state.clone())))
    }

    /// Spawn this client's player from the handshake and make it the host player
    ///
    /// If the player is already registered (a broadcast raced the handshake),
    /// it is moved to the handshake position instead of spawned twice.
    pub fn spawn_host_player(&mut self, handshake: &Handshake) -> LifecycleEvent {
        let id = handshake.id;
        let position = handshake.position;
        let registry = &mut self.registries[EntityClass::Player.index()];
        let spawner = &mut self.spawner;

        let (entity, created) = registry.upsert(id, || {
            let state = EntityState::new(EntityClass::Player, id, HANDSHAKE_HEALTH, position);
            let handle = spawner.spawn(&state);
            RemoteEntity::new(state, handle)
        });

        if !created {
            entity.state.position = position;
            spawner.sync(&entity.state, &mut entity.handle);
        }

        self.hosts.player = Some(id);
        tracing::info!(
            "Host player {} ({}) spawned at ({}, {})",
            id,
            handshake.name,
            position.x,
            position.y
        );

        if created {
            LifecycleEvent::Created(entity.state.clone())
        } else {
            LifecycleEvent::Updated(entity.state.clone())
        }
    }

    pub fn hosts(&self) -> HostRoles {
        self.hosts
    }

    pub fn host_player(&self) -> Option<&EntityState> {
        self.hosts
            .player
            .and_then(|id| self.get(EntityClass::Player, id))
    }

    pub fn host_boss(&self) -> Option<&EntityState> {
        self.hosts.boss.and_then(|id| self.get(EntityClass::Boss, id))
    }

    /// Attacker and target for an attack command: `(host player, host boss)`
    pub fn attack_target(&self) -> Option<(EntityId, EntityId)> {
        Some((self.host_player()?.id, self.host_boss()?.id))
    }

    pub fn registry(&self, class: EntityClass) -> &EntityRegistry<S::Handle> {
        &self.registries[class.index()]
    }

    pub fn get(&self, class: EntityClass, id: EntityId) -> Option<&EntityState> {
        self.registry(class).get(id).map(|entity| &entity.state)
    }

    /// Copy of every entity's state across all classes
    pub fn snapshot(&self) -> Vec<EntityState> {
        self.registries
            .iter()
            .flat_map(|registry| registry.snapshot())
            .collect()
    }

    /// Total number of entities across all classes
    pub fn len(&self) -> usize {
        self.registries.iter().map(EntityRegistry::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    pub fn spawner_mut(&mut self) -> &mut S {
        &mut self.spawner
    }

    /// Despawn every entity and forget host roles (session teardown)
    pub fn clear(&mut self) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        for registry in self.registries.iter_mut() {
            for RemoteEntity { state, handle } in registry.drain() {
                self.spawner.despawn(&state, handle);
                events.push(LifecycleEvent::Destroyed {
                    class: state.class,
                    id: state.id,
                });
            }
        }
        self.hosts = HostRoles::default();

        if !events.is_empty() {
            tracing::debug!("Cleared {} entities", events.len());
        }
        events
    }
}
