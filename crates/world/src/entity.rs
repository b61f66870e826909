//! # Remote Entities
//!
//! Local mirror of one server-owned entity.

use netsync_core::{EntityClass, EntityId, Position};
use serde::Serialize;

/// Synchronized attributes of a remote entity
///
/// This is the part consumers may copy freely; the collaborator handle lives
/// next to it in [`RemoteEntity`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub id: EntityId,
    pub class: EntityClass,
    pub health: i32,
    pub position: Position,

    /// Heading in degrees, projectile classes only
    pub orientation: Option<f32>,
}

impl EntityState {
    /// Create the state of a freshly spawned entity
    ///
    /// Projectiles start facing +X (0 degrees).
    pub fn new(class: EntityClass, id: EntityId, health: i32, position: Position) -> Self {
        Self {
            id,
            class,
            health,
            position,
            orientation: class.is_projectile().then_some(0.0),
        }
    }
}

/// Registry entry: synchronized state plus the collaborator's handle
#[derive(Debug)]
pub struct RemoteEntity<H> {
    pub state: EntityState,

    /// Opaque handle returned by the spawner (visual, physics body, ...)
    pub handle: H,
}

impl<H> RemoteEntity<H> {
    pub fn new(state: EntityState, handle: H) -> Self {
        Self { state, handle }
    }

    pub fn id(&self) -> EntityId {
        self.state.id
    }
}
