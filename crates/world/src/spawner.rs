//! # Spawn/Despawn Collaborator
//!
//! The world crate never creates visuals itself. Whoever renders entities
//! implements [`EntitySpawner`] and receives a call for every lifecycle change.

use crate::entity::EntityState;

/// External collaborator owning the local representation of entities
///
/// # Thread Safety
/// The engine calls the spawner while holding its own lock, so
/// implementations must not call back into the engine.
pub trait EntitySpawner: Send {
    /// Handle to the collaborator's object for one entity
    type Handle: Send;

    /// Create the local object for a new entity
    fn spawn(&mut self, entity: &EntityState) -> Self::Handle;

    /// Destroy the local object; called exactly once per spawned handle
    fn despawn(&mut self, entity: &EntityState, handle: Self::Handle);

    /// Apply updated state (position, rotation, health) to the local object
    fn sync(&mut self, _entity: &EntityState, _handle: &mut Self::Handle) {}
}
