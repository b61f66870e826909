//! # Lifecycle Events
//!
//! Events published to rendering/UI collaborators after each applied broadcast.

use crate::entity::EntityState;
use netsync_core::{EntityClass, EntityId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LifecycleEvent {
    /// First broadcast for an unseen entity
    Created(EntityState),

    /// Health/position (and orientation) changed in place
    Updated(EntityState),

    /// Entity removed after a broadcast with non-positive health
    Destroyed { class: EntityClass, id: EntityId },
}

impl LifecycleEvent {
    pub fn class(&self) -> EntityClass {
        match self {
            Self::Created(state) | Self::Updated(state) => state.class,
            Self::Destroyed { class, .. } => *class,
        }
    }

    pub fn id(&self) -> EntityId {
        match self {
            Self::Created(state) | Self::Updated(state) => state.id,
            Self::Destroyed { id, .. } => *id,
        }
    }
}
