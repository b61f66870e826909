//! # NetSync World Layer
//!
//! This crate holds the client's local mirror of server-owned entities.
//!
//! ## Modules
//!
//! - `entity` - Entity state and registry entries
//! - `registry` - Per-class ID to entity mapping
//! - `behavior` - Per-class create/update/destroy hooks and host roles
//! - `reconcile` - Applies broadcasts to the registries
//! - `spawner` - Collaborator trait for local visuals
//! - `events` - Lifecycle events published after each change

pub mod behavior;
pub mod entity;
pub mod events;
pub mod reconcile;
pub mod registry;
pub mod spawner;

// Re-export commonly used types
pub use behavior::{behavior_for, ClassBehavior, HostRoles};
pub use entity::{EntityState, RemoteEntity};
pub use events::LifecycleEvent;
pub use reconcile::{ReconciliationEngine, HANDSHAKE_HEALTH};
pub use registry::EntityRegistry;
pub use spawner::EntitySpawner;
