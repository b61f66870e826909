//! # Per-Class Behavior
//!
//! The four entity classes share one reconciliation routine. What differs
//! between them is captured by [`ClassBehavior`]:
//!
//! | Class | on_create | on_update | on_destroy |
//! |---|---|---|---|
//! | Player | - | health, position | release host player |
//! | Boss | becomes host boss | health, position | release host boss |
//! | PlayerProjectile / BossProjectile | - | orientation, then health, position | - |

use crate::entity::EntityState;
use netsync_core::{EntityClass, EntityId, Position};

/// Locally designated entities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostRoles {
    /// This client's own player, fixed by the handshake
    pub player: Option<EntityId>,

    /// Most recently created boss
    pub boss: Option<EntityId>,
}

impl HostRoles {
    /// Forget a role whose entity has been destroyed
    pub fn release(&mut self, entity: &EntityState) {
        let slot = match entity.class {
            EntityClass::Player => &mut self.player,
            EntityClass::Boss => &mut self.boss,
            _ => return,
        };
        if *slot == Some(entity.id) {
            tracing::debug!("Releasing host {} {}", entity.class, entity.id);
            *slot = None;
        }
    }
}

/// Capability set invoked by the reconciliation engine
pub trait ClassBehavior: Sync {
    fn on_create(&self, _entity: &EntityState, _hosts: &mut HostRoles) {}

    fn on_update(&self, entity: &mut EntityState, health: i32, position: Position) {
        entity.health = health;
        entity.position = position;
    }

    fn on_destroy(&self, entity: &EntityState, hosts: &mut HostRoles) {
        hosts.release(entity);
    }
}

struct PlayerBehavior;

impl ClassBehavior for PlayerBehavior {}

struct BossBehavior;

impl ClassBehavior for BossBehavior {
    fn on_create(&self, entity: &EntityState, hosts: &mut HostRoles) {
        // A newer boss replaces the reference; the older one stays registered.
        hosts.boss = Some(entity.id);
    }
}

struct ProjectileBehavior;

impl ClassBehavior for ProjectileBehavior {
    fn on_update(&self, entity: &mut EntityState, health: i32, position: Position) {
        // Heading is taken from the stored position before it is overwritten.
        entity.orientation = Some(entity.position.heading_to(position));
        entity.health = health;
        entity.position = position;
    }
}

/// Behavior for `class`
pub fn behavior_for(class: EntityClass) -> &'static dyn ClassBehavior {
    match class {
        EntityClass::Player => &PlayerBehavior,
        EntityClass::Boss => &BossBehavior,
        EntityClass::PlayerProjectile | EntityClass::BossProjectile => &ProjectileBehavior,
    }
}
