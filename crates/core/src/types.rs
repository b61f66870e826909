//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned entity ID (the wire `uuid` field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl EntityId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Class of a synchronized entity
///
/// Each class has its own registry; IDs are only unique within a class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityClass {
    Player,
    Boss,
    PlayerProjectile,
    BossProjectile,
}

impl EntityClass {
    /// All classes, in registry order
    pub const ALL: [EntityClass; 4] = [
        EntityClass::Player,
        EntityClass::Boss,
        EntityClass::PlayerProjectile,
        EntityClass::BossProjectile,
    ];

    /// Map a wire `type` string to a class
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "player" => Some(Self::Player),
            "boss" => Some(Self::Boss),
            "playerRocket" => Some(Self::PlayerProjectile),
            "bossRocket" => Some(Self::BossProjectile),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Boss => "boss",
            Self::PlayerProjectile => "playerRocket",
            Self::BossProjectile => "bossRocket",
        }
    }

    /// Projectiles carry an orientation derived from their last displacement
    pub fn is_projectile(&self) -> bool {
        matches!(self, Self::PlayerProjectile | Self::BossProjectile)
    }

    /// Dense index into per-class tables
    pub fn index(&self) -> usize {
        match self {
            Self::Player => 0,
            Self::Boss => 1,
            Self::PlayerProjectile => 2,
            Self::BossProjectile => 3,
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
