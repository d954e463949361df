//! Entity registry snapshot and restore support.
//!
//! A [`RegistrySnapshot`] captures the entity sequence together with the
//! identity counters, so that id allocation continues exactly where it left
//! off after a restore. Component data belongs to the collaborator and is not
//! part of the snapshot.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::{Entity, EntityRegistry};
use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Snapshot type
// ---------------------------------------------------------------------------

/// Serializable state of a world's entity registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Every record of the dense sequence, in id order.
    pub entities: Vec<Entity>,
    /// The next id that will be minted.
    pub next_id: u32,
    /// Entities on the recycle path.
    pub dead_count: u32,
}

impl RegistrySnapshot {
    pub fn to_json(&self) -> Result<String, EcsError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EcsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// BLAKE3 hex digest of the JSON encoding. Two snapshots with equal
    /// hashes describe the same registry state.
    pub fn state_hash(&self) -> Result<String, EcsError> {
        let bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    /// Check the snapshot describes a registry that could have been captured.
    fn validate(&self) -> Result<(), EcsError> {
        if let Some((index, entity)) = self
            .entities
            .iter()
            .enumerate()
            .find(|(index, e)| e.id().index() != *index)
        {
            return Err(EcsError::InvalidSnapshot {
                details: format!("record {index} carries id {}", entity.id()),
            });
        }

        let len = self.entities.len();
        if (self.next_id as usize) < len {
            return Err(EcsError::InvalidSnapshot {
                details: format!("next_id {} is below the sequence length {len}", self.next_id),
            });
        }

        let dead = self.entities.iter().filter(|e| !e.is_alive()).count();
        if self.dead_count as usize > dead {
            return Err(EcsError::InvalidSnapshot {
                details: format!(
                    "dead_count {} exceeds the {dead} dead records",
                    self.dead_count
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// World snapshot/restore impl
// ---------------------------------------------------------------------------

impl<C> World<C> {
    fn ensure_settled(&self) -> Result<(), EcsError> {
        if self.queue.is_empty() {
            return Ok(());
        }
        Err(EcsError::PendingMutations {
            systems: self.queue.systems.additions() + self.queue.systems.removals(),
            entities: self.queue.entities.additions() + self.queue.entities.removals(),
        })
    }

    /// Capture the entity registry.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::PendingMutations`] if a refresh is outstanding.
    pub fn capture_snapshot(&self) -> Result<RegistrySnapshot, EcsError> {
        self.ensure_settled()?;
        Ok(RegistrySnapshot {
            entities: self.entities.records().to_vec(),
            next_id: self.entities.next_id(),
            dead_count: self.entities.dead_count(),
        })
    }

    /// Replace the entity registry with `snapshot`.
    ///
    /// Registered systems are told that every entity they currently observe
    /// was removed, then that every alive entity of the snapshot was added,
    /// exactly as a refresh would.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::PendingMutations`] if a refresh is outstanding and
    /// [`EcsError::InvalidSnapshot`] if the snapshot is inconsistent. The world
    /// is unchanged on error.
    pub fn restore_from_snapshot(&mut self, snapshot: &RegistrySnapshot) -> Result<(), EcsError> {
        self.ensure_settled()?;
        snapshot.validate()?;

        for entity in self.entities.records().iter().filter(|e| e.is_alive()) {
            self.systems.notify_removed(entity);
        }

        self.entities = EntityRegistry::from_parts(
            snapshot.entities.clone(),
            snapshot.next_id,
            snapshot.dead_count,
        );

        for entity in self.entities.records().iter().filter(|e| e.is_alive()) {
            self.systems.notify_added(entity);
        }

        debug!(
            world = %self.id,
            entities = snapshot.entities.len(),
            next_id = snapshot.next_id,
            dead_count = snapshot.dead_count,
            "entity registry restored"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
