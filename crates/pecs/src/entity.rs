//! Entity identifiers, records and the entity registry.
//!
//! An [`EntityId`] is a dense 32-bit index into the world's entity sequence.
//! Ids are minted monotonically and recycled once their entity has been
//! killed, so collaborator storage indexed by id stays compact.
//!
//! The [`EntityRegistry`] never changes liveness on its own: registration and
//! kills are only *queued* here and take effect when the world refreshes.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::mask::Mask;
use crate::queue::{EntityQueue, PendingRemoval};

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A dense entity index.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub(crate) u32);

impl EntityId {
    /// Reconstruct from a raw `u32`.
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw `u32` representation.
    #[inline]
    pub fn to_raw(self) -> u32 {
        self.0
    }

    /// The id as a `usize`, for indexing per-entity storage.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An entity record: identity, liveness and capability mask.
///
/// Entities are plain values. The handle returned by
/// [`World::allocate_entity`](crate::world::World::allocate_entity) is
/// populated by the caller (component data written, mask bits set) and then
/// handed back through
/// [`World::register_entity`](crate::world::World::register_entity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    id: EntityId,
    alive: bool,
    mask: Mask,
}

impl Entity {
    /// A freshly minted record: not alive, empty mask.
    #[inline]
    pub(crate) fn minted(id: EntityId) -> Self {
        Self {
            id,
            alive: false,
            mask: Mask::EMPTY,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_state(id: EntityId, alive: bool, mask: Mask) -> Self {
        Self { id, alive, mask }
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Whether the entity has been activated by a refresh and not reaped since.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    #[inline]
    pub fn mask(&self) -> Mask {
        self.mask
    }

    /// Returns `true` if the entity carries every bit of `mask`.
    #[inline]
    pub fn has(&self, mask: Mask) -> bool {
        self.mask.contains(mask)
    }

    /// Add capability bits to this handle.
    #[inline]
    pub fn insert_mask(&mut self, mask: Mask) {
        self.mask |= mask;
    }

    /// Clear capability bits from this handle.
    #[inline]
    pub fn remove_mask(&mut self, mask: Mask) {
        self.mask &= !mask;
    }

    /// Replace the whole capability mask of this handle.
    #[inline]
    pub fn set_mask(&mut self, mask: Mask) {
        self.mask = mask;
    }
}

// ---------------------------------------------------------------------------
// Slot bookkeeping
// ---------------------------------------------------------------------------

/// Per-slot lifecycle flags that are not part of the public record.
#[derive(Debug, Clone, Copy, Default)]
struct SlotFlags {
    /// Id sits in the activation queue.
    pending_add: bool,
    /// Id sits in the removal queue.
    pending_remove: bool,
    /// Handed out by allocation (or skipped by an out-of-order registration)
    /// and not registered yet.
    claimed: bool,
    /// Reused straight from the removal queue. Holds the mask systems
    /// observed on the previous occupant, which is still alive until the
    /// replacement is activated or killed.
    recycled: Option<Mask>,
}

impl SlotFlags {
    #[inline]
    fn is_vacant(self) -> bool {
        !self.pending_add && !self.pending_remove && !self.claimed
    }
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// Owns the dense entity sequence and the identity counters.
///
/// `dead_count` tracks how many entities are on the recycle path: queued for
/// removal but not yet reaped, or reaped and not yet claimed again. While it
/// is non-zero, [`allocate`](Self::allocate) reuses an id instead of minting
/// a new one.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    records: Vec<Entity>,
    flags: Vec<SlotFlags>,
    next_id: u32,
    dead_count: u32,
    /// No slot below this index is recyclable.
    scan_hint: usize,
    recycle_faults: u64,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with room for `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            flags: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Return an entity ready for population.
    ///
    /// Reuse order: ids killed since the last refresh first, then the lowest
    /// dead slot in the sequence. A fresh id is minted when nothing is on the
    /// recycle path, or when `dead_count` disagrees with the records (counted
    /// in [`recycle_faults`](Self::recycle_faults)).
    pub fn allocate(&mut self, queue: &mut EntityQueue) -> Entity {
        if self.dead_count == 0 {
            return self.mint();
        }

        while let Some(removal) = queue.take_recyclable() {
            let Some(flags) = self.flags.get_mut(removal.id.index()) else {
                continue;
            };
            flags.pending_remove = false;
            flags.claimed = true;
            flags.recycled = Some(removal.mask);
            return self.reclaim(removal.id);
        }

        if let Some(index) = self.find_vacant_dead() {
            self.flags[index].claimed = true;
            return self.reclaim(EntityId(index as u32));
        }

        self.recycle_faults += 1;
        if cfg!(debug_assertions) {
            warn!(
                dead_count = self.dead_count,
                "dead_count is non-zero but no dead entity was found; minting a fresh id"
            );
        }
        self.mint()
    }

    fn mint(&mut self) -> Entity {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        trace!(entity = %id, "minted entity id");
        Entity::minted(id)
    }

    fn reclaim(&mut self, id: EntityId) -> Entity {
        self.dead_count -= 1;
        self.records[id.index()].mask = Mask::EMPTY;
        trace!(entity = %id, dead_count = self.dead_count, "recycled entity id");
        Entity::minted(id)
    }

    /// Linear scan for the first dead slot nobody holds a claim on.
    fn find_vacant_dead(&mut self) -> Option<usize> {
        let start = self.scan_hint.min(self.records.len());
        let found = self.records[start..]
            .iter()
            .zip(&self.flags[start..])
            .position(|(record, flags)| !record.alive && flags.is_vacant())
            .map(|offset| start + offset);
        self.scan_hint = found.map_or(self.records.len(), |index| index + 1);
        found
    }

    /// Store `entity` at its id and queue it for activation.
    ///
    /// The stored liveness is left untouched; only a refresh activates the
    /// entity. Registering the same handle twice before a refresh queues it
    /// once. A handle whose slot has since been killed or recycled by someone
    /// else is ignored.
    pub fn register(&mut self, entity: Entity, queue: &mut EntityQueue) -> Entity {
        let id = entity.id;
        let index = id.index();

        if index >= self.records.len() {
            // Ids skipped here were minted for callers that have not
            // registered them yet.
            let start = self.records.len() as u32;
            self.records
                .extend((start..=id.0).map(|raw| Entity::minted(EntityId(raw))));
            self.flags.resize(
                index + 1,
                SlotFlags {
                    claimed: true,
                    ..SlotFlags::default()
                },
            );
            self.next_id = self.next_id.max(id.0 + 1);
        }

        let record = &mut self.records[index];
        let flags = &mut self.flags[index];

        let stale =
            !flags.claimed && !flags.pending_add && (flags.pending_remove || !record.alive);
        if stale {
            debug!(entity = %id, "ignoring registration of a stale entity handle");
            return entity;
        }

        flags.claimed = false;
        record.mask = entity.mask;
        if !flags.pending_add {
            flags.pending_add = true;
            queue.push_add(id);
        }
        trace!(entity = %id, mask = ?entity.mask, "entity queued for activation");
        entity
    }

    /// Queue the entity at `id` for removal on the next refresh.
    ///
    /// Returns `true` if the entity entered the recycle path. Killing an
    /// entity that is already queued for removal, already dead, or was never
    /// allocated does nothing. Killing a handle that was allocated but not
    /// registered gives its slot back.
    pub fn kill(&mut self, id: EntityId, queue: &mut EntityQueue) -> bool {
        let index = id.index();
        let (Some(record), Some(flags)) = (self.records.get(index), self.flags.get_mut(index))
        else {
            debug!(entity = %id, "ignoring kill of an unregistered entity");
            return false;
        };

        if flags.pending_remove {
            return false;
        }

        if flags.claimed {
            flags.claimed = false;
            self.dead_count += 1;
            match flags.recycled.take() {
                // The previous occupant was never reaped; queue it again.
                Some(mask) => {
                    flags.pending_remove = true;
                    queue.push_remove(PendingRemoval { id, mask });
                }
                None => self.scan_hint = self.scan_hint.min(index),
            }
            trace!(entity = %id, dead_count = self.dead_count, "unregistered entity handed back");
            return true;
        }

        let was_pending_add = std::mem::replace(&mut flags.pending_add, false);
        if !record.alive && !was_pending_add {
            return false;
        }

        let mask = flags.recycled.take().unwrap_or(record.mask);
        self.dead_count += 1;
        flags.pending_remove = true;
        queue.push_remove(PendingRemoval { id, mask });
        trace!(entity = %id, dead_count = self.dead_count, "entity queued for removal");
        true
    }

    /// Finalize a queued removal. Returns the entity as systems observed it
    /// if it was alive, so the caller can notify them.
    pub(crate) fn reap(&mut self, removal: PendingRemoval) -> Option<Entity> {
        let index = removal.id.index();
        let record = self.records.get_mut(index)?;
        let was_alive = std::mem::replace(&mut record.alive, false);
        if let Some(flags) = self.flags.get_mut(index) {
            flags.pending_remove = false;
            if flags.is_vacant() {
                self.scan_hint = self.scan_hint.min(index);
            }
        }
        was_alive.then_some(Entity {
            id: removal.id,
            alive: false,
            mask: removal.mask,
        })
    }

    /// Finalize a queued activation. Returns the live record if it was not
    /// already alive, or if it replaces an occupant reused from the removal
    /// queue, so the caller can notify systems.
    pub(crate) fn activate(&mut self, id: EntityId) -> Option<Entity> {
        let index = id.index();
        let flags = self.flags.get_mut(index)?;
        if !flags.pending_add {
            // Cancelled by a kill, or already handled earlier in this queue.
            return None;
        }
        flags.pending_add = false;
        let replaced = flags.recycled.take().is_some();
        let record = self.records.get_mut(index)?;
        let was_alive = std::mem::replace(&mut record.alive, true);
        (!was_alive || replaced).then_some(*record)
    }

    /// Rebuild a registry from raw records and counters. The caller has
    /// validated them.
    pub(crate) fn from_parts(records: Vec<Entity>, next_id: u32, dead_count: u32) -> Self {
        let flags = vec![SlotFlags::default(); records.len()];
        Self {
            records,
            flags,
            next_id,
            dead_count,
            scan_hint: 0,
            recycle_faults: 0,
        }
    }

    /// The dense entity sequence, indexed by id.
    #[inline]
    pub fn records(&self) -> &[Entity] {
        &self.records
    }

    #[inline]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.records.get(id.index())
    }

    /// Length of the entity sequence (alive or not).
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.records.iter().filter(|e| e.alive).count()
    }

    #[inline]
    pub fn dead_count(&self) -> u32 {
        self.dead_count
    }

    /// The next id that will be minted.
    #[inline]
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// How many allocations fell back to minting because `dead_count` was
    /// inconsistent with the records.
    #[inline]
    pub fn recycle_faults(&self) -> u64 {
        self.recycle_faults
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
