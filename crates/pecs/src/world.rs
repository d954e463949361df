//! The [`World`] is the top-level container of the ECS. It owns the entity
//! registry, the registered systems, the pending mutation queues, the
//! collaborator's component storage and the world metrics.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::WorldConfig;
use crate::context::SystemContext;
use crate::entity::{Entity, EntityId, EntityRegistry};
use crate::metrics::{MetricsSnapshot, WorldMetrics};
use crate::queue::MutationQueue;
use crate::system::{System, SystemRef, SystemRegistry};

// ---------------------------------------------------------------------------
// WorldId
// ---------------------------------------------------------------------------

static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique identifier of a world. Systems hold one as their
/// back-reference while attached.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldId(u64);

impl WorldId {
    pub(crate) fn next() -> Self {
        Self(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorldId({})", self.0)
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The ECS world, generic over the collaborator's component storage `C`.
///
/// All structural operations are deferred: entity registrations and kills,
/// system registrations and removals are queued and applied by
/// [`refresh`](Self::refresh), which [`update`](Self::update) runs first.
///
/// ```
/// use pecs::prelude::*;
///
/// const TAG: Mask = Mask::bit(0);
///
/// #[derive(Default)]
/// struct Counter {
///     seen: usize,
/// }
///
/// impl System for Counter {
///     fn mask(&self) -> Mask {
///         TAG
///     }
///
///     fn on_entity_add(&mut self, _entity: &Entity) {
///         self.seen += 1;
///     }
/// }
///
/// let mut world = World::new();
/// let counter = world.register_system(&SystemRef::new(Counter::default()));
///
/// let mut e = world.allocate_entity();
/// e.insert_mask(TAG);
/// world.register_entity(e);
/// assert_eq!(counter.borrow().seen, 0);
///
/// world.refresh();
/// assert_eq!(counter.borrow().seen, 1);
/// ```
pub struct World<C = ()> {
    pub(crate) id: WorldId,
    pub(crate) config: WorldConfig,
    pub(crate) entities: EntityRegistry,
    pub(crate) systems: SystemRegistry<C>,
    pub(crate) queue: MutationQueue<C>,
    pub(crate) components: C,
    pub(crate) metrics: WorldMetrics,
    /// Kills requested by systems during the current dispatch.
    deferred_kills: Vec<EntityId>,
}

impl World {
    /// A world without component storage.
    pub fn new() -> Self {
        Self::with_components(())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> World<C> {
    /// A world over the given component storage, with the default config.
    pub fn with_components(components: C) -> Self {
        Self::with_config(components, WorldConfig::default())
    }

    pub fn with_config(components: C, config: WorldConfig) -> Self {
        let id = WorldId::next();
        debug!(world = %id, ?config, "world created");
        Self {
            id,
            entities: EntityRegistry::with_capacity(config.entity_capacity),
            systems: SystemRegistry::with_capacity(config.system_capacity),
            queue: MutationQueue::default(),
            components,
            metrics: WorldMetrics::default(),
            deferred_kills: Vec::new(),
            config,
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // -- entities -----------------------------------------------------------

    /// An entity ready for population, recycled if one is available.
    pub fn allocate_entity(&mut self) -> Entity {
        self.entities.allocate(&mut self.queue.entities)
    }

    /// Store `entity` and queue it for activation on the next refresh.
    pub fn register_entity(&mut self, entity: Entity) -> Entity {
        self.entities.register(entity, &mut self.queue.entities)
    }

    /// Queue `entity` for removal on the next refresh.
    ///
    /// Returns `false` if the request was ignored (already queued, already
    /// dead, or never registered).
    pub fn kill_entity(&mut self, entity: &Entity) -> bool {
        self.kill_entity_by_id(entity.id())
    }

    pub fn kill_entity_by_id(&mut self, id: EntityId) -> bool {
        self.entities.kill(id, &mut self.queue.entities)
    }

    /// Queue every stored entity for removal.
    ///
    /// Records that are already dead or already queued for removal are
    /// skipped, so each slot is counted in `dead_count` once. Unregistered
    /// handles in the sequence are given back.
    pub fn clear_entities(&mut self) {
        let mut killed = 0usize;
        for index in 0..self.entities.len() {
            if self
                .entities
                .kill(EntityId(index as u32), &mut self.queue.entities)
            {
                killed += 1;
            }
        }
        debug!(world = %self.id, killed, "all entities queued for removal");
    }

    /// The dense entity sequence, indexed by id.
    pub fn entities(&self) -> &[Entity] {
        self.entities.records()
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Length of the entity sequence, dead records included.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn alive_count(&self) -> usize {
        self.entities.alive_count()
    }

    pub fn dead_count(&self) -> u32 {
        self.entities.dead_count()
    }

    pub fn next_id(&self) -> u32 {
        self.entities.next_id()
    }

    // -- systems ------------------------------------------------------------

    /// Queue `system` for attachment on the next refresh. Returns a clone of
    /// the handle.
    pub fn register_system<S>(&mut self, system: &SystemRef<S>) -> SystemRef<S>
    where
        S: System<C> + 'static,
    {
        self.queue.systems.push_add(system.erase());
        system.clone()
    }

    /// Queue `system` for detachment on the next refresh.
    pub fn deregister_system<S>(&mut self, system: &SystemRef<S>)
    where
        S: System<C> + 'static,
    {
        self.queue.systems.push_remove(system.erase());
    }

    /// Queue every registered system for detachment.
    pub fn clear_systems(&mut self) {
        for system in self.systems.iter() {
            self.queue.systems.push_remove(system.clone());
        }
        debug!(world = %self.id, systems = self.systems.len(), "all systems queued for removal");
    }

    /// Number of attached systems.
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    pub fn systems(&self) -> &SystemRegistry<C> {
        &self.systems
    }

    // -- ticking ------------------------------------------------------------

    /// Refresh, sort systems by priority, then run every active system.
    ///
    /// Kills requested by systems through [`SystemContext::kill`] are queued
    /// after the last system ran and applied by the next refresh.
    ///
    /// # Panics
    ///
    /// Panics if a registered system is currently borrowed through its
    /// [`SystemRef`].
    pub fn update(&mut self, dt: f64) {
        self.refresh();
        self.systems.sort_by_priority();
        self.metrics.ticks += 1;

        let entities = self.entities.records();
        for cell in self.systems.iter() {
            let mut system = cell.system_mut();
            if !system.active() {
                continue;
            }
            let mut ctx = SystemContext::new(
                self.id,
                entities,
                &mut self.components,
                &self.metrics,
                &mut self.deferred_kills,
            );
            system.update(dt, &mut ctx);
        }

        let mut kills = mem::take(&mut self.deferred_kills);
        for id in kills.drain(..) {
            self.entities.kill(id, &mut self.queue.entities);
        }
        self.deferred_kills = kills;
    }

    // -- queue & storage ----------------------------------------------------

    pub fn queue(&self) -> &MutationQueue<C> {
        &self.queue
    }

    pub fn has_pending_mutations(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn components(&self) -> &C {
        &self.components
    }

    /// Component storage, for writing data before an entity is registered.
    pub fn components_mut(&mut self) -> &mut C {
        &mut self.components
    }

    // -- metrics ------------------------------------------------------------

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.entities.recycle_faults())
    }

    /// Zero the visited/skipped counters of matching iteration.
    pub fn reset_skip_counters(&self) {
        self.metrics.reset_iteration_counters();
    }
}

impl<C> fmt::Debug for World<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("entities", &self.entities.len())
            .field("dead_count", &self.entities.dead_count())
            .field("systems", &self.systems.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
