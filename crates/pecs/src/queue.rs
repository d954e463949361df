//! Deferred mutation queues and the refresh protocol.
//!
//! Structural changes never happen while systems iterate. Entity
//! registrations and kills, and system registrations and removals, are
//! buffered in a [`MutationQueue`] and applied by [`World::refresh`] in four
//! phases:
//!
//! 1. system removals (detach hooks, back-reference cleared)
//! 2. system additions (back-reference set, attach hooks)
//! 3. entity removals (liveness cleared, remove notifications)
//! 4. entity additions (liveness set, add notifications)
//!
//! Each phase completes before the next one starts, and notifications go to
//! the system set as it exists during that phase: systems added in phase 2
//! already see the entity changes of phases 3 and 4.
//!
//! An id killed and reused before the refresh leaves the removal queue when
//! it is reused, so systems only see the add of the new occupant.

use std::collections::VecDeque;
use std::mem;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::context::WorldView;
use crate::entity::EntityId;
use crate::mask::Mask;
use crate::system::ErasedSystem;
use crate::world::World;

// ---------------------------------------------------------------------------
// Entity queues
// ---------------------------------------------------------------------------

/// An entity queued for removal, with the mask it carried when killed.
///
/// The mask is kept so that remove notifications describe the entity the
/// systems actually observed, even if the id is recycled, repopulated and
/// killed again before the refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRemoval {
    pub id: EntityId,
    pub mask: Mask,
}

/// Pending entity activations and removals.
#[derive(Debug, Default)]
pub struct EntityQueue {
    to_add: Vec<EntityId>,
    to_remove: VecDeque<PendingRemoval>,
}

impl EntityQueue {
    pub(crate) fn push_add(&mut self, id: EntityId) {
        self.to_add.push(id);
    }

    pub(crate) fn push_remove(&mut self, removal: PendingRemoval) {
        self.to_remove.push_back(removal);
    }

    /// Take the oldest queued removal so its id can be reused this tick.
    pub(crate) fn take_recyclable(&mut self) -> Option<PendingRemoval> {
        self.to_remove.pop_front()
    }

    pub(crate) fn take_removals(&mut self) -> VecDeque<PendingRemoval> {
        mem::take(&mut self.to_remove)
    }

    pub(crate) fn take_additions(&mut self) -> Vec<EntityId> {
        mem::take(&mut self.to_add)
    }

    /// Number of queued activations.
    pub fn additions(&self) -> usize {
        self.to_add.len()
    }

    /// Number of queued removals.
    pub fn removals(&self) -> usize {
        self.to_remove.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

// ---------------------------------------------------------------------------
// System queues
// ---------------------------------------------------------------------------

/// Pending system registrations and removals.
pub struct SystemQueue<C> {
    to_add: Vec<ErasedSystem<C>>,
    to_remove: Vec<ErasedSystem<C>>,
}

impl<C> Default for SystemQueue<C> {
    fn default() -> Self {
        Self {
            to_add: Vec::new(),
            to_remove: Vec::new(),
        }
    }
}

impl<C> SystemQueue<C> {
    pub(crate) fn push_add(&mut self, system: ErasedSystem<C>) {
        self.to_add.push(system);
    }

    pub(crate) fn push_remove(&mut self, system: ErasedSystem<C>) {
        self.to_remove.push(system);
    }

    pub fn additions(&self) -> usize {
        self.to_add.len()
    }

    pub fn removals(&self) -> usize {
        self.to_remove.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

// ---------------------------------------------------------------------------
// MutationQueue
// ---------------------------------------------------------------------------

/// All buffered structural changes of a world.
pub struct MutationQueue<C> {
    pub(crate) entities: EntityQueue,
    pub(crate) systems: SystemQueue<C>,
}

impl<C> Default for MutationQueue<C> {
    fn default() -> Self {
        Self {
            entities: EntityQueue::default(),
            systems: SystemQueue::default(),
        }
    }
}

impl<C> MutationQueue<C> {
    pub fn entities(&self) -> &EntityQueue {
        &self.entities
    }

    pub fn systems(&self) -> &SystemQueue<C> {
        &self.systems
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.systems.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Refresh protocol
// ---------------------------------------------------------------------------

/// What one [`World::refresh`] applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub systems_removed: usize,
    pub systems_added: usize,
    /// Live entities reaped (remove notifications were sent).
    pub entities_removed: usize,
    /// Entities activated (add notifications were sent).
    pub entities_added: usize,
}

impl<C> World<C> {
    /// Apply every queued structural change.
    ///
    /// # Panics
    ///
    /// Panics if a registered system is currently borrowed through its
    /// [`SystemRef`](crate::system::SystemRef).
    pub fn refresh(&mut self) -> RefreshReport {
        let mut report = RefreshReport::default();
        self.metrics.refreshes += 1;

        // Phase 1: system removals.
        for system in mem::take(&mut self.queue.systems.to_remove) {
            if !self.systems.remove(&system) {
                trace!(world = %self.id, "queued system removal ignored: not registered");
                continue;
            }
            let view = WorldView::new(self.id, self.entities.records(), &self.components);
            system.system_mut().on_world_detach(&view);
            system.detach();
            report.systems_removed += 1;
        }

        // Phase 2: system additions.
        for system in mem::take(&mut self.queue.systems.to_add) {
            if self.systems.contains(&system) {
                trace!(world = %self.id, "queued system addition ignored: already registered");
                continue;
            }
            if let Some(other) = system.world() {
                warn!(
                    world = %self.id,
                    attached_to = %other,
                    "system is attached to another world; registration skipped"
                );
                continue;
            }
            self.systems.insert(Rc::clone(&system));
            system.attach(self.id);
            let view = WorldView::new(self.id, self.entities.records(), &self.components);
            system.system_mut().on_world_attach(&view);
            report.systems_added += 1;
        }

        // Phase 3: entity removals.
        for removal in self.queue.entities.take_removals() {
            if let Some(entity) = self.entities.reap(removal) {
                self.systems.notify_removed(&entity);
                report.entities_removed += 1;
            }
        }

        // Phase 4: entity additions.
        for id in self.queue.entities.take_additions() {
            if let Some(entity) = self.entities.activate(id) {
                self.systems.notify_added(&entity);
                report.entities_added += 1;
            }
        }

        debug!(
            world = %self.id,
            systems_removed = report.systems_removed,
            systems_added = report.systems_added,
            entities_removed = report.entities_removed,
            entities_added = report.entities_added,
            dead_count = self.entities.dead_count(),
            "refresh applied"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::context::SystemContext;
    use crate::entity::Entity;
    use crate::system::{System, SystemRef};

    const INFO: Mask = Mask::bit(0);
    const TRANSFORM: Mask = Mask::bit(3);

    type Log = Rc<RefCell<Vec<String>>>;

    /// Records every hook call into a shared log.
    struct Recorder {
        name: &'static str,
        mask: Mask,
        log: Log,
    }

    impl Recorder {
        fn new(name: &'static str, mask: Mask, log: &Log) -> SystemRef<Recorder> {
            SystemRef::new(Recorder {
                name,
                mask,
                log: Rc::clone(log),
            })
        }

        fn push(&self, event: String) {
            self.log.borrow_mut().push(format!("{}:{}", self.name, event));
        }
    }

    impl System for Recorder {
        fn mask(&self) -> Mask {
            self.mask
        }

        fn on_world_attach(&mut self, _world: &WorldView<'_, ()>) {
            self.push("attach".to_owned());
        }

        fn on_world_detach(&mut self, _world: &WorldView<'_, ()>) {
            self.push("detach".to_owned());
        }

        fn on_entity_add(&mut self, entity: &Entity) {
            self.push(format!("add{}", entity.id()));
        }

        fn on_entity_remove(&mut self, entity: &Entity) {
            self.push(format!("remove{}", entity.id()));
        }

        fn update(&mut self, _dt: f64, _ctx: &mut SystemContext<'_, ()>) {
            self.push("update".to_owned());
        }
    }

    fn spawn(world: &mut World, mask: Mask) -> Entity {
        let mut e = world.allocate_entity();
        e.insert_mask(mask);
        world.register_entity(e)
    }

    #[test]
    fn detach_fires_before_attach() {
        let log: Log = Rc::default();
        let mut world = World::new();
        let old = Recorder::new("old", Mask::EMPTY, &log);
        let new = Recorder::new("new", Mask::EMPTY, &log);

        world.register_system(&old);
        world.refresh();
        log.borrow_mut().clear();

        // Queue the addition first; the removal still runs first.
        world.register_system(&new);
        world.deregister_system(&old);
        world.refresh();

        assert_eq!(*log.borrow(), vec!["old:detach", "new:attach"]);
        assert_eq!(old.world(), None);
        assert_eq!(new.world(), Some(world.id()));
    }

    #[test]
    fn systems_added_this_refresh_see_new_entities() {
        let log: Log = Rc::default();
        let mut world = World::new();
        let sys = Recorder::new("s", INFO, &log);

        let e = spawn(&mut world, INFO);
        world.register_system(&sys);
        world.refresh();

        assert_eq!(*log.borrow(), vec!["s:attach".to_owned(), format!("s:add{}", e.id())]);
    }

    #[test]
    fn systems_removed_this_refresh_miss_entity_changes() {
        let log: Log = Rc::default();
        let mut world = World::new();
        let sys = Recorder::new("s", INFO, &log);
        let e = spawn(&mut world, INFO);
        world.register_system(&sys);
        world.refresh();
        log.borrow_mut().clear();

        world.kill_entity(&e);
        world.deregister_system(&sys);
        world.refresh();

        assert_eq!(*log.borrow(), vec!["s:detach"]);
    }

    #[test]
    fn recycled_id_sees_single_add() {
        let log: Log = Rc::default();
        let mut world = World::new();
        let sys = Recorder::new("s", INFO | TRANSFORM, &log);
        world.register_system(&sys);
        let e = spawn(&mut world, INFO | TRANSFORM);
        world.refresh();
        log.borrow_mut().clear();

        world.kill_entity(&e);
        let reused = spawn(&mut world, INFO | TRANSFORM);
        assert_eq!(reused.id(), e.id());
        assert_eq!(world.queue().entities().removals(), 0);
        let report = world.refresh();

        let id = e.id();
        assert_eq!(*log.borrow(), vec![format!("s:add{id}")]);
        assert_eq!(report.entities_removed, 0);
        assert_eq!(report.entities_added, 1);
        assert!(world.entity(id).unwrap().is_alive());
        assert_eq!(world.dead_count(), 0);
    }

    #[test]
    fn killing_a_reused_id_reports_the_observed_mask() {
        let log: Log = Rc::default();
        let mut world = World::new();
        let transforms = Recorder::new("t", TRANSFORM, &log);
        world.register_system(&transforms);
        let e = spawn(&mut world, INFO | TRANSFORM);
        world.refresh();
        log.borrow_mut().clear();

        // The replacement no longer matches; the old occupant did.
        world.kill_entity(&e);
        let reused = spawn(&mut world, INFO);
        assert_eq!(reused.id(), e.id());
        assert!(world.kill_entity(&reused));
        let report = world.refresh();

        assert_eq!(*log.borrow(), vec![format!("t:remove{}", e.id())]);
        assert_eq!(report.entities_added, 0);
        assert!(!world.entity(e.id()).unwrap().is_alive());
        assert_eq!(world.dead_count(), 1);
    }

    #[test]
    fn killing_an_unregistered_reuse_gives_the_slot_back() {
        let log: Log = Rc::default();
        let mut world = World::new();
        world.register_system(&Recorder::new("s", INFO, &log));
        let e = spawn(&mut world, INFO);
        world.refresh();
        log.borrow_mut().clear();

        world.kill_entity(&e);
        let reserved = world.allocate_entity();
        assert_eq!(reserved.id(), e.id());
        assert!(world.kill_entity(&reserved));
        assert_eq!(world.dead_count(), 1);
        world.refresh();

        assert_eq!(*log.borrow(), vec![format!("s:remove{}", e.id())]);
        assert_eq!(world.allocate_entity().id(), e.id());
        assert_eq!(world.dead_count(), 0);
    }

    #[test]
    fn duplicate_system_registration_attaches_once() {
        let log: Log = Rc::default();
        let mut world = World::new();
        let sys = Recorder::new("s", Mask::EMPTY, &log);
        world.register_system(&sys);
        world.register_system(&sys);
        let report = world.refresh();
        world.register_system(&sys);
        world.refresh();

        assert_eq!(report.systems_added, 1);
        assert_eq!(world.system_count(), 1);
        assert_eq!(*log.borrow(), vec!["s:attach"]);
    }

    #[test]
    fn deregistering_unregistered_system_is_ignored() {
        let log: Log = Rc::default();
        let mut world = World::new();
        let sys = Recorder::new("s", Mask::EMPTY, &log);
        world.deregister_system(&sys);
        let report = world.refresh();
        assert_eq!(report, RefreshReport::default());
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn system_attached_elsewhere_is_skipped() {
        let log: Log = Rc::default();
        let mut first = World::new();
        let mut second = World::new();
        let sys = Recorder::new("s", Mask::EMPTY, &log);

        first.register_system(&sys);
        first.refresh();
        second.register_system(&sys);
        second.refresh();

        assert_eq!(second.system_count(), 0);
        assert_eq!(sys.world(), Some(first.id()));
    }

    #[test]
    fn queues_are_empty_after_refresh() {
        let mut world = World::new();
        let e = spawn(&mut world, INFO);
        assert!(world.has_pending_mutations());
        world.refresh();
        assert!(!world.has_pending_mutations());
        world.kill_entity(&e);
        assert_eq!(world.queue().entities().removals(), 1);
        world.refresh();
        assert!(world.queue().is_empty());
    }
}
