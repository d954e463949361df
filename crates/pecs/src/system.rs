//! Systems and the system registry.
//!
//! A [`System`] declares a capability [`Mask`], a priority and an active flag,
//! and receives lifecycle hooks from the world. Every hook has a no-op
//! default, so a system only implements what it needs.
//!
//! Systems are owned by the caller. [`SystemRef`] is the shared handle the
//! caller keeps and passes to
//! [`World::register_system`](crate::world::World::register_system); the
//! world only holds a type-erased clone of it. The handle also carries the
//! system's back-reference to the world it is attached to, which is set in the
//! attach phase of a refresh and cleared in the detach phase.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use crate::context::{SystemContext, WorldView};
use crate::entity::Entity;
use crate::mask::Mask;
use crate::world::WorldId;

// ---------------------------------------------------------------------------
// System trait
// ---------------------------------------------------------------------------

/// A unit of per-tick behavior over entities matching [`mask`](Self::mask).
///
/// `C` is the component storage context of the world the system runs in.
pub trait System<C = ()> {
    /// Dispatch order within a tick; lower runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Inactive systems are skipped by `update` but stay registered and keep
    /// receiving entity notifications.
    fn active(&self) -> bool {
        true
    }

    /// Capabilities an entity must carry to be observed by this system.
    fn mask(&self) -> Mask {
        Mask::EMPTY
    }

    /// Called after the system joined the world.
    fn on_world_attach(&mut self, _world: &WorldView<'_, C>) {}

    /// Called after the system left the world, before its back-reference is
    /// cleared.
    fn on_world_detach(&mut self, _world: &WorldView<'_, C>) {}

    /// A matching entity became alive.
    fn on_entity_add(&mut self, _entity: &Entity) {}

    /// A matching entity was reaped. `entity` carries the mask it had when it
    /// was killed.
    fn on_entity_remove(&mut self, _entity: &Entity) {}

    /// Per-tick work. Called only while [`active`](Self::active) is true.
    fn update(&mut self, _dt: f64, _ctx: &mut SystemContext<'_, C>) {}
}

// ---------------------------------------------------------------------------
// SystemCell / SystemRef
// ---------------------------------------------------------------------------

/// Shared storage behind a [`SystemRef`]: the system plus its back-reference.
pub(crate) struct SystemCell<S: ?Sized> {
    world: Cell<Option<WorldId>>,
    system: RefCell<S>,
}

impl<S: ?Sized> SystemCell<S> {
    #[inline]
    pub(crate) fn system(&self) -> Ref<'_, S> {
        self.system.borrow()
    }

    #[inline]
    pub(crate) fn system_mut(&self) -> RefMut<'_, S> {
        self.system.borrow_mut()
    }

    #[inline]
    pub(crate) fn world(&self) -> Option<WorldId> {
        self.world.get()
    }

    #[inline]
    pub(crate) fn attach(&self, world: WorldId) {
        self.world.set(Some(world));
    }

    #[inline]
    pub(crate) fn detach(&self) {
        self.world.set(None);
    }
}

/// The form in which a world stores its systems.
pub(crate) type ErasedSystem<C> = Rc<SystemCell<dyn System<C>>>;

/// Address of the shared cell, ignoring trait-object metadata.
#[inline]
fn cell_addr<S: ?Sized>(cell: &Rc<SystemCell<S>>) -> *const () {
    Rc::as_ptr(cell) as *const ()
}

/// Caller-owned handle to a system.
///
/// Cloning the handle shares the same system. Two handles are the same
/// system iff [`ptr_eq`](Self::ptr_eq) holds.
///
/// # Panics
///
/// The world borrows the system mutably while it runs hooks. Holding a
/// [`borrow`](Self::borrow) or [`borrow_mut`](Self::borrow_mut) guard across
/// `refresh` or `update` panics.
pub struct SystemRef<S> {
    cell: Rc<SystemCell<S>>,
}

impl<S> SystemRef<S> {
    pub fn new(system: S) -> Self {
        Self {
            cell: Rc::new(SystemCell {
                world: Cell::new(None),
                system: RefCell::new(system),
            }),
        }
    }

    pub fn borrow(&self) -> Ref<'_, S> {
        self.cell.system()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, S> {
        self.cell.system_mut()
    }

    /// The world this system is attached to, if any.
    pub fn world(&self) -> Option<WorldId> {
        self.cell.world()
    }

    pub fn is_attached(&self) -> bool {
        self.cell.world().is_some()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    pub(crate) fn erase<C>(&self) -> ErasedSystem<C>
    where
        S: System<C> + 'static,
    {
        self.cell.clone()
    }
}

impl<S> Clone for SystemRef<S> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<S> fmt::Debug for SystemRef<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemRef")
            .field("system", &std::any::type_name::<S>())
            .field("world", &self.cell.world())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SystemRegistry
// ---------------------------------------------------------------------------

/// The ordered collection of systems registered with a world.
///
/// Order is insertion order until [`sort_by_priority`](Self::sort_by_priority)
/// runs, which is a stable sort: systems of equal priority keep their
/// relative insertion order.
pub struct SystemRegistry<C> {
    systems: Vec<ErasedSystem<C>>,
}

impl<C> Default for SystemRegistry<C> {
    fn default() -> Self {
        Self {
            systems: Vec::new(),
        }
    }
}

impl<C> SystemRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            systems: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub(crate) fn contains(&self, system: &ErasedSystem<C>) -> bool {
        let addr = cell_addr(system);
        self.systems.iter().any(|s| cell_addr(s) == addr)
    }

    /// Append `system` unless it is already registered.
    pub(crate) fn insert(&mut self, system: ErasedSystem<C>) -> bool {
        if self.contains(&system) {
            return false;
        }
        self.systems.push(system);
        true
    }

    /// Remove `system`, keeping the order of the others.
    pub(crate) fn remove(&mut self, system: &ErasedSystem<C>) -> bool {
        let addr = cell_addr(system);
        match self.systems.iter().position(|s| cell_addr(s) == addr) {
            Some(index) => {
                self.systems.remove(index);
                true
            }
            None => false,
        }
    }

    /// Stable sort by ascending priority.
    pub fn sort_by_priority(&mut self) {
        self.systems.sort_by_key(|s| s.system().priority());
    }

    /// Current priorities in dispatch order.
    pub fn priorities(&self) -> Vec<i32> {
        self.systems.iter().map(|s| s.system().priority()).collect()
    }

    pub(crate) fn iter(&self) -> std::slice::Iter<'_, ErasedSystem<C>> {
        self.systems.iter()
    }

    /// Send `on_entity_add` to every system whose mask `entity` satisfies.
    pub(crate) fn notify_added(&self, entity: &Entity) {
        for cell in &self.systems {
            let mut system = cell.system_mut();
            if entity.has(system.mask()) {
                system.on_entity_add(entity);
            }
        }
    }

    /// Send `on_entity_remove` to every system whose mask `entity` satisfies.
    pub(crate) fn notify_removed(&self, entity: &Entity) {
        for cell in &self.systems {
            let mut system = cell.system_mut();
            if entity.has(system.mask()) {
                system.on_entity_remove(entity);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Prio(i32, &'static str);

    impl System for Prio {
        fn priority(&self) -> i32 {
            self.0
        }
    }

    #[test]
    fn insert_is_idempotent() {
        let mut reg = SystemRegistry::<()>::new();
        let a = SystemRef::new(Prio(0, "a"));
        assert!(reg.insert(a.erase()));
        assert!(!reg.insert(a.erase()));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn remove_keeps_order_of_others() {
        let mut reg = SystemRegistry::<()>::new();
        let a = SystemRef::new(Prio(1, "a"));
        let b = SystemRef::new(Prio(2, "b"));
        let c = SystemRef::new(Prio(3, "c"));
        for s in [&a, &b, &c] {
            reg.insert(s.erase());
        }
        assert!(reg.remove(&b.erase()));
        assert!(!reg.remove(&b.erase()));
        assert_eq!(reg.priorities(), vec![1, 3]);
    }

    #[test]
    fn priority_sort_is_stable() {
        let mut reg = SystemRegistry::<()>::new();
        let handles = [
            SystemRef::new(Prio(2, "first-two")),
            SystemRef::new(Prio(1, "one")),
            SystemRef::new(Prio(2, "second-two")),
            SystemRef::new(Prio(-5, "negative")),
        ];
        for h in &handles {
            reg.insert(h.erase());
        }
        reg.sort_by_priority();

        let order: Vec<&'static str> = reg
            .iter()
            .filter_map(|s| handles.iter().find(|h| cell_addr(&h.cell) == cell_addr(s)))
            .map(|h| h.borrow().1)
            .collect();
        assert_eq!(order, vec!["negative", "one", "first-two", "second-two"]);
    }

    #[test]
    fn handle_identity_and_back_reference() {
        let a = SystemRef::new(Prio(0, "a"));
        let a2 = a.clone();
        let b = SystemRef::new(Prio(0, "b"));
        assert!(a.ptr_eq(&a2));
        assert!(!a.ptr_eq(&b));

        assert!(!a.is_attached());
        let world = WorldId::next();
        a.cell.attach(world);
        assert_eq!(a2.world(), Some(world));
        a.cell.detach();
        assert!(!a2.is_attached());
    }
}
