//! Views of the world handed to system hooks.
//!
//! Hooks never receive the world itself, so they cannot change entity or
//! system membership while the world is iterating. [`WorldView`] is the
//! read-only view passed to attach/detach hooks; [`SystemContext`] is passed to
//! `update` and additionally grants mutable access to the component storage
//! and a deferred kill buffer.

use std::slice;

use crate::entity::{Entity, EntityId};
use crate::mask::{entity_matches, Mask};
use crate::metrics::WorldMetrics;
use crate::world::WorldId;

// ---------------------------------------------------------------------------
// WorldView
// ---------------------------------------------------------------------------

/// Read-only view of a world during a refresh.
pub struct WorldView<'w, C> {
    id: WorldId,
    entities: &'w [Entity],
    components: &'w C,
}

impl<'w, C> WorldView<'w, C> {
    pub(crate) fn new(id: WorldId, entities: &'w [Entity], components: &'w C) -> Self {
        Self {
            id,
            entities,
            components,
        }
    }

    pub fn id(&self) -> WorldId {
        self.id
    }

    pub fn entities(&self) -> &'w [Entity] {
        self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&'w Entity> {
        self.entities.get(id.index())
    }

    pub fn components(&self) -> &'w C {
        self.components
    }

    /// Alive entities carrying every bit of `mask`.
    pub fn matching(&self, mask: Mask) -> impl Iterator<Item = &'w Entity> {
        self.entities.iter().filter(move |e| entity_matches(e, mask))
    }
}

// ---------------------------------------------------------------------------
// SystemContext
// ---------------------------------------------------------------------------

/// Everything a system may touch from inside `update`.
///
/// The entity slice borrows from the world for `'w`, independently of the
/// context, so a system can iterate [`matching`](Self::matching) entities
/// while writing components through [`components_mut`](Self::components_mut):
///
/// ```
/// use pecs::prelude::*;
///
/// const HEALTH: Mask = Mask::bit(0);
///
/// struct Store {
///     health: ComponentVec<u32>,
/// }
///
/// struct Regen;
///
/// impl System<Store> for Regen {
///     fn mask(&self) -> Mask {
///         HEALTH
///     }
///
///     fn update(&mut self, _dt: f64, ctx: &mut SystemContext<'_, Store>) {
///         for entity in ctx.matching(HEALTH) {
///             ctx.components_mut().health[entity.id()] += 1;
///         }
///     }
/// }
///
/// let mut world = World::with_components(Store {
///     health: ComponentVec::new(HEALTH),
/// });
/// let mut e = world.allocate_entity();
/// world.components_mut().health.insert(&mut e, 10);
/// world.register_entity(e);
/// world.register_system(&SystemRef::new(Regen));
///
/// world.update(1.0);
/// assert_eq!(world.components().health[e.id()], 11);
/// ```
pub struct SystemContext<'w, C> {
    id: WorldId,
    entities: &'w [Entity],
    components: &'w mut C,
    metrics: &'w WorldMetrics,
    kills: &'w mut Vec<EntityId>,
}

impl<'w, C> SystemContext<'w, C> {
    pub(crate) fn new(
        id: WorldId,
        entities: &'w [Entity],
        components: &'w mut C,
        metrics: &'w WorldMetrics,
        kills: &'w mut Vec<EntityId>,
    ) -> Self {
        Self {
            id,
            entities,
            components,
            metrics,
            kills,
        }
    }

    pub fn world_id(&self) -> WorldId {
        self.id
    }

    /// The full entity sequence, dead records included.
    pub fn entities(&self) -> &'w [Entity] {
        self.entities
    }

    pub fn entity(&self, id: EntityId) -> Option<&'w Entity> {
        self.entities.get(id.index())
    }

    pub fn components(&self) -> &C {
        self.components
    }

    pub fn components_mut(&mut self) -> &mut C {
        self.components
    }

    /// Iterate the alive entities that carry every bit of `mask`, counting
    /// visited and skipped records in the world metrics.
    pub fn matching(&self, mask: Mask) -> Matching<'w> {
        Matching {
            iter: self.entities.iter(),
            mask,
            metrics: self.metrics,
        }
    }

    /// Kill `entity` once every system has finished this tick. The removal is
    /// applied by the following refresh.
    pub fn kill(&mut self, entity: &Entity) {
        self.kills.push(entity.id());
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Iterator returned by [`SystemContext::matching`].
pub struct Matching<'w> {
    iter: slice::Iter<'w, Entity>,
    mask: Mask,
    metrics: &'w WorldMetrics,
}

impl<'w> Iterator for Matching<'w> {
    type Item = &'w Entity;

    fn next(&mut self) -> Option<Self::Item> {
        for entity in self.iter.by_ref() {
            if entity_matches(entity, self.mask) {
                self.metrics.record_visit();
                return Some(entity);
            }
            self.metrics.record_skip();
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.iter.size_hint().1)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const A: Mask = Mask::bit(0);
    const B: Mask = Mask::bit(1);

    fn entity(id: u32, alive: bool, mask: Mask) -> Entity {
        Entity::with_state(EntityId(id), alive, mask)
    }

    #[test]
    fn matching_skips_dead_and_unmatched_records() {
        let records = vec![
            entity(0, true, A | B),
            entity(1, false, A | B),
            entity(2, true, A),
            entity(3, true, B),
        ];
        let metrics = WorldMetrics::default();
        let mut comps = ();
        let mut kills = Vec::new();
        let ctx = SystemContext::new(WorldId::next(), &records, &mut comps, &metrics, &mut kills);

        let ids: Vec<u32> = ctx.matching(A).map(|e| e.id().to_raw()).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(metrics.entities_visited.get(), 2);
        assert_eq!(metrics.entities_skipped.get(), 2);
    }

    #[test]
    fn kill_is_buffered() {
        let records = vec![entity(0, true, A)];
        let metrics = WorldMetrics::default();
        let mut comps = ();
        let mut kills = Vec::new();
        {
            let mut ctx =
                SystemContext::new(WorldId::next(), &records, &mut comps, &metrics, &mut kills);
            let e = *ctx.entity(EntityId(0)).unwrap();
            ctx.kill(&e);
        }
        assert_eq!(kills, vec![EntityId(0)]);
    }

    #[test]
    fn view_matching_uses_same_rule() {
        let records = vec![entity(0, true, A), entity(1, false, A), entity(2, true, B)];
        let view = WorldView::new(WorldId::next(), &records, &());
        assert_eq!(view.matching(A).count(), 1);
        assert_eq!(view.matching(Mask::EMPTY).count(), 2);
    }
}
