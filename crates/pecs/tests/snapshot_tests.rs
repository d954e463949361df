//! Integration tests for entity registry snapshot/restore.

use std::cell::RefCell;
use std::rc::Rc;

use pecs::prelude::*;

const INFO: Mask = Mask::bit(0);
const TRANSFORM: Mask = Mask::bit(3);

/// Counts add/remove notifications for entities carrying INFO.
#[derive(Default)]
struct Census {
    added: usize,
    removed: usize,
}

impl System for Census {
    fn mask(&self) -> Mask {
        INFO
    }

    fn on_entity_add(&mut self, _entity: &Entity) {
        self.added += 1;
    }

    fn on_entity_remove(&mut self, _entity: &Entity) {
        self.removed += 1;
    }
}

fn setup_world(count: usize) -> World {
    let mut world = World::new();
    for i in 0..count {
        let mut e = world.allocate_entity();
        e.insert_mask(INFO);
        if i % 2 == 0 {
            e.insert_mask(TRANSFORM);
        }
        world.register_entity(e);
    }
    world.refresh();
    world
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn snapshot_empty_world() {
    let world = World::new();
    let snapshot = world.capture_snapshot().unwrap();
    assert!(snapshot.entities.is_empty());
    assert_eq!(snapshot.next_id, 0);
    assert_eq!(snapshot.dead_count, 0);

    let mut world2 = World::new();
    world2.restore_from_snapshot(&snapshot).unwrap();
    assert_eq!(world2.entity_count(), 0);
}

#[test]
fn json_roundtrip_preserves_hash() {
    let mut world = setup_world(6);
    world.kill_entity_by_id(EntityId::from_raw(2));
    world.refresh();

    let snapshot = world.capture_snapshot().unwrap();
    let json = snapshot.to_json().unwrap();
    let parsed = RegistrySnapshot::from_json(&json).unwrap();

    assert_eq!(parsed, snapshot);
    assert_eq!(parsed.state_hash().unwrap(), snapshot.state_hash().unwrap());
    assert_eq!(snapshot.state_hash().unwrap().len(), 64);
}

#[test]
fn malformed_json_is_a_serialization_error() {
    let err = RegistrySnapshot::from_json("{ not json").unwrap_err();
    assert!(matches!(err, EcsError::Serialization(_)));
}

#[test]
fn restore_replays_notifications() {
    let source = setup_world(5);
    let snapshot = source.capture_snapshot().unwrap();

    let mut target = setup_world(3);
    let census = target.register_system(&SystemRef::new(Census::default()));
    target.refresh();
    assert_eq!(census.borrow().added, 0);

    target.restore_from_snapshot(&snapshot).unwrap();
    assert_eq!(census.borrow().removed, 3);
    assert_eq!(census.borrow().added, 5);
    assert_eq!(target.entity_count(), 5);
    assert_eq!(target.alive_count(), 5);
}

#[test]
fn restore_is_refused_with_pending_mutations() {
    let snapshot = setup_world(2).capture_snapshot().unwrap();
    let mut target = setup_world(2);
    target.kill_entity_by_id(EntityId::from_raw(0));

    let err = target.restore_from_snapshot(&snapshot).unwrap_err();
    assert!(matches!(err, EcsError::PendingMutations { entities: 1, .. }));
    // Unchanged: the kill is still queued.
    assert_eq!(target.dead_count(), 1);
    target.refresh();
    assert_eq!(target.alive_count(), 1);
}

#[test]
fn restored_world_matches_source_afterwards() {
    let mut source = setup_world(8);
    for raw in [1, 4, 6] {
        source.kill_entity_by_id(EntityId::from_raw(raw));
    }
    source.refresh();
    let snapshot = source.capture_snapshot().unwrap();

    let mut restored = World::new();
    restored.restore_from_snapshot(&snapshot).unwrap();

    // Identical operation sequences from identical states stay identical.
    for world in [&mut source, &mut restored] {
        for _ in 0..4 {
            let mut e = world.allocate_entity();
            e.insert_mask(INFO);
            world.register_entity(e);
        }
        world.refresh();
    }
    let a = source.capture_snapshot().unwrap();
    let b = restored.capture_snapshot().unwrap();
    assert_eq!(a.state_hash().unwrap(), b.state_hash().unwrap());
    assert_eq!(a.next_id, 9);
}
