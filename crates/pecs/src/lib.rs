//! PECS -- a minimal entity-component-system runtime.
//!
//! Entities are dense integer ids carrying a capability [`Mask`](mask::Mask).
//! Systems declare the mask they need and are notified when matching entities
//! appear or disappear. Every structural change (entity registration and
//! removal, system registration and removal) is deferred to
//! [`World::refresh`](world::World::refresh), so iteration never observes a
//! change in progress. Component data lives in storage owned by the caller,
//! typically [`ComponentVec`](storage::ComponentVec) columns indexed by id.
//!
//! # Quick Start
//!
//! ```
//! use pecs::prelude::*;
//!
//! const POSITION: Mask = Mask::bit(0);
//! const VELOCITY: Mask = Mask::bit(1);
//!
//! #[derive(Default)]
//! struct Motion {
//!     position: Vec<f32>,
//!     velocity: Vec<f32>,
//! }
//!
//! struct Integrate;
//!
//! impl System<Motion> for Integrate {
//!     fn mask(&self) -> Mask {
//!         POSITION | VELOCITY
//!     }
//!
//!     fn update(&mut self, dt: f64, ctx: &mut SystemContext<'_, Motion>) {
//!         for entity in ctx.matching(POSITION | VELOCITY) {
//!             let i = entity.id().index();
//!             let motion = ctx.components_mut();
//!             motion.position[i] += motion.velocity[i] * dt as f32;
//!         }
//!     }
//! }
//!
//! let mut world = World::with_components(Motion::default());
//! world.register_system(&SystemRef::new(Integrate));
//!
//! let mut e = world.allocate_entity();
//! world.components_mut().position.push(0.0);
//! world.components_mut().velocity.push(2.0);
//! e.insert_mask(POSITION | VELOCITY);
//! world.register_entity(e);
//!
//! world.update(0.5);
//! assert_eq!(world.components().position[0], 1.0);
//! ```

#![deny(unsafe_code)]

pub mod config;
pub mod context;
pub mod entity;
pub mod mask;
pub mod metrics;
pub mod queue;
pub mod snapshot;
pub mod storage;
pub mod system;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by ECS operations.
///
/// Lifecycle operations are infallible; only snapshot capture and restore
/// report errors.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The operation needs every queued mutation applied first.
    #[error("world has pending mutations ({systems} system, {entities} entity); refresh first")]
    PendingMutations { systems: usize, entities: usize },

    /// A snapshot failed validation.
    #[error("invalid snapshot: {details}")]
    InvalidSnapshot { details: String },

    /// JSON encoding or decoding of a snapshot failed.
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::config::WorldConfig;
    pub use crate::context::{Matching, SystemContext, WorldView};
    pub use crate::entity::{Entity, EntityId};
    pub use crate::mask::{entity_matches, Mask};
    pub use crate::metrics::MetricsSnapshot;
    pub use crate::queue::RefreshReport;
    pub use crate::snapshot::RegistrySnapshot;
    pub use crate::storage::ComponentVec;
    pub use crate::system::{System, SystemRef};
    pub use crate::world::{World, WorldId};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------
