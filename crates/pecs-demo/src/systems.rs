//! Demo systems.

use pecs::prelude::*;
use tracing::{debug, trace};

use crate::components::{DemoComponents, CAMERA, INFO, TRANSFORM};

/// Adds `position[1]` into `position[0]` of every transform each tick.
#[derive(Debug, Default)]
pub struct TransformSystem {
    pub updated: u64,
}

impl System<DemoComponents> for TransformSystem {
    fn mask(&self) -> Mask {
        INFO | TRANSFORM
    }

    fn on_world_attach(&mut self, world: &WorldView<'_, DemoComponents>) {
        debug!(world = %world.id(), "transform system attached");
    }

    fn on_world_detach(&mut self, world: &WorldView<'_, DemoComponents>) {
        debug!(world = %world.id(), "transform system detached");
    }

    fn update(&mut self, _dt: f64, ctx: &mut SystemContext<'_, DemoComponents>) {
        for entity in ctx.matching(INFO | TRANSFORM) {
            let transform = &mut ctx.components_mut().transforms[entity.id()];
            transform.position[0] += transform.position[1];
            self.updated += 1;
        }
    }
}

/// Follows the single camera entity through its add/remove hooks.
#[derive(Debug, Default)]
pub struct CameraSystem {
    camera: Option<EntityId>,
}

impl CameraSystem {
    pub fn camera(&self) -> Option<EntityId> {
        self.camera
    }
}

impl System<DemoComponents> for CameraSystem {
    fn mask(&self) -> Mask {
        INFO | TRANSFORM | CAMERA
    }

    fn on_entity_add(&mut self, entity: &Entity) {
        debug!(entity = %entity.id(), "camera added");
        self.camera = Some(entity.id());
    }

    fn on_entity_remove(&mut self, entity: &Entity) {
        debug!(entity = %entity.id(), "camera removed");
        if self.camera == Some(entity.id()) {
            self.camera = None;
        }
    }

    fn update(&mut self, _dt: f64, ctx: &mut SystemContext<'_, DemoComponents>) {
        let Some(id) = self.camera else {
            return;
        };
        let store = ctx.components();
        trace!(
            camera = %store.infos[id].name,
            position = ?store.transforms[id].position,
            fov = store.cameras[id].fov,
            "camera"
        );
    }
}
