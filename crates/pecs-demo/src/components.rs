//! Component types and storage used by the demo.

use pecs::prelude::*;

pub const INFO: Mask = Mask::bit(0);
pub const TRANSFORM: Mask = Mask::bit(3);
pub const CAMERA: Mask = Mask::bit(6);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Info {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transform {
    pub position: [f32; 3],
    pub scale: [f32; 3],
    pub orientation: [f32; 4],
    pub direction: [f32; 3],
}

impl Transform {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            scale: [1.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
            direction: [0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub exposure: f32,
}

/// Per-component columns indexed by entity id.
#[derive(Debug)]
pub struct DemoComponents {
    pub infos: ComponentVec<Info>,
    pub transforms: ComponentVec<Transform>,
    pub cameras: ComponentVec<Camera>,
}

impl Default for DemoComponents {
    fn default() -> Self {
        Self {
            infos: ComponentVec::new(INFO),
            transforms: ComponentVec::new(TRANSFORM),
            cameras: ComponentVec::new(CAMERA),
        }
    }
}

pub type DemoWorld = World<DemoComponents>;

/// Allocate, populate and register an entity with an info and a transform.
pub fn spawn(world: &mut DemoWorld, name: &str, transform: Transform) -> Entity {
    let mut e = world.allocate_entity();
    let store = world.components_mut();
    store.infos.insert(
        &mut e,
        Info {
            name: name.to_owned(),
        },
    );
    store.transforms.insert(&mut e, transform);
    world.register_entity(e)
}

pub fn spawn_camera(world: &mut DemoWorld, camera: Camera) -> Entity {
    let mut e = world.allocate_entity();
    let store = world.components_mut();
    store.infos.insert(
        &mut e,
        Info {
            name: "Main Camera".to_owned(),
        },
    );
    store.transforms.insert(&mut e, Transform::at([0.0, 0.0, -10.0]));
    store.cameras.insert(&mut e, camera);
    world.register_entity(e)
}
