//! ECS Components.

use bevy::prelude::*;

use crate::machine::Variant;

/// The player avatar.
#[derive(Component)]
pub struct Player;

#[derive(Component)]
pub struct MainCamera;

/// An in-flight shot. Movement and collision run in the combat phase.
#[derive(Component)]
pub struct Projectile {
    pub velocity: Vec2,
    pub damage: f32,
    pub hostile: bool,
    pub bouncy: bool,
    pub ttl: f32,
}

/// Sprite bound to one population map slot. The render sync diff walks
/// these against the map every frame.
#[derive(Component)]
pub struct MachineSprite {
    pub cell: IVec2,
    pub variant: Variant,
}

/// Short-lived sprite left behind by a just-died cell.
#[derive(Component)]
pub struct FadeSprite {
    pub timer: f32,
}

/// Static terrain tile sprite, despawned wholesale on wave regen.
#[derive(Component)]
pub struct TerrainSprite;
