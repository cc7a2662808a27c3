//! ECS Messages - cross-system commands and notifications.

use bevy::prelude::*;

use crate::machine::MachineKind;

/// Request to spawn a projectile entity. Sent by activation and the step
/// pipeline, drained by the combat system.
#[derive(Message, Clone)]
pub struct FireProjectileMsg {
    pub from: Vec2,
    pub dir: Vec2,
    pub damage: f32,
    /// Hostile projectiles hit the player; friendly ones hit machines.
    /// Confusion flips this at emission time.
    pub hostile: bool,
    /// Ricochet shots reflect off solid terrain instead of despawning.
    pub bouncy: bool,
    pub speed: f32,
}

/// Apply damage to the machine at a cell.
#[derive(Message, Clone)]
pub struct DamageMachineMsg {
    pub cell: IVec2,
    pub amount: f32,
}

/// Why a machine left the map.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DestroyCause {
    /// Silent automaton death: fade visuals only, no loot or score.
    Step,
    /// Killed by damage: full destroy side effects.
    Killed,
}

/// A machine's identity left the map.
#[derive(Message, Clone)]
pub struct MachineDestroyedMsg {
    pub cell: IVec2,
    pub kind: MachineKind,
    pub cause: DestroyCause,
}

/// Scrap drop request for the economy layer.
#[derive(Message, Clone)]
pub struct SpawnDropMsg {
    pub pos: Vec2,
    pub scrap: u32,
}

/// A new wave just started (after terrain regen and placement).
#[derive(Message, Clone)]
pub struct WaveStartedMsg {
    pub wave: u32,
}
