//! Activation Scheduler - rotating group counter that paces machine attacks,
//! plus the per-kind fire dispatch.

use bevy::prelude::*;
use rand::Rng;

use crate::components::Player;
use crate::constants::{ACTIVATION_GROUPS, ACTIVATION_RATE, PROJECTILE_SPEED};
use crate::machine::{Machine, MachineKind, Variant};
use crate::messages::FireProjectileMsg;
use crate::population::MachinePopulation;
use crate::systems::director::DirectorState;
use crate::terrain::Tilemap;
use crate::GameState;

// ============================================================================
// SCHEDULER
// ============================================================================

#[derive(Resource, Default, Debug)]
pub struct ActivationState {
    pub index: i32,
    pub timer: f32,
}

/// Which of the 16 rotating groups a cell belongs to.
pub fn group_of(cell: IVec2) -> i32 {
    (cell.x + cell.y).rem_euclid(ACTIVATION_GROUPS)
}

const ORTHOGONALS: [IVec2; 4] =
    [IVec2::new(1, 0), IVec2::new(-1, 0), IVec2::new(0, 1), IVec2::new(0, -1)];
const DIAGONALS: [IVec2; 4] =
    [IVec2::new(1, 1), IVec2::new(-1, 1), IVec2::new(1, -1), IVec2::new(-1, -1)];

pub fn activation_system(
    time: Res<Time>,
    mut state: ResMut<ActivationState>,
    director: Res<DirectorState>,
    game: Res<GameState>,
    population: Res<MachinePopulation>,
    terrain: Res<Tilemap>,
    player: Query<&Transform, With<Player>>,
    mut fire: MessageWriter<FireProjectileMsg>,
) {
    if game.freeze_timer > 0.0 {
        return;
    }
    let player_pos = player
        .single()
        .map(|t| t.translation.truncate())
        .unwrap_or(Vec2::ZERO);
    let mut rng = rand::rng();

    state.timer += time.delta_secs();
    let period = 1.0 / ACTIVATION_RATE;
    while state.timer >= period {
        state.timer -= period;
        state.index = (state.index + 1) % ACTIVATION_GROUPS;

        if director.in_grace_period() || director.interwave.is_some() {
            continue;
        }
        for (cell, variant, machine) in population.iter_with_variant() {
            if variant != Variant::Primary
                || group_of(cell) != state.index
                || machine.effects.frozen()
            {
                continue;
            }
            fire_machine(&mut rng, cell, machine, &population, &terrain, player_pos, &mut fire);
        }
    }
}

// ============================================================================
// FIRE DISPATCH
// ============================================================================

/// Emit the kind-specific attack for one machine. Beacons pace themselves
/// on their own timer and never go through here; passive kinds no-op.
pub fn fire_machine<R: Rng + ?Sized>(
    rng: &mut R,
    cell: IVec2,
    machine: &Machine,
    population: &MachinePopulation,
    terrain: &Tilemap,
    player_pos: Vec2,
    fire: &mut MessageWriter<FireProjectileMsg>,
) {
    let from = terrain.cell_center(cell);
    let hostile = !machine.effects.confused();
    let aim = (player_pos - from).normalize_or(Vec2::X);
    let mut shoot = |dir: Vec2, damage: f32, bouncy: bool, speed: f32| {
        fire.write(FireProjectileMsg { from, dir, damage, hostile, bouncy, speed });
    };

    match machine.kind {
        // Shots only leave through open sides: firing into a neighbor
        // machine would just chew on the swarm itself.
        MachineKind::Block => {
            for offset in ORTHOGONALS {
                if population.machine_at(cell + offset).is_none() {
                    shoot(offset.as_vec2(), 1.0, false, PROJECTILE_SPEED);
                }
            }
        }
        MachineKind::Slant => {
            for offset in DIAGONALS {
                if population.machine_at(cell + offset).is_none() {
                    shoot(offset.as_vec2().normalize(), 1.0, false, PROJECTILE_SPEED);
                }
            }
        }
        MachineKind::Stinger => shoot(aim, 1.0, false, PROJECTILE_SPEED * 1.2),
        MachineKind::Ricochet => {
            let angle = rng.random_range(0.0..std::f32::consts::TAU);
            shoot(Vec2::from_angle(angle), 1.0, true, PROJECTILE_SPEED);
        }
        MachineKind::Mortar => {
            if rng.random::<f32>() < 0.5 {
                shoot(aim, 3.0, false, PROJECTILE_SPEED * 0.55);
            }
        }
        MachineKind::Marksman => {
            if rng.random::<f32>() < 0.3 {
                shoot(aim, 2.0, false, PROJECTILE_SPEED * 3.0);
            }
        }
        MachineKind::Coil => {
            // Radial pulse.
            for i in 0..8 {
                let angle = std::f32::consts::TAU * i as f32 / 8.0;
                shoot(Vec2::from_angle(angle), 0.5, false, PROJECTILE_SPEED * 0.8);
            }
        }
        MachineKind::Pod
        | MachineKind::Drone
        | MachineKind::Seeder
        | MachineKind::Beacon
        | MachineKind::Cache
        | MachineKind::Snag => {}
    }
}

// ============================================================================
// BEACON + AGING
// ============================================================================

/// Per-frame machine upkeep: aging, hit-flash decay, effect timers.
pub fn machine_update_system(
    time: Res<Time>,
    game: Res<GameState>,
    mut population: ResMut<MachinePopulation>,
) {
    if game.freeze_timer > 0.0 {
        return;
    }
    let dt = time.delta_secs();
    for (_, _, machine) in population.iter_mut() {
        machine.age(dt);
        machine.effects.tick(dt);
    }
}

/// Beacons fire continuously on a quarter-second timer, alternating between
/// a rotating shot pair and a four-way burst on a ten-second cycle.
pub fn beacon_system(
    time: Res<Time>,
    director: Res<DirectorState>,
    game: Res<GameState>,
    mut population: ResMut<MachinePopulation>,
    terrain: Res<Tilemap>,
    mut fire: MessageWriter<FireProjectileMsg>,
) {
    if game.freeze_timer > 0.0 || director.in_grace_period() || director.interwave.is_some() {
        return;
    }
    let elapsed = time.elapsed_secs();
    let mut shots = Vec::new();

    for (cell, variant, machine) in population.iter_mut() {
        if variant != Variant::Primary || machine.kind != MachineKind::Beacon {
            continue;
        }
        while machine.timer >= 0.25 {
            machine.timer -= 0.25;
            let hostile = !machine.effects.confused();
            if elapsed % 10.0 < 6.0 {
                // Rotating pair.
                let base = elapsed * 1.7;
                for phase in [0.0, std::f32::consts::PI] {
                    shots.push((cell, Vec2::from_angle(base + phase), hostile));
                }
            } else {
                for offset in ORTHOGONALS {
                    shots.push((cell, offset.as_vec2(), hostile));
                }
            }
        }
    }

    for (cell, dir, hostile) in shots {
        fire.write(FireProjectileMsg {
            from: terrain.cell_center(cell),
            dir,
            damage: 1.0,
            hostile,
            bouncy: false,
            speed: PROJECTILE_SPEED,
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_partition_cells_and_rotate_fairly() {
        // Over one full rotation, every cell's group comes up exactly once.
        let cells = [
            IVec2::new(0, 0),
            IVec2::new(5, 3),
            IVec2::new(15, 0),
            IVec2::new(7, 9),
            IVec2::new(59, 39),
        ];
        let mut fired = vec![0u32; cells.len()];
        let mut index = -1i32;
        for _ in 0..ACTIVATION_GROUPS {
            index = (index + 1) % ACTIVATION_GROUPS;
            for (i, cell) in cells.iter().enumerate() {
                if group_of(*cell) == index {
                    fired[i] += 1;
                }
            }
        }
        assert!(fired.iter().all(|&n| n == 1), "each machine fires once per rotation: {fired:?}");
    }

    #[test]
    fn group_is_stable_for_a_cell() {
        for cell in [IVec2::new(3, 4), IVec2::new(12, 20)] {
            assert_eq!(group_of(cell), (cell.x + cell.y) % ACTIVATION_GROUPS);
            assert!((0..ACTIVATION_GROUPS).contains(&group_of(cell)));
        }
    }
}
