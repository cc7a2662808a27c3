//! Combat - projectile lifecycle, the damage surface, status effects, and
//! destroy side effects.

use bevy::prelude::*;
use rand::Rng;

use crate::components::{Player, Projectile};
use crate::constants::{IGNITE_DPS, PROJECTILE_LIFETIME, SOFT_CLEAR_THRESHOLD, TILE_SIZE};
use crate::machine::{MachineKind, Variant};
use crate::messages::{
    DamageMachineMsg, DestroyCause, FireProjectileMsg, MachineDestroyedMsg, SpawnDropMsg,
    WaveStartedMsg,
};
use crate::population::{DamageResult, MachinePopulation};
use crate::terrain::Tilemap;
use crate::GameState;

// ============================================================================
// PROJECTILES
// ============================================================================

pub fn spawn_projectile_system(
    mut commands: Commands,
    mut requests: MessageReader<FireProjectileMsg>,
) {
    for msg in requests.read() {
        let color = if msg.hostile {
            Color::srgb(1.0, 0.45, 0.30)
        } else {
            Color::srgb(0.45, 0.85, 1.0)
        };
        commands.spawn((
            Projectile {
                velocity: msg.dir.normalize_or(Vec2::X) * msg.speed,
                damage: msg.damage,
                hostile: msg.hostile,
                bouncy: msg.bouncy,
                ttl: PROJECTILE_LIFETIME,
            },
            Sprite::from_color(color, Vec2::new(5.0, 5.0)),
            Transform::from_translation(msg.from.extend(5.0)),
        ));
    }
}

pub fn projectile_system(
    time: Res<Time>,
    mut commands: Commands,
    terrain: Res<Tilemap>,
    population: Res<MachinePopulation>,
    mut game: ResMut<GameState>,
    mut damage_out: MessageWriter<DamageMachineMsg>,
    mut projectiles: Query<(Entity, &mut Projectile, &mut Transform), Without<Player>>,
    player: Query<&Transform, With<Player>>,
) {
    let dt = time.delta_secs();
    let player_pos = player.single().map(|t| t.translation.truncate()).ok();

    for (entity, mut proj, mut transform) in &mut projectiles {
        proj.ttl -= dt;
        if proj.ttl <= 0.0 {
            commands.entity(entity).despawn();
            continue;
        }

        let prev = transform.translation.truncate();
        let mut pos = prev + proj.velocity * dt;
        let cell = terrain.world_to_cell(pos);

        if terrain.is_solid(cell) {
            if proj.bouncy {
                // Reflect off whichever axis crossed into the wall.
                let prev_cell = terrain.world_to_cell(prev);
                if cell.x != prev_cell.x {
                    proj.velocity.x = -proj.velocity.x;
                }
                if cell.y != prev_cell.y {
                    proj.velocity.y = -proj.velocity.y;
                }
                pos = prev;
            } else {
                commands.entity(entity).despawn();
                continue;
            }
        }

        if proj.hostile {
            if let Some(player_pos) = player_pos {
                if player_pos.distance(pos) < TILE_SIZE * 0.5 {
                    game.player_health -= proj.damage;
                    commands.entity(entity).despawn();
                    continue;
                }
            }
        } else if population.machine_at(cell).is_some() {
            damage_out.write(DamageMachineMsg { cell, amount: proj.damage });
            commands.entity(entity).despawn();
            continue;
        }

        transform.translation = pos.extend(5.0);
    }
}

// ============================================================================
// DAMAGE + DESTROY
// ============================================================================

/// Scrap dropped when a machine is killed by damage.
fn scrap_for(rng: &mut impl Rng, kind: MachineKind) -> u32 {
    match kind {
        MachineKind::Pod | MachineKind::Drone => 1,
        MachineKind::Block => rng.random_range(1..=2),
        MachineKind::Coil | MachineKind::Stinger | MachineKind::Slant => rng.random_range(2..=3),
        MachineKind::Mortar | MachineKind::Ricochet | MachineKind::Marksman => {
            rng.random_range(3..=5)
        }
        MachineKind::Seeder => rng.random_range(5..=8),
        MachineKind::Snag => rng.random_range(0..=1),
        MachineKind::Cache => rng.random_range(8..=15),
        MachineKind::Beacon => rng.random_range(20..=30),
    }
}

pub fn damage_system(
    mut population: ResMut<MachinePopulation>,
    terrain: Res<Tilemap>,
    mut game: ResMut<GameState>,
    mut damage_in: MessageReader<DamageMachineMsg>,
    mut destroyed: MessageWriter<MachineDestroyedMsg>,
    mut drops: MessageWriter<SpawnDropMsg>,
) {
    let mut rng = rand::rng();
    for msg in damage_in.read() {
        match population.damage(msg.cell, msg.amount) {
            DamageResult::Missed | DamageResult::Hurt => {}
            DamageResult::Killed(machine) => {
                game.score += (machine.max_health.ceil() as u32).max(1);
                drops.write(SpawnDropMsg {
                    pos: terrain.cell_center(msg.cell),
                    scrap: scrap_for(&mut rng, machine.kind),
                });
                destroyed.write(MachineDestroyedMsg {
                    cell: msg.cell,
                    kind: machine.kind,
                    cause: DestroyCause::Killed,
                });
            }
        }
    }
}

// ============================================================================
// STATUS EFFECTS + CLEANUP
// ============================================================================

/// Ignite burns through the ordinary damage path so deaths still pay out.
pub fn effect_tick_system(
    time: Res<Time>,
    population: Res<MachinePopulation>,
    mut game: ResMut<GameState>,
    mut damage_out: MessageWriter<DamageMachineMsg>,
) {
    let dt = time.delta_secs();
    game.freeze_timer = (game.freeze_timer - dt).max(0.0);

    for (cell, variant, machine) in population.iter_with_variant() {
        if variant == Variant::Primary && machine.effects.ignited() {
            damage_out.write(DamageMachineMsg { cell, amount: IGNITE_DPS * dt });
        }
    }
}

/// Leftover caches and snags clear themselves once the wave is effectively
/// over, so they never hold the map open.
pub fn structural_cleanup_system(mut population: ResMut<MachinePopulation>) {
    if population.enemy_count() > 0 || population.len() >= SOFT_CLEAR_THRESHOLD {
        return;
    }
    let friendly: Vec<IVec2> = population
        .iter_with_variant()
        .filter(|(_, v, m)| *v == Variant::Primary && m.kind.is_friendly())
        .map(|(cell, _, _)| cell)
        .collect();
    for cell in friendly {
        population.remove(cell, Variant::Primary);
    }
}

/// Wave boundaries clear the battlefield of in-flight shots.
pub fn wave_reset_system(
    mut commands: Commands,
    mut waves: MessageReader<WaveStartedMsg>,
    projectiles: Query<Entity, With<Projectile>>,
) {
    if waves.read().next().is_none() {
        return;
    }
    for entity in &projectiles {
        commands.entity(entity).despawn();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::{Machine, MachineCtx};
    use crate::systems::director::Season;

    fn ctx() -> MachineCtx {
        MachineCtx { wave: 1, season: Season::Summer, health_mult: 1.0 }
    }

    #[test]
    fn scrap_ranges_stay_in_bounds() {
        let mut rng = rand::rng();
        for _ in 0..32 {
            assert!((20..=30).contains(&scrap_for(&mut rng, MachineKind::Beacon)));
            assert!((1..=2).contains(&scrap_for(&mut rng, MachineKind::Block)));
        }
    }

    #[test]
    fn cleanup_waits_for_enemies_to_die() {
        let mut pop = MachinePopulation::default();
        pop.insert(IVec2::new(1, 1), Variant::Primary, Machine::fresh(MachineKind::Cache, &ctx()));
        pop.insert(IVec2::new(2, 1), Variant::Primary, Machine::fresh(MachineKind::Block, &ctx()));

        let mut app = App::new();
        app.insert_resource(pop);
        app.add_systems(Update, structural_cleanup_system);
        app.update();
        assert_eq!(app.world().resource::<MachinePopulation>().len(), 2);

        // Kill the enemy; caches clear on the next pass.
        app.world_mut()
            .resource_mut::<MachinePopulation>()
            .remove(IVec2::new(2, 1), Variant::Primary);
        app.update();
        assert_eq!(app.world().resource::<MachinePopulation>().len(), 0);
    }
}
