//! Rendering - sprite sync for machines, terrain, fades, minimap, and the
//! player avatar.

use bevy::prelude::*;
use hashbrown::HashSet;

use crate::components::{FadeSprite, MachineSprite, MainCamera, Player, TerrainSprite};
use crate::constants::{DECAY_FADE_DURATION, GHOST_ALPHA, TILE_SIZE};
use crate::machine::{MachineKind, Variant};
use crate::messages::WaveStartedMsg;
use crate::population::MachinePopulation;
use crate::settings::UserSettings;
use crate::terrain::{Minimap, Tilemap};

const SOLID_COLOR: Color = Color::srgb(0.16, 0.15, 0.20);
const GAP_COLOR: Color = Color::srgb(0.04, 0.04, 0.07);
const FLOOR_COLOR: Color = Color::srgb(0.32, 0.30, 0.38);
const PLAYER_COLOR: Color = Color::srgb(0.95, 0.95, 0.85);

// ============================================================================
// STARTUP
// ============================================================================

pub fn setup_system(mut commands: Commands, terrain: Res<Tilemap>) {
    commands.spawn((Camera2d, MainCamera));
    commands.spawn((
        Player,
        Sprite::from_color(PLAYER_COLOR, Vec2::splat(TILE_SIZE * 0.7)),
        Transform::from_translation(terrain.cell_center(terrain.spawn).extend(10.0)),
    ));
    spawn_terrain_sprites(&mut commands, &terrain);
}

fn spawn_terrain_sprites(commands: &mut Commands, terrain: &Tilemap) {
    for y in 0..terrain.height {
        for x in 0..terrain.width {
            let cell = IVec2::new(x, y);
            let color = if terrain.is_solid(cell) {
                SOLID_COLOR
            } else if terrain.is_gap(cell) {
                GAP_COLOR
            } else {
                FLOOR_COLOR
            };
            commands.spawn((
                TerrainSprite,
                Sprite::from_color(color, Vec2::splat(TILE_SIZE)),
                Transform::from_translation(terrain.cell_center(cell).extend(0.0)),
            ));
        }
    }
}

/// New wave means new terrain: rebuild the tile layer and re-center the
/// player on the fresh spawn cell.
pub fn terrain_rebuild_system(
    mut commands: Commands,
    mut waves: MessageReader<WaveStartedMsg>,
    terrain: Res<Tilemap>,
    tiles: Query<Entity, With<TerrainSprite>>,
    mut player: Query<&mut Transform, With<Player>>,
) {
    if waves.read().next().is_none() {
        return;
    }
    for entity in &tiles {
        commands.entity(entity).despawn();
    }
    spawn_terrain_sprites(&mut commands, &terrain);
    if let Ok(mut transform) = player.single_mut() {
        transform.translation = terrain.cell_center(terrain.spawn).extend(10.0);
    }
}

// ============================================================================
// MACHINE SPRITES
// ============================================================================

/// Diff the sprite set against the population map: despawn stale sprites,
/// restyle live ones, spawn the missing.
pub fn machine_sprite_sync_system(
    mut commands: Commands,
    population: Res<MachinePopulation>,
    terrain: Res<Tilemap>,
    mut sprites: Query<(Entity, &MachineSprite, &mut Sprite, &mut Transform)>,
) {
    let mut present: HashSet<(IVec2, Variant)> = HashSet::new();

    for (entity, marker, mut sprite, mut transform) in &mut sprites {
        let key = (marker.cell, marker.variant);
        let Some(machine) = population.get(marker.cell, marker.variant) else {
            commands.entity(entity).despawn();
            continue;
        };
        present.insert(key);

        let mut color = machine.kind.color();
        if marker.variant == Variant::Ghost {
            color = color.with_alpha(GHOST_ALPHA);
        }
        if machine.hurt > 0.0 {
            color = Color::WHITE;
        }
        sprite.color = color;
        let scale = machine.scale();
        transform.scale = Vec3::new(scale.x, scale.y, 1.0);
        // Lower rows draw on top, matching the map's visual stacking.
        transform.translation = terrain
            .cell_center(marker.cell)
            .extend(1.0 + (terrain.height - marker.cell.y) as f32 * 0.01);
    }

    for (cell, variant, machine) in population.iter_with_variant() {
        if present.contains(&(cell, variant)) {
            continue;
        }
        let mut color = machine.kind.color();
        if variant == Variant::Ghost {
            color = color.with_alpha(GHOST_ALPHA);
        }
        commands.spawn((
            MachineSprite { cell, variant },
            Sprite::from_color(color, Vec2::splat(TILE_SIZE * 0.9)),
            Transform::from_translation(
                terrain.cell_center(cell).extend(1.0 + (terrain.height - cell.y) as f32 * 0.01),
            )
            .with_scale(Vec3::new(0.0, 0.0, 1.0)),
        ));
    }
}

/// Just-died cells linger as a brief fade.
pub fn fade_sprite_system(
    time: Res<Time>,
    mut commands: Commands,
    mut population: ResMut<MachinePopulation>,
    terrain: Res<Tilemap>,
    mut fades: Query<(Entity, &mut FadeSprite, &mut Sprite)>,
) {
    for fade in population.fading.drain(..) {
        commands.spawn((
            FadeSprite { timer: DECAY_FADE_DURATION },
            Sprite::from_color(fade.kind.color().with_alpha(0.6), Vec2::splat(TILE_SIZE * 0.9)),
            Transform::from_translation(terrain.cell_center(fade.cell).extend(0.5)),
        ));
    }

    let dt = time.delta_secs();
    for (entity, mut fade, mut sprite) in &mut fades {
        fade.timer -= dt;
        if fade.timer <= 0.0 {
            commands.entity(entity).despawn();
            continue;
        }
        sprite.color = sprite.color.with_alpha(0.6 * fade.timer / DECAY_FADE_DURATION);
    }
}

// ============================================================================
// MINIMAP
// ============================================================================

pub fn minimap_sync_system(
    population: Res<MachinePopulation>,
    settings: Res<UserSettings>,
    mut minimap: ResMut<Minimap>,
) {
    if !settings.show_minimap {
        return;
    }
    minimap.clear();
    for (cell, variant, machine) in population.iter_with_variant() {
        let color = match (variant, machine.kind) {
            (Variant::Ghost, _) => [90, 90, 110, 160],
            (_, MachineKind::Snag) => [100, 97, 140, 255],
            (_, MachineKind::Cache) => [227, 102, 71, 255],
            (_, kind) if kind.is_structural() => [242, 77, 140, 255],
            _ => [200, 200, 200, 255],
        };
        minimap.set(cell, color);
    }
}

// ============================================================================
// PLAYER
// ============================================================================

pub fn player_move_system(
    time: Res<Time>,
    keys: Res<ButtonInput<KeyCode>>,
    settings: Res<UserSettings>,
    terrain: Res<Tilemap>,
    mut player: Query<&mut Transform, With<Player>>,
) {
    let Ok(mut transform) = player.single_mut() else { return };
    let mut dir = Vec2::ZERO;
    if keys.pressed(KeyCode::KeyW) || keys.pressed(KeyCode::ArrowUp) {
        dir.y += 1.0;
    }
    if keys.pressed(KeyCode::KeyS) || keys.pressed(KeyCode::ArrowDown) {
        dir.y -= 1.0;
    }
    if keys.pressed(KeyCode::KeyA) || keys.pressed(KeyCode::ArrowLeft) {
        dir.x -= 1.0;
    }
    if keys.pressed(KeyCode::KeyD) || keys.pressed(KeyCode::ArrowRight) {
        dir.x += 1.0;
    }
    if dir == Vec2::ZERO {
        return;
    }

    let pos = transform.translation.truncate();
    let next = pos + dir.normalize() * settings.move_speed * time.delta_secs();
    // Axis-separated collision so walls can be slid along.
    let mut resolved = pos;
    if !terrain.is_solid(terrain.world_to_cell(Vec2::new(next.x, pos.y))) {
        resolved.x = next.x;
    }
    if !terrain.is_solid(terrain.world_to_cell(Vec2::new(resolved.x, next.y))) {
        resolved.y = next.y;
    }
    transform.translation = resolved.extend(10.0);
}
