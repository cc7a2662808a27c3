//! Cellstorm - automaton-driven enemy swarms for a wave survival game.
//!
//! Enemies are cells of a cellular automaton: a dense rule texture steps
//! under season-specific birth/survival rules, and a reconciler maps the
//! result back onto stateful machine entities without losing their identity.

// ============================================================================
// MODULES
// ============================================================================

pub mod automata;
pub mod components;
pub mod constants;
pub mod grid;
pub mod machine;
pub mod messages;
pub mod patterns;
pub mod population;
pub mod settings;
pub mod systems;
pub mod terrain;

use bevy::prelude::*;

use messages::*;
use population::MachinePopulation;
use systems::*;
use terrain::{Minimap, Tilemap};

// ============================================================================
// GAME STATE
// ============================================================================

/// Run-wide progression state.
#[derive(Resource, Debug)]
pub struct GameState {
    pub wave: u32,
    pub score: u32,
    pub scrap: u32,
    /// Monotonic difficulty score; paces activation-step frequency.
    pub difficulty: f32,
    /// Global freeze: while positive, machines neither age nor fire.
    pub freeze_timer: f32,
    pub player_health: f32,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            wave: 0,
            score: 0,
            scrap: 0,
            difficulty: 0.0,
            freeze_timer: 0.0,
            player_health: 10.0,
        }
    }
}

/// Credit scrap drops to the run total.
fn collect_drops_system(mut game: ResMut<GameState>, mut drops: MessageReader<SpawnDropMsg>) {
    for drop in drops.read() {
        game.scrap += drop.scrap;
    }
}

// ============================================================================
// APP
// ============================================================================

/// System execution phases. Chained sets get automatic apply_deferred
/// between them.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Director,
    Automaton,
    Activation,
    Combat,
    Render,
}

/// Wire up resources, messages, and the Update schedule. The caller adds
/// plugins; tests run this on `MinimalPlugins`.
pub fn build_app(app: &mut App) {
    app.add_message::<FireProjectileMsg>()
        .add_message::<DamageMachineMsg>()
        .add_message::<MachineDestroyedMsg>()
        .add_message::<SpawnDropMsg>()
        .add_message::<WaveStartedMsg>()
        .insert_resource(settings::load_settings())
        .init_resource::<GameState>()
        .init_resource::<DirectorState>()
        .init_resource::<ActivationState>()
        .init_resource::<MachinePopulation>()
        .init_resource::<Tilemap>()
        .init_resource::<Minimap>()
        .configure_sets(
            Update,
            (Step::Director, Step::Automaton, Step::Activation, Step::Combat, Step::Render)
                .chain(),
        )
        .add_systems(Startup, setup_system)
        .add_systems(Update, director_system.in_set(Step::Director))
        .add_systems(Update, automaton_step_system.in_set(Step::Automaton))
        .add_systems(
            Update,
            (machine_update_system, activation_system, beacon_system)
                .chain()
                .in_set(Step::Activation),
        )
        .add_systems(
            Update,
            (
                spawn_projectile_system,
                projectile_system,
                damage_system,
                effect_tick_system,
                structural_cleanup_system,
                collect_drops_system,
                wave_reset_system,
            )
                .chain()
                .in_set(Step::Combat),
        )
        .add_systems(
            Update,
            (
                terrain_rebuild_system,
                machine_sprite_sync_system,
                fade_sprite_system,
                minimap_sync_system,
                player_move_system,
            )
                .in_set(Step::Render),
        );
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn headless_app() -> App {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.init_resource::<ButtonInput<KeyCode>>();
        build_app(&mut app);
        // build_app loads persisted settings; tests pin the default.
        app.insert_resource(crate::settings::UserSettings::default());
        app
    }

    #[test]
    fn first_update_starts_wave_one() {
        let mut app = headless_app();
        app.update();
        let game = app.world().resource::<GameState>();
        assert_eq!(game.wave, 1);
        assert!(!app.world().resource::<MachinePopulation>().is_empty());
    }

    #[test]
    fn schedule_runs_repeatedly_without_panicking() {
        let mut app = headless_app();
        for _ in 0..20 {
            app.update();
        }
        assert_eq!(app.world().resource::<GameState>().wave, 1);
    }
}
