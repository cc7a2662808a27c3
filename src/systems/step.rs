//! Step pipeline - encode the population, run one automaton generation,
//! reconcile the result back into the map.

use bevy::prelude::*;
use rand::Rng;

use crate::automata::{self, Ruleset, StepOverrides};
use crate::components::Player;
use crate::constants::BORN_ACTIVATION_CHANCE;
use crate::grid::RuleTexture;
use crate::machine::MachineCtx;
use crate::messages::{DestroyCause, FireProjectileMsg, MachineDestroyedMsg};
use crate::population::MachinePopulation;
use crate::settings::UserSettings;
use crate::systems::activation::fire_machine;
use crate::systems::director::{DirectorState, Season};
use crate::terrain::Tilemap;
use crate::GameState;

pub fn automaton_step_system(
    mut director: ResMut<DirectorState>,
    game: Res<GameState>,
    settings: Res<UserSettings>,
    mut population: ResMut<MachinePopulation>,
    terrain: Res<Tilemap>,
    player: Query<&Transform, With<Player>>,
    mut destroyed: MessageWriter<MachineDestroyedMsg>,
    mut fire: MessageWriter<FireProjectileMsg>,
) {
    let Some(command) = director.pending_step.take() else { return };

    let season = Season::from_wave(game.wave);
    let ruleset = Ruleset::for_season(season, director.event_active());
    let overrides = StepOverrides { spawner_override: director.spawner_override };
    let ctx = MachineCtx {
        wave: game.wave,
        season,
        health_mult: settings.difficulty.mults().enemy_health,
    };

    let texture = RuleTexture::encode(&population, terrain.width, terrain.height);
    let next = automata::step(&texture, ruleset, &overrides);
    let outcome = population.reconcile(&next, &terrain, ruleset.def().three_state, &ctx);

    // Automaton deaths are silent: fade only, no loot.
    for (cell, kind) in outcome.died {
        destroyed.write(MachineDestroyedMsg { cell, kind, cause: DestroyCause::Step });
    }

    // Born machines may open fire right away on activation steps, on a
    // coin flip each.
    if command.activation_step && !director.in_grace_period() {
        let player_pos = player
            .single()
            .map(|t| t.translation.truncate())
            .unwrap_or(Vec2::ZERO);
        let mut rng = rand::rng();
        for cell in outcome.born {
            if rng.random::<f32>() >= BORN_ACTIVATION_CHANCE {
                continue;
            }
            if let Some(machine) = population.machine_at(cell) {
                fire_machine(&mut rng, cell, machine, &population, &terrain, player_pos, &mut fire);
            }
        }
    }
}
