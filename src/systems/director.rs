//! Wave/Event Director - wave lifecycle, spawn budget, season selection,
//! step cadence, and the special event.

use bevy::prelude::*;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::components::Player;
use crate::constants::*;
use crate::machine::{Machine, MachineCtx, MachineKind, Variant, SEEDER_BIRTH_KINDS};
use crate::messages::WaveStartedMsg;
use crate::patterns::{self, OccupancyMask, SEED};
use crate::population::MachinePopulation;
use crate::settings::{season_pacing, UserSettings};
use crate::terrain::Tilemap;
use crate::GameState;

// ============================================================================
// SEASON
// ============================================================================

/// Ten-wave blocks cycling every forty waves. Season picks the ruleset
/// family, the pattern pool, and a pacing profile.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Season {
    Summer,
    Autumn,
    Winter,
    Void,
}

impl Season {
    pub fn from_wave(wave: u32) -> Season {
        match (wave.saturating_sub(1) % WAVES_PER_LOOP) + 1 {
            1..=10 => Season::Summer,
            11..=20 => Season::Autumn,
            21..=30 => Season::Winter,
            _ => Season::Void,
        }
    }
}

/// Wave number with the per-loop rebate applied, for budget scaling.
pub fn effective_wave(wave: u32) -> u32 {
    wave.saturating_sub(wave.saturating_sub(1) / WAVES_PER_LOOP * 20)
}

// ============================================================================
// DIRECTOR STATE
// ============================================================================

/// A step the automaton pipeline should execute this frame.
#[derive(Clone, Copy, Debug)]
pub struct StepCommand {
    /// Whether born machines may coin-flip an immediate activation.
    pub activation_step: bool,
}

#[derive(Resource, Debug)]
pub struct DirectorState {
    /// Remaining pre-step pause (wave start or between step cycles).
    pub pause: f32,
    pub step_timer: f32,
    pub steps_since_pause: u32,
    /// Seconds since the current wave started.
    pub wave_elapsed: f32,
    /// Seconds the map has been free of enemies.
    pub no_enemy_for: f32,
    /// Countdown to the next wave, once the current one is cleared.
    pub interwave: Option<f32>,
    /// Special event: remaining active seconds (alternate ruleset while > 0).
    pub event_remaining: f32,
    /// Special event: seconds until another event may trigger.
    pub event_cooldown: f32,
    /// Kind id seeders birth this step; 0 disables.
    pub spawner_override: u8,
    /// Step scheduled by the director, consumed by the step pipeline.
    pub pending_step: Option<StepCommand>,
}

impl Default for DirectorState {
    fn default() -> Self {
        Self {
            pause: WAVE_START_PAUSE,
            step_timer: 0.0,
            steps_since_pause: 0,
            wave_elapsed: 0.0,
            no_enemy_for: 0.0,
            interwave: Some(0.0),
            event_remaining: 0.0,
            event_cooldown: 0.0,
            spawner_override: 0,
            pending_step: None,
        }
    }
}

impl DirectorState {
    pub fn event_active(&self) -> bool {
        self.event_remaining > 0.0
    }

    /// Machines hold fire this long into each wave.
    pub fn in_grace_period(&self) -> bool {
        self.wave_elapsed < WAVE_GRACE_PERIOD
    }
}

// ============================================================================
// WAVE SPAWNING
// ============================================================================

/// Place patterns until the budget runs out. Failed placements refund their
/// cost; the attempt cap bounds the loop on crowded maps. Returns the total
/// budget actually spent.
pub fn spawn_wave_budget<R: Rng + ?Sized>(
    rng: &mut R,
    budget: u32,
    wave: u32,
    season: Season,
    mask: &mut OccupancyMask,
    terrain: &Tilemap,
    population: &mut MachinePopulation,
    ctx: &MachineCtx,
) -> u32 {
    let pool = patterns::season_pool(season);
    let mut remaining = budget;
    let mut attempts = 0u32;

    while remaining > 0 && attempts < SPAWN_ATTEMPT_CAP {
        attempts += 1;
        let Some(pattern) = pool.choose(rng) else { break };
        if pattern.cost > remaining {
            continue;
        }
        let Some(cells) = patterns::place_pattern(rng, pattern, mask, terrain) else {
            continue;
        };
        remaining -= pattern.cost;
        for cell in cells {
            let kind = patterns::pick_kind(rng, wave, season);
            population.insert(cell, Variant::Primary, Machine::fresh(kind, ctx));
        }
    }
    budget - remaining
}

/// Whether this wave gets a center beacon.
pub fn is_beacon_wave(wave: u32) -> bool {
    let w = wave % 10;
    w != 0 && w % 4 == 0
}

fn place_single<R: Rng + ?Sized>(
    rng: &mut R,
    kind: MachineKind,
    mask: &mut OccupancyMask,
    terrain: &Tilemap,
    population: &mut MachinePopulation,
    ctx: &MachineCtx,
) {
    if let Some(cells) = patterns::place_pattern(rng, &SEED, mask, terrain) {
        for cell in cells {
            population.insert(cell, Variant::Primary, Machine::fresh(kind, ctx));
        }
    }
}

fn start_wave(
    rng: &mut impl Rng,
    game: &mut GameState,
    director: &mut DirectorState,
    terrain: &mut Tilemap,
    population: &mut MachinePopulation,
    settings: &UserSettings,
    player_cell: IVec2,
) {
    game.wave += 1;
    game.difficulty += 10.0;
    let wave = game.wave;
    let season = Season::from_wave(wave);
    let tier = settings.difficulty.mults();
    let pacing = season_pacing(season);
    let ctx = MachineCtx { wave, season, health_mult: tier.enemy_health };

    *terrain = Tilemap::generate(terrain.width, terrain.height);
    population.clear_silent();
    let mut mask = OccupancyMask::build(population, player_cell, terrain.width, terrain.height);

    if is_beacon_wave(wave) {
        let center = terrain.closest_open_cell(IVec2::new(terrain.width / 2, terrain.height / 2));
        population.insert(center, Variant::Primary, Machine::fresh(MachineKind::Beacon, &ctx));
        mask.stamp(center);
        info!("wave {wave}: beacon seeded at {center}");
    }

    match wave {
        1 | 2 => {
            // Fixed starter lists: the budget loop starts at wave 3.
            let starters = patterns::starter_patterns(wave);
            for pattern in starters {
                if let Some(cells) = patterns::place_pattern(rng, pattern, &mut mask, terrain) {
                    for cell in cells {
                        let kind = patterns::pick_kind(rng, wave, season);
                        population.insert(cell, Variant::Primary, Machine::fresh(kind, &ctx));
                    }
                }
            }
        }
        _ => {
            let budget = ((effective_wave(wave) as f32 * 1.6 + 4.857)
                * tier.machine_count
                * pacing.count)
                .round()
                .max(5.0) as u32;
            let spent =
                spawn_wave_budget(rng, budget, wave, season, &mut mask, terrain, population, &ctx);
            info!("wave {wave}: spent {spent}/{budget} budget, {} machines", population.len());
        }
    }

    // Friendly furniture: a few caches, terrain-proportional snags.
    let caches = (wave as usize).min(rng.random_range(2..=3));
    for _ in 0..caches {
        place_single(rng, MachineKind::Cache, &mut mask, terrain, population, &ctx);
    }
    if season != Season::Void {
        let snags = (terrain.open_area() as f32 / 500.0 * (rng.random::<f32>() + 0.2)) as usize;
        for _ in 0..snags {
            place_single(rng, MachineKind::Snag, &mut mask, terrain, population, &ctx);
        }
    }

    director.pause = WAVE_START_PAUSE;
    director.step_timer = 0.0;
    director.steps_since_pause = 0;
    director.wave_elapsed = 0.0;
    director.no_enemy_for = 0.0;
    director.interwave = None;
    director.event_remaining = 0.0;
    director.spawner_override = 0;
    director.pending_step = None;
}

// ============================================================================
// DIRECTOR SYSTEM
// ============================================================================

/// Every Nth step is an activation step for the born-cell coin flip; N
/// shrinks as difficulty climbs.
fn activation_step_interval(difficulty: f32) -> u32 {
    ((8.0 - difficulty / 50.0).ceil() as i64).max(4) as u32
}

pub fn director_system(
    time: Res<Time>,
    mut game: ResMut<GameState>,
    mut director: ResMut<DirectorState>,
    mut population: ResMut<MachinePopulation>,
    mut terrain: ResMut<Tilemap>,
    settings: Res<UserSettings>,
    mut wave_started: MessageWriter<WaveStartedMsg>,
    player: Query<&Transform, With<Player>>,
) {
    let dt = time.delta_secs();
    let mut rng = rand::rng();
    director.wave_elapsed += dt;
    director.event_remaining = (director.event_remaining - dt).max(0.0);
    if !director.event_active() {
        director.event_cooldown = (director.event_cooldown - dt).max(0.0);
    }

    let player_cell = player
        .single()
        .map(|t| terrain.world_to_cell(t.translation.truncate()))
        .unwrap_or(terrain.spawn);

    // Interwave: count down, then build the next wave.
    if let Some(remaining) = director.interwave {
        let remaining = remaining - dt;
        if remaining > 0.0 {
            director.interwave = Some(remaining);
        } else {
            start_wave(
                &mut rng,
                &mut game,
                &mut director,
                &mut terrain,
                &mut population,
                &settings,
                player_cell,
            );
            wave_started.write(WaveStartedMsg { wave: game.wave });
        }
        return;
    }

    // Wave clear: enemies gone long enough ends the wave.
    if population.enemy_count() == 0 {
        director.no_enemy_for += dt;
        if director.no_enemy_for >= WAVE_CLEAR_DELAY {
            info!("wave {} cleared", game.wave);
            population.clear_silent();
            director.interwave = Some(INTERWAVE_DELAY);
            return;
        }
    } else {
        director.no_enemy_for = 0.0;
    }

    // Step cadence.
    if director.pause > 0.0 {
        director.pause -= dt;
        return;
    }

    let season = Season::from_wave(game.wave);
    let tier = settings.difficulty.mults();
    let pacing = season_pacing(season);
    let interval = BASE_STEP_INTERVAL * tier.step_interval * pacing.step;

    director.step_timer += dt;
    if director.step_timer < interval {
        return;
    }
    director.step_timer -= interval;

    // Event roll at the start of each step cycle.
    if director.steps_since_pause == 0
        && season != Season::Void
        && population.beacon_alive()
        && !director.event_active()
        && director.event_cooldown <= 0.0
        && rng.random::<f32>() < EVENT_CHANCE
    {
        director.event_remaining = EVENT_DURATION;
        director.event_cooldown = EVENT_COOLDOWN;
        info!("special event: alternate ruleset for {EVENT_DURATION}s");
    }

    // Seeder override cadence: every 3rd step while the event runs, every
    // 7th otherwise. Only autumn runs seeders, but the uniform is harmless
    // elsewhere.
    let step_index = director.steps_since_pause;
    let override_period = if director.event_active() { 3 } else { 7 };
    director.spawner_override = if step_index % override_period == 0 {
        SEEDER_BIRTH_KINDS.choose(&mut rng).map(|k| k.id()).unwrap_or(0)
    } else {
        0
    };

    // Mid-wave top-ups while a beacon holds the wave open.
    if population.beacon_alive() {
        let target = (game.wave * 3 + 4) as usize * 3;
        if population.len() < target && rng.random::<f32>() < MIDWAVE_TOPUP_CHANCE {
            let ctx = MachineCtx { wave: game.wave, season, health_mult: tier.enemy_health };
            let mut mask =
                OccupancyMask::build(&population, player_cell, terrain.width, terrain.height);
            if let Some(pattern) = patterns::minor_pool(season).choose(&mut rng) {
                if let Some(cells) = patterns::place_pattern(&mut rng, pattern, &mut mask, &terrain)
                {
                    for cell in cells {
                        let kind = patterns::pick_kind(&mut rng, game.wave, season);
                        population.insert(cell, Variant::Primary, Machine::fresh(kind, &ctx));
                    }
                }
            }
        }
    }
    if population.len() > BONUS_CACHE_POP && rng.random::<f32>() < BONUS_CACHE_CHANCE {
        let ctx = MachineCtx { wave: game.wave, season, health_mult: tier.enemy_health };
        let mut mask =
            OccupancyMask::build(&population, player_cell, terrain.width, terrain.height);
        place_single(&mut rng, MachineKind::Cache, &mut mask, &terrain, &mut population, &ctx);
    }

    let activation_step = step_index % activation_step_interval(game.difficulty) == 0;
    director.pending_step = Some(StepCommand { activation_step });

    director.steps_since_pause += 1;
    if director.steps_since_pause >= STEPS_PER_CYCLE {
        director.steps_since_pause = 0;
        director.pause = BASE_CYCLE_PAUSE * tier.step_pause * pacing.pause;
    }
}

// ============================================================================
// TESTS
// ============================================================================
