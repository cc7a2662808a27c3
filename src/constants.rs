//! Constants - Tuning parameters for the machine swarm simulation

// ============================================================================
// GRID / MAP CONSTANTS
// ============================================================================

/// Tilemap width in cells. The automaton texture is sized to this.
pub const MAP_WIDTH: usize = 60;

/// Tilemap height in cells.
pub const MAP_HEIGHT: usize = 40;

/// Pixel size of one tile (world units per cell).
pub const TILE_SIZE: f32 = 16.0;

/// Pattern placements stay this many cells away from the map border.
pub const PLACEMENT_MARGIN: i32 = 3;

/// Half-width of the keep-out box stamped around the player when building
/// the spawn occupancy mask (5x5 box total).
pub const PLAYER_SAFE_RADIUS: i32 = 2;

// ============================================================================
// AUTOMATON STEP CADENCE
// ============================================================================

/// Base seconds between automaton steps before pacing multipliers.
pub const BASE_STEP_INTERVAL: f32 = 0.1875;

/// Steps per cycle; a pacing pause is inserted after each full cycle.
pub const STEPS_PER_CYCLE: u32 = 16;

/// Base seconds of pause between step cycles (scaled by pacing).
pub const BASE_CYCLE_PAUSE: f32 = 1.0;

/// Seconds of pause at the start of each wave before stepping begins.
pub const WAVE_START_PAUSE: f32 = 5.0;

/// Seconds after a wave starts during which machines hold fire.
pub const WAVE_GRACE_PERIOD: f32 = 2.0;

// ============================================================================
// ACTIVATION SCHEDULER
// ============================================================================

/// Number of rotating activation groups. Cell group = (x + y) % groups.
pub const ACTIVATION_GROUPS: i32 = 16;

/// Activation counter advances this many times per second.
pub const ACTIVATION_RATE: f32 = 16.0;

/// Chance a machine born on an activation step fires immediately.
pub const BORN_ACTIVATION_CHANCE: f32 = 0.5;

// ============================================================================
// AUX CHANNEL (3-state rulesets)
// ============================================================================

/// Aux value for a fresh (fully alive) cell. Saturated for 2-state rules.
pub const AUX_FRESH: u8 = 255;

/// Aux value for a decaying cell under a 3-state ruleset.
pub const AUX_DECAYING: u8 = 128;

// ============================================================================
// WAVE / EVENT DIRECTOR
// ============================================================================

/// Seconds with no enemies remaining before the wave ends.
pub const WAVE_CLEAR_DELAY: f32 = 4.0;

/// Seconds between waves before the next one spawns.
pub const INTERWAVE_DELAY: f32 = 2.0;

/// Special event: cooldown before another event can trigger (seconds).
pub const EVENT_COOLDOWN: f32 = 15.0;

/// Special event: duration of the alternate ruleset (seconds).
pub const EVENT_DURATION: f32 = 18.0;

/// Special event: chance rolled at the start of each step cycle.
pub const EVENT_CHANCE: f32 = 0.2;

/// Total placement attempts before the budget loop gives up.
pub const SPAWN_ATTEMPT_CAP: u32 = 1000;

/// Random placements tried per pattern before reporting failure.
pub const PLACEMENT_TRIES: u32 = 50;

/// Mid-wave top-up: chance per step while the beacon lives and the
/// population is under its threshold.
pub const MIDWAVE_TOPUP_CHANCE: f32 = 0.1;

/// Bonus cache: chance per step once the population exceeds the threshold.
pub const BONUS_CACHE_CHANCE: f32 = 0.02;

/// Population threshold for the bonus cache roll.
pub const BONUS_CACHE_POP: usize = 45;

/// Waves loop every this many; difficulty jumps back 20 waves per loop.
pub const WAVES_PER_LOOP: u32 = 40;

// ============================================================================
// STRUCTURAL CLEANUP
// ============================================================================

/// Caches/snags self-remove once fewer than this many machines remain and
/// no enemies are left. Pacing heuristic, tunable.
pub const SOFT_CLEAR_THRESHOLD: usize = 64;

// ============================================================================
// RENDER / VISUALS
// ============================================================================

/// Seconds a just-died cell keeps fading after an automaton step.
pub const DECAY_FADE_DURATION: f32 = 1.0 / 15.0;

/// Alpha applied to ghost-population machines.
pub const GHOST_ALPHA: f32 = 0.4;

// ============================================================================
// COMBAT / PROJECTILES
// ============================================================================

/// Default projectile speed (pixels/sec).
pub const PROJECTILE_SPEED: f32 = 90.0;

/// Default projectile lifetime (seconds).
pub const PROJECTILE_LIFETIME: f32 = 4.0;

/// Ignite effect: damage per second while burning.
pub const IGNITE_DPS: f32 = 1.0;

/// Default ignite duration when applied by splash sources.
pub const IGNITE_DURATION: f32 = 4.2;
