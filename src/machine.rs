//! Machine - the stateful entity bound to one automaton cell.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{AUX_FRESH, WAVES_PER_LOOP};
use crate::systems::director::Season;

// ============================================================================
// MACHINE KINDS
// ============================================================================

/// Closed set of cell kinds. Ordinary kinds fight and obey the automaton;
/// structural kinds (seeder, beacon, cache, snag) are written into the rule
/// texture every tick but are never born or killed by birth/survival rules.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum MachineKind {
    /// Fires orthogonally out of its open sides.
    Block,
    /// Radial area pulse around itself.
    Coil,
    /// Fragile; hatches a ground swarm on destruction (external group).
    Pod,
    /// Aims a single shot at the player.
    Stinger,
    /// Fires diagonally out of its open corners.
    Slant,
    /// Lobs a bomb toward the player.
    Mortar,
    /// Fires a bouncing shot in a random direction.
    Ricochet,
    /// Occasionally fires a long-range line shot at the player.
    Marksman,
    /// Passive filler cell.
    Drone,
    /// Structural: births ordinary kinds under 3-state rulesets.
    Seeder,
    /// Structural: high-value stationary turret; enables special events.
    Beacon,
    /// Structural, friendly: loot container.
    Cache,
    /// Structural, friendly: terrain obstruction.
    Snag,
}

/// Ordinary kinds in weighted spawn order. Wave number gates a prefix of
/// this list so early waves only see the simple kinds.
pub const WEIGHTED_KINDS: [MachineKind; 10] = [
    MachineKind::Block,
    MachineKind::Block,
    MachineKind::Coil,
    MachineKind::Pod,
    MachineKind::Stinger,
    MachineKind::Stinger,
    MachineKind::Slant,
    MachineKind::Mortar,
    MachineKind::Ricochet,
    MachineKind::Marksman,
];

/// Kinds a seeder may birth when the spawner override is active.
pub const SEEDER_BIRTH_KINDS: [MachineKind; 6] = [
    MachineKind::Block,
    MachineKind::Coil,
    MachineKind::Pod,
    MachineKind::Stinger,
    MachineKind::Slant,
    MachineKind::Mortar,
];

impl MachineKind {
    /// Rule texture id. 0 is reserved for empty; structural kinds sit at the
    /// top of the range so the stepper can echo them with a single compare.
    pub fn id(self) -> u8 {
        match self {
            MachineKind::Block => 100,
            MachineKind::Coil => 101,
            MachineKind::Pod => 102,
            MachineKind::Stinger => 103,
            MachineKind::Slant => 104,
            MachineKind::Mortar => 105,
            MachineKind::Ricochet => 106,
            MachineKind::Marksman => 107,
            MachineKind::Drone => 108,
            MachineKind::Snag => 252,
            MachineKind::Seeder => 253,
            MachineKind::Cache => 254,
            MachineKind::Beacon => 255,
        }
    }

    /// Inverse of `id()`. Unknown ids are a data error: loud in dev builds,
    /// treated as empty in release so a corrupt texel can't crash the sim.
    pub fn from_id(id: u8) -> Option<MachineKind> {
        let kind = match id {
            100 => MachineKind::Block,
            101 => MachineKind::Coil,
            102 => MachineKind::Pod,
            103 => MachineKind::Stinger,
            104 => MachineKind::Slant,
            105 => MachineKind::Mortar,
            106 => MachineKind::Ricochet,
            107 => MachineKind::Marksman,
            108 => MachineKind::Drone,
            252 => MachineKind::Snag,
            253 => MachineKind::Seeder,
            254 => MachineKind::Cache,
            255 => MachineKind::Beacon,
            0 => return None,
            other => {
                debug_assert!(false, "unknown machine kind id {other}");
                return None;
            }
        };
        Some(kind)
    }

    /// Structural kinds are exempt from automaton birth/death.
    pub fn is_structural(self) -> bool {
        matches!(
            self,
            MachineKind::Seeder | MachineKind::Beacon | MachineKind::Cache | MachineKind::Snag
        )
    }

    /// Friendly kinds never count as remaining enemies and take no
    /// confusion effect.
    pub fn is_friendly(self) -> bool {
        matches!(self, MachineKind::Cache | MachineKind::Snag)
    }

    /// Base health before wave/season/difficulty scaling.
    pub fn base_health(self, wave: u32) -> f32 {
        match self {
            MachineKind::Pod => 1.0,
            MachineKind::Marksman => 2.0,
            MachineKind::Ricochet => 4.0,
            MachineKind::Snag => 9.0,
            MachineKind::Seeder => 12.0,
            MachineKind::Beacon => (wave as f32 * 2.0 + 20.0) * 3.0,
            _ => 3.0,
        }
    }

    /// Flat tint used by the placeholder sprite renderer.
    pub fn color(self) -> Color {
        match self {
            MachineKind::Block => Color::srgb(0.85, 0.82, 0.62),
            MachineKind::Coil => Color::srgb(0.55, 0.75, 0.90),
            MachineKind::Pod => Color::srgb(0.80, 0.90, 0.60),
            MachineKind::Stinger => Color::srgb(0.90, 0.55, 0.45),
            MachineKind::Slant => Color::srgb(0.70, 0.55, 0.90),
            MachineKind::Mortar => Color::srgb(0.95, 0.45, 0.25),
            MachineKind::Ricochet => Color::srgb(0.95, 0.85, 0.30),
            MachineKind::Marksman => Color::srgb(0.45, 0.90, 0.75),
            MachineKind::Drone => Color::srgb(0.60, 0.60, 0.60),
            MachineKind::Seeder => Color::srgb(0.50, 0.20, 0.55),
            MachineKind::Beacon => Color::srgb(0.95, 0.30, 0.55),
            MachineKind::Cache => Color::srgb(0.89, 0.40, 0.28),
            MachineKind::Snag => Color::srgb(0.39, 0.38, 0.55),
        }
    }
}

/// Weighted kind prefix unlocked at a given wave.
pub fn unlocked_kinds(wave: u32) -> &'static [MachineKind] {
    let cut = match wave {
        0..=1 => 2,
        2 => 3,
        3 => 4,
        4..=10 => 6,
        11..=20 => 8,
        _ => 10,
    };
    &WEIGHTED_KINDS[..cut]
}

// ============================================================================
// STATUS EFFECTS
// ============================================================================

/// Per-entity status effect ids, shared with the wider damage system.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EffectKind {
    Ignite,
    Freeze,
    Confuse,
}

/// Independent countdown timers for each status effect.
#[derive(Clone, Copy, Default, Debug)]
pub struct StatusEffects {
    pub ignite: f32,
    pub freeze: f32,
    pub confuse: f32,
}

impl StatusEffects {
    pub fn apply(&mut self, effect: EffectKind, duration: f32) {
        let slot = match effect {
            EffectKind::Ignite => &mut self.ignite,
            EffectKind::Freeze => &mut self.freeze,
            EffectKind::Confuse => &mut self.confuse,
        };
        *slot = slot.max(duration);
    }

    pub fn tick(&mut self, dt: f32) {
        self.ignite = (self.ignite - dt).max(0.0);
        self.freeze = (self.freeze - dt).max(0.0);
        self.confuse = (self.confuse - dt).max(0.0);
    }

    pub fn frozen(&self) -> bool {
        self.freeze > 0.0
    }

    pub fn confused(&self) -> bool {
        self.confuse > 0.0
    }

    pub fn ignited(&self) -> bool {
        self.ignite > 0.0
    }
}

// ============================================================================
// MACHINE
// ============================================================================

/// Primary machines are live targets; ghosts are the decaying population of
/// 3-state rulesets (translucent, untargetable). A cell never holds both.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Variant {
    Primary,
    Ghost,
}

/// Scaling context captured once per tick so machine construction doesn't
/// need the full game state.
#[derive(Clone, Copy, Debug)]
pub struct MachineCtx {
    pub wave: u32,
    pub season: Season,
    /// Difficulty tier enemy-health multiplier.
    pub health_mult: f32,
}

/// One stateful cell entity. Identity (health, effects, alive_for) survives
/// an automaton step iff the cell stays alive across it.
#[derive(Clone, Debug)]
pub struct Machine {
    pub kind: MachineKind,
    pub health: f32,
    pub max_health: f32,
    /// Seconds since this identity appeared at this cell. Drives scale-in.
    pub alive_for: f32,
    /// Auxiliary bitmap channel; saturated except under 3-state rulesets.
    pub aux: u8,
    /// Per-machine attack timer (beacon burst pacing). Halts while frozen.
    pub timer: f32,
    /// Hit-flash countdown.
    pub hurt: f32,
    pub effects: StatusEffects,
}

impl Machine {
    pub fn new(kind: MachineKind, ctx: &MachineCtx, aux: u8) -> Self {
        let mut health = kind.base_health(ctx.wave);

        // Each 40-wave loop adds +50% health.
        let loops = ctx.wave.saturating_sub(1) / WAVES_PER_LOOP;
        health *= 1.0 + loops as f32 * 0.5;

        match ctx.season {
            Season::Winter => health *= 2.0,
            Season::Void => health *= 1.5,
            _ => {}
        }

        if !kind.is_friendly() {
            health *= ctx.health_mult;
        }

        Self {
            kind,
            health,
            max_health: health,
            alive_for: 0.0,
            aux,
            timer: 0.0,
            hurt: 0.0,
            effects: StatusEffects::default(),
        }
    }

    /// Fresh machine with a saturated aux channel.
    pub fn fresh(kind: MachineKind, ctx: &MachineCtx) -> Self {
        Self::new(kind, ctx, AUX_FRESH)
    }

    /// Spawn/despawn visual scale, (x, y). Ramps in over the first frames
    /// of this identity's life.
    pub fn scale(&self) -> Vec2 {
        Vec2::new(
            (self.alive_for * 20.0).min(1.0),
            (self.alive_for * 30.0).min(1.0),
        )
    }

    /// Per-frame aging. Attack timer holds while frozen.
    pub fn age(&mut self, dt: f32) {
        self.alive_for += dt;
        self.hurt = (self.hurt - dt).max(0.0);
        if !self.effects.frozen() {
            self.timer += dt;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(wave: u32, season: Season) -> MachineCtx {
        MachineCtx { wave, season, health_mult: 1.0 }
    }

    #[test]
    fn kind_ids_round_trip() {
        for kind in [
            MachineKind::Block,
            MachineKind::Coil,
            MachineKind::Pod,
            MachineKind::Stinger,
            MachineKind::Slant,
            MachineKind::Mortar,
            MachineKind::Ricochet,
            MachineKind::Marksman,
            MachineKind::Drone,
            MachineKind::Seeder,
            MachineKind::Beacon,
            MachineKind::Cache,
            MachineKind::Snag,
        ] {
            assert_eq!(MachineKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(MachineKind::from_id(0), None);
    }

    #[test]
    fn health_scales_with_season_and_loop() {
        let base = Machine::fresh(MachineKind::Block, &ctx(5, Season::Summer));
        assert_eq!(base.health, 3.0);

        let winter = Machine::fresh(MachineKind::Block, &ctx(25, Season::Winter));
        assert_eq!(winter.health, 6.0);

        // Wave 41 has completed one loop: +50%.
        let looped = Machine::fresh(MachineKind::Block, &ctx(41, Season::Summer));
        assert_eq!(looped.health, 4.5);
    }

    #[test]
    fn friendly_kinds_ignore_difficulty_multiplier() {
        let c = MachineCtx { wave: 1, season: Season::Summer, health_mult: 2.0 };
        let cache = Machine::fresh(MachineKind::Cache, &c);
        assert_eq!(cache.health, 3.0);
        let block = Machine::fresh(MachineKind::Block, &c);
        assert_eq!(block.health, 6.0);
    }

    #[test]
    fn early_waves_gate_kind_pool() {
        assert_eq!(unlocked_kinds(1).len(), 2);
        assert_eq!(unlocked_kinds(3).len(), 4);
        assert_eq!(unlocked_kinds(30).len(), 10);
        assert!(!unlocked_kinds(30).iter().any(|k| k.is_structural()));
    }

    #[test]
    fn effects_tick_down_independently() {
        let mut fx = StatusEffects::default();
        fx.apply(EffectKind::Freeze, 2.0);
        fx.apply(EffectKind::Ignite, 0.5);
        fx.tick(1.0);
        assert!(fx.frozen());
        assert!(!fx.ignited());
        // Re-applying never shortens a running timer.
        fx.apply(EffectKind::Freeze, 0.1);
        assert!(fx.freeze > 0.9);
    }
}
