//! MachinePopulation - sole owner of the sparse machine map, plus the
//! reconciler that carries identity across automaton generations.

use bevy::prelude::*;
use hashbrown::{HashMap, HashSet};

use crate::constants::AUX_DECAYING;
use crate::grid::RuleTexture;
use crate::machine::{EffectKind, Machine, MachineCtx, MachineKind, Variant};
use crate::terrain::Tilemap;

// ============================================================================
// TYPES
// ============================================================================

/// A cell whose machine just vanished, kept one beat for the fade render.
#[derive(Clone, Copy, Debug)]
pub struct FadeCell {
    pub cell: IVec2,
    pub kind: MachineKind,
    pub age: f32,
}

/// Result of applying direct damage to a cell.
#[derive(Debug)]
pub enum DamageResult {
    /// No primary machine at that cell.
    Missed,
    Hurt,
    /// The machine died; side effects belong to the caller.
    Killed(Machine),
}

/// What one reconcile pass changed, for downstream systems.
#[derive(Default, Debug)]
pub struct ReconcileOutcome {
    /// Cells where a brand-new primary machine appeared.
    pub born: Vec<IVec2>,
    /// Cells whose machine identity left the map entirely.
    pub died: Vec<(IVec2, MachineKind)>,
}

// ============================================================================
// POPULATION
// ============================================================================

/// The machine map. Primaries are live targets; ghosts are the decaying
/// population of 3-state rulesets. After reconcile no cell holds both.
#[derive(Resource, Default, Debug)]
pub struct MachinePopulation {
    map: HashMap<(IVec2, Variant), Machine>,
    /// Just-died cells, drained by the fade render.
    pub fading: Vec<FadeCell>,
}

impl MachinePopulation {
    pub fn insert(&mut self, cell: IVec2, variant: Variant, machine: Machine) {
        self.map.insert((cell, variant), machine);
    }

    pub fn remove(&mut self, cell: IVec2, variant: Variant) -> Option<Machine> {
        self.map.remove(&(cell, variant))
    }

    pub fn get(&self, cell: IVec2, variant: Variant) -> Option<&Machine> {
        self.map.get(&(cell, variant))
    }

    pub fn machine_at(&self, cell: IVec2) -> Option<&Machine> {
        self.map.get(&(cell, Variant::Primary))
    }

    pub fn machine_at_mut(&mut self, cell: IVec2) -> Option<&mut Machine> {
        self.map.get_mut(&(cell, Variant::Primary))
    }

    /// Every machine with its cell, both variants.
    pub fn iter(&self) -> impl Iterator<Item = (IVec2, &Machine)> {
        self.map.iter().map(|((cell, _), m)| (*cell, m))
    }

    pub fn iter_with_variant(&self) -> impl Iterator<Item = (IVec2, Variant, &Machine)> {
        self.map.iter().map(|((cell, v), m)| (*cell, *v, m))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (IVec2, Variant, &mut Machine)> {
        self.map.iter_mut().map(|((cell, v), m)| (*cell, *v, m))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Primary, non-friendly machines still standing.
    pub fn enemy_count(&self) -> usize {
        self.map
            .iter()
            .filter(|((_, v), m)| *v == Variant::Primary && !m.kind.is_friendly())
            .count()
    }

    pub fn beacon_alive(&self) -> bool {
        self.map
            .iter()
            .any(|((_, v), m)| *v == Variant::Primary && m.kind == MachineKind::Beacon)
    }

    /// Wave teardown: everything goes, no death side effects.
    pub fn clear_silent(&mut self) {
        self.map.clear();
        self.fading.clear();
    }

    /// Direct damage to the primary at `cell`. Structural kinds are immune
    /// to automaton death but not to this.
    pub fn damage(&mut self, cell: IVec2, amount: f32) -> DamageResult {
        let Some(mut machine) = self.map.remove(&(cell, Variant::Primary)) else {
            return DamageResult::Missed;
        };
        machine.health -= amount;
        machine.hurt = 0.15;
        if machine.health <= 0.0 {
            self.fading.push(FadeCell { cell, kind: machine.kind, age: 0.0 });
            DamageResult::Killed(machine)
        } else {
            self.map.insert((cell, Variant::Primary), machine);
            DamageResult::Hurt
        }
    }

    /// Apply a status effect to the primary at `cell`. Friendly machines
    /// shrug off confusion.
    pub fn apply_effect(&mut self, cell: IVec2, effect: EffectKind, duration: f32) -> bool {
        let Some(machine) = self.map.get_mut(&(cell, Variant::Primary)) else {
            return false;
        };
        if effect == EffectKind::Confuse && machine.kind.is_friendly() {
            return false;
        }
        machine.effects.apply(effect, duration);
        true
    }

    // ========================================================================
    // RECONCILE
    // ========================================================================

    /// Rebuild the map from the stepped texture, carrying identity for every
    /// cell alive in both generations. Terrain-blocked texels are forced
    /// empty. Deaths here are reported, not destroyed: the automaton kills
    /// silently and the caller decides what (if anything) to do about it.
    pub fn reconcile(
        &mut self,
        next: &RuleTexture,
        terrain: &Tilemap,
        three_state: bool,
        ctx: &MachineCtx,
    ) -> ReconcileOutcome {
        let old = std::mem::take(&mut self.map);
        let mut outcome = ReconcileOutcome::default();

        // Cells occupied by either variant before the step.
        let mut unaccounted: HashSet<IVec2> = old.keys().map(|(cell, _)| *cell).collect();

        for (cell, texel) in next.cells() {
            if !texel.occupied() || terrain.is_blocked(cell) {
                continue;
            }
            let Some(kind) = texel.kind() else { continue };

            let variant = if three_state && !kind.is_structural() && texel.aux == AUX_DECAYING {
                Variant::Ghost
            } else {
                Variant::Primary
            };

            let carried = old
                .get(&(cell, Variant::Primary))
                .or_else(|| old.get(&(cell, Variant::Ghost)))
                .filter(|m| m.kind == kind)
                .cloned();

            match carried {
                Some(mut machine) => {
                    machine.aux = texel.aux;
                    self.map.insert((cell, variant), machine);
                    unaccounted.remove(&cell);
                }
                None => {
                    let machine = Machine::new(kind, ctx, texel.aux);
                    self.map.insert((cell, variant), machine);
                    if variant == Variant::Primary {
                        outcome.born.push(cell);
                    }
                }
            }
        }

        // Whatever identity found no new cell is gone.
        for cell in unaccounted {
            let machine = old
                .get(&(cell, Variant::Primary))
                .or_else(|| old.get(&(cell, Variant::Ghost)));
            if let Some(m) = machine {
                self.fading.push(FadeCell { cell, kind: m.kind, age: 0.0 });
                outcome.died.push((cell, m.kind));
            }
        }

        outcome
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automata::{step, Ruleset, StepOverrides};
    use crate::constants::AUX_FRESH;
    use crate::grid::Texel;
    use crate::systems::director::Season;

    fn ctx() -> MachineCtx {
        MachineCtx { wave: 1, season: Season::Summer, health_mult: 1.0 }
    }

    fn block_at(pop: &mut MachinePopulation, x: i32, y: i32) {
        pop.insert(
            IVec2::new(x, y),
            Variant::Primary,
            Machine::fresh(MachineKind::Block, &ctx()),
        );
    }

    #[test]
    fn survivor_keeps_damaged_health_across_step() {
        let mut pop = MachinePopulation::default();
        // Still life: 2x2 block.
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            block_at(&mut pop, x, y);
        }
        let target = IVec2::new(1, 1);
        assert!(matches!(pop.damage(target, 1.25), DamageResult::Hurt));

        let terrain = Tilemap::open(4, 4);
        let tex = RuleTexture::encode(&pop, 4, 4);
        let next = step(&tex, Ruleset::Conway, &StepOverrides::default());
        let outcome = pop.reconcile(&next, &terrain, false, &ctx());

        assert!(outcome.born.is_empty());
        assert!(outcome.died.is_empty());
        let survivor = pop.machine_at(target).unwrap();
        assert_eq!(survivor.health, 3.0 - 1.25);
        assert_eq!(survivor.max_health, 3.0);
    }

    #[test]
    fn births_and_deaths_are_reported() {
        let mut pop = MachinePopulation::default();
        // Horizontal blinker: ends die, two new cells are born.
        for x in 1..=3 {
            block_at(&mut pop, x, 2);
        }
        let terrain = Tilemap::open(5, 5);
        let tex = RuleTexture::encode(&pop, 5, 5);
        let next = step(&tex, Ruleset::Conway, &StepOverrides::default());
        let outcome = pop.reconcile(&next, &terrain, false, &ctx());

        let mut born = outcome.born.clone();
        born.sort_by_key(|c| (c.y, c.x));
        assert_eq!(born, vec![IVec2::new(2, 1), IVec2::new(2, 3)]);
        assert_eq!(outcome.died.len(), 2);
        assert_eq!(pop.len(), 3);
        for cell in born {
            assert_eq!(pop.machine_at(cell).unwrap().alive_for, 0.0);
        }
    }

    #[test]
    fn terrain_blocked_texels_decode_empty() {
        let mut pop = MachinePopulation::default();
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            block_at(&mut pop, x, y);
        }
        // Block one of the still-life cells; the machine there must drop.
        let blocked = IVec2::new(2, 2);
        let mut terrain = Tilemap::open(4, 4);
        terrain.make_solid(blocked);
        let tex = RuleTexture::encode(&pop, 4, 4);
        let next = step(&tex, Ruleset::Conway, &StepOverrides::default());
        pop.reconcile(&next, &terrain, false, &ctx());
        assert!(pop.machine_at(blocked).is_none());
        assert!(pop.machine_at(IVec2::new(1, 1)).is_some());
    }

    #[test]
    fn decaying_texels_route_to_ghosts() {
        let mut pop = MachinePopulation::default();
        block_at(&mut pop, 1, 1);
        let terrain = Tilemap::open(3, 3);
        let tex = RuleTexture::encode(&pop, 3, 3);
        let next = step(&tex, Ruleset::Brain, &StepOverrides::default());
        pop.reconcile(&next, &terrain, true, &ctx());

        let cell = IVec2::new(1, 1);
        assert!(pop.machine_at(cell).is_none());
        assert!(pop
            .iter_with_variant()
            .any(|(c, v, _)| c == cell && v == Variant::Ghost));
        // Ghosts are not enemies.
        assert_eq!(pop.enemy_count(), 0);
    }

    #[test]
    fn structural_damage_kill_still_works() {
        let mut pop = MachinePopulation::default();
        let cell = IVec2::new(0, 0);
        pop.insert(cell, Variant::Primary, Machine::fresh(MachineKind::Cache, &ctx()));

        // Step immunity: a lone cache survives any generation.
        let terrain = Tilemap::open(3, 3);
        let tex = RuleTexture::encode(&pop, 3, 3);
        let next = step(&tex, Ruleset::Conway, &StepOverrides::default());
        pop.reconcile(&next, &terrain, false, &ctx());
        assert!(pop.machine_at(cell).is_some());

        // Direct damage still kills it.
        match pop.damage(cell, 100.0) {
            DamageResult::Killed(m) => assert_eq!(m.kind, MachineKind::Cache),
            other => panic!("expected kill, got {other:?}"),
        }
        assert!(pop.machine_at(cell).is_none());
    }

    #[test]
    fn effects_only_land_on_primaries_and_spare_friendlies_from_confusion() {
        let mut pop = MachinePopulation::default();
        let enemy = IVec2::new(0, 0);
        let cache = IVec2::new(1, 0);
        block_at(&mut pop, 0, 0);
        pop.insert(cache, Variant::Primary, Machine::fresh(MachineKind::Cache, &ctx()));

        assert!(pop.apply_effect(enemy, EffectKind::Ignite, 4.0));
        assert!(pop.machine_at(enemy).unwrap().effects.ignited());
        assert!(!pop.apply_effect(cache, EffectKind::Confuse, 4.0));
        assert!(pop.apply_effect(cache, EffectKind::Freeze, 1.0));
        assert!(!pop.apply_effect(IVec2::new(9, 9), EffectKind::Ignite, 1.0));
    }

    #[test]
    fn fresh_aux_texel_with_kind_change_is_a_new_identity() {
        let mut pop = MachinePopulation::default();
        let cell = IVec2::new(0, 0);
        pop.insert(cell, Variant::Primary, Machine::fresh(MachineKind::Block, &ctx()));
        let mut tex = RuleTexture::new(1, 1);
        tex.set(cell, Texel { kind_id: MachineKind::Coil.id(), aux: AUX_FRESH });
        let terrain = Tilemap::open(1, 1);
        let outcome = pop.reconcile(&tex, &terrain, false, &ctx());
        assert_eq!(outcome.born, vec![cell]);
        assert_eq!(pop.machine_at(cell).unwrap().kind, MachineKind::Coil);
        assert_eq!(pop.machine_at(cell).unwrap().alive_for, 0.0);
    }
}
