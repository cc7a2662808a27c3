//! Automaton stepper - birth/survival rules evaluated over the rule texture.

use bevy::math::IVec2;

use crate::constants::{AUX_DECAYING, AUX_FRESH};
use crate::grid::{RuleTexture, Texel};
use crate::machine::MachineKind;
use crate::systems::director::Season;

// ============================================================================
// RULESETS
// ============================================================================

/// Birth/survival neighbor-count sets for one ruleset. 3-state rules route
/// dying cells through a decaying generation instead of killing outright.
#[derive(Clone, Copy, Debug)]
pub struct RuleDef {
    pub birth: &'static [u8],
    pub survival: &'static [u8],
    pub three_state: bool,
}

/// The seven rulesets. Each season runs one; the special event swaps in the
/// season's alternate.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Ruleset {
    Conway,
    HighLife,
    Brain,
    Migraine,
    Blobell,
    Blursed,
    LowDeath,
}

impl Ruleset {
    pub fn def(self) -> RuleDef {
        match self {
            Ruleset::Conway => RuleDef { birth: &[3], survival: &[2, 3], three_state: false },
            Ruleset::HighLife => RuleDef { birth: &[3, 6], survival: &[2, 3], three_state: false },
            Ruleset::Brain => RuleDef { birth: &[2], survival: &[], three_state: true },
            Ruleset::Migraine => RuleDef { birth: &[2], survival: &[], three_state: true },
            Ruleset::Blobell => RuleDef { birth: &[5], survival: &[3, 4, 5, 6], three_state: false },
            Ruleset::Blursed => {
                RuleDef { birth: &[3, 7, 8], survival: &[3, 4, 5, 6, 7], three_state: false }
            }
            Ruleset::LowDeath => {
                RuleDef { birth: &[3, 6, 8], survival: &[2, 3, 8], three_state: false }
            }
        }
    }

    /// Season's base ruleset, or its event alternate while the special event
    /// runs. Void has no alternate (events never trigger there).
    pub fn for_season(season: Season, event_active: bool) -> Ruleset {
        match (season, event_active) {
            (Season::Summer, false) => Ruleset::Conway,
            (Season::Summer, true) => Ruleset::HighLife,
            (Season::Autumn, false) => Ruleset::Brain,
            (Season::Autumn, true) => Ruleset::Migraine,
            (Season::Winter, false) => Ruleset::Blobell,
            (Season::Winter, true) => Ruleset::Blursed,
            (Season::Void, _) => Ruleset::LowDeath,
        }
    }
}

// ============================================================================
// STEP
// ============================================================================

/// Per-step uniforms.
#[derive(Clone, Copy, Default, Debug)]
pub struct StepOverrides {
    /// Kind id substituted into seeder-adjacent births; 0 disables.
    pub spawner_override: u8,
}

const NEIGHBORS: [IVec2; 8] = [
    IVec2::new(-1, -1),
    IVec2::new(0, -1),
    IVec2::new(1, -1),
    IVec2::new(-1, 0),
    IVec2::new(1, 0),
    IVec2::new(-1, 1),
    IVec2::new(0, 1),
    IVec2::new(1, 1),
];

/// Whether a texel counts as an alive neighbor. Decaying cells never count;
/// structural kinds always do.
fn counts_as_alive(texel: Texel) -> bool {
    if !texel.occupied() {
        return false;
    }
    match texel.kind() {
        Some(kind) if kind.is_structural() => true,
        Some(_) => texel.aux == AUX_FRESH,
        None => false,
    }
}

/// Kind id for a newly born cell: the most common ordinary kind among the
/// counting neighbors. Structural neighbors count toward the birth threshold
/// but never donate a kind, except a seeder, which donates the spawner
/// override (or a plain block without one).
fn born_kind(src: &RuleTexture, cell: IVec2, overrides: &StepOverrides) -> Option<u8> {
    let mut tally: [(u8, u8); 8] = [(0, 0); 8];
    let mut seeder_adjacent = false;

    for offset in NEIGHBORS {
        let texel = src.get(cell + offset);
        if !counts_as_alive(texel) {
            continue;
        }
        match texel.kind() {
            Some(MachineKind::Seeder) => seeder_adjacent = true,
            Some(kind) if kind.is_structural() => {}
            Some(kind) => {
                let id = kind.id();
                if let Some(slot) = tally.iter_mut().find(|(k, n)| *k == id || *n == 0) {
                    slot.0 = id;
                    slot.1 += 1;
                }
            }
            None => {}
        }
    }

    let donor = tally
        .iter()
        .filter(|(_, n)| *n > 0)
        .max_by_key(|(_, n)| *n)
        .map(|(k, _)| *k);

    match donor {
        Some(id) => Some(id),
        None if seeder_adjacent => {
            if overrides.spawner_override != 0 {
                Some(overrides.spawner_override)
            } else {
                Some(MachineKind::Block.id())
            }
        }
        None => None,
    }
}

/// One automaton generation. Pure double-buffered scan; `src` is read-only
/// and the result is a fresh texture of the same dimensions.
pub fn step(src: &RuleTexture, ruleset: Ruleset, overrides: &StepOverrides) -> RuleTexture {
    let def = ruleset.def();
    let mut next = RuleTexture::new(src.width(), src.height());

    for (cell, texel) in src.cells() {
        // Structural kinds are exempt: echoed verbatim.
        if let Some(kind) = texel.kind() {
            if kind.is_structural() {
                next.set(cell, texel);
                continue;
            }
        }

        let count = NEIGHBORS
            .iter()
            .filter(|&&offset| counts_as_alive(src.get(cell + offset)))
            .count() as u8;

        if texel.occupied() {
            if def.three_state {
                // fresh -> decaying -> dead, regardless of neighbors.
                if texel.aux == AUX_FRESH {
                    next.set(cell, Texel { kind_id: texel.kind_id, aux: AUX_DECAYING });
                }
            } else if def.survival.contains(&count) {
                next.set(cell, Texel { kind_id: texel.kind_id, aux: AUX_FRESH });
            }
            // Decaying cells occupy their texel, so birth can't fire here.
        } else if def.birth.contains(&count) {
            if let Some(kind_id) = born_kind(src, cell, overrides) {
                next.set(cell, Texel { kind_id, aux: AUX_FRESH });
            }
        }
    }

    next
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tex_from(rows: &[&str]) -> RuleTexture {
        let mut tex = RuleTexture::new(rows[0].len() as i32, rows.len() as i32);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let texel = match ch {
                    '#' => Texel { kind_id: MachineKind::Block.id(), aux: AUX_FRESH },
                    'B' => Texel { kind_id: MachineKind::Beacon.id(), aux: AUX_FRESH },
                    'S' => Texel { kind_id: MachineKind::Seeder.id(), aux: AUX_FRESH },
                    _ => Texel::EMPTY,
                };
                tex.set(IVec2::new(x as i32, y as i32), texel);
            }
        }
        tex
    }

    fn alive_cells(tex: &RuleTexture) -> Vec<IVec2> {
        tex.cells().filter(|(_, t)| t.occupied()).map(|(c, _)| c).collect()
    }

    #[test]
    fn conway_block_is_still() {
        let tex = tex_from(&["....", ".##.", ".##.", "...."]);
        let next = step(&tex, Ruleset::Conway, &StepOverrides::default());
        assert_eq!(alive_cells(&next), alive_cells(&tex));
    }

    #[test]
    fn conway_blinker_oscillates() {
        let horizontal = tex_from(&[".....", ".....", ".###.", ".....", "....."]);
        let next = step(&horizontal, Ruleset::Conway, &StepOverrides::default());
        let mut cells = alive_cells(&next);
        cells.sort_by_key(|c| (c.y, c.x));
        assert_eq!(cells, vec![IVec2::new(2, 1), IVec2::new(2, 2), IVec2::new(2, 3)]);

        let back = step(&next, Ruleset::Conway, &StepOverrides::default());
        assert_eq!(alive_cells(&back).len(), 3);
        assert_eq!(
            {
                let mut c = alive_cells(&back);
                c.sort_by_key(|c| (c.y, c.x));
                c
            },
            {
                let mut c = alive_cells(&horizontal);
                c.sort_by_key(|c| (c.y, c.x));
                c
            }
        );
    }

    #[test]
    fn conway_glider_translates_in_four_steps() {
        let glider = tex_from(&[
            ".#......",
            "..#.....",
            "###.....",
            "........",
            "........",
            "........",
        ]);
        let mut tex = glider.clone();
        for _ in 0..4 {
            tex = step(&tex, Ruleset::Conway, &StepOverrides::default());
        }
        let mut expect: Vec<IVec2> =
            alive_cells(&glider).iter().map(|c| *c + IVec2::new(1, 1)).collect();
        expect.sort_by_key(|c| (c.y, c.x));
        let mut got = alive_cells(&tex);
        got.sort_by_key(|c| (c.y, c.x));
        assert_eq!(got, expect);
    }

    #[test]
    fn no_wraparound_at_edges() {
        // A blinker pressed against the top edge loses its off-grid neighbor
        // rather than wrapping to the bottom row.
        let tex = tex_from(&["###", "...", "..."]);
        let next = step(&tex, Ruleset::Conway, &StepOverrides::default());
        let mut cells = alive_cells(&next);
        cells.sort_by_key(|c| (c.y, c.x));
        assert_eq!(cells, vec![IVec2::new(1, 0), IVec2::new(1, 1)]);
    }

    #[test]
    fn structural_cells_echo_and_count_as_neighbors() {
        // A lone beacon survives anything; two blocks next to it plus the
        // beacon give the empty diagonal three neighbors -> birth.
        let tex = tex_from(&["B#.", "#..", "..."]);
        let next = step(&tex, Ruleset::Conway, &StepOverrides::default());
        assert_eq!(next.get(IVec2::new(0, 0)).kind(), Some(MachineKind::Beacon));
        assert!(next.get(IVec2::new(1, 1)).occupied());
        // The beacon can't donate a kind; the block neighbors do.
        assert_eq!(next.get(IVec2::new(1, 1)).kind(), Some(MachineKind::Block));
    }

    #[test]
    fn three_state_decays_then_dies() {
        let tex = tex_from(&["...", ".#.", "..."]);
        let next = step(&tex, Ruleset::Brain, &StepOverrides::default());
        let mid = next.get(IVec2::new(1, 1));
        assert!(mid.occupied());
        assert_eq!(mid.aux, AUX_DECAYING);

        let after = step(&next, Ruleset::Brain, &StepOverrides::default());
        assert!(!after.get(IVec2::new(1, 1)).occupied());
    }

    #[test]
    fn decaying_cells_block_birth_but_do_not_count() {
        // Two fresh cells diagonal to an empty cell: 2 neighbors -> brain
        // birth. A decaying cell at that empty cell must block it.
        let mut tex = tex_from(&["#.#", "...", "..."]);
        let target = IVec2::new(1, 0);
        tex.set(target, Texel { kind_id: MachineKind::Block.id(), aux: AUX_DECAYING });
        let next = step(&tex, Ruleset::Brain, &StepOverrides::default());
        assert!(!next.get(target).occupied(), "decaying cell must die, not rebirth");

        // And a decaying neighbor contributes nothing to counts: with one
        // fresh and one decaying neighbor, brain birth (2) does not fire.
        let mut tex2 = tex_from(&["#..", "...", "..."]);
        tex2.set(IVec2::new(2, 0), Texel { kind_id: MachineKind::Block.id(), aux: AUX_DECAYING });
        let next2 = step(&tex2, Ruleset::Brain, &StepOverrides::default());
        assert!(!next2.get(IVec2::new(1, 0)).occupied());
    }

    #[test]
    fn seeder_birth_uses_spawner_override() {
        // Brain: empty cell with exactly two counting neighbors, both
        // seeders. Without an override the birth falls back to a block.
        let tex = tex_from(&["S.S", "...", "..."]);
        let overrides = StepOverrides { spawner_override: MachineKind::Stinger.id() };
        let next = step(&tex, Ruleset::Brain, &overrides);
        assert_eq!(next.get(IVec2::new(1, 0)).kind(), Some(MachineKind::Stinger));

        let plain = step(&tex, Ruleset::Brain, &StepOverrides::default());
        assert_eq!(plain.get(IVec2::new(1, 0)).kind(), Some(MachineKind::Block));
    }

    #[test]
    fn born_kind_is_majority_of_contributors() {
        let mut tex = RuleTexture::new(3, 3);
        let fresh = |k: MachineKind| Texel { kind_id: k.id(), aux: AUX_FRESH };
        tex.set(IVec2::new(0, 0), fresh(MachineKind::Stinger));
        tex.set(IVec2::new(2, 0), fresh(MachineKind::Stinger));
        tex.set(IVec2::new(1, 1), fresh(MachineKind::Coil));
        let next = step(&tex, Ruleset::Conway, &StepOverrides::default());
        assert_eq!(next.get(IVec2::new(1, 0)).kind(), Some(MachineKind::Stinger));
    }

    #[test]
    fn season_selects_ruleset_family() {
        assert_eq!(Ruleset::for_season(Season::Summer, false), Ruleset::Conway);
        assert_eq!(Ruleset::for_season(Season::Summer, true), Ruleset::HighLife);
        assert_eq!(Ruleset::for_season(Season::Autumn, true), Ruleset::Migraine);
        assert_eq!(Ruleset::for_season(Season::Winter, false), Ruleset::Blobell);
        assert_eq!(Ruleset::for_season(Season::Void, true), Ruleset::LowDeath);
    }
}
