//! Authored spawn patterns and the rejection-sampled placement pass.

use bevy::math::IVec2;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::constants::{PLACEMENT_MARGIN, PLACEMENT_TRIES, PLAYER_SAFE_RADIUS};
use crate::machine::{unlocked_kinds, MachineKind};
use crate::population::MachinePopulation;
use crate::systems::director::Season;
use crate::terrain::Tilemap;

// ============================================================================
// PATTERN
// ============================================================================

/// A small authored bitmap ('#' = machine cell) with a wave-budget cost.
#[derive(Clone, Copy, Debug)]
pub struct Pattern {
    pub name: &'static str,
    pub cost: u32,
    rows: &'static [&'static str],
}

impl Pattern {
    const fn new(name: &'static str, cost: u32, rows: &'static [&'static str]) -> Self {
        Self { name, cost, rows }
    }

    fn base_size(&self) -> IVec2 {
        IVec2::new(self.rows[0].len() as i32, self.rows.len() as i32)
    }

    /// Footprint after `rotation` quarter turns.
    pub fn size(&self, rotation: u8) -> IVec2 {
        let s = self.base_size();
        if rotation % 2 == 0 { s } else { IVec2::new(s.y, s.x) }
    }

    /// Machine cell offsets after rotation, relative to the top-left corner.
    pub fn cells(&self, rotation: u8) -> Vec<IVec2> {
        let IVec2 { x: w, y: h } = self.base_size();
        let mut out = Vec::new();
        for (y, row) in self.rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                if ch != '#' {
                    continue;
                }
                let (x, y) = (x as i32, y as i32);
                out.push(match rotation % 4 {
                    0 => IVec2::new(x, y),
                    1 => IVec2::new(h - 1 - y, x),
                    2 => IVec2::new(w - 1 - x, h - 1 - y),
                    _ => IVec2::new(y, w - 1 - x),
                });
            }
        }
        out
    }

}

// ============================================================================
// SEASON POOLS
// ============================================================================

/// One lone machine cell; used for cache and snag seeding.
pub const SEED: Pattern = Pattern::new("seed", 1, &["#"]);

const BLINKER: Pattern = Pattern::new("blinker", 2, &["###"]);
const TUB: Pattern = Pattern::new("tub", 2, &[".#.", "#.#", ".#."]);
const FLIPPER: Pattern = Pattern::new("flipper", 4, &["##..", "##..", "..##", "..##"]);
const GLIDER: Pattern = Pattern::new("glider", 5, &[".#.", "..#", "###"]);
const LWSS: Pattern = Pattern::new("lwss", 8, &["#..#.", "....#", "#...#", ".####"]);
const MWSS: Pattern =
    Pattern::new("mwss", 10, &["..#...", "#...#.", ".....#", "#....#", ".#####"]);
const GUN: Pattern = Pattern::new(
    "gun",
    50,
    &[
        "........................#...........",
        "......................#.#...........",
        "............##......##............##",
        "...........#...#....##............##",
        "##........#.....#...##..............",
        "##........#...#.##....#.#...........",
        "..........#.....#.......#...........",
        "...........#...#....................",
        "............##......................",
    ],
);

const PAIR: Pattern = Pattern::new("pair", 3, &["##"]);
const ARROW: Pattern = Pattern::new("arrow", 5, &["#..", ".##", "#.."]);
const RING: Pattern = Pattern::new("ring", 8, &[".##.", "#..#", ".##."]);

const NUGGET: Pattern = Pattern::new("nugget", 3, &["##", "##"]);
const BAR: Pattern = Pattern::new("bar", 5, &["####", "####"]);
const CLUMP: Pattern = Pattern::new("clump", 6, &["###", "###", "###"]);
const DONUT: Pattern = Pattern::new("donut", 6, &["###", "#.#", "###"]);
const WEDGE: Pattern = Pattern::new("wedge", 7, &["#..", "##.", "###"]);
const SLAB: Pattern = Pattern::new("slab", 9, &["####", "####", "####"]);
const CROSS: Pattern = Pattern::new("cross", 10, &[".##.", "####", "####", ".##."]);

const HUSK: Pattern = Pattern::new("husk", 7, &["###", "#.#", "###"]);
const HOOK: Pattern = Pattern::new("hook", 6, &["##.", ".##", ".#."]);

pub fn season_pool(season: Season) -> &'static [Pattern] {
    match season {
        Season::Summer => &[BLINKER, TUB, FLIPPER, GLIDER, LWSS, MWSS, GUN],
        Season::Autumn => &[PAIR, ARROW, RING],
        Season::Winter => &[NUGGET, BAR, CLUMP, DONUT, WEDGE, SLAB, CROSS],
        Season::Void => &[HUSK, HOOK, BLINKER, GLIDER, LWSS, MWSS],
    }
}

/// Fixed placements for the first two waves; the budget loop takes over at
/// wave 3.
pub fn starter_patterns(wave: u32) -> &'static [Pattern] {
    match wave {
        1 => &[FLIPPER, BLINKER],
        _ => &[GLIDER, GLIDER, FLIPPER, TUB],
    }
}

/// Smaller shapes used for mid-wave top-ups.
pub fn minor_pool(season: Season) -> &'static [Pattern] {
    match season {
        Season::Summer => &[BLINKER, TUB, GLIDER],
        Season::Autumn => &[PAIR, ARROW],
        Season::Winter => &[NUGGET, DONUT],
        Season::Void => &[HOOK, BLINKER, GLIDER],
    }
}

/// Kind for one spawned machine cell. Autumn spawns seeders (the 3-state
/// ruleset kills everything else within two generations); other seasons
/// draw from the wave-gated weighted table.
pub fn pick_kind<R: Rng + ?Sized>(rng: &mut R, wave: u32, season: Season) -> MachineKind {
    if season == Season::Autumn {
        return MachineKind::Seeder;
    }
    *unlocked_kinds(wave).choose(rng).unwrap_or(&MachineKind::Block)
}

// ============================================================================
// OCCUPANCY MASK
// ============================================================================

/// Cells placement must avoid: existing machines plus a box around the
/// player. Successful placements stamp themselves in.
#[derive(Clone, Debug)]
pub struct OccupancyMask {
    width: i32,
    height: i32,
    bits: Vec<bool>,
}

impl OccupancyMask {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height, bits: vec![false; (width * height) as usize] }
    }

    pub fn build(population: &MachinePopulation, player_cell: IVec2, width: i32, height: i32) -> Self {
        let mut mask = Self::new(width, height);
        for (cell, _) in population.iter() {
            mask.stamp(cell);
        }
        for dy in -PLAYER_SAFE_RADIUS..=PLAYER_SAFE_RADIUS {
            for dx in -PLAYER_SAFE_RADIUS..=PLAYER_SAFE_RADIUS {
                mask.stamp(player_cell + IVec2::new(dx, dy));
            }
        }
        mask
    }

    pub fn occupied(&self, cell: IVec2) -> bool {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.width || cell.y >= self.height {
            return true;
        }
        self.bits[(cell.y * self.width + cell.x) as usize]
    }

    pub fn stamp(&mut self, cell: IVec2) {
        if cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height {
            self.bits[(cell.y * self.width + cell.x) as usize] = true;
        }
    }
}

// ============================================================================
// PLACEMENT
// ============================================================================

/// Try to place `pattern` somewhere in the map interior: random rotation,
/// then up to `PLACEMENT_TRIES` random top-left corners. A candidate is
/// rejected whole if any cell overlaps the mask or blocked terrain. On
/// success the cells are stamped into the mask and returned; `None` is the
/// ordinary no-room outcome, not an error.
pub fn place_pattern<R: Rng + ?Sized>(
    rng: &mut R,
    pattern: &Pattern,
    mask: &mut OccupancyMask,
    terrain: &Tilemap,
) -> Option<Vec<IVec2>> {
    let rotation = rng.random_range(0..4u8);
    let size = pattern.size(rotation);
    let max_x = terrain.width - PLACEMENT_MARGIN - size.x;
    let max_y = terrain.height - PLACEMENT_MARGIN - size.y;
    if max_x < PLACEMENT_MARGIN || max_y < PLACEMENT_MARGIN {
        return None;
    }
    let offsets = pattern.cells(rotation);

    for _ in 0..PLACEMENT_TRIES {
        let corner = IVec2::new(
            rng.random_range(PLACEMENT_MARGIN..=max_x),
            rng.random_range(PLACEMENT_MARGIN..=max_y),
        );
        let cells: Vec<IVec2> = offsets.iter().map(|o| corner + *o).collect();
        if cells.iter().any(|&c| mask.occupied(c) || terrain.is_blocked(c)) {
            continue;
        }
        for &cell in &cells {
            mask.stamp(cell);
        }
        return Some(cells);
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations_permute_cells_within_footprint() {
        for rot in 0..4 {
            let size = GLIDER.size(rot);
            let cells = GLIDER.cells(rot);
            assert_eq!(cells.len(), 5);
            for cell in &cells {
                assert!(cell.x >= 0 && cell.x < size.x, "{cell} outside {size} at rot {rot}");
                assert!(cell.y >= 0 && cell.y < size.y);
            }
        }
        // Asymmetric pattern: half turn flips both axes.
        let base = ARROW.cells(0);
        let flipped = ARROW.cells(2);
        let size = ARROW.base_size();
        for cell in &base {
            assert!(flipped.contains(&IVec2::new(size.x - 1 - cell.x, size.y - 1 - cell.y)));
        }
    }

    #[test]
    fn placement_respects_mask_terrain_and_margin() {
        let mut rng = rand::rng();
        let terrain = Tilemap::open(20, 20);
        let mut mask = OccupancyMask::new(20, 20);
        let cells = place_pattern(&mut rng, &TUB, &mut mask, &terrain)
            .unwrap();
        for &cell in &cells {
            assert!(cell.x >= PLACEMENT_MARGIN && cell.y >= PLACEMENT_MARGIN);
            assert!(cell.x < 20 - PLACEMENT_MARGIN && cell.y < 20 - PLACEMENT_MARGIN);
            assert!(mask.occupied(cell));
        }

        // Second placement can never overlap the first.
        let second = place_pattern(&mut rng, &TUB, &mut mask, &terrain).unwrap();
        assert!(second.iter().all(|c| !cells.contains(c)));
    }

    #[test]
    fn placement_fails_when_terrain_blocks_everything() {
        let mut rng = rand::rng();
        let mut terrain = Tilemap::open(12, 12);
        for y in 0..12 {
            for x in 0..12 {
                terrain.make_gap(IVec2::new(x, y));
            }
        }
        let mut mask = OccupancyMask::new(12, 12);
        assert!(place_pattern(&mut rng, &BLINKER, &mut mask, &terrain).is_none());
    }

    #[test]
    fn oversized_pattern_is_rejected_up_front() {
        let mut rng = rand::rng();
        let terrain = Tilemap::open(10, 10);
        let mut mask = OccupancyMask::new(10, 10);
        assert!(place_pattern(&mut rng, &GUN, &mut mask, &terrain).is_none());
    }

    #[test]
    fn occupancy_covers_machines_and_player_box() {
        use crate::machine::{Machine, MachineCtx, Variant};
        use crate::systems::director::Season;

        let mut pop = MachinePopulation::default();
        let ctx = MachineCtx { wave: 1, season: Season::Summer, health_mult: 1.0 };
        pop.insert(IVec2::new(8, 8), Variant::Primary, Machine::fresh(MachineKind::Block, &ctx));

        let player = IVec2::new(3, 3);
        let mask = OccupancyMask::build(&pop, player, 16, 16);
        assert!(mask.occupied(IVec2::new(8, 8)));
        for dy in -2..=2 {
            for dx in -2..=2 {
                assert!(mask.occupied(player + IVec2::new(dx, dy)));
            }
        }
        assert!(!mask.occupied(IVec2::new(12, 12)));
    }

    #[test]
    fn autumn_spawns_seeders_and_summer_respects_wave_gate() {
        let mut rng = rand::rng();
        assert_eq!(pick_kind(&mut rng, 30, Season::Autumn), MachineKind::Seeder);
        for _ in 0..64 {
            let kind = pick_kind(&mut rng, 1, Season::Summer);
            assert!(matches!(kind, MachineKind::Block | MachineKind::Coil));
        }
    }
}
