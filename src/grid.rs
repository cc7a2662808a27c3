//! RuleTexture - the dense 2-channel bitmap the automaton steps over.

use bevy::math::IVec2;

use crate::machine::MachineKind;
use crate::population::MachinePopulation;

// ============================================================================
// TEXEL
// ============================================================================

/// One cell of the rule texture. `kind_id == 0` means empty; `aux` carries
/// the 3-state decay channel (saturated for 2-state rulesets).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Texel {
    pub kind_id: u8,
    pub aux: u8,
}

impl Texel {
    pub const EMPTY: Texel = Texel { kind_id: 0, aux: 0 };

    pub fn occupied(self) -> bool {
        self.kind_id != 0
    }

    /// Decoded kind, treating unknown ids as empty.
    pub fn kind(self) -> Option<MachineKind> {
        MachineKind::from_id(self.kind_id)
    }
}

// ============================================================================
// RULE TEXTURE
// ============================================================================

/// Dense width x height texel buffer, row-major. The authoritative machine
/// state lives in `MachinePopulation`; this is rebuilt from it every step.
#[derive(Clone, Debug)]
pub struct RuleTexture {
    width: i32,
    height: i32,
    texels: Vec<Texel>,
}

impl RuleTexture {
    pub fn new(width: i32, height: i32) -> Self {
        debug_assert!(width > 0 && height > 0);
        Self {
            width,
            height,
            texels: vec![Texel::EMPTY; (width * height) as usize],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, cell: IVec2) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    /// Out-of-bounds reads are empty: the grid has no wraparound.
    pub fn get(&self, cell: IVec2) -> Texel {
        if !self.in_bounds(cell) {
            return Texel::EMPTY;
        }
        self.texels[(cell.y * self.width + cell.x) as usize]
    }

    pub fn set(&mut self, cell: IVec2, texel: Texel) {
        if self.in_bounds(cell) {
            self.texels[(cell.y * self.width + cell.x) as usize] = texel;
        }
    }

    /// Iterate every cell with its texel.
    pub fn cells(&self) -> impl Iterator<Item = (IVec2, Texel)> + '_ {
        let width = self.width;
        self.texels
            .iter()
            .enumerate()
            .map(move |(i, t)| (IVec2::new(i as i32 % width, i as i32 / width), *t))
    }

    /// Count of occupied texels.
    pub fn population(&self) -> usize {
        self.texels.iter().filter(|t| t.occupied()).count()
    }

    /// Rebuild the texture from the sparse machine map. Primaries and ghosts
    /// both land; a cell's texel comes from whichever variant occupies it
    /// (disjoint by reconcile invariant).
    pub fn encode(population: &MachinePopulation, width: i32, height: i32) -> Self {
        let mut tex = Self::new(width, height);
        for (cell, machine) in population.iter() {
            debug_assert!(tex.in_bounds(cell), "machine off-texture at {cell}");
            tex.set(cell, Texel { kind_id: machine.kind.id(), aux: machine.aux });
        }
        tex
    }
}

// ============================================================================
// TESTS
// ============================================================================
