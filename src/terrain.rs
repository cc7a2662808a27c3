//! Tilemap - procedural terrain the automaton and placement must respect.

use bevy::prelude::*;
use hashbrown::HashSet;
use noise::{NoiseFn, Simplex};
use pathfinding::prelude::astar;
use std::collections::VecDeque;

use crate::constants::TILE_SIZE;

// ============================================================================
// TILEMAP
// ============================================================================

/// Grid terrain. Solid cells block movement and machine occupancy; gap cells
/// block machine occupancy only (projectiles pass, the player falls).
#[derive(Resource, Clone, Debug)]
pub struct Tilemap {
    pub width: i32,
    pub height: i32,
    solids: HashSet<IVec2>,
    gaps: HashSet<IVec2>,
    /// Open cell near the map center where the player starts.
    pub spawn: IVec2,
}

impl Tilemap {
    /// Flat, fully open map. Used as a base for generation and in tests.
    pub fn open(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            solids: HashSet::new(),
            gaps: HashSet::new(),
            spawn: IVec2::new(width / 2, height / 2),
        }
    }

    /// Simplex-noise terrain: border walls, scattered solid clusters and
    /// gap pockets, with a cleared disc around the center spawn.
    pub fn generate(width: i32, height: i32) -> Self {
        let noise = Simplex::new(rand::random::<u32>());
        let frequency = 0.09;
        let center = Vec2::new(width as f32 / 2.0, height as f32 / 2.0);
        let clear_radius = 5.0;

        let mut map = Self::open(width, height);
        for y in 0..height {
            for x in 0..width {
                let cell = IVec2::new(x, y);
                if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
                    map.solids.insert(cell);
                    continue;
                }
                if center.distance(Vec2::new(x as f32, y as f32)) < clear_radius {
                    continue;
                }
                let v = noise.get([x as f64 * frequency, y as f64 * frequency]);
                if v > 0.55 {
                    map.solids.insert(cell);
                } else if v < -0.62 {
                    map.gaps.insert(cell);
                }
            }
        }
        map.spawn = map.closest_open_cell(IVec2::new(width / 2, height / 2));
        map
    }

    pub fn in_bounds(&self, cell: IVec2) -> bool {
        cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height
    }

    pub fn is_solid(&self, cell: IVec2) -> bool {
        !self.in_bounds(cell) || self.solids.contains(&cell)
    }

    pub fn is_gap(&self, cell: IVec2) -> bool {
        self.gaps.contains(&cell)
    }

    /// Machines may never occupy blocked cells.
    pub fn is_blocked(&self, cell: IVec2) -> bool {
        self.is_solid(cell) || self.is_gap(cell)
    }

    /// Open cell count, for area-proportional seeding.
    pub fn open_area(&self) -> usize {
        (self.width * self.height) as usize - self.solids.len() - self.gaps.len()
    }

    /// Nearest non-blocked cell by BFS. Falls back to the query cell when the
    /// whole map is blocked (degenerate, but never panics).
    pub fn closest_open_cell(&self, from: IVec2) -> IVec2 {
        if !self.is_blocked(from) {
            return from;
        }
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from]);
        seen.insert(from);
        while let Some(cell) = queue.pop_front() {
            for next in orthogonal(cell) {
                if !self.in_bounds(next) || !seen.insert(next) {
                    continue;
                }
                if !self.is_blocked(next) {
                    return next;
                }
                queue.push_back(next);
            }
        }
        from
    }

    /// 4-connected A* over open cells. `None` when unreachable.
    pub fn find_path(&self, from: IVec2, to: IVec2) -> Option<Vec<IVec2>> {
        if self.is_blocked(to) {
            return None;
        }
        let (path, _cost) = astar(
            &from,
            |&cell| {
                orthogonal(cell)
                    .into_iter()
                    .filter(|&n| self.in_bounds(n) && !self.is_blocked(n))
                    .map(|n| (n, 1u32))
                    .collect::<Vec<_>>()
            },
            |&cell| ((cell.x - to.x).abs() + (cell.y - to.y).abs()) as u32,
            |&cell| cell == to,
        )?;
        Some(path)
    }

    /// World position of a cell's center. The map is centered on the origin.
    pub fn cell_center(&self, cell: IVec2) -> Vec2 {
        let half = Vec2::new(self.width as f32, self.height as f32) * TILE_SIZE / 2.0;
        Vec2::new(cell.x as f32 + 0.5, cell.y as f32 + 0.5) * TILE_SIZE - half
    }

    pub fn world_to_cell(&self, pos: Vec2) -> IVec2 {
        let half = Vec2::new(self.width as f32, self.height as f32) * TILE_SIZE / 2.0;
        ((pos + half) / TILE_SIZE).floor().as_ivec2()
    }

    #[cfg(test)]
    pub(crate) fn make_solid(&mut self, cell: IVec2) {
        self.solids.insert(cell);
    }

    #[cfg(test)]
    pub(crate) fn make_gap(&mut self, cell: IVec2) {
        self.gaps.insert(cell);
    }
}

impl Default for Tilemap {
    fn default() -> Self {
        Self::generate(crate::constants::MAP_WIDTH as i32, crate::constants::MAP_HEIGHT as i32)
    }
}

fn orthogonal(cell: IVec2) -> [IVec2; 4] {
    [
        cell + IVec2::new(1, 0),
        cell + IVec2::new(-1, 0),
        cell + IVec2::new(0, 1),
        cell + IVec2::new(0, -1),
    ]
}

// ============================================================================
// MINIMAP
// ============================================================================

/// CPU-side minimap pixel buffer, one RGBA pixel per cell. The render layer
/// uploads it; everything else just writes pixels.
#[derive(Resource, Clone, Debug)]
pub struct Minimap {
    pub width: i32,
    pub height: i32,
    pub pixels: Vec<[u8; 4]>,
}

impl Minimap {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height, pixels: vec![[0, 0, 0, 0]; (width * height) as usize] }
    }

    pub fn clear(&mut self) {
        self.pixels.fill([0, 0, 0, 0]);
    }

    pub fn set(&mut self, cell: IVec2, color: [u8; 4]) {
        if cell.x >= 0 && cell.y >= 0 && cell.x < self.width && cell.y < self.height {
            self.pixels[(cell.y * self.width + cell.x) as usize] = color;
        }
    }
}

impl Default for Minimap {
    fn default() -> Self {
        Self::new(crate::constants::MAP_WIDTH as i32, crate::constants::MAP_HEIGHT as i32)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_map_has_walled_border_and_open_spawn() {
        let map = Tilemap::generate(30, 20);
        for x in 0..30 {
            assert!(map.is_solid(IVec2::new(x, 0)));
            assert!(map.is_solid(IVec2::new(x, 19)));
        }
        for y in 0..20 {
            assert!(map.is_solid(IVec2::new(0, y)));
            assert!(map.is_solid(IVec2::new(29, y)));
        }
        assert!(!map.is_blocked(map.spawn));
    }

    #[test]
    fn closest_open_cell_escapes_blocked_cells() {
        let mut map = Tilemap::open(5, 5);
        map.solids.insert(IVec2::new(2, 2));
        map.solids.insert(IVec2::new(3, 2));
        let found = map.closest_open_cell(IVec2::new(2, 2));
        assert!(!map.is_blocked(found));
        assert_eq!((found - IVec2::new(2, 2)).abs().max_element(), 1);
    }

    #[test]
    fn pathfinding_routes_around_walls() {
        let mut map = Tilemap::open(5, 5);
        // Vertical wall with a hole at the bottom.
        for y in 0..4 {
            map.solids.insert(IVec2::new(2, y));
        }
        let path = map
            .find_path(IVec2::new(0, 0), IVec2::new(4, 0))
            .unwrap();
        assert_eq!(path.first(), Some(&IVec2::new(0, 0)));
        assert_eq!(path.last(), Some(&IVec2::new(4, 0)));
        assert!(path.contains(&IVec2::new(2, 4)));
        assert!(path.iter().all(|c| !map.is_blocked(*c)));

        map.solids.insert(IVec2::new(2, 4));
        assert!(map.find_path(IVec2::new(0, 0), IVec2::new(4, 0)).is_none());
    }

    #[test]
    fn world_cell_round_trip() {
        let map = Tilemap::open(10, 8);
        for cell in [IVec2::new(0, 0), IVec2::new(9, 7), IVec2::new(4, 3)] {
            assert_eq!(map.world_to_cell(map.cell_center(cell)), cell);
        }
    }

    #[test]
    fn minimap_ignores_out_of_range_writes() {
        let mut mm = Minimap::new(4, 4);
        mm.set(IVec2::new(-1, 0), [255; 4]);
        mm.set(IVec2::new(0, 9), [255; 4]);
        assert!(mm.pixels.iter().all(|p| *p == [0, 0, 0, 0]));
        mm.set(IVec2::new(1, 1), [9, 9, 9, 255]);
        assert_eq!(mm.pixels[5], [9, 9, 9, 255]);
    }
}
