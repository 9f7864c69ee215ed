//! Spatial grid for foundations and building placement.
//!
//! The grid is unbounded and sparse. A tile may carry a foundation, and a
//! foundation tile may be covered by at most one building. Multi-tile
//! buildings occupy every tile of their footprint; any of those tiles
//! resolves back to the building's id and origin.

use colony_core::id::BuildingId;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::collections::{BTreeMap, BTreeSet};

/// World units per tile edge.
pub const TILE_SIZE: f64 = 32.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A position on the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePosition {
    pub x: i32,
    pub y: i32,
}

impl TilePosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The tile `distance` steps away in `dir`.
    pub fn step(self, dir: Direction, distance: i32) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx * distance, self.y + dy * distance)
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &TilePosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// The four orthogonal neighbours, in North, East, South, West order.
    pub fn neighbors(self) -> [TilePosition; 4] {
        Direction::all().map(|d| self.step(d, 1))
    }
}

/// Cardinal directions. North is `y - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Direction {
    North,
    #[default]
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinal directions, in index order.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Index 0..=3 (North, East, South, West).
    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::all().get(index as usize).copied()
    }

    /// Offset for this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Rotate 90 degrees clockwise.
    pub fn rotate_cw(self) -> Self {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    /// True for East and West.
    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::East | Direction::West)
    }
}

/// The size of a building on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A 1x1 building.
    pub fn single() -> Self {
        Self::new(1, 1)
    }

    /// The footprint a building occupies when facing `facing`.
    /// Definitions are authored north/south; east/west swaps the axes.
    pub fn facing(self, facing: Direction) -> Self {
        if facing.is_horizontal() {
            Self::new(self.height, self.width)
        } else {
            self
        }
    }

    /// Iterate over all tiles of this footprint in row-major order.
    /// Origin is the top-left corner.
    pub fn tiles(&self, origin: TilePosition) -> impl Iterator<Item = TilePosition> {
        let w = self.width as i32;
        let h = self.height as i32;
        let ox = origin.x;
        let oy = origin.y;
        (0..h).flat_map(move |dy| (0..w).map(move |dx| TilePosition::new(ox + dx, oy + dy)))
    }

    pub fn contains(&self, origin: TilePosition, pos: TilePosition) -> bool {
        pos.x >= origin.x
            && pos.y >= origin.y
            && pos.x < origin.x + self.width as i32
            && pos.y < origin.y + self.height as i32
    }
}

/// Tight axis-aligned box over foundation tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: i32,
    pub min_y: i32,
    pub width: u32,
    pub height: u32,
}

// ---------------------------------------------------------------------------
// Coordinate conversion
// ---------------------------------------------------------------------------

/// World-space centre of a tile.
pub fn tile_to_world(pos: TilePosition) -> (f64, f64) {
    (
        (pos.x as f64 + 0.5) * TILE_SIZE,
        (pos.y as f64 + 0.5) * TILE_SIZE,
    )
}

/// The tile containing a world-space point.
pub fn world_to_tile(x: f64, y: f64) -> TilePosition {
    TilePosition::new((x / TILE_SIZE).floor() as i32, (y / TILE_SIZE).floor() as i32)
}

// ---------------------------------------------------------------------------
// GridIndex
// ---------------------------------------------------------------------------

/// Foundation set plus building occupancy.
///
/// Maintains:
/// - `foundations`: tiles that can be built on
/// - `tiles`: tile -> building covering it
/// - `origins` / `footprints`: building -> placement
///
/// Every key of `tiles` is also a foundation.
#[derive(Debug, Default)]
pub struct GridIndex {
    foundations: BTreeSet<TilePosition>,
    tiles: BTreeMap<TilePosition, BuildingId>,
    origins: SecondaryMap<BuildingId, TilePosition>,
    footprints: SecondaryMap<BuildingId, Footprint>,
}

impl GridIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Foundations --

    /// Add a foundation tile. The first tile is free; every later tile must
    /// touch an existing foundation on one of its four sides.
    pub fn add_foundation(&mut self, pos: TilePosition) -> bool {
        if self.foundations.contains(&pos) {
            return false;
        }
        if !self.foundations.is_empty()
            && !pos.neighbors().iter().any(|n| self.foundations.contains(n))
        {
            return false;
        }
        self.foundations.insert(pos)
    }

    /// Add a foundation tile without the connectivity check. Used when
    /// restoring a saved grid, where tiles arrive in arbitrary order.
    pub fn insert_foundation_unchecked(&mut self, pos: TilePosition) -> bool {
        self.foundations.insert(pos)
    }

    /// Remove a foundation tile. Fails when absent or built upon.
    /// Connectivity of the remaining set is not re-checked.
    pub fn remove_foundation(&mut self, pos: TilePosition) -> bool {
        if self.tiles.contains_key(&pos) {
            return false;
        }
        self.foundations.remove(&pos)
    }

    pub fn has_foundation(&self, pos: TilePosition) -> bool {
        self.foundations.contains(&pos)
    }

    /// Foundation tiles in ascending (x, y) order.
    pub fn foundations(&self) -> impl Iterator<Item = TilePosition> + '_ {
        self.foundations.iter().copied()
    }

    pub fn foundation_count(&self) -> usize {
        self.foundations.len()
    }

    /// Tight box over foundations; a zero-size box at the origin when empty.
    pub fn bounds(&self) -> Bounds {
        let mut iter = self.foundations.iter();
        let Some(first) = iter.next() else {
            return Bounds::default();
        };
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for pos in iter {
            min_x = min_x.min(pos.x);
            min_y = min_y.min(pos.y);
            max_x = max_x.max(pos.x);
            max_y = max_y.max(pos.y);
        }
        Bounds {
            min_x,
            min_y,
            width: (max_x - min_x) as u32 + 1,
            height: (max_y - min_y) as u32 + 1,
        }
    }

    // -- Placement --

    /// Every footprint tile has foundation and no building.
    pub fn can_place(&self, origin: TilePosition, footprint: Footprint) -> bool {
        footprint
            .tiles(origin)
            .all(|tile| self.foundations.contains(&tile) && !self.tiles.contains_key(&tile))
    }

    /// Place a building. Origin is the top-left corner.
    pub fn place(&mut self, origin: TilePosition, id: BuildingId, footprint: Footprint) -> bool {
        if self.origins.contains_key(id) || !self.can_place(origin, footprint) {
            return false;
        }
        for tile in footprint.tiles(origin) {
            self.tiles.insert(tile, id);
        }
        self.origins.insert(id, origin);
        self.footprints.insert(id, footprint);
        true
    }

    /// Remove the building covering `pos` (any footprint tile). Clears
    /// exactly that building's tiles and returns its id.
    pub fn remove(&mut self, pos: TilePosition) -> Option<BuildingId> {
        let id = *self.tiles.get(&pos)?;
        self.remove_id(id).then_some(id)
    }

    /// Remove a building by id.
    pub fn remove_id(&mut self, id: BuildingId) -> bool {
        let (Some(origin), Some(footprint)) = (self.origins.remove(id), self.footprints.remove(id))
        else {
            return false;
        };
        for tile in footprint.tiles(origin) {
            self.tiles.remove(&tile);
        }
        true
    }

    /// Change a placed building's footprint in place, keeping its origin.
    /// Fails without mutation when the new footprint would collide.
    pub fn reshape(&mut self, id: BuildingId, footprint: Footprint) -> bool {
        let (Some(&origin), Some(&old)) = (self.origins.get(id), self.footprints.get(id)) else {
            return false;
        };
        let fits = footprint.tiles(origin).all(|tile| {
            self.foundations.contains(&tile)
                && self.tiles.get(&tile).is_none_or(|&other| other == id)
        });
        if !fits {
            return false;
        }
        for tile in old.tiles(origin) {
            self.tiles.remove(&tile);
        }
        for tile in footprint.tiles(origin) {
            self.tiles.insert(tile, id);
        }
        self.footprints.insert(id, footprint);
        true
    }

    // -- Point queries --

    pub fn building_at(&self, pos: TilePosition) -> Option<BuildingId> {
        self.tiles.get(&pos).copied()
    }

    pub fn origin_of(&self, id: BuildingId) -> Option<TilePosition> {
        self.origins.get(id).copied()
    }

    pub fn footprint_of(&self, id: BuildingId) -> Option<Footprint> {
        self.footprints.get(id).copied()
    }

    pub fn is_occupied(&self, pos: TilePosition) -> bool {
        self.tiles.contains_key(&pos)
    }

    // -- Area queries --

    /// Unique buildings touching a rectangle, in row-major first-encounter
    /// order.
    pub fn buildings_in_area(
        &self,
        top_left: TilePosition,
        width: u32,
        height: u32,
    ) -> Vec<BuildingId> {
        let mut seen = BTreeSet::new();
        let mut result = Vec::new();
        for tile in Footprint::new(width, height).tiles(top_left) {
            if let Some(&id) = self.tiles.get(&tile)
                && seen.insert(tile_key(id))
            {
                result.push(id);
            }
        }
        result
    }

    /// Unique buildings on tiles up to `reach` steps orthogonally from any
    /// tile of the given footprint, excluding tiles inside it.
    pub fn buildings_around(
        &self,
        origin: TilePosition,
        footprint: Footprint,
        reach: i32,
    ) -> Vec<BuildingId> {
        let mut seen = BTreeSet::new();
        let mut result = Vec::new();
        for tile in footprint.tiles(origin) {
            for dir in Direction::all() {
                for distance in 1..=reach {
                    let pos = tile.step(dir, distance);
                    if footprint.contains(origin, pos) {
                        continue;
                    }
                    if let Some(&id) = self.tiles.get(&pos)
                        && seen.insert(tile_key(id))
                    {
                        result.push(id);
                    }
                }
            }
        }
        result
    }

    // -- Stats --

    /// Number of unique buildings placed on the grid.
    pub fn building_count(&self) -> usize {
        self.origins.len()
    }

    /// Total number of occupied tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

fn tile_key(id: BuildingId) -> u64 {
    use slotmap::Key;
    id.data().as_ffi()
}
