use crate::errors::{StratmapError, StratmapResult};
use crate::terrain::TerrainType;
use glam::Vec2;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub mod astar;
pub mod coordinator;

pub use astar::{find_path, find_path_with_overlay};
pub use coordinator::{DynamicObstacle, PathCoordinator, smooth_formation_paths, smooth_path};

/// A single cell in the spatial grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another cell (the A* heuristic)
    pub fn manhattan_distance(&self, other: &GridPos) -> u32 {
        ((self.x - other.x).abs() + (self.y - other.y).abs()) as u32
    }
}

/// The 8 orthogonal and diagonal step directions
const DIRECTIONS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Discretized strategy map: per-cell terrain types, a movement-cost table,
/// and a static obstacle set, with world<->grid coordinate mapping.
///
/// Obstacle cells are unreachable regardless of their terrain type. Terrain
/// types are stored sparsely; unset cells default to grassland.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    pub width: u32,
    pub height: u32,
    pub cell_size: f32,
    pub obstacles: HashSet<GridPos>,
    pub terrain: HashMap<GridPos, TerrainType>,
    pub terrain_costs: HashMap<TerrainType, f32>,
}

/// Movement cost per terrain type; anything missing from the table costs 1.0
pub fn default_cost_table() -> HashMap<TerrainType, f32> {
    HashMap::from([
        (TerrainType::Road, 0.5),
        (TerrainType::Grassland, 1.0),
        (TerrainType::Forest, 1.5),
        (TerrainType::Water, 2.0),
        (TerrainType::Swamp, 2.5),
        (TerrainType::Mountain, 3.0),
        (TerrainType::Volcanic, 4.0),
    ])
}

impl SpatialGrid {
    pub fn new(width: u32, height: u32, cell_size: f32) -> StratmapResult<Self> {
        if width == 0 || height == 0 {
            return Err(StratmapError::InvalidGridDimensions { width, height });
        }
        if !(cell_size > 0.0) {
            return Err(StratmapError::InvalidCellSize { cell_size });
        }

        Ok(Self {
            width,
            height,
            cell_size,
            obstacles: HashSet::new(),
            terrain: HashMap::new(),
            terrain_costs: default_cost_table(),
        })
    }

    /// Build a grid from a row-major terrain classification, the usual
    /// handoff from heightmap generation.
    pub fn from_classified(
        types: &[TerrainType],
        width: u32,
        height: u32,
        cell_size: f32,
    ) -> StratmapResult<Self> {
        let expected = (width as usize) * (height as usize);
        if types.len() != expected {
            return Err(StratmapError::InvalidConfiguration {
                reason: format!(
                    "classification size {} does not match {width}x{height}",
                    types.len()
                ),
            });
        }

        let mut grid = Self::new(width, height, cell_size)?;
        for y in 0..height {
            for x in 0..width {
                let terrain_type = types[(y * width + x) as usize];
                if terrain_type != TerrainType::default() {
                    grid.terrain
                        .insert(GridPos::new(x as i32, y as i32), terrain_type);
                }
            }
        }

        info!(
            "Built {width}x{height} grid from classification ({} non-default cells)",
            grid.terrain.len()
        );

        Ok(grid)
    }

    /// World position to the cell containing it
    pub fn world_to_grid(&self, world: Vec2) -> GridPos {
        GridPos::new(
            (world.x / self.cell_size).floor() as i32,
            (world.y / self.cell_size).floor() as i32,
        )
    }

    /// Center of a cell in world coordinates
    pub fn grid_to_world(&self, pos: GridPos) -> Vec2 {
        Vec2::new(
            pos.x as f32 * self.cell_size + self.cell_size / 2.0,
            pos.y as f32 * self.cell_size + self.cell_size / 2.0,
        )
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width as i32 && pos.y < self.height as i32
    }

    /// In bounds and not an obstacle
    pub fn is_valid(&self, pos: GridPos) -> bool {
        self.in_bounds(pos) && !self.obstacles.contains(&pos)
    }

    pub fn add_obstacle(&mut self, x: i32, y: i32) {
        self.obstacles.insert(GridPos::new(x, y));
    }

    pub fn remove_obstacle(&mut self, x: i32, y: i32) {
        self.obstacles.remove(&GridPos::new(x, y));
    }

    /// Paint a terrain type onto a cell; out-of-bounds writes are ignored
    pub fn set_terrain_type(&mut self, x: i32, y: i32, terrain_type: TerrainType) {
        let pos = GridPos::new(x, y);
        if self.in_bounds(pos) {
            self.terrain.insert(pos, terrain_type);
        }
    }

    pub fn terrain_type(&self, pos: GridPos) -> TerrainType {
        self.terrain.get(&pos).copied().unwrap_or_default()
    }

    /// Movement cost of entering a cell: infinite for obstacles, otherwise a
    /// table lookup by terrain type (1.0 when the type has no entry).
    pub fn terrain_cost(&self, pos: GridPos) -> f32 {
        if self.obstacles.contains(&pos) {
            return f32::INFINITY;
        }
        self.terrain_costs
            .get(&self.terrain_type(pos))
            .copied()
            .unwrap_or(1.0)
    }

    /// The valid 8-directional neighbors of a cell
    pub fn neighbors(&self, pos: GridPos) -> Vec<GridPos> {
        DIRECTIONS
            .iter()
            .map(|(dx, dy)| GridPos::new(pos.x + dx, pos.y + dy))
            .filter(|candidate| self.is_valid(*candidate))
            .collect()
    }
}
