use super::{GridPos, SpatialGrid};
use glam::Vec2;
use log::debug;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Search node in the per-query arena; predecessors are arena indices
struct SearchNode {
    pos: GridPos,
    g: f32,
    parent: Option<usize>,
}

/// Open-set entry; ordered so the entry with the smallest f pops first
struct OpenEntry {
    f: f32,
    node: usize,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.f == other.f && self.node == other.node
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; arena index as a deterministic tie-break
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Cost of stepping from a cell to an adjacent one: the destination's
/// terrain cost, scaled by sqrt(2) for diagonal steps.
fn step_cost(grid: &SpatialGrid, from: GridPos, to: GridPos) -> f32 {
    let diagonal = from.x != to.x && from.y != to.y;
    if diagonal {
        std::f32::consts::SQRT_2 * grid.terrain_cost(to)
    } else {
        grid.terrain_cost(to)
    }
}

fn reconstruct(grid: &SpatialGrid, arena: &[SearchNode], goal_index: usize) -> Vec<Vec2> {
    let mut path = Vec::new();
    let mut current = Some(goal_index);

    while let Some(index) = current {
        path.push(grid.grid_to_world(arena[index].pos));
        current = arena[index].parent;
    }

    path.reverse();
    path
}

/// Find the cheapest path between two world positions.
///
/// Returns cell-centered world points from start to goal, or an empty vector
/// when no path exists (endpoints out of bounds, endpoints blocked, or the
/// open set exhausted). The heuristic is Manhattan distance, which can
/// overestimate across cheap terrain such as roads - a deliberate trade of
/// strict optimality for speed. There is no internal iteration cap; callers
/// bound the grid size.
pub fn find_path(grid: &SpatialGrid, start_world: Vec2, goal_world: Vec2) -> Vec<Vec2> {
    find_path_with_overlay(grid, &HashSet::new(), start_world, goal_world)
}

/// `find_path` with an extra set of cells treated as obstacles for this
/// query only. The grid itself is never mutated, so concurrent readers and
/// repeated queries always see the same obstacle set.
pub fn find_path_with_overlay(
    grid: &SpatialGrid,
    overlay: &HashSet<GridPos>,
    start_world: Vec2,
    goal_world: Vec2,
) -> Vec<Vec2> {
    let start = grid.world_to_grid(start_world);
    let goal = grid.world_to_grid(goal_world);

    let open_cell = |pos: GridPos| grid.is_valid(pos) && !overlay.contains(&pos);

    if !open_cell(start) || !open_cell(goal) {
        debug!(
            "Path query rejected: start {start:?} open={}, goal {goal:?} open={}",
            open_cell(start),
            open_cell(goal)
        );
        return Vec::new();
    }

    let heuristic = |pos: GridPos| pos.manhattan_distance(&goal) as f32;

    let mut arena = vec![SearchNode {
        pos: start,
        g: 0.0,
        parent: None,
    }];
    let mut open = BinaryHeap::new();
    open.push(OpenEntry {
        f: heuristic(start),
        node: 0,
    });

    // Best known g per coordinate; also doubles as open-membership test
    let mut best_g: HashMap<GridPos, f32> = HashMap::from([(start, 0.0)]);
    let mut closed: HashSet<GridPos> = HashSet::new();

    while let Some(OpenEntry { node, .. }) = open.pop() {
        let current = arena[node].pos;

        if current == goal {
            return reconstruct(grid, &arena, node);
        }

        if !closed.insert(current) {
            continue; // Stale heap entry for an already finalized cell
        }

        let current_g = arena[node].g;
        for neighbor in grid.neighbors(current) {
            if overlay.contains(&neighbor) || closed.contains(&neighbor) {
                continue;
            }

            let tentative = current_g + step_cost(grid, current, neighbor);
            let improved = best_g.get(&neighbor).is_none_or(|&g| tentative < g);

            if improved {
                best_g.insert(neighbor, tentative);
                arena.push(SearchNode {
                    pos: neighbor,
                    g: tentative,
                    parent: Some(node),
                });
                open.push(OpenEntry {
                    f: tentative + heuristic(neighbor),
                    node: arena.len() - 1,
                });
            }
        }
    }

    debug!("Open set exhausted: no path from {start:?} to {goal:?}");
    Vec::new()
}
