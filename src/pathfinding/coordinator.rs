use super::astar::{find_path, find_path_with_overlay};
use super::{GridPos, SpatialGrid};
use glam::Vec2;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A transient blocked disc, e.g. a battle or a collapsing structure.
/// Expires once `current_time - start_time` exceeds `duration`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicObstacle {
    pub id: String,
    pub position: Vec2,
    pub radius: f32,
    pub duration: f32,
    pub start_time: f32,
}

/// Moving-average smoothing of a path, blended with the original points by
/// `smoothing_factor` in [0, 1]. Endpoints are left untouched; paths shorter
/// than three points come back unchanged.
pub fn smooth_path(path: &[Vec2], smoothing_factor: f32) -> Vec<Vec2> {
    if path.len() < 3 {
        return path.to_vec();
    }

    let factor = smoothing_factor.clamp(0.0, 1.0);
    let mut smoothed = Vec::with_capacity(path.len());
    smoothed.push(path[0]);

    for i in 1..path.len() - 1 {
        let average = (path[i - 1] + path[i] + path[i + 1]) / 3.0;
        smoothed.push(path[i] + (average - path[i]) * factor);
    }

    smoothed.push(path[path.len() - 1]);
    smoothed
}

/// Smooth every path of a formation with the same factor
pub fn smooth_formation_paths(paths: &[Vec<Vec2>], smoothing_factor: f32) -> Vec<Vec<Vec2>> {
    paths
        .iter()
        .map(|path| smooth_path(path, smoothing_factor))
        .collect()
}

/// Coordinates multi-unit and multi-leg movement on top of the single-query
/// A* search: formation offset projection, waypoint routing, and
/// time-windowed dynamic-obstacle avoidance.
///
/// Avoidance queries never mutate the grid they search; dynamic obstacles
/// are rasterized into a per-query overlay instead.
pub struct PathCoordinator {
    dynamic_obstacles: HashMap<String, DynamicObstacle>,
    rng: Pcg64,
}

impl PathCoordinator {
    pub fn new(seed: u64) -> Self {
        Self {
            dynamic_obstacles: HashMap::new(),
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    pub fn dynamic_obstacles(&self) -> &HashMap<String, DynamicObstacle> {
        &self.dynamic_obstacles
    }

    /// Register a dynamic obstacle; an existing obstacle with the same id is
    /// replaced.
    pub fn add_dynamic_obstacle(
        &mut self,
        id: impl Into<String>,
        position: Vec2,
        radius: f32,
        duration: f32,
        start_time: f32,
    ) {
        let id = id.into();
        self.dynamic_obstacles.insert(
            id.clone(),
            DynamicObstacle {
                id,
                position,
                radius,
                duration,
                start_time,
            },
        );
    }

    /// Drop every obstacle whose lifetime has elapsed at `current_time`
    pub fn update_dynamic_obstacles(&mut self, current_time: f32) {
        self.dynamic_obstacles
            .retain(|_, obstacle| current_time - obstacle.start_time <= obstacle.duration);
    }

    /// Single path query that treats all live dynamic obstacles as blocked.
    ///
    /// Expired obstacles are purged first; the rest are rasterized as discs
    /// into an overlay, so the grid's own obstacle set is never modified.
    pub fn find_path_avoiding(
        &mut self,
        grid: &SpatialGrid,
        start: Vec2,
        goal: Vec2,
        current_time: f32,
    ) -> Vec<Vec2> {
        self.update_dynamic_obstacles(current_time);

        let mut overlay = HashSet::new();
        for obstacle in self.dynamic_obstacles.values() {
            let center = grid.world_to_grid(obstacle.position);
            let cell_radius = (obstacle.radius / grid.cell_size).ceil() as i32;

            for dy in -cell_radius..=cell_radius {
                for dx in -cell_radius..=cell_radius {
                    if dx * dx + dy * dy <= cell_radius * cell_radius {
                        overlay.insert(GridPos::new(center.x + dx, center.y + dy));
                    }
                }
            }
        }

        find_path_with_overlay(grid, &overlay, start, goal)
    }

    /// Plan one path for the formation centroid and derive each unit's path
    /// by rigidly translating it by the unit's offset at path-start time.
    ///
    /// Translated points are deliberately not re-validated against obstacles:
    /// formations are assumed to move through corridors wide enough for the
    /// whole group. Returns one path per unit, or nothing when the centroid
    /// itself cannot reach the goal.
    pub fn find_formation_paths(
        &self,
        grid: &SpatialGrid,
        center: Vec2,
        unit_positions: &[Vec2],
        goal: Vec2,
    ) -> Vec<Vec<Vec2>> {
        let center_path = find_path(grid, center, goal);
        if center_path.is_empty() {
            debug!("No centroid path from {center:?} to {goal:?}; formation stays put");
            return Vec::new();
        }

        unit_positions
            .iter()
            .map(|unit| {
                let offset = *unit - center;
                center_path.iter().map(|point| *point + offset).collect()
            })
            .collect()
    }

    /// Stitch A* segments through the given waypoints (or auto-generated
    /// ones) into a single route. The duplicated junction point between
    /// consecutive segments is dropped; a failed segment is skipped and
    /// routing continues from the last reached point. Returns empty when no
    /// leg could be planned.
    pub fn plan_route(
        &mut self,
        grid: &SpatialGrid,
        start: Vec2,
        goal: Vec2,
        waypoints: Option<&[Vec2]>,
    ) -> Vec<Vec2> {
        let waypoints = match waypoints {
            Some(points) => points.to_vec(),
            None => self.generate_waypoints(start, goal),
        };

        let mut route = vec![start];

        for waypoint in waypoints {
            let segment = find_path(grid, *route.last().unwrap(), waypoint);
            if segment.is_empty() {
                debug!("Skipping unreachable waypoint {waypoint:?}");
                continue;
            }
            route.extend(segment.into_iter().skip(1));
        }

        let closing = find_path(grid, *route.last().unwrap(), goal);
        if !closing.is_empty() {
            route.extend(closing.into_iter().skip(1));
        }

        if route.len() < 2 {
            return Vec::new();
        }
        route
    }

    /// Shortest path back to a safe zone
    pub fn plan_retreat(&self, grid: &SpatialGrid, position: Vec2, safe_zone: Vec2) -> Vec<Vec2> {
        find_path(grid, position, safe_zone)
    }

    /// Route visiting the patrol points in order; with `close_loop` a final
    /// leg returns to the first point. Legs that cannot be planned are
    /// skipped.
    pub fn plan_patrol_route(
        &self,
        grid: &SpatialGrid,
        points: &[Vec2],
        close_loop: bool,
    ) -> Vec<Vec2> {
        if points.len() < 2 {
            return points.to_vec();
        }

        let leg_count = if close_loop {
            points.len()
        } else {
            points.len() - 1
        };

        let mut route: Vec<Vec2> = Vec::new();
        for i in 0..leg_count {
            let from = points[i];
            let to = points[(i + 1) % points.len()];

            let segment = find_path(grid, from, to);
            if segment.is_empty() {
                debug!("Skipping blocked patrol leg {from:?} -> {to:?}");
                continue;
            }

            if route.is_empty() {
                route.extend(segment);
            } else {
                route.extend(segment.into_iter().skip(1));
            }
        }

        route
    }

    /// Intermediate waypoints for a route with none supplied: two jittered
    /// samples along the start-goal line standing in for high-ground stops,
    /// plus the midpoint as a chokepoint stand-in, sorted by distance from
    /// the start.
    fn generate_waypoints(&mut self, start: Vec2, goal: Vec2) -> Vec<Vec2> {
        let mut waypoints = Vec::with_capacity(3);

        for _ in 0..2 {
            let t = self.rng.gen_range(0.2..0.8);
            waypoints.push(start + (goal - start) * t);
        }
        waypoints.push((start + goal) / 2.0);

        waypoints.sort_by(|a, b| start.distance(*a).total_cmp(&start.distance(*b)));
        waypoints
    }
}
