use super::{StrategicContext, UnitType};
use crate::errors::{StratmapError, StratmapResult};
use derive_more::Display;
use glam::Vec2;
use log::{info, warn};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f32::consts::{FRAC_PI_2, PI, TAU};

const SITE_SAMPLES: u32 = 100;
const MAX_TOWERS: usize = 4;
const MAX_DEPOTS: usize = 3;
const MAX_GATES: usize = 2;

/// Minimum strategic value for an extra (non-perimeter) tower site
const EXTRA_TOWER_THRESHOLD: f32 = 1.0;

const MUTATION_CHANCE: f64 = 0.1;
const MUTATION_MIN_DISTANCE: f32 = 5.0;
const MUTATION_MAX_DISTANCE: f32 = 25.0;
const OVERLAP_PENALTY_FACTOR: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum BuildingType {
    #[display("castle")]
    Castle,
    #[display("tower")]
    Tower,
    #[display("barracks")]
    Barracks,
    #[display("mage_tower")]
    MageTower,
    #[display("wall")]
    Wall,
    #[display("gate")]
    Gate,
    #[display("resource_depot")]
    ResourceDepot,
    #[display("workshop")]
    Workshop,
    #[display("temple")]
    Temple,
}

impl BuildingType {
    /// Defensive structures gain the high-ground placement bonus
    pub fn values_high_ground(&self) -> bool {
        matches!(
            self,
            BuildingType::Castle | BuildingType::Tower | BuildingType::MageTower
        )
    }

    /// Fortifications gain the chokepoint-control bonus
    pub fn controls_chokepoints(&self) -> bool {
        matches!(
            self,
            BuildingType::Tower | BuildingType::Wall | BuildingType::Gate
        )
    }

    pub fn footprint(&self) -> Vec2 {
        match self {
            BuildingType::Castle => Vec2::new(8.0, 8.0),
            BuildingType::Tower => Vec2::new(4.0, 4.0),
            BuildingType::Barracks => Vec2::new(6.0, 6.0),
            BuildingType::MageTower => Vec2::new(5.0, 5.0),
            BuildingType::Wall => Vec2::new(2.0, 2.0),
            BuildingType::Gate => Vec2::new(3.0, 3.0),
            BuildingType::ResourceDepot => Vec2::new(3.0, 3.0),
            BuildingType::Workshop => Vec2::new(5.0, 5.0),
            BuildingType::Temple => Vec2::new(6.0, 6.0),
        }
    }
}

/// A placed structure with its combat and economy attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub building_type: BuildingType,
    pub position: Vec2,
    pub size: Vec2,
    pub health: u32,
    pub cost: u32,
    pub range: f32,
    pub production: Vec<UnitType>,
    pub owner: String,
}

/// Per-type stats for production buildings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingConfig {
    pub size: Vec2,
    pub health: u32,
    pub cost: u32,
    pub production: Vec<UnitType>,
}

impl Default for BuildingConfig {
    fn default() -> Self {
        Self {
            size: Vec2::new(4.0, 4.0),
            health: 100,
            cost: 100,
            production: Vec::new(),
        }
    }
}

/// Stats for the production buildings a base layout orders by type
pub fn default_building_configs() -> HashMap<BuildingType, BuildingConfig> {
    HashMap::from([
        (
            BuildingType::Barracks,
            BuildingConfig {
                size: Vec2::new(6.0, 6.0),
                health: 300,
                cost: 200,
                production: vec![UnitType::Warrior, UnitType::Archer],
            },
        ),
        (
            BuildingType::MageTower,
            BuildingConfig {
                size: Vec2::new(5.0, 5.0),
                health: 250,
                cost: 300,
                production: vec![UnitType::Mage],
            },
        ),
        (
            BuildingType::Workshop,
            BuildingConfig {
                size: Vec2::new(5.0, 5.0),
                health: 200,
                cost: 150,
                production: vec![UnitType::Knight, UnitType::Cavalry],
            },
        ),
    ])
}

/// A complete generated base: buildings plus its wall ring and gates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseLayout {
    pub center: Vec2,
    pub buildings: Vec<Building>,
    pub walls: Vec<Building>,
    pub gates: Vec<Building>,
}

impl BaseLayout {
    /// All placed elements, fortifications included
    pub fn all_elements(&self) -> impl Iterator<Item = &Building> {
        self.buildings
            .iter()
            .chain(self.walls.iter())
            .chain(self.gates.iter())
    }
}

/// Generates base layouts around a center position: castle at the best
/// scoring site, towers on and around the perimeter, production buildings
/// from the config table, depots ringed around resources, a wall ring, and
/// gates facing the resources.
pub struct BaseLayoutGenerator<'a> {
    context: &'a StrategicContext,
    rng: Pcg64,
    building_configs: HashMap<BuildingType, BuildingConfig>,
}

impl<'a> BaseLayoutGenerator<'a> {
    pub fn new(context: &'a StrategicContext, seed: u64) -> Self {
        Self {
            context,
            rng: Pcg64::seed_from_u64(seed),
            building_configs: default_building_configs(),
        }
    }

    /// Replace the production-building config table
    pub fn with_building_configs(mut self, configs: HashMap<BuildingType, BuildingConfig>) -> Self {
        self.building_configs = configs;
        self
    }

    pub fn generate(
        &mut self,
        center: Vec2,
        owner: &str,
        base_radius: f32,
    ) -> StratmapResult<BaseLayout> {
        if !(base_radius > 0.0) {
            return Err(StratmapError::InvalidConfiguration {
                reason: format!("base radius {base_radius} must be positive"),
            });
        }

        let candidates = self.context.sample_candidates(
            &mut self.rng,
            center,
            0.0,
            base_radius,
            SITE_SAMPLES,
            Vec2::new(4.0, 4.0),
        );
        if candidates.is_empty() {
            return Err(StratmapError::NoValidCandidates {
                context: format!("base layout around {center:?}"),
            });
        }

        let mut buildings = Vec::new();

        if let Some(position) = self.best_position(BuildingType::Castle, &candidates) {
            buildings.push(Building {
                building_type: BuildingType::Castle,
                position,
                size: Vec2::new(8.0, 8.0),
                health: 500,
                cost: 500,
                range: 0.0,
                production: Vec::new(),
                owner: owner.to_string(),
            });
        }

        for position in self
            .tower_positions(center, base_radius)
            .into_iter()
            .take(MAX_TOWERS)
        {
            buildings.push(Building {
                building_type: BuildingType::Tower,
                position,
                size: Vec2::new(4.0, 4.0),
                health: 200,
                cost: 150,
                range: 8.0,
                production: Vec::new(),
                owner: owner.to_string(),
            });
        }

        for (building_type, count) in [
            (BuildingType::Barracks, 2),
            (BuildingType::MageTower, 1),
            (BuildingType::Workshop, 1),
        ] {
            for _ in 0..count {
                if let Some(position) = self.best_position(building_type, &candidates) {
                    buildings.push(self.create_building(building_type, position, owner));
                }
            }
        }

        for position in self.depot_positions().into_iter().take(MAX_DEPOTS) {
            buildings.push(Building {
                building_type: BuildingType::ResourceDepot,
                position,
                size: Vec2::new(3.0, 3.0),
                health: 100,
                cost: 50,
                range: 0.0,
                production: Vec::new(),
                owner: owner.to_string(),
            });
        }

        let walls = self
            .wall_positions(center, base_radius)
            .into_iter()
            .map(|position| Building {
                building_type: BuildingType::Wall,
                position,
                size: Vec2::new(2.0, 2.0),
                health: 100,
                cost: 50,
                range: 0.0,
                production: Vec::new(),
                owner: owner.to_string(),
            })
            .collect::<Vec<_>>();

        let gates = self
            .gate_positions(center, base_radius)
            .into_iter()
            .take(MAX_GATES)
            .map(|position| Building {
                building_type: BuildingType::Gate,
                position,
                size: Vec2::new(3.0, 3.0),
                health: 150,
                cost: 75,
                range: 0.0,
                production: Vec::new(),
                owner: owner.to_string(),
            })
            .collect::<Vec<_>>();

        info!(
            "Generated base layout at {center:?}: {} buildings, {} walls, {} gates",
            buildings.len(),
            walls.len(),
            gates.len()
        );

        Ok(BaseLayout {
            center,
            buildings,
            walls,
            gates,
        })
    }

    /// Highest strategic value among the candidates that fit the building's
    /// footprint; the single-slot placement primitive.
    pub fn best_position(
        &self,
        building_type: BuildingType,
        candidates: &[Vec2],
    ) -> Option<Vec2> {
        let footprint = building_type.footprint();
        let mut best: Option<(Vec2, f32)> = None;

        for &candidate in candidates {
            if !self.context.is_position_valid(candidate, footprint) {
                continue;
            }
            let score = self.context.strategic_value(candidate, building_type);
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }

        best.map(|(position, _)| position)
    }

    /// Compass-point towers on the inner perimeter, plus annulus samples
    /// that pass a minimum strategic value.
    fn tower_positions(&mut self, center: Vec2, radius: f32) -> Vec<Vec2> {
        let footprint = BuildingType::Tower.footprint();
        let mut positions = Vec::new();

        for angle in [0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2] {
            let position = center + Vec2::new(angle.cos(), angle.sin()) * (radius * 0.8);
            if self.context.is_position_valid(position, footprint) {
                positions.push(position);
            }
        }

        for _ in 0..4 {
            let angle = self.rng.gen_range(0.0..TAU);
            let distance = self.rng.gen_range(radius * 0.6..radius * 0.9);
            let position = center + Vec2::new(angle.cos(), angle.sin()) * distance;

            if self.context.is_position_valid(position, footprint)
                && self.context.strategic_value(position, BuildingType::Tower)
                    > EXTRA_TOWER_THRESHOLD
            {
                positions.push(position);
            }
        }

        positions
    }

    /// Depot sites ringed around each resource node
    fn depot_positions(&self) -> Vec<Vec2> {
        let footprint = BuildingType::ResourceDepot.footprint();
        let mut positions = Vec::new();

        for resource in &self.context.resource_nodes {
            for angle in [0.0, FRAC_PI_2, PI, 3.0 * FRAC_PI_2] {
                let position = resource.position
                    + Vec2::new(angle.cos(), angle.sin()) * (resource.radius * 1.5);
                if self.context.is_position_valid(position, footprint) {
                    positions.push(position);
                }
            }
        }

        positions
    }

    /// Wall ring on the base perimeter
    fn wall_positions(&self, center: Vec2, radius: f32) -> Vec<Vec2> {
        let footprint = BuildingType::Wall.footprint();
        let segments = (radius * 2.0) as usize;
        let mut positions = Vec::new();

        for i in 0..segments {
            let angle = TAU * i as f32 / segments as f32;
            let position = center + Vec2::new(angle.cos(), angle.sin()) * radius;
            if self.context.is_position_valid(position, footprint) {
                positions.push(position);
            }
        }

        positions
    }

    /// Gate sites on the perimeter along the bearing to each resource
    fn gate_positions(&self, center: Vec2, radius: f32) -> Vec<Vec2> {
        let footprint = BuildingType::Gate.footprint();
        let mut positions = Vec::new();

        for resource in &self.context.resource_nodes {
            let to_resource = resource.position - center;
            let distance = to_resource.length();
            if distance <= f32::EPSILON {
                continue;
            }

            let position = center + to_resource / distance * radius;
            if self.context.is_position_valid(position, footprint) {
                positions.push(position);
            }
        }

        positions
    }

    /// Build from the config table, falling back to defaults (and logging)
    /// when a type has no entry.
    fn create_building(
        &self,
        building_type: BuildingType,
        position: Vec2,
        owner: &str,
    ) -> Building {
        let config = match self.building_configs.get(&building_type) {
            Some(config) => config.clone(),
            None => {
                warn!("No config entry for building type {building_type}, using defaults");
                BuildingConfig::default()
            }
        };

        Building {
            building_type,
            position,
            size: config.size,
            health: config.health,
            cost: config.cost,
            range: 0.0,
            production: config.production,
            owner: owner.to_string(),
        }
    }
}

/// Hill-climbing refinement of a base layout: repeatedly clone the
/// best-known layout, nudge a random subset of buildings, and keep the
/// mutation only when the full-layout score strictly improves. The
/// best-known score never decreases.
pub struct BaseLayoutOptimizer<'a> {
    context: &'a StrategicContext,
    rng: Pcg64,
}

impl<'a> BaseLayoutOptimizer<'a> {
    pub fn new(context: &'a StrategicContext, seed: u64) -> Self {
        Self {
            context,
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    pub fn optimize(&mut self, layout: &BaseLayout, iterations: u32) -> BaseLayout {
        let mut best = layout.clone();
        let mut best_score = self.evaluate(&best);

        for _ in 0..iterations {
            let candidate = self.mutate(&best);
            let score = self.evaluate(&candidate);

            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }

        best
    }

    /// Full-layout fitness: positional values, defense and resource bonuses,
    /// minus the pairwise overlap penalty.
    pub fn evaluate(&self, layout: &BaseLayout) -> f32 {
        let mut score = 0.0;

        for building in &layout.buildings {
            score += self
                .context
                .strategic_value(building.position, building.building_type);
        }

        score += self.defense_score(layout);
        score += self.resource_score(layout);
        score -= self.overlap_penalty(layout);

        score
    }

    fn defense_score(&self, layout: &BaseLayout) -> f32 {
        let tower_count = layout
            .buildings
            .iter()
            .filter(|b| b.building_type == BuildingType::Tower)
            .count();

        tower_count as f32 * 2.0 + layout.walls.len() as f32 * 0.5 + layout.gates.len() as f32
    }

    fn resource_score(&self, layout: &BaseLayout) -> f32 {
        layout
            .buildings
            .iter()
            .filter(|b| b.building_type == BuildingType::ResourceDepot)
            .map(|depot| self.context.resource_accessibility(depot.position))
            .sum()
    }

    /// Pairs closer than the sum of their half-extents are penalized
    /// proportionally to the shortfall.
    fn overlap_penalty(&self, layout: &BaseLayout) -> f32 {
        let elements: Vec<&Building> = layout.all_elements().collect();
        let mut penalty = 0.0;

        for i in 0..elements.len() {
            for j in (i + 1)..elements.len() {
                let a = elements[i];
                let b = elements[j];

                let distance = a.position.distance(b.position);
                let min_distance = (a.size.x + b.size.x).max(a.size.y + b.size.y) / 2.0;

                if distance < min_distance {
                    penalty += (min_distance - distance) * OVERLAP_PENALTY_FACTOR;
                }
            }
        }

        penalty
    }

    /// Clone the layout and reposition a random subset of its buildings
    /// within the mutation annulus; moves onto invalid ground are rejected.
    fn mutate(&mut self, layout: &BaseLayout) -> BaseLayout {
        let mut mutated = layout.clone();

        for building in &mut mutated.buildings {
            if !self.rng.gen_bool(MUTATION_CHANCE) {
                continue;
            }

            let angle = self.rng.gen_range(0.0..TAU);
            let distance = self
                .rng
                .gen_range(MUTATION_MIN_DISTANCE..MUTATION_MAX_DISTANCE);
            let position = layout.center + Vec2::new(angle.cos(), angle.sin()) * distance;

            if self.context.is_position_valid(position, building.size) {
                building.position = position;
            }
        }

        mutated
    }
}
