use crate::errors::{StratmapError, StratmapResult};
use derive_more::Display;
use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};

pub mod buildings;
pub mod formations;

pub use buildings::{
    BaseLayout, BaseLayoutGenerator, BaseLayoutOptimizer, Building, BuildingConfig, BuildingType,
};
pub use formations::{
    FormationConfig, FormationGenerator, FormationOptimizer, FormationType, Unit, UnitType,
};

/// Threat influence fades linearly to zero at this distance
pub const THREAT_RADIUS: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ResourceType {
    #[display("gold")]
    Gold,
    #[display("wood")]
    Wood,
    #[display("stone")]
    Stone,
    #[display("mana")]
    Mana,
}

/// A harvestable resource deposit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    pub resource_type: ResourceType,
    pub position: Vec2,
    pub amount: u32,
    pub radius: f32,
}

impl ResourceNode {
    pub fn new(resource_type: ResourceType, position: Vec2, amount: u32) -> Self {
        Self {
            resource_type,
            position,
            amount,
            radius: 2.0,
        }
    }
}

/// A known enemy position weighted by how dangerous it is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threat {
    pub position: Vec2,
    pub level: f32,
}

/// A narrow strategic passage rewarded for defensive control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chokepoint {
    pub position: Vec2,
    pub width: f32,
}

/// A region granting a positional bonus to ranged and defensive placements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighGround {
    pub position: Vec2,
    pub radius: f32,
}

/// An impassable circular terrain blocker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainObstacle {
    pub position: Vec2,
    pub radius: f32,
}

/// Everything placement decisions are scored against: map bounds, blockers,
/// resources, threats, chokepoints and high ground.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategicContext {
    pub map_width: f32,
    pub map_height: f32,
    pub obstacles: Vec<TerrainObstacle>,
    pub resource_nodes: Vec<ResourceNode>,
    pub threats: Vec<Threat>,
    pub chokepoints: Vec<Chokepoint>,
    pub high_ground: Vec<HighGround>,
}

impl StrategicContext {
    pub fn new(map_width: f32, map_height: f32) -> StratmapResult<Self> {
        if !(map_width > 0.0) || !(map_height > 0.0) {
            return Err(StratmapError::InvalidConfiguration {
                reason: format!("map bounds {map_width}x{map_height} must be positive"),
            });
        }

        Ok(Self {
            map_width,
            map_height,
            obstacles: Vec::new(),
            resource_nodes: Vec::new(),
            threats: Vec::new(),
            chokepoints: Vec::new(),
            high_ground: Vec::new(),
        })
    }

    pub fn add_obstacle(&mut self, position: Vec2, radius: f32) {
        self.obstacles.push(TerrainObstacle { position, radius });
    }

    pub fn add_resource_node(&mut self, node: ResourceNode) {
        self.resource_nodes.push(node);
    }

    pub fn add_threat(&mut self, position: Vec2, level: f32) {
        self.threats.push(Threat { position, level });
    }

    pub fn add_chokepoint(&mut self, position: Vec2, width: f32) {
        self.chokepoints.push(Chokepoint { position, width });
    }

    pub fn add_high_ground(&mut self, position: Vec2, radius: f32) {
        self.high_ground.push(HighGround { position, radius });
    }

    /// Whether a building of the given footprint fits at `position`:
    /// fully inside the map, clear of every terrain obstacle.
    pub fn is_position_valid(&self, position: Vec2, footprint: Vec2) -> bool {
        let half_w = footprint.x / 2.0;
        let half_h = footprint.y / 2.0;

        if position.x < half_w
            || position.x > self.map_width - half_w
            || position.y < half_h
            || position.y > self.map_height - half_h
        {
            return false;
        }

        let clearance = footprint.x.max(footprint.y) / 2.0;
        self.obstacles
            .iter()
            .all(|obstacle| position.distance(obstacle.position) >= obstacle.radius + clearance)
    }

    /// Whether a unit of the given radius can stand at `position`
    pub fn is_unit_position_valid(&self, position: Vec2, unit_radius: f32) -> bool {
        if position.x < 0.0
            || position.x > self.map_width
            || position.y < 0.0
            || position.y > self.map_height
        {
            return false;
        }

        self.obstacles
            .iter()
            .all(|obstacle| position.distance(obstacle.position) >= obstacle.radius + unit_radius)
    }

    /// Positional value of a building site: inverse-distance bonus near
    /// resources, flat high-ground bonus for defensive structures, a
    /// chokepoint-control bonus for fortifications, and a linearly decaying
    /// penalty near known threats.
    pub fn strategic_value(&self, position: Vec2, building_type: BuildingType) -> f32 {
        let mut value = 0.0;

        for resource in &self.resource_nodes {
            let distance = position.distance(resource.position);
            if distance <= resource.radius * 2.0 {
                value += 2.0 / (1.0 + distance);
            }
        }

        if building_type.values_high_ground() {
            for hg in &self.high_ground {
                if position.distance(hg.position) <= hg.radius {
                    value += 3.0;
                }
            }
        }

        if building_type.controls_chokepoints() {
            for chokepoint in &self.chokepoints {
                if position.distance(chokepoint.position) <= chokepoint.width {
                    value += 2.5;
                }
            }
        }

        for threat in &self.threats {
            let distance = position.distance(threat.position);
            if distance < THREAT_RADIUS {
                value -= threat.level * (THREAT_RADIUS - distance) / THREAT_RADIUS;
            }
        }

        value
    }

    /// Positional value of a unit posting: high ground, chokepoint control,
    /// and a mild pull toward the map center.
    pub fn tactical_value(&self, position: Vec2) -> f32 {
        let mut value = 0.0;

        for hg in &self.high_ground {
            if position.distance(hg.position) <= hg.radius {
                value += 2.0;
            }
        }

        for chokepoint in &self.chokepoints {
            if position.distance(chokepoint.position) <= chokepoint.width {
                value += 1.5;
            }
        }

        let center = Vec2::new(self.map_width / 2.0, self.map_height / 2.0);
        let max_distance = center.length();
        value += (1.0 - position.distance(center) / max_distance) * 0.5;

        value
    }

    /// Total resource throughput reachable from a position, weighted by
    /// inverse distance
    pub fn resource_accessibility(&self, position: Vec2) -> f32 {
        let mut accessibility = 0.0;

        for resource in &self.resource_nodes {
            let distance = position.distance(resource.position);
            if distance <= resource.radius * 3.0 {
                accessibility += resource.amount as f32 / (1.0 + distance);
            }
        }

        accessibility
    }

    /// Random polar samples in the annulus [min_radius, max_radius) around
    /// `center` that pass the footprint validity check. `min_radius` must be
    /// strictly below `max_radius`.
    pub fn sample_candidates(
        &self,
        rng: &mut Pcg64,
        center: Vec2,
        min_radius: f32,
        max_radius: f32,
        count: u32,
        footprint: Vec2,
    ) -> Vec<Vec2> {
        let mut candidates = Vec::new();

        for _ in 0..count {
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let distance = rng.gen_range(min_radius..max_radius);
            let position = center + Vec2::new(angle.cos(), angle.sin()) * distance;

            if self.is_position_valid(position, footprint) {
                candidates.push(position);
            }
        }

        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sample_context() -> StrategicContext {
        let mut context = StrategicContext::new(100.0, 100.0).unwrap();
        context.add_obstacle(Vec2::new(20.0, 20.0), 8.0);
        context.add_resource_node(ResourceNode::new(
            ResourceType::Gold,
            Vec2::new(30.0, 30.0),
            1000,
        ));
        context.add_threat(Vec2::new(90.0, 90.0), 1.5);
        context.add_chokepoint(Vec2::new(50.0, 20.0), 4.0);
        context.add_high_ground(Vec2::new(75.0, 75.0), 10.0);
        context
    }

    #[test]
    fn test_rejects_degenerate_bounds() {
        assert!(StrategicContext::new(0.0, 100.0).is_err());
        assert!(StrategicContext::new(100.0, -5.0).is_err());
    }

    #[test]
    fn test_position_validity() {
        let context = sample_context();
        let footprint = Vec2::new(4.0, 4.0);

        assert!(context.is_position_valid(Vec2::new(50.0, 50.0), footprint));
        // Too close to the map edge for the footprint
        assert!(!context.is_position_valid(Vec2::new(1.0, 50.0), footprint));
        // Inside an obstacle's clearance
        assert!(!context.is_position_valid(Vec2::new(22.0, 22.0), footprint));

        assert!(context.is_unit_position_valid(Vec2::new(0.5, 0.5), 0.5));
        assert!(!context.is_unit_position_valid(Vec2::new(20.0, 20.0), 0.5));
        assert!(!context.is_unit_position_valid(Vec2::new(-1.0, 50.0), 0.5));
    }

    #[test]
    fn test_strategic_value_components() {
        let context = sample_context();

        // Near the gold node: inverse-distance bonus
        let near_gold = context.strategic_value(Vec2::new(31.0, 30.0), BuildingType::Barracks);
        let far_away = context.strategic_value(Vec2::new(60.0, 50.0), BuildingType::Barracks);
        assert!(near_gold > far_away);

        // High ground helps towers, not barracks
        let hg_pos = Vec2::new(75.0, 75.0);
        let tower_value = context.strategic_value(hg_pos, BuildingType::Tower);
        let barracks_value = context.strategic_value(hg_pos, BuildingType::Barracks);
        assert!(tower_value >= barracks_value + 3.0 - 1e-6);

        // Threats push value down as they get closer
        let near_threat = context.strategic_value(Vec2::new(85.0, 85.0), BuildingType::Barracks);
        let at_threat = context.strategic_value(Vec2::new(89.0, 90.0), BuildingType::Barracks);
        assert!(at_threat < near_threat);
        assert!(near_threat < 0.0);
    }

    #[test]
    fn test_tactical_value_components() {
        let context = sample_context();

        // Center pull: exact center beats a corner
        let center_v = context.tactical_value(Vec2::new(50.0, 50.0));
        let corner_v = context.tactical_value(Vec2::new(2.0, 98.0));
        assert!(center_v > corner_v);

        // High ground dominates the centrality term
        let hg_v = context.tactical_value(Vec2::new(75.0, 75.0));
        assert!(hg_v > center_v);

        // Chokepoint control
        let cp_v = context.tactical_value(Vec2::new(50.0, 20.0));
        assert!(cp_v > 1.5);
    }

    #[test]
    fn test_resource_accessibility() {
        let context = sample_context();

        let near = context.resource_accessibility(Vec2::new(31.0, 30.0));
        assert!((near - 500.0).abs() < 1.0, "1000/(1+1) expected, got {near}");

        let out_of_range = context.resource_accessibility(Vec2::new(80.0, 80.0));
        assert_eq!(out_of_range, 0.0);
    }

    #[test]
    fn test_candidate_sampling() {
        let context = sample_context();
        let mut rng = Pcg64::seed_from_u64(9);

        let center = Vec2::new(50.0, 50.0);
        let candidates =
            context.sample_candidates(&mut rng, center, 0.0, 20.0, 100, Vec2::new(4.0, 4.0));

        assert!(!candidates.is_empty());
        for candidate in &candidates {
            assert!(context.is_position_valid(*candidate, Vec2::new(4.0, 4.0)));
            assert!(candidate.distance(center) < 20.0 + 1e-4);
        }

        // Deterministic per seed
        let mut rng2 = Pcg64::seed_from_u64(9);
        let again =
            context.sample_candidates(&mut rng2, center, 0.0, 20.0, 100, Vec2::new(4.0, 4.0));
        assert_eq!(candidates, again);
    }
}
