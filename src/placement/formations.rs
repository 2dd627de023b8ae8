use super::StrategicContext;
use crate::errors::{StratmapError, StratmapResult};
use derive_more::Display;
use glam::Vec2;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use validator::Validate;

const UNIT_RADIUS: f32 = 0.5;
const MELEE_FRONT_DISTANCE: f32 = 2.0;
const FLYER_RING_RADIUS: f32 = 1.0;
const CANDIDATE_OVERSAMPLE: u32 = 10;

const UNIT_MUTATION_CHANCE: f64 = 0.3;
const UNIT_MUTATION_RANGE: f32 = 2.0;
const MIN_UNIT_SPACING: f32 = 1.0;
const CROWDING_PENALTY: f32 = 2.0;
const HIGH_GROUND_AFFINITY_BONUS: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum UnitType {
    #[display("warrior")]
    Warrior,
    #[display("archer")]
    Archer,
    #[display("mage")]
    Mage,
    #[display("knight")]
    Knight,
    #[display("dragon")]
    Dragon,
    #[display("cavalry")]
    Cavalry,
    #[display("siege")]
    Siege,
}

impl UnitType {
    /// Ranged roles prefer high ground and rear placements
    pub fn is_ranged(&self) -> bool {
        matches!(self, UnitType::Archer | UnitType::Mage)
    }

    /// Front-line melee roles
    pub fn is_melee(&self) -> bool {
        matches!(self, UnitType::Warrior | UnitType::Knight)
    }

    pub fn is_flying(&self) -> bool {
        matches!(self, UnitType::Dragon)
    }
}

/// A placed unit with its combat attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub unit_type: UnitType,
    pub position: Vec2,
    pub health: u32,
    pub damage: u32,
    pub range: f32,
    pub speed: f32,
    pub armor: u32,
    pub owner: String,
}

impl Unit {
    /// Instantiate a unit of the given type with its stock attributes
    pub fn of_type(unit_type: UnitType, position: Vec2, owner: &str) -> Self {
        let (health, damage, range, speed, armor) = match unit_type {
            UnitType::Warrior => (100, 15, 1.5, 3.0, 5),
            UnitType::Archer => (60, 12, 8.0, 3.5, 1),
            UnitType::Mage => (50, 20, 10.0, 2.5, 0),
            UnitType::Knight => (150, 18, 2.0, 4.0, 8),
            UnitType::Dragon => (300, 40, 6.0, 8.0, 10),
            UnitType::Cavalry => (120, 16, 2.0, 7.0, 4),
            UnitType::Siege => (200, 50, 12.0, 1.5, 2),
        };

        Self {
            unit_type,
            position,
            health,
            damage,
            range,
            speed,
            armor,
            owner: owner.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum FormationType {
    #[display("line")]
    Line,
    #[display("arc")]
    Arc,
    #[display("wedge")]
    Wedge,
    #[display("circle")]
    Circle,
    #[display("square")]
    Square,
    #[display("random")]
    Random,
    #[display("tactical")]
    Tactical,
}

/// Shape, spacing and orientation of a formation
#[derive(Debug, Clone, Validate)]
pub struct FormationConfig {
    pub formation_type: FormationType,
    #[validate(range(min = 0.1, max = 100.0))]
    pub spacing: f32,
    #[validate(range(min = 1, max = 64))]
    pub depth: u32,
    /// Rotation about the formation center, radians
    pub facing_direction: f32,
    pub center: Vec2,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            formation_type: FormationType::Line,
            spacing: 2.0,
            depth: 1,
            facing_direction: 0.0,
            center: Vec2::ZERO,
        }
    }
}

fn rotate_about(point: Vec2, center: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    let local = point - center;
    center
        + Vec2::new(
            local.x * cos - local.y * sin,
            local.x * sin + local.y * cos,
        )
}

/// Generates unit position sets for the supported formation shapes.
/// Positions come back index-aligned with the input unit list.
pub struct FormationGenerator<'a> {
    context: &'a StrategicContext,
    rng: Pcg64,
}

impl<'a> FormationGenerator<'a> {
    pub fn new(context: &'a StrategicContext, seed: u64) -> Self {
        Self {
            context,
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    pub fn generate(
        &mut self,
        units: &[UnitType],
        config: &FormationConfig,
    ) -> StratmapResult<Vec<Vec2>> {
        config.validate().map_err(StratmapError::from_validation)?;

        if units.is_empty() {
            return Ok(Vec::new());
        }

        let positions = match config.formation_type {
            FormationType::Line => self.line_formation(units.len(), config),
            FormationType::Arc => self.arc_formation(units.len(), config),
            FormationType::Wedge => self.wedge_formation(units.len(), config),
            FormationType::Circle => self.circle_formation(units.len(), config),
            FormationType::Square => self.square_formation(units.len(), config),
            FormationType::Random => self.random_formation(units.len(), config),
            FormationType::Tactical => self.tactical_formation(units, config),
        };

        Ok(positions)
    }

    /// Rows of `depth`, widest dimension centered on the formation center
    fn line_formation(&self, count: usize, config: &FormationConfig) -> Vec<Vec2> {
        let depth = config.depth as usize;
        let mut units_per_row = count / depth;
        if count % depth != 0 {
            units_per_row += 1;
        }

        let total_width = (units_per_row.saturating_sub(1)) as f32 * config.spacing;
        let start_x = config.center.x - total_width / 2.0;

        (0..count)
            .map(|i| {
                let row = i / units_per_row;
                let col = i % units_per_row;

                let position = Vec2::new(
                    start_x + col as f32 * config.spacing,
                    config.center.y + row as f32 * config.spacing,
                );
                rotate_about(position, config.center, config.facing_direction)
            })
            .collect()
    }

    /// Half-circle sweep facing the formation direction
    fn arc_formation(&self, count: usize, config: &FormationConfig) -> Vec<Vec2> {
        if count == 1 {
            return vec![config.center];
        }

        let arc_radius = (count - 1) as f32 * config.spacing / TAU;

        (0..count)
            .map(|i| {
                let angle = (i as f32 / (count - 1) as f32) * std::f32::consts::PI
                    - std::f32::consts::FRAC_PI_2;
                let position =
                    config.center + Vec2::new(angle.cos(), angle.sin()) * arc_radius;
                rotate_about(position, config.center, config.facing_direction)
            })
            .collect()
    }

    /// Rows growing by two units each: 1, 3, 5, ...
    fn wedge_formation(&self, count: usize, config: &FormationConfig) -> Vec<Vec2> {
        let mut positions = Vec::with_capacity(count);
        let mut remaining = count;
        let mut row_capacity = 1usize;
        let mut row_index = 0usize;

        while remaining > 0 {
            let row_units = row_capacity.min(remaining);
            let row_width = row_units as f32 * config.spacing;
            let start_x = config.center.x - row_width / 2.0;
            let y = config.center.y + row_index as f32 * config.spacing;

            for col in 0..row_units {
                let position = Vec2::new(start_x + col as f32 * config.spacing, y);
                positions.push(rotate_about(position, config.center, config.facing_direction));
            }

            remaining -= row_units;
            row_capacity += 2;
            row_index += 1;
        }

        positions
    }

    /// Even ring sized so neighbors sit `spacing` apart
    fn circle_formation(&self, count: usize, config: &FormationConfig) -> Vec<Vec2> {
        let circle_radius = count as f32 * config.spacing / TAU;

        (0..count)
            .map(|i| {
                let angle = TAU * i as f32 / count as f32;
                config.center + Vec2::new(angle.cos(), angle.sin()) * circle_radius
            })
            .collect()
    }

    /// Near-square block, `ceil(sqrt(n))` per side
    fn square_formation(&self, count: usize, config: &FormationConfig) -> Vec<Vec2> {
        let side = (count as f32).sqrt().ceil() as usize;
        let total_width = (side.saturating_sub(1)) as f32 * config.spacing;
        let start = config.center - Vec2::splat(total_width / 2.0);

        (0..count)
            .map(|i| {
                let row = i / side;
                let col = i % side;
                let position =
                    start + Vec2::new(col as f32 * config.spacing, row as f32 * config.spacing);
                rotate_about(position, config.center, config.facing_direction)
            })
            .collect()
    }

    /// Independent valid random spots; falls back to the center when a unit
    /// cannot be placed after many attempts.
    fn random_formation(&mut self, count: usize, config: &FormationConfig) -> Vec<Vec2> {
        let mut positions = Vec::with_capacity(count);

        for _ in 0..count {
            let mut placed = None;
            for _ in 0..100 {
                let candidate = Vec2::new(
                    self.rng.gen_range(0.0..self.context.map_width),
                    self.rng.gen_range(0.0..self.context.map_height),
                );
                if self.context.is_unit_position_valid(candidate, UNIT_RADIUS) {
                    placed = Some(candidate);
                    break;
                }
            }
            positions.push(placed.unwrap_or(config.center));
        }

        positions
    }

    /// Role-aware placement: ranged units to scored high-ground candidates,
    /// melee to a forward ring, flyers to a tight inner ring, everything
    /// else into a line. Output stays index-aligned with the input.
    fn tactical_formation(&mut self, units: &[UnitType], config: &FormationConfig) -> Vec<Vec2> {
        let mut positions = vec![config.center; units.len()];

        let ranged: Vec<usize> = (0..units.len()).filter(|&i| units[i].is_ranged()).collect();
        let melee: Vec<usize> = (0..units.len()).filter(|&i| units[i].is_melee()).collect();
        let flying: Vec<usize> = (0..units.len()).filter(|&i| units[i].is_flying()).collect();
        let standard: Vec<usize> = (0..units.len())
            .filter(|&i| !units[i].is_ranged() && !units[i].is_melee() && !units[i].is_flying())
            .collect();

        let ranged_spots = self.best_tactical_positions(ranged.len(), true);
        if ranged_spots.len() < ranged.len() {
            debug!(
                "Only {} of {} ranged spots found; remainder stays at the center",
                ranged_spots.len(),
                ranged.len()
            );
        }
        for (&unit_index, spot) in ranged.iter().zip(ranged_spots) {
            positions[unit_index] = spot;
        }

        for (k, &unit_index) in melee.iter().enumerate() {
            let angle = TAU * k as f32 / melee.len() as f32;
            let position =
                config.center + Vec2::new(angle.cos(), angle.sin()) * MELEE_FRONT_DISTANCE;
            positions[unit_index] =
                rotate_about(position, config.center, config.facing_direction);
        }

        for (k, &unit_index) in flying.iter().enumerate() {
            let angle = TAU * k as f32 / flying.len() as f32;
            let position =
                config.center + Vec2::new(angle.cos(), angle.sin()) * FLYER_RING_RADIUS;
            positions[unit_index] =
                rotate_about(position, config.center, config.facing_direction);
        }

        for (k, &unit_index) in standard.iter().enumerate() {
            let position = Vec2::new(
                config.center.x + (k as f32 - standard.len() as f32 / 2.0) * config.spacing,
                config.center.y,
            );
            positions[unit_index] =
                rotate_about(position, config.center, config.facing_direction);
        }

        positions
    }

    /// Oversample the map and keep the highest-value valid spots
    fn best_tactical_positions(&mut self, count: usize, prefer_high_ground: bool) -> Vec<Vec2> {
        let mut candidates: Vec<(Vec2, f32)> = Vec::new();

        for _ in 0..(count as u32 * CANDIDATE_OVERSAMPLE) {
            let position = Vec2::new(
                self.rng.gen_range(0.0..self.context.map_width),
                self.rng.gen_range(0.0..self.context.map_height),
            );

            if !self.context.is_unit_position_valid(position, UNIT_RADIUS) {
                continue;
            }

            let mut value = self.context.tactical_value(position);
            if prefer_high_ground {
                for hg in &self.context.high_ground {
                    if position.distance(hg.position) <= hg.radius {
                        value += HIGH_GROUND_AFFINITY_BONUS;
                    }
                }
            }
            candidates.push((position, value));
        }

        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates.truncate(count);
        candidates.into_iter().map(|(position, _)| position).collect()
    }
}

/// Hill-climbing refinement of a formation: nudge a random subset of
/// positions, keep the mutation only on strict score improvement. The
/// best-known score never decreases.
pub struct FormationOptimizer<'a> {
    context: &'a StrategicContext,
    rng: Pcg64,
}

impl<'a> FormationOptimizer<'a> {
    pub fn new(context: &'a StrategicContext, seed: u64) -> Self {
        Self {
            context,
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    pub fn optimize(
        &mut self,
        units: &[UnitType],
        initial: &[Vec2],
        iterations: u32,
    ) -> Vec<Vec2> {
        let mut best = initial.to_vec();
        let mut best_score = self.evaluate(units, &best);

        for _ in 0..iterations {
            let candidate = self.mutate(&best);
            let score = self.evaluate(units, &candidate);

            if score > best_score {
                best = candidate;
                best_score = score;
            }
        }

        best
    }

    /// Tactical value per unit, a high-ground affinity bonus for ranged
    /// roles, and a crowding penalty for pairs closer than the minimum
    /// spacing.
    pub fn evaluate(&self, units: &[UnitType], positions: &[Vec2]) -> f32 {
        let mut score = 0.0;

        for (i, position) in positions.iter().enumerate() {
            let Some(unit_type) = units.get(i) else {
                break;
            };

            let mut value = self.context.tactical_value(*position);
            if unit_type.is_ranged() {
                for hg in &self.context.high_ground {
                    if position.distance(hg.position) <= hg.radius {
                        value += HIGH_GROUND_AFFINITY_BONUS;
                    }
                }
            }
            score += value;
        }

        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                if positions[i].distance(positions[j]) < MIN_UNIT_SPACING {
                    score -= CROWDING_PENALTY;
                }
            }
        }

        score
    }

    fn mutate(&mut self, positions: &[Vec2]) -> Vec<Vec2> {
        let mut mutated = positions.to_vec();

        for position in &mut mutated {
            if !self.rng.gen_bool(UNIT_MUTATION_CHANCE) {
                continue;
            }

            let offset = Vec2::new(
                self.rng.gen_range(-UNIT_MUTATION_RANGE..UNIT_MUTATION_RANGE),
                self.rng.gen_range(-UNIT_MUTATION_RANGE..UNIT_MUTATION_RANGE),
            );
            let candidate = *position + offset;

            if self.context.is_unit_position_valid(candidate, UNIT_RADIUS) {
                *position = candidate;
            }
        }

        mutated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> StrategicContext {
        let mut context = StrategicContext::new(100.0, 100.0).unwrap();
        context.add_obstacle(Vec2::new(30.0, 30.0), 5.0);
        context.add_obstacle(Vec2::new(70.0, 70.0), 5.0);
        context.add_chokepoint(Vec2::new(50.0, 20.0), 3.0);
        context.add_high_ground(Vec2::new(20.0, 20.0), 8.0);
        context.add_high_ground(Vec2::new(80.0, 80.0), 8.0);
        context
    }

    fn sample_army() -> Vec<UnitType> {
        vec![
            UnitType::Warrior,
            UnitType::Warrior,
            UnitType::Warrior,
            UnitType::Archer,
            UnitType::Archer,
            UnitType::Mage,
            UnitType::Knight,
            UnitType::Knight,
            UnitType::Dragon,
        ]
    }

    fn config(formation_type: FormationType) -> FormationConfig {
        FormationConfig {
            formation_type,
            center: Vec2::new(50.0, 50.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_line_formation_single_row() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 1);

        let units = vec![UnitType::Warrior; 5];
        let positions = generator.generate(&units, &config(FormationType::Line)).unwrap();

        assert_eq!(positions.len(), 5);
        // One row, evenly spaced, centered on the formation center
        for position in &positions {
            assert_eq!(position.y, 50.0);
        }
        assert_eq!(positions[0].x, 46.0);
        assert_eq!(positions[4].x, 54.0);
        for pair in positions.windows(2) {
            assert!((pair[1].x - pair[0].x - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_line_formation_with_depth() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 1);

        let units = vec![UnitType::Warrior; 6];
        let mut deep = config(FormationType::Line);
        deep.depth = 2;

        let positions = generator.generate(&units, &deep).unwrap();
        let rows: std::collections::HashSet<i32> =
            positions.iter().map(|p| p.y.round() as i32).collect();
        assert_eq!(rows.len(), 2, "Depth 2 should produce two rows");
    }

    #[test]
    fn test_wedge_rows_grow_by_two() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 1);

        let units = vec![UnitType::Warrior; 9];
        let positions = generator.generate(&units, &config(FormationType::Wedge)).unwrap();

        assert_eq!(positions.len(), 9);
        // Rows of 1, 3 and 5 at increasing y
        let mut row_counts = std::collections::HashMap::new();
        for position in &positions {
            *row_counts.entry(position.y.round() as i32).or_insert(0) += 1;
        }
        let mut counts: Vec<i32> = row_counts.values().copied().collect();
        counts.sort();
        assert_eq!(counts, vec![1, 3, 5]);
    }

    #[test]
    fn test_circle_formation_is_equidistant() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 1);

        let units = vec![UnitType::Warrior; 8];
        let positions = generator.generate(&units, &config(FormationType::Circle)).unwrap();

        let center = Vec2::new(50.0, 50.0);
        let radius = positions[0].distance(center);
        for position in &positions {
            assert!((position.distance(center) - radius).abs() < 1e-4);
        }
    }

    #[test]
    fn test_square_formation_grid() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 1);

        let units = vec![UnitType::Warrior; 9];
        let positions = generator.generate(&units, &config(FormationType::Square)).unwrap();

        // 3x3 block: three distinct columns and three distinct rows
        let xs: std::collections::HashSet<i32> =
            positions.iter().map(|p| p.x.round() as i32).collect();
        let ys: std::collections::HashSet<i32> =
            positions.iter().map(|p| p.y.round() as i32).collect();
        assert_eq!(xs.len(), 3);
        assert_eq!(ys.len(), 3);
    }

    #[test]
    fn test_arc_formation_single_unit() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 1);

        let positions = generator
            .generate(&[UnitType::Archer], &config(FormationType::Arc))
            .unwrap();
        assert_eq!(positions, vec![Vec2::new(50.0, 50.0)]);
    }

    #[test]
    fn test_random_formation_positions_are_valid() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 17);

        let units = vec![UnitType::Cavalry; 12];
        let positions = generator.generate(&units, &config(FormationType::Random)).unwrap();

        assert_eq!(positions.len(), 12);
        for position in &positions {
            assert!(context.is_unit_position_valid(*position, UNIT_RADIUS));
        }
    }

    #[test]
    fn test_tactical_formation_aligns_with_units() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 23);

        let army = sample_army();
        let positions = generator.generate(&army, &config(FormationType::Tactical)).unwrap();

        assert_eq!(positions.len(), army.len());

        // Melee units stand on the forward ring around the center
        let center = Vec2::new(50.0, 50.0);
        for (unit, position) in army.iter().zip(&positions) {
            if unit.is_melee() {
                assert!(
                    (position.distance(center) - MELEE_FRONT_DISTANCE).abs() < 1e-4,
                    "Melee unit at {position:?} is off the front ring"
                );
            }
            if unit.is_flying() {
                assert!((position.distance(center) - FLYER_RING_RADIUS).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_rotation_preserves_shape() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 1);

        let units = vec![UnitType::Warrior; 5];
        let flat = generator.generate(&units, &config(FormationType::Line)).unwrap();

        let mut rotated_config = config(FormationType::Line);
        rotated_config.facing_direction = std::f32::consts::FRAC_PI_4;
        let rotated = generator.generate(&units, &rotated_config).unwrap();

        // Pairwise distances are invariant under rotation about the center
        for i in 0..units.len() {
            for j in (i + 1)..units.len() {
                let before = flat[i].distance(flat[j]);
                let after = rotated[i].distance(rotated[j]);
                assert!((before - after).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_empty_unit_list() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 1);

        let positions = generator.generate(&[], &config(FormationType::Line)).unwrap();
        assert!(positions.is_empty());
    }

    #[test]
    fn test_config_validation() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 1);

        let mut bad = config(FormationType::Line);
        bad.spacing = 0.0;

        let result = generator.generate(&[UnitType::Warrior], &bad);
        assert!(matches!(
            result,
            Err(StratmapError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_optimizer_never_regresses() {
        let context = sample_context();
        let mut generator = FormationGenerator::new(&context, 5);

        let army = sample_army();
        let initial = generator.generate(&army, &config(FormationType::Line)).unwrap();

        let mut optimizer = FormationOptimizer::new(&context, 31);
        let initial_score = optimizer.evaluate(&army, &initial);

        let optimized = optimizer.optimize(&army, &initial, 100);
        let final_score = optimizer.evaluate(&army, &optimized);

        assert!(
            final_score >= initial_score,
            "Optimization regressed: {initial_score} -> {final_score}"
        );
    }

    #[test]
    fn test_optimizer_is_deterministic() {
        let context = sample_context();
        let army = sample_army();
        let initial: Vec<Vec2> = (0..army.len())
            .map(|i| Vec2::new(48.0 + i as f32, 50.0))
            .collect();

        let a = FormationOptimizer::new(&context, 77).optimize(&army, &initial, 50);
        let b = FormationOptimizer::new(&context, 77).optimize(&army, &initial, 50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_unit_instantiation() {
        let dragon = Unit::of_type(UnitType::Dragon, Vec2::new(1.0, 2.0), "player");
        assert_eq!(dragon.health, 300);
        assert_eq!(dragon.speed, 8.0);
        assert_eq!(dragon.owner, "player");

        let archer = Unit::of_type(UnitType::Archer, Vec2::ZERO, "enemy");
        assert!(archer.range > dragon.range - 2.0);
        assert!(archer.unit_type.is_ranged());
    }
}
