use super::noise_field::NoiseField;
use super::{HeightField, TerrainFeature, TerrainType};
use crate::errors::{StratmapError, StratmapResult};
use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use validator::Validate;

/// Elevation thresholds for classification, ascending
const WATER_LEVEL: f32 = -0.3;
const SWAMP_LEVEL: f32 = -0.1;
const GRASSLAND_LEVEL: f32 = 0.1;
const FOREST_LEVEL: f32 = 0.3;
const MOUNTAIN_LEVEL: f32 = 0.6;

/// A feature overrides a cell's terrain type above this influence
const TYPE_OVERRIDE_THRESHOLD: f32 = 0.5;

/// Parameters for fractal heightmap generation
#[derive(Debug, Clone, Validate)]
pub struct HeightmapConfig {
    #[validate(range(min = 1, max = 4096))]
    pub width: u32,
    #[validate(range(min = 1, max = 4096))]
    pub height: u32,
    pub seed: u32,
    /// Number of noise layers combined into the final field
    #[validate(range(min = 1, max = 16))]
    pub octaves: u32,
    /// Amplitude multiplier per octave
    #[validate(range(min = 0.01, max = 1.0))]
    pub persistence: f32,
    /// Frequency multiplier per octave
    #[validate(range(min = 1.0, max = 8.0))]
    pub lacunarity: f32,
    /// World distance covered by one noise unit - larger means smoother terrain
    #[validate(range(min = 0.001))]
    pub scale: f32,
}

impl Default for HeightmapConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            seed: 12345,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            scale: 50.0,
        }
    }
}

/// Fractal terrain synthesizer.
///
/// Owns the height field, the per-cell terrain classification, and the
/// ordered list of every feature ever applied (provenance). All randomness
/// comes from the seeded noise field and a seeded `Pcg64` stream, so a
/// config reproduces its terrain bit-for-bit.
pub struct HeightmapGenerator {
    config: HeightmapConfig,
    noise: NoiseField,
    rng: Pcg64,
    heights: HeightField,
    terrain_types: Vec<TerrainType>,
    features: Vec<TerrainFeature>,
}

impl HeightmapGenerator {
    pub fn new(config: HeightmapConfig) -> StratmapResult<Self> {
        config.validate().map_err(StratmapError::from_validation)?;

        let heights = HeightField::filled(config.width, config.height, 0.0)?;
        let cells = (config.width as usize) * (config.height as usize);

        Ok(Self {
            noise: NoiseField::new(config.seed),
            rng: Pcg64::seed_from_u64(config.seed as u64),
            heights,
            terrain_types: vec![TerrainType::default(); cells],
            features: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &HeightmapConfig {
        &self.config
    }

    pub fn heights(&self) -> &HeightField {
        &self.heights
    }

    pub fn terrain_types(&self) -> &[TerrainType] {
        &self.terrain_types
    }

    /// Every feature applied so far, in application order
    pub fn features(&self) -> &[TerrainFeature] {
        &self.features
    }

    /// Generate the base fractal height field.
    ///
    /// Sums `octaves` noise layers, each at `lacunarity`x the previous
    /// frequency and `persistence`x the previous amplitude, then normalizes
    /// by the theoretical maximum amplitude so values land in roughly [-1, 1].
    pub fn generate(&mut self) -> &HeightField {
        let mut max_amplitude = 0.0f64;
        let mut amplitude = 1.0f64;
        for _ in 0..self.config.octaves {
            max_amplitude += amplitude;
            amplitude *= self.config.persistence as f64;
        }

        for y in 0..self.config.height {
            for x in 0..self.config.width {
                let mut value = 0.0f64;
                let mut amplitude = 1.0f64;
                let mut frequency = 1.0f64;

                for _ in 0..self.config.octaves {
                    let sample_x = x as f64 / self.config.scale as f64 * frequency;
                    let sample_y = y as f64 / self.config.scale as f64 * frequency;

                    value += self.noise.sample(sample_x, sample_y) * amplitude;

                    amplitude *= self.config.persistence as f64;
                    frequency *= self.config.lacunarity as f64;
                }

                self.heights.set(x, y, (value / max_amplitude) as f32);
            }
        }

        debug!(
            "Generated {}x{} height field (seed={}, octaves={})",
            self.config.width, self.config.height, self.config.seed, self.config.octaves
        );

        &self.heights
    }

    /// Blend features into the height field, keeping them for provenance
    pub fn add_features(&mut self, features: Vec<TerrainFeature>) -> StratmapResult<()> {
        for feature in &features {
            if feature.radius <= 0.0 {
                return Err(StratmapError::InvalidFeature {
                    reason: format!("radius {} must be positive", feature.radius),
                });
            }
        }

        for feature in features {
            self.apply_feature(&feature);
            self.features.push(feature);
        }

        Ok(())
    }

    /// Add `feature.height * influence` to every cell within the feature's
    /// radius, with quadratic falloff from the center. Strongly influenced
    /// cells also take the feature's terrain type.
    fn apply_feature(&mut self, feature: &TerrainFeature) {
        let center_x = (feature.x * self.config.width as f32) as i32;
        let center_y = (feature.y * self.config.height as f32) as i32;
        // A sub-cell radius still touches its center cell
        let radius =
            ((feature.radius * self.config.width.min(self.config.height) as f32) as i32).max(1);

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let x = center_x + dx;
                let y = center_y + dy;

                if x < 0 || y < 0 || x >= self.config.width as i32 || y >= self.config.height as i32
                {
                    continue;
                }

                let distance = ((dx * dx + dy * dy) as f32).sqrt();
                if distance > radius as f32 {
                    continue;
                }

                let influence = (1.0 - distance / radius as f32).powi(2) * feature.influence;

                let (x, y) = (x as u32, y as u32);
                if let Some(current) = self.heights.get(x, y) {
                    self.heights.set(x, y, current + feature.height * influence);
                }

                if influence > TYPE_OVERRIDE_THRESHOLD {
                    let idx = (y * self.config.width + x) as usize;
                    self.terrain_types[idx] = feature.terrain_type;
                }
            }
        }
    }

    /// Scatter strategic map features from the generator's own random stream:
    /// low water chokepoints, mountain resource bumps, and flat grassland
    /// base sites. Deterministic per seed.
    pub fn generate_strategic_features(
        &mut self,
        chokepoints: u32,
        resource_nodes: u32,
        base_locations: u32,
    ) -> StratmapResult<()> {
        let mut features = Vec::new();

        for _ in 0..chokepoints {
            let x = self.rng.gen_range(0.2..0.8);
            let y = self.rng.gen_range(0.2..0.8);
            features.push(TerrainFeature::new(x, y, 0.05, -0.3, TerrainType::Water));
        }

        for _ in 0..resource_nodes {
            let x = self.rng.gen_range(0.1..0.9);
            let y = self.rng.gen_range(0.1..0.9);
            features.push(
                TerrainFeature::new(x, y, 0.08, 0.1, TerrainType::Mountain).with_influence(0.8),
            );
        }

        for _ in 0..base_locations {
            let x = self.rng.gen_range(0.1..0.9);
            let y = self.rng.gen_range(0.1..0.9);
            // Zero height delta: flattens nothing, but claims the area as grassland
            features.push(TerrainFeature::new(x, y, 0.15, 0.0, TerrainType::Grassland));
        }

        info!(
            "Placing {} strategic features ({} chokepoints, {} resources, {} bases)",
            features.len(),
            chokepoints,
            resource_nodes,
            base_locations
        );

        self.add_features(features)
    }

    /// Classify every cell by elevation thresholds.
    ///
    /// Overwrites all previous classifications, including feature overrides;
    /// apply features after classifying if their types should win.
    pub fn classify(&mut self) -> &[TerrainType] {
        for y in 0..self.config.height {
            for x in 0..self.config.width {
                let elevation = self.heights.get(x, y).unwrap_or(0.0);

                let terrain_type = if elevation < WATER_LEVEL {
                    TerrainType::Water
                } else if elevation < SWAMP_LEVEL {
                    TerrainType::Swamp
                } else if elevation < GRASSLAND_LEVEL {
                    TerrainType::Grassland
                } else if elevation < FOREST_LEVEL {
                    TerrainType::Forest
                } else if elevation < MOUNTAIN_LEVEL {
                    TerrainType::Mountain
                } else {
                    TerrainType::Volcanic
                };

                self.terrain_types[(y * self.config.width + x) as usize] = terrain_type;
            }
        }

        &self.terrain_types
    }

    /// Replace each interior cell with the mean of its 3x3 neighborhood,
    /// `iterations` times. Boundary cells are left untouched.
    pub fn smooth(&mut self, iterations: u32) {
        for _ in 0..iterations {
            let source = self.heights.clone();

            for y in 1..self.config.height.saturating_sub(1) {
                for x in 1..self.config.width.saturating_sub(1) {
                    let mut sum = 0.0;
                    for dy in -1i32..=1 {
                        for dx in -1i32..=1 {
                            let nx = (x as i32 + dx) as u32;
                            let ny = (y as i32 + dy) as u32;
                            sum += source.get(nx, ny).unwrap_or(0.0);
                        }
                    }
                    self.heights.set(x, y, sum / 9.0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u32) -> HeightmapConfig {
        HeightmapConfig {
            width: 8,
            height: 8,
            seed,
            octaves: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        let mut a = HeightmapGenerator::new(small_config(42)).unwrap();
        let mut b = HeightmapGenerator::new(small_config(42)).unwrap();

        let field_a = a.generate().clone();
        let field_b = b.generate().clone();

        // Bit-for-bit identical, not merely approximately equal
        for (va, vb) in field_a.values.iter().zip(field_b.values.iter()) {
            assert_eq!(va.to_bits(), vb.to_bits());
        }
    }

    #[test]
    fn test_seeds_change_output() {
        let mut a = HeightmapGenerator::new(small_config(1)).unwrap();
        let mut b = HeightmapGenerator::new(small_config(2)).unwrap();

        let differs = a
            .generate()
            .values
            .iter()
            .zip(b.generate().values.iter())
            .any(|(x, y)| x != y);
        assert!(differs);
    }

    #[test]
    fn test_generated_values_normalized() {
        let mut generator = HeightmapGenerator::new(HeightmapConfig {
            width: 32,
            height: 32,
            seed: 7,
            ..Default::default()
        })
        .unwrap();

        for &v in &generator.generate().values {
            assert!(
                (-1.0..=1.0).contains(&v),
                "Normalized height {v} outside [-1, 1]"
            );
        }
    }

    #[test]
    fn test_config_validation() {
        let config = HeightmapConfig {
            octaves: 0,
            ..Default::default()
        };
        assert!(matches!(
            HeightmapGenerator::new(config),
            Err(StratmapError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_feature_raises_center_and_overrides_type() {
        let mut generator = HeightmapGenerator::new(HeightmapConfig {
            width: 16,
            height: 16,
            ..Default::default()
        })
        .unwrap();

        // Flat field; center cell is (8, 8) with radius 4 cells (0.25 * 16)
        let feature = TerrainFeature::new(0.5, 0.5, 0.25, 1.0, TerrainType::Mountain);
        generator.add_features(vec![feature]).unwrap();

        // Full influence at the center: height delta applied in full
        assert_eq!(generator.heights().get(8, 8), Some(1.0));
        assert_eq!(
            generator.terrain_types()[(8 * 16 + 8) as usize],
            TerrainType::Mountain
        );

        // Outside the radius nothing changes
        assert_eq!(generator.heights().get(0, 0), Some(0.0));
        assert_eq!(
            generator.terrain_types()[0],
            TerrainType::Grassland,
            "Cells outside the feature keep the default type"
        );

        assert_eq!(generator.features().len(), 1);
    }

    #[test]
    fn test_feature_falloff_is_quadratic() {
        let mut generator = HeightmapGenerator::new(HeightmapConfig {
            width: 16,
            height: 16,
            ..Default::default()
        })
        .unwrap();

        // Radius 8 cells centered at (8, 8)
        let feature = TerrainFeature::new(0.5, 0.5, 0.5, 1.0, TerrainType::Mountain);
        generator.add_features(vec![feature]).unwrap();

        // Two cells out along an axis: influence (1 - 2/8)^2 = 0.5625
        let expected = (1.0f32 - 2.0 / 8.0).powi(2);
        let actual = generator.heights().get(10, 8).unwrap();
        assert!(
            (actual - expected).abs() < 1e-6,
            "Expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_degenerate_feature_radius_rejected() {
        let mut generator = HeightmapGenerator::new(small_config(1)).unwrap();

        let feature = TerrainFeature::new(0.5, 0.5, 0.0, 1.0, TerrainType::Water);
        let result = generator.add_features(vec![feature]);

        assert!(matches!(result, Err(StratmapError::InvalidFeature { .. })));
        assert!(
            generator.features().is_empty(),
            "Rejected features must not be recorded"
        );
    }

    #[test]
    fn test_classification_thresholds() {
        let mut generator = HeightmapGenerator::new(HeightmapConfig {
            width: 7,
            height: 1,
            ..Default::default()
        })
        .unwrap();

        let samples = [-0.5, -0.2, 0.0, 0.2, 0.5, 0.7, 0.95];
        for (x, &elevation) in samples.iter().enumerate() {
            generator.heights.set(x as u32, 0, elevation);
        }

        let expected = [
            TerrainType::Water,
            TerrainType::Swamp,
            TerrainType::Grassland,
            TerrainType::Forest,
            TerrainType::Mountain,
            TerrainType::Volcanic,
            TerrainType::Volcanic,
        ];
        assert_eq!(generator.classify(), &expected);
    }

    #[test]
    fn test_smooth_preserves_flat_field_and_boundary() {
        let mut generator = HeightmapGenerator::new(HeightmapConfig {
            width: 8,
            height: 8,
            ..Default::default()
        })
        .unwrap();

        // A single spike in the middle of a flat field
        generator.heights.set(4, 4, 9.0);
        let boundary_before = generator.heights().get(0, 4);

        generator.smooth(1);

        // Spike spreads to its neighborhood mean
        let spiked = generator.heights().get(4, 4).unwrap();
        assert!((spiked - 1.0).abs() < 1e-6, "Expected 9/9, got {spiked}");

        // Neighbor also receives 1/9 of the spike
        let neighbor = generator.heights().get(3, 4).unwrap();
        assert!((neighbor - 1.0).abs() < 1e-6);

        // Boundary untouched
        assert_eq!(generator.heights().get(0, 4), boundary_before);
    }

    #[test]
    fn test_strategic_features_deterministic() {
        let mut a = HeightmapGenerator::new(small_config(99)).unwrap();
        let mut b = HeightmapGenerator::new(small_config(99)).unwrap();

        a.generate_strategic_features(3, 5, 2).unwrap();
        b.generate_strategic_features(3, 5, 2).unwrap();

        assert_eq!(a.features().len(), 10);
        assert_eq!(a.features(), b.features());
    }
}
