use crate::errors::{StratmapError, StratmapResult};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub mod heightmap;
pub mod noise_field;

pub use heightmap::{HeightmapConfig, HeightmapGenerator};
pub use noise_field::NoiseField;

/// Closed set of terrain classifications.
///
/// `Road` is never produced by elevation classification; grid consumers may
/// paint it onto cells to model cheap movement corridors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum TerrainType {
    #[display("water")]
    Water,
    #[display("swamp")]
    Swamp,
    #[display("grassland")]
    Grassland,
    #[display("forest")]
    Forest,
    #[display("mountain")]
    Mountain,
    #[display("volcanic")]
    Volcanic,
    #[display("road")]
    Road,
}

impl Default for TerrainType {
    fn default() -> Self {
        TerrainType::Grassland
    }
}

/// Normalized height field, row-major.
///
/// Values are mutated only while a generator is shaping them; consumers
/// should treat a finished field as immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct HeightField {
    #[validate(range(min = 1, max = 4096))]
    pub width: u32,
    #[validate(range(min = 1, max = 4096))]
    pub height: u32,
    pub values: Vec<f32>, // Flattened 2D array (row-major)
}

impl HeightField {
    /// Create a new height field with validation
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> StratmapResult<Self> {
        let expected = (width as usize) * (height as usize);
        if values.len() != expected {
            return Err(StratmapError::HeightFieldSizeMismatch {
                actual: values.len(),
                width,
                height,
                expected,
            });
        }

        let field = Self {
            width,
            height,
            values,
        };

        field.validate().map_err(StratmapError::from_validation)?;

        Ok(field)
    }

    /// Create a field filled with a constant elevation
    pub fn filled(width: u32, height: u32, value: f32) -> StratmapResult<Self> {
        let values = vec![value; (width as usize) * (height as usize)];
        Self::new(width, height, values)
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    /// Elevation at a grid position, `None` out of bounds
    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.values.get(self.index(x, y)).copied()
    }

    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let idx = self.index(x, y);
        self.values[idx] = value;
    }
}

/// A localized terrain feature blended additively into a height field.
///
/// Center and radius are normalized: `x`/`y` in [0, 1] across the map,
/// `radius` as a fraction of the shorter map edge. Influence falls off
/// quadratically from the center; cells receiving influence above 0.5 take
/// the feature's terrain type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainFeature {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub height: f32,
    pub terrain_type: TerrainType,
    pub influence: f32,
}

impl TerrainFeature {
    pub fn new(x: f32, y: f32, radius: f32, height: f32, terrain_type: TerrainType) -> Self {
        Self {
            x,
            y,
            radius,
            height,
            terrain_type,
            influence: 1.0,
        }
    }

    /// Override the default influence weight of 1.0
    pub fn with_influence(mut self, influence: f32) -> Self {
        self.influence = influence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_field_size_validation() {
        let result = HeightField::new(3, 3, vec![0.0; 8]);
        assert!(matches!(
            result,
            Err(StratmapError::HeightFieldSizeMismatch { expected: 9, .. })
        ));

        let result = HeightField::new(0, 3, vec![]);
        assert!(result.is_err(), "Zero width should fail validation");
    }

    #[test]
    fn test_height_field_get_set() {
        let mut field = HeightField::filled(3, 3, 0.0).unwrap();

        field.set(1, 2, 0.75);
        assert_eq!(field.get(1, 2), Some(0.75));
        assert_eq!(field.get(0, 0), Some(0.0));
        assert_eq!(field.get(3, 0), None); // Out of bounds

        // Out-of-bounds writes are ignored
        field.set(10, 10, 1.0);
        assert_eq!(field.values.len(), 9);
    }

    #[test]
    fn test_feature_builder() {
        let feature =
            TerrainFeature::new(0.5, 0.5, 0.1, -0.3, TerrainType::Water).with_influence(0.8);
        assert_eq!(feature.influence, 0.8);
        assert_eq!(feature.terrain_type, TerrainType::Water);
    }

    #[test]
    fn test_terrain_type_display() {
        assert_eq!(TerrainType::Grassland.to_string(), "grassland");
        assert_eq!(TerrainType::Volcanic.to_string(), "volcanic");
    }
}
