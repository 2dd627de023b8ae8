pub mod errors;
pub mod pathfinding;
pub mod placement;
pub mod terrain;

// Selective re-exports for external consumers

// Errors - every fallible operation returns these
pub use errors::{StratmapError, StratmapResult};

// Terrain - generation inputs and outputs
pub use terrain::{
    HeightField, HeightmapConfig, HeightmapGenerator, NoiseField, TerrainFeature, TerrainType,
};

// Pathfinding - grid, single queries and coordinated movement
pub use pathfinding::{
    DynamicObstacle, GridPos, PathCoordinator, SpatialGrid, find_path, find_path_with_overlay,
    smooth_path,
};

// Placement - strategic scoring, base layouts and formations
pub use placement::{
    BaseLayout, BaseLayoutGenerator, BaseLayoutOptimizer, Building, BuildingType, Chokepoint,
    FormationConfig, FormationGenerator, FormationOptimizer, FormationType, HighGround,
    ResourceNode, ResourceType, StrategicContext, Threat, Unit, UnitType,
};
