//! Geometry of the stepping environment
//!
//! Polygons and planar regions are the world model the footstep planner
//! reads. They are produced elsewhere (perception) and never mutated here.

pub mod polygon;
pub mod planar_region;

pub use polygon::{project_onto_segment, BoundaryProjection, Polygon2D};
pub use planar_region::{BoundaryEdge, PlanarRegion, PlanarRegionsList};
