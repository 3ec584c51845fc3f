//! rust_footstep_planning - bipedal footstep planning over planar regions
//!
//! This crate plans footstep sequences for a two-legged robot across an
//! environment described as a list of planar regions, either in one shot or
//! with an anytime planner running on a background thread.

// Core modules
pub mod common;
pub mod geometry;
pub mod utils;

// Algorithm modules
pub mod footstep_planning;

// Re-export common types for convenience
pub use common::{RobotSide, SidePair};
pub use common::{FootholdSnapper, FootstepPlanner, FootstepPlannerListener, Visualizable};
pub use common::{FootstepPlanningError, FootstepPlanningResult};
pub use geometry::{PlanarRegion, PlanarRegionsList, Polygon2D};
pub use footstep_planning::{
    AnytimeFootstepPlanner, FootstepPlan, FootstepPlannerGoal, FootstepPlannerParameters, InitialStance,
    PlanarRegionBipedalFootstepPlanner, PlanningOutcome, PlanningResult,
};
