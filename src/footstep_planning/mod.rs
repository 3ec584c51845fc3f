//! Footstep planning over planar regions
//!
//! - One-shot best-first search: [`plan`] and [`PlanarRegionBipedalFootstepPlanner`]
//! - Background anytime variant: [`AnytimeFootstepPlanner`]
//! - Synthetic environments for tests and demos: [`environments`]

pub mod parameters;
pub mod goal;
pub mod node;
pub mod plan;
pub mod snapping;
pub mod wiggle;
pub mod cliff_avoidance;
pub mod step_envelope;
pub mod expansion;
pub mod graph_search;
pub mod listener;
pub mod anytime;
pub mod environments;

pub use parameters::FootstepPlannerParameters;
pub use goal::{FootstepPlannerGoal, FootstepPlannerGoalType};
pub use node::{FootstepNode, NodeArena, NodeIndex, NodeKey};
pub use plan::{
    FootstepPlan, PlannedFootstep, PlannerStatistics, PlanningOutcome, PlanningResult, StepRejectionReason,
};
pub use snapping::{FootholdSnap, PlanarRegionSnapper};
pub use wiggle::{wiggle_foothold, WiggledFoothold};
pub use cliff_avoidance::shift_away_from_cliff_bottoms;
pub use expansion::StepDelta;
pub use graph_search::{plan, FootstepGraphSearch, InitialStance, PlanarRegionBipedalFootstepPlanner, SearchStep};
pub use listener::RejectionCounter;
pub use anytime::{AnytimeFootstepPlanner, AnytimePlannerState};
