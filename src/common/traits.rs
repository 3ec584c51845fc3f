//! Common traits defining the seams of the footstep planner

use std::sync::Arc;

use nalgebra::{Isometry3, Point2};

use crate::common::error::FootstepPlanningResult;
use crate::common::types::RobotSide;
use crate::footstep_planning::{
    FootholdSnap, FootstepNode, FootstepPlan, FootstepPlannerGoal, FootstepPlannerParameters,
    PlanningOutcome, StepRejectionReason,
};
use crate::geometry::{PlanarRegionsList, Polygon2D};

/// Trait for footstep planners driven through setters, then `plan()`
pub trait FootstepPlanner {
    /// Replace the parameter set used by subsequent searches
    fn set_parameters(&mut self, parameters: FootstepPlannerParameters) -> FootstepPlanningResult<()>;

    /// Replace the environment model
    fn set_planar_regions(&mut self, regions: Arc<PlanarRegionsList>);

    /// Set the stance foot the plan starts from
    fn set_initial_stance_foot(&mut self, stance_pose: Isometry3<f64>, side: RobotSide);

    /// Set the goal
    fn set_goal(&mut self, goal: FootstepPlannerGoal) -> FootstepPlanningResult<()>;

    /// Run one search with the current inputs
    fn plan(&mut self) -> PlanningOutcome;

    /// Plan produced by the last successful `plan()` call
    fn get_plan(&self) -> Option<&FootstepPlan>;
}

/// Places a foot on the environment
///
/// Given the foot outline in world XY and the sole position, returns the
/// supporting region, its height at the sole and the supported area fraction.
pub trait FootholdSnapper: Send + Sync {
    fn snap(
        &self,
        regions: &PlanarRegionsList,
        footprint_xy: &Polygon2D,
        sole_xy: &Point2<f64>,
    ) -> Option<FootholdSnap>;
}

/// Observer of search progress. Every callback defaults to a no-op.
pub trait FootstepPlannerListener: Send {
    fn planar_regions_set(&mut self, _regions: &PlanarRegionsList) {}

    fn goal_set(&mut self, _goal: &FootstepPlannerGoal) {}

    fn node_selected_for_expansion(&mut self, _node: &FootstepNode) {}

    fn node_rejected(&mut self, _node: &FootstepNode, _reason: StepRejectionReason) {}

    fn plan_found(&mut self, _plan: &FootstepPlan) {}
}

/// Listener that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpListener;

impl FootstepPlannerListener for NoOpListener {}

/// Trait for things that can be drawn by the footstep visualizer
pub trait Visualizable {
    fn visualize(&self, vis: &mut crate::utils::FootstepVisualizer);
}
