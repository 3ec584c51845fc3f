//! Plans, search outcomes and statistics

use std::fmt;
use std::time::Duration;

use nalgebra::Isometry3;

use crate::common::{yaw_of, RobotSide};

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFootstep {
    pub side: RobotSide,
    pub sole_transform: Isometry3<f64>,
    pub supporting_region_id: Option<usize>,
    pub support_fraction: f64,
}

impl PlannedFootstep {
    pub fn yaw(&self) -> f64 {
        yaw_of(&self.sole_transform)
    }
}

/// Ordered footstep sequence, excluding the initial stance
///
/// Plans built by the planner also record the stance foot the first step
/// swings away from, which fixes the side of the first step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FootstepPlan {
    start: Option<PlannedFootstep>,
    steps: Vec<PlannedFootstep>,
}

impl FootstepPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty plan whose first step swings off `start`
    pub fn starting_from(start: PlannedFootstep) -> Self {
        Self {
            start: Some(start),
            steps: Vec::new(),
        }
    }

    /// Stance foot the first step is taken from
    pub fn start(&self) -> Option<&PlannedFootstep> {
        self.start.as_ref()
    }

    /// Side of the first step: opposite the starting stance foot
    pub fn first_swing_side(&self) -> Option<RobotSide> {
        self.start
            .as_ref()
            .map(|start| start.side.opposite())
            .or_else(|| self.steps.first().map(|step| step.side))
    }

    pub fn add_footstep(&mut self, step: PlannedFootstep) {
        self.steps.push(step);
    }

    pub fn number_of_steps(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn footstep(&self, index: usize) -> Option<&PlannedFootstep> {
        self.steps.get(index)
    }

    pub fn footsteps(&self) -> &[PlannedFootstep] {
        &self.steps
    }

    pub fn last(&self) -> Option<&PlannedFootstep> {
        self.steps.last()
    }
}

/// Terminal status of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanningResult {
    Succeeded,
    NoPathExists,
    MaximumIterationsReached,
    TimedOut,
    InvalidGoal,
    PlannerFailed,
}

impl PlanningResult {
    pub fn is_success(self) -> bool {
        self == PlanningResult::Succeeded
    }
}

impl fmt::Display for PlanningResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanningResult::Succeeded => "SUCCEEDED",
            PlanningResult::NoPathExists => "NO_PATH_EXISTS",
            PlanningResult::MaximumIterationsReached => "MAXIMUM_ITERATIONS_REACHED",
            PlanningResult::TimedOut => "TIMED_OUT",
            PlanningResult::InvalidGoal => "INVALID_GOAL",
            PlanningResult::PlannerFailed => "PLANNER_FAILED",
        };
        write!(f, "{}", name)
    }
}

/// Why a candidate foothold was discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepRejectionReason {
    StepNotWideEnough,
    StepTooWide,
    StepTooHighOrLow,
    StepTooForwardAndDown,
    StepTooFar,
    StepYawTooLarge,
    CouldNotSnap,
    SurfaceNormalTooSteep,
    NotEnoughArea,
    StepInPlace,
    TooCloseToCliff,
    CouldNotWiggleInside,
    TooMuchPenetrationAfterWiggle,
}

impl fmt::Display for StepRejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepRejectionReason::StepNotWideEnough => "STEP_NOT_WIDE_ENOUGH",
            StepRejectionReason::StepTooWide => "STEP_TOO_WIDE",
            StepRejectionReason::StepTooHighOrLow => "STEP_TOO_HIGH_OR_LOW",
            StepRejectionReason::StepTooForwardAndDown => "STEP_TOO_FORWARD_AND_DOWN",
            StepRejectionReason::StepTooFar => "STEP_TOO_FAR",
            StepRejectionReason::StepYawTooLarge => "STEP_YAW_TOO_LARGE",
            StepRejectionReason::CouldNotSnap => "COULD_NOT_SNAP",
            StepRejectionReason::SurfaceNormalTooSteep => "SURFACE_NORMAL_TOO_STEEP",
            StepRejectionReason::NotEnoughArea => "NOT_ENOUGH_AREA",
            StepRejectionReason::StepInPlace => "STEP_IN_PLACE",
            StepRejectionReason::TooCloseToCliff => "TOO_CLOSE_TO_CLIFF",
            StepRejectionReason::CouldNotWiggleInside => "COULD_NOT_WIGGLE_INSIDE",
            StepRejectionReason::TooMuchPenetrationAfterWiggle => "TOO_MUCH_PENETRATION_AFTER_WIGGLE",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlannerStatistics {
    pub nodes_expanded: usize,
    pub nodes_created: usize,
    pub candidates_rejected: usize,
    pub planning_time: Duration,
}

/// Everything a `plan()` call returns
#[derive(Debug, Clone, PartialEq)]
pub struct PlanningOutcome {
    pub result: PlanningResult,
    /// Present only when `result` is `Succeeded`
    pub plan: Option<FootstepPlan>,
    pub statistics: PlannerStatistics,
}

impl PlanningOutcome {
    pub fn failed(result: PlanningResult) -> Self {
        Self {
            result,
            plan: None,
            statistics: PlannerStatistics::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::pose_from_xyz_yaw;

    #[test]
    fn test_result_names() {
        assert_eq!(PlanningResult::MaximumIterationsReached.to_string(), "MAXIMUM_ITERATIONS_REACHED");
        assert_eq!(StepRejectionReason::TooCloseToCliff.to_string(), "TOO_CLOSE_TO_CLIFF");
        assert!(PlanningResult::Succeeded.is_success());
        assert!(!PlanningResult::TimedOut.is_success());
    }

    #[test]
    fn test_plan_is_append_only_sequence() {
        let mut plan = FootstepPlan::new();
        assert!(plan.is_empty());
        for (i, side) in [RobotSide::Right, RobotSide::Left].into_iter().enumerate() {
            plan.add_footstep(PlannedFootstep {
                side,
                sole_transform: pose_from_xyz_yaw(0.3 * (i + 1) as f64, 0.0, 0.0, 0.0),
                supporting_region_id: Some(0),
                support_fraction: 1.0,
            });
        }
        assert_eq!(plan.number_of_steps(), 2);
        assert_eq!(plan.last().map(|s| s.side), Some(RobotSide::Left));
        assert_eq!(plan.first_swing_side(), Some(RobotSide::Right));
        assert!(plan.start().is_none());
        assert_eq!(PlanningOutcome::failed(PlanningResult::InvalidGoal).plan, None);
    }

    #[test]
    fn test_start_fixes_first_swing_side() {
        let start = PlannedFootstep {
            side: RobotSide::Right,
            sole_transform: pose_from_xyz_yaw(0.0, -0.1, 0.0, 0.0),
            supporting_region_id: Some(0),
            support_fraction: 1.0,
        };
        let plan = FootstepPlan::starting_from(start.clone());
        assert!(plan.is_empty());
        assert_eq!(plan.start(), Some(&start));
        assert_eq!(plan.first_swing_side(), Some(RobotSide::Left));
        assert_ne!(plan, FootstepPlan::new());
    }
}
