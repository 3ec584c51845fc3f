//! Planner goals

use std::fmt;

use nalgebra::{Isometry3, Point2, Vector2};

use crate::common::{
    angle_difference, pose_from_xyz_yaw, rotate_xy, xy_of, yaw_of, FootstepPlanningError,
    FootstepPlanningResult, RobotSide, SidePair,
};

pub const DEFAULT_XY_TOLERANCE: f64 = 0.05;
pub const DEFAULT_YAW_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FootstepPlannerGoalType {
    PoseBetweenFeet,
    SingleFootPose,
    XyRegion,
}

impl fmt::Display for FootstepPlannerGoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FootstepPlannerGoalType::PoseBetweenFeet => write!(f, "POSE_BETWEEN_FEET"),
            FootstepPlannerGoalType::SingleFootPose => write!(f, "SINGLE_FOOT_POSE"),
            FootstepPlannerGoalType::XyRegion => write!(f, "XY_REGION"),
        }
    }
}

/// Where the plan should end
#[derive(Debug, Clone, PartialEq)]
pub enum FootstepPlannerGoal {
    /// Both feet squared up around `pose`, each `ideal_step_width / 2` to its side
    PoseBetweenFeet {
        pose: Isometry3<f64>,
        xy_tolerance: f64,
        yaw_tolerance: f64,
    },
    /// One foot placed at `pose`
    SingleFootPose {
        side: RobotSide,
        pose: Isometry3<f64>,
        xy_tolerance: f64,
        yaw_tolerance: f64,
    },
    /// Any foot within `xy_tolerance` of `point`, orientation free
    XyRegion { point: Point2<f64>, xy_tolerance: f64 },
}

impl FootstepPlannerGoal {
    pub fn pose_between_feet(pose: Isometry3<f64>) -> Self {
        FootstepPlannerGoal::PoseBetweenFeet {
            pose,
            xy_tolerance: DEFAULT_XY_TOLERANCE,
            yaw_tolerance: DEFAULT_YAW_TOLERANCE,
        }
    }

    pub fn single_foot_pose(side: RobotSide, pose: Isometry3<f64>) -> Self {
        FootstepPlannerGoal::SingleFootPose {
            side,
            pose,
            xy_tolerance: DEFAULT_XY_TOLERANCE,
            yaw_tolerance: DEFAULT_YAW_TOLERANCE,
        }
    }

    pub fn xy_region(point: Point2<f64>, xy_tolerance: f64) -> Self {
        FootstepPlannerGoal::XyRegion { point, xy_tolerance }
    }

    pub fn with_xy_tolerance(mut self, tolerance: f64) -> Self {
        match &mut self {
            FootstepPlannerGoal::PoseBetweenFeet { xy_tolerance, .. }
            | FootstepPlannerGoal::SingleFootPose { xy_tolerance, .. }
            | FootstepPlannerGoal::XyRegion { xy_tolerance, .. } => *xy_tolerance = tolerance,
        }
        self
    }

    /// No effect on `XyRegion` goals
    pub fn with_yaw_tolerance(mut self, tolerance: f64) -> Self {
        match &mut self {
            FootstepPlannerGoal::PoseBetweenFeet { yaw_tolerance, .. }
            | FootstepPlannerGoal::SingleFootPose { yaw_tolerance, .. } => *yaw_tolerance = tolerance,
            FootstepPlannerGoal::XyRegion { .. } => {}
        }
        self
    }

    pub fn goal_type(&self) -> FootstepPlannerGoalType {
        match self {
            FootstepPlannerGoal::PoseBetweenFeet { .. } => FootstepPlannerGoalType::PoseBetweenFeet,
            FootstepPlannerGoal::SingleFootPose { .. } => FootstepPlannerGoalType::SingleFootPose,
            FootstepPlannerGoal::XyRegion { .. } => FootstepPlannerGoalType::XyRegion,
        }
    }

    pub fn xy_tolerance(&self) -> f64 {
        match self {
            FootstepPlannerGoal::PoseBetweenFeet { xy_tolerance, .. }
            | FootstepPlannerGoal::SingleFootPose { xy_tolerance, .. }
            | FootstepPlannerGoal::XyRegion { xy_tolerance, .. } => *xy_tolerance,
        }
    }

    pub fn validate(&self) -> FootstepPlanningResult<()> {
        let xy_tolerance = self.xy_tolerance();
        if !xy_tolerance.is_finite() || xy_tolerance <= 0.0 {
            return Err(FootstepPlanningError::InvalidGoal(format!(
                "xy tolerance must be positive and finite, got {}",
                xy_tolerance
            )));
        }
        match self {
            FootstepPlannerGoal::PoseBetweenFeet { pose, yaw_tolerance, .. }
            | FootstepPlannerGoal::SingleFootPose { pose, yaw_tolerance, .. } => {
                if !yaw_tolerance.is_finite() || *yaw_tolerance <= 0.0 {
                    return Err(FootstepPlanningError::InvalidGoal(format!(
                        "yaw tolerance must be positive and finite, got {}",
                        yaw_tolerance
                    )));
                }
                let t = pose.translation.vector;
                if !(t.x.is_finite() && t.y.is_finite() && t.z.is_finite()) {
                    return Err(FootstepPlanningError::InvalidGoal(
                        "goal pose is not finite".to_string(),
                    ));
                }
            }
            FootstepPlannerGoal::XyRegion { point, .. } => {
                if !(point.x.is_finite() && point.y.is_finite()) {
                    return Err(FootstepPlanningError::InvalidGoal(
                        "goal point is not finite".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Target sole poses for each foot. `None` for `XyRegion` goals.
    pub fn goal_foot_poses(&self, ideal_step_width: f64) -> Option<SidePair<Isometry3<f64>>> {
        match self {
            FootstepPlannerGoal::PoseBetweenFeet { pose, .. } => Some(SidePair::new(
                offset_laterally(pose, 0.5 * ideal_step_width),
                offset_laterally(pose, -0.5 * ideal_step_width),
            )),
            FootstepPlannerGoal::SingleFootPose { side, pose, .. } => {
                let other = offset_laterally(pose, side.opposite().sign() * ideal_step_width);
                Some(match side {
                    RobotSide::Left => SidePair::new(*pose, other),
                    RobotSide::Right => SidePair::new(other, *pose),
                })
            }
            FootstepPlannerGoal::XyRegion { .. } => None,
        }
    }
}

fn offset_laterally(pose: &Isometry3<f64>, lateral: f64) -> Isometry3<f64> {
    let yaw = yaw_of(pose);
    let xy = xy_of(pose) + rotate_xy(Vector2::new(0.0, lateral), yaw);
    pose_from_xyz_yaw(xy.x, xy.y, pose.translation.vector.z, yaw)
}

/// Goal preprocessed for one search
#[derive(Debug, Clone)]
pub(crate) struct ResolvedGoal {
    goal: FootstepPlannerGoal,
    feet: Option<SidePair<Isometry3<f64>>>,
}

impl ResolvedGoal {
    pub(crate) fn new(goal: &FootstepPlannerGoal, ideal_step_width: f64) -> Self {
        Self {
            goal: goal.clone(),
            feet: goal.goal_foot_poses(ideal_step_width),
        }
    }

    pub(crate) fn is_region_goal(&self) -> bool {
        self.feet.is_none()
    }

    /// Target pose for a given foot, pose goals only
    pub(crate) fn foot_pose(&self, side: RobotSide) -> Option<&Isometry3<f64>> {
        self.feet.as_ref().map(|feet| feet.get(side))
    }

    /// Point the given foot is heading for
    pub(crate) fn target_xy(&self, side: RobotSide) -> Vector2<f64> {
        match (&self.feet, &self.goal) {
            (Some(feet), _) => xy_of(feet.get(side)),
            (None, FootstepPlannerGoal::XyRegion { point, .. }) => point.coords,
            (None, _) => Vector2::zeros(),
        }
    }

    /// Planar distance still to cover; for region goals the tolerance disc counts as reached
    pub(crate) fn remaining_distance(&self, side: RobotSide, sole: &Isometry3<f64>) -> f64 {
        let distance = (self.target_xy(side) - xy_of(sole)).norm();
        if self.is_region_goal() {
            (distance - self.goal.xy_tolerance()).max(0.0)
        } else {
            distance
        }
    }

    /// Absolute yaw error to the foot's goal orientation, zero for region goals
    pub(crate) fn yaw_error(&self, side: RobotSide, sole: &Isometry3<f64>) -> f64 {
        self.foot_pose(side)
            .map_or(0.0, |target| angle_difference(yaw_of(target), yaw_of(sole)).abs())
    }

    fn foot_within_tolerance(&self, side: RobotSide, sole: &Isometry3<f64>) -> bool {
        let (xy_tolerance, yaw_tolerance) = match &self.goal {
            FootstepPlannerGoal::PoseBetweenFeet { xy_tolerance, yaw_tolerance, .. }
            | FootstepPlannerGoal::SingleFootPose { xy_tolerance, yaw_tolerance, .. } => {
                (*xy_tolerance, *yaw_tolerance)
            }
            FootstepPlannerGoal::XyRegion { xy_tolerance, .. } => (*xy_tolerance, f64::INFINITY),
        };
        (self.target_xy(side) - xy_of(sole)).norm() <= xy_tolerance
            && self.yaw_error(side, sole) <= yaw_tolerance
    }

    /// Goal predicate for a foot placement and the pose of the other foot
    pub(crate) fn is_satisfied(
        &self,
        side: RobotSide,
        sole: &Isometry3<f64>,
        other_foot: Option<&Isometry3<f64>>,
    ) -> bool {
        match &self.goal {
            FootstepPlannerGoal::PoseBetweenFeet { .. } => {
                self.foot_within_tolerance(side, sole)
                    && other_foot.map_or(false, |other| self.foot_within_tolerance(side.opposite(), other))
            }
            FootstepPlannerGoal::SingleFootPose { side: goal_side, .. } => {
                side == *goal_side && self.foot_within_tolerance(side, sole)
            }
            FootstepPlannerGoal::XyRegion { .. } => self.foot_within_tolerance(side, sole),
        }
    }
}
