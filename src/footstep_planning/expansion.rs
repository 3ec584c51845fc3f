//! Candidate generation around the stance foot
//!
//! Candidates are sampled on a lattice scaled from an "ideal step": a nominal
//! stride turned toward the goal when far away, or the offset to the goal foot
//! pose when close. The same ideal step is the reference of the deviation cost.

use itertools::iproduct;
use nalgebra::{Isometry3, Point2, Vector2};

use crate::common::{angle_difference, rotate_xy, xy_of, yaw_of, RobotSide};
use crate::footstep_planning::goal::ResolvedGoal;
use crate::footstep_planning::FootstepPlannerParameters;

/// Forward samples as multiples of the ideal step length
const FORWARD_MULTIPLIERS: [f64; 5] = [0.5, 0.75, 1.0, 1.25, 1.5];
/// Ideal steps are kept inside this fraction of the maximum reach
const IDEAL_REACH_FRACTION: f64 = 0.9;
/// Heading errors below this do not shorten the ideal step [rad]
const HEADING_EPSILON: f64 = 1e-3;

/// Extra step offset tried from every stance foot
///
/// `lateral` is measured outward from the stance foot toward the swing foot's
/// side, so a seed applies symmetrically to both feet. `yaw` is the change in
/// heading relative to the stance foot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepDelta {
    pub forward: f64,
    pub lateral: f64,
    pub yaw: f64,
}

impl StepDelta {
    pub fn new(forward: f64, lateral: f64, yaw: f64) -> Self {
        Self { forward, lateral, yaw }
    }
}

/// Preferred next step in the stance foot's z-up frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdealStep {
    pub local_xy: Vector2<f64>,
    /// Heading change relative to the stance foot, within the yaw limit
    pub yaw: f64,
}

/// Unsnapped world placement of a swing foot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepCandidate {
    pub xy: Point2<f64>,
    pub yaw: f64,
}

pub(crate) fn compute_ideal_step(
    parameters: &FootstepPlannerParameters,
    stance: &Isometry3<f64>,
    swing_side: RobotSide,
    goal: &ResolvedGoal,
) -> IdealStep {
    let stance_yaw = yaw_of(stance);
    let stance_xy = xy_of(stance);
    let to_goal = goal.target_xy(swing_side) - stance_xy;
    let distance = to_goal.norm();
    let to_goal_local = rotate_xy(to_goal, -stance_yaw);
    let far = goal.is_region_goal() || distance > 2.0 * parameters.maximum_step_reach;

    let mut ideal = if far {
        let mut ideal = Vector2::new(
            parameters.ideal_step_length,
            swing_side.negate_if_right(parameters.ideal_step_width),
        );
        // Shorten strides while the heading still has to turn a lot
        let heading_error = to_goal_local.y.atan2(to_goal_local.x);
        if heading_error.abs() > HEADING_EPSILON {
            let steps_to_turn = heading_error.abs() / parameters.maximum_step_yaw;
            let distance_per_step = 0.25 * distance / steps_to_turn;
            ideal.x = ideal.x.min(distance_per_step);
        }
        ideal
    } else {
        to_goal_local
    };

    let max_length = IDEAL_REACH_FRACTION * parameters.maximum_step_reach;
    let length = ideal.norm();
    if length > max_length {
        ideal *= max_length / length;
    }
    let min_lateral = 1.01 * parameters.minimum_step_width;
    if swing_side.sign() * ideal.y < min_lateral {
        ideal.y = swing_side.negate_if_right(min_lateral);
    }

    let ideal_xy = stance_xy + rotate_xy(ideal, stance_yaw);
    let target_yaw = match goal.foot_pose(swing_side) {
        Some(target) if !far => yaw_of(target),
        _ => {
            let remaining = goal.target_xy(swing_side) - ideal_xy;
            if remaining.norm() > 1e-6 {
                remaining.y.atan2(remaining.x)
            } else {
                stance_yaw
            }
        }
    };
    let max_yaw = parameters.maximum_step_yaw;
    IdealStep {
        local_xy: ideal,
        yaw: angle_difference(target_yaw, stance_yaw).clamp(-max_yaw, max_yaw),
    }
}

/// Lateral samples from the minimum width toward the maximum, in quarter steps
fn lateral_samples(parameters: &FootstepPlannerParameters) -> Vec<f64> {
    let increment = parameters.maximum_step_width / 4.0;
    let mut samples = Vec::new();
    let mut lateral = parameters.minimum_step_width;
    while lateral < parameters.maximum_step_width {
        samples.push(lateral);
        lateral += increment;
    }
    samples
}

/// Every placement to try for the swing foot, in a fixed order:
/// ideal step, direct goal step, lattice, side step, then the seeds.
pub(crate) fn candidate_steps(
    parameters: &FootstepPlannerParameters,
    stance: &Isometry3<f64>,
    swing_side: RobotSide,
    goal: &ResolvedGoal,
    ideal: &IdealStep,
    seeds: &[StepDelta],
) -> Vec<StepCandidate> {
    let stance_yaw = yaw_of(stance);
    let stance_xy = xy_of(stance);
    let place = |local: Vector2<f64>, dyaw: f64| StepCandidate {
        xy: Point2::from(stance_xy + rotate_xy(local, stance_yaw)),
        yaw: stance_yaw + dyaw,
    };

    let mut candidates = vec![place(ideal.local_xy, ideal.yaw)];

    if let Some(target) = goal.foot_pose(swing_side) {
        let local = rotate_xy(xy_of(target) - stance_xy, -stance_yaw);
        let dyaw = angle_difference(yaw_of(target), stance_yaw);
        if local.norm() <= parameters.maximum_step_reach && dyaw.abs() <= parameters.maximum_step_yaw {
            candidates.push(StepCandidate {
                xy: Point2::from(xy_of(target)),
                yaw: yaw_of(target),
            });
        }
    }

    let laterals = lateral_samples(parameters);
    for (multiplier, lateral) in iproduct!(FORWARD_MULTIPLIERS, laterals.iter()) {
        let local = Vector2::new(multiplier * ideal.local_xy.x, swing_side.negate_if_right(*lateral));
        candidates.push(place(local, ideal.yaw));
    }

    candidates.push(place(
        Vector2::new(0.0, swing_side.negate_if_right(parameters.ideal_step_width)),
        ideal.yaw,
    ));

    for seed in seeds {
        let local = Vector2::new(seed.forward, swing_side.negate_if_right(seed.lateral));
        candidates.push(place(local, seed.yaw));
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::pose_from_xyz_yaw;
    use crate::footstep_planning::FootstepPlannerGoal;
    use approx::assert_relative_eq;

    fn region_goal(x: f64, y: f64) -> ResolvedGoal {
        ResolvedGoal::new(&FootstepPlannerGoal::xy_region(Point2::new(x, y), 0.5), 0.2)
    }

    #[test]
    fn test_far_goal_uses_nominal_stride() {
        let parameters = FootstepPlannerParameters::default();
        let stance = pose_from_xyz_yaw(0.0, 0.1, 0.0, 0.0);
        let ideal = compute_ideal_step(&parameters, &stance, RobotSide::Right, &region_goal(9.0, 0.1));
        assert_relative_eq!(ideal.local_xy.x, 0.3, epsilon = 1e-12);
        assert_relative_eq!(ideal.local_xy.y, -0.2, epsilon = 1e-12);
        assert!(ideal.yaw.abs() < 0.05);
    }

    #[test]
    fn test_goal_behind_shortens_and_turns() {
        let parameters = FootstepPlannerParameters::default();
        let stance = pose_from_xyz_yaw(0.0, 0.1, 0.0, 0.0);
        let ideal = compute_ideal_step(&parameters, &stance, RobotSide::Right, &region_goal(-3.0, 0.1));
        assert!(ideal.local_xy.x < 0.3);
        assert_relative_eq!(ideal.yaw.abs(), parameters.maximum_step_yaw, epsilon = 1e-12);
    }

    #[test]
    fn test_near_pose_goal_steps_to_goal_foot() {
        let parameters = FootstepPlannerParameters::default();
        let goal = ResolvedGoal::new(
            &FootstepPlannerGoal::pose_between_feet(pose_from_xyz_yaw(0.3, 0.0, 0.0, 0.2)),
            parameters.ideal_step_width,
        );
        let stance = pose_from_xyz_yaw(0.0, 0.1, 0.0, 0.0);
        let ideal = compute_ideal_step(&parameters, &stance, RobotSide::Right, &goal);
        let target = goal.foot_pose(RobotSide::Right).unwrap();
        assert_relative_eq!(ideal.local_xy.x, target.translation.vector.x, epsilon = 1e-12);
        assert_relative_eq!(ideal.yaw, 0.2, epsilon = 1e-12);

        let candidates = candidate_steps(&parameters, &stance, RobotSide::Right, &goal, &ideal, &[]);
        assert!(candidates
            .iter()
            .any(|c| (c.xy.coords - xy_of(target)).norm() < 1e-12 && (c.yaw - 0.2).abs() < 1e-12));
    }

    #[test]
    fn test_lattice_and_seeds() {
        let parameters = FootstepPlannerParameters::default();
        assert_eq!(lateral_samples(&parameters).len(), 3);

        let stance = pose_from_xyz_yaw(0.0, -0.1, 0.0, 0.0);
        let goal = region_goal(5.0, 0.0);
        let ideal = compute_ideal_step(&parameters, &stance, RobotSide::Left, &goal);
        let seeds = [StepDelta::new(0.1, 0.25, 0.0)];
        let candidates = candidate_steps(&parameters, &stance, RobotSide::Left, &goal, &ideal, &seeds);
        // ideal + 5x3 lattice + side step + seed
        assert_eq!(candidates.len(), 1 + 15 + 1 + 1);
        assert!(candidates.iter().all(|c| c.xy.y > -0.1));
        let seed = candidates.last().unwrap();
        assert_relative_eq!(seed.xy.x, 0.1, epsilon = 1e-12);
        assert_relative_eq!(seed.xy.y, 0.15, epsilon = 1e-12);
    }
}
