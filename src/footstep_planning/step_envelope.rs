//! Kinematic reachability of a step relative to the stance foot

use nalgebra::{Isometry3, Vector2};

use crate::common::{angle_difference, rotate_xy, xy_of, yaw_of, RobotSide};
use crate::footstep_planning::{FootstepPlannerParameters, StepRejectionReason};

/// A swing foot placement expressed in the stance foot's z-up frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeStep {
    /// Forward/lateral offset in the stance frame
    pub local_xy: Vector2<f64>,
    /// Lateral offset toward the swing foot's own side (positive = outward)
    pub lateral_outward: f64,
    pub dz: f64,
    pub dyaw: f64,
}

impl RelativeStep {
    pub fn new(stance: &Isometry3<f64>, swing_side: RobotSide, candidate: &Isometry3<f64>) -> Self {
        let stance_yaw = yaw_of(stance);
        let local_xy = rotate_xy(xy_of(candidate) - xy_of(stance), -stance_yaw);
        Self {
            local_xy,
            lateral_outward: swing_side.sign() * local_xy.y,
            dz: candidate.translation.vector.z - stance.translation.vector.z,
            dyaw: angle_difference(yaw_of(candidate), stance_yaw),
        }
    }

    pub fn reach(&self) -> f64 {
        (self.local_xy.norm_squared() + self.dz * self.dz).sqrt()
    }
}

/// Checks that hold regardless of terrain: width, planar reach and yaw
pub fn check_planar_envelope(
    parameters: &FootstepPlannerParameters,
    step: &RelativeStep,
) -> Result<(), StepRejectionReason> {
    if step.lateral_outward < parameters.minimum_step_width {
        return Err(StepRejectionReason::StepNotWideEnough);
    }
    if step.lateral_outward > parameters.maximum_step_width {
        return Err(StepRejectionReason::StepTooWide);
    }
    if step.local_xy.norm() > parameters.maximum_step_reach {
        return Err(StepRejectionReason::StepTooFar);
    }
    if step.dyaw.abs() > parameters.maximum_step_yaw + 1e-9 {
        return Err(StepRejectionReason::StepYawTooLarge);
    }
    Ok(())
}

/// Full envelope including height, forward-and-down and 3D reach
pub fn check_step_envelope(
    parameters: &FootstepPlannerParameters,
    step: &RelativeStep,
) -> Result<(), StepRejectionReason> {
    check_planar_envelope(parameters, step)?;
    if step.dz.abs() > parameters.maximum_step_z {
        return Err(StepRejectionReason::StepTooHighOrLow);
    }
    if step.local_xy.x > parameters.maximum_step_x_when_forward_and_down
        && step.dz < -parameters.maximum_step_z_when_forward_and_down.abs()
    {
        return Err(StepRejectionReason::StepTooForwardAndDown);
    }
    if step.reach() > parameters.maximum_step_reach {
        return Err(StepRejectionReason::StepTooFar);
    }
    Ok(())
}
