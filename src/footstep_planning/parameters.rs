//! Footstep planner parameters
//!
//! One immutable value per search. The anytime planner may swap the whole
//! struct between searches, never during one.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::{FootstepPlanningError, FootstepPlanningResult};

/// Configuration for the planar-region footstep planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootstepPlannerParameters {
    /// Forward distance of a nominal step from the stance foot [m]
    pub ideal_step_length: f64,
    /// Lateral distance between feet in nominal stance [m]
    pub ideal_step_width: f64,
    /// Maximum 3D distance between consecutive footholds [m]
    pub maximum_step_reach: f64,
    /// Maximum lateral distance from the stance foot [m]
    pub maximum_step_width: f64,
    /// Minimum lateral distance from the stance foot, toward the swing side [m]
    pub minimum_step_width: f64,
    /// Maximum yaw change between stance and swing foot [rad]
    pub maximum_step_yaw: f64,
    /// Maximum height change between stance and swing foot [m]
    pub maximum_step_z: f64,
    /// Forward distance above which a downward step uses the tighter bound [m]
    pub maximum_step_x_when_forward_and_down: f64,
    /// Downward height limit applied to steps longer than the value above [m]
    pub maximum_step_z_when_forward_and_down: f64,
    /// Fraction of the sole area that must lie over the supporting region
    pub minimum_foothold_percent: f64,
    /// Height of a neighbouring region above the foot that counts as a cliff [m]
    pub cliff_height_to_shift_away_from: f64,
    /// Horizontal clearance kept between the sole position and a cliff base [m]
    pub minimum_distance_from_cliff_bottoms: f64,
    /// Search budget: number of popped (expanded) nodes
    pub maximum_number_of_nodes_to_expand: usize,

    /// Margin kept between the sole corners and the region boundary when wiggling [m]
    pub wiggle_inside_delta: f64,
    /// Largest translation a wiggle may apply [m]
    pub maximum_xy_wiggle_distance: f64,
    /// Largest yaw change a wiggle may apply [rad]
    pub maximum_yaw_wiggle: f64,
    /// Reject footholds whose sole cannot be wiggled fully inside the region
    pub reject_if_cannot_fully_wiggle_inside: bool,
    /// Wiggle into the convex hull of the region outline instead of the outline itself
    pub wiggle_into_convex_hull_of_planar_regions: bool,
    /// Depth a neighbouring region may poke up through the wiggled sole [m]
    pub maximum_z_penetration_on_v_regions: f64,

    /// Sole length along its x-axis [m]
    pub foot_length: f64,
    /// Sole width along its y-axis [m]
    pub foot_width: f64,
    /// Snapped region normals with a smaller z-component are too steep to stand on
    pub minimum_surface_normal_z: f64,
    /// Fixed cost charged for every step
    pub cost_per_step: f64,
    /// Cost per meter of deviation from the ideal step
    pub step_deviation_weight: f64,
    /// Cost per radian of yaw change
    pub yaw_weight: f64,
    /// Cost per meter of height change
    pub height_weight: f64,
    /// Inflation of the heuristic (1.0 = admissible-ish A*, larger = greedier)
    pub heuristic_weight: f64,
    /// Closed-set discretization of sole position [m]
    pub closed_set_xy_resolution: f64,
    /// Closed-set discretization of sole yaw [rad]
    pub closed_set_yaw_resolution: f64,
    /// A swing foot landing this close to its previous position is stepping in place [m]
    pub step_in_place_tolerance: f64,
    /// Wall-clock budget for one-shot planning, unlimited when absent [s]
    pub timeout_seconds: Option<f64>,
    /// Anytime planner: stop searching after the first complete plan
    pub exit_after_initial_solution: bool,
}

impl Default for FootstepPlannerParameters {
    fn default() -> Self {
        Self {
            ideal_step_length: 0.3,
            ideal_step_width: 0.2,
            maximum_step_reach: 0.55,
            maximum_step_width: 0.35,
            minimum_step_width: 0.1,
            maximum_step_yaw: 0.4,
            maximum_step_z: 0.25,
            maximum_step_x_when_forward_and_down: 0.2,
            maximum_step_z_when_forward_and_down: 0.1,
            minimum_foothold_percent: 0.9,
            cliff_height_to_shift_away_from: 0.05,
            minimum_distance_from_cliff_bottoms: 0.15,
            maximum_number_of_nodes_to_expand: 20_000,
            wiggle_inside_delta: 0.02,
            maximum_xy_wiggle_distance: 0.05,
            maximum_yaw_wiggle: 0.1,
            reject_if_cannot_fully_wiggle_inside: false,
            wiggle_into_convex_hull_of_planar_regions: true,
            maximum_z_penetration_on_v_regions: 0.008,
            foot_length: 0.22,
            foot_width: 0.11,
            minimum_surface_normal_z: 0.7,
            cost_per_step: 0.15,
            step_deviation_weight: 1.5,
            yaw_weight: 0.1,
            height_weight: 0.5,
            heuristic_weight: 1.5,
            closed_set_xy_resolution: 0.05,
            closed_set_yaw_resolution: 0.1,
            step_in_place_tolerance: 0.1,
            timeout_seconds: None,
            exit_after_initial_solution: false,
        }
    }
}

impl FootstepPlannerParameters {
    /// Load parameters from a YAML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> FootstepPlanningResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(yaml: &str) -> FootstepPlanningResult<Self> {
        let parameters: Self =
            serde_yaml::from_str(yaml).map_err(|e| FootstepPlanningError::ConfigLoad(e.to_string()))?;
        parameters.validate()?;
        Ok(parameters)
    }

    pub fn to_yaml(&self) -> FootstepPlanningResult<String> {
        serde_yaml::to_string(self).map_err(|e| FootstepPlanningError::ConfigLoad(e.to_string()))
    }

    pub fn validate(&self) -> FootstepPlanningResult<()> {
        let positive = [
            ("ideal_step_length", self.ideal_step_length),
            ("ideal_step_width", self.ideal_step_width),
            ("maximum_step_reach", self.maximum_step_reach),
            ("maximum_step_width", self.maximum_step_width),
            ("maximum_step_yaw", self.maximum_step_yaw),
            ("maximum_step_z", self.maximum_step_z),
            ("foot_length", self.foot_length),
            ("foot_width", self.foot_width),
            ("cost_per_step", self.cost_per_step),
            ("heuristic_weight", self.heuristic_weight),
            ("closed_set_xy_resolution", self.closed_set_xy_resolution),
            ("closed_set_yaw_resolution", self.closed_set_yaw_resolution),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(FootstepPlanningError::InvalidParameter(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }

        let non_negative = [
            ("minimum_step_width", self.minimum_step_width),
            ("maximum_step_x_when_forward_and_down", self.maximum_step_x_when_forward_and_down),
            ("maximum_step_z_when_forward_and_down", self.maximum_step_z_when_forward_and_down),
            ("cliff_height_to_shift_away_from", self.cliff_height_to_shift_away_from),
            ("minimum_distance_from_cliff_bottoms", self.minimum_distance_from_cliff_bottoms),
            ("step_deviation_weight", self.step_deviation_weight),
            ("yaw_weight", self.yaw_weight),
            ("height_weight", self.height_weight),
            ("step_in_place_tolerance", self.step_in_place_tolerance),
            ("wiggle_inside_delta", self.wiggle_inside_delta),
            ("maximum_xy_wiggle_distance", self.maximum_xy_wiggle_distance),
            ("maximum_yaw_wiggle", self.maximum_yaw_wiggle),
            ("maximum_z_penetration_on_v_regions", self.maximum_z_penetration_on_v_regions),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(FootstepPlanningError::InvalidParameter(format!(
                    "{} must be non-negative and finite, got {}",
                    name, value
                )));
            }
        }

        if self.minimum_step_width > self.maximum_step_width {
            return Err(FootstepPlanningError::InvalidParameter(format!(
                "minimum_step_width ({}) exceeds maximum_step_width ({})",
                self.minimum_step_width, self.maximum_step_width
            )));
        }
        if !(0.0..=1.0).contains(&self.minimum_foothold_percent) {
            return Err(FootstepPlanningError::InvalidParameter(format!(
                "minimum_foothold_percent must be in [0, 1], got {}",
                self.minimum_foothold_percent
            )));
        }
        if !(0.0..=1.0).contains(&self.minimum_surface_normal_z) {
            return Err(FootstepPlanningError::InvalidParameter(format!(
                "minimum_surface_normal_z must be in [0, 1], got {}",
                self.minimum_surface_normal_z
            )));
        }
        if self.maximum_number_of_nodes_to_expand == 0 {
            return Err(FootstepPlanningError::InvalidParameter(
                "maximum_number_of_nodes_to_expand must be at least 1".to_string(),
            ));
        }
        if let Some(timeout) = self.timeout_seconds {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(FootstepPlanningError::InvalidParameter(format!(
                    "timeout_seconds must be positive, got {}",
                    timeout
                )));
            }
        }
        Ok(())
    }

    /// Foot sole area used as the denominator of the support fraction
    pub fn foot_area(&self) -> f64 {
        self.foot_length * self.foot_width
    }
}
