//! Common types used throughout rust_footstep_planning

use std::f64::consts::PI;
use std::fmt;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector2, Vector3};

/// Which foot a stance or step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RobotSide {
    Left,
    Right,
}

impl RobotSide {
    pub const BOTH: [RobotSide; 2] = [RobotSide::Left, RobotSide::Right];

    pub fn opposite(self) -> Self {
        match self {
            RobotSide::Left => RobotSide::Right,
            RobotSide::Right => RobotSide::Left,
        }
    }

    /// +1 for left, -1 for right. Lateral offsets to the outside of a foot use this sign.
    pub fn sign(self) -> f64 {
        match self {
            RobotSide::Left => 1.0,
            RobotSide::Right => -1.0,
        }
    }

    pub fn negate_if_right(self, value: f64) -> f64 {
        self.sign() * value
    }
}

impl fmt::Display for RobotSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RobotSide::Left => write!(f, "LEFT"),
            RobotSide::Right => write!(f, "RIGHT"),
        }
    }
}

/// One value per foot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SidePair<T> {
    pub left: T,
    pub right: T,
}

impl<T> SidePair<T> {
    pub fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    pub fn get(&self, side: RobotSide) -> &T {
        match side {
            RobotSide::Left => &self.left,
            RobotSide::Right => &self.right,
        }
    }

    pub fn get_mut(&mut self, side: RobotSide) -> &mut T {
        match side {
            RobotSide::Left => &mut self.left,
            RobotSide::Right => &mut self.right,
        }
    }
}

/// Build a world pose from a position and a yaw about world z
pub fn pose_from_xyz_yaw(x: f64, y: f64, z: f64, yaw: f64) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(x, y, z),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), yaw),
    )
}

/// Heading of a pose: angle of its x-axis projected onto the world XY plane
pub fn yaw_of(pose: &Isometry3<f64>) -> f64 {
    let x_axis = pose.rotation * Vector3::x();
    x_axis.y.atan2(x_axis.x)
}

/// Same translation, rotation reduced to yaw only (z-up frame preserving x heading)
pub fn z_up_frame(pose: &Isometry3<f64>) -> Isometry3<f64> {
    let t = pose.translation.vector;
    pose_from_xyz_yaw(t.x, t.y, t.z, yaw_of(pose))
}

pub fn xy_of(pose: &Isometry3<f64>) -> Vector2<f64> {
    Vector2::new(pose.translation.vector.x, pose.translation.vector.y)
}

/// Normalize an angle to [-pi, pi]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a < -PI {
        a += 2.0 * PI;
    }
    a
}

/// Signed difference `a - b` wrapped to [-pi, pi]
pub fn angle_difference(a: f64, b: f64) -> f64 {
    normalize_angle(a - b)
}

/// Rotate a planar vector by `yaw`
pub fn rotate_xy(v: Vector2<f64>, yaw: f64) -> Vector2<f64> {
    let (s, c) = yaw.sin_cos();
    Vector2::new(c * v.x - s * v.y, s * v.x + c * v.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_robot_side_opposite() {
        assert_eq!(RobotSide::Left.opposite(), RobotSide::Right);
        assert_eq!(RobotSide::Right.opposite(), RobotSide::Left);
        assert_eq!(RobotSide::Right.negate_if_right(0.2), -0.2);
    }

    #[test]
    fn test_normalize_angle() {
        assert_relative_eq!(normalize_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(-3.0 * PI / 2.0), PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(angle_difference(0.1, -0.1), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_yaw_survives_tilt() {
        let yawed = pose_from_xyz_yaw(1.0, 2.0, 0.5, 0.7);
        let tilt = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.2);
        let tilted = Isometry3::from_parts(yawed.translation, tilt * yawed.rotation);
        assert_relative_eq!(yaw_of(&yawed), 0.7, epsilon = 1e-12);
        let flat = z_up_frame(&tilted);
        assert_relative_eq!((flat.rotation * Vector3::z()).z, 1.0, epsilon = 1e-12);
        assert_relative_eq!(flat.translation.vector.z, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_xy() {
        let v = rotate_xy(Vector2::new(1.0, 0.0), PI / 2.0);
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(v.y, 1.0, epsilon = 1e-12);
    }
}
