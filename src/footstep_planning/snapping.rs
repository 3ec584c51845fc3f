//! Foothold snapping onto planar regions

use nalgebra::{
    Isometry2, Isometry3, Matrix3, Point2, Rotation3, Translation3, UnitQuaternion, Vector2, Vector3,
};

use crate::common::{FootholdSnapper, FootstepPlanningResult};
use crate::footstep_planning::FootstepPlannerParameters;
use crate::geometry::{PlanarRegionsList, Polygon2D};

/// Overlaps smaller than this are treated as touching edges, not support
pub(crate) const MINIMUM_OVERLAP_AREA: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FootholdSnap {
    pub region_id: usize,
    /// Height of the region plane at the sole position
    pub z: f64,
    /// Unit normal of the supporting region
    pub normal: Vector3<f64>,
    /// Fraction of the footprint area over the region
    pub support_fraction: f64,
}

impl FootholdSnap {
    /// Sole pose on the region: z-axis along the region normal, x-axis in the
    /// vertical plane of `yaw` so the heading is unchanged
    pub fn sole_transform(&self, sole_xy: &Point2<f64>, yaw: f64) -> Isometry3<f64> {
        let n = self.normal;
        let (sin, cos) = yaw.sin_cos();
        let x_axis = Vector3::new(cos, sin, -(cos * n.x + sin * n.y) / n.z).normalize();
        let y_axis = n.cross(&x_axis);
        let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x_axis, y_axis, n]));
        Isometry3::from_parts(
            Translation3::new(sole_xy.x, sole_xy.y, self.z),
            UnitQuaternion::from_rotation_matrix(&rotation),
        )
    }
}

/// Snaps onto the highest region whose XY outline overlaps the footprint
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanarRegionSnapper;

impl FootholdSnapper for PlanarRegionSnapper {
    fn snap(
        &self,
        regions: &PlanarRegionsList,
        footprint_xy: &Polygon2D,
        sole_xy: &Point2<f64>,
    ) -> Option<FootholdSnap> {
        let footprint_area = footprint_xy.area();
        let (min, max) = footprint_xy.bounding_box();
        let mut best: Option<FootholdSnap> = None;
        for region in regions.regions_near_xy(min, max) {
            let z = match region.plane_z_at(sole_xy.x, sole_xy.y) {
                Some(z) => z,
                None => continue,
            };
            if best.as_ref().map_or(false, |b| z <= b.z) {
                continue;
            }
            let overlap = region.overlap_area_xy(footprint_xy);
            if overlap < MINIMUM_OVERLAP_AREA {
                continue;
            }
            let mut normal = region.normal();
            if normal.z < 0.0 {
                normal = -normal;
            }
            best = Some(FootholdSnap {
                region_id: region.id(),
                z,
                normal,
                support_fraction: (overlap / footprint_area).min(1.0),
            });
        }
        best
    }
}

/// Sole outline centered on the sole frame origin
pub fn foot_polygon(parameters: &FootstepPlannerParameters) -> FootstepPlanningResult<Polygon2D> {
    Polygon2D::rectangle(Point2::origin(), parameters.foot_length, parameters.foot_width)
}

/// Foot outline placed at a sole position and yaw in world XY
pub fn footprint_at(foot: &Polygon2D, sole_xy: &Point2<f64>, yaw: f64) -> Polygon2D {
    foot.transformed(&Isometry2::new(Vector2::new(sole_xy.x, sole_xy.y), yaw))
}
