//! Shifting footholds away from the base of nearby raised regions
//!
//! A cliff, seen from a foothold, is the edge of a neighbouring region whose
//! surface is more than `cliff_height_to_shift_away_from` above the foot. The
//! swing trajectory would clip such an edge, so footholds closer than
//! `minimum_distance_from_cliff_bottoms` to it are pushed away horizontally.

use log::trace;
use nalgebra::{Point2, Vector2};

use crate::footstep_planning::{FootstepNode, FootstepPlannerParameters, StepRejectionReason};
use crate::geometry::{BoundaryEdge, BoundaryProjection, PlanarRegion, PlanarRegionsList};

const EPSILON: f64 = 1e-9;
/// Slack on the clearance when checking the final position
const CLEARANCE_TOLERANCE: f64 = 1e-6;
/// |cos| above which a cliff counts as part of a split opposing pair
const SPLIT_AXIS_ALIGNMENT: f64 = 0.5;
/// Sequential projection passes when several cliff edges surround the foot
const MAX_PROJECTION_PASSES: usize = 8;

/// One boundary edge of a raised neighbouring region
#[derive(Debug, Clone, Copy)]
struct CliffEdge<'a> {
    region: &'a PlanarRegion,
    edge: BoundaryEdge,
}

impl CliffEdge<'_> {
    fn project(&self, p: &Point2<f64>) -> BoundaryProjection {
        self.edge.project(p)
    }

    /// Unit horizontal direction from the closest edge point toward safe ground
    fn away_from(&self, p: &Point2<f64>, projection: &BoundaryProjection) -> Vector2<f64> {
        if projection.distance > EPSILON && !self.region.contains_xy(p) {
            (p - projection.point) / projection.distance
        } else {
            projection.edge_normal
        }
    }

    /// Horizontal clearance from `p`, zero when `p` is under the region
    fn clearance_from(&self, p: &Point2<f64>) -> f64 {
        if self.region.contains_xy(p) {
            0.0
        } else {
            self.project(p).distance
        }
    }
}

/// Move `node` so no cliff base lies within the minimum clearance.
///
/// Every edge of every raised neighbour is a separate cliff, so concave
/// outlines and holes are handled edge by edge. Only the sole XY changes; z
/// is re-evaluated on the node's supporting region plane. Two cliffs facing
/// each other closer than twice the clearance cannot both be satisfied: the
/// foot is put midway between them. Otherwise the shifted position must
/// clear every cliff around it, or the step is `TooCloseToCliff`.
pub fn shift_away_from_cliff_bottoms(
    parameters: &FootstepPlannerParameters,
    regions: &PlanarRegionsList,
    node: &mut FootstepNode,
) -> Result<(), StepRejectionReason> {
    let clearance = parameters.minimum_distance_from_cliff_bottoms;
    let cliff_height = parameters.cliff_height_to_shift_away_from;
    if clearance <= 0.0 {
        return Ok(());
    }

    let original = node.sole_xy();
    // Cliffs reachable after one shift are included so the shift cannot land
    // next to a cliff it never looked at.
    let cliffs = find_cliffs(regions, node, original, 2.0 * clearance, cliff_height);
    if cliffs.is_empty() {
        return Ok(());
    }

    let (shifted, split_axis) = match find_conflict(&cliffs, original, clearance) {
        Some((midpoint, axis)) => (midpoint, Some(axis)),
        None => (project_onto_clear_area(original, &cliffs, clearance), None),
    };

    // Cliffs along a split pair's axis are satisfied as well as they can be
    let blocking = find_cliffs(regions, node, shifted, clearance, cliff_height)
        .into_iter()
        .filter(|cliff| {
            split_axis.map_or(true, |axis| {
                let projection = cliff.project(&shifted);
                cliff.away_from(&shifted, &projection).dot(&axis).abs() < SPLIT_AXIS_ALIGNMENT
            })
        })
        .map(|cliff| cliff.clearance_from(&shifted))
        .find(|&distance| distance < clearance - CLEARANCE_TOLERANCE);
    if let Some(distance) = blocking {
        trace!(
            "[CliffAvoider] {} foot at ({:.3}, {:.3}) cannot clear cliffs, {:.3} left",
            node.side(),
            original.x,
            original.y,
            distance
        );
        return Err(StepRejectionReason::TooCloseToCliff);
    }

    if (shifted - original).norm() < EPSILON {
        return Ok(());
    }

    trace!(
        "[CliffAvoider] {} foot shifted ({:.3}, {:.3}) -> ({:.3}, {:.3}), {} cliff edge(s)",
        node.side(),
        original.x,
        original.y,
        shifted.x,
        shifted.y,
        cliffs.len()
    );

    let mut sole = *node.sole_transform();
    sole.translation.vector.x = shifted.x;
    sole.translation.vector.y = shifted.y;
    if let Some(z) = node
        .supporting_region_id()
        .and_then(|id| regions.get(id))
        .and_then(|region| region.plane_z_at(shifted.x, shifted.y))
    {
        sole.translation.vector.z = z;
    }
    node.set_sole_transform(sole);
    Ok(())
}

/// Edges of raised regions within `radius` of `sole`, closest first
fn find_cliffs<'a>(
    regions: &'a PlanarRegionsList,
    node: &FootstepNode,
    sole: Point2<f64>,
    radius: f64,
    cliff_height: f64,
) -> Vec<CliffEdge<'a>> {
    let min = Point2::new(sole.x - radius, sole.y - radius);
    let max = Point2::new(sole.x + radius, sole.y + radius);
    let foot_z = node.sole_z();

    let mut cliffs = Vec::new();
    for region in regions.regions_near_xy(min, max) {
        if Some(region.id()) == node.supporting_region_id() {
            continue;
        }
        for edge in region.boundary_edges_xy() {
            let projection = edge.project(&sole);
            if projection.distance > radius {
                continue;
            }
            let raised = region
                .plane_z_at(projection.point.x, projection.point.y)
                .map_or(false, |z| z - foot_z > cliff_height);
            if raised {
                cliffs.push((projection.distance, CliffEdge { region, edge }));
            }
        }
    }
    cliffs.sort_by(|a, b| a.0.total_cmp(&b.0));
    cliffs.into_iter().map(|(_, cliff)| cliff).collect()
}

/// Midpoint between the first pair of opposing cliffs too close together to
/// clear both, measured along the first cliff's away direction, and that
/// direction
fn find_conflict(
    cliffs: &[CliffEdge],
    sole: Point2<f64>,
    clearance: f64,
) -> Option<(Point2<f64>, Vector2<f64>)> {
    let faces: Vec<(BoundaryProjection, Vector2<f64>)> = cliffs
        .iter()
        .map(|cliff| {
            let projection = cliff.project(&sole);
            (projection, cliff.away_from(&sole, &projection))
        })
        .collect();
    for (i, (a, a_away)) in faces.iter().enumerate() {
        if a.distance >= clearance {
            continue;
        }
        for (b, b_away) in &faces[i + 1..] {
            if a_away.dot(b_away) >= 0.0 {
                continue;
            }
            let gap = (b.point - a.point).dot(a_away);
            if gap < 2.0 * clearance {
                let midpoint = Point2::from((a.point.coords + b.point.coords) * 0.5);
                return Some((sole + a_away * (midpoint - sole).dot(a_away), *a_away));
            }
        }
    }
    None
}

/// Push the foot out to the clearance circle of each violated edge in turn
fn project_onto_clear_area(start: Point2<f64>, cliffs: &[CliffEdge], clearance: f64) -> Point2<f64> {
    let mut p = start;
    for _ in 0..MAX_PROJECTION_PASSES {
        let mut moved = false;
        for cliff in cliffs {
            let projection = cliff.project(&p);
            if projection.distance >= clearance - EPSILON && !cliff.region.contains_xy(&p) {
                continue;
            }
            let away = cliff.away_from(&p, &projection);
            if away.norm() < EPSILON {
                continue;
            }
            p = projection.point + away * clearance;
            moved = true;
        }
        if !moved {
            break;
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{pose_from_xyz_yaw, RobotSide};
    use crate::geometry::{PlanarRegion, Polygon2D};
    use approx::assert_relative_eq;

    fn parameters() -> FootstepPlannerParameters {
        FootstepPlannerParameters::default()
    }

    /// Ground at z = 0 with a 1 x 1 x 0.2 box spanning x in [1, 2], y in [-0.5, 0.5]
    fn box_on_ground() -> PlanarRegionsList {
        PlanarRegionsList::new(vec![
            PlanarRegion::horizontal_rectangle(0, -1.0, -1.5, 4.0, 1.5, 0.0).unwrap(),
            PlanarRegion::horizontal_rectangle(1, 1.0, -0.5, 2.0, 0.5, 0.2).unwrap(),
        ])
    }

    fn ground_node(x: f64, y: f64) -> FootstepNode {
        let mut node = FootstepNode::new(RobotSide::Left, pose_from_xyz_yaw(x, y, 0.0, 0.0));
        node.set_support(Some(0), 1.0);
        node
    }

    #[test]
    fn test_clearance_sweep_toward_box() {
        let parameters = parameters();
        let regions = box_on_ground();
        let clearance = parameters.minimum_distance_from_cliff_bottoms;
        let boundary = 1.0 - clearance;
        for i in 0..=40 {
            let x = 0.5 + 0.5 * i as f64 / 40.0 - 1e-3;
            let mut node = ground_node(x, 0.0);
            shift_away_from_cliff_bottoms(&parameters, &regions, &mut node).unwrap();
            let adjusted = node.sole_xy();
            if 1.0 - x < clearance {
                assert_relative_eq!(adjusted.x, boundary, epsilon = 1e-9);
            } else {
                assert_relative_eq!(adjusted.x, x, epsilon = 1e-12);
            }
            assert_relative_eq!(adjusted.y, 0.0, epsilon = 1e-12);
            assert!(1.0 - adjusted.x >= clearance - 1e-9);
            assert_relative_eq!(node.sole_z(), 0.0);
        }
    }

    #[test]
    fn test_shift_along_side_of_box() {
        let parameters = parameters();
        let mut node = ground_node(1.5, 0.55);
        shift_away_from_cliff_bottoms(&parameters, &box_on_ground(), &mut node).unwrap();
        assert_relative_eq!(node.sole_xy().x, 1.5, epsilon = 1e-12);
        assert_relative_eq!(node.sole_xy().y, 0.5 + parameters.minimum_distance_from_cliff_bottoms, epsilon = 1e-9);
    }

    #[test]
    fn test_foot_on_top_of_box_is_not_shifted() {
        let mut node = FootstepNode::new(RobotSide::Right, pose_from_xyz_yaw(1.05, 0.0, 0.2, 0.0));
        node.set_support(Some(1), 1.0);
        shift_away_from_cliff_bottoms(&parameters(), &box_on_ground(), &mut node).unwrap();
        assert_relative_eq!(node.sole_xy().x, 1.05);
    }

    #[test]
    fn test_low_step_is_not_a_cliff() {
        let regions = PlanarRegionsList::new(vec![
            PlanarRegion::horizontal_rectangle(0, -1.0, -1.0, 1.0, 1.0, 0.0).unwrap(),
            PlanarRegion::horizontal_rectangle(1, 1.0, -1.0, 2.0, 1.0, 0.03).unwrap(),
        ]);
        let mut node = ground_node(0.95, 0.0);
        shift_away_from_cliff_bottoms(&parameters(), &regions, &mut node).unwrap();
        assert_relative_eq!(node.sole_xy().x, 0.95);
    }

    #[test]
    fn test_opposing_cliffs_clamp_to_midpoint() {
        // Two boxes 0.2 apart: closer than twice the clearance
        let regions = PlanarRegionsList::new(vec![
            PlanarRegion::horizontal_rectangle(0, -1.0, -1.0, 4.0, 1.0, 0.0).unwrap(),
            PlanarRegion::horizontal_rectangle(1, 1.0, -0.5, 2.0, 0.5, 0.2).unwrap(),
            PlanarRegion::horizontal_rectangle(2, 2.2, -0.5, 3.2, 0.5, 0.2).unwrap(),
        ]);
        let mut node = ground_node(2.05, 0.0);
        shift_away_from_cliff_bottoms(&parameters(), &regions, &mut node).unwrap();
        assert_relative_eq!(node.sole_xy().x, 2.1, epsilon = 1e-9);
        assert_relative_eq!(node.sole_xy().y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_corner_pushes_diagonally() {
        let parameters = parameters();
        let mut node = ground_node(0.95, 0.55);
        shift_away_from_cliff_bottoms(&parameters, &box_on_ground(), &mut node).unwrap();
        let corner = Point2::new(1.0, 0.5);
        assert_relative_eq!(
            (node.sole_xy() - corner).norm(),
            parameters.minimum_distance_from_cliff_bottoms,
            epsilon = 1e-9
        );
        assert!(node.sole_xy().x < 0.95 && node.sole_xy().y > 0.55);
    }

    /// Raised L at z 0.2 wrapping a ground notch whose inner corner is (1, 0.5)
    fn l_around_notch() -> PlanarRegionsList {
        let l = Polygon2D::from_xy(&[(1.0, -0.5), (2.0, -0.5), (2.0, 1.5), (0.0, 1.5), (0.0, 0.5), (1.0, 0.5)]).unwrap();
        PlanarRegionsList::new(vec![
            PlanarRegion::horizontal_rectangle(0, -1.0, -1.0, 3.0, 2.0, 0.0).unwrap(),
            PlanarRegion::horizontal(1, l, 0.2).unwrap(),
        ])
    }

    #[test]
    fn test_concave_corner_clears_both_edges() {
        let parameters = parameters();
        let regions = l_around_notch();
        let mut node = ground_node(0.95, 0.4);
        assert_eq!(shift_away_from_cliff_bottoms(&parameters, &regions, &mut node), Ok(()));

        let l = regions.get(1).unwrap();
        let sole = node.sole_xy();
        assert!(!l.contains_xy(&sole));
        let distance = l.project_onto_edges_xy(&sole).unwrap().distance;
        assert!(distance >= parameters.minimum_distance_from_cliff_bottoms - 1e-9, "{} from the L", distance);
        assert_relative_eq!(sole.x, 0.85, epsilon = 1e-9);
        assert_relative_eq!(sole.y, 0.35, epsilon = 1e-9);
    }

    #[test]
    fn test_grid_around_box_keeps_clearance() {
        let parameters = parameters();
        let clearance = parameters.minimum_distance_from_cliff_bottoms;
        let regions = box_on_ground();
        let raised = regions.get(1).unwrap();
        for i in 0..=36 {
            for j in 0..=36 {
                let start = Point2::new(0.6 + 0.05 * i as f64, -0.9 + 0.05 * j as f64);
                if raised.contains_xy(&start) {
                    continue;
                }
                let mut node = ground_node(start.x, start.y);
                assert_eq!(shift_away_from_cliff_bottoms(&parameters, &regions, &mut node), Ok(()));
                let sole = node.sole_xy();
                let distance = raised.project_onto_edges_xy(&sole).unwrap().distance;
                assert!(
                    !raised.contains_xy(&sole) && distance >= clearance - 1e-9,
                    "({:.2}, {:.2}) -> ({:.4}, {:.4}) is {:.4} from the box",
                    start.x,
                    start.y,
                    sole.x,
                    sole.y,
                    distance
                );
                if raised.project_onto_edges_xy(&start).unwrap().distance >= clearance {
                    assert_relative_eq!((sole - start).norm(), 0.0, epsilon = 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_closed_end_of_narrow_slot_is_rejected() {
        // Ground slot 0.25 wide cut 0.75 deep into a raised block. The side
        // walls are split at the midpoint, the end wall is still too close.
        let slotted = Polygon2D::from_xy(&[
            (0.0, -0.5),
            (1.0, -0.5),
            (1.0, 0.5),
            (0.0, 0.5),
            (0.0, 0.125),
            (0.75, 0.125),
            (0.75, -0.125),
            (0.0, -0.125),
        ])
        .unwrap();
        let regions = PlanarRegionsList::new(vec![
            PlanarRegion::horizontal_rectangle(0, -1.0, -1.0, 2.0, 1.0, 0.0).unwrap(),
            PlanarRegion::horizontal(1, slotted, 0.3).unwrap(),
        ]);
        let parameters = parameters();

        let mut at_end = ground_node(0.7, 0.02);
        assert_eq!(
            shift_away_from_cliff_bottoms(&parameters, &regions, &mut at_end),
            Err(StepRejectionReason::TooCloseToCliff)
        );

        let mut at_mouth = ground_node(0.2, 0.02);
        assert_eq!(shift_away_from_cliff_bottoms(&parameters, &regions, &mut at_mouth), Ok(()));
        assert_relative_eq!(at_mouth.sole_xy().y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(at_mouth.sole_xy().x, 0.2, epsilon = 1e-9);
    }
}
