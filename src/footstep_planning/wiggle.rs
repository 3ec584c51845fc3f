//! Wiggling snapped footholds inside their supporting region
//!
//! A footprint hanging over the edge of its region is nudged by a bounded
//! translation and yaw so that its corners sit `wiggle_inside_delta` inside
//! the region outline (or its convex hull). The wiggled placement is then
//! checked against neighbouring regions poking up through the sole, which
//! happens at the bottom of V-shaped terrain.

use log::trace;
use nalgebra::{Point2, Rotation2, Vector2};

use crate::footstep_planning::snapping::{footprint_at, FootholdSnap, MINIMUM_OVERLAP_AREA};
use crate::footstep_planning::{FootstepPlannerParameters, StepRejectionReason};
use crate::geometry::{PlanarRegion, PlanarRegionsList, Polygon2D};

const MAX_ITERATIONS: usize = 20;
const TOLERANCE: f64 = 1e-9;

/// Placement after the wiggle, with the support re-evaluated on the same region
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WiggledFoothold {
    pub snap: FootholdSnap,
    pub sole_xy: Point2<f64>,
    pub yaw: f64,
}

/// Area the footprint corners are wiggled into
struct WiggleTarget {
    outline: Polygon2D,
    holes: Vec<Polygon2D>,
}

impl WiggleTarget {
    fn new(region: &PlanarRegion, into_convex_hull: bool) -> Option<Self> {
        let outline = region.outline_xy()?;
        Some(if into_convex_hull {
            Self {
                outline: outline.convex_hull(),
                holes: Vec::new(),
            }
        } else {
            Self {
                outline: outline.clone(),
                holes: region.holes_xy().to_vec(),
            }
        })
    }

    /// Move that brings `p` to `delta` inside the target, `None` when it already is
    fn correction(&self, p: &Point2<f64>, delta: f64) -> Option<Vector2<f64>> {
        let outer = self.outline.project_onto_boundary(p);
        let mut worst = if self.outline.contains(p) {
            (outer.distance, -outer.edge_normal)
        } else {
            (-outer.distance, toward(p, &outer.point, -outer.edge_normal))
        };
        for hole in &self.holes {
            let edge = hole.project_onto_boundary(p);
            let candidate = if hole.contains(p) {
                (-edge.distance, toward(p, &edge.point, edge.edge_normal))
            } else {
                (edge.distance, edge.edge_normal)
            };
            if candidate.0 < worst.0 {
                worst = candidate;
            }
        }
        let (depth, inward) = worst;
        (depth < delta - TOLERANCE).then(|| inward * (delta - depth))
    }
}

fn toward(from: &Point2<f64>, to: &Point2<f64>, fallback: Vector2<f64>) -> Vector2<f64> {
    let d = to - from;
    let norm = d.norm();
    if norm > TOLERANCE {
        d / norm
    } else {
        fallback
    }
}

/// Snap-and-wiggle: shift the snapped footprint inside its region, check for
/// penetration of neighbouring regions, and re-evaluate the support.
///
/// Returns the unchanged snap when the region is unknown to `regions` or
/// when no placement fits and `reject_if_cannot_fully_wiggle_inside` is off.
pub fn wiggle_foothold(
    parameters: &FootstepPlannerParameters,
    regions: &PlanarRegionsList,
    foot: &Polygon2D,
    snap: &FootholdSnap,
    sole_xy: &Point2<f64>,
    yaw: f64,
) -> Result<WiggledFoothold, StepRejectionReason> {
    let unchanged = WiggledFoothold {
        snap: *snap,
        sole_xy: *sole_xy,
        yaw,
    };
    let region = match regions.get(snap.region_id) {
        Some(region) => region,
        None => return Ok(unchanged),
    };

    let (offset, dyaw) = match wiggle_into_region(parameters, region, foot, sole_xy, yaw) {
        Some(wiggle) => wiggle,
        None if parameters.reject_if_cannot_fully_wiggle_inside => {
            return Err(StepRejectionReason::CouldNotWiggleInside)
        }
        None => return Ok(unchanged),
    };
    if offset.norm() < TOLERANCE && dyaw == 0.0 {
        return Ok(unchanged);
    }

    let wiggled_xy = sole_xy + offset;
    let wiggled_yaw = yaw + dyaw;
    let footprint = footprint_at(foot, &wiggled_xy, wiggled_yaw);
    check_penetration(parameters, regions, region, &footprint)?;

    let z = region.plane_z_at(wiggled_xy.x, wiggled_xy.y).unwrap_or(snap.z);
    let support_fraction = (region.overlap_area_xy(&footprint) / footprint.area()).min(1.0);
    trace!(
        "[FootstepPlanner] wiggled ({:.3}, {:.3}) by ({:.3}, {:.3}) yaw {:.3} on region {}",
        sole_xy.x,
        sole_xy.y,
        offset.x,
        offset.y,
        dyaw,
        region.id()
    );
    Ok(WiggledFoothold {
        snap: FootholdSnap {
            z,
            support_fraction,
            ..*snap
        },
        sole_xy: wiggled_xy,
        yaw: wiggled_yaw,
    })
}

/// Smallest bounded move putting every footprint corner `wiggle_inside_delta`
/// inside the region, as (translation, yaw change).
///
/// Each yaw in {0, ±max/2, ±max} gets an iterative corner-by-corner
/// translation; the cheapest converged one wins and its translation is
/// clipped to `maximum_xy_wiggle_distance`. `None` when no yaw converges.
pub fn wiggle_into_region(
    parameters: &FootstepPlannerParameters,
    region: &PlanarRegion,
    foot: &Polygon2D,
    sole_xy: &Point2<f64>,
    yaw: f64,
) -> Option<(Vector2<f64>, f64)> {
    let target = WiggleTarget::new(region, parameters.wiggle_into_convex_hull_of_planar_regions)?;
    let delta = parameters.wiggle_inside_delta;
    let max_yaw = parameters.maximum_yaw_wiggle;
    let yaw_offsets = if max_yaw > 0.0 {
        vec![0.0, 0.5 * max_yaw, -0.5 * max_yaw, max_yaw, -max_yaw]
    } else {
        vec![0.0]
    };
    // Yaw is charged as the distance the toe travels
    let lever = 0.5 * parameters.foot_length;

    let mut best: Option<(f64, Vector2<f64>, f64)> = None;
    for dyaw in yaw_offsets {
        let corners: Vec<Vector2<f64>> = foot
            .vertices()
            .iter()
            .map(|v| Rotation2::new(yaw + dyaw) * v.coords)
            .collect();
        let offset = match translate_inside(&target, sole_xy, &corners, delta) {
            Some(offset) => offset,
            None => continue,
        };
        let cost = offset.norm() + lever * dyaw.abs();
        if cost < TOLERANCE {
            return Some((offset, dyaw));
        }
        if best.map_or(true, |(best_cost, _, _)| cost < best_cost) {
            best = Some((cost, offset, dyaw));
        }
    }

    best.map(|(_, offset, dyaw)| {
        let limit = parameters.maximum_xy_wiggle_distance;
        let length = offset.norm();
        if length > limit {
            (offset * (limit / length), dyaw)
        } else {
            (offset, dyaw)
        }
    })
}

/// Repeatedly push the footprint by its worst corner's correction
fn translate_inside(
    target: &WiggleTarget,
    sole_xy: &Point2<f64>,
    corners: &[Vector2<f64>],
    delta: f64,
) -> Option<Vector2<f64>> {
    let mut offset = Vector2::zeros();
    for _ in 0..MAX_ITERATIONS {
        let worst = corners
            .iter()
            .filter_map(|c| target.correction(&(sole_xy + offset + c), delta))
            .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()));
        match worst {
            Some(correction) => offset += correction,
            None => return Some(offset),
        }
    }
    None
}

/// Reject footprints that dip below a neighbouring region by more than
/// `maximum_z_penetration_on_v_regions`, sampled at the corners of the
/// overlap with each neighbour.
pub fn check_penetration(
    parameters: &FootstepPlannerParameters,
    regions: &PlanarRegionsList,
    support: &PlanarRegion,
    footprint: &Polygon2D,
) -> Result<(), StepRejectionReason> {
    let (min, max) = footprint.bounding_box();
    for region in regions.regions_near_xy(min, max) {
        if region.id() == support.id() || region.overlap_area_xy(footprint) < MINIMUM_OVERLAP_AREA {
            continue;
        }
        let outline = match region.outline_xy() {
            Some(outline) => outline,
            None => continue,
        };
        for p in outline.clip_with_convex(footprint) {
            if let (Some(z), Some(support_z)) = (region.plane_z_at(p.x, p.y), support.plane_z_at(p.x, p.y)) {
                if z - support_z > parameters.maximum_z_penetration_on_v_regions {
                    return Err(StepRejectionReason::TooMuchPenetrationAfterWiggle);
                }
            }
        }
    }
    Ok(())
}
