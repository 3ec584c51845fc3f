//! Planar regions: locally flat stepping surfaces
//!
//! A region is a polygon (with optional holes) expressed in its own plane
//! frame, plus the rigid transform placing that plane in the world. The
//! vertical projection of the polygon onto world XY is cached at
//! construction because every foothold query works in world XY.

use nalgebra::{Isometry3, Point2, Point3, Vector3};

use super::polygon::{bounding_boxes_overlap, project_onto_segment, BoundaryProjection, Polygon2D};
use crate::common::{FootstepPlanningError, FootstepPlanningResult};

/// Regions whose normal is flatter than this cannot be projected onto XY
const MINIMUM_PROJECTABLE_NORMAL_Z: f64 = 1e-3;

#[derive(Debug, Clone)]
pub struct PlanarRegion {
    id: usize,
    transform_to_world: Isometry3<f64>,
    polygon: Polygon2D,
    holes: Vec<Polygon2D>,
    normal: Vector3<f64>,
    projected: Option<ProjectedOutline>,
}

#[derive(Debug, Clone)]
struct ProjectedOutline {
    outer: Polygon2D,
    holes: Vec<Polygon2D>,
    bounds: (Point2<f64>, Point2<f64>),
}

impl PlanarRegion {
    pub fn new(
        id: usize,
        transform_to_world: Isometry3<f64>,
        polygon: Polygon2D,
        holes: Vec<Polygon2D>,
    ) -> FootstepPlanningResult<Self> {
        let t = transform_to_world.translation.vector;
        if !(t.x.is_finite() && t.y.is_finite() && t.z.is_finite()) {
            return Err(FootstepPlanningError::InvalidRegion(format!(
                "region {} has a non-finite transform",
                id
            )));
        }
        let normal = transform_to_world.rotation * Vector3::z();
        let projected = if normal.z.abs() > MINIMUM_PROJECTABLE_NORMAL_Z {
            let outer = project_to_world_xy(&transform_to_world, &polygon)?;
            let holes = holes
                .iter()
                .map(|h| project_to_world_xy(&transform_to_world, h))
                .collect::<FootstepPlanningResult<Vec<_>>>()?;
            let bounds = outer.bounding_box();
            Some(ProjectedOutline { outer, holes, bounds })
        } else {
            None
        };

        Ok(Self {
            id,
            transform_to_world,
            polygon,
            holes,
            normal,
            projected,
        })
    }

    /// Horizontal region at height `z` whose polygon is given directly in world XY
    pub fn horizontal(id: usize, polygon: Polygon2D, z: f64) -> FootstepPlanningResult<Self> {
        Self::new(id, Isometry3::translation(0.0, 0.0, z), polygon, Vec::new())
    }

    /// Horizontal axis-aligned rectangle spanning [min_x, max_x] x [min_y, max_y]
    pub fn horizontal_rectangle(
        id: usize,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
        z: f64,
    ) -> FootstepPlanningResult<Self> {
        let polygon = Polygon2D::from_xy(&[(min_x, min_y), (max_x, min_y), (max_x, max_y), (min_x, max_y)])?;
        Self::horizontal(id, polygon, z)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn transform_to_world(&self) -> &Isometry3<f64> {
        &self.transform_to_world
    }

    pub fn polygon(&self) -> &Polygon2D {
        &self.polygon
    }

    pub fn holes(&self) -> &[Polygon2D] {
        &self.holes
    }

    /// Unit normal of the plane in world frame
    pub fn normal(&self) -> Vector3<f64> {
        self.normal
    }

    /// Outline projected onto world XY, `None` for (near) vertical regions
    pub fn outline_xy(&self) -> Option<&Polygon2D> {
        self.projected.as_ref().map(|p| &p.outer)
    }

    /// Holes projected onto world XY
    pub fn holes_xy(&self) -> &[Polygon2D] {
        self.projected.as_ref().map_or(&[], |p| p.holes.as_slice())
    }

    pub fn bounding_box_xy(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        self.projected.as_ref().map(|p| p.bounds)
    }

    /// Height of the (infinite) plane above world point (x, y)
    pub fn plane_z_at(&self, x: f64, y: f64) -> Option<f64> {
        if self.normal.z.abs() <= MINIMUM_PROJECTABLE_NORMAL_Z {
            return None;
        }
        let o = self.transform_to_world.translation.vector;
        Some(o.z - (self.normal.x * (x - o.x) + self.normal.y * (y - o.y)) / self.normal.z)
    }

    /// Whether the vertical line through (x, y) hits the region surface
    pub fn contains_xy(&self, p: &Point2<f64>) -> bool {
        match &self.projected {
            Some(projected) => {
                projected.outer.contains(p) && !projected.holes.iter().any(|h| h.contains(p) && h.distance_to_boundary(p) > 1e-9)
            }
            None => false,
        }
    }

    /// Area of a convex world-XY footprint that lies over the region
    pub fn overlap_area_xy(&self, footprint: &Polygon2D) -> f64 {
        let projected = match &self.projected {
            Some(projected) => projected,
            None => return 0.0,
        };
        if !bounding_boxes_overlap(&projected.bounds, &footprint.bounding_box()) {
            return 0.0;
        }
        let outer = projected.outer.intersection_area_with_convex(footprint);
        let holes: f64 = projected
            .holes
            .iter()
            .map(|h| h.intersection_area_with_convex(footprint))
            .sum();
        (outer - holes).max(0.0)
    }

    /// Closest point of the region's XY edges (outer ring and holes) to `p`.
    ///
    /// The returned normal points away from the region material, so for hole
    /// edges it points into the hole.
    pub fn project_onto_edges_xy(&self, p: &Point2<f64>) -> Option<BoundaryProjection> {
        let projected = self.projected.as_ref()?;
        let mut best = projected.outer.project_onto_boundary(p);
        for hole in &projected.holes {
            let mut candidate = hole.project_onto_boundary(p);
            if candidate.distance < best.distance {
                candidate.edge_normal = -candidate.edge_normal;
                best = candidate;
            }
        }
        Some(best)
    }

    /// XY boundary segments of the outer ring and every hole, each paired
    /// with the unit normal pointing away from the region material
    pub fn boundary_edges_xy(&self) -> Vec<BoundaryEdge> {
        let projected = match &self.projected {
            Some(projected) => projected,
            None => return Vec::new(),
        };
        let outer = projected.outer.edges().map(|(start, end)| BoundaryEdge { start, end, outward_sign: 1.0 });
        let holes = projected
            .holes
            .iter()
            .flat_map(|h| h.edges().map(|(start, end)| BoundaryEdge { start, end, outward_sign: -1.0 }));
        outer.chain(holes).collect()
    }

    /// World point on the region surface above (x, y)
    pub fn surface_point(&self, x: f64, y: f64) -> Option<Point3<f64>> {
        self.plane_z_at(x, y).map(|z| Point3::new(x, y, z))
    }
}

/// One XY edge of a region outline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryEdge {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
    /// -1 for hole edges, whose ring normal points into the material
    outward_sign: f64,
}

impl BoundaryEdge {
    /// Closest point of the edge to `p`; the normal points away from the region material
    pub fn project(&self, p: &Point2<f64>) -> BoundaryProjection {
        let mut projection = project_onto_segment(p, &self.start, &self.end);
        projection.edge_normal *= self.outward_sign;
        projection
    }
}

fn project_to_world_xy(transform: &Isometry3<f64>, polygon: &Polygon2D) -> FootstepPlanningResult<Polygon2D> {
    let vertices = polygon
        .vertices()
        .iter()
        .map(|v| {
            let world = transform * Point3::new(v.x, v.y, 0.0);
            Point2::new(world.x, world.y)
        })
        .collect();
    Polygon2D::new(vertices)
}

/// Ordered, immutable collection of planar regions
///
/// Shared between threads as `Arc<PlanarRegionsList>`; replacing the world
/// model means swapping the `Arc`, never mutating a published list.
#[derive(Debug, Clone, Default)]
pub struct PlanarRegionsList {
    regions: Vec<PlanarRegion>,
}

impl PlanarRegionsList {
    pub fn new(regions: Vec<PlanarRegion>) -> Self {
        Self { regions }
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn regions(&self) -> &[PlanarRegion] {
        &self.regions
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlanarRegion> {
        self.regions.iter()
    }

    pub fn get(&self, id: usize) -> Option<&PlanarRegion> {
        self.regions.iter().find(|r| r.id() == id)
    }

    /// Regions whose XY bounds intersect the given box
    pub fn regions_near_xy(
        &self,
        min: Point2<f64>,
        max: Point2<f64>,
    ) -> impl Iterator<Item = &PlanarRegion> {
        self.regions.iter().filter(move |r| {
            r.bounding_box_xy()
                .map_or(false, |bounds| bounding_boxes_overlap(&bounds, &(min, max)))
        })
    }
}

impl FromIterator<PlanarRegion> for PlanarRegionsList {
    fn from_iter<I: IntoIterator<Item = PlanarRegion>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    #[test]
    fn test_horizontal_region_queries() {
        let region = PlanarRegion::horizontal_rectangle(3, 0.0, 0.0, 2.0, 1.0, 0.4).unwrap();
        assert_eq!(region.id(), 3);
        assert_relative_eq!(region.plane_z_at(5.0, 5.0).unwrap(), 0.4);
        assert!(region.contains_xy(&Point2::new(1.0, 0.5)));
        assert!(!region.contains_xy(&Point2::new(2.5, 0.5)));

        let foot = Polygon2D::rectangle(Point2::new(2.0, 0.5), 0.2, 0.1).unwrap();
        assert_relative_eq!(region.overlap_area_xy(&foot), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_sloped_region_height() {
        // 0.2 rad pitch about y: plane rises toward -x
        let transform = Isometry3::from_parts(
            Translation3::new(1.0, 0.0, 0.5),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.2),
        );
        let polygon = Polygon2D::rectangle(Point2::origin(), 2.0, 2.0).unwrap();
        let region = PlanarRegion::new(0, transform, polygon, Vec::new()).unwrap();
        assert_relative_eq!(region.plane_z_at(1.0, 0.3).unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(region.plane_z_at(2.0, 0.0).unwrap(), 0.5 - 0.2_f64.tan(), epsilon = 1e-12);
        assert!(region.normal().z < 1.0);
    }

    #[test]
    fn test_holes_subtract_support() {
        let outer = Polygon2D::rectangle(Point2::origin(), 2.0, 2.0).unwrap();
        let hole = Polygon2D::rectangle(Point2::origin(), 0.5, 0.5).unwrap();
        let region = PlanarRegion::new(0, Isometry3::identity(), outer, vec![hole]).unwrap();
        assert!(!region.contains_xy(&Point2::new(0.1, 0.1)));
        assert!(region.contains_xy(&Point2::new(0.6, 0.6)));

        let foot = Polygon2D::rectangle(Point2::origin(), 1.0, 1.0).unwrap();
        assert_relative_eq!(region.overlap_area_xy(&foot), 0.75, epsilon = 1e-12);

        let edge = region.project_onto_edges_xy(&Point2::new(0.0, 0.0)).unwrap();
        assert_relative_eq!(edge.distance, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_boundary_edges_include_holes() {
        let outer = Polygon2D::rectangle(Point2::origin(), 2.0, 2.0).unwrap();
        let hole = Polygon2D::rectangle(Point2::origin(), 0.5, 0.5).unwrap();
        let region = PlanarRegion::new(0, Isometry3::identity(), outer, vec![hole]).unwrap();
        let edges = region.boundary_edges_xy();
        assert_eq!(edges.len(), 8);

        // From inside the hole, the closest hole edge faces the query point
        let p = Point2::new(0.1, 0.0);
        let nearest = edges
            .iter()
            .map(|e| e.project(&p))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
            .unwrap();
        assert_relative_eq!(nearest.distance, 0.15, epsilon = 1e-12);
        assert_relative_eq!(nearest.edge_normal.x, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vertical_region_is_not_steppable() {
        let transform = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, 0.5),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2),
        );
        let polygon = Polygon2D::rectangle(Point2::origin(), 1.0, 1.0).unwrap();
        let wall = PlanarRegion::new(0, transform, polygon, Vec::new()).unwrap();
        assert!(wall.outline_xy().is_none());
        assert!(wall.plane_z_at(0.0, 0.0).is_none());
    }

    #[test]
    fn test_regions_list_lookup() {
        let list: PlanarRegionsList = (0..3)
            .map(|i| PlanarRegion::horizontal_rectangle(i, i as f64, 0.0, i as f64 + 1.0, 1.0, 0.0).unwrap())
            .collect();
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(2).map(|r| r.id()), Some(2));
        let near: Vec<usize> = list
            .regions_near_xy(Point2::new(1.2, 0.2), Point2::new(1.4, 0.4))
            .map(|r| r.id())
            .collect();
        assert_eq!(near, vec![1]);
    }
}
