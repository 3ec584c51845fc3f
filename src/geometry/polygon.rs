//! Planar polygon utilities
//!
//! Vertex rings are stored counter-clockwise. Containment and area work for
//! concave rings; clipping requires the clip polygon to be convex (foot soles are).

use nalgebra::{Isometry2, Point2, Vector2};

use crate::common::{FootstepPlanningError, FootstepPlanningResult};

const EPSILON: f64 = 1e-12;

/// Closest point on a polygon boundary to a query point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryProjection {
    pub point: Point2<f64>,
    pub distance: f64,
    /// Outward unit normal of the edge the closest point lies on
    pub edge_normal: Vector2<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Polygon2D {
    vertices: Vec<Point2<f64>>,
}

impl Polygon2D {
    /// Create a polygon from an ordered vertex ring (either winding)
    pub fn new(mut vertices: Vec<Point2<f64>>) -> FootstepPlanningResult<Self> {
        if vertices.len() >= 2 && vertices.first() == vertices.last() {
            vertices.pop();
        }
        if vertices.len() < 3 {
            return Err(FootstepPlanningError::InvalidRegion(format!(
                "polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        if vertices.iter().any(|v| !v.x.is_finite() || !v.y.is_finite()) {
            return Err(FootstepPlanningError::InvalidRegion(
                "polygon has non-finite vertices".to_string(),
            ));
        }
        let area = signed_area(&vertices);
        if area.abs() < EPSILON {
            return Err(FootstepPlanningError::InvalidRegion(
                "polygon has zero area".to_string(),
            ));
        }
        if area < 0.0 {
            vertices.reverse();
        }
        Ok(Self { vertices })
    }

    /// Axis-aligned rectangle centered on `center`
    pub fn rectangle(center: Point2<f64>, length: f64, width: f64) -> FootstepPlanningResult<Self> {
        let hl = 0.5 * length;
        let hw = 0.5 * width;
        Self::new(vec![
            Point2::new(center.x - hl, center.y - hw),
            Point2::new(center.x + hl, center.y - hw),
            Point2::new(center.x + hl, center.y + hw),
            Point2::new(center.x - hl, center.y + hw),
        ])
    }

    pub fn from_xy(xy: &[(f64, f64)]) -> FootstepPlanningResult<Self> {
        Self::new(xy.iter().map(|&(x, y)| Point2::new(x, y)).collect())
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn area(&self) -> f64 {
        signed_area(&self.vertices).abs()
    }

    /// Boundary segments `(start, end)` in counter-clockwise order
    pub fn edges(&self) -> impl Iterator<Item = (Point2<f64>, Point2<f64>)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Even-odd containment test; points exactly on the boundary count as inside
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        if self.distance_to_boundary(p) < 1e-9 {
            return true;
        }
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) / (b.y - a.y) * (b.x - a.x);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Closest boundary point, distance and outward edge normal
    pub fn project_onto_boundary(&self, p: &Point2<f64>) -> BoundaryProjection {
        let mut best = BoundaryProjection {
            point: self.vertices[0],
            distance: f64::INFINITY,
            edge_normal: Vector2::zeros(),
        };
        for (a, b) in self.edges() {
            let candidate = project_onto_segment(p, &a, &b);
            if candidate.distance < best.distance {
                best = candidate;
            }
        }
        best
    }

    pub fn distance_to_boundary(&self, p: &Point2<f64>) -> f64 {
        self.project_onto_boundary(p).distance
    }

    /// Axis-aligned bounds as (min, max)
    pub fn bounding_box(&self) -> (Point2<f64>, Point2<f64>) {
        let mut min = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for v in &self.vertices {
            min.x = min.x.min(v.x);
            min.y = min.y.min(v.y);
            max.x = max.x.max(v.x);
            max.y = max.y.max(v.y);
        }
        (min, max)
    }

    pub fn transformed(&self, transform: &Isometry2<f64>) -> Self {
        Self {
            vertices: self.vertices.iter().map(|v| transform * v).collect(),
        }
    }

    /// Counter-clockwise convex hull (monotone chain), collinear points dropped
    pub fn convex_hull(&self) -> Self {
        let mut points = self.vertices.clone();
        points.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        let mut hull: Vec<Point2<f64>> = Vec::with_capacity(points.len() + 1);
        for pass in 0..2 {
            let start = hull.len();
            for &p in &points {
                while hull.len() >= start + 2 {
                    let (a, b) = (hull[hull.len() - 2], hull[hull.len() - 1]);
                    if cross(&(b - a), &(p - a)) > EPSILON {
                        break;
                    }
                    hull.pop();
                }
                hull.push(p);
            }
            hull.pop();
            if pass == 0 {
                points.reverse();
            }
        }
        Self { vertices: hull }
    }

    /// Sutherland-Hodgman clip of `self` (any simple ring) against a convex polygon.
    ///
    /// For a concave subject the output can contain zero-width bridges along the
    /// clip boundary; its shoelace area is still the true intersection area.
    pub fn clip_with_convex(&self, convex: &Polygon2D) -> Vec<Point2<f64>> {
        let mut output = self.vertices.clone();
        for (a, b) in convex.edges() {
            if output.is_empty() {
                break;
            }
            let input = std::mem::take(&mut output);
            let inside = |p: &Point2<f64>| cross(&(b - a), &(p - a)) >= -EPSILON;
            let n = input.len();
            for i in 0..n {
                let current = input[i];
                let previous = input[(i + n - 1) % n];
                let current_in = inside(&current);
                let previous_in = inside(&previous);
                if current_in {
                    if !previous_in {
                        output.push(segment_line_intersection(&previous, &current, &a, &b));
                    }
                    output.push(current);
                } else if previous_in {
                    output.push(segment_line_intersection(&previous, &current, &a, &b));
                }
            }
        }
        output
    }

    /// Area of the intersection with a convex polygon
    pub fn intersection_area_with_convex(&self, convex: &Polygon2D) -> f64 {
        if !bounding_boxes_overlap(&self.bounding_box(), &convex.bounding_box()) {
            return 0.0;
        }
        let clipped = self.clip_with_convex(convex);
        if clipped.len() < 3 {
            return 0.0;
        }
        signed_area(&clipped).abs()
    }
}

pub fn bounding_boxes_overlap(a: &(Point2<f64>, Point2<f64>), b: &(Point2<f64>, Point2<f64>)) -> bool {
    a.0.x <= b.1.x && b.0.x <= a.1.x && a.0.y <= b.1.y && b.0.y <= a.1.y
}

/// Closest point of segment `a -> b` to `p`. The normal points to the right
/// of the segment direction, which is outward for a counter-clockwise ring.
pub fn project_onto_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> BoundaryProjection {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < EPSILON {
        return BoundaryProjection {
            point: *a,
            distance: (p - a).norm(),
            edge_normal: Vector2::zeros(),
        };
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    let point = a + ab * t;
    BoundaryProjection {
        point,
        distance: (p - point).norm(),
        edge_normal: Vector2::new(ab.y, -ab.x) / len_sq.sqrt(),
    }
}

fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

fn signed_area(vertices: &[Point2<f64>]) -> f64 {
    let n = vertices.len();
    0.5 * (0..n)
        .map(|i| {
            let a = vertices[i];
            let b = vertices[(i + 1) % n];
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
}

fn segment_line_intersection(
    p: &Point2<f64>,
    q: &Point2<f64>,
    a: &Point2<f64>,
    b: &Point2<f64>,
) -> Point2<f64> {
    let r = q - p;
    let s = b - a;
    let denom = cross(&r, &s);
    if denom.abs() < EPSILON {
        return *q;
    }
    let t = cross(&(a - p), &s) / denom;
    p + r * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn l_shape() -> Polygon2D {
        // 2x2 square with the top-right 1x1 quadrant removed
        Polygon2D::from_xy(&[(0.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (1.0, 2.0), (0.0, 2.0)])
            .unwrap()
    }

    #[test]
    fn test_winding_is_normalized() {
        let cw = Polygon2D::from_xy(&[(0.0, 0.0), (0.0, 1.0), (1.0, 1.0), (1.0, 0.0)]).unwrap();
        assert_relative_eq!(cw.area(), 1.0);
        let projection = cw.project_onto_boundary(&Point2::new(0.5, -0.5));
        assert_relative_eq!(projection.edge_normal.y, -1.0);
    }

    #[test]
    fn test_degenerate_polygons_rejected() {
        assert!(Polygon2D::from_xy(&[(0.0, 0.0), (1.0, 0.0)]).is_err());
        assert!(Polygon2D::from_xy(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]).is_err());
    }

    #[test]
    fn test_concave_containment() {
        let poly = l_shape();
        assert_relative_eq!(poly.area(), 3.0);
        assert!(poly.contains(&Point2::new(0.5, 1.5)));
        assert!(poly.contains(&Point2::new(1.5, 0.5)));
        assert!(!poly.contains(&Point2::new(1.5, 1.5)));
        assert!(poly.contains(&Point2::new(2.0, 0.5)));
    }

    #[test]
    fn test_boundary_projection() {
        let square = Polygon2D::rectangle(Point2::new(0.0, 0.0), 2.0, 2.0).unwrap();
        let projection = square.project_onto_boundary(&Point2::new(1.5, 0.2));
        assert_relative_eq!(projection.distance, 0.5);
        assert_relative_eq!(projection.point.x, 1.0);
        assert_relative_eq!(projection.edge_normal.x, 1.0);
    }

    #[test]
    fn test_convex_hull_fills_notch() {
        let hull = l_shape().convex_hull();
        assert_eq!(hull.len(), 5);
        assert_relative_eq!(hull.area(), 3.5, epsilon = 1e-12);
        assert!(hull.contains(&Point2::new(1.4, 1.4)));
        assert!(signed_area(hull.vertices()) > 0.0);
    }

    #[test]
    fn test_convex_intersection_area() {
        let a = Polygon2D::rectangle(Point2::new(0.0, 0.0), 2.0, 2.0).unwrap();
        let b = Polygon2D::rectangle(Point2::new(1.0, 1.0), 2.0, 2.0).unwrap();
        assert_relative_eq!(a.intersection_area_with_convex(&b), 1.0, epsilon = 1e-12);
        let far = Polygon2D::rectangle(Point2::new(5.0, 5.0), 1.0, 1.0).unwrap();
        assert_eq!(a.intersection_area_with_convex(&far), 0.0);
    }

    #[test]
    fn test_concave_intersection_area() {
        let clip = Polygon2D::rectangle(Point2::new(1.0, 1.0), 2.0, 1.0).unwrap();
        // clip covers y in [0.5, 1.5], x in [0, 2]; L-shape covers 1.5 of that
        assert_relative_eq!(l_shape().intersection_area_with_convex(&clip), 1.5, epsilon = 1e-12);
    }
}
