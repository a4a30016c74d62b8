// src/intersection.rs

use glam::Vec3;

use crate::geometry::Point2;
use crate::shader_types::{Intersection, IntersectionCode};

/// Below this determinant two segments are treated as parallel.
pub const PARALLEL_EPSILON: f32 = 1e-4;
/// Largest distance from a line at which a parallel segment still counts as on it.
pub const COLINEAR_TOLERANCE: f32 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SegmentHit {
    Disjoint,
    /// `alpha` and `beta` are the parameters along the first and second segment.
    Crossing { point: Point2, alpha: f32, beta: f32 },
    /// Overlap of two segments on one line, measured along the first segment.
    Colinear { start: Point2, end: Point2, from: f32, to: f32 },
}

impl SegmentHit {
    pub fn code(&self) -> IntersectionCode {
        match self {
            SegmentHit::Disjoint => IntersectionCode::Disjoint,
            SegmentHit::Crossing { .. } => IntersectionCode::Crossing,
            SegmentHit::Colinear { .. } => IntersectionCode::Colinear,
        }
    }

    pub fn record(&self) -> Intersection {
        let mut record = Intersection::disjoint();
        record.code = self.code() as i32;
        match *self {
            SegmentHit::Disjoint => {}
            SegmentHit::Crossing { point, .. } => record.intersection = point,
            SegmentHit::Colinear { start, end, .. } => {
                record.intersection = start;
                record.colinear = end;
            }
        }
        record
    }
}

pub struct SegmentIntersection;

impl SegmentIntersection {
    /// Classifies segment `a0→a1` against `b0→b1`.
    ///
    /// A crossing needs both parameters strictly inside `(0, 1)`, so segments
    /// that only touch at an endpoint do not cross.
    pub fn classify(a0: Point2, a1: Point2, b0: Point2, b1: Point2) -> SegmentHit {
        let Some((alpha, beta)) = Self::parameters(a0, a1, b0, b1) else {
            return Self::colinear_overlap(a0, a1, b0, b1);
        };
        if alpha > 0.0 && alpha < 1.0 && beta > 0.0 && beta < 1.0 {
            return SegmentHit::Crossing {
                point: a0.lerp(&a1, alpha),
                alpha,
                beta,
            };
        }
        SegmentHit::Disjoint
    }

    /// Parameters along `a0→a1` and `b0→b1` of the point where their lines
    /// meet. `None` when the segments are parallel.
    pub fn parameters(a0: Point2, a1: Point2, b0: Point2, b1: Point2) -> Option<(f32, f32)> {
        let d1 = a1.sub(&a0);
        let d2 = b1.sub(&b0);
        let determinant = d1.x * d2.y - d2.x * d1.y;
        if determinant.abs() < PARALLEL_EPSILON {
            return None;
        }
        let alpha = ((a0.y - b0.y) * d2.x - (a0.x - b0.x) * d2.y) / determinant;
        let beta = ((a0.y - b0.y) * d1.x - (a0.x - b0.x) * d1.y) / determinant;
        Some((alpha, beta))
    }

    fn colinear_overlap(a0: Point2, a1: Point2, b0: Point2, b1: Point2) -> SegmentHit {
        let d1 = a1.sub(&a0);
        let length_squared = d1.dot(&d1);
        if length_squared < 1e-12 {
            return SegmentHit::Disjoint;
        }
        let offset = d1.cross(&b0.sub(&a0)).abs() / length_squared.sqrt();
        if offset > COLINEAR_TOLERANCE {
            return SegmentHit::Disjoint;
        }

        let t0 = b0.sub(&a0).dot(&d1) / length_squared;
        let t1 = b1.sub(&a0).dot(&d1) / length_squared;
        let from = t0.min(t1).max(0.0);
        let to = t0.max(t1).min(1.0);
        if to - from <= 1e-6 {
            return SegmentHit::Disjoint;
        }
        SegmentHit::Colinear {
            start: a0.lerp(&a1, from),
            end: a0.lerp(&a1, to),
            from,
            to,
        }
    }
}

/// Even-odd containment test. Rings with fewer than three points enclose nothing.
pub fn encloses<I>(point: Point2, ring: I) -> bool
where
    I: IntoIterator<Item = Point2>,
    I::IntoIter: Clone,
{
    let iter = ring.into_iter();
    let Some(last) = iter.clone().last() else {
        return false;
    };
    if iter.clone().count() < 3 {
        return false;
    }

    let mut inside = false;
    let mut prev = last;
    for current in iter {
        if (current.y > point.y) != (prev.y > point.y) {
            let x_at = current.x + (point.y - current.y) * (prev.x - current.x) / (prev.y - current.y);
            if point.x < x_at {
                inside = !inside;
            }
        }
        prev = current;
    }
    inside
}

/// Depth of an edge at a projected point, interpolated by distance along the
/// projected edge. Smaller depth is nearer the viewer.
pub fn crawl(origin: Vec3, outpost: Vec3, point: Point2) -> f32 {
    let start = Point2::from(origin);
    let length_squared = start.distance_squared(&Point2::from(outpost));
    if length_squared < 1e-12 {
        return origin.z;
    }
    let ratio = (point.distance_squared(&start) / length_squared).sqrt();
    origin.z + ratio * (outpost.z - origin.z)
}

/// Plane carrying a polygon, solved for depth over the view plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthPlane {
    normal: Vec3,
    anchor: Vec3,
}

impl DepthPlane {
    /// Newell normal through the centroid. `None` for fewer than three
    /// vertices or a polygon seen edge-on.
    pub fn from_vertices(vertices: &[Vec3]) -> Option<DepthPlane> {
        if vertices.len() < 3 {
            return None;
        }
        let mut normal = Vec3::ZERO;
        let mut sum = Vec3::ZERO;
        let mut prev = vertices[vertices.len() - 1];
        for &current in vertices {
            normal.x += (prev.y - current.y) * (prev.z + current.z);
            normal.y += (prev.z - current.z) * (prev.x + current.x);
            normal.z += (prev.x - current.x) * (prev.y + current.y);
            sum += current;
            prev = current;
        }
        if normal.z.abs() < 1e-6 {
            return None;
        }
        Some(DepthPlane {
            normal,
            anchor: sum / vertices.len() as f32,
        })
    }

    pub fn depth_at(&self, point: Point2) -> f32 {
        let n = self.normal;
        (-n.x * (point.x - self.anchor.x) - n.y * (point.y - self.anchor.y)) / n.z + self.anchor.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f32, y: f32) -> Point2 {
        Point2::new(x, y)
    }

    #[test]
    fn crossing_reports_both_parameters() {
        match SegmentIntersection::classify(p(0.0, 0.0), p(4.0, 0.0), p(1.0, -1.0), p(1.0, 1.0)) {
            SegmentHit::Crossing { point, alpha, beta } => {
                assert_relative_eq!(point.x, 1.0);
                assert_relative_eq!(point.y, 0.0);
                assert_relative_eq!(alpha, 0.25);
                assert_relative_eq!(beta, 0.5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn touching_endpoints_do_not_cross() {
        let hit = SegmentIntersection::classify(p(0.0, 0.0), p(1.0, 0.0), p(1.0, 0.0), p(1.0, 1.0));
        assert_eq!(hit, SegmentHit::Disjoint);
    }

    #[test]
    fn colinear_overlap_is_clamped_to_first_segment() {
        match SegmentIntersection::classify(p(0.0, 0.0), p(2.0, 0.0), p(3.0, 0.0), p(1.0, 0.0)) {
            SegmentHit::Colinear { start, end, from, to } => {
                assert_relative_eq!(from, 0.5);
                assert_relative_eq!(to, 1.0);
                assert_eq!(start, p(1.0, 0.0));
                assert_eq!(end, p(2.0, 0.0));
            }
            other => panic!("unexpected {:?}", other),
        }
        let parallel = SegmentIntersection::classify(p(0.0, 0.0), p(2.0, 0.0), p(0.0, 1.0), p(2.0, 1.0));
        assert_eq!(parallel, SegmentHit::Disjoint);
    }

    #[test]
    fn records_carry_codes_and_points() {
        let record = SegmentHit::Colinear { start: p(1.0, 0.0), end: p(2.0, 0.0), from: 0.5, to: 1.0 }.record();
        assert_eq!(record.code().unwrap(), IntersectionCode::Colinear);
        assert_eq!(record.colinear, p(2.0, 0.0));
        assert_eq!(SegmentHit::Disjoint.record(), Intersection::disjoint());
    }

    #[test]
    fn even_odd_enclosure() {
        let square = [p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)];
        assert!(encloses(p(1.0, 1.0), square));
        assert!(!encloses(p(3.0, 1.0), square));
        assert!(!encloses(p(1.0, 1.0), [p(0.0, 0.0), p(2.0, 2.0)]));
    }

    #[test]
    fn crawl_interpolates_depth_along_edge() {
        let depth = crawl(Vec3::new(0.0, 0.0, 1.0), Vec3::new(4.0, 0.0, 5.0), p(1.0, 0.0));
        assert_relative_eq!(depth, 2.0);
        assert_relative_eq!(crawl(Vec3::new(1.0, 1.0, 3.0), Vec3::new(1.0, 1.0, 9.0), p(0.0, 0.0)), 3.0);
    }

    #[test]
    fn depth_plane_solves_tilted_polygon() {
        let plane = DepthPlane::from_vertices(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 0.0),
        ])
        .unwrap();
        assert_relative_eq!(plane.depth_at(p(0.5, 0.5)), 0.5, epsilon = 1e-5);
        assert_relative_eq!(plane.depth_at(p(0.25, 0.9)), 0.25, epsilon = 1e-5);

        let edge_on = DepthPlane::from_vertices(&[
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 1.0),
        ]);
        assert!(edge_on.is_none());
    }
}
