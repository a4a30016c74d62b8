// src/clipper/cpu.rs

use glam::Vec3;
use log::{trace, warn};

use crate::error::Result;
use crate::geometry::Point2;
use crate::intersection::{crawl, encloses, DepthPlane, SegmentHit, SegmentIntersection};
use crate::shader_types::{
    ClipStatus, ClipperResource, Cut, CutMap, FixedCapacity, GpuEdge, GpuPolygon, GpuSegment,
    Mark, MarkCode, Telemetry, POLYGON_CAPACITY,
};

use super::ClipBackend;

/// Visible pieces shorter than this (in segment alpha) are not emitted.
pub const MIN_SEGMENT_ALPHA: f32 = 1e-4;
/// Cuts closer than this along the edge are one cut.
pub const CUT_MERGE_EPSILON: f32 = 1e-6;
/// How close to a side's end a hit must be to count as passing its vertex.
pub const VERTEX_TOLERANCE: f32 = 1e-6;

/// Clips one edge buffer against every polygon it does not belong to and
/// rewrites it with the visible pieces.
pub fn clip_edge(
    polygons: &[GpuPolygon],
    edge: &mut GpuEdge,
    resource: &mut ClipperResource,
    telemetry: &mut Telemetry,
) {
    *telemetry = Telemetry::default();
    if edge.is_empty() {
        telemetry.set_status(ClipStatus::Untouched);
        return;
    }

    let segment = edge.segments[0];
    resource.scaffold = *edge;
    resource.result.clear();

    for (index, occluder) in polygons.iter().enumerate() {
        if index as u32 == edge.polygon {
            continue;
        }
        let map = cut_map(occluder, &segment, resource, telemetry);
        stage_marks(&map, occluder, &segment, resource, telemetry);
        merge_initial(resource, telemetry);
    }

    resource.scaffold.clear();
    let mut emitted = 0usize;
    for (from, to) in resource.result.visible_intervals() {
        if to - from < MIN_SEGMENT_ALPHA {
            continue;
        }
        let mut piece = segment.slice(from, to);
        piece.markline = resource.result;
        if resource.scaffold.push(piece).is_err() {
            telemetry.drops += 1;
        } else {
            emitted += 1;
        }
    }

    *edge = resource.scaffold;
    telemetry.markline = resource.result;

    let status = if telemetry.drops > 0 {
        ClipStatus::Overflow
    } else if emitted == 0 {
        ClipStatus::Hidden
    } else if resource.result.is_empty() {
        ClipStatus::Visible
    } else {
        ClipStatus::Partial
    };
    telemetry.set_status(status);
}

/// Where `occluder` cuts `segment`, and whether it hides it at all.
pub fn cut_map(
    occluder: &GpuPolygon,
    segment: &GpuSegment,
    resource: &mut ClipperResource,
    telemetry: &mut Telemetry,
) -> CutMap {
    let mut map = CutMap::default();
    let vertices = occluder.as_slice();
    let sides = vertices.len();
    if sides < 3 {
        return map;
    }

    let origin = Vec3::from(segment.origin);
    let outpost = Vec3::from(segment.outpost);
    let a0 = Point2::from(origin);
    let a1 = Point2::from(outpost);

    for side in 0..sides {
        let s0 = Vec3::from(vertices[side]);
        let s1 = Vec3::from(vertices[(side + 1) % sides]);
        let hit = SegmentIntersection::classify(a0, a1, s0.into(), s1.into());
        resource.intersections[side] = hit.record();
        telemetry.code = hit.code() as i32;

        let alpha = match hit {
            SegmentHit::Crossing { alpha, .. } => {
                telemetry.intersections += 1;
                alpha
            }
            SegmentHit::Disjoint => match vertex_pass(a0, a1, s0.into(), s1.into()) {
                Some(alpha) => alpha,
                None => continue,
            },
            SegmentHit::Colinear { .. } => continue,
        };

        let point = a0.lerp(&a1, alpha);
        let edge_depth = crawl(origin, outpost, point);
        let side_depth = crawl(s0, s1, point);
        telemetry.comp = edge_depth;
        telemetry.point = side_depth;
        if edge_depth < side_depth {
            map.clear();
            map.set_obscured(false);
            return map;
        }
        telemetry.misc = alpha;
        // Both sides meeting at a vertex report the same alpha.
        if map.as_slice().iter().any(|cut| (cut.alpha - alpha).abs() < CUT_MERGE_EPSILON) {
            continue;
        }
        if map.push(Cut::new(side, alpha, false)).is_err() {
            telemetry.drops += 1;
        }
    }

    if map.is_empty() {
        let midpoint = a0.midpoint(&a1);
        if !encloses(midpoint, occluder.ring()) {
            return map;
        }
        let mut ring = [Vec3::ZERO; POLYGON_CAPACITY];
        for (slot, vertex) in ring.iter_mut().zip(vertices) {
            *slot = Vec3::from(*vertex);
        }
        if let Some(plane) = DepthPlane::from_vertices(&ring[..sides]) {
            let plane_depth = plane.depth_at(midpoint);
            let edge_depth = crawl(origin, outpost, midpoint);
            telemetry.comp = edge_depth;
            telemetry.point = plane_depth;
            map.set_obscured(plane_depth < edge_depth);
        }
        return map;
    }

    map.sort_by_alpha();
    map.set_obscured(true);
    let count = map.len();
    for i in 0..count {
        let start = map.cuts[i].alpha;
        let end = if i + 1 < count { map.cuts[i + 1].alpha } else { 1.0 };
        let interior = a0.lerp(&a1, (start + end) * 0.5);
        map.cuts[i].kind = encloses(interior, occluder.ring()) as u32;
    }
    telemetry.cuts += count as i32;
    map
}

/// Alpha along `a0→a1` where it runs through an end of side `b0→b1`.
fn vertex_pass(a0: Point2, a1: Point2, b0: Point2, b1: Point2) -> Option<f32> {
    let (alpha, beta) = SegmentIntersection::parameters(a0, a1, b0, b1)?;
    let on_edge = alpha > 0.0 && alpha < 1.0;
    let at_end = beta.abs() <= VERTEX_TOLERANCE || (beta - 1.0).abs() <= VERTEX_TOLERANCE;
    (on_edge && at_end).then_some(alpha)
}

/// Turns a cut map into hidden runs in `resource.initial`.
fn stage_marks(
    map: &CutMap,
    occluder: &GpuPolygon,
    segment: &GpuSegment,
    resource: &mut ClipperResource,
    telemetry: &mut Telemetry,
) {
    resource.initial.clear();
    if !map.obscured() {
        return;
    }

    let cuts = map.as_slice();
    if cuts.is_empty() {
        push_mark(resource, telemetry, Mark::enter(0.0));
        push_mark(resource, telemetry, Mark::exit(1.0));
        return;
    }

    for (slot, cut) in resource.marks.iter_mut().zip(cuts) {
        *slot = if cut.entering() { Mark::enter(cut.alpha) } else { Mark::exit(cut.alpha) };
    }

    let a0 = Point2::new(segment.origin.x, segment.origin.y);
    let a1 = Point2::new(segment.outpost.x, segment.outpost.y);
    let mut inside = encloses(a0.lerp(&a1, cuts[0].alpha * 0.5), occluder.ring());
    if inside {
        push_mark(resource, telemetry, Mark::enter(0.0));
    }
    for i in 0..cuts.len().min(resource.marks.len()) {
        let mark = resource.marks[i];
        match mark.code() {
            Ok(MarkCode::Enter) if !inside => {
                push_mark(resource, telemetry, mark);
                inside = true;
            }
            Ok(MarkCode::Exit) if inside => {
                push_mark(resource, telemetry, mark);
                inside = false;
            }
            _ => {}
        }
    }
    if inside {
        push_mark(resource, telemetry, Mark::exit(1.0));
    }
}

fn push_mark(resource: &mut ClipperResource, telemetry: &mut Telemetry, mark: Mark) {
    if resource.initial.push(mark).is_err() {
        telemetry.drops += 1;
    }
}

fn merge_initial(resource: &mut ClipperResource, telemetry: &mut Telemetry) {
    if resource.initial.is_empty() {
        return;
    }
    for i in 0..resource.initial.len() {
        let mark = resource.initial.marks[i];
        if resource.result.push(mark).is_ok() {
            continue;
        }
        resource.result.normalize();
        if resource.result.push(mark).is_err() {
            telemetry.drops += 1;
        }
    }
    resource.result.normalize();
}

/// Runs [`clip_edge`] over every edge buffer, one telemetry record each.
pub fn clip_lines(polygons: &[GpuPolygon], edges: &mut [GpuEdge]) -> Vec<Telemetry> {
    let mut resource = Box::<ClipperResource>::default();
    edges
        .iter_mut()
        .map(|edge| {
            let mut telemetry = Telemetry::default();
            clip_edge(polygons, edge, &mut resource, &mut telemetry);
            telemetry
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct CpuClipper;

impl ClipBackend for CpuClipper {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn clip(&mut self, polygons: &[GpuPolygon], edges: &mut [GpuEdge]) -> Result<Vec<Telemetry>> {
        for polygon in polygons {
            polygon.validate()?;
        }
        for edge in edges.iter() {
            edge.validate()?;
        }
        let records = clip_lines(polygons, edges);
        let dropped: i32 = records.iter().map(|t| t.drops).sum();
        if dropped > 0 {
            warn!("cpu clipper dropped {} entries to capacity limits", dropped);
        }
        trace!("cpu clipper processed {} edges against {} polygons", edges.len(), polygons.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Polygon;
    use crate::shader_types::GpuVertex;
    use approx::assert_relative_eq;

    fn rect(x0: f32, y0: f32, x1: f32, y1: f32, z: f32) -> GpuPolygon {
        Polygon::new(vec![
            Vec3::new(x0, y0, z),
            Vec3::new(x1, y0, z),
            Vec3::new(x1, y1, z),
            Vec3::new(x0, y1, z),
        ])
        .harden()
        .unwrap()
    }

    fn segment(from: Vec3, to: Vec3) -> GpuSegment {
        GpuSegment::new(GpuVertex::from(from), GpuVertex::from(to))
    }

    #[test]
    fn edge_in_front_of_crossing_occluder_has_no_cuts() {
        let occluder = rect(1.0, 1.0, 3.0, 3.0, 10.0);
        let mut resource = ClipperResource::default();
        let mut telemetry = Telemetry::default();
        let seg = segment(Vec3::new(0.0, 2.0, 0.0), Vec3::new(4.0, 2.0, 0.0));

        let map = cut_map(&occluder, &seg, &mut resource, &mut telemetry);
        assert!(map.is_empty());
        assert!(!map.obscured());
        assert_eq!(telemetry.intersections, 1);
    }

    #[test]
    fn edge_behind_crossing_occluder_is_cut_twice() {
        let occluder = rect(1.0, 1.0, 3.0, 3.0, 0.0);
        let mut resource = ClipperResource::default();
        let mut telemetry = Telemetry::default();
        let seg = segment(Vec3::new(0.0, 2.0, 5.0), Vec3::new(4.0, 2.0, 5.0));

        let map = cut_map(&occluder, &seg, &mut resource, &mut telemetry);
        assert!(map.obscured());
        assert_eq!(map.len(), 2);
        assert_relative_eq!(map.cuts[0].alpha, 0.25, epsilon = 1e-5);
        assert_relative_eq!(map.cuts[1].alpha, 0.75, epsilon = 1e-5);
        assert!(map.cuts[0].entering());
        assert!(!map.cuts[1].entering());
        assert_eq!(telemetry.cuts, 2);
        assert_eq!(resource.intersections[1].code().unwrap(), crate::shader_types::IntersectionCode::Crossing);
    }

    #[test]
    fn enclosed_segment_uses_depth_plane() {
        let occluder = rect(0.0, 0.0, 4.0, 4.0, 1.0);
        let mut resource = ClipperResource::default();
        let mut telemetry = Telemetry::default();

        let behind = segment(Vec3::new(1.0, 1.0, 5.0), Vec3::new(3.0, 1.0, 5.0));
        let map = cut_map(&occluder, &behind, &mut resource, &mut telemetry);
        assert!(map.obscured());
        assert!(map.is_empty());

        let front = segment(Vec3::new(1.0, 1.0, -5.0), Vec3::new(3.0, 1.0, -5.0));
        let map = cut_map(&occluder, &front, &mut resource, &mut telemetry);
        assert!(!map.obscured());
    }

    #[test]
    fn partially_hidden_edge_splits_into_two_pieces() {
        let back = rect(0.0, 0.0, 4.0, 4.0, 10.0);
        let front = rect(1.0, 1.0, 5.0, 3.0, 0.0);
        let polygons = [back, front];
        let mut edge = GpuEdge::single(
            segment(Vec3::new(4.0, 0.0, 10.0), Vec3::new(4.0, 4.0, 10.0)),
            0,
        );
        let mut resource = ClipperResource::default();
        let mut telemetry = Telemetry::default();

        clip_edge(&polygons, &mut edge, &mut resource, &mut telemetry);
        assert_eq!(telemetry.status().unwrap(), ClipStatus::Partial);
        assert_eq!(edge.count, 2);
        assert_relative_eq!(edge.segments[0].outpost.y, 1.0, epsilon = 1e-4);
        assert_relative_eq!(edge.segments[1].origin.y, 3.0, epsilon = 1e-4);
        assert_relative_eq!(edge.segments[1].outpost.y, 4.0, epsilon = 1e-4);
        assert_eq!(edge.segments[0].markline, telemetry.markline);
        assert_eq!(telemetry.markline.len(), 2);
    }

    #[test]
    fn fully_covered_edge_is_hidden() {
        let front = rect(0.0, 0.0, 10.0, 10.0, 0.0);
        let mut edge = GpuEdge::single(
            segment(Vec3::new(2.0, 2.0, 5.0), Vec3::new(8.0, 2.0, 5.0)),
            1,
        );
        let mut resource = ClipperResource::default();
        let mut telemetry = Telemetry::default();

        clip_edge(&[front], &mut edge, &mut resource, &mut telemetry);
        assert_eq!(telemetry.status().unwrap(), ClipStatus::Hidden);
        assert_eq!(edge.count, 0);
    }

    #[test]
    fn owner_polygon_never_hides_its_own_edge() {
        let square = rect(0.0, 0.0, 2.0, 2.0, 0.0);
        let mut edges = Polygon::from(&square).hard_edges(0);
        let records = clip_lines(&[square], &mut edges);
        assert!(records
            .iter()
            .all(|t| t.status().unwrap() == ClipStatus::Visible));
        assert!(edges.iter().all(|e| e.count == 1));
    }

    #[test]
    fn overlapping_occluders_merge_hidden_runs() {
        let first = rect(1.0, -1.0, 5.0, 1.0, 0.0);
        let second = rect(4.0, -1.0, 7.0, 1.0, 0.0);
        let mut edge = GpuEdge::single(
            segment(Vec3::new(0.0, 0.0, 3.0), Vec3::new(10.0, 0.0, 3.0)),
            9,
        );
        let mut resource = ClipperResource::default();
        let mut telemetry = Telemetry::default();

        clip_edge(&[first, second], &mut edge, &mut resource, &mut telemetry);
        assert_eq!(edge.count, 2);
        assert_eq!(telemetry.markline.len(), 2);
        assert_relative_eq!(telemetry.markline.marks[0].alpha, 0.1, epsilon = 1e-5);
        assert_relative_eq!(telemetry.markline.marks[1].alpha, 0.7, epsilon = 1e-5);
    }

    #[test]
    fn edge_through_occluder_vertices_keeps_outer_pieces() {
        let diamond = Polygon::new(vec![
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(4.0, 2.0, 0.0),
            Vec3::new(6.0, 0.0, 0.0),
            Vec3::new(4.0, -2.0, 0.0),
        ])
        .harden()
        .unwrap();
        let mut edge = GpuEdge::single(
            segment(Vec3::new(0.0, 0.0, 5.0), Vec3::new(10.0, 0.0, 5.0)),
            1,
        );
        let mut resource = ClipperResource::default();
        let mut telemetry = Telemetry::default();

        clip_edge(&[diamond], &mut edge, &mut resource, &mut telemetry);
        assert_eq!(telemetry.status().unwrap(), ClipStatus::Partial);
        assert_eq!(telemetry.cuts, 2);
        assert_eq!(edge.count, 2);
        assert_relative_eq!(edge.segments[0].origin.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(edge.segments[0].outpost.x, 2.0, epsilon = 1e-4);
        assert_relative_eq!(edge.segments[1].origin.x, 6.0, epsilon = 1e-4);
        assert_relative_eq!(edge.segments[1].outpost.x, 10.0, epsilon = 1e-4);
    }

    #[test]
    fn edge_grazing_a_single_vertex_stays_whole() {
        let triangle = Polygon::new(vec![
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(6.0, 3.0, 0.0),
            Vec3::new(2.0, 3.0, 0.0),
        ])
        .harden()
        .unwrap();
        let mut edge = GpuEdge::single(
            segment(Vec3::new(0.0, 0.0, 5.0), Vec3::new(10.0, 0.0, 5.0)),
            1,
        );
        let mut resource = ClipperResource::default();
        let mut telemetry = Telemetry::default();

        clip_edge(&[triangle], &mut edge, &mut resource, &mut telemetry);
        assert_eq!(telemetry.status().unwrap(), ClipStatus::Visible);
        assert_eq!(edge.count, 1);
    }

    #[test]
    fn too_many_hidden_runs_overflow_the_markline() {
        let occluders: Vec<GpuPolygon> = (0..17)
            .map(|i| {
                let x = 2.0 * i as f32 + 1.0;
                rect(x, -0.5, x + 1.0, 0.5, 0.0)
            })
            .collect();
        let mut edge = GpuEdge::single(
            segment(Vec3::new(0.0, 0.0, 5.0), Vec3::new(40.0, 0.0, 5.0)),
            99,
        );
        let mut resource = Box::<ClipperResource>::default();
        let mut telemetry = Telemetry::default();

        clip_edge(&occluders, &mut edge, &mut resource, &mut telemetry);
        assert_eq!(telemetry.status().unwrap(), ClipStatus::Overflow);
        assert!(telemetry.drops > 0);
        assert_eq!(telemetry.markline.len(), 2 * 15);
        assert!(edge.count > 0);
    }

    #[test]
    fn empty_edge_is_untouched() {
        let mut edge = GpuEdge::default();
        let mut resource = ClipperResource::default();
        let mut telemetry = Telemetry::default();
        clip_edge(&[], &mut edge, &mut resource, &mut telemetry);
        assert_eq!(telemetry.status().unwrap(), ClipStatus::Untouched);
    }

    #[test]
    fn backend_rejects_corrupt_counts() {
        let mut polygon = rect(0.0, 0.0, 1.0, 1.0, 0.0);
        polygon.count = 99;
        let mut edges = vec![GpuEdge::default()];
        assert!(CpuClipper.clip(&[polygon], &mut edges).is_err());
    }
}
