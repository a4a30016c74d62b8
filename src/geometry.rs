// src/geometry.rs

use std::path::Path;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::intersection::crawl;
use crate::shader_types::{
    FixedCapacity, GpuEdge, GpuPolygon, GpuPolyhedron, GpuSegment, GpuVertex,
};
use crate::transform::ViewTransform;

/// Two-component float vector. Eight-byte aligned so it can sit inside shared
/// buffers where the shader side uses `vec2<f32>`.
#[repr(C, align(8))]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable, PartialEq, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(&self, other: &Point2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn cross(&self, other: &Point2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn sub(&self, other: &Point2) -> Point2 {
        Point2::new(self.x - other.x, self.y - other.y)
    }

    pub fn lerp(&self, other: &Point2, t: f32) -> Point2 {
        Point2::new(self.x + t * (other.x - self.x), self.y + t * (other.y - self.y))
    }

    pub fn midpoint(&self, other: &Point2) -> Point2 {
        self.lerp(other, 0.5)
    }

    pub fn distance_squared(&self, other: &Point2) -> f32 {
        let d = self.sub(other);
        d.dot(&d)
    }
}

impl From<Vec3> for Point2 {
    fn from(v: Vec3) -> Self {
        Point2::new(v.x, v.y)
    }
}

/// Flat polygon in level space.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<Vec3>,
}

impl Polygon {
    pub fn new(vertices: Vec<Vec3>) -> Self {
        Self { vertices }
    }

    /// Closed ring of sides, the last one running back to the first vertex.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        let n = if self.vertices.len() < 2 { 0 } else { self.vertices.len() };
        (0..n).map(move |i| Edge {
            origin: self.vertices[i],
            outpost: self.vertices[(i + 1) % n],
        })
    }

    pub fn flat_points(&self) -> impl Iterator<Item = Point2> + '_ {
        self.vertices.iter().map(|v| Point2::from(*v))
    }

    pub fn transformed(&self, transform: &ViewTransform) -> Polygon {
        Polygon::new(self.vertices.iter().map(|v| transform.apply(*v)).collect())
    }

    /// Moves every coordinate by an independent offset in `[-amount, amount]`.
    /// Breaks up shared vertices and coplanar sides before clipping.
    pub fn disturbed<R: Rng + ?Sized>(&self, amount: f32, rng: &mut R) -> Polygon {
        if amount <= 0.0 {
            return self.clone();
        }
        Polygon::new(
            self.vertices
                .iter()
                .map(|v| {
                    *v + Vec3::new(
                        rng.gen_range(-amount..=amount),
                        rng.gen_range(-amount..=amount),
                        rng.gen_range(-amount..=amount),
                    )
                })
                .collect(),
        )
    }

    pub fn harden(&self) -> Result<GpuPolygon> {
        let mut polygon = GpuPolygon::default();
        for v in &self.vertices {
            polygon.push(GpuVertex::from(*v))?;
        }
        Ok(polygon)
    }

    /// One single-segment edge buffer per side, tagged with the owner index.
    pub fn hard_edges(&self, id: u32) -> Vec<GpuEdge> {
        self.edges().map(|edge| edge.harden(id)).collect()
    }
}

impl From<&GpuPolygon> for Polygon {
    fn from(polygon: &GpuPolygon) -> Self {
        Polygon::new(polygon.as_slice().iter().map(|v| Vec3::from(*v)).collect())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub origin: Vec3,
    pub outpost: Vec3,
}

impl Edge {
    pub fn flatten(&self) -> Line {
        Line::new(Point2::from(self.origin), Point2::from(self.outpost))
    }

    pub fn harden(&self, polygon: u32) -> GpuEdge {
        GpuEdge::single(
            GpuSegment::new(GpuVertex::from(self.origin), GpuVertex::from(self.outpost)),
            polygon,
        )
    }

    pub fn depth_at(&self, point: Point2) -> f32 {
        crawl(self.origin, self.outpost, point)
    }
}

/// A visible piece of the compressed drawing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub origin: Point2,
    pub outpost: Point2,
    pub intensity: f32,
    pub thickness: f32,
}

impl Line {
    pub fn new(origin: Point2, outpost: Point2) -> Self {
        Self {
            origin,
            outpost,
            intensity: 1.0,
            thickness: 1.0,
        }
    }

    pub fn softened(&self) -> Line {
        Line {
            intensity: 0.3,
            thickness: 5.0,
            ..*self
        }
    }

    pub fn length(&self) -> f32 {
        self.origin.distance_squared(&self.outpost).sqrt()
    }

    pub fn transformed(&self, transform: &ViewTransform) -> Line {
        Line {
            origin: transform.apply_point(self.origin),
            outpost: transform.apply_point(self.outpost),
            ..*self
        }
    }
}

impl From<&GpuSegment> for Line {
    fn from(segment: &GpuSegment) -> Self {
        Line::new(
            Point2::new(segment.origin.x, segment.origin.y),
            Point2::new(segment.outpost.x, segment.outpost.y),
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyhedron {
    pub faces: Vec<Polygon>,
}

impl Polyhedron {
    pub fn harden(&self) -> Result<GpuPolyhedron> {
        let mut polyhedron = GpuPolyhedron::default();
        for face in &self.faces {
            polyhedron.push(face.harden()?)?;
        }
        Ok(polyhedron)
    }
}

impl From<&GpuPolyhedron> for Polyhedron {
    fn from(polyhedron: &GpuPolyhedron) -> Self {
        Polyhedron {
            faces: polyhedron.as_slice().iter().map(Polygon::from).collect(),
        }
    }
}

/// Level file contents.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Level {
    pub polygons: Vec<Polygon>,
    #[serde(default)]
    pub polyhedra: Vec<Polyhedron>,
}

impl Level {
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let string = std::fs::read_to_string(file)?;
        Ok(serde_json::from_str(&string)?)
    }

    /// Plain polygons followed by every polyhedron face.
    pub fn all_polygons(&self) -> Vec<Polygon> {
        self.polygons
            .iter()
            .cloned()
            .chain(self.polyhedra.iter().flat_map(|p| p.faces.iter().cloned()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompressError;
    use crate::shader_types::POLYGON_CAPACITY;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn square(z: f32) -> Polygon {
        Polygon::new(vec![
            Vec3::new(0.0, 0.0, z),
            Vec3::new(1.0, 0.0, z),
            Vec3::new(1.0, 1.0, z),
            Vec3::new(0.0, 1.0, z),
        ])
    }

    #[test]
    fn edges_close_the_ring() {
        let edges: Vec<_> = square(0.0).edges().collect();
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[3].origin, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(edges[3].outpost, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(Polygon::new(vec![Vec3::ZERO]).edges().count(), 0);
    }

    #[test]
    fn harden_round_trips_and_enforces_capacity() {
        let polygon = square(2.0);
        let hard = polygon.harden().unwrap();
        assert_eq!(hard.count, 4);
        assert_eq!(Polygon::from(&hard), polygon);

        let big = Polygon::new(vec![Vec3::ZERO; POLYGON_CAPACITY + 1]);
        assert!(matches!(big.harden(), Err(CompressError::Capacity { .. })));
    }

    #[test]
    fn hard_edges_are_single_segments_tagged_with_owner() {
        let edges = square(0.0).hard_edges(7);
        assert_eq!(edges.len(), 4);
        for edge in &edges {
            assert_eq!(edge.count, 1);
            assert_eq!(edge.polygon, 7);
            assert!(edge.segments[0].markline.is_empty());
        }
    }

    #[test]
    fn disturbance_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(3);
        let polygon = square(0.0);
        let moved = polygon.disturbed(0.1, &mut rng);
        for (a, b) in polygon.vertices.iter().zip(&moved.vertices) {
            assert!((*a - *b).abs().max_element() <= 0.1 + 1e-6);
        }
        assert_eq!(polygon.disturbed(0.0, &mut rng), polygon);
    }

    #[test]
    fn polyhedron_is_limited_to_ten_faces() {
        let solid = Polyhedron { faces: vec![square(0.0); 11] };
        assert!(solid.harden().is_err());
        let solid = Polyhedron { faces: vec![square(0.0); 3] };
        let hard = solid.harden().unwrap();
        assert_eq!(Polyhedron::from(&hard), solid);
    }

    #[test]
    fn level_flattens_polyhedra_after_polygons() {
        let level: Level = serde_json::from_str(
            r#"{
                "polygons": [{"vertices": [[0,0,0],[1,0,0],[0,1,0]]}],
                "polyhedra": [{"faces": [{"vertices": [[0,0,1],[1,0,1],[0,1,1]]}]}]
            }"#,
        )
        .unwrap();
        let all = level.all_polygons();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].vertices[0], Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn softened_line_keeps_endpoints() {
        let line = Line::new(Point2::new(0.0, 0.0), Point2::new(3.0, 4.0));
        let soft = line.softened();
        assert_eq!(soft.origin, line.origin);
        assert_eq!(soft.thickness, 5.0);
        assert_eq!(line.length(), 5.0);
    }

    #[test]
    fn edge_depth_follows_the_projected_point() {
        let edge = Edge {
            origin: Vec3::new(0.0, 0.0, 2.0),
            outpost: Vec3::new(4.0, 0.0, 6.0),
        };
        assert_eq!(edge.depth_at(Point2::new(2.0, 0.0)), 4.0);
        assert_eq!(edge.flatten().outpost, Point2::new(4.0, 0.0));
    }

    #[test]
    fn line_transform_swaps_axes() {
        let line = Line::new(Point2::new(1.0, 2.0), Point2::new(3.0, 2.0)).softened();
        let turned = line.transformed(&ViewTransform::from_rows([
            [0.0, 1.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
        ]));
        assert_eq!(turned.origin, Point2::new(2.0, 1.0));
        assert_eq!(turned.outpost, Point2::new(2.0, 3.0));
        assert_eq!(turned.intensity, 0.3);
    }
}
