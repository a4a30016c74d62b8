// src/generator.rs

use glam::Vec3;
use rand::Rng;

use crate::geometry::{Level, Polygon};
use crate::shader_types::POLYGON_CAPACITY;

pub struct PolygonGenerator;

impl PolygonGenerator {
    /// Convex polygon parallel to the view plane at `depth`.
    pub fn generate_convex_polygon<R: Rng + ?Sized>(
        center_x: f32,
        center_y: f32,
        depth: f32,
        avg_radius: f32,
        num_vertices: usize,
        rng: &mut R,
    ) -> Polygon {
        let num_vertices = num_vertices.clamp(3, POLYGON_CAPACITY);

        let mut angles = Vec::with_capacity(num_vertices);
        for i in 0..num_vertices {
            let base_angle = (i as f32) * 2.0 * std::f32::consts::PI / (num_vertices as f32);
            angles.push(base_angle);
        }

        let max_perturbation = std::f32::consts::PI / (num_vertices as f32) * 0.3;
        for angle in angles.iter_mut() {
            *angle += rng.gen_range(-max_perturbation..max_perturbation);
        }
        for i in 1..num_vertices {
            if angles[i] <= angles[i - 1] {
                angles[i] = angles[i - 1] + 0.01;
            }
        }

        let min_radius = avg_radius * 0.8;
        let max_radius = avg_radius * 1.2;
        let vertices = angles
            .into_iter()
            .map(|angle_rad| {
                let current_radius = rng.gen_range(min_radius..max_radius);
                Vec3::new(
                    center_x + current_radius * angle_rad.cos(),
                    center_y + current_radius * angle_rad.sin(),
                    depth,
                )
            })
            .collect();

        Polygon::new(vertices)
    }

    /// `count` overlapping polygons scattered over a square of side `extent`
    /// at random depths.
    pub fn generate_level<R: Rng + ?Sized>(count: usize, extent: f32, rng: &mut R) -> Level {
        let polygons = (0..count)
            .map(|_| {
                let vertices = rng.gen_range(3..=8);
                let radius = rng.gen_range(extent * 0.05..extent * 0.15);
                let x = rng.gen_range(0.0..extent);
                let y = rng.gen_range(0.0..extent);
                let depth = rng.gen_range(-extent..extent);
                Self::generate_convex_polygon(x, y, depth, radius, vertices, rng)
            })
            .collect();
        Level {
            polygons,
            polyhedra: Vec::new(),
        }
    }
}
