// src/transform.rs

use std::collections::hash_map::DefaultHasher;
use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;
use std::hash::Hasher;
use std::str::FromStr;

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::CompressError;
use crate::geometry::Point2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    Clockwise,
    Counter,
}

/// Orthonormal 3x3 view orientation. The projected drawing is the x/y of the
/// transformed points; z is depth, smaller is nearer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewTransform(pub Mat3);

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: ViewTransform = ViewTransform(Mat3::IDENTITY);

    /// Builds from row-major entries.
    pub fn from_rows(rows: [[f32; 3]; 3]) -> Self {
        ViewTransform(Mat3::from_cols_array_2d(&rows).transpose())
    }

    pub fn apply(&self, v: Vec3) -> Vec3 {
        self.0 * v
    }

    /// Maps a point of the drawing through the upper-left 2x2 block.
    pub fn apply_point(&self, p: Point2) -> Point2 {
        let m = &self.0;
        Point2::new(
            m.x_axis.x * p.x + m.y_axis.x * p.y,
            m.x_axis.y * p.x + m.y_axis.y * p.y,
        )
    }

    /// `self · other`: applies `other` first.
    pub fn then(&self, other: &ViewTransform) -> ViewTransform {
        ViewTransform(self.0 * other.0)
    }

    /// Transpose, which is the inverse of an orthonormal transform.
    pub fn inverted(&self) -> ViewTransform {
        ViewTransform(self.0.transpose())
    }

    /// Rounds every entry to the nearest integer. Snaps a finished quarter
    /// turn back onto the axes.
    pub fn normalized(&self) -> ViewTransform {
        let entries = self.0.to_cols_array().map(|v| v.round() + 0.0);
        ViewTransform(Mat3::from_cols_array(&entries))
    }

    /// Factory for a partial quarter turn about `axis`, applied after `self`.
    /// Phase 1.0 is a full quarter turn.
    pub fn rotate(&self, axis: Axis, reverse: bool) -> impl Fn(f32) -> ViewTransform {
        let base = self.0;
        let quarter = if reverse { -FRAC_PI_2 } else { FRAC_PI_2 };
        move |phase: f32| {
            let theta = phase * quarter;
            let turn = match axis {
                Axis::X => Mat3::from_rotation_x(theta),
                Axis::Y => Mat3::from_rotation_y(theta),
                Axis::Z => Mat3::from_rotation_z(theta),
            };
            ViewTransform(turn * base)
        }
    }

    pub fn slide(&self, direction: Direction) -> impl Fn(f32) -> ViewTransform {
        match direction {
            Direction::Up => self.rotate(Axis::X, false),
            Direction::Down => self.rotate(Axis::X, true),
            Direction::Left => self.rotate(Axis::Y, false),
            Direction::Right => self.rotate(Axis::Y, true),
        }
    }

    pub fn twist(&self, rotation: Rotation) -> impl Fn(f32) -> ViewTransform {
        match rotation {
            Rotation::Clockwise => self.rotate(Axis::Z, true),
            Rotation::Counter => self.rotate(Axis::Z, false),
        }
    }

    /// Lifts a drawing point back into level space, keeping the depth that
    /// `position` has under this view.
    pub fn unfold(&self, point: Point2, position: Vec3) -> Vec3 {
        let depth = self.apply(position).z;
        self.inverted().apply(Vec3::new(point.x, point.y, depth))
    }

    /// Hash of the third column and third row. Views that share a depth axis
    /// get the same key.
    pub fn cache_key(&self) -> u64 {
        let m = &self.0;
        let mut hasher = DefaultHasher::new();
        for v in [m.z_axis.x, m.z_axis.y, m.z_axis.z, m.x_axis.z, m.y_axis.z] {
            hasher.write_u32((v + 0.0).to_bits());
        }
        hasher.finish()
    }

    /// Equal third row and third column: the two views differ only by a
    /// rotation within the drawing plane.
    pub fn shares_view_axis(&self, other: &ViewTransform) -> bool {
        let (a, b) = (&self.0, &other.0);
        a.z_axis == b.z_axis && a.x_axis.z == b.x_axis.z && a.y_axis.z == b.y_axis.z
    }
}

/// One of the six axis-aligned viewing directions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    Top,
    Bottom,
    Front,
    Back,
    Left,
    Right,
}

impl Plane {
    pub const ALL: [Plane; 6] = [
        Plane::Top,
        Plane::Bottom,
        Plane::Front,
        Plane::Back,
        Plane::Left,
        Plane::Right,
    ];

    pub fn transform(&self) -> ViewTransform {
        let rows = match self {
            Plane::Top => [[1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, -1.0, 0.0]],
            Plane::Bottom => [[1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]],
            Plane::Front => [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            Plane::Back => [[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, -1.0]],
            Plane::Left => [[0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]],
            Plane::Right => [[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [-1.0, 0.0, 0.0]],
        };
        ViewTransform::from_rows(rows)
    }

    pub fn compress(&self, v: Vec3) -> Vec3 {
        self.transform().apply(v)
    }

    pub fn unfold(&self, point: Point2, position: Vec3) -> Vec3 {
        self.transform().unfold(point, position)
    }

    /// Turn applied to the destination view so that a transition between
    /// two planes rotates the drawing the short way round.
    fn turn(from: Plane, to: Plane) -> Turn {
        use Plane::*;
        match (to, from) {
            (Top, Left) => Turn::Clockwise,
            (Top, Right) => Turn::Counter,
            (Top, Back) => Turn::Flip,
            (Bottom, Left) => Turn::Counter,
            (Bottom, Right) => Turn::Clockwise,
            (Bottom, Back) => Turn::Flip,
            (Left, Top) | (Right, Top) => Turn::Counter,
            (Left, Bottom) | (Right, Bottom) => Turn::Clockwise,
            (Back, Top) | (Back, Bottom) => Turn::Flip,
            _ => Turn::None,
        }
    }

    pub fn transition(from: Plane, to: Plane) -> Transition {
        let turn = Plane::turn(from, to);
        Transition {
            from: from.transform(),
            to: ViewTransform(turn.matrix() * to.transform().0),
            rotation: turn.angle(),
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Plane::Top => "top",
            Plane::Bottom => "bottom",
            Plane::Front => "front",
            Plane::Back => "back",
            Plane::Left => "left",
            Plane::Right => "right",
        };
        f.write_str(name)
    }
}

impl FromStr for Plane {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Plane::ALL
            .into_iter()
            .find(|plane| plane.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| CompressError::config(format!("unknown plane '{}'", s)))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Turn {
    None,
    Counter,
    Clockwise,
    Flip,
}

impl Turn {
    fn matrix(&self) -> Mat3 {
        let rows = match self {
            Turn::None => return Mat3::IDENTITY,
            Turn::Counter => [[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            Turn::Clockwise => [[0.0, 1.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
            Turn::Flip => [[-1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, 1.0]],
        };
        ViewTransform::from_rows(rows).0
    }

    fn angle(&self) -> f32 {
        match self {
            Turn::None => 0.0,
            Turn::Counter => -FRAC_PI_2,
            Turn::Clockwise => FRAC_PI_2,
            Turn::Flip => PI,
        }
    }
}

/// Blend between two plane views. The end view carries the in-plane turn the
/// pair needs, reported as `rotation` in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
    pub from: ViewTransform,
    pub to: ViewTransform,
    pub rotation: f32,
}

impl Transition {
    /// `cos(πφ/2)·from + sin(πφ/2)·to`.
    pub fn at(&self, phase: f32) -> ViewTransform {
        let angle = phase * FRAC_PI_2;
        ViewTransform(self.from.0 * angle.cos() + self.to.0 * angle.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn plane_compress_matches_axis_swaps() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(Plane::Top.compress(v), Vec3::new(1.0, 3.0, -2.0));
        assert_eq!(Plane::Bottom.compress(v), Vec3::new(1.0, -3.0, 2.0));
        assert_eq!(Plane::Left.compress(v), Vec3::new(-3.0, 2.0, 1.0));
        assert_eq!(Plane::Right.compress(v), Vec3::new(3.0, 2.0, -1.0));
        assert_eq!(Plane::Back.compress(v), Vec3::new(-1.0, 2.0, -3.0));
        assert_eq!(Plane::Front.compress(v), v);
    }

    #[test]
    fn unfold_inverts_compress_with_kept_depth() {
        let position = Vec3::new(4.0, -5.0, 6.0);
        let point = Point2::new(1.0, 2.0);
        assert_eq!(Plane::Top.unfold(point, position), Vec3::new(1.0, -5.0, 2.0));
        assert_eq!(Plane::Left.unfold(point, position), Vec3::new(4.0, 2.0, -1.0));
        assert_eq!(Plane::Back.unfold(point, position), Vec3::new(-1.0, 2.0, 6.0));
        for plane in Plane::ALL {
            let v = Vec3::new(1.5, -2.0, 0.5);
            let flat = plane.compress(v);
            assert_eq!(plane.unfold(Point2::new(flat.x, flat.y), v), v);
        }
    }

    #[test]
    fn full_slide_lands_on_neighbouring_plane() {
        let up = ViewTransform::IDENTITY.slide(Direction::Up)(1.0).normalized();
        assert_eq!(up, Plane::Bottom.transform());
        let left = ViewTransform::IDENTITY.slide(Direction::Left)(1.0).normalized();
        assert_eq!(left, Plane::Right.transform());
        let none = ViewTransform::IDENTITY.twist(Rotation::Counter)(0.0);
        assert_eq!(none, ViewTransform::IDENTITY);
    }

    #[test]
    fn inverse_is_transpose() {
        let t = ViewTransform::IDENTITY.slide(Direction::Right)(0.3);
        let product = t.then(&t.inverted());
        for (a, b) in product.0.to_cols_array().iter().zip(Mat3::IDENTITY.to_cols_array()) {
            assert_relative_eq!(*a, b, epsilon = 1e-6);
        }
    }

    #[test]
    fn twisted_views_share_axis_and_cache_key() {
        let base = Plane::Front.transform();
        let twisted = base.twist(Rotation::Clockwise)(1.0).normalized();
        assert!(base.shares_view_axis(&twisted));
        assert_eq!(base.cache_key(), twisted.cache_key());
        assert_ne!(base, twisted);

        let top = Plane::Top.transform();
        assert!(!base.shares_view_axis(&top));
        assert_ne!(base.cache_key(), top.cache_key());
    }

    #[test]
    fn apply_point_uses_upper_left_block() {
        let quarter = ViewTransform::from_rows([[0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(quarter.apply_point(Point2::new(1.0, 0.0)), Point2::new(0.0, 1.0));
    }

    #[test]
    fn transition_blends_between_plane_views() {
        let transition = Plane::transition(Plane::Left, Plane::Top);
        assert_relative_eq!(transition.rotation, FRAC_PI_2);
        assert_eq!(transition.at(0.0), Plane::Left.transform());

        let end = transition.at(1.0).normalized();
        let v = Vec3::new(1.0, 2.0, 3.0);
        let top = Plane::Top.compress(v);
        assert_eq!(end.apply(v), Vec3::new(top.y, -top.x, top.z));

        let straight = Plane::transition(Plane::Front, Plane::Right);
        assert_eq!(straight.rotation, 0.0);
        assert_eq!(straight.at(1.0).normalized(), Plane::Right.transform());
    }

    #[test]
    fn planes_parse_case_insensitively() {
        assert_eq!("Front".parse::<Plane>().unwrap(), Plane::Front);
        assert!("sideways".parse::<Plane>().is_err());
        let json = serde_json::to_string(&Plane::Bottom).unwrap();
        assert_eq!(json, "\"bottom\"");
    }

    #[test]
    fn serde_keeps_column_major_entries() {
        let t = Plane::Top.transform();
        let json = serde_json::to_string(&t).unwrap();
        let back: ViewTransform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
