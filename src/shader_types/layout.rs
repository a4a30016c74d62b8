// src/shader_types/layout.rs

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::error::{CompressError, Result};
use crate::geometry::Point2;
use crate::shader_types::capacity::FixedCapacity;

pub const POLYGON_CAPACITY: usize = 20;
pub const EDGE_SEGMENT_CAPACITY: usize = 20;
pub const MARKLINE_CAPACITY: usize = 30;
pub const CUT_CAPACITY: usize = 20;
pub const POLYHEDRON_CAPACITY: usize = 10;
pub const CLIPPER_INTERSECTION_CAPACITY: usize = 20;
pub const CLIPPER_MARK_CAPACITY: usize = 20;

/// Crossing direction carried by a [`Mark`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum MarkCode {
    Exit = -1,
    Enter = 1,
}

impl TryFrom<i32> for MarkCode {
    type Error = CompressError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            -1 => Ok(MarkCode::Exit),
            1 => Ok(MarkCode::Enter),
            _ => Err(CompressError::InvalidCode { kind: "mark", code }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(i32)]
pub enum IntersectionCode {
    Disjoint = 0,
    Crossing = 1,
    Colinear = 2,
}

impl TryFrom<i32> for IntersectionCode {
    type Error = CompressError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(IntersectionCode::Disjoint),
            1 => Ok(IntersectionCode::Crossing),
            2 => Ok(IntersectionCode::Colinear),
            _ => Err(CompressError::InvalidCode { kind: "intersection", code }),
        }
    }
}

/// Outcome of one clip invocation, stored in [`Telemetry::status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum ClipStatus {
    Untouched = 0,
    Visible = 1,
    Partial = 2,
    Hidden = 3,
    Overflow = 4,
}

impl TryFrom<i32> for ClipStatus {
    type Error = CompressError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            0 => Ok(ClipStatus::Untouched),
            1 => Ok(ClipStatus::Visible),
            2 => Ok(ClipStatus::Partial),
            3 => Ok(ClipStatus::Hidden),
            4 => Ok(ClipStatus::Overflow),
            _ => Err(CompressError::InvalidCode { kind: "status", code }),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable, PartialEq)]
pub struct GpuVertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl GpuVertex {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn lerp(&self, other: &GpuVertex, alpha: f32) -> GpuVertex {
        GpuVertex::from(Vec3::from(*self).lerp(Vec3::from(*other), alpha))
    }
}

impl From<Vec3> for GpuVertex {
    fn from(v: Vec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<GpuVertex> for Vec3 {
    fn from(v: GpuVertex) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct GpuPolygon {
    pub vertices: [GpuVertex; POLYGON_CAPACITY],
    pub count: i32,
}

impl Default for GpuPolygon {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl GpuPolygon {
    /// Outline projected onto the view plane.
    pub fn ring(&self) -> impl Iterator<Item = Point2> + Clone + '_ {
        self.as_slice().iter().map(|v| Point2::new(v.x, v.y))
    }
}

/// Parametric boundary crossing along a segment.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable, PartialEq)]
pub struct Mark {
    pub alpha: f32,
    pub code: i32,
}

impl Mark {
    pub fn enter(alpha: f32) -> Self {
        Self { alpha, code: MarkCode::Enter as i32 }
    }

    pub fn exit(alpha: f32) -> Self {
        Self { alpha, code: MarkCode::Exit as i32 }
    }

    pub fn code(&self) -> Result<MarkCode> {
        MarkCode::try_from(self.code)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct MarkLine {
    pub marks: [Mark; MARKLINE_CAPACITY],
    pub count: i32,
}

impl Default for MarkLine {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl MarkLine {
    /// Sorts marks and folds overlapping hidden runs into disjoint
    /// Enter/Exit pairs. Enter sorts before Exit at equal alpha, so runs that
    /// only touch are merged. Marks with unknown codes are discarded and an
    /// unclosed run is closed at 1.0.
    pub fn normalize(&mut self) {
        let n = self.len();
        self.marks[..n].sort_by(|a, b| a.alpha.total_cmp(&b.alpha).then(b.code.cmp(&a.code)));

        let mut depth = 0u32;
        let mut written = 0usize;
        for i in 0..n {
            let mark = self.marks[i];
            match mark.code() {
                Ok(MarkCode::Enter) => {
                    if depth == 0 {
                        self.marks[written] = Mark::enter(mark.alpha);
                        written += 1;
                    }
                    depth += 1;
                }
                Ok(MarkCode::Exit) => {
                    if depth > 0 {
                        depth -= 1;
                        if depth == 0 {
                            self.marks[written] = Mark::exit(mark.alpha);
                            written += 1;
                        }
                    }
                }
                Err(_) => {}
            }
        }
        if depth > 0 && written < MARKLINE_CAPACITY {
            self.marks[written] = Mark::exit(1.0);
            written += 1;
        }
        self.count = written as i32;
    }

    /// Complement of the hidden runs within `[0, 1]`. Expects a normalized line.
    pub fn visible_intervals(&self) -> VisibleIntervals<'_> {
        VisibleIntervals {
            marks: self.as_slice(),
            next: 0,
            cursor: 0.0,
            finished: false,
        }
    }
}

pub struct VisibleIntervals<'a> {
    marks: &'a [Mark],
    next: usize,
    cursor: f32,
    finished: bool,
}

impl Iterator for VisibleIntervals<'_> {
    type Item = (f32, f32);

    fn next(&mut self) -> Option<(f32, f32)> {
        if self.finished {
            return None;
        }
        while self.next < self.marks.len() {
            let enter = self.marks[self.next].alpha.clamp(0.0, 1.0);
            let exit = self
                .marks
                .get(self.next + 1)
                .map_or(1.0, |m| m.alpha.clamp(0.0, 1.0));
            self.next += 2;

            let start = self.cursor;
            self.cursor = self.cursor.max(exit);
            if enter > start {
                return Some((start, enter));
            }
        }
        self.finished = true;
        if self.cursor < 1.0 {
            Some((self.cursor, 1.0))
        } else {
            None
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable, PartialEq)]
pub struct GpuSegment {
    pub origin: GpuVertex,
    pub outpost: GpuVertex,
    pub markline: MarkLine,
}

impl GpuSegment {
    pub fn new(origin: GpuVertex, outpost: GpuVertex) -> Self {
        Self {
            origin,
            outpost,
            markline: MarkLine::default(),
        }
    }

    /// Sub-segment between two parametric positions.
    pub fn slice(&self, from: f32, to: f32) -> GpuSegment {
        GpuSegment::new(self.origin.lerp(&self.outpost, from), self.origin.lerp(&self.outpost, to))
    }
}

/// Ordered segments belonging to one polygon side. Holds segments despite
/// the name: the clip stage splits one side into its visible pieces.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct GpuEdge {
    pub segments: [GpuSegment; EDGE_SEGMENT_CAPACITY],
    pub count: i32,
    pub polygon: u32,
}

impl Default for GpuEdge {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl GpuEdge {
    pub fn single(segment: GpuSegment, polygon: u32) -> Self {
        let mut edge = Self::zeroed();
        edge.segments[0] = segment;
        edge.count = 1;
        edge.polygon = polygon;
        edge
    }
}

/// Diagnostics written by one clip invocation.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct Telemetry {
    pub intersections: i32,
    pub code: i32,
    pub drops: i32,
    pub cuts: i32,
    pub status: i32,
    pub misc: f32,
    pub comp: f32,
    pub point: f32,
    pub markline: MarkLine,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Telemetry {
    pub fn status(&self) -> Result<ClipStatus> {
        ClipStatus::try_from(self.status)
    }

    pub fn set_status(&mut self, status: ClipStatus) {
        self.status = status as i32;
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct GpuPolyhedron {
    pub children: [GpuPolygon; POLYHEDRON_CAPACITY],
    pub count: i32,
}

impl Default for GpuPolyhedron {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable, PartialEq)]
pub struct Cut {
    pub segment: i32,
    pub alpha: f32,
    pub kind: u32,
}

impl Cut {
    /// `entering` marks that the run after this cut lies inside the polygon.
    pub fn new(segment: usize, alpha: f32, entering: bool) -> Self {
        Self {
            segment: segment as i32,
            alpha,
            kind: entering as u32,
        }
    }

    pub fn entering(&self) -> bool {
        self.kind != 0
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct CutMap {
    pub cuts: [Cut; CUT_CAPACITY],
    pub count: i32,
    pub obscured: u32,
}

impl Default for CutMap {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl CutMap {
    pub fn obscured(&self) -> bool {
        self.obscured != 0
    }

    pub fn set_obscured(&mut self, obscured: bool) {
        self.obscured = obscured as u32;
    }

    pub fn sort_by_alpha(&mut self) {
        let n = self.len();
        self.cuts[..n].sort_by(|a, b| a.alpha.total_cmp(&b.alpha));
    }
}

/// Segment/segment test result. `intersection` is the crossing point, or the
/// start of the overlap for a colinear result; `colinear` is the overlap end.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable, PartialEq)]
pub struct Intersection {
    pub code: i32,
    pub _pad0: u32,
    pub intersection: Point2,
    pub colinear: Point2,
}

impl Intersection {
    pub fn disjoint() -> Self {
        Self::zeroed()
    }

    pub fn code(&self) -> Result<IntersectionCode> {
        IntersectionCode::try_from(self.code)
    }
}

/// Scratch space for one clip invocation.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable, PartialEq)]
pub struct ClipperResource {
    pub intersections: [Intersection; CLIPPER_INTERSECTION_CAPACITY],
    pub marks: [Mark; CLIPPER_MARK_CAPACITY],
    pub initial: MarkLine,
    pub result: MarkLine,
    pub scaffold: GpuEdge,
}

impl Default for ClipperResource {
    fn default() -> Self {
        Self::zeroed()
    }
}

const _: () = assert!(std::mem::size_of::<GpuVertex>() == 12);
const _: () = assert!(std::mem::size_of::<GpuPolygon>() == 244);
const _: () = assert!(std::mem::size_of::<Mark>() == 8);
const _: () = assert!(std::mem::size_of::<MarkLine>() == 244);
const _: () = assert!(std::mem::size_of::<GpuSegment>() == 268);
const _: () = assert!(std::mem::size_of::<GpuEdge>() == 5368);
const _: () = assert!(std::mem::size_of::<Telemetry>() == 276);
const _: () = assert!(std::mem::size_of::<GpuPolyhedron>() == 2444);
const _: () = assert!(std::mem::size_of::<Cut>() == 12);
const _: () = assert!(std::mem::size_of::<CutMap>() == 248);
const _: () = assert!(std::mem::size_of::<Intersection>() == 24);
const _: () = assert!(std::mem::align_of::<Intersection>() == 8);
const _: () = assert!(std::mem::size_of::<ClipperResource>() == 6496);
