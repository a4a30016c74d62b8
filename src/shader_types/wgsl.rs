// src/shader_types/wgsl.rs

//! Shader-side view of the shared buffer types.
//!
//! Each shared type lists its fields once, with the WGSL type and the host
//! byte offset. [`prelude`] emits the WGSL declarations every kernel is built
//! against, and [`wgsl_layout`] recomputes where a shader compiler will place
//! each field under WGSL storage layout rules, so the two compilation contexts
//! can be compared field by field.

use std::fmt::Write as _;
use std::mem::offset_of;

use crate::error::{CompressError, Result};
use crate::shader_types::layout::*;

pub const WORKGROUP_SIZE: u32 = 64;

#[derive(Clone, Debug)]
pub enum WgslType {
    F32,
    I32,
    U32,
    Vec2F32,
    Struct {
        name: &'static str,
        layout: fn() -> StructLayout,
    },
    Array {
        element: Box<WgslType>,
        len: usize,
    },
}

impl WgslType {
    pub fn of<T: ShaderStruct>() -> Self {
        WgslType::Struct {
            name: T::NAME,
            layout: wgsl_layout::<T>,
        }
    }

    pub fn array(element: WgslType, len: usize) -> Self {
        WgslType::Array {
            element: Box::new(element),
            len,
        }
    }

    pub fn align(&self) -> usize {
        match self {
            WgslType::F32 | WgslType::I32 | WgslType::U32 => 4,
            WgslType::Vec2F32 => 8,
            WgslType::Struct { layout, .. } => layout().align,
            WgslType::Array { element, .. } => element.align(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            WgslType::F32 | WgslType::I32 | WgslType::U32 => 4,
            WgslType::Vec2F32 => 8,
            WgslType::Struct { layout, .. } => layout().size,
            WgslType::Array { element, len } => len * round_up(element.align(), element.size()),
        }
    }

    pub fn declaration(&self) -> String {
        match self {
            WgslType::F32 => "f32".to_string(),
            WgslType::I32 => "i32".to_string(),
            WgslType::U32 => "u32".to_string(),
            WgslType::Vec2F32 => "vec2<f32>".to_string(),
            WgslType::Struct { name, .. } => name.to_string(),
            WgslType::Array { element, len } => format!("array<{}, {}>", element.declaration(), len),
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldLayout {
    pub name: &'static str,
    pub ty: WgslType,
    pub host_offset: usize,
}

fn field(name: &'static str, ty: WgslType, host_offset: usize) -> FieldLayout {
    FieldLayout { name, ty, host_offset }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructLayout {
    pub name: &'static str,
    pub size: usize,
    pub align: usize,
    pub offsets: Vec<(&'static str, usize)>,
}

/// A `#[repr(C)]` type that is also declared on the shader side.
pub trait ShaderStruct: Sized {
    const NAME: &'static str;

    fn fields() -> Vec<FieldLayout>;

    fn host_layout() -> StructLayout {
        StructLayout {
            name: Self::NAME,
            size: std::mem::size_of::<Self>(),
            align: std::mem::align_of::<Self>(),
            offsets: Self::fields().iter().map(|f| (f.name, f.host_offset)).collect(),
        }
    }

    fn declaration() -> String {
        let mut out = format!("struct {} {{\n", Self::NAME);
        for f in Self::fields() {
            let _ = writeln!(out, "    {}: {},", f.name, f.ty.declaration());
        }
        out.push_str("}\n");
        out
    }
}

fn round_up(align: usize, n: usize) -> usize {
    n.div_ceil(align) * align
}

/// Layout a WGSL compiler assigns to `T` in the storage address space.
pub fn wgsl_layout<T: ShaderStruct>() -> StructLayout {
    let mut cursor = 0;
    let mut align = 1;
    let mut offsets = Vec::new();
    for f in T::fields() {
        let field_align = f.ty.align();
        let offset = round_up(field_align, cursor);
        offsets.push((f.name, offset));
        cursor = offset + f.ty.size();
        align = align.max(field_align);
    }
    StructLayout {
        name: T::NAME,
        size: round_up(align, cursor),
        align,
        offsets,
    }
}

/// Compares the host and shader layouts of `T`.
pub fn check_layout<T: ShaderStruct>() -> Result<()> {
    let host = T::host_layout();
    let shader = wgsl_layout::<T>();
    if host != shader {
        return Err(CompressError::Layout(format!(
            "{}: host {:?} differs from shader {:?}",
            T::NAME,
            host,
            shader
        )));
    }
    Ok(())
}

/// Runs [`check_layout`] over every shared type.
pub fn verify_all() -> Result<()> {
    check_layout::<GpuVertex>()?;
    check_layout::<GpuPolygon>()?;
    check_layout::<Mark>()?;
    check_layout::<MarkLine>()?;
    check_layout::<GpuSegment>()?;
    check_layout::<GpuEdge>()?;
    check_layout::<Telemetry>()?;
    check_layout::<GpuPolyhedron>()?;
    check_layout::<Cut>()?;
    check_layout::<CutMap>()?;
    check_layout::<Intersection>()?;
    check_layout::<ClipperResource>()?;
    Ok(())
}

/// Constants and struct declarations prepended to every kernel.
pub fn prelude() -> String {
    let mut out = String::new();
    let constants: [(&str, usize); 7] = [
        ("POLYGON_CAPACITY", POLYGON_CAPACITY),
        ("EDGE_SEGMENT_CAPACITY", EDGE_SEGMENT_CAPACITY),
        ("MARKLINE_CAPACITY", MARKLINE_CAPACITY),
        ("CUT_CAPACITY", CUT_CAPACITY),
        ("POLYHEDRON_CAPACITY", POLYHEDRON_CAPACITY),
        ("CLIPPER_INTERSECTION_CAPACITY", CLIPPER_INTERSECTION_CAPACITY),
        ("CLIPPER_MARK_CAPACITY", CLIPPER_MARK_CAPACITY),
    ];
    for (name, value) in constants {
        let _ = writeln!(out, "const {}: u32 = {}u;", name, value);
    }
    let _ = writeln!(out, "const WORKGROUP_SIZE: u32 = {}u;", WORKGROUP_SIZE);

    let codes: [(&str, i32); 10] = [
        ("MARK_ENTER", MarkCode::Enter as i32),
        ("MARK_EXIT", MarkCode::Exit as i32),
        ("INTERSECTION_DISJOINT", IntersectionCode::Disjoint as i32),
        ("INTERSECTION_CROSSING", IntersectionCode::Crossing as i32),
        ("INTERSECTION_COLINEAR", IntersectionCode::Colinear as i32),
        ("STATUS_VISIBLE", ClipStatus::Visible as i32),
        ("STATUS_PARTIAL", ClipStatus::Partial as i32),
        ("STATUS_HIDDEN", ClipStatus::Hidden as i32),
        ("STATUS_OVERFLOW", ClipStatus::Overflow as i32),
        ("STATUS_UNTOUCHED", ClipStatus::Untouched as i32),
    ];
    for (name, value) in codes {
        let _ = writeln!(out, "const {}: i32 = {};", name, value);
    }
    out.push('\n');

    for decl in [
        GpuVertex::declaration(),
        GpuPolygon::declaration(),
        Mark::declaration(),
        MarkLine::declaration(),
        GpuSegment::declaration(),
        GpuEdge::declaration(),
        Telemetry::declaration(),
        GpuPolyhedron::declaration(),
        Cut::declaration(),
        CutMap::declaration(),
        Intersection::declaration(),
        ClipperResource::declaration(),
    ] {
        out.push_str(&decl);
        out.push('\n');
    }
    out
}

impl ShaderStruct for GpuVertex {
    const NAME: &'static str = "GpuVertex";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field("x", WgslType::F32, offset_of!(GpuVertex, x)),
            field("y", WgslType::F32, offset_of!(GpuVertex, y)),
            field("z", WgslType::F32, offset_of!(GpuVertex, z)),
        ]
    }
}

impl ShaderStruct for GpuPolygon {
    const NAME: &'static str = "GpuPolygon";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field(
                "vertices",
                WgslType::array(WgslType::of::<GpuVertex>(), POLYGON_CAPACITY),
                offset_of!(GpuPolygon, vertices),
            ),
            field("count", WgslType::I32, offset_of!(GpuPolygon, count)),
        ]
    }
}

impl ShaderStruct for Mark {
    const NAME: &'static str = "Mark";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field("alpha", WgslType::F32, offset_of!(Mark, alpha)),
            field("code", WgslType::I32, offset_of!(Mark, code)),
        ]
    }
}

impl ShaderStruct for MarkLine {
    const NAME: &'static str = "MarkLine";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field(
                "marks",
                WgslType::array(WgslType::of::<Mark>(), MARKLINE_CAPACITY),
                offset_of!(MarkLine, marks),
            ),
            field("count", WgslType::I32, offset_of!(MarkLine, count)),
        ]
    }
}

impl ShaderStruct for GpuSegment {
    const NAME: &'static str = "GpuSegment";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field("origin", WgslType::of::<GpuVertex>(), offset_of!(GpuSegment, origin)),
            field("outpost", WgslType::of::<GpuVertex>(), offset_of!(GpuSegment, outpost)),
            field("markline", WgslType::of::<MarkLine>(), offset_of!(GpuSegment, markline)),
        ]
    }
}

impl ShaderStruct for GpuEdge {
    const NAME: &'static str = "GpuEdge";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field(
                "segments",
                WgslType::array(WgslType::of::<GpuSegment>(), EDGE_SEGMENT_CAPACITY),
                offset_of!(GpuEdge, segments),
            ),
            field("count", WgslType::I32, offset_of!(GpuEdge, count)),
            field("polygon", WgslType::U32, offset_of!(GpuEdge, polygon)),
        ]
    }
}

impl ShaderStruct for Telemetry {
    const NAME: &'static str = "Telemetry";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field("intersections", WgslType::I32, offset_of!(Telemetry, intersections)),
            field("code", WgslType::I32, offset_of!(Telemetry, code)),
            field("drops", WgslType::I32, offset_of!(Telemetry, drops)),
            field("cuts", WgslType::I32, offset_of!(Telemetry, cuts)),
            field("status", WgslType::I32, offset_of!(Telemetry, status)),
            field("misc", WgslType::F32, offset_of!(Telemetry, misc)),
            field("comp", WgslType::F32, offset_of!(Telemetry, comp)),
            field("point", WgslType::F32, offset_of!(Telemetry, point)),
            field("markline", WgslType::of::<MarkLine>(), offset_of!(Telemetry, markline)),
        ]
    }
}

impl ShaderStruct for GpuPolyhedron {
    const NAME: &'static str = "GpuPolyhedron";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field(
                "children",
                WgslType::array(WgslType::of::<GpuPolygon>(), POLYHEDRON_CAPACITY),
                offset_of!(GpuPolyhedron, children),
            ),
            field("count", WgslType::I32, offset_of!(GpuPolyhedron, count)),
        ]
    }
}

impl ShaderStruct for Cut {
    const NAME: &'static str = "Cut";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field("segment", WgslType::I32, offset_of!(Cut, segment)),
            field("alpha", WgslType::F32, offset_of!(Cut, alpha)),
            field("kind", WgslType::U32, offset_of!(Cut, kind)),
        ]
    }
}

impl ShaderStruct for CutMap {
    const NAME: &'static str = "CutMap";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field(
                "cuts",
                WgslType::array(WgslType::of::<Cut>(), CUT_CAPACITY),
                offset_of!(CutMap, cuts),
            ),
            field("count", WgslType::I32, offset_of!(CutMap, count)),
            field("obscured", WgslType::U32, offset_of!(CutMap, obscured)),
        ]
    }
}

impl ShaderStruct for Intersection {
    const NAME: &'static str = "Intersection";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field("code", WgslType::I32, offset_of!(Intersection, code)),
            field("_pad0", WgslType::U32, offset_of!(Intersection, _pad0)),
            field("intersection", WgslType::Vec2F32, offset_of!(Intersection, intersection)),
            field("colinear", WgslType::Vec2F32, offset_of!(Intersection, colinear)),
        ]
    }
}

impl ShaderStruct for ClipperResource {
    const NAME: &'static str = "ClipperResource";

    fn fields() -> Vec<FieldLayout> {
        vec![
            field(
                "intersections",
                WgslType::array(WgslType::of::<Intersection>(), CLIPPER_INTERSECTION_CAPACITY),
                offset_of!(ClipperResource, intersections),
            ),
            field(
                "marks",
                WgslType::array(WgslType::of::<Mark>(), CLIPPER_MARK_CAPACITY),
                offset_of!(ClipperResource, marks),
            ),
            field("initial", WgslType::of::<MarkLine>(), offset_of!(ClipperResource, initial)),
            field("result", WgslType::of::<MarkLine>(), offset_of!(ClipperResource, result)),
            field("scaffold", WgslType::of::<GpuEdge>(), offset_of!(ClipperResource, scaffold)),
        ]
    }
}
