// src/shader_types/mod.rs

pub mod capacity;
pub mod layout;
pub mod wgsl;

pub use capacity::FixedCapacity;
pub use layout::{
    ClipStatus, ClipperResource, Cut, CutMap, GpuEdge, GpuPolygon, GpuPolyhedron, GpuSegment,
    GpuVertex, Intersection, IntersectionCode, Mark, MarkCode, MarkLine, Telemetry,
    CLIPPER_INTERSECTION_CAPACITY, CLIPPER_MARK_CAPACITY, CUT_CAPACITY, EDGE_SEGMENT_CAPACITY,
    MARKLINE_CAPACITY, POLYGON_CAPACITY, POLYHEDRON_CAPACITY,
};
pub use wgsl::{prelude, verify_all, ShaderStruct, WORKGROUP_SIZE};
