// src/clipper/mod.rs

pub mod cpu;

pub use cpu::{clip_edge, clip_lines, cut_map, CpuClipper};

use crate::error::Result;
use crate::shader_types::{ClipStatus, GpuEdge, GpuPolygon, Telemetry};

/// Runs the `cliplines` stage: every edge buffer comes back holding its
/// visible pieces, alongside one telemetry record per edge.
pub trait ClipBackend {
    fn name(&self) -> &'static str;

    fn clip(&mut self, polygons: &[GpuPolygon], edges: &mut [GpuEdge]) -> Result<Vec<Telemetry>>;
}

impl<B: ClipBackend + ?Sized> ClipBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn clip(&mut self, polygons: &[GpuPolygon], edges: &mut [GpuEdge]) -> Result<Vec<Telemetry>> {
        (**self).clip(polygons, edges)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ClipSummary {
    pub edges: usize,
    pub visible: usize,
    pub partial: usize,
    pub hidden: usize,
    pub overflow: usize,
    pub intersections: i64,
    pub cuts: i64,
    pub drops: i64,
}

impl ClipSummary {
    pub fn from_telemetry(records: &[Telemetry]) -> Self {
        let mut summary = ClipSummary {
            edges: records.len(),
            ..Default::default()
        };
        for record in records {
            summary.intersections += record.intersections as i64;
            summary.cuts += record.cuts as i64;
            summary.drops += record.drops as i64;
            match record.status() {
                Ok(ClipStatus::Visible) => summary.visible += 1,
                Ok(ClipStatus::Partial) => summary.partial += 1,
                Ok(ClipStatus::Hidden) => summary.hidden += 1,
                Ok(ClipStatus::Overflow) => summary.overflow += 1,
                Ok(ClipStatus::Untouched) | Err(_) => {}
            }
        }
        summary
    }
}
