// src/shader_types/capacity.rs

use crate::error::{CompressError, Result};
use crate::shader_types::layout::{
    Cut, CutMap, GpuEdge, GpuPolygon, GpuPolyhedron, GpuSegment, GpuVertex, Mark, MarkLine,
    CUT_CAPACITY, EDGE_SEGMENT_CAPACITY, MARKLINE_CAPACITY, POLYGON_CAPACITY, POLYHEDRON_CAPACITY,
};

/// Inline array plus a separate `count`, as laid out in the shared buffers.
///
/// The count is an `i32` written by either side of the boundary, so readers
/// clamp it into `0..=CAPACITY` and writers go through [`FixedCapacity::push`].
pub trait FixedCapacity {
    type Item: Copy;
    const CAPACITY: usize;
    const KIND: &'static str;

    fn slots(&self) -> &[Self::Item];
    fn slots_mut(&mut self) -> &mut [Self::Item];
    fn raw_count(&self) -> i32;
    fn set_raw_count(&mut self, count: i32);

    fn len(&self) -> usize {
        self.raw_count().clamp(0, Self::CAPACITY as i32) as usize
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_full(&self) -> bool {
        self.len() >= Self::CAPACITY
    }

    fn as_slice(&self) -> &[Self::Item] {
        let n = self.len();
        &self.slots()[..n]
    }

    fn push(&mut self, item: Self::Item) -> Result<()> {
        let n = self.len();
        if n >= Self::CAPACITY {
            return Err(CompressError::capacity(Self::KIND, Self::CAPACITY, n + 1));
        }
        self.slots_mut()[n] = item;
        self.set_raw_count(n as i32 + 1);
        Ok(())
    }

    fn clear(&mut self) {
        self.set_raw_count(0);
    }

    fn fill_from(&mut self, items: &[Self::Item]) -> Result<()> {
        if items.len() > Self::CAPACITY {
            return Err(CompressError::capacity(Self::KIND, Self::CAPACITY, items.len()));
        }
        self.slots_mut()[..items.len()].copy_from_slice(items);
        self.set_raw_count(items.len() as i32);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let count = self.raw_count();
        if count < 0 || count as usize > Self::CAPACITY {
            return Err(CompressError::InvalidCount {
                kind: Self::KIND,
                count,
                capacity: Self::CAPACITY,
            });
        }
        Ok(())
    }
}

impl FixedCapacity for GpuPolygon {
    type Item = GpuVertex;
    const CAPACITY: usize = POLYGON_CAPACITY;
    const KIND: &'static str = "polygon";

    fn slots(&self) -> &[GpuVertex] {
        &self.vertices
    }
    fn slots_mut(&mut self) -> &mut [GpuVertex] {
        &mut self.vertices
    }
    fn raw_count(&self) -> i32 {
        self.count
    }
    fn set_raw_count(&mut self, count: i32) {
        self.count = count;
    }
}

impl FixedCapacity for MarkLine {
    type Item = Mark;
    const CAPACITY: usize = MARKLINE_CAPACITY;
    const KIND: &'static str = "markline";

    fn slots(&self) -> &[Mark] {
        &self.marks
    }
    fn slots_mut(&mut self) -> &mut [Mark] {
        &mut self.marks
    }
    fn raw_count(&self) -> i32 {
        self.count
    }
    fn set_raw_count(&mut self, count: i32) {
        self.count = count;
    }
}

impl FixedCapacity for GpuEdge {
    type Item = GpuSegment;
    const CAPACITY: usize = EDGE_SEGMENT_CAPACITY;
    const KIND: &'static str = "edge";

    fn slots(&self) -> &[GpuSegment] {
        &self.segments
    }
    fn slots_mut(&mut self) -> &mut [GpuSegment] {
        &mut self.segments
    }
    fn raw_count(&self) -> i32 {
        self.count
    }
    fn set_raw_count(&mut self, count: i32) {
        self.count = count;
    }

    fn validate(&self) -> Result<()> {
        if self.count < 0 || self.count as usize > Self::CAPACITY {
            return Err(CompressError::InvalidCount {
                kind: Self::KIND,
                count: self.count,
                capacity: Self::CAPACITY,
            });
        }
        for segment in self.as_slice() {
            segment.markline.validate()?;
        }
        Ok(())
    }
}

impl FixedCapacity for GpuPolyhedron {
    type Item = GpuPolygon;
    const CAPACITY: usize = POLYHEDRON_CAPACITY;
    const KIND: &'static str = "polyhedron";

    fn slots(&self) -> &[GpuPolygon] {
        &self.children
    }
    fn slots_mut(&mut self) -> &mut [GpuPolygon] {
        &mut self.children
    }
    fn raw_count(&self) -> i32 {
        self.count
    }
    fn set_raw_count(&mut self, count: i32) {
        self.count = count;
    }
}

impl FixedCapacity for CutMap {
    type Item = Cut;
    const CAPACITY: usize = CUT_CAPACITY;
    const KIND: &'static str = "cut map";

    fn slots(&self) -> &[Cut] {
        &self.cuts
    }
    fn slots_mut(&mut self) -> &mut [Cut] {
        &mut self.cuts
    }
    fn raw_count(&self) -> i32 {
        self.count
    }
    fn set_raw_count(&mut self, count: i32) {
        self.count = count;
    }
}
