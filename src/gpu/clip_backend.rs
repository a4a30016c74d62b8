// src/gpu/clip_backend.rs

use log::debug;

use crate::clipper::ClipBackend;
use crate::config::CompressorConfig;
use crate::error::{CompressError, Result};
use crate::gpu::dispatcher::{read, BufferSpec, ShaderDispatcher};
use crate::shader_types::{ClipperResource, FixedCapacity, GpuEdge, GpuPolygon, Telemetry};

/// Entry point and pipeline name of the clip kernel.
pub const CLIPLINES: &str = "cliplines";
pub const CLIPLINES_KERNEL: &str = include_str!("../../shaders/cliplines.wgsl");

const POLYGON_BINDING: u32 = 0;
const EDGE_BINDING: u32 = 1;
const RESOURCE_BINDING: u32 = 2;
const TELEMETRY_BINDING: u32 = 3;

/// Runs `cliplines` on the GPU, one invocation per edge buffer.
pub struct GpuClipBackend {
    dispatcher: ShaderDispatcher,
    bound: u32,
}

impl GpuClipBackend {
    /// `bound` is the largest polygon count this backend will be asked to clip.
    pub async fn new(dispatcher: ShaderDispatcher, bound: u32) -> Result<Self> {
        Self::with_kernel(dispatcher, CLIPLINES_KERNEL, bound).await
    }

    pub async fn with_kernel(mut dispatcher: ShaderDispatcher, kernel: &str, bound: u32) -> Result<Self> {
        dispatcher.build_pipeline(CLIPLINES, kernel, bound).await?;
        Ok(Self { dispatcher, bound })
    }

    /// Creates a device and builds either the bundled kernel or the one at
    /// `config.kernel_path`.
    pub async fn from_config(config: &CompressorConfig, bound: u32) -> Result<Self> {
        let kernel = match &config.kernel_path {
            Some(path) => std::fs::read_to_string(path)?,
            None => CLIPLINES_KERNEL.to_string(),
        };
        let dispatcher = ShaderDispatcher::new().await?;
        Self::with_kernel(dispatcher, &kernel, bound).await
    }

    pub fn bound(&self) -> u32 {
        self.bound
    }
}

impl ClipBackend for GpuClipBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn clip(&mut self, polygons: &[GpuPolygon], edges: &mut [GpuEdge]) -> Result<Vec<Telemetry>> {
        if edges.is_empty() {
            return Ok(Vec::new());
        }
        if polygons.len() > self.bound as usize {
            return Err(CompressError::gpu(format!(
                "{} polygons exceed the pipeline bound of {}",
                polygons.len(),
                self.bound
            )));
        }
        let threads = u32::try_from(edges.len())
            .map_err(|_| CompressError::gpu("edge count does not fit a dispatch"))?;

        let specs = [
            BufferSpec::from_slice("polygons", POLYGON_BINDING, polygons),
            BufferSpec::from_slice("edges", EDGE_BINDING, edges).read_back(),
            BufferSpec::zeroed::<ClipperResource>("resources", RESOURCE_BINDING, edges.len()),
            BufferSpec::zeroed::<Telemetry>("telemetry", TELEMETRY_BINDING, edges.len()).read_back(),
        ];
        let mut output = self.dispatcher.execute(CLIPLINES, threads, &specs)?;

        let edge_bytes = output
            .remove(&EDGE_BINDING)
            .ok_or_else(|| CompressError::gpu("edge buffer was not read back"))?;
        let telemetry_bytes = output
            .remove(&TELEMETRY_BINDING)
            .ok_or_else(|| CompressError::gpu("telemetry buffer was not read back"))?;
        let returned: Vec<GpuEdge> = read(&edge_bytes)?;
        let mut telemetry: Vec<Telemetry> = read(&telemetry_bytes)?;
        if returned.len() < edges.len() || telemetry.len() < edges.len() {
            return Err(CompressError::gpu("read-back buffers are shorter than the edge list"));
        }

        for (slot, edge) in edges.iter_mut().zip(&returned) {
            edge.validate()?;
            *slot = *edge;
        }
        telemetry.truncate(edges.len());
        for record in &telemetry {
            record.markline.validate()?;
            record.status()?;
        }
        debug!("gpu clipped {} edges against {} polygons", edges.len(), polygons.len());
        Ok(telemetry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipper::{ClipSummary, CpuClipper};
    use crate::geometry::Polygon;
    use glam::Vec3;

    fn scene() -> Vec<Polygon> {
        vec![
            Polygon::new(vec![
                Vec3::new(0.0, 0.0, 10.0),
                Vec3::new(4.0, 0.0, 10.0),
                Vec3::new(4.0, 4.0, 10.0),
                Vec3::new(0.0, 4.0, 10.0),
            ]),
            Polygon::new(vec![
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(5.0, 1.0, 0.0),
                Vec3::new(5.0, 3.0, 0.0),
                Vec3::new(1.0, 3.0, 0.0),
            ]),
        ]
    }

    #[test]
    fn bundled_kernel_uses_the_prelude_names() {
        for name in ["GpuPolygon", "GpuEdge", "ClipperResource", "Telemetry", "BOUND", "WORKGROUP_SIZE"] {
            assert!(CLIPLINES_KERNEL.contains(name), "kernel never mentions {}", name);
        }
        assert!(CLIPLINES_KERNEL.contains("fn cliplines("));
    }

    #[tokio::test]
    #[ignore = "needs a GPU adapter"]
    async fn gpu_matches_cpu_reference() {
        let dispatcher = ShaderDispatcher::new().await.unwrap();
        let mut gpu = GpuClipBackend::new(dispatcher, 8).await.unwrap();

        let polygons: Vec<GpuPolygon> = scene().iter().map(|p| p.harden().unwrap()).collect();
        let mut cpu_edges: Vec<GpuEdge> = scene()
            .iter()
            .enumerate()
            .flat_map(|(id, p)| p.hard_edges(id as u32))
            .collect();
        let mut gpu_edges = cpu_edges.clone();

        let cpu = CpuClipper.clip(&polygons, &mut cpu_edges).unwrap();
        let from_gpu = gpu.clip(&polygons, &mut gpu_edges).unwrap();

        assert_eq!(ClipSummary::from_telemetry(&cpu), ClipSummary::from_telemetry(&from_gpu));
        for (a, b) in cpu_edges.iter().zip(&gpu_edges) {
            assert_eq!(a.count, b.count);
        }
    }

    #[tokio::test]
    #[ignore = "needs a GPU adapter"]
    async fn too_many_polygons_are_rejected() {
        let dispatcher = ShaderDispatcher::new().await.unwrap();
        let mut gpu = GpuClipBackend::new(dispatcher, 1).await.unwrap();
        let polygons: Vec<GpuPolygon> = scene().iter().map(|p| p.harden().unwrap()).collect();
        let mut edges = scene()[0].hard_edges(0);
        assert!(gpu.clip(&polygons, &mut edges).is_err());
    }
}
