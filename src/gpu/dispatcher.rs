// src/gpu/dispatcher.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytemuck::Pod;
use log::{debug, error, info};
use wgpu::util::DeviceExt;

use crate::error::{CompressError, Result};
use crate::shader_types::{prelude, verify_all, WORKGROUP_SIZE};

/// One storage binding of a dispatch.
#[derive(Clone, Debug)]
pub struct BufferSpec {
    pub label: String,
    pub binding: u32,
    pub bytes: Vec<u8>,
    pub stride: usize,
    pub count: usize,
    pub read_back: bool,
}

impl BufferSpec {
    /// Empty slices are padded to one zeroed element; wgpu rejects
    /// zero-sized bindings.
    pub fn from_slice<T: Pod>(label: &str, binding: u32, data: &[T]) -> Self {
        let stride = std::mem::size_of::<T>();
        let bytes = if data.is_empty() {
            vec![0u8; stride]
        } else {
            bytemuck::cast_slice(data).to_vec()
        };
        Self {
            label: label.to_string(),
            binding,
            bytes,
            stride,
            count: data.len(),
            read_back: false,
        }
    }

    pub fn zeroed<T: Pod>(label: &str, binding: u32, count: usize) -> Self {
        let stride = std::mem::size_of::<T>();
        Self {
            label: label.to_string(),
            binding,
            bytes: vec![0u8; stride * count.max(1)],
            stride,
            count,
            read_back: false,
        }
    }

    pub fn read_back(mut self) -> Self {
        self.read_back = true;
        self
    }

    pub fn size(&self) -> wgpu::BufferAddress {
        self.bytes.len() as wgpu::BufferAddress
    }
}

/// Copies read-back bytes into typed values.
pub fn read<T: Pod>(bytes: &[u8]) -> Result<Vec<T>> {
    let stride = std::mem::size_of::<T>();
    if stride == 0 || bytes.len() % stride != 0 {
        return Err(CompressError::gpu(format!(
            "{} bytes is not a whole number of {}-byte elements",
            bytes.len(),
            stride
        )));
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

/// Full WGSL handed to the compiler: the prelude, a `BOUND` constant, then
/// the kernel.
pub fn kernel_source(kernel: &str, bound: u32) -> String {
    format!("{}\nconst BOUND: u32 = {}u;\n\n{}", prelude(), bound, kernel)
}

/// Owns a wgpu device and the compute pipelines built on the shared prelude.
pub struct ShaderDispatcher {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipelines: HashMap<String, wgpu::ComputePipeline>,
    uncaptured: Arc<Mutex<Option<String>>>,
}

impl ShaderDispatcher {
    pub async fn new() -> Result<Self> {
        verify_all()?;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(CompressError::NoAdapter)?;
        info!("using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    label: Some("planar_compress device"),
                },
                None,
            )
            .await?;

        let uncaptured = Arc::new(Mutex::new(None));
        let slot = uncaptured.clone();
        device.on_uncaptured_error(Box::new(move |err| {
            error!("wgpu: {}", err);
            if let Ok(mut guard) = slot.lock() {
                *guard = Some(err.to_string());
            }
        }));

        Ok(Self {
            device,
            queue,
            pipelines: HashMap::new(),
            uncaptured,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn has_pipeline(&self, name: &str) -> bool {
        self.pipelines.contains_key(name)
    }

    /// Compiles `kernel` after the prelude and a `BOUND` constant. `name` is
    /// both the pipeline key and the kernel's entry point.
    pub async fn build_pipeline(&mut self, name: &str, kernel: &str, bound: u32) -> Result<()> {
        let source = kernel_source(kernel, bound);

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(name),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(name),
            layout: None,
            module: &module,
            entry_point: name,
        });
        if let Some(err) = self.device.pop_error_scope().await {
            return Err(CompressError::gpu(format!("pipeline {}: {}", name, err)));
        }

        debug!("built pipeline {} with bound {}", name, bound);
        self.pipelines.insert(name.to_string(), pipeline);
        Ok(())
    }

    /// Runs `threads` invocations of pipeline `name` over `specs` and returns
    /// the bytes of every binding flagged for read-back.
    pub fn execute(&self, name: &str, threads: u32, specs: &[BufferSpec]) -> Result<HashMap<u32, Vec<u8>>> {
        let pipeline = self
            .pipelines
            .get(name)
            .ok_or_else(|| CompressError::MissingPipeline(name.to_string()))?;

        let groups = threads.div_ceil(WORKGROUP_SIZE);
        let limit = self.device.limits().max_compute_workgroups_per_dimension;
        if groups > limit {
            return Err(CompressError::gpu(format!(
                "{} workgroups exceed the device limit of {}",
                groups, limit
            )));
        }

        let buffers: Vec<wgpu::Buffer> = specs
            .iter()
            .map(|spec| {
                self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(spec.label.as_str()),
                    contents: &spec.bytes,
                    usage: wgpu::BufferUsages::STORAGE
                        | wgpu::BufferUsages::COPY_SRC
                        | wgpu::BufferUsages::COPY_DST,
                })
            })
            .collect();

        let layout = pipeline.get_bind_group_layout(0);
        let entries: Vec<wgpu::BindGroupEntry> = specs
            .iter()
            .zip(&buffers)
            .map(|(spec, buffer)| wgpu::BindGroupEntry {
                binding: spec.binding,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(name),
            layout: &layout,
            entries: &entries,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(name),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(name),
                ..Default::default()
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }

        let staging: Vec<(u32, wgpu::Buffer)> = specs
            .iter()
            .zip(&buffers)
            .filter(|(spec, _)| spec.read_back)
            .map(|(spec, buffer)| {
                let target = self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(spec.label.as_str()),
                    size: spec.size(),
                    usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                    mapped_at_creation: false,
                });
                encoder.copy_buffer_to_buffer(buffer, 0, &target, 0, spec.size());
                (spec.binding, target)
            })
            .collect();

        self.queue.submit(Some(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);

        let mut output = HashMap::new();
        for (binding, buffer) in staging {
            let slice = buffer.slice(..);
            let (tx, rx) = std::sync::mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |res| {
                let _ = tx.send(res);
            });
            self.device.poll(wgpu::Maintain::Wait);
            rx.recv()
                .map_err(|_| CompressError::gpu("map_async channel closed"))??;
            let data = slice.get_mapped_range().to_vec();
            buffer.unmap();
            output.insert(binding, data);
        }

        if let Some(message) = self.uncaptured.lock().ok().and_then(|mut guard| guard.take()) {
            return Err(CompressError::gpu(message));
        }
        debug!("dispatched {} workgroups of {}", groups, name);
        Ok(output)
    }
}
