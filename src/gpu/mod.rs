// src/gpu/mod.rs

pub mod clip_backend;
pub mod dispatcher;

pub use clip_backend::{GpuClipBackend, CLIPLINES, CLIPLINES_KERNEL};
pub use dispatcher::{kernel_source, read, BufferSpec, ShaderDispatcher};
