// src/lib.rs

pub mod clipper;
pub mod compression;
pub mod config;
pub mod error;
pub mod generator;
pub mod geometry;
pub mod gpu;
pub mod intersection;
pub mod shader_types;
pub mod transform;

pub use clipper::{ClipBackend, ClipSummary, CpuClipper};
pub use compression::Compressor;
pub use config::{BackendKind, CompressorConfig};
pub use error::{CompressError, Result};
pub use geometry::{Level, Line, Polygon};
pub use transform::{Plane, ViewTransform};
