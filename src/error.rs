// src/error.rs

//! Central error type for compression, buffer packing and GPU dispatch.

/// Errors raised anywhere between level loading and GPU readback.
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("{kind} capacity exceeded: {requested} > {capacity}")]
    Capacity {
        kind: &'static str,
        capacity: usize,
        requested: usize,
    },

    #[error("{kind} count {count} outside 0..={capacity}")]
    InvalidCount {
        kind: &'static str,
        count: i32,
        capacity: usize,
    },

    #[error("{kind} code {code} is not recognised")]
    InvalidCode { kind: &'static str, code: i32 },

    #[error("layout mismatch: {0}")]
    Layout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("buffer readback failed: {0}")]
    BufferAsync(#[from] wgpu::BufferAsyncError),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("no pipeline named {0}")]
    MissingPipeline(String),

    #[error("config error: {0}")]
    Config(String),
}

impl CompressError {
    pub fn capacity(kind: &'static str, capacity: usize, requested: usize) -> Self {
        CompressError::Capacity { kind, capacity, requested }
    }

    pub fn gpu<T: ToString>(msg: T) -> Self {
        CompressError::Gpu(msg.to_string())
    }

    pub fn config<T: ToString>(msg: T) -> Self {
        CompressError::Config(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;
