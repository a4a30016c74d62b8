// src/config.rs

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CompressError, Result};

/// Which `cliplines` implementation the compressor drives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Cpu,
    Gpu,
}

/// Configuration for a [`Compressor`](crate::compression::Compressor)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    /// Largest jitter applied to each vertex coordinate before clipping
    pub disturbance: f32,
    /// Seed for the jitter; `None` draws from the thread RNG
    pub seed: Option<u64>,
    /// Reuse results for views already compressed
    pub cache: bool,
    /// Cache entries kept before the cache is dropped
    pub max_cached_views: usize,
    pub backend: BackendKind,
    /// WGSL kernel replacing the bundled `cliplines` source (GPU backend only)
    pub kernel_path: Option<PathBuf>,
    /// Log every telemetry record at debug level
    pub log_telemetry: bool,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            disturbance: 0.1,
            seed: None,
            cache: true,
            max_cached_views: 256,
            backend: BackendKind::Cpu,
            kernel_path: None,
            log_telemetry: false,
        }
    }
}

impl CompressorConfig {
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let string = std::fs::read_to_string(file)?;
        let config: CompressorConfig = serde_json::from_str(&string)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.disturbance.is_finite() || self.disturbance < 0.0 {
            return Err(CompressError::config(format!(
                "disturbance must be a non-negative number, got {}",
                self.disturbance
            )));
        }
        if self.cache && self.max_cached_views == 0 {
            return Err(CompressError::config("max_cached_views must be at least 1"));
        }
        Ok(())
    }

    /// No jitter and a fixed seed. Results are reproducible across runs.
    pub fn deterministic() -> Self {
        Self {
            disturbance: 0.0,
            seed: Some(0),
            ..Default::default()
        }
    }
}
