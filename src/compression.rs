// src/compression.rs

use std::collections::HashMap;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::clipper::{ClipBackend, ClipSummary};
use crate::config::CompressorConfig;
use crate::error::{CompressError, Result};
use crate::geometry::{Line, Polygon};
use crate::shader_types::{FixedCapacity, GpuEdge, GpuPolygon, POLYGON_CAPACITY};
use crate::transform::ViewTransform;

struct CachedView {
    transform: ViewTransform,
    lines: Vec<Line>,
}

/// Flattens a level into the lines visible from a view.
pub struct Compressor<B: ClipBackend> {
    polygons: Vec<Polygon>,
    backend: B,
    config: CompressorConfig,
    cache: HashMap<u64, Vec<CachedView>>,
    cached_views: usize,
    last_summary: Option<ClipSummary>,
}

impl<B: ClipBackend> Compressor<B> {
    pub fn new(polygons: Vec<Polygon>, backend: B, config: CompressorConfig) -> Result<Self> {
        config.validate()?;
        for polygon in &polygons {
            if polygon.vertices.len() > POLYGON_CAPACITY {
                return Err(CompressError::capacity(
                    "polygon",
                    POLYGON_CAPACITY,
                    polygon.vertices.len(),
                ));
            }
        }

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let polygons: Vec<Polygon> = polygons
            .iter()
            .map(|p| p.disturbed(config.disturbance, &mut rng))
            .collect();

        info!(
            "compressor ready: {} polygons, {} backend, disturbance {}",
            polygons.len(),
            backend.name(),
            config.disturbance
        );

        Ok(Self {
            polygons,
            backend,
            config,
            cache: HashMap::new(),
            cached_views: 0,
            last_summary: None,
        })
    }

    /// Polygons after jitter, in level space.
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &CompressorConfig {
        &self.config
    }

    /// Summary of the last view that went through the backend.
    pub fn last_summary(&self) -> Option<&ClipSummary> {
        self.last_summary.as_ref()
    }

    pub fn cached_views(&self) -> usize {
        self.cached_views
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.cached_views = 0;
    }

    pub fn compress(&mut self, transform: &ViewTransform) -> Result<Vec<Line>> {
        let key = transform.cache_key();

        if self.config.cache {
            if let Some(bucket) = self.cache.get(&key) {
                if let Some(hit) = bucket.iter().find(|view| view.transform == *transform) {
                    debug!("cache hit for view {:016x}", key);
                    return Ok(hit.lines.clone());
                }
                let rotated = bucket.iter().find(|view| view.transform.shares_view_axis(transform));
                if let Some(near) = rotated {
                    let remap = transform.then(&near.transform.inverted());
                    let lines: Vec<Line> = near.lines.iter().map(|line| line.transformed(&remap)).collect();
                    debug!("re-mapped {} cached lines for view {:016x}", lines.len(), key);
                    self.store(key, *transform, lines.clone());
                    return Ok(lines);
                }
            }
        }

        let lines = self.compute(transform)?;
        if self.config.cache {
            self.store(key, *transform, lines.clone());
        }
        Ok(lines)
    }

    fn compute(&mut self, transform: &ViewTransform) -> Result<Vec<Line>> {
        let view: Vec<Polygon> = self.polygons.iter().map(|p| p.transformed(transform)).collect();
        let hardened = view.iter().map(Polygon::harden).collect::<Result<Vec<GpuPolygon>>>()?;
        let mut edges: Vec<GpuEdge> = view
            .iter()
            .enumerate()
            .flat_map(|(id, polygon)| polygon.hard_edges(id as u32))
            .collect();

        let telemetry = self.backend.clip(&hardened, &mut edges)?;
        if self.config.log_telemetry {
            for (index, record) in telemetry.iter().enumerate() {
                debug!(
                    "edge {}: status {} intersections {} cuts {} drops {} hidden runs {}",
                    index,
                    record.status,
                    record.intersections,
                    record.cuts,
                    record.drops,
                    record.markline.len() / 2
                );
            }
        }

        let summary = ClipSummary::from_telemetry(&telemetry);
        if summary.drops > 0 {
            warn!(
                "{} of {} edges dropped hidden runs; output may show covered lines",
                summary.overflow, summary.edges
            );
        }
        info!(
            "compressed {} edges: {} visible, {} partial, {} hidden",
            summary.edges, summary.visible, summary.partial, summary.hidden
        );
        self.last_summary = Some(summary);

        Ok(edges
            .iter()
            .flat_map(|edge| edge.as_slice().iter().map(Line::from))
            .collect())
    }

    fn store(&mut self, key: u64, transform: ViewTransform, lines: Vec<Line>) {
        if self.cached_views >= self.config.max_cached_views {
            debug!("view cache full at {} entries, clearing", self.cached_views);
            self.clear_cache();
        }
        self.cache
            .entry(key)
            .or_default()
            .push(CachedView { transform, lines });
        self.cached_views += 1;
    }
}
