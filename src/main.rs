// src/main.rs

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use log::{error, info};

use planar_compress::gpu::GpuClipBackend;
use planar_compress::{
    BackendKind, ClipBackend, CompressError, Compressor, CompressorConfig, CpuClipper, Level, Plane,
    Result,
};

const USAGE: &str = "usage: planar_compress <level.json> [--config cfg.json] [--plane front] \
[--to top --phase 0.5] [--backend cpu|gpu]";

struct Args {
    level: PathBuf,
    config: Option<PathBuf>,
    plane: Plane,
    to: Option<Plane>,
    phase: f32,
    backend: Option<BackendKind>,
}

fn parse_args() -> Result<Args> {
    let mut level = None;
    let mut config = None;
    let mut plane = Plane::Front;
    let mut to = None;
    let mut phase = 1.0;
    let mut backend = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| {
            it.next()
                .ok_or_else(|| CompressError::config(format!("{} needs a value\n{}", flag, USAGE)))
        };
        match arg.as_str() {
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--plane" => plane = value("--plane")?.parse()?,
            "--to" => to = Some(value("--to")?.parse()?),
            "--phase" => {
                let raw = value("--phase")?;
                phase = raw
                    .parse::<f32>()
                    .map_err(|_| CompressError::config(format!("bad phase '{}'", raw)))?;
            }
            "--backend" => {
                backend = Some(match value("--backend")?.as_str() {
                    "cpu" => BackendKind::Cpu,
                    "gpu" => BackendKind::Gpu,
                    other => return Err(CompressError::config(format!("unknown backend '{}'", other))),
                })
            }
            "-h" | "--help" => return Err(CompressError::config(USAGE)),
            path if level.is_none() && !path.starts_with("--") => level = Some(PathBuf::from(path)),
            other => return Err(CompressError::config(format!("unexpected argument '{}'\n{}", other, USAGE))),
        }
    }

    let level = level.ok_or_else(|| CompressError::config(USAGE))?;
    if !(0.0..=1.0).contains(&phase) {
        return Err(CompressError::config(format!("phase {} outside 0..=1", phase)));
    }
    Ok(Args {
        level,
        config,
        plane,
        to,
        phase,
        backend,
    })
}

async fn run() -> Result<()> {
    let args = parse_args()?;
    let mut config = match &args.config {
        Some(path) => CompressorConfig::load(path)?,
        None => CompressorConfig::default(),
    };
    if let Some(backend) = args.backend {
        config.backend = backend;
    }

    let level = Level::load(&args.level)?;
    let polygons = level.all_polygons();
    info!("loaded {} polygons from {}", polygons.len(), args.level.display());

    let view = match args.to {
        Some(to) => Plane::transition(args.plane, to).at(args.phase),
        None => args.plane.transform(),
    };

    let backend: Box<dyn ClipBackend> = match config.backend {
        BackendKind::Cpu => Box::new(CpuClipper),
        BackendKind::Gpu => {
            let bound = u32::try_from(polygons.len())
                .map_err(|_| CompressError::config("too many polygons for one dispatch"))?;
            Box::new(GpuClipBackend::from_config(&config, bound).await?)
        }
    };

    let mut compressor = Compressor::new(polygons, backend, config)?;
    let lines = compressor.compress(&view)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for line in &lines {
        serde_json::to_writer(&mut out, line)?;
        writeln!(out)?;
    }
    info!("wrote {} lines", lines.len());
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("planar_compress: {}", e);
            ExitCode::FAILURE
        }
    }
}
