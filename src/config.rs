// src/config.rs
//
// Executor configuration (backend, thread pool, axis order, scratch caching,
// timing) and the run record the driver writes next to its outputs.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConvError, Result};
use crate::tensor_setup::AxisOrder;

/// Which kernel family an executor binds to at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Sequential loops and serial FFT rows.
    #[default]
    Cpu,
    /// Per-element data-parallel kernels and parallel FFT rows, run on host
    /// threads. This is the data-parallel device form; no GPU device is driven.
    Parallel,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Cpu => "cpu",
            Backend::Parallel => "parallel",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Backend::Cpu),
            "parallel" => Ok(Backend::Parallel),
            "gpu" | "cuda" | "wgpu" => Err(ConvError::Backend(format!(
                "no GPU device available for backend '{}'; use 'parallel' for the data-parallel kernels",
                s.trim()
            ))),
            other => Err(ConvError::Config(format!(
                "unknown backend '{}' (expected cpu or parallel)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvolutionConfig {
    pub backend: Backend,
    /// Worker count of a dedicated pool for the parallel backend; `None` uses
    /// the global rayon pool. Setting it with the cpu backend is rejected.
    pub threads: Option<usize>,
    /// `None` picks the cheapest order the grid allows.
    pub axis_order: Option<AxisOrder>,
    /// Keep padded scratch alive between calls.
    pub cache_scratch: bool,
    pub timing: bool,
}

impl Default for ConvolutionConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Cpu,
            threads: None,
            axis_order: None,
            cache_scratch: true,
            timing: false,
        }
    }
}

pub const ENV_BACKEND: &str = "DEMAG_CONV_BACKEND";
pub const ENV_THREADS: &str = "DEMAG_CONV_THREADS";
pub const ENV_AXIS_ORDER: &str = "DEMAG_CONV_AXIS_ORDER";
pub const ENV_CACHE_SCRATCH: &str = "DEMAG_CONV_CACHE_SCRATCH";
pub const ENV_TIMING: &str = "DEMAG_CONV_TIMING";

fn parse_flag(key: &str, v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConvError::Config(format!("{}: not a flag: '{}'", key, other))),
    }
}

pub fn parse_axis_order(s: &str) -> Result<Option<AxisOrder>> {
    match s.trim().to_ascii_lowercase().as_str() {
        "auto" => Ok(None),
        "zxy" => Ok(Some(AxisOrder::Zxy)),
        "yzx" => Ok(Some(AxisOrder::Yzx)),
        other => Err(ConvError::Config(format!(
            "unknown axis order '{}' (expected zxy, yzx or auto)",
            other
        ))),
    }
}

impl ConvolutionConfig {
    /// Defaults overlaid with the `DEMAG_CONV_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        cfg.apply_overrides(|k| std::env::var(k).ok())?;
        Ok(cfg)
    }

    /// Overlay values looked up by environment-variable name.
    pub fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = get(ENV_BACKEND) {
            self.backend = Backend::parse(&v)?;
        }
        if let Some(v) = get(ENV_THREADS) {
            let n = v.trim().parse::<usize>().map_err(|e| {
                ConvError::Config(format!("{}: '{}' is not a thread count ({})", ENV_THREADS, v, e))
            })?;
            self.threads = Some(n);
        }
        if let Some(v) = get(ENV_AXIS_ORDER) {
            self.axis_order = parse_axis_order(&v)?;
        }
        if let Some(v) = get(ENV_CACHE_SCRATCH) {
            self.cache_scratch = parse_flag(ENV_CACHE_SCRATCH, &v)?;
        }
        if let Some(v) = get(ENV_TIMING) {
            self.timing = parse_flag(ENV_TIMING, &v)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub geometry: GeometryConfig,
    pub convolution: ConvolutionConfig,
    pub numerics: NumericsConfig,
    pub run: RunInfo,
}

#[derive(Debug, Serialize)]
pub struct GeometryConfig {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub periodic: [bool; 3],
    pub padded: [usize; 3],
}

#[derive(Debug, Serialize)]
pub struct NumericsConfig {
    pub precision: String,
    pub axis_order: AxisOrder,
    /// Relative refinement target of the tensor integration.
    pub accuracy: f64,
    pub repeat: usize,
}

#[derive(Debug, Serialize)]
pub struct RunInfo {
    pub binary: String,
    pub run_id: String,

    // Optional provenance (can be filled later)
    pub git_commit: Option<String>,
    pub timestamp_utc: Option<String>,
}

impl RunConfig {
    pub fn write_to_dir(&self, out_dir: &Path) -> Result<()> {
        let path = out_dir.join("config.json");
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
