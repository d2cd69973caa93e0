// src/main.rs
//
// Driver for the demag convolution: builds the dipolar tensor for a box of
// cells, convolves a uniform magnetisation with it `repeat` times and reports
// the average field and timing.
//
// Examples:
//
//   cargo run --release -- nx=64 ny=64 nz=1 backend=parallel precision=f32
//       -> thin film on the data-parallel kernels in single precision.
//
//   cargo run --release -- nx=16 ny=16 nz=4 check
//       -> also runs the O(N^2) direct sum and prints the max deviation.
//
//   cargo run --release -- nx=32 ny=32 nz=1 pbcx pbcy=4 out=runs run=film
//       -> periodic in x (1 image) and y (4 images).
//
// Outputs (per run directory):
//   runs/<run_id>/
//     ├── config.json
//     └── summary.csv
//
// Logging goes through tracing; set RUST_LOG=debug for per-stage detail and
// DEMAG_CONV_TIMING=1 for per-call timing lines.

use std::env;
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use demag_conv::config::{GeometryConfig, NumericsConfig, RunConfig, RunInfo};
use demag_conv::demag_tensor::{DEFAULT_ACCURACY, build_demag_tensor};
use demag_conv::direct;
use demag_conv::fft::Real;
use demag_conv::{
    AxisOrder, Backend, ConvError, ConvolutionConfig, Grid3D, PaddedGrid, Result,
    SymmetricMatrixVectorConvolution, TensorField, VectorField3D,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precision {
    F32,
    F64,
}

impl Precision {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "f32" | "single" => Some(Self::F32),
            "f64" | "double" => Some(Self::F64),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

fn print_usage() {
    eprintln!(
        r#"Usage:
  cargo run -- [nx=N] [ny=N] [nz=N] [dx=VAL] [dy=VAL] [dz=VAL]
             [backend=cpu|parallel] [precision=f32|f64] [threads=N]
             [repeat=N] [accuracy=VAL] [check]
             [pbcx[=N]] [pbcy[=N]] [pbcz[=N]]
             [out=DIR] [run=RUN_ID]

Notes:
  - Environment defaults (DEMAG_CONV_BACKEND, DEMAG_CONV_THREADS,
    DEMAG_CONV_AXIS_ORDER, DEMAG_CONV_CACHE_SCRATCH, DEMAG_CONV_TIMING)
    are applied first; arguments override them.
  - 'check' compares against the direct sum; keep the grid small.
  - threads=N needs backend=parallel.
"#
    );
}

fn sanitize_run_id(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn default_run_id(dims: [usize; 3], backend: Backend, precision: Precision) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| std::time::Duration::from_secs(0));
    let ts = format!("{}{:03}", now.as_secs(), now.subsec_millis());
    format!(
        "{}_{}x{}x{}_{}_{}",
        ts,
        dims[0],
        dims[1],
        dims[2],
        backend.name(),
        precision.as_str()
    )
}

fn unique_run_dir(out_root: &str, run_id: &str) -> PathBuf {
    let base = PathBuf::from(out_root);
    let mut dir = base.join(run_id);
    if !dir.exists() {
        return dir;
    }
    for k in 1..1000 {
        let cand = base.join(format!("{}_{}", run_id, k));
        if !cand.exists() {
            dir = cand;
            break;
        }
    }
    dir
}

fn parse_value<T: std::str::FromStr>(key: &str, v: &str) -> Result<T> {
    v.trim()
        .parse::<T>()
        .map_err(|_| ConvError::Config(format!("could not parse {}='{}'", key, v)))
}

struct RunOutcome {
    h: VectorField3D,
    order: AxisOrder,
    avg_ms: f64,
    setup_ms: f64,
}

fn run_symmetric<T: Real>(
    n: &TensorField,
    grid: PaddedGrid,
    cfg: &ConvolutionConfig,
    m: &VectorField3D,
    repeat: usize,
) -> Result<RunOutcome> {
    let t0 = Instant::now();
    let mut conv = SymmetricMatrixVectorConvolution::<T>::with_precision(n, grid, cfg)?;
    let setup_ms = t0.elapsed().as_secs_f64() * 1e3;

    let mut h = VectorField3D::new(grid.dim);
    let t0 = Instant::now();
    for _ in 0..repeat {
        conv.execute(m, &mut h)?;
    }
    let avg_ms = t0.elapsed().as_secs_f64() * 1e3 / repeat.max(1) as f64;
    info!("{}", conv.device().report());

    Ok(RunOutcome {
        h,
        order: conv.axis_order(),
        avg_ms,
        setup_ms,
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let argv: Vec<String> = env::args().collect();

    let mut dims = [32usize, 32, 1];
    let mut cell = [5e-9, 5e-9, 5e-9];
    let mut precision = Precision::F64;
    let mut repeat = 10usize;
    let mut accuracy = DEFAULT_ACCURACY;
    let mut check = false;
    let mut images = [0usize; 3];
    let mut cfg = ConvolutionConfig::from_env()?;

    // Output controls
    let mut out_root_override: Option<String> = None;
    let mut run_id_override: Option<String> = None;

    for arg in argv.iter().skip(1) {
        if arg == "-h" || arg == "--help" || arg == "help" {
            print_usage();
            return Ok(());
        }
        if arg == "check" {
            check = true;
            continue;
        }

        let mut matched = false;
        for (a, &key) in ["pbcx", "pbcy", "pbcz"].iter().enumerate() {
            if arg == key {
                images[a] = 1;
                matched = true;
            } else if let Some(v) = arg.strip_prefix(key).and_then(|r| r.strip_prefix('=')) {
                images[a] = parse_value(key, v)?;
                matched = true;
            }
        }
        if matched {
            continue;
        }

        let Some((key, v)) = arg.split_once('=') else {
            warn!("ignoring unknown argument '{}'", arg);
            continue;
        };
        match key {
            "nx" => dims[0] = parse_value(key, v)?,
            "ny" => dims[1] = parse_value(key, v)?,
            "nz" => dims[2] = parse_value(key, v)?,
            "dx" => cell[0] = parse_value(key, v)?,
            "dy" => cell[1] = parse_value(key, v)?,
            "dz" => cell[2] = parse_value(key, v)?,
            "backend" => cfg.backend = Backend::parse(v)?,
            "threads" => cfg.threads = Some(parse_value(key, v)?),
            "repeat" => repeat = parse_value(key, v)?,
            "accuracy" => accuracy = parse_value(key, v)?,
            "precision" => {
                precision = Precision::parse(v).ok_or_else(|| {
                    ConvError::Config(format!("unknown precision '{}' (f32 or f64)", v))
                })?
            }
            "out" => out_root_override = Some(v.to_string()),
            "run" => run_id_override = Some(v.to_string()),
            _ => warn!("ignoring unknown argument '{}'", arg),
        }
    }

    let grid = Grid3D::new(dims[0], dims[1], dims[2], cell[0], cell[1], cell[2]);
    let periodic = images.map(|i| i > 0);
    let padded = PaddedGrid::with_periodic(dims, periodic)?;
    info!(dim = ?padded.dim, exp = ?padded.exp, ?periodic, "grid");

    // -------- tensor --------
    let t0 = Instant::now();
    let n = build_demag_tensor(&grid, &padded, images, accuracy)?;
    let tensor_ms = t0.elapsed().as_secs_f64() * 1e3;

    // -------- convolution --------
    let mut m = VectorField3D::on_grid(&grid);
    m.set_uniform(0.6, 0.0, 0.8);

    let outcome = match precision {
        Precision::F32 => run_symmetric::<f32>(&n, padded, &cfg, &m, repeat)?,
        Precision::F64 => run_symmetric::<f64>(&n, padded, &cfg, &m, repeat)?,
    };
    let h_avg = outcome.h.average();

    println!(
        "grid {}x{}x{} padded {:?}  backend={} precision={} order={}",
        dims[0],
        dims[1],
        dims[2],
        padded.exp,
        cfg.backend.name(),
        precision.as_str(),
        outcome.order.name()
    );
    println!(
        "tensor {:.3} ms, setup {:.3} ms, execute {:.3} ms/call over {} calls",
        tensor_ms, outcome.setup_ms, outcome.avg_ms, repeat
    );
    println!(
        "<H>/Ms = ({:+.6}, {:+.6}, {:+.6})",
        h_avg[0], h_avg[1], h_avg[2]
    );

    let mut max_rel_err: Option<f64> = None;
    if check {
        let t0 = Instant::now();
        let reference = direct::convolve_symmetric(&n, &m)?;
        let scale = reference.max_abs().max(f64::MIN_POSITIVE);
        let err = outcome.h.max_abs_diff(&reference) / scale;
        println!(
            "direct sum {:.3} ms, max relative deviation {:.3e}",
            t0.elapsed().as_secs_f64() * 1e3,
            err
        );
        max_rel_err = Some(err);
    }

    // -------- output directory setup --------
    let out_root = out_root_override.unwrap_or_else(|| "runs".to_string());
    create_dir_all(&out_root)?;

    let run_id = sanitize_run_id(
        &run_id_override.unwrap_or_else(|| default_run_id(dims, cfg.backend, precision)),
    );
    let run_dir = unique_run_dir(&out_root, &run_id);
    create_dir_all(&run_dir)?;

    let run_config = RunConfig {
        geometry: GeometryConfig {
            nx: dims[0],
            ny: dims[1],
            nz: dims[2],
            dx: cell[0],
            dy: cell[1],
            dz: cell[2],
            periodic,
            padded: padded.exp,
        },
        convolution: cfg.clone(),
        numerics: NumericsConfig {
            precision: precision.as_str().to_string(),
            axis_order: outcome.order,
            accuracy,
            repeat,
        },
        run: RunInfo {
            binary: "demag-conv".to_string(),
            run_id: run_id.clone(),
            git_commit: None,
            timestamp_utc: None,
        },
    };
    run_config.write_to_dir(&run_dir)?;

    let mut w = BufWriter::new(File::create(run_dir.join("summary.csv"))?);
    writeln!(
        w,
        "nx,ny,nz,ex,ey,ez,backend,precision,order,repeat,tensor_ms,setup_ms,execute_ms,hx,hy,hz,max_rel_err"
    )?;
    writeln!(
        w,
        "{},{},{},{},{},{},{},{},{},{},{:.6},{:.6},{:.6},{:.12e},{:.12e},{:.12e},{}",
        dims[0],
        dims[1],
        dims[2],
        padded.exp[0],
        padded.exp[1],
        padded.exp[2],
        cfg.backend.name(),
        precision.as_str(),
        outcome.order.name(),
        repeat,
        tensor_ms,
        outcome.setup_ms,
        outcome.avg_ms,
        h_avg[0],
        h_avg[1],
        h_avg[2],
        max_rel_err.map(|e| format!("{:.6e}", e)).unwrap_or_default()
    )?;
    w.flush()?;

    println!("wrote {}", run_dir.display());
    Ok(())
}
