// src/conv/mod.rs
//
// Padded FFT convolution pipeline shared by the executors.
//
// Layouts (x fastest unless noted, cx = exp_x/2+1):
//   real input          dx × dy × dz
//   after r2c along x   cx × dy × dz         (stage_x)
//   xyz -> Yzx          ey × dz × cx         (stage_y)  FFT along y
//   yzx -> Zxy          ez × cx × ey         (stage_z)  FFT along z   [Zxy only]
// The multiply runs on the last stage, whose layout matches the frozen tensor.
// The inverse walks the same stages back with transpose+unpad, finishes with a
// Hermitian c2r along x into full exp_x rows (full_x) and copy+unpad into dx.
//
// Every component of a stage lives back to back in one buffer, so each FFT
// stage is a single batched call over all rows of all components.

pub mod symmetric;
pub mod vector;

pub use symmetric::SymmetricMatrixVectorConvolution;
pub use vector::VectorVectorConvolution;

use std::sync::Arc;
use std::time::Instant;

use rustfft::num_complex::Complex;
use tracing::{debug, info};

use crate::config::{Backend, ConvolutionConfig};
use crate::device::{Device, DeviceBuffer};
use crate::error::{ConvError, Result};
use crate::fft::{FftPlan, Real, czero};
use crate::grid::PaddedGrid;
use crate::kernels::{CpuKernels, FrequencyMultiplier, LayoutTransformer, ParallelKernels};
use crate::tensor_setup::{AxisOrder, FrozenTensor};

/// Frequency-domain map applied between the forward and inverse passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Spectral {
    Symmetric,
    Antisymmetric,
    Dot,
    Scale,
}

impl Spectral {
    fn inputs(self) -> usize {
        match self {
            Spectral::Scale => 1,
            _ => 3,
        }
    }

    fn outputs(self) -> usize {
        match self {
            Spectral::Dot => 1,
            _ => 3,
        }
    }

    fn entries(self) -> usize {
        match self {
            Spectral::Symmetric => 6,
            _ => 3,
        }
    }
}

/// Padded buffers for one call, sized for three components.
struct Scratch<T> {
    real: DeviceBuffer<T>,
    stage_x: DeviceBuffer<Complex<T>>,
    stage_y: DeviceBuffer<Complex<T>>,
    stage_z: DeviceBuffer<Complex<T>>,
    full_x: DeviceBuffer<Complex<T>>,
    out: DeviceBuffer<T>,
}

impl<T: Real> Scratch<T> {
    fn alloc(device: &Device, grid: &PaddedGrid, order: AxisOrder) -> Result<Self> {
        let [dx, dy, dz] = grid.dim;
        let [ex, ey, ez] = grid.exp;
        let cx = grid.half_x();
        let n = dx * dy * dz;
        let stage_z = match order {
            AxisOrder::Zxy => ez * cx * ey,
            AxisOrder::Yzx => 0,
        };
        Ok(Self {
            real: device.alloc(3 * n, T::zero())?,
            stage_x: device.alloc(3 * cx * dy * dz, czero())?,
            stage_y: device.alloc(3 * ey * dz * cx, czero())?,
            stage_z: device.alloc(3 * stage_z, czero())?,
            full_x: device.alloc(3 * ex * dy * dz, czero())?,
            out: device.alloc(3 * n, T::zero())?,
        })
    }
}

fn split<C>(buf: &[C], len: usize, k: usize) -> Vec<&[C]> {
    buf[..k * len].chunks(len).collect()
}

fn split_mut<C>(buf: &mut [C], len: usize, k: usize) -> Vec<&mut [C]> {
    buf[..k * len].chunks_mut(len).collect()
}

pub(crate) struct Pipeline<T: Real> {
    grid: PaddedGrid,
    order: AxisOrder,
    backend: Backend,
    fft: FftPlan<T>,
    layout: Box<dyn LayoutTransformer<T>>,
    multiplier: Box<dyn FrequencyMultiplier<T>>,
    pool: Option<Arc<rayon::ThreadPool>>,
    device: Device,
    cache_scratch: bool,
    scratch: Option<Scratch<T>>,
    timing: bool,
}

impl<T: Real> Pipeline<T> {
    pub(crate) fn new(grid: PaddedGrid, config: &ConvolutionConfig) -> Result<Self> {
        let order = config.axis_order.unwrap_or_else(|| AxisOrder::for_grid(&grid));
        order.check(&grid)?;

        let pool = match config.threads {
            Some(0) => {
                return Err(ConvError::Backend(
                    "thread count must be at least 1".to_string(),
                ));
            }
            Some(n) if config.backend == Backend::Cpu => {
                return Err(ConvError::Config(format!(
                    "threads={} has no effect on the sequential cpu backend",
                    n
                )));
            }
            Some(n) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| ConvError::Backend(format!("thread pool: {}", e)))?,
            )),
            None => None,
        };

        let (layout, multiplier, device): (
            Box<dyn LayoutTransformer<T>>,
            Box<dyn FrequencyMultiplier<T>>,
            Device,
        ) = match config.backend {
            Backend::Cpu => (Box::new(CpuKernels), Box::new(CpuKernels), Device::cpu()),
            Backend::Parallel => (
                Box::new(ParallelKernels),
                Box::new(ParallelKernels),
                Device::parallel(),
            ),
        };

        let fft = FftPlan::new(grid.exp, config.backend == Backend::Parallel);
        let scratch = if config.cache_scratch {
            Some(Scratch::alloc(&device, &grid, order)?)
        } else {
            None
        };

        info!(
            dim = ?grid.dim,
            exp = ?grid.exp,
            backend = config.backend.name(),
            order = order.name(),
            precision = std::any::type_name::<T>(),
            kernels = layout.name(),
            threads = ?config.threads,
            "{}",
            device.report()
        );

        Ok(Self {
            grid,
            order,
            backend: config.backend,
            fft,
            layout,
            multiplier,
            pool,
            device,
            cache_scratch: config.cache_scratch,
            scratch,
            timing: config.timing,
        })
    }

    pub(crate) fn grid(&self) -> PaddedGrid {
        self.grid
    }

    pub(crate) fn order(&self) -> AxisOrder {
        self.order
    }

    pub(crate) fn backend(&self) -> Backend {
        self.backend
    }

    pub(crate) fn device(&self) -> &Device {
        &self.device
    }

    /// Convolve `rhs` with `tensor` under `op` and overwrite `res`.
    ///
    /// Component counts and lengths are checked by the executors. All work happens
    /// in scratch; `res` is written only once everything else has succeeded.
    pub(crate) fn convolve(
        &mut self,
        tensor: &FrozenTensor<T>,
        op: Spectral,
        rhs: &[&[f64]],
        res: &mut [&mut [f64]],
    ) -> Result<()> {
        let n = self.grid.n_logical();
        debug_assert_eq!(rhs.len(), op.inputs());
        debug_assert_eq!(res.len(), op.outputs());
        debug_assert!(rhs.iter().all(|c| c.len() == n) && res.iter().all(|c| c.len() == n));
        if tensor.order() != self.order {
            return Err(ConvError::InvalidDimension(format!(
                "tensor laid out as {}, pipeline runs {}",
                tensor.order().name(),
                self.order.name()
            )));
        }
        if tensor.num_entries() != op.entries() {
            return Err(ConvError::InvalidComponentCount {
                expected: if op.entries() == 6 { "6" } else { "3" },
                got: tensor.num_entries(),
            });
        }

        let mut scratch = match self.scratch.take() {
            Some(s) => s,
            None => Scratch::alloc(&self.device, &self.grid, self.order)?,
        };

        let t0 = Instant::now();
        for (dst, src) in scratch.real.chunks_mut(n).zip(rhs) {
            for (d, &s) in dst.iter_mut().zip(src.iter()) {
                *d = T::of_f64(s);
            }
        }

        let pool = self.pool.clone();
        let this = &*self;
        let stages = match pool {
            Some(p) => p.install(|| this.run_stages(tensor, op, &mut scratch)),
            None => this.run_stages(tensor, op, &mut scratch),
        };

        for (dst, src) in res.iter_mut().zip(scratch.out.chunks(n)) {
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = s.as_f64();
            }
        }

        if self.timing {
            info!(
                op = ?op,
                forward_ms = stages[0],
                multiply_ms = stages[1],
                inverse_ms = stages[2],
                total_ms = t0.elapsed().as_secs_f64() * 1e3,
                "convolution"
            );
        }
        if self.cache_scratch {
            self.scratch = Some(scratch);
        }
        Ok(())
    }

    /// Forward, multiply and inverse passes; returns their durations in ms.
    fn run_stages(&self, tensor: &FrozenTensor<T>, op: Spectral, s: &mut Scratch<T>) -> [f64; 3] {
        let [dx, dy, dz] = self.grid.dim;
        let [ex, ey, ez] = self.grid.exp;
        let cx = self.grid.half_x();
        let n = dx * dy * dz;
        let len_x = cx * dy * dz;
        let len_y = ey * dz * cx;
        let bins = self.grid.spectrum_len();
        let zxy = self.order == AxisOrder::Zxy;

        // forward
        let t0 = Instant::now();
        let k = op.inputs();
        self.fft
            .forward_real_rows(&s.real[..k * n], dx, &mut s.stage_x[..k * len_x]);
        self.layout.transpose_zeropad(
            [cx, dy, dz],
            ey,
            &split(&s.stage_x, len_x, k),
            &mut split_mut(&mut s.stage_y, len_y, k),
        );
        self.fft.forward_rows(1, &mut s.stage_y[..k * len_y]);
        if zxy {
            self.layout.transpose_zeropad(
                [ey, dz, cx],
                ez,
                &split(&s.stage_y, len_y, k),
                &mut split_mut(&mut s.stage_z, bins, k),
            );
            self.fft.forward_rows(2, &mut s.stage_z[..k * bins]);
        }
        let t_fwd = t0.elapsed().as_secs_f64() * 1e3;

        // multiply
        let t0 = Instant::now();
        {
            let buf: &mut [Complex<T>] = if zxy { &mut s.stage_z } else { &mut s.stage_y };
            let (m0, rest) = buf[..3 * bins].split_at_mut(bins);
            let (m1, m2) = rest.split_at_mut(bins);
            let m = [m0, m1, m2];
            match op {
                Spectral::Symmetric => self.multiplier.multiply_symmetric(tensor, m),
                Spectral::Antisymmetric => self.multiplier.multiply_antisymmetric(tensor, m),
                Spectral::Dot => self.multiplier.multiply_dot(tensor, m),
                Spectral::Scale => self.multiplier.multiply_scale(tensor, m),
            }
        }
        let t_mul = t0.elapsed().as_secs_f64() * 1e3;

        // inverse
        let t0 = Instant::now();
        let k = op.outputs();
        if zxy {
            self.fft.inverse_rows(2, &mut s.stage_z[..k * bins]);
            self.layout.transpose_unpad(
                [ez, cx, ey],
                dz,
                &split(&s.stage_z, bins, k),
                &mut split_mut(&mut s.stage_y, len_y, k),
            );
        }
        self.fft.inverse_rows(1, &mut s.stage_y[..k * len_y]);
        self.layout.transpose_unpad(
            [ey, dz, cx],
            dy,
            &split(&s.stage_y, len_y, k),
            &mut split_mut(&mut s.stage_x, len_x, k),
        );
        let len_full = ex * dy * dz;
        self.fft
            .inverse_real_rows(&s.stage_x[..k * len_x], &mut s.full_x[..k * len_full]);
        self.layout.copy_unpad_c2r(
            [ex, dy, dz],
            dx,
            &split(&s.full_x, len_full, k),
            &mut split_mut(&mut s.out, n, k),
        );
        let t_inv = t0.elapsed().as_secs_f64() * 1e3;

        debug!(
            op = ?op,
            order = self.order.name(),
            forward_ms = t_fwd,
            multiply_ms = t_mul,
            inverse_ms = t_inv,
            "stages done"
        );
        [t_fwd, t_mul, t_inv]
    }
}

/// `ShapeMismatch` unless `got` equals the executor's logical grid.
pub(crate) fn check_shape(what: &'static str, grid: &PaddedGrid, got: [usize; 3]) -> Result<()> {
    if got != grid.dim {
        return Err(ConvError::ShapeMismatch {
            what,
            expected: grid.dim,
            got,
        });
    }
    Ok(())
}
