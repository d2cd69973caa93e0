// src/fft.rs
//
// FFT backend boundary on top of rustfft.
//
// All transforms are unnormalised (rustfft convention). The convolution folds the
// 1/(exp_x*exp_y*exp_z) factor into the frozen tensor instead.
//
// Rows are processed either in one batched rustfft call (serial) or as
// rayon-parallel chunks, one row per task.

use std::sync::Arc;

use num_traits::Float;
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftNum, FftPlanner};

/// Floating-point type a convolution pipeline can run in.
pub trait Real: FftNum + Float {
    fn of_f64(v: f64) -> Self;
    fn as_f64(self) -> f64;
}

impl Real for f64 {
    #[inline]
    fn of_f64(v: f64) -> Self {
        v
    }
    #[inline]
    fn as_f64(self) -> f64 {
        self
    }
}

impl Real for f32 {
    #[inline]
    fn of_f64(v: f64) -> Self {
        v as f32
    }
    #[inline]
    fn as_f64(self) -> f64 {
        self as f64
    }
}

#[inline]
pub(crate) fn czero<T: Real>() -> Complex<T> {
    Complex::new(T::zero(), T::zero())
}

/// Forward/inverse plans for the three padded axis lengths.
pub struct FftPlan<T: Real> {
    exp: [usize; 3],
    fwd: [Arc<dyn Fft<T>>; 3],
    inv: [Arc<dyn Fft<T>>; 3],
    parallel: bool,
}

impl<T: Real> FftPlan<T> {
    pub fn new(exp: [usize; 3], parallel: bool) -> Self {
        let mut planner = FftPlanner::<T>::new();
        let fwd = [
            planner.plan_fft_forward(exp[0]),
            planner.plan_fft_forward(exp[1]),
            planner.plan_fft_forward(exp[2]),
        ];
        let inv = [
            planner.plan_fft_inverse(exp[0]),
            planner.plan_fft_inverse(exp[1]),
            planner.plan_fft_inverse(exp[2]),
        ];
        Self {
            exp,
            fwd,
            inv,
            parallel,
        }
    }

    pub fn exp(&self) -> [usize; 3] {
        self.exp
    }

    /// Bins kept per x row by the real-to-complex transform.
    pub fn half_x(&self) -> usize {
        self.exp[0] / 2 + 1
    }

    /// Real-to-complex transform along x.
    ///
    /// `input` holds rows of `row_len <= exp_x` reals. Each row is zero-filled up to
    /// exp_x, transformed, and its first `exp_x/2+1` bins are written to `output`.
    pub fn forward_real_rows(&self, input: &[T], row_len: usize, output: &mut [Complex<T>]) {
        let n = self.exp[0];
        let cx = self.half_x();
        assert!(
            row_len > 0 && row_len <= n,
            "forward_real_rows: row_len {} not in 1..={}",
            row_len,
            n
        );
        let rows = input.len() / row_len;
        assert!(
            input.len() == rows * row_len && output.len() == rows * cx,
            "forward_real_rows: {} reals / {} bins do not form {} rows",
            input.len(),
            output.len(),
            rows
        );

        let fft = &self.fwd[0];
        let scratch_len = fft.get_inplace_scratch_len();
        if self.parallel {
            output
                .par_chunks_mut(cx)
                .zip(input.par_chunks(row_len))
                .for_each_init(
                    || (vec![czero::<T>(); n], vec![czero::<T>(); scratch_len]),
                    |(buf, scratch), (dst, src)| {
                        r2c_row(&**fft, src, dst, buf, scratch);
                    },
                );
        } else {
            let mut buf = vec![czero::<T>(); n];
            let mut scratch = vec![czero::<T>(); scratch_len];
            for (dst, src) in output.chunks_mut(cx).zip(input.chunks(row_len)) {
                r2c_row(&**fft, src, dst, &mut buf, &mut scratch);
            }
        }
    }

    /// Complex-to-real transform along x.
    ///
    /// `input` holds half-spectrum rows (`exp_x/2+1` bins). Each row is completed by
    /// Hermitian symmetry to exp_x bins and inverse transformed into `output`.
    /// The imaginary parts left in `output` are rounding residue.
    pub fn inverse_real_rows(&self, input: &[Complex<T>], output: &mut [Complex<T>]) {
        let n = self.exp[0];
        let cx = self.half_x();
        let rows = input.len() / cx;
        assert!(
            input.len() == rows * cx && output.len() == rows * n,
            "inverse_real_rows: {} bins / {} outputs do not form {} rows",
            input.len(),
            output.len(),
            rows
        );

        let fft = &self.inv[0];
        let scratch_len = fft.get_inplace_scratch_len();
        if self.parallel {
            output
                .par_chunks_mut(n)
                .zip(input.par_chunks(cx))
                .for_each_init(
                    || vec![czero::<T>(); scratch_len],
                    |scratch, (dst, src)| {
                        hermitian_complete(src, dst);
                        fft.process_with_scratch(dst, scratch);
                    },
                );
        } else {
            for (dst, src) in output.chunks_mut(n).zip(input.chunks(cx)) {
                hermitian_complete(src, dst);
            }
            let mut scratch = vec![czero::<T>(); scratch_len];
            fft.process_with_scratch(output, &mut scratch);
        }
    }

    /// Forward c2c transform of contiguous rows of length `exp[axis]`.
    pub fn forward_rows(&self, axis: usize, data: &mut [Complex<T>]) {
        self.process_rows(&self.fwd[axis], axis, data);
    }

    /// Inverse (unnormalised) c2c transform of contiguous rows of length `exp[axis]`.
    pub fn inverse_rows(&self, axis: usize, data: &mut [Complex<T>]) {
        self.process_rows(&self.inv[axis], axis, data);
    }

    fn process_rows(&self, fft: &Arc<dyn Fft<T>>, axis: usize, data: &mut [Complex<T>]) {
        let len = self.exp[axis];
        assert!(
            data.len() % len == 0,
            "process_rows: buffer of {} not a multiple of row length {}",
            data.len(),
            len
        );
        if len == 1 || data.is_empty() {
            return;
        }
        let scratch_len = fft.get_inplace_scratch_len();
        if self.parallel {
            data.par_chunks_mut(len).for_each_init(
                || vec![czero::<T>(); scratch_len],
                |scratch, row| fft.process_with_scratch(row, scratch),
            );
        } else {
            let mut scratch = vec![czero::<T>(); scratch_len];
            fft.process_with_scratch(data, &mut scratch);
        }
    }

    /// Forward transform along a non-contiguous axis of an x-fastest array,
    /// gathering each line into a buffer (used for the one-time tensor setup).
    pub fn forward_axis_strided(&self, axis: usize, dims: [usize; 3], data: &mut [Complex<T>]) {
        let len = dims[axis];
        assert_eq!(
            len, self.exp[axis],
            "forward_axis_strided: axis length {} does not match plan {}",
            len, self.exp[axis]
        );
        assert_eq!(data.len(), dims[0] * dims[1] * dims[2]);
        if len == 1 {
            return;
        }

        let stride: usize = dims[..axis].iter().product();
        let outer: usize = dims[axis + 1..].iter().product();
        let fft = &self.fwd[axis];
        let mut line = vec![czero::<T>(); len];
        let mut scratch = vec![czero::<T>(); fft.get_inplace_scratch_len()];

        for o in 0..outer {
            for s in 0..stride {
                let base = o * stride * len + s;
                for t in 0..len {
                    line[t] = data[base + t * stride];
                }
                fft.process_with_scratch(&mut line, &mut scratch);
                for t in 0..len {
                    data[base + t * stride] = line[t];
                }
            }
        }
    }
}

fn r2c_row<T: Real>(
    fft: &dyn Fft<T>,
    src: &[T],
    dst: &mut [Complex<T>],
    buf: &mut [Complex<T>],
    scratch: &mut [Complex<T>],
) {
    for (b, &v) in buf.iter_mut().zip(src) {
        *b = Complex::new(v, T::zero());
    }
    for b in &mut buf[src.len()..] {
        *b = czero();
    }
    fft.process_with_scratch(buf, scratch);
    let cx = dst.len();
    dst.copy_from_slice(&buf[..cx]);
}

/// Rebuild a full spectrum of length `dst.len()` from its first `src.len()` bins.
#[inline]
fn hermitian_complete<T: Real>(src: &[Complex<T>], dst: &mut [Complex<T>]) {
    let n = dst.len();
    let cx = src.len();
    dst[..cx].copy_from_slice(src);
    for k in cx..n {
        dst[k] = src[n - k].conj();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive_dft(x: &[f64]) -> Vec<Complex<f64>> {
        let n = x.len();
        (0..n)
            .map(|k| {
                let mut acc = Complex::new(0.0, 0.0);
                for (j, &v) in x.iter().enumerate() {
                    let phi = -2.0 * std::f64::consts::PI * (k * j) as f64 / n as f64;
                    acc += Complex::new(phi.cos(), phi.sin()) * v;
                }
                acc
            })
            .collect()
    }

    #[test]
    fn real_rows_are_zero_filled_before_transform() {
        for &parallel in &[false, true] {
            let plan = FftPlan::<f64>::new([6, 1, 1], parallel);
            let input = [1.0, -2.0, 0.5, 3.0, 0.0, 1.0];
            let mut out = vec![czero(); 2 * plan.half_x()];
            plan.forward_real_rows(&input, 3, &mut out);

            let reference0 = naive_dft(&[1.0, -2.0, 0.5, 0.0, 0.0, 0.0]);
            let reference1 = naive_dft(&[3.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
            for k in 0..plan.half_x() {
                assert!((out[k] - reference0[k]).norm() < 1e-12);
                assert!((out[4 + k] - reference1[k]).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn real_round_trip_scales_by_length() {
        for &n in &[5usize, 8] {
            for &parallel in &[false, true] {
                let plan = FftPlan::<f64>::new([n, 1, 1], parallel);
                let input: Vec<f64> = (0..n).map(|i| (i as f64 * 0.7).sin() + 0.1).collect();
                let mut half = vec![czero(); plan.half_x()];
                plan.forward_real_rows(&input, n, &mut half);
                let mut full = vec![czero(); n];
                plan.inverse_real_rows(&half, &mut full);
                for i in 0..n {
                    assert!((full[i].re / n as f64 - input[i]).abs() < 1e-12);
                    assert!(full[i].im.abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn strided_axis_matches_contiguous_rows() {
        let dims = [3, 4, 2];
        let plan = FftPlan::<f64>::new([3, 4, 2], false);
        assert_eq!(plan.exp(), dims);
        let data: Vec<Complex<f64>> = (0..24)
            .map(|i| Complex::new(i as f64, (i * i % 7) as f64))
            .collect();

        let mut strided = data.clone();
        plan.forward_axis_strided(1, dims, &mut strided);

        for z in 0..2 {
            for x in 0..3 {
                let mut line: Vec<Complex<f64>> =
                    (0..4).map(|y| data[x + 3 * (y + 4 * z)]).collect();
                plan.forward_rows(1, &mut line);
                for y in 0..4 {
                    assert!((strided[x + 3 * (y + 4 * z)] - line[y]).norm() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn single_precision_rows_round_trip() {
        let plan = FftPlan::<f32>::new([1, 8, 1], true);
        let orig: Vec<Complex<f32>> = (0..16).map(|i| Complex::new(i as f32, 0.5)).collect();
        let mut data = orig.clone();
        plan.forward_rows(1, &mut data);
        plan.inverse_rows(1, &mut data);
        for (a, b) in data.iter().zip(orig.iter()) {
            assert!((*a / 8.0 - *b).norm() < 1e-4);
        }
    }
}
