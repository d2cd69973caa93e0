// src/kernels/parallel.rs
//
// Data-parallel kernels: one rayon task per output element, each computing its
// own source index. This is the execution model of the accelerator backend;
// with f32 buffers it reproduces single-precision device arithmetic.

use rayon::prelude::*;
use rustfft::num_complex::Complex;

use super::multiply::{antisymmetric_bin, dot_bin, gather, scale_bin, symmetric_bin};
use super::{
    FrequencyMultiplier, LayoutTransformer, check_layout_args, check_multiply_args,
    copy_unpad_source, unpad_len, unpad_source, zeropad_len, zeropad_source,
};
use crate::fft::{Real, czero};
use crate::tensor_setup::FrozenTensor;

#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelKernels;

/// Fill every output component from its input component through `source`.
fn gather_map<A: Copy + Sync, B: Send>(
    input: &[&[A]],
    output: &mut [&mut [B]],
    source: impl Fn(usize, &[A]) -> B + Sync,
) {
    for (inp, out) in input.iter().zip(output.iter_mut()) {
        let inp: &[A] = inp;
        out.par_iter_mut()
            .enumerate()
            .for_each(|(o, v)| *v = source(o, inp));
    }
}

impl<T: Real> LayoutTransformer<T> for ParallelKernels {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn transpose_zeropad(
        &self,
        dim: [usize; 3],
        exp_y: usize,
        input: &[&[Complex<T>]],
        output: &mut [&mut [Complex<T>]],
    ) {
        check_layout_args(
            "transpose_zeropad",
            input.iter().map(|c| c.len()),
            output.iter().map(|c| c.len()),
            dim[0] * dim[1] * dim[2],
            zeropad_len(dim, exp_y),
        );
        assert!(exp_y >= dim[1], "transpose_zeropad: exp_y {} < dim_y {}", exp_y, dim[1]);
        gather_map(input, output, |o, inp| {
            zeropad_source(o, dim, exp_y).map_or_else(czero, |s| inp[s])
        });
    }

    fn transpose_unpad(
        &self,
        dim: [usize; 3],
        red_x: usize,
        input: &[&[Complex<T>]],
        output: &mut [&mut [Complex<T>]],
    ) {
        check_layout_args(
            "transpose_unpad",
            input.iter().map(|c| c.len()),
            output.iter().map(|c| c.len()),
            dim[0] * dim[1] * dim[2],
            unpad_len(dim, red_x),
        );
        assert!(red_x <= dim[0], "transpose_unpad: red_x {} > dim_x {}", red_x, dim[0]);
        gather_map(input, output, |o, inp| inp[unpad_source(o, dim, red_x)]);
    }

    fn copy_unpad_c2r(
        &self,
        dim: [usize; 3],
        red_x: usize,
        input: &[&[Complex<T>]],
        output: &mut [&mut [T]],
    ) {
        check_layout_args(
            "copy_unpad_c2r",
            input.iter().map(|c| c.len()),
            output.iter().map(|c| c.len()),
            dim[0] * dim[1] * dim[2],
            unpad_len(dim, red_x),
        );
        assert!(red_x <= dim[0], "copy_unpad_c2r: red_x {} > dim_x {}", red_x, dim[0]);
        gather_map(input, output, |o, inp| inp[copy_unpad_source(o, dim, red_x)].re);
    }

    fn copy_unpad_r2r(&self, dim: [usize; 3], red_x: usize, input: &[&[T]], output: &mut [&mut [T]]) {
        check_layout_args(
            "copy_unpad_r2r",
            input.iter().map(|c| c.len()),
            output.iter().map(|c| c.len()),
            dim[0] * dim[1] * dim[2],
            unpad_len(dim, red_x),
        );
        assert!(red_x <= dim[0], "copy_unpad_r2r: red_x {} > dim_x {}", red_x, dim[0]);
        gather_map(input, output, |o, inp| inp[copy_unpad_source(o, dim, red_x)]);
    }
}

impl<T: Real> FrequencyMultiplier<T> for ParallelKernels {
    fn multiply_symmetric(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]) {
        check_multiply_args("multiply_symmetric", n, 6, &m);
        let [mx, my, mz] = m;
        mx.par_iter_mut()
            .zip_eq(my.par_iter_mut())
            .zip_eq(mz.par_iter_mut())
            .enumerate()
            .for_each(|(i, ((x, y), z))| {
                let out = symmetric_bin(gather::<T, 6>(n, i), [*x, *y, *z]);
                (*x, *y, *z) = (out[0], out[1], out[2]);
            });
    }

    fn multiply_antisymmetric(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]) {
        check_multiply_args("multiply_antisymmetric", n, 3, &m);
        let [mx, my, mz] = m;
        mx.par_iter_mut()
            .zip_eq(my.par_iter_mut())
            .zip_eq(mz.par_iter_mut())
            .enumerate()
            .for_each(|(i, ((x, y), z))| {
                let out = antisymmetric_bin(gather::<T, 3>(n, i), [*x, *y, *z]);
                (*x, *y, *z) = (out[0], out[1], out[2]);
            });
    }

    fn multiply_dot(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]) {
        check_multiply_args("multiply_dot", n, 3, &m);
        let [mx, my, mz] = m;
        let my: &[Complex<T>] = my;
        let mz: &[Complex<T>] = mz;
        mx.par_iter_mut().enumerate().for_each(|(i, x)| {
            *x = dot_bin(gather::<T, 3>(n, i), [*x, my[i], mz[i]]);
        });
    }

    fn multiply_scale(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]) {
        check_multiply_args("multiply_scale", n, 3, &m);
        let [mx, my, mz] = m;
        mx.par_iter_mut()
            .zip_eq(my.par_iter_mut())
            .zip_eq(mz.par_iter_mut())
            .enumerate()
            .for_each(|(i, ((x, y), z))| {
                let out = scale_bin(gather::<T, 3>(n, i), *x);
                (*x, *y, *z) = (out[0], out[1], out[2]);
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::CpuKernels;

    fn noise(n: usize, seed: u64) -> Vec<Complex<f64>> {
        let mut s = seed;
        (0..n)
            .map(|_| {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let a = ((s >> 33) % 1000) as f64 / 100.0 - 5.0;
                let b = ((s >> 13) % 1000) as f64 / 100.0 - 5.0;
                Complex::new(a, b)
            })
            .collect()
    }

    #[test]
    fn layout_kernels_agree_with_sequential_ones() {
        let dim = [5, 3, 4];
        let n = 60;
        let a = noise(n, 1);
        let b = noise(n, 2);

        let mut zp_cpu = vec![vec![czero::<f64>(); zeropad_len(dim, 7)]; 2];
        let mut zp_par = zp_cpu.clone();
        {
            let mut outs: Vec<&mut [Complex<f64>]> = zp_cpu.iter_mut().map(|v| &mut v[..]).collect();
            CpuKernels.transpose_zeropad(dim, 7, &[&a[..], &b[..]], &mut outs);
        }
        {
            let mut outs: Vec<&mut [Complex<f64>]> = zp_par.iter_mut().map(|v| &mut v[..]).collect();
            ParallelKernels.transpose_zeropad(dim, 7, &[&a[..], &b[..]], &mut outs);
        }
        assert_eq!(zp_cpu, zp_par);

        let mut up_cpu = vec![czero::<f64>(); unpad_len(dim, 3)];
        let mut up_par = up_cpu.clone();
        CpuKernels.transpose_unpad(dim, 3, &[&a[..]], &mut [&mut up_cpu[..]]);
        ParallelKernels.transpose_unpad(dim, 3, &[&a[..]], &mut [&mut up_par[..]]);
        assert_eq!(up_cpu, up_par);

        let mut cu_cpu = vec![0.0f64; unpad_len(dim, 2)];
        let mut cu_par = cu_cpu.clone();
        CpuKernels.copy_unpad_c2r(dim, 2, &[&b[..]], &mut [&mut cu_cpu[..]]);
        ParallelKernels.copy_unpad_c2r(dim, 2, &[&b[..]], &mut [&mut cu_par[..]]);
        assert_eq!(cu_cpu, cu_par);
    }
}
