// src/kernels/cpu.rs
//
// Sequential kernels: plain nested loops over the input layout.

use rustfft::num_complex::Complex;

use super::multiply::{antisymmetric_bin, dot_bin, gather, scale_bin, symmetric_bin};
use super::{
    FrequencyMultiplier, LayoutTransformer, check_layout_args, check_multiply_args, unpad_len,
    unpad_target, zeropad_len,
};
use crate::fft::{Real, czero};
use crate::tensor_setup::FrozenTensor;

#[derive(Debug, Clone, Copy, Default)]
pub struct CpuKernels;

/// Copy+unpad on any element type; `project` turns an input element into an output one.
fn copy_unpad<A: Copy, B>(
    dim: [usize; 3],
    red_x: usize,
    input: &[&[A]],
    output: &mut [&mut [B]],
    project: impl Fn(A) -> B,
) {
    check_layout_args(
        "copy_unpad",
        input.iter().map(|c| c.len()),
        output.iter().map(|c| c.len()),
        dim[0] * dim[1] * dim[2],
        unpad_len(dim, red_x),
    );
    assert!(red_x <= dim[0], "copy_unpad: red_x {} > dim_x {}", red_x, dim[0]);

    let rows = dim[1] * dim[2];
    for (inp, out) in input.iter().zip(output.iter_mut()) {
        for r in 0..rows {
            let src = &inp[r * dim[0]..r * dim[0] + red_x];
            let dst = &mut out[r * red_x..(r + 1) * red_x];
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = project(s);
            }
        }
    }
}

impl<T: Real> LayoutTransformer<T> for CpuKernels {
    fn name(&self) -> &'static str {
        "cpu"
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

        let (dx, dy, dz) = (dim[0], dim[1], dim[2]);
        for (inp, out) in input.iter().zip(output.iter_mut()) {
            // Each output row (fixed x, z) is one y line plus its padding.
            for x in 0..dx {
                for z in 0..dz {
                    let row = &mut out[exp_y * (z + dz * x)..exp_y * (z + dz * x + 1)];
                    for y in 0..dy {
                        row[y] = inp[x + dx * (y + dy * z)];
                    }
                    for v in &mut row[dy..] {
                        *v = czero();
                    }
                }
            }
        }
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

        let (dx, dy, dz) = (dim[0], dim[1], dim[2]);
        for (inp, out) in input.iter().zip(output.iter_mut()) {
            for z in 0..dz {
                for y in 0..dy {
                    let src = &inp[dx * (y + dy * z)..dx * (y + dy * z) + red_x];
                    for (x, &v) in src.iter().enumerate() {
                        out[unpad_target(x, y, z, dim, red_x)] = v;
                    }
                }
            }
        }
    }

    fn copy_unpad_c2r(
        &self,
        dim: [usize; 3],
        red_x: usize,
        input: &[&[Complex<T>]],
        output: &mut [&mut [T]],
    ) {
        copy_unpad(dim, red_x, input, output, |c| c.re);
    }

    fn copy_unpad_r2r(&self, dim: [usize; 3], red_x: usize, input: &[&[T]], output: &mut [&mut [T]]) {
        copy_unpad(dim, red_x, input, output, |v| v);
    }
}

impl<T: Real> FrequencyMultiplier<T> for CpuKernels {
    fn multiply_symmetric(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]) {
        check_multiply_args("multiply_symmetric", n, 6, &m);
        let [mx, my, mz] = m;
        for i in 0..n.len() {
            let [x, y, z] = symmetric_bin(gather::<T, 6>(n, i), [mx[i], my[i], mz[i]]);
            mx[i] = x;
            my[i] = y;
            mz[i] = z;
        }
    }

    fn multiply_antisymmetric(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]) {
        check_multiply_args("multiply_antisymmetric", n, 3, &m);
        let [mx, my, mz] = m;
        for i in 0..n.len() {
            let [x, y, z] = antisymmetric_bin(gather::<T, 3>(n, i), [mx[i], my[i], mz[i]]);
            mx[i] = x;
            my[i] = y;
            mz[i] = z;
        }
    }

    fn multiply_dot(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]) {
        check_multiply_args("multiply_dot", n, 3, &m);
        let [mx, my, mz] = m;
        for i in 0..n.len() {
            mx[i] = dot_bin(gather::<T, 3>(n, i), [mx[i], my[i], mz[i]]);
        }
    }

    fn multiply_scale(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]) {
        check_multiply_args("multiply_scale", n, 3, &m);
        let [mx, my, mz] = m;
        for i in 0..n.len() {
            let [x, y, z] = scale_bin(gather::<T, 3>(n, i), mx[i]);
            mx[i] = x;
            my[i] = y;
            mz[i] = z;
        }
    }
}
