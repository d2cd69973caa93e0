// src/kernels/mod.rs
//
// Device capabilities used by the convolution pipeline:
// - LayoutTransformer: zero-pad+transpose, transpose+unpad, copy+unpad
// - FrequencyMultiplier: per-bin tensor × vector products in frequency space
//
// Two implementations: CpuKernels (sequential nested loops) and ParallelKernels
// (rayon, one invocation per output element). Both use the index maps below so
// their results are identical element for element.
//
// Axis naming: `xyz -> Yzx` means the output's fastest axis is the input's y axis,
// and the capital marks the axis that is zero-padded. `XYZ -> ZxY` is the inverse
// rotation with the lower-case axis cut down from dim_x to red_x.

pub mod cpu;
pub mod multiply;
pub mod parallel;

pub use cpu::CpuKernels;
pub use parallel::ParallelKernels;

use rustfft::num_complex::Complex;

use crate::fft::Real;
use crate::tensor_setup::FrozenTensor;

pub trait LayoutTransformer<T: Real>: Send + Sync {
    fn name(&self) -> &'static str;

    /// xyz -> Yzx. Input `dim` (x fastest), output `exp_y × dim_z × dim_x`,
    /// rows `y >= dim_y` zero-filled.
    fn transpose_zeropad(
        &self,
        dim: [usize; 3],
        exp_y: usize,
        input: &[&[Complex<T>]],
        output: &mut [&mut [Complex<T>]],
    );

    /// XYZ -> ZxY. Input `dim`, output `dim_z × red_x × dim_y` (x cut to red_x).
    fn transpose_unpad(
        &self,
        dim: [usize; 3],
        red_x: usize,
        input: &[&[Complex<T>]],
        output: &mut [&mut [Complex<T>]],
    );

    /// Drop x padding (dim_x -> red_x) keeping axis order; keeps the real part.
    fn copy_unpad_c2r(
        &self,
        dim: [usize; 3],
        red_x: usize,
        input: &[&[Complex<T>]],
        output: &mut [&mut [T]],
    );

    /// Drop x padding (dim_x -> red_x) keeping axis order.
    fn copy_unpad_r2r(&self, dim: [usize; 3], red_x: usize, input: &[&[T]], output: &mut [&mut [T]]);
}

/// All maps are in place over the three frequency-domain buffers.
pub trait FrequencyMultiplier<T: Real>: Send + Sync {
    /// (Mx,My,Mz) <- N·M with N symmetric (xx, xy, xz, yy, yz, zz).
    fn multiply_symmetric(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]);

    /// (Mx,My,Mz) <- N·M with N antisymmetric (xy, xz, yz).
    fn multiply_antisymmetric(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]);

    /// Mx <- Nx·Mx + Ny·My + Nz·Mz. My and Mz are left untouched.
    fn multiply_dot(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]);

    /// (Mx,My,Mz) <- (Nx·S, Ny·S, Nz·S) where S is read from Mx.
    fn multiply_scale(&self, n: &FrozenTensor<T>, m: [&mut [Complex<T>]; 3]);
}

/// Output length of `transpose_zeropad`.
#[inline]
pub fn zeropad_len(dim: [usize; 3], exp_y: usize) -> usize {
    exp_y * dim[2] * dim[0]
}

/// Output length of `transpose_unpad` and `copy_unpad_*`.
#[inline]
pub fn unpad_len(dim: [usize; 3], red_x: usize) -> usize {
    red_x * dim[1] * dim[2]
}

/// xyz -> Yzx: output index of input element (x, y, z).
#[inline]
pub fn zeropad_target(x: usize, y: usize, z: usize, dim: [usize; 3], exp_y: usize) -> usize {
    y + exp_y * (z + dim[2] * x)
}

/// xyz -> Yzx: input index read by output element `o`, `None` inside the padding.
#[inline]
pub fn zeropad_source(o: usize, dim: [usize; 3], exp_y: usize) -> Option<usize> {
    let y = o % exp_y;
    let r = o / exp_y;
    let z = r % dim[2];
    let x = r / dim[2];
    if y < dim[1] {
        Some(x + dim[0] * (y + dim[1] * z))
    } else {
        None
    }
}

/// XYZ -> ZxY: output index of input element (x, y, z), x < red_x.
#[inline]
pub fn unpad_target(x: usize, y: usize, z: usize, dim: [usize; 3], red_x: usize) -> usize {
    z + dim[2] * (x + red_x * y)
}

/// XYZ -> ZxY: input index read by output element `o`.
#[inline]
pub fn unpad_source(o: usize, dim: [usize; 3], red_x: usize) -> usize {
    let z = o % dim[2];
    let r = o / dim[2];
    let x = r % red_x;
    let y = r / red_x;
    x + dim[0] * (y + dim[1] * z)
}

/// Copy+unpad: input index read by output element `o`.
#[inline]
pub fn copy_unpad_source(o: usize, dim: [usize; 3], red_x: usize) -> usize {
    let x = o % red_x;
    let row = o / red_x;
    x + dim[0] * row
}

pub(crate) fn check_layout_args(
    what: &str,
    in_lens: impl ExactSizeIterator<Item = usize>,
    out_lens: impl ExactSizeIterator<Item = usize>,
    in_len: usize,
    out_len: usize,
) {
    let (n_in, n_out) = (in_lens.len(), out_lens.len());
    assert!(
        n_in == n_out && (1..=3).contains(&n_in),
        "{}: component counts in={} out={} (must match, 1..=3)",
        what,
        n_in,
        n_out
    );
    for l in in_lens {
        assert_eq!(l, in_len, "{}: input component has wrong length", what);
    }
    for l in out_lens {
        assert_eq!(l, out_len, "{}: output component has wrong length", what);
    }
}

pub(crate) fn check_multiply_args<T: Real>(
    what: &str,
    n: &FrozenTensor<T>,
    entries: usize,
    m: &[&mut [Complex<T>]; 3],
) {
    assert_eq!(
        n.num_entries(),
        entries,
        "{}: tensor has {} entries",
        what,
        n.num_entries()
    );
    for c in m.iter() {
        assert_eq!(c.len(), n.len(), "{}: spectrum length mismatch", what);
    }
}
