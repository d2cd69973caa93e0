// src/kernels/multiply.rs
//
// Per-bin tensor products shared by both multiplier backends.

use rustfft::num_complex::Complex;

use crate::fft::Real;
use crate::tensor_setup::FrozenTensor;

/// The `K` tensor entries of frequency bin `i`.
#[inline]
pub(crate) fn gather<T: Real, const K: usize>(n: &FrozenTensor<T>, i: usize) -> [Complex<T>; K] {
    std::array::from_fn(|c| n.bin(c, i))
}

/// N·M with N given as (xx, xy, xz, yy, yz, zz).
#[inline]
pub fn symmetric_bin<T: Real>(n: [Complex<T>; 6], m: [Complex<T>; 3]) -> [Complex<T>; 3] {
    [
        n[0] * m[0] + n[1] * m[1] + n[2] * m[2],
        n[1] * m[0] + n[3] * m[1] + n[4] * m[2],
        n[2] * m[0] + n[4] * m[1] + n[5] * m[2],
    ]
}

/// N·M with N antisymmetric, given by its upper entries (xy, xz, yz).
#[inline]
pub fn antisymmetric_bin<T: Real>(n: [Complex<T>; 3], m: [Complex<T>; 3]) -> [Complex<T>; 3] {
    [
        n[0] * m[1] + n[1] * m[2],
        -n[0] * m[0] + n[2] * m[2],
        -n[1] * m[0] - n[2] * m[1],
    ]
}

#[inline]
pub fn dot_bin<T: Real>(n: [Complex<T>; 3], m: [Complex<T>; 3]) -> Complex<T> {
    n[0] * m[0] + n[1] * m[1] + n[2] * m[2]
}

#[inline]
pub fn scale_bin<T: Real>(n: [Complex<T>; 3], s: Complex<T>) -> [Complex<T>; 3] {
    [n[0] * s, n[1] * s, n[2] * s]
}
