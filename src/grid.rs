// src/grid.rs

use serde::{Deserialize, Serialize};

use crate::error::{ConvError, Result};

/// Regular 3D finite-difference grid.
/// Linear index is x-fastest: `i + nx * (j + ny * k)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid3D {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl Grid3D {
    /// Create a new grid with nx × ny × nz cells and spacings dx, dy, dz.
    pub fn new(nx: usize, ny: usize, nz: usize, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            nx,
            ny,
            nz,
            dx,
            dy,
            dz,
        }
    }

    /// Total number of cells.
    pub fn n_cells(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    pub fn cell_size(&self) -> [f64; 3] {
        [self.dx, self.dy, self.dz]
    }

    #[inline]
    pub fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.nx && j < self.ny && k < self.nz);
        i + self.nx * (j + self.ny * k)
    }
}

/// Smallest n' >= n whose only prime factors are 2, 3, 5 and 7.
pub fn fft_friendly_size(n: usize) -> usize {
    let mut m = n.max(1);
    loop {
        let mut r = m;
        for p in [2, 3, 5, 7] {
            while r % p == 0 {
                r /= p;
            }
        }
        if r == 1 {
            return m;
        }
        m += 1;
    }
}

/// Logical grid size together with the zero-padded size used by the FFT convolution.
///
/// Open axes are padded so the circular convolution on `exp` equals the linear one
/// on `dim`; periodic axes keep `exp == dim` and wrap around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaddedGrid {
    pub dim: [usize; 3],
    pub exp: [usize; 3],
}

impl PaddedGrid {
    pub fn new(dim: [usize; 3], exp: [usize; 3]) -> Result<Self> {
        for axis in 0..3 {
            if dim[axis] == 0 || exp[axis] == 0 {
                return Err(ConvError::InvalidDimension(format!(
                    "dimensions must be positive (dim={:?}, exp={:?})",
                    dim, exp
                )));
            }
            if exp[axis] < dim[axis] {
                return Err(ConvError::InvalidDimension(format!(
                    "padded size {} smaller than logical size {} on axis {}",
                    exp[axis],
                    dim[axis],
                    axis_name(axis)
                )));
            }
        }
        Ok(Self { dim, exp })
    }

    /// Open boundaries on every axis.
    pub fn open(dim: [usize; 3]) -> Result<Self> {
        Self::with_periodic(dim, [false; 3])
    }

    /// Pad open axes to an FFT-friendly size >= 2*dim; periodic axes are not padded.
    /// Axes of length one never need padding.
    pub fn with_periodic(dim: [usize; 3], periodic: [bool; 3]) -> Result<Self> {
        let mut exp = [0usize; 3];
        for axis in 0..3 {
            exp[axis] = if periodic[axis] || dim[axis] <= 1 {
                dim[axis]
            } else {
                fft_friendly_size(2 * dim[axis])
            };
        }
        Self::new(dim, exp)
    }

    pub fn n_logical(&self) -> usize {
        self.dim[0] * self.dim[1] * self.dim[2]
    }

    pub fn n_padded(&self) -> usize {
        self.exp[0] * self.exp[1] * self.exp[2]
    }

    /// Number of x bins kept by the real-to-complex transform.
    pub fn half_x(&self) -> usize {
        self.exp[0] / 2 + 1
    }

    /// Bins in the frequency-domain buffer of one component.
    pub fn spectrum_len(&self) -> usize {
        self.half_x() * self.exp[1] * self.exp[2]
    }

    /// A single z layer that is never padded: the z transform can be skipped.
    pub fn is_thin_film(&self) -> bool {
        self.exp[2] == 1
    }
}

pub(crate) fn axis_name(axis: usize) -> char {
    ['x', 'y', 'z'][axis]
}
