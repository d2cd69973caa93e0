// src/vector_field.rs

use crate::error::{ConvError, Result};
use crate::grid::Grid3D;

/// Component slots of a symmetric (6-entry) tensor field.
pub mod symmetric {
    pub const XX: usize = 0;
    pub const XY: usize = 1;
    pub const XZ: usize = 2;
    pub const YY: usize = 3;
    pub const YZ: usize = 4;
    pub const ZZ: usize = 5;
}

/// Component slots of an antisymmetric (3-entry) tensor field.
pub mod antisymmetric {
    pub const XY: usize = 0;
    pub const XZ: usize = 1;
    pub const YZ: usize = 2;
}

#[inline]
fn n_of(dims: [usize; 3]) -> usize {
    dims[0] * dims[1] * dims[2]
}

/// 3-component real field. Components are independent contiguous buffers
/// (not interleaved), each x-fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField3D {
    pub dims: [usize; 3],
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl VectorField3D {
    /// Zero field with the given cell counts.
    pub fn new(dims: [usize; 3]) -> Self {
        let n = n_of(dims);
        Self {
            dims,
            x: vec![0.0; n],
            y: vec![0.0; n],
            z: vec![0.0; n],
        }
    }

    pub fn on_grid(grid: &Grid3D) -> Self {
        Self::new(grid.dims())
    }

    pub fn n_cells(&self) -> usize {
        n_of(self.dims)
    }

    #[inline]
    pub fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.dims[0] && j < self.dims[1] && k < self.dims[2]);
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    /// Set all cells to the same vector.
    pub fn set_uniform(&mut self, vx: f64, vy: f64, vz: f64) {
        self.x.fill(vx);
        self.y.fill(vy);
        self.z.fill(vz);
    }

    #[inline]
    pub fn get(&self, idx: usize) -> [f64; 3] {
        [self.x[idx], self.y[idx], self.z[idx]]
    }

    #[inline]
    pub fn set(&mut self, idx: usize, v: [f64; 3]) {
        self.x[idx] = v[0];
        self.y[idx] = v[1];
        self.z[idx] = v[2];
    }

    pub fn components(&self) -> [&[f64]; 3] {
        [&self.x, &self.y, &self.z]
    }

    pub fn components_mut(&mut self) -> [&mut [f64]; 3] {
        [&mut self.x, &mut self.y, &mut self.z]
    }

    /// Cell-averaged vector.
    pub fn average(&self) -> [f64; 3] {
        let n = self.n_cells() as f64;
        [
            self.x.iter().sum::<f64>() / n,
            self.y.iter().sum::<f64>() / n,
            self.z.iter().sum::<f64>() / n,
        ]
    }

    /// a*self + b*other, cellwise.
    pub fn linear_combination(&self, a: f64, other: &VectorField3D, b: f64) -> VectorField3D {
        assert_eq!(self.dims, other.dims, "linear_combination: dims differ");
        let mut out = VectorField3D::new(self.dims);
        for (o, (s, t)) in out
            .components_mut()
            .into_iter()
            .zip(self.components().into_iter().zip(other.components()))
        {
            for i in 0..o.len() {
                o[i] = a * s[i] + b * t[i];
            }
        }
        out
    }

    /// Largest absolute component value.
    pub fn max_abs(&self) -> f64 {
        self.components()
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f64, |m, v| m.max(v.abs()))
    }

    /// Largest absolute componentwise difference to `other`.
    pub fn max_abs_diff(&self, other: &VectorField3D) -> f64 {
        assert_eq!(self.dims, other.dims, "max_abs_diff: dims differ");
        let mut max_abs: f64 = 0.0;
        for (a, b) in self.components().iter().zip(other.components()) {
            for (va, vb) in a.iter().zip(b.iter()) {
                max_abs = max_abs.max((va - vb).abs());
            }
        }
        max_abs
    }
}

/// 1-component real field, x-fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField3D {
    pub dims: [usize; 3],
    pub data: Vec<f64>,
}

impl ScalarField3D {
    pub fn new(dims: [usize; 3]) -> Self {
        Self {
            dims,
            data: vec![0.0; n_of(dims)],
        }
    }

    pub fn n_cells(&self) -> usize {
        n_of(self.dims)
    }

    #[inline]
    pub fn idx(&self, i: usize, j: usize, k: usize) -> usize {
        debug_assert!(i < self.dims[0] && j < self.dims[1] && k < self.dims[2]);
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    pub fn fill(&mut self, v: f64) {
        self.data.fill(v);
    }

    pub fn max_abs_diff(&self, other: &ScalarField3D) -> f64 {
        assert_eq!(self.dims, other.dims, "max_abs_diff: dims differ");
        self.data
            .iter()
            .zip(other.data.iter())
            .fold(0.0f64, |m, (a, b)| m.max((a - b).abs()))
    }
}

/// Real multi-component field; components stacked one after another.
///
/// Interaction tensors live on the padded grid and are indexed by displacement
/// with wrap-around: displacement `s` along an axis of padded length `n` is
/// stored at `s mod n`.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorField {
    num_entries: usize,
    dims: [usize; 3],
    data: Vec<f64>,
}

impl TensorField {
    pub fn new(num_entries: usize, dims: [usize; 3]) -> Self {
        Self {
            num_entries,
            dims,
            data: vec![0.0; num_entries * n_of(dims)],
        }
    }

    /// Wrap stacked component data of length `num_entries * dims product`.
    pub fn from_data(num_entries: usize, dims: [usize; 3], data: Vec<f64>) -> Result<Self> {
        let expected = num_entries * n_of(dims);
        if data.len() != expected {
            return Err(ConvError::InvalidDimension(format!(
                "tensor data has {} values, {} components on {:?} need {}",
                data.len(),
                num_entries,
                dims,
                expected
            )));
        }
        Ok(Self {
            num_entries,
            dims,
            data,
        })
    }

    /// 3-entry tensor from a vector field (e.g. a vector kernel given on the padded grid).
    pub fn from_vector_field(v: &VectorField3D) -> Self {
        let mut data = Vec::with_capacity(3 * v.n_cells());
        for c in v.components() {
            data.extend_from_slice(c);
        }
        Self {
            num_entries: 3,
            dims: v.dims,
            data,
        }
    }

    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn component_len(&self) -> usize {
        n_of(self.dims)
    }

    pub fn component(&self, c: usize) -> &[f64] {
        let n = self.component_len();
        &self.data[c * n..(c + 1) * n]
    }

    pub fn component_mut(&mut self, c: usize) -> &mut [f64] {
        let n = self.component_len();
        &mut self.data[c * n..(c + 1) * n]
    }

    /// Flat index of a (possibly negative) displacement, wrapped into the grid.
    #[inline]
    pub fn displacement_idx(&self, s: [isize; 3]) -> usize {
        let i = wrap_index(s[0], self.dims[0]);
        let j = wrap_index(s[1], self.dims[1]);
        let k = wrap_index(s[2], self.dims[2]);
        i + self.dims[0] * (j + self.dims[1] * k)
    }

    pub fn set_displacement(&mut self, c: usize, s: [isize; 3], v: f64) {
        let idx = self.displacement_idx(s);
        self.component_mut(c)[idx] = v;
    }

    pub fn add_displacement(&mut self, c: usize, s: [isize; 3], v: f64) {
        let idx = self.displacement_idx(s);
        self.component_mut(c)[idx] += v;
    }

    /// Fill one component with a constant at every grid point.
    pub fn fill_component(&mut self, c: usize, v: f64) {
        self.component_mut(c).fill(v);
    }
}

#[inline]
pub(crate) fn wrap_index(d: isize, n: usize) -> usize {
    let n = n as isize;
    let mut v = d % n;
    if v < 0 {
        v += n;
    }
    v as usize
}
