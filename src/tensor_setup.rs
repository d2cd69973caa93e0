// src/tensor_setup.rs
//
// One-time precomputation of the frequency-domain interaction tensor.
//
// The real-space tensor lives on the padded grid (wrap-around displacements).
// transform_tensor_field runs the full 3D forward transform (r2c along x, then
// y and z), giving `cx × exp_y × exp_z` complex bins per component, x fastest.
// Unpacking re-lays those bins out in the order the convolution pipeline leaves
// its spectrum in, splits them into real/imaginary arrays and folds in the
// 1/(exp_x*exp_y*exp_z) normalisation of the inverse transform.

use std::time::Instant;

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConvError, Result};
use crate::fft::{FftPlan, Real, czero};
use crate::grid::PaddedGrid;
use crate::vector_field::TensorField;

/// Axis order of the spectrum seen by the multiply kernels.
///
/// `Zxy`: z fastest, then x, then y (three transform stages).
/// `Yzx`: y fastest, then z, then x; only for grids with `exp_z == 1`,
/// where the z stage disappears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisOrder {
    Zxy,
    Yzx,
}

impl AxisOrder {
    /// The cheaper order the grid allows.
    pub fn for_grid(grid: &PaddedGrid) -> Self {
        if grid.is_thin_film() {
            AxisOrder::Yzx
        } else {
            AxisOrder::Zxy
        }
    }

    pub fn check(self, grid: &PaddedGrid) -> Result<()> {
        if self == AxisOrder::Yzx && !grid.is_thin_film() {
            return Err(ConvError::InvalidDimension(format!(
                "axis order yzx needs exp_z == 1, got exp={:?}",
                grid.exp
            )));
        }
        Ok(())
    }

    /// Spectrum extents, fastest axis first.
    pub fn spectrum_dims(self, grid: &PaddedGrid) -> [usize; 3] {
        let cx = grid.half_x();
        let [_, ey, ez] = grid.exp;
        match self {
            AxisOrder::Zxy => [ez, cx, ey],
            AxisOrder::Yzx => [ey, ez, cx],
        }
    }

    /// Flat index of bin (x, y, z) in this order.
    #[inline]
    pub fn bin_index(self, x: usize, y: usize, z: usize, grid: &PaddedGrid) -> usize {
        let [f, m, _] = self.spectrum_dims(grid);
        match self {
            AxisOrder::Zxy => z + f * (x + m * y),
            AxisOrder::Yzx => y + f * (z + m * x),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AxisOrder::Zxy => "zxy",
            AxisOrder::Yzx => "yzx",
        }
    }
}

/// Forward-transformed tensor, `num_entries` components of `cx × exp_y × exp_z`
/// bins each, x fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexTensorField {
    num_entries: usize,
    dims: [usize; 3],
    data: Vec<Complex<f64>>,
}

impl ComplexTensorField {
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn component(&self, c: usize) -> &[Complex<f64>] {
        let n = self.dims[0] * self.dims[1] * self.dims[2];
        &self.data[c * n..(c + 1) * n]
    }
}

/// Frequency-domain operator in the layout of one axis order, split into real
/// and imaginary arrays. Read-only to the executors.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenTensor<T> {
    order: AxisOrder,
    num_entries: usize,
    len: usize,
    re: Vec<T>,
    im: Vec<T>,
}

impl<T: Real> FrozenTensor<T> {
    pub fn order(&self) -> AxisOrder {
        self.order
    }

    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    /// Bins per component.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn re(&self, c: usize) -> &[T] {
        &self.re[c * self.len..(c + 1) * self.len]
    }

    pub fn im(&self, c: usize) -> &[T] {
        &self.im[c * self.len..(c + 1) * self.len]
    }

    #[inline]
    pub fn bin(&self, c: usize, i: usize) -> Complex<T> {
        let k = c * self.len + i;
        Complex::new(self.re[k], self.im[k])
    }

    /// Same operator in another precision.
    pub fn cast<U: Real>(&self) -> FrozenTensor<U> {
        let conv = |v: &[T]| -> Vec<U> { v.iter().map(|&a| U::of_f64(a.as_f64())).collect() };
        FrozenTensor {
            order: self.order,
            num_entries: self.num_entries,
            len: self.len,
            re: conv(&self.re),
            im: conv(&self.im),
        }
    }
}

pub struct TensorFieldSetup {
    num_entries: usize,
    grid: PaddedGrid,
}

impl TensorFieldSetup {
    /// `num_entries` is 6 for symmetric tensors, 3 for antisymmetric/vector ones.
    pub fn new(num_entries: usize, dim: [usize; 3], exp: [usize; 3]) -> Result<Self> {
        Self::for_grid(num_entries, PaddedGrid::new(dim, exp)?)
    }

    pub fn for_grid(num_entries: usize, grid: PaddedGrid) -> Result<Self> {
        if num_entries != 3 && num_entries != 6 {
            return Err(ConvError::InvalidComponentCount {
                expected: "3 or 6",
                got: num_entries,
            });
        }
        Ok(Self { num_entries, grid })
    }

    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    pub fn grid(&self) -> PaddedGrid {
        self.grid
    }

    /// Full forward transform of every tensor component.
    ///
    /// The tensor must be given on the padded grid (`dims == exp`).
    pub fn transform_tensor_field(&self, tensor: &TensorField) -> Result<ComplexTensorField> {
        if tensor.num_entries() != self.num_entries {
            return Err(ConvError::InvalidComponentCount {
                expected: if self.num_entries == 6 { "6" } else { "3" },
                got: tensor.num_entries(),
            });
        }
        if tensor.dims() != self.grid.exp {
            return Err(ConvError::ShapeMismatch {
                what: "interaction tensor",
                expected: self.grid.exp,
                got: tensor.dims(),
            });
        }

        let t0 = Instant::now();
        let exp = self.grid.exp;
        let cx = self.grid.half_x();
        let dims = [cx, exp[1], exp[2]];
        let n = self.grid.spectrum_len();
        let plan = FftPlan::<f64>::new(exp, false);

        let mut data = vec![czero::<f64>(); self.num_entries * n];
        for (c, out) in data.chunks_mut(n).enumerate() {
            plan.forward_real_rows(tensor.component(c), exp[0], out);
            plan.forward_axis_strided(1, dims, out);
            plan.forward_axis_strided(2, dims, out);
        }
        debug!(
            entries = self.num_entries,
            ?dims,
            elapsed_ms = t0.elapsed().as_secs_f64() * 1e3,
            "tensor field transformed"
        );

        Ok(ComplexTensorField {
            num_entries: self.num_entries,
            dims,
            data,
        })
    }

    /// Re-lay out as `[z fastest, x, y]`.
    pub fn unpack_transformed_tensor_field_xyz_to_zxy(
        &self,
        field: &ComplexTensorField,
    ) -> Result<FrozenTensor<f64>> {
        self.unpack(AxisOrder::Zxy, field)
    }

    /// Re-lay out as `[y fastest, z, x]`.
    pub fn unpack_transformed_tensor_field_xyz_to_yzx(
        &self,
        field: &ComplexTensorField,
    ) -> Result<FrozenTensor<f64>> {
        self.unpack(AxisOrder::Yzx, field)
    }

    /// Unpack into `order`, scaled by 1/(exp_x*exp_y*exp_z). `field` is not modified.
    pub fn unpack(&self, order: AxisOrder, field: &ComplexTensorField) -> Result<FrozenTensor<f64>> {
        order.check(&self.grid)?;
        let dims = [self.grid.half_x(), self.grid.exp[1], self.grid.exp[2]];
        if field.num_entries != self.num_entries || field.dims != dims {
            return Err(ConvError::ShapeMismatch {
                what: "transformed tensor",
                expected: dims,
                got: field.dims,
            });
        }

        let len = self.grid.spectrum_len();
        let scale = 1.0 / self.grid.n_padded() as f64;
        let mut re = vec![0.0; self.num_entries * len];
        let mut im = vec![0.0; self.num_entries * len];
        for c in 0..self.num_entries {
            let src = field.component(c);
            let (re_c, im_c) = (&mut re[c * len..(c + 1) * len], &mut im[c * len..(c + 1) * len]);
            for z in 0..dims[2] {
                for y in 0..dims[1] {
                    for x in 0..dims[0] {
                        let v = src[x + dims[0] * (y + dims[1] * z)] * scale;
                        let o = order.bin_index(x, y, z, &self.grid);
                        re_c[o] = v.re;
                        im_c[o] = v.im;
                    }
                }
            }
        }

        Ok(FrozenTensor {
            order,
            num_entries: self.num_entries,
            len,
            re,
            im,
        })
    }

    /// Transform + unpack in one go, in the executor's precision.
    pub fn freeze<T: Real>(
        &self,
        tensor: &TensorField,
        order: AxisOrder,
        timing: bool,
    ) -> Result<FrozenTensor<T>> {
        let t0 = Instant::now();
        order.check(&self.grid)?;
        let transformed = self.transform_tensor_field(tensor)?;
        let frozen = self.unpack(order, &transformed)?.cast::<T>();
        if timing {
            info!(
                entries = self.num_entries,
                order = order.name(),
                elapsed_ms = t0.elapsed().as_secs_f64() * 1e3,
                "tensor setup"
            );
        }
        Ok(frozen)
    }
}
