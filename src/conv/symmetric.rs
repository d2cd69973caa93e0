// src/conv/symmetric.rs
//
// res = N ⊛ rhs for a symmetric 3×3 tensor field N (xx, xy, xz, yy, yz, zz).

use crate::config::{Backend, ConvolutionConfig};
use crate::device::Device;
use crate::error::Result;
use crate::fft::Real;
use crate::grid::PaddedGrid;
use crate::tensor_setup::{AxisOrder, FrozenTensor, TensorFieldSetup};
use crate::vector_field::{TensorField, VectorField3D};

use super::{Pipeline, Spectral, check_shape};

pub struct SymmetricMatrixVectorConvolution<T: Real = f64> {
    tensor: FrozenTensor<T>,
    pipeline: Pipeline<T>,
}

impl SymmetricMatrixVectorConvolution<f64> {
    /// Double-precision executor. `lhs` has 6 components on the padded grid.
    pub fn new(lhs: &TensorField, grid: PaddedGrid, config: &ConvolutionConfig) -> Result<Self> {
        Self::with_precision(lhs, grid, config)
    }
}

impl<T: Real> SymmetricMatrixVectorConvolution<T> {
    pub fn with_precision(
        lhs: &TensorField,
        grid: PaddedGrid,
        config: &ConvolutionConfig,
    ) -> Result<Self> {
        let pipeline = Pipeline::<T>::new(grid, config)?;
        let setup = TensorFieldSetup::for_grid(6, grid)?;
        let tensor = setup.freeze::<T>(lhs, pipeline.order(), config.timing)?;
        Ok(Self { tensor, pipeline })
    }

    /// Overwrite `res` with N ⊛ `rhs`. On error `res` is left untouched.
    pub fn execute(&mut self, rhs: &VectorField3D, res: &mut VectorField3D) -> Result<()> {
        let grid = self.pipeline.grid();
        check_shape("rhs", &grid, rhs.dims)?;
        check_shape("res", &grid, res.dims)?;
        self.pipeline.convolve(
            &self.tensor,
            Spectral::Symmetric,
            &rhs.components(),
            &mut res.components_mut(),
        )
    }

    pub fn grid(&self) -> PaddedGrid {
        self.pipeline.grid()
    }

    pub fn axis_order(&self) -> AxisOrder {
        self.pipeline.order()
    }

    pub fn backend(&self) -> Backend {
        self.pipeline.backend()
    }

    pub fn device(&self) -> &Device {
        self.pipeline.device()
    }
}
