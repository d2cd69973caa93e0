// src/conv/vector.rs
//
// Convolutions with a 3-entry left-hand side.
//
// The same frozen operator serves three maps:
//   execute         antisymmetric matrix (xy, xz, yz) ⊛ vector -> vector
//   execute_dot     vector (x, y, z) · ⊛ vector -> scalar
//   execute_scalar  vector (x, y, z) ⊛ scalar -> vector

use crate::config::{Backend, ConvolutionConfig};
use crate::device::Device;
use crate::error::Result;
use crate::fft::Real;
use crate::grid::PaddedGrid;
use crate::tensor_setup::{AxisOrder, FrozenTensor, TensorFieldSetup};
use crate::vector_field::{ScalarField3D, TensorField, VectorField3D};

use super::{Pipeline, Spectral, check_shape};

pub struct VectorVectorConvolution<T: Real = f64> {
    tensor: FrozenTensor<T>,
    pipeline: Pipeline<T>,
}

impl VectorVectorConvolution<f64> {
    /// Double-precision executor. `lhs` has 3 components on the padded grid.
    pub fn new(lhs: &TensorField, grid: PaddedGrid, config: &ConvolutionConfig) -> Result<Self> {
        Self::with_precision(lhs, grid, config)
    }
}

impl<T: Real> VectorVectorConvolution<T> {
    pub fn with_precision(
        lhs: &TensorField,
        grid: PaddedGrid,
        config: &ConvolutionConfig,
    ) -> Result<Self> {
        let pipeline = Pipeline::<T>::new(grid, config)?;
        let setup = TensorFieldSetup::for_grid(3, grid)?;
        let tensor = setup.freeze::<T>(lhs, pipeline.order(), config.timing)?;
        Ok(Self { tensor, pipeline })
    }

    /// `res = A ⊛ rhs` with A antisymmetric:
    /// `(Nxy·My + Nxz·Mz, -Nxy·Mx + Nyz·Mz, -Nxz·Mx - Nyz·My)`.
    pub fn execute(&mut self, rhs: &VectorField3D, res: &mut VectorField3D) -> Result<()> {
        let grid = self.pipeline.grid();
        check_shape("rhs", &grid, rhs.dims)?;
        check_shape("res", &grid, res.dims)?;
        self.pipeline.convolve(
            &self.tensor,
            Spectral::Antisymmetric,
            &rhs.components(),
            &mut res.components_mut(),
        )
    }

    /// `res = Nx ⊛ Mx + Ny ⊛ My + Nz ⊛ Mz`.
    pub fn execute_dot(&mut self, rhs: &VectorField3D, res: &mut ScalarField3D) -> Result<()> {
        let grid = self.pipeline.grid();
        check_shape("rhs", &grid, rhs.dims)?;
        check_shape("res", &grid, res.dims)?;
        self.pipeline.convolve(
            &self.tensor,
            Spectral::Dot,
            &rhs.components(),
            &mut [&mut res.data[..]],
        )
    }

    /// `res_i = N_i ⊛ s`.
    pub fn execute_scalar(&mut self, rhs: &ScalarField3D, res: &mut VectorField3D) -> Result<()> {
        let grid = self.pipeline.grid();
        check_shape("rhs", &grid, rhs.dims)?;
        check_shape("res", &grid, res.dims)?;
        self.pipeline.convolve(
            &self.tensor,
            Spectral::Scale,
            &[&rhs.data[..]],
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3;
    use crate::vector_field::antisymmetric;

    #[test]
    fn uniform_antisymmetric_delta_is_a_cross_product() {
        let grid = PaddedGrid::open([2, 2, 2]).unwrap();
        let mut n = TensorField::new(3, grid.exp);
        let d = [0.5, -1.0, 2.0];
        n.set_displacement(antisymmetric::XY, [0, 0, 0], d[0]);
        n.set_displacement(antisymmetric::XZ, [0, 0, 0], d[1]);
        n.set_displacement(antisymmetric::YZ, [0, 0, 0], d[2]);
        let mut conv = VectorVectorConvolution::new(&n, grid, &ConvolutionConfig::default()).unwrap();

        let mut m = VectorField3D::new(grid.dim);
        for i in 0..m.n_cells() {
            m.set(i, [1.0, i as f64, -2.0]);
        }
        let mut h = VectorField3D::new(grid.dim);
        conv.execute(&m, &mut h).unwrap();
        for i in 0..m.n_cells() {
            let expected = vec3::antisym_mat_vec(d, m.get(i));
            let got = h.get(i);
            for c in 0..3 {
                assert!((got[c] - expected[c]).abs() < 1e-12, "cell {} got {:?}", i, got);
            }
        }
    }

    #[test]
    fn dot_and_scalar_with_delta_kernel() {
        let grid = PaddedGrid::open([3, 2, 1]).unwrap();
        let mut n = TensorField::new(3, grid.exp);
        n.set_displacement(0, [0, 0, 0], 1.0);
        n.set_displacement(1, [0, 0, 0], 2.0);
        n.set_displacement(2, [0, 0, 0], 3.0);
        let mut conv = VectorVectorConvolution::new(&n, grid, &ConvolutionConfig::default()).unwrap();

        let mut m = VectorField3D::new(grid.dim);
        m.set_uniform(1.0, 1.0, 1.0);
        let mut s = ScalarField3D::new(grid.dim);
        conv.execute_dot(&m, &mut s).unwrap();
        assert!(s.data.iter().all(|v| (v - 6.0).abs() < 1e-12));

        let mut v = VectorField3D::new(grid.dim);
        conv.execute_scalar(&s, &mut v).unwrap();
        assert!(v.x.iter().all(|a| (a - 6.0).abs() < 1e-12));
        assert!(v.y.iter().all(|a| (a - 12.0).abs() < 1e-12));
        assert!(v.z.iter().all(|a| (a - 18.0).abs() < 1e-12));
    }
}
