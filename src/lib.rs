// src/lib.rs

pub mod config;
pub mod conv;
pub mod demag_tensor;
pub mod device;
pub mod direct;
pub mod error;
pub mod fft;
pub mod grid;
pub mod kernels;
pub mod tensor_setup;
pub mod vec3;
pub mod vector_field;

pub use config::{Backend, ConvolutionConfig};
pub use conv::{SymmetricMatrixVectorConvolution, VectorVectorConvolution};
pub use error::{ConvError, Result};
pub use grid::{Grid3D, PaddedGrid};
pub use tensor_setup::{AxisOrder, TensorFieldSetup};
pub use vector_field::{ScalarField3D, TensorField, VectorField3D};
