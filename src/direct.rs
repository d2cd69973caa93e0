// src/direct.rs
//
// O(N²) reference convolutions on the same wrap-around tensor convention as
// the FFT executors:
//
//   h(r) = Σ_r' N((r - r') mod exp) · m(r')
//
// With that indexing the result equals the FFT path for any padded size, so
// these are used to check the executors and by the driver's `check` mode.

use rayon::prelude::*;

use crate::error::{ConvError, Result};
use crate::vec3::{antisym_mat_vec, dot, sym_mat_vec};
use crate::vector_field::{ScalarField3D, TensorField, VectorField3D};

fn check(n: &TensorField, entries: usize, dims: [usize; 3]) -> Result<()> {
    if n.num_entries() != entries {
        return Err(ConvError::InvalidComponentCount {
            expected: if entries == 6 { "6" } else { "3" },
            got: n.num_entries(),
        });
    }
    let t = n.dims();
    if (0..3).any(|a| t[a] < dims[a]) {
        return Err(ConvError::InvalidDimension(format!(
            "tensor grid {:?} smaller than field grid {:?}",
            t, dims
        )));
    }
    Ok(())
}

#[inline]
fn coords(i: usize, dims: [usize; 3]) -> [isize; 3] {
    [
        (i % dims[0]) as isize,
        ((i / dims[0]) % dims[1]) as isize,
        (i / (dims[0] * dims[1])) as isize,
    ]
}

/// Sum `f(tensor index, source cell)` over all source cells, for every target cell.
fn accumulate<const K: usize>(
    n: &TensorField,
    dims: [usize; 3],
    f: impl Fn(usize, usize) -> [f64; K] + Sync,
) -> Vec<[f64; K]> {
    let cells = dims[0] * dims[1] * dims[2];
    (0..cells)
        .into_par_iter()
        .map(|i| {
            let r = coords(i, dims);
            let mut acc = [0.0; K];
            for j in 0..cells {
                let rp = coords(j, dims);
                let t = n.displacement_idx([r[0] - rp[0], r[1] - rp[1], r[2] - rp[2]]);
                let v = f(t, j);
                for k in 0..K {
                    acc[k] += v[k];
                }
            }
            acc
        })
        .collect()
}

fn gather<const K: usize>(n: &TensorField, t: usize) -> [f64; K] {
    std::array::from_fn(|c| n.component(c)[t])
}

fn to_vector(dims: [usize; 3], cells: Vec<[f64; 3]>) -> VectorField3D {
    let mut out = VectorField3D::new(dims);
    for (i, v) in cells.into_iter().enumerate() {
        out.set(i, v);
    }
    out
}

/// Symmetric 6-entry tensor times vector field.
pub fn convolve_symmetric(n: &TensorField, m: &VectorField3D) -> Result<VectorField3D> {
    check(n, 6, m.dims)?;
    let cells = accumulate::<3>(n, m.dims, |t, j| sym_mat_vec(gather(n, t), m.get(j)));
    Ok(to_vector(m.dims, cells))
}

/// Antisymmetric (xy, xz, yz) tensor times vector field.
pub fn convolve_antisymmetric(n: &TensorField, m: &VectorField3D) -> Result<VectorField3D> {
    check(n, 3, m.dims)?;
    let cells = accumulate::<3>(n, m.dims, |t, j| antisym_mat_vec(gather(n, t), m.get(j)));
    Ok(to_vector(m.dims, cells))
}

/// Vector kernel dotted with a vector field.
pub fn convolve_dot(n: &TensorField, m: &VectorField3D) -> Result<ScalarField3D> {
    check(n, 3, m.dims)?;
    let cells = accumulate::<1>(n, m.dims, |t, j| [dot(gather(n, t), m.get(j))]);
    let mut out = ScalarField3D::new(m.dims);
    for (o, v) in out.data.iter_mut().zip(cells) {
        *o = v[0];
    }
    Ok(out)
}

/// Vector kernel times a scalar field.
pub fn convolve_scalar(n: &TensorField, s: &ScalarField3D) -> Result<VectorField3D> {
    check(n, 3, s.dims)?;
    let cells = accumulate::<3>(n, s.dims, |t, j| {
        let k: [f64; 3] = gather(n, t);
        [k[0] * s.data[j], k[1] * s.data[j], k[2] * s.data[j]]
    });
    Ok(to_vector(s.dims, cells))
}
