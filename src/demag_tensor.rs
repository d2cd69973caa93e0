// src/demag_tensor.rs
//
// Dipolar (demag) interaction tensor for a box of uniformly magnetised cells.
//
// Each entry is the volume-averaged field in a target cell per unit
// magnetisation of a source cell, from the magnetic charges on the source
// cell's two faces normal to the magnetisation axis. Both faces and the
// target volume are sampled on a midpoint grid whose resolution grows as the
// cells get closer (`accuracy` controls the ratio distance / sample spacing);
// face sampling is staggered twice as fine.
//
// The tensor is dimensionless and stored as H per M, so the self term of a
// cube is about -1/3 on each diagonal. Displacements |s| <= n-1 are filled on
// open axes; on periodic axes the range grows to |s| <= n*images-1 and
// the images accumulate into the wrapped bins.

use std::f64::consts::PI;
use std::time::Instant;

use rayon::prelude::*;
use tracing::info;

use crate::error::{ConvError, Result};
use crate::grid::{Grid3D, PaddedGrid};
use crate::vector_field::{TensorField, symmetric};

pub const DEFAULT_ACCURACY: f64 = 10.0;

/// Symmetric demag tensor on the padded grid.
///
/// `images[a] > 0` marks axis `a` as periodic, summing displacements up to
/// `dim*images - 1` cells; such axes must not be padded (`exp == dim`).
pub fn build_demag_tensor(
    grid: &Grid3D,
    padded: &PaddedGrid,
    images: [usize; 3],
    accuracy: f64,
) -> Result<TensorField> {
    if grid.dims() != padded.dim {
        return Err(ConvError::ShapeMismatch {
            what: "demag grid",
            expected: padded.dim,
            got: grid.dims(),
        });
    }
    if accuracy.is_nan() || accuracy <= 0.0 {
        return Err(ConvError::Config(format!(
            "demag accuracy must be positive, got {}",
            accuracy
        )));
    }
    let cell = grid.cell_size();
    if cell.iter().any(|&c| c.is_nan() || c <= 0.0) {
        return Err(ConvError::InvalidDimension(format!(
            "cell size must be positive, got {:?}",
            cell
        )));
    }
    for a in 0..3 {
        if images[a] > 0 && padded.exp[a] != padded.dim[a] {
            return Err(ConvError::InvalidDimension(format!(
                "periodic axis {} must not be padded (dim={}, exp={})",
                a, padded.dim[a], padded.exp[a]
            )));
        }
    }

    let t0 = Instant::now();
    let s_max: [isize; 3] = std::array::from_fn(|a| {
        let n = padded.dim[a] as isize;
        if images[a] == 0 {
            n - 1
        } else {
            n * images[a] as isize - 1
        }
    });

    let mut disps = Vec::new();
    for sz in -s_max[2]..=s_max[2] {
        for sy in -s_max[1]..=s_max[1] {
            for sx in -s_max[0]..=s_max[0] {
                disps.push([sx, sy, sz]);
            }
        }
    }

    let entries: Vec<[f64; 6]> = disps
        .par_iter()
        .map(|&s| tensor_entries(cell, s, accuracy))
        .collect();

    let mut n = TensorField::new(6, padded.exp);
    for (s, e) in disps.iter().zip(&entries) {
        for (c, &v) in e.iter().enumerate() {
            n.add_displacement(c, *s, v);
        }
    }

    info!(
        dims = ?padded.dim,
        exp = ?padded.exp,
        ?images,
        accuracy,
        displacements = disps.len(),
        elapsed_ms = t0.elapsed().as_secs_f64() * 1e3,
        "demag tensor built"
    );
    Ok(n)
}

/// (xx, xy, xz, yy, yz, zz) for one displacement in cells.
fn tensor_entries(cell: [f64; 3], s: [isize; 3], accuracy: f64) -> [f64; 6] {
    let centre = [
        s[0] as f64 * cell[0],
        s[1] as f64 * cell[1],
        s[2] as f64 * cell[2],
    ];
    let from_x = h_from_unit_m(0, centre, cell, s, accuracy);
    let from_y = h_from_unit_m(1, centre, cell, s, accuracy);
    let from_z = h_from_unit_m(2, centre, cell, s, accuracy);

    let mut e = [0.0; 6];
    e[symmetric::XX] = from_x[0];
    e[symmetric::XY] = from_y[0];
    e[symmetric::XZ] = from_z[0];
    e[symmetric::YY] = from_y[1];
    e[symmetric::YZ] = from_z[1];
    e[symmetric::ZZ] = from_z[2];

    // Off-diagonals are odd in both of their axes.
    if s[0] == 0 || s[1] == 0 {
        e[symmetric::XY] = 0.0;
    }
    if s[0] == 0 || s[2] == 0 {
        e[symmetric::XZ] = 0.0;
    }
    if s[1] == 0 || s[2] == 0 {
        e[symmetric::YZ] = 0.0;
    }
    e
}

/// Gap between two cells whose centres are `d` cells apart; 0 when they touch.
#[inline]
fn gap_cells(d: isize) -> f64 {
    (d.unsigned_abs() as f64 - 1.0).max(0.0)
}

#[inline]
fn samples(x: f64) -> usize {
    (x.max(1.0) + 0.5).floor() as usize
}

#[inline]
fn midpoint(i: usize, n: usize, len: f64) -> f64 {
    -0.5 * len + len / (2.0 * n as f64) + i as f64 * (len / n as f64)
}

/// Average field in the target cell centred at `centre` from a unit-magnetised
/// source cell at the origin, magnetised along `axis`.
fn h_from_unit_m(
    axis: usize,
    centre: [f64; 3],
    cell: [f64; 3],
    s: [isize; 3],
    accuracy: f64,
) -> [f64; 3] {
    let u = axis;
    let v = (u + 1) % 3;
    let w = (u + 2) % 3;

    let gap: [f64; 3] = std::array::from_fn(|a| gap_cells(s[a]) * cell[a]);
    let mut d = (gap[0] * gap[0] + gap[1] * gap[1] + gap[2] * gap[2]).sqrt();
    if d == 0.0 {
        d = cell[0].min(cell[1]).min(cell[2]);
    }
    let max_size = d / accuracy;

    let nt: [usize; 3] = std::array::from_fn(|a| samples(cell[a] / max_size));
    let nv = 2 * samples(cell[v] / max_size);
    let nw = 2 * samples(cell[w] / max_size);

    let charge = cell[v] * cell[w] / ((nv * nw * nt[0] * nt[1] * nt[2]) as f64);
    let face = 0.5 * cell[u];

    let mut h = [0.0; 3];
    let mut pole = [0.0; 3];
    for i in 0..nv {
        pole[v] = midpoint(i, nv, cell[v]);
        for j in 0..nw {
            pole[w] = midpoint(j, nw, cell[w]);
            for ax in 0..nt[0] {
                let rx = centre[0] + midpoint(ax, nt[0], cell[0]);
                for ay in 0..nt[1] {
                    let ry = centre[1] + midpoint(ay, nt[1], cell[1]);
                    for az in 0..nt[2] {
                        let rz = centre[2] + midpoint(az, nt[2], cell[2]);
                        for (sign, pu) in [(1.0, face), (-1.0, -face)] {
                            pole[u] = pu;
                            let r = [rx - pole[0], ry - pole[1], rz - pole[2]];
                            let dist = (r[0] * r[0] + r[1] * r[1] + r[2] * r[2]).sqrt();
                            let q = sign * charge / (4.0 * PI * dist * dist * dist);
                            h[0] += r[0] * q;
                            h[1] += r[1] * q;
                            h[2] += r[2] * q;
                        }
                    }
                }
            }
        }
    }
    h
}
