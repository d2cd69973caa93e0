// src/vec3.rs

/// 3D vector dot product.
#[inline]
pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// 3D vector cross product: a × b.
#[inline]
pub fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Symmetric 3×3 matrix (xx, xy, xz, yy, yz, zz) times vector.
#[inline]
pub fn sym_mat_vec(n: [f64; 6], m: [f64; 3]) -> [f64; 3] {
    [
        n[0] * m[0] + n[1] * m[1] + n[2] * m[2],
        n[1] * m[0] + n[3] * m[1] + n[4] * m[2],
        n[2] * m[0] + n[4] * m[1] + n[5] * m[2],
    ]
}

/// Antisymmetric matrix with upper entries (xy, xz, yz) times vector.
///
/// Equals `m × (yz, -xz, xy)`.
#[inline]
pub fn antisym_mat_vec(n: [f64; 3], m: [f64; 3]) -> [f64; 3] {
    cross(m, [n[2], -n[1], n[0]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn antisymmetric_product_matches_explicit_matrix() {
        let n = [0.3, -1.2, 2.5];
        let m = [1.0, -2.0, 0.5];
        let explicit = [
            n[0] * m[1] + n[1] * m[2],
            -n[0] * m[0] + n[2] * m[2],
            -n[1] * m[0] - n[2] * m[1],
        ];
        let got = antisym_mat_vec(n, m);
        for i in 0..3 {
            assert!((got[i] - explicit[i]).abs() < 1e-14, "i={} got={:?}", i, got);
        }
        // Antisymmetric operators never change the component along m.
        assert!(dot(got, m).abs() < 1e-14);
    }

    #[test]
    fn symmetric_identity_is_identity() {
        let m = [1.5, -0.25, 4.0];
        assert_eq!(sym_mat_vec([1.0, 0.0, 0.0, 1.0, 0.0, 1.0], m), m);
    }
}
