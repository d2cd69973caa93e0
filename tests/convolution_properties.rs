// tests/convolution_properties.rs
//
// End-to-end checks of the FFT executors against the direct sum and basic
// algebraic properties.
//
// Run:
//   cargo test --release --test convolution_properties -- --nocapture

use approx::assert_relative_eq;

use demag_conv::demag_tensor::build_demag_tensor;
use demag_conv::direct;
use demag_conv::vector_field::{antisymmetric, symmetric};
use demag_conv::{
    AxisOrder, Backend, ConvError, ConvolutionConfig, Grid3D, PaddedGrid, ScalarField3D,
    SymmetricMatrixVectorConvolution, TensorField, VectorField3D, VectorVectorConvolution,
};

fn xorshift64(seed: &mut u64) -> u64 {
    let mut x = *seed;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *seed = x;
    x
}

fn rand_pm1(seed: &mut u64) -> f64 {
    2.0 * (xorshift64(seed) as f64 / u64::MAX as f64) - 1.0
}

fn random_tensor(entries: usize, dims: [usize; 3], seed0: u64) -> TensorField {
    let mut seed = seed0;
    let mut n = TensorField::new(entries, dims);
    for c in 0..entries {
        for v in n.component_mut(c) {
            *v = rand_pm1(&mut seed);
        }
    }
    n
}

fn random_vector(dims: [usize; 3], seed0: u64) -> VectorField3D {
    let mut seed = seed0;
    let mut m = VectorField3D::new(dims);
    for i in 0..m.n_cells() {
        m.set(i, [rand_pm1(&mut seed), rand_pm1(&mut seed), rand_pm1(&mut seed)]);
    }
    m
}

fn random_scalar(dims: [usize; 3], seed0: u64) -> ScalarField3D {
    let mut seed = seed0;
    let mut s = ScalarField3D::new(dims);
    for v in &mut s.data {
        *v = rand_pm1(&mut seed);
    }
    s
}

fn rel_err(test: &VectorField3D, reference: &VectorField3D) -> f64 {
    test.max_abs_diff(reference) / reference.max_abs().max(1e-300)
}

fn parallel_config() -> ConvolutionConfig {
    ConvolutionConfig {
        backend: Backend::Parallel,
        threads: Some(2),
        ..ConvolutionConfig::default()
    }
}

fn check_symmetric_against_direct(grid: PaddedGrid, cfg: &ConvolutionConfig, seed: u64) {
    let n = random_tensor(6, grid.exp, seed);
    let m = random_vector(grid.dim, seed ^ 0x9e37_79b9);
    let reference = direct::convolve_symmetric(&n, &m).unwrap();

    let mut conv = SymmetricMatrixVectorConvolution::new(&n, grid, cfg).unwrap();
    let mut h = VectorField3D::new(grid.dim);
    conv.execute(&m, &mut h).unwrap();

    let err = rel_err(&h, &reference);
    println!(
        "symmetric dim={:?} exp={:?} order={} backend={} err={:.3e}",
        grid.dim,
        grid.exp,
        conv.axis_order().name(),
        conv.backend().name(),
        err
    );
    assert!(err < 1e-10, "relative error {:.3e}", err);
}

#[test]
fn symmetric_matches_direct_sum_open_boundaries() {
    let grid = PaddedGrid::open([5, 3, 4]).unwrap();
    check_symmetric_against_direct(grid, &ConvolutionConfig::default(), 1);
    check_symmetric_against_direct(grid, &parallel_config(), 2);
}

#[test]
fn symmetric_matches_direct_sum_periodic_axes() {
    let grid = PaddedGrid::with_periodic([4, 6, 2], [true, false, true]).unwrap();
    assert_eq!(grid.exp[0], 4);
    assert_eq!(grid.exp[2], 2);
    check_symmetric_against_direct(grid, &ConvolutionConfig::default(), 3);
}

#[test]
fn symmetric_matches_direct_sum_thin_film_both_orders() {
    let grid = PaddedGrid::open([6, 5, 1]).unwrap();
    assert!(grid.is_thin_film());
    check_symmetric_against_direct(grid, &ConvolutionConfig::default(), 4);

    let zxy = ConvolutionConfig {
        axis_order: Some(AxisOrder::Zxy),
        ..ConvolutionConfig::default()
    };
    check_symmetric_against_direct(grid, &zxy, 5);
}

#[test]
fn antisymmetric_matches_direct_sum() {
    for (grid, seed) in [
        (PaddedGrid::open([4, 3, 2]).unwrap(), 11u64),
        (PaddedGrid::open([7, 4, 1]).unwrap(), 12),
    ] {
        let n = random_tensor(3, grid.exp, seed);
        let m = random_vector(grid.dim, seed + 100);
        let reference = direct::convolve_antisymmetric(&n, &m).unwrap();

        for cfg in [ConvolutionConfig::default(), parallel_config()] {
            let mut conv = VectorVectorConvolution::new(&n, grid, &cfg).unwrap();
            let mut h = VectorField3D::new(grid.dim);
            conv.execute(&m, &mut h).unwrap();
            let err = rel_err(&h, &reference);
            assert!(err < 1e-10, "{} err {:.3e}", cfg.backend.name(), err);
        }
    }
}

#[test]
fn dot_and_scalar_match_direct_sum() {
    let grid = PaddedGrid::open([4, 4, 3]).unwrap();
    let n = random_tensor(3, grid.exp, 21);
    let m = random_vector(grid.dim, 22);
    let s = random_scalar(grid.dim, 23);

    let mut conv =
        VectorVectorConvolution::new(&n, grid, &ConvolutionConfig::default()).unwrap();

    let dot_ref = direct::convolve_dot(&n, &m).unwrap();
    let mut dot = ScalarField3D::new(grid.dim);
    conv.execute_dot(&m, &mut dot).unwrap();
    let scale = dot_ref.data.iter().fold(0.0f64, |a, v| a.max(v.abs()));
    assert!(dot.max_abs_diff(&dot_ref) / scale < 1e-10);

    let scalar_ref = direct::convolve_scalar(&n, &s).unwrap();
    let mut v = VectorField3D::new(grid.dim);
    conv.execute_scalar(&s, &mut v).unwrap();
    assert!(rel_err(&v, &scalar_ref) < 1e-10);
}

#[test]
fn convolution_is_linear() {
    let grid = PaddedGrid::open([4, 3, 2]).unwrap();
    let n = random_tensor(6, grid.exp, 31);
    let a = random_vector(grid.dim, 32);
    let b = random_vector(grid.dim, 33);
    let (alpha, beta) = (1.5, -0.25);
    let ab = a.linear_combination(alpha, &b, beta);

    let mut conv =
        SymmetricMatrixVectorConvolution::new(&n, grid, &ConvolutionConfig::default()).unwrap();
    let mut ha = VectorField3D::new(grid.dim);
    let mut hb = VectorField3D::new(grid.dim);
    let mut hab = VectorField3D::new(grid.dim);
    conv.execute(&a, &mut ha).unwrap();
    conv.execute(&b, &mut hb).unwrap();
    conv.execute(&ab, &mut hab).unwrap();

    let expected = ha.linear_combination(alpha, &hb, beta);
    assert!(rel_err(&hab, &expected) < 1e-10);

    let na = random_tensor(3, grid.exp, 34);
    let mut conv = VectorVectorConvolution::new(&na, grid, &parallel_config()).unwrap();
    conv.execute(&a, &mut ha).unwrap();
    conv.execute(&b, &mut hb).unwrap();
    conv.execute(&ab, &mut hab).unwrap();
    let expected = ha.linear_combination(alpha, &hb, beta);
    assert!(rel_err(&hab, &expected) < 1e-10);
}

#[test]
fn scaled_identity_tensor_scales_input() {
    let grid = PaddedGrid::open([3, 4, 2]).unwrap();
    let c = -0.75;
    let mut n = TensorField::new(6, grid.exp);
    for comp in [symmetric::XX, symmetric::YY, symmetric::ZZ] {
        n.set_displacement(comp, [0, 0, 0], c);
    }
    let m = random_vector(grid.dim, 41);

    let mut conv =
        SymmetricMatrixVectorConvolution::new(&n, grid, &ConvolutionConfig::default()).unwrap();
    let mut h = VectorField3D::new(grid.dim);
    conv.execute(&m, &mut h).unwrap();

    for i in 0..m.n_cells() {
        let (got, want) = (h.get(i), m.get(i));
        for k in 0..3 {
            assert_relative_eq!(got[k], c * want[k], epsilon = 1e-12);
        }
    }
}

#[test]
fn zero_input_gives_zero_output() {
    let grid = PaddedGrid::open([4, 4, 1]).unwrap();
    let n = random_tensor(6, grid.exp, 51);
    let m = VectorField3D::new(grid.dim);
    let mut h = VectorField3D::new(grid.dim);
    h.set_uniform(7.0, 7.0, 7.0);

    let mut conv = SymmetricMatrixVectorConvolution::new(&n, grid, &parallel_config()).unwrap();
    conv.execute(&m, &mut h).unwrap();
    assert_eq!(h.max_abs(), 0.0);
}

#[test]
fn zero_input_gives_zero_output_for_vector_kernels() {
    let grid = PaddedGrid::open([3, 4, 2]).unwrap();
    let n = random_tensor(3, grid.exp, 52);
    let m = VectorField3D::new(grid.dim);
    let s = ScalarField3D::new(grid.dim);

    for cfg in [ConvolutionConfig::default(), parallel_config()] {
        let mut conv = VectorVectorConvolution::new(&n, grid, &cfg).unwrap();

        let mut h = VectorField3D::new(grid.dim);
        h.set_uniform(-3.0, 4.0, 5.0);
        conv.execute(&m, &mut h).unwrap();
        assert_eq!(h.max_abs(), 0.0, "{} antisymmetric", cfg.backend.name());

        let mut dot = ScalarField3D::new(grid.dim);
        dot.fill(2.5);
        conv.execute_dot(&m, &mut dot).unwrap();
        assert!(dot.data.iter().all(|&v| v == 0.0), "{} dot", cfg.backend.name());

        h.set_uniform(1.0, 1.0, 1.0);
        conv.execute_scalar(&s, &mut h).unwrap();
        assert_eq!(h.max_abs(), 0.0, "{} scalar", cfg.backend.name());
    }
}

#[test]
fn two_cube_delta_case() {
    let grid = PaddedGrid::open([2, 2, 2]).unwrap();
    let mut n = TensorField::new(6, grid.exp);
    n.set_displacement(symmetric::XX, [0, 0, 0], 1.0);
    let mut m = VectorField3D::new(grid.dim);
    m.set_uniform(1.0, 0.0, 0.0);

    for cfg in [ConvolutionConfig::default(), parallel_config()] {
        let mut conv = SymmetricMatrixVectorConvolution::new(&n, grid, &cfg).unwrap();
        let mut h = VectorField3D::new(grid.dim);
        conv.execute(&m, &mut h).unwrap();
        for i in 0..h.n_cells() {
            let v = h.get(i);
            assert_relative_eq!(v[0], 1.0, epsilon = 1e-12);
            assert!(v[1].abs() < 1e-12 && v[2].abs() < 1e-12);
        }
    }
}

#[test]
fn single_precision_parallel_tracks_double_precision_cpu() {
    let grid = PaddedGrid::open([8, 6, 3]).unwrap();
    let n = random_tensor(6, grid.exp, 61);
    let m = random_vector(grid.dim, 62);

    let mut cpu =
        SymmetricMatrixVectorConvolution::new(&n, grid, &ConvolutionConfig::default()).unwrap();
    let mut reference = VectorField3D::new(grid.dim);
    cpu.execute(&m, &mut reference).unwrap();

    let mut gpu =
        SymmetricMatrixVectorConvolution::<f32>::with_precision(&n, grid, &parallel_config())
            .unwrap();
    let mut h = VectorField3D::new(grid.dim);
    gpu.execute(&m, &mut h).unwrap();

    let err = rel_err(&h, &reference);
    println!("f32 parallel vs f64 cpu: {:.3e}", err);
    assert!(err < 1e-5, "relative error {:.3e}", err);
}

#[test]
fn shape_mismatch_leaves_result_untouched() {
    let grid = PaddedGrid::open([4, 4, 2]).unwrap();
    let n = random_tensor(6, grid.exp, 71);
    let mut conv =
        SymmetricMatrixVectorConvolution::new(&n, grid, &ConvolutionConfig::default()).unwrap();

    let wrong = VectorField3D::new([4, 3, 2]);
    let mut h = VectorField3D::new(grid.dim);
    h.set_uniform(1.0, 2.0, 3.0);
    let before = h.clone();
    assert!(matches!(
        conv.execute(&wrong, &mut h),
        Err(ConvError::ShapeMismatch { .. })
    ));
    assert_eq!(h, before);

    let m = VectorField3D::new(grid.dim);
    let mut small = VectorField3D::new([2, 2, 2]);
    assert!(conv.execute(&m, &mut small).is_err());
}

#[test]
fn wrong_tensor_entry_count_is_rejected() {
    let grid = PaddedGrid::open([3, 3, 1]).unwrap();
    let n6 = TensorField::new(6, grid.exp);
    let n3 = TensorField::new(3, grid.exp);
    let cfg = ConvolutionConfig::default();
    assert!(matches!(
        VectorVectorConvolution::new(&n6, grid, &cfg),
        Err(ConvError::InvalidComponentCount { .. })
    ));
    assert!(matches!(
        SymmetricMatrixVectorConvolution::new(&n3, grid, &cfg),
        Err(ConvError::InvalidComponentCount { .. })
    ));
}

#[test]
fn uncached_scratch_gives_same_result() {
    let grid = PaddedGrid::open([5, 4, 2]).unwrap();
    let n = random_tensor(3, grid.exp, 81);
    let m = random_vector(grid.dim, 82);

    let cached = ConvolutionConfig::default();
    let uncached = ConvolutionConfig {
        cache_scratch: false,
        ..ConvolutionConfig::default()
    };

    let mut a = VectorVectorConvolution::new(&n, grid, &cached).unwrap();
    let mut b = VectorVectorConvolution::new(&n, grid, &uncached).unwrap();
    let mut ha = VectorField3D::new(grid.dim);
    let mut hb = VectorField3D::new(grid.dim);
    for _ in 0..2 {
        a.execute(&m, &mut ha).unwrap();
        b.execute(&m, &mut hb).unwrap();
        assert_eq!(ha, hb);
    }
}

#[test]
fn antisymmetric_kernel_components_follow_cross_product_layout() {
    // Only xy is set: h = (Nxy*My, -Nxy*Mx, 0).
    let grid = PaddedGrid::open([2, 2, 1]).unwrap();
    let mut n = TensorField::new(3, grid.exp);
    n.set_displacement(antisymmetric::XY, [0, 0, 0], 2.0);
    let mut m = VectorField3D::new(grid.dim);
    m.set_uniform(1.0, 3.0, 5.0);

    let mut conv =
        VectorVectorConvolution::new(&n, grid, &ConvolutionConfig::default()).unwrap();
    let mut h = VectorField3D::new(grid.dim);
    conv.execute(&m, &mut h).unwrap();
    for i in 0..h.n_cells() {
        let v = h.get(i);
        assert_relative_eq!(v[0], 6.0, epsilon = 1e-12);
        assert_relative_eq!(v[1], -2.0, epsilon = 1e-12);
        assert!(v[2].abs() < 1e-12);
    }
}

#[test]
fn demag_of_uniform_film_is_close_to_minus_mz() {
    let (nx, ny) = (24, 24);
    let grid = Grid3D::new(nx, ny, 1, 5e-9, 5e-9, 2e-9);
    let padded = PaddedGrid::open(grid.dims()).unwrap();
    let n = build_demag_tensor(&grid, &padded, [0; 3], 4.0).unwrap();

    let mut conv =
        SymmetricMatrixVectorConvolution::new(&n, padded, &ConvolutionConfig::default()).unwrap();
    assert_eq!(conv.axis_order(), AxisOrder::Yzx);

    let mut m = VectorField3D::on_grid(&grid);
    m.set_uniform(0.0, 0.0, 1.0);
    let mut h = VectorField3D::on_grid(&grid);
    conv.execute(&m, &mut h).unwrap();

    let centre = h.get(h.idx(nx / 2, ny / 2, 0));
    println!("centre H/Ms = {:?}", centre);
    assert!(centre[2] < -0.8 && centre[2] > -1.0, "Hz = {}", centre[2]);
    assert!(centre[0].abs() < 1e-6 && centre[1].abs() < 1e-6);
}
