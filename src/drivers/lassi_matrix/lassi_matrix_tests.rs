use approx::assert_abs_diff_eq;
use ndarray::array;
use serial_test::serial;

use crate::drivers::lassi_matrix::{LassiMatrixDriver, LassiMatrixParams};
use crate::drivers::LassiDriver;
use crate::io::{read_lassi_binary, LassiFileType};
use crate::target::fingerprint::DEFAULT_FINGERPRINT_TOLERANCE;
use crate::target::fragment::{FragmentLayout, LocalRootManifold};
use crate::target::matrix::{LassiMatrices, LassiSystem, MatrixTier};
use crate::target::operator::ActiveSpaceIntegrals;
use crate::target::quantum_numbers::ElectronCountTable;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two two-orbital fragments at half filling with one charge-transfer and one spin-flip global
/// root.
fn driver_system() -> LassiSystem {
    let layout = FragmentLayout::new(&[2, 2]).unwrap();
    let table = ElectronCountTable::from_state_list(
        &[(1, 1), (1, 1)],
        &[vec![0, 0], vec![1, -1], vec![0, 0]],
        Some(&[vec![0, 0], vec![1, -1], vec![2, -2]][..]),
        None,
    )
    .unwrap();
    let manifold =
        LocalRootManifold::random(&layout, &table, &array![[2, 1, 1], [2, 2, 1]], 7).unwrap();
    let integrals = ActiveSpaceIntegrals::random(4, 13, false).unwrap();
    LassiSystem::new(layout, table, manifold, integrals).unwrap()
}

#[test]
fn test_drivers_lassi_matrix_params() {
    let params = LassiMatrixParams::default();
    assert_eq!(params.tier, MatrixTier::Blocked);
    assert_eq!(params.cross_check, vec![MatrixTier::Reference]);
    assert_eq!(params.fingerprint_tolerance, DEFAULT_FINGERPRINT_TOLERANCE);
    assert!(params.solve_si);
    assert!(params.matrices_save_name.is_none());

    assert!(LassiMatrixParams::builder()
        .fingerprint_tolerance(0.0)
        .build()
        .is_err());
    assert!(LassiMatrixParams::builder()
        .linear_dependence_threshold(-1e-8)
        .build()
        .is_err());

    let from_yaml: LassiMatrixParams =
        serde_yaml::from_str("tier: Cached\nsolve_si: false\n").unwrap();
    assert_eq!(from_yaml.tier, MatrixTier::Cached);
    assert!(!from_yaml.solve_si);
    assert_eq!(from_yaml.cross_check, vec![MatrixTier::Reference]);
    assert_eq!(from_yaml.linear_dependence_threshold, 1e-8);
}

#[test]
#[serial]
fn test_drivers_lassi_matrix_default_run() {
    init_logger();
    let system = driver_system();
    let params = LassiMatrixParams::default();
    let mut driver = LassiMatrixDriver::builder()
        .parameters(&params)
        .system(&system)
        .build()
        .unwrap();
    assert!(driver.result().is_err());
    driver.run().unwrap();
    let result = driver.result().unwrap();

    assert_eq!(result.matrices.dim(), system.basis().dim());
    assert!(result.passed());
    assert!(result.mismatches().is_empty());
    // Blocked against reference is checked on every global-root pair of every matrix kind.
    assert_eq!(result.comparisons.len(), 1);
    assert_eq!(result.comparisons[0].0, MatrixTier::Reference);
    assert_eq!(result.comparisons[0].1.len(), 3 * 3 * 3);
    assert!(result.comparisons[0]
        .1
        .iter()
        .all(|comparison| comparison.root_pair.is_some()));

    let si = result.si.as_ref().unwrap();
    assert!(si.vectors().nstates() > 0);
    // Four electrons allow at most S = 2.
    for &s2 in si.s2().iter() {
        assert!(s2 > -1e-10 && s2 < 6.0 + 1e-10);
    }
    assert_abs_diff_eq!(
        si.energies()[0],
        si.energies().iter().copied().fold(f64::INFINITY, f64::min),
        epsilon = 1e-14
    );
    assert!(result.to_string().contains("LASSI Matrix Summary"));
}

#[test]
#[serial]
fn test_drivers_lassi_matrix_cross_checks() {
    init_logger();
    let system = driver_system();
    let params = LassiMatrixParams::builder()
        .tier(MatrixTier::Cached)
        .cross_check(vec![
            MatrixTier::Reference,
            MatrixTier::Cached,
            MatrixTier::Blocked,
            MatrixTier::Reference,
        ])
        .solve_si(false)
        .build()
        .unwrap();
    let mut driver = LassiMatrixDriver::builder()
        .parameters(&params)
        .system(&system)
        .build()
        .unwrap();
    driver.run().unwrap();
    let result = driver.result().unwrap();
    assert!(result.si.is_none());
    assert!(result.passed());
    assert_eq!(result.comparisons.len(), 2);

    let (tier, full) = &result.comparisons[0];
    assert_eq!(*tier, MatrixTier::Reference);
    assert_eq!(full.len(), 3);
    assert!(full.iter().all(|comparison| comparison.root_pair.is_none()));

    let (tier, blocks) = &result.comparisons[1];
    assert_eq!(*tier, MatrixTier::Blocked);
    assert_eq!(blocks.len(), 27);
}

#[test]
#[serial]
fn test_drivers_lassi_matrix_save() {
    init_logger();
    let system = driver_system();
    let name = std::env::temp_dir().join("lassi_driver_test_matrices");
    let params = LassiMatrixParams::builder()
        .cross_check(vec![])
        .solve_si(false)
        .matrices_save_name(Some(name.clone()))
        .build()
        .unwrap();
    let mut driver = LassiMatrixDriver::builder()
        .parameters(&params)
        .system(&system)
        .build()
        .unwrap();
    driver.run().unwrap();
    let result = driver.result().unwrap();
    assert!(result.comparisons.is_empty());
    let saved: LassiMatrices = read_lassi_binary(&name, LassiFileType::Mat).unwrap();
    assert_eq!(saved, result.matrices);
}

#[test]
fn test_drivers_lassi_matrix_rejects_non_hermitian_integrals_for_blocked_tier() {
    let system = driver_system();
    let mut h1 = system.integrals().h1().clone();
    h1[(0, 1)] += 0.1;
    let asym = ActiveSpaceIntegrals::builder()
        .h1(h1)
        .h2(system.integrals().h2().clone())
        .build()
        .unwrap();
    let system = system.with_integrals(asym).unwrap();

    let params = LassiMatrixParams::default();
    assert!(LassiMatrixDriver::builder()
        .parameters(&params)
        .system(&system)
        .build()
        .is_err());

    let params = LassiMatrixParams::builder()
        .tier(MatrixTier::Cached)
        .solve_si(false)
        .build()
        .unwrap();
    assert!(LassiMatrixDriver::builder()
        .parameters(&params)
        .system(&system)
        .build()
        .is_ok());
}
