use approx::assert_abs_diff_eq;
use ndarray::{array, s, Array1, Array2};

use crate::target::fragment::{FragmentLayout, LocalRootManifold};
use crate::target::matrix::{LassiMatrices, LassiSystem, MatrixTier};
use crate::target::operator::ActiveSpaceIntegrals;
use crate::target::quantum_numbers::ElectronCountTable;
use crate::target::rdm::{
    calc_casdm1s, calc_casdm1s_sub, calc_rdm12s, calc_rdm12s_for_columns, calc_stdm12s,
};

struct RdmTestContext {
    system: LassiSystem,
    matrices: LassiMatrices,
    coefficients: Array1<f64>,
}

/// Two two-orbital fragments with a neutral and a spin-transfer global root in one block, and an
/// ionic global root in another.
fn rdm_context() -> RdmTestContext {
    let layout = FragmentLayout::new(&[2, 2]).unwrap();
    let table = ElectronCountTable::from_state_list(
        &[(1, 1), (1, 1)],
        &[vec![0, 0], vec![1, -1], vec![1, 0]],
        Some(&[vec![0, 0], vec![1, -1], vec![1, 0]][..]),
        None,
    )
    .unwrap();
    let lroots = array![[2, 1, 1], [2, 2, 1]];
    let manifold = LocalRootManifold::random(&layout, &table, &lroots, 11).unwrap();
    let integrals = ActiveSpaceIntegrals::random(4, 23, false).unwrap();
    let system = LassiSystem::new(layout, table, manifold, integrals).unwrap();
    let matrices = MatrixTier::Reference
        .builder(1e-10)
        .build(&system)
        .unwrap();
    let coefficients = Array1::from_shape_fn(system.basis().dim(), |i| {
        if i < 6 {
            0.3 + 0.1 * i as f64
        } else {
            0.0
        }
    });
    RdmTestContext {
        system,
        matrices,
        coefficients,
    }
}

#[test]
fn test_rdm_energy_matches_hamiltonian_expectation() {
    let ctx = rdm_context();
    let c = &ctx.coefficients;
    let norm = c.dot(&ctx.matrices.ovlp.dot(c));
    let energy = c.dot(&ctx.matrices.ham.dot(c));
    let rdm = calc_rdm12s(&ctx.system, c.view()).unwrap();
    let rdm_energy = ctx.system.integrals().contract(&rdm, norm).unwrap();
    assert_abs_diff_eq!(rdm_energy, energy, epsilon = 1e-10);

    // Two α and two β electrons.
    let trace_a = rdm.dm1s.slice(s![0, .., ..]).diag().sum();
    let trace_b = rdm.dm1s.slice(s![1, .., ..]).diag().sum();
    assert_abs_diff_eq!(trace_a, 2.0 * norm, epsilon = 1e-10);
    assert_abs_diff_eq!(trace_b, 2.0 * norm, epsilon = 1e-10);
}

#[test]
fn test_rdm_columns_match_single_states() {
    let ctx = rdm_context();
    let dim = ctx.system.basis().dim();
    let mut columns = Array2::<f64>::zeros((dim, 2));
    columns.column_mut(0).assign(&ctx.coefficients);
    columns[(6, 1)] = 1.0;
    let rdms = calc_rdm12s_for_columns(&ctx.system, &columns).unwrap();
    assert_eq!(rdms.len(), 2);
    assert_eq!(
        rdms[0],
        calc_rdm12s(&ctx.system, ctx.coefficients.view()).unwrap()
    );
    // A single product state has the same density as its own state-transition density.
    let single = calc_stdm12s(&ctx.system, 6, 6).unwrap();
    for (a, b) in rdms[1].dm2ab.iter().zip(single.dm2ab.iter()) {
        assert_abs_diff_eq!(a, b, epsilon = 1e-14);
    }
}

#[test]
fn test_stdm_contracts_to_matrix_elements() {
    let ctx = rdm_context();
    let dim = ctx.system.basis().dim();
    for (bra, ket) in [(0, 0), (0, 3), (2, 5), (4, 1), (0, 6), (6, 6)] {
        let stdm = calc_stdm12s(&ctx.system, bra, ket).unwrap();
        let element = ctx
            .system
            .integrals()
            .contract(&stdm, ctx.matrices.ovlp[(bra, ket)])
            .unwrap();
        assert_abs_diff_eq!(element, ctx.matrices.ham[(bra, ket)], epsilon = 1e-10);
    }
    assert!(calc_stdm12s(&ctx.system, 0, dim).is_err());
}

#[test]
fn test_casdm1s_matches_full_space_blocks() {
    let ctx = rdm_context();
    let rdm = calc_rdm12s(&ctx.system, ctx.coefficients.view()).unwrap();
    let subs = calc_casdm1s_sub(&ctx.system, ctx.coefficients.view()).unwrap();
    assert_eq!(subs.len(), 2);
    let layout = ctx.system.layout();
    for (frag, sub) in subs.iter().enumerate() {
        let range = layout.offset(frag)..layout.offset(frag) + layout.norb(frag);
        let full = rdm.dm1s.slice(s![.., range.clone(), range]);
        for (a, b) in sub.iter().zip(full.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-10);
        }
    }

    let casdm1s = calc_casdm1s(&ctx.system, ctx.coefficients.view()).unwrap();
    assert_eq!(casdm1s.shape(), &[2, 4, 4]);
    assert_abs_diff_eq!(
        casdm1s.slice(s![.., 0..2, 2..4]).iter().map(|x| x.abs()).sum::<f64>(),
        0.0
    );
    assert_abs_diff_eq!(
        casdm1s.slice(s![1, 2..4, 2..4]).diag().sum(),
        rdm.dm1s.slice(s![1, 2..4, 2..4]).diag().sum(),
        epsilon = 1e-10
    );
}

#[test]
fn test_rdm_rejects_wrong_coefficient_length() {
    let ctx = rdm_context();
    let short = Array1::<f64>::ones(3);
    assert!(calc_rdm12s(&ctx.system, short.view()).is_err());
    assert!(calc_casdm1s_sub(&ctx.system, short.view()).is_err());
}
