use approx::assert_abs_diff_eq;
use ndarray::{array, Array2, Array3, Array4};

use crate::target::fragment::strings::{Action, Spin};
use crate::target::fragment::{FragmentLayout, LocalRootManifold};
use crate::target::operator::{
    hamiltonian_terms, overlap_terms, spin_square_terms, ActiveSpaceIntegrals, TermKind,
};
use crate::target::product::ProductState;
use crate::target::quantum_numbers::ElectronCountTable;
use crate::target::tdm::full::{calc_tdm12s, FullSpaceVector};

#[test]
fn test_integrals_builder_validation() {
    let bad_h1 = ActiveSpaceIntegrals::builder()
        .h1(Array2::zeros((2, 3)))
        .h2(Array4::zeros((2, 2, 2, 2)))
        .build();
    assert!(bad_h1.is_err());

    let bad_h2 = ActiveSpaceIntegrals::builder()
        .h1(Array2::zeros((2, 2)))
        .h2(Array4::zeros((2, 2, 2, 3)))
        .build();
    assert!(bad_h2.is_err());

    let missing_h2 = ActiveSpaceIntegrals::builder()
        .h1(Array2::zeros((2, 2)))
        .build();
    assert!(missing_h2.is_err());

    let ints = ActiveSpaceIntegrals::builder()
        .ecore(-1.5)
        .h1(Array2::zeros((2, 2)))
        .h2(Array4::zeros((2, 2, 2, 2)))
        .build()
        .unwrap();
    assert_eq!(ints.norb(), 2);
    assert_eq!(ints.ecore(), -1.5);
}

#[test]
fn test_random_integrals_symmetry() {
    let ints = ActiveSpaceIntegrals::random(4, 5, false).unwrap();
    assert!(ints.hermiticity_error() < 1e-14);
    assert!(ints.ensure_hermitian(1e-12).is_ok());
    let h2 = ints.h2();
    assert_abs_diff_eq!(h2[(0, 1, 2, 3)], h2[(2, 3, 0, 1)], epsilon = 1e-14);
    assert_abs_diff_eq!(h2[(0, 1, 2, 3)], h2[(1, 0, 3, 2)], epsilon = 1e-14);
    assert!(ints.h1().iter().any(|&x| x != 0.0));

    let zeroed = ActiveSpaceIntegrals::random(4, 5, true).unwrap();
    assert!(zeroed.h1().iter().all(|&x| x == 0.0));
    assert_eq!(zeroed.h2(), ints.h2());
    assert_eq!(ints.without_onee(), zeroed);

    let mut h1 = Array2::<f64>::zeros((2, 2));
    h1[(0, 1)] = 1.0;
    let asym = ActiveSpaceIntegrals::builder()
        .h1(h1)
        .h2(Array4::zeros((2, 2, 2, 2)))
        .build()
        .unwrap();
    assert!(asym.ensure_hermitian(1e-12).is_err());
}

#[test]
fn test_operator_term_slots_and_coefficients() {
    let ints = ActiveSpaceIntegrals::random(3, 1, false).unwrap();
    let terms = hamiltonian_terms(&ints);
    assert_eq!(terms.len(), 7);
    assert!(terms[0].slots().is_empty());
    assert_eq!(terms[0].coefficient(&[]), ints.ecore());

    let two_body = terms
        .iter()
        .find(|term| {
            matches!(
                term.kind(),
                TermKind::TwoBody {
                    sigma: Spin::Alpha,
                    tau: Spin::Beta,
                    ..
                }
            )
        })
        .unwrap();
    let slots = two_body.slots();
    assert_eq!(slots[0].action, Action::Create);
    assert_eq!(slots[1].spin, Spin::Beta);
    assert_eq!(slots[3].spin, Spin::Alpha);
    // Slots (p, r, s, q) = (0, 1, 2, 1) carry ½(01|12).
    assert_abs_diff_eq!(
        two_body.coefficient(&[0, 1, 2, 1]),
        0.5 * ints.h2()[(0, 1, 1, 2)],
        epsilon = 1e-15
    );

    let s2 = spin_square_terms(0.5);
    assert_eq!(s2[0].tied_slots(), &[(0, 1), (2, 3)]);
    assert_eq!(s2[0].coefficient(&[1, 1, 0, 0]), 1.0);
    assert_eq!(s2[0].coefficient(&[1, 0, 0, 0]), 0.0);
    assert_abs_diff_eq!(s2[1].coefficient(&[]), 0.75);
    assert_eq!(overlap_terms()[0].coefficient(&[]), 1.0);
}

#[test]
fn test_contract_single_electron_energy() {
    let layout = FragmentLayout::new(&[2]).unwrap();
    let table = ElectronCountTable::new(
        Array3::from_shape_vec((1, 1, 2), vec![1, 0]).unwrap(),
        None,
    )
    .unwrap();
    let manifold = LocalRootManifold::random(&layout, &table, &array![[1]], 9).unwrap();
    let state = ProductState {
        root: 0,
        lroots: vec![0],
    };
    let vector = FullSpaceVector::from_product_state(&layout, &manifold, &state).unwrap();
    let ints = ActiveSpaceIntegrals::builder()
        .ecore(0.25)
        .h1(array![[-1.0, 0.3], [0.3, -0.5]])
        .h2(Array4::from_elem((2, 2, 2, 2), 0.7))
        .build()
        .unwrap();
    let tdm = calc_tdm12s(&vector, &vector, &layout);
    let energy = ints.contract(&tdm, 1.0).unwrap();

    let c = manifold.get(0, 0).vector(0);
    let (c0, c1) = (c[(0, 0)], c[(1, 0)]);
    let expected = 0.25 - c0 * c0 - 0.5 * c1 * c1 + 2.0 * 0.3 * c0 * c1;
    assert_abs_diff_eq!(energy, expected, epsilon = 1e-12);
}
