use approx::assert_abs_diff_eq;
use ndarray::{array, Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::target::fragment::{FragmentLayout, LocalRootManifold};
use crate::target::matrix::{LassiMatrices, LassiSystem, MatrixTier};
use crate::target::operator::ActiveSpaceIntegrals;
use crate::target::quantum_numbers::{ElectronCountTable, QuantumNumbers};
use crate::target::rdm::calc_rdm12s;
use crate::target::si::{solve_si, GeneralisedEigenvalueSolvable, SiVectors};

const THRESH: f64 = 1e-8;

fn build(system: LassiSystem) -> (LassiSystem, LassiMatrices) {
    let matrices = MatrixTier::Cached.builder(1e-10).build(&system).unwrap();
    (system, matrices)
}

/// A single α electron hopping between two one-orbital fragments.
fn hopping_system() -> (LassiSystem, LassiMatrices) {
    let layout = FragmentLayout::new(&[1, 1]).unwrap();
    let table = ElectronCountTable::new(
        Array3::from_shape_vec((2, 2, 2), vec![1, 0, 0, 0, 0, 0, 1, 0]).unwrap(),
        None,
    )
    .unwrap();
    let manifold =
        LocalRootManifold::random(&layout, &table, &Array2::from_elem((2, 2), 1), 3).unwrap();
    let integrals = ActiveSpaceIntegrals::builder()
        .ecore(0.5)
        .h1(array![[-1.0, 0.2], [0.2, -0.7]])
        .h2(ActiveSpaceIntegrals::random(2, 1, true).unwrap().h2().clone())
        .build()
        .unwrap();
    build(LassiSystem::new(layout, table, manifold, integrals).unwrap())
}

/// Two two-orbital fragments with non-orthogonal local roots spread over two blocks.
fn two_block_system() -> (LassiSystem, LassiMatrices) {
    let layout = FragmentLayout::new(&[2, 2]).unwrap();
    let table = ElectronCountTable::from_state_list(
        &[(1, 1), (1, 1)],
        &[vec![0, 0], vec![1, -1], vec![1, 0]],
        Some(&[vec![0, 0], vec![1, -1], vec![1, 0]][..]),
        None,
    )
    .unwrap();
    let manifold =
        LocalRootManifold::random(&layout, &table, &array![[2, 1, 2], [2, 2, 1]], 29).unwrap();
    let integrals = ActiveSpaceIntegrals::random(4, 31, false).unwrap();
    build(LassiSystem::new(layout, table, manifold, integrals).unwrap())
}

#[test]
fn test_si_hopping_exact() {
    let (system, matrices) = hopping_system();
    let solution = solve_si(&system, &matrices, THRESH, THRESH).unwrap();
    assert_eq!(solution.vectors().nstates(), 2);
    assert_abs_diff_eq!(solution.energies()[0], -0.6, epsilon = 1e-10);
    assert_abs_diff_eq!(solution.energies()[1], -0.1, epsilon = 1e-10);
    for s2 in solution.s2().iter() {
        assert_abs_diff_eq!(*s2, 0.75, epsilon = 1e-10);
    }
    let qns = QuantumNumbers {
        nelec: 1,
        two_sz: 1,
        irrep: None,
    };
    assert_eq!(solution.vectors().rootsym(), &[qns, qns]);
}

#[test]
fn test_si_generalised_eigenproblem() {
    let (system, matrices) = two_block_system();
    let solution = solve_si(&system, &matrices, THRESH, THRESH).unwrap();
    let vectors = solution.vectors();
    assert!(vectors.nstates() <= system.basis().dim());
    assert!(solution
        .energies()
        .windows(2)
        .into_iter()
        .all(|w| w[0] <= w[1]));

    for (k, c) in vectors.coefficients().columns().into_iter().enumerate() {
        let energy = solution.energies()[k];
        assert_abs_diff_eq!(c.dot(&matrices.ovlp.dot(&c)), 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(c.dot(&matrices.ham.dot(&c)), energy, epsilon = 1e-8);
        let residual = matrices.ham.dot(&c) - matrices.ovlp.dot(&c) * energy;
        for r in residual.iter() {
            assert_abs_diff_eq!(*r, 0.0, epsilon = 1e-7);
        }
        assert_abs_diff_eq!(
            c.dot(&matrices.s2.dot(&c)),
            solution.s2()[k],
            epsilon = 1e-12
        );
        // The energy from the reduced density matrices is the SI energy.
        let rdm = calc_rdm12s(&system, c).unwrap();
        assert_abs_diff_eq!(
            system.integrals().contract(&rdm, 1.0).unwrap(),
            energy,
            epsilon = 1e-8
        );
    }

    // Variational bound by the lowest Rayleigh quotient of a single product state.
    let lowest_diag = (0..system.basis().dim())
        .map(|i| matrices.ham[(i, i)] / matrices.ovlp[(i, i)])
        .fold(f64::INFINITY, f64::min);
    assert!(solution.energies()[0] <= lowest_diag + 1e-10);
}

#[test]
fn test_si_vectors_reject_stray_weight() {
    let (system, _) = two_block_system();
    let dim = system.basis().dim();
    let qns = *system.indexer().quantum_numbers(0);
    let mut coefficients = Array2::<f64>::zeros((dim, 1));
    coefficients[(0, 0)] = 1.0;
    assert!(SiVectors::new(&system, coefficients.clone(), vec![qns]).is_ok());
    assert!(SiVectors::new(&system, coefficients.clone(), vec![]).is_err());

    // The last product state belongs to the ionic block.
    coefficients[(dim - 1, 0)] = 0.5;
    assert!(SiVectors::new(&system, coefficients, vec![qns]).is_err());
}

#[test]
fn test_generalised_eigenproblem_discards_linear_dependence() {
    let hmat = array![[1.0, 0.5, 1.0], [0.5, 2.0, 0.5], [1.0, 0.5, 1.0]];
    let smat = array![[1.0, 0.0, 1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 1.0]];
    let res = (&hmat.view(), &smat.view())
        .solve_generalised_eigenvalue_problem_with_canonical_orthogonalisation(THRESH, THRESH)
        .unwrap();
    assert_eq!(res.eigenvalues().len(), 2);
    // In the basis {(e0 + e2)/2, e1} the problem is [[1, 0.5], [0.5, 2]].
    let disc = 0.5f64.sqrt();
    assert_abs_diff_eq!(res.eigenvalues()[0], 1.5 - disc, epsilon = 1e-10);
    assert_abs_diff_eq!(res.eigenvalues()[1], 1.5 + disc, epsilon = 1e-10);

    let asymmetric = array![[1.0, 0.3], [0.0, 1.0]];
    let identity = Array2::<f64>::eye(2);
    assert!((&asymmetric.view(), &identity.view())
        .solve_generalised_eigenvalue_problem_with_canonical_orthogonalisation(THRESH, THRESH)
        .is_err());
}

#[test]
fn test_si_vectors_transform_matrices() {
    let (system, matrices) = two_block_system();
    let solution = solve_si(&system, &matrices, THRESH, THRESH).unwrap();
    let vectors = solution.vectors();
    let n = vectors.nstates();

    let ovlp = vectors.transform(&matrices.ovlp.view()).unwrap();
    let ham = vectors.transform(&matrices.ham.view()).unwrap();
    for i in 0..n {
        for j in 0..n {
            let delta = if i == j { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(ovlp[(i, j)], delta, epsilon = 1e-8);
            let energy = if i == j { solution.energies()[i] } else { 0.0 };
            assert_abs_diff_eq!(ham[(i, j)], energy, epsilon = 1e-8);
        }
    }
    assert!(vectors.transform(&Array2::<f64>::eye(2).view()).is_err());
}

#[test]
fn test_generalised_eigenproblem_tolerates_near_linear_dependence() {
    // Ten vectors spanning four dimensions, perturbed so that the overlap matrix has six small
    // but retained eigenvalues.
    let mut rng = StdRng::seed_from_u64(7);
    let bmat = Array2::from_shape_fn((10, 4), |_| rng.gen_range(-1.0..1.0));
    let cmat = Array2::from_shape_fn((4, 10), |_| rng.gen_range(-1.0..1.0));
    let noise = Array2::from_shape_fn((10, 10), |_| 3e-4 * rng.gen_range(-1.0..1.0));
    let vmat = bmat.dot(&cmat) + noise;
    let smat = vmat.t().dot(&vmat);
    let hraw = Array2::from_shape_fn((10, 10), |_| rng.gen_range(-1.0..1.0));
    let hmat = (&hraw + &hraw.t()) / 2.0;

    let res = (&hmat.view(), &smat.view())
        .solve_generalised_eigenvalue_problem_with_canonical_orthogonalisation(THRESH, THRESH)
        .unwrap();
    let nkept = res.eigenvalues().len();
    assert!((4..=10).contains(&nkept));
    assert!(res
        .eigenvalues()
        .iter()
        .zip(res.eigenvalues().iter().skip(1))
        .all(|(a, b)| a <= b));

    let ovlp = res.eigenvectors().t().dot(&smat).dot(&res.eigenvectors());
    for ((i, j), &x) in ovlp.indexed_iter() {
        let delta = if i == j { 1.0 } else { 0.0 };
        assert_abs_diff_eq!(x, delta, epsilon = 1e-5);
    }
}
