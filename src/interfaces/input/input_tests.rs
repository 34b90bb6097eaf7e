use ndarray::array;

use crate::drivers::lassi_matrix::LassiMatrixParams;
use crate::interfaces::InputHandle;
use crate::io::{read_lassi_yaml, write_lassi_binary, write_lassi_yaml, LassiFileType};
use crate::target::fragment::{FragmentLayout, LocalRootManifold};
use crate::target::matrix::MatrixTier;
use crate::target::operator::ActiveSpaceIntegrals;
use crate::target::quantum_numbers::ElectronCountTable;

use super::{FragmentInput, Input, IntegralSource, LocalRootSource, StateListInput};

const ROOT: &str = env!("CARGO_MANIFEST_DIR");

#[test]
fn test_interfaces_input_random() {
    let name = format!("{ROOT}/tests/input/test_input_random.yml");
    let inp = read_lassi_yaml::<Input, _>(&name).unwrap();

    assert_eq!(inp.fragments.norbs, vec![2, 2]);
    assert_eq!(inp.fragments.nelecas, vec![(1, 1), (1, 1)]);
    assert_eq!(inp.states.charges.len(), 3);
    assert!(inp.states.spins.is_some());
    assert!(inp.states.wfnsyms.is_none());
    if let LocalRootSource::Random {
        lroots,
        seed,
        orthonormalise,
    } = &inp.local_roots
    {
        assert_eq!(lroots, &vec![vec![2, 1, 1], vec![2, 2, 1]]);
        assert_eq!(*seed, 5);
        assert_eq!(*orthonormalise, Some(1e-8));
    } else {
        panic!("Random local roots expected.");
    }
    assert_eq!(
        inp.integrals,
        IntegralSource::Random {
            seed: 17,
            zero_onee: false
        }
    );

    let params = &inp.lassi_matrix;
    assert_eq!(params.tier, MatrixTier::Cached);
    assert_eq!(
        params.cross_check,
        vec![MatrixTier::Reference, MatrixTier::Blocked]
    );
    assert_eq!(params.fingerprint_tolerance, 1e-9);
    assert!(params.solve_si);
    assert_eq!(params.linear_dependence_threshold, 1e-7);
    assert_eq!(params.hermiticity_threshold, 1e-10);

    let system = inp.system().unwrap();
    assert_eq!(system.basis().dim(), 7);
    assert_eq!(system.indexer().blocks().len(), 1);
    assert_eq!(system.manifold().lroots(), array![[2, 1, 1], [2, 2, 1]]);

    inp.handle().unwrap();
}

#[test]
fn test_interfaces_input_defaults() {
    let name = format!("{ROOT}/tests/input/test_input_defaults.yml");
    let inp = read_lassi_yaml::<Input, _>(&name).unwrap();

    assert!(inp.states.spins.is_none());
    assert_eq!(
        inp.integrals,
        IntegralSource::Random {
            seed: 9,
            zero_onee: true
        }
    );
    if let LocalRootSource::Random { orthonormalise, .. } = &inp.local_roots {
        assert!(orthonormalise.is_none());
    } else {
        panic!("Random local roots expected.");
    }
    let default_params = LassiMatrixParams::default();
    assert_eq!(inp.lassi_matrix.tier, default_params.tier);
    assert_eq!(inp.lassi_matrix.cross_check, default_params.cross_check);

    // Default spins place every fragment at its lowest non-negative 2Sz.
    let system = inp.system().unwrap();
    assert_eq!(system.table().nelec(0, 0), (1, 0));
    assert_eq!(system.table().nelec(1, 0), (1, 1));
    assert_eq!(system.table().nelec(0, 1), (1, 1));
    assert_eq!(system.table().nelec(1, 1), (1, 0));
    assert_eq!(system.basis().dim(), 3);
    assert!(system
        .integrals()
        .h1()
        .iter()
        .all(|&x| x == 0.0));
}

#[test]
fn test_interfaces_input_fromfile() {
    let name = format!("{ROOT}/tests/input/test_input_fromfile.yml");
    let inp = read_lassi_yaml::<Input, _>(&name).unwrap();
    assert_eq!(
        inp.local_roots,
        LocalRootSource::FromFile("lassi_roots".into())
    );
    assert_eq!(
        inp.integrals,
        IntegralSource::FromFile("lassi_integrals".into())
    );
    assert_eq!(inp.lassi_matrix.tier, MatrixTier::Reference);
    assert!(inp.lassi_matrix.cross_check.is_empty());
    assert_eq!(
        inp.lassi_matrix.matrices_save_name,
        Some("lassi_matrices".into())
    );
}

#[test]
fn test_interfaces_input_binary_sources() {
    let fragments = FragmentInput {
        norbs: vec![2, 1],
        nelecas: vec![(1, 1), (1, 0)],
    };
    let states = StateListInput {
        charges: vec![vec![0, 0], vec![1, -1]],
        spins: None,
        wfnsyms: None,
    };
    let layout = FragmentLayout::new(&fragments.norbs).unwrap();
    let table = ElectronCountTable::from_state_list(
        &fragments.nelecas,
        &states.charges,
        None,
        None,
    )
    .unwrap();
    let manifold =
        LocalRootManifold::random(&layout, &table, &array![[2, 1], [1, 1]], 19).unwrap();
    let integrals = ActiveSpaceIntegrals::random(3, 23, false).unwrap();

    let dir = std::env::temp_dir();
    let roots_name = dir.join("lassi_input_test_roots");
    let ints_name = dir.join("lassi_input_test_integrals");
    write_lassi_binary(&roots_name, LassiFileType::Ci, &manifold.to_vectors()).unwrap();
    write_lassi_binary(&ints_name, LassiFileType::Int, &integrals).unwrap();

    let inp = Input {
        fragments,
        states,
        local_roots: LocalRootSource::FromFile(roots_name),
        integrals: IntegralSource::FromFile(ints_name),
        lassi_matrix: LassiMatrixParams::default(),
    };
    let system = inp.system().unwrap();
    assert_eq!(system.integrals(), &integrals);
    assert_eq!(system.manifold().to_vectors(), manifold.to_vectors());

    let from_random = Input {
        local_roots: LocalRootSource::Random {
            lroots: vec![vec![2, 1], vec![1, 1]],
            seed: 19,
            orthonormalise: None,
        },
        integrals: IntegralSource::Random {
            seed: 23,
            zero_onee: false,
        },
        ..inp.clone()
    }
    .system()
    .unwrap();
    assert_eq!(from_random.integrals(), system.integrals());
    assert_eq!(from_random.manifold().to_vectors(), system.manifold().to_vectors());
}

#[test]
fn test_interfaces_input_invalid() {
    let mut inp = Input::default();
    inp.local_roots = LocalRootSource::Random {
        lroots: vec![vec![1, 2], vec![3, 4, 5], vec![6]],
        seed: 0,
        orthonormalise: None,
    };
    assert!(inp.system().is_err());

    let mut inp = Input::default();
    inp.states.charges.push(vec![0]);
    assert!(inp.system().is_err());

    let mut inp = Input::default();
    inp.fragments.nelecas = vec![(1, 1)];
    assert!(inp.system().is_err());
}

#[test]
fn test_interfaces_input_default_template() {
    let inp = Input::default();
    let system = inp.system().unwrap();
    assert_eq!(system.basis().dim(), 1 + 4 + 4);
    assert_eq!(system.indexer().blocks().len(), 1);

    let name = std::env::temp_dir().join("lassi_input_test_template");
    write_lassi_yaml(&name, &inp).unwrap();
    let read = read_lassi_yaml::<Input, _>(name.with_extension("yml")).unwrap();
    assert_eq!(read, inp);
}
