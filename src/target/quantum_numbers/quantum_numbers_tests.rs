use ndarray::{array, Array3};

use crate::target::quantum_numbers::{ElectronCountTable, QuantumNumberIndexer, QuantumNumbers};

#[test]
fn test_table_from_state_list() {
    let table = ElectronCountTable::from_state_list(
        &[(1, 1), (2, 1)],
        &[vec![0, 0], vec![1, -1], vec![-1, 0]],
        Some(&[vec![0, 1], vec![1, -2], vec![1, 1]][..]),
        None,
    )
    .unwrap();
    assert_eq!(table.nfrags(), 2);
    assert_eq!(table.nroots(), 3);
    assert_eq!(table.nelec(0, 0), (1, 1));
    assert_eq!(table.nelec(1, 0), (2, 1));
    assert_eq!(table.nelec(0, 1), (1, 0));
    assert_eq!(table.nelec(1, 1), (1, 3));
    assert_eq!(table.nelec(0, 2), (2, 1));
    assert_eq!(table.wfnsym(0, 0), None);

    // Default spins pick the lowest non-negative 2Sz.
    let defaulted =
        ElectronCountTable::from_state_list(&[(1, 1)], &[vec![1], vec![-1]], None, None).unwrap();
    assert_eq!(defaulted.nelec(0, 0), (1, 0));
    assert_eq!(defaulted.nelec(0, 1), (2, 1));
}

#[test]
fn test_table_rejects_inconsistent_input() {
    // Parity mismatch between electron count and 2Sz.
    assert!(ElectronCountTable::from_state_list(
        &[(1, 1)],
        &[vec![0]],
        Some(&[vec![1]][..]),
        None
    )
    .is_err());
    // More electrons removed than present.
    assert!(ElectronCountTable::from_state_list(&[(1, 1)], &[vec![3]], None, None).is_err());
    // Ragged charge list.
    assert!(
        ElectronCountTable::from_state_list(&[(1, 1), (1, 1)], &[vec![0]], None, None).is_err()
    );
    // Last axis must hold (nα, nβ).
    assert!(ElectronCountTable::new(Array3::zeros((1, 1, 3)), None).is_err());
    assert!(ElectronCountTable::new(Array3::zeros((2, 2, 2)), Some(array![[0, 1]])).is_err());
}

#[test]
fn test_indexer_blocks() {
    let table = ElectronCountTable::from_state_list(
        &[(1, 1), (1, 1)],
        &[vec![0, 0], vec![1, 0], vec![1, -1], vec![0, 1]],
        Some(&[vec![0, 0], vec![1, 0], vec![1, -1], vec![0, -1]][..]),
        None,
    )
    .unwrap();
    let indexer = QuantumNumberIndexer::new(&table);
    assert_eq!(indexer.nroots(), 4);
    assert_eq!(
        *indexer.quantum_numbers(1),
        QuantumNumbers {
            nelec: 3,
            two_sz: 1,
            irrep: None
        }
    );
    assert_eq!(indexer.quantum_numbers(3).sz(), -0.5);
    assert_eq!(indexer.blocks().len(), 3);
    assert_eq!(indexer.blocks()[0], vec![0, 2]);
    assert!(indexer.same_block(0, 2));
    assert!(!indexer.same_block(1, 3));
    assert_eq!(indexer.block_index(2), Some(0));
    assert_eq!(indexer.block_index(3), Some(2));
    assert_eq!(
        indexer.unique_block_pairs(),
        vec![(0, 0), (0, 2), (2, 2), (1, 1), (3, 3)]
    );
}

#[test]
fn test_indexer_irreps() {
    let table = ElectronCountTable::from_state_list(
        &[(1, 1), (1, 1)],
        &[vec![0, 0], vec![0, 0], vec![0, 0]],
        None,
        Some(&[vec![0, 0], vec![1, 1], vec![2, 3]][..]),
    )
    .unwrap();
    let indexer = QuantumNumberIndexer::new(&table);
    assert_eq!(indexer.quantum_numbers(1).irrep, Some(0));
    assert_eq!(indexer.quantum_numbers(2).irrep, Some(1));
    assert!(indexer.same_block(0, 1));
    assert!(!indexer.same_block(0, 2));
    assert_eq!(table.wfnsym(1, 2), Some(3));
}
