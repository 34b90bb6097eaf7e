//! Electron-count tables and the grouping of global roots by conserved quantum numbers.

use std::fmt;

use anyhow::{self, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "quantum_numbers_tests.rs"]
mod quantum_numbers_tests;

// ==================
// Electron-count table
// ==================

/// Structure tabulating the electron counts $`(N_{\alpha}, N_{\beta})`$ and optional point-group
/// irrep labels of every fragment in every global root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectronCountTable {
    /// The electron counts, with shape `(nfrags, nroots, 2)`.
    nelec_frs: Array3<usize>,

    /// The irrep labels of the fragment wavefunctions, with shape `(nfrags, nroots)`. Labels
    /// follow the bit-flag convention of $`\mathcal{D}_{2h}`$ and its subgroups, so direct
    /// products are bitwise exclusive-ors.
    wfnsym_frs: Option<Array2<u32>>,
}

impl ElectronCountTable {
    /// Constructs an electron-count table from explicit counts.
    ///
    /// # Arguments
    ///
    /// * `nelec_frs` - The electron counts with shape `(nfrags, nroots, 2)`.
    /// * `wfnsym_frs` - Optional irrep labels with shape `(nfrags, nroots)`.
    pub fn new(
        nelec_frs: Array3<usize>,
        wfnsym_frs: Option<Array2<u32>>,
    ) -> Result<Self, anyhow::Error> {
        let shape = nelec_frs.shape();
        ensure!(
            shape[2] == 2,
            "The last axis of the electron-count table must hold (nα, nβ), but has length {}.",
            shape[2]
        );
        ensure!(
            shape[0] > 0 && shape[1] > 0,
            "The electron-count table must describe at least one fragment and one global root."
        );
        if let Some(wfnsyms) = wfnsym_frs.as_ref() {
            ensure!(
                wfnsyms.shape() == &shape[..2],
                "Irrep-label table has shape {:?}, but {:?} was expected.",
                wfnsyms.shape(),
                &shape[..2]
            );
        }
        Ok(Self {
            nelec_frs,
            wfnsym_frs,
        })
    }

    /// Constructs an electron-count table from a list of global roots described by their charge
    /// and spin assignments on every fragment.
    ///
    /// # Arguments
    ///
    /// * `nelecas` - The reference $`(N_{\alpha}, N_{\beta})`$ of every fragment.
    /// * `charges` - The charge of every fragment in every global root, indexed first by global
    ///   root and then by fragment.
    /// * `spins` - Optional $`2S_z = N_{\alpha} - N_{\beta}`$ of every fragment in every global
    ///   root, indexed as `charges`. If absent, the smallest non-negative value compatible with
    ///   the electron count is used.
    /// * `wfnsyms` - Optional irrep labels, indexed as `charges`.
    pub fn from_state_list(
        nelecas: &[(usize, usize)],
        charges: &[Vec<i32>],
        spins: Option<&[Vec<i32>]>,
        wfnsyms: Option<&[Vec<u32>]>,
    ) -> Result<Self, anyhow::Error> {
        let nfrags = nelecas.len();
        let nroots = charges.len();
        ensure!(
            charges.iter().all(|row| row.len() == nfrags),
            "Every global root must assign a charge to each of the {nfrags} fragment(s)."
        );
        if let Some(spins) = spins {
            ensure!(
                spins.len() == nroots && spins.iter().all(|row| row.len() == nfrags),
                "The spin list must have the same shape as the charge list."
            );
        }
        if let Some(wfnsyms) = wfnsyms {
            ensure!(
                wfnsyms.len() == nroots && wfnsyms.iter().all(|row| row.len() == nfrags),
                "The irrep-label list must have the same shape as the charge list."
            );
        }

        let mut nelec_frs = Array3::<usize>::zeros((nfrags, nroots, 2));
        for (root, frag) in (0..nroots).cartesian_product(0..nfrags) {
            let (na_ref, nb_ref) = nelecas[frag];
            let nelec = (na_ref + nb_ref) as i32 - charges[root][frag];
            ensure!(
                nelec >= 0,
                "Fragment {frag} in global root {root} would hold a negative number of electrons."
            );
            let spin = spins
                .map(|spins| spins[root][frag])
                .unwrap_or(nelec % 2);
            ensure!(
                (nelec + spin) % 2 == 0 && spin.abs() <= nelec,
                "Fragment {frag} in global root {root}: 2Sz = {spin} is incompatible with {nelec} electron(s)."
            );
            nelec_frs[(frag, root, 0)] = ((nelec + spin) / 2) as usize;
            nelec_frs[(frag, root, 1)] = ((nelec - spin) / 2) as usize;
        }
        let wfnsym_frs = wfnsyms.map(|wfnsyms| {
            Array2::from_shape_fn((nfrags, nroots), |(frag, root)| wfnsyms[root][frag])
        });
        Self::new(nelec_frs, wfnsym_frs)
    }

    /// Returns the number of fragments.
    pub fn nfrags(&self) -> usize {
        self.nelec_frs.shape()[0]
    }

    /// Returns the number of global roots.
    pub fn nroots(&self) -> usize {
        self.nelec_frs.shape()[1]
    }

    /// Returns $`(N_{\alpha}, N_{\beta})`$ of fragment `frag` in global root `root`.
    pub fn nelec(&self, frag: usize, root: usize) -> (usize, usize) {
        (
            self.nelec_frs[(frag, root, 0)],
            self.nelec_frs[(frag, root, 1)],
        )
    }

    /// Returns the irrep label of fragment `frag` in global root `root`, if irrep labels are
    /// tracked.
    pub fn wfnsym(&self, frag: usize, root: usize) -> Option<u32> {
        self.wfnsym_frs
            .as_ref()
            .map(|wfnsyms| wfnsyms[(frag, root)])
    }

    /// Returns the raw electron-count array with shape `(nfrags, nroots, 2)`.
    pub fn nelec_frs(&self) -> &Array3<usize> {
        &self.nelec_frs
    }
}

// ================
// Quantum numbers
// ================

/// Structure containing the conserved quantum numbers of a global root.
///
/// All entries are integers, so equality is exact. The total charge is implied by the total
/// electron count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuantumNumbers {
    /// The total number of electrons.
    pub nelec: usize,

    /// Twice the total spin projection, $`2S_z = N_{\alpha} - N_{\beta}`$.
    pub two_sz: i32,

    /// The total point-group irrep label, if tracked.
    pub irrep: Option<u32>,
}

impl QuantumNumbers {
    /// Returns the total spin projection $`S_z`$.
    pub fn sz(&self) -> f64 {
        f64::from(self.two_sz) / 2.0
    }
}

impl fmt::Display for QuantumNumbers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(N = {}, 2Sz = {:+}", self.nelec, self.two_sz)?;
        if let Some(irrep) = self.irrep {
            write!(f, ", irrep = {irrep}")?;
        }
        write!(f, ")")
    }
}

/// Structure grouping global roots into blocks of identical conserved quantum numbers.
///
/// Only global roots in the same block can be coupled by the Hamiltonian, $`\hat{S}^2`$, or the
/// overlap.
#[derive(Clone, Debug)]
pub struct QuantumNumberIndexer {
    /// The quantum numbers of every global root.
    root_qns: Vec<QuantumNumbers>,

    /// The blocks, keyed by quantum numbers in order of first appearance, each listing its global
    /// roots in ascending order.
    blocks: IndexMap<QuantumNumbers, Vec<usize>>,
}

impl QuantumNumberIndexer {
    /// Derives the quantum numbers of every global root and groups the global roots into
    /// blocks.
    pub fn new(table: &ElectronCountTable) -> Self {
        let root_qns = (0..table.nroots())
            .map(|root| {
                let (na, nb) = (0..table.nfrags()).fold((0, 0), |(na, nb), frag| {
                    let (na_f, nb_f) = table.nelec(frag, root);
                    (na + na_f, nb + nb_f)
                });
                let irrep = (0..table.nfrags())
                    .map(|frag| table.wfnsym(frag, root))
                    .collect::<Option<Vec<_>>>()
                    .map(|irreps| irreps.into_iter().fold(0, |acc, irrep| acc ^ irrep));
                QuantumNumbers {
                    nelec: na + nb,
                    two_sz: na as i32 - nb as i32,
                    irrep,
                }
            })
            .collect_vec();
        let mut blocks = IndexMap::<QuantumNumbers, Vec<usize>>::new();
        for (root, qns) in root_qns.iter().enumerate() {
            blocks.entry(*qns).or_default().push(root);
        }
        Self { root_qns, blocks }
    }

    /// Returns the number of global roots.
    pub fn nroots(&self) -> usize {
        self.root_qns.len()
    }

    /// Returns the quantum numbers of global root `root`.
    pub fn quantum_numbers(&self, root: usize) -> &QuantumNumbers {
        &self.root_qns[root]
    }

    /// Returns the blocks of global roots keyed by their quantum numbers.
    pub fn blocks(&self) -> &IndexMap<QuantumNumbers, Vec<usize>> {
        &self.blocks
    }

    /// Returns the index of the block containing global root `root`.
    pub fn block_index(&self, root: usize) -> Option<usize> {
        self.blocks.get_index_of(&self.root_qns[root])
    }

    /// Returns `true` if global roots `i` and `j` share all conserved quantum numbers.
    pub fn same_block(&self, i: usize, j: usize) -> bool {
        self.root_qns[i] == self.root_qns[j]
    }

    /// Returns all ordered pairs `(i, j)` with `i <= j` of global roots within the same block.
    pub fn unique_block_pairs(&self) -> Vec<(usize, usize)> {
        self.blocks
            .values()
            .flat_map(|roots| {
                roots
                    .iter()
                    .enumerate()
                    .flat_map(move |(a, &i)| roots[a..].iter().map(move |&j| (i, j)))
            })
            .collect_vec()
    }
}

impl fmt::Display for QuantumNumberIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (b, (qns, roots)) in self.blocks.iter().enumerate() {
            writeln!(
                f,
                "Block {b}: {qns}, global roots {}",
                roots.iter().map(|root| root.to_string()).join(", ")
            )?;
        }
        Ok(())
    }
}
