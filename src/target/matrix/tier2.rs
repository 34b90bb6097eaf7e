//! Matrix builder exploiting quantum-number blocks and Hermiticity, parallel over global-root
//! pairs.

use anyhow;
use log;
use ndarray::{s, Array2};
use rayon::prelude::*;

use crate::target::matrix::plan::InteractionPlan;
use crate::target::matrix::{LassiMatrices, LassiSystem, MatrixBuilder, MatrixTier};
use crate::target::operator::{hamiltonian_terms, overlap_terms, spin_square_terms};
use crate::target::tdm::FragmentTdmCache;

/// Builder evaluating only global-root pairs $`(i, j)`$ with $`i \le j`$ in the same
/// quantum-number block.
///
/// Every pair is an independent task writing to a disjoint sub-block, with its own density cache.
/// The $`(j, i)`$ sub-block is the transpose of the $`(i, j)`$ one, which holds only for
/// Hermitian integrals, so these are checked before anything is built. Because summation order
/// differs from the other tiers, agreement is only expected per global-root pair sub-block.
#[derive(Clone, Copy, Debug)]
pub struct BlockedBuilder {
    /// The largest tolerated deviation of the integrals from Hermiticity.
    hermiticity_threshold: f64,
}

impl BlockedBuilder {
    /// Creates a blocked builder with a Hermiticity threshold for the integrals.
    pub fn new(hermiticity_threshold: f64) -> Self {
        Self {
            hermiticity_threshold,
        }
    }
}

impl Default for BlockedBuilder {
    fn default() -> Self {
        Self::new(1e-10)
    }
}

/// The $`(H, \hat{S}^2, S)`$ sub-blocks of one global-root pair.
type RootPairBlocks = ((usize, usize), [Array2<f64>; 3]);

impl BlockedBuilder {
    fn build_root_pair(
        system: &LassiSystem,
        bra_root: usize,
        ket_root: usize,
    ) -> Result<RootPairBlocks, anyhow::Error> {
        let layout = system.layout();
        let basis = system.basis();
        let table = system.table();
        let ham_terms = hamiltonian_terms(system.integrals());
        let s2_terms = spin_square_terms(system.indexer().quantum_numbers(ket_root).sz());
        let ovlp_terms = overlap_terms();
        let ham_plan = InteractionPlan::new(&ham_terms, table, bra_root, ket_root);
        let s2_plan = InteractionPlan::new(&s2_terms, table, bra_root, ket_root);
        let ovlp_plan = InteractionPlan::new(&ovlp_terms, table, bra_root, ket_root);

        let shape = (basis.nprods(bra_root), basis.nprods(ket_root));
        let mut blocks = [
            Array2::<f64>::zeros(shape),
            Array2::<f64>::zeros(shape),
            Array2::<f64>::zeros(shape),
        ];
        let mut cache = FragmentTdmCache::new(system.manifold());
        for (bra, bra_state) in basis.states_of(bra_root).iter().enumerate() {
            for (ket, ket_state) in basis.states_of(ket_root).iter().enumerate() {
                blocks[0][(bra, ket)] =
                    ham_plan.evaluate(bra_state, ket_state, layout, &mut cache)?;
                blocks[1][(bra, ket)] =
                    s2_plan.evaluate(bra_state, ket_state, layout, &mut cache)?;
                blocks[2][(bra, ket)] =
                    ovlp_plan.evaluate(bra_state, ket_state, layout, &mut cache)?;
            }
        }
        log::debug!(
            "Global-root pair ({bra_root}, {ket_root}): {} fragment-local density tensor(s).",
            cache.len()
        );
        Ok(((bra_root, ket_root), blocks))
    }
}

impl MatrixBuilder for BlockedBuilder {
    fn tier(&self) -> MatrixTier {
        MatrixTier::Blocked
    }

    fn build(&self, system: &LassiSystem) -> Result<LassiMatrices, anyhow::Error> {
        system
            .integrals()
            .ensure_hermitian(self.hermiticity_threshold)?;
        let basis = system.basis();
        let pairs = system.indexer().unique_block_pairs();
        log::debug!("Building {} unique global-root pair block(s) in parallel.", pairs.len());
        let root_pair_blocks = pairs
            .par_iter()
            .map(|&(bra_root, ket_root)| Self::build_root_pair(system, bra_root, ket_root))
            .collect::<Result<Vec<_>, _>>()?;

        let mut mats = LassiMatrices::zeros(basis.dim());
        for ((bra_root, ket_root), [ham, s2, ovlp]) in root_pair_blocks {
            let (rows, cols) = (basis.range(bra_root), basis.range(ket_root));
            for (mat, block) in [
                (&mut mats.ham, ham),
                (&mut mats.s2, s2),
                (&mut mats.ovlp, ovlp),
            ] {
                mat.slice_mut(s![rows.clone(), cols.clone()]).assign(&block);
                if bra_root != ket_root {
                    mat.slice_mut(s![cols.clone(), rows.clone()])
                        .assign(&block.t());
                }
            }
        }
        Ok(mats)
    }
}
