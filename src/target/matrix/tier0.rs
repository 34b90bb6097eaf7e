//! Reference matrix builder working in the full active space.

use anyhow;
use itertools::Itertools;
use log;

use crate::target::matrix::{LassiMatrices, LassiSystem, MatrixBuilder, MatrixTier};
use crate::target::tdm::full::{calc_spin_square, calc_tdm12s, FullSpaceVector};

/// Builder expanding every product state into full-space determinants and evaluating every
/// same-block matrix element from full-space transition densities.
///
/// Cost grows with the size of the full determinant space and quadratically with the number of
/// product states. Only the quantum-number block structure is exploited, as a filter.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceBuilder;

impl MatrixBuilder for ReferenceBuilder {
    fn tier(&self) -> MatrixTier {
        MatrixTier::Reference
    }

    fn build(&self, system: &LassiSystem) -> Result<LassiMatrices, anyhow::Error> {
        let layout = system.layout();
        let basis = system.basis();
        let indexer = system.indexer();
        let expansions = basis
            .states()
            .iter()
            .map(|state| FullSpaceVector::from_product_state(layout, system.manifold(), state))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "Expanded {} product state(s) into at most {} determinant(s) each.",
            expansions.len(),
            expansions.iter().map(|v| v.len()).max().unwrap_or(0)
        );

        let mut mats = LassiMatrices::zeros(basis.dim());
        let pairs = (0..basis.dim()).cartesian_product(0..basis.dim());
        for (i, j) in pairs {
            let (bra_state, ket_state) = (&basis.states()[i], &basis.states()[j]);
            if !indexer.same_block(bra_state.root, ket_state.root) {
                continue;
            }
            let (bra, ket) = (&expansions[i], &expansions[j]);
            let ovlp = bra.dot(ket);
            let tdm = calc_tdm12s(bra, ket, layout);
            mats.ovlp[(i, j)] = ovlp;
            mats.s2[(i, j)] = calc_spin_square(bra, ket, layout);
            mats.ham[(i, j)] = system.integrals().contract(&tdm, ovlp)?;
        }
        Ok(mats)
    }
}
