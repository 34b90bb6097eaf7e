//! Matrix builder factorising operators over fragments with shared fragment-local densities.

use anyhow;
use log;

use crate::target::matrix::plan::InteractionPlan;
use crate::target::matrix::{LassiMatrices, LassiSystem, MatrixBuilder, MatrixTier};
use crate::target::operator::{hamiltonian_terms, overlap_terms, spin_square_terms};
use crate::target::tdm::FragmentTdmCache;

/// Builder evaluating every same-block product-state pair by fragment factorisation.
///
/// One cache of fragment-local transition densities lives for the whole build, so a density
/// between two local roots of a fragment is computed once and reused by every product-state
/// pair that differs only on other fragments.
#[derive(Clone, Copy, Debug, Default)]
pub struct CachedBuilder;

impl MatrixBuilder for CachedBuilder {
    fn tier(&self) -> MatrixTier {
        MatrixTier::Cached
    }

    fn build(&self, system: &LassiSystem) -> Result<LassiMatrices, anyhow::Error> {
        let layout = system.layout();
        let basis = system.basis();
        let indexer = system.indexer();
        let table = system.table();
        let ham_terms = hamiltonian_terms(system.integrals());
        let ovlp_terms = overlap_terms();

        let mut cache = FragmentTdmCache::new(system.manifold());
        let mut mats = LassiMatrices::zeros(basis.dim());
        for bra_root in 0..basis.nroots() {
            for ket_root in 0..basis.nroots() {
                if !indexer.same_block(bra_root, ket_root) {
                    continue;
                }
                let s2_terms = spin_square_terms(indexer.quantum_numbers(ket_root).sz());
                let ham_plan = InteractionPlan::new(&ham_terms, table, bra_root, ket_root);
                let s2_plan = InteractionPlan::new(&s2_terms, table, bra_root, ket_root);
                let ovlp_plan = InteractionPlan::new(&ovlp_terms, table, bra_root, ket_root);
                for (bra, bra_state) in basis.range(bra_root).zip(basis.states_of(bra_root)) {
                    for (ket, ket_state) in basis.range(ket_root).zip(basis.states_of(ket_root)) {
                        mats.ham[(bra, ket)] =
                            ham_plan.evaluate(bra_state, ket_state, layout, &mut cache)?;
                        mats.s2[(bra, ket)] =
                            s2_plan.evaluate(bra_state, ket_state, layout, &mut cache)?;
                        mats.ovlp[(bra, ket)] =
                            ovlp_plan.evaluate(bra_state, ket_state, layout, &mut cache)?;
                    }
                }
            }
        }
        log::debug!(
            "Computed {} distinct fragment-local density tensor(s); {} lookup(s) served from cache.",
            cache.len(),
            cache.hits()
        );
        Ok(mats)
    }
}
