//! Reduced and transition density matrices of states expressed in the product-state basis.

use anyhow::{self, ensure};
use itertools::Itertools;
use ndarray::{s, Array3, ArrayView1, IxDyn};
use rayon::prelude::*;

use crate::target::fragment::strings::{Spin, SpinOrbitalOp};
use crate::target::matrix::LassiSystem;
use crate::target::product::ProductState;
use crate::target::tdm::full::{calc_tdm12s, FullSpaceVector, Tdm12s};
use crate::target::tdm::{FragmentTdmCache, LocalRootIndex, OperatorPattern};

#[cfg(test)]
#[path = "rdm_tests.rs"]
mod rdm_tests;

fn ensure_coefficients(
    system: &LassiSystem,
    coefficients: &ArrayView1<f64>,
) -> Result<(), anyhow::Error> {
    ensure!(
        coefficients.len() == system.basis().dim(),
        "Expected {} product-state coefficients, got {}.",
        system.basis().dim(),
        coefficients.len()
    );
    Ok(())
}

fn local_root(state: &ProductState, frag: usize) -> LocalRootIndex {
    LocalRootIndex {
        root: state.root,
        lroot: state.lroots[frag],
    }
}

/// Calculates the spin-separated one- and two-body reduced density matrices in the full active
/// space of the state $`\sum_P c_P \ket{\Phi_P}`$.
pub fn calc_rdm12s(
    system: &LassiSystem,
    coefficients: ArrayView1<f64>,
) -> Result<Tdm12s, anyhow::Error> {
    ensure_coefficients(system, &coefficients)?;
    let vector = FullSpaceVector::from_combination(
        system.layout(),
        system.manifold(),
        system.basis(),
        coefficients,
    )?;
    Ok(calc_tdm12s(&vector, &vector, system.layout()))
}

/// Calculates the reduced density matrices of several states given as the columns of a
/// coefficient matrix, in parallel.
pub fn calc_rdm12s_for_columns(
    system: &LassiSystem,
    coefficients: &ndarray::Array2<f64>,
) -> Result<Vec<Tdm12s>, anyhow::Error> {
    coefficients
        .columns()
        .into_iter()
        .collect_vec()
        .into_par_iter()
        .map(|column| calc_rdm12s(system, column))
        .collect()
}

/// Calculates the spin-separated one- and two-body transition density matrices between product
/// states `bra` and `ket`, given by their positions in the product-state basis.
pub fn calc_stdm12s(system: &LassiSystem, bra: usize, ket: usize) -> Result<Tdm12s, anyhow::Error> {
    let states = system.basis().states();
    ensure!(
        bra < states.len() && ket < states.len(),
        "Product states ({bra}, {ket}) lie outside a basis of dimension {}.",
        states.len()
    );
    let bra_vector =
        FullSpaceVector::from_product_state(system.layout(), system.manifold(), &states[bra])?;
    let ket_vector =
        FullSpaceVector::from_product_state(system.layout(), system.manifold(), &states[ket])?;
    Ok(calc_tdm12s(&bra_vector, &ket_vector, system.layout()))
}

/// Calculates the spin-separated one-body reduced density matrix of every fragment, with shape
/// `(2, norb_k, norb_k)`, for the state $`\sum_P c_P \ket{\Phi_P}`$.
///
/// These are evaluated by fragment factorisation,
/// $`\gamma^{(k)}_{pq} = \sum_{PQ} c_P c_Q T^{(k)}_{pq} \prod_{j \ne k} \braket{P_j | Q_j}`$,
/// without expanding the state in the full active space.
pub fn calc_casdm1s_sub(
    system: &LassiSystem,
    coefficients: ArrayView1<f64>,
) -> Result<Vec<Array3<f64>>, anyhow::Error> {
    ensure_coefficients(system, &coefficients)?;
    let layout = system.layout();
    let states = system.basis().states();
    let nfrags = layout.nfrags();
    let identity = OperatorPattern::identity();
    let one_body = Spin::ALL.map(|spin| {
        OperatorPattern::new(vec![SpinOrbitalOp::cre(spin), SpinOrbitalOp::des(spin)])
    });

    let mut dm1s = (0..nfrags)
        .map(|frag| Array3::<f64>::zeros((2, layout.norb(frag), layout.norb(frag))))
        .collect_vec();
    let mut cache = FragmentTdmCache::new(system.manifold());
    for ((bra, bra_state), (ket, ket_state)) in states
        .iter()
        .enumerate()
        .cartesian_product(states.iter().enumerate())
    {
        let weight = coefficients[bra] * coefficients[ket];
        if weight == 0.0 || !system.indexer().same_block(bra_state.root, ket_state.root) {
            continue;
        }
        let ovlps = (0..nfrags)
            .map(|frag| {
                cache
                    .get(frag, local_root(bra_state, frag), local_root(ket_state, frag), &identity)
                    .map(|tdm| tdm.map(|t| t[IxDyn(&[])]))
            })
            .collect::<Result<Vec<_>, _>>()?;
        for frag in 0..nfrags {
            let others = ovlps
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != frag)
                .map(|(_, ovlp)| *ovlp)
                .collect::<Option<Vec<_>>>();
            let Some(others) = others else {
                continue;
            };
            let factor = weight * others.iter().product::<f64>();
            for spin in Spin::ALL {
                let Some(tdm) = cache.get(
                    frag,
                    local_root(bra_state, frag),
                    local_root(ket_state, frag),
                    &one_body[spin.index()],
                )?
                else {
                    continue;
                };
                let mut block = dm1s[frag].index_axis_mut(ndarray::Axis(0), spin.index());
                block.scaled_add(
                    factor,
                    &tdm.view()
                        .into_dimensionality::<ndarray::Ix2>()
                        .map_err(|err| anyhow::format_err!(err))?,
                );
            }
        }
    }
    Ok(dm1s)
}

/// Calculates the spin-separated one-body reduced density matrix in the full active space with
/// only the fragment-diagonal blocks filled, for the state $`\sum_P c_P \ket{\Phi_P}`$.
pub fn calc_casdm1s(
    system: &LassiSystem,
    coefficients: ArrayView1<f64>,
) -> Result<Array3<f64>, anyhow::Error> {
    let layout = system.layout();
    let norb = layout.norb_total();
    let mut casdm1s = Array3::<f64>::zeros((2, norb, norb));
    for (frag, dm1s) in calc_casdm1s_sub(system, coefficients)?.into_iter().enumerate() {
        let range = layout.offset(frag)..layout.offset(frag) + layout.norb(frag);
        casdm1s
            .slice_mut(s![.., range.clone(), range])
            .assign(&dm1s);
    }
    Ok(casdm1s)
}
