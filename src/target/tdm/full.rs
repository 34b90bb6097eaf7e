//! Full-active-space expansions of product states and their transition densities.
//!
//! These are exact but scale with the size of the full determinant space, so they serve as the
//! reference against which the fragment-factorised contractions are validated, and as the
//! workhorse for reduced density matrices of interaction-model states.

use anyhow::{self, ensure};
use indexmap::IndexMap;
use itertools::Itertools;
use ndarray::{Array3, Array4, ArrayView1};

use crate::target::fragment::strings::{apply_operator, Action, Spin};
use crate::target::fragment::{FragmentLayout, LocalRootManifold};
use crate::target::product::{ProductBasis, ProductState};

/// Returns the full-space spin-orbital indices of all orbitals, indexed first by spin and then by
/// full-space orbital.
fn spin_orbital_table(layout: &FragmentLayout) -> [Vec<usize>; 2] {
    Spin::ALL.map(|spin| {
        (0..layout.norb_total())
            .filter_map(|p| layout.spin_orbital(p, spin))
            .collect_vec()
    })
}

// ===================
// Full-space vectors
// ===================

/// Structure containing a sparse vector in the full active-space determinant basis, keyed by
/// full-space occupation bitstrings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FullSpaceVector {
    coefficients: IndexMap<u64, f64>,
}

impl FullSpaceVector {
    /// Expands a product state into full-space determinants.
    ///
    /// Fragment bitstrings are shifted into place and combined; the fragment-major fermionic
    /// order of the layout makes the expansion sign-free.
    pub fn from_product_state(
        layout: &FragmentLayout,
        manifold: &LocalRootManifold,
        state: &ProductState,
    ) -> Result<Self, anyhow::Error> {
        ensure!(
            state.lroots.len() == layout.nfrags() && manifold.nfrags() == layout.nfrags(),
            "Product state {state} does not match the {} fragment(s) of the layout.",
            layout.nfrags()
        );
        let mut coefficients = IndexMap::from([(0u64, 1.0)]);
        for (frag, &lroot) in state.lroots.iter().enumerate() {
            let local_roots = manifold.get(frag, state.root);
            ensure!(
                lroot < local_roots.nroots(),
                "Local root {lroot} of fragment {frag} does not exist in global root {}.",
                state.root
            );
            let space = local_roots.space();
            let shift = layout.spin_orbital_shift(frag);
            let vector = local_roots.vector(lroot);
            let mut next = IndexMap::<u64, f64>::new();
            for (&det, &c) in coefficients.iter() {
                for ((ia, ib), &x) in vector.indexed_iter() {
                    if x == 0.0 {
                        continue;
                    }
                    *next.entry(det | (space.det(ia, ib) << shift)).or_default() += c * x;
                }
            }
            coefficients = next;
        }
        Ok(Self { coefficients })
    }

    /// Expands a linear combination of product states into full-space determinants.
    ///
    /// # Arguments
    ///
    /// * `layout` - The fragment layout.
    /// * `manifold` - The local-root manifold.
    /// * `basis` - The product-state basis.
    /// * `coefficients` - The coefficient of every product state, in matrix order.
    pub fn from_combination(
        layout: &FragmentLayout,
        manifold: &LocalRootManifold,
        basis: &ProductBasis,
        coefficients: ArrayView1<f64>,
    ) -> Result<Self, anyhow::Error> {
        ensure!(
            coefficients.len() == basis.dim(),
            "Expected {} product-state coefficients, got {}.",
            basis.dim(),
            coefficients.len()
        );
        let mut combined = Self::default();
        for (state, &c) in basis.states().iter().zip(coefficients.iter()) {
            if c == 0.0 {
                continue;
            }
            let expanded = Self::from_product_state(layout, manifold, state)?;
            combined.add_scaled(&expanded, c);
        }
        Ok(combined)
    }

    /// Adds `scale` times `other` to this vector.
    pub fn add_scaled(&mut self, other: &Self, scale: f64) {
        for (&det, &c) in other.coefficients.iter() {
            *self.coefficients.entry(det).or_default() += scale * c;
        }
    }

    /// Returns the number of stored determinants.
    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    /// Returns `true` if no determinants are stored.
    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    /// Returns the coefficient of a determinant, zero if it is not stored.
    pub fn coefficient(&self, det: u64) -> f64 {
        self.coefficients.get(&det).copied().unwrap_or(0.0)
    }

    /// Returns an iterator over the stored determinants and their coefficients.
    pub fn iter(&self) -> impl Iterator<Item = (&u64, &f64)> {
        self.coefficients.iter()
    }

    /// Returns the inner product with another vector.
    pub fn dot(&self, other: &Self) -> f64 {
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .coefficients
            .iter()
            .map(|(&det, &c)| c * large.coefficient(det))
            .sum()
    }

    /// Applies the total spin-raising operator
    /// $`\hat{S}_+ = \sum_p \hat{a}^{\dagger}_{p\alpha} \hat{a}_{p\beta}`$.
    pub fn spin_raised(&self, layout: &FragmentLayout) -> Self {
        let [so_a, so_b] = spin_orbital_table(layout);
        let mut raised = IndexMap::<u64, f64>::new();
        for (&det, &c) in self.coefficients.iter() {
            for (&pa, &pb) in so_a.iter().zip(so_b.iter()) {
                let Some((d1, s1)) = apply_operator(det, pb, Action::Annihilate) else {
                    continue;
                };
                let Some((d2, s2)) = apply_operator(d1, pa, Action::Create) else {
                    continue;
                };
                *raised.entry(d2).or_default() += s1 * s2 * c;
            }
        }
        Self {
            coefficients: raised,
        }
    }

    /// Returns $`\sum_D b_D k_D S_z(D) (S_z(D) + 1)`$, the diagonal part of
    /// $`\hat{S}^2 = \hat{S}_- \hat{S}_+ + \hat{S}_z (\hat{S}_z + 1)`$ between this vector as
    /// the bra and `ket`.
    pub fn sz_term(&self, ket: &Self, layout: &FragmentLayout) -> f64 {
        let [so_a, _] = spin_orbital_table(layout);
        let alpha_mask = so_a.iter().fold(0u64, |mask, &s| mask | (1 << s));
        ket.coefficients
            .iter()
            .map(|(&det, &c)| {
                let b = self.coefficient(det);
                if b == 0.0 {
                    return 0.0;
                }
                let na = f64::from((det & alpha_mask).count_ones());
                let nb = f64::from((det & !alpha_mask).count_ones());
                let sz = 0.5 * (na - nb);
                b * c * sz * (sz + 1.0)
            })
            .sum()
    }
}

/// Calculates $`\braket{\mathrm{bra} | \hat{S}^2 | \mathrm{ket}}`$ in the full active space.
pub fn calc_spin_square(
    bra: &FullSpaceVector,
    ket: &FullSpaceVector,
    layout: &FragmentLayout,
) -> f64 {
    bra.spin_raised(layout).dot(&ket.spin_raised(layout)) + bra.sz_term(ket, layout)
}

// ===============================
// Full-space transition densities
// ===============================

/// Structure containing spin-separated one- and two-body transition density matrices in the full
/// active space.
///
/// The one-body part is $`\gamma^{\sigma}_{pq} = \braket{\mathrm{bra} |
/// \hat{a}^{\dagger}_{p\sigma} \hat{a}_{q\sigma} | \mathrm{ket}}`$, stored with shape
/// `(2, norb, norb)`. The two-body parts are
/// $`\Gamma^{\sigma\tau}_{pqrs} = \braket{\mathrm{bra} | \hat{a}^{\dagger}_{p\sigma}
/// \hat{a}^{\dagger}_{r\tau} \hat{a}_{s\tau} \hat{a}_{q\sigma} | \mathrm{ket}}`$ for
/// $`\sigma\tau \in \{\alpha\alpha, \alpha\beta, \beta\beta\}`$. The $`\beta\alpha`$ part
/// follows as $`\Gamma^{\beta\alpha}_{pqrs} = \Gamma^{\alpha\beta}_{rspq}`$.
#[derive(Clone, Debug, PartialEq)]
pub struct Tdm12s {
    /// The one-body densities with shape `(2, norb, norb)`.
    pub dm1s: Array3<f64>,

    /// The $`\alpha\alpha`$ two-body density.
    pub dm2aa: Array4<f64>,

    /// The $`\alpha\beta`$ two-body density.
    pub dm2ab: Array4<f64>,

    /// The $`\beta\beta`$ two-body density.
    pub dm2bb: Array4<f64>,
}

impl Tdm12s {
    /// Returns zero densities over `norb` orbitals.
    pub fn zeros(norb: usize) -> Self {
        Self {
            dm1s: Array3::zeros((2, norb, norb)),
            dm2aa: Array4::zeros((norb, norb, norb, norb)),
            dm2ab: Array4::zeros((norb, norb, norb, norb)),
            dm2bb: Array4::zeros((norb, norb, norb, norb)),
        }
    }

    /// Adds `scale` times `other` to these densities.
    pub fn add_scaled(&mut self, other: &Self, scale: f64) {
        self.dm1s.scaled_add(scale, &other.dm1s);
        self.dm2aa.scaled_add(scale, &other.dm2aa);
        self.dm2ab.scaled_add(scale, &other.dm2ab);
        self.dm2bb.scaled_add(scale, &other.dm2bb);
    }
}

/// Calculates the spin-separated one-body transition density matrices in the full active space.
pub fn calc_tdm1s(
    bra: &FullSpaceVector,
    ket: &FullSpaceVector,
    layout: &FragmentLayout,
) -> Array3<f64> {
    let norb = layout.norb_total();
    let so = spin_orbital_table(layout);
    let mut dm1s = Array3::<f64>::zeros((2, norb, norb));
    for (&det, &c) in ket.iter() {
        for spin in Spin::ALL {
            let so_s = &so[spin.index()];
            for (q, &sq) in so_s.iter().enumerate() {
                let Some((d1, s1)) = apply_operator(det, sq, Action::Annihilate) else {
                    continue;
                };
                for (p, &sp) in so_s.iter().enumerate() {
                    let Some((d2, s2)) = apply_operator(d1, sp, Action::Create) else {
                        continue;
                    };
                    let b = bra.coefficient(d2);
                    if b != 0.0 {
                        dm1s[(spin.index(), p, q)] += b * c * s1 * s2;
                    }
                }
            }
        }
    }
    dm1s
}

/// Calculates the spin-separated one- and two-body transition density matrices in the full
/// active space.
pub fn calc_tdm12s(
    bra: &FullSpaceVector,
    ket: &FullSpaceVector,
    layout: &FragmentLayout,
) -> Tdm12s {
    let norb = layout.norb_total();
    let so = spin_orbital_table(layout);
    let mut tdm = Tdm12s::zeros(norb);
    tdm.dm1s = calc_tdm1s(bra, ket, layout);

    let spin_pairs = [
        (Spin::Alpha, Spin::Alpha),
        (Spin::Alpha, Spin::Beta),
        (Spin::Beta, Spin::Beta),
    ];
    for (&det, &c) in ket.iter() {
        for (sigma, tau) in spin_pairs {
            let so_sigma = &so[sigma.index()];
            let so_tau = &so[tau.index()];
            let dm2 = match (sigma, tau) {
                (Spin::Alpha, Spin::Alpha) => &mut tdm.dm2aa,
                (Spin::Alpha, Spin::Beta) => &mut tdm.dm2ab,
                _ => &mut tdm.dm2bb,
            };
            for (q, &sq) in so_sigma.iter().enumerate() {
                let Some((d1, s1)) = apply_operator(det, sq, Action::Annihilate) else {
                    continue;
                };
                for (s, &ss) in so_tau.iter().enumerate() {
                    let Some((d2, s2)) = apply_operator(d1, ss, Action::Annihilate) else {
                        continue;
                    };
                    for (r, &sr) in so_tau.iter().enumerate() {
                        let Some((d3, s3)) = apply_operator(d2, sr, Action::Create) else {
                            continue;
                        };
                        for (p, &sp) in so_sigma.iter().enumerate() {
                            let Some((d4, s4)) = apply_operator(d3, sp, Action::Create) else {
                                continue;
                            };
                            let b = bra.coefficient(d4);
                            if b != 0.0 {
                                dm2[(p, q, r, s)] += b * c * s1 * s2 * s3 * s4;
                            }
                        }
                    }
                }
            }
        }
    }
    tdm
}
