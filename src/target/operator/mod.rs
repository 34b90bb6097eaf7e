//! Active-space integrals and the second-quantised decomposition of the operators whose matrices
//! are built.

use std::fmt;

use anyhow::{self, ensure, format_err};
use derive_builder::Builder;
use itertools::Itertools;
use ndarray::{Array2, Array4, ArrayView2, ArrayView4};
use ndarray_einsum_beta::einsum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::target::fragment::strings::{Spin, SpinOrbitalOp};
use crate::target::tdm::full::Tdm12s;

#[cfg(test)]
#[path = "operator_tests.rs"]
mod operator_tests;

// ===================
// Active-space integrals
// ===================

/// Structure for managing the electronic Hamiltonian integrals in the full active space.
///
/// Orbitals are indexed in the order fixed by the fragment layout. Two-electron integrals are in
/// chemists' notation, $`(pq|rs)`$.
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct ActiveSpaceIntegrals {
    /// The constant energy, including nuclear repulsion and the inactive core.
    #[builder(default = "0.0")]
    ecore: f64,

    /// The one-electron integrals with shape `(norb, norb)`.
    h1: Array2<f64>,

    /// The two-electron integrals with shape `(norb, norb, norb, norb)`.
    h2: Array4<f64>,
}

impl ActiveSpaceIntegralsBuilder {
    fn validate(&self) -> Result<(), String> {
        let h1 = self.h1.as_ref().ok_or("No one-electron integrals found.".to_string())?;
        let h2 = self.h2.as_ref().ok_or("No two-electron integrals found.".to_string())?;
        let norb = h1.nrows();
        if h1.ncols() != norb {
            Err(format!(
                "One-electron integrals must be square, but have shape {:?}.",
                h1.shape()
            ))
        } else if h2.shape() != [norb; 4] {
            Err(format!(
                "Two-electron integrals have shape {:?}, but {:?} is required by the one-electron integrals.",
                h2.shape(),
                [norb; 4]
            ))
        } else {
            Ok(())
        }
    }
}

impl ActiveSpaceIntegrals {
    /// Returns a builder to construct a new [`ActiveSpaceIntegrals`].
    pub fn builder() -> ActiveSpaceIntegralsBuilder {
        ActiveSpaceIntegralsBuilder::default()
    }

    /// Generates random integrals with the full permutational symmetry of real orbitals.
    ///
    /// # Arguments
    ///
    /// * `norb` - The number of active orbitals.
    /// * `seed` - The seed of the random number generator.
    /// * `zero_onee` - If `true`, the one-electron integrals are set to zero, so that only the
    ///   two-electron part of the Hamiltonian survives.
    pub fn random(norb: usize, seed: u64, zero_onee: bool) -> Result<Self, anyhow::Error> {
        let mut rng = StdRng::seed_from_u64(seed);
        let raw_h1 = Array2::<f64>::from_shape_simple_fn((norb, norb), || rng.gen::<f64>() - 0.5);
        let h1 = if zero_onee {
            Array2::zeros((norb, norb))
        } else {
            (&raw_h1 + &raw_h1.t()) * 0.5
        };
        let raw_h2 =
            Array4::<f64>::from_shape_simple_fn((norb, norb, norb, norb), || rng.gen::<f64>());
        let h2 = Array4::from_shape_fn((norb, norb, norb, norb), |(p, q, r, s)| {
            [
                (p, q, r, s),
                (q, p, r, s),
                (p, q, s, r),
                (q, p, s, r),
                (r, s, p, q),
                (s, r, p, q),
                (r, s, q, p),
                (s, r, q, p),
            ]
            .iter()
            .map(|&idx| raw_h2[idx])
            .sum::<f64>()
                / 8.0
        });
        Self::builder()
            .h1(h1)
            .h2(h2)
            .build()
            .map_err(|err| format_err!(err))
    }

    /// Returns the constant energy.
    pub fn ecore(&self) -> f64 {
        self.ecore
    }

    /// Returns the one-electron integrals.
    pub fn h1(&self) -> &Array2<f64> {
        &self.h1
    }

    /// Returns the two-electron integrals.
    pub fn h2(&self) -> &Array4<f64> {
        &self.h2
    }

    /// Returns the number of active orbitals.
    pub fn norb(&self) -> usize {
        self.h1.nrows()
    }

    /// Returns the largest violation of the Hermiticity conditions $`h_{pq} = h_{qp}`$ and
    /// $`(pq|rs) = (qp|sr)`$.
    pub fn hermiticity_error(&self) -> f64 {
        let h1_err = self
            .h1
            .indexed_iter()
            .map(|((p, q), &x)| (x - self.h1[(q, p)]).abs())
            .fold(0.0, f64::max);
        let h2_err = self
            .h2
            .indexed_iter()
            .map(|((p, q, r, s), &x)| (x - self.h2[(q, p, s, r)]).abs())
            .fold(0.0, f64::max);
        h1_err.max(h2_err)
    }

    /// Ensures that the integrals describe a Hermitian Hamiltonian to within `thresh`.
    pub fn ensure_hermitian(&self, thresh: f64) -> Result<(), anyhow::Error> {
        let err = self.hermiticity_error();
        ensure!(
            err <= thresh,
            "The active-space integrals deviate from Hermiticity by {err:.3e}, which exceeds the threshold {thresh:.3e}."
        );
        Ok(())
    }

    /// Returns a copy of these integrals with the one-electron part set to zero.
    pub fn without_onee(&self) -> Self {
        Self {
            ecore: self.ecore,
            h1: Array2::zeros(self.h1.raw_dim()),
            h2: self.h2.clone(),
        }
    }

    /// Contracts these integrals with spin-separated transition densities to give the
    /// corresponding Hamiltonian matrix element.
    ///
    /// # Arguments
    ///
    /// * `tdm` - The one- and two-body transition densities.
    /// * `ovlp` - The overlap between the bra and the ket, multiplying the constant energy.
    pub fn contract(&self, tdm: &Tdm12s, ovlp: f64) -> Result<f64, anyhow::Error> {
        ensure!(
            tdm.dm1s.shape()[1] == self.norb(),
            "Densities over {} orbitals cannot be contracted with integrals over {} orbitals.",
            tdm.dm1s.shape()[1],
            self.norb()
        );
        let scalar = |subscripts: &str, dm: &Array4<f64>| {
            einsum(subscripts, &[&self.h2, dm])
                .map(|res| res.sum())
                .map_err(|err| format_err!(err))
        };
        let dm1 = tdm.dm1s.sum_axis(ndarray::Axis(0));
        let e1 = einsum("pq,pq->", &[&self.h1, &dm1])
            .map(|res| res.sum())
            .map_err(|err| format_err!(err))?;
        let e2 = 0.5
            * (scalar("pqrs,pqrs->", &tdm.dm2aa)?
                + scalar("pqrs,pqrs->", &tdm.dm2bb)?
                + scalar("pqrs,pqrs->", &tdm.dm2ab)?
                + scalar("pqrs,rspq->", &tdm.dm2ab)?);
        Ok(self.ecore * ovlp + e1 + e2)
    }
}

impl fmt::Display for ActiveSpaceIntegrals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Active-space integrals")?;
        writeln!(f, "  Number of active orbitals: {}", self.norb())?;
        writeln!(f, "  Constant energy: {:+.10}", self.ecore)?;
        writeln!(
            f,
            "  Max |h1|: {:.6e}",
            self.h1.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
        )?;
        writeln!(
            f,
            "  Max |(pq|rs)|: {:.6e}",
            self.h2.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
        )
    }
}

// ==============
// Operator terms
// ==============

/// Enumerated type for the kinds of second-quantised terms making up an operator.
#[derive(Clone, Debug)]
pub enum TermKind<'a> {
    /// A multiple of the identity.
    Identity(f64),

    /// $`\sum_{pq} h_{pq} \hat{a}^{\dagger}_{p\sigma} \hat{a}_{q\sigma}`$.
    OneBody {
        spin: Spin,
        h1: ArrayView2<'a, f64>,
    },

    /// $`\frac{1}{2} \sum_{pqrs} (pq|rs) \hat{a}^{\dagger}_{p\sigma} \hat{a}^{\dagger}_{r\tau}
    /// \hat{a}_{s\tau} \hat{a}_{q\sigma}`$.
    TwoBody {
        sigma: Spin,
        tau: Spin,
        h2: ArrayView4<'a, f64>,
    },

    /// $`\hat{S}_- \hat{S}_+ = \sum_{pq} \hat{a}^{\dagger}_{p\beta} \hat{a}_{p\alpha}
    /// \hat{a}^{\dagger}_{q\alpha} \hat{a}_{q\beta}`$.
    SpinLadder,
}

/// Structure describing one term of an operator as an ordered string of operator slots, each of
/// which is summed over all active orbitals with a coefficient depending on the orbitals chosen.
#[derive(Clone, Debug)]
pub struct OperatorTerm<'a> {
    kind: TermKind<'a>,
    slots: Vec<SpinOrbitalOp>,
}

impl<'a> OperatorTerm<'a> {
    /// Constructs a term of the given kind with its canonical slot string.
    pub fn new(kind: TermKind<'a>) -> Self {
        let slots = match &kind {
            TermKind::Identity(_) => vec![],
            TermKind::OneBody { spin, .. } => {
                vec![SpinOrbitalOp::cre(*spin), SpinOrbitalOp::des(*spin)]
            }
            TermKind::TwoBody { sigma, tau, .. } => vec![
                SpinOrbitalOp::cre(*sigma),
                SpinOrbitalOp::cre(*tau),
                SpinOrbitalOp::des(*tau),
                SpinOrbitalOp::des(*sigma),
            ],
            TermKind::SpinLadder => vec![
                SpinOrbitalOp::cre(Spin::Beta),
                SpinOrbitalOp::des(Spin::Alpha),
                SpinOrbitalOp::cre(Spin::Alpha),
                SpinOrbitalOp::des(Spin::Beta),
            ],
        };
        Self { kind, slots }
    }

    /// Returns the kind of this term.
    pub fn kind(&self) -> &TermKind<'a> {
        &self.kind
    }

    /// Returns the operator slots in string order.
    pub fn slots(&self) -> &[SpinOrbitalOp] {
        &self.slots
    }

    /// Returns pairs of slots that always carry the same orbital index.
    pub fn tied_slots(&self) -> &'static [(usize, usize)] {
        match self.kind {
            TermKind::SpinLadder => &[(0, 1), (2, 3)],
            _ => &[],
        }
    }

    /// Returns the coefficient of the operator string whose slots carry the full-space orbital
    /// indices `indices`, in slot order.
    pub fn coefficient(&self, indices: &[usize]) -> f64 {
        match &self.kind {
            TermKind::Identity(value) => *value,
            TermKind::OneBody { h1, .. } => h1[(indices[0], indices[1])],
            // Slots hold (p, r, s, q) for (pq|rs).
            TermKind::TwoBody { h2, .. } => {
                0.5 * h2[(indices[0], indices[3], indices[1], indices[2])]
            }
            TermKind::SpinLadder => {
                if indices[0] == indices[1] && indices[2] == indices[3] {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

impl<'a> fmt::Display for OperatorTerm<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.kind {
            TermKind::Identity(value) => format!("{value:+.6} × 1"),
            TermKind::OneBody { spin, .. } => format!("one-body ({spin})"),
            TermKind::TwoBody { sigma, tau, .. } => format!("two-body ({sigma}{tau})"),
            TermKind::SpinLadder => "S-S+".to_string(),
        };
        write!(
            f,
            "{name}: [{}]",
            self.slots.iter().map(|op| op.to_string()).join(", ")
        )
    }
}

/// Returns the terms of the electronic Hamiltonian.
pub fn hamiltonian_terms(integrals: &ActiveSpaceIntegrals) -> Vec<OperatorTerm<'_>> {
    let mut terms = vec![OperatorTerm::new(TermKind::Identity(integrals.ecore()))];
    terms.extend(Spin::ALL.iter().map(|&spin| {
        OperatorTerm::new(TermKind::OneBody {
            spin,
            h1: integrals.h1().view(),
        })
    }));
    terms.extend(
        Spin::ALL
            .iter()
            .cartesian_product(Spin::ALL.iter())
            .map(|(&sigma, &tau)| {
                OperatorTerm::new(TermKind::TwoBody {
                    sigma,
                    tau,
                    h2: integrals.h2().view(),
                })
            }),
    );
    terms
}

/// Returns the terms of $`\hat{S}^2 = \hat{S}_- \hat{S}_+ + \hat{S}_z (\hat{S}_z + 1)`$ within a
/// sector of fixed total $`S_z`$.
pub fn spin_square_terms(sz: f64) -> Vec<OperatorTerm<'static>> {
    vec![
        OperatorTerm::new(TermKind::SpinLadder),
        OperatorTerm::new(TermKind::Identity(sz * (sz + 1.0))),
    ]
}

/// Returns the single term of the identity operator, whose matrix is the overlap.
pub fn overlap_terms() -> Vec<OperatorTerm<'static>> {
    vec![OperatorTerm::new(TermKind::Identity(1.0))]
}
