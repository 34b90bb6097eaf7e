//! Transition densities between local roots and between product states.
//!
//! A fragment-local transition density for an operator pattern
//! $`\hat{o}_1 \hat{o}_2 \cdots \hat{o}_m`$ between local roots $`\ket{i}`$ and $`\ket{j}`$ of a
//! fragment is the tensor
//! ```math
//!     T_{p_1 p_2 \cdots p_m} = \braket{i | \hat{o}_1(p_1) \hat{o}_2(p_2) \cdots \hat{o}_m(p_m) | j},
//! ```
//! where each $`\hat{o}_k`$ creates or annihilates an electron of definite spin in local orbital
//! $`p_k`$. The empty pattern gives the overlap, two-operator patterns give one-body densities
//! (including spin-flip and pair-creation/annihilation components needed for cross-fragment
//! coupling), and longer patterns give the higher-body pieces.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use anyhow::{self, ensure};
use itertools::Itertools;
use ndarray::{ArrayD, ArrayView2, IxDyn};

use crate::target::fragment::strings::{apply_operator, DeterminantSpace, Spin, SpinOrbitalOp};
use crate::target::fragment::LocalRootManifold;

pub mod full;
pub mod sign;


// ================
// Operator pattern
// ================

/// Structure containing an ordered string of fermionic operators acting within one fragment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperatorPattern(Vec<SpinOrbitalOp>);

impl OperatorPattern {
    /// Wraps an operator string.
    pub fn new(ops: Vec<SpinOrbitalOp>) -> Self {
        Self(ops)
    }

    /// Returns the empty pattern, whose transition density is the overlap.
    pub fn identity() -> Self {
        Self(vec![])
    }

    /// Returns the operators in the pattern.
    pub fn ops(&self) -> &[SpinOrbitalOp] {
        &self.0
    }

    /// Returns the number of operators in the pattern.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the pattern is the identity.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the change in the number of electrons of spin `spin` caused by the pattern.
    pub fn delta(&self, spin: Spin) -> i32 {
        self.0.iter().map(|op| op.delta(spin)).sum()
    }

    /// Returns `true` if the pattern can connect a ket with electron counts `ket` to a bra with
    /// electron counts `bra`.
    pub fn connects(&self, bra: (usize, usize), ket: (usize, usize)) -> bool {
        bra.0 as i32 - ket.0 as i32 == self.delta(Spin::Alpha)
            && bra.1 as i32 - ket.1 as i32 == self.delta(Spin::Beta)
    }
}

impl fmt::Display for OperatorPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "1")
        } else {
            write!(f, "{}", self.0.iter().map(|op| op.to_string()).join(" "))
        }
    }
}

// ==========================
// Fragment-local densities
// ==========================

/// Applies a string of operators with explicit local orbital indices, rightmost first, to a
/// fragment-local determinant.
fn apply_string(
    det: u64,
    ops: &[SpinOrbitalOp],
    indices: &[usize],
    space: &DeterminantSpace,
) -> Option<(u64, f64)> {
    ops.iter()
        .zip(indices.iter())
        .rev()
        .try_fold((det, 1.0), |(d, sign), (op, &p)| {
            apply_operator(d, space.spin_orbital(p, op.spin), op.action)
                .map(|(new_d, s)| (new_d, sign * s))
        })
}

/// Calculates the fragment-local transition density of an operator pattern between two local
/// roots of the same fragment.
///
/// # Arguments
///
/// * `bra` - The bra local root, with shape `(nstr_alpha, nstr_beta)` of `bra_space`.
/// * `bra_space` - The determinant space of the bra.
/// * `ket` - The ket local root, with shape `(nstr_alpha, nstr_beta)` of `ket_space`.
/// * `ket_space` - The determinant space of the ket.
/// * `pattern` - The operator pattern.
///
/// # Returns
///
/// `None` if the pattern cannot bridge the electron counts of the bra and the ket, in which case
/// the density vanishes identically. Otherwise, a tensor with one axis of length `norb` per
/// operator in the pattern (a zero-dimensional tensor holding the overlap for the identity
/// pattern).
pub fn calc_fragment_tdm(
    bra: &ArrayView2<f64>,
    bra_space: &DeterminantSpace,
    ket: &ArrayView2<f64>,
    ket_space: &DeterminantSpace,
    pattern: &OperatorPattern,
) -> Result<Option<ArrayD<f64>>, anyhow::Error> {
    ensure!(
        bra_space.norb() == ket_space.norb(),
        "Bra and ket live on fragments of different sizes: {} != {}.",
        bra_space.norb(),
        ket_space.norb()
    );
    bra_space.check_shape(bra.shape())?;
    ket_space.check_shape(ket.shape())?;
    if !pattern.connects(bra_space.nelec(), ket_space.nelec()) {
        return Ok(None);
    }

    let norb = ket_space.norb();
    let m = pattern.len();
    if m == 0 {
        let ovlp = bra
            .iter()
            .zip(ket.iter())
            .map(|(b, k)| b * k)
            .sum::<f64>();
        return Ok(Some(ArrayD::from_elem(IxDyn(&[]), ovlp)));
    }

    let mut tdm = ArrayD::<f64>::zeros(IxDyn(&vec![norb; m]));
    let index_tuples = (0..m).map(|_| 0..norb).multi_cartesian_product().collect_vec();
    for ((ia, ib), &c) in ket.indexed_iter() {
        if c == 0.0 {
            continue;
        }
        let det = ket_space.det(ia, ib);
        for indices in index_tuples.iter() {
            let Some((new_det, sign)) = apply_string(det, pattern.ops(), indices, ket_space) else {
                continue;
            };
            if let Some((ja, jb)) = bra_space.address(new_det) {
                tdm[IxDyn(indices)] += sign * c * bra[(ja, jb)];
            }
        }
    }
    Ok(Some(tdm))
}

// ==============
// Density cache
// ==============

/// Structure identifying one local root by its global root and its index among the local roots
/// of that global root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalRootIndex {
    /// The global root.
    pub root: usize,

    /// The local-root index within the global root.
    pub lroot: usize,
}

type TdmKey = (usize, LocalRootIndex, LocalRootIndex, OperatorPattern);

/// Structure caching fragment-local transition densities for the lifetime of one matrix build.
///
/// Densities are keyed only by the fragment, the two local roots on that fragment, and the
/// operator pattern, so they are shared by every pair of product states differing only on other
/// fragments.
pub struct FragmentTdmCache<'a> {
    /// The local-root manifold from which densities are computed.
    manifold: &'a LocalRootManifold,

    /// The cached densities. `None` marks densities forbidden by the selection rule.
    cache: HashMap<TdmKey, Option<Rc<ArrayD<f64>>>>,

    /// The number of lookups served from the cache.
    hits: usize,
}

impl<'a> FragmentTdmCache<'a> {
    /// Creates an empty cache over a local-root manifold.
    pub fn new(manifold: &'a LocalRootManifold) -> Self {
        Self {
            manifold,
            cache: HashMap::new(),
            hits: 0,
        }
    }

    /// Returns the fragment-local transition density of `pattern` on fragment `frag` between
    /// local roots `bra` and `ket`, computing it on first request.
    pub fn get(
        &mut self,
        frag: usize,
        bra: LocalRootIndex,
        ket: LocalRootIndex,
        pattern: &OperatorPattern,
    ) -> Result<Option<Rc<ArrayD<f64>>>, anyhow::Error> {
        let key = (frag, bra, ket, pattern.clone());
        if let Some(tdm) = self.cache.get(&key) {
            self.hits += 1;
            return Ok(tdm.clone());
        }
        let bra_roots = self.manifold.get(frag, bra.root);
        let ket_roots = self.manifold.get(frag, ket.root);
        let tdm = calc_fragment_tdm(
            &bra_roots.vector(bra.lroot),
            bra_roots.space(),
            &ket_roots.vector(ket.lroot),
            ket_roots.space(),
            pattern,
        )?
        .map(Rc::new);
        self.cache.insert(key, tdm.clone());
        Ok(tdm)
    }

    /// Returns the number of distinct densities computed so far.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if no densities have been computed yet.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Returns the number of lookups served from the cache.
    pub fn hits(&self) -> usize {
        self.hits
    }
}
