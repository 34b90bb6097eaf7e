//! Determinant-string spaces and fermionic operator actions on occupation bitstrings.

use std::fmt;

use anyhow::{self, ensure, format_err};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "strings_tests.rs"]
mod strings_tests;

/// The maximum number of spin-orbitals representable in one occupation bitstring.
pub const MAX_SPIN_ORBITALS: usize = u64::BITS as usize;

// ==================
// Enum definitions
// ==================

/// An enumerated type for the two spin projections of an electron.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Spin {
    /// Variant for spin-up ($`\alpha`$) electrons.
    Alpha,

    /// Variant for spin-down ($`\beta`$) electrons.
    Beta,
}

impl Spin {
    /// Both spin projections, in the order they are laid out inside a fragment.
    pub const ALL: [Spin; 2] = [Spin::Alpha, Spin::Beta];

    /// Returns the position of this spin in per-spin arrays.
    pub fn index(&self) -> usize {
        match self {
            Spin::Alpha => 0,
            Spin::Beta => 1,
        }
    }
}

impl fmt::Display for Spin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Spin::Alpha => write!(f, "α"),
            Spin::Beta => write!(f, "β"),
        }
    }
}

/// An enumerated type for the two elementary fermionic actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Action {
    /// Variant for creation operators $`\hat{a}^{\dagger}`$.
    Create,

    /// Variant for annihilation operators $`\hat{a}`$.
    Annihilate,
}

/// Structure describing a fermionic operator acting on some spatial orbital with a definite spin.
/// The orbital index itself is supplied separately when the operator is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpinOrbitalOp {
    /// The action of the operator.
    pub action: Action,

    /// The spin of the orbital acted upon.
    pub spin: Spin,
}

impl SpinOrbitalOp {
    /// Returns a creation operator of the specified spin.
    pub fn cre(spin: Spin) -> Self {
        Self {
            action: Action::Create,
            spin,
        }
    }

    /// Returns an annihilation operator of the specified spin.
    pub fn des(spin: Spin) -> Self {
        Self {
            action: Action::Annihilate,
            spin,
        }
    }

    /// Returns the change in the number of electrons of spin `spin` caused by this operator.
    pub fn delta(&self, spin: Spin) -> i32 {
        match (self.action, self.spin == spin) {
            (_, false) => 0,
            (Action::Create, true) => 1,
            (Action::Annihilate, true) => -1,
        }
    }
}

impl fmt::Display for SpinOrbitalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            Action::Create => write!(f, "a†{}", self.spin),
            Action::Annihilate => write!(f, "a{}", self.spin),
        }
    }
}

// ================
// Bitstring actions
// ================

/// Applies an elementary fermionic operator to a determinant given as an occupation bitstring.
///
/// A bitstring $`d`$ stands for the determinant
/// ```math
///     \hat{a}^{\dagger}_{s_1} \hat{a}^{\dagger}_{s_2} \cdots \hat{a}^{\dagger}_{s_k}
///     \ket{\mathrm{vac}}, \quad s_1 < s_2 < \cdots < s_k,
/// ```
/// so acting on spin-orbital $`s`$ picks up one sign per occupied spin-orbital below $`s`$.
///
/// # Arguments
///
/// * `det` - The occupation bitstring.
/// * `index` - The spin-orbital index acted upon.
/// * `action` - Creation or annihilation.
///
/// # Returns
///
/// `None` if the result vanishes, otherwise the new bitstring and its sign.
pub fn apply_operator(det: u64, index: usize, action: Action) -> Option<(u64, f64)> {
    debug_assert!(index < MAX_SPIN_ORBITALS);
    let bit = 1u64 << index;
    let occupied = det & bit != 0;
    let new_det = match (action, occupied) {
        (Action::Create, false) => det | bit,
        (Action::Annihilate, true) => det & !bit,
        _ => return None,
    };
    let sign = if (det & (bit - 1)).count_ones() % 2 == 0 {
        1.0
    } else {
        -1.0
    };
    Some((new_det, sign))
}

// ==================
// Struct definitions
// ==================

/// Structure containing the ordered list of occupation strings of a fixed number of electrons in
/// a fixed number of orbitals. Strings are ordered by increasing integer value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringSpace {
    /// The number of orbitals.
    norb: usize,

    /// The number of electrons.
    nelec: usize,

    /// The occupation strings, sorted in increasing order.
    strings: Vec<u64>,
}

impl StringSpace {
    /// Constructs the string space of `nelec` electrons in `norb` orbitals.
    pub fn new(norb: usize, nelec: usize) -> Result<Self, anyhow::Error> {
        ensure!(
            norb <= MAX_SPIN_ORBITALS / 2,
            "At most {} orbitals per spin are supported, but {norb} were requested.",
            MAX_SPIN_ORBITALS / 2
        );
        ensure!(
            nelec <= norb,
            "Unable to place {nelec} electron(s) of one spin into {norb} orbital(s)."
        );
        let mut strings = (0..norb)
            .combinations(nelec)
            .map(|occ| occ.iter().fold(0u64, |acc, &p| acc | (1u64 << p)))
            .collect_vec();
        strings.sort_unstable();
        Ok(Self {
            norb,
            nelec,
            strings,
        })
    }

    /// Returns the number of orbitals.
    pub fn norb(&self) -> usize {
        self.norb
    }

    /// Returns the number of electrons.
    pub fn nelec(&self) -> usize {
        self.nelec
    }

    /// Returns the number of strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns `true` if the space contains no strings.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Returns the string at address `i`.
    pub fn string(&self, i: usize) -> u64 {
        self.strings[i]
    }

    /// Returns the address of a string, or `None` if it does not belong to this space.
    pub fn address(&self, string: u64) -> Option<usize> {
        self.strings.binary_search(&string).ok()
    }
}

/// Structure describing the determinant space of one fragment at fixed
/// $`(N_{\alpha}, N_{\beta})`$.
///
/// A determinant is addressed by a pair of string indices $`(I_{\alpha}, I_{\beta})`$. Its
/// fragment-local occupation bitstring places the $`\alpha`$ orbitals in the lowest `norb` bits
/// followed by the $`\beta`$ orbitals, so that the determinant is
/// $`\hat{A}(I_{\alpha}) \hat{B}(I_{\beta}) \ket{\mathrm{vac}}`$ with all creators in ascending
/// orbital order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeterminantSpace {
    /// The $`\alpha`$-string space.
    alpha: StringSpace,

    /// The $`\beta`$-string space.
    beta: StringSpace,
}

impl DeterminantSpace {
    /// Constructs the determinant space of `(na, nb)` electrons in `norb` spatial orbitals.
    pub fn new(norb: usize, na: usize, nb: usize) -> Result<Self, anyhow::Error> {
        Ok(Self {
            alpha: StringSpace::new(norb, na)?,
            beta: StringSpace::new(norb, nb)?,
        })
    }

    /// Returns the number of spatial orbitals.
    pub fn norb(&self) -> usize {
        self.alpha.norb()
    }

    /// Returns the electron counts $`(N_{\alpha}, N_{\beta})`$.
    pub fn nelec(&self) -> (usize, usize) {
        (self.alpha.nelec(), self.beta.nelec())
    }

    /// Returns the shape $`(n_{\alpha\mathrm{str}}, n_{\beta\mathrm{str}})`$ of CI vectors in this
    /// space.
    pub fn shape(&self) -> (usize, usize) {
        (self.alpha.len(), self.beta.len())
    }

    /// Returns the fragment-local spin-orbital index of spatial orbital `p` with spin `spin`.
    pub fn spin_orbital(&self, p: usize, spin: Spin) -> usize {
        match spin {
            Spin::Alpha => p,
            Spin::Beta => self.norb() + p,
        }
    }

    /// Returns the fragment-local occupation bitstring of determinant $`(I_{\alpha}, I_{\beta})`$.
    pub fn det(&self, ia: usize, ib: usize) -> u64 {
        self.alpha.string(ia) | (self.beta.string(ib) << self.norb())
    }

    /// Returns the string addresses of a fragment-local occupation bitstring, or `None` if the
    /// bitstring does not belong to this space.
    pub fn address(&self, det: u64) -> Option<(usize, usize)> {
        let norb = self.norb();
        let mask = if norb == 0 { 0 } else { u64::MAX >> (64 - norb) };
        let ia = self.alpha.address(det & mask)?;
        let ib = self.beta.address(det >> norb)?;
        Some((ia, ib))
    }

    /// Returns an error if a CI vector shape does not match this space.
    pub fn check_shape(&self, shape: &[usize]) -> Result<(), anyhow::Error> {
        let (nstra, nstrb) = self.shape();
        if shape == [nstra, nstrb] {
            Ok(())
        } else {
            Err(format_err!(
                "CI vector shape {shape:?} does not match the ({nstra}, {nstrb}) string space of {:?} electrons in {} orbitals.",
                self.nelec(),
                self.norb()
            ))
        }
    }
}
