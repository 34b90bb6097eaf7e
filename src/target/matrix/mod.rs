//! Assembly of the Hamiltonian, $`\hat{S}^2`$, and overlap matrices in the product-state basis.
//!
//! Three interchangeable builders implement [`MatrixBuilder`]:
//!
//! * [`tier0::ReferenceBuilder`] expands every product state in the full active space and
//!   contracts full-space transition densities with the integrals;
//! * [`tier1::CachedBuilder`] factorises every operator term over fragments and shares
//!   fragment-local transition densities through a cache;
//! * [`tier2::BlockedBuilder`] evaluates only unique same-block global-root pairs, in parallel,
//!   and fills the remaining blocks by Hermiticity.

use std::fmt;

use anyhow::{self, ensure};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::target::fragment::FragmentLayout;
use crate::target::fragment::LocalRootManifold;
use crate::target::operator::ActiveSpaceIntegrals;
use crate::target::product::ProductBasis;
use crate::target::quantum_numbers::{ElectronCountTable, QuantumNumberIndexer};

pub mod plan;
pub mod tier0;
pub mod tier1;
pub mod tier2;


// ======
// System
// ======

/// Structure bundling every input of a matrix build, checked for mutual consistency.
#[derive(Clone, Debug)]
pub struct LassiSystem {
    /// The fragment layout fixing the fermionic order.
    layout: FragmentLayout,

    /// The electron counts of every fragment in every global root.
    table: ElectronCountTable,

    /// The local roots.
    manifold: LocalRootManifold,

    /// The active-space integrals.
    integrals: ActiveSpaceIntegrals,

    /// The grouping of global roots into quantum-number blocks.
    indexer: QuantumNumberIndexer,

    /// The product-state basis.
    basis: ProductBasis,
}

impl LassiSystem {
    /// Bundles and cross-validates the inputs of a matrix build, then indexes the global roots and
    /// enumerates the product states.
    ///
    /// # Errors
    ///
    /// Errors if the layout, the electron-count table, the local roots and the integrals disagree
    /// on the number of fragments, global roots, orbitals, or electrons.
    pub fn new(
        layout: FragmentLayout,
        table: ElectronCountTable,
        manifold: LocalRootManifold,
        integrals: ActiveSpaceIntegrals,
    ) -> Result<Self, anyhow::Error> {
        ensure!(
            table.nfrags() == layout.nfrags() && manifold.nfrags() == layout.nfrags(),
            "Inconsistent numbers of fragments: {} in the layout, {} in the electron-count table, {} in the local roots.",
            layout.nfrags(),
            table.nfrags(),
            manifold.nfrags()
        );
        ensure!(
            manifold.nroots() == table.nroots(),
            "Local roots are given for {} global root(s), but the electron-count table declares {}.",
            manifold.nroots(),
            table.nroots()
        );
        for frag in 0..layout.nfrags() {
            for root in 0..table.nroots() {
                let space = manifold.get(frag, root).space();
                ensure!(
                    space.norb() == layout.norb(frag) && space.nelec() == table.nelec(frag, root),
                    "Local roots of fragment {frag} in global root {root} span {} orbital(s) with {:?} electrons, but {} orbital(s) with {:?} electrons are declared.",
                    space.norb(),
                    space.nelec(),
                    layout.norb(frag),
                    table.nelec(frag, root)
                );
            }
        }
        ensure!(
            integrals.norb() == layout.norb_total(),
            "Integrals span {} orbital(s), but the fragments hold {} in total.",
            integrals.norb(),
            layout.norb_total()
        );
        let indexer = QuantumNumberIndexer::new(&table);
        let basis = ProductBasis::new(&manifold.lroots())?;
        Ok(Self {
            layout,
            table,
            manifold,
            integrals,
            indexer,
            basis,
        })
    }

    /// Returns the fragment layout.
    pub fn layout(&self) -> &FragmentLayout {
        &self.layout
    }

    /// Returns the electron-count table.
    pub fn table(&self) -> &ElectronCountTable {
        &self.table
    }

    /// Returns the local-root manifold.
    pub fn manifold(&self) -> &LocalRootManifold {
        &self.manifold
    }

    /// Returns the active-space integrals.
    pub fn integrals(&self) -> &ActiveSpaceIntegrals {
        &self.integrals
    }

    /// Returns the quantum-number indexer.
    pub fn indexer(&self) -> &QuantumNumberIndexer {
        &self.indexer
    }

    /// Returns the product-state basis.
    pub fn basis(&self) -> &ProductBasis {
        &self.basis
    }

    /// Returns a copy of this system with different integrals.
    pub fn with_integrals(&self, integrals: ActiveSpaceIntegrals) -> Result<Self, anyhow::Error> {
        Self::new(
            self.layout.clone(),
            self.table.clone(),
            self.manifold.clone(),
            integrals,
        )
    }
}

impl fmt::Display for LassiSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.layout)?;
        writeln!(f, "Number of global roots: {}", self.table.nroots())?;
        writeln!(f, "Number of product states: {}", self.basis.dim())?;
        writeln!(f, "Quantum-number blocks:")?;
        write!(f, "{}", self.indexer)
    }
}

// ========
// Matrices
// ========

/// Enumerated type for the matrices assembled by a build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixKind {
    /// The electronic Hamiltonian.
    Hamiltonian,

    /// The total spin-squared operator.
    SpinSquare,

    /// The overlap.
    Overlap,
}

impl MatrixKind {
    /// All matrix kinds in output order.
    pub const ALL: [MatrixKind; 3] = [
        MatrixKind::Hamiltonian,
        MatrixKind::SpinSquare,
        MatrixKind::Overlap,
    ];
}

impl fmt::Display for MatrixKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixKind::Hamiltonian => write!(f, "H"),
            MatrixKind::SpinSquare => write!(f, "S²"),
            MatrixKind::Overlap => write!(f, "S"),
        }
    }
}

/// Structure containing the dense matrices over the full product-state basis, in the order fixed
/// by the [`ProductBasis`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LassiMatrices {
    /// The Hamiltonian matrix.
    pub ham: Array2<f64>,

    /// The $`\hat{S}^2`$ matrix.
    pub s2: Array2<f64>,

    /// The overlap matrix.
    pub ovlp: Array2<f64>,
}

impl LassiMatrices {
    /// Returns zero matrices of dimension `dim`.
    pub fn zeros(dim: usize) -> Self {
        Self {
            ham: Array2::zeros((dim, dim)),
            s2: Array2::zeros((dim, dim)),
            ovlp: Array2::zeros((dim, dim)),
        }
    }

    /// Returns the dimension of the matrices.
    pub fn dim(&self) -> usize {
        self.ovlp.nrows()
    }

    /// Returns the matrix of the given kind.
    pub fn get(&self, kind: MatrixKind) -> &Array2<f64> {
        match kind {
            MatrixKind::Hamiltonian => &self.ham,
            MatrixKind::SpinSquare => &self.s2,
            MatrixKind::Overlap => &self.ovlp,
        }
    }
}

// ========
// Builders
// ========

/// Enumerated type for the interchangeable matrix-building algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatrixTier {
    /// Full-space expansion of every product state. Serves as the reference.
    Reference,

    /// Fragment-factorised contraction over every same-block product-state pair, sharing
    /// fragment-local densities.
    Cached,

    /// Fragment-factorised contraction over unique same-block global-root pairs in parallel.
    Blocked,
}

impl MatrixTier {
    /// All tiers in order of increasing sophistication.
    pub const ALL: [MatrixTier; 3] = [
        MatrixTier::Reference,
        MatrixTier::Cached,
        MatrixTier::Blocked,
    ];

    /// Returns the builder implementing this tier.
    ///
    /// # Arguments
    ///
    /// * `hermiticity_threshold` - The largest tolerated deviation of the integrals from
    ///   Hermiticity, used by builders that fill blocks by transposition.
    pub fn builder(&self, hermiticity_threshold: f64) -> Box<dyn MatrixBuilder> {
        match self {
            MatrixTier::Reference => Box::new(tier0::ReferenceBuilder),
            MatrixTier::Cached => Box::new(tier1::CachedBuilder),
            MatrixTier::Blocked => Box::new(tier2::BlockedBuilder::new(hermiticity_threshold)),
        }
    }
}

impl fmt::Display for MatrixTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixTier::Reference => write!(f, "tier 0 (reference)"),
            MatrixTier::Cached => write!(f, "tier 1 (cached)"),
            MatrixTier::Blocked => write!(f, "tier 2 (blocked)"),
        }
    }
}

/// Trait for algorithms building the Hamiltonian, $`\hat{S}^2`$, and overlap matrices of a
/// [`LassiSystem`].
///
/// Every implementation must return matrices in the order of [`LassiSystem::basis`] and leave
/// every element coupling different quantum-number blocks exactly zero.
pub trait MatrixBuilder {
    /// Returns the tier implemented by this builder.
    fn tier(&self) -> MatrixTier;

    /// Builds the matrices.
    fn build(&self, system: &LassiSystem) -> Result<LassiMatrices, anyhow::Error>;
}
