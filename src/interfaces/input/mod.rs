//! YAML input specification for the `lassi` binary.

use std::path::PathBuf;

use anyhow::{self, ensure};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::drivers::lassi_matrix::{LassiMatrixDriver, LassiMatrixParams};
use crate::drivers::LassiDriver;
use crate::interfaces::InputHandle;
use crate::io::format::{lassi_output, log_subtitle};
use crate::io::{read_lassi_binary, LassiFileType};
use crate::target::fragment::{FragmentLayout, LocalRootManifold};
use crate::target::matrix::LassiSystem;
use crate::target::operator::ActiveSpaceIntegrals;
use crate::target::quantum_numbers::ElectronCountTable;

#[cfg(test)]
#[path = "input_tests.rs"]
mod input_tests;

// ~~~~~~~~~
// Fragments
// ~~~~~~~~~

/// A structure specifying the fragments and their reference electron counts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FragmentInput {
    /// The number of active orbitals in each fragment, in fermionic order.
    pub norbs: Vec<usize>,

    /// The reference $`(n_{\alpha}, n_{\beta})`$ of each fragment, relative to which the charges
    /// and spins of the global roots are given.
    pub nelecas: Vec<(usize, usize)>,
}

// ~~~~~~~~~~
// State list
// ~~~~~~~~~~

/// A structure specifying the global roots as charges, spins, and irreps of every fragment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateListInput {
    /// The charge of every fragment in every global root, indexed first by global root.
    pub charges: Vec<Vec<i32>>,

    /// $`2S_z`$ of every fragment in every global root. If `None`, the lowest non-negative
    /// value compatible with the electron count is used.
    #[serde(default)]
    pub spins: Option<Vec<Vec<i32>>>,

    /// The irrep label of every fragment in every global root. If `None`, point-group symmetry
    /// is not tracked.
    #[serde(default)]
    pub wfnsyms: Option<Vec<Vec<u32>>>,
}

// ~~~~~~~~~~~
// Local roots
// ~~~~~~~~~~~

/// An enumerated type for the possible sources of local roots.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LocalRootSource {
    /// Variant for random local roots.
    Random {
        /// The number of local roots of every fragment in every global root, indexed first by
        /// fragment.
        lroots: Vec<Vec<usize>>,

        /// The seed of the random number generator.
        seed: u64,

        /// If given, the local roots of every fragment in every global root are canonically
        /// orthonormalised with this linear-dependence threshold.
        #[serde(default)]
        orthonormalise: Option<f64>,
    },

    /// Variant for local roots read in from a [`LassiFileType::Ci`] binary file. The associated
    /// path gives the name of the file without its `.lassi.ci` extension.
    FromFile(PathBuf),
}

impl LocalRootSource {
    /// Constructs the local-root manifold.
    fn manifold(
        &self,
        layout: &FragmentLayout,
        table: &ElectronCountTable,
    ) -> Result<LocalRootManifold, anyhow::Error> {
        match self {
            LocalRootSource::Random {
                lroots,
                seed,
                orthonormalise,
            } => {
                let nroots = lroots.first().map(|row| row.len()).unwrap_or(0);
                ensure!(
                    lroots.iter().all(|row| row.len() == nroots),
                    "The local-root multiplicities must form a rectangular table."
                );
                let lroots = Array2::from_shape_vec(
                    (lroots.len(), nroots),
                    lroots.iter().flatten().copied().collect(),
                )?;
                let manifold = LocalRootManifold::random(layout, table, &lroots, *seed)?;
                match orthonormalise {
                    Some(thresh) => manifold.canonical_orthonormalise(*thresh),
                    None => Ok(manifold),
                }
            }
            LocalRootSource::FromFile(name) => {
                let vectors: Vec<Vec<Array3<f64>>> = read_lassi_binary(name, LassiFileType::Ci)?;
                LocalRootManifold::new(layout, table, vectors)
            }
        }
    }
}

// ~~~~~~~~~
// Integrals
// ~~~~~~~~~

/// An enumerated type for the possible sources of active-space integrals.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum IntegralSource {
    /// Variant for random integrals with the permutational symmetry of real orbitals.
    Random {
        /// The seed of the random number generator.
        seed: u64,

        /// Boolean indicating if the one-electron integrals are to be zeroed.
        #[serde(default)]
        zero_onee: bool,
    },

    /// Variant for integrals read in from a [`LassiFileType::Int`] binary file. The associated
    /// path gives the name of the file without its `.lassi.int` extension.
    FromFile(PathBuf),
}

impl IntegralSource {
    /// Constructs the integrals over `norb` active orbitals.
    fn integrals(&self, norb: usize) -> Result<ActiveSpaceIntegrals, anyhow::Error> {
        match self {
            IntegralSource::Random { seed, zero_onee } => {
                ActiveSpaceIntegrals::random(norb, *seed, *zero_onee)
            }
            IntegralSource::FromFile(name) => {
                let raw: ActiveSpaceIntegrals = read_lassi_binary(name, LassiFileType::Int)?;
                // Deserialisation bypasses the shape checks of the builder.
                Ok(ActiveSpaceIntegrals::builder()
                    .ecore(raw.ecore())
                    .h1(raw.h1().clone())
                    .h2(raw.h2().clone())
                    .build()?)
            }
        }
    }
}

// ~~~~~
// Input
// ~~~~~

/// A structure containing `lassi` input parameters which can be serialised into and deserialised
/// from a YAML input file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Input {
    /// Specification of the fragments.
    pub fragments: FragmentInput,

    /// Specification of the global roots.
    pub states: StateListInput,

    /// Source of the local roots.
    pub local_roots: LocalRootSource,

    /// Source of the active-space integrals.
    pub integrals: IntegralSource,

    /// Parameters for matrix construction. If not specified, the defaults of
    /// [`LassiMatrixParams`] are used.
    #[serde(default)]
    pub lassi_matrix: LassiMatrixParams,
}

impl Input {
    /// Assembles the system described by this input.
    pub fn system(&self) -> Result<LassiSystem, anyhow::Error> {
        let layout = FragmentLayout::new(&self.fragments.norbs)?;
        let table = ElectronCountTable::from_state_list(
            &self.fragments.nelecas,
            &self.states.charges,
            self.states.spins.as_deref(),
            self.states.wfnsyms.as_deref(),
        )?;
        let manifold = self.local_roots.manifold(&layout, &table)?;
        let integrals = self.integrals.integrals(layout.norb_total())?;
        LassiSystem::new(layout, table, manifold, integrals)
    }
}

impl Default for Input {
    fn default() -> Self {
        Input {
            fragments: FragmentInput {
                norbs: vec![2, 2],
                nelecas: vec![(1, 1), (1, 1)],
            },
            states: StateListInput {
                charges: vec![vec![0, 0], vec![1, -1], vec![-1, 1]],
                spins: Some(vec![vec![0, 0], vec![1, -1], vec![-1, 1]]),
                wfnsyms: None,
            },
            local_roots: LocalRootSource::Random {
                lroots: vec![vec![1, 2, 2], vec![1, 2, 2]],
                seed: 0,
                orthonormalise: None,
            },
            integrals: IntegralSource::Random {
                seed: 0,
                zero_onee: false,
            },
            lassi_matrix: LassiMatrixParams::default(),
        }
    }
}

impl InputHandle for Input {
    fn handle(&self) -> Result<(), anyhow::Error> {
        let system = self.system()?;
        let mut driver = LassiMatrixDriver::builder()
            .parameters(&self.lassi_matrix)
            .system(&system)
            .build()?;
        driver.run()?;
        let result = driver.result()?;
        log_subtitle("Summary");
        lassi_output!("");
        lassi_output!(
            "Cross-tier certification: {}",
            if result.passed() { "passed" } else { "FAILED" }
        );
        if let Some(si) = result.si.as_ref() {
            if let Some(energy) = si.energies().first() {
                lassi_output!("Lowest state-interaction energy: {energy:+.12}");
            }
        }
        lassi_output!("");
        Ok(())
    }
}
