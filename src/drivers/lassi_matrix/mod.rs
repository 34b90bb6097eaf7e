//! Driver for LASSI matrix construction, cross-tier certification, and state interaction.

use std::fmt;
use std::path::PathBuf;

use anyhow::{self, format_err};
use derive_builder::Builder;
use itertools::Itertools;
use log;
use serde::{Deserialize, Serialize};

use crate::drivers::LassiDriver;
use crate::io::format::{
    lassi_output, lassi_warn, log_macsec_begin, log_macsec_end, log_subtitle, log_title,
    nice_bool, write_title, LassiOutput,
};
use crate::io::{write_lassi_binary, LassiFileType};
use crate::target::fingerprint::{
    compare_blocks, compare_full, fingerprint, FingerprintComparison,
    DEFAULT_FINGERPRINT_TOLERANCE,
};
use crate::target::matrix::{LassiMatrices, LassiSystem, MatrixKind, MatrixTier};
use crate::target::si::{solve_si, SiSolution};

#[cfg(test)]
#[path = "lassi_matrix_tests.rs"]
mod lassi_matrix_tests;

fn default_true() -> bool {
    true
}

fn default_tier() -> MatrixTier {
    MatrixTier::Blocked
}

fn default_cross_check() -> Vec<MatrixTier> {
    vec![MatrixTier::Reference]
}

fn default_fingerprint_tolerance() -> f64 {
    DEFAULT_FINGERPRINT_TOLERANCE
}

fn default_hermiticity_threshold() -> f64 {
    1e-10
}

fn default_linear_dependence_threshold() -> f64 {
    1e-8
}

// ==================
// Struct definitions
// ==================

// ----------
// Parameters
// ----------

/// A structure containing control parameters for LASSI matrix construction.
#[derive(Clone, Builder, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct LassiMatrixParams {
    /// The tier used to build the matrices.
    #[builder(default = "MatrixTier::Blocked")]
    #[serde(default = "default_tier")]
    pub tier: MatrixTier,

    /// Further tiers whose matrices are built and compared against those of [`Self::tier`]. A
    /// pair involving [`MatrixTier::Blocked`] is compared block by block; any other pair is
    /// compared on the full matrices.
    #[builder(default = "vec![MatrixTier::Reference]")]
    #[serde(default = "default_cross_check")]
    pub cross_check: Vec<MatrixTier>,

    /// Absolute tolerance on fingerprint differences.
    #[builder(default = "DEFAULT_FINGERPRINT_TOLERANCE")]
    #[serde(default = "default_fingerprint_tolerance")]
    pub fingerprint_tolerance: f64,

    /// Largest tolerated deviation of the integrals from Hermiticity, and of the assembled
    /// matrices from symmetry when solving the state-interaction problem.
    #[builder(default = "1e-10")]
    #[serde(default = "default_hermiticity_threshold")]
    pub hermiticity_threshold: f64,

    /// Boolean indicating if the state-interaction problem is to be solved.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub solve_si: bool,

    /// Threshold for discarding linearly dependent product states in the state-interaction
    /// problem.
    #[builder(default = "1e-8")]
    #[serde(default = "default_linear_dependence_threshold")]
    pub linear_dependence_threshold: f64,

    /// Optional name for saving the matrices as a binary file of type [`LassiFileType::Mat`]. If
    /// `None`, the matrices will not be saved.
    #[builder(default = "None")]
    #[serde(default)]
    pub matrices_save_name: Option<PathBuf>,
}

impl LassiMatrixParamsBuilder {
    fn validate(&self) -> Result<(), String> {
        let positive = [
            ("fingerprint tolerance", self.fingerprint_tolerance),
            ("Hermiticity threshold", self.hermiticity_threshold),
            ("linear-dependence threshold", self.linear_dependence_threshold),
        ];
        for (name, value) in positive {
            if let Some(value) = value {
                if value.is_nan() || value <= 0.0 {
                    return Err(format!("The {name} must be positive, but {value:.3e} was given."));
                }
            }
        }
        Ok(())
    }
}

impl LassiMatrixParams {
    /// Returns a builder to construct a [`LassiMatrixParams`] structure.
    pub fn builder() -> LassiMatrixParamsBuilder {
        LassiMatrixParamsBuilder::default()
    }

    /// Returns the cross-check tiers other than the main tier, without repetition.
    fn effective_cross_check(&self) -> Vec<MatrixTier> {
        self.cross_check
            .iter()
            .filter(|&&tier| tier != self.tier)
            .unique()
            .copied()
            .collect_vec()
    }
}

impl Default for LassiMatrixParams {
    fn default() -> Self {
        Self::builder()
            .build()
            .expect("Unable to construct a default `LassiMatrixParams`.")
    }
}

impl fmt::Display for LassiMatrixParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix tier: {}", self.tier)?;
        let cross_check = self.effective_cross_check();
        if cross_check.is_empty() {
            writeln!(f, "Cross-check tiers: none")?;
        } else {
            writeln!(
                f,
                "Cross-check tiers: {}",
                cross_check.iter().map(|tier| tier.to_string()).join(", ")
            )?;
        }
        writeln!(f, "Fingerprint tolerance: {:.3e}", self.fingerprint_tolerance)?;
        writeln!(f, "Hermiticity threshold: {:.3e}", self.hermiticity_threshold)?;
        writeln!(f, "Solve state interaction: {}", nice_bool(self.solve_si))?;
        if self.solve_si {
            writeln!(
                f,
                "Linear-dependence threshold: {:.3e}",
                self.linear_dependence_threshold
            )?;
        }
        if let Some(name) = self.matrices_save_name.as_ref() {
            writeln!(
                f,
                "Matrices saved to: {}",
                name.with_extension(LassiFileType::Mat.ext()).display()
            )?;
        }
        Ok(())
    }
}

// ------
// Result
// ------

/// A structure to contain the results of LASSI matrix construction.
#[derive(Clone, Builder, Debug, Serialize, Deserialize)]
pub struct LassiMatrixResult {
    /// The control parameters used to obtain this set of results.
    pub parameters: LassiMatrixParams,

    /// The matrices built by the main tier.
    pub matrices: LassiMatrices,

    /// The full-matrix fingerprint of every matrix kind built by the main tier.
    pub fingerprints: Vec<(MatrixKind, f64)>,

    /// The comparisons against every cross-check tier.
    #[builder(default = "vec![]")]
    pub comparisons: Vec<(MatrixTier, Vec<FingerprintComparison>)>,

    /// The state-interaction solution, if requested.
    #[builder(default = "None")]
    pub si: Option<SiSolution>,
}

impl LassiMatrixResult {
    fn builder() -> LassiMatrixResultBuilder {
        LassiMatrixResultBuilder::default()
    }

    /// Returns `true` if every cross-check comparison passed.
    pub fn passed(&self) -> bool {
        self.comparisons
            .iter()
            .all(|(_, comparisons)| comparisons.iter().all(FingerprintComparison::passed))
    }

    /// Returns the comparisons that failed.
    pub fn mismatches(&self) -> Vec<(MatrixTier, &FingerprintComparison)> {
        self.comparisons
            .iter()
            .flat_map(|(tier, comparisons)| {
                comparisons
                    .iter()
                    .filter(|comparison| !comparison.passed())
                    .map(move |comparison| (*tier, comparison))
            })
            .collect()
    }
}

impl fmt::Display for LassiMatrixResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_title(f, "LASSI Matrix Summary")?;
        writeln!(f)?;
        writeln!(f, "Dimension: {}", self.matrices.dim())?;
        for (kind, fp) in self.fingerprints.iter() {
            writeln!(f, "Fingerprint of {kind}: {fp:+.12e}")?;
        }
        for (tier, comparisons) in self.comparisons.iter() {
            let npassed = comparisons.iter().filter(|c| c.passed()).count();
            writeln!(
                f,
                "Agreement with {tier}: {npassed}/{} comparison(s) within tolerance",
                comparisons.len()
            )?;
        }
        if let Some(si) = self.si.as_ref() {
            writeln!(f)?;
            write!(f, "{si}")?;
        }
        Ok(())
    }
}

// ------
// Driver
// ------

/// A driver for LASSI matrix construction.
#[derive(Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct LassiMatrixDriver<'a> {
    /// The control parameters for LASSI matrix construction.
    parameters: &'a LassiMatrixParams,

    /// The system whose matrices are to be built.
    system: &'a LassiSystem,

    /// The result of the matrix construction.
    #[builder(setter(skip), default = "None")]
    result: Option<LassiMatrixResult>,
}

impl<'a> LassiMatrixDriverBuilder<'a> {
    fn validate(&self) -> Result<(), String> {
        let params = self
            .parameters
            .ok_or("No LASSI matrix parameters found.".to_string())?;
        let system = self.system.ok_or("No LASSI system found.".to_string())?;
        let uses_blocked = params.tier == MatrixTier::Blocked
            || params.cross_check.contains(&MatrixTier::Blocked);
        let herm_err = system.integrals().hermiticity_error();
        if uses_blocked && herm_err > params.hermiticity_threshold {
            Err(format!(
                "The blocked tier requires Hermitian integrals, but the integrals deviate from Hermiticity by {herm_err:.3e} > {:.3e}.",
                params.hermiticity_threshold
            ))
        } else {
            Ok(())
        }
    }
}

impl<'a> LassiMatrixDriver<'a> {
    /// Returns a builder to construct a [`LassiMatrixDriver`] structure.
    pub fn builder() -> LassiMatrixDriverBuilder<'a> {
        LassiMatrixDriverBuilder::default()
    }

    fn build_tier(&self, tier: MatrixTier) -> Result<LassiMatrices, anyhow::Error> {
        log::debug!("Building matrices with {tier}.");
        tier.builder(self.parameters.hermiticity_threshold)
            .build(self.system)
    }

    /// Compares the matrices of a cross-check tier against those of the main tier.
    fn cross_check(
        &self,
        tier: MatrixTier,
        matrices: &LassiMatrices,
    ) -> Result<Vec<FingerprintComparison>, anyhow::Error> {
        let params = self.parameters;
        let reference = self.build_tier(tier)?;
        let blockwise = tier == MatrixTier::Blocked || params.tier == MatrixTier::Blocked;
        let comparisons = if blockwise {
            compare_blocks(
                &reference,
                matrices,
                self.system.basis(),
                params.fingerprint_tolerance,
            )?
        } else {
            compare_full(&reference, matrices, params.fingerprint_tolerance)?
        };
        let mismatches = comparisons.iter().filter(|c| !c.passed()).collect_vec();
        lassi_output!(
            "{} against {tier}: {}/{} {} comparison(s) within {:.3e}",
            params.tier,
            comparisons.len() - mismatches.len(),
            comparisons.len(),
            if blockwise { "block" } else { "full-matrix" },
            params.fingerprint_tolerance
        );
        for mismatch in mismatches.iter() {
            lassi_warn!("Fingerprint mismatch against {tier}: {mismatch}");
        }
        Ok(comparisons)
    }

    /// Executes LASSI matrix construction.
    fn build_matrices(&mut self) -> Result<(), anyhow::Error> {
        log_title("LASSI Matrix Construction");
        lassi_output!("");
        let params = self.parameters;
        params.log_output_display();
        lassi_output!("");

        log_subtitle("Fragments and global roots");
        lassi_output!("");
        self.system.log_output_display();
        lassi_output!("");

        log_subtitle(&format!("Matrices from {}", params.tier));
        lassi_output!("");
        let matrices = self.build_tier(params.tier)?;
        let fingerprints = MatrixKind::ALL
            .iter()
            .map(|&kind| (kind, fingerprint(&matrices.get(kind).view())))
            .collect_vec();
        lassi_output!("Dimension: {}", matrices.dim());
        for (kind, fp) in fingerprints.iter() {
            lassi_output!("Fingerprint of {kind}: {fp:+.12e}");
        }
        lassi_output!("");

        let cross_check = params.effective_cross_check();
        let comparisons = if cross_check.is_empty() {
            vec![]
        } else {
            log_macsec_begin("Cross-tier certification");
            lassi_output!("");
            let comparisons = cross_check
                .iter()
                .map(|&tier| Ok((tier, self.cross_check(tier, &matrices)?)))
                .collect::<Result<Vec<_>, anyhow::Error>>()?;
            lassi_output!("");
            log_macsec_end("Cross-tier certification");
            lassi_output!("");
            comparisons
        };

        if let Some(name) = params.matrices_save_name.as_ref() {
            write_lassi_binary(name, LassiFileType::Mat, &matrices)?;
            lassi_output!(
                "Matrices saved as {}.",
                name.with_extension(LassiFileType::Mat.ext()).display()
            );
            lassi_output!("");
        }

        let si = if params.solve_si {
            log_subtitle("State interaction");
            lassi_output!("");
            let si = solve_si(
                self.system,
                &matrices,
                params.hermiticity_threshold.max(params.linear_dependence_threshold),
                params.linear_dependence_threshold,
            )?;
            si.log_output_display();
            Some(si)
        } else {
            None
        };

        let result = LassiMatrixResult::builder()
            .parameters(params.clone())
            .matrices(matrices)
            .fingerprints(fingerprints)
            .comparisons(comparisons)
            .si(si)
            .build()?;
        if !result.passed() {
            lassi_warn!(
                "{} fingerprint comparison(s) failed.",
                result.mismatches().len()
            );
        }
        self.result = Some(result);
        Ok(())
    }
}

impl<'a> LassiDriver for LassiMatrixDriver<'a> {
    type Params = LassiMatrixParams;

    type Outcome = LassiMatrixResult;

    fn result(&self) -> Result<&Self::Outcome, anyhow::Error> {
        self.result
            .as_ref()
            .ok_or_else(|| format_err!("No LASSI matrix results found."))
    }

    fn run(&mut self) -> Result<(), anyhow::Error> {
        self.build_matrices()
    }
}
