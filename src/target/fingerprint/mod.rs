//! Deterministic scalar fingerprints for certifying that different matrix builders agree.

use std::fmt;

use anyhow::{self, ensure};
use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::io::format::verdict;
use crate::target::matrix::{LassiMatrices, MatrixKind};
use crate::target::product::ProductBasis;


/// The default absolute tolerance on fingerprint differences.
pub const DEFAULT_FINGERPRINT_TOLERANCE: f64 = 1e-9;

/// Computes the order-sensitive fingerprint
/// ```math
///     \mathrm{fp}(\mathbf{A}) = \sum_k A_k \cos k
/// ```
/// of a matrix or sub-block, where $`k`$ runs over the row-major flattening of $`\mathbf{A}`$.
pub fn fingerprint(mat: &ArrayView2<f64>) -> f64 {
    mat.iter()
        .enumerate()
        .map(|(k, &x)| x * (k as f64).cos())
        .sum()
}

/// Structure recording the comparison of a candidate (sub)matrix against a reference one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FingerprintComparison {
    /// The matrix compared.
    pub kind: MatrixKind,

    /// The global-root pair of the compared sub-block, or `None` for the full matrix.
    pub root_pair: Option<(usize, usize)>,

    /// The fingerprint of the reference.
    pub reference: f64,

    /// The fingerprint of the candidate.
    pub candidate: f64,

    /// The tolerance on the absolute difference.
    pub tolerance: f64,
}

impl FingerprintComparison {
    /// Returns the absolute difference between the two fingerprints.
    pub fn difference(&self) -> f64 {
        (self.candidate - self.reference).abs()
    }

    /// Returns `true` if the fingerprints agree within tolerance.
    pub fn passed(&self) -> bool {
        self.difference() <= self.tolerance
    }
}

impl fmt::Display for FingerprintComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let region = match self.root_pair {
            Some((i, j)) => format!("block ({i}, {j})"),
            None => "full matrix".to_string(),
        };
        write!(
            f,
            "{:<2} {:<16} ref {:>+20.12e}  cand {:>+20.12e}  |Δ| {:>10.3e}  {}",
            self.kind,
            region,
            self.reference,
            self.candidate,
            self.difference(),
            verdict(self.passed())
        )
    }
}

fn ensure_same_dim(
    reference: &LassiMatrices,
    candidate: &LassiMatrices,
) -> Result<(), anyhow::Error> {
    ensure!(
        reference.dim() == candidate.dim(),
        "Cannot compare matrices of dimensions {} and {}.",
        reference.dim(),
        candidate.dim()
    );
    Ok(())
}

/// Compares the full-matrix fingerprints of every matrix kind.
pub fn compare_full(
    reference: &LassiMatrices,
    candidate: &LassiMatrices,
    tolerance: f64,
) -> Result<Vec<FingerprintComparison>, anyhow::Error> {
    ensure_same_dim(reference, candidate)?;
    Ok(MatrixKind::ALL
        .iter()
        .map(|&kind| FingerprintComparison {
            kind,
            root_pair: None,
            reference: fingerprint(&reference.get(kind).view()),
            candidate: fingerprint(&candidate.get(kind).view()),
            tolerance,
        })
        .collect())
}

/// Compares the fingerprints of every global-root pair sub-block of every matrix kind,
/// including pairs in different quantum-number blocks.
pub fn compare_blocks(
    reference: &LassiMatrices,
    candidate: &LassiMatrices,
    basis: &ProductBasis,
    tolerance: f64,
) -> Result<Vec<FingerprintComparison>, anyhow::Error> {
    ensure_same_dim(reference, candidate)?;
    ensure!(
        basis.dim() == reference.dim(),
        "The product basis has dimension {}, but the matrices have dimension {}.",
        basis.dim(),
        reference.dim()
    );
    let mut comparisons = vec![];
    for &kind in MatrixKind::ALL.iter() {
        for i in 0..basis.nroots() {
            for j in 0..basis.nroots() {
                let (rows, cols) = (basis.range(i), basis.range(j));
                comparisons.push(FingerprintComparison {
                    kind,
                    root_pair: Some((i, j)),
                    reference: fingerprint(
                        &reference.get(kind).slice(s![rows.clone(), cols.clone()]),
                    ),
                    candidate: fingerprint(&candidate.get(kind).slice(s![rows, cols])),
                    tolerance,
                });
            }
        }
    }
    Ok(comparisons)
}

/// Returns the largest element-wise absolute difference between two matrices of the same kind.
pub fn max_abs_difference(reference: &ArrayView2<f64>, candidate: &ArrayView2<f64>) -> f64 {
    reference
        .iter()
        .zip(candidate.iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max)
}
