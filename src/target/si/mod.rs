//! State interaction within the product-state basis.
//!
//! Each quantum-number block of the Hamiltonian is diagonalised separately in the
//! canonically orthogonalised product-state basis, so every state-interaction vector carries the
//! quantum numbers of its block.

use std::fmt;

use anyhow::{self, ensure, format_err};
use itertools::Itertools;
use log;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::target::matrix::{LassiMatrices, LassiSystem};
use crate::target::quantum_numbers::QuantumNumbers;

#[cfg(test)]
#[path = "si_tests.rs"]
mod si_tests;

// -----------------------------
// GeneralisedEigenvalueSolvable
// -----------------------------

/// Trait to solve the generalised eigenvalue equation for a pair of real symmetric matrices
/// $`\mathbf{A}`$ and $`\mathbf{B}`$:
/// ```math
///     \mathbf{A} \mathbf{v} = \lambda \mathbf{B} \mathbf{v},
/// ```
/// where $`\mathbf{B}`$ is positive semi-definite.
pub trait GeneralisedEigenvalueSolvable {
    /// Solves the *auxiliary* generalised eigenvalue problem in the canonical-orthogonalised
    /// basis of $`\mathbf{B}`$. If $`\mathbf{B}`$ is not of full rank, then fewer eigenpairs than
    /// the dimension of the problem are returned.
    ///
    /// # Arguments
    ///
    /// * `thresh_offdiag` - Threshold for verifying the symmetry of the two matrices. Scaled by
    ///   the smallest retained eigenvalue of $`\mathbf{B}`$, it is also the tolerance above which a
    ///   non-orthonormal transformed basis is reported as a warning.
    /// * `thresh_zeroov` - Threshold for determining zero eigenvalues of $`\mathbf{B}`$.
    ///
    /// # Returns
    ///
    /// The generalised eigenvalue result with eigenvalues in ascending order.
    fn solve_generalised_eigenvalue_problem_with_canonical_orthogonalisation(
        &self,
        thresh_offdiag: f64,
        thresh_zeroov: f64,
    ) -> Result<GeneralisedEigenvalueResult, anyhow::Error>;
}

/// Structure containing the eigenvalues and eigenvectors of a generalised eigenvalue problem.
#[derive(Clone, Debug)]
pub struct GeneralisedEigenvalueResult {
    /// The resulting eigenvalues.
    eigenvalues: Array1<f64>,

    /// The corresponding eigenvectors, normalised with respect to $`\mathbf{B}`$.
    eigenvectors: Array2<f64>,
}

impl GeneralisedEigenvalueResult {
    /// Returns the eigenvalues.
    pub fn eigenvalues(&'_ self) -> ArrayView1<'_, f64> {
        self.eigenvalues.view()
    }

    /// Returns the eigenvectors.
    pub fn eigenvectors(&'_ self) -> ArrayView2<'_, f64> {
        self.eigenvectors.view()
    }
}

fn check_real_matrix_symmetry(
    mat: &ArrayView2<f64>,
    thresh: f64,
    name: &str,
) -> Result<(), anyhow::Error> {
    let max_dev = mat
        .iter()
        .zip(mat.t().iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0, f64::max);
    ensure!(
        max_dev <= thresh,
        "{name} matrix is not symmetric: the maximum deviation is {max_dev:.3e} > {thresh:.3e}."
    );
    Ok(())
}

fn to_dmatrix(mat: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(mat.nrows(), mat.ncols(), |i, j| mat[(i, j)])
}

impl GeneralisedEigenvalueSolvable for (&ArrayView2<'_, f64>, &ArrayView2<'_, f64>) {
    fn solve_generalised_eigenvalue_problem_with_canonical_orthogonalisation(
        &self,
        thresh_offdiag: f64,
        thresh_zeroov: f64,
    ) -> Result<GeneralisedEigenvalueResult, anyhow::Error> {
        let (hmat, smat) = (self.0, self.1);
        ensure!(
            hmat.is_square() && hmat.shape() == smat.shape(),
            "Mismatched matrix shapes {:?} and {:?}.",
            hmat.shape(),
            smat.shape()
        );
        check_real_matrix_symmetry(hmat, thresh_offdiag, "Hamiltonian")?;
        check_real_matrix_symmetry(smat, thresh_offdiag, "Overlap")?;
        let hmat = (hmat + &hmat.t()) / 2.0;
        let smat = (smat + &smat.t()) / 2.0;

        let n = smat.nrows();
        let s_eig = SymmetricEigen::new(to_dmatrix(&smat));
        let kept = s_eig
            .eigenvalues
            .iter()
            .enumerate()
            .filter(|&(_, &w)| w > thresh_zeroov)
            .map(|(k, &w)| (k, w))
            .collect_vec();
        log::debug!(
            "Canonical orthogonalisation retains {} of {n} basis function(s).",
            kept.len()
        );
        let xmat = Array2::from_shape_fn((n, kept.len()), |(i, a)| {
            let (k, w) = kept[a];
            s_eig.eigenvectors[(i, k)] / w.sqrt()
        });
        let xmat_d = xmat.t();
        let hmat_t = xmat_d.dot(&hmat).dot(&xmat);
        let smat_t = xmat_d.dot(&smat).dot(&xmat);
        let max_diff = (&smat_t - &Array2::<f64>::eye(kept.len()))
            .iter()
            .map(|x| x.abs())
            .fold(0.0, f64::max);
        // Rounding errors in the kept eigenvectors are amplified by the inverse of the smallest
        // kept eigenvalue.
        let w_min = kept.iter().map(|&(_, w)| w).fold(f64::INFINITY, f64::min);
        let thresh_identity = thresh_offdiag / w_min.min(1.0);
        if max_diff > thresh_identity {
            log::warn!(
                "The orthogonalised overlap matrix deviates from the identity matrix by {max_diff:.3e} > {thresh_identity:.3e}."
            );
        }

        let h_eig = SymmetricEigen::new(to_dmatrix(&hmat_t));
        let order = (0..kept.len())
            .sorted_by(|&i, &j| h_eig.eigenvalues[i].total_cmp(&h_eig.eigenvalues[j]))
            .collect_vec();
        let eigenvalues = Array1::from_iter(order.iter().map(|&i| h_eig.eigenvalues[i]));
        let eigvecs_t = Array2::from_shape_fn((kept.len(), order.len()), |(a, b)| {
            h_eig.eigenvectors[(a, order[b])]
        });
        let mut eigenvectors = xmat.dot(&eigvecs_t);

        // Fix the phase so that the largest-magnitude coefficient of every eigenvector is positive.
        for mut col in eigenvectors.axis_iter_mut(Axis(1)) {
            let pivot = col
                .iter()
                .copied()
                .max_by(|a, b| a.abs().total_cmp(&b.abs()))
                .unwrap_or(1.0);
            if pivot < 0.0 {
                col.mapv_inplace(|x| -x);
            }
        }
        Ok(GeneralisedEigenvalueResult {
            eigenvalues,
            eigenvectors,
        })
    }
}

// ==========
// SI vectors
// ==========

/// Structure pairing state-interaction vectors with the quantum numbers of the block each one
/// belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SiVectors {
    /// The vectors as columns over the product-state basis.
    coefficients: Array2<f64>,

    /// The quantum numbers of every column.
    rootsym: Vec<QuantumNumbers>,
}

impl SiVectors {
    /// Pairs state-interaction vectors with their quantum numbers.
    ///
    /// # Errors
    ///
    /// Errors if the number of tags does not match the number of columns, or if any column has a
    /// non-zero coefficient on a product state whose global root carries different quantum
    /// numbers from the tag of that column.
    pub fn new(
        system: &LassiSystem,
        coefficients: Array2<f64>,
        rootsym: Vec<QuantumNumbers>,
    ) -> Result<Self, anyhow::Error> {
        ensure!(
            coefficients.nrows() == system.basis().dim(),
            "Vectors have {} rows, but the product-state basis has dimension {}.",
            coefficients.nrows(),
            system.basis().dim()
        );
        ensure!(
            coefficients.ncols() == rootsym.len(),
            "{} vector(s) but {} quantum-number tag(s).",
            coefficients.ncols(),
            rootsym.len()
        );
        let states = system.basis().states();
        for (col, (vector, qns)) in coefficients
            .columns()
            .into_iter()
            .zip(rootsym.iter())
            .enumerate()
        {
            let stray = vector
                .iter()
                .zip(states.iter())
                .position(|(&c, state)| {
                    c != 0.0 && system.indexer().quantum_numbers(state.root) != qns
                });
            if let Some(pos) = stray {
                return Err(format_err!(
                    "Vector {col} is tagged {qns} but has weight on product state {} of global root {} with quantum numbers {}.",
                    states[pos],
                    states[pos].root,
                    system.indexer().quantum_numbers(states[pos].root)
                ));
            }
        }
        Ok(Self {
            coefficients,
            rootsym,
        })
    }

    /// Returns the vectors as columns.
    pub fn coefficients(&self) -> &Array2<f64> {
        &self.coefficients
    }

    /// Returns the quantum numbers of every vector.
    pub fn rootsym(&self) -> &[QuantumNumbers] {
        &self.rootsym
    }

    /// Returns the number of vectors.
    pub fn nstates(&self) -> usize {
        self.rootsym.len()
    }

    /// Transforms a matrix over the product-state basis into the basis of these vectors,
    /// $`\mathbf{C}^{\mathsf{T}} \mathbf{M} \mathbf{C}`$.
    pub fn transform(&self, mat: &ArrayView2<f64>) -> Result<Array2<f64>, anyhow::Error> {
        let dim = self.coefficients.nrows();
        ensure!(
            mat.shape() == [dim, dim],
            "Matrix of shape {:?} cannot be transformed by vectors over {dim} product state(s).",
            mat.shape()
        );
        Ok(self.coefficients.t().dot(mat).dot(&self.coefficients))
    }
}

// ===========
// SI solution
// ===========

/// Structure containing the solution of the state-interaction problem.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiSolution {
    /// The energies in ascending order.
    energies: Array1<f64>,

    /// The expectation values of $`\hat{S}^2`$.
    s2: Array1<f64>,

    /// The state-interaction vectors, in the order of the energies.
    vectors: SiVectors,
}

impl SiSolution {
    /// Returns the energies in ascending order.
    pub fn energies(&self) -> &Array1<f64> {
        &self.energies
    }

    /// Returns the expectation values of $`\hat{S}^2`$.
    pub fn s2(&self) -> &Array1<f64> {
        &self.s2
    }

    /// Returns the state-interaction vectors.
    pub fn vectors(&self) -> &SiVectors {
        &self.vectors
    }
}

impl fmt::Display for SiSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>5}  {:>18}  {:>12}  {}", "State", "Energy", "<S^2>", "Quantum numbers")?;
        for (i, ((e, s2), qns)) in self
            .energies
            .iter()
            .zip(self.s2.iter())
            .zip(self.vectors.rootsym.iter())
            .enumerate()
        {
            writeln!(f, "{i:>5}  {e:>+18.12}  {s2:>12.8}  {qns}")?;
        }
        Ok(())
    }
}

/// Solves the state-interaction problem $`\mathbf{H}\mathbf{c} = E \mathbf{S}\mathbf{c}`$ block by
/// block.
///
/// # Arguments
///
/// * `system` - The system the matrices were built for.
/// * `matrices` - The assembled matrices.
/// * `thresh_offdiag` - Threshold for verifying matrix symmetry.
/// * `thresh_zeroov` - Linear-dependence threshold on the eigenvalues of every overlap block.
pub fn solve_si(
    system: &LassiSystem,
    matrices: &LassiMatrices,
    thresh_offdiag: f64,
    thresh_zeroov: f64,
) -> Result<SiSolution, anyhow::Error> {
    let dim = system.basis().dim();
    ensure!(
        matrices.dim() == dim,
        "Matrices of dimension {} do not match the product-state basis of dimension {dim}.",
        matrices.dim()
    );
    let mut states: Vec<(f64, QuantumNumbers, Array1<f64>)> = vec![];
    for (qns, roots) in system.indexer().blocks() {
        let rows = roots
            .iter()
            .flat_map(|&root| system.basis().range(root))
            .collect_vec();
        let hblk = matrices.ham.select(Axis(0), &rows).select(Axis(1), &rows);
        let sblk = matrices.ovlp.select(Axis(0), &rows).select(Axis(1), &rows);
        let res = (&hblk.view(), &sblk.view())
            .solve_generalised_eigenvalue_problem_with_canonical_orthogonalisation(
                thresh_offdiag,
                thresh_zeroov,
            )?;
        log::debug!("Block {qns} yields {} state(s).", res.eigenvalues().len());
        for (e, vec_blk) in res
            .eigenvalues()
            .iter()
            .zip(res.eigenvectors().columns())
        {
            let mut vector = Array1::<f64>::zeros(dim);
            for (&row, &c) in rows.iter().zip(vec_blk.iter()) {
                vector[row] = c;
            }
            states.push((*e, *qns, vector));
        }
    }
    states.sort_by(|a, b| a.0.total_cmp(&b.0));

    let energies = Array1::from_iter(states.iter().map(|(e, _, _)| *e));
    let mut coefficients = Array2::<f64>::zeros((dim, states.len()));
    for (mut col, (_, _, vector)) in coefficients.columns_mut().into_iter().zip(states.iter()) {
        col.assign(vector);
    }
    let s2 = Array1::from_iter(
        coefficients
            .columns()
            .into_iter()
            .map(|c| c.dot(&matrices.s2.dot(&c))),
    );
    let rootsym = states.into_iter().map(|(_, qns, _)| qns).collect_vec();
    let vectors = SiVectors::new(system, coefficients, rootsym)?;
    Ok(SiSolution {
        energies,
        s2,
        vectors,
    })
}
