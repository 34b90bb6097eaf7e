//! Fragments, their fermionic ordering, and their manifolds of local roots.

use std::fmt;

use anyhow::{self, ensure, format_err};
use itertools::Itertools;
use log;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::target::quantum_numbers::ElectronCountTable;

pub mod strings;

use strings::{DeterminantSpace, Spin, MAX_SPIN_ORBITALS};


// ===============
// Fragment layout
// ===============

/// Structure fixing the total order of all active orbitals across fragments.
///
/// Spatial orbitals are numbered fragment by fragment: fragment $`k`$ owns the contiguous range
/// `offset(k)..offset(k) + norb(k)`. The fermionic order of spin-orbitals, which determines every
/// sign factor in this crate, is fragment-major: within fragment $`k`$, the $`\alpha`$ orbitals
/// come first in ascending order, followed by the $`\beta`$ orbitals in ascending order, and all
/// spin-orbitals of fragment $`k`$ precede those of fragment $`k + 1`$. A product state
/// $`\hat{C}_0 \hat{C}_1 \cdots \hat{C}_{F-1} \ket{\mathrm{vac}}`$ is therefore a linear
/// combination of determinants in this order without any additional sign.
///
/// Reordering fragments means building a new layout; sign factors are never inferred from
/// anything else.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentLayout {
    /// The number of active orbitals in each fragment.
    norbs: Vec<usize>,

    /// The index of the first active orbital of each fragment in the full active space.
    offsets: Vec<usize>,
}

impl FragmentLayout {
    /// Constructs a fragment layout from the numbers of active orbitals of the fragments, in
    /// fermionic order.
    pub fn new(norbs: &[usize]) -> Result<Self, anyhow::Error> {
        ensure!(!norbs.is_empty(), "At least one fragment is required.");
        ensure!(
            norbs.iter().all(|&norb| norb > 0),
            "Every fragment must have at least one active orbital: {norbs:?}."
        );
        let norb_total = norbs.iter().sum::<usize>();
        ensure!(
            2 * norb_total <= MAX_SPIN_ORBITALS,
            "The full active space of {norb_total} orbitals exceeds the supported {} spin-orbitals.",
            MAX_SPIN_ORBITALS
        );
        let offsets = norbs
            .iter()
            .scan(0, |acc, &norb| {
                let offset = *acc;
                *acc += norb;
                Some(offset)
            })
            .collect_vec();
        Ok(Self {
            norbs: norbs.to_vec(),
            offsets,
        })
    }

    /// Returns the number of fragments.
    pub fn nfrags(&self) -> usize {
        self.norbs.len()
    }

    /// Returns the number of active orbitals in fragment `frag`.
    pub fn norb(&self, frag: usize) -> usize {
        self.norbs[frag]
    }

    /// Returns the numbers of active orbitals of all fragments.
    pub fn norbs(&self) -> &[usize] {
        &self.norbs
    }

    /// Returns the index of the first orbital of fragment `frag` in the full active space.
    pub fn offset(&self, frag: usize) -> usize {
        self.offsets[frag]
    }

    /// Returns the total number of active orbitals.
    pub fn norb_total(&self) -> usize {
        self.norbs.iter().sum()
    }

    /// Returns the fragment owning full-space orbital `p` and the local index of `p` in that
    /// fragment.
    pub fn fragment_of(&self, p: usize) -> Option<(usize, usize)> {
        self.offsets
            .iter()
            .zip(self.norbs.iter())
            .position(|(&offset, &norb)| p >= offset && p < offset + norb)
            .map(|frag| (frag, p - self.offsets[frag]))
    }

    /// Returns the full-space spin-orbital index of full-space orbital `p` with spin `spin`.
    pub fn spin_orbital(&self, p: usize, spin: Spin) -> Option<usize> {
        self.fragment_of(p).map(|(frag, local)| {
            self.spin_orbital_shift(frag)
                + match spin {
                    Spin::Alpha => local,
                    Spin::Beta => self.norbs[frag] + local,
                }
        })
    }

    /// Returns the amount by which a fragment-local occupation bitstring of fragment `frag` must
    /// be shifted to sit in the full-space bitstring.
    pub fn spin_orbital_shift(&self, frag: usize) -> usize {
        2 * self.offsets[frag]
    }
}

impl fmt::Display for FragmentLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (frag, (norb, offset)) in self.norbs.iter().zip(self.offsets.iter()).enumerate() {
            writeln!(
                f,
                "Fragment {frag}: {norb} orbital(s), full-space orbitals {offset}..{}",
                offset + norb
            )?;
        }
        Ok(())
    }
}

// ===========
// Local roots
// ===========

/// Structure holding the ordered local roots of one fragment in one global root.
///
/// The local roots are not required to be mutually orthogonal or even linearly independent.
#[derive(Clone, Debug)]
pub struct LocalRoots {
    /// The determinant space in which the local roots live.
    space: DeterminantSpace,

    /// The local-root vectors, with shape `(lroots, nstr_alpha, nstr_beta)`.
    vectors: Array3<f64>,
}

impl LocalRoots {
    /// Wraps local-root vectors in their determinant space after checking their shapes.
    pub fn new(space: DeterminantSpace, vectors: Array3<f64>) -> Result<Self, anyhow::Error> {
        ensure!(
            vectors.shape()[0] > 0,
            "At least one local root is required in every fragment and global root."
        );
        space.check_shape(&vectors.shape()[1..])?;
        Ok(Self { space, vectors })
    }

    /// Returns the determinant space of the local roots.
    pub fn space(&self) -> &DeterminantSpace {
        &self.space
    }

    /// Returns the number of local roots.
    pub fn nroots(&self) -> usize {
        self.vectors.shape()[0]
    }

    /// Returns the local-root vectors.
    pub fn vectors(&self) -> &Array3<f64> {
        &self.vectors
    }

    /// Returns a view of local root `i` as a `(nstr_alpha, nstr_beta)` array.
    pub fn vector(&self, i: usize) -> ArrayView2<'_, f64> {
        self.vectors.index_axis(Axis(0), i)
    }

    /// Returns the total number of electrons of the local roots.
    pub fn nelec_total(&self) -> usize {
        let (na, nb) = self.space.nelec();
        na + nb
    }

    /// Returns a copy of the local roots with every vector scaled to unit norm. The local roots
    /// are not orthogonalised against one another.
    pub fn normalised(&self) -> Result<Self, anyhow::Error> {
        let mut vectors = self.vectors.clone();
        for (i, mut vector) in vectors.outer_iter_mut().enumerate() {
            let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
            ensure!(norm > 0.0, "Local root {i} has zero norm and cannot be normalised.");
            vector.mapv_inplace(|x| x / norm);
        }
        Self::new(self.space.clone(), vectors)
    }

    /// Returns the overlap matrix $`\braket{i | j}`$ between the local roots.
    pub fn overlap_matrix(&self) -> Array2<f64> {
        let flat = self.flattened();
        flat.dot(&flat.t())
    }

    /// Returns a canonically orthonormalised set spanning the same space as the local roots.
    ///
    /// Eigenvectors of the local-root overlap matrix whose eigenvalues do not exceed `thresh` are
    /// discarded, so the returned set may contain fewer local roots.
    pub fn canonical_orthonormalise(&self, thresh: f64) -> Result<Self, anyhow::Error> {
        let n = self.nroots();
        let smat = self.overlap_matrix();
        let eig = SymmetricEigen::new(DMatrix::from_fn(n, n, |i, j| smat[(i, j)]));
        let kept = eig
            .eigenvalues
            .iter()
            .enumerate()
            .filter(|&(_, &w)| w > thresh)
            .map(|(k, &w)| (k, w))
            .collect_vec();
        ensure!(
            !kept.is_empty(),
            "All eigenvalues of the local-root overlap matrix fall below the linear-dependence threshold {thresh:.3e}."
        );
        if kept.len() < n {
            log::debug!(
                "Canonical orthonormalisation discarded {} of {n} local root(s).",
                n - kept.len()
            );
        }
        let xmat = Array2::from_shape_fn((kept.len(), n), |(a, i)| {
            let (k, w) = kept[a];
            eig.eigenvectors[(i, k)] / w.sqrt()
        });
        let (nstra, nstrb) = self.space.shape();
        let vectors = xmat
            .dot(&self.flattened())
            .into_shape((kept.len(), nstra, nstrb))
            .map_err(|err| format_err!(err))?;
        Self::new(self.space.clone(), vectors)
    }

    fn flattened(&self) -> Array2<f64> {
        let n = self.nroots();
        let (nstra, nstrb) = self.space.shape();
        Array2::from_shape_fn((n, nstra * nstrb), |(i, k)| {
            self.vectors[(i, k / nstrb, k % nstrb)]
        })
    }
}

// ==================
// Local-root manifold
// ==================

/// Structure holding, for every fragment and every global root, the ordered local roots.
#[derive(Clone, Debug)]
pub struct LocalRootManifold {
    /// The local roots, indexed first by fragment and then by global root.
    roots: Vec<Vec<LocalRoots>>,
}

impl LocalRootManifold {
    /// Constructs a local-root manifold from raw vectors.
    ///
    /// # Arguments
    ///
    /// * `layout` - The fragment layout.
    /// * `table` - The electron counts of every fragment in every global root.
    /// * `vectors` - The local-root vectors, indexed first by fragment and then by global root,
    ///   each with shape `(lroots, nstr_alpha, nstr_beta)`.
    ///
    /// # Returns
    ///
    /// The local-root manifold, or an error if any vector shape is inconsistent with the electron
    /// counts and the fragment sizes.
    pub fn new(
        layout: &FragmentLayout,
        table: &ElectronCountTable,
        vectors: Vec<Vec<Array3<f64>>>,
    ) -> Result<Self, anyhow::Error> {
        ensure!(
            vectors.len() == layout.nfrags() && table.nfrags() == layout.nfrags(),
            "Inconsistent numbers of fragments: {} local-root sets, {} in the electron-count table, {} in the layout.",
            vectors.len(),
            table.nfrags(),
            layout.nfrags()
        );
        let roots = vectors
            .into_iter()
            .enumerate()
            .map(|(frag, frag_vectors)| {
                ensure!(
                    frag_vectors.len() == table.nroots(),
                    "Fragment {frag} has local roots for {} global root(s), but {} are declared.",
                    frag_vectors.len(),
                    table.nroots()
                );
                frag_vectors
                    .into_iter()
                    .enumerate()
                    .map(|(root, vecs)| {
                        let (na, nb) = table.nelec(frag, root);
                        let space = DeterminantSpace::new(layout.norb(frag), na, nb)?;
                        LocalRoots::new(space, vecs).map_err(|err| {
                            format_err!("Fragment {frag}, global root {root}: {err}")
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { roots })
    }

    /// Constructs a local-root manifold filled with random local roots.
    ///
    /// Every local root has uniformly distributed entries in $`[0, 1)`$ and is normalised
    /// individually. Local roots sharing a fragment and a global root are not orthogonalised,
    /// and are linearly dependent whenever `lroots` exceeds the size of the determinant space.
    ///
    /// # Arguments
    ///
    /// * `layout` - The fragment layout.
    /// * `table` - The electron counts of every fragment in every global root.
    /// * `lroots` - The local-root multiplicities with shape `(nfrags, nroots)`.
    /// * `seed` - The seed of the random number generator.
    pub fn random(
        layout: &FragmentLayout,
        table: &ElectronCountTable,
        lroots: &Array2<usize>,
        seed: u64,
    ) -> Result<Self, anyhow::Error> {
        ensure!(
            lroots.shape() == [table.nfrags(), table.nroots()],
            "Local-root multiplicity table has shape {:?}, but ({}, {}) was expected.",
            lroots.shape(),
            table.nfrags(),
            table.nroots()
        );
        let mut rng = StdRng::seed_from_u64(seed);
        let vectors = (0..table.nfrags())
            .map(|frag| {
                (0..table.nroots())
                    .map(|root| {
                        let (na, nb) = table.nelec(frag, root);
                        let (nstra, nstrb) =
                            DeterminantSpace::new(layout.norb(frag), na, nb)?.shape();
                        let mut ci = Array3::<f64>::from_shape_simple_fn(
                            (lroots[(frag, root)], nstra, nstrb),
                            || rng.gen::<f64>(),
                        );
                        for mut vector in ci.outer_iter_mut() {
                            let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
                            vector.mapv_inplace(|x| x / norm);
                        }
                        Ok(ci)
                    })
                    .collect::<Result<Vec<_>, anyhow::Error>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(layout, table, vectors)
    }

    /// Returns a manifold in which the local roots of every fragment in every global root have
    /// been canonically orthonormalised with linear-dependence threshold `thresh`. Local-root
    /// multiplicities can shrink.
    pub fn canonical_orthonormalise(&self, thresh: f64) -> Result<Self, anyhow::Error> {
        let roots = self
            .roots
            .iter()
            .enumerate()
            .map(|(frag, frag_roots)| {
                frag_roots
                    .iter()
                    .enumerate()
                    .map(|(root, local_roots)| {
                        local_roots
                            .canonical_orthonormalise(thresh)
                            .map_err(|err| format_err!("Fragment {frag}, global root {root}: {err}"))
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { roots })
    }

    /// Returns the number of fragments.
    pub fn nfrags(&self) -> usize {
        self.roots.len()
    }

    /// Returns the number of global roots.
    pub fn nroots(&self) -> usize {
        self.roots.first().map(|frag_roots| frag_roots.len()).unwrap_or(0)
    }

    /// Returns the local roots of fragment `frag` in global root `root`.
    pub fn get(&self, frag: usize, root: usize) -> &LocalRoots {
        &self.roots[frag][root]
    }

    /// Returns the local-root multiplicity table with shape `(nfrags, nroots)`.
    pub fn lroots(&self) -> Array2<usize> {
        Array2::from_shape_fn((self.nfrags(), self.nroots()), |(frag, root)| {
            self.roots[frag][root].nroots()
        })
    }

    /// Returns all local-root vectors, indexed first by fragment and then by global root.
    pub fn to_vectors(&self) -> Vec<Vec<Array3<f64>>> {
        self.roots
            .iter()
            .map(|frag_roots| {
                frag_roots
                    .iter()
                    .map(|local_roots| local_roots.vectors().clone())
                    .collect_vec()
            })
            .collect_vec()
    }
}
