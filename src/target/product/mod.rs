//! Enumeration of product states and their placement in the assembled matrices.

use std::fmt;
use std::ops::Range;

use anyhow::{self, ensure};
use itertools::Itertools;
use ndarray::Array2;


/// Structure describing one product state: a choice of one local root on every fragment, all
/// taken from the same global root.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProductState {
    /// The global root this product state belongs to.
    pub root: usize,

    /// The local-root index chosen on each fragment.
    pub lroots: Vec<usize>,
}

impl fmt::Display for ProductState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Φ[{}; {}]",
            self.root,
            self.lroots.iter().map(|i| i.to_string()).join(", ")
        )
    }
}

/// Structure containing the ordered product-state basis.
///
/// Product states are grouped by global root in ascending order. Within a global root, the
/// local-root index of fragment 0 varies fastest. Global root $`i`$ occupies the half-open range
/// `offsets[i]..offsets[i + 1]` of rows and columns in every assembled matrix.
#[derive(Clone, Debug)]
pub struct ProductBasis {
    /// The local-root multiplicities with shape `(nfrags, nroots)`.
    lroots: Array2<usize>,

    /// The cumulative offsets, with one more entry than there are global roots.
    offsets: Vec<usize>,

    /// The product states in matrix order.
    states: Vec<ProductState>,
}

impl ProductBasis {
    /// Enumerates the product states from a local-root multiplicity table of shape
    /// `(nfrags, nroots)`.
    ///
    /// # Errors
    ///
    /// Errors if any fragment has zero local roots in any global root.
    pub fn new(lroots: &Array2<usize>) -> Result<Self, anyhow::Error> {
        let (nfrags, nroots) = lroots.dim();
        ensure!(
            nfrags > 0 && nroots > 0,
            "The local-root multiplicity table must describe at least one fragment and one global root."
        );
        if let Some(((frag, root), _)) = lroots.indexed_iter().find(|&(_, &n)| n == 0) {
            return Err(anyhow::format_err!(
                "Fragment {frag} has zero local roots in global root {root}."
            ));
        }

        let mut offsets = Vec::with_capacity(nroots + 1);
        offsets.push(0);
        let mut states = vec![];
        for root in 0..nroots {
            // Iterate over fragments in reverse so that fragment 0 ends up varying fastest.
            let root_states = (0..nfrags)
                .rev()
                .map(|frag| 0..lroots[(frag, root)])
                .multi_cartesian_product()
                .map(|mut rev_lroots| {
                    rev_lroots.reverse();
                    ProductState {
                        root,
                        lroots: rev_lroots,
                    }
                })
                .collect_vec();
            states.extend(root_states);
            offsets.push(states.len());
        }
        Ok(Self {
            lroots: lroots.clone(),
            offsets,
            states,
        })
    }

    /// Returns the number of fragments.
    pub fn nfrags(&self) -> usize {
        self.lroots.nrows()
    }

    /// Returns the number of global roots.
    pub fn nroots(&self) -> usize {
        self.lroots.ncols()
    }

    /// Returns the total number of product states, i.e. the dimension of the assembled matrices.
    pub fn dim(&self) -> usize {
        self.states.len()
    }

    /// Returns the number of product states of global root `root`.
    pub fn nprods(&self, root: usize) -> usize {
        self.offsets[root + 1] - self.offsets[root]
    }

    /// Returns the cumulative offsets, with one more entry than there are global roots.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    /// Returns the matrix range occupied by global root `root`.
    pub fn range(&self, root: usize) -> Range<usize> {
        self.offsets[root]..self.offsets[root + 1]
    }

    /// Returns all product states in matrix order.
    pub fn states(&self) -> &[ProductState] {
        &self.states
    }

    /// Returns the product states of global root `root`.
    pub fn states_of(&self, root: usize) -> &[ProductState] {
        &self.states[self.range(root)]
    }

    /// Returns the local-root multiplicity table.
    pub fn lroots(&self) -> &Array2<usize> {
        &self.lroots
    }
}
