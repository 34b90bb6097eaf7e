//! Factorisation of operator terms over fragments.
//!
//! Every operator slot of a term is assigned to one fragment. An assignment survives only if the
//! operators it places on each fragment change that fragment's $`(N_{\alpha}, N_{\beta})`$ from
//! the ket's to the bra's; all others vanish by selection rule and are never evaluated. A surviving
//! assignment contributes
//! ```math
//!     \pm \sum_{\{p\}} c_{\{p\}} \prod_k T^{(k)}_{\{p\}_k},
//! ```
//! where $`T^{(k)}`$ is the fragment-local transition density of the operators placed on
//! fragment $`k`$ (the overlap if there are none) and $`\pm`$ is the fermionic sign of
//! [`fragment_string_sign`].

use anyhow;
use itertools::Itertools;
use log;
use ndarray::IxDyn;

use crate::target::fragment::FragmentLayout;
use crate::target::operator::OperatorTerm;
use crate::target::product::ProductState;
use crate::target::quantum_numbers::ElectronCountTable;
use crate::target::tdm::sign::fragment_string_sign;
use crate::target::tdm::{FragmentTdmCache, LocalRootIndex, OperatorPattern};

/// Structure describing one surviving assignment of the slots of an operator term to fragments.
#[derive(Clone, Debug, PartialEq)]
pub struct FragmentAssignment {
    /// The fragment of every slot, in slot order.
    slot_frags: Vec<usize>,

    /// The slot positions placed on every fragment, in slot order.
    frag_slots: Vec<Vec<usize>>,

    /// The operator pattern acting on every fragment.
    patterns: Vec<OperatorPattern>,

    /// The fermionic sign of the assignment.
    sign: f64,
}

impl FragmentAssignment {
    /// Returns the fragment of every slot.
    pub fn slot_frags(&self) -> &[usize] {
        &self.slot_frags
    }

    /// Returns the operator pattern acting on every fragment.
    pub fn patterns(&self) -> &[OperatorPattern] {
        &self.patterns
    }

    /// Returns the fermionic sign.
    pub fn sign(&self) -> f64 {
        self.sign
    }
}

/// Enumerates the assignments of the slots of `term` to fragments that can connect a ket with
/// fragment electron counts `ket_counts` to a bra with fragment electron counts `bra_counts`.
pub fn enumerate_assignments(
    term: &OperatorTerm,
    bra_counts: &[(usize, usize)],
    ket_counts: &[(usize, usize)],
) -> Vec<FragmentAssignment> {
    let nfrags = ket_counts.len();
    let nslots = term.slots().len();
    let ket_nelec = ket_counts.iter().map(|(na, nb)| na + nb).collect_vec();
    let slot_frag_choices = if nslots == 0 {
        vec![vec![]]
    } else {
        (0..nslots)
            .map(|_| 0..nfrags)
            .multi_cartesian_product()
            .collect_vec()
    };
    slot_frag_choices
        .into_iter()
        .filter(|slot_frags| {
            term.tied_slots()
                .iter()
                .all(|&(a, b)| slot_frags[a] == slot_frags[b])
        })
        .filter_map(|slot_frags| {
            let frag_slots = (0..nfrags)
                .map(|frag| {
                    slot_frags
                        .iter()
                        .enumerate()
                        .filter_map(|(slot, &f)| (f == frag).then_some(slot))
                        .collect_vec()
                })
                .collect_vec();
            let patterns = frag_slots
                .iter()
                .map(|slots| {
                    OperatorPattern::new(slots.iter().map(|&slot| term.slots()[slot]).collect())
                })
                .collect_vec();
            let allowed = patterns
                .iter()
                .zip(bra_counts.iter().zip(ket_counts.iter()))
                .all(|(pattern, (&bra, &ket))| pattern.connects(bra, ket));
            if allowed {
                let sign = fragment_string_sign(&slot_frags, &ket_nelec);
                Some(FragmentAssignment {
                    slot_frags,
                    frag_slots,
                    patterns,
                    sign,
                })
            } else {
                None
            }
        })
        .collect_vec()
}

/// Structure containing the surviving assignments of every term of an operator for one ordered
/// pair of global roots.
#[derive(Clone, Debug)]
pub struct InteractionPlan<'t, 'a> {
    /// The operator terms.
    terms: &'t [OperatorTerm<'a>],

    /// The surviving assignments of every term, parallel to `terms`.
    assignments: Vec<Vec<FragmentAssignment>>,
}

impl<'t, 'a> InteractionPlan<'t, 'a> {
    /// Plans the evaluation of `terms` between product states of global roots `bra_root` and
    /// `ket_root`.
    pub fn new(
        terms: &'t [OperatorTerm<'a>],
        table: &ElectronCountTable,
        bra_root: usize,
        ket_root: usize,
    ) -> Self {
        let bra_counts = (0..table.nfrags())
            .map(|frag| table.nelec(frag, bra_root))
            .collect_vec();
        let ket_counts = (0..table.nfrags())
            .map(|frag| table.nelec(frag, ket_root))
            .collect_vec();
        let assignments = terms
            .iter()
            .map(|term| enumerate_assignments(term, &bra_counts, &ket_counts))
            .collect_vec();
        log::debug!(
            "Planned global-root pair ({bra_root}, {ket_root}): {} surviving fragment assignment(s).",
            assignments.iter().map(|asgs| asgs.len()).sum::<usize>()
        );
        Self { terms, assignments }
    }

    /// Returns `true` if no assignment survives, so that the operator vanishes identically
    /// between the two global roots.
    pub fn is_empty(&self) -> bool {
        self.assignments.iter().all(|asgs| asgs.is_empty())
    }

    /// Returns the surviving assignments of every term.
    pub fn assignments(&self) -> &[Vec<FragmentAssignment>] {
        &self.assignments
    }

    /// Evaluates the operator between two product states of the planned global roots.
    ///
    /// # Arguments
    ///
    /// * `bra` - The bra product state.
    /// * `ket` - The ket product state.
    /// * `layout` - The fragment layout.
    /// * `cache` - The cache of fragment-local transition densities.
    pub fn evaluate(
        &self,
        bra: &ProductState,
        ket: &ProductState,
        layout: &FragmentLayout,
        cache: &mut FragmentTdmCache,
    ) -> Result<f64, anyhow::Error> {
        let mut value = 0.0;
        for (term, assignments) in self.terms.iter().zip(self.assignments.iter()) {
            for assignment in assignments.iter() {
                let tdms = assignment
                    .patterns
                    .iter()
                    .enumerate()
                    .map(|(frag, pattern)| {
                        cache.get(
                            frag,
                            LocalRootIndex {
                                root: bra.root,
                                lroot: bra.lroots[frag],
                            },
                            LocalRootIndex {
                                root: ket.root,
                                lroot: ket.lroots[frag],
                            },
                            pattern,
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let Some(tdms) = tdms.into_iter().collect::<Option<Vec<_>>>() else {
                    continue;
                };

                let local_tuples = if assignment.slot_frags.is_empty() {
                    vec![vec![]]
                } else {
                    assignment
                        .slot_frags
                        .iter()
                        .map(|&frag| 0..layout.norb(frag))
                        .multi_cartesian_product()
                        .collect_vec()
                };
                let mut term_value = 0.0;
                for local in local_tuples.iter() {
                    if term
                        .tied_slots()
                        .iter()
                        .any(|&(a, b)| local[a] != local[b])
                    {
                        continue;
                    }
                    let full = local
                        .iter()
                        .zip(assignment.slot_frags.iter())
                        .map(|(&p, &frag)| layout.offset(frag) + p)
                        .collect_vec();
                    let coefficient = term.coefficient(&full);
                    if coefficient == 0.0 {
                        continue;
                    }
                    let product = tdms
                        .iter()
                        .zip(assignment.frag_slots.iter())
                        .map(|(tdm, slots)| {
                            let sub = slots.iter().map(|&slot| local[slot]).collect_vec();
                            tdm[IxDyn(&sub)]
                        })
                        .product::<f64>();
                    term_value += coefficient * product;
                }
                value += assignment.sign * term_value;
            }
        }
        Ok(value)
    }
}
