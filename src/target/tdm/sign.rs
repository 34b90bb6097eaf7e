//! Fermionic sign factors for operator strings distributed over fragments.
//!
//! A full-space operator string $`\hat{o}_1 \cdots \hat{o}_m`$ whose operators act on different
//! fragments is evaluated between product states by
//!
//! 1. stably reordering the string so that all operators on fragment 0 come first, then those on
//!    fragment 1, and so on, which costs one sign flip per inverted pair of operators; and
//! 2. moving the sub-string $`\hat{O}_k`$ of fragment $`k`$ past the fragment wavefunctions
//!    $`\hat{C}_0 \cdots \hat{C}_{k-1}`$ of the ket, which costs
//!    $`(-1)^{|\hat{O}_k| \sum_{j<k} N_j}`$ with $`N_j`$ the ket electron count of fragment $`j`$.
//!
//! The bra wavefunctions are then peeled off in the same order and contribute no further sign
//! because each $`\hat{O}_k \hat{C}_k`$ has the electron parity of the bra's $`\hat{C}'_k`$.

/// Counts the pairs `(a, b)` with `a < b` and `assignment[a] > assignment[b]`.
pub fn count_inversions(assignment: &[usize]) -> usize {
    assignment
        .iter()
        .enumerate()
        .map(|(a, &frag_a)| {
            assignment[a + 1..]
                .iter()
                .filter(|&&frag_b| frag_b < frag_a)
                .count()
        })
        .sum()
}

/// Returns the fermionic sign of evaluating an operator string, whose operators have been
/// assigned to fragments, between product states.
///
/// # Arguments
///
/// * `assignment` - The fragment acted on by each operator in the string, in string order.
/// * `ket_nelec` - The total electron count of every fragment in the ket.
///
/// # Returns
///
/// Either $`+1`$ or $`-1`$.
pub fn fragment_string_sign(assignment: &[usize], ket_nelec: &[usize]) -> f64 {
    let inversions = count_inversions(assignment);
    let (passes, _) = ket_nelec
        .iter()
        .enumerate()
        .fold((0usize, 0usize), |(passes, nelec_before), (frag, &nelec)| {
            let nops = assignment.iter().filter(|&&f| f == frag).count();
            (passes + nops * nelec_before, nelec_before + nelec)
        });
    if (inversions + passes) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}
