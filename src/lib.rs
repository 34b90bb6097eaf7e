//! # LASSI: Localised Active Space State Interaction
//!
//! `lassi` builds the Hamiltonian, $`\hat{S}^2`$, and overlap matrices of a molecule partitioned
//! into active-space fragments, in the basis of product states of fragment-local wavefunctions
//! (*local roots*), and solves the resulting generalised eigenvalue problem. Three tiers of matrix
//! construction are provided:
//! - a reference tier that expands every product state into the full determinant space,
//! - a cached tier that assembles matrix elements from fragment-level transition density
//!   matrices, and
//! - a blocked tier that exploits the permutational symmetry of the integrals and skips whole
//!   blocks of global roots that cannot couple.
//!
//! The tiers are certified against each other by trigonometric fingerprints of the resulting
//! matrices.
//!
//! ## Getting started
//!
//! A calculation is described by a YAML input file (see [`interfaces::input::Input`]) and run
//! with the `lassi` binary:
//!
//! ```text
//! lassi --config input.yml --output calc
//! ```
//!
//! A template input file can be generated with `lassi --template template.yml`.
//!
//! ## Examples and usage
//!
//! For most items (structs, enums, functions, and traits), their usages are illustrated in test
//! functions.
//!
//! ## Conventions
//!
//! - Determinants are stored as `u64` occupation bitstrings with fragments laid out in order,
//!   each fragment contributing its $`\alpha`$ spin-orbitals before its $`\beta`$ ones.
//! - Product states are enumerated with the local-root index of fragment 0 varying fastest.
//! - Two-electron integrals are in chemists' notation.

pub mod drivers;
pub mod interfaces;
pub mod io;
pub mod target;
