//! The LASSI engine: fragments and their local roots, product states, fragment-factorised
//! transition densities, and the assembled state-interaction matrices.

pub mod fingerprint;
pub mod fragment;
pub mod matrix;
pub mod operator;
pub mod product;
pub mod quantum_numbers;
pub mod rdm;
pub mod si;
pub mod tdm;
