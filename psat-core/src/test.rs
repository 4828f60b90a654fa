//! Test-only helpers specific to this crate.
//!
//! Generic CNF formula generators live in `psat_formula::test`; this module only holds solver
//! crate specific tooling.
pub mod io;
