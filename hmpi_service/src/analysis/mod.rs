//! Index computation for the pollution index service.
//!
//! Everything here is pure: no I/O, no logging, no shared state. Callers
//! hand in parsed readings and get back a fresh result.
//!
//! Submodules:
//! - `indices` — HPI, HEI, MPI, Cd, and PLI for one sample.

pub mod indices;

pub use indices::compute_indices;
