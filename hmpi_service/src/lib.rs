//! Heavy metal pollution index service.
//!
//! Scores water-quality sample sheets (CSV) with five standard indices:
//! HPI, HEI, MPI, Cd, and PLI. The calculation itself lives in `analysis`
//! and is pure; everything else moves sample sheets in and results out.

pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod probe;
pub mod service;
pub mod standards;
