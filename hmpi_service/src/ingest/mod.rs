//! Sample sheet ingestion for the pollution index service.
//!
//! Submodules:
//! - `rows`      — per-row parsing and metadata projection.
//! - `csv_batch` — header mapping and whole-sheet processing.

pub mod csv_batch;
pub mod rows;

pub use csv_batch::{process_file, process_reader, write_annotated_csv};
pub use rows::{InvalidValuePolicy, parse_row, project_metadata};
