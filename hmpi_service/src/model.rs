/// SampleRow, MetalReadings, IndexResult, ResultRow, IngestError
/// Core data types for the pollution index service.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no logic beyond small container helpers, and no I/O.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::standards::Metal;

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

/// Sample identifier column, passed through untouched.
pub const COL_SAMPLE_ID: &str = "Sample_ID";

/// WGS84 latitude column, passed through as text.
pub const COL_LATITUDE: &str = "Latitude";

/// WGS84 longitude column, passed through as text.
pub const COL_LONGITUDE: &str = "Longitude";

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// One row of an uploaded sample sheet, before any numeric parsing.
///
/// Metadata fields are `None` when the column is absent from the sheet (or
/// the row is too short to reach it). Metal values are only stored for
/// recognized metal columns; unrecognized columns never reach this type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleRow {
    pub sample_id: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub metals: BTreeMap<Metal, String>, // raw cell text, may be empty
}

/// Parsed concentrations (mg/L) for the metals measured in one sample.
///
/// Only metals with a present, non-empty, numeric cell appear here. A metal
/// that was not measured is absent, never zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetalReadings(BTreeMap<Metal, f64>);

impl MetalReadings {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn insert(&mut self, metal: Metal, concentration: f64) {
        self.0.insert(metal, concentration);
    }

    pub fn get(&self, metal: Metal) -> Option<f64> {
        self.0.get(&metal).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metal, f64)> + '_ {
        self.0.iter().map(|(m, v)| (*m, *v))
    }
}

impl FromIterator<(Metal, f64)> for MetalReadings {
    fn from_iter<I: IntoIterator<Item = (Metal, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// The five pollution indices computed for one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexResult {
    /// Heavy metal Pollution Index.
    #[serde(rename = "HPI")]
    pub hpi: f64,
    /// Heavy metal Evaluation Index.
    #[serde(rename = "HEI")]
    pub hei: f64,
    /// Metal Pollution Index.
    #[serde(rename = "MPI")]
    pub mpi: f64,
    /// Degree of contamination.
    #[serde(rename = "Cd")]
    pub cd: f64,
    /// Pollution Load Index.
    #[serde(rename = "PLI")]
    pub pli: f64,
}

/// Identifying columns copied verbatim from the input row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleMetadata {
    #[serde(rename = "Sample_ID", skip_serializing_if = "Option::is_none", default)]
    pub sample_id: Option<String>,
    #[serde(rename = "Latitude", skip_serializing_if = "Option::is_none", default)]
    pub latitude: Option<String>,
    #[serde(rename = "Longitude", skip_serializing_if = "Option::is_none", default)]
    pub longitude: Option<String>,
}

/// One element of the response array: metadata plus indices, flattened into
/// a single JSON object. `indices` is `None` when the row had no recognized
/// metal values, in which case no index keys are emitted at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultRow {
    #[serde(flatten)]
    pub metadata: SampleMetadata,
    #[serde(flatten)]
    pub indices: Option<IndexResult>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while reading or parsing a sample sheet.
#[derive(Debug, PartialEq)]
pub enum IngestError {
    /// The file or upload stream could not be read.
    Io(String),
    /// The CSV itself is malformed (bad quoting, invalid UTF-8, ...).
    Csv { line: Option<u64>, message: String },
    /// A metal cell held text that is not a finite number.
    /// `row` is 1-based and excludes the header.
    InvalidValue { row: usize, metal: Metal, raw: String },
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Io(msg) => write!(f, "I/O error: {}", msg),
            IngestError::Csv { line: Some(line), message } => {
                write!(f, "CSV error at line {}: {}", line, message)
            }
            IngestError::Csv { line: None, message } => write!(f, "CSV error: {}", message),
            IngestError::InvalidValue { row, metal, raw } => {
                write!(f, "Invalid value for {} in row {}: '{}' is not a number", metal, row, raw)
            }
        }
    }
}

impl std::error::Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Io(err.to_string())
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            return IngestError::Io(err.to_string());
        }
        IngestError::Csv {
            line: err.position().map(|p| p.line()),
            message: err.to_string(),
        }
    }
}
