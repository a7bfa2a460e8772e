/// Row-level helpers: turning a raw sample row into parsed readings and
/// pass-through metadata.
///
/// Non-numeric metal cells are never allowed to flow into the index
/// calculation as NaN. What happens instead is chosen by
/// `InvalidValuePolicy`.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::logging::{self, Component};
use crate::model::{IngestError, MetalReadings, SampleMetadata, SampleRow};

// ---------------------------------------------------------------------------
// Invalid value policy
// ---------------------------------------------------------------------------

/// What to do with a metal cell that is present but not a finite number
/// (e.g. `"BDL"`, `"n/a"`, `"NaN"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidValuePolicy {
    /// Abort the whole sheet with `IngestError::InvalidValue`.
    #[default]
    RejectBatch,
    /// Drop the offending metal from that row and keep going.
    SkipMetal,
}

impl fmt::Display for InvalidValuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidValuePolicy::RejectBatch => write!(f, "reject_batch"),
            InvalidValuePolicy::SkipMetal => write!(f, "skip_metal"),
        }
    }
}

impl FromStr for InvalidValuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "reject_batch" => Ok(InvalidValuePolicy::RejectBatch),
            "skip_metal" => Ok(InvalidValuePolicy::SkipMetal),
            other => Err(format!(
                "unknown invalid value policy '{}' (expected reject_batch or skip_metal)",
                other
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses the metal cells of a row into readings.
///
/// Empty and whitespace-only cells mean "not measured" and are left out.
/// `row` is the 1-based data row number, used only for error messages.
pub fn parse_row(
    raw: &SampleRow,
    row: usize,
    policy: InvalidValuePolicy,
) -> Result<MetalReadings, IngestError> {
    let mut readings = MetalReadings::new();

    for (&metal, text) in &raw.metals {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => readings.insert(metal, value),
            _ => match policy {
                InvalidValuePolicy::RejectBatch => {
                    return Err(IngestError::InvalidValue {
                        row,
                        metal,
                        raw: text.clone(),
                    });
                }
                InvalidValuePolicy::SkipMetal => {
                    let subject = raw.sample_id.clone().unwrap_or_else(|| format!("row {}", row));
                    logging::warn(
                        Component::Ingest,
                        Some(&subject),
                        &format!(
                            "Skipping {} ({}): '{}' is not a number",
                            metal.name(),
                            metal,
                            text
                        ),
                    );
                }
            },
        }
    }

    Ok(readings)
}

/// Copies the identifying columns of a row, as raw text.
pub fn project_metadata(raw: &SampleRow) -> SampleMetadata {
    SampleMetadata {
        sample_id: raw.sample_id.clone(),
        latitude: raw.latitude.clone(),
        longitude: raw.longitude.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
