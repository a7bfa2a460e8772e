//! Heavy metal pollution index calculation.
//!
//! Every index is computed over the set of metals actually measured in a
//! sample. Metals missing from the readings do not contribute to any sum,
//! product, or count.
//!
//! Given measured concentration `M`, permissible limit `S` and ideal value
//! `I` for each metal:
//!
//! ```text
//! K    = 1 / Σ (1 / S)
//! W    = K / S
//! Q    = (M - I) / (S - I) × 100
//! HPI  = Σ Q × W
//! HEI  = Σ M / S
//! CF   = M / S
//! Cd   = Σ CF
//! MPI  = (Π M)  ^ (1/n)
//! PLI  = (Π CF) ^ (1/n)
//! ```

use crate::model::{IndexResult, MetalReadings};

/// Computes all five pollution indices for one sample.
///
/// Returns `None` when `readings` is empty: there is nothing to compute, and
/// the geometric means would otherwise take a zeroth root.
///
/// A zero reading collapses both products, so MPI and PLI come out as
/// exactly 0. That is the expected result, not an error.
///
/// The geometric means take the n-th root of each factor before
/// multiplying, so the running product stays near the scale of the
/// readings instead of overflowing.
pub fn compute_indices(readings: &MetalReadings) -> Option<IndexResult> {
    if readings.is_empty() {
        return None;
    }

    let n = readings.len() as f64;
    let root = 1.0 / n;
    let k = 1.0 / readings.iter().map(|(m, _)| 1.0 / m.permissible_limit()).sum::<f64>();

    let mut hpi = 0.0;
    let mut hei = 0.0;
    let mut cd = 0.0;
    let mut mpi = 1.0;
    let mut pli = 1.0;

    for (metal, concentration) in readings.iter() {
        let limit = metal.permissible_limit();
        let ideal = metal.ideal_value();

        let weight = k / limit;
        let sub_index = (concentration - ideal) / (limit - ideal) * 100.0;
        let contamination_factor = concentration / limit;

        hpi += sub_index * weight;
        hei += concentration / limit;
        cd += contamination_factor;
        mpi *= concentration.powf(root);
        pli *= contamination_factor.powf(root);
    }

    Some(IndexResult {
        hpi,
        hei,
        mpi,
        cd,
        pli,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
