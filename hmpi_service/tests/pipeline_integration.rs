/// Integration tests for the sample sheet pipeline
///
/// Tests verify:
/// 1. Sheets on disk are read, scored, and returned in input order
/// 2. Metadata columns pass through untouched
/// 3. The invalid value policy is honored end to end
/// 4. Annotated CSV output keeps every input column
///
/// Run with: cargo test --test pipeline_integration

use std::io::Write;

use hmpi_service::ingest::{InvalidValuePolicy, process_file, write_annotated_csv};
use hmpi_service::model::IngestError;
use hmpi_service::standards::Metal;
use tempfile::NamedTempFile;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const RIVER_SURVEY: &str = "\
Sample_ID,Latitude,Longitude,Pb,Cd,Cr,As,Hg,Ni,Fe,Zn,Cu,Mn,Notes
IR-001,40.6939,-89.5898,0.02,0.003,,,,,,,,,upstream of outfall
IR-002,40.5614,-89.9956,0.01,,,,,,,,,,
IR-003,40.9200,-89.4854,,,,,,,,,,,no metals measured
IR-004,41.1120,-89.3540,0,0.001,0.01,0.005,0.0002,0.01,0.1,1.0,0.02,0.05,
";

fn sheet(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp sheet");
    file.write_all(contents.as_bytes()).expect("write temp sheet");
    file.flush().expect("flush temp sheet");
    file
}

fn assert_close(actual: f64, expected: f64, what: &str) {
    assert!(
        (actual - expected).abs() <= 1e-9 * expected.abs().max(1.0),
        "{}: expected {}, got {}",
        what,
        expected,
        actual
    );
}

// ---------------------------------------------------------------------------
// 1. Scoring a survey sheet
// ---------------------------------------------------------------------------

#[test]
fn test_survey_rows_are_scored_in_order() {
    let file = sheet(RIVER_SURVEY);
    let rows = process_file(file.path(), InvalidValuePolicy::RejectBatch)
        .expect("survey sheet should process");

    let ids: Vec<_> = rows
        .iter()
        .map(|r| r.metadata.sample_id.as_deref().unwrap_or(""))
        .collect();
    assert_eq!(ids, vec!["IR-001", "IR-002", "IR-003", "IR-004"]);
}

#[test]
fn test_lead_and_cadmium_row_matches_hand_calculation() {
    let file = sheet(RIVER_SURVEY);
    let rows = process_file(file.path(), InvalidValuePolicy::RejectBatch).unwrap();

    let indices = rows[0].indices.expect("IR-001 has two metals");
    assert_close(indices.hei, 3.0, "HEI");
    assert_close(indices.cd, 3.0, "Cd");
    assert_close(indices.pli, 2.0_f64.sqrt(), "PLI");
    assert!((indices.mpi - 0.00775).abs() < 1e-5, "MPI was {}", indices.mpi);
    assert!((indices.hpi - 123.08).abs() < 0.01, "HPI was {}", indices.hpi);
}

#[test]
fn test_single_metal_row_at_limit() {
    let file = sheet(RIVER_SURVEY);
    let rows = process_file(file.path(), InvalidValuePolicy::RejectBatch).unwrap();

    let indices = rows[1].indices.expect("IR-002 has lead");
    assert_close(indices.hpi, 100.0, "HPI");
    assert_close(indices.hei, 1.0, "HEI");
    assert_close(indices.mpi, 0.01, "MPI");
}

#[test]
fn test_row_without_metals_keeps_metadata_only() {
    let file = sheet(RIVER_SURVEY);
    let rows = process_file(file.path(), InvalidValuePolicy::RejectBatch).unwrap();

    assert_eq!(rows[2].indices, None, "IR-003 has no metal values");
    assert_eq!(rows[2].metadata.latitude.as_deref(), Some("40.9200"));
    assert_eq!(rows[2].metadata.longitude.as_deref(), Some("-89.4854"));
}

#[test]
fn test_zero_lead_collapses_geometric_means() {
    let file = sheet(RIVER_SURVEY);
    let rows = process_file(file.path(), InvalidValuePolicy::RejectBatch).unwrap();

    let indices = rows[3].indices.expect("IR-004 has all ten metals");
    assert_eq!(indices.mpi, 0.0);
    assert_eq!(indices.pli, 0.0);
    assert!(indices.hpi > 0.0 && indices.hpi.is_finite());
}

// ---------------------------------------------------------------------------
// 2. Invalid values
// ---------------------------------------------------------------------------

#[test]
fn test_below_detection_text_rejects_batch_by_default() {
    let file = sheet("Sample_ID,Pb,Hg\nA,0.01,0.0001\nB,0.02,BDL\n");
    let err = process_file(file.path(), InvalidValuePolicy::RejectBatch).unwrap_err();
    assert_eq!(
        err,
        IngestError::InvalidValue {
            row: 2,
            metal: Metal::Hg,
            raw: "BDL".to_string(),
        }
    );
}

#[test]
fn test_skip_metal_policy_scores_remaining_metals() {
    let file = sheet("Sample_ID,Pb,Hg\nA,0.01,BDL\nB,n/a,\n");
    let rows = process_file(file.path(), InvalidValuePolicy::SkipMetal).unwrap();

    assert_eq!(rows.len(), 2);
    let a = rows[0].indices.expect("A still has lead");
    assert_close(a.hpi, 100.0, "HPI");
    assert_eq!(rows[1].indices, None, "B has nothing numeric left");
}

#[test]
fn test_missing_file_is_io_error() {
    let result = process_file(
        std::path::Path::new("/nonexistent/survey.csv"),
        InvalidValuePolicy::RejectBatch,
    );
    assert!(matches!(result, Err(IngestError::Io(_))), "got {:?}", result);
}

// ---------------------------------------------------------------------------
// 3. Annotated CSV output
// ---------------------------------------------------------------------------

#[test]
fn test_annotated_csv_round_trips_through_csv_reader() {
    let input = sheet(RIVER_SURVEY);
    let output = NamedTempFile::new().unwrap();

    let written = write_annotated_csv(
        std::fs::File::open(input.path()).unwrap(),
        std::fs::File::create(output.path()).unwrap(),
        "survey.csv",
        InvalidValuePolicy::RejectBatch,
    )
    .expect("annotation should succeed");
    assert_eq!(written, 4);

    let mut reader = csv::Reader::from_path(output.path()).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.len(), 14 + 5, "index columns appended after input columns");
    assert_eq!(&headers[14], "HPI");
    assert_eq!(&headers[4], "Cd", "measured cadmium column");
    assert_eq!(&headers[17], "Cd_index", "contamination degree must not shadow it");
    assert_eq!(&headers[18], "PLI");

    let records: Vec<_> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 4);
    assert_eq!(&records[0][13], "upstream of outfall", "Notes column preserved");
    assert_eq!(&records[1][14], "100");
    assert_eq!(&records[2][14], "", "unscored row has blank HPI");
}
