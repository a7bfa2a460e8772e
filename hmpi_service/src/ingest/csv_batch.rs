/// Sample sheet (CSV) processing.
///
/// Reads a header row, maps recognized columns once, then scores every data
/// row in file order. Any malformed record aborts the whole sheet; callers
/// never see a partial result list.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use crate::analysis::compute_indices;
use crate::ingest::rows::{InvalidValuePolicy, parse_row, project_metadata};
use crate::logging;
use crate::model::{
    COL_LATITUDE, COL_LONGITUDE, COL_SAMPLE_ID, IndexResult, IngestError, ResultRow, SampleRow,
};
use crate::standards::Metal;

/// Index names, in output order. These are the JSON keys of a scored row
/// and the base headers of the columns `write_annotated_csv` appends.
pub const INDEX_COLUMNS: [&str; 5] = ["HPI", "HEI", "MPI", "Cd", "PLI"];

const INDEX_HEADER_SUFFIX: &str = "_index";

// ---------------------------------------------------------------------------
// Column layout
// ---------------------------------------------------------------------------

/// Positions of the recognized columns within a sheet's header.
///
/// Unrecognized columns are simply not recorded. When a header repeats,
/// the first occurrence wins.
#[derive(Debug, Default, PartialEq)]
pub struct ColumnLayout {
    sample_id: Option<usize>,
    latitude: Option<usize>,
    longitude: Option<usize>,
    metals: Vec<(Metal, usize)>,
}

impl ColumnLayout {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let mut layout = ColumnLayout::default();

        for (idx, header) in headers.iter().enumerate() {
            let name = header.trim();
            match name {
                COL_SAMPLE_ID => {
                    layout.sample_id.get_or_insert(idx);
                }
                COL_LATITUDE => {
                    layout.latitude.get_or_insert(idx);
                }
                COL_LONGITUDE => {
                    layout.longitude.get_or_insert(idx);
                }
                _ => {
                    if let Some(metal) = Metal::from_symbol(name) {
                        if !layout.metals.iter().any(|(m, _)| *m == metal) {
                            layout.metals.push((metal, idx));
                        }
                    }
                }
            }
        }

        layout
    }

    /// Metals this sheet has a column for.
    pub fn metals(&self) -> impl Iterator<Item = Metal> + '_ {
        self.metals.iter().map(|(m, _)| *m)
    }

    /// Builds the raw row for one record. Cells past the end of a short
    /// record are absent.
    pub fn sample_row(&self, record: &StringRecord) -> SampleRow {
        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).map(String::from);

        SampleRow {
            sample_id: cell(self.sample_id),
            latitude: cell(self.latitude),
            longitude: cell(self.longitude),
            metals: self
                .metals
                .iter()
                .filter_map(|(metal, idx)| record.get(*idx).map(|v| (*metal, v.to_string())))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Scores one data row. `row` is 1-based.
pub fn score_row(
    raw: &SampleRow,
    row: usize,
    policy: InvalidValuePolicy,
) -> Result<ResultRow, IngestError> {
    let readings = parse_row(raw, row, policy)?;
    Ok(ResultRow {
        metadata: project_metadata(raw),
        indices: compute_indices(&readings),
    })
}

fn reader_for<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input)
}

/// Scores every row of a CSV stream, preserving input order.
///
/// `source_name` identifies the sheet in log output (file name or upload
/// name).
pub fn process_reader<R: Read>(
    input: R,
    source_name: &str,
    policy: InvalidValuePolicy,
) -> Result<Vec<ResultRow>, IngestError> {
    let mut reader = reader_for(input);
    let layout = ColumnLayout::from_headers(reader.headers()?);

    let recognized: Vec<String> = layout.metals().map(|m| m.to_string()).collect();
    if recognized.is_empty() {
        logging::warn(
            logging::Component::Ingest,
            Some(source_name),
            "No recognized metal columns in header; rows will carry no indices",
        );
    } else {
        logging::debug(
            logging::Component::Ingest,
            Some(source_name),
            &format!("Metal columns: {}", recognized.join(", ")),
        );
    }

    let mut results = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let raw = layout.sample_row(&record);
        results.push(score_row(&raw, i + 1, policy)?);
    }

    let scored = results.iter().filter(|r| r.indices.is_some()).count();
    logging::log_batch_summary(source_name, results.len(), scored);

    Ok(results)
}

/// Opens a sheet on disk and scores it.
pub fn process_file(path: &Path, policy: InvalidValuePolicy) -> Result<Vec<ResultRow>, IngestError> {
    let file = File::open(path)
        .map_err(|e| IngestError::Io(format!("{}: {}", path.display(), e)))?;
    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    process_reader(file, &source_name, policy)
}

// ---------------------------------------------------------------------------
// Annotated CSV output
// ---------------------------------------------------------------------------

fn index_cells(indices: Option<&IndexResult>) -> [String; 5] {
    match indices {
        Some(r) => [r.hpi, r.hei, r.mpi, r.cd, r.pli].map(|v| v.to_string()),
        None => Default::default(),
    }
}

/// Headers for the appended index columns.
///
/// A sheet that measured cadmium already has a `Cd` column, so an index
/// name that matches an input header gets `_index` appended until it is
/// unique.
pub fn annotated_index_headers(headers: &StringRecord) -> Vec<String> {
    INDEX_COLUMNS
        .iter()
        .map(|name| {
            let mut header = name.to_string();
            while headers.iter().any(|h| h.trim() == header) {
                header.push_str(INDEX_HEADER_SUFFIX);
            }
            header
        })
        .collect()
}

/// Copies the input sheet to `output` with the five index columns appended.
///
/// Every input column is kept as-is. Short records are padded to the
/// header width so the index columns always line up; rows without any
/// recognized metal get blank index cells. Returns the number of data rows
/// written.
pub fn write_annotated_csv<R: Read, W: Write>(
    input: R,
    output: W,
    source_name: &str,
    policy: InvalidValuePolicy,
) -> Result<usize, IngestError> {
    let mut reader = reader_for(input);
    let headers = reader.headers()?.clone();
    let layout = ColumnLayout::from_headers(&headers);

    let mut writer = WriterBuilder::new().flexible(true).from_writer(output);

    let mut header_out = headers.clone();
    for name in annotated_index_headers(&headers) {
        header_out.push_field(&name);
    }
    writer.write_record(&header_out)?;

    let mut total = 0;
    let mut scored = 0;
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let result = score_row(&layout.sample_row(&record), i + 1, policy)?;

        let mut out = record.clone();
        while out.len() < headers.len() {
            out.push_field("");
        }
        for cell in index_cells(result.indices.as_ref()) {
            out.push_field(&cell);
        }
        writer.write_record(&out)?;

        total += 1;
        if result.indices.is_some() {
            scored += 1;
        }
    }
    writer.flush()?;

    logging::log_batch_summary(source_name, total, scored);
    Ok(total)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
