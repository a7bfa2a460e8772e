//! Service Probe Module
//!
//! Uploads a sample sheet to a running index service and reports whether
//! it answered, how many rows came back, and how many of those carried
//! indices. Use this after a deploy to confirm the endpoint is live and
//! scoring, not just accepting connections.

use chrono::Utc;
use reqwest::blocking::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

use crate::ingest::csv_batch::INDEX_COLUMNS;
use crate::logging::{self, Component};
use crate::service::PROCESS_CSV_PATH;
use crate::service::upload::FILE_FIELD;

// ============================================================================
// Probe Results
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub timestamp: String,
    pub url: String,
    pub status: ProbeStatus,
    pub http_status: Option<u16>,
    pub rows_returned: usize,
    pub rows_with_indices: usize,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ProbeStatus {
    /// 2xx and every returned row carries indices.
    Success,
    /// 2xx but some rows had no recognized metals.
    PartialSuccess,
    Failed,
}

/// Joins a base URL like `http://host:5000/` with the endpoint path.
pub fn endpoint_url(base_url: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), PROCESS_CSV_PATH)
}

/// Builds the blocking client used for probes.
pub fn build_client(timeout: Duration) -> Result<reqwest::blocking::Client, Box<dyn Error>> {
    Ok(reqwest::blocking::Client::builder().timeout(timeout).build()?)
}

// ============================================================================
// Probe
// ============================================================================

pub fn probe_service(
    client: &reqwest::blocking::Client,
    base_url: &str,
    file_name: &str,
    csv_body: Vec<u8>,
) -> ProbeReport {
    let url = endpoint_url(base_url);
    let mut result = ProbeReport {
        timestamp: Utc::now().to_rfc3339(),
        url: url.clone(),
        status: ProbeStatus::Failed,
        http_status: None,
        rows_returned: 0,
        rows_with_indices: 0,
        error_message: None,
    };

    let part = match Part::bytes(csv_body)
        .file_name(file_name.to_string())
        .mime_str("text/csv")
    {
        Ok(part) => part,
        Err(e) => {
            result.error_message = Some(format!("Could not build upload: {}", e));
            return result;
        }
    };
    let form = Form::new().part(FILE_FIELD, part);

    match client.post(&url).multipart(form).send() {
        Ok(response) => {
            let status = response.status();
            result.http_status = Some(status.as_u16());

            match response.json::<serde_json::Value>() {
                Ok(json) => {
                    if !status.is_success() {
                        let message = json
                            .get("error")
                            .and_then(|e| e.as_str())
                            .unwrap_or("no error message in response");
                        result.error_message = Some(format!("HTTP {}: {}", status, message));
                    } else if let Some(rows) = json.as_array() {
                        result.rows_returned = rows.len();
                        result.rows_with_indices = rows
                            .iter()
                            .filter(|row| INDEX_COLUMNS.iter().all(|k| row.get(k).is_some()))
                            .count();
                    } else {
                        result.error_message = Some("Response was not a JSON array".to_string());
                    }
                }
                Err(e) => {
                    result.error_message = Some(format!("HTTP {}, parse error: {}", status, e));
                }
            }

            if status.is_success() && result.error_message.is_none() {
                result.status = if result.rows_with_indices == result.rows_returned {
                    ProbeStatus::Success
                } else {
                    ProbeStatus::PartialSuccess
                };
            }
        }
        Err(e) => {
            result.error_message = Some(format!("Request failed: {}", e));
        }
    }

    match result.status {
        ProbeStatus::Failed => logging::error(
            Component::Probe,
            Some(&url),
            result.error_message.as_deref().unwrap_or("probe failed"),
        ),
        _ => logging::info(
            Component::Probe,
            Some(&url),
            &format!(
                "{}/{} rows scored",
                result.rows_with_indices, result.rows_returned
            ),
        ),
    }

    result
}

/// Prints a human-readable report to stdout.
pub fn print_summary(report: &ProbeReport) {
    println!("\n═══════════════════════════════════════════════════════════");
    println!("Probe: {}", report.url);
    println!("  Status: {:?}", report.status);
    if let Some(code) = report.http_status {
        println!("  HTTP: {}", code);
    }
    println!(
        "  Rows: {} returned, {} with indices",
        report.rows_returned, report.rows_with_indices
    );
    if let Some(error) = &report.error_message {
        println!("  Error: {}", error);
    }
    println!("═══════════════════════════════════════════════════════════\n");
}
