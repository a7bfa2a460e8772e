use std::error::Error;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use hmpi_service::config::{self, ServiceConfig};
use hmpi_service::ingest::{process_file, write_annotated_csv};
use hmpi_service::logging::{self, Component, LogLevel};
use hmpi_service::probe::{self, ProbeStatus};
use hmpi_service::service;

#[derive(Parser)]
#[command(name = "hmpi", version, about = "Heavy metal pollution indices for water-quality sample sheets")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the CSV upload service
    Serve {
        /// Config file (defaults to $HMPI_CONFIG or ./hmpi.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Score a local sample sheet
    Process {
        /// Input CSV with a header row
        input: PathBuf,
        /// Output path; JSON goes to stdout when omitted, CSV to output.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Upload a sample sheet to a running service and report the result
    Probe {
        /// Base URL, e.g. http://localhost:5000
        url: String,
        /// Sample sheet to upload
        file: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// JSON array, same shape as the service response
    Json,
    /// Input sheet with index columns appended
    Csv,
}

fn init_logging(config: &ServiceConfig, floor: LogLevel) -> Result<(), Box<dyn Error>> {
    let level = config.logging.log_level()?.max(floor);
    logging::init_logger(level, config.logging.file.as_deref(), config.logging.console_timestamps);
    config.log_loaded();
    Ok(())
}

fn serve(config_path: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let config = config::load(config_path)?;
    init_logging(&config, LogLevel::Debug)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(service::run(&config))
}

fn process(
    input: &Path,
    output: Option<&Path>,
    format: OutputFormat,
    config_path: Option<&Path>,
) -> Result<(), Box<dyn Error>> {
    let config = config::load(config_path)?;
    // Keep stdout clean when it carries the JSON result.
    let floor = if format == OutputFormat::Json && output.is_none() {
        LogLevel::Warning
    } else {
        LogLevel::Debug
    };
    init_logging(&config, floor)?;

    let policy = config.ingest.invalid_value_policy;
    let source_name = input.display().to_string();

    match format {
        OutputFormat::Json => {
            let rows = process_file(input, policy).inspect_err(|e| {
                logging::log_ingest_failure(&source_name, "Processing sheet", e)
            })?;
            let json = serde_json::to_string_pretty(&rows)?;
            match output {
                Some(path) => {
                    std::fs::write(path, json)?;
                    logging::info(
                        Component::System,
                        None,
                        &format!("Wrote {} rows to {}", rows.len(), path.display()),
                    );
                }
                None => println!("{}", json),
            }
        }
        OutputFormat::Csv => {
            let path = output.unwrap_or(Path::new("output.csv"));
            let reader = File::open(input)?;
            let writer = BufWriter::new(File::create(path)?);
            let rows = write_annotated_csv(reader, writer, &source_name, policy).inspect_err(|e| {
                logging::log_ingest_failure(&source_name, "Annotating sheet", e)
            })?;
            logging::info(
                Component::System,
                None,
                &format!("Wrote {} rows to {}", rows, path.display()),
            );
        }
    }
    Ok(())
}

fn run_probe(url: &str, file: &Path, json: bool, timeout_secs: u64) -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    logging::init_logger(LogLevel::Warning, None, false);

    let body = std::fs::read(file)?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.csv".to_string());

    let client = probe::build_client(Duration::from_secs(timeout_secs))?;
    let report = probe::probe_service(&client, url, &file_name, body);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        probe::print_summary(&report);
    }

    if report.status == ProbeStatus::Failed {
        return Err(report
            .error_message
            .unwrap_or_else(|| "probe failed".to_string())
            .into());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Serve { config } => serve(config.as_deref()),
        Command::Process {
            input,
            output,
            format,
            config,
        } => process(input, output.as_deref(), *format, config.as_deref()),
        Command::Probe {
            url,
            file,
            json,
            timeout_secs,
        } => run_probe(url, file, *json, *timeout_secs),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
