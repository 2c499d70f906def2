//! Pawflux CLI - Command-line interface for Pawflux
//!
//! Commands:
//! - extract: Pull activity records out of a document
//! - report: Aggregate a document or TSV export into a report
//! - import: Convert a TSV export into app-history records
//! - timeline: Build a display timeline
//! - validate: Assess the quality of a TSV export
//! - modes: List the image analysis modes

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use pawflux::config::PawfluxConfig;
use pawflux::interchange::write_tsv;
use pawflux::pipeline::{InputFormat, PawfluxProcessor};
use pawflux::{AnalysisMode, FluxError, PAWFLUX_VERSION};

/// Pawflux - pet activity log extraction and reporting
#[derive(Parser)]
#[command(name = "pawflux")]
#[command(version = PAWFLUX_VERSION)]
#[command(about = "Turn pet activity logs into reports", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, global = true, default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract events from an activity document
    Extract {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output format
        #[arg(long, default_value = "tsv")]
        output_format: ExtractFormat,
    },

    /// Aggregate events into a report
    Report {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: SourceFormat,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Convert a TSV export into app-history JSON
    Import {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Build a timeline of events
    Timeline {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "auto")]
        input_format: SourceFormat,
    },

    /// Assess the quality of a TSV export
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output the quality report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List image analysis modes
    Modes,

    /// Parse a document with the completion service
    #[cfg(feature = "ark")]
    ParseDocument {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Treat the input as a history export
        #[arg(long)]
        history: bool,
    },

    /// Check the completion service configuration
    #[cfg(feature = "ark")]
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ExtractFormat {
    /// Tab-separated interchange
    Tsv,
    /// JSON array of events
    Json,
    /// Newline-delimited JSON (one event per line)
    Ndjson,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceFormat {
    /// Detect from the content
    Auto,
    /// Activity document
    Document,
    /// Tab-separated interchange
    Tsv,
}

impl SourceFormat {
    fn resolve(self, text: &str) -> InputFormat {
        match self {
            SourceFormat::Auto => InputFormat::detect(text),
            SourceFormat::Document => InputFormat::Document,
            SourceFormat::Tsv => InputFormat::Tsv,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.into())
        .parse_default_env()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PawfluxCliError> {
    let processor = build_processor(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract {
            input,
            output_format,
        } => cmd_extract(&processor, &input, output_format),

        Commands::Report {
            input,
            input_format,
            pretty,
        } => {
            let text = read_input(&input)?;
            let report = processor.report(&text, input_format.resolve(&text));
            if !report.has_data() {
                log::warn!("no events found, writing an empty report");
            }
            println!("{}", processor.encoder().encode_report(&report, pretty)?);
            Ok(())
        }

        Commands::Import { input, output } => cmd_import(&processor, &input, &output),

        Commands::Timeline {
            input,
            input_format,
        } => {
            let text = read_input(&input)?;
            let timeline = processor.timeline(&text, input_format.resolve(&text));
            println!("{}", serde_json::to_string_pretty(&timeline)?);
            Ok(())
        }

        Commands::Validate { input, json } => {
            let text = read_input(&input)?;
            let quality = processor.quality(&text);
            if json {
                println!("{}", serde_json::to_string_pretty(&quality)?);
            } else {
                print!("{}", quality.render_text());
            }
            if quality.total_records == 0 {
                Err(PawfluxCliError::NoEvents)
            } else {
                Ok(())
            }
        }

        Commands::Modes => {
            for mode in AnalysisMode::ALL {
                println!("{:<14} {} - {}", mode.as_str(), mode.title(), mode.sub_info());
            }
            Ok(())
        }

        #[cfg(feature = "ark")]
        Commands::ParseDocument { input, history } => {
            let text = read_input(&input)?;
            let dispatcher = ark_dispatcher(cli.config.as_deref())?;
            let result = if history {
                dispatcher.analyze_history_text(&text)
            } else {
                dispatcher.analyze_document(&text)
            };
            println!("{}", result.result);
            Ok(())
        }

        #[cfg(feature = "ark")]
        Commands::Health => {
            let dispatcher = ark_dispatcher(cli.config.as_deref())?;
            let status = dispatcher.health();
            println!("{}", serde_json::to_string_pretty(&status)?);
            if status.api_configured {
                Ok(())
            } else {
                Err(PawfluxCliError::Dispatch(pawflux::DispatchError::MissingApiKey))
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PawfluxConfig, PawfluxCliError> {
    match path {
        Some(path) => Ok(PawfluxConfig::from_file(path)?),
        None => Ok(PawfluxConfig::default()),
    }
}

fn build_processor(config: Option<&Path>) -> Result<PawfluxProcessor, PawfluxCliError> {
    Ok(PawfluxProcessor::with_config(load_config(config)?)?)
}

#[cfg(feature = "ark")]
fn ark_dispatcher(
    config: Option<&Path>,
) -> Result<pawflux::Dispatcher<pawflux::dispatch::ArkClient>, PawfluxCliError> {
    let client = pawflux::dispatch::ArkClient::from_env().map_err(PawfluxCliError::Dispatch)?;
    Ok(pawflux::Dispatcher::new(client, load_config(config)?.dispatch))
}

fn read_input(input: &Path) -> Result<String, PawfluxCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn cmd_extract(
    processor: &PawfluxProcessor,
    input: &Path,
    output_format: ExtractFormat,
) -> Result<(), PawfluxCliError> {
    let text = read_input(input)?;
    let extraction = processor.extract(&text);

    for skipped in &extraction.skipped {
        log::warn!(
            "record {} skipped ({:?}): {}",
            skipped.index,
            skipped.reason,
            skipped.detail
        );
    }
    if extraction.is_empty() {
        return Err(PawfluxCliError::NoEvents);
    }

    match output_format {
        ExtractFormat::Tsv => print!("{}", write_tsv(&extraction.events)?),
        ExtractFormat::Json => println!("{}", serde_json::to_string_pretty(&extraction.events)?),
        ExtractFormat::Ndjson => {
            for event in &extraction.events {
                println!("{}", serde_json::to_string(event)?);
            }
        }
    }
    Ok(())
}

fn cmd_import(
    processor: &PawfluxProcessor,
    input: &Path,
    output: &Path,
) -> Result<(), PawfluxCliError> {
    let text = read_input(input)?;
    let (json, stats) = processor.app_history(&text, InputFormat::Tsv)?;

    if output.to_string_lossy() == "-" {
        println!("{}", json);
    } else {
        fs::write(output, json)?;
    }

    eprintln!("Import Report");
    eprintln!("=============");
    eprintln!("Total rows:    {}", stats.total);
    eprintln!("Imported:      {}", stats.imported);
    eprintln!("Failed:        {}", stats.failed);
    eprintln!("Success rate:  {:.1}%", stats.success_rate());
    for failure in &stats.failures {
        eprintln!("  - line {}: {}", failure.line, failure.reason);
    }

    if stats.imported == 0 {
        Err(PawfluxCliError::NoEvents)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum PawfluxCliError {
    Io(io::Error),
    Flux(FluxError),
    Json(serde_json::Error),
    #[cfg_attr(not(feature = "ark"), allow(dead_code))]
    Dispatch(pawflux::DispatchError),
    NoEvents,
}

impl From<io::Error> for PawfluxCliError {
    fn from(e: io::Error) -> Self {
        PawfluxCliError::Io(e)
    }
}

impl From<FluxError> for PawfluxCliError {
    fn from(e: FluxError) -> Self {
        PawfluxCliError::Flux(e)
    }
}

impl From<serde_json::Error> for PawfluxCliError {
    fn from(e: serde_json::Error) -> Self {
        PawfluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PawfluxCliError> for CliError {
    fn from(e: PawfluxCliError) -> Self {
        match e {
            PawfluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PawfluxCliError::Flux(e @ FluxError::ConfigError(_)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the --config file".to_string()),
            },
            PawfluxCliError::Flux(e) => CliError {
                code: "PROCESSING_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            PawfluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PawfluxCliError::Dispatch(e) => CliError {
                code: "DISPATCH_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Set ARK_API_KEY and check ARK_BASE_URL".to_string()),
            },
            PawfluxCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Skipped records are logged at warn level; check stderr".to_string()),
            },
        }
    }
}
