//! poc CLI - Command-line interface for the concern point transform
//!
//! Commands:
//! - to-duration: Fold discreet points into duration points
//! - to-discreet: Merge duration points and expand them into discreet ticks
//! - merge: Merge and round duration points without expanding
//! - validate: Validate discreet or duration point input
//! - doctor: Diagnose configuration
//! - schema: Print record schemas

use clap::{Parser, Subcommand, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use concern_points::types::ConcernPoints;
use concern_points::{
    DiscreetPoint, DurationPoint, FieldConflictPolicy, PointTransformer, TransformConfig,
    ValidationError, POC_VERSION,
};

/// poc - Transform location pings into visit intervals and back
#[derive(Parser)]
#[command(name = "poc")]
#[command(version = POC_VERSION)]
#[command(about = "Transform discreet location points into duration points and back", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every transform command
#[derive(clap::Args)]
struct TransformArgs {
    /// Input file path (use - for stdin)
    #[arg(short, long, default_value = "-")]
    input: PathBuf,

    /// Output file path (use - for stdout)
    #[arg(short, long, default_value = "-")]
    output: PathBuf,

    /// Input format
    #[arg(long, default_value = "json")]
    input_format: InputFormat,

    /// Output format
    #[arg(long, default_value = "json")]
    output_format: OutputFormat,

    /// Load transform configuration from a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Quantum in minutes (overrides the config file)
    #[arg(long)]
    quantum: Option<i64>,

    /// Field resolution when intervals merge (overrides the config file)
    #[arg(long)]
    field_policy: Option<PolicyArg>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fold discreet points into duration points
    ToDuration {
        #[command(flatten)]
        args: TransformArgs,

        /// Wrap the output in a {"concernPoints": [...]} envelope
        #[arg(long)]
        envelope: bool,
    },

    /// Merge duration points and expand them into discreet ticks
    ToDiscreet {
        #[command(flatten)]
        args: TransformArgs,
    },

    /// Merge and round duration points without expanding
    Merge {
        #[command(flatten)]
        args: TransformArgs,
    },

    /// Validate point input
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Kind of points in the input
        #[arg(long, default_value = "discreet")]
        kind: PointKind,

        /// Input format
        #[arg(long, default_value = "json")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print record schema information
    Schema {
        /// Record to describe
        #[arg(value_enum)]
        kind: PointKind,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// JSON array of points
    Json,
    /// Newline-delimited JSON (one point per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// JSON array
    Json,
    /// Newline-delimited JSON (one point per line)
    Ndjson,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum PointKind {
    /// Single timestamped observations
    Discreet,
    /// Visit intervals
    Duration,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    LastWriteWins,
    FirstWriteWins,
}

impl From<PolicyArg> for FieldConflictPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::LastWriteWins => FieldConflictPolicy::LastWriteWins,
            PolicyArg::FirstWriteWins => FieldConflictPolicy::FirstWriteWins,
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

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

fn run(cli: Cli) -> Result<(), PocCliError> {
    match cli.command {
        Commands::ToDuration { args, envelope } => cmd_to_duration(&args, envelope),
        Commands::ToDiscreet { args } => cmd_to_discreet(&args),
        Commands::Merge { args } => cmd_merge(&args),
        Commands::Validate {
            input,
            kind,
            input_format,
            json,
        } => cmd_validate(&input, kind, &input_format, json),
        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
        Commands::Schema { kind, json_schema } => cmd_schema(kind, json_schema),
    }
}

fn cmd_to_duration(args: &TransformArgs, envelope: bool) -> Result<(), PocCliError> {
    let transformer = build_transformer(args)?;
    let points: Vec<DiscreetPoint> = parse_records(&read_input(&args.input)?, &args.input_format)?;

    let durations = transformer.discreet_to_duration(&points)?;
    info!(
        points = points.len(),
        durations = durations.len(),
        "folded discreet points"
    );

    let output = if envelope {
        let wrapped = ConcernPoints {
            concern_points: durations,
        };
        match args.output_format {
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&wrapped)?,
            _ => serde_json::to_string(&wrapped)?,
        }
    } else {
        format_output(&durations, &args.output_format)?
    };

    write_output(&args.output, &output)
}

fn cmd_to_discreet(args: &TransformArgs) -> Result<(), PocCliError> {
    let transformer = build_transformer(args)?;
    let points: Vec<DurationPoint> = parse_records(&read_input(&args.input)?, &args.input_format)?;

    let ticks = transformer.duration_to_discreet(&points)?;
    info!(durations = points.len(), ticks = ticks.len(), "expanded duration points");

    write_output(&args.output, &format_output(&ticks, &args.output_format)?)
}

fn cmd_merge(args: &TransformArgs) -> Result<(), PocCliError> {
    let transformer = build_transformer(args)?;
    let points: Vec<DurationPoint> = parse_records(&read_input(&args.input)?, &args.input_format)?;

    let merged = transformer.merge_durations(&points)?;
    info!(durations = points.len(), merged = merged.len(), "merged duration points");

    write_output(&args.output, &format_output(&merged, &args.output_format)?)
}

fn cmd_validate(
    input: &Path,
    kind: PointKind,
    input_format: &InputFormat,
    json: bool,
) -> Result<(), PocCliError> {
    let records: Vec<serde_json::Value> = parse_records(&read_input(input)?, input_format)?;
    let total_points = records.len();

    let errors: Vec<ValidationErrorDetail> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            validate_record(kind, record)
                .err()
                .map(|error| ValidationErrorDetail { index, error })
        })
        .collect();

    let report = ValidationReport {
        total_points,
        valid_points: total_points - errors.len(),
        invalid_points: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total points: {}", report.total_points);
        println!("Valid points: {}", report.valid_points);
        println!("Invalid points: {}", report.invalid_points);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Point at index {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_points > 0 {
        Err(PocCliError::ValidationFailed(report.invalid_points))
    } else {
        Ok(())
    }
}

/// Apply the same checks the transform applies to its input
fn validate_record(kind: PointKind, record: serde_json::Value) -> Result<(), String> {
    match kind {
        PointKind::Discreet => {
            check_record::<DiscreetPoint>(record, |p| p.validate_persisted())
        }
        PointKind::Duration => check_record::<DurationPoint>(record, |p| p.validate()),
    }
}

fn check_record<T: DeserializeOwned>(
    record: serde_json::Value,
    validate: impl Fn(&T) -> Result<(), ValidationError>,
) -> Result<(), String> {
    let point: T = serde_json::from_value(record).map_err(|e| e.to_string())?;
    validate(&point).map_err(|e| e.to_string())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), PocCliError> {
    let mut checks: Vec<DoctorCheck> = vec![DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("poc version {}", POC_VERSION),
    }];

    if let Some(config_path) = config {
        let check = match fs::read_to_string(config_path) {
            Ok(content) => match TransformConfig::from_json(&content) {
                Ok(config) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Config valid (quantum {} min, {})",
                        config.quantum_minutes,
                        config.field_policy.as_str()
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid config: {}", e),
                },
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read config file: {}", e),
            },
        };
        checks.push(check);
    } else {
        let config = TransformConfig::default();
        checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "Using defaults (quantum {} min, {})",
                config.quantum_minutes,
                config.field_policy.as_str()
            ),
        });
    }

    // stdin is where transform commands read by default
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Warning,
            message: "stdin is a TTY; pass --input or pipe points in".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: POC_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("poc Doctor Report");
        println!("=================");
        println!("Version: {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PocCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(kind: PointKind, json_schema: bool) -> Result<(), PocCliError> {
    match kind {
        PointKind::Discreet => {
            if json_schema {
                println!("{}", discreet_json_schema());
            } else {
                println!("Discreet point: a single timestamped location observation");
                println!();
                println!("- id: integer, present once persisted");
                println!("- caseId: integer, owning case");
                println!("- latitude, longitude: numbers, compared exactly");
                println!("- time: RFC 3339 string or epoch milliseconds");
                println!("- nickname, hash, publishDate: optional");
            }
        }
        PointKind::Duration => {
            if json_schema {
                println!("{}", duration_json_schema());
            } else {
                println!("Duration point: a visit interval");
                println!();
                println!("- caseId: integer, owning case");
                println!("- latitude, longitude: numbers, compared exactly");
                println!("- time: interval start");
                println!("- duration: minutes, a positive multiple of the quantum on output");
                println!("- discreetPointIds: ids of the contributing discreet points");
                println!("- nickname, hash, publishDate: optional");
            }
        }
    }

    Ok(())
}

// Helper functions

fn build_transformer(args: &TransformArgs) -> Result<PointTransformer, PocCliError> {
    let mut config = match &args.config {
        Some(path) => TransformConfig::from_json(&fs::read_to_string(path)?)?,
        None => TransformConfig::default(),
    };
    if let Some(quantum) = args.quantum {
        config.quantum_minutes = quantum;
    }
    if let Some(policy) = args.field_policy {
        config.field_policy = policy.into();
    }
    debug!(?config, "transform configuration");

    Ok(PointTransformer::with_config(config)?)
}

fn read_input(input: &Path) -> Result<String, PocCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), PocCliError> {
    if output.to_string_lossy() == "-" {
        println!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn parse_records<T: DeserializeOwned>(data: &str, format: &InputFormat) -> Result<Vec<T>, PocCliError> {
    match format {
        InputFormat::Json => Ok(serde_json::from_str(data)?),
        InputFormat::Ndjson => {
            let mut records = Vec::new();
            for (line_num, line) in data.lines().enumerate() {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let record = serde_json::from_str(trimmed).map_err(|e| {
                    PocCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
                })?;
                records.push(record);
            }
            Ok(records)
        }
    }
}

fn format_output<T: Serialize>(records: &[T], format: &OutputFormat) -> Result<String, PocCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::with_capacity(records.len());
            for record in records {
                lines.push(serde_json::to_string(record)?);
            }
            Ok(lines.join("\n"))
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

fn discreet_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "DiscreetPoint",
        "type": "object",
        "required": ["latitude", "longitude", "time"],
        "properties": {
            "id": { "type": "integer" },
            "caseId": { "type": "integer" },
            "latitude": { "type": "number", "minimum": -90, "maximum": 90 },
            "longitude": { "type": "number", "minimum": -180, "maximum": 180 },
            "time": { "type": ["string", "integer"], "format": "date-time" },
            "nickname": { "type": "string" },
            "hash": { "type": "string" },
            "publishDate": { "type": ["string", "integer"], "format": "date-time" }
        }
    })
    .to_string()
}

fn duration_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "DurationPoint",
        "type": "object",
        "required": ["latitude", "longitude", "time", "duration"],
        "properties": {
            "caseId": { "type": "integer" },
            "latitude": { "type": "number", "minimum": -90, "maximum": 90 },
            "longitude": { "type": "number", "minimum": -180, "maximum": 180 },
            "time": { "type": ["string", "integer"], "format": "date-time" },
            "duration": { "type": "integer", "exclusiveMinimum": 0 },
            "discreetPointIds": { "type": "array", "items": { "type": "integer" } },
            "nickname": { "type": "string" },
            "hash": { "type": "string" },
            "publishDate": { "type": ["string", "integer"], "format": "date-time" }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum PocCliError {
    Io(io::Error),
    Compute(concern_points::ComputeError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for PocCliError {
    fn from(e: io::Error) -> Self {
        PocCliError::Io(e)
    }
}

impl From<concern_points::ComputeError> for PocCliError {
    fn from(e: concern_points::ComputeError) -> Self {
        PocCliError::Compute(e)
    }
}

impl From<serde_json::Error> for PocCliError {
    fn from(e: serde_json::Error) -> Self {
        PocCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PocCliError> for CliError {
    fn from(e: PocCliError) -> Self {
        match e {
            PocCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PocCliError::Compute(e) => CliError {
                code: "TRANSFORM_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'poc validate' for details".to_string()),
            },
            PocCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax and required fields".to_string()),
            },
            PocCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} points failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            PocCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PocCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_points: usize,
    valid_points: usize,
    invalid_points: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_discreet_records_need_id_and_case() {
        let record = json!({"latitude": 10.0, "longitude": 20.0, "time": "2020-05-01T00:00:00Z"});
        let error = validate_record(PointKind::Discreet, record).unwrap_err();
        assert!(error.contains("id"));

        let record = json!({
            "id": 1,
            "latitude": 10.0,
            "longitude": 20.0,
            "time": "2020-05-01T00:00:00Z"
        });
        let error = validate_record(PointKind::Discreet, record).unwrap_err();
        assert!(error.contains("caseId"));

        let record = json!({
            "id": 1,
            "caseId": 3,
            "latitude": 10.0,
            "longitude": 20.0,
            "time": "2020-05-01T00:00:00Z"
        });
        assert!(validate_record(PointKind::Discreet, record).is_ok());
    }

    #[test]
    fn test_duration_records_are_bounded() {
        let record = json!({
            "latitude": 10.0,
            "longitude": 20.0,
            "time": "2020-05-01T00:00:00Z",
            "duration": i64::MAX
        });
        assert!(validate_record(PointKind::Duration, record).is_err());

        let record = json!({"latitude": 10.0, "longitude": 20.0, "time": "2020-05-01T00:00:00Z"});
        let error = validate_record(PointKind::Duration, record).unwrap_err();
        assert!(error.contains("duration"));
    }
}
