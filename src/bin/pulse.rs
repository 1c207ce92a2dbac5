//! Pulse CLI - Command-line interface for Usage Pulse
//!
//! Commands:
//! - compute: Recompute all result tables from an input directory
//! - validate: Check source files for malformed lines and integrity faults
//! - doctor: Diagnose configuration and input health
//! - schema: Print the input and output column contracts
//! - init-config: Write a default configuration file

use chrono::Local;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use usage_pulse::config::DEFAULT_CONFIG_FILE;
use usage_pulse::schema::{
    parse_date, IntegrityWarning, SourceReport, ACTIVATIONS_FILE, EMPLOYEES_FILE, MESSAGES_FILE,
    ORG_UNITS_FILE,
};
use usage_pulse::{
    ComputeError, Config, MetricsEngine, ResultTables, RunParams, SourceReader, SourceValidator,
    TableEncoder, ENGINE_VERSION, PRODUCER_NAME,
};

/// Pulse - batch aggregation engine for product adoption metrics
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Compute adoption, activity and messaging metrics", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./pulse.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute all result tables
    Compute {
        /// Input directory holding the source files
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Run date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        target_date: Option<String>,

        /// Recompute everything up to the target date
        #[arg(long, conflicts_with = "lookback_days")]
        full_refresh: bool,

        /// Incremental window length in days (overrides config)
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Validate source files
    Validate {
        /// Input directory holding the source files
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and input health
    Doctor {
        /// Input directory to check
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output the column contract as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Destination path
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// One NDJSON file per table
    Ndjson,
    /// Single JSON document with run envelope
    Json,
    /// Pretty-printed JSON document
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Source files
    Input,
    /// Result tables
    Output,
}

const INPUT_COLUMNS: &[(&str, &[&str])] = &[
    (EMPLOYEES_FILE, &["emp_id", "hire_date", "termination_date?", "unit_id?"]),
    (ACTIVATIONS_FILE, &["emp_id", "activated_at"]),
    (MESSAGES_FILE, &["sender_emp_id", "sent_at"]),
    (ORG_UNITS_FILE, &["org_id", "org_name", "parent_org_id?"]),
];

const WEEK_COLUMNS: [&str; 5] = ["week_start", "week_end", "iso_year", "iso_week", "week_label"];

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let body = serde_json::to_string(&CliError::from(e))
                .unwrap_or_else(|_| "Unknown error".to_string());
            eprintln!("{}", body);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    let config = Config::load_or_default(cli.config.as_deref())?;
    init_logging(&config.logging.level, cli.verbose);

    match cli.command {
        Commands::Compute {
            input,
            output,
            target_date,
            full_refresh,
            lookback_days,
            output_format,
        } => {
            let target_date = match target_date {
                Some(raw) => parse_date(&raw)?,
                None => Local::now().date_naive(),
            };
            let params = if full_refresh {
                RunParams::full(target_date)
            } else {
                let lookback_days = lookback_days.unwrap_or(config.run.lookback_days);
                RunParams::incremental(target_date, lookback_days)
            };
            cmd_compute(config, &input, &output, params, output_format)
        }

        Commands::Validate { input, json } => cmd_validate(&config, &input, json),

        Commands::Doctor { input, json } => {
            cmd_doctor(cli.config.as_deref(), input.as_deref(), json)
        }

        Commands::Schema { schema_type, json } => cmd_schema(schema_type, json),

        Commands::InitConfig { path, force } => cmd_init_config(&path, force),
    }
}

/// Install a compact stderr subscriber. `RUST_LOG` wins over both the
/// configured level and `-v`.
fn init_logging(configured: &str, verbose: u8) {
    let level = match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {}", e);
    }
}

fn cmd_compute(
    config: Config,
    input: &Path,
    output: &Path,
    params: RunParams,
    output_format: OutputFormat,
) -> Result<(), PulseCliError> {
    let loaded = SourceReader::load_dir(input)?;
    if loaded.rejected_count() > 0 {
        warn!(
            rejected = loaded.rejected_count(),
            "some source lines were skipped; run 'pulse validate' for details"
        );
    }

    let engine = MetricsEngine::new(config);
    let result = engine.run(&loaded.snapshot, &params)?;
    let encoder = TableEncoder::new();

    let to_stdout = output.to_string_lossy() == "-";
    match output_format {
        OutputFormat::Ndjson if to_stdout => {
            let mut stdout = io::stdout().lock();
            write!(stdout, "{}", tagged_ndjson(&result.tables)?)?;
            stdout.flush()?;
        }
        OutputFormat::Ndjson => {
            let written = TableEncoder::write_ndjson_dir(&result.tables, output)?;
            info!(files = written.len(), dir = %output.display(), "tables written");
        }
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let pretty = matches!(output_format, OutputFormat::JsonPretty);
            let document = encoder.encode_to_json(&result, pretty)?;
            if to_stdout {
                println!("{}", document);
            } else {
                fs::create_dir_all(output)?;
                let path = output.join("tables.json");
                fs::write(&path, document)?;
                info!(path = %path.display(), "tables written");
            }
        }
    }

    info!(run_id = encoder.run_id(), "compute finished");
    Ok(())
}

/// All tables on one stream, each row tagged with its table name.
fn tagged_ndjson(tables: &ResultTables) -> Result<String, PulseCliError> {
    let mut out = String::new();
    for (name, body) in TableEncoder::encode_ndjson(tables)? {
        for line in body.lines() {
            let row: serde_json::Value = serde_json::from_str(line)?;
            let tagged = serde_json::json!({ "table": name, "row": row });
            out.push_str(&serde_json::to_string(&tagged)?);
            out.push('\n');
        }
    }
    Ok(out)
}

fn cmd_validate(config: &Config, input: &Path, json: bool) -> Result<(), PulseCliError> {
    let loaded = SourceReader::load_dir(input)?;
    let warnings = SourceValidator::check(&loaded.snapshot, &config.org);

    let report = ValidationReport {
        rejected_lines: loaded.rejected_count(),
        sources: loaded.reports,
        warnings,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        for source in &report.sources {
            let state = if source.present { "" } else { " (missing)" };
            println!(
                "{:<22} total {:>7}  accepted {:>7}  rejected {:>5}{}",
                source.source,
                source.total,
                source.accepted,
                source.rejected.len(),
                state
            );
        }

        let rejected: Vec<_> = report
            .sources
            .iter()
            .flat_map(|s| s.rejected.iter().map(move |r| (s.source.as_str(), r)))
            .collect();
        if !rejected.is_empty() {
            println!("\nRejected lines:");
            for (source, line) in rejected {
                println!("  - {}:{}: {}", source, line.line, line.reason);
            }
        }

        if !report.warnings.is_empty() {
            println!("\nIntegrity warnings:");
            for w in &report.warnings {
                println!("  - [{}] {} {:?}: {}", w.source, w.subject, w.issue, w.detail);
            }
        }
    }

    if report.rejected_lines > 0 {
        Err(PulseCliError::ValidationFailed(report.rejected_lines))
    } else {
        Ok(())
    }
}

fn cmd_doctor(
    config_path: Option<&Path>,
    input: Option<&Path>,
    json: bool,
) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {}", ENGINE_VERSION),
    });

    match Config::load_or_default(config_path) {
        Ok(config) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "lookback {} days, leaderboard top {}, root suffix \"{}\"",
                config.run.lookback_days, config.run.leaderboard_size, config.org.root_suffix
            ),
        }),
        Err(e) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        }),
    }

    if let Some(dir) = input {
        if dir.is_dir() {
            for (file, _) in INPUT_COLUMNS {
                let path = dir.join(file);
                let check = match fs::metadata(&path) {
                    Ok(meta) => DoctorCheck {
                        name: file.to_string(),
                        status: CheckStatus::Ok,
                        message: format!("{} bytes", meta.len()),
                    },
                    Err(_) => DoctorCheck {
                        name: file.to_string(),
                        status: CheckStatus::Warning,
                        message: "missing; source will be read as empty".to_string(),
                    },
                };
                checks.push(check);
            }
        } else {
            checks.push(DoctorCheck {
                name: "input".to_string(),
                status: CheckStatus::Error,
                message: format!("{} is not a directory", dir.display()),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
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
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn output_columns() -> Vec<(&'static str, Vec<&'static str>)> {
    let names = ResultTables::TABLE_NAMES;
    let with_week = |extra: &[&'static str]| {
        let mut cols = WEEK_COLUMNS.to_vec();
        cols.extend_from_slice(extra);
        cols
    };

    vec![
        (
            names[0],
            with_week(&["total_employees", "covered_employees", "coverage_rate_percent"]),
        ),
        (
            names[1],
            with_week(&[
                "root_org_id",
                "root_org_name",
                "total_employees",
                "covered_employees",
                "coverage_rate_percent",
            ]),
        ),
        (
            names[2],
            vec!["calendar_date", "active_users", "total_employees", "active_rate_percent"],
        ),
        (
            names[3],
            with_week(&["total_messages", "total_employees", "messages_per_capita"]),
        ),
        (
            names[4],
            vec![
                "week_start",
                "iso_year",
                "iso_week",
                "week_label",
                "segment",
                "users_in_segment",
                "message_count",
                "message_share_percent",
                "user_share_percent",
            ],
        ),
        (
            names[5],
            vec!["rank", "emp_id", "root_org_id", "root_org_name", "total_messages"],
        ),
        (
            names[6],
            vec![
                "hire_month",
                "month_label",
                "new_hires",
                "activated_within_month",
                "activation_rate_percent",
            ],
        ),
        (
            names[7],
            vec![
                "hire_month",
                "month_label",
                "root_org_id",
                "root_org_name",
                "new_hires",
                "activated_within_month",
                "activation_rate_percent",
            ],
        ),
        (
            names[8],
            vec![
                "activity_month",
                "month_label",
                "active_users",
                "previous_month_active_users",
                "retained_users",
                "retention_rate_percent",
            ],
        ),
        (
            names[9],
            vec![
                "activity_month",
                "month_label",
                "root_org_id",
                "root_org_name",
                "active_users",
                "previous_month_active_users",
                "retained_users",
                "retention_rate_percent",
            ],
        ),
    ]
}

fn cmd_schema(schema_type: SchemaType, json: bool) -> Result<(), PulseCliError> {
    let contract: Vec<(&str, Vec<&str>)> = match schema_type {
        SchemaType::Input => INPUT_COLUMNS
            .iter()
            .map(|(file, cols)| (*file, cols.to_vec()))
            .collect(),
        SchemaType::Output => output_columns(),
    };

    if json {
        let map: serde_json::Map<String, serde_json::Value> = contract
            .iter()
            .map(|(name, cols)| (name.to_string(), serde_json::json!(cols)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&map)?);
        return Ok(());
    }

    match schema_type {
        SchemaType::Input => {
            println!("Input: one file per source, NDJSON or a JSON array");
            println!("Columns marked ? are optional. Dates are YYYY-MM-DD; timestamps also");
            println!("accept a time part or RFC 3339.");
        }
        SchemaType::Output => {
            println!("Output: one table per file ({{table}}.ndjson) or one JSON document");
            println!("Rates are percentages rounded to 2 decimals; a zero denominator gives null.");
        }
    }
    println!();
    for (name, cols) in &contract {
        println!("{}", name);
        println!("  {}", cols.join(", "));
    }

    Ok(())
}

fn cmd_init_config(path: &Path, force: bool) -> Result<(), PulseCliError> {
    if path.exists() && !force {
        return Err(PulseCliError::ConfigExists(path.to_path_buf()));
    }
    fs::write(path, Config::default_toml()?)?;
    println!("Created {} with default settings.", path.display());
    Ok(())
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    ValidationFailed(usize),
    DoctorFailed,
    ConfigExists(PathBuf),
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<ComputeError> for PulseCliError {
    fn from(e: ComputeError) -> Self {
        PulseCliError::Compute(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InvalidRunParams(_) => {
                        ("INVALID_PARAMS", "Use --lookback-days of at least 1 or --full-refresh")
                    }
                    ComputeError::DateParseError(_) => ("DATE_ERROR", "Dates must be YYYY-MM-DD"),
                    ComputeError::ConfigError(_) | ComputeError::ConfigRenderError(_) => {
                        ("CONFIG_ERROR", "Run 'pulse init-config' to generate a valid file")
                    }
                    ComputeError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    ComputeError::ParseError(_) | ComputeError::JsonError(_) => {
                        ("PARSE_ERROR", "Run 'pulse schema input' for the expected format")
                    }
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} source lines were rejected", count),
                hint: Some("Fix the rejected lines and retry".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PulseCliError::ConfigExists(path) => CliError {
                code: "CONFIG_EXISTS".to_string(),
                message: format!("{} already exists", path.display()),
                hint: Some("Pass --force to overwrite".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    rejected_lines: usize,
    sources: Vec<SourceReport>,
    warnings: Vec<IntegrityWarning>,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
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
