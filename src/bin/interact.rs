//! Interact CLI - Command-line interface for Synheart Interaction
//!
//! Commands:
//! - replay: Replay recorded input events into a feature vector (batch mode)
//! - run: Track a live event stream from stdin until EOF (streaming mode)
//! - export: Turn a stored NDJSON record file into one CSV table
//! - validate: Validate raw event schema
//! - doctor: Diagnose configuration and environment
//! - schema: Print input and output schemas

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use synheart_interaction::config::EngineConfig;
use synheart_interaction::encoder::FeatureEncoder;
use synheart_interaction::pipeline::{ReplayProcessor, ReplayReport, TickSchedule};
use synheart_interaction::schema::{RawEvent, RawEventAdapter, SCHEMA_VERSION};
use synheart_interaction::session::Session;
use synheart_interaction::sink::{export_records, serialize, CsvFileSink, OutputSink};
use synheart_interaction::types::FEATURE_FIELDS;
use synheart_interaction::{InteractionError, PRODUCER_NAME, VERSION};

/// Interact - Behavioral interaction metrics from raw input events
#[derive(Parser)]
#[command(name = "interact")]
#[command(author = "Synheart AI Inc")]
#[command(version = VERSION)]
#[command(about = "Derive interaction feature vectors from input events", long_about = None)]
struct Cli {
    /// Log dropped events and analyzer decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded events into a feature vector (batch mode)
    Replay {
        /// Input file paths (use - for stdin); several files are merged by timestamp
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "csv")]
        output_format: OutputFormat,

        /// User identifier stamped on the vector
        #[arg(long, default_value = "")]
        user_id: String,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Session start (ms); defaults to the first event
        #[arg(long)]
        start: Option<f64>,

        /// Session end (ms); defaults to the last event
        #[arg(long)]
        end: Option<f64>,

        /// Also export the table to this directory as interaction_data.csv
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },

    /// Track events streamed on stdin, finalizing at EOF (streaming mode)
    Run {
        /// Output format
        #[arg(long, default_value = "csv")]
        output_format: OutputFormat,

        /// User identifier stamped on the vector
        #[arg(long, default_value = "")]
        user_id: String,

        /// Engine configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Turn records stored as NDJSON (replay/run --output-format ndjson) into one CSV table
    Export {
        /// Record store path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Validate raw event schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check an engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Two-line comma-separated table
    Csv,
    /// Feature vector as JSON
    Json,
    /// Pretty-printed JSON record with producer metadata and diagnostics
    JsonPretty,
    /// One JSON record per line
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (input.raw_event.v1)
    Input,
    /// Output schema (feature vector)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn run(cli: Cli) -> Result<(), InteractCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            user_id,
            config,
            start,
            end,
            export_dir,
        } => cmd_replay(ReplayArgs {
            inputs: &input,
            output: &output,
            input_format,
            output_format,
            user_id: &user_id,
            config: config.as_deref(),
            start,
            end,
            export_dir: export_dir.as_deref(),
        }),

        Commands::Run {
            output_format,
            user_id,
            config,
        } => cmd_run(output_format, &user_id, config.as_deref()),

        Commands::Export { input, output } => cmd_export(&input, &output),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

struct ReplayArgs<'a> {
    inputs: &'a [PathBuf],
    output: &'a Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    user_id: &'a str,
    config: Option<&'a Path>,
    start: Option<f64>,
    end: Option<f64>,
    export_dir: Option<&'a Path>,
}

fn cmd_replay(args: ReplayArgs<'_>) -> Result<(), InteractCliError> {
    let config = load_config(args.config)?;

    let mut streams = Vec::with_capacity(args.inputs.len());
    for input in args.inputs {
        let data = read_input(input)?;
        streams.push(parse_events(&data, &args.input_format)?);
    }
    let events = RawEventAdapter::merge_streams(streams);

    if events.is_empty() {
        return Err(InteractCliError::NoEvents);
    }

    let mut processor = ReplayProcessor::with_config(config);
    if let Some(start) = args.start {
        processor = processor.starting_at(start);
    }
    if let Some(end) = args.end {
        processor = processor.ending_at(end);
    }

    let report = processor.replay(&events, args.user_id)?;

    if let Some(dir) = args.export_dir {
        let mut sink = CsvFileSink::in_dir(dir);
        sink.submit(&report.features)
            .map_err(InteractionError::from)?;
    }

    let output_data = format_output(&report, &args.output_format)?;
    if args.output.to_string_lossy() == "-" {
        print!("{output_data}");
    } else {
        fs::write(args.output, output_data)?;
    }

    Ok(())
}

fn cmd_export(input: &Path, output: &Path) -> Result<(), InteractCliError> {
    let store = read_input(input)?;
    let table = export_records(&store)?;

    if output.to_string_lossy() == "-" {
        print!("{table}");
    } else {
        fs::write(output, table)?;
    }

    Ok(())
}

fn cmd_run(
    output_format: OutputFormat,
    user_id: &str,
    config: Option<&Path>,
) -> Result<(), InteractCliError> {
    let config = load_config(config)?;

    let stdin = io::stdin();
    let mut session: Option<Session> = None;
    let mut ticks = TickSchedule::new(0.0, config.idle_tick_ms);
    let mut latest = 0.0;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let event: RawEvent = serde_json::from_str(trimmed).map_err(|e| {
            InteractCliError::ParseError(format!("Failed to parse event: {e}"))
        })?;

        // The session clock starts at the first event
        let session = session.get_or_insert_with(|| {
            ticks = TickSchedule::new(event.timestamp, config.idle_tick_ms);
            latest = event.timestamp;
            Session::new(user_id, &config, event.timestamp)
        });

        if event.timestamp.is_finite() {
            ticks.run_before(session, event.timestamp);
            latest = f64::max(latest, event.timestamp);
        }
        session.ingest(&event);
    }

    let mut session = session.ok_or(InteractCliError::NoEvents)?;
    ticks.run_through(&mut session, latest);

    let features = session.finalize(latest)?;
    let report = ReplayReport {
        started_at: session.state().started_at,
        ended_at: latest,
        diagnostics: session.diagnostics(),
        features,
    };

    let mut stdout = io::stdout();
    write!(stdout, "{}", format_output(&report, &output_format)?)?;
    stdout.flush()?;

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), InteractCliError> {
    let input_data = read_input(input)?;
    let events = parse_events(&input_data, &input_format)?;

    let results = RawEventAdapter::validate_events(&events);
    let out_of_order = count_out_of_order(&events);

    let report = ValidationReport {
        total_events: events.len(),
        valid_events: events.len() - results.len(),
        invalid_events: results.len(),
        out_of_order_events: out_of_order,
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                kind: r.kind.as_str().to_string(),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:        {}", report.total_events);
        println!("Valid events:        {}", report.valid_events);
        println!("Invalid events:      {}", report.invalid_events);
        println!("Out-of-order events: {}", report.out_of_order_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {} event (index {}): {}", err.kind, err.index, err.error);
            }
        }
    }

    if report.invalid_events > 0 {
        Err(InteractCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), InteractCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{PRODUCER_NAME} version {VERSION}"),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {SCHEMA_VERSION}"),
    });

    if let Some(config_path) = config {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => match EngineConfig::from_json(&content) {
                    Ok(config) => checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (normalization factor {}, window {})",
                            config.normalization_factor(),
                            config.window_capacity
                        ),
                    }),
                    Err(e) => checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    }),
                },
                Err(e) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Cannot read config file: {e}"),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist; defaults apply".to_string(),
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
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Interact Doctor Report");
        println!("======================");
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

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(InteractCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), InteractCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {SCHEMA_VERSION}");
                println!();
                println!("One record per input event:");
                println!();
                println!("- kind: pointermove | click | keydown | keyup | scroll | focusin | focusout");
                println!("- timestamp: monotonic milliseconds");
                println!("- x, y: pointer position (pointermove)");
                println!("- code, key: physical and logical key (keydown, keyup)");
                println!("- scrollOffset: absolute scroll offset (scroll)");
                println!("- targetIsEditable, targetTag, contentEditable: focus target");
                println!("- device: originating device, used when merging streams");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: feature vector");
                println!();
                println!("Two-line comma-separated table, columns in order:");
                println!();
                for name in FEATURE_FIELDS {
                    println!("- {name}");
                }
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, InteractCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_events(data: &str, format: &InputFormat) -> Result<Vec<RawEvent>, InteractCliError> {
    let events = match format {
        InputFormat::Ndjson => RawEventAdapter::parse_ndjson(data)?,
        InputFormat::Json => RawEventAdapter::parse_array(data)?,
    };
    Ok(events)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, InteractCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn count_out_of_order(events: &[RawEvent]) -> usize {
    let mut last = f64::NEG_INFINITY;
    let mut count = 0;
    for event in events {
        if event.timestamp < last {
            count += 1;
        } else if event.timestamp.is_finite() {
            last = event.timestamp;
        }
    }
    count
}

fn format_output(report: &ReplayReport, format: &OutputFormat) -> Result<String, InteractCliError> {
    match format {
        OutputFormat::Csv => Ok(serialize(&report.features)?),
        OutputFormat::Json => Ok(serde_json::to_string(&report.features)? + "\n"),
        OutputFormat::JsonPretty => {
            let record =
                FeatureEncoder::new().encode_with_diagnostics(&report.features, report.diagnostics);
            Ok(serde_json::to_string_pretty(&record)? + "\n")
        }
        OutputFormat::Ndjson => {
            let record =
                FeatureEncoder::new().encode_with_diagnostics(&report.features, report.diagnostics);
            Ok(serde_json::to_string(&record)? + "\n")
        }
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/input.raw_event.v1.json",
        "title": "input.raw_event.v1",
        "description": "Synheart raw input event schema",
        "type": "object",
        "required": ["kind", "timestamp"],
        "properties": {
            "kind": {
                "type": "string",
                "enum": ["pointermove", "click", "keydown", "keyup", "scroll", "focusin", "focusout"]
            },
            "timestamp": { "type": "number", "minimum": 0 },
            "x": { "type": "number" },
            "y": { "type": "number" },
            "code": { "type": "string" },
            "key": { "type": "string" },
            "scrollOffset": { "type": "number" },
            "targetIsEditable": { "type": "boolean" },
            "targetTag": { "type": "string" },
            "contentEditable": { "type": "boolean" },
            "device": { "type": "string" }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    let mut properties = serde_json::Map::new();
    for name in FEATURE_FIELDS {
        let schema = match name {
            "userId" => serde_json::json!({ "type": "string" }),
            "jitter" | "clickPattern" => serde_json::json!({ "type": "integer", "minimum": 0 }),
            "cursorAcceleration" => {
                serde_json::json!({ "type": "number", "minimum": -50000, "maximum": 50000 })
            }
            "typingAccuracy" | "errorRate" => {
                serde_json::json!({ "type": "number", "minimum": 0, "maximum": 100 })
            }
            _ => serde_json::json!({ "type": "number", "minimum": 0 }),
        };
        properties.insert(name.to_string(), schema);
    }

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/interaction.features.v1.json",
        "title": "interaction.features.v1",
        "description": "Session-end interaction feature vector",
        "type": "object",
        "required": FEATURE_FIELDS,
        "properties": properties
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum InteractCliError {
    Io(io::Error),
    Engine(InteractionError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for InteractCliError {
    fn from(e: io::Error) -> Self {
        InteractCliError::Io(e)
    }
}

impl From<InteractionError> for InteractCliError {
    fn from(e: InteractionError) -> Self {
        InteractCliError::Engine(e)
    }
}

impl From<serde_json::Error> for InteractCliError {
    fn from(e: serde_json::Error) -> Self {
        InteractCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<InteractCliError> for CliError {
    fn from(e: InteractCliError) -> Self {
        match e {
            InteractCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            InteractCliError::Engine(e) => engine_error(e),
            InteractCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            InteractCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            InteractCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{count} events failed validation"),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            InteractCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            InteractCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

fn engine_error(e: InteractionError) -> CliError {
    let (code, hint) = match &e {
        InteractionError::Parse(_) | InteractionError::Json(_) => (
            "PARSE_ERROR",
            format!("Ensure input matches {SCHEMA_VERSION} schema"),
        ),
        InteractionError::Io(_) => ("IO_ERROR", "Check file paths and permissions".to_string()),
        InteractionError::Csv(_) => (
            "CSV_ERROR",
            "Check the table has one header row and matching value rows".to_string(),
        ),
        InteractionError::Config(_) => (
            "CONFIG_ERROR",
            "Run 'interact doctor --config <file>' for details".to_string(),
        ),
        InteractionError::Validation(_) => (
            "VALIDATION_ERROR",
            "Run 'interact replay --verbose' to inspect dropped events".to_string(),
        ),
        InteractionError::Transmit(_) => (
            "TRANSMIT_ERROR",
            "Check the export directory exists and is writable".to_string(),
        ),
        InteractionError::AlreadyFinalized | InteractionError::NotFinalized => {
            ("SESSION_ERROR", "Finalize each session exactly once".to_string())
        }
    };
    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint),
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    out_of_order_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    kind: String,
    error: String,
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
