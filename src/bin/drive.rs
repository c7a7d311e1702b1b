//! Drive CLI - Command-line interface for Synheart Drive
//!
//! Commands:
//! - run: Start the periodic pipeline and stream snapshots to stdout
//! - once: Compute a single snapshot without the scheduler
//! - decode: Parse an RC command line
//! - doctor: Diagnose configuration and environment
//! - schema: Print the snapshot schema

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use synheart_drive::rc::{RcCommand, RcLinkSubscriber};
use synheart_drive::{
    simulate_cycle, PipelineConfig, PipelineError, Snapshot, SubscriberError, TelemetryEngine,
    DRIVE_VERSION, PRODUCER_NAME,
};

/// Drive - Simulated BCI telemetry pipeline
#[derive(Parser)]
#[command(name = "drive")]
#[command(author = "Synheart AI Inc")]
#[command(version = DRIVE_VERSION)]
#[command(about = "Turn synthetic EEG bands into vehicle control commands", long_about = None)]
struct Cli {
    /// Logging verbosity level (logs go to stderr)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Configuration flags shared by commands that build a pipeline
#[derive(clap::Args, Clone)]
struct ConfigArgs {
    /// Load configuration from a JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Time between cycles (milliseconds)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Samples per window
    #[arg(long)]
    window_size: Option<usize>,

    /// Spacing between samples (milliseconds)
    #[arg(long)]
    spacing_ms: Option<u64>,

    /// Fixed RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the periodic pipeline and stream snapshots to stdout
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Stop after this many snapshots (runs until killed if omitted)
        #[arg(long)]
        cycles: Option<u64>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Emit RC command lines instead of snapshots
        #[arg(long)]
        rc: bool,
    },

    /// Compute a single snapshot without the scheduler
    Once {
        #[command(flatten)]
        config: ConfigArgs,

        /// Reference time in Unix milliseconds (defaults to now)
        #[arg(long)]
        now_ms: Option<i64>,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// Emit an RC command line instead of the snapshot
        #[arg(long)]
        rc: bool,
    },

    /// Parse an RC command line such as "F085,R000,H000"
    Decode {
        /// Command line to parse
        line: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the snapshot schema
    Schema {
        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one snapshot per line)
    Ndjson,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level) {
        eprintln!("failed to initialise logging: {e}");
    }

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

fn init_logging(level: &str) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

fn run(cli: Cli) -> Result<(), DriveCliError> {
    match cli.command {
        Commands::Run {
            config,
            cycles,
            output_format,
            rc,
        } => cmd_run(&config, cycles, output_format, rc),

        Commands::Once {
            config,
            now_ms,
            output_format,
            rc,
        } => cmd_once(&config, now_ms, output_format, rc),

        Commands::Decode { line, json } => cmd_decode(&line, json),

        Commands::Doctor { config, json } => cmd_doctor(&config, json),

        Commands::Schema { json_schema } => cmd_schema(json_schema),
    }
}

fn cmd_run(
    args: &ConfigArgs,
    cycles: Option<u64>,
    output_format: OutputFormat,
    rc: bool,
) -> Result<(), DriveCliError> {
    let config = resolve_config(args)?;
    let mut engine = TelemetryEngine::new();

    if rc {
        engine.subscribe(RcLinkSubscriber::new(io::stdout()));
    }

    // Hand snapshots to the main thread so slow stdout never holds up a cycle
    let (tx, rx) = mpsc::channel::<Snapshot>();
    engine.subscribe(move |snapshot: &Snapshot| -> Result<(), SubscriberError> {
        tx.send(snapshot.clone())
            .map_err(|e| SubscriberError::new(e.to_string()))
    });

    engine.start(config)?;
    info!("streaming snapshots");

    let mut stdout = io::stdout();
    let mut seen: u64 = 0;
    for snapshot in rx.iter() {
        if !rc {
            write!(stdout, "{}", format_snapshot(&snapshot, &output_format)?)?;
            stdout.flush()?;
        }

        seen += 1;
        if cycles.map_or(false, |limit| seen >= limit) {
            break;
        }
    }

    engine.stop();
    Ok(())
}

fn cmd_once(
    args: &ConfigArgs,
    now_ms: Option<i64>,
    output_format: OutputFormat,
    rc: bool,
) -> Result<(), DriveCliError> {
    let config = resolve_config(args)?;
    let now_ms = now_ms.unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let snapshot = simulate_cycle(&config, now_ms, &mut rng)?;

    if rc {
        println!("{}", RcCommand::from_vector(&snapshot.vector).encode());
    } else {
        print!("{}", format_snapshot(&snapshot, &output_format)?);
    }
    Ok(())
}

fn cmd_decode(line: &str, json: bool) -> Result<(), DriveCliError> {
    let command = RcCommand::parse(line)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&command)?);
    } else {
        println!("Forward: {}", command.forward);
        println!("Right:   {}", command.right);
        println!("Height:  {}", command.height);
    }
    Ok(())
}

fn cmd_doctor(args: &ConfigArgs, json: bool) -> Result<(), DriveCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "drive_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Drive version {}", DRIVE_VERSION),
    });

    // Check the effective configuration
    match resolve_config(args) {
        Ok(config) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "tick {} ms, {} samples every {} ms, seed {}",
                config.tick_interval_ms,
                config.window_size,
                config.sample_spacing_ms,
                config
                    .seed
                    .map_or_else(|| "entropy".to_string(), |s| s.to_string())
            ),
        }),
        Err(e) => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: CliError::from(e).message,
        }),
    }

    // Check stdout is available (for streaming mode)
    let stdout_check = if atty::is(atty::Stream::Stdout) {
        DoctorCheck {
            name: "stdout".to_string(),
            status: CheckStatus::Ok,
            message: "stdout is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdout".to_string(),
            status: CheckStatus::Ok,
            message: "stdout is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdout_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: DRIVE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Drive Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
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
        Err(DriveCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(json_schema: bool) -> Result<(), DriveCliError> {
    if json_schema {
        println!("{}", get_snapshot_json_schema());
        return Ok(());
    }

    println!("Output Schema: drive.snapshot.v1");
    println!();
    println!("Each snapshot contains:");
    println!();
    println!("- producer: {{ name, version, instance_id }}");
    println!("- cycle: 1-based cycle number within the run");
    println!("- observed_at: reference time of the newest sample (RFC 3339)");
    println!("- window: {{ spacing_ms, samples: [{{ timestamp_ms, delta, theta, alpha, beta, gamma }}] }}");
    println!("- state: forward | reverse | left | right | up | neutral");
    println!("- vector: {{ forward [-1,1], lateral [-1,1], vertical [0,1] }}");
    println!();
    println!("RC lines (--rc): F<forward>,R<right>,H<height> scaled to [-100,100] / [0,100]");
    Ok(())
}

// Helper functions

fn resolve_config(args: &ConfigArgs) -> Result<PipelineConfig, DriveCliError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(v) = args.interval_ms {
        config.tick_interval_ms = v;
    }
    if let Some(v) = args.window_size {
        config.window_size = v;
    }
    if let Some(v) = args.spacing_ms {
        config.sample_spacing_ms = v;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    config.validate()?;
    Ok(config)
}

fn load_config(path: &Path) -> Result<PipelineConfig, DriveCliError> {
    let json = fs::read_to_string(path)?;
    Ok(PipelineConfig::from_json(&json)?)
}

fn format_snapshot(snapshot: &Snapshot, format: &OutputFormat) -> Result<String, DriveCliError> {
    match format {
        OutputFormat::Ndjson => Ok(serde_json::to_string(snapshot)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(snapshot)? + "\n"),
    }
}

fn get_snapshot_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/drive.snapshot.v1.json",
        "title": "drive.snapshot.v1",
        "description": "Synheart Drive pipeline snapshot",
        "type": "object",
        "required": ["producer", "cycle", "observed_at", "window", "state", "vector"],
        "properties": {
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "cycle": { "type": "integer", "minimum": 1 },
            "observed_at": { "type": "string", "format": "date-time" },
            "window": {
                "type": "object",
                "required": ["spacing_ms", "samples"],
                "properties": {
                    "spacing_ms": { "type": "integer", "minimum": 1 },
                    "samples": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["timestamp_ms", "delta", "theta", "alpha", "beta", "gamma"],
                            "properties": {
                                "timestamp_ms": { "type": "integer" },
                                "delta": { "type": "number" },
                                "theta": { "type": "number" },
                                "alpha": { "type": "number" },
                                "beta": { "type": "number" },
                                "gamma": { "type": "number" }
                            }
                        }
                    }
                }
            },
            "state": {
                "type": "string",
                "enum": ["forward", "reverse", "left", "right", "up", "neutral"]
            },
            "vector": {
                "type": "object",
                "required": ["forward", "lateral", "vertical"],
                "properties": {
                    "forward": { "type": "number", "minimum": -1, "maximum": 1 },
                    "lateral": { "type": "number", "minimum": -1, "maximum": 1 },
                    "vertical": { "type": "number", "minimum": 0, "maximum": 1 }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum DriveCliError {
    Io(io::Error),
    Pipeline(PipelineError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for DriveCliError {
    fn from(e: io::Error) -> Self {
        DriveCliError::Io(e)
    }
}

impl From<PipelineError> for DriveCliError {
    fn from(e: PipelineError) -> Self {
        DriveCliError::Pipeline(e)
    }
}

impl From<serde_json::Error> for DriveCliError {
    fn from(e: serde_json::Error) -> Self {
        DriveCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DriveCliError> for CliError {
    fn from(e: DriveCliError) -> Self {
        match e {
            DriveCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            DriveCliError::Pipeline(PipelineError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Interval, window size and spacing must all be positive".to_string()),
            },
            DriveCliError::Pipeline(PipelineError::CommandParseError(msg)) => CliError {
                code: "RC_PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Expected a line like F085,R000,H000".to_string()),
            },
            DriveCliError::Pipeline(e) => CliError {
                code: "PIPELINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            DriveCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            DriveCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

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
    Error,
}
