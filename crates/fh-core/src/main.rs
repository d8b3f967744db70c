//! FinanceHub telemetry CLI.
//!
//! - `demo`: play a scripted session and print its forensic report
//! - `config`: show or validate the resolved configuration
//! - `export`: play the scripted session and print the raw telemetry

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fh_common::error::format_error_human;
use fh_common::{Error, OutputFormat, SCHEMA_VERSION};
use fh_config::{load_config, ConfigError, ResolvedConfig};
use fh_core::console::{ConsoleBuffer, DEFAULT_CONSOLE_CAPACITY};
use fh_core::exit_codes::ExitCode;
use fh_core::logging::{init_logging, targets, LogConfig, LogFormat, LogLevel};
use fh_core::runtime::TelemetryRuntime;
use fh_core::scenario::run_demo_session;
use fh_report::{copy_to_clipboard, download_as_markdown, ReportGenerator, SystemClipboard};
use tracing::{error, info};

/// FinanceHub telemetry and forensic reports
#[derive(Parser)]
#[command(name = "fh-core")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to the telemetry config file
    #[arg(long, global = true, env = "FINANCEHUB_TELEMETRY_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log format on stderr (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scripted session and print the resulting error report
    Demo(DemoArgs),

    /// Configuration management
    Config(ConfigArgs),

    /// Run the scripted session and print events and process flows as JSON
    Export,
}

#[derive(Args, Debug)]
struct DemoArgs {
    /// Report format
    #[arg(long, short = 'f', default_value = "md")]
    format: OutputFormat,

    /// Also save the Markdown report into this directory
    #[arg(long)]
    out: Option<PathBuf>,

    /// Also copy the Markdown report to the system clipboard
    #[arg(long)]
    clipboard: bool,
}

#[derive(Args, Debug)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the resolved configuration
    Show,
    /// Load and validate the configuration
    Validate,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.global.quiet {
        Some(LogLevel::Error)
    } else {
        match cli.global.verbose {
            0 => None,
            1 => Some(LogLevel::Debug),
            _ => Some(LogLevel::Trace),
        }
    };
    let log_config = LogConfig::from_env(level, cli.global.log_format);
    let console = ConsoleBuffer::new(DEFAULT_CONSOLE_CAPACITY);
    init_logging(&log_config, Some(console.layer()));

    let exit_code = match &cli.command {
        Commands::Demo(args) => run_demo(&cli.global, args, console),
        Commands::Config(args) => match args.command {
            ConfigCommands::Show => run_config_show(&cli.global),
            ConfigCommands::Validate => run_config_validate(&cli.global),
        },
        Commands::Export => run_export(&cli.global, console),
    };

    std::process::exit(exit_code.as_i32());
}

/// Print `err` for humans on stderr and pick the exit code.
fn report_error(err: &Error) -> ExitCode {
    error!(target: targets::CLI, code = err.code(), error = %err, "command failed");
    eprintln!("{}", format_error_human(err, std::io::stderr().is_terminal()));
    ExitCode::from(err)
}

fn config_error(e: ConfigError) -> Error {
    match e {
        ConfigError::IoError { source, .. } => Error::Io(source),
        ConfigError::ValidationError(v) => Error::InvalidConfig(v.to_string()),
        other => Error::Config(other.to_string()),
    }
}

fn load(global: &GlobalOpts) -> Result<ResolvedConfig, ExitCode> {
    load_config(global.config.as_deref()).map_err(|e| report_error(&config_error(e)))
}

fn start_runtime(global: &GlobalOpts, console: ConsoleBuffer) -> Result<TelemetryRuntime, ExitCode> {
    let resolved = load(global)?;
    info!(
        target: targets::CLI,
        source = %resolved.source,
        path = ?resolved.path,
        "configuration loaded"
    );
    let rt = TelemetryRuntime::new(resolved.config, console);
    rt.start();
    Ok(rt)
}

fn print_json(value: &serde_json::Value) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(text) => {
            println!("{}", text);
            ExitCode::Clean
        }
        Err(e) => {
            error!(target: targets::CLI, error = %e, "serialization failed");
            ExitCode::InternalError
        }
    }
}

fn run_demo(global: &GlobalOpts, args: &DemoArgs, console: ConsoleBuffer) -> ExitCode {
    let rt = match start_runtime(global, console) {
        Ok(rt) => rt,
        Err(code) => return code,
    };
    let report = run_demo_session(&rt);
    rt.shutdown();

    match ReportGenerator::default_config().render(&report, args.format) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            error!(target: targets::CLI, error = %e, "report rendering failed");
            return ExitCode::InternalError;
        }
    }

    let mut exit_code = ExitCode::Clean;
    if let Some(dir) = &args.out {
        match download_as_markdown(&report, dir) {
            Ok(path) => eprintln!("Report saved to {}", path.display()),
            Err(e) => {
                exit_code = report_error(&Error::ExportFailed {
                    path: dir.join(report.file_name()),
                    reason: e.to_string(),
                });
            }
        }
    }
    if args.clipboard {
        if copy_to_clipboard(&report, &SystemClipboard::new()) {
            eprintln!("Report copied to clipboard");
        } else {
            exit_code = report_error(&Error::ClipboardUnavailable(
                "no clipboard helper accepted the report".to_string(),
            ));
        }
    }
    exit_code
}

fn run_export(global: &GlobalOpts, console: ConsoleBuffer) -> ExitCode {
    let rt = match start_runtime(global, console) {
        Ok(rt) => rt,
        Err(code) => return code,
    };
    run_demo_session(&rt);
    rt.shutdown();

    print_json(&serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "events": rt.core().export(),
        "flows": rt.tracker().export_data(),
    }))
}

fn run_config_show(global: &GlobalOpts) -> ExitCode {
    let resolved = match load(global) {
        Ok(r) => r,
        Err(code) => return code,
    };
    print_json(&serde_json::json!({
        "schema_version": SCHEMA_VERSION,
        "source": resolved.source.to_string(),
        "path": resolved.path.as_ref().map(|p| p.display().to_string()),
        "config": resolved.config,
    }))
}

fn run_config_validate(global: &GlobalOpts) -> ExitCode {
    match load(global) {
        Ok(resolved) => {
            match &resolved.path {
                Some(path) => println!("Configuration valid: {} ({})", path.display(), resolved.source),
                None => println!("Configuration valid: built-in defaults"),
            }
            ExitCode::Clean
        }
        Err(code) => code,
    }
}
