use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use ndstat::cancel::CancelToken;
use ndstat::cli::Cli;
use ndstat::config::{format_error_message_auto, FilterConfig, StatConfig};
use ndstat::config_file::ConfigFile;
use ndstat::error::{PipelineError, SourceError};
use ndstat::parallel::{ParallelProcessor, ParseErrorPolicy, RunOutcome};
use ndstat::platform::{ExitCode, SafeStderr, SafeStdout, SignalHandler};
use ndstat::report;
use ndstat::source::{filter_by_auth, RecordSource};

fn main() {
    let mut stderr = SafeStderr::new();

    let cli = process_args_with_config(&mut stderr);
    let config = StatConfig::from_cli(&cli);

    setup_logging(&config);

    if let Err(e) = config.validate() {
        stderr.writeln(&config.format_error_message(&format!("Error: {}", e)));
        ExitCode::InvalidUsage.exit();
    }

    let cancel = CancelToken::new();

    let _signal_handler = match SignalHandler::new(cancel.clone()) {
        Ok(handler) => handler,
        Err(e) => {
            stderr.writeln(&config.format_error_message(&format!(
                "Failed to initialize signal handling: {}",
                e
            )));
            ExitCode::GeneralError.exit();
        }
    };

    if let Some(timeout) = config.timeout {
        if let Err(e) = cancel.cancel_after(timeout) {
            stderr.writeln(&config.format_error_message(&format!(
                "Failed to start timeout timer: {}",
                e
            )));
            ExitCode::GeneralError.exit();
        }
    }

    let code = match config.filter {
        Some(filter) => run_filter(&config, filter, &cancel, &mut stderr),
        None => run_aggregate(&config, &cancel, &mut stderr),
    };
    code.exit();
}

fn setup_logging(config: &StatConfig) {
    // RUST_LOG wins over the verbosity flags
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ndstat::tty::is_stderr_tty())
        .with_target(false)
        .with_thread_names(true)
        .init();
}

fn run_aggregate(config: &StatConfig, cancel: &CancelToken, stderr: &mut SafeStderr) -> ExitCode {
    let processor = ParallelProcessor::new(config.parallel_config());

    let outcome = match processor.run(&config.input.file, cancel) {
        Ok(outcome) => outcome,
        Err(e) => {
            stderr.writeln(&config.format_error_message(&describe_error(&e)));
            return ExitCode::GeneralError;
        }
    };

    let rendered = match report::render(&outcome, config.output.format) {
        Ok(text) => text,
        Err(e) => {
            stderr.writeln(&config.format_error_message(&format!("Failed to render report: {}", e)));
            return ExitCode::GeneralError;
        }
    };

    let mut stdout = SafeStdout::new();
    if let Err(e) = stdout.write_str(&rendered).and_then(|_| stdout.flush()) {
        stderr.writeln(&config.format_error_message(&e.to_string()));
        return ExitCode::GeneralError;
    }

    print_summary(config, &outcome, stderr);
    exit_code_for(&outcome)
}

fn print_summary(config: &StatConfig, outcome: &RunOutcome, stderr: &mut SafeStderr) {
    if config.output.quiet {
        return;
    }

    if config.output.stats {
        stderr.writeln(&config.format_stats_message(&outcome.stats.format_stats()));
    }

    for fault in &outcome.faults {
        stderr.writeln(&config.format_error_message(&fault.to_string()));
    }

    if outcome.stats.parse_errors > 0 && config.input.on_error == ParseErrorPolicy::Skip {
        stderr.writeln(&config.format_error_message(&format!(
            "skipped {} unparsable line(s)",
            outcome.stats.parse_errors
        )));
    }
}

fn exit_code_for(outcome: &RunOutcome) -> ExitCode {
    if let Some(code) = SignalHandler::exit_code() {
        return code;
    }
    if !outcome.faults.is_empty() {
        return ExitCode::GeneralError;
    }
    ExitCode::Success
}

/// Print records with the requested auth status as JSON lines
fn run_filter(
    config: &StatConfig,
    filter: FilterConfig,
    cancel: &CancelToken,
    stderr: &mut SafeStderr,
) -> ExitCode {
    match print_filtered(config, filter, cancel) {
        Ok(()) => SignalHandler::exit_code().unwrap_or(ExitCode::Success),
        Err(e) => {
            let message = match e.downcast_ref::<PipelineError>() {
                Some(pipeline_error) => describe_error(pipeline_error),
                None => format!("{:#}", e),
            };
            stderr.writeln(&config.format_error_message(&message));
            ExitCode::GeneralError
        }
    }
}

fn print_filtered(config: &StatConfig, filter: FilterConfig, cancel: &CancelToken) -> Result<()> {
    let source = RecordSource::open(&config.input.file, cancel.clone())?;
    let mut stdout = SafeStdout::new();
    let mut printed = 0usize;

    for item in filter_by_auth(source, filter.status, filter.take) {
        match item {
            Ok(record) => {
                stdout.writeln(&serde_json::to_string(&record)?)?;
                printed += 1;
            }
            Err(SourceError::Parse(e)) if config.input.on_error == ParseErrorPolicy::Skip => {
                tracing::warn!(line = e.line, error = %e.message, "skipping unparsable line");
            }
            Err(e) => return Err(PipelineError::from(e).into()),
        }
    }

    stdout.flush()?;
    tracing::info!(printed, status = filter.status.as_str(), "filter finished");
    Ok(())
}

fn describe_error(error: &PipelineError) -> String {
    match error {
        PipelineError::FileOpen { .. } => format!("Error: {}", error),
        PipelineError::Parse(_) => format!(
            "Error: {} (use --on-error skip to ignore unparsable lines)",
            error
        ),
        _ => format!("Pipeline error: {}", error),
    }
}

/// Extract --config-file before clap runs so defaults can be loaded
fn extract_config_file_arg(args: &[String]) -> Option<String> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config-file" {
            return iter.next().cloned();
        }
        if let Some(path) = arg.strip_prefix("--config-file=") {
            return Some(path.to_string());
        }
    }
    None
}

/// Process command line arguments with config file support
fn process_args_with_config(stderr: &mut SafeStderr) -> Cli {
    let raw_args: Vec<String> = std::env::args().collect();
    let config_file_path = extract_config_file_arg(&raw_args);

    if raw_args.iter().any(|arg| arg == "--show-config") {
        ConfigFile::show_config(config_file_path.as_deref());
        ExitCode::Success.exit();
    }

    let ignore_config = raw_args.iter().any(|arg| arg == "--ignore-config");

    let processed_args = if ignore_config {
        raw_args
    } else {
        match ConfigFile::load_with_custom_path(config_file_path.as_deref()) {
            Ok(config_file) => match config_file.process_args(raw_args) {
                Ok(processed) => processed,
                Err(e) => {
                    stderr.writeln(&format_error_message_auto(&format!("Config error: {:#}", e)));
                    ExitCode::InvalidUsage.exit();
                }
            },
            Err(e) => {
                stderr.writeln(&format_error_message_auto(&format!(
                    "Config file error: {:#}",
                    e
                )));
                ExitCode::InvalidUsage.exit();
            }
        }
    };

    let mut cli = Cli::parse_from(processed_args);
    cli.resolve_boolean_flags();

    // Show usage instead of waiting on an interactive terminal
    if ndstat::tty::is_stdin_tty() && cli.file.is_none() {
        println!("{}", Cli::command().render_usage());
        println!("Streaming aggregate statistics over newline-delimited JSON");
        println!("Try 'ndstat --help' for more information.");
        ExitCode::Success.exit();
    }

    cli
}
