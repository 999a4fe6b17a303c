// Command-line interface definitions

use clap::Parser;
use std::time::Duration;

use crate::parallel::{ParseErrorPolicy, DEFAULT_BATCH_SIZE, DEFAULT_WORKERS};
use crate::record::AuthStatus;
use crate::report::OutputFormat;

/// Auth status accepted by --auth
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthArg {
    LoggedIn,
    LoggedOut,
}

impl AuthArg {
    pub fn status(self) -> AuthStatus {
        match self {
            AuthArg::LoggedIn => AuthStatus::LoggedIn,
            AuthArg::LoggedOut => AuthStatus::LoggedOut,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ndstat")]
#[command(about = "Streaming aggregate statistics over newline-delimited JSON")]
#[command(
    long_about = "Streaming aggregate statistics over newline-delimited JSON\n\nReads one JSON object per line, groups records into batches, and folds them on a pool of worker threads. Reports record counts by 'auth' status and the average 'length'.\n\nCOMMON EXAMPLES:\n  ndstat events.jsonl\n  ndstat events.jsonl.gz -j 8 --stats\n  zcat events.jsonl.gz | ndstat - -F json\n  ndstat events.jsonl --auth logged-in --take 10"
)]
#[command(version)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Input file (stdin if not specified, or use "-" to explicitly specify stdin)
    pub file: Option<String>,

    /// Records per batch handed to a worker
    #[arg(
        short = 'b',
        long = "batch-size",
        default_value_t = DEFAULT_BATCH_SIZE,
        help_heading = "Performance Options"
    )]
    pub batch_size: usize,

    /// Number of worker threads (0 = one per CPU)
    #[arg(
        short = 'j',
        long = "workers",
        visible_alias = "threads",
        default_value_t = DEFAULT_WORKERS,
        help_heading = "Performance Options"
    )]
    pub workers: usize,

    /// Batches allowed in flight between reader and workers (default: worker count)
    #[arg(long = "queue-capacity", help_heading = "Performance Options")]
    pub queue_capacity: Option<usize>,

    /// What to do with lines that are not JSON objects
    #[arg(
        long = "on-error",
        value_enum,
        default_value = "skip",
        help_heading = "Error Handling"
    )]
    pub on_error: ParseErrorPolicy,

    /// Stop after this long and report what was aggregated so far (e.g. 30s, 5m)
    #[arg(long = "timeout", value_parser = humantime::parse_duration, help_heading = "Error Handling")]
    pub timeout: Option<Duration>,

    /// Increase diagnostic output (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Error Handling")]
    pub verbose: u8,

    /// Only report errors on stderr
    #[arg(short = 'q', long = "quiet", help_heading = "Error Handling")]
    pub quiet: bool,

    /// Report format
    #[arg(
        short = 'F',
        long = "output-format",
        value_enum,
        default_value = "table",
        help_heading = "Output Options"
    )]
    pub output_format: OutputFormat,

    /// Print processing statistics to stderr
    #[arg(short = 's', long = "stats", help_heading = "Output Options")]
    pub stats: bool,

    /// Disable processing statistics explicitly (default: off)
    #[arg(long = "no-stats", help_heading = "Output Options", overrides_with = "stats")]
    pub no_stats: bool,

    /// Disable emoji prefixes
    #[arg(long = "no-emoji", help_heading = "Output Options")]
    pub no_emoji: bool,

    /// Print matching records as JSON lines instead of aggregating
    #[arg(long = "auth", value_enum, help_heading = "Filtering Options")]
    pub auth: Option<AuthArg>,

    /// Stop after printing N matching records (requires --auth)
    #[arg(short = 'n', long = "take", requires = "auth", help_heading = "Filtering Options")]
    pub take: Option<usize>,

    /// Specify custom configuration file path
    #[arg(long = "config-file", help_heading = "Configuration Options")]
    pub config_file: Option<String>,

    /// Ignore configuration file
    #[arg(long = "ignore-config", help_heading = "Configuration Options")]
    pub ignore_config: bool,

    /// Show configuration file and exit
    #[arg(long = "show-config", help_heading = "Configuration Options")]
    pub show_config: bool,
}

impl Cli {
    /// Resolve inverted boolean flags to their actual values
    pub fn resolve_boolean_flags(&mut self) {
        if self.no_stats {
            self.stats = false;
        }
    }

    /// Input path, with `-` standing for stdin
    pub fn input(&self) -> &str {
        self.file.as_deref().unwrap_or("-")
    }
}
