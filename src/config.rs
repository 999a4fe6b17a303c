use std::time::Duration;

use crate::cli::Cli;
use crate::parallel::{ParallelConfig, ParseErrorPolicy};
use crate::record::AuthStatus;
use crate::report::OutputFormat;

/// Main configuration struct for ndstat
#[derive(Debug, Clone)]
pub struct StatConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub performance: PerformanceConfig,
    /// Set when records should be filtered and printed instead of aggregated
    pub filter: Option<FilterConfig>,
    pub timeout: Option<Duration>,
}

/// Input configuration
#[derive(Debug, Clone)]
pub struct InputConfig {
    /// Path to read, `-` for stdin
    pub file: String,
    pub on_error: ParseErrorPolicy,
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub stats: bool,
    pub use_emoji: bool,
    pub quiet: bool,
    pub verbose: u8,
}

/// Performance configuration
#[derive(Debug, Clone)]
pub struct PerformanceConfig {
    /// 0 means one worker per CPU
    pub workers: usize,
    pub batch_size: usize,
    pub queue_capacity: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    pub status: AuthStatus,
    pub take: Option<usize>,
}

impl StatConfig {
    /// Create configuration from CLI arguments
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            input: InputConfig {
                file: cli.input().to_string(),
                on_error: cli.on_error,
            },
            output: OutputConfig {
                format: cli.output_format,
                stats: cli.stats,
                use_emoji: crate::tty::should_use_emoji(cli.no_emoji),
                quiet: cli.quiet,
                verbose: cli.verbose,
            },
            performance: PerformanceConfig {
                workers: cli.workers,
                batch_size: cli.batch_size,
                queue_capacity: cli.queue_capacity,
            },
            filter: cli.auth.map(|auth| FilterConfig {
                status: auth.status(),
                take: cli.take,
            }),
            timeout: cli.timeout,
        }
    }

    /// Get effective worker count with defaults
    pub fn effective_workers(&self) -> usize {
        if self.performance.workers == 0 {
            num_cpus::get()
        } else {
            self.performance.workers
        }
    }

    pub fn effective_queue_capacity(&self) -> usize {
        self.performance
            .queue_capacity
            .unwrap_or_else(|| self.effective_workers())
    }

    pub fn parallel_config(&self) -> ParallelConfig {
        ParallelConfig {
            num_workers: self.effective_workers(),
            batch_size: self.performance.batch_size,
            queue_capacity: Some(self.effective_queue_capacity()),
            on_parse_error: self.input.on_error,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.performance.batch_size == 0 {
            return Err("--batch-size must be greater than zero".to_string());
        }
        if self.performance.queue_capacity == Some(0) {
            return Err("--queue-capacity must be greater than zero".to_string());
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err("--timeout requires a duration greater than zero".to_string());
        }
        Ok(())
    }

    /// Default `tracing` filter directive for the verbosity flags
    pub fn log_directive(&self) -> &'static str {
        if self.output.quiet {
            return "error";
        }
        match self.output.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    pub fn format_error_message(&self, message: &str) -> String {
        format_error_message(message, self.output.use_emoji)
    }

    pub fn format_stats_message(&self, message: &str) -> String {
        let prefix = if self.output.use_emoji { "📈" } else { "ndstat:" };
        format!("{} {}", prefix, message)
    }
}

pub fn format_error_message(message: &str, use_emoji: bool) -> String {
    let prefix = if use_emoji { "⚠️ " } else { "ndstat:" };
    format!("{} {}", prefix, message)
}

/// Error message formatting for code paths without a config at hand
pub fn format_error_message_auto(message: &str) -> String {
    format_error_message(message, crate::tty::should_use_emoji(false))
}
