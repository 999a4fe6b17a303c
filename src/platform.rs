use anyhow::Result;
use std::io::{self, Write};
use std::process;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;

#[cfg(unix)]
use signal_hook::{consts::SIGINT, consts::SIGTERM, iterator::Signals};

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

use crate::cancel::CancelToken;

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalPipe = 141, // 128 + SIGPIPE (13)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

const NO_SIGNAL: u8 = 0;
const BY_SIGINT: u8 = 1;
const BY_SIGTERM: u8 = 2;

/// First termination signal received, if any
static TERMINATED_BY: AtomicU8 = AtomicU8::new(NO_SIGNAL);

/// Trips a [`CancelToken`] on SIGINT/SIGTERM; a second signal exits at once
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    pub fn new(cancel: CancelToken) -> Result<Self> {
        #[cfg(unix)]
        {
            let mut signals = Signals::new([SIGINT, SIGTERM])?;

            let handle = thread::Builder::new()
                .name("ndstat-signals".to_string())
                .spawn(move || {
                    let mut shutdown_count = 0;
                    for sig in signals.forever() {
                        let (marker, code) = match sig {
                            SIGINT => (BY_SIGINT, ExitCode::SignalInt),
                            SIGTERM => (BY_SIGTERM, ExitCode::SignalTerm),
                            _ => continue,
                        };
                        shutdown_count += 1;
                        if shutdown_count > 1 {
                            code.exit();
                        }
                        let _ = TERMINATED_BY.compare_exchange(
                            NO_SIGNAL,
                            marker,
                            Ordering::SeqCst,
                            Ordering::SeqCst,
                        );
                        tracing::warn!(signal = sig, "received signal, finishing with a partial result");
                        cancel.cancel();
                    }
                })?;

            Ok(SignalHandler { _handle: handle })
        }

        #[cfg(windows)]
        {
            let term_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
            flag::register(SIGINT, std::sync::Arc::clone(&term_flag))?;

            let handle = thread::Builder::new()
                .name("ndstat-signals".to_string())
                .spawn(move || {
                    let mut shutdown_count = 0;
                    loop {
                        thread::sleep(std::time::Duration::from_millis(100));
                        if term_flag.swap(false, Ordering::Relaxed) {
                            shutdown_count += 1;
                            if shutdown_count > 1 {
                                ExitCode::SignalInt.exit();
                            }
                            TERMINATED_BY.store(BY_SIGINT, Ordering::SeqCst);
                            tracing::warn!("received Ctrl-C, finishing with a partial result");
                            cancel.cancel();
                        }
                    }
                })?;

            Ok(SignalHandler { _handle: handle })
        }
    }

    /// Exit code for the signal that cancelled the run, if one did
    pub fn exit_code() -> Option<ExitCode> {
        match TERMINATED_BY.load(Ordering::SeqCst) {
            BY_SIGINT => Some(ExitCode::SignalInt),
            BY_SIGTERM => Some(ExitCode::SignalTerm),
            _ => None,
        }
    }
}

/// Safe wrapper for writing to stdout that handles broken pipes
pub struct SafeStdout {
    stdout: io::Stdout,
}

impl Default for SafeStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeStdout {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }

    /// Write text to stdout, exiting quietly if the reader went away
    pub fn write_str(&mut self, data: &str) -> Result<()> {
        match self.stdout.write_all(data.as_bytes()) {
            Ok(()) => Ok(()),
            Err(e) if Self::is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            Err(e) => Err(anyhow::anyhow!("Failed to write to stdout: {}", e)),
        }
    }

    pub fn writeln(&mut self, data: &str) -> Result<()> {
        self.write_str(data)?;
        self.write_str("\n")
    }

    pub fn flush(&mut self) -> Result<()> {
        match self.stdout.flush() {
            Ok(()) => Ok(()),
            Err(e) if Self::is_broken_pipe(&e) => ExitCode::SignalPipe.exit(),
            Err(e) => Err(anyhow::anyhow!("Failed to flush stdout: {}", e)),
        }
    }

    fn is_broken_pipe(e: &io::Error) -> bool {
        #[cfg(unix)]
        {
            e.kind() == io::ErrorKind::BrokenPipe
        }
        #[cfg(windows)]
        {
            e.kind() == io::ErrorKind::BrokenPipe
                || e.raw_os_error() == Some(232) // ERROR_NO_DATA
                || e.raw_os_error() == Some(109) // ERROR_BROKEN_PIPE
        }
    }
}

/// Safe wrapper for writing to stderr
pub struct SafeStderr {
    stderr: io::Stderr,
}

impl Default for SafeStderr {
    fn default() -> Self {
        Self::new()
    }
}

impl SafeStderr {
    pub fn new() -> Self {
        Self {
            stderr: io::stderr(),
        }
    }

    /// Write a line to stderr; there is nowhere left to report a failure
    pub fn writeln(&mut self, data: &str) {
        if writeln!(self.stderr, "{}", data).is_err() {
            ExitCode::GeneralError.exit();
        }
    }
}
