// tests/common/mod.rs
// Shared test utilities for integration tests
#![allow(dead_code)]

use std::io::{ErrorKind, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use tempfile::NamedTempFile;

fn ndstat_command(args: &[&str]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ndstat"));
    // Keep a developer's own .ndstatrc out of the results
    cmd.arg("--ignore-config")
        .args(args)
        .env_remove("RUST_LOG")
        .env("NO_EMOJI", "1");
    cmd
}

/// Run ndstat with given arguments and input via stdin
pub fn run_ndstat_with_input(args: &[&str], input: &str) -> (String, String, i32) {
    run_ndstat_with_bytes(args, input.as_bytes())
}

/// Run ndstat with raw bytes (e.g. compressed data) on stdin
pub fn run_ndstat_with_bytes(args: &[&str], input: &[u8]) -> (String, String, i32) {
    let mut child = ndstat_command(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start ndstat");

    if let Some(mut stdin) = child.stdin.take() {
        // ndstat may exit (usage errors) before reading its input
        match stdin.write_all(input) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
            Err(e) => panic!("Failed to write to stdin: {}", e),
        }
    }

    let output = child.wait_with_output().expect("Failed to read output");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Start ndstat on an input that never ends
///
/// The feeder thread keeps writing records until ndstat stops reading and
/// its end of the pipe goes away.
pub fn spawn_ndstat_with_endless_input(args: &[&str]) -> (Child, thread::JoinHandle<()>) {
    let mut child = ndstat_command(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to start ndstat");

    let mut stdin = child.stdin.take().expect("stdin is piped");
    let feeder = thread::spawn(move || {
        let chunk = sample_records(1_000);
        while stdin.write_all(chunk.as_bytes()).is_ok() {}
    });
    (child, feeder)
}

/// Wait for a spawned ndstat and collect (stdout, stderr, exit code)
pub fn wait_for_ndstat(child: Child) -> (String, String, i32) {
    let output = child.wait_with_output().expect("Failed to read output");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Run ndstat on a temporary file holding `file_content`
pub fn run_ndstat_with_file(args: &[&str], file_content: &str) -> (String, String, i32) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file
        .write_all(file_content.as_bytes())
        .expect("Failed to write to temp file");

    let mut full_args = args.to_vec();
    full_args.push(temp_file.path().to_str().unwrap());
    run_ndstat(&full_args)
}

/// Run ndstat with stdin closed
pub fn run_ndstat(args: &[&str]) -> (String, String, i32) {
    let output = ndstat_command(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .expect("Failed to execute ndstat");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Parse the JSON report printed with `-F json`
pub fn parse_report(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout).expect("report should be valid JSON")
}

/// `n` records alternating logged in / logged out, each with length `i`
pub fn sample_records(n: usize) -> String {
    (0..n)
        .map(|i| {
            let auth = if i % 2 == 0 { "Logged In" } else { "Logged Out" };
            format!("{{\"auth\":\"{}\",\"length\":{}}}\n", auth, i)
        })
        .collect()
}
