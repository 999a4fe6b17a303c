use serde::Serialize;
use std::time::Duration;

/// Statistics collected while running the pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingStats {
    pub lines_read: usize,
    pub blank_lines: usize,
    pub parse_errors: usize,
    pub batches_pushed: u64,
    pub records_parsed: u64,
    pub batches_merged: u64,
    /// Batches pushed but never merged (worker faults or cancellation)
    pub batches_lost: u64,
    pub worker_faults: usize,
    pub workers: usize,
    #[serde(serialize_with = "serialize_millis", rename = "processing_time_ms")]
    pub processing_time: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

impl ProcessingStats {
    /// Lines per second over the whole run, 0 when no time was measured
    pub fn throughput(&self) -> f64 {
        let secs = self.processing_time.as_secs_f64();
        if secs > 0.0 {
            self.lines_read as f64 / secs
        } else {
            0.0
        }
    }

    pub fn format_stats(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Lines processed: {} total, {} blank, {} parse errors",
            self.lines_read, self.blank_lines, self.parse_errors
        ));
        output.push_str(&format!(
            "; Batches: {} pushed, {} merged",
            self.batches_pushed, self.batches_merged
        ));

        if self.batches_lost > 0 {
            output.push_str(&format!(", {} lost", self.batches_lost));
        }

        if self.worker_faults > 0 {
            output.push_str(&format!(", {} worker faults", self.worker_faults));
        }

        output.push_str(&format!(", {} workers", self.workers));

        let processing_time_ms = self.processing_time.as_millis();
        output.push_str(&format!(" in {}ms", processing_time_ms));

        if processing_time_ms > 0 && self.lines_read > 0 {
            output.push_str(&format!(" ({:.0} lines/s)", self.throughput()));
        }

        output
    }
}
