//! Line parsers that turn one input line into a [`Record`]

pub mod jsonl;

pub use jsonl::JsonlParser;

use crate::record::Record;
use anyhow::Result;

/// Parse a single input line into a record
///
/// Implementations must be shareable across the reader thread; a parser that
/// holds state should do so behind its own synchronization.
pub trait RecordParser: Send + Sync {
    fn parse(&self, line: &str) -> Result<Record>;
}
