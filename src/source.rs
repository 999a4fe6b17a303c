//! Lazy, cancellable record source over a newline-delimited input
//!
//! [`RecordSource`] reads one line per `next()` call, skips blank lines, and
//! parses the rest with a [`RecordParser`]. Parse failures are surfaced as
//! items so the consumer decides whether to skip or abort; they are never
//! replaced by placeholder records.

use std::io::{self, BufRead, ErrorKind};
use std::path::Path;

use crate::cancel::CancelToken;
use crate::decompression::{maybe_decompress, DecompressionReader};
use crate::error::{ParseError, PipelineError, SourceError};
use crate::parsers::{JsonlParser, RecordParser};
use crate::record::{AuthStatus, Record};

/// Counters kept by the source while it reads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStats {
    pub lines_read: usize,
    pub blank_lines: usize,
    pub parse_errors: usize,
}

pub struct RecordSource {
    reader: Box<dyn BufRead + Send>,
    parser: Box<dyn RecordParser>,
    cancel: CancelToken,
    buffer: Vec<u8>,
    line_num: usize,
    stats: SourceStats,
    finished: bool,
    cancelled: bool,
}

impl std::fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSource")
            .field("line_num", &self.line_num)
            .field("stats", &self.stats)
            .field("finished", &self.finished)
            .finish()
    }
}

impl RecordSource {
    /// Open a file (or `-` for stdin) with the JSON lines parser
    pub fn open<P: AsRef<Path>>(path: P, cancel: CancelToken) -> Result<Self, PipelineError> {
        Self::open_with_parser(path, Box::new(JsonlParser::new()), cancel)
    }

    pub fn open_with_parser<P: AsRef<Path>>(
        path: P,
        parser: Box<dyn RecordParser>,
        cancel: CancelToken,
    ) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        if path.as_os_str() == "-" {
            let stdin =
                maybe_decompress(io::stdin()).map_err(|e| PipelineError::file_open(path, e))?;
            return Ok(Self::from_reader(stdin, parser, cancel));
        }

        let reader =
            DecompressionReader::open(path).map_err(|e| PipelineError::file_open(path, e))?;
        tracing::debug!(path = %path.display(), encoding = reader.kind(), "opened input");
        Ok(Self::from_reader(reader, parser, cancel))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(
        reader: R,
        parser: Box<dyn RecordParser>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            parser,
            cancel,
            buffer: Vec::with_capacity(256),
            line_num: 0,
            stats: SourceStats::default(),
            finished: false,
            cancelled: false,
        }
    }

    /// Number of the last line read, 1-based; 0 before the first read
    pub fn line_number(&self) -> usize {
        self.line_num
    }

    pub fn stats(&self) -> &SourceStats {
        &self.stats
    }

    /// True if iteration stopped because the cancellation token tripped
    pub fn was_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Iterator for RecordSource {
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }
            if self.cancel.is_cancelled() {
                self.finished = true;
                self.cancelled = true;
                return None;
            }

            self.buffer.clear();
            match self.reader.read_until(b'\n', &mut self.buffer) {
                Ok(0) => {
                    self.finished = true;
                    return None;
                }
                Ok(_) => {
                    self.line_num += 1;
                    self.stats.lines_read += 1;

                    let line = match std::str::from_utf8(&self.buffer) {
                        Ok(text) => text.trim_end_matches(&['\r', '\n'][..]),
                        Err(e) => {
                            self.stats.parse_errors += 1;
                            return Some(Err(SourceError::Parse(ParseError {
                                line: self.line_num,
                                message: format!("invalid UTF-8: {}", e),
                            })));
                        }
                    };

                    if line.trim().is_empty() {
                        self.stats.blank_lines += 1;
                        continue;
                    }

                    return match self.parser.parse(line) {
                        Ok(record) => Some(Ok(record)),
                        Err(e) => {
                            self.stats.parse_errors += 1;
                            Some(Err(SourceError::Parse(ParseError {
                                line: self.line_num,
                                message: format!("{:#}", e),
                            })))
                        }
                    };
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(SourceError::Io(e)));
                }
            }
        }
    }
}

/// Yields the first `limit` records whose auth status is `status`
///
/// Errors from the inner iterator pass through untouched. Once the limit is
/// reached no further input is read.
pub struct AuthFilter<I> {
    inner: I,
    status: AuthStatus,
    remaining: Option<usize>,
}

pub fn filter_by_auth<I>(records: I, status: AuthStatus, limit: Option<usize>) -> AuthFilter<I>
where
    I: Iterator<Item = Result<Record, SourceError>>,
{
    AuthFilter {
        inner: records,
        status,
        remaining: limit,
    }
}

impl<I> Iterator for AuthFilter<I>
where
    I: Iterator<Item = Result<Record, SourceError>>,
{
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }

        for item in self.inner.by_ref() {
            match item {
                Ok(record) => {
                    // A mistyped auth field never matches
                    if record.auth_status().ok() != Some(self.status) {
                        continue;
                    }
                    if let Some(remaining) = self.remaining.as_mut() {
                        *remaining -= 1;
                    }
                    return Some(Ok(record));
                }
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}
