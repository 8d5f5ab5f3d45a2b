//! Purpose: Turn CSV text into a header plus rows of nullable string fields.
//! Exports: `CsvReader`, `Row`.
//! Role: Sequential row source behind `CsvCursor`; tokenizing is delegated to the `csv` crate.
//! Invariants: Ignored and skipped lines are removed before tokenizing (physical-line granularity).
//! Invariants: Records may carry a varying number of fields; callers treat missing cells as null.
//! Invariants: Fully empty lines never produce records.
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};

use tracing::trace;

use crate::core::config::CsvConfig;
use crate::core::error::{Error, ErrorKind};

/// One data row; `None` marks a logical null.
pub type Row = Vec<Option<String>>;

pub struct CsvReader<R: Read> {
    inner: csv::Reader<LineFilter<BufReader<R>>>,
    config: CsvConfig,
    record: csv::StringRecord,
    records_read: u64,
}

impl<R: Read> CsvReader<R> {
    pub fn new(source: R) -> Result<Self, Error> {
        Self::with_config(source, CsvConfig::default())
    }

    pub fn with_config(source: R, config: CsvConfig) -> Result<Self, Error> {
        config.validate()?;
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(false)
            .flexible(true)
            .delimiter(config.delimiter_byte()?);
        let quote = config.quote_byte()?;
        let escape = config.escape_byte()?;
        match quote {
            Some(quote) => {
                builder.quote(quote).quoting(true);
            }
            None => {
                builder.quoting(false);
            }
        }
        if let Some(escape) = escape {
            builder.escape(Some(escape)).double_quote(false);
        }

        let quoting = QuoteState::new(quote, escape);
        let filter = LineFilter::new(BufReader::new(source), config.clone(), quoting);
        Ok(Self {
            inner: builder.from_reader(filter),
            config,
            record: csv::StringRecord::new(),
            records_read: 0,
        })
    }

    pub fn config(&self) -> &CsvConfig {
        &self.config
    }

    /// Number of records (header included) tokenized so far.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Reads the first record as column names. Fails with `Io` on empty input.
    pub fn read_header(&mut self) -> Result<Vec<String>, Error> {
        if !self.read_record()? {
            return Err(Error::new(ErrorKind::Io)
                .with_message("csv header is missing")
                .with_hint("The input is empty or contains only ignored lines."));
        }
        Ok(self.record.iter().map(|name| name.trim().to_string()).collect())
    }

    /// Reads the next record, mapping null sentinels to `None`. `Ok(None)` at end of input.
    pub fn read_values(&mut self) -> Result<Option<Row>, Error> {
        if !self.read_record()? {
            return Ok(None);
        }
        let config = &self.config;
        Ok(Some(
            self.record
                .iter()
                .map(|field| config.normalize_field(field))
                .collect(),
        ))
    }

    fn read_record(&mut self) -> Result<bool, Error> {
        let found = self.inner.read_record(&mut self.record)?;
        if found {
            self.records_read += 1;
        }
        Ok(found)
    }
}

/// Tracks whether the byte stream is inside a quoted field across physical lines.
#[derive(Clone, Copy, Debug)]
struct QuoteState {
    quote: Option<u8>,
    escape: Option<u8>,
    in_quotes: bool,
    escaped: bool,
}

impl QuoteState {
    fn new(quote: Option<u8>, escape: Option<u8>) -> Self {
        Self {
            quote,
            escape,
            in_quotes: false,
            escaped: false,
        }
    }

    /// Doubled quotes toggle twice, which leaves the state unchanged.
    fn advance(&mut self, line: &[u8]) {
        let Some(quote) = self.quote else {
            return;
        };
        for &byte in line {
            if self.escaped {
                self.escaped = false;
            } else if self.in_quotes && Some(byte) == self.escape && byte != quote {
                self.escaped = true;
            } else if byte == quote {
                self.in_quotes = !self.in_quotes;
            }
        }
    }
}

/// Drops leading, blank and pattern-matched lines before they reach the tokenizer.
/// Lines that continue a quoted field are always passed through.
struct LineFilter<R> {
    source: R,
    config: CsvConfig,
    quoting: QuoteState,
    pending: VecDeque<u8>,
    line: Vec<u8>,
    lines_seen: usize,
    eof: bool,
}

impl<R: BufRead> LineFilter<R> {
    fn new(source: R, config: CsvConfig, quoting: QuoteState) -> Self {
        Self {
            source,
            config,
            quoting,
            pending: VecDeque::new(),
            line: Vec::new(),
            lines_seen: 0,
            eof: false,
        }
    }

    fn fill(&mut self) -> io::Result<()> {
        while self.pending.is_empty() && !self.eof {
            self.line.clear();
            let n = self.source.read_until(b'\n', &mut self.line)?;
            if n == 0 {
                self.eof = true;
                break;
            }
            self.lines_seen += 1;
            if self.lines_seen <= self.config.skip_lines() {
                trace!(line = self.lines_seen, "skipping leading line");
                continue;
            }
            if !self.quoting.in_quotes {
                let text = String::from_utf8_lossy(&self.line);
                let content = text.trim_end_matches(['\r', '\n']);
                if self.config.is_ignored_line(content) {
                    trace!(line = self.lines_seen, "ignoring line");
                    continue;
                }
            }
            self.quoting.advance(&self.line);
            self.pending.extend(self.line.iter().copied());
        }
        Ok(())
    }
}

impl<R: BufRead> Read for LineFilter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill()?;
        let n = buf.len().min(self.pending.len());
        for (slot, byte) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}
