//! Purpose: Write headers and nullable rows back out as CSV text.
//! Exports: `CsvWriter`.
//! Role: Inverse of `CsvReader` for the same `CsvConfig`.
//! Invariants: `None` is written as the null sentinel, or an empty field when none is configured.
//! Invariants: Records end with the configured break string.
use std::io::Write;

use crate::core::config::CsvConfig;
use crate::core::error::{Error, ErrorKind};

pub struct CsvWriter<W: Write> {
    inner: csv::Writer<W>,
    config: CsvConfig,
    rows_written: u64,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(sink: W) -> Result<Self, Error> {
        Self::with_config(sink, CsvConfig::default())
    }

    pub fn with_config(sink: W, config: CsvConfig) -> Result<Self, Error> {
        config.validate()?;
        let mut builder = csv::WriterBuilder::new();
        builder
            .flexible(true)
            .delimiter(config.delimiter_byte()?)
            .terminator(terminator(config.break_string())?);
        match config.quote_byte()? {
            Some(quote) => {
                builder.quote(quote).quote_style(csv::QuoteStyle::Necessary);
            }
            None => {
                builder.quote_style(csv::QuoteStyle::Never);
            }
        }
        if let Some(escape) = config.escape_byte()? {
            builder.escape(escape).double_quote(false);
        }
        Ok(Self {
            inner: builder.from_writer(sink),
            config,
            rows_written: 0,
        })
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn write_header<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<(), Error> {
        self.inner
            .write_record(columns.iter().map(|name| name.as_ref()))?;
        Ok(())
    }

    pub fn write_values<S: AsRef<str>>(&mut self, values: &[Option<S>]) -> Result<(), Error> {
        let null = self.config.null_string().unwrap_or("");
        self.inner.write_record(
            values
                .iter()
                .map(|value| value.as_ref().map(|v| v.as_ref()).unwrap_or(null)),
        )?;
        self.rows_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W, Error> {
        self.inner.into_inner().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to flush csv writer")
                .with_source(err.into_error())
        })
    }
}

fn terminator(break_string: &str) -> Result<csv::Terminator, Error> {
    match break_string {
        "\r\n" => Ok(csv::Terminator::CRLF),
        s if s.len() == 1 && s.is_ascii() => Ok(csv::Terminator::Any(s.as_bytes()[0])),
        other => Err(Error::new(ErrorKind::Usage)
            .with_message("unsupported break string")
            .with_hint(format!("use \"\\r\\n\" or a single ASCII byte (got {other:?})"))),
    }
}
