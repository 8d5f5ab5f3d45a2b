//! Purpose: Describe how CSV text is tokenized and how logical nulls are spelled.
//! Exports: `CsvConfig`, `DEFAULT_BREAK_STRING`.
//! Role: Shared by `CsvReader`, `CsvWriter` and the CLI; loadable from JSON.
//! Invariants: Delimiter, quote and escape must be single-byte (ASCII) characters.
//! Invariants: Whitespace trimming is applied before the null sentinel comparison.
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::core::error::{Error, ErrorKind};

pub const DEFAULT_BREAK_STRING: &str = "\r\n";

#[derive(Clone, Debug)]
pub struct CsvConfig {
    delimiter: char,
    quote: Option<char>,
    escape: Option<char>,
    null_string: Option<String>,
    ignore_case_null_string: bool,
    ignore_leading_whitespaces: bool,
    ignore_trailing_whitespaces: bool,
    ignore_empty_lines: bool,
    ignore_line_patterns: Vec<Regex>,
    skip_lines: usize,
    break_string: String,
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: Some('"'),
            escape: None,
            null_string: None,
            ignore_case_null_string: false,
            ignore_leading_whitespaces: false,
            ignore_trailing_whitespaces: false,
            ignore_empty_lines: false,
            ignore_line_patterns: Vec::new(),
            skip_lines: 0,
            break_string: DEFAULT_BREAK_STRING.to_string(),
        }
    }
}

/// On-disk shape of a configuration document. Every field is optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigDocument {
    delimiter: Option<char>,
    quote: Option<char>,
    /// `false` turns quote handling off; `quote` must then be absent.
    quoting: Option<bool>,
    escape: Option<char>,
    null_string: Option<String>,
    ignore_case_null_string: bool,
    ignore_leading_whitespaces: bool,
    ignore_trailing_whitespaces: bool,
    ignore_empty_lines: bool,
    ignore_line_patterns: Vec<String>,
    skip_lines: usize,
    break_string: Option<String>,
}

impl CsvConfig {
    pub fn new(delimiter: char, quote: char, escape: char) -> Self {
        Self {
            delimiter,
            quote: Some(quote),
            escape: Some(escape),
            ..Self::default()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        let doc: ConfigDocument = serde_json::from_str(text).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("invalid csv config document")
                .with_hint(err.to_string())
                .with_source(err)
        })?;
        Self::from_document(doc)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to read config {}", path.display()))
                .with_source(err)
        })?;
        Self::from_json_str(&text)
    }

    fn from_document(doc: ConfigDocument) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(delimiter) = doc.delimiter {
            config.delimiter = delimiter;
        }
        match (doc.quoting, doc.quote) {
            (Some(false), Some(_)) => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("config sets both `quote` and `quoting: false`"));
            }
            (Some(false), None) => config.quote = None,
            (_, Some(quote)) => config.quote = Some(quote),
            (_, None) => {}
        }
        config.escape = doc.escape;
        config.null_string = doc.null_string;
        config.ignore_case_null_string = doc.ignore_case_null_string;
        config.ignore_leading_whitespaces = doc.ignore_leading_whitespaces;
        config.ignore_trailing_whitespaces = doc.ignore_trailing_whitespaces;
        config.ignore_empty_lines = doc.ignore_empty_lines;
        config.skip_lines = doc.skip_lines;
        if let Some(break_string) = doc.break_string {
            config.break_string = break_string;
        }
        for pattern in &doc.ignore_line_patterns {
            config.ignore_line_patterns.push(compile_pattern(pattern)?);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quote(mut self, quote: Option<char>) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_escape(mut self, escape: Option<char>) -> Self {
        self.escape = escape;
        self
    }

    pub fn with_null_string(mut self, null_string: impl Into<String>) -> Self {
        self.null_string = Some(null_string.into());
        self
    }

    pub fn with_ignore_case_null_string(mut self, ignore_case: bool) -> Self {
        self.ignore_case_null_string = ignore_case;
        self
    }

    pub fn with_ignore_leading_whitespaces(mut self, ignore: bool) -> Self {
        self.ignore_leading_whitespaces = ignore;
        self
    }

    pub fn with_ignore_trailing_whitespaces(mut self, ignore: bool) -> Self {
        self.ignore_trailing_whitespaces = ignore;
        self
    }

    pub fn with_ignore_empty_lines(mut self, ignore: bool) -> Self {
        self.ignore_empty_lines = ignore;
        self
    }

    pub fn with_ignore_line_pattern(mut self, pattern: Regex) -> Self {
        self.ignore_line_patterns.push(pattern);
        self
    }

    pub fn with_skip_lines(mut self, skip_lines: usize) -> Self {
        self.skip_lines = skip_lines;
        self
    }

    pub fn with_break_string(mut self, break_string: impl Into<String>) -> Self {
        self.break_string = break_string.into();
        self
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn quote(&self) -> Option<char> {
        self.quote
    }

    pub fn escape(&self) -> Option<char> {
        self.escape
    }

    pub fn null_string(&self) -> Option<&str> {
        self.null_string.as_deref()
    }

    pub fn ignore_empty_lines(&self) -> bool {
        self.ignore_empty_lines
    }

    pub fn ignore_line_patterns(&self) -> &[Regex] {
        &self.ignore_line_patterns
    }

    pub fn skip_lines(&self) -> usize {
        self.skip_lines
    }

    pub fn break_string(&self) -> &str {
        &self.break_string
    }

    /// Rejects settings the tokenizer cannot honour.
    pub fn validate(&self) -> Result<(), Error> {
        ascii_byte("delimiter", self.delimiter)?;
        if let Some(quote) = self.quote {
            ascii_byte("quote", quote)?;
            if quote == self.delimiter {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("quote and delimiter must differ"));
            }
        }
        if let Some(escape) = self.escape {
            ascii_byte("escape", escape)?;
        }
        if self.break_string.is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("break string must not be empty"));
        }
        Ok(())
    }

    pub(crate) fn delimiter_byte(&self) -> Result<u8, Error> {
        ascii_byte("delimiter", self.delimiter)
    }

    pub(crate) fn quote_byte(&self) -> Result<Option<u8>, Error> {
        self.quote.map(|quote| ascii_byte("quote", quote)).transpose()
    }

    pub(crate) fn escape_byte(&self) -> Result<Option<u8>, Error> {
        self.escape
            .map(|escape| ascii_byte("escape", escape))
            .transpose()
    }

    /// Applies whitespace trimming, then maps the null sentinel to `None`.
    pub(crate) fn normalize_field(&self, raw: &str) -> Option<String> {
        let mut value = raw;
        if self.ignore_leading_whitespaces {
            value = value.trim_start();
        }
        if self.ignore_trailing_whitespaces {
            value = value.trim_end();
        }
        if self.is_null_string(value) {
            return None;
        }
        Some(value.to_string())
    }

    pub(crate) fn is_null_string(&self, value: &str) -> bool {
        match &self.null_string {
            Some(null) if self.ignore_case_null_string => null.eq_ignore_ascii_case(value),
            Some(null) => null == value,
            None => false,
        }
    }

    /// True when a physical line should never reach the tokenizer.
    pub(crate) fn is_ignored_line(&self, line: &str) -> bool {
        if self.ignore_empty_lines && line.trim().is_empty() {
            return true;
        }
        self.ignore_line_patterns
            .iter()
            .any(|pattern| pattern.is_match(line))
    }
}

fn ascii_byte(name: &str, ch: char) -> Result<u8, Error> {
    if ch.is_ascii() {
        Ok(ch as u8)
    } else {
        Err(Error::new(ErrorKind::Usage)
            .with_message(format!("{name} must be a single-byte character"))
            .with_hint(format!("got {ch:?}")))
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, Error> {
    Regex::new(pattern).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("invalid ignore line pattern `{pattern}`"))
            .with_source(err)
    })
}
