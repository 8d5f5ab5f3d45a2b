//! Purpose: `csvcursor` CLI entry point.
//! Role: Binary crate root; parses args, builds the CSV config, runs commands, emits JSON on stdout.
//! Invariants: `scan` emits one compact JSON object per accepted row (JSON lines).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `api::to_exit_code`.
#![allow(clippy::result_large_err)]
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;

use clap::{
    Args, CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::error::Error as StdError;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod command_dispatch;
mod where_expr;

use csvcursor::api::{CsvConfig, CsvCursor, Error, ErrorKind, TabularCursor, to_exit_code};
use where_expr::{all_of, compile_where_predicates, ensure_columns_exist};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };

    init_tracing();
    let color_mode = cli.color;

    let result = build_config(&cli.csv)
        .and_then(|config| command_dispatch::dispatch_command(cli.command, config));

    result
        .map_err(add_io_hint)
        .map_err(add_internal_hint)
        .map_err(|err| (err, color_mode))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "csvcursor",
    version,
    about = "Read, filter and inspect CSV files as JSON",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"The first record of every file is the header. Cells equal to the
null string (see --null-string) are reported as JSON null.
"#,
    after_help = r#"EXAMPLES
  $ csvcursor header prices.csv
  $ csvcursor --null-string NULL scan prices.csv --where 'price < 1000'
  $ csvcursor --trim count prices.csv --where 'symbol =~ gcx09'
  $ cat prices.csv | csvcursor scan - --columns symbol,price --limit 5

LEARN MORE
  $ csvcursor <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[command(flatten)]
    csv: CsvArgs,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Default)]
struct CsvArgs {
    #[arg(
        long,
        help = "JSON config document (flags below override it)",
        value_hint = ValueHint::FilePath
    )]
    config: Option<PathBuf>,
    #[arg(long, help = "Field delimiter (single ASCII character)")]
    delimiter: Option<char>,
    #[arg(long, help = "Quote character (single ASCII character)")]
    quote: Option<char>,
    #[arg(long, help = "Escape character inside quoted fields")]
    escape: Option<char>,
    #[arg(long = "null-string", help = "Cell value treated as null")]
    null_string: Option<String>,
    #[arg(long = "ignore-case-null", help = "Match --null-string case-insensitively")]
    ignore_case_null: bool,
    #[arg(long, help = "Trim leading and trailing whitespace in cells")]
    trim: bool,
    #[arg(long = "ignore-empty-lines", help = "Skip whitespace-only lines")]
    ignore_empty_lines: bool,
    #[arg(
        long = "ignore-pattern",
        value_name = "REGEX",
        help = "Skip lines matching REGEX (repeatable)"
    )]
    ignore_patterns: Vec<String>,
    #[arg(long = "skip-lines", value_name = "N", help = "Drop N leading lines before the header")]
    skip_lines: Option<usize>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Print rows as JSON lines",
        long_about = r#"Print each data row as a JSON object keyed by header name.

Rows must satisfy every --where expression. Null cells print as JSON null."#,
        after_help = r#"EXAMPLES
  $ csvcursor scan prices.csv
  $ csvcursor scan prices.csv --where 'price >= 1000' --where 'name is not empty'
  $ csvcursor scan prices.csv --where '$0 == GCX09' --columns symbol,price

WHERE EXPRESSIONS
  <column> == != < <= > >= <value>   compare (numbers compare numerically)
  <column> =~ <value>                case-insensitive equality
  <column> is [not] empty|null       presence checks
  <column> is a header name or $N (0-based position); quote values to force text."#
    )]
    Scan {
        #[arg(help = "CSV file path (use - for stdin)", value_hint = ValueHint::FilePath)]
        file: String,
        #[arg(long = "where", value_name = "EXPR", help = "Row predicate (repeatable; AND)")]
        where_exprs: Vec<String>,
        #[arg(long, help = "Stop after N matching rows")]
        limit: Option<usize>,
        #[arg(
            long,
            value_delimiter = ',',
            value_name = "COLUMNS",
            help = "Only emit these columns (comma-separated)"
        )]
        columns: Vec<String>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Print the header as JSON",
        after_help = r#"EXAMPLES
  $ csvcursor header prices.csv"#
    )]
    Header {
        #[arg(help = "CSV file path (use - for stdin)", value_hint = ValueHint::FilePath)]
        file: String,
    },
    #[command(
        arg_required_else_help = true,
        about = "Count matching rows",
        after_help = r#"EXAMPLES
  $ csvcursor count prices.csv
  $ csvcursor --null-string NULL count prices.csv --where 'price is null'"#
    )]
    Count {
        #[arg(help = "CSV file path (use - for stdin)", value_hint = ValueHint::FilePath)]
        file: String,
        #[arg(long = "where", value_name = "EXPR", help = "Row predicate (repeatable; AND)")]
        where_exprs: Vec<String>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        long_about = r#"Generate shell completion scripts.

Prints a completion script for the given shell to stdout."#,
        after_help = r#"EXAMPLES
  $ csvcursor completion bash > ~/.local/share/bash-completion/completions/csvcursor
  $ csvcursor completion zsh > ~/.zfunc/_csvcursor
  $ csvcursor completion fish > ~/.config/fish/completions/csvcursor.fish"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn build_config(args: &CsvArgs) -> Result<CsvConfig, Error> {
    let mut config = match &args.config {
        Some(path) => CsvConfig::from_path(path).map_err(|err| {
            if err.hint().is_some() {
                err
            } else {
                err.with_hint("Check the --config path.")
            }
        })?,
        None => CsvConfig::default(),
    };
    if let Some(delimiter) = args.delimiter {
        config = config.with_delimiter(delimiter);
    }
    if let Some(quote) = args.quote {
        config = config.with_quote(Some(quote));
    }
    if let Some(escape) = args.escape {
        config = config.with_escape(Some(escape));
    }
    if let Some(null_string) = &args.null_string {
        config = config.with_null_string(null_string.clone());
    }
    if args.ignore_case_null {
        config = config.with_ignore_case_null_string(true);
    }
    if args.trim {
        config = config
            .with_ignore_leading_whitespaces(true)
            .with_ignore_trailing_whitespaces(true);
    }
    if args.ignore_empty_lines {
        config = config.with_ignore_empty_lines(true);
    }
    for pattern in &args.ignore_patterns {
        let regex = Regex::new(pattern).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid --ignore-pattern `{pattern}`"))
                .with_hint("Provide a valid regular expression, e.g. --ignore-pattern '^#'.")
                .with_source(err)
        })?;
        config = config.with_ignore_line_pattern(regex);
    }
    if let Some(skip_lines) = args.skip_lines {
        config = config.with_skip_lines(skip_lines);
    }
    config.validate()?;
    Ok(config)
}

fn open_cursor(file: &str, config: CsvConfig) -> Result<CsvCursor<Box<dyn Read>>, Error> {
    let reader: Box<dyn Read> = if file == "-" {
        Box::new(io::stdin())
    } else {
        let handle = std::fs::File::open(file).map_err(|err| {
            let kind = if err.kind() == io::ErrorKind::NotFound {
                ErrorKind::NotFound
            } else {
                ErrorKind::Io
            };
            Error::new(kind)
                .with_message(format!("failed to open {file}"))
                .with_source(err)
        })?;
        Box::new(handle)
    };
    debug!(file, "opening csv input");
    CsvCursor::from_reader(reader, config)
}

fn row_json(header: &[String], values: &[Option<String>], columns: &[usize]) -> Value {
    let mut object = Map::new();
    for &index in columns {
        let value = match values.get(index) {
            Some(Some(text)) => json!(text),
            _ => Value::Null,
        };
        object.insert(header[index].clone(), value);
    }
    Value::Object(object)
}

/// Resolves `--columns` to header positions; empty selects every column.
fn select_columns(header: &[String], wanted: &[String]) -> Result<Vec<usize>, Error> {
    if wanted.is_empty() {
        return Ok((0..header.len()).collect());
    }
    wanted
        .iter()
        .map(|name| {
            let name = name.trim();
            header
                .iter()
                .position(|column| column == name)
                .ok_or_else(|| {
                    Error::new(ErrorKind::Usage)
                        .with_message("unknown column in --columns")
                        .with_column(name)
                        .with_hint(format!("Available columns: {}", header.join(", ")))
                })
        })
        .collect()
}

fn emit_json(value: Value) -> Result<(), Error> {
    let stdout = io::stdout();
    let pretty = stdout.is_terminal();
    let mut out = stdout.lock();
    write_json(&mut out, &value, pretty)?;
    match out.flush() {
        Err(err) if err.kind() != io::ErrorKind::BrokenPipe => Err(Error::new(ErrorKind::Io)
            .with_message("failed to flush output")
            .with_source(err)),
        _ => Ok(()),
    }
}

/// Writes one JSON line; a closed pipe ends output without an error.
fn write_json_line(out: &mut impl Write, value: &Value) -> Result<bool, Error> {
    write_json(out, value, false)
}

fn write_json(out: &mut impl Write, value: &Value, pretty: bool) -> Result<bool, Error> {
    let encoded = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    let line = encoded.map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("json encode failed")
            .with_source(err)
    })?;
    match writeln!(out, "{line}") {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(false),
        Err(err) => Err(Error::new(ErrorKind::Io)
            .with_message("failed to write output")
            .with_source(err)),
    }
}

fn add_io_hint(err: Error) -> Error {
    if err.hint().is_some() {
        return err;
    }
    match err.kind() {
        ErrorKind::NotFound => err.with_hint("Check the file path (use - to read stdin)."),
        ErrorKind::Io => err.with_hint(
            "I/O or CSV format error. Check the file, --delimiter and --quote settings.",
        ),
        _ => err,
    }
}

fn add_internal_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Internal || err.hint().is_some() {
        return err;
    }
    err.with_hint(
        "Unexpected internal failure. Retry with RUST_LOG=debug and share command/context if it persists.",
    )
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Argument => "invalid argument".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::State => "invalid cursor state".to_string(),
        ErrorKind::Unsupported => "unsupported operation".to_string(),
        ErrorKind::Conversion => "conversion failed".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(column) = err.column() {
        inner.insert("column".to_string(), json!(column));
    }
    if let Some(row) = err.row() {
        inner.insert("row".to_string(), json!(row));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(column) = err.column() {
        lines.push(format!(
            "{} {column}",
            colorize_label("column:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(row) = err.row() {
        lines.push(format!(
            "{} {row}",
            colorize_label("row:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let usage = rendered
        .lines()
        .find_map(|line| line.trim().strip_prefix("Usage: "))
        .map(str::trim);

    let Some(usage) = usage else {
        return "Try `csvcursor --help`.".to_string();
    };

    let tokens: Vec<&str> = usage.split_whitespace().collect();
    let Some(pos) = tokens.iter().position(|t| *t == "csvcursor") else {
        return "Try `csvcursor --help`.".to_string();
    };

    let parts: Vec<&str> = tokens
        .iter()
        .skip(pos + 1)
        .copied()
        .skip_while(|token| token.starts_with('-') || token.starts_with('['))
        .take_while(|token| !token.starts_with('-') && !token.starts_with('<') && !token.starts_with('['))
        .collect();

    if parts.is_empty() {
        return "Try `csvcursor --help`.".to_string();
    }
    format!("Try `csvcursor {} --help`.", parts.join(" "))
}
