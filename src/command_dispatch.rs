//! Purpose: Hold top-level CLI command dispatch for `csvcursor`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Every command opens its input through `CsvCursor` and closes it before returning.
//! Invariants: `--where` expressions are compiled and checked against the header before any row is read.

use super::*;

pub(super) fn dispatch_command(
    command: Command,
    config: CsvConfig,
) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "csvcursor", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Header { file } => {
            let mut cursor = open_cursor(&file, config)?;
            let columns = cursor.header()?.to_vec();
            cursor.close();
            emit_json(json!({ "columns": columns }))?;
            Ok(RunOutcome::ok())
        }
        Command::Count { file, where_exprs } => {
            let predicates = compile_where_predicates(&where_exprs)?;
            let cursor = open_cursor(&file, config)?;
            ensure_columns_exist(&predicates, cursor.header()?)?;
            let mut cursor = cursor.with_filter(all_of(predicates));

            let mut rows = 0u64;
            while cursor.next()? {
                rows += 1;
            }
            cursor.close();
            debug!(rows, "count finished");
            emit_json(json!({ "rows": rows }))?;
            Ok(RunOutcome::ok())
        }
        Command::Scan {
            file,
            where_exprs,
            limit,
            columns,
        } => {
            let predicates = compile_where_predicates(&where_exprs)?;
            let cursor = open_cursor(&file, config)?;
            let header = cursor.header()?.to_vec();
            ensure_columns_exist(&predicates, &header)?;
            let selected = select_columns(&header, &columns)?;
            let mut cursor = cursor.with_filter(all_of(predicates));

            let stdout = io::stdout();
            let mut out = stdout.lock();
            let mut emitted = 0usize;
            while limit.is_none_or(|limit| emitted < limit) && cursor.next()? {
                let value = row_json(&header, cursor.values()?, &selected);
                if !write_json_line(&mut out, &value)? {
                    debug!("stdout closed; stopping scan");
                    break;
                }
                emitted += 1;
            }
            cursor.close();
            match out.flush() {
                Err(err) if err.kind() != io::ErrorKind::BrokenPipe => {
                    return Err(Error::new(ErrorKind::Io)
                        .with_message("failed to flush output")
                        .with_source(err));
                }
                _ => {}
            }
            debug!(rows = emitted, "scan finished");
            Ok(RunOutcome::ok())
        }
    }
}
