//! Purpose: Forward-only, read-only cursor over CSV rows with typed column accessors.
//! Exports: `CsvCursor`, `TabularCursor`, `ColumnIndex`, `Capability`, `CursorMetadata`,
//!          `FetchDirection`, `CursorType`, `Concurrency`, `Holdability`.
//! Role: Adapts a `CsvReader` to the tabular-cursor contract used by row consumers.
//! Invariants: Every call except `is_closed`/`request` fails with a state error once closed.
//! Invariants: `was_null` reflects only the most recent getter call.
//! Invariants: Capabilities outside the forward-only subset always report `Unsupported`.
use std::io::Read;

use time::PrimitiveDateTime;
use time::parsing::Parsable;
use tracing::{debug, trace};

use crate::core::config::CsvConfig;
use crate::core::error::{Error, ErrorKind};
use crate::core::filter::{Filter, RowRef, parse_bool, parse_date_time};
use crate::core::reader::{CsvReader, Row};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchDirection {
    Forward,
    Reverse,
    Unknown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CursorType {
    ForwardOnly,
    ScrollInsensitive,
    ScrollSensitive,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Concurrency {
    ReadOnly,
    Updatable,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Holdability {
    HoldCursorsOverCommit,
    CloseCursorsAtCommit,
}

/// Operations of the wide tabular-cursor contract that CSV cursors do not implement.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Capability {
    First,
    Last,
    Absolute(i64),
    Relative(i64),
    Previous,
    BeforeFirst,
    AfterLast,
    IsBeforeFirst,
    IsAfterLast,
    IsFirst,
    IsLast,
    SetFetchDirection(FetchDirection),
    SetFetchSize(usize),
    CursorName,
    UpdateValue,
    UpdateRow,
    InsertRow,
    DeleteRow,
    RefreshRow,
    CancelRowUpdates,
    MoveToInsertRow,
    MoveToCurrentRow,
    RowUpdated,
    RowInserted,
    RowDeleted,
    Blob,
    Clob,
    NClob,
    Ref,
    Array,
    RowId,
    SqlXml,
    UnicodeStream,
    ScaledDecimal,
    TypeMappedObject,
}

impl Capability {
    pub const fn is_supported(self) -> bool {
        false
    }

    pub fn name(self) -> &'static str {
        match self {
            Capability::First => "first",
            Capability::Last => "last",
            Capability::Absolute(_) => "absolute",
            Capability::Relative(_) => "relative",
            Capability::Previous => "previous",
            Capability::BeforeFirst => "beforeFirst",
            Capability::AfterLast => "afterLast",
            Capability::IsBeforeFirst => "isBeforeFirst",
            Capability::IsAfterLast => "isAfterLast",
            Capability::IsFirst => "isFirst",
            Capability::IsLast => "isLast",
            Capability::SetFetchDirection(_) => "setFetchDirection",
            Capability::SetFetchSize(_) => "setFetchSize",
            Capability::CursorName => "getCursorName",
            Capability::UpdateValue => "update",
            Capability::UpdateRow => "updateRow",
            Capability::InsertRow => "insertRow",
            Capability::DeleteRow => "deleteRow",
            Capability::RefreshRow => "refreshRow",
            Capability::CancelRowUpdates => "cancelRowUpdates",
            Capability::MoveToInsertRow => "moveToInsertRow",
            Capability::MoveToCurrentRow => "moveToCurrentRow",
            Capability::RowUpdated => "rowUpdated",
            Capability::RowInserted => "rowInserted",
            Capability::RowDeleted => "rowDeleted",
            Capability::Blob => "getBlob",
            Capability::Clob => "getClob",
            Capability::NClob => "getNClob",
            Capability::Ref => "getRef",
            Capability::Array => "getArray",
            Capability::RowId => "getRowId",
            Capability::SqlXml => "getSQLXML",
            Capability::UnicodeStream => "getUnicodeStream",
            Capability::ScaledDecimal => "getBigDecimal(scale)",
            Capability::TypeMappedObject => "getObject(typeMap)",
        }
    }

    fn unsupported(self) -> Error {
        Error::new(ErrorKind::Unsupported)
            .with_message(format!("`{}` is not supported", self.name()))
            .with_hint("CSV cursors are forward-only and read-only.")
    }
}

/// Resolves a column reference to a 0-based position within a header.
///
/// Integers are 1-based positions; strings are column names, matched exactly
/// first and then ignoring ASCII case.
pub trait ColumnIndex {
    fn resolve(&self, header: &[String]) -> Result<usize, Error>;
}

impl ColumnIndex for usize {
    fn resolve(&self, header: &[String]) -> Result<usize, Error> {
        if *self == 0 || *self > header.len() {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message(format!(
                    "column index {self} is out of range (1..={})",
                    header.len()
                ))
                .with_column(self.to_string()));
        }
        Ok(self - 1)
    }
}

impl ColumnIndex for str {
    fn resolve(&self, header: &[String]) -> Result<usize, Error> {
        header
            .iter()
            .position(|name| name == self)
            .or_else(|| header.iter().position(|name| name.eq_ignore_ascii_case(self)))
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message("no such column")
                    .with_column(self)
            })
    }
}

impl ColumnIndex for String {
    fn resolve(&self, header: &[String]) -> Result<usize, Error> {
        self.as_str().resolve(header)
    }
}

impl<T: ColumnIndex + ?Sized> ColumnIndex for &T {
    fn resolve(&self, header: &[String]) -> Result<usize, Error> {
        (**self).resolve(header)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CursorMetadata {
    columns: Vec<String>,
}

impl CursorMetadata {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// 1-based, like the cursor getters.
    pub fn column_name(&self, column: usize) -> Result<&str, Error> {
        let idx = column.resolve(&self.columns)?;
        Ok(&self.columns[idx])
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

/// The supported subset of a tabular cursor. Typed getters are provided on top
/// of `cell`, which resolves a column and records whether it was null.
pub trait TabularCursor {
    fn next(&mut self) -> Result<bool, Error>;
    fn close(&mut self);
    fn is_closed(&self) -> bool;
    fn was_null(&self) -> Result<bool, Error>;
    /// Current 1-based row number; 0 when not positioned on a row.
    fn row(&self) -> Result<u64, Error>;
    fn metadata(&self) -> Result<CursorMetadata, Error>;
    fn cell<I: ColumnIndex>(&mut self, column: I) -> Result<Option<&str>, Error>;

    /// Fails with a state error when closed.
    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::new(ErrorKind::State).with_message("cursor is closed"));
        }
        Ok(())
    }

    fn request(&self, capability: Capability) -> Result<(), Error> {
        Err(capability.unsupported())
    }

    fn find_column(&self, name: &str) -> Result<usize, Error> {
        let metadata = self.metadata()?;
        Ok(name.resolve(metadata.columns())? + 1)
    }

    fn fetch_direction(&self) -> Result<FetchDirection, Error> {
        self.ensure_open()?;
        Ok(FetchDirection::Forward)
    }

    fn fetch_size(&self) -> Result<usize, Error> {
        self.ensure_open()?;
        Ok(0)
    }

    fn cursor_type(&self) -> Result<CursorType, Error> {
        self.ensure_open()?;
        Ok(CursorType::ForwardOnly)
    }

    fn concurrency(&self) -> Result<Concurrency, Error> {
        self.ensure_open()?;
        Ok(Concurrency::ReadOnly)
    }

    fn holdability(&self) -> Result<Holdability, Error> {
        self.ensure_open()?;
        Ok(Holdability::HoldCursorsOverCommit)
    }

    /// Cursors over CSV input have no owning statement.
    fn has_statement(&self) -> Result<bool, Error> {
        self.ensure_open()?;
        Ok(false)
    }

    /// Raw cell text; `None` for a null cell.
    fn get_value<I: ColumnIndex>(&mut self, column: I) -> Result<Option<&str>, Error> {
        self.cell(column)
    }

    fn get_string<I: ColumnIndex>(&mut self, column: I) -> Result<Option<String>, Error> {
        Ok(self.cell(column)?.map(str::to_string))
    }

    fn get_boolean<I: ColumnIndex>(&mut self, column: I) -> Result<bool, Error> {
        match self.cell(column)? {
            None => Ok(false),
            Some(text) => parse_bool(text.trim()).ok_or_else(|| conversion(text, "bool")),
        }
    }

    fn get_byte<I: ColumnIndex>(&mut self, column: I) -> Result<i8, Error> {
        parse_or_zero(self.cell(column)?, "byte")
    }

    fn get_short<I: ColumnIndex>(&mut self, column: I) -> Result<i16, Error> {
        parse_or_zero(self.cell(column)?, "short")
    }

    fn get_int<I: ColumnIndex>(&mut self, column: I) -> Result<i32, Error> {
        parse_or_zero(self.cell(column)?, "int")
    }

    fn get_long<I: ColumnIndex>(&mut self, column: I) -> Result<i64, Error> {
        parse_or_zero(self.cell(column)?, "long")
    }

    fn get_float<I: ColumnIndex>(&mut self, column: I) -> Result<f32, Error> {
        parse_or_zero(self.cell(column)?, "float")
    }

    fn get_double<I: ColumnIndex>(&mut self, column: I) -> Result<f64, Error> {
        parse_or_zero(self.cell(column)?, "double")
    }

    /// Date-only formats resolve to midnight.
    fn get_date_time<I: ColumnIndex>(
        &mut self,
        column: I,
        format: &(impl Parsable + ?Sized),
    ) -> Result<Option<PrimitiveDateTime>, Error> {
        match self.cell(column)? {
            None => Ok(None),
            Some(text) => parse_date_time(text.trim(), format)
                .map(Some)
                .map_err(|err| conversion(text, "date-time").with_source(err)),
        }
    }
}

fn parse_or_zero<T>(cell: Option<&str>, target: &str) -> Result<T, Error>
where
    T: std::str::FromStr + Default,
{
    match cell {
        None => Ok(T::default()),
        Some(text) => text
            .trim()
            .parse::<T>()
            .map_err(|_| conversion(text, target)),
    }
}

fn conversion(text: &str, target: &str) -> Error {
    Error::new(ErrorKind::Conversion).with_message(format!("cannot convert {text:?} to {target}"))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Position {
    BeforeFirst,
    OnRow,
    AfterLast,
}

type RowFilter = Box<dyn for<'r> Filter<RowRef<'r>> + Send + Sync>;

/// Forward-only cursor over a `CsvReader`.
pub struct CsvCursor<R: Read> {
    source: Option<CsvReader<R>>,
    header: Vec<String>,
    current: Row,
    position: Position,
    row: u64,
    was_null: bool,
    filter: Option<RowFilter>,
}

impl<R: Read> CsvCursor<R> {
    /// Reads the header immediately; fails with `Io` when it cannot be read.
    pub fn new(mut source: CsvReader<R>) -> Result<Self, Error> {
        let header = source.read_header()?;
        debug!(columns = header.len(), "opened csv cursor");
        Ok(Self {
            source: Some(source),
            header,
            current: Vec::new(),
            position: Position::BeforeFirst,
            row: 0,
            was_null: false,
            filter: None,
        })
    }

    /// Like `new`, but an absent source is an argument error.
    pub fn from_source(source: Option<CsvReader<R>>) -> Result<Self, Error> {
        match source {
            Some(source) => Self::new(source),
            None => Err(Error::new(ErrorKind::Argument).with_message("csv reader must not be null")),
        }
    }

    pub fn from_reader(reader: R, config: CsvConfig) -> Result<Self, Error> {
        Self::new(CsvReader::with_config(reader, config)?)
    }

    /// Rows rejected by `filter` are skipped by `next`.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: for<'r> Filter<RowRef<'r>> + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn header(&self) -> Result<&[String], Error> {
        self.ensure_open()?;
        Ok(&self.header)
    }

    /// Values of the current row, nulls as `None`.
    pub fn values(&self) -> Result<&[Option<String>], Error> {
        self.ensure_positioned()?;
        Ok(&self.current)
    }

    fn ensure_positioned(&self) -> Result<(), Error> {
        self.ensure_open()?;
        match self.position {
            Position::OnRow => Ok(()),
            Position::BeforeFirst => Err(Error::new(ErrorKind::State)
                .with_message("cursor is not positioned on a row")
                .with_hint("Call next() before reading values.")),
            Position::AfterLast => Err(Error::new(ErrorKind::State)
                .with_message("cursor is past the last row")),
        }
    }

    fn accepts(&self, values: &[Option<String>]) -> Result<bool, Error> {
        match &self.filter {
            Some(filter) => filter
                .accept(&RowRef::new(Some(self.header.as_slice()), values))
                .map_err(|err| err.with_row(self.row + 1)),
            None => Ok(true),
        }
    }
}

impl<R: Read> TabularCursor for CsvCursor<R> {
    fn next(&mut self) -> Result<bool, Error> {
        self.ensure_open()?;
        self.was_null = false;
        if self.position == Position::AfterLast {
            return Ok(false);
        }
        loop {
            let Some(source) = self.source.as_mut() else {
                return Err(Error::new(ErrorKind::State).with_message("cursor is closed"));
            };
            match source.read_values()? {
                Some(values) => {
                    if !self.accepts(&values)? {
                        trace!(record = source_records(&self.source), "row rejected by filter");
                        continue;
                    }
                    self.current = values;
                    self.position = Position::OnRow;
                    self.row += 1;
                    return Ok(true);
                }
                None => {
                    self.current.clear();
                    self.position = Position::AfterLast;
                    return Ok(false);
                }
            }
        }
    }

    fn close(&mut self) {
        if let Some(source) = self.source.take() {
            debug!(
                rows = self.row,
                records = source.records_read(),
                "closed csv cursor"
            );
        }
        self.current.clear();
    }

    fn is_closed(&self) -> bool {
        self.source.is_none()
    }

    fn was_null(&self) -> Result<bool, Error> {
        self.ensure_open()?;
        Ok(self.was_null)
    }

    fn row(&self) -> Result<u64, Error> {
        self.ensure_open()?;
        Ok(match self.position {
            Position::OnRow => self.row,
            Position::BeforeFirst | Position::AfterLast => 0,
        })
    }

    fn metadata(&self) -> Result<CursorMetadata, Error> {
        self.ensure_open()?;
        Ok(CursorMetadata {
            columns: self.header.clone(),
        })
    }

    fn cell<I: ColumnIndex>(&mut self, column: I) -> Result<Option<&str>, Error> {
        self.ensure_positioned()?;
        self.was_null = false;
        let idx = column.resolve(&self.header)?;
        let value = self.current.get(idx).and_then(|cell| cell.as_deref());
        self.was_null = value.is_none();
        Ok(value)
    }
}

fn source_records<R: Read>(source: &Option<CsvReader<R>>) -> u64 {
    source.as_ref().map(CsvReader::records_read).unwrap_or(0)
}
