//! Purpose: Define the stable public Rust API boundary for csvcursor.
//! Exports: Reader/writer/config, the forward-only cursor, filters, and errors.
//! Role: Public, additive-only surface over the core modules.
//! Invariants: Downstream code should import from here rather than `core::*`.

pub use crate::core::config::{CsvConfig, DEFAULT_BREAK_STRING};
pub use crate::core::cursor::{
    Capability, ColumnIndex, Concurrency, CsvCursor, CursorMetadata, CursorType, FetchDirection,
    Holdability, TabularCursor,
};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::filter::{
    Bean, BeanExpression, CellFormat, ColumnExpression, ColumnTarget, Comparator, Filter, Logical,
    Operator, RowRef, Value,
};
pub use crate::core::reader::{CsvReader, Row};
pub use crate::core::writer::CsvWriter;
