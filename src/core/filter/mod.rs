//! Purpose: Composable row and bean predicates used to filter CSV records.
//! Exports: `Filter`, `Operator`, `Logical`, column/bean expressions, `Value`, `CellFormat`.
//! Role: Single-field boolean tests plus all/any/not composition.
//! Invariants: Predicates are immutable once built; `accept` never mutates its input.
//! Invariants: Binary operators reject a null operand at construction (argument error).
//! Invariants: `Display` renders the predicate's type name only (diagnostics).
use std::cmp::Ordering;
use std::fmt;

use crate::core::error::{Error, ErrorKind};

mod bean;
mod column;
mod value;

pub use bean::{Bean, BeanExpression};
pub use column::{ColumnExpression, ColumnTarget, RowRef};
pub use value::{CellFormat, Comparator, Value};

pub(crate) use value::{parse_bool, parse_date_time};

/// A boolean test over `T`.
pub trait Filter<T: ?Sized>: fmt::Display {
    fn accept(&self, input: &T) -> Result<bool, Error>;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Operator {
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    Empty,
    NotEmpty,
    Null,
    NotNull,
}

impl Operator {
    pub fn takes_operand(self) -> bool {
        !matches!(
            self,
            Operator::Empty | Operator::NotEmpty | Operator::Null | Operator::NotNull
        )
    }

    pub(crate) fn type_name(self) -> &'static str {
        match self {
            Operator::Equal => "Equal",
            Operator::NotEqual => "NotEqual",
            Operator::LessThan => "LessThan",
            Operator::LessThanOrEqual => "LessThanOrEqual",
            Operator::GreaterThan => "GreaterThan",
            Operator::GreaterThanOrEqual => "GreaterThanOrEqual",
            Operator::Empty => "Empty",
            Operator::NotEmpty => "NotEmpty",
            Operator::Null => "Null",
            Operator::NotNull => "NotNull",
        }
    }
}

/// Operator, operand and case handling shared by column and bean expressions.
#[derive(Clone, Debug)]
pub(crate) struct Criterion {
    operator: Operator,
    operand: Value,
    ignore_case: bool,
}

impl Criterion {
    pub(crate) fn new(operator: Operator, operand: Value) -> Result<Self, Error> {
        if operator.takes_operand() && operand.is_null() {
            return Err(Error::new(ErrorKind::Argument).with_message(format!(
                "{} requires a non-null comparison value",
                operator.type_name()
            )));
        }
        Ok(Self {
            operator,
            operand,
            ignore_case: false,
        })
    }

    pub(crate) fn unary(operator: Operator) -> Self {
        Self {
            operator,
            operand: Value::Null,
            ignore_case: false,
        }
    }

    pub(crate) fn operator(&self) -> Operator {
        self.operator
    }

    pub(crate) fn set_ignore_case(&mut self, ignore_case: bool) {
        self.ignore_case = ignore_case;
    }

    pub(crate) fn evaluate(
        &self,
        actual: &Value,
        comparator: Option<&Comparator>,
    ) -> Result<bool, Error> {
        let ordering = || -> Option<Ordering> {
            match comparator {
                Some(cmp) => Some(cmp(actual, &self.operand)),
                None => actual.compare(&self.operand, self.ignore_case),
            }
        };
        let ordered = |test: fn(Ordering) -> bool| -> Result<bool, Error> {
            if actual.is_null() {
                return Ok(false);
            }
            ordering()
                .map(test)
                .ok_or_else(|| actual.mismatch(&self.operand))
        };

        match self.operator {
            Operator::Empty => Ok(actual.is_empty()),
            Operator::NotEmpty => Ok(!actual.is_empty()),
            Operator::Null => Ok(actual.is_null()),
            Operator::NotNull => Ok(!actual.is_null()),
            Operator::Equal => Ok(!actual.is_null() && ordering() == Some(Ordering::Equal)),
            Operator::NotEqual => Ok(actual.is_null() || ordering() != Some(Ordering::Equal)),
            Operator::LessThan => ordered(Ordering::is_lt),
            Operator::LessThanOrEqual => ordered(Ordering::is_le),
            Operator::GreaterThan => ordered(Ordering::is_gt),
            Operator::GreaterThanOrEqual => ordered(Ordering::is_ge),
        }
    }
}

/// Logical composition over any filter type.
#[derive(Clone, Debug)]
pub enum Logical<F> {
    Test(F),
    All(Vec<Logical<F>>),
    Any(Vec<Logical<F>>),
    Not(Box<Logical<F>>),
}

impl<F> Logical<F> {
    pub fn negate(self) -> Self {
        Logical::Not(Box::new(self))
    }
}

impl<F> From<F> for Logical<F> {
    fn from(filter: F) -> Self {
        Logical::Test(filter)
    }
}

impl<F: fmt::Display> fmt::Display for Logical<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logical::Test(filter) => filter.fmt(f),
            Logical::All(_) => write!(f, "AndExpression"),
            Logical::Any(_) => write!(f, "OrExpression"),
            Logical::Not(_) => write!(f, "NotExpression"),
        }
    }
}

impl<T: ?Sized, F: Filter<T>> Filter<T> for Logical<F> {
    fn accept(&self, input: &T) -> Result<bool, Error> {
        match self {
            Logical::Test(filter) => filter.accept(input),
            Logical::All(filters) => {
                for filter in filters {
                    if !filter.accept(input)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Logical::Any(filters) => {
                for filter in filters {
                    if filter.accept(input)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Logical::Not(filter) => Ok(!filter.accept(input)?),
        }
    }
}
