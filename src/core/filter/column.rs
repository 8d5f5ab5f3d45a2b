// Column expressions: single-cell tests addressed by header name or 0-based position.
use std::fmt;

use crate::core::error::{Error, ErrorKind};
use crate::core::filter::value::{CellFormat, Value};
use crate::core::filter::{Criterion, Filter, Operator};

/// A data row as seen by column filters. Name targets need the header.
#[derive(Clone, Copy, Debug)]
pub struct RowRef<'a> {
    header: Option<&'a [String]>,
    values: &'a [Option<String>],
}

impl<'a> RowRef<'a> {
    pub fn new(header: Option<&'a [String]>, values: &'a [Option<String>]) -> Self {
        Self { header, values }
    }

    pub fn values(values: &'a [Option<String>]) -> Self {
        Self {
            header: None,
            values,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ColumnTarget {
    Name(String),
    Position(usize),
}

impl From<&str> for ColumnTarget {
    fn from(name: &str) -> Self {
        ColumnTarget::Name(name.to_string())
    }
}

impl From<String> for ColumnTarget {
    fn from(name: String) -> Self {
        ColumnTarget::Name(name)
    }
}

impl From<usize> for ColumnTarget {
    fn from(position: usize) -> Self {
        ColumnTarget::Position(position)
    }
}

#[derive(Clone, Debug)]
pub struct ColumnExpression {
    target: ColumnTarget,
    criterion: Criterion,
    format: Option<CellFormat>,
}

impl ColumnExpression {
    pub fn new(
        target: impl Into<ColumnTarget>,
        operator: Operator,
        operand: impl Into<Value>,
    ) -> Result<Self, Error> {
        let target = checked_target(target.into())?;
        let criterion = if operator.takes_operand() {
            Criterion::new(operator, operand.into())?
        } else {
            Criterion::unary(operator)
        };
        Ok(Self {
            target,
            criterion,
            format: None,
        })
    }

    fn unary(target: impl Into<ColumnTarget>, operator: Operator) -> Result<Self, Error> {
        Self::new(target, operator, Value::Null)
    }

    pub fn equal(target: impl Into<ColumnTarget>, value: impl Into<Value>) -> Result<Self, Error> {
        Self::new(target, Operator::Equal, value)
    }

    pub fn not_equal(
        target: impl Into<ColumnTarget>,
        value: impl Into<Value>,
    ) -> Result<Self, Error> {
        Self::new(target, Operator::NotEqual, value)
    }

    pub fn less_than(
        target: impl Into<ColumnTarget>,
        value: impl Into<Value>,
    ) -> Result<Self, Error> {
        Self::new(target, Operator::LessThan, value)
    }

    pub fn less_than_or_equal(
        target: impl Into<ColumnTarget>,
        value: impl Into<Value>,
    ) -> Result<Self, Error> {
        Self::new(target, Operator::LessThanOrEqual, value)
    }

    pub fn greater_than(
        target: impl Into<ColumnTarget>,
        value: impl Into<Value>,
    ) -> Result<Self, Error> {
        Self::new(target, Operator::GreaterThan, value)
    }

    pub fn greater_than_or_equal(
        target: impl Into<ColumnTarget>,
        value: impl Into<Value>,
    ) -> Result<Self, Error> {
        Self::new(target, Operator::GreaterThanOrEqual, value)
    }

    pub fn empty(target: impl Into<ColumnTarget>) -> Result<Self, Error> {
        Self::unary(target, Operator::Empty)
    }

    pub fn not_empty(target: impl Into<ColumnTarget>) -> Result<Self, Error> {
        Self::unary(target, Operator::NotEmpty)
    }

    pub fn null(target: impl Into<ColumnTarget>) -> Result<Self, Error> {
        Self::unary(target, Operator::Null)
    }

    pub fn not_null(target: impl Into<ColumnTarget>) -> Result<Self, Error> {
        Self::unary(target, Operator::NotNull)
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.criterion.set_ignore_case(ignore_case);
        self
    }

    /// Parse cells with `format` before comparing (typed comparisons).
    pub fn with_format(mut self, format: CellFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn target(&self) -> &ColumnTarget {
        &self.target
    }

    pub fn operator(&self) -> Operator {
        self.criterion.operator()
    }

    fn cell<'a>(&self, row: &RowRef<'a>) -> Result<Option<&'a str>, Error> {
        let position = match &self.target {
            ColumnTarget::Position(position) => *position,
            ColumnTarget::Name(name) => {
                let header = row.header.ok_or_else(|| {
                    Error::new(ErrorKind::Argument)
                        .with_message("column name expressions require a header")
                        .with_column(name.clone())
                })?;
                header
                    .iter()
                    .position(|column| column == name)
                    .ok_or_else(|| {
                        Error::new(ErrorKind::Argument)
                            .with_message("column is not in the header")
                            .with_column(name.clone())
                    })?
            }
        };
        Ok(row
            .values
            .get(position)
            .and_then(|cell| cell.as_deref()))
    }

    fn cell_value(&self, cell: Option<&str>) -> Result<Value, Error> {
        let Some(text) = cell else {
            return Ok(Value::Null);
        };
        match &self.format {
            // Emptiness checks look at the raw text, not the parsed value.
            Some(format) if self.criterion.operator().takes_operand() => {
                format.parse(text).map_err(|err| match &self.target {
                    ColumnTarget::Name(name) => err.with_column(name.clone()),
                    ColumnTarget::Position(position) => err.with_column(format!("${position}")),
                })
            }
            _ => Ok(Value::Text(text.to_string())),
        }
    }
}

impl<'a> Filter<RowRef<'a>> for ColumnExpression {
    fn accept(&self, row: &RowRef<'a>) -> Result<bool, Error> {
        let cell = self.cell(row)?;
        let actual = self.cell_value(cell)?;
        self.criterion.evaluate(&actual, None)
    }
}

impl fmt::Display for ColumnExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match self.target {
            ColumnTarget::Name(_) => "ColumnName",
            ColumnTarget::Position(_) => "ColumnPosition",
        };
        write!(f, "{target}{}Expression", self.criterion.operator().type_name())
    }
}

fn checked_target(target: ColumnTarget) -> Result<ColumnTarget, Error> {
    match &target {
        ColumnTarget::Name(name) if name.is_empty() => Err(Error::new(ErrorKind::Argument)
            .with_message("column name must not be empty")),
        _ => Ok(target),
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnExpression, RowRef};
    use crate::core::error::ErrorKind;
    use crate::core::filter::{CellFormat, Filter, Value};

    fn header() -> Vec<String> {
        ["col0", "col1", "col2", "col3", "col4"]
            .map(String::from)
            .to_vec()
    }

    fn values() -> Vec<Option<String>> {
        vec![
            None,
            Some("x001".to_string()),
            Some("x002".to_string()),
            Some("x003".to_string()),
            Some("x004".to_string()),
        ]
    }

    fn accept(expr: &ColumnExpression) -> bool {
        let header = header();
        let values = values();
        expr.accept(&RowRef::new(Some(&header), &values))
            .expect("accept")
    }

    #[test]
    fn name_equal_is_case_sensitive_by_default() {
        assert!(!accept(&ColumnExpression::equal("col0", "x001").unwrap()));
        assert!(accept(&ColumnExpression::equal("col1", "x001").unwrap()));
        assert!(!accept(&ColumnExpression::equal("col2", "x001").unwrap()));
        assert!(!accept(&ColumnExpression::equal("col1", "X001").unwrap()));
        assert!(!accept(
            &ColumnExpression::equal("col1", "X001")
                .unwrap()
                .with_ignore_case(false)
        ));
    }

    #[test]
    fn name_equal_ignore_case() {
        let expr = |col| {
            ColumnExpression::equal(col, "X001")
                .unwrap()
                .with_ignore_case(true)
        };
        assert!(!accept(&expr("col0")));
        assert!(accept(&expr("col1")));
        assert!(!accept(&expr("col2")));
    }

    #[test]
    fn name_less_than() {
        assert!(!accept(&ColumnExpression::less_than("col0", "x002").unwrap()));
        assert!(accept(&ColumnExpression::less_than("col1", "x002").unwrap()));
        assert!(!accept(&ColumnExpression::less_than("col2", "x002").unwrap()));
        assert!(!accept(&ColumnExpression::less_than("col3", "x002").unwrap()));
        assert!(!accept(&ColumnExpression::less_than("col4", "x002").unwrap()));
    }

    #[test]
    fn not_equal_accepts_null_cells() {
        assert!(accept(&ColumnExpression::not_equal("col0", "x001").unwrap()));
        assert!(!accept(&ColumnExpression::not_equal("col1", "x001").unwrap()));
        assert!(accept(&ColumnExpression::not_equal("col2", "x001").unwrap()));
    }

    #[test]
    fn position_equal() {
        let values = vec![None, Some("aaa".to_string()), Some("bbb".to_string())];
        let row = RowRef::values(&values);
        let eq = |pos: usize, value: &str| ColumnExpression::equal(pos, value).unwrap();
        assert!(!eq(0, "aaa").accept(&row).unwrap());
        assert!(eq(1, "aaa").accept(&row).unwrap());
        assert!(!eq(2, "aaa").accept(&row).unwrap());
        assert!(!eq(0, "AAA").with_ignore_case(true).accept(&row).unwrap());
        assert!(eq(1, "AAA").with_ignore_case(true).accept(&row).unwrap());
        assert!(!eq(2, "AAA").with_ignore_case(true).accept(&row).unwrap());
    }

    #[test]
    fn position_not_empty() {
        for first in [None, Some(String::new())] {
            let values = vec![first, Some("aaa".to_string()), Some("bbb".to_string())];
            let row = RowRef::values(&values);
            assert!(!ColumnExpression::not_empty(0usize).unwrap().accept(&row).unwrap());
            assert!(ColumnExpression::not_empty(1usize).unwrap().accept(&row).unwrap());
            assert!(ColumnExpression::not_empty(2usize).unwrap().accept(&row).unwrap());
            assert!(ColumnExpression::empty(0usize).unwrap().accept(&row).unwrap());
        }
    }

    #[test]
    fn position_past_end_reads_as_null() {
        let values = vec![Some("aaa".to_string())];
        let row = RowRef::values(&values);
        assert!(ColumnExpression::null(5usize).unwrap().accept(&row).unwrap());
        assert!(!ColumnExpression::equal(5usize, "aaa").unwrap().accept(&row).unwrap());
    }

    #[test]
    fn null_arguments_are_rejected() {
        let err = ColumnExpression::equal("", "aaa").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        let err = ColumnExpression::equal("col", Value::Null).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        let err = ColumnExpression::less_than("col", None::<String>).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn name_target_without_header_is_argument_error() {
        let values = vec![Some("x".to_string())];
        let err = ColumnExpression::equal("col", "x001")
            .unwrap()
            .accept(&RowRef::values(&values))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn unknown_name_is_argument_error() {
        let header = header();
        let values = values();
        let err = ColumnExpression::equal("missing", "x")
            .unwrap()
            .accept(&RowRef::new(Some(&header), &values))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert_eq!(err.column(), Some("missing"));
    }

    #[test]
    fn formatted_cells_compare_as_numbers() {
        let header = vec!["price".to_string()];
        let values = vec![Some("1088.70".to_string())];
        let row = RowRef::new(Some(&header), &values);
        let lt = ColumnExpression::less_than("price", 1098.0)
            .unwrap()
            .with_format(CellFormat::Number);
        assert!(lt.accept(&row).unwrap());
        // Lexicographically "1088.70" > "200" but numerically it is not.
        let gt = ColumnExpression::greater_than("price", 200)
            .unwrap()
            .with_format(CellFormat::Number);
        assert!(gt.accept(&row).unwrap());
    }

    #[test]
    fn formatted_cells_compare_as_dates() {
        let header = vec!["date".to_string()];
        let values = vec![Some("2009/11/06".to_string())];
        let row = RowRef::new(Some(&header), &values);
        let format = CellFormat::date_time("[year]/[month]/[day]").unwrap();
        let bound = format.parse("2009/12/06").unwrap();
        let lt = ColumnExpression::less_than("date", bound)
            .unwrap()
            .with_format(format);
        assert!(lt.accept(&row).unwrap());
    }

    #[test]
    fn unparseable_formatted_cell_is_conversion_error() {
        let header = vec!["price".to_string()];
        let values = vec![Some("n/a".to_string())];
        let err = ColumnExpression::equal("price", 1.0)
            .unwrap()
            .with_format(CellFormat::Number)
            .accept(&RowRef::new(Some(&header), &values))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
        assert_eq!(err.column(), Some("price"));
    }

    #[test]
    fn display_is_the_type_name() {
        assert_eq!(
            ColumnExpression::equal("col", "x001").unwrap().to_string(),
            "ColumnNameEqualExpression"
        );
        assert_eq!(
            ColumnExpression::less_than("col", "x001").unwrap().to_string(),
            "ColumnNameLessThanExpression"
        );
        assert_eq!(
            ColumnExpression::equal(0usize, "aaa").unwrap().to_string(),
            "ColumnPositionEqualExpression"
        );
        assert_eq!(
            ColumnExpression::not_empty(0usize).unwrap().to_string(),
            "ColumnPositionNotEmptyExpression"
        );
    }
}
