//! Purpose: Compile and evaluate `csvcursor scan --where` expressions against CSV rows.
//! Exports: `WherePredicate`, `compile_where_predicates`, `ensure_columns_exist`, `all_of`.
//! Role: Small text front-end over `ColumnExpression` so the CLI can filter without code.
//! Invariants: Parse failures and unknown columns are usage errors, reported before scanning.
//! Invariants: Runtime conversion errors (unparseable cells) evaluate to "no match".
//!
//! Grammar: `<col> <op> <value>` with `op` in `== != < <= > >= =~`, or
//! `<col> is [not] empty|null`. `<col>` is a header name or `$N` (0-based).
//! Unquoted numeric values compare numerically; `"..."` forces text.

use std::fmt;

use csvcursor::api::{
    CellFormat, ColumnExpression, ColumnTarget, Error, ErrorKind, Filter, Logical, Operator,
    RowRef, Value,
};

#[derive(Clone, Debug)]
pub struct WherePredicate {
    expr: String,
    filter: ColumnExpression,
}

impl WherePredicate {
    pub fn expr(&self) -> &str {
        &self.expr
    }
}

impl fmt::Display for WherePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.filter, f)
    }
}

impl<'a> Filter<RowRef<'a>> for WherePredicate {
    fn accept(&self, row: &RowRef<'a>) -> Result<bool, Error> {
        match self.filter.accept(row) {
            Ok(matched) => Ok(matched),
            Err(err) if err.kind() == ErrorKind::Conversion => Ok(false),
            Err(err) => Err(err),
        }
    }
}

pub fn compile_where_predicates(exprs: &[String]) -> Result<Vec<WherePredicate>, Error> {
    exprs
        .iter()
        .map(|expr| compile_where_predicate(expr))
        .collect()
}

pub fn all_of(predicates: Vec<WherePredicate>) -> Logical<WherePredicate> {
    Logical::All(predicates.into_iter().map(Logical::Test).collect())
}

/// Name targets must exist in the header; positions are allowed to run past ragged rows.
pub fn ensure_columns_exist(predicates: &[WherePredicate], header: &[String]) -> Result<(), Error> {
    for predicate in predicates {
        if let ColumnTarget::Name(name) = predicate.filter.target() {
            if !header.iter().any(|column| column == name) {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(format!(
                        "unknown column in --where expression `{}`",
                        predicate.expr()
                    ))
                    .with_column(name.clone())
                    .with_hint(format!("Available columns: {}", header.join(", "))));
            }
        }
    }
    Ok(())
}

const OPERATORS: [(&str, Operator); 7] = [
    ("==", Operator::Equal),
    ("!=", Operator::NotEqual),
    ("<=", Operator::LessThanOrEqual),
    (">=", Operator::GreaterThanOrEqual),
    ("=~", Operator::Equal),
    ("<", Operator::LessThan),
    (">", Operator::GreaterThan),
];

fn compile_where_predicate(expr: &str) -> Result<WherePredicate, Error> {
    let filter = match parse_unary(expr)? {
        Some(filter) => filter,
        None => parse_binary(expr)?,
    };
    Ok(WherePredicate {
        expr: expr.to_string(),
        filter,
    })
}

fn parse_unary(expr: &str) -> Result<Option<ColumnExpression>, Error> {
    let lowered = expr.to_ascii_lowercase();
    let checks = [
        (" is not empty", Operator::NotEmpty),
        (" is not null", Operator::NotNull),
        (" is empty", Operator::Empty),
        (" is null", Operator::Null),
    ];
    for (suffix, operator) in checks {
        if lowered.trim_end().ends_with(suffix) {
            let column = &expr.trim_end()[..lowered.trim_end().len() - suffix.len()];
            let target = parse_target(expr, column)?;
            let filter = ColumnExpression::new(target, operator, Value::Null)
                .map_err(|err| where_error(expr, err))?;
            return Ok(Some(filter));
        }
    }
    Ok(None)
}

fn parse_binary(expr: &str) -> Result<ColumnExpression, Error> {
    let (at, token, operator) = find_operator(expr).ok_or_else(|| {
        where_usage(expr, "missing comparison operator")
    })?;
    let target = parse_target(expr, &expr[..at])?;
    let raw = expr[at + token.len()..].trim();
    if raw.is_empty() {
        return Err(where_usage(expr, "missing comparison value"));
    }

    let (value, format) = parse_literal(raw);
    let mut filter =
        ColumnExpression::new(target, operator, value).map_err(|err| where_error(expr, err))?;
    if token == "=~" {
        filter = filter.with_ignore_case(true);
    }
    if let Some(format) = format {
        filter = filter.with_format(format);
    }
    Ok(filter)
}

/// Leftmost operator wins; two-character tokens are tried before their prefixes.
fn find_operator(expr: &str) -> Option<(usize, &'static str, Operator)> {
    let mut in_quotes = false;
    for (at, ch) in expr.char_indices() {
        if ch == '"' {
            in_quotes = !in_quotes;
        }
        if in_quotes {
            continue;
        }
        for (token, operator) in OPERATORS {
            if expr[at..].starts_with(token) {
                return Some((at, token, operator));
            }
        }
    }
    None
}

fn parse_target(expr: &str, column: &str) -> Result<ColumnTarget, Error> {
    let column = column.trim();
    if column.is_empty() {
        return Err(where_usage(expr, "missing column"));
    }
    if let Some(position) = column.strip_prefix('$') {
        return position
            .parse::<usize>()
            .map(ColumnTarget::Position)
            .map_err(|_| where_usage(expr, "column position must be `$` followed by a number"));
    }
    Ok(ColumnTarget::Name(column.to_string()))
}

fn parse_literal(raw: &str) -> (Value, Option<CellFormat>) {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return (Value::Text(raw[1..raw.len() - 1].to_string()), None);
    }
    if let Ok(integer) = raw.parse::<i64>() {
        return (Value::Integer(integer), Some(CellFormat::Number));
    }
    if let Ok(number) = raw.parse::<f64>() {
        if number.is_finite() {
            return (Value::Number(number), Some(CellFormat::Number));
        }
    }
    (Value::Text(raw.to_string()), None)
}

fn where_usage(expr: &str, message: &str) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message(format!("invalid --where expression: {message}"))
        .with_hint(format!(
            "Failed to parse `{expr}`.\nExample: --where 'price < 1000' or --where 'name is not empty'"
        ))
}

fn where_error(expr: &str, err: Error) -> Error {
    let message = err.message().unwrap_or("invalid expression").to_string();
    where_usage(expr, &message).with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{all_of, compile_where_predicates, ensure_columns_exist};
    use csvcursor::api::{ErrorKind, Filter, RowRef};

    fn header() -> Vec<String> {
        ["code", "name", "price"].map(String::from).to_vec()
    }

    fn row(values: [Option<&str>; 3]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(String::from)).collect()
    }

    fn matches(exprs: &[&str], values: [Option<&str>; 3]) -> bool {
        let exprs: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
        let preds = all_of(compile_where_predicates(&exprs).unwrap());
        let header = header();
        let values = row(values);
        preds
            .accept(&RowRef::new(Some(header.as_slice()), &values))
            .unwrap()
    }

    #[test]
    fn where_matches_simple_equality() {
        assert!(matches(&["name == gold"], [Some("1"), Some("gold"), None]));
        assert!(!matches(&["name == Gold"], [Some("1"), Some("gold"), None]));
        assert!(matches(&["name =~ Gold"], [Some("1"), Some("gold"), None]));
    }

    #[test]
    fn where_numeric_literals_compare_numerically() {
        assert!(matches(&["price > 200"], [Some("1"), None, Some("1088.70")]));
        assert!(!matches(&["price > \"200\""], [Some("1"), None, Some("1088.70")]));
    }

    #[test]
    fn where_unparseable_cell_is_false() {
        assert!(!matches(&["price < 10"], [Some("1"), None, Some("n/a")]));
    }

    #[test]
    fn where_unary_checks_and_positions() {
        assert!(matches(&["price is null"], [Some("1"), None, None]));
        assert!(matches(&["name IS EMPTY"], [Some("1"), Some(""), None]));
        assert!(matches(&["$0 is not empty", "$0 == 1"], [Some("1"), None, None]));
        assert!(!matches(&["$1 is not null"], [Some("1"), None, None]));
    }

    #[test]
    fn where_parse_failures_are_usage_errors() {
        for expr in ["price", "< 3", "price <", "$x == 1"] {
            let err = compile_where_predicates(&[expr.to_string()]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Usage, "{expr}");
        }
    }

    #[test]
    fn where_unknown_column_is_usage_error() {
        let preds = compile_where_predicates(&["volume > 1".to_string()]).unwrap();
        let err = ensure_columns_exist(&preds, &header()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.column(), Some("volume"));
        assert!(err.message().unwrap().contains("`volume > 1`"));
        assert_eq!(preds[0].expr(), "volume > 1");
    }
}
