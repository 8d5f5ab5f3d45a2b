// Bean expressions: single-property tests over records exposing named, typed properties.
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::core::error::{Error, ErrorKind};
use crate::core::filter::value::{Comparator, Value};
use crate::core::filter::{Criterion, Filter, Operator};

/// Named property access for filtering. `None` means the property does not exist.
pub trait Bean {
    fn property(&self, name: &str) -> Option<Value>;
}

impl Bean for serde_json::Map<String, serde_json::Value> {
    fn property(&self, name: &str) -> Option<Value> {
        self.get(name).map(Value::from)
    }
}

impl Bean for serde_json::Value {
    fn property(&self, name: &str) -> Option<Value> {
        self.as_object().and_then(|object| object.property(name))
    }
}

impl Bean for BTreeMap<String, Value> {
    fn property(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl Bean for HashMap<String, Value> {
    fn property(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

#[derive(Clone)]
pub struct BeanExpression {
    property: String,
    criterion: Criterion,
    comparator: Option<Comparator>,
}

impl fmt::Debug for BeanExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanExpression")
            .field("property", &self.property)
            .field("criterion", &self.criterion)
            .field("comparator", &self.comparator.is_some())
            .finish()
    }
}

impl BeanExpression {
    pub fn new(
        property: impl Into<String>,
        operator: Operator,
        operand: impl Into<Value>,
    ) -> Result<Self, Error> {
        let property = property.into();
        if property.is_empty() {
            return Err(
                Error::new(ErrorKind::Argument).with_message("property name must not be empty")
            );
        }
        let criterion = if operator.takes_operand() {
            Criterion::new(operator, operand.into())?
        } else {
            Criterion::unary(operator)
        };
        Ok(Self {
            property,
            criterion,
            comparator: None,
        })
    }

    pub fn equal(property: impl Into<String>, value: impl Into<Value>) -> Result<Self, Error> {
        Self::new(property, Operator::Equal, value)
    }

    pub fn not_equal(property: impl Into<String>, value: impl Into<Value>) -> Result<Self, Error> {
        Self::new(property, Operator::NotEqual, value)
    }

    pub fn less_than(property: impl Into<String>, value: impl Into<Value>) -> Result<Self, Error> {
        Self::new(property, Operator::LessThan, value)
    }

    pub fn less_than_or_equal(
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, Error> {
        Self::new(property, Operator::LessThanOrEqual, value)
    }

    pub fn greater_than(
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, Error> {
        Self::new(property, Operator::GreaterThan, value)
    }

    pub fn greater_than_or_equal(
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Self, Error> {
        Self::new(property, Operator::GreaterThanOrEqual, value)
    }

    pub fn empty(property: impl Into<String>) -> Result<Self, Error> {
        Self::new(property, Operator::Empty, Value::Null)
    }

    pub fn not_empty(property: impl Into<String>) -> Result<Self, Error> {
        Self::new(property, Operator::NotEmpty, Value::Null)
    }

    pub fn null(property: impl Into<String>) -> Result<Self, Error> {
        Self::new(property, Operator::Null, Value::Null)
    }

    pub fn not_null(property: impl Into<String>) -> Result<Self, Error> {
        Self::new(property, Operator::NotNull, Value::Null)
    }

    pub fn with_ignore_case(mut self, ignore_case: bool) -> Self {
        self.criterion.set_ignore_case(ignore_case);
        self
    }

    /// Replaces natural ordering; `None` restores it.
    pub fn with_comparator(mut self, comparator: Option<Comparator>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn operator(&self) -> Operator {
        self.criterion.operator()
    }
}

impl<B: Bean + ?Sized> Filter<B> for BeanExpression {
    fn accept(&self, bean: &B) -> Result<bool, Error> {
        let actual = bean.property(&self.property).ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message("no such property")
                .with_column(self.property.clone())
        })?;
        self.criterion
            .evaluate(&actual, self.comparator.as_ref())
            .map_err(|err| err.with_column(self.property.clone()))
    }
}

impl fmt::Display for BeanExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bean{}Expression", self.criterion.operator().type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::{Bean, BeanExpression};
    use crate::core::error::ErrorKind;
    use crate::core::filter::{Comparator, Filter, Value};
    use serde_json::json;
    use std::sync::Arc;
    use time::PrimitiveDateTime;
    use time::macros::datetime;

    struct Price {
        symbol: Option<String>,
        name: Option<String>,
        price: Option<f64>,
        volume: i64,
        date: Option<PrimitiveDateTime>,
    }

    impl Price {
        fn new(
            symbol: Option<&str>,
            name: Option<&str>,
            price: Option<f64>,
            date: Option<PrimitiveDateTime>,
        ) -> Self {
            Self {
                symbol: symbol.map(String::from),
                name: name.map(String::from),
                price,
                volume: 100,
                date,
            }
        }

        fn gold() -> Self {
            Self::new(
                Some("GCX09"),
                Some("COMEX 金 2009年11月限"),
                Some(1088.70),
                Some(datetime!(2009-11-06 19:14:46)),
            )
        }
    }

    impl Bean for Price {
        fn property(&self, name: &str) -> Option<Value> {
            match name {
                "symbol" => Some(self.symbol.clone().into()),
                "name" => Some(self.name.clone().into()),
                "price" => Some(self.price.into()),
                "volume" => Some(self.volume.into()),
                "date" => Some(self.date.into()),
                _ => None,
            }
        }
    }

    #[test]
    fn empty_matches_null_and_empty_text() {
        let now = Some(datetime!(2026-01-01 0:00));
        let name = Some("COMEX 金 2009年11月限");
        let empty = |prop: &str| BeanExpression::empty(prop).unwrap();

        assert!(empty("symbol").accept(&Price::new(None, name, Some(1088.70), now)).unwrap());
        assert!(empty("symbol").accept(&Price::new(Some(""), name, Some(1088.70), now)).unwrap());
        assert!(!empty("symbol").accept(&Price::gold()).unwrap());
        assert!(empty("name").accept(&Price::new(Some("GCX09"), None, None, now)).unwrap());
        assert!(empty("price").accept(&Price::new(Some("GCX09"), name, None, now)).unwrap());
        assert!(!empty("price").accept(&Price::gold()).unwrap());
        assert!(empty("date").accept(&Price::new(Some("GCX09"), name, Some(1.0), None)).unwrap());
        assert!(!empty("date").accept(&Price::gold()).unwrap());
    }

    #[test]
    fn less_than_numbers_and_dates() {
        let price = Price::gold();
        let lt = |prop: &str, value: Value| BeanExpression::less_than(prop, value).unwrap();

        assert!(lt("price", 1098.00.into()).accept(&price).unwrap());
        assert!(!lt("price", 1088.70.into()).accept(&price).unwrap());
        assert!(!lt("price", 1088.00.into()).accept(&price).unwrap());
        assert!(lt("date", datetime!(2009-12-06 0:00).into()).accept(&price).unwrap());
        assert!(!lt("date", datetime!(2009-11-06 19:14:46).into()).accept(&price).unwrap());
        assert!(!lt("date", datetime!(2009-10-06 0:00).into()).accept(&price).unwrap());

        let natural = lt("price", 1098.00.into()).with_comparator(None);
        assert!(natural.accept(&price).unwrap());
    }

    #[test]
    fn custom_comparator_replaces_natural_order() {
        let reversed: Comparator = Arc::new(|a: &Value, b: &Value| {
            b.compare(a, false).unwrap_or(std::cmp::Ordering::Equal)
        });
        let expr = BeanExpression::less_than("price", 1000.0)
            .unwrap()
            .with_comparator(Some(reversed));
        assert!(expr.accept(&Price::gold()).unwrap());
    }

    #[test]
    fn not_equal_with_case_handling() {
        let price = Price::gold();
        let ne = |prop: &str, value: Value| BeanExpression::not_equal(prop, value).unwrap();

        assert!(ne("symbol", "SIX09".into()).accept(&price).unwrap());
        assert!(!ne("symbol", "GCX09".into()).accept(&price).unwrap());
        assert!(ne("symbol", "gcx09".into()).accept(&price).unwrap());
        assert!(ne("symbol", "six09".into()).with_ignore_case(true).accept(&price).unwrap());
        assert!(!ne("symbol", "gcx09".into()).with_ignore_case(true).accept(&price).unwrap());
        assert!(ne("price", 1088.00.into()).accept(&price).unwrap());
        assert!(!ne("price", 1088.70.into()).accept(&price).unwrap());
        assert!(ne("date", datetime!(2026-10-18 0:00).into()).accept(&price).unwrap());
        assert!(!ne("date", datetime!(2009-11-06 19:14:46).into()).accept(&price).unwrap());
    }

    #[test]
    fn integer_property_compares_with_float_operand() {
        let expr = BeanExpression::greater_than_or_equal("volume", 99.5).unwrap();
        assert!(expr.accept(&Price::gold()).unwrap());
    }

    #[test]
    fn null_arguments_are_rejected() {
        assert_eq!(
            BeanExpression::not_equal("", "aaa").unwrap_err().kind(),
            ErrorKind::Argument
        );
        assert_eq!(
            BeanExpression::less_than("price", Value::Null).unwrap_err().kind(),
            ErrorKind::Argument
        );
        assert_eq!(BeanExpression::empty("").unwrap_err().kind(), ErrorKind::Argument);
    }

    #[test]
    fn missing_property_is_not_found() {
        let err = BeanExpression::equal("isin", "x")
            .unwrap()
            .accept(&Price::gold())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn ordering_across_kinds_is_conversion_error() {
        let err = BeanExpression::less_than("symbol", 5)
            .unwrap()
            .accept(&Price::gold())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conversion);
    }

    #[test]
    fn json_objects_are_beans() {
        let record = json!({"symbol": "GCX09", "price": 1088.7, "note": null});
        assert!(BeanExpression::equal("symbol", "GCX09").unwrap().accept(&record).unwrap());
        assert!(BeanExpression::empty("note").unwrap().accept(&record).unwrap());
        assert!(BeanExpression::less_than("price", 1100).unwrap().accept(&record).unwrap());
    }

    #[test]
    fn display_is_the_type_name() {
        assert_eq!(
            BeanExpression::empty("symbol").unwrap().to_string(),
            "BeanEmptyExpression"
        );
        assert_eq!(
            BeanExpression::less_than("price", 1098.00).unwrap().to_string(),
            "BeanLessThanExpression"
        );
        assert_eq!(
            BeanExpression::not_equal("symbol", "GCX09").unwrap().to_string(),
            "BeanNotEqualExpression"
        );
    }
}
