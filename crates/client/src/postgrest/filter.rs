//! Row filters in PostgREST's `column=op.value` form

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::cmp::Ordering;

/// Operator for filter expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to
    Eq,

    /// Not equal to
    Neq,

    /// Greater than
    Gt,

    /// Greater than or equal to
    Gte,

    /// Less than
    Lt,

    /// Less than or equal to
    Lte,

    /// Is (null, true, false)
    Is,

    /// In a list of values
    In,
}

impl FilterOperator {
    /// Convert the operator to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Is => "is",
            FilterOperator::In => "in",
        }
    }
}

/// Right-hand side of a filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Scalar(String),
    List(Vec<String>),
    Null,
}

/// A single `column op value` condition
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(column: &str, operator: FilterOperator, value: FilterValue) -> Self {
        Self {
            column: column.to_string(),
            operator,
            value,
        }
    }

    /// Render as a query parameter pair
    pub fn to_param(&self) -> (String, String) {
        let rendered = match &self.value {
            FilterValue::Scalar(v) => v.clone(),
            FilterValue::Null => "null".to_string(),
            FilterValue::List(values) => {
                let items: Vec<String> = values.iter().map(|v| quote_list_item(v)).collect();
                format!("({})", items.join(","))
            }
        };
        (
            self.column.clone(),
            format!("{}.{}", self.operator.as_str(), rendered),
        )
    }

    /// Evaluate the filter against a JSON row the way Postgres would.
    ///
    /// Comparisons against a missing or null column are false except for `is.null`.
    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(&self.column).unwrap_or(&Value::Null);

        match (&self.operator, &self.value) {
            (FilterOperator::Is, FilterValue::Null) => field.is_null(),
            (FilterOperator::Is, FilterValue::Scalar(v)) => match field {
                Value::Bool(b) => v.eq_ignore_ascii_case(&b.to_string()),
                _ => false,
            },
            (FilterOperator::In, FilterValue::List(values)) => values
                .iter()
                .any(|v| compare(field, v) == Some(Ordering::Equal)),
            (op, FilterValue::Scalar(v)) => match compare(field, v) {
                Some(ordering) => match op {
                    FilterOperator::Eq => ordering == Ordering::Equal,
                    FilterOperator::Neq => ordering != Ordering::Equal,
                    FilterOperator::Gt => ordering == Ordering::Greater,
                    FilterOperator::Gte => ordering != Ordering::Less,
                    FilterOperator::Lt => ordering == Ordering::Less,
                    FilterOperator::Lte => ordering != Ordering::Greater,
                    FilterOperator::Is | FilterOperator::In => false,
                },
                None => false,
            },
            _ => false,
        }
    }
}

fn quote_list_item(value: &str) -> String {
    if value.contains([',', '(', ')', '"']) {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

fn parse_instant(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).ok()
}

/// Compare a stored JSON value with a filter operand.
///
/// Timestamps compare as instants, numbers numerically, everything else as text.
pub fn compare(field: &Value, operand: &str) -> Option<Ordering> {
    match field {
        Value::Null => None,
        Value::String(s) => match (parse_instant(s), parse_instant(operand)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(s.as_str().cmp(operand)),
        },
        Value::Number(n) => {
            let a = n.as_f64()?;
            let b = operand.parse::<f64>().ok()?;
            a.partial_cmp(&b)
        }
        Value::Bool(b) => Some(b.to_string().as_str().cmp(operand)),
        other => Some(other.to_string().as_str().cmp(operand)),
    }
}

/// Compare two stored JSON values for ordering rows
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        // Postgres sorts nulls last in ascending order
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (_, Value::String(s)) => compare(a, s).unwrap_or(Ordering::Equal),
        (_, other) => compare(a, &other.to_string()).unwrap_or(Ordering::Equal),
    }
}
