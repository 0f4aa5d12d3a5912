//! Query description shared by every `Store` implementation

use serde_json::Value;
use std::cmp::Ordering;

use super::filter::{compare_values, Filter, FilterOperator, FilterValue};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Columns, filters, ordering and limit for a table request.
///
/// A column may carry several filters; all of them must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    columns: Option<String>,
    filters: Vec<Filter>,
    order: Vec<(String, SortOrder)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the returned columns (PostgREST `select=` syntax)
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    fn push<T: ToString>(mut self, column: &str, operator: FilterOperator, value: T) -> Self {
        self.filters.push(Filter::new(
            column,
            operator,
            FilterValue::Scalar(value.to_string()),
        ));
        self
    }

    /// Add a filter condition (column = value)
    pub fn eq<T: ToString>(self, column: &str, value: T) -> Self {
        self.push(column, FilterOperator::Eq, value)
    }

    /// Add a filter condition (column != value)
    pub fn neq<T: ToString>(self, column: &str, value: T) -> Self {
        self.push(column, FilterOperator::Neq, value)
    }

    /// Add a filter condition (column > value)
    pub fn gt<T: ToString>(self, column: &str, value: T) -> Self {
        self.push(column, FilterOperator::Gt, value)
    }

    /// Add a filter condition (column >= value)
    pub fn gte<T: ToString>(self, column: &str, value: T) -> Self {
        self.push(column, FilterOperator::Gte, value)
    }

    /// Add a filter condition (column < value)
    pub fn lt<T: ToString>(self, column: &str, value: T) -> Self {
        self.push(column, FilterOperator::Lt, value)
    }

    /// Add a filter condition (column <= value)
    pub fn lte<T: ToString>(self, column: &str, value: T) -> Self {
        self.push(column, FilterOperator::Lte, value)
    }

    /// Add a filter condition (column is null)
    pub fn is_null(mut self, column: &str) -> Self {
        self.filters
            .push(Filter::new(column, FilterOperator::Is, FilterValue::Null));
        self
    }

    /// Add a filter condition (column in values)
    pub fn in_list<I, T>(mut self, column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        let values = values.into_iter().map(|v| v.to_string()).collect();
        self.filters.push(Filter::new(
            column,
            FilterOperator::In,
            FilterValue::List(values),
        ));
        self
    }

    /// Order the results by a column
    pub fn order(mut self, column: &str, order: SortOrder) -> Self {
        self.order.push((column.to_string(), order));
        self
    }

    /// Limit the number of rows returned
    pub fn limit(mut self, count: usize) -> Self {
        self.limit = Some(count);
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn has_filters(&self) -> bool {
        !self.filters.is_empty()
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    /// Filter parameters only, for mutations
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters.iter().map(Filter::to_param).collect()
    }

    /// Full parameter list for a read
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![(
            "select".to_string(),
            self.columns.clone().unwrap_or_else(|| "*".to_string()),
        )];
        params.extend(self.filter_params());

        if !self.order.is_empty() {
            let order: Vec<String> = self
                .order
                .iter()
                .map(|(column, order)| match order {
                    SortOrder::Ascending => format!("{}.asc", column),
                    SortOrder::Descending => format!("{}.desc", column),
                })
                .collect();
            params.push(("order".to_string(), order.join(",")));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// Whether every filter holds for the row
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Apply ordering and limit to rows that already passed `matches`
    pub fn arrange(&self, mut rows: Vec<Value>) -> Vec<Value> {
        if !self.order.is_empty() {
            rows.sort_by(|a, b| {
                for (column, order) in &self.order {
                    let left = a.get(column).unwrap_or(&Value::Null);
                    let right = b.get(column).unwrap_or(&Value::Null);
                    let ordering = match order {
                        SortOrder::Ascending => compare_values(left, right),
                        SortOrder::Descending => compare_values(right, left),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}
