//! Query model and client-side evaluation
//!
//! The same evaluator backs the in-memory store and the degraded query path,
//! so both produce identical filtering, ordering and truncation.

use std::cmp::Ordering;

use serde_json::Value;

use super::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FilterOp {
    pub fn is_equality(&self) -> bool {
        matches!(self, FilterOp::Eq)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "==",
            FilterOp::Lt => "<",
            FilterOp::Le => "<=",
            FilterOp::Gt => ">",
            FilterOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Missing or null fields never satisfy a range filter
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.get(&self.field).filter(|v| !v.is_null()) else {
            return self.op.is_equality() && self.value.is_null();
        };
        match self.op {
            FilterOp::Eq => compare_values(actual, &self.value) == Some(Ordering::Equal),
            FilterOp::Lt => compare_values(actual, &self.value) == Some(Ordering::Less),
            FilterOp::Le => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            FilterOp::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
            FilterOp::Ge => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Filtered, ordered, limited query over one collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(field, op, value));
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn has_eq_filter(&self, field: &str) -> bool {
        self.filters
            .iter()
            .any(|f| f.op.is_equality() && f.field == field)
    }

    /// Same query keeping only the equality filters (no order, no limit)
    pub fn equality_only(&self) -> Query {
        Query {
            filters: self
                .filters
                .iter()
                .filter(|f| f.op.is_equality())
                .cloned()
                .collect(),
            order_by: None,
            limit: None,
        }
    }

    /// Fields a composite index must cover, or `None` when the query can be
    /// served by single-field indexes (pure equality, or a single field).
    pub fn composite_index_fields(&self) -> Option<Vec<String>> {
        let mut eq: Vec<&str> = Vec::new();
        let mut ranged: Vec<&str> = Vec::new();
        for f in &self.filters {
            let bucket = if f.op.is_equality() { &mut eq } else { &mut ranged };
            if !bucket.contains(&f.field.as_str()) {
                bucket.push(&f.field);
            }
        }
        if let Some(order) = &self.order_by
            && !ranged.contains(&order.field.as_str())
        {
            ranged.push(&order.field);
        }

        if ranged.is_empty() {
            return None;
        }
        let distinct = eq.iter().chain(ranged.iter()).collect::<std::collections::HashSet<_>>();
        if distinct.len() < 2 {
            return None;
        }

        eq.sort_unstable();
        let mut fields: Vec<String> = eq.into_iter().map(String::from).collect();
        fields.extend(ranged.into_iter().map(String::from));
        Some(fields)
    }

    /// Apply filters, ordering and limit (limit last)
    pub fn apply(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs
            .into_iter()
            .filter(|doc| self.filters.iter().all(|f| f.matches(doc)))
            .collect();

        if let Some(order) = &self.order_by {
            // Documents without the order field are excluded, like an indexed scan
            out.retain(|doc| doc.get(&order.field).is_some_and(|v| !v.is_null()));
            out.sort_by(|a, b| {
                let ord = match (a.get(&order.field), b.get(&order.field)) {
                    (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                    _ => Ordering::Equal,
                };
                let ord = match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                };
                ord.then_with(|| a.id.cmp(&b.id))
            });
        } else {
            out.sort_by(|a, b| a.id.cmp(&b.id));
        }

        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Interpret a value as a timestamp in epoch millis.
///
/// Numbers are taken as millis; strings must be RFC 3339.
pub fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}

/// Canonical ordering across the value shapes documents carry.
///
/// Timestamps written as RFC 3339 strings compare against numeric millis by
/// converting the string; values of unrelated types are incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                Some(x.cmp(&y))
            } else {
                x.as_f64()?.partial_cmp(&y.as_f64()?)
            }
        }
        (Value::String(x), Value::String(y)) => {
            match (timestamp_millis(a), timestamp_millis(b)) {
                (Some(x), Some(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            Some(timestamp_millis(a)?.cmp(&timestamp_millis(b)?))
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => (a == b).then_some(Ordering::Equal),
    }
}
