//! Composable, parameterized WHERE clauses for list endpoints.
//!
//! Column names are `&'static str` picked in code; every caller-supplied value
//! is pushed as a bind parameter. The generated SQL can be inspected with
//! [`QueryBuilder::sql`] without a database connection.

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        FilterValue::Text(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        FilterValue::Text(v.to_string())
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        FilterValue::Int(v)
    }
}

impl From<Uuid> for FilterValue {
    fn from(v: Uuid) -> Self {
        FilterValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(v: DateTime<Utc>) -> Self {
        FilterValue::Timestamp(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    EqIgnoreCase,
    Gte,
    Lte,
}

#[derive(Debug, Clone)]
struct Predicate {
    column: &'static str,
    op: Op,
    value: FilterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    predicates: Vec<Predicate>,
    order_by: Option<(&'static str, SortOrder)>,
    limit: Option<i64>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, column: &'static str, op: Op, value: FilterValue) -> Self {
        self.predicates.push(Predicate { column, op, value });
        self
    }

    pub fn eq(self, column: &'static str, value: impl Into<FilterValue>) -> Self {
        self.push(column, Op::Eq, value.into())
    }

    /// Adds `column = value` only when a value is present.
    pub fn eq_opt<V: Into<FilterValue>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    pub fn eq_ignore_case(self, column: &'static str, value: impl Into<FilterValue>) -> Self {
        self.push(column, Op::EqIgnoreCase, value.into())
    }

    pub fn gte(self, column: &'static str, value: impl Into<FilterValue>) -> Self {
        self.push(column, Op::Gte, value.into())
    }

    pub fn lte(self, column: &'static str, value: impl Into<FilterValue>) -> Self {
        self.push(column, Op::Lte, value.into())
    }

    pub fn order_by(mut self, column: &'static str, order: SortOrder) -> Self {
        self.order_by = Some((column, order));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Append the predicates, ordering and limit to `select`.
    pub fn build(&self, select: &str) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::<Postgres>::new(select);

        for (i, p) in self.predicates.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            match p.op {
                Op::Eq => {
                    qb.push(p.column).push(" = ");
                    push_value(&mut qb, &p.value);
                }
                Op::EqIgnoreCase => {
                    qb.push("UPPER(").push(p.column).push(") = UPPER(");
                    push_value(&mut qb, &p.value);
                    qb.push(")");
                }
                Op::Gte => {
                    qb.push(p.column).push(" >= ");
                    push_value(&mut qb, &p.value);
                }
                Op::Lte => {
                    qb.push(p.column).push(" <= ");
                    push_value(&mut qb, &p.value);
                }
            }
        }

        if let Some((column, order)) = self.order_by {
            qb.push(" ORDER BY ").push(column).push(match order {
                SortOrder::Asc => " ASC",
                SortOrder::Desc => " DESC",
            });
        }

        if let Some(limit) = self.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        qb
    }
}

fn push_value(qb: &mut QueryBuilder<'static, Postgres>, value: &FilterValue) {
    match value {
        FilterValue::Text(v) => qb.push_bind(v.clone()),
        FilterValue::Int(v) => qb.push_bind(*v),
        FilterValue::Uuid(v) => qb.push_bind(*v),
        FilterValue::Timestamp(v) => qb.push_bind(*v),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_predicates_leaves_select_untouched() {
        let qb = FilterBuilder::new().build("SELECT * FROM stock_orders");
        assert_eq!(qb.sql(), "SELECT * FROM stock_orders");
    }

    #[test]
    fn test_predicates_are_bound_in_order() {
        let qb = FilterBuilder::new()
            .eq("portfolio_id", Uuid::nil())
            .eq("status", "PENDING")
            .eq_ignore_case("symbol", "infy")
            .build("SELECT * FROM stock_orders");

        assert_eq!(
            qb.sql(),
            "SELECT * FROM stock_orders WHERE portfolio_id = $1 AND status = $2 \
             AND UPPER(symbol) = UPPER($3)"
        );
    }

    #[test]
    fn test_optional_predicate_skipped_when_none() {
        let qb = FilterBuilder::new()
            .eq("portfolio_id", Uuid::nil())
            .eq_opt::<String>("type", None)
            .order_by("timestamp", SortOrder::Desc)
            .limit(50)
            .build("SELECT * FROM transactions");

        assert_eq!(
            qb.sql(),
            "SELECT * FROM transactions WHERE portfolio_id = $1 ORDER BY timestamp DESC LIMIT $2"
        );
    }

    #[test]
    fn test_caller_text_never_reaches_sql() {
        let hostile = "x'; DROP TABLE transactions; --";
        let qb = FilterBuilder::new()
            .eq("symbol", hostile)
            .gte("timestamp", Utc::now())
            .build("SELECT * FROM transactions");

        assert!(!qb.sql().contains("DROP"));
        assert_eq!(
            qb.sql(),
            "SELECT * FROM transactions WHERE symbol = $1 AND timestamp >= $2"
        );
    }
}
