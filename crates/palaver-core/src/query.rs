//! Declarative query descriptor types.
//!
//! The filter is a tagged tree of comparison and logical nodes, so
//! unsupported shapes are an exhaustive-match case rather than a runtime
//! attribute probe.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Comparison operators expressible in a filter clause.
///
/// Only the six comparison operators can be extracted into predicates;
/// `Between`, `In` and `Like` exist so a descriptor can carry them and the
/// extractor can reject them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CmpOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Between,
    In,
    Like,
}

impl CmpOp {
    /// The SQL-ish symbol for this operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Neq => "!=",
            CmpOp::Gt => ">",
            CmpOp::Gte => ">=",
            CmpOp::Lt => "<",
            CmpOp::Lte => "<=",
            CmpOp::Between => "BETWEEN",
            CmpOp::In => "IN",
            CmpOp::Like => "LIKE",
        }
    }

    /// Whether this is one of the six plain comparisons.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            CmpOp::Eq | CmpOp::Neq | CmpOp::Gt | CmpOp::Gte | CmpOp::Lt | CmpOp::Lte
        )
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A filter clause: binary comparisons combined by conjunction or
/// disjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterExpr {
    Cmp {
        op: CmpOp,
        field: String,
        value: Value,
    },
    And {
        left: Box<FilterExpr>,
        right: Box<FilterExpr>,
    },
    Or {
        left: Box<FilterExpr>,
        right: Box<FilterExpr>,
    },
}

impl FilterExpr {
    /// A single comparison node.
    pub fn cmp(op: CmpOp, field: impl Into<String>, value: impl Into<Value>) -> Self {
        FilterExpr::Cmp {
            op,
            field: field.into(),
            value: value.into(),
        }
    }

    /// Conjoin with another clause.
    pub fn and(self, other: FilterExpr) -> Self {
        FilterExpr::And {
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Disjoin with another clause.
    pub fn or(self, other: FilterExpr) -> Self {
        FilterExpr::Or {
            left: Box::new(self),
            right: Box::new(other),
        }
    }
}

/// Requested output columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Wildcard: expand to the table's full declared column list.
    #[default]
    All,
    /// Explicit field names, in request order.
    Columns(Vec<String>),
}

/// One order-by entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        OrderBy {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        OrderBy {
            column: column.into(),
            ascending: false,
        }
    }
}

/// The declarative read request. Immutable once constructed; owned by the
/// caller for the duration of one query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Filter clause; `None` means no filter.
    pub filter: Option<FilterExpr>,
    pub projection: Projection,
    pub order_by: Vec<OrderBy>,
    /// Row cap; overrides any `limit` predicate in the filter.
    pub limit: Option<u64>,
    /// Source field name -> requested output name.
    pub aliases: HashMap<String, String>,
}

/// One comparison extracted from a filter clause. Multiple predicates are
/// implicitly conjunctive.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub op: CmpOp,
    pub field: String,
    pub value: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cmp_op_symbols() {
        assert_eq!(CmpOp::Eq.symbol(), "=");
        assert_eq!(CmpOp::Neq.symbol(), "!=");
        assert_eq!(CmpOp::Gt.symbol(), ">");
        assert_eq!(CmpOp::Gte.symbol(), ">=");
        assert_eq!(CmpOp::Lt.symbol(), "<");
        assert_eq!(CmpOp::Lte.symbol(), "<=");
    }

    #[test]
    fn test_cmp_op_is_comparison() {
        assert!(CmpOp::Eq.is_comparison());
        assert!(CmpOp::Lte.is_comparison());
        assert!(!CmpOp::Between.is_comparison());
        assert!(!CmpOp::In.is_comparison());
        assert!(!CmpOp::Like.is_comparison());
    }

    #[test]
    fn test_filter_builders_nest_left_to_right() {
        let expr = FilterExpr::cmp(CmpOp::Eq, "channel", "general")
            .and(FilterExpr::cmp(CmpOp::Eq, "limit", 10));
        match expr {
            FilterExpr::And { left, right } => {
                assert!(matches!(*left, FilterExpr::Cmp { ref field, .. } if field == "channel"));
                assert!(matches!(*right, FilterExpr::Cmp { ref field, .. } if field == "limit"));
            }
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_projection_default_is_wildcard() {
        assert_eq!(Projection::default(), Projection::All);
    }

    #[test]
    fn test_descriptor_default_is_empty() {
        let query = QueryDescriptor::default();
        assert!(query.filter.is_none());
        assert!(query.order_by.is_empty());
        assert!(query.limit.is_none());
        assert!(query.aliases.is_empty());
    }

    #[test]
    fn test_filter_expr_deserializes_tagged() {
        let expr: FilterExpr = serde_json::from_value(json!({
            "kind": "cmp", "op": "eq", "field": "channel", "value": "general"
        }))
        .unwrap();
        assert_eq!(expr, FilterExpr::cmp(CmpOp::Eq, "channel", "general"));
    }

    #[test]
    fn test_order_by_constructors() {
        assert!(OrderBy::asc("ts").ascending);
        assert!(!OrderBy::desc("ts").ascending);
    }
}
