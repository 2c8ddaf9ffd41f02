//! Parameter mapping: splits extracted predicates into remote push-down
//! parameters and a residual shaping plan applied after the call returns.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ConnectorError;
use crate::query::{CmpOp, Predicate, Projection, QueryDescriptor};

/// Channel name -> remote identifier index, prefetched from the platform.
pub type ChannelIndex = HashMap<String, String>;

/// A table's declared read surface: projectable columns plus columns
/// synthesized from a record field regardless of the requested projection.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub columns: &'static [&'static str],
    /// `(column, source_field)` pairs overlaid onto every result.
    pub synthesize: &'static [(&'static str, &'static str)],
}

impl TableSchema {
    fn declares(&self, column: &str) -> bool {
        self.columns.iter().any(|c| *c == column)
            || self.synthesize.iter().any(|(c, _)| *c == column)
    }
}

/// Parameters sent to the remote call. Every present key maps to exactly
/// one value.
#[derive(Debug, Clone, PartialEq)]
pub struct PushdownParams {
    /// Resolved remote channel identifier.
    pub channel: String,
    pub limit: Option<u64>,
}

impl PushdownParams {
    /// Render as the remote call's parameter object.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("channel".to_string(), Value::String(self.channel.clone()));
        if let Some(limit) = self.limit {
            map.insert("limit".to_string(), Value::from(limit));
        }
        map
    }
}

/// A column overlaid onto every shaped result from a record field.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedColumn {
    pub column: String,
    pub source_field: String,
}

/// One residual sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub column: String,
    pub ascending: bool,
}

/// Residual work not satisfiable by the remote call, applied locally after
/// it returns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapingPlan {
    /// Output columns, lower-cased, deduplicated, in request order.
    pub keep_columns: Vec<String>,
    pub synthesize: Vec<SynthesizedColumn>,
    pub sort: Vec<SortKey>,
    pub row_cap: Option<usize>,
    /// Source column name -> requested output name.
    pub rename: HashMap<String, String>,
    /// Predicates accepted but neither pushed down nor applied locally.
    /// Callers decide how loudly to surface these.
    pub deferred: Vec<Predicate>,
}

/// Classify predicates into push-down parameters and build the residual
/// shaping plan from the descriptor's projection, ordering and limit.
pub fn map_query(
    predicates: &[Predicate],
    query: &QueryDescriptor,
    channels: &ChannelIndex,
    schema: &TableSchema,
) -> Result<(PushdownParams, ShapingPlan), ConnectorError> {
    let mut channel: Option<String> = None;
    let mut limit: Option<u64> = None;
    let mut deferred = Vec::new();

    for predicate in predicates {
        match predicate.field.as_str() {
            "channel" => {
                if predicate.op != CmpOp::Eq {
                    return Err(ConnectorError::UnsupportedPredicate {
                        op: predicate.op,
                        field: "channel".to_string(),
                    });
                }
                let name = match predicate.value.as_str() {
                    Some(name) => name,
                    None => {
                        return Err(ConnectorError::ChannelNotFound(
                            predicate.value.to_string(),
                        ))
                    }
                };
                let id = channels
                    .get(name)
                    .ok_or_else(|| ConnectorError::ChannelNotFound(name.to_string()))?;
                channel = Some(id.clone());
            }
            "limit" => {
                if predicate.op != CmpOp::Eq {
                    return Err(ConnectorError::UnsupportedPredicate {
                        op: predicate.op,
                        field: "limit".to_string(),
                    });
                }
                let value = predicate.value.as_u64().ok_or_else(|| {
                    ConnectorError::UnsupportedPredicate {
                        op: predicate.op,
                        field: "limit".to_string(),
                    }
                })?;
                limit = Some(value);
            }
            _ => deferred.push(predicate.clone()),
        }
    }

    // The descriptor-level limit wins over a limit predicate.
    if let Some(value) = query.limit {
        limit = Some(value);
    }

    let channel = channel.ok_or_else(|| {
        ConnectorError::UnsupportedQueryShape(
            "a select requires a channel = '<name>' predicate".to_string(),
        )
    })?;
    let params = PushdownParams { channel, limit };

    let keep_columns = match &query.projection {
        Projection::All => schema.columns.iter().map(|c| c.to_string()).collect(),
        Projection::Columns(requested) => {
            let mut keep: Vec<String> = Vec::with_capacity(requested.len());
            for column in requested {
                let column = column.to_lowercase();
                if !keep.contains(&column) {
                    keep.push(column);
                }
            }
            keep
        }
    };

    let mut sort = Vec::with_capacity(query.order_by.len());
    for order in &query.order_by {
        let column = order.column.to_lowercase();
        if !schema.declares(&column) {
            return Err(ConnectorError::UnsupportedOrderColumn(order.column.clone()));
        }
        let synthesized = schema.synthesize.iter().any(|(c, _)| *c == column);
        if !synthesized && !keep_columns.contains(&column) {
            // A sort key must survive projection defaulting.
            return Err(ConnectorError::UnsupportedOrderColumn(order.column.clone()));
        }
        sort.push(SortKey {
            column,
            ascending: order.ascending,
        });
    }

    let plan = ShapingPlan {
        keep_columns,
        synthesize: schema
            .synthesize
            .iter()
            .map(|(column, source_field)| SynthesizedColumn {
                column: column.to_string(),
                source_field: source_field.to_string(),
            })
            .collect(),
        sort,
        row_cap: params.limit.map(|limit| limit as usize),
        rename: query.aliases.clone(),
        deferred,
    };

    debug!(
        channel = %params.channel,
        limit = params.limit,
        keep = plan.keep_columns.len(),
        deferred = plan.deferred.len(),
        "mapped query"
    );

    Ok((params, plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::OrderBy;
    use serde_json::json;

    const SCHEMA: TableSchema = TableSchema {
        columns: &["ts", "text", "user", "channel"],
        synthesize: &[("messages", "text")],
    };

    fn channels() -> ChannelIndex {
        ChannelIndex::from([
            ("general".to_string(), "C024BE91L".to_string()),
            ("random".to_string(), "C024BE91R".to_string()),
        ])
    }

    fn pred(op: CmpOp, field: &str, value: Value) -> Predicate {
        Predicate {
            op,
            field: field.to_string(),
            value,
        }
    }

    #[test]
    fn test_channel_and_limit_push_down_exactly() {
        let predicates = vec![
            pred(CmpOp::Eq, "channel", json!("general")),
            pred(CmpOp::Eq, "limit", json!(20)),
        ];
        let (params, plan) =
            map_query(&predicates, &QueryDescriptor::default(), &channels(), &SCHEMA).unwrap();
        assert_eq!(params.channel, "C024BE91L");
        assert_eq!(params.limit, Some(20));
        let map = params.to_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["channel"], json!("C024BE91L"));
        assert_eq!(map["limit"], json!(20));
        assert!(plan.deferred.is_empty());
    }

    #[test]
    fn test_unknown_channel_fails() {
        let predicates = vec![pred(CmpOp::Eq, "channel", json!("nope"))];
        let err =
            map_query(&predicates, &QueryDescriptor::default(), &channels(), &SCHEMA).unwrap_err();
        assert!(matches!(err, ConnectorError::ChannelNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_channel_requires_equality() {
        let predicates = vec![pred(CmpOp::Gt, "channel", json!("general"))];
        let err =
            map_query(&predicates, &QueryDescriptor::default(), &channels(), &SCHEMA).unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::UnsupportedPredicate { op: CmpOp::Gt, ref field } if field == "channel"
        ));
    }

    #[test]
    fn test_limit_requires_integer_equality() {
        let predicates = vec![
            pred(CmpOp::Eq, "channel", json!("general")),
            pred(CmpOp::Eq, "limit", json!("ten")),
        ];
        let err =
            map_query(&predicates, &QueryDescriptor::default(), &channels(), &SCHEMA).unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::UnsupportedPredicate { ref field, .. } if field == "limit"
        ));

        let predicates = vec![
            pred(CmpOp::Eq, "channel", json!("general")),
            pred(CmpOp::Lt, "limit", json!(10)),
        ];
        let err =
            map_query(&predicates, &QueryDescriptor::default(), &channels(), &SCHEMA).unwrap_err();
        assert!(matches!(err, ConnectorError::UnsupportedPredicate { .. }));
    }

    #[test]
    fn test_descriptor_limit_overrides_limit_predicate() {
        let predicates = vec![
            pred(CmpOp::Eq, "channel", json!("general")),
            pred(CmpOp::Eq, "limit", json!(100)),
        ];
        let query = QueryDescriptor {
            limit: Some(3),
            ..Default::default()
        };
        let (params, plan) = map_query(&predicates, &query, &channels(), &SCHEMA).unwrap();
        assert_eq!(params.limit, Some(3));
        assert_eq!(plan.row_cap, Some(3));
    }

    #[test]
    fn test_duplicate_channel_predicate_last_write_wins() {
        let predicates = vec![
            pred(CmpOp::Eq, "channel", json!("general")),
            pred(CmpOp::Eq, "channel", json!("random")),
        ];
        let (params, _) =
            map_query(&predicates, &QueryDescriptor::default(), &channels(), &SCHEMA).unwrap();
        assert_eq!(params.channel, "C024BE91R");
    }

    #[test]
    fn test_other_predicates_are_deferred_not_dropped() {
        let predicates = vec![
            pred(CmpOp::Eq, "channel", json!("general")),
            pred(CmpOp::Gt, "reply_count", json!(2)),
            pred(CmpOp::Neq, "user", json!("U042")),
        ];
        let (_, plan) =
            map_query(&predicates, &QueryDescriptor::default(), &channels(), &SCHEMA).unwrap();
        assert_eq!(plan.deferred.len(), 2);
        assert_eq!(plan.deferred[0].field, "reply_count");
        assert_eq!(plan.deferred[1].field, "user");
    }

    #[test]
    fn test_missing_channel_predicate_fails() {
        let predicates = vec![pred(CmpOp::Eq, "limit", json!(5))];
        let err =
            map_query(&predicates, &QueryDescriptor::default(), &channels(), &SCHEMA).unwrap_err();
        assert!(matches!(err, ConnectorError::UnsupportedQueryShape(_)));
    }

    #[test]
    fn test_non_string_channel_value_fails() {
        let predicates = vec![pred(CmpOp::Eq, "channel", json!(42))];
        let err =
            map_query(&predicates, &QueryDescriptor::default(), &channels(), &SCHEMA).unwrap_err();
        assert!(matches!(err, ConnectorError::ChannelNotFound(_)));
    }

    #[test]
    fn test_wildcard_projection_expands_to_schema() {
        let predicates = vec![pred(CmpOp::Eq, "channel", json!("general"))];
        let (_, plan) =
            map_query(&predicates, &QueryDescriptor::default(), &channels(), &SCHEMA).unwrap();
        assert_eq!(plan.keep_columns, vec!["ts", "text", "user", "channel"]);
    }

    #[test]
    fn test_explicit_projection_lowercased_and_deduplicated() {
        let predicates = vec![pred(CmpOp::Eq, "channel", json!("general"))];
        let query = QueryDescriptor {
            projection: Projection::Columns(vec![
                "TS".to_string(),
                "User".to_string(),
                "ts".to_string(),
            ]),
            ..Default::default()
        };
        let (_, plan) = map_query(&predicates, &query, &channels(), &SCHEMA).unwrap();
        assert_eq!(plan.keep_columns, vec!["ts", "user"]);
    }

    #[test]
    fn test_order_by_outside_schema_fails() {
        let predicates = vec![pred(CmpOp::Eq, "channel", json!("general"))];
        let query = QueryDescriptor {
            order_by: vec![OrderBy::asc("priority")],
            ..Default::default()
        };
        let err = map_query(&predicates, &query, &channels(), &SCHEMA).unwrap_err();
        assert!(matches!(err, ConnectorError::UnsupportedOrderColumn(col) if col == "priority"));
    }

    #[test]
    fn test_order_by_column_dropped_by_projection_fails() {
        let predicates = vec![pred(CmpOp::Eq, "channel", json!("general"))];
        let query = QueryDescriptor {
            projection: Projection::Columns(vec!["ts".to_string()]),
            order_by: vec![OrderBy::asc("user")],
            ..Default::default()
        };
        let err = map_query(&predicates, &query, &channels(), &SCHEMA).unwrap_err();
        assert!(matches!(err, ConnectorError::UnsupportedOrderColumn(_)));
    }

    #[test]
    fn test_order_by_synthesized_column_is_always_valid() {
        let predicates = vec![pred(CmpOp::Eq, "channel", json!("general"))];
        let query = QueryDescriptor {
            projection: Projection::Columns(vec!["ts".to_string()]),
            order_by: vec![OrderBy::desc("messages")],
            ..Default::default()
        };
        let (_, plan) = map_query(&predicates, &query, &channels(), &SCHEMA).unwrap();
        assert_eq!(plan.sort.len(), 1);
        assert_eq!(plan.sort[0].column, "messages");
        assert!(!plan.sort[0].ascending);
    }

    #[test]
    fn test_aliases_copied_verbatim() {
        let predicates = vec![pred(CmpOp::Eq, "channel", json!("general"))];
        let query = QueryDescriptor {
            aliases: HashMap::from([("ts".to_string(), "timestamp".to_string())]),
            ..Default::default()
        };
        let (_, plan) = map_query(&predicates, &query, &channels(), &SCHEMA).unwrap();
        assert_eq!(plan.rename.get("ts").map(String::as_str), Some("timestamp"));
    }

    #[test]
    fn test_to_map_omits_unset_limit() {
        let params = PushdownParams {
            channel: "C1".to_string(),
            limit: None,
        };
        let map = params.to_map();
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("channel"));
    }

    #[test]
    fn test_plan_carries_synthesized_columns() {
        let predicates = vec![pred(CmpOp::Eq, "channel", json!("general"))];
        let (_, plan) =
            map_query(&predicates, &QueryDescriptor::default(), &channels(), &SCHEMA).unwrap();
        assert_eq!(plan.synthesize.len(), 1);
        assert_eq!(plan.synthesize[0].column, "messages");
        assert_eq!(plan.synthesize[0].source_field, "text");
    }
}
