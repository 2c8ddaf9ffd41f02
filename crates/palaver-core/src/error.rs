//! Typed errors for the connector pipeline.

use serde_json::Value;
use thiserror::Error;

use crate::query::CmpOp;

/// Errors surfaced by the query pipeline and the remote connector.
///
/// Every variant is surfaced to the caller unmodified; there is no local
/// recovery anywhere in the pipeline. A failure at any stage aborts the
/// whole query.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The filter tree is not representable as a flat conjunction of
    /// comparisons, or the query is otherwise outside the supported shape.
    #[error("unsupported query shape: {0}")]
    UnsupportedQueryShape(String),

    /// The operator/field combination cannot be pushed down to the remote
    /// call.
    #[error("predicate {op} on '{field}' is not supported for push-down")]
    UnsupportedPredicate { op: CmpOp, field: String },

    /// An order-by column outside the table's declared column set.
    #[error("order by unknown column '{0}'")]
    UnsupportedOrderColumn(String),

    /// A timestamp field that could not be parsed from epoch seconds.
    #[error("malformed timestamp value '{0}'")]
    MalformedTimestamp(String),

    /// A write operation is missing one of its mandatory fields.
    #[error("'{operation}' requires the '{missing}' parameter")]
    MissingRequiredField { operation: String, missing: String },

    /// Any failure reported by the remote platform, carrying the original
    /// method, parameters and raw error message.
    #[error("remote call '{method}' with params {params} failed: {cause}")]
    RemoteApi {
        method: String,
        params: Value,
        cause: String,
    },

    /// A dispatch request for a method name outside the capability set.
    #[error("unknown remote method '{0}'")]
    UnknownMethod(String),

    /// A channel-name predicate that did not resolve to a remote identifier.
    #[error("channel '{0}' not found")]
    ChannelNotFound(String),

    /// Invalid or missing configuration (credential resolution).
    #[error("config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_api_display_carries_method_params_cause() {
        let err = ConnectorError::RemoteApi {
            method: "conversations.history".to_string(),
            params: json!({"channel": "C024BE91L"}),
            cause: "channel_not_found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("conversations.history"));
        assert!(msg.contains("C024BE91L"));
        assert!(msg.contains("channel_not_found"));
    }

    #[test]
    fn test_missing_required_field_display() {
        let err = ConnectorError::MissingRequiredField {
            operation: "insert".to_string(),
            missing: "message".to_string(),
        };
        assert_eq!(err.to_string(), "'insert' requires the 'message' parameter");
    }

    #[test]
    fn test_unsupported_predicate_display_uses_operator_symbol() {
        let err = ConnectorError::UnsupportedPredicate {
            op: CmpOp::Gt,
            field: "channel".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "predicate > on 'channel' is not supported for push-down"
        );
    }

    #[test]
    fn test_channel_not_found_display() {
        let err = ConnectorError::ChannelNotFound("general".to_string());
        assert_eq!(err.to_string(), "channel 'general' not found");
    }
}
