//! The messages virtual table: declarative reads over a channel's
//! conversation history plus direct write operations.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use palaver_core::{
    extract_predicates, map_query, shape, Assignments, ConnectorError, Queryable,
    QueryDescriptor, ResultTable, TableSchema, Writable, WriteAck,
};

use crate::handler::SlackHandler;

/// Fixed read schema of the messages table. Every history record's `text`
/// is also projected into a `messages` column, independent of the requested
/// projection.
pub const MESSAGES_SCHEMA: TableSchema = TableSchema {
    columns: &[
        "ts",
        "text",
        "user",
        "channel",
        "reactions",
        "attachments",
        "thread_ts",
        "reply_count",
        "reply_users_count",
        "latest_reply",
        "subtype",
        "hidden",
    ],
    synthesize: &[("messages", "text")],
};

/// The public facade over the connector: orchestrates
/// extract -> map -> fetch -> shape for reads, and maps writes one-to-one
/// onto remote calls after mandatory-field validation.
pub struct MessagesTable {
    handler: SlackHandler,
}

impl MessagesTable {
    pub fn new(handler: SlackHandler) -> Self {
        Self { handler }
    }

    /// The owning connection handler, for ad-hoc dispatch outside the
    /// table's fixed schema.
    pub fn handler_mut(&mut self) -> &mut SlackHandler {
        &mut self.handler
    }

    /// Declared projectable columns.
    pub fn columns() -> &'static [&'static str] {
        MESSAGES_SCHEMA.columns
    }
}

#[async_trait]
impl Queryable for MessagesTable {
    /// Single-pass read pipeline. The first failing stage aborts the whole
    /// query; no partial results, no retries at this layer.
    async fn select(&mut self, query: &QueryDescriptor) -> Result<ResultTable, ConnectorError> {
        let predicates = match &query.filter {
            Some(filter) => extract_predicates(filter)?,
            None => Vec::new(),
        };
        debug!(count = predicates.len(), "extracted predicates");

        let invoker = self.handler.invoker().await?;
        let channels = invoker.list_channels().await?;

        let (params, plan) = map_query(&predicates, query, &channels, &MESSAGES_SCHEMA)?;
        for predicate in &plan.deferred {
            warn!(
                "predicate {} {} {} is not pushed down and not applied locally",
                predicate.field, predicate.op, predicate.value
            );
        }

        let records = invoker.fetch_history(&params.channel, params.limit).await?;

        Ok(shape(&records, &plan))
    }
}

#[async_trait]
impl Writable for MessagesTable {
    async fn insert(&mut self, rows: &[Assignments]) -> Result<Vec<WriteAck>, ConnectorError> {
        // Validate every row before the first remote call.
        let mut validated = Vec::with_capacity(rows.len());
        for row in rows {
            let channel = require("insert", row, "channel")?;
            let message = require("insert", row, "message")?;
            validated.push((channel, message));
        }

        let invoker = self.handler.invoker().await?;
        let mut acks = Vec::with_capacity(validated.len());
        for (channel, message) in validated {
            let ts = invoker.post_message(&channel, &message).await?;
            debug!(channel = %channel, ts = %ts, "message posted");
            acks.push(WriteAck { channel, ts });
        }
        Ok(acks)
    }

    async fn update(&mut self, row: &Assignments) -> Result<WriteAck, ConnectorError> {
        let channel = require("update", row, "channel")?;
        let ts = require("update", row, "ts")?;
        let message = require("update", row, "message")?;

        let invoker = self.handler.invoker().await?;
        invoker.update_message(&channel, &ts, &message).await?;
        debug!(channel = %channel, ts = %ts, "message updated");
        Ok(WriteAck { channel, ts })
    }

    async fn delete(&mut self, row: &Assignments) -> Result<WriteAck, ConnectorError> {
        let channel = require("delete", row, "channel")?;
        let ts = require("delete", row, "ts")?;

        let invoker = self.handler.invoker().await?;
        invoker.delete_message(&channel, &ts).await?;
        debug!(channel = %channel, ts = %ts, "message deleted");
        Ok(WriteAck { channel, ts })
    }
}

/// Fetch a mandatory write-path field as text. Absent or null fields fail
/// before any remote call is attempted.
fn require(operation: &str, row: &Assignments, field: &str) -> Result<String, ConnectorError> {
    match row.get(field) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Null) | None => Err(ConnectorError::MissingRequiredField {
            operation: operation.to_string(),
            missing: field.to_string(),
        }),
        Some(other) => Ok(other.to_string()),
    }
}
