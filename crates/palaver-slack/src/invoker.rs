//! Named remote operations over an authenticated session, with response
//! normalization into row-oriented structures.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use palaver_core::{ChannelIndex, ConnectorError, RawRecord};

use crate::transport::Transport;

/// Conversation types requested when listing channels.
const CHANNEL_TYPES: &str = "public_channel,private_channel";

/// The session facade: named remote operations plus response normalization.
///
/// All calls use the current session. A failed call does not reconnect;
/// reconnection is the connection handler's responsibility after a failed
/// health check.
pub struct Invoker {
    transport: Arc<dyn Transport>,
}

impl Invoker {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Invoke a named remote method. Responses carrying a nested `channels`
    /// collection are passed through the channel normalizer.
    pub async fn call(
        &self,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, ConnectorError> {
        let mut payload = self.transport.call(method, params).await?;
        if let Some(object) = payload.as_object_mut() {
            if let Some(Value::Array(channels)) = object.get("channels") {
                let normalized = normalize_channels(channels)?;
                object.insert(
                    "channels".to_string(),
                    Value::Array(normalized.into_iter().map(Value::Object).collect()),
                );
            }
        }
        Ok(payload)
    }

    /// Fetch the channel name -> identifier index.
    pub async fn list_channels(&self) -> Result<ChannelIndex, ConnectorError> {
        let mut params = Map::new();
        params.insert(
            "types".to_string(),
            Value::String(CHANNEL_TYPES.to_string()),
        );
        let payload = self.call("conversations.list", &params).await?;

        let mut index = ChannelIndex::new();
        if let Some(channels) = payload.get("channels").and_then(Value::as_array) {
            for channel in channels {
                if let (Some(name), Some(id)) = (
                    channel.get("name").and_then(Value::as_str),
                    channel.get("id").and_then(Value::as_str),
                ) {
                    index.insert(name.to_string(), id.to_string());
                }
            }
        }
        debug!(channels = index.len(), "listed channels");
        Ok(index)
    }

    /// Fetch the conversation history of a channel.
    pub async fn fetch_history(
        &self,
        channel_id: &str,
        limit: Option<u64>,
    ) -> Result<Vec<RawRecord>, ConnectorError> {
        let mut params = Map::new();
        params.insert(
            "channel".to_string(),
            Value::String(channel_id.to_string()),
        );
        if let Some(limit) = limit {
            params.insert("limit".to_string(), Value::from(limit));
        }
        let payload = self.call("conversations.history", &params).await?;

        let records = payload
            .get("messages")
            .and_then(Value::as_array)
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m.as_object().cloned())
                    .collect::<Vec<RawRecord>>()
            })
            .unwrap_or_default();
        debug!(rows = records.len(), channel = %channel_id, "fetched history");
        Ok(records)
    }

    /// Post a message; returns the remote-assigned `ts` identifier.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
    ) -> Result<String, ConnectorError> {
        let mut params = Map::new();
        params.insert("channel".to_string(), Value::String(channel.to_string()));
        params.insert("text".to_string(), Value::String(text.to_string()));
        let payload = self.call("chat.postMessage", &params).await?;

        payload
            .get("ts")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ConnectorError::RemoteApi {
                method: "chat.postMessage".to_string(),
                params: Value::Object(params),
                cause: "response missing message ts".to_string(),
            })
    }

    /// Replace the text of an existing message.
    pub async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), ConnectorError> {
        let mut params = Map::new();
        params.insert("channel".to_string(), Value::String(channel.to_string()));
        params.insert("ts".to_string(), Value::String(ts.to_string()));
        params.insert("text".to_string(), Value::String(text.to_string()));
        self.call("chat.update", &params).await?;
        Ok(())
    }

    /// Delete a message.
    pub async fn delete_message(&self, channel: &str, ts: &str) -> Result<(), ConnectorError> {
        let mut params = Map::new();
        params.insert("channel".to_string(), Value::String(channel.to_string()));
        params.insert("ts".to_string(), Value::String(ts.to_string()));
        self.call("chat.delete", &params).await?;
        Ok(())
    }

    /// Lightweight authenticated probe.
    pub async fn auth_check(&self) -> Result<(), ConnectorError> {
        self.call("auth.test", &Map::new()).await?;
        Ok(())
    }
}

/// Narrow raw channel records to `{id, name, created_at}`, parsing the
/// platform's numeric `created` epoch into an RFC 3339 timestamp.
pub fn normalize_channels(channels: &[Value]) -> Result<Vec<Map<String, Value>>, ConnectorError> {
    channels
        .iter()
        .map(|channel| {
            let mut narrowed = Map::new();
            for key in ["id", "name"] {
                narrowed.insert(
                    key.to_string(),
                    channel.get(key).cloned().unwrap_or(Value::Null),
                );
            }
            let created = channel.get("created").cloned().unwrap_or(Value::Null);
            narrowed.insert(
                "created_at".to_string(),
                Value::String(epoch_to_timestamp(&created)?),
            );
            Ok(narrowed)
        })
        .collect()
}

/// Parse an epoch-seconds value (number or numeric string) into RFC 3339.
fn epoch_to_timestamp(value: &Value) -> Result<String, ConnectorError> {
    let malformed = || ConnectorError::MalformedTimestamp(value.to_string());
    let secs = match value {
        Value::Number(n) => n.as_f64().ok_or_else(malformed)?,
        Value::String(s) => s.parse::<f64>().map_err(|_| malformed())?,
        _ => return Err(malformed()),
    };
    if !secs.is_finite() {
        return Err(malformed());
    }
    let whole = secs.trunc() as i64;
    let nanos = ((secs - secs.trunc()) * 1e9) as u32;
    let timestamp = DateTime::<Utc>::from_timestamp(whole, nanos).ok_or_else(malformed)?;
    Ok(timestamp.to_rfc3339())
}
