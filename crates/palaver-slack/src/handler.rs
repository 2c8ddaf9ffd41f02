//! Connection handler: owns the invoker lifecycle and routes ad-hoc
//! named-method calls that bypass the table abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use palaver_core::{ConnectionOwner, ConnectionState, ConnectorError, RawRecord};

use crate::config::SlackConfig;
use crate::invoker::Invoker;
use crate::transport::{HttpTransport, Transport};

enum TransportSource {
    /// Build an HTTP transport lazily from connection settings.
    Config(SlackConfig),
    /// Use a caller-supplied transport (tests, alternative backends).
    Injected(Arc<dyn Transport>),
}

/// Owns one logical session: lazy connect, health probing, and generic
/// dispatch of named remote methods. One handler serves one caller at a
/// time; session-touching operations take `&mut self`.
pub struct SlackHandler {
    source: TransportSource,
    invoker: Option<Invoker>,
    state: ConnectionState,
}

impl SlackHandler {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            source: TransportSource::Config(config),
            invoker: None,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            source: TransportSource::Injected(transport),
            invoker: None,
            state: ConnectionState::Disconnected,
        }
    }

    /// Establish the session if needed and hand back the invoker. Idempotent:
    /// an already-connected handler returns the cached session.
    pub async fn invoker(&mut self) -> Result<&Invoker, ConnectorError> {
        if self.invoker.is_none() {
            let transport: Arc<dyn Transport> = match &self.source {
                TransportSource::Config(config) => Arc::new(HttpTransport::new(config)?),
                TransportSource::Injected(transport) => Arc::clone(transport),
            };
            self.invoker = Some(Invoker::new(transport));
            self.state = ConnectionState::Connected;
            debug!("session established");
        }
        self.invoker
            .as_ref()
            .ok_or_else(|| ConnectorError::Config("session unavailable".to_string()))
    }

    /// Route an ad-hoc named remote call outside the table schema. Method
    /// names resolve against an explicit capability set, each entry
    /// validating its own parameter shape before the call; unknown names
    /// fail closed.
    pub async fn dispatch(
        &mut self,
        method: &str,
        params: &Map<String, Value>,
    ) -> Result<Vec<RawRecord>, ConnectorError> {
        match method {
            "conversations.list" | "auth.test" => {}
            "conversations.history" => {
                require_param(method, params, "channel")?;
            }
            "chat.postMessage" => {
                require_param(method, params, "channel")?;
                require_param(method, params, "text")?;
            }
            "chat.update" => {
                require_param(method, params, "channel")?;
                require_param(method, params, "ts")?;
                require_param(method, params, "text")?;
            }
            "chat.delete" => {
                require_param(method, params, "channel")?;
                require_param(method, params, "ts")?;
            }
            _ => return Err(ConnectorError::UnknownMethod(method.to_string())),
        }

        let invoker = self.invoker().await?;
        let payload = invoker.call(method, params).await?;
        Ok(rows_from_payload(payload))
    }
}

#[async_trait]
impl ConnectionOwner for SlackHandler {
    async fn connect(&mut self) -> Result<(), ConnectorError> {
        self.invoker().await.map(|_| ())
    }

    async fn check_health(&mut self) -> Result<(), ConnectorError> {
        let probe = {
            let invoker = self.invoker().await?;
            invoker.auth_check().await
        };
        if let Err(err) = probe {
            warn!("health check failed, marking session disconnected: {}", err);
            self.invoker = None;
            self.state = ConnectionState::Disconnected;
            return Err(err);
        }
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

fn require_param(
    method: &str,
    params: &Map<String, Value>,
    name: &str,
) -> Result<(), ConnectorError> {
    match params.get(name) {
        Some(value) if !value.is_null() => Ok(()),
        _ => Err(ConnectorError::MissingRequiredField {
            operation: method.to_string(),
            missing: name.to_string(),
        }),
    }
}

/// Flatten a remote payload into rows: nested `channels` or `messages`
/// collections become one row per record, anything else is a single row.
fn rows_from_payload(payload: Value) -> Vec<RawRecord> {
    if let Some(object) = payload.as_object() {
        for key in ["channels", "messages"] {
            if let Some(Value::Array(items)) = object.get(key) {
                return items
                    .iter()
                    .filter_map(|item| item.as_object().cloned())
                    .collect();
            }
        }
    }
    match payload {
        Value::Object(object) => vec![object],
        _ => Vec::new(),
    }
}
