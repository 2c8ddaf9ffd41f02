//! Capability interfaces implemented by concrete tables and handlers.
//!
//! Seams are traits rather than base types: a table advertises what it can
//! do (`Queryable`, `Writable`) and a handler owns the connection
//! (`ConnectionOwner`).

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ConnectorError;
use crate::query::QueryDescriptor;
use crate::shape::ResultTable;

/// Named column -> value assignments for one write-path row.
pub type Assignments = Map<String, Value>;

/// Lifecycle of the remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// A table that answers declarative read queries.
#[async_trait]
pub trait Queryable {
    async fn select(&mut self, query: &QueryDescriptor) -> Result<ResultTable, ConnectorError>;
}

/// Acknowledgement of one write, carrying the remote-assigned message
/// identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteAck {
    pub channel: String,
    pub ts: String,
}

/// A table that accepts direct write operations.
#[async_trait]
pub trait Writable {
    /// Post one message per row; acks carry the remote-assigned `ts`.
    async fn insert(&mut self, rows: &[Assignments]) -> Result<Vec<WriteAck>, ConnectorError>;
    async fn update(&mut self, row: &Assignments) -> Result<WriteAck, ConnectorError>;
    async fn delete(&mut self, row: &Assignments) -> Result<WriteAck, ConnectorError>;
}

/// Owns the session lifecycle: lazy connect, health probing, state.
#[async_trait]
pub trait ConnectionOwner {
    /// Establish the session; a no-op when already connected.
    async fn connect(&mut self) -> Result<(), ConnectorError>;

    /// Probe the session with a lightweight authenticated call. A failed
    /// probe transitions the state to [`ConnectionState::Disconnected`] and
    /// surfaces the remote error; it never retries the probe itself.
    async fn check_health(&mut self) -> Result<(), ConnectorError>;

    fn state(&self) -> ConnectionState;
}
