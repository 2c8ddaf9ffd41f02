//! Palaver Slack - virtual-table connector over the Slack Web API
//!
//! This crate exposes a channel's conversation history as a queryable
//! table and maps write operations onto the platform's message calls:
//! - configuration and credential resolution
//! - the HTTP transport and the trait seam tests mock
//! - the API invoker (named remote operations, response normalization)
//! - the messages virtual table (read pipeline, writes)
//! - the connection handler (lifecycle, health checks, generic dispatch)
//! - a parser for ad-hoc `method(name=value, ...)` call strings

pub mod config;
pub mod handler;
pub mod invoker;
pub mod native;
pub mod table;
pub mod transport;

pub use config::SlackConfig;
pub use handler::SlackHandler;
pub use invoker::Invoker;
pub use native::parse_native_call;
pub use table::{MessagesTable, MESSAGES_SCHEMA};
pub use transport::{HttpTransport, Transport};
