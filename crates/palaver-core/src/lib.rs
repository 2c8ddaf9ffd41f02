//! Palaver Core - Query model and pushdown planning
//!
//! This crate holds the pure half of the connector:
//! - a declarative query descriptor (filter tree, projection, order-by,
//!   limit, aliases)
//! - predicate extraction from conjunctive filter clauses
//! - the split into remote push-down parameters and a residual shaping plan
//! - result shaping of normalized remote rows into the requested table
//!
//! Nothing here performs I/O; remote concerns live in the connector crates.

pub mod capability;
pub mod error;
pub mod extract;
pub mod plan;
pub mod query;
pub mod shape;

pub use capability::{
    Assignments, ConnectionOwner, ConnectionState, Queryable, Writable, WriteAck,
};
pub use error::ConnectorError;
pub use extract::extract_predicates;
pub use plan::{
    map_query, ChannelIndex, PushdownParams, ShapingPlan, SortKey, SynthesizedColumn, TableSchema,
};
pub use query::{CmpOp, FilterExpr, OrderBy, Predicate, Projection, QueryDescriptor};
pub use shape::{shape, Column, RawRecord, ResultTable};
