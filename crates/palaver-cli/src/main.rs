//! Palaver CLI - Query and post to Slack channels as a virtual table

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use palaver_core::{
    CmpOp, ConnectionOwner, FilterExpr, OrderBy, Projection, Queryable, QueryDescriptor,
    ResultTable, Writable,
};
use palaver_slack::{parse_native_call, MessagesTable, SlackConfig, SlackHandler};

#[derive(Parser)]
#[command(name = "palaver")]
#[command(about = "Query a Slack workspace's channels and messages like a table")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// API token (falls back to SLACK_TOKEN, then the PALAVER_CONFIG store)
    #[arg(short, long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read a channel's history with projection, ordering, limit and aliases
    Query {
        /// Channel name to read from
        #[arg(short, long)]
        channel: String,

        /// Comma-separated columns to project (default: all)
        #[arg(long)]
        columns: Option<String>,

        /// Order by column, e.g. "ts" or "messages:desc" (repeatable)
        #[arg(long = "order-by")]
        order_by: Vec<String>,

        /// Maximum number of rows
        #[arg(short, long)]
        limit: Option<u64>,

        /// Rename an output column, e.g. "ts=timestamp" (repeatable)
        #[arg(long = "alias")]
        aliases: Vec<String>,
    },

    /// Post a message to a channel
    Post {
        #[arg(short, long)]
        channel: String,

        #[arg(short, long)]
        message: String,
    },

    /// Update an existing message identified by its ts
    Update {
        #[arg(short, long)]
        channel: String,

        #[arg(long)]
        ts: String,

        #[arg(short, long)]
        message: String,
    },

    /// Delete a message identified by its ts
    Delete {
        #[arg(short, long)]
        channel: String,

        #[arg(long)]
        ts: String,
    },

    /// Check that the session authenticates against the platform
    Check,

    /// Invoke a named API method, e.g. "conversations.list(types='public_channel')"
    Call {
        /// A call string of the form method(name=value, ...)
        call: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = SlackConfig::resolve(cli.token)?;
    let handler = SlackHandler::new(config);

    match cli.command {
        Commands::Query {
            channel,
            columns,
            order_by,
            limit,
            aliases,
        } => {
            run_query(handler, &channel, columns, &order_by, limit, &aliases).await?;
        }
        Commands::Post { channel, message } => {
            let mut table = MessagesTable::new(handler);
            let rows = vec![serde_json::Map::from_iter([
                ("channel".to_string(), json!(channel)),
                ("message".to_string(), json!(message)),
            ])];
            let acks = table.insert(&rows).await?;
            for ack in acks {
                println!("posted to '{}' with ts {}", ack.channel, ack.ts);
            }
        }
        Commands::Update {
            channel,
            ts,
            message,
        } => {
            let mut table = MessagesTable::new(handler);
            let ack = table
                .update(&serde_json::Map::from_iter([
                    ("channel".to_string(), json!(channel)),
                    ("ts".to_string(), json!(ts)),
                    ("message".to_string(), json!(message)),
                ]))
                .await?;
            println!("updated message {} in '{}'", ack.ts, ack.channel);
        }
        Commands::Delete { channel, ts } => {
            let mut table = MessagesTable::new(handler);
            let ack = table
                .delete(&serde_json::Map::from_iter([
                    ("channel".to_string(), json!(channel)),
                    ("ts".to_string(), json!(ts)),
                ]))
                .await?;
            println!("deleted message {} from '{}'", ack.ts, ack.channel);
        }
        Commands::Check => {
            let mut handler = handler;
            handler.check_health().await?;
            println!("connection healthy");
        }
        Commands::Call { call } => {
            let mut handler = handler;
            let (method, params) = parse_native_call(&call)?;
            info!("dispatching {}", method);
            let rows = handler.dispatch(&method, &params).await?;
            for row in rows {
                println!("{}", serde_json::to_string_pretty(&Value::Object(row))?);
            }
        }
    }

    Ok(())
}

async fn run_query(
    handler: SlackHandler,
    channel: &str,
    columns: Option<String>,
    order_by: &[String],
    limit: Option<u64>,
    aliases: &[String],
) -> Result<()> {
    let projection = match columns {
        Some(csv) => Projection::Columns(
            csv.split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        ),
        None => Projection::All,
    };

    let query = QueryDescriptor {
        filter: Some(FilterExpr::cmp(CmpOp::Eq, "channel", channel)),
        projection,
        order_by: order_by
            .iter()
            .map(|spec| parse_order(spec))
            .collect::<Result<Vec<_>>>()?,
        limit,
        aliases: parse_aliases(aliases)?,
    };

    let mut table = MessagesTable::new(handler);
    let result = table.select(&query).await?;
    print_table(&result);
    Ok(())
}

/// Parse "column" or "column:asc|desc" into an order-by entry.
fn parse_order(spec: &str) -> Result<OrderBy> {
    match spec.split_once(':') {
        None => Ok(OrderBy::asc(spec.trim())),
        Some((column, "asc")) => Ok(OrderBy::asc(column.trim())),
        Some((column, "desc")) => Ok(OrderBy::desc(column.trim())),
        Some((_, direction)) => {
            anyhow::bail!("invalid order direction '{}' (expected asc or desc)", direction)
        }
    }
}

/// Parse repeated "source=alias" flags into an alias map.
fn parse_aliases(specs: &[String]) -> Result<HashMap<String, String>> {
    let mut aliases = HashMap::new();
    for spec in specs {
        let (source, alias) = spec
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("invalid alias '{}' (expected source=alias)", spec))?;
        aliases.insert(source.trim().to_string(), alias.trim().to_string());
    }
    Ok(aliases)
}

/// Render a result table as aligned columns.
fn print_table(table: &ResultTable) {
    if table.num_columns() == 0 {
        println!("(no columns)");
        return;
    }

    let rows = table.num_rows();
    let rendered: Vec<(String, Vec<String>)> = table
        .columns
        .iter()
        .map(|column| {
            (
                column.name.clone(),
                column.values.iter().map(render_value).collect(),
            )
        })
        .collect();

    let widths: Vec<usize> = rendered
        .iter()
        .map(|(name, values)| {
            values
                .iter()
                .map(String::len)
                .max()
                .unwrap_or(0)
                .max(name.len())
        })
        .collect();

    let header: Vec<String> = rendered
        .iter()
        .zip(&widths)
        .map(|((name, _), width)| format!("{:<width$}", name, width = *width))
        .collect();
    println!("{}", header.join("  "));
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ")
    );

    for row in 0..rows {
        let line: Vec<String> = rendered
            .iter()
            .zip(&widths)
            .map(|((_, values), width)| format!("{:<width$}", values[row], width = *width))
            .collect();
        println!("{}", line.join("  "));
    }
    println!("\n{} rows", rows);
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
