use anyhow::Context;
use cco_client::{Engine, EngineConfig, EventExporter};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Query and feed a Correlated Cross-Occurrence recommender
#[derive(Parser, Debug)]
#[command(name = "cco")]
#[command(about = "Query and feed a CCO recommender", long_about = None)]
struct Args {
    /// Host running the engine and event servers
    #[arg(long, env = "CCO_HOST", default_value = "localhost")]
    host: String,

    /// Engine (query) server port
    #[arg(long, env = "CCO_ENGINE_PORT", default_value_t = 8000)]
    engine_port: u16,

    /// Event server port
    #[arg(long, env = "CCO_EVENT_PORT", default_value_t = 7070)]
    event_port: u16,

    /// Event server access key
    #[arg(long, env = "CCO_ACCESS_KEY")]
    access_key: Option<String>,

    /// Maximum concurrent event requests
    #[arg(long, env = "CCO_THREADS", default_value_t = 1)]
    threads: usize,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the engine for recommendations
    Query {
        #[arg(long)]
        user: Option<String>,

        /// Item to find similar items for
        #[arg(long)]
        item: Option<String>,

        #[arg(long)]
        limit: Option<usize>,

        /// Include filter, FIELD=v1,v2 (repeatable)
        #[arg(long = "filter", value_parser = parse_field)]
        filters: Vec<FieldArg>,

        /// Exclude filter, FIELD=v1,v2 (repeatable)
        #[arg(long = "exclude", value_parser = parse_field)]
        excludes: Vec<FieldArg>,

        /// Boost, AMOUNT:FIELD=v1,v2 with AMOUNT > 1 (repeatable)
        #[arg(long = "boost", value_parser = parse_weighted_field)]
        boosts: Vec<WeightedFieldArg>,

        /// Deboost, AMOUNT:FIELD=v1,v2 with 0 < AMOUNT < 1 (repeatable)
        #[arg(long = "deboost", value_parser = parse_weighted_field)]
        deboosts: Vec<WeightedFieldArg>,

        /// Print the payload instead of sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Set properties on an entity
    Set {
        entity_type: String,
        entity_id: String,

        /// JSON object of properties
        #[arg(long, value_parser = parse_json)]
        properties: Option<Value>,

        /// Append a JSON line to this file instead of calling the server
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Record a user action on an item
    Event {
        name: String,
        user: String,
        item: String,

        /// JSON object of properties
        #[arg(long, value_parser = parse_json)]
        properties: Option<Value>,

        /// Event time (RFC 3339), defaults to now
        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<Utc>>,

        /// Append a JSON line to this file instead of calling the server
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[derive(Debug, Clone)]
struct FieldArg {
    name: String,
    values: Vec<String>,
}

#[derive(Debug, Clone)]
struct WeightedFieldArg {
    amount: f64,
    field: FieldArg,
}

fn parse_field(s: &str) -> Result<FieldArg, String> {
    let (name, values) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUES, got '{}'", s))?;
    if name.is_empty() {
        return Err("field name cannot be empty".to_string());
    }
    Ok(FieldArg {
        name: name.to_string(),
        values: values.split(',').map(str::to_string).collect(),
    })
}

fn parse_weighted_field(s: &str) -> Result<WeightedFieldArg, String> {
    let (amount, field) = s
        .split_once(':')
        .ok_or_else(|| format!("expected AMOUNT:FIELD=VALUES, got '{}'", s))?;
    let amount = amount
        .parse::<f64>()
        .map_err(|e| format!("invalid amount '{}': {}", amount, e))?;
    Ok(WeightedFieldArg {
        amount,
        field: parse_field(field)?,
    })
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("invalid JSON: {}", e))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 time '{}': {}", s, e))
}

fn pairs(fields: Vec<FieldArg>) -> impl Iterator<Item = (String, Vec<String>)> {
    fields.into_iter().map(|f| (f.name, f.values))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // stdout carries results
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = EngineConfig {
        host: args.host,
        engine_port: args.engine_port,
        event_port: args.event_port,
        access_key: args.access_key,
        threads: args.threads,
        timeout_secs: args.timeout_secs,
    };
    let engine = Engine::new(config)?;

    match args.command {
        Command::Query {
            user,
            item,
            limit,
            filters,
            excludes,
            boosts,
            deboosts,
            dry_run,
        } => {
            let mut query = engine.query().filter(pairs(filters)).exclude(pairs(excludes));
            if let Some(user) = user {
                query = query.for_user(user);
            }
            if let Some(item) = item {
                query = query.similar_to(item);
            }
            if let Some(limit) = limit {
                query = query.limit(limit);
            }
            for boost in boosts {
                query = query.boost(boost.amount, pairs(vec![boost.field]))?;
            }
            for deboost in deboosts {
                query = query.deboost(deboost.amount, pairs(vec![deboost.field]))?;
            }

            if dry_run {
                println!("{}", serde_json::to_string_pretty(&query.payload())?);
                return Ok(());
            }

            let scores = engine.item_scores(&query).await?;
            info!("Received {} recommendations", scores.len());
            println!("{}", serde_json::to_string_pretty(&scores)?);
        }
        Command::Set {
            entity_type,
            entity_id,
            properties,
            export,
        } => {
            let properties = properties.unwrap_or(Value::Null);
            match export {
                Some(path) => {
                    let mut exporter = EventExporter::append_to(&path)
                        .with_context(|| format!("cannot open {}", path.display()))?;
                    exporter.export_entity(&entity_type, &entity_id, properties)?;
                    exporter.flush()?;
                    info!("Exported $set for {} {} to {:?}", entity_type, entity_id, path);
                }
                None => {
                    let response = engine.upsert_entity(&entity_type, &entity_id, properties).await?;
                    println!("{}", response);
                }
            }
        }
        Command::Event {
            name,
            user,
            item,
            properties,
            at,
            export,
        } => {
            let properties = properties.unwrap_or(Value::Null);
            match export {
                Some(path) => {
                    let mut exporter = EventExporter::append_to(&path)
                        .with_context(|| format!("cannot open {}", path.display()))?;
                    exporter.export_event(&name, &user, &item, properties, at)?;
                    exporter.flush()?;
                    info!("Exported {} event for {} to {:?}", name, user, path);
                }
                None => {
                    let response = engine.record_event(&name, &user, &item, properties, at).await?;
                    println!("{}", response);
                }
            }
        }
    }

    Ok(())
}
