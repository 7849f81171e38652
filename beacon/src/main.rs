//! beacon - inspect and manage a beacon event store
//!
//! This tool provides commands for:
//! - Showing queue status and configuration
//! - Listing, recording and staging queued events
//! - Listing and editing pending requests
//! - Reading and writing stored preferences
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/beacon/beacon.db (~/.local/share/beacon/beacon.db)
//! - Config: $XDG_CONFIG_HOME/beacon/config.toml (~/.config/beacon/config.toml)

use anyhow::{bail, Context, Result};
use beacon_core::{Config, EventRecord, SegmentValue, Store};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Inspect and manage a beacon event store")]
#[command(version)]
struct Args {
    /// Write logs to the XDG state directory
    #[arg(short, long)]
    verbose: bool,

    /// Database file (default: from config)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show store location and queue sizes
    Status,

    /// Work with queued events
    #[command(subcommand)]
    Events(EventsCommand),

    /// Work with pending requests
    #[command(subcommand)]
    Requests(RequestsCommand),

    /// Read and write stored preferences
    #[command(subcommand)]
    Pref(PrefCommand),

    /// Delete both queues
    Clear,
}

#[derive(Subcommand)]
enum EventsCommand {
    /// Print queued events as JSON lines, oldest first
    List {
        /// Print stored entries as-is, in storage order
        #[arg(long)]
        raw: bool,
    },

    /// Record an event
    Add {
        key: String,

        #[arg(long, default_value_t = 1)]
        count: u32,

        #[arg(long, default_value_t = 0.0)]
        sum: f64,

        #[arg(long, default_value_t = 0.0)]
        duration: f64,

        /// Segment as key=value; integers, decimals and booleans are stored typed
        #[arg(long = "segment", value_name = "KEY=VALUE")]
        segments: Vec<String>,
    },

    /// Move queued events into a pending request
    Stage {
        /// Maximum number of events to stage
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum RequestsCommand {
    /// Print pending requests, oldest first
    List,

    /// Queue a request
    Add { request: String },

    /// Remove the first pending request equal to REQUEST
    Remove { request: String },
}

#[derive(Subcommand)]
enum PrefCommand {
    /// Print a stored value
    Get {
        key: String,
        /// Use the push namespace
        #[arg(long)]
        push: bool,
    },

    /// Store a value
    Set {
        key: String,
        value: String,
        #[arg(long)]
        push: bool,
    },

    /// Remove a value
    Unset {
        key: String,
        #[arg(long)]
        push: bool,
    },

    /// List stored keys
    Keys {
        #[arg(long)]
        push: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(path) = args.database {
        config.storage.database_path = Some(path);
    }

    let _log_guard = if args.verbose {
        Some(beacon_core::logging::init(&config.logging).context("failed to initialize logging")?)
    } else {
        None
    };

    tracing::info!("beacon starting");
    let db_path = config.storage.resolved_database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let (db, store) = Store::open_database(&config)
        .with_context(|| format!("failed to open store at {}", db_path.display()))?;

    match args.command {
        Command::Status => cmd_status(&config, &store),
        Command::Events(cmd) => cmd_events(&store, cmd),
        Command::Requests(cmd) => cmd_requests(&store, cmd),
        Command::Pref(cmd) => cmd_pref(&db, &store, cmd),
        Command::Clear => {
            store.clear().context("failed to clear queues")?;
            println!("Cleared event and request queues");
            Ok(())
        }
    }
}

fn cmd_status(config: &Config, store: &Store) -> Result<()> {
    println!("Beacon Store");
    println!("============");
    println!();
    println!(
        "Database:          {}",
        config.storage.resolved_database_path().display()
    );
    println!("Namespace:         {}", config.storage.namespace);
    println!("Push namespace:    {}", config.storage.push_namespace);
    println!();
    println!("Queued events:     {}", store.events().len()?);
    println!("Pending requests:  {}", store.connections().len()?);
    println!(
        "Flush threshold:   {} ({})",
        config.queue.event_queue_threshold,
        if store.should_flush_events()? {
            "flush due"
        } else {
            "not reached"
        }
    );
    match config.queue.request_capacity() {
        Some(capacity) => println!("Request capacity:  {}", capacity),
        None => println!("Request capacity:  unlimited"),
    }
    Ok(())
}

fn cmd_events(store: &Store, cmd: EventsCommand) -> Result<()> {
    match cmd {
        EventsCommand::List { raw: true } => {
            for entry in store.events().raw()? {
                println!("{}", entry);
            }
        }
        EventsCommand::List { raw: false } => {
            for event in store.events().list()? {
                println!("{}", event.to_json()?);
            }
        }
        EventsCommand::Add {
            key,
            count,
            sum,
            duration,
            segments,
        } => {
            if key.is_empty() {
                bail!("event key must not be empty");
            }
            let mut event = EventRecord::new(key, store.now())
                .with_count(count)
                .with_sum(sum)
                .with_duration(duration);
            for segment in &segments {
                let (k, v) = segment
                    .split_once('=')
                    .with_context(|| format!("segment {:?} is not KEY=VALUE", segment))?;
                event = match parse_typed(v) {
                    Some(typed) => event.with_typed_segment(k, typed),
                    None => event.with_segment(k, v),
                };
            }
            store.events().add_event(&event)?;
            tracing::info!(key = %event.key, timestamp = event.timestamp, "Recorded event");
            println!("{}", event.to_json()?);
        }
        EventsCommand::Stage { limit } => {
            let staged = store.stage_events(limit, |events| events.to_string())?;
            tracing::info!(staged, ?limit, "Staged events");
            println!("Staged {} event(s)", staged);
        }
    }
    Ok(())
}

/// Integers, decimals and booleans become typed segments
fn parse_typed(value: &str) -> Option<SegmentValue> {
    if let Ok(b) = value.parse::<bool>() {
        return Some(SegmentValue::Bool(b));
    }
    if let Ok(i) = value.parse::<i64>() {
        return Some(SegmentValue::Int(i));
    }
    match value.parse::<f64>() {
        Ok(d) if d.is_finite() => Some(SegmentValue::Double(d)),
        _ => None,
    }
}

fn cmd_requests(store: &Store, cmd: RequestsCommand) -> Result<()> {
    match cmd {
        RequestsCommand::List => {
            for request in store.connections().list()? {
                println!("{}", request);
            }
        }
        RequestsCommand::Add { request } => {
            if request.is_empty() {
                bail!("request must not be empty");
            }
            store.connections().add(&request)?;
        }
        RequestsCommand::Remove { request } => {
            if !store.connections().remove(&request)? {
                tracing::debug!(request = %request, "No pending request matched");
                eprintln!("No pending request matched");
            }
        }
    }
    Ok(())
}

fn cmd_pref(db: &beacon_core::Database, store: &Store, cmd: PrefCommand) -> Result<()> {
    match cmd {
        PrefCommand::Get { key, push } => {
            let value = if push {
                store.push_preferences().get(&key)?
            } else {
                store.preference(&key)?
            };
            match value {
                Some(value) => println!("{}", value),
                None => bail!("{} is not set", key),
            }
        }
        PrefCommand::Set { key, value, push } => {
            if push {
                store.push_preferences().set(&key, Some(&value))?;
            } else {
                store.set_preference(&key, Some(&value))?;
            }
        }
        PrefCommand::Unset { key, push } => {
            if push {
                store.push_preferences().set(&key, None)?;
            } else {
                store.set_preference(&key, None)?;
            }
        }
        PrefCommand::Keys { push } => {
            let prefs = if push {
                store.push_preferences()
            } else {
                store.preferences()
            };
            for key in db.keys(prefs.namespace())? {
                println!("{}", key);
            }
        }
    }
    Ok(())
}
