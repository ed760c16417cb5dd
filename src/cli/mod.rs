//! CLI argument parsing and command routing

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::events::Document;

/// atlas-watch: follow MongoDB change streams from Atlas App Services
#[derive(Debug, Parser)]
#[command(name = "atlas-watch")]
#[command(about = "Follow MongoDB change streams from Atlas App Services", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Global config file to use instead of the default location
    #[arg(long, global = true, env = "ATLAS_WATCH_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Watch a collection and print each change event as a JSON line
    Tail {
        /// Database name
        #[arg(short, long)]
        database: String,

        /// Collection name
        #[arg(short, long)]
        collection: String,

        /// Only watch the document with this `_id` (EJSON, repeatable)
        #[arg(long = "id", value_name = "JSON", value_parser = parse_json, conflicts_with = "filter")]
        ids: Vec<Value>,

        /// Only report changes matching this filter document (EJSON)
        #[arg(long, value_name = "JSON", value_parser = parse_document)]
        filter: Option<Document>,

        /// Override the configured app id
        #[arg(long)]
        app_id: Option<String>,

        /// Override the configured base URL
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Decode a captured event stream and print each change event as a JSON line
    Decode {
        /// Capture to read; stdin when omitted or `-`
        file: Option<PathBuf>,
    },

    /// Show configuration locations
    Config {
        /// Also print the merged settings (access token masked)
        #[arg(long)]
        show: bool,

        /// Write a global config file from the defaults and `ATLAS_WATCH_*` variables
        #[arg(long)]
        init: bool,
    },

    /// Show version information
    Version,
}

impl Cli {
    /// Parse CLI arguments from environment
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))
}

fn parse_document(raw: &str) -> Result<Document, String> {
    match parse_json(raw)? {
        Value::Object(document) => Ok(document),
        other => Err(format!("expected a JSON object, got {other}")),
    }
}
