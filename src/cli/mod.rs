//! CLI module for Blikk.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Blikk - Video Frame Retrieval and Grounded Q&A
///
/// A CLI tool and HTTP service that answers questions about videos from
/// their extracted frames. The name "Blikk" comes from the Norwegian word
/// for "glance."
#[derive(Parser, Debug)]
#[command(name = "blikk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest extracted frame records from a JSON file
    Ingest {
        /// Path to a JSON array of frame records ({frame_id, timestamp, description, path})
        input: String,

        /// Collection name (sanitized; defaults to the configured collection)
        #[arg(short, long)]
        index: Option<String>,

        /// Video id; scopes the frames to namespace "video-<id>"
        #[arg(long)]
        video_id: Option<String>,

        /// Whole-video summary to store alongside the frames
        #[arg(short, long)]
        summary: Option<String>,

        /// Original video filename, kept in record metadata
        #[arg(long)]
        video_filename: Option<String>,

        /// Assume the collection exists; skip the readiness check
        #[arg(long)]
        skip_ensure: bool,
    },

    /// Search for the frames most relevant to a question
    Query {
        /// The question to search with
        question: String,

        /// Collection name
        #[arg(short, long)]
        index: Option<String>,

        /// Video id; scopes the search to namespace "video-<id>"
        #[arg(long)]
        video_id: Option<String>,

        /// Maximum number of matches (capped at 50)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Assume the collection exists; skip the readiness check
        #[arg(long)]
        skip_ensure: bool,
    },

    /// Ask a question and get an answer grounded in the retrieved frames
    Analyze {
        /// The question to answer
        question: String,

        /// Collection name
        #[arg(short, long)]
        index: Option<String>,

        /// Video id; scopes retrieval to namespace "video-<id>"
        #[arg(long)]
        video_id: Option<String>,

        /// Number of frames to retrieve for context (capped at 50)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Assume the collection exists; skip the readiness check
        #[arg(long)]
        skip_ensure: bool,
    },

    /// Rebuild a video's frame timeline and summary
    Overview {
        /// Collection name
        #[arg(short, long)]
        index: Option<String>,

        /// Video id; selects namespace "video-<id>"
        #[arg(long)]
        video_id: Option<String>,

        /// Maximum number of records to recover (capped at 1000)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Assume the collection exists; skip the readiness check
        #[arg(long)]
        skip_ensure: bool,
    },

    /// List collections, or the namespaces of one collection
    List {
        /// Collection name; lists its namespaces instead of all collections
        #[arg(short, long)]
        index: Option<String>,
    },

    /// Delete a collection and its cached provisioning state
    Delete {
        /// Collection name to delete
        index: String,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "generation.model")
        key: String,
        /// Configuration value
        value: String,
    },

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
