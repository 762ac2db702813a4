//! CLI module for Hilo.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Hilo - question answering over chat exports
///
/// Imports Telegram chat exports, and answers questions from the reply
/// threads around the most similar messages.
#[derive(Parser, Debug)]
#[command(name = "hilo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "HILO_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question and get an answer from the message archive
    Ask {
        /// The question to ask
        question: String,

        /// Number of similar messages to build threads from
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Skip the in-domain check
        #[arg(long)]
        no_validate: bool,
    },

    /// Search for similar messages
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// Show the reconstructed thread around a stored message
    Thread {
        /// Conversation title
        title: String,

        /// Message id within the conversation
        message_id: i64,
    },

    /// Import a Telegram chat export (result.json)
    Ingest {
        /// Path to the export file
        file: String,

        /// Skip every message before this id
        #[arg(long)]
        start_at: Option<i64>,

        /// Store messages under this title instead of the chat name
        #[arg(long)]
        title: Option<String>,
    },

    /// List imported conversations
    List,

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

    /// Show configuration file path
    Path,

    /// Write the current configuration to the configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
