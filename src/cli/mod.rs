//! CLI command definitions for taskgenius
//!
//! The main entry point is the `Cli` struct which contains subcommands.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// TaskGenius task manager server and CLI tools
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (default: ./taskgenius.yaml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Address to bind the API server to (overrides config)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port for the API server (overrides config)
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API and reminder worker (default if no subcommand given)
    Serve,

    /// Parse a free-text task description and print the result as JSON
    Parse {
        /// Task text, e.g. "Finish report by Friday 5pm high priority"
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Run one reminder cycle and exit
    Remind,

    /// Export a user's tasks
    Export(ExportArgs),
}

/// Arguments for the export subcommand
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Email of the user whose tasks to export
    #[arg(short, long)]
    pub email: String,

    /// Output format: csv, json or markdown (aliases: excel, xlsx, md, pdf)
    #[arg(short, long, default_value = "csv")]
    pub format: String,

    /// Output file path (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}
