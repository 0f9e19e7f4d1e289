//! CLI argument parsing for docmigrate

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::migration::Phase;
use crate::store::WriteMode;

#[derive(Parser, Debug)]
#[command(name = "dm")]
#[command(author, version, about = "One-shot MongoDB document migration", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// MongoDB connection string (overrides config)
    #[arg(long, global = true)]
    pub uri: Option<String>,

    /// Database name (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Subcommand to execute (default: run)
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Remap collections, then load seed files
    Run {
        /// Write mode for both phases
        #[arg(short, long)]
        mode: Option<WriteMode>,

        /// Directory seed file paths resolve against
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },

    /// Remap collections only
    Remap {
        /// Write mode
        #[arg(short, long)]
        mode: Option<WriteMode>,
    },

    /// Load seed files only
    Load {
        /// Write mode
        #[arg(short, long)]
        mode: Option<WriteMode>,

        /// Directory seed file paths resolve against
        #[arg(long)]
        base_dir: Option<PathBuf>,
    },

    /// Print the effective configuration as YAML
    Config,
}

impl Cli {
    /// The command to run, defaulting to a full run
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run {
            mode: None,
            base_dir: None,
        })
    }

    /// Apply command line overrides on top of loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(uri) = &self.uri {
            config.database.uri = uri.clone();
        }
        if let Some(name) = &self.database {
            config.database.name = name.clone();
        }

        let (remap_mode, load_mode, base_dir) = match self.command() {
            Command::Run { mode, base_dir } => (mode, mode, base_dir),
            Command::Remap { mode } => (mode, None, None),
            Command::Load { mode, base_dir } => (None, mode, base_dir),
            Command::Config => (None, None, None),
        };
        if let Some(mode) = remap_mode {
            config.remap.write_mode = mode;
        }
        if let Some(mode) = load_mode {
            config.load.write_mode = mode;
        }
        if base_dir.is_some() {
            config.load.base_dir = base_dir;
        }
    }
}

impl Command {
    /// Phases this command runs, in order
    pub fn phases(&self) -> Vec<Phase> {
        match self {
            Command::Run { .. } => vec![Phase::Remap, Phase::Load],
            Command::Remap { .. } => vec![Phase::Remap],
            Command::Load { .. } => vec![Phase::Load],
            Command::Config => vec![],
        }
    }
}
