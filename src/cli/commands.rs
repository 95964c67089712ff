//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::resources::FolderKind;

/// modkit - Declarative module build and deploy.
#[derive(Parser, Debug)]
#[command(name = "modkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding the modules and `config.<env>.yaml`.
    #[arg(short, long, global = true, default_value = ".", env = "MODKIT_ROOT")]
    pub root: PathBuf,

    /// Target environment.
    #[arg(short, long, global = true, default_value = "dev", env = "MODKIT_ENV")]
    pub env: String,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve, validate and write the modules to the build directory.
    Build {
        /// Output directory.
        #[arg(long, default_value = "build")]
        build_dir: PathBuf,

        /// Keep the existing build directory contents.
        #[arg(long)]
        no_clean: bool,

        /// Check dependencies missing from the build against the platform.
        #[arg(long)]
        verify: bool,

        /// Exit non-zero on warnings too.
        #[arg(long)]
        strict: bool,
    },

    /// Create or update the built resources on the platform.
    Deploy {
        /// Shared deploy options.
        #[command(flatten)]
        target: TargetArgs,

        /// Delete remote resources absent from the build, and recreate changed ones.
        #[arg(long)]
        drop: bool,
    },

    /// Delete the built resources from the platform.
    Clean {
        /// Shared deploy options.
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Options shared by `deploy` and `clean`.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Directory holding the build output.
    #[arg(long, default_value = "build")]
    pub build_dir: PathBuf,

    /// Report the plan without changing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Allow deleting resources that hold data.
    #[arg(long)]
    pub drop_data: bool,

    /// Restrict the operation to these resource folders.
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<FolderKind>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
