use clap::{Parser, Subcommand};

use crate::config::CONFIG_FILE_NAME;

/// servicehost 命令行参数
#[derive(Parser, Debug)]
#[command(
    name = "servicehost",
    version,
    about = "Dependency-aware service container and plugin manager",
    long_about = "servicehost wires services declared in a TOML file in dependency order and loads plugins discovered on disk."
)]
pub struct Cli {
    /// Services file path
    #[arg(short, long, global = true, value_name = "FILE", default_value = CONFIG_FILE_NAME)]
    pub config: String,

    /// Environment overlay to apply (falls back to SERVICEHOST_ENV)
    #[arg(short, long, global = true, value_name = "ENV")]
    pub env: Option<String>,

    /// Log level (trace|debug|info|warn|error)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Additional plugin directory, may be repeated
    #[arg(long = "plugin-dir", global = true, value_name = "DIR")]
    pub plugin_dirs: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// 子命令
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Register services from the file and report them in dependency order
    #[command(alias = "svc")]
    Services {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Discover and load plugins, then report their status
    #[command(alias = "pl")]
    Plugins {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Validate the services file without constructing anything
    Validate,
}
