//! Command-line interface for redis-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and merging with flags
//! - Subcommands (version, completion, config)
//! - Connection target display with the password hidden

pub mod completion;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, LogLevel};
use crate::error::{ConfigError, Result};

/// Redis Export - dump every key of a Redis database into a JSON array
#[derive(Parser, Debug)]
#[command(
    name = "redis-export",
    version,
    about = "Export all keys of a Redis database to a JSON file",
    long_about = "Streams every key of a Redis database, with its type, value and TTL,
into a single JSON array on disk. Keys are enumerated with SCAN and resolved
by a pool of concurrent workers; memory stays bounded regardless of keyspace size."
)]
pub struct CliArgs {
    /// Redis server address (host:port)
    #[arg(short = 'a', long = "addr", value_name = "HOST:PORT")]
    pub addr: Option<String>,

    /// Redis password
    #[arg(short = 'p', long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Redis database index
    #[arg(short = 'd', long, value_name = "INDEX")]
    pub db: Option<i64>,

    /// Output file path
    #[arg(short = 'o', long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    /// Number of concurrent workers
    #[arg(short = 'w', long, value_name = "N")]
    pub workers: Option<usize>,

    /// Keys per scan page and queue capacity
    #[arg(short = 'b', long = "batch", value_name = "N")]
    pub batch: Option<usize>,

    /// Log level (error, warn, info, debug, trace; fatal and panic mean error)
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Configuration file path
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        value_hint = clap::ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    /// Show a progress spinner
    #[arg(long)]
    pub progress: bool,

    /// Seconds between progress log lines
    #[arg(long = "progress-interval", value_name = "SECONDS")]
    pub progress_interval: Option<u64>,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for redis-export
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,
    },
}

/// CLI interface handler
#[derive(Debug)]
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Effective configuration (file merged with flags)
    config: Config,
}

impl CliInterface {
    /// Parse the process arguments and load configuration
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Build from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Validated configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        Self::apply_args_to_config(&mut config, args)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) -> Result<()> {
        Self::apply_source_args(config, args);
        Self::apply_export_args(config, args);
        Self::apply_logging_args(config, args)
    }

    /// Apply connection-related CLI arguments to configuration
    fn apply_source_args(config: &mut Config, args: &CliArgs) {
        if let Some(addr) = &args.addr {
            config.source.address = addr.clone();
        }
        if let Some(password) = &args.password {
            config.source.password = Some(password.clone());
        }
        if let Some(db) = args.db {
            config.source.db = db;
        }
    }

    /// Apply export-related CLI arguments to configuration
    fn apply_export_args(config: &mut Config, args: &CliArgs) {
        if let Some(output) = &args.output {
            config.export.output = output.clone();
        }
        if let Some(workers) = args.workers {
            config.export.workers = workers;
        }
        if let Some(batch) = args.batch {
            config.export.batch_size = batch;
        }
        if let Some(interval) = args.progress_interval {
            config.export.progress_interval = interval;
        }
        if args.progress {
            config.export.progress_bar = true;
        }
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) -> Result<()> {
        if let Some(name) = &args.log_level {
            let level = LogLevel::parse(name).ok_or_else(|| ConfigError::InvalidValue {
                field: "log-level".to_string(),
                value: name.clone(),
            })?;
            config.logging.level = level;
        }

        if args.very_verbose {
            config.logging.level = LogLevel::Trace;
        } else if args.verbose {
            config.logging.level = LogLevel::Debug;
        }
        Ok(())
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Whether the invocation asks for nothing to do
    ///
    /// With no subcommand and neither `--addr` nor `--output`, the tool
    /// prints its help instead of exporting with defaults.
    pub fn should_show_help(&self) -> bool {
        self.args.command.is_none() && self.args.addr.is_none() && self.args.output.is_none()
    }

    /// Print the long help text
    pub fn print_help(&self) -> Result<()> {
        CliArgs::command().print_long_help()?;
        Ok(())
    }

    /// Connection target for display, with the password hidden
    pub fn sanitized_target(&self) -> String {
        sanitize_target(
            &self.config.source.address,
            self.config.source.password.as_deref(),
            self.config.source.db,
        )
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Version) => {
                self.show_version();
                Ok(true)
            }
            Some(Commands::Completion { shell }) => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Some(Commands::Config { show }) => {
                if *show {
                    self.show_config()?;
                } else {
                    println!("Configuration file: {}", self.config_path().display());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("redis-export version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        println!("Configuration file: {}", self.config_path().display());
        println!();
        println!("=== Effective Configuration ===");
        println!();
        println!("{}", self.displayable_config().to_toml_string()?);
        Ok(())
    }

    /// Effective configuration with the password masked
    fn displayable_config(&self) -> Config {
        let mut config = self.config.clone();
        if config.source.password.is_some() {
            config.source.password = Some("***".to_string());
        }
        config
    }

    /// Get configuration file path (from args or default)
    pub fn config_path(&self) -> PathBuf {
        self.args
            .config_file
            .as_deref()
            .map(Path::to_path_buf)
            .unwrap_or_else(Config::default_path)
    }

    /// Print banner with connection target and output path
    pub fn print_banner(&self) {
        eprintln!("Connecting to: {}", self.sanitized_target());
        eprintln!("Writing to: {}", self.config.export.output.display());
    }
}

/// Render a connection target as `redis://[:***@]host:port/db`
fn sanitize_target(address: &str, password: Option<&str>, db: i64) -> String {
    let auth = if password.is_some() { ":***@" } else { "" };
    format!("redis://{}{}/{}", auth, address, db)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(argv: &[&str]) -> CliInterface {
        let args = CliArgs::try_parse_from(argv.iter().copied()).unwrap();
        CliInterface {
            config: {
                let mut config = Config::default();
                CliInterface::apply_args_to_config(&mut config, &args).unwrap();
                config
            },
            args,
        }
    }

    #[test]
    fn test_cli_args_parsing() {
        let args = CliArgs::try_parse_from(["redis-export"]).unwrap();
        assert!(args.addr.is_none());
        assert!(args.output.is_none());
        assert!(args.command.is_none());
    }

    #[test]
    fn test_short_flags() {
        let args = CliArgs::try_parse_from([
            "redis-export", "-a", "10.0.0.5:6380", "-p", "pw", "-d", "2", "-o", "out.json", "-w",
            "12", "-b", "500", "-l", "warn",
        ])
        .unwrap();
        assert_eq!(args.addr.as_deref(), Some("10.0.0.5:6380"));
        assert_eq!(args.password.as_deref(), Some("pw"));
        assert_eq!(args.db, Some(2));
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
        assert_eq!(args.workers, Some(12));
        assert_eq!(args.batch, Some(500));
        assert_eq!(args.log_level.as_deref(), Some("warn"));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = cli(&[
            "redis-export", "--addr", "cache:7000", "--db", "3", "--workers", "4", "--batch",
            "50", "--progress", "--progress-interval", "1",
        ]);
        let config = cli.config();
        assert_eq!(config.source.address, "cache:7000");
        assert_eq!(config.source.db, 3);
        assert_eq!(config.export.workers, 4);
        assert_eq!(config.export.batch_size, 50);
        assert_eq!(config.export.progress_interval, 1);
        assert!(config.export.progress_bar);
    }

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(cli(&["redis-export", "-v"]).config().logging.level, LogLevel::Debug);
        assert_eq!(cli(&["redis-export", "--vv"]).config().logging.level, LogLevel::Trace);
        assert_eq!(
            cli(&["redis-export", "-l", "error"]).config().logging.level,
            LogLevel::Error
        );
    }

    #[test]
    fn test_unknown_log_level_is_rejected() {
        let args = CliArgs::try_parse_from(["redis-export", "-l", "chatty"]).unwrap();
        let mut config = Config::default();
        assert!(CliInterface::apply_args_to_config(&mut config, &args).is_err());
    }

    #[test]
    fn test_zero_workers_fails_validation() {
        let args = CliArgs::try_parse_from(["redis-export", "-o", "x.json", "-w", "0"]).unwrap();
        assert!(CliInterface::from_args(args).is_err());
    }

    #[test]
    fn test_negative_db_fails_validation() {
        let args = CliArgs::try_parse_from(["redis-export", "-o", "x.json", "--db=-1"]).unwrap();
        assert_eq!(args.db, Some(-1));
        let err = CliInterface::from_args(args).unwrap_err();
        assert!(err.to_string().contains("source.db"));
    }

    #[test]
    fn test_fatal_log_level_maps_to_error() {
        let cli = cli(&["redis-export", "-l", "fatal"]);
        assert_eq!(cli.config().logging.level, LogLevel::Error);
    }

    #[test]
    fn test_help_when_nothing_requested() {
        assert!(cli(&["redis-export"]).should_show_help());
        assert!(cli(&["redis-export", "-v"]).should_show_help());
        assert!(!cli(&["redis-export", "-a", "localhost:6379"]).should_show_help());
        assert!(!cli(&["redis-export", "-o", "dump.json"]).should_show_help());
        assert!(!cli(&["redis-export", "version"]).should_show_help());
    }

    #[test]
    fn test_subcommands_parse() {
        let args = CliArgs::try_parse_from(["redis-export", "completion", "zsh"]).unwrap();
        assert!(matches!(args.command, Some(Commands::Completion { ref shell }) if shell == "zsh"));

        let args = CliArgs::try_parse_from(["redis-export", "config", "--show"]).unwrap();
        assert!(matches!(args.command, Some(Commands::Config { show: true })));
    }

    #[test]
    fn test_sanitize_target() {
        assert_eq!(sanitize_target("localhost:6379", None, 0), "redis://localhost:6379/0");
        let sanitized = sanitize_target("10.1.1.1:6379", Some("hunter2"), 4);
        assert_eq!(sanitized, "redis://:***@10.1.1.1:6379/4");
        assert!(!sanitized.contains("hunter2"));
    }

    #[test]
    fn test_displayable_config_masks_password() {
        let cli = cli(&["redis-export", "-a", "h:1", "-p", "topsecret"]);
        let rendered = cli.displayable_config().to_toml_string().unwrap();
        assert!(!rendered.contains("topsecret"));
        assert!(rendered.contains("***"));
        assert!(cli.sanitized_target().contains(":***@"));
    }
}
