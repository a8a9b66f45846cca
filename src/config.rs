//! Command-line configuration.
//!
//! [`Cli`] is the clap surface; [`Settings`] is the plain value the rest of
//! the crate consumes. Credentials may also come from the environment
//! (`KONAWALL_API_KEY`, `KONAWALL_LOGIN`).

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::dispatch::CycleConfig;
use crate::error::Result;
use crate::monitor::{FixedProbe, Monitor};
use crate::source::SourceConfig;

#[derive(Parser, Debug)]
#[command(
    name = "konawall",
    version,
    about = "Fetch random wallpapers from image boards and apply them to every monitor",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub cycle: CycleArgs,

    /// Log at debug level (RUST_LOG overrides).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Only log warnings and errors (RUST_LOG overrides).
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rotate wallpapers on a timer with a terminal front end (default).
    Run(CycleArgs),
    /// Run a single rotation cycle and print what was set.
    Once(CycleArgs),
    /// Print the detected environment key.
    Detect,
    /// Print the registered sources and environments.
    List,
}

#[derive(Args, Debug, Clone)]
pub struct CycleArgs {
    /// Image board to fetch from.
    #[arg(long, short, default_value = "konachan")]
    pub source: String,

    /// Desktop environment key; skips detection.
    #[arg(long, short)]
    pub environment: Option<String>,

    /// Images per cycle; defaults to one per monitor.
    #[arg(long, short, allow_negative_numbers = true)]
    pub count: Option<i64>,

    /// Seconds between timed rotations.
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = 600,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub interval: u64,

    /// Start with timed rotation paused.
    #[arg(long)]
    pub no_rotate: bool,

    /// Declare a monitor instead of probing, e.g. `DP-1:1920x1080+0+0`.
    #[arg(long = "display", value_name = "NAME:WxH+X+Y")]
    pub displays: Vec<String>,

    /// API key for boards that require one (e621).
    #[arg(long, env = "KONAWALL_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Account name sent with the API key.
    #[arg(long, env = "KONAWALL_LOGIN")]
    pub login: Option<String>,

    /// Where downloads and spanning images go (default: the temp dir).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Board tags to search for.
    #[arg(default_value = "rating:s")]
    pub tags: Vec<String>,
}

/// What `run`, `once` and the front end need.
#[derive(Debug, Clone)]
pub struct Settings {
    pub cycle: CycleConfig,
    pub interval: Duration,
    pub paused: bool,
    pub displays: Vec<Monitor>,
    pub output_dir: PathBuf,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// The cycle arguments of whichever command was chosen.
    pub fn cycle_args(&self) -> &CycleArgs {
        match &self.command {
            Some(Command::Run(args) | Command::Once(args)) => args,
            _ => &self.cycle,
        }
    }
}

impl CycleArgs {
    pub fn settings(&self) -> Result<Settings> {
        let mut source_config = SourceConfig::new();
        if let Some(key) = &self.api_key {
            source_config.set("api_key", key.as_str());
        }
        if let Some(login) = &self.login {
            source_config.set("login", login.as_str());
        }

        Ok(Settings {
            cycle: CycleConfig {
                source: self.source.clone(),
                environment: self.environment.clone(),
                count: self.count,
                tags: self.tags.clone(),
                source_config,
            },
            interval: Duration::from_secs(self.interval),
            paused: self.no_rotate,
            displays: FixedProbe::from_specs(&self.displays)?.0,
            output_dir: self.output_dir.clone().unwrap_or_else(std::env::temp_dir),
        })
    }
}
