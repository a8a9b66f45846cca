//! Logging setup.
//!
//! `tracing-subscriber` with an `EnvFilter`: `RUST_LOG` wins, otherwise
//! the level picked on the command line (`info`, `debug` with `--verbose`,
//! `warn` with `--quiet`). The terminal front end owns stdout,
//! so it logs to a file in the user's data directory instead.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

pub enum Target {
    Stderr,
    /// Append to [`log_file_path`].
    File,
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// `<data dir>/konawall/konawall.log`, falling back to the temp dir.
pub fn log_file_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("konawall")
        .join("konawall.log")
}

fn open_log_file() -> Result<(PathBuf, File)> {
    let path = log_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;
    Ok((path, file))
}

/// Install the global subscriber. Returns the log file when logging to one.
pub fn init(target: Target, default_level: &str) -> Result<Option<PathBuf>> {
    let builder = tracing_subscriber::fmt().with_env_filter(filter(default_level));
    match target {
        Target::Stderr => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
            Ok(None)
        }
        Target::File => {
            let (path, file) = open_log_file()?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
            Ok(Some(path))
        }
    }
}
