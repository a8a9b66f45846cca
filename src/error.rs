//! Error taxonomy for a rotation cycle.
//!
//! Every variant is cycle-scoped: a failed cycle is reported to the front end
//! and the next cycle runs normally. Nothing in here is retried silently.

use thiserror::Error;

/// Errors produced by the fetch/apply core.
#[derive(Debug, Error)]
pub enum WallError {
    /// Detection or apply cannot proceed on this platform or desktop.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),
    /// The configured source name has no registered strategy.
    #[error("unknown source `{0}`")]
    UnknownSource(String),
    /// The image-board API answered with a non-success status.
    #[error("request failed with status code {status} ({url})")]
    RequestFailed { status: u16, url: String },
    /// The request never produced a status (connect error, timeout, bad body).
    #[error("request failed: {0}")]
    Transport(String),
    /// A required configuration key is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Building the spanning image failed.
    #[error("composition error: {0}")]
    Composition(String),
    /// A caller passed an argument outside the accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An external wallpaper utility ran but reported failure.
    #[error("`{program}` failed ({status})")]
    CommandFailed { program: String, status: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WallError {
    /// Short category name, used by the status bar.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsupportedPlatform(_) => "unsupported",
            Self::UnknownSource(_) => "unknown source",
            Self::RequestFailed { .. } | Self::Transport(_) => "network",
            Self::Configuration(_) => "config",
            Self::Composition(_) => "composition",
            Self::InvalidArgument(_) => "argument",
            Self::CommandFailed { .. } => "command",
            Self::Io(_) => "io",
        }
    }
}

impl From<reqwest::Error> for WallError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::RequestFailed {
                status: status.as_u16(),
                url: err.url().map(ToString::to_string).unwrap_or_default(),
            },
            None => Self::Transport(err.to_string()),
        }
    }
}

impl From<image::ImageError> for WallError {
    fn from(err: image::ImageError) -> Self {
        Self::Composition(err.to_string())
    }
}

pub type Result<T, E = WallError> = std::result::Result<T, E>;
