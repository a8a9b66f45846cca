//! Image-board sources.
//!
//! This module defines the [`SourceStrategy`] trait, the [`FetchResult`] it
//! produces and the bootstrap routine that fills the source registry.
//! Concrete boards live in sub-modules; [`booru`] holds the HTTP plumbing
//! they share.
//!
//! ## For contributors: adding a new board
//!
//! 1. Create a new file in this directory (e.g. `danbooru.rs`).
//! 2. Define a struct and implement [`SourceStrategy`] for it, using
//!    [`booru::BoardClient`] for the request and the downloads.
//! 3. Give the module a `register` function and call it from
//!    [`register_all`].
//!
//! The dispatcher, the scheduler and the front end are all source-agnostic.

pub mod booru;
mod e621;
mod konachan;
pub(crate) mod post;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{Map, Value};

pub use booru::BoardClient;
pub use post::Post;

use crate::error::{Result, WallError};
use crate::registry::Registry;

/// Tag asking a board for a random ordering.
pub const RANDOM_ORDER_TAG: &str = "order:random";

/// Downloaded files plus their posts; `files[i]` belongs to `posts[i]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResult {
    pub files: Vec<PathBuf>,
    pub posts: Vec<Post>,
}

impl FetchResult {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Free-form per-source settings (credentials and the like).
#[derive(Debug, Clone, Default)]
pub struct SourceConfig(Map<String, Value>);

impl SourceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// A string key a source cannot work without.
    pub fn require_str(&self, key: &str) -> Result<&str> {
        match self.0.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s),
            Some(_) => Err(WallError::Configuration(format!("`{key}` must be a non-empty string"))),
            None => Err(WallError::Configuration(format!("`{key}` is required"))),
        }
    }
}

/// A named way of turning (count, tags, config) into downloaded images.
///
/// The dispatcher runs at most one fetch at a time, but it does so from the
/// scheduler thread, hence `Send + Sync`.
pub trait SourceStrategy: Send + Sync {
    /// Fetch `count` posts matching `tags` and download their images.
    ///
    /// `count == 0` yields an empty result without touching the network.
    /// The caller's tags are not modified.
    fn fetch(&self, count: usize, tags: &[String], config: &SourceConfig) -> Result<FetchResult>;
}

pub type SourceRegistry = Registry<dyn SourceStrategy>;

/// Reject negative counts before they reach a board.
pub fn checked_count(raw: i64) -> Result<usize> {
    usize::try_from(raw).map_err(|_| {
        WallError::InvalidArgument(format!("count must not be negative (got {raw})"))
    })
}

/// The caller's tags plus [`RANDOM_ORDER_TAG`], unless an `order:` tag is
/// already present.
pub fn randomized_tags(tags: &[String]) -> Vec<String> {
    let mut tags = tags.to_vec();
    if !tags.iter().any(|t| t.starts_with("order:")) {
        tags.push(RANDOM_ORDER_TAG.to_string());
    }
    tags
}

/// Register every built-in board, in a fixed order.
pub fn register_all(registry: &mut SourceRegistry, client: Arc<BoardClient>) {
    konachan::register(registry, Arc::clone(&client));
    e621::register(registry, client);
}
