//! Board-independent post metadata.
//!
//! `Post` is what every source strategy turns its board's JSON into. The
//! front end displays it; wallpaper strategies never look at it.
//!
//! ## For contributors
//!
//! If you are adding a new board you should not need to touch this file:
//! map the board's field names onto these fields in the board's module.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// One fetched image's metadata, normalised from any board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    /// Board-specific numeric id.
    pub id: u64,

    /// Uploader or author as the board reports it (a name on Konachan, an
    /// uploader id on e621).
    pub author: String,

    /// Single-letter rating: `s`, `q` or `e`.
    pub rating: String,

    pub width: u32,
    pub height: u32,

    pub tags: BTreeSet<String>,

    /// Direct URL of the full image.
    pub file_url: String,

    /// Human-facing page for the post.
    pub show_url: String,

    /// Upload time, when the board reports one.
    pub created: Option<DateTime<Utc>>,

    /// Registry key of the source that produced this post.
    pub source_name: String,
}

impl Post {
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn rating_label(&self) -> &str {
        match self.rating.as_str() {
            "s" => "safe",
            "q" => "questionable",
            "e" => "explicit",
            other => other,
        }
    }
}
