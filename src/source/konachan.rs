//! Konachan (Moebooru) source.
//!
//! `GET https://konachan.com/post.json?limit=N&tags=a+b` answers with a bare
//! JSON array of posts. No credentials are needed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::booru::{query_url, BoardClient};
use super::{randomized_tags, FetchResult, Post, SourceConfig, SourceRegistry, SourceStrategy};
use crate::error::Result;

pub const NAME: &str = "konachan";
const API_URL: &str = "https://konachan.com/post.json";
const SHOW_URL: &str = "https://konachan.com/post/show";

/// The subset of a Moebooru post this crate reads.
#[derive(Debug, Deserialize)]
struct RawPost {
    id: u64,
    #[serde(default)]
    author: String,
    #[serde(default)]
    rating: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    /// Space-separated.
    #[serde(default)]
    tags: String,
    file_url: Option<String>,
    /// Unix seconds.
    created_at: Option<i64>,
}

pub struct Konachan {
    client: Arc<BoardClient>,
    api_url: String,
    show_url: String,
}

impl Konachan {
    pub fn new(client: Arc<BoardClient>) -> Self {
        Self::with_urls(client, API_URL, SHOW_URL)
    }

    pub fn with_urls(client: Arc<BoardClient>, api_url: &str, show_url: &str) -> Self {
        Self {
            client,
            api_url: api_url.to_string(),
            show_url: show_url.to_string(),
        }
    }

    /// Map raw posts onto [`Post`], dropping the ones without a file.
    fn convert(&self, raw: Vec<RawPost>) -> Vec<Post> {
        raw.into_iter()
            .filter_map(|p| {
                let Some(file_url) = p.file_url.filter(|u| !u.is_empty()) else {
                    debug!(id = p.id, "skipping post without file_url");
                    return None;
                };
                Some(Post {
                    id: p.id,
                    author: p.author,
                    rating: p.rating,
                    width: p.width,
                    height: p.height,
                    tags: p.tags.split_whitespace().map(String::from).collect(),
                    file_url,
                    show_url: format!("{}/{}", self.show_url, p.id),
                    created: p.created_at.and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
                    source_name: NAME.to_string(),
                })
            })
            .collect()
    }
}

impl SourceStrategy for Konachan {
    fn fetch(&self, count: usize, tags: &[String], _config: &SourceConfig) -> Result<FetchResult> {
        if count == 0 {
            return Ok(FetchResult::default());
        }
        let tags = randomized_tags(tags);
        let url = query_url(&self.api_url, count, &tags)?;
        let posts = self.convert(self.client.get_listing(&url, None)?);

        for post in &posts {
            info!(
                id = post.id,
                author = %post.author,
                rating = %post.rating,
                resolution = %post.resolution(),
                url = %post.file_url,
                "konachan post"
            );
        }
        self.client.download_posts(posts)
    }
}

pub fn register(registry: &mut SourceRegistry, client: Arc<BoardClient>) {
    registry.register(NAME, Box::new(Konachan::new(client)));
}
