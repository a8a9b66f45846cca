//! e621 source.
//!
//! `GET https://e621.net/posts.json?limit=N&tags=a+b` answers with
//! `{"posts": [...]}`. The board rejects anonymous API use, so an `api_key`
//! is mandatory; `login` enables HTTP basic auth alongside it.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::booru::{query_url, BoardClient};
use super::{randomized_tags, FetchResult, Post, SourceConfig, SourceRegistry, SourceStrategy};
use crate::error::Result;

pub const NAME: &str = "e621";
const API_URL: &str = "https://e621.net/posts.json";
const SHOW_URL: &str = "https://e621.net/posts";

#[derive(Debug, Deserialize)]
struct RawPost {
    id: u64,
    #[serde(default)]
    uploader_id: Option<u64>,
    #[serde(default)]
    rating: String,
    file: RawFile,
    /// Category name → tags in that category.
    #[serde(default)]
    tags: BTreeMap<String, Vec<String>>,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFile {
    url: Option<String>,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
}

pub struct E621 {
    client: Arc<BoardClient>,
    api_url: String,
    show_url: String,
}

impl E621 {
    pub fn new(client: Arc<BoardClient>) -> Self {
        Self {
            client,
            api_url: API_URL.to_string(),
            show_url: SHOW_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_api_url(client: Arc<BoardClient>, api_url: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            ..Self::new(client)
        }
    }

    fn convert(&self, raw: Vec<RawPost>) -> Vec<Post> {
        raw.into_iter()
            .filter_map(|p| {
                // Posts hidden by the board's blacklist come back with a null URL.
                let Some(file_url) = p.file.url.filter(|u| !u.is_empty()) else {
                    debug!(id = p.id, "skipping post without file url");
                    return None;
                };
                let created = p
                    .created_at
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Utc));
                Some(Post {
                    id: p.id,
                    author: p.uploader_id.map(|id| id.to_string()).unwrap_or_default(),
                    rating: p.rating,
                    width: p.file.width,
                    height: p.file.height,
                    tags: p.tags.into_values().flatten().collect(),
                    file_url,
                    show_url: format!("{}/{}", self.show_url, p.id),
                    created,
                    source_name: NAME.to_string(),
                })
            })
            .collect()
    }
}

impl SourceStrategy for E621 {
    fn fetch(&self, count: usize, tags: &[String], config: &SourceConfig) -> Result<FetchResult> {
        if count == 0 {
            return Ok(FetchResult::default());
        }
        let api_key = config.require_str("api_key")?;
        let auth = config.get_str("login").map(|login| (login, api_key));

        let tags = randomized_tags(tags);
        let url = query_url(&self.api_url, count, &tags)?;
        let posts = self.convert(self.client.get_listing(&url, auth)?);

        for post in &posts {
            info!(
                id = post.id,
                uploader = %post.author,
                rating = %post.rating,
                resolution = %post.resolution(),
                url = %post.file_url,
                "e621 post"
            );
        }
        self.client.download_posts(posts)
    }
}

pub fn register(registry: &mut SourceRegistry, client: Arc<BoardClient>) {
    registry.register(NAME, Box::new(E621::new(client)));
}
