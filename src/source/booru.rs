//! HTTP plumbing shared by the booru-style boards.
//!
//! One [`BoardClient`] is built at startup and shared by every source: it
//! owns the blocking `reqwest` client (fixed user agent, finite timeout) and
//! a small download pool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rayon::prelude::*;
use reqwest::blocking::{Client, ClientBuilder, RequestBuilder};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{FetchResult, Post};
use crate::error::{Result, WallError};

pub const USER_AGENT: &str = concat!("konawall/", env!("CARGO_PKG_VERSION"));

/// Applies to each request as a whole, downloads included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const DOWNLOAD_WORKERS: usize = 4;

pub struct BoardClient {
    http: Client,
    pool: rayon::ThreadPool,
    download_dir: PathBuf,
}

impl BoardClient {
    pub fn with_download_dir(download_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::from_builder(Client::builder(), download_dir.into())
    }

    /// Talks to 127.0.0.1 regardless of proxy variables in the environment.
    #[cfg(test)]
    pub(crate) fn loopback(download_dir: &Path) -> Self {
        Self::from_builder(Client::builder().no_proxy(), download_dir.to_path_buf()).unwrap()
    }

    fn from_builder(builder: ClientBuilder, download_dir: PathBuf) -> Result<Self> {
        let http = builder
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(DOWNLOAD_WORKERS)
            .thread_name(|i| format!("download-{i}"))
            .build()
            .map_err(|e| WallError::Io(std::io::Error::other(e)))?;
        Ok(Self {
            http,
            pool,
            download_dir,
        })
    }

    /// GET an API listing; `auth` is `(login, api_key)` for HTTP basic auth.
    pub fn get_listing<T: DeserializeOwned>(
        &self,
        url: &str,
        auth: Option<(&str, &str)>,
    ) -> Result<Vec<T>> {
        debug!(url, "requesting posts");
        let mut request = self.http.get(url);
        if let Some((login, key)) = auth {
            request = request.basic_auth(login, Some(key));
        }
        let body = send(request, url)?;
        parse_listing(&body)
    }

    /// Download every post's image, keeping post order.
    ///
    /// Either all downloads succeed or none of the files are kept.
    pub fn download_posts(&self, posts: Vec<Post>) -> Result<FetchResult> {
        let results: Vec<Result<PathBuf>> = self.pool.install(|| {
            posts
                .par_iter()
                .map(|post| self.download(&post.file_url))
                .collect()
        });

        let mut files = Vec::with_capacity(results.len());
        let mut failure = None;
        for result in results {
            match result {
                Ok(path) => files.push(path),
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        if let Some(err) = failure {
            for path in &files {
                if let Err(err) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), "could not remove partial download: {err}");
                }
            }
            return Err(err);
        }

        for (i, file) in files.iter().enumerate() {
            info!("Image {}: {}", i + 1, file.display());
        }
        Ok(FetchResult { files, posts })
    }

    fn download(&self, url: &str) -> Result<PathBuf> {
        debug!(url, "downloading");
        let body = send(self.http.get(url), url)?;
        let mut file = tempfile::Builder::new()
            .prefix("konawall-")
            .suffix(&extension_of(url))
            .tempfile_in(&self.download_dir)?;
        file.write_all(&body)?;
        let (_, path) = file.keep().map_err(|e| WallError::Io(e.error))?;
        Ok(path)
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

fn send(request: RequestBuilder, url: &str) -> Result<Vec<u8>> {
    let response = request.send()?;
    let status = response.status();
    debug!(url, status = status.as_u16(), "response");
    if !status.is_success() {
        return Err(WallError::RequestFailed {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response.bytes()?.to_vec())
}

/// `<base>?limit=<count>&tags=<tag+tag+…>`, form-encoded.
pub fn query_url(base: &str, count: usize, tags: &[String]) -> Result<String> {
    let mut url = Url::parse(base)
        .map_err(|err| WallError::Configuration(format!("bad board URL `{base}`: {err}")))?;
    url.query_pairs_mut()
        .append_pair("limit", &count.to_string())
        .append_pair("tags", &tags.join(" "));
    Ok(url.into())
}

/// A board answers with either a bare array or `{"posts": [...]}`.
pub fn parse_listing<T: DeserializeOwned>(body: &[u8]) -> Result<Vec<T>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Listing<T> {
        Bare(Vec<T>),
        Wrapped { posts: Vec<T> },
    }

    match serde_json::from_slice(body) {
        Ok(Listing::Bare(posts) | Listing::Wrapped { posts }) => Ok(posts),
        Err(err) => Err(WallError::Transport(format!("unexpected response body: {err}"))),
    }
}

/// `.jpg` for `https://…/file.jpg?x=1`, empty when there is none.
fn extension_of(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    let plausible = |ext: &str| {
        !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
    };
    match last.rsplit_once('.') {
        Some((_, ext)) if plausible(ext) => format!(".{}", ext.to_ascii_lowercase()),
        _ => String::new(),
    }
}
