//! HTTP fetch pipeline for origin documents and include fragments.
//!
//! ### URL Construction
//! - Origin requests keep the backend's path prefix and the request query
//! - Include `src` values resolve against the backend that served the parent
//! - Lowercase host, remove fragments, only `http`/`https`
//!
//! ### Bodies
//! - Bodies are never buffered: they are handed to the edge as byte streams
//! - Compressed origin bodies are decoded (gzip, brotli, deflate)
//! - The timeout bounds connecting and each read, never the whole body, so a
//!   slow client can hold a stream open as long as data keeps moving
//!
//! ### Redirects
//! - Origin redirects are returned to the client untouched
//! - Include redirects are followed, max 5 (configurable)

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::redirect::Policy;
use reqwest::{Client, Response, header};

use edgeside_core::cache::HeaderBag;
use edgeside_core::{AppConfig, Backend, ByteStream, Error, FragmentClient, OriginClient, OriginResponse};

pub use self::url::{UrlError, canonicalize, origin_url, resolve_src};

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "edgeside/0.1")
    pub user_agent: String,

    /// Connect timeout and per-read idle timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects followed by include fetches (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "edgeside/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Self::default() }
    }
}

/// HTTP client serving both origin and include requests.
pub struct FetchClient {
    origin: Client,
    include: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let origin = build_http(&config, Policy::none())?;
        let include = build_http(&config, Policy::limited(config.max_redirects))?;
        Ok(Self { origin, include, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

fn build_http(config: &FetchConfig, redirects: Policy) -> Result<Client, Error> {
    Client::builder()
        .user_agent(&config.user_agent)
        .connect_timeout(config.timeout)
        .read_timeout(config.timeout)
        .redirect(redirects)
        .use_rustls_tls()
        .gzip(true)
        .brotli(true)
        .deflate(true)
        .build()
        .map_err(|e| Error::OriginFetchFailed(format!("failed to build HTTP client: {e}")))
}

async fn get(http: &Client, url: &::url::Url) -> Result<Response, reqwest::Error> {
    http.get(url.as_str()).header(header::ACCEPT, ACCEPT).send().await
}

#[async_trait]
impl OriginClient for FetchClient {
    async fn fetch(&self, backend: &Backend, path_and_query: &str) -> Result<OriginResponse, Error> {
        let start = Instant::now();
        let url = origin_url(backend.base(), path_and_query).map_err(|e| Error::InvalidUrl(e.to_string()))?;

        let response = get(&self.origin, &url)
            .await
            .map_err(|e| Error::OriginFetchFailed(format!("{url}: network error: {e}")))?;

        let status = response.status().as_u16();
        let headers = header_bag(response.headers());

        tracing::debug!(
            url = %url,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "origin responded"
        );

        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| Error::OriginFetchFailed(format!("{url}: failed to read body: {e}"))))
            .boxed();

        Ok(OriginResponse { status, headers, body })
    }
}

#[async_trait]
impl FragmentClient for FetchClient {
    async fn fetch_fragment(&self, backend: &Backend, src: &str) -> Result<ByteStream, Error> {
        let failed = |reason: String| Error::SubFetchFailed { src: src.to_string(), reason };

        let url = resolve_src(backend.base(), src).map_err(|e| failed(e.to_string()))?;
        let response = get(&self.include, &url).await.map_err(|e| failed(format!("network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("status {}", status.as_u16())));
        }

        tracing::debug!(url = %url, "include responded");

        let src = src.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| Error::SubFetchFailed { src: src.clone(), reason: format!("failed to read body: {e}") })
            })
            .boxed();

        Ok(body)
    }
}

/// Copy response headers, skipping values that are not valid UTF-8.
fn header_bag(headers: &header::HeaderMap) -> HeaderBag {
    headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)))
        .collect()
}
