//! Cache decision layer.
//!
//! [`Edge::handle`] answers one request: replay a stored entry, answer the
//! fixed no-route 404, or fetch from the origin and hand the body to a splice
//! task that expands `<esi:include>` markers while streaming to the client.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::mpsc;

use crate::Error;
use crate::cache::ttl::NOT_FOUND_MAX_AGE_SECS;
use crate::cache::{CacheEntry, CacheKey, CacheStore, HeaderBag, ttl_from_headers};
use crate::config::AppConfig;
use crate::esi::Transducer;
use crate::route::{Backend, RouteResolver};

mod splice;

use splice::{Admission, Splice};

/// Lazily produced response body.
pub type ByteStream = BoxStream<'static, Result<Bytes, Error>>;

/// Status, headers and unread body of an origin response.
pub struct OriginResponse {
    pub status: u16,
    pub headers: HeaderBag,
    pub body: ByteStream,
}

/// Fetches documents from a route's backend.
#[async_trait]
pub trait OriginClient: Send + Sync {
    /// Issue `GET` for `path_and_query` against `backend`.
    ///
    /// Network failures are errors; any HTTP status is returned as-is.
    async fn fetch(&self, backend: &Backend, path_and_query: &str) -> Result<OriginResponse, Error>;
}

/// Fetches the body of an `<esi:include>` target.
#[async_trait]
pub trait FragmentClient: Send + Sync {
    /// Resolve `src` against `backend` and return the fragment body.
    ///
    /// Anything other than a successful response is an error.
    async fn fetch_fragment(&self, backend: &Backend, src: &str) -> Result<ByteStream, Error>;
}

/// Where a response came from, reported in the `x-cache` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

/// Response handed to the listener.
pub struct EdgeResponse {
    pub status: u16,
    pub headers: HeaderBag,
    pub body: ByteStream,
    pub cache: CacheStatus,
}

impl std::fmt::Debug for EdgeResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Streaming knobs.
#[derive(Debug, Clone, Copy)]
pub struct EdgeOptions {
    /// Longest marker carried across chunk boundaries.
    pub max_marker_bytes: usize,
    /// Chunks buffered between the splice task and the client.
    pub stream_buffer: usize,
    /// Largest body recorded for the cache.
    pub max_entry_bytes: usize,
}

impl Default for EdgeOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for EdgeOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_marker_bytes: config.max_marker_bytes,
            stream_buffer: config.stream_buffer,
            max_entry_bytes: config.max_entry_bytes,
        }
    }
}

/// The edge proxy: cache in front of ESI-expanding origin fetches.
#[derive(Clone)]
pub struct Edge {
    store: Arc<dyn CacheStore>,
    routes: Arc<dyn RouteResolver>,
    origin: Arc<dyn OriginClient>,
    fragments: Arc<dyn FragmentClient>,
    options: EdgeOptions,
}

impl Edge {
    pub fn new(
        store: Arc<dyn CacheStore>, routes: Arc<dyn RouteResolver>, origin: Arc<dyn OriginClient>,
        fragments: Arc<dyn FragmentClient>, options: EdgeOptions,
    ) -> Self {
        Self { store, routes, origin, fragments, options }
    }

    /// Answer `method` on `path_and_query`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OriginFetchFailed`] when the origin is unreachable or
    /// answers with a 5xx status. Failures after streaming has begun are
    /// reported through the body stream instead.
    pub async fn handle(&self, method: &str, path_and_query: &str) -> Result<EdgeResponse, Error> {
        let key = CacheKey::new(method, path_and_query);

        if let Some(entry) = self.lookup(&key).await {
            let age_ms = (Utc::now() - entry.stored_at).num_milliseconds();
            tracing::info!(key = %key, age_ms, "cache hit");
            return Ok(replay(entry));
        }

        let path = path_and_query.split_once('?').map_or(path_and_query, |(path, _)| path);
        let Some(backend) = self.routes.resolve(path).cloned() else {
            tracing::info!(path, "no route matches");
            return Ok(not_found(path));
        };

        tracing::info!(key = %key, backend = %backend, "cache miss");

        let origin = self.origin.fetch(&backend, path_and_query).await.inspect_err(|e| {
            tracing::error!(backend = %backend, path = path_and_query, error = %e, "origin fetch failed");
        })?;

        if origin.status >= 500 {
            tracing::error!(backend = %backend, path = path_and_query, status = origin.status, "origin answered with server error");
            return Err(Error::OriginFetchFailed(format!("{backend} answered {}", origin.status)));
        }

        let mut headers = origin.headers;
        headers.strip_transport();
        let ttl = ttl_from_headers(&headers);

        let admission = (!ttl.is_zero()).then(|| Admission {
            store: Arc::clone(&self.store),
            key,
            status: origin.status,
            headers: headers.clone(),
            ttl,
            max_bytes: self.options.max_entry_bytes,
        });

        let (tx, rx) = mpsc::channel(self.options.stream_buffer.max(1));
        let splice = Splice::new(
            tx,
            Arc::clone(&self.fragments),
            backend,
            Transducer::new(self.options.max_marker_bytes),
            admission,
        );
        tokio::spawn(splice.run(origin.body));

        Ok(EdgeResponse { status: origin.status, headers, body: receiver_stream(rx), cache: CacheStatus::Miss })
    }

    /// Decoded entry for `key`; a corrupt entry is deleted and reported as absent.
    async fn lookup(&self, key: &CacheKey) -> Option<CacheEntry> {
        let raw = self.store.get(key.as_str()).await?;
        match CacheEntry::decode(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding corrupt cache entry");
                self.store.delete(key.as_str()).await;
                None
            }
        }
    }
}

fn replay(entry: CacheEntry) -> EdgeResponse {
    let body = stream::iter(entry.body.into_iter().map(Ok)).boxed();
    EdgeResponse { status: entry.status, headers: entry.headers, body, cache: CacheStatus::Hit }
}

fn not_found(path: &str) -> EdgeResponse {
    let mut headers = HeaderBag::new();
    headers.append("content-type", "text/html");
    headers.append("cache-control", format!("max-age={NOT_FOUND_MAX_AGE_SECS}"));
    let body = Bytes::from(format!("Sorry, no match for {path}"));
    EdgeResponse { status: 404, headers, body: stream::once(async move { Ok(body) }).boxed(), cache: CacheStatus::Bypass }
}

fn receiver_stream(rx: mpsc::Receiver<Result<Bytes, Error>>) -> ByteStream {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}
