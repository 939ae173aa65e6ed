//! Per-response splice task.
//!
//! Pulls the origin body through the [`Transducer`], fetches each include and
//! sends the resulting bytes, in document order, into a bounded channel read by
//! the client. A full channel suspends the task, so it never reads further
//! ahead of the client than the channel depth.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use super::{ByteStream, FragmentClient};
use crate::Error;
use crate::cache::{CacheEntry, CacheKey, CacheStore, HeaderBag};
use crate::esi::{Include, Segment, Transducer};
use crate::route::Backend;

/// Everything needed to store the response once it has streamed in full.
pub(crate) struct Admission {
    pub store: Arc<dyn CacheStore>,
    pub key: CacheKey,
    pub status: u16,
    pub headers: HeaderBag,
    pub ttl: Duration,
    /// Recording stops, and the response is not stored, past this many body bytes.
    pub max_bytes: usize,
}

/// Why streaming stopped early.
enum Halt {
    /// The client went away.
    Disconnected,
    /// The origin body failed mid-stream.
    Origin(Error),
}

pub(crate) struct Splice {
    tx: mpsc::Sender<Result<Bytes, Error>>,
    fragments: Arc<dyn FragmentClient>,
    backend: Backend,
    transducer: Transducer,
    admission: Option<Admission>,
    recorded: Vec<Bytes>,
    recorded_bytes: usize,
    failed_includes: usize,
}

impl Splice {
    pub(crate) fn new(
        tx: mpsc::Sender<Result<Bytes, Error>>, fragments: Arc<dyn FragmentClient>, backend: Backend,
        transducer: Transducer, admission: Option<Admission>,
    ) -> Self {
        Self {
            tx,
            fragments,
            backend,
            transducer,
            admission,
            recorded: Vec::new(),
            recorded_bytes: 0,
            failed_includes: 0,
        }
    }

    /// Drive `body` to completion, then store the response if it is admissible.
    ///
    /// The client's body ends when this returns and the sender is dropped, so a
    /// stored entry is always visible to requests made after the body ended.
    pub(crate) async fn run(mut self, mut body: ByteStream) {
        match self.pump(&mut body).await {
            Ok(()) => self.commit().await,
            Err(Halt::Disconnected) => {
                tracing::debug!(backend = %self.backend, "client disconnected, abandoning response");
            }
            Err(Halt::Origin(e)) => {
                tracing::error!(backend = %self.backend, error = %e, "origin body failed mid-stream");
                let _ = self.tx.send(Err(e)).await;
            }
        }
    }

    async fn pump(&mut self, body: &mut ByteStream) -> Result<(), Halt> {
        while let Some(chunk) = self.until_closed(body.next()).await? {
            let chunk = chunk.map_err(Halt::Origin)?;
            for segment in self.transducer.push(chunk) {
                self.segment(segment).await?;
            }
        }
        if let Some(segment) = self.transducer.finish() {
            self.segment(segment).await?;
        }
        Ok(())
    }

    async fn segment(&mut self, segment: Segment) -> Result<(), Halt> {
        match segment {
            Segment::Literal(bytes) => self.emit(bytes).await,
            Segment::Include(include) => self.splice(include).await,
            Segment::Malformed { text, reason } => {
                tracing::warn!(
                    backend = %self.backend,
                    reason = %reason,
                    text = %String::from_utf8_lossy(&text),
                    "malformed include passed through"
                );
                self.emit(text).await
            }
        }
    }

    /// Emit the marker comment followed by the fragment body, or the failure comment.
    async fn splice(&mut self, include: Include) -> Result<(), Halt> {
        self.emit(include.marker_comment()).await?;

        let fragments = Arc::clone(&self.fragments);
        let fetched = self.until_closed(fragments.fetch_fragment(&self.backend, &include.src)).await?;
        let mut fragment = match fetched {
            Ok(fragment) => fragment,
            Err(e) => return self.include_failed(&include, e).await,
        };

        // A fragment that fails part-way keeps what was already sent.
        while let Some(chunk) = self.until_closed(fragment.next()).await? {
            match chunk {
                Ok(bytes) => self.emit(bytes).await?,
                Err(e) => return self.include_failed(&include, e).await,
            }
        }
        Ok(())
    }

    async fn include_failed(&mut self, include: &Include, error: Error) -> Result<(), Halt> {
        tracing::warn!(backend = %self.backend, src = %include.src, error = %error, "include fetch failed");
        self.failed_includes += 1;
        self.emit(include.failure_comment()).await
    }

    async fn emit(&mut self, bytes: Bytes) -> Result<(), Halt> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.record(&bytes);
        self.tx.send(Ok(bytes)).await.map_err(|_| Halt::Disconnected)
    }

    /// Keep a copy of `bytes` for the cache, giving up on admission once the body is too large.
    fn record(&mut self, bytes: &Bytes) {
        let Some(admission) = &self.admission else {
            return;
        };
        self.recorded_bytes += bytes.len();
        if self.recorded_bytes > admission.max_bytes {
            tracing::info!(
                key = %admission.key,
                limit = admission.max_bytes,
                "response exceeds the cache entry limit, not caching"
            );
            self.admission = None;
            self.recorded = Vec::new();
            return;
        }
        self.recorded.push(bytes.clone());
    }

    /// Await `fut` unless the client disconnects first.
    async fn until_closed<F: Future>(&self, fut: F) -> Result<F::Output, Halt> {
        tokio::select! {
            biased;
            _ = self.tx.closed() => Err(Halt::Disconnected),
            output = fut => Ok(output),
        }
    }

    async fn commit(&mut self) {
        let Some(admission) = self.admission.take() else {
            return;
        };
        if self.failed_includes > 0 {
            tracing::info!(key = %admission.key, failed = self.failed_includes, "not caching response with failed includes");
            return;
        }

        let entry = CacheEntry::new(admission.status, admission.headers, std::mem::take(&mut self.recorded));
        match entry.encode() {
            Ok(raw) => {
                admission.store.set(admission.key.as_str(), raw, admission.ttl).await;
                tracing::info!(
                    key = %admission.key,
                    ttl_ms = admission.ttl.as_millis() as u64,
                    bytes = entry.body_len(),
                    "stored response"
                );
            }
            Err(e) => tracing::warn!(key = %admission.key, error = %e, "failed to encode cache entry"),
        }
    }
}
