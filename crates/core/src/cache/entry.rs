//! Cached responses and their stored encoding.
//!
//! The store only holds bytes. Entries are written as a JSON record with
//! hex-encoded body chunks; a record that does not decode, or lacks one of
//! the required fields, is reported as [`Error::CacheCorrupt`] so the caller
//! can treat it as a miss.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::headers::HeaderBag;
use crate::Error;

/// A complete response as replayed on a cache hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: HeaderBag,
    pub body: Vec<Bytes>,
    pub stored_at: DateTime<Utc>,
}

/// Wire form of [`CacheEntry`]. Every field is optional so that missing
/// fields surface as corruption rather than a serde error deep in a stack.
#[derive(Serialize, Deserialize)]
struct StoredRecord {
    status: Option<u16>,
    headers: Option<HeaderBag>,
    body: Option<Vec<String>>,
    stored_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn new(status: u16, headers: HeaderBag, body: Vec<Bytes>) -> Self {
        Self { status, headers, body, stored_at: Utc::now() }
    }

    /// Total body length in bytes.
    pub fn body_len(&self) -> usize {
        self.body.iter().map(Bytes::len).sum()
    }

    pub fn encode(&self) -> Result<Bytes, Error> {
        let record = StoredRecord {
            status: Some(self.status),
            headers: Some(self.headers.clone()),
            body: Some(self.body.iter().map(hex::encode).collect()),
            stored_at: Some(self.stored_at),
        };
        serde_json::to_vec(&record)
            .map(Bytes::from)
            .map_err(|e| Error::CacheCorrupt(format!("failed to encode entry: {e}")))
    }

    pub fn decode(raw: &[u8]) -> Result<Self, Error> {
        let record: StoredRecord =
            serde_json::from_slice(raw).map_err(|e| Error::CacheCorrupt(format!("unreadable record: {e}")))?;

        let status = record.status.ok_or_else(|| Error::CacheCorrupt("missing status".into()))?;
        let headers = record.headers.ok_or_else(|| Error::CacheCorrupt("missing headers".into()))?;
        let chunks = record.body.ok_or_else(|| Error::CacheCorrupt("missing body".into()))?;

        let body = chunks
            .iter()
            .map(|chunk| hex::decode(chunk).map(Bytes::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::CacheCorrupt(format!("bad body chunk: {e}")))?;

        Ok(Self { status, headers, body, stored_at: record.stored_at.unwrap_or_else(Utc::now) })
    }
}
