//! Chunk-by-chunk ESI transducer.
//!
//! Turns an arbitrary chunking of a document into an ordered list of
//! [`Segment`]s. Bytes that might still become a marker (a trailing partial
//! opener, or an opener whose closing `>` has not arrived yet) are carried over to
//! the next chunk, up to `max_marker_bytes`.

use bytes::{Bytes, BytesMut};

use super::scanner::{self, EsiMatch, OPENER, Scan};

/// Why a marker was passed through instead of expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MalformedReason {
    #[error("include tag has no usable src attribute")]
    EmptySrc,

    #[error("include tag not closed within the marker bound")]
    Unclosed,

    #[error("document ended inside an include tag")]
    Truncated,
}

/// A complete include directive found in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Include {
    /// Extracted `src` attribute, never empty.
    pub src: String,
    /// The marker exactly as it appeared in the document.
    pub tag: Bytes,
}

impl Include {
    /// Comment left in the output in place of the marker.
    pub fn marker_comment(&self) -> Bytes {
        Bytes::from(format!("<!-- <esi:include src=\"{}\" /> -->", self.src))
    }

    /// Comment spliced in when the include could not be fetched.
    pub fn failure_comment(&self) -> Bytes {
        Bytes::from(format!("<!-- esi-include-failed: {} -->", self.src))
    }
}

/// One piece of transducer output, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Document bytes to emit verbatim.
    Literal(Bytes),
    /// A directive to replace with its comment and the fetched body.
    Include(Include),
    /// Marker-like bytes that are emitted verbatim, with the reason they were not expanded.
    Malformed { text: Bytes, reason: MalformedReason },
}

/// Stateful scanner over a chunked document.
#[derive(Debug)]
pub struct Transducer {
    pending: BytesMut,
    max_marker_bytes: usize,
}

impl Transducer {
    pub fn new(max_marker_bytes: usize) -> Self {
        Self { pending: BytesMut::new(), max_marker_bytes: max_marker_bytes.max(OPENER.len()) }
    }

    /// Bytes currently held back waiting for the next chunk.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feed the next chunk and collect every segment that is now final.
    pub fn push(&mut self, chunk: Bytes) -> Vec<Segment> {
        let buf = if self.pending.is_empty() {
            chunk
        } else {
            self.pending.extend_from_slice(&chunk);
            self.pending.split().freeze()
        };

        let mut segments = Vec::new();
        let mut pos = 0;

        loop {
            match scanner::scan_from(&buf, pos) {
                Scan::Found(m) if m.end - m.start <= self.max_marker_bytes => {
                    push_literal(&mut segments, buf.slice(pos..m.start));
                    let tag = buf.slice(m.start..m.end);
                    match scanner::extract_src(&tag) {
                        Some(src) => segments.push(Segment::Include(Include { src, tag })),
                        None => segments.push(Segment::Malformed { text: tag, reason: MalformedReason::EmptySrc }),
                    }
                    pos = m.end;
                }
                Scan::Found(EsiMatch { start, .. }) => {
                    pos = abandon_opener(&mut segments, &buf, pos, start);
                }
                Scan::Unclosed { start } if buf.len() - start > self.max_marker_bytes => {
                    pos = abandon_opener(&mut segments, &buf, pos, start);
                }
                Scan::Unclosed { start } | Scan::PartialOpener { start } => {
                    push_literal(&mut segments, buf.slice(pos..start));
                    self.pending.extend_from_slice(&buf[start..]);
                    break;
                }
                Scan::Clear => {
                    push_literal(&mut segments, buf.slice(pos..));
                    break;
                }
            }
        }

        segments
    }

    /// Flush whatever is still held back once the document has ended.
    pub fn finish(&mut self) -> Option<Segment> {
        if self.pending.is_empty() {
            return None;
        }
        let text = self.pending.split().freeze();
        if text.starts_with(OPENER) {
            Some(Segment::Malformed { text, reason: MalformedReason::Truncated })
        } else {
            Some(Segment::Literal(text))
        }
    }
}

/// Emit the opener at `start` as malformed and return the offset to resume scanning from.
fn abandon_opener(segments: &mut Vec<Segment>, buf: &Bytes, pos: usize, start: usize) -> usize {
    push_literal(segments, buf.slice(pos..start));
    let opener_end = start + OPENER.len();
    segments.push(Segment::Malformed { text: buf.slice(start..opener_end), reason: MalformedReason::Unclosed });
    opener_end
}

fn push_literal(segments: &mut Vec<Segment>, bytes: Bytes) {
    if !bytes.is_empty() {
        segments.push(Segment::Literal(bytes));
    }
}
