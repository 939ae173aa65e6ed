//! Edge-Side-Include processing.
//!
//! - [`scanner`] locates `<esi:include .../>` markers and extracts `src`
//! - [`transducer`] applies the scanner across chunk boundaries
//!
//! Both are synchronous and do no I/O; fetching and splicing happen in
//! [`crate::edge`].

pub mod scanner;
pub mod transducer;

pub use scanner::{EsiMatch, Scan, extract_src, scan};
pub use transducer::{Include, MalformedReason, Segment, Transducer};
