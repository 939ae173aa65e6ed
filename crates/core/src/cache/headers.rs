//! Ordered response header bag and the transport-header stripping policy.

use serde::{Deserialize, Serialize};

/// Headers removed from origin responses before they are forwarded or stored.
///
/// The edge rewrites the body and the listener re-frames it, so length and
/// connection-level framing from the origin no longer apply.
pub const TRANSPORT_HEADERS: &[&str] = &["keep-alive", "content-length", "transfer-encoding", "connection"];

/// Ordered multimap of response headers.
///
/// Names are stored lowercased; repeated names keep one entry per value in
/// arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderBag(Vec<(String, String)>);

impl HeaderBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header value, keeping any existing values for the name.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.0.push((name.to_ascii_lowercase(), value.into()));
    }

    /// First value for `name`, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name` in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.0
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Remove every value for `name`, returning how many were dropped.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.0.len();
        self.0.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before - self.0.len()
    }

    /// Drop every header listed in [`TRANSPORT_HEADERS`].
    pub fn strip_transport(&mut self) {
        for name in TRANSPORT_HEADERS {
            self.remove(name);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N: AsRef<str>, V: Into<String>> FromIterator<(N, V)> for HeaderBag {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut bag = Self::new();
        for (name, value) in iter {
            bag.append(name.as_ref(), value);
        }
        bag
    }
}
