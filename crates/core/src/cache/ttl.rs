//! Cache admission policy derived from `Cache-Control`.
//!
//! Only `max-age=<seconds>` is honoured. A missing or non-numeric `max-age`
//! yields a zero TTL, which means "do not cache".

use std::time::Duration;

use super::headers::HeaderBag;

/// TTL advertised on the fixed no-route response.
pub const NOT_FOUND_MAX_AGE_SECS: u64 = 5;

/// Longest TTL honoured; larger `max-age` values are clamped (RFC 9111 §1.2.2).
pub const MAX_TTL_SECS: u64 = 1 << 31;

/// Parse the `max-age` directive out of one `Cache-Control` value.
pub fn max_age(cache_control: &str) -> Option<u64> {
    max_age_directive(cache_control).flatten()
}

/// First `max-age` directive in the value; `Some(None)` when present but not a number.
fn max_age_directive(cache_control: &str) -> Option<Option<u64>> {
    cache_control.split(',').find_map(|directive| {
        let (name, value) = directive.split_once('=')?;
        name.trim().eq_ignore_ascii_case("max-age").then(|| value.trim().parse().ok())
    })
}

/// TTL for a response carrying `headers`.
///
/// The first `max-age` directive across all `Cache-Control` values wins,
/// clamped to [`MAX_TTL_SECS`].
pub fn ttl_from_headers(headers: &HeaderBag) -> Duration {
    let seconds = headers
        .get_all("cache-control")
        .find_map(max_age_directive)
        .flatten()
        .unwrap_or(0);
    Duration::from_secs(seconds.min(MAX_TTL_SECS))
}
