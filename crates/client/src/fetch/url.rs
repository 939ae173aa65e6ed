//! URL construction for origin and include requests.

use url::Url;

/// Error type for URL construction failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Canonicalize an absolute URL.
///
/// Normalization steps:
/// 1. Reject anything but `http`/`https`
/// 2. Lowercase the host
/// 3. Remove fragment (#...)
/// 4. Keep query string intact (do not reorder)
pub fn canonicalize(mut url: Url) -> Result<Url, UrlError> {
    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = url.host_str() {
        let host = host.to_lowercase();
        url.set_host(Some(&host)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    url.set_fragment(None);

    Ok(url)
}

/// URL of `path_and_query` on the backend at `base`.
///
/// A path prefix on the base is kept: `https://cdn.example.com/app` with
/// `/foo?x=1` gives `https://cdn.example.com/app/foo?x=1`.
pub fn origin_url(base: &Url, path_and_query: &str) -> Result<Url, UrlError> {
    if !path_and_query.starts_with('/') {
        return Err(UrlError::InvalidUrl(format!("request path must start with '/': {path_and_query}")));
    }

    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query, None),
    };

    let mut url = base.clone();
    let prefix = base.path().trim_end_matches('/');
    url.set_path(&format!("{prefix}{path}"));
    url.set_query(query);

    canonicalize(url)
}

/// Resolve an include `src` against the backend that served the parent.
///
/// Absolute `http`/`https` URLs are used as they are, other schemes are
/// rejected. Everything else is a path on the parent's backend.
pub fn resolve_src(base: &Url, src: &str) -> Result<Url, UrlError> {
    let src = src.trim();
    if src.is_empty() {
        return Err(UrlError::Empty);
    }

    match Url::parse(src) {
        Ok(absolute) => canonicalize(absolute),
        Err(url::ParseError::RelativeUrlWithoutBase) if src.starts_with("//") => {
            let joined = base.join(src).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
            canonicalize(joined)
        }
        Err(url::ParseError::RelativeUrlWithoutBase) if src.starts_with('/') => origin_url(base, src),
        Err(url::ParseError::RelativeUrlWithoutBase) => origin_url(base, &format!("/{src}")),
        Err(e) => Err(UrlError::InvalidUrl(e.to_string())),
    }
}
