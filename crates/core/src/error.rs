//! Unified error types for edgeside.
//!
//! Each variant renders as `CODE: detail` and maps onto the HTTP status the
//! edge answers with when the failure reaches the client.

/// Unified error types for the edge proxy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Origin backend unreachable, or it answered with a server error.
    #[error("ORIGIN_FETCH_FAILED: {0}")]
    OriginFetchFailed(String),

    /// An `<esi:include>` sub-request failed.
    #[error("SUB_FETCH_FAILED: {src}: {reason}")]
    SubFetchFailed { src: String, reason: String },

    /// A stored cache record could not be decoded.
    #[error("CACHE_CORRUPT: {0}")]
    CacheCorrupt(String),

    /// A URL could not be parsed or uses an unsupported scheme.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),
}

impl Error {
    /// HTTP status code for this error when it is the final answer to a request.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::OriginFetchFailed(_) | Error::SubFetchFailed { .. } => 502,
            Error::InvalidUrl(_) => 400,
            Error::CacheCorrupt(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::OriginFetchFailed("connection refused".to_string());
        assert!(err.to_string().contains("ORIGIN_FETCH_FAILED"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_sub_fetch_display_names_src() {
        let err = Error::SubFetchFailed { src: "/bar".into(), reason: "status 500".into() };
        assert_eq!(err.to_string(), "SUB_FETCH_FAILED: /bar: status 500");
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(Error::OriginFetchFailed("boom".into()).status_code(), 502);
        assert_eq!(Error::InvalidUrl("::".into()).status_code(), 400);
        assert_eq!(Error::CacheCorrupt("no status".into()).status_code(), 500);
    }
}
