//! HTTP listener routes.
//!
//! Every `GET` is handed to the [`Edge`]; its response is turned into an axum
//! response with a streaming body and an `x-cache` header. `HEAD` is served
//! from the same cache entry as `GET`, with the body left off.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use edgeside_core::{Edge, EdgeResponse};

use crate::error::ServerError;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// Router proxying every path through `edge`.
pub fn router(edge: Edge) -> Router {
    Router::new()
        .route("/", get(proxy))
        .route("/*path", get(proxy))
        .with_state(edge)
}

async fn proxy(State(edge): State<Edge>, method: Method, uri: Uri) -> Result<Response, ServerError> {
    let path_and_query = uri.path_and_query().map_or("/", |pq| pq.as_str());
    // axum drops the body of HEAD responses itself.
    let method = if method == Method::HEAD { Method::GET } else { method };
    let response = edge.handle(method.as_str(), path_and_query).await?;
    into_response(response)
}

fn into_response(response: EdgeResponse) -> Result<Response, ServerError> {
    let status = StatusCode::from_u16(response.status).map_err(|_| ServerError::InvalidStatus(response.status))?;

    let mut headers = HeaderMap::with_capacity(response.headers.len() + 1);
    for (name, value) in response.headers.iter() {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => tracing::debug!(name, "dropping header that cannot be forwarded"),
        }
    }
    headers.insert(X_CACHE, HeaderValue::from_static(response.cache.as_str()));

    Ok((status, headers, Body::from_stream(response.body)).into_response())
}
