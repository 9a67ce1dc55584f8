//! Fetch interception
//!
//! Every request not claimed by another route is treated as a fetch from
//! a controlled page and handed to the agent. Requests the agent declines
//! are forwarded upstream uncached, except those for other origins, which
//! are refused.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderName, HeaderValue, header},
    response::Response,
};
use shellcache_core::Intercept;
use shellcache_proxy::{Destination, FetchRequest, RequestMode};
use shellcache_storage::CachedResponse;
use tracing::debug;
use url::Url;

use super::MAX_BODY_BYTES;
use crate::error::ApiError;
use crate::state::AppState;

/// Header naming where a response came from
pub const SOURCE_HEADER: &str = "x-shellcache-source";

const SEC_FETCH_MODE: &str = "sec-fetch-mode";
const SEC_FETCH_DEST: &str = "sec-fetch-dest";

/// Fallback handler for all unrouted requests
pub async fn intercept(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, ApiError> {
    let request = fetch_request(&state.origin, request).await?;

    // Never act as a forward proxy for other origins
    if request.url.origin() != state.origin.origin() {
        metrics::counter!("shellcache_rejected_total", "reason" => "cross-origin").increment(1);
        return Err(ApiError::Misdirected(format!(
            "{} is not served by this origin",
            request.url
        )));
    }

    match state.agent.handle_fetch(&request).await? {
        Intercept::Respond(served) => {
            let source = served.source.as_str();
            metrics::counter!("shellcache_responses_total", "source" => source).increment(1);
            // Background revalidation keeps running after the handle is dropped
            drop(served.revalidation);
            Ok(into_response(served.response, source))
        }
        Intercept::Passthrough(reason) => {
            metrics::counter!("shellcache_passthrough_total", "reason" => reason.as_str())
                .increment(1);
            debug!(
                "Passing {} {} through ({})",
                request.method,
                request.url,
                reason.as_str()
            );
            let response = state.fetcher.fetch(&request).await?;
            Ok(into_response(response, "passthrough"))
        }
    }
}

/// Translate an incoming HTTP request into the agent's request model
async fn fetch_request(origin: &Url, request: Request) -> Result<FetchRequest, ApiError> {
    let (parts, body) = request.into_parts();

    let url = if parts.uri.scheme().is_some() {
        Url::parse(&parts.uri.to_string())
    } else {
        let path = parts
            .uri
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or("/");
        origin.join(path)
    }
    .map_err(|e| ApiError::BadRequest(format!("Invalid request target {}: {}", parts.uri, e)))?;

    let mode = header_str(&parts.headers, SEC_FETCH_MODE)
        .and_then(|v| v.parse::<RequestMode>().ok())
        .unwrap_or_default();
    let destination = header_str(&parts.headers, SEC_FETCH_DEST)
        .and_then(|v| v.parse::<Destination>().ok())
        .unwrap_or_default();

    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {}", e)))?;

    let mut request = FetchRequest::get(url)
        .with_method(parts.method)
        .with_mode(mode)
        .with_destination(destination)
        .with_body(body);
    request.headers = parts.headers;

    Ok(request)
}

fn header_str<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn into_response(cached: CachedResponse, source: &'static str) -> Response {
    let mut response = Response::new(Body::from(cached.body));
    *response.status_mut() = cached.status;
    *response.headers_mut() = cached.headers;

    // Length is recomputed from the body
    response.headers_mut().remove(header::CONTENT_LENGTH);
    response.headers_mut().insert(
        HeaderName::from_static(SOURCE_HEADER),
        HeaderValue::from_static(source),
    );

    response
}
