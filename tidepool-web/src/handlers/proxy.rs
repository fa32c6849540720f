//! Media relay handlers.
//!
//! `GET /proxy?url=<absolute URL>` relays the target through the
//! `ProxyFetcher` and always answers with either complete content or one
//! well-formed JSON error body, never a partial stream. Players preflight
//! the endpoint, so `OPTIONS` answers 204 with the CORS allowances.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use tidepool_core::proxy::FetchedMedia;
use tracing::warn;
use url::Url;

use crate::server::AppState;

/// `GET /proxy?url=...` - relay one media URL.
pub async fn proxy_media(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(raw_url) = params.get("url") else {
        return proxy_error(
            StatusCode::BAD_REQUEST,
            "missing_url",
            "Missing url parameter",
            None,
        );
    };

    let target = match Url::parse(raw_url) {
        Ok(url) => url,
        Err(error) => {
            return proxy_error(
                StatusCode::BAD_REQUEST,
                "invalid_url",
                &format!("Invalid url parameter: {error}"),
                Some(raw_url),
            );
        }
    };

    match state.proxy.fetch(&target).await {
        Ok(FetchedMedia::Playlist {
            status,
            content_type,
            text,
        }) => {
            let mut headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(&content_type) {
                headers.insert(header::CONTENT_TYPE, value);
            }
            apply_cors(&mut headers);
            (status, headers, text).into_response()
        }
        Ok(FetchedMedia::Passthrough {
            status,
            mut headers,
            body,
        }) => {
            apply_cors(&mut headers);
            (status, headers, Body::from_stream(body)).into_response()
        }
        Err(error) => {
            warn!(url = %target, %error, "relay fetch failed");
            proxy_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "proxy_failed",
                &error.to_string(),
                Some(raw_url),
            )
        }
    }
}

/// `OPTIONS /proxy` - CORS preflight for players.
pub async fn proxy_preflight() -> Response {
    let mut headers = HeaderMap::new();
    apply_cors(&mut headers);
    (StatusCode::NO_CONTENT, headers).into_response()
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
}

fn proxy_error(status: StatusCode, kind: &str, message: &str, url: Option<&str>) -> Response {
    let mut headers = HeaderMap::new();
    apply_cors(&mut headers);
    (
        status,
        headers,
        Json(json!({ "error": kind, "message": message, "url": url })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_cors_sets_all_three_headers() {
        let mut headers = HeaderMap::new();
        apply_cors(&mut headers);

        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "GET, OPTIONS"
        );
        assert_eq!(
            headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
            "Content-Type, Authorization"
        );
    }

    #[tokio::test]
    async fn test_preflight_is_204_with_cors() {
        let response = proxy_preflight().await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_METHODS)
                .unwrap(),
            "GET, OPTIONS"
        );
    }

    #[test]
    fn test_proxy_error_shape() {
        let response = proxy_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "proxy_failed",
            "boom",
            Some("https://cdn.example.com/x.m3u8"),
        );
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_some());
    }
}
