//! Request/response tracing for the API client
//!
//! Every outbound request, inbound response and transport failure is
//! emitted under the `sduchat::net` target. Logging is best-effort and
//! never influences control flow; enable it with
//! `RUST_LOG=sduchat::net=debug`.

use reqwest::header::{HeaderMap, AUTHORIZATION};

const TARGET: &str = "sduchat::net";

/// Formats headers for logging with credentials masked.
pub fn redact_headers(headers: &HeaderMap) -> String {
    let mut parts: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            let shown = if name == AUTHORIZATION {
                match value.to_str() {
                    Ok(v) if v.starts_with("Bearer ") => "Bearer ***".to_string(),
                    _ => "***".to_string(),
                }
            } else {
                value.to_str().unwrap_or("<non-ascii>").to_string()
            };
            format!("{}: {}", name, shown)
        })
        .collect();
    parts.sort();
    parts.join(", ")
}

/// Logs an outbound request.
pub fn request(method: &reqwest::Method, url: &url::Url, headers: &HeaderMap, body: Option<&[u8]>) {
    let body = body
        .filter(|b| !b.is_empty())
        .map(|b| String::from_utf8_lossy(b).into_owned());
    tracing::debug!(
        target: TARGET,
        %method,
        %url,
        headers = %redact_headers(headers),
        body = body.as_deref().unwrap_or("<empty>"),
        "request"
    );
}

/// Logs an inbound response.
pub fn response(status: reqwest::StatusCode, url: &url::Url, body: &[u8]) {
    let body = if body.is_empty() {
        "<empty>".into()
    } else {
        String::from_utf8_lossy(body)
    };
    tracing::debug!(
        target: TARGET,
        status = status.as_u16(),
        %url,
        body = %body,
        "response"
    );
}

/// Logs a failed exchange.
pub fn error(url: &url::Url, err: &anyhow::Error) {
    tracing::warn!(target: TARGET, %url, error = %err, "request failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderValue, CONTENT_TYPE};

    #[test]
    fn test_redact_headers_masks_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer secret-token"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let rendered = redact_headers(&headers);
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("authorization: Bearer ***"));
        assert!(rendered.contains("content-type: application/json"));
    }

    #[test]
    fn test_redact_headers_masks_non_bearer_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(redact_headers(&headers), "authorization: ***");
    }

    #[test]
    fn test_redact_headers_empty() {
        assert_eq!(redact_headers(&HeaderMap::new()), "");
    }
}
