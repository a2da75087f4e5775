use anyhow::Context;
use axum::{
    body::Bytes,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::Client;
use thiserror::Error;
use upstream_client::UpstreamClient;
use url::Url;

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "host",
    "content-length",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
];

#[derive(Debug, Error)]
pub(crate) enum ProxyError {
    #[error("path '{0}' contains dot segments")]
    DotSegments(String),
    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl ProxyError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            ProxyError::DotSegments(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Passthrough for `/api/*` onto the upstream base, sharing the upstream client's pool.
#[derive(Debug, Clone)]
pub(crate) struct ProxyTarget {
    http: Client,
    base: Url,
}

impl ProxyTarget {
    pub(crate) fn new(upstream: &UpstreamClient) -> Self {
        Self {
            http: upstream.http().clone(),
            base: upstream.base_url().clone(),
        }
    }

    /// `rest` is the already-encoded path after the mount prefix. Dot segments are
    /// refused so the result always stays under the base path.
    pub(crate) fn target_url(&self, rest: &str, query: Option<&str>) -> Result<Url, ProxyError> {
        if rest.split('/').any(is_dot_segment) {
            return Err(ProxyError::DotSegments(rest.to_string()));
        }
        let mut url = self.base.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        let rest = rest.trim_start_matches('/');
        url.set_path(&format!("{base_path}/{rest}"));
        url.set_query(query);
        Ok(url)
    }

    pub(crate) async fn forward(
        &self,
        method: Method,
        rest: &str,
        query: Option<&str>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, ProxyError> {
        let url = self.target_url(rest, query)?;
        let upstream = self
            .http
            .request(method, url.clone())
            .headers(strip_hop_by_hop(headers))
            .body(body)
            .send()
            .await
            .with_context(|| format!("proxy request to {url} failed"))?;

        let status = upstream.status();
        let headers = strip_hop_by_hop(upstream.headers().clone());
        let body = upstream
            .bytes()
            .await
            .with_context(|| format!("failed to read proxied body from {url}"))?;

        let mut response = (status, body).into_response();
        response.headers_mut().extend(headers);
        Ok(response)
    }
}

/// `.` and `..`, including their percent-encoded spellings.
fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers
}
