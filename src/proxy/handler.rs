//! Forwarding handler for one route.
//!
//! # Responsibilities
//! - Claim requests whose path matches the route context
//! - Rewrite the path (`pathRewrite`) and join it onto the target
//! - Adjust headers: hop-by-hop stripped, `x-forwarded-*` added,
//!   `Host` replaced when `changeOrigin` is set, configured headers applied
//! - Stream the upstream response back; connection failures become 502

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use regex::Regex;

use crate::observability::metrics;
use crate::routing::{ContextMatcher, Dispatch, Matcher, RouteHandler};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Connection-scoped headers that must not be forwarded.
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forwards matching requests to a single upstream.
#[derive(Debug)]
pub struct HttpProxyHandler {
    pub(crate) name: String,
    pub(crate) matcher: ContextMatcher,
    /// Scheme and authority, e.g. `http://localhost:3000`.
    pub(crate) origin: String,
    /// Host header value used when `change_origin` is set.
    pub(crate) authority: HeaderValue,
    /// Target path without trailing slash; empty for a bare origin.
    pub(crate) base_path: String,
    pub(crate) rewrites: Vec<(Regex, String)>,
    pub(crate) change_origin: bool,
    pub(crate) headers: HeaderMap,
    pub(crate) client: Client<HttpConnector, Body>,
}

impl HttpProxyHandler {
    /// Apply the first `pathRewrite` rule whose pattern matches. `path`
    /// excludes the query string.
    pub fn rewrite_path(&self, path: &str) -> String {
        self.rewrites
            .iter()
            .find(|(pattern, _)| pattern.is_match(path))
            .map(|(pattern, replacement)| pattern.replace(path, replacement.as_str()).into_owned())
            .unwrap_or_else(|| path.to_string())
    }

    /// Upstream URI for an incoming request URI.
    pub fn upstream_uri(&self, uri: &Uri) -> Result<Uri, axum::http::uri::InvalidUri> {
        let path = self.rewrite_path(uri.path());

        let mut target = String::with_capacity(self.origin.len() + self.base_path.len() + path.len() + 1);
        target.push_str(&self.origin);
        target.push_str(&self.base_path);
        if !path.starts_with('/') {
            target.push('/');
        }
        target.push_str(&path);
        if let Some(query) = uri.query() {
            target.push('?');
            target.push_str(query);
        }

        target.parse()
    }

    fn prepare_headers(&self, headers: &mut HeaderMap, peer: Option<SocketAddr>) {
        for name in HOP_BY_HOP.iter() {
            headers.remove(name);
        }

        if let Some(host) = headers.get(header::HOST).cloned() {
            headers.entry(X_FORWARDED_HOST).or_insert(host);
        }
        headers
            .entry(X_FORWARDED_PROTO)
            .or_insert(HeaderValue::from_static("http"));
        if let Some(peer) = peer {
            if let Ok(ip) = HeaderValue::from_str(&peer.ip().to_string()) {
                headers.append(X_FORWARDED_FOR, ip);
            }
        }

        if self.change_origin {
            headers.insert(header::HOST, self.authority.clone());
        }
        for (name, value) in self.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
    }

    async fn forward(&self, req: Request<Body>) -> Response {
        let start = Instant::now();
        let (mut parts, body) = req.into_parts();
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        let uri = match self.upstream_uri(&parts.uri) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::error!(request_id = %request_id, route = %self.name, error = %e, "Failed to build upstream URI");
                metrics::record_request(&self.name, 502, start);
                return (StatusCode::BAD_GATEWAY, "Invalid upstream URI").into_response();
            }
        };

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        self.prepare_headers(&mut parts.headers, peer);

        tracing::debug!(
            request_id = %request_id,
            route = %self.name,
            method = %parts.method,
            from = %parts.uri,
            to = %uri,
            "Forwarding request"
        );

        parts.uri = uri;
        parts.version = Version::HTTP_11;
        let upstream = Request::from_parts(parts, body);

        match self.client.request(upstream).await {
            Ok(response) => {
                metrics::record_request(&self.name, response.status().as_u16(), start);
                response.map(Body::new)
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, route = %self.name, error = %e, "Upstream error");
                metrics::record_request(&self.name, 502, start);
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }
}

impl RouteHandler for HttpProxyHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, req: Request<Body>) -> BoxFuture<'_, Dispatch> {
        Box::pin(async move {
            if !self.matcher.matches(&req) {
                return Dispatch::Next(req);
            }
            Dispatch::Handled(self.forward(req).await)
        })
    }
}
