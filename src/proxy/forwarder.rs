//! Default forwarder backed by the hyper client.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use regex::Regex;
use url::Url;

use crate::config::route::RouteDescriptor;
use crate::proxy::handler::HttpProxyHandler;
use crate::proxy::{ForwardError, Forwarder};
use crate::routing::{ContextMatcher, RouteHandler};

/// Builds [`HttpProxyHandler`]s sharing one pooled client.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
}

impl HttpForwarder {
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));

        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    /// Validate `route` and compile it into a concrete handler.
    pub fn build_handler(&self, route: &RouteDescriptor) -> Result<HttpProxyHandler, ForwardError> {
        let target = Url::parse(&route.target).map_err(|source| ForwardError::InvalidTarget {
            target: route.target.clone(),
            source,
        })?;
        if target.scheme() != "http" {
            return Err(ForwardError::UnsupportedScheme(target.scheme().to_string()));
        }
        let host = target
            .host_str()
            .ok_or_else(|| ForwardError::MissingHost(route.target.clone()))?;

        let authority = match target.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority = HeaderValue::from_str(&authority).map_err(|_| ForwardError::InvalidHeader {
            name: "host".to_string(),
        })?;

        let rewrites = route
            .options
            .path_rewrite
            .iter()
            .map(|rule| {
                Regex::new(&rule.pattern)
                    .map(|pattern| (pattern, rule.replacement.clone()))
                    .map_err(|source| ForwardError::InvalidRewrite {
                        pattern: rule.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut headers = HeaderMap::with_capacity(route.options.headers.len());
        for (name, value) in &route.options.headers {
            let invalid = || ForwardError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }

        Ok(HttpProxyHandler {
            name: route.context.to_string(),
            matcher: ContextMatcher::new(&route.context),
            origin: target.origin().ascii_serialization(),
            authority,
            base_path: target.path().trim_end_matches('/').to_string(),
            rewrites,
            change_origin: route.options.change_origin,
            headers,
            client: self.client.clone(),
        })
    }
}

impl Default for HttpForwarder {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Forwarder for HttpForwarder {
    fn build(&self, route: &RouteDescriptor) -> Result<Arc<dyn RouteHandler>, ForwardError> {
        let handler = self.build_handler(route)?;
        tracing::debug!(
            context = %route.context,
            target = %route.target,
            change_origin = route.options.change_origin,
            rewrites = route.options.path_rewrite.len(),
            "Built forwarding handler"
        );
        Ok(Arc::new(handler))
    }
}
