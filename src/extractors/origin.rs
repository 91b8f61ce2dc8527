//! Where a write request came from, recorded in the `*_ip_addr` and `*_uri` audit columns.

use async_trait::async_trait;
use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use std::net::SocketAddr;

pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";
pub const FORWARDED_PROTO_HEADER: &str = "X-Forwarded-Proto";

/// Client address and full request URI of the current request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestOrigin {
    /// First `X-Forwarded-For` entry, else the peer address when the server exposes it.
    pub ip: Option<String>,
    /// Request URI including scheme and host when a `Host` header is present.
    pub uri: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn client_ip(parts: &Parts) -> Option<String> {
    let forwarded = header_str(&parts.headers, FORWARDED_FOR_HEADER)
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    forwarded.or_else(|| {
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    })
}

fn full_uri(parts: &Parts) -> String {
    if parts.uri.scheme().is_some() {
        return parts.uri.to_string();
    }
    let path = parts
        .uri
        .path_and_query()
        .map(|p| p.as_str())
        .unwrap_or("/");
    match header_str(&parts.headers, header::HOST.as_str()) {
        Some(host) => {
            let scheme = header_str(&parts.headers, FORWARDED_PROTO_HEADER).unwrap_or("http");
            format!("{}://{}{}", scheme, host, path)
        }
        None => path.to_string(),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestOrigin
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RequestOrigin {
            ip: client_ip(parts),
            uri: full_uri(parts),
        })
    }
}
