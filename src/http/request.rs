//! Request handling and transformation.
//!
//! # Responsibilities
//! - Parse and hold the upstream base URL
//! - Rewrite inbound requests to target the upstream (path join, query merge)
//! - Strip hop-by-hop headers and append `X-Forwarded-For`
//! - Extract the request path used for metrics labels
//!
//! # Design Decisions
//! - Method, path, query, headers and body pass through unchanged
//! - The body is streamed, never buffered
//! - Original request details are snapshotted before the request is consumed

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::body::Body;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Uri, Version};
use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that apply to a single connection and are never forwarded.
static HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("proxy-connection"),
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Errors for an unusable upstream URL.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),

    #[error("upstream URL has no host")]
    MissingHost,

    #[error("invalid upstream authority: {0}")]
    InvalidAuthority(String),
}

/// Errors building the forwarded request.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build upstream URI: {0}")]
    Uri(#[from] axum::http::Error),
}

/// A request-target that cannot be read as a URL.
#[derive(Debug, Error)]
pub enum TargetParseError {
    #[error("invalid URL escape {0:?}")]
    InvalidEscape(String),

    #[error("invalid absolute request target: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// The single upstream every request is forwarded to.
#[derive(Debug, Clone)]
pub struct Upstream {
    url: Url,
    scheme: Scheme,
    authority: Authority,
}

impl Upstream {
    /// Parse an `http[s]://host[:port][/base][?query]` URL.
    pub fn parse(raw: &str) -> Result<Self, UpstreamError> {
        let url = Url::parse(raw)?;
        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(UpstreamError::UnsupportedScheme(other.to_string())),
        };
        let host = url.host_str().ok_or(UpstreamError::MissingHost)?;
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority)
            .map_err(|e| UpstreamError::InvalidAuthority(e.to_string()))?;

        Ok(Self {
            url,
            scheme,
            authority,
        })
    }

    /// Build the upstream URI for an inbound one: scheme and authority come
    /// from the upstream, the paths are joined, and the queries merged.
    pub fn target_uri(&self, inbound: &Uri) -> Result<Uri, axum::http::Error> {
        let path = join_paths(self.url.path(), inbound.path());
        let base = self.url.query().filter(|q| !q.is_empty());
        let extra = inbound.query().filter(|q| !q.is_empty());
        let query = match (base, extra) {
            (Some(base), Some(extra)) => Some(format!("{base}&{extra}")),
            (base, extra) => base.or(extra).map(str::to_string),
        };
        let path_and_query = match query {
            Some(query) => format!("{path}?{query}"),
            None => path,
        };

        Ok(Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(PathAndQuery::from_str(&path_and_query)?)
            .build()?)
    }

    /// Turn an inbound request into the request sent upstream.
    pub fn rewrite(
        &self,
        request: Request<Body>,
        peer: Option<SocketAddr>,
    ) -> Result<Request<Body>, ForwardError> {
        let (mut parts, body) = request.into_parts();

        let uri = self.target_uri(&parts.uri)?;
        if !parts.headers.contains_key(header::HOST) {
            if let Some(authority) = parts.uri.authority() {
                if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
                    parts.headers.insert(header::HOST, host);
                }
            }
        }
        strip_hop_by_hop(&mut parts.headers);
        if let Some(peer) = peer {
            append_forwarded_for(&mut parts.headers, peer);
        }

        parts.uri = uri;
        parts.version = Version::HTTP_11;
        Ok(Request::from_parts(parts, body))
    }
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.url, f)
    }
}

/// What the proxy remembers about an inbound request once it is forwarded.
#[derive(Debug, Clone)]
pub struct OriginalRequest {
    pub method: Method,
    /// The request-target as received, e.g. `/api/v0/id?arg=x`.
    pub target: String,
    /// Percent-decoded path, used for `request_url_path`.
    pub path: String,
}

impl OriginalRequest {
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let uri = request.uri();
        let path = decode_path(uri.path()).unwrap_or_else(|_| uri.path().to_string());
        Self {
            method: request.method().clone(),
            target: uri.to_string(),
            path,
        }
    }
}

/// Path component of a request-target, parsed as a URL and percent-decoded.
///
/// Origin-form (`/p?q`), absolute-form (`http://h/p`) and `*` are accepted.
pub fn request_target_path(target: &str) -> Result<String, TargetParseError> {
    let target = target.split_once('#').map_or(target, |(before, _)| before);

    if target == "*" {
        return Ok(target.to_string());
    }
    if target.is_empty() || target.starts_with('/') {
        let raw = target.split_once('?').map_or(target, |(path, _)| path);
        return decode_path(raw);
    }

    let url = Url::parse(target)?;
    decode_path(url.path())
}

fn decode_path(raw: &str) -> Result<String, TargetParseError> {
    let bytes = raw.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                let end = (i + 3).min(raw.len());
                return Err(TargetParseError::InvalidEscape(
                    String::from_utf8_lossy(&bytes[i..end]).into_owned(),
                ));
            }
        }
    }
    Ok(percent_decode_str(raw).decode_utf8_lossy().into_owned())
}

/// Join two paths with exactly one slash between them.
fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub(crate) fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_str(name.trim()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: SocketAddr) {
    let client_ip = peer.ip().to_string();
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        client_ip
    } else {
        format!("{}, {}", prior.join(", "), client_ip)
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
