//! Reverse-proxy forwarding to the generation socket or the catch-all target.

use crate::error::ProxyError;
use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Request, Response, StatusCode, Uri, Version};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tracing::debug;

/// Host header used when the client sent none and the upstream is a socket.
const SOCKET_HOST: &str = "localhost";

/// Headers that describe a single hop and are never forwarded.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Where a proxied request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upstream {
    /// The generation's private Unix-domain socket
    Unix { socket: PathBuf },
    /// A plain HTTP target
    Http {
        /// `host:port` to connect to
        address: String,
        /// Path prefix joined in front of every request path
        base_path: String,
        /// Query merged in front of every request query
        base_query: Option<String>,
    },
}

impl Upstream {
    pub fn unix(socket: impl Into<PathBuf>) -> Self {
        Upstream::Unix {
            socket: socket.into(),
        }
    }

    /// Parse a catch-all target URL. Only `http://` is supported.
    pub fn parse(target: &str) -> Result<Self, ProxyError> {
        let invalid = |reason: &str| ProxyError::InvalidTarget {
            target: target.to_string(),
            reason: reason.to_string(),
        };
        let uri: Uri = target.parse().map_err(|_| invalid("not a valid URL"))?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(_) => return Err(invalid("only http:// targets are supported")),
            None => return Err(invalid("missing scheme")),
        }
        let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
        let port = authority.port_u16().unwrap_or(80);

        Ok(Upstream::Http {
            address: format!("{}:{}", authority.host(), port),
            base_path: uri.path().to_string(),
            base_query: uri.query().map(str::to_string),
        })
    }

    /// Human-readable name used in logs and errors.
    pub fn describe(&self) -> String {
        match self {
            Upstream::Unix { socket } => format!("unix:{}", socket.display()),
            Upstream::Http { address, .. } => format!("http://{address}"),
        }
    }

    /// Forward `req` and return the upstream's response.
    ///
    /// Hop-by-hop headers are dropped in both directions, `X-Forwarded-For`
    /// gains the client address and the client's `Host` is kept. Protocol
    /// upgrades (WebSocket) are tunnelled once both sides have switched.
    pub async fn forward(
        &self,
        mut req: Request<Body>,
        client: Option<SocketAddr>,
    ) -> Result<Response<Body>, ProxyError> {
        let upgrade = upgrade_type(req.headers());
        let client_upgrade = upgrade.as_ref().map(|_| hyper::upgrade::on(&mut req));

        let target = self.target_uri(req.uri())?;
        let (mut parts, body) = req.into_parts();
        parts.uri = target;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        if let Some(upgrade) = upgrade {
            parts
                .headers
                .insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
            parts.headers.insert(header::UPGRADE, upgrade);
        }
        if !parts.headers.contains_key(header::HOST) {
            let host = match self {
                Upstream::Unix { .. } => SOCKET_HOST,
                Upstream::Http { address, .. } => address.as_str(),
            };
            if let Ok(value) = HeaderValue::from_str(host) {
                parts.headers.insert(header::HOST, value);
            }
        }
        if let Some(client) = client {
            append_forwarded_for(&mut parts.headers, client);
        }
        let req = Request::from_parts(parts, body);

        let mut res = match self {
            Upstream::Unix { socket } => {
                let stream = connect_unix(socket, &self.describe()).await?;
                send(stream, req, &self.describe()).await?
            }
            Upstream::Http { address, .. } => {
                let stream = TcpStream::connect(address.as_str())
                    .await
                    .map_err(|source| ProxyError::Connect {
                        upstream: self.describe(),
                        source,
                    })?;
                send(stream, req, &self.describe()).await?
            }
        };

        if res.status() == StatusCode::SWITCHING_PROTOCOLS {
            if let Some(client_upgrade) = client_upgrade {
                let upstream_upgrade = hyper::upgrade::on(&mut res);
                tokio::spawn(tunnel(client_upgrade, upstream_upgrade));
            }
        } else {
            strip_hop_by_hop(res.headers_mut());
        }
        Ok(res.map(Body::new))
    }

    /// Origin-form URI for the upstream request.
    fn target_uri(&self, incoming: &Uri) -> Result<Uri, ProxyError> {
        let path_and_query = match self {
            Upstream::Unix { .. } => incoming
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
            Upstream::Http {
                base_path,
                base_query,
                ..
            } => {
                let path = join_paths(base_path, incoming.path());
                match merge_query(base_query.as_deref(), incoming.query()) {
                    Some(query) => format!("{path}?{query}"),
                    None => path,
                }
            }
        };
        path_and_query
            .parse()
            .map_err(|_| ProxyError::InvalidTarget {
                target: path_and_query.clone(),
                reason: "request path cannot be forwarded".to_string(),
            })
    }
}

async fn connect_unix(socket: &Path, upstream: &str) -> Result<UnixStream, ProxyError> {
    UnixStream::connect(socket)
        .await
        .map_err(|source| ProxyError::Connect {
            upstream: upstream.to_string(),
            source,
        })
}

/// Send one request over a fresh HTTP/1.1 connection.
async fn send<S>(
    stream: S,
    req: Request<Body>,
    upstream: &str,
) -> Result<Response<hyper::body::Incoming>, ProxyError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let upstream_err = |source| ProxyError::Upstream {
        upstream: upstream.to_string(),
        source,
    };
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(upstream_err)?;
    tokio::spawn(async move {
        if let Err(e) = conn.with_upgrades().await {
            debug!(error = %e, "upstream connection closed");
        }
    });
    sender.send_request(req).await.map_err(upstream_err)
}

/// Copy bytes both ways between an upgraded client and upstream.
async fn tunnel(client: hyper::upgrade::OnUpgrade, upstream: hyper::upgrade::OnUpgrade) {
    let (client, upstream) = match tokio::try_join!(client, upstream) {
        Ok(pair) => pair,
        Err(e) => {
            debug!(error = %e, "upgrade failed");
            return;
        }
    };
    let mut client = TokioIo::new(client);
    let mut upstream = TokioIo::new(upstream);
    match tokio::io::copy_bidirectional(&mut client, &mut upstream).await {
        Ok((to_upstream, to_client)) => {
            debug!(to_upstream, to_client, "upgraded connection closed")
        }
        Err(e) => debug!(error = %e, "upgraded connection failed"),
    }
}

/// The requested protocol when the request asks for an upgrade.
fn upgrade_type(headers: &HeaderMap) -> Option<HeaderValue> {
    let wants_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
    if wants_upgrade {
        headers.get(header::UPGRADE).cloned()
    } else {
        None
    }
}

/// Remove hop-by-hop headers, including any the `Connection` header names.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in &named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Append the client IP to `X-Forwarded-For`, keeping prior entries.
pub fn append_forwarded_for(headers: &mut HeaderMap, client: SocketAddr) {
    let ip = client.ip().to_string();
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    let value = if prior.is_empty() {
        ip
    } else {
        format!("{}, {ip}", prior.join(", "))
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(HeaderName::from_static(X_FORWARDED_FOR), value);
    }
}

/// Join two URL paths with exactly one slash between them.
pub fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}

/// Combine the target's query with the request's.
pub fn merge_query(base: Option<&str>, query: Option<&str>) -> Option<String> {
    match (base.filter(|q| !q.is_empty()), query.filter(|q| !q.is_empty())) {
        (Some(base), Some(query)) => Some(format!("{base}&{query}")),
        (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
        (None, None) => None,
    }
}
