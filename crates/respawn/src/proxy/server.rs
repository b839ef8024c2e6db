//! External-facing proxy server.

use super::routes::{RouteMatch, RouteTable};
use super::upstream::Upstream;
use crate::error::ProxyError;
use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shared state of one generation's proxy.
#[derive(Clone)]
pub struct ProxyState {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    routes: RouteTable,
    app: Upstream,
    catch_all: Option<Upstream>,
}

impl ProxyState {
    pub fn new(routes: RouteTable, app: Upstream, catch_all: Option<Upstream>) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                routes,
                app,
                catch_all,
            }),
        }
    }
}

/// Build the proxy router. Every request goes through the route table.
pub fn proxy_router(state: ProxyState) -> Router {
    Router::new().fallback(handle_request).with_state(state)
}

async fn handle_request(State(state): State<ProxyState>, req: Request) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let upstream = match state.inner.routes.lookup(req.method(), req.uri().path()) {
        RouteMatch::Matched(template) => {
            debug!(method = %req.method(), route = template, "forwarding to generation");
            &state.inner.app
        }
        RouteMatch::MethodNotAllowed => return StatusCode::METHOD_NOT_ALLOWED.into_response(),
        RouteMatch::NotFound => match &state.inner.catch_all {
            Some(catch_all) => catch_all,
            None => return StatusCode::NOT_FOUND.into_response(),
        },
    };

    match upstream.forward(req, client).await {
        Ok(response) => response,
        Err(e) => {
            error!(upstream = %upstream.describe(), error = %e, "proxy error");
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

/// Serve `app` on `listener` until `token` is cancelled.
///
/// Cancellation starts a graceful shutdown. In-flight requests get `grace`
/// to finish; after that the listener is dropped regardless.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    token: CancellationToken,
    grace: Duration,
) -> Result<(), ProxyError> {
    let shutdown = token.clone();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result.map_err(ProxyError::Serve),
        _ = token.cancelled() => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => {
            info!("proxy server stopped");
            result.map_err(ProxyError::Serve)
        }
        Err(_) => {
            warn!(timeout = ?grace, "graceful shutdown timed out; closing proxy server");
            Ok(())
        }
    }
}
