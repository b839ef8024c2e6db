//! Reverse proxy handover between generations.
//!
//! Each generation gets its own proxy. It discovers the target's routes,
//! waits for the child to create its private socket, then claims the
//! external address until the generation is retired.

mod readiness;
mod routes;
mod server;
mod upstream;

pub use readiness::ReadinessGate;
pub use routes::{
    ProxyRoute, RouteDocument, RouteMatch, RouteTable, RouteTemplate, discover_routes,
    parse_routes,
};
pub use server::{ProxyState, proxy_router, serve};
pub use upstream::Upstream;

use crate::error::ProxyError;
use crate::options::ProxyOptions;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One generation's proxy lifecycle.
#[derive(Debug, Clone)]
pub struct ProxyHandover {
    options: ProxyOptions,
    base_dir: PathBuf,
    socket: PathBuf,
}

impl ProxyHandover {
    pub fn new(
        options: ProxyOptions,
        base_dir: impl Into<PathBuf>,
        socket: impl Into<PathBuf>,
    ) -> Self {
        Self {
            options,
            base_dir: base_dir.into(),
            socket: socket.into(),
        }
    }

    /// Discover routes, wait for readiness, then serve until `token` is cancelled.
    ///
    /// Any error only affects this generation's proxy.
    pub async fn run(
        self,
        gate: ReadinessGate,
        token: CancellationToken,
    ) -> Result<(), ProxyError> {
        let routes =
            discover_routes(&self.options.routes_command, &self.base_dir, &token).await?;
        let table = RouteTable::new(&routes);
        info!(routes = table.len(), "discovered routes");

        let catch_all = self
            .options
            .catch_all
            .as_deref()
            .map(Upstream::parse)
            .transpose()?;
        let app = proxy_router(ProxyState::new(table, Upstream::unix(&self.socket), catch_all));

        if !gate.wait(&token).await {
            debug!(
                socket = %self.socket.display(),
                "generation retired before socket was ready"
            );
            return Ok(());
        }

        let addr = normalize_listen_addr(&self.options.addr);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ProxyError::Bind {
                addr: addr.clone(),
                source,
            })?;
        info!(addr = %addr, "starting proxy server");
        serve(listener, app, token, self.options.shutdown_timeout).await
    }
}

/// Accept Go-style `:port` addresses as "all interfaces".
pub fn normalize_listen_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_listen_addr() {
        assert_eq!(normalize_listen_addr(":8080"), "0.0.0.0:8080");
        assert_eq!(normalize_listen_addr("127.0.0.1:8080"), "127.0.0.1:8080");
        assert_eq!(normalize_listen_addr("localhost:3000"), "localhost:3000");
    }
}
