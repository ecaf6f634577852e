//! HTTP front door exposing the selector.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::routing::get;
use axum::Router;
use log::{debug, info};

use crate::selector::Selector;

/// Body sent when no fresh proxy is available.
pub const NO_PROXY_MESSAGE: &str = "Unfortunately, we can't send a proxy server.";

/// Router with the single `GET /http_proxy` route.
pub fn router(selector: Selector) -> Router {
    Router::new()
        .route("/http_proxy", get(http_proxy))
        .with_state(selector)
}

/// Always answers 200; the body is either a proxy address or
/// [`NO_PROXY_MESSAGE`].
async fn http_proxy(
    State(selector): State<Selector>,
    remote: Option<ConnectInfo<SocketAddr>>,
) -> String {
    let client = remote
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match selector.select() {
        Ok(proxy) => {
            info!("Send for client ip {} proxy {}", client, proxy);
            proxy
        }
        Err(e) => {
            debug!("Can't send proxy to client ip {}: {}", client, e);
            NO_PROXY_MESSAGE.to_string()
        }
    }
}
