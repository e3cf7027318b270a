use log::debug;
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;

use crate::error::{ProxyError, Result};
use crate::proxy::direct::DirectDialer;

/// Connects to the SOCKS5 proxy at `proxy_addr` through the direct
/// dialer, then negotiates a tunnel to `target` over that socket.
/// Authentication is offered only when credentials are given.
pub async fn tunnel_via(
    direct: &DirectDialer,
    proxy_addr: &str,
    target: &str,
    auth: Option<&(String, String)>,
) -> Result<Socks5Stream<TcpStream>> {
    let socket = direct.dial(proxy_addr).await.map_err(ProxyError::Dial)?;
    debug!("negotiating socks5 with {} for {}", proxy_addr, target);
    let stream = match auth {
        Some((user, pass)) => {
            Socks5Stream::connect_with_password_and_socket(socket, target, user, pass).await?
        }
        None => Socks5Stream::connect_with_socket(socket, target).await?,
    };
    Ok(stream)
}
