use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::net::TcpStream;

use crate::error::{ProxyError, Result};
use crate::proxy::descriptor::ProxyDescriptor;
use crate::proxy::direct::DirectDialer;
use crate::proxy::http;
use crate::proxy::outbound::{AnyStream, Dialer};
use crate::proxy::socks5;

impl ProxyDescriptor {
    /// Connects to `addr` (`host:port`), going through the configured
    /// upstream proxy unless the descriptor is unset or a bypass rule
    /// matches the destination host.
    ///
    /// When the proxy's own host is a name rather than an IP literal,
    /// the injected resolver supplies a remembered best IP (tried
    /// first) and an ordered candidate list (tried in order, first
    /// success remembered for next time); the proxy's literal address
    /// is the terminal fallback and its outcome is final. Fallback is
    /// strictly sequential, one connect at a time.
    pub async fn dial(&self, addr: &str) -> Result<AnyStream> {
        let direct = DirectDialer::new(self.effective_timeout());
        let dest_host = host_part(addr).unwrap_or_default();
        self.note_dialed(&dest_host);

        let Some(url) = self.url() else {
            let stream = direct.dial(addr).await.map_err(ProxyError::Dial)?;
            self.note_peer(&stream);
            return Ok(Box::new(stream));
        };

        if !dest_host.is_empty() && self.bypass_matches(&dest_host) {
            debug!("bypass matched {}, dialing {} directly", dest_host, addr);
            let stream = direct.dial(addr).await.map_err(ProxyError::Dial)?;
            self.note_peer(&stream);
            return Ok(Box::new(stream));
        }

        let proxy_host_raw = url.host_str().unwrap_or_default().to_string();
        let proxy_port = url.port_or_known_default();
        let proxy_addr = match proxy_port {
            Some(port) => format!("{}:{}", proxy_host_raw, port),
            None => proxy_host_raw.clone(),
        };
        let proxy_host = proxy_host_raw
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let mut candidates: Vec<IpAddr> = Vec::new();
        let mut remembered: Option<IpAddr> = None;
        if proxy_port.is_some() && proxy_host.parse::<IpAddr>().is_err() {
            if let Some(resolver) = self.resolver() {
                // Lookup failures are expected; they just shrink the
                // fallback chain down to the literal proxy address.
                candidates = resolver
                    .lookup_candidates(&proxy_host, "")
                    .await
                    .unwrap_or_default();
                remembered = resolver.get_remembered(&proxy_host, "");
            }
        }

        let user = self.user();
        let auth = if user.is_empty() {
            None
        } else {
            Some((user, self.pass()))
        };

        if self.is_socks_type() {
            if let (Some(ip), Some(port)) = (remembered, proxy_port) {
                let via = SocketAddr::new(ip, port).to_string();
                self.note_dialed(&via);
                match socks5::tunnel_via(&direct, &via, addr, auth.as_ref()).await {
                    Ok(stream) => return Ok(Box::new(stream)),
                    Err(e) => debug!("remembered proxy address {} failed: {}", via, e),
                }
            }
            if let Some(port) = proxy_port {
                for ip in &candidates {
                    let via = SocketAddr::new(*ip, port).to_string();
                    self.note_dialed(&via);
                    match socks5::tunnel_via(&direct, &via, addr, auth.as_ref()).await {
                        Ok(stream) => {
                            if let Some(resolver) = self.resolver() {
                                resolver.set_remembered(&proxy_host, "", *ip);
                            }
                            return Ok(Box::new(stream));
                        }
                        Err(e) => debug!("proxy candidate {} failed: {}", via, e),
                    }
                }
            }
            self.note_dialed(&proxy_addr);
            let stream = socks5::tunnel_via(&direct, &proxy_addr, addr, auth.as_ref()).await?;
            return Ok(Box::new(stream));
        }

        let mut conn: Option<TcpStream> = None;
        let mut last_err: Option<io::Error> = None;

        if let (Some(ip), Some(port)) = (remembered, proxy_port) {
            let via = SocketAddr::new(ip, port).to_string();
            self.note_dialed(&via);
            match direct.dial(&via).await {
                Ok(stream) => conn = Some(stream),
                Err(e) => {
                    debug!("remembered proxy address {} failed: {}", via, e);
                    last_err = Some(e);
                }
            }
        }
        if conn.is_none() {
            if let Some(port) = proxy_port {
                for ip in &candidates {
                    let via = SocketAddr::new(*ip, port).to_string();
                    self.note_dialed(&via);
                    match direct.dial(&via).await {
                        Ok(stream) => {
                            if let Some(resolver) = self.resolver() {
                                resolver.set_remembered(&proxy_host, "", *ip);
                            }
                            conn = Some(stream);
                            break;
                        }
                        Err(e) => {
                            debug!("proxy candidate {} failed: {}", via, e);
                            last_err = Some(e);
                        }
                    }
                }
            }
            if conn.is_none() {
                self.note_dialed(&proxy_addr);
                match direct.dial(&proxy_addr).await {
                    Ok(stream) => conn = Some(stream),
                    Err(e) => {
                        warn!("proxy {} unreachable on every address", proxy_addr);
                        last_err = Some(e);
                    }
                }
            }
        }
        let Some(stream) = conn else {
            let e = last_err
                .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "proxy unreachable"));
            return Err(ProxyError::Dial(e));
        };

        let stream = http::establish(stream, addr, auth.as_ref(), self.effective_timeout()).await?;
        Ok(Box::new(stream))
    }

    /// Dials with a one-off timeout on a scoped clone of this
    /// descriptor; the original's timeout and `last_dialed_address`
    /// are left untouched.
    pub async fn dial_with_timeout(&self, addr: &str, timeout: Duration) -> Result<AnyStream> {
        let mut scoped = self.try_clone().unwrap_or_default();
        scoped.set_timeout(timeout);
        scoped.dial(addr).await
    }

    fn note_peer(&self, stream: &TcpStream) {
        if let Ok(peer) = stream.peer_addr() {
            self.note_dialed(&peer.to_string());
        }
    }
}

#[async_trait]
impl Dialer for ProxyDescriptor {
    async fn connect(&self, addr: &str) -> Result<AnyStream> {
        self.dial(addr).await
    }
}

fn host_part(addr: &str) -> Option<String> {
    let (host, port) = addr.rsplit_once(':')?;
    if port.parse::<u16>().is_err() {
        return None;
    }
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    Some(host.to_string())
}
