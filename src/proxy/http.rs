use std::io;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time;

use crate::error::{ProxyError, Result};

/// Prefix the proxy must answer with for the tunnel to be considered open.
const SUCCESS_PREFIX: &[u8] = b"HTTP/1.1 200";
/// Minimum byte count of a parseable status line response.
const MIN_RESPONSE_LEN: usize = 13;

/// Issues a CONNECT handshake for `target` over an established proxy
/// connection and hands the connection back once the proxy accepted the
/// tunnel. No response bytes beyond the single status read are consumed.
pub async fn establish<S>(
    mut stream: S,
    target: &str,
    auth: Option<&(String, String)>,
    timeout: Duration,
) -> Result<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut request = format!("CONNECT {} HTTP/1.1\r\nHost: {}\r\n", target, target);
    if let Some((user, pass)) = auth {
        let token = BASE64.encode(format!("{}:{}", user, pass));
        request.push_str(&format!("Authorization: Basic {}\r\n", token));
    }
    request.push_str("\r\n");

    stream
        .write_all(request.as_bytes())
        .await
        .map_err(ProxyError::Dial)?;

    let mut response = [0u8; 128];
    let n = match time::timeout(timeout, stream.read(&mut response)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => return Err(ProxyError::Dial(e)),
        Err(_) => {
            return Err(ProxyError::Dial(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("CONNECT response from proxy for {} timed out", target),
            )));
        }
    };
    if n < MIN_RESPONSE_LEN {
        // Closing the connection here; a truncated status line is unusable.
        drop(stream);
        return Err(ProxyError::ShortResponse(n));
    }
    if &response[..SUCCESS_PREFIX.len()] != SUCCESS_PREFIX {
        return Err(ProxyError::ProxyRejected(response[..n].to_vec()));
    }
    debug!("CONNECT tunnel to {} established", target);
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    async fn read_request(stream: &mut (impl AsyncRead + Unpin)) -> String {
        let mut collected = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            collected.extend_from_slice(&buf[..n]);
            if n == 0 || collected.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        String::from_utf8(collected).unwrap()
    }

    #[tokio::test]
    async fn writes_the_exact_connect_request() {
        let (client, mut server) = duplex(1024);

        let handshake = tokio::spawn(async move {
            establish(client, "host.example:443", None, Duration::from_secs(1)).await
        });

        let request = read_request(&mut server).await;
        assert_eq!(
            request,
            "CONNECT host.example:443 HTTP/1.1\r\nHost: host.example:443\r\n\r\n"
        );

        server
            .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .await
            .unwrap();
        handshake.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn credentials_become_a_basic_authorization_header() {
        let (client, mut server) = duplex(1024);
        let auth = Some(("user".to_string(), "pass".to_string()));

        let handshake = tokio::spawn(async move {
            establish(
                client,
                "host.example:80",
                auth.as_ref(),
                Duration::from_secs(1),
            )
            .await
        });

        let request = read_request(&mut server).await;
        assert_eq!(
            request,
            "CONNECT host.example:80 HTTP/1.1\r\nHost: host.example:80\r\n\
             Authorization: Basic dXNlcjpwYXNz\r\n\r\n"
        );

        server
            .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .await
            .unwrap();
        handshake.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn non_200_status_is_a_rejection_with_raw_bytes() {
        let (client, mut server) = duplex(1024);

        let handshake = tokio::spawn(async move {
            establish(client, "host.example:443", None, Duration::from_secs(1)).await
        });

        read_request(&mut server).await;
        server
            .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
            .await
            .unwrap();

        match handshake.await.unwrap() {
            Err(ProxyError::ProxyRejected(raw)) => {
                assert!(raw.starts_with(b"HTTP/1.1 407"));
            }
            other => panic!("expected rejection, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn truncated_response_is_a_short_response() {
        let (client, mut server) = duplex(1024);

        let handshake = tokio::spawn(async move {
            establish(client, "host.example:443", None, Duration::from_secs(1)).await
        });

        read_request(&mut server).await;
        server.write_all(b"HTTP/1.1").await.unwrap();
        drop(server);

        match handshake.await.unwrap() {
            Err(ProxyError::ShortResponse(n)) => assert_eq!(n, 8),
            other => panic!("expected short response, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn tunnel_carries_traffic_after_the_handshake() {
        let (client, mut server) = duplex(1024);

        let handshake = tokio::spawn(async move {
            establish(client, "host.example:443", None, Duration::from_secs(1)).await
        });

        read_request(&mut server).await;
        server
            .write_all(b"HTTP/1.1 200 Connection established\r\n\r\n")
            .await
            .unwrap();
        let mut tunnel = handshake.await.unwrap().unwrap();

        tunnel.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        server.write_all(b"pong").await.unwrap();
        tunnel.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }
}
