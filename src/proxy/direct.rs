use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::{ProxyError, Result};
use crate::proxy::outbound::{AnyStream, Dialer};

/// Timeout-bound TCP dial primitive. Every other dial path composes
/// through this so timeout policy stays in one place.
pub struct DirectDialer {
    timeout: Duration,
}

impl DirectDialer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn dial(&self, addr: &str) -> io::Result<TcpStream> {
        match time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("connect to {} timed out", addr),
            )),
        }
    }

    /// Cancellable variant. A token cancelled before or during the
    /// connect aborts the attempt; each connect otherwise respects only
    /// its own timeout.
    pub async fn dial_cancellable(
        &self,
        addr: &str,
        cancel: &CancellationToken,
    ) -> io::Result<TcpStream> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(io::Error::new(
                io::ErrorKind::Interrupted,
                format!("connect to {} cancelled", addr),
            )),
            result = self.dial(addr) => result,
        }
    }
}

#[async_trait]
impl Dialer for DirectDialer {
    async fn connect(&self, addr: &str) -> Result<AnyStream> {
        let stream = self.dial(addr).await.map_err(ProxyError::Dial)?;
        Ok(Box::new(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn dials_a_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let dialer = DirectDialer::new(Duration::from_secs(5));
        let stream = dialer.dial(&addr).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap().to_string(), addr);
    }

    #[tokio::test]
    async fn refused_or_unreachable_addresses_error() {
        let dialer = DirectDialer::new(Duration::from_millis(200));
        assert!(dialer.dial("127.0.0.1:1").await.is_err());
    }

    #[tokio::test]
    async fn cancelled_token_aborts_the_dial() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let dialer = DirectDialer::new(Duration::from_secs(5));
        let err = dialer.dial_cancellable(&addr, &cancel).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }
}
