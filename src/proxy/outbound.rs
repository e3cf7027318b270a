use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send + Sync {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync> AsyncStream for T {}

pub type AnyStream = Box<dyn AsyncStream>;

/// Anything that can open a connection to a `host:port` destination,
/// directly or through an upstream proxy.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn connect(&self, addr: &str) -> Result<AnyStream>;
}
