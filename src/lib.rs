//! Upstream-proxy dialer: connects to a destination either directly or
//! tunneled through an HTTP CONNECT or SOCKS5 proxy, with bypass rules,
//! timeout control and cached resolution of the proxy's own address.

pub mod config;
pub mod error;
pub mod proxy;
pub mod resolver;

pub use config::UpstreamConfig;
pub use error::{ProxyError, Result};
pub use proxy::bypass::{BypassRule, HostListBypass};
pub use proxy::descriptor::{ProxyDescriptor, ProxyScheme};
pub use proxy::direct::DirectDialer;
pub use proxy::outbound::{AnyStream, AsyncStream, Dialer};
pub use resolver::{AddressResolver, SystemResolver};
