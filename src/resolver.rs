use std::collections::HashMap;
use std::io;
use std::net::IpAddr;
use std::sync::RwLock;

use async_trait::async_trait;
use log::debug;

/// Resolves a hostname to an ordered candidate list and remembers the
/// last IP that successfully carried a connection, keyed by hostname
/// plus an opaque tag.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    async fn lookup_candidates(&self, host: &str, tag: &str) -> io::Result<Vec<IpAddr>>;

    fn get_remembered(&self, host: &str, tag: &str) -> Option<IpAddr>;

    fn set_remembered(&self, host: &str, tag: &str, ip: IpAddr);
}

/// System resolver: candidates come from the OS lookup, the remembered
/// IP lives in a concurrent map with last-write-wins overwrite and no
/// expiry.
pub struct SystemResolver {
    remembered: RwLock<HashMap<(String, String), IpAddr>>,
}

impl SystemResolver {
    pub fn new() -> Self {
        Self {
            remembered: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AddressResolver for SystemResolver {
    async fn lookup_candidates(&self, host: &str, _tag: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0u16)).await?;
        let mut ips: Vec<IpAddr> = Vec::new();
        for addr in addrs {
            let ip = addr.ip();
            if ip.is_unspecified() || ips.contains(&ip) {
                continue;
            }
            ips.push(ip);
        }
        debug!("resolved {} -> {:?}", host, ips);
        Ok(ips)
    }

    fn get_remembered(&self, host: &str, tag: &str) -> Option<IpAddr> {
        self.remembered
            .read()
            .unwrap()
            .get(&(host.to_string(), tag.to_string()))
            .copied()
    }

    fn set_remembered(&self, host: &str, tag: &str, ip: IpAddr) {
        self.remembered
            .write()
            .unwrap()
            .insert((host.to_string(), tag.to_string()), ip);
    }
}
