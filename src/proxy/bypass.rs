/// Per-call rule deciding which destination hosts skip the proxy.
pub trait BypassRule: Send + Sync {
    fn matches(&self, host: &str) -> bool;
}

impl<F> BypassRule for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, host: &str) -> bool {
        self(host)
    }
}

/// Bypass rule built from exact host names plus domain suffixes.
pub struct HostListBypass {
    hosts: Vec<String>,
    domains: Vec<String>,
}

impl HostListBypass {
    pub fn new(hosts: Vec<String>, domains: Vec<String>) -> Self {
        Self { hosts, domains }
    }
}

impl BypassRule for HostListBypass {
    fn matches(&self, host: &str) -> bool {
        if self.hosts.iter().any(|h| h == host) {
            return true;
        }
        self.domains
            .iter()
            .any(|d| host == d || host.ends_with(d.as_str()))
    }
}
