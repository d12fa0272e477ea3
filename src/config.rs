/// Runtime configuration, read from the environment once at startup.
use std::net::ToSocketAddrs;

/// Listen address when `CHATHUB_BIND` is unset.
pub const DEFAULT_BIND: &str = "0.0.0.0:59001";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    /// Socket address the listener binds to.
    pub bind: String,
    /// Address reported to members by `/serverip`.
    pub server_ip: String,
}

impl HubConfig {
    pub fn new(bind: impl Into<String>, server_ip: impl Into<String>) -> Self {
        Self {
            bind: bind.into(),
            server_ip: server_ip.into(),
        }
    }

    /// `CHATHUB_BIND` and `CHATHUB_SERVER_IP`, with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let bind = lookup("CHATHUB_BIND")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let server_ip = lookup("CHATHUB_SERVER_IP")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(detect_server_ip);
        Self { bind, server_ip }
    }
}

/// First IPv4 address the local hostname resolves to, else loopback.
pub fn detect_server_ip() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .and_then(|host| {
            (host.as_str(), 0)
                .to_socket_addrs()
                .ok()?
                .find(|a| a.is_ipv4())
                .map(|a| a.ip().to_string())
        })
        .unwrap_or_else(|| "127.0.0.1".into())
}
