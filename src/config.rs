use serde::Deserialize;
use std::net::SocketAddr;

use crate::error::ClientError;

/// DNS servers listen on port 53 unless the address says otherwise.
pub const DEFAULT_DNS_PORT: u16 = 53;

#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Resolver endpoints, tried strictly in order.
    pub servers: Vec<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub udp_enabled: bool,
    #[serde(default = "default_true")]
    pub tcp_enabled: bool,
    /// UDP receive cap. Above 512 an EDNS OPT record advertising this size
    /// is attached to outgoing queries.
    #[serde(default = "default_udp_payload_size")]
    pub udp_payload_size: u16,
}

// Default value functions
fn default_timeout_ms() -> u64 { 5000 }
fn default_true() -> bool { true }
fn default_udp_payload_size() -> u16 { 512 }

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            timeout_ms: default_timeout_ms(),
            udp_enabled: true,
            tcp_enabled: true,
            udp_payload_size: default_udp_payload_size(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path, e))?;
        let config: ClientConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config '{}': {}", path, e))?;
        Ok(config)
    }

    /// Normalize the configured server strings to socket addresses.
    pub fn server_addrs(&self) -> Result<Vec<SocketAddr>, ClientError> {
        self.servers.iter().map(|s| parse_server(s)).collect()
    }
}

/// Parse one resolver endpoint. Accepts IPv4/IPv6 literals with or without
/// a port; the port defaults to 53.
pub fn parse_server(s: &str) -> Result<SocketAddr, ClientError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ClientError::InvalidArgument("empty server address".into()));
    }

    let parsed = if s.starts_with('[') {
        // Bracketed IPv6, with or without port
        if s.contains("]:") {
            s.parse()
        } else {
            format!("{}:{}", s, DEFAULT_DNS_PORT).parse()
        }
    } else if s.matches(':').count() > 1 {
        // Bare IPv6 literal
        format!("[{}]:{}", s, DEFAULT_DNS_PORT).parse()
    } else if s.contains(':') {
        // IPv4 with port
        s.parse()
    } else {
        format!("{}:{}", s, DEFAULT_DNS_PORT).parse()
    };

    parsed.map_err(|_| ClientError::InvalidArgument(format!("invalid server address '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_forms() {
        assert_eq!(
            parse_server("1.1.1.1").unwrap(),
            "1.1.1.1:53".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_server("9.9.9.9:9953").unwrap(),
            "9.9.9.9:9953".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_server("2606:4700:4700::1111").unwrap(),
            "[2606:4700:4700::1111]:53".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_server("[::1]:5353").unwrap(),
            "[::1]:5353".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_server("[::1]").unwrap(),
            "[::1]:53".parse::<SocketAddr>().unwrap()
        );
        assert!(parse_server("").is_err());
        assert!(parse_server("not an address").is_err());
    }

    #[test]
    fn test_config_defaults_from_toml() {
        let config: ClientConfig = toml::from_str(r#"servers = ["1.1.1.1", "8.8.8.8"]"#).unwrap();
        assert_eq!(config.timeout_ms, 5000);
        assert!(config.udp_enabled);
        assert!(config.tcp_enabled);
        assert_eq!(config.udp_payload_size, 512);
        assert_eq!(config.server_addrs().unwrap().len(), 2);
    }
}
