//! Target Resolver - turns the user's host string into a connect address
//!
//! Accepted forms:
//! - IPv4 or IPv6 literal: "192.168.0.1", "::1"
//! - bracketed IPv6 literal: "[::1]"
//! - hostname: "example.com" (system resolver, IPv4 preferred)

use anyhow::{Context, Result};
use std::net::{IpAddr, ToSocketAddrs};
use tracing::debug;

pub struct TargetResolver;

impl TargetResolver {
    pub fn new() -> Self { Self }

    /// Resolve `host` to a single address.
    ///
    /// Name lookups run inside `tokio::task::spawn_blocking` so the
    /// runtime is not blocked by the system resolver.
    pub async fn resolve_host(host: &str) -> Result<IpAddr> {
        let host = host.trim();
        if host.is_empty() {
            anyhow::bail!("No target specified");
        }

        if let Some(ip) = parse_literal(host) {
            return Ok(ip);
        }

        let name = host.to_string();
        let addrs: Vec<IpAddr> = tokio::task::spawn_blocking(move || {
            (name.as_str(), 0)
                .to_socket_addrs()
                .map(|addrs| addrs.map(|a| a.ip()).collect::<Vec<IpAddr>>())
        })
        .await
        .context("Blocking DNS resolution failed")?
        .with_context(|| format!("Failed to resolve host {host}"))?;

        debug!(host, candidates = addrs.len(), "resolved target");
        pick_address(&addrs).with_context(|| format!("Host {host} has no addresses"))
    }
}

fn parse_literal(host: &str) -> Option<IpAddr> {
    let unbracketed = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    unbracketed.parse::<IpAddr>().ok()
}

/// First IPv4 address, else the first address of any family.
fn pick_address(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}

impl Default for TargetResolver { fn default() -> Self { Self::new() } }


#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[tokio::test]
    async fn test_resolve_ipv4_literal() {
        let ip = TargetResolver::resolve_host("8.8.8.8").await.unwrap();
        assert_eq!(ip, IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[tokio::test]
    async fn test_resolve_ipv6_literals() {
        let ip = TargetResolver::resolve_host("::1").await.unwrap();
        assert_eq!(ip, IpAddr::V6(Ipv6Addr::LOCALHOST));
        let ip = TargetResolver::resolve_host("[::1]").await.unwrap();
        assert_eq!(ip, IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[tokio::test]
    async fn test_resolve_localhost_name() {
        let ip = TargetResolver::resolve_host("localhost").await.unwrap();
        assert!(ip.is_loopback());
    }

    #[tokio::test]
    async fn test_empty_target_rejected() {
        assert!(TargetResolver::resolve_host("   ").await.is_err());
    }

    #[test]
    fn test_pick_prefers_ipv4() {
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let v4 = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert_eq!(pick_address(&[v6, v4]), Some(v4));
        assert_eq!(pick_address(&[v6]), Some(v6));
        assert_eq!(pick_address(&[]), None);
    }
}
