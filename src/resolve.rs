//! Host name resolution.
//!
//! Every routing call re-resolves its addresses; nothing is cached here, so a
//! device that moves to a new DHCP lease is picked up on the next call.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, Ipv4Addr};

/// Forward and reverse address lookup.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve a host name or IPv4 literal to an IPv4 address.
    async fn resolve_ipv4(&self, host: &str) -> io::Result<Ipv4Addr>;

    /// Find a host name for an address.
    async fn reverse_lookup(&self, ip: IpAddr) -> io::Result<String>;
}

fn not_found(host: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no IPv4 address found for '{}'", host),
    )
}

/// Resolver backed by the operating system.
///
/// A static host table is consulted first, then IPv4 literals, then DNS.
#[derive(Debug, Clone, Default)]
pub struct SystemResolver {
    hosts: HashMap<String, Ipv4Addr>,
}

impl SystemResolver {
    /// Resolver without static entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with a static host table (checked before DNS).
    pub fn with_hosts(hosts: HashMap<String, Ipv4Addr>) -> Self {
        Self { hosts }
    }
}

#[async_trait]
impl AddressResolver for SystemResolver {
    async fn resolve_ipv4(&self, host: &str) -> io::Result<Ipv4Addr> {
        if let Some(ip) = self.hosts.get(host) {
            return Ok(*ip);
        }
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(ip);
        }

        let addrs = tokio::net::lookup_host((host, 0)).await?;
        for addr in addrs {
            if let IpAddr::V4(ip) = addr.ip() {
                tracing::trace!(host, %ip, "Resolved host");
                return Ok(ip);
            }
        }
        Err(not_found(host))
    }

    async fn reverse_lookup(&self, ip: IpAddr) -> io::Result<String> {
        if let Some((name, _)) = self.hosts.iter().find(|(_, v)| IpAddr::V4(**v) == ip) {
            return Ok(name.clone());
        }
        tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip))
            .await
            .map_err(io::Error::other)?
    }
}

/// In-memory resolver with a fixed table.
///
/// IPv4 literals resolve to themselves; reverse lookups only succeed for
/// entries with a registered name.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    forward: HashMap<String, Ipv4Addr>,
    reverse: HashMap<Ipv4Addr, String>,
}

impl StaticResolver {
    /// Empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` ↔ `ip`.
    pub fn with_host(mut self, name: impl Into<String>, ip: Ipv4Addr) -> Self {
        let name = name.into();
        self.forward.insert(name.clone(), ip);
        self.reverse.insert(ip, name);
        self
    }
}

#[async_trait]
impl AddressResolver for StaticResolver {
    async fn resolve_ipv4(&self, host: &str) -> io::Result<Ipv4Addr> {
        if let Some(ip) = self.forward.get(host) {
            return Ok(*ip);
        }
        host.parse::<Ipv4Addr>().map_err(|_| not_found(host))
    }

    async fn reverse_lookup(&self, ip: IpAddr) -> io::Result<String> {
        let IpAddr::V4(ip) = ip else {
            return Err(not_found(&ip.to_string()));
        };
        self.reverse
            .get(&ip)
            .cloned()
            .ok_or_else(|| not_found(&ip.to_string()))
    }
}
