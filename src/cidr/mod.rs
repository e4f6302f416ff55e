//! Built-in address tables on `IpNetwork` prefixes and the
//! provider classifier used to spot hijacked or misrouted DNS answers.

use crate::config::ConfigError;
use crate::findings::CheckUnit;
use pnet::ipnetwork::IpNetwork;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

/// Parses one prefix. A bare address is a host prefix.
pub fn parse_cidr(s: &str) -> Result<IpNetwork, ConfigError> {
    s.trim()
        .parse::<IpNetwork>()
        .map_err(|_| ConfigError::InvalidCidr(s.to_string()))
}

fn table(prefixes: &[&str]) -> Vec<IpNetwork> {
    prefixes.iter().filter_map(|p| parse_cidr(p).ok()).collect()
}

pub fn in_any(ip: IpAddr, list: &[IpNetwork]) -> bool {
    list.iter().any(|network| network.contains(ip))
}

// RFC 1918
pub static IPV4_PRIVATE: LazyLock<Vec<IpNetwork>> =
    LazyLock::new(|| table(&["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"]));

// RFC 3927, what a host falls back to when DHCP fails
pub static IPV4_LINK_LOCAL: LazyLock<Vec<IpNetwork>> =
    LazyLock::new(|| table(&["169.254.0.0/16"]));

/// Ranges that are odd to see as an end user's own address.
pub static IPV4_SUSPICIOUS: LazyLock<Vec<IpNetwork>> =
    LazyLock::new(|| table(&["1.0.0.0/24", "1.2.3.0/24"]));

// RFC 4193
pub static IPV6_ULA: LazyLock<Vec<IpNetwork>> = LazyLock::new(|| table(&["fc00::/7"]));

// RFC 6052 well-known prefix
pub static IPV6_NAT64: LazyLock<Vec<IpNetwork>> = LazyLock::new(|| table(&["64:ff9b::/96"]));

pub static IPV6_LINK_LOCAL: LazyLock<Vec<IpNetwork>> = LazyLock::new(|| table(&["fe80::/10"]));

pub fn is_ipv4_private(ip: IpAddr) -> bool {
    in_any(ip, &IPV4_PRIVATE)
}

pub fn is_ipv4_link_local(ip: IpAddr) -> bool {
    in_any(ip, &IPV4_LINK_LOCAL)
}

pub fn is_ipv4_suspicious(ip: IpAddr) -> bool {
    in_any(ip, &IPV4_SUSPICIOUS)
}

pub fn is_ipv6_ula(ip: IpAddr) -> bool {
    in_any(ip, &IPV6_ULA)
}

pub fn is_ipv6_nat64(ip: IpAddr) -> bool {
    in_any(ip, &IPV6_NAT64)
}

/// Unicast and not loopback, link-local, multicast, broadcast or unspecified.
pub fn is_global_unicast(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_unspecified()
                || v4.is_loopback()
                || v4.is_multicast()
                || v4.is_broadcast()
                || is_ipv4_link_local(ip))
        }
        IpAddr::V6(v6) => {
            !(v6.is_unspecified()
                || v6.is_loopback()
                || v6.is_multicast()
                || in_any(ip, &IPV6_LINK_LOCAL))
        }
    }
}

/// The IPv4 address carried in the last 32 bits of a NAT64 address.
pub fn unwrap_nat64(ip: Ipv6Addr) -> Option<Ipv4Addr> {
    if !is_ipv6_nat64(IpAddr::V6(ip)) {
        return None;
    }
    let o = ip.octets();
    Some(Ipv4Addr::new(o[12], o[13], o[14], o[15]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// No CIDR list is configured for the provider.
    Unknown,
    Match,
    Mismatch,
}

/// Known address ranges per provider, keyed by the name being looked up.
#[derive(Debug, Clone, Default)]
pub struct ProviderCidrTable {
    providers: HashMap<String, Vec<IpNetwork>>,
}

impl ProviderCidrTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, provider: impl Into<String>, cidrs: Vec<IpNetwork>) {
        self.providers.insert(provider.into(), cidrs);
    }

    pub fn get(&self, provider: &str) -> Option<&[IpNetwork]> {
        self.providers.get(provider).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn classify(&self, ip: IpAddr, provider: &str) -> Classification {
        let Some(cidrs) = self.get(provider) else {
            return Classification::Unknown;
        };
        let ip = match ip {
            IpAddr::V6(v6) => unwrap_nat64(v6).map(IpAddr::V4).unwrap_or(ip),
            v4 => v4,
        };
        if in_any(ip, cidrs) {
            Classification::Match
        } else {
            Classification::Mismatch
        }
    }

    /// Classifies an answer and reports the outcome. Never an error: an unknown
    /// provider is informational and a mismatch is only a warning.
    pub fn report(&self, check: &CheckUnit, address: &str, provider: &str) -> Classification {
        let Ok(ip) = address.parse::<IpAddr>() else {
            check.warning(
                "PROVIDER_CIDR_BAD_ADDRESS",
                format!("Cannot parse {address:?} as an IP address for {provider}"),
            );
            return Classification::Mismatch;
        };
        let outcome = self.classify(ip, provider);
        match outcome {
            Classification::Unknown => check.info(
                "PROVIDER_CIDR_UNKNOWN",
                format!("CIDR block list is unknown for {provider} (IP: {ip})"),
            ),
            Classification::Match => check.info(
                "PROVIDER_CIDR_OK",
                format!("The IP {ip} is in the CIDR block list for {provider}"),
            ),
            Classification::Mismatch => check.warning(
                "PROVIDER_CIDR_NOT_OK",
                format!("The IP {ip} is not in the CIDR block list for {provider}"),
            ),
        }
        outcome
    }
}
