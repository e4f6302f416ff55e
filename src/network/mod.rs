use crate::config::ConfigError;
use crate::utils::{NetworkError, Result};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

pub mod icmp;
pub mod interfaces;
pub mod tcp;
pub mod udp;

pub use icmp::*;
pub use interfaces::*;
pub use tcp::*;
pub use udp::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub const BOTH: [IpVersion; 2] = [IpVersion::V4, IpVersion::V6];

    /// `IPv4` / `IPv6`, as used in finding details.
    pub const fn label(self) -> &'static str {
        match self {
            IpVersion::V4 => "IPv4",
            IpVersion::V6 => "IPv6",
        }
    }

    /// `4` / `6`, as used in mnemonics such as `PORT_FILTER_IPV4_DIAL`.
    pub const fn digit(self) -> &'static str {
        match self {
            IpVersion::V4 => "4",
            IpVersion::V6 => "6",
        }
    }

    pub fn of(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }

    pub fn matches(self, ip: IpAddr) -> bool {
        Self::of(ip) == self
    }

    pub(crate) const fn unspecified_bind(self) -> &'static str {
        match self {
            IpVersion::V4 => "0.0.0.0:0",
            IpVersion::V6 => "[::]:0",
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which address families checks may use during one run.
///
/// Skips come from flags and config; the interface check may additionally
/// mark a family unusable, which later checks observe unless it is forced.
#[derive(Debug, Default)]
pub struct AddressFamilies {
    skip_v4: bool,
    skip_v6: bool,
    force_v4: bool,
    force_v6: bool,
    unusable_v4: AtomicBool,
    unusable_v6: AtomicBool,
}

impl AddressFamilies {
    pub fn new(skip_v4: bool, skip_v6: bool) -> Self {
        Self {
            skip_v4,
            skip_v6,
            ..Self::default()
        }
    }

    pub fn with_force(mut self, force_v4: bool, force_v6: bool) -> Self {
        self.force_v4 = force_v4;
        self.force_v6 = force_v6;
        self
    }

    pub fn enabled(&self, version: IpVersion) -> bool {
        let (skip, force, unusable) = match version {
            IpVersion::V4 => (self.skip_v4, self.force_v4, &self.unusable_v4),
            IpVersion::V6 => (self.skip_v6, self.force_v6, &self.unusable_v6),
        };
        force || !(skip || unusable.load(Ordering::Relaxed))
    }

    /// Skipped by flag or config, independent of what the interfaces show.
    pub fn skipped_by_config(&self, version: IpVersion) -> bool {
        match version {
            IpVersion::V4 => self.skip_v4 && !self.force_v4,
            IpVersion::V6 => self.skip_v6 && !self.force_v6,
        }
    }

    pub fn mark_unusable(&self, version: IpVersion) {
        let (flag, forced) = match version {
            IpVersion::V4 => (&self.unusable_v4, self.force_v4),
            IpVersion::V6 => (&self.unusable_v6, self.force_v6),
        };
        flag.store(true, Ordering::Relaxed);
        if forced {
            log::warn!("{} checks are forced by configuration", version);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkProtocol {
    Tcp,
    Udp,
}

impl NetworkProtocol {
    pub const fn label(self) -> &'static str {
        match self {
            NetworkProtocol::Tcp => "TCP",
            NetworkProtocol::Udp => "UDP",
        }
    }
}

/// A `host,port,PROTO` entry of the port filtering configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortTarget {
    pub host: String,
    pub port: u16,
    pub protocol: NetworkProtocol,
}

impl FromStr for PortTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidPortTarget(s.to_string());
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        let [host, port, protocol] = fields.as_slice() else {
            return Err(invalid());
        };
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        let protocol = match protocol.to_ascii_uppercase().as_str() {
            "TCP" => NetworkProtocol::Tcp,
            "UDP" => NetworkProtocol::Udp,
            _ => return Err(invalid()),
        };
        Ok(Self {
            host: host.to_string(),
            port,
            protocol,
        })
    }
}

/// Resolves `target` to an address of the requested family. Literals are
/// accepted as-is when they match the family.
pub async fn resolve_target(target: &str, ip_version: IpVersion) -> Result<IpAddr> {
    use hickory_resolver::config::*;
    use hickory_resolver::TokioAsyncResolver;

    if let Ok(ip) = target.parse::<IpAddr>() {
        return if ip_version.matches(ip) {
            Ok(ip)
        } else {
            Err(NetworkError::Other(format!(
                "IP version mismatch: {} is not {}",
                ip, ip_version
            )))
        };
    }

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());

    let lookup = match ip_version {
        IpVersion::V4 => {
            let response = resolver
                .ipv4_lookup(target)
                .await
                .map_err(|e| NetworkError::DnsResolution(e.to_string()))?;
            response.iter().next().map(|ip| IpAddr::V4(**ip))
        }
        IpVersion::V6 => {
            let response = resolver
                .ipv6_lookup(target)
                .await
                .map_err(|e| NetworkError::DnsResolution(e.to_string()))?;
            response.iter().next().map(|ip| IpAddr::V6(**ip))
        }
    };

    lookup.ok_or_else(|| {
        NetworkError::DnsResolution(format!("No {} address found for {}", ip_version, target))
    })
}
