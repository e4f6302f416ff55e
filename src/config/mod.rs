//! Configuration loading: the main settings file and the provider CIDR file.

use crate::cidr::{parse_cidr, ProviderCidrTable};
use crate::dns::doh::DohProvider;
use crate::network::PortTarget;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "netiscope.toml";
pub const CIDR_FILE_NAME: &str = "netiscope-cidr.toml";
pub const DEFAULT_CHECK_SECTION: &str = "run";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file found (tried {0})")]
    NotFound(String),

    #[error("failed to read config file: {0}")]
    ReadFile(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[source] toml::de::Error),

    #[error("invalid CIDR prefix: {0:?}")]
    InvalidCidr(String),

    #[error("invalid port filtering target (expected host,port,TCP|UDP): {0:?}")]
    InvalidPortTarget(String),

    #[error("invalid DoH provider (expected 4|6,json|rfc8484,url): {0:?}")]
    InvalidDohProvider(String),

    #[error("{0}")]
    InvalidLogLevel(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub main: MainSettings,

    /// Named lists of checks; the `run` list is used unless another is selected.
    #[serde(default)]
    pub checks: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub dns: DnsSettings,

    #[serde(default)]
    pub port_filtering: PortFilteringSettings,

    #[serde(default)]
    pub doh: DohSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MainSettings {
    pub loglevel: Option<String>,

    #[serde(default)]
    pub skip_ipv4: bool,

    #[serde(default)]
    pub skip_ipv6: bool,

    #[serde(default = "default_ping_packets")]
    pub ping_packets: u32,
}

impl Default for MainSettings {
    fn default() -> Self {
        Self {
            loglevel: None,
            skip_ipv4: false,
            skip_ipv6: false,
            ping_packets: default_ping_packets(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DnsSettings {
    /// Evaluate resolver reachability with ping.
    #[serde(default = "default_true")]
    pub ping: bool,

    /// Evaluate resolvers by querying the configured names.
    #[serde(default = "default_true")]
    pub query: bool,

    #[serde(default)]
    pub names: Vec<String>,

    #[serde(default)]
    pub tlds: Vec<String>,

    /// How many random 12-character TLDs to ask each root server about.
    #[serde(default = "default_random_tlds")]
    pub random: usize,

    #[serde(default = "default_dns_timeout")]
    pub timeout: u64,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            ping: true,
            query: true,
            names: Vec::new(),
            tlds: Vec::new(),
            random: default_random_tlds(),
            timeout: default_dns_timeout(),
        }
    }
}

impl DnsSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortFilteringSettings {
    #[serde(default = "default_port_timeout")]
    pub timeout: u64,

    /// Compare the reply with the responder's fixed answer.
    #[serde(default)]
    pub check_response: bool,

    #[serde(default)]
    pub targets: Vec<String>,
}

impl Default for PortFilteringSettings {
    fn default() -> Self {
        Self {
            timeout: default_port_timeout(),
            check_response: false,
            targets: Vec::new(),
        }
    }
}

impl PortFilteringSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn targets(&self) -> Result<Vec<PortTarget>, ConfigError> {
        self.targets.iter().map(|t| t.parse()).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DohSettings {
    #[serde(default = "default_doh_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub providers: Vec<String>,
}

impl Default for DohSettings {
    fn default() -> Self {
        Self {
            timeout: default_doh_timeout(),
            providers: Vec::new(),
        }
    }
}

impl DohSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn providers(&self) -> Result<Vec<DohProvider>, ConfigError> {
        self.providers.iter().map(|p| p.parse()).collect()
    }
}

const fn default_true() -> bool {
    true
}

const fn default_ping_packets() -> u32 {
    3
}

const fn default_random_tlds() -> usize {
    3
}

const fn default_dns_timeout() -> u64 {
    5
}

const fn default_port_timeout() -> u64 {
    3
}

const fn default_doh_timeout() -> u64 {
    10
}

impl Settings {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content).map_err(ConfigError::Parse)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.port_filtering.targets()?;
        self.doh.providers()?;
        if let Some(level) = &self.main.loglevel {
            level
                .parse::<crate::findings::Severity>()
                .map_err(ConfigError::InvalidLogLevel)?;
        }
        Ok(())
    }

    /// The list of checks in `section`, empty if the section is missing.
    pub fn check_list(&self, section: &str) -> Vec<String> {
        self.checks.get(section).cloned().unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CidrFile {
    #[serde(default)]
    cidrs: BTreeMap<String, Vec<String>>,
}

pub fn parse_provider_cidrs(content: &str) -> Result<ProviderCidrTable, ConfigError> {
    let file: CidrFile = toml::from_str(content).map_err(ConfigError::Parse)?;
    let mut table = ProviderCidrTable::new();
    for (provider, cidrs) in file.cidrs {
        let parsed = cidrs
            .iter()
            .map(|c| parse_cidr(c))
            .collect::<Result<Vec<_>, _>>()?;
        table.insert(provider, parsed);
    }
    Ok(table)
}

pub fn load_provider_cidrs(path: impl AsRef<Path>) -> Result<ProviderCidrTable, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
    parse_provider_cidrs(&content)
}

/// Candidate paths in order of preference: explicit flag, working directory, `~/.config`.
pub fn candidate_paths(explicit: Option<&Path>, file_name: &str) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
    }
    candidates.push(PathBuf::from(file_name));
    if let Some(home) = std::env::var_os("HOME") {
        candidates.push(PathBuf::from(home).join(".config").join(file_name));
    }
    candidates
}

/// The first candidate that exists.
pub fn find_file(candidates: &[PathBuf]) -> Result<PathBuf, ConfigError> {
    candidates
        .iter()
        .find(|path| path.is_file())
        .cloned()
        .ok_or_else(|| {
            let tried: Vec<String> = candidates.iter().map(|p| p.display().to_string()).collect();
            ConfigError::NotFound(tried.join(", "))
        })
}
