use crate::cidr::ProviderCidrTable;
use crate::config::Settings;
use crate::dns::doh::{DohTransport, HttpDohTransport};
use crate::dns::{DnsTransport, UdpTransport};
use crate::network::{local_addresses, AddressFamilies, InterfaceAddress, Pinger, SystemPinger};
use crate::utils::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const RESOLV_CONF: &str = "/etc/resolv.conf";

pub type InterfaceSource = fn() -> Vec<InterfaceAddress>;

/// Everything a check may read during one run. Built once, shared by `Arc`.
pub struct RunContext {
    settings: Settings,
    providers: ProviderCidrTable,
    families: AddressFamilies,
    dns: Arc<dyn DnsTransport>,
    pinger: Arc<dyn Pinger>,
    doh: Option<Arc<dyn DohTransport>>,
    resolv_conf: PathBuf,
    interfaces: InterfaceSource,
}

impl RunContext {
    pub fn new(settings: Settings) -> Self {
        let families = AddressFamilies::new(settings.main.skip_ipv4, settings.main.skip_ipv6);
        Self {
            settings,
            providers: ProviderCidrTable::new(),
            families,
            dns: Arc::new(UdpTransport),
            pinger: Arc::new(SystemPinger::new()),
            doh: None,
            resolv_conf: PathBuf::from(RESOLV_CONF),
            interfaces: local_addresses,
        }
    }

    pub fn with_providers(mut self, providers: ProviderCidrTable) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_families(mut self, families: AddressFamilies) -> Self {
        self.families = families;
        self
    }

    pub fn with_dns_transport(mut self, dns: Arc<dyn DnsTransport>) -> Self {
        self.dns = dns;
        self
    }

    pub fn with_pinger(mut self, pinger: Arc<dyn Pinger>) -> Self {
        self.pinger = pinger;
        self
    }

    pub fn with_doh_transport(mut self, doh: Arc<dyn DohTransport>) -> Self {
        self.doh = Some(doh);
        self
    }

    pub fn with_resolv_conf(mut self, path: impl Into<PathBuf>) -> Self {
        self.resolv_conf = path.into();
        self
    }

    pub fn with_interface_source(mut self, source: InterfaceSource) -> Self {
        self.interfaces = source;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn providers(&self) -> &ProviderCidrTable {
        &self.providers
    }

    pub fn families(&self) -> &AddressFamilies {
        &self.families
    }

    pub fn dns(&self) -> &dyn DnsTransport {
        self.dns.as_ref()
    }

    pub fn pinger(&self) -> &dyn Pinger {
        self.pinger.as_ref()
    }

    /// The configured DoH transport, or an HTTP one built from the settings.
    pub fn doh(&self) -> Result<Arc<dyn DohTransport>> {
        match &self.doh {
            Some(doh) => Ok(Arc::clone(doh)),
            None => Ok(Arc::new(HttpDohTransport::new(self.settings.doh.timeout())?)),
        }
    }

    pub fn resolv_conf(&self) -> &Path {
        &self.resolv_conf
    }

    pub fn interfaces(&self) -> Vec<InterfaceAddress> {
        (self.interfaces)()
    }
}
