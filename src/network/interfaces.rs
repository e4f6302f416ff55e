use pnet::datalink;
use std::net::IpAddr;

/// One address configured on a local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddress {
    pub interface: String,
    pub ip: IpAddr,
}

/// Every address on every interface, loopback included.
pub fn local_addresses() -> Vec<InterfaceAddress> {
    datalink::interfaces()
        .into_iter()
        .flat_map(|iface| {
            let name = iface.name.clone();
            iface.ips.into_iter().map(move |network| InterfaceAddress {
                interface: name.clone(),
                ip: network.ip(),
            })
        })
        .collect()
}
