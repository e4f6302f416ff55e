//! Local interface addresses: what kind of network the host sits on, and
//! which address families are worth testing at all.

use crate::cidr::{
    is_global_unicast, is_ipv4_link_local, is_ipv4_private, is_ipv4_suspicious, is_ipv6_ula,
};
use crate::context::RunContext;
use crate::findings::CheckUnit;
use crate::network::{InterfaceAddress, IpVersion};
use futures::future::BoxFuture;
use std::net::IpAddr;
use std::sync::Arc;

pub const NAME: &str = "network_interfaces";

pub fn run(ctx: Arc<RunContext>, check: CheckUnit) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let addresses = ctx.interfaces();
        check_interfaces(&ctx, &check, &addresses);
    })
}

/// Looks for usable addresses and disables the families that have none.
pub fn check_interfaces(ctx: &RunContext, check: &CheckUnit, addresses: &[InterfaceAddress]) {
    if addresses.is_empty() {
        check.fatal("NO_INTERFACES", "Error evaluating network interfaces");
        return;
    }

    let families = ctx.families();
    let check_v4 = !families.skipped_by_config(IpVersion::V4);
    let check_v6 = !families.skipped_by_config(IpVersion::V6);
    let mut usable_v4 = false;
    let mut usable_v6 = false;

    for address in addresses {
        match address.ip {
            IpAddr::V6(_) if check_v6 => usable_v6 |= evaluate_ipv6(check, address),
            IpAddr::V4(_) if check_v4 => usable_v4 |= evaluate_ipv4(check, address),
            _ => {}
        }
        check.track();
    }

    if check_v4 && !usable_v4 {
        check.warning(
            "NO_IPV4",
            "No routable IPv4 addresses found, disabling IPv4 checks",
        );
        families.mark_unusable(IpVersion::V4);
    }

    if check_v6 && !usable_v6 {
        check.warning(
            "NO_IPV6",
            "No routable IPv6 addresses found, disabling IPv6 checks",
        );
        families.mark_unusable(IpVersion::V6);
    }

    if !usable_v4 && !usable_v6 {
        check.error("NO_ROUTABLE", "No routable addresses found");
    }
}

fn evaluate_ipv4(check: &CheckUnit, address: &InterfaceAddress) -> bool {
    let InterfaceAddress { interface, ip } = address;

    if is_global_unicast(*ip) {
        if is_ipv4_private(*ip) {
            check.info(
                "IPV4",
                format!("Local address {ip} on {interface} (NAT, RFC1918)"),
            );
        } else if is_ipv4_suspicious(*ip) {
            check.warning("IPV4", format!("Local address {ip} on {interface} (suspicious)"));
        } else {
            check.info("IPV4", format!("Local address {ip} on {interface}"));
        }
        return true;
    }

    if is_ipv4_link_local(*ip) {
        check.warning(
            "IPV4",
            format!("Local address {ip} on {interface} (no address obtained via DHCP?)"),
        );
    }
    false
}

fn evaluate_ipv6(check: &CheckUnit, address: &InterfaceAddress) -> bool {
    let InterfaceAddress { interface, ip } = address;

    if is_global_unicast(*ip) && !is_ipv6_ula(*ip) {
        check.info("IPV6", format!("Local address {ip} on {interface}"));
        return true;
    }
    false
}
