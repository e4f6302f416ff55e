//! Well-known public resolvers, checked one provider at a time or all
//! together.

use crate::context::RunContext;
use crate::evaluation::{join_addresses, ResolverProbe};
use crate::findings::CheckUnit;
use crate::network::IpVersion;
use futures::future::BoxFuture;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

pub const NAME: &str = "dns_open_resolvers";

const MNEMO: &str = "OPEN_DNS_RESOLVER";

/// A well-known public resolver service.
#[derive(Debug)]
pub struct OpenResolverProvider {
    pub name: &'static str,
    /// Registry name of the single-provider check.
    pub check: &'static str,
    pub v4: &'static [IpAddr],
    pub v6: &'static [IpAddr],
}

impl OpenResolverProvider {
    pub fn resolvers(&self, family: IpVersion) -> &'static [IpAddr] {
        match family {
            IpVersion::V4 => self.v4,
            IpVersion::V6 => self.v6,
        }
    }
}

const fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(a, b, c, d))
}

const fn v6(segments: [u16; 8]) -> IpAddr {
    let [a, b, c, d, e, f, g, h] = segments;
    IpAddr::V6(Ipv6Addr::new(a, b, c, d, e, f, g, h))
}

pub static GOOGLE: OpenResolverProvider = OpenResolverProvider {
    name: "Google",
    check: "8888",
    v4: &[v4(8, 8, 8, 8), v4(8, 8, 4, 4)],
    v6: &[
        v6([0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888]),
        v6([0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8844]),
    ],
};

pub static CLOUDFLARE: OpenResolverProvider = OpenResolverProvider {
    name: "Cloudflare",
    check: "1111",
    v4: &[v4(1, 1, 1, 1), v4(1, 0, 0, 1)],
    v6: &[
        v6([0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1111]),
        v6([0x2606, 0x4700, 0x4700, 0, 0, 0, 0, 0x1001]),
    ],
};

pub static QUAD9: OpenResolverProvider = OpenResolverProvider {
    name: "Quad9",
    check: "9999",
    v4: &[v4(9, 9, 9, 9)],
    v6: &[
        v6([0x2620, 0xfe, 0, 0, 0, 0, 0, 0xfe]),
        v6([0x2620, 0xfe, 0, 0, 0, 0, 0, 0x9]),
        v6([0x2620, 0xfe, 0, 0, 0, 0, 0, 0x10]),
        v6([0x2620, 0xfe, 0, 0, 0, 0, 0xfe, 0x10]),
        v6([0x2620, 0xfe, 0, 0, 0, 0, 0, 0x11]),
        v6([0x2620, 0xfe, 0, 0, 0, 0, 0xfe, 0x11]),
    ],
};

pub static ALL_PROVIDERS: [&OpenResolverProvider; 3] = [&GOOGLE, &CLOUDFLARE, &QUAD9];

/// `dns_open_resolvers`: Google, Cloudflare and Quad9 in one unit.
pub fn run(ctx: Arc<RunContext>, check: CheckUnit) -> BoxFuture<'static, ()> {
    Box::pin(async move { check_open_resolvers(&ctx, &check, &ALL_PROVIDERS).await })
}

pub fn run_google(ctx: Arc<RunContext>, check: CheckUnit) -> BoxFuture<'static, ()> {
    Box::pin(async move { check_open_resolvers(&ctx, &check, &[&GOOGLE]).await })
}

pub fn run_cloudflare(ctx: Arc<RunContext>, check: CheckUnit) -> BoxFuture<'static, ()> {
    Box::pin(async move { check_open_resolvers(&ctx, &check, &[&CLOUDFLARE]).await })
}

pub fn run_quad9(ctx: Arc<RunContext>, check: CheckUnit) -> BoxFuture<'static, ()> {
    Box::pin(async move { check_open_resolvers(&ctx, &check, &[&QUAD9]).await })
}

/// Queries and pings every resolver of every provider over the enabled
/// families, rolling each provider and family up into one OK / PARTIAL /
/// FAIL finding per dimension.
pub async fn check_open_resolvers(
    ctx: &RunContext,
    check: &CheckUnit,
    providers: &[&OpenResolverProvider],
) {
    let probe = ResolverProbe::new(ctx, check, MNEMO, "open DNS resolvers");

    for provider in providers {
        for family in IpVersion::BOTH {
            if !ctx.families().enabled(family) {
                continue;
            }
            let resolvers = provider.resolvers(family);
            check.info(
                "CHECKING_OPEN_DNS_RESOLVER",
                format!(
                    "Checking {}'s {} resolvers [{}]",
                    provider.name,
                    family,
                    join_addresses(resolvers)
                ),
            );
            probe.test_family(family, resolvers).await;
        }
    }
}
