//! The resolvers the host is configured to use, read from resolv.conf.

use crate::context::RunContext;
use crate::evaluation::{join_addresses, ResolverProbe};
use crate::findings::CheckUnit;
use crate::network::IpVersion;
use crate::utils::duration_to_human;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;

pub const NAME: &str = "dns_local_resolvers";

const MNEMO: &str = "LOCAL_DNS_RESOLVER";

/// The parts of resolv.conf we use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvConf {
    pub domain: Option<String>,
    pub resolvers_v4: Vec<IpAddr>,
    pub resolvers_v6: Vec<IpAddr>,
    pub search: Vec<String>,
}

impl ResolvConf {
    /// Lenient: lines with other keywords, comments included, and
    /// nameserver entries that are not plain addresses are skipped.
    pub fn parse(content: &str) -> Self {
        let mut conf = Self::default();

        for line in content.lines() {
            let mut fields = line.split_whitespace();
            let Some(keyword) = fields.next() else {
                continue;
            };
            match keyword {
                "domain" => conf.domain = fields.next().map(str::to_string),
                "search" => conf.search.extend(fields.map(str::to_string)),
                "nameserver" => {
                    let Some(value) = fields.next() else {
                        continue;
                    };
                    // scoped link-local entries like fe80::1%eth0 are not usable targets
                    match value.parse::<IpAddr>() {
                        Ok(ip @ IpAddr::V4(_)) => conf.resolvers_v4.push(ip),
                        Ok(ip @ IpAddr::V6(_)) => conf.resolvers_v6.push(ip),
                        Err(_) => log::warn!("ignoring nameserver entry {:?}", value),
                    }
                }
                _ => {}
            }
        }

        conf
    }

    pub fn resolvers(&self, family: IpVersion) -> &[IpAddr] {
        match family {
            IpVersion::V4 => &self.resolvers_v4,
            IpVersion::V6 => &self.resolvers_v6,
        }
    }
}

/// Registry entry point for `dns_local_resolvers`.
pub fn run(ctx: Arc<RunContext>, check: CheckUnit) -> BoxFuture<'static, ()> {
    Box::pin(async move { check_local_resolvers(&ctx, &check).await })
}

/// Reports what resolv.conf says, then evaluates its resolvers per enabled
/// family. A family without resolvers is a warning; no resolvers at all is
/// an error.
pub async fn check_local_resolvers(ctx: &RunContext, check: &CheckUnit) {
    let Some(conf) = load_resolv_conf(ctx, check).await else {
        check.error(
            "NO_RESOLV_CONF",
            "Could not load DNS resolver data from resolv.conf",
        );
        return;
    };

    let probe = ResolverProbe::new(ctx, check, MNEMO, "local DNS resolvers");
    let families = ctx.families();

    for family in IpVersion::BOTH {
        if !families.enabled(family) {
            continue;
        }
        let resolvers = conf.resolvers(family);
        if resolvers.is_empty() {
            check.warning(
                format!("NO_LOCAL_IPV{}_RESOLVERS", family.digit()),
                format!("No {family} resolvers defined in resolv.conf"),
            );
            check.track();
        } else {
            probe.test_family(family, resolvers).await;
        }
    }

    if conf.resolvers_v4.is_empty() && conf.resolvers_v6.is_empty() {
        check.error("NO_LOCAL_RESOLVERS", "No DNS resolvers defined in resolv.conf");
    }
}

async fn load_resolv_conf(ctx: &RunContext, check: &CheckUnit) -> Option<ResolvConf> {
    let path = ctx.resolv_conf();
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            log::warn!("cannot read {}: {}", path.display(), e);
            return None;
        }
    };

    if let Ok(modified) = tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        let at = DateTime::<Utc>::from(modified).to_rfc3339_opts(SecondsFormat::Secs, true);
        check.info(
            "RESOLVCONF_DATE",
            format!(
                "resolv.conf was last modified {} ago (at {})",
                duration_to_human(age),
                at
            ),
        );
    }
    check.track();

    let conf = ResolvConf::parse(&content);
    let families = ctx.families();

    check.info(
        "DOMAIN",
        format!(
            "Current domain is: {}",
            conf.domain.as_deref().unwrap_or("(none)")
        ),
    );
    for family in IpVersion::BOTH {
        if families.enabled(family) {
            check.info(
                "LOCAL_DNS_RESOLVERS",
                format!(
                    "{family} resolvers: [{}]",
                    join_addresses(conf.resolvers(family))
                ),
            );
        }
    }
    check.info("SEARCH", format!("Search path: [{}]", conf.search.join(", ")));
    check.track();

    Some(conf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolv_conf() {
        let conf = ResolvConf::parse(
            "# generated by NetworkManager\n\
             domain home.example\n\
             search home.example corp.example\n\
             nameserver 192.0.2.53\n\
             nameserver 2001:db8::53\n\
             nameserver fe80::1%eth0\n\
             options edns0 trust-ad\n\
             nameserver\n",
        );
        assert_eq!(conf.domain.as_deref(), Some("home.example"));
        assert_eq!(conf.search, vec!["home.example", "corp.example"]);
        assert_eq!(conf.resolvers_v4, vec!["192.0.2.53".parse::<IpAddr>().unwrap()]);
        assert_eq!(conf.resolvers(IpVersion::V6).len(), 1);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(ResolvConf::parse(""), ResolvConf::default());
    }
}
