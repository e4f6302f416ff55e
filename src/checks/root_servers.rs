//! Sanity checks against the 13 DNS root servers: SOA freshness, TLD
//! delegations, and NXDOMAIN for names that cannot exist.

use crate::context::RunContext;
use crate::dns::{self, random_label, DnsQuery, ParsedResponse, QueryType, RecordKind};
use crate::evaluation::{
    ping_servers, report_roll_up, verdict, OutcomeTuple, ResultCode, RollUpSubject,
};
use crate::findings::CheckUnit;
use crate::network::IpVersion;
use crate::utils::NetworkError;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use futures::future::BoxFuture;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

pub const NAME: &str = "dns_root_servers";

const MNEMO: &str = "ROOT_DNS_SERVER";

/// A root zone serial older than this is stale.
pub const SOA_GRACE_DAYS: i64 = 2;

/// Fewer NS records than this for a TLD is suspicious.
pub const MIN_NSSET: usize = 4;

pub const RANDOM_LABEL_LEN: usize = 12;

#[derive(Debug)]
pub struct RootServer {
    pub letter: char,
    pub v4: Ipv4Addr,
    pub v6: Ipv6Addr,
}

impl RootServer {
    pub fn address(&self, family: IpVersion) -> IpAddr {
        match family {
            IpVersion::V4 => IpAddr::V4(self.v4),
            IpVersion::V6 => IpAddr::V6(self.v6),
        }
    }
}

const fn root(letter: char, v4: [u8; 4], v6: [u16; 8]) -> RootServer {
    RootServer {
        letter,
        v4: Ipv4Addr::new(v4[0], v4[1], v4[2], v4[3]),
        v6: Ipv6Addr::new(v6[0], v6[1], v6[2], v6[3], v6[4], v6[5], v6[6], v6[7]),
    }
}

pub static ROOT_SERVERS: [RootServer; 13] = [
    root('A', [198, 41, 0, 4], [0x2001, 0x503, 0xba3e, 0, 0, 0, 0x2, 0x30]),
    root('B', [170, 247, 170, 2], [0x2801, 0x1b8, 0x10, 0, 0, 0, 0, 0xb]),
    root('C', [192, 33, 4, 12], [0x2001, 0x500, 0x2, 0, 0, 0, 0, 0xc]),
    root('D', [199, 7, 91, 13], [0x2001, 0x500, 0x2d, 0, 0, 0, 0, 0xd]),
    root('E', [192, 203, 230, 10], [0x2001, 0x500, 0xa8, 0, 0, 0, 0, 0xe]),
    root('F', [192, 5, 5, 241], [0x2001, 0x500, 0x2f, 0, 0, 0, 0, 0xf]),
    root('G', [192, 112, 36, 4], [0x2001, 0x500, 0x12, 0, 0, 0, 0, 0xd0d]),
    root('H', [198, 97, 190, 53], [0x2001, 0x500, 0x1, 0, 0, 0, 0, 0x53]),
    root('I', [192, 36, 148, 17], [0x2001, 0x7fe, 0, 0, 0, 0, 0, 0x53]),
    root('J', [192, 58, 128, 30], [0x2001, 0x503, 0xc27, 0, 0, 0, 0x2, 0x30]),
    root('K', [193, 0, 14, 129], [0x2001, 0x7fd, 0, 0, 0, 0, 0, 0x1]),
    root('L', [199, 7, 83, 42], [0x2001, 0x500, 0x9f, 0, 0, 0, 0, 0x42]),
    root('M', [202, 12, 27, 33], [0x2001, 0xdc3, 0, 0, 0, 0, 0, 0x35]),
];

/// Whether a root zone serial (`YYYYMMDDnn`) is within the grace window of
/// `now`. `None` if the serial does not start with a date.
pub fn soa_serial_is_fresh(serial: &str, now: DateTime<Utc>) -> Option<bool> {
    let date = NaiveDate::parse_from_str(serial.get(..8)?, "%Y%m%d").ok()?;
    let published = date.and_hms_opt(0, 0, 0)?.and_utc();
    Some(now.signed_duration_since(published) < ChronoDuration::days(SOA_GRACE_DAYS))
}

/// Registry entry point for `dns_root_servers`, over all 13 letters.
pub fn run(ctx: Arc<RunContext>, check: CheckUnit) -> BoxFuture<'static, ()> {
    Box::pin(async move { check_root_servers(&ctx, &check, &ROOT_SERVERS).await })
}

/// Pings and queries each server over every enabled family. An empty TLD
/// list is fatal once, but the SOA and random-label sub-checks still run.
pub async fn check_root_servers(ctx: &RunContext, check: &CheckUnit, servers: &[RootServer]) {
    let dns = &ctx.settings().dns;
    if dns.query && dns.tlds.is_empty() {
        check.fatal("ROOT_NO_TLDS", "The list of TLDs to look up is empty");
    }

    for server in servers {
        for family in IpVersion::BOTH {
            if !ctx.families().enabled(family) {
                continue;
            }
            let address = server.address(family);
            check.info(
                "CHECKING_DNS_ROOT_SERVER",
                format!("Checking {}-root {} server {}", server.letter, family, address),
            );
            test_root_server(ctx, check, server.letter, family, address).await;
            check.track();
        }
    }
}

async fn test_root_server(
    ctx: &RunContext,
    check: &CheckUnit,
    letter: char,
    family: IpVersion,
    address: IpAddr,
) {
    let kind = format!("{letter}-root DNS server");
    let subject = |test: &'static str, verb: &'static str| RollUpSubject {
        test,
        mnemo: MNEMO,
        family,
        kind: kind.as_str(),
        verb,
    };

    if ctx.settings().dns.ping {
        let tuple = ping_servers(ctx, check, "ROOT", &[address]).await;
        report_roll_up(check, subject("PING", "reachable"), &[address], &tuple);
    }

    if ctx.settings().dns.query {
        let sub_checks = query_root_server(ctx, check, letter, address).await;
        // the sub-checks of one server collapse into a single outcome
        let tuple: OutcomeTuple = verdict(&sub_checks).into_iter().collect();
        report_roll_up(check, subject("QUERY", "answering"), &[address], &tuple);
    }
}

/// Runs the SOA, TLD and random-label sub-checks against one server.
pub async fn query_root_server(
    ctx: &RunContext,
    check: &CheckUnit,
    letter: char,
    server: IpAddr,
) -> OutcomeTuple {
    let mut out = OutcomeTuple::new();

    out.record(check_soa(ctx, check, letter, server).await);

    for tld in &ctx.settings().dns.tlds {
        out.record(check_tld(ctx, check, letter, server, tld).await);
        check.track();
    }

    for _ in 0..ctx.settings().dns.random {
        let label = random_label(RANDOM_LABEL_LEN);
        out.record(check_random_tld(ctx, check, letter, server, &label).await);
        check.track();
    }

    out
}

async fn root_query(
    ctx: &RunContext,
    check: &CheckUnit,
    server: IpAddr,
    name: &str,
    qtype: QueryType,
) -> crate::utils::Result<ParsedResponse> {
    let query = DnsQuery::new(name, qtype)
        .with_recursion(false)
        .with_nsid(true);
    let parsed = dns::query(check, ctx.dns(), server, &query, ctx.settings().dns.timeout()).await?;
    for nsid in parsed.get(RecordKind::Nsid) {
        check.info(
            "ROOT_DNS_SERVER_NSID",
            format!("NSID of DNS response is {nsid}"),
        );
    }
    Ok(parsed)
}

async fn check_soa(ctx: &RunContext, check: &CheckUnit, letter: char, server: IpAddr) -> ResultCode {
    check.info(
        "ROOT_DNS_SERVER_SOA_QUERY",
        format!("Querying SOA record from {letter}-root server {server}"),
    );

    let parsed = match root_query(ctx, check, server, ".", QueryType::Soa).await {
        Ok(parsed) => parsed,
        Err(e @ NetworkError::ResponseCode { .. }) => {
            check.error("ROOT_DNS_SERVER_RCODE", format!("SOA query: {e}"));
            return ResultCode::Failure;
        }
        Err(e) => {
            check.error("ROOT_DNS_SERVER_SOA", e.to_string());
            return ResultCode::Failure;
        }
    };

    let Some(soa) = parsed.get(RecordKind::Soa).first() else {
        check.error(
            "ROOT_DNS_SERVER_SOA",
            format!("{letter}-root server {server} returned no SOA record"),
        );
        return ResultCode::Failure;
    };

    let serial = soa.split_whitespace().nth(1).unwrap_or_default();
    match soa_serial_is_fresh(serial, Utc::now()) {
        Some(true) => {
            check.info("ROOT_DNS_SERVER_SOA_SERIAL", format!("SOA serial is {serial}"));
            ResultCode::Success
        }
        Some(false) => {
            check.warning("ROOT_DNS_SERVER_SOA_OLD", format!("SOA serial {serial} is too old?"));
            ResultCode::Partial
        }
        None => {
            check.warning(
                "ROOT_DNS_SERVER_SOA_OLD",
                format!("SOA serial {serial:?} does not carry a date"),
            );
            ResultCode::Partial
        }
    }
}

async fn check_tld(
    ctx: &RunContext,
    check: &CheckUnit,
    letter: char,
    server: IpAddr,
    tld: &str,
) -> ResultCode {
    check.info(
        "ROOT_DNS_SERVER_TLD_QUERY",
        format!("Querying TLD {tld} from {letter}-root server {server}"),
    );

    let parsed = match root_query(ctx, check, server, tld, QueryType::Ns).await {
        Ok(parsed) => parsed,
        Err(e @ NetworkError::ResponseCode { .. }) => {
            check.error("ROOT_DNS_SERVER_RCODE", format!("{tld}: {e}"));
            return ResultCode::Failure;
        }
        Err(e) => {
            check.error("ROOT_DNS_SERVER_TLD", format!("{tld}: {e}"));
            return ResultCode::Failure;
        }
    };

    let nsset = parsed.get(RecordKind::Ns);
    check.info(
        "ROOT_DNS_SERVER_TLD_NSSET",
        format!("NS set for {tld} is [{}]", nsset.join(", ")),
    );
    if nsset.len() < MIN_NSSET {
        check.warning(
            "ROOT_DNS_SERVER_NSSET_SHORT",
            format!("NS set for {tld} is too short ({})", nsset.len()),
        );
        return ResultCode::Partial;
    }
    ResultCode::Success
}

/// A label that cannot exist must come back NXDOMAIN. An NS set for it
/// means something between us and the root is rewriting answers.
async fn check_random_tld(
    ctx: &RunContext,
    check: &CheckUnit,
    letter: char,
    server: IpAddr,
    label: &str,
) -> ResultCode {
    check.info(
        "ROOT_DNS_SERVER_RANDOM_QUERY",
        format!("Querying TLD {label} from {letter}-root server {server}"),
    );

    match root_query(ctx, check, server, label, QueryType::Ns).await {
        Err(e) if e.is_nxdomain() => {
            check.detail(
                "ROOT_DNS_SERVER_TLD_NXDOMAIN",
                format!("Random TLD lookup for {label} failed as expected"),
            );
            ResultCode::Success
        }
        Err(e @ NetworkError::ResponseCode { .. }) => {
            check.error("ROOT_DNS_SERVER_RCODE", format!("{label}: {e}"));
            ResultCode::Failure
        }
        Err(e) => {
            check.error(
                "ROOT_DNS_SERVER_RANDOM_ERROR",
                format!("Random TLD lookup for {label} failed: {e}"),
            );
            ResultCode::Failure
        }
        Ok(parsed) if !parsed.get(RecordKind::Ns).is_empty() => {
            check.error(
                "ROOT_DNS_SERVER_RANDOM_ANSWERED",
                format!(
                    "unexpected answer to NXDOMAIN-expected query for {label}: NS set is [{}]",
                    parsed.get(RecordKind::Ns).join(", ")
                ),
            );
            ResultCode::Failure
        }
        Ok(_) => {
            check.warning(
                "ROOT_DNS_SERVER_RANDOM_NODATA",
                format!("Random TLD lookup for {label} returned no error and no data"),
            );
            ResultCode::Partial
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_soa_freshness() {
        let now = noon(2024, 6, 12);
        assert_eq!(soa_serial_is_fresh("2024061200", now), Some(true));
        assert_eq!(soa_serial_is_fresh("2024061100", now), Some(true));
        assert_eq!(soa_serial_is_fresh("2024060900", now), Some(false));
        assert_eq!(soa_serial_is_fresh("1", now), None);
        assert_eq!(soa_serial_is_fresh("20241399", now), None);
    }

    #[test]
    fn test_root_table() {
        assert_eq!(ROOT_SERVERS.len(), 13);
        assert_eq!(ROOT_SERVERS[0].address(IpVersion::V6).to_string(), "2001:503:ba3e::2:30");
        assert_eq!(ROOT_SERVERS[12].address(IpVersion::V4).to_string(), "202.12.27.33");
        assert_eq!(ROOT_SERVERS[6].v6.to_string(), "2001:500:12::d0d");
        let letters: String = ROOT_SERVERS.iter().map(|s| s.letter).collect();
        assert_eq!(letters, "ABCDEFGHIJKLM");
    }
}
